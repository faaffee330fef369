//! # Ride tracking service
//!
//! Hosts a [`ride::RideManager`] for a single vehicle. Device shadow documents
//! feed it samples, a background ticker ends stale rides, and an HTTP API
//! exposes ride history, lock control and a live event stream.

pub mod config;
pub mod http;
pub mod messaging;
pub mod provider;

pub use crate::config::Config;
pub use crate::provider::{AppContext, LogPublisher};
