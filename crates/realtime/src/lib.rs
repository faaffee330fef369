//! # Realtime Core
//!
//! Error handling and outbound messaging contracts shared by the ride tracking
//! crates.

mod error;
mod provider;

pub use crate::error::*;
pub use crate::provider::*;
