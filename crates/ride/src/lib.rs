//! Ride lifecycle domain logic.
//!
//! Turns a stream of position samples for a single vehicle into ride records.
//! [`RideManager`] owns the lifecycle state and is driven from two places: the
//! sample feed ([`RideManager::handle_sample`]) and the periodic inactivity
//! check ([`ticker::run_ticker`]).

pub mod alert;
pub mod config;
pub mod events;
pub mod geo;
pub mod hub;
pub mod inactivity;
pub mod manager;
pub mod models;
pub mod naming;
pub mod provider;
pub mod state;
pub mod store;
pub mod ticker;
pub mod transition;

pub use config::{Config, Thresholds};
pub use events::RideEvent;
pub use hub::{Hub, Subscription};
pub use manager::RideManager;
pub use models::*;
pub use provider::*;
pub use state::{LockStatus, RideManagerState, RidePhase};
