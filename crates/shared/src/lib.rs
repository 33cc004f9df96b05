//! Shared types for the fleetdeck dashboard client and its backend.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
