//! Port traits: the seams between domain logic and storage/configuration.

pub mod config_port;
pub mod portfolio_port;
pub mod price_port;
pub mod registry_port;
