//! Discord transport: REST client and gateway listener

pub mod gateway;
pub mod model;
pub mod rest;

pub use gateway::Gateway;
pub use rest::DiscordClient;
