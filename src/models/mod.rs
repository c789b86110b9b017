pub mod config;
pub mod events;
