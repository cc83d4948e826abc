pub mod config;
pub mod logging;

pub mod checksum;
pub mod control;
pub mod error;
pub mod manager;
pub mod orchestrator;
pub mod platform;
pub mod poll;
pub mod registry;
pub mod retry;
pub mod timesync;
pub mod transport;
pub mod worker;
