pub mod config;
pub mod device;
pub mod host;
pub mod plugin;
pub mod poller;
pub mod runtime;
