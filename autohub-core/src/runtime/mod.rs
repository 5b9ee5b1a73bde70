mod host;
mod runner;

pub use host::PluginHost;
