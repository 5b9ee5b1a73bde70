use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ConfigValues, DEFAULT_UPDATE_FREQUENCY, Validation};
use crate::host::{Device, DeviceAction};

pub(crate) mod state;

/// Identity handed to the plugin at construction time.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub id: String,
    pub display_name: String,
    pub version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("startup failed: {0}")]
    Startup(#[source] anyhow::Error),
    #[error("shutdown failed: {0}")]
    Shutdown(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    New = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
    Failed = 5,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::New => "New",
            LifecycleState::Starting => "Starting",
            LifecycleState::Running => "Running",
            LifecycleState::Stopping => "Stopping",
            LifecycleState::Stopped => "Stopped",
            LifecycleState::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// The callback surface a hosted plugin satisfies. The host holds the plugin
/// as `Arc<dyn Plugin>` and drives every method itself; implementations never
/// call one another. Host invocations are serialized by the host's own
/// scheduling, so implementations only need interior mutability for state the
/// background runner also touches.
///
/// Construction is the concrete type's own `new` and must stay pure: the host
/// may build a plugin speculatively before deciding to run it.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn info(&self) -> &PluginInfo;

    /// Acquire external resources. Invoked once the host has decided to run
    /// the plugin.
    async fn start(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Release whatever `start` acquired. Invoked before teardown.
    async fn stop(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// One bounded unit of background work. The runner wraps every call in a
    /// failure boundary, so an `Err` here is logged and the loop continues.
    /// Must not block indefinitely or cancellation cannot occur promptly.
    async fn poll(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Read every iteration, so a saved configuration change takes effect on
    /// the next wait.
    fn poll_interval(&self) -> Duration {
        Duration::from_secs(DEFAULT_UPDATE_FREQUENCY)
    }

    /// Pure and synchronous; rejection is expressed through field errors,
    /// never through a failure.
    fn validate_config(&self, values: ConfigValues) -> Validation {
        Validation::accept(values)
    }

    /// Invoked after the host's configuration dialog closes. A cancelled
    /// dialog leaves prior state untouched.
    fn config_saved(&self, _values: ConfigValues, _cancelled: bool) {}

    /// The device became active under this plugin. Insert-or-overwrite.
    fn device_start(&self, _device: &Device) {}

    /// The device became inactive. Removing an unknown device is not an
    /// error.
    fn device_stop(&self, _device: &Device) {}

    fn validate_device_config(
        &self,
        values: ConfigValues,
        _type_id: &str,
        _device_id: &str,
    ) -> Validation {
        Validation::accept(values)
    }

    /// An external actor requested a state change on a device.
    async fn handle_device_action(&self, _action: DeviceAction, _device: &Device) {}
}
