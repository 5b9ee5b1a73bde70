use std::sync::Arc;
use std::sync::atomic::AtomicU8;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::info;

use crate::config::{ConfigValues, Validation};
use crate::host::{Device, DeviceAction};
use crate::plugin::state::{cas_state, load_state, store_state};
use crate::plugin::{LifecycleState, Plugin, PluginError};

use super::runner::PollRunner;

const STOP_GRACE: Duration = Duration::from_secs(3);

/// The host's handle on one loaded plugin: forwards every callback and owns
/// the background runner's lifetime. Callback forwarding adds no locking of
/// its own; the host serializes its invocations and the plugin guards the
/// state it shares with the runner.
pub struct PluginHost {
    plugin: Arc<dyn Plugin>,
    state: Arc<AtomicU8>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PluginHost {
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            plugin,
            state: Arc::new(AtomicU8::new(LifecycleState::New as u8)),
            stop_tx,
            stop_rx,
            task: Mutex::new(None),
        }
    }

    fn id(&self) -> &str {
        &self.plugin.info().id
    }

    pub fn state(&self) -> LifecycleState {
        load_state(&self.state)
    }

    /// Starts the plugin and spawns its background runner. A handle that is
    /// already starting or running is left alone.
    pub async fn start(&self) -> Result<(), PluginError> {
        let ok = cas_state(&self.state, LifecycleState::New, LifecycleState::Starting)
            || cas_state(&self.state, LifecycleState::Stopped, LifecycleState::Starting);
        if !ok {
            return Ok(());
        }
        let plugin_info = self.plugin.info();
        info!(
            "[{}] {} {} starting",
            plugin_info.id, plugin_info.display_name, plugin_info.version
        );
        if let Err(err) = self.plugin.start().await {
            store_state(self.id(), &self.state, LifecycleState::Failed);
            return Err(err);
        }
        let _ = self.stop_tx.send(false);
        let mut task_guard = self.task.lock().await;
        if let Some(handle) = task_guard.take() {
            handle.abort();
        }
        let runner = PollRunner {
            id: self.plugin.info().id.clone(),
            plugin: Arc::clone(&self.plugin),
            stop_rx: self.stop_rx.clone(),
        };
        let handle = tokio::spawn(async move {
            runner.run().await;
        });
        *task_guard = Some(handle);
        store_state(self.id(), &self.state, LifecycleState::Running);
        Ok(())
    }

    /// Signals the runner, waits out a short grace period before aborting
    /// it, then stops the plugin. Safe to call repeatedly.
    pub async fn stop(&self) -> Result<(), PluginError> {
        let _ = self.stop_tx.send(true);
        let cur = self.state();
        match cur {
            LifecycleState::Stopped => return Ok(()),
            LifecycleState::New => {
                store_state(self.id(), &self.state, LifecycleState::Stopped);
                return Ok(());
            }
            LifecycleState::Stopping => {}
            _ => {
                let _ = cas_state(&self.state, cur, LifecycleState::Stopping);
            }
        }
        let mut task_guard = self.task.lock().await;
        if let Some(mut handle) = task_guard.take() {
            tokio::select! {
                _ = time::sleep(STOP_GRACE) => {
                    handle.abort();
                }
                _ = &mut handle => {}
            }
        }
        drop(task_guard);
        let result = self.plugin.stop().await;
        store_state(self.id(), &self.state, LifecycleState::Stopped);
        result
    }

    pub fn validate_config(&self, values: ConfigValues) -> Validation {
        self.plugin.validate_config(values)
    }

    pub fn config_saved(&self, values: ConfigValues, cancelled: bool) {
        self.plugin.config_saved(values, cancelled);
    }

    pub fn device_start(&self, device: &Device) {
        self.plugin.device_start(device);
    }

    pub fn device_stop(&self, device: &Device) {
        self.plugin.device_stop(device);
    }

    pub fn validate_device_config(
        &self,
        values: ConfigValues,
        type_id: &str,
        device_id: &str,
    ) -> Validation {
        self.plugin.validate_device_config(values, type_id, device_id)
    }

    pub async fn handle_device_action(&self, action: DeviceAction, device: &Device) {
        self.plugin.handle_device_action(action, device).await;
    }
}

#[cfg(test)]
mod test {
    use async_trait::async_trait;

    use super::*;
    use crate::plugin::PluginInfo;

    struct IdlePlugin {
        info: PluginInfo,
    }

    impl IdlePlugin {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                info: PluginInfo {
                    id: "idle".to_string(),
                    display_name: "Idle".to_string(),
                    version: "0.0.0".to_string(),
                },
            })
        }
    }

    #[async_trait]
    impl Plugin for IdlePlugin {
        fn info(&self) -> &PluginInfo {
            &self.info
        }

        fn poll_interval(&self) -> Duration {
            Duration::from_secs(60)
        }
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let host = PluginHost::new(IdlePlugin::new());
        assert_eq!(host.state(), LifecycleState::New);

        host.start().await.unwrap();
        assert_eq!(host.state(), LifecycleState::Running);

        host.stop().await.unwrap();
        assert_eq!(host.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let host = PluginHost::new(IdlePlugin::new());
        host.start().await.unwrap();
        host.stop().await.unwrap();
        host.stop().await.unwrap();
        assert_eq!(host.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let host = PluginHost::new(IdlePlugin::new());
        host.stop().await.unwrap();
        assert_eq!(host.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let host = PluginHost::new(IdlePlugin::new());
        host.start().await.unwrap();
        host.stop().await.unwrap();
        host.start().await.unwrap();
        assert_eq!(host.state(), LifecycleState::Running);
        host.stop().await.unwrap();
    }
}
