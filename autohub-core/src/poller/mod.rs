use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, info, warn};

use crate::config::{
    self, ConfigValues, FieldErrors, MIN_UPDATE_FREQUENCY, Settings, Validation,
};
use crate::device::DeviceTable;
use crate::host::registry::DeviceRegistry;
use crate::host::{Device, DeviceAction, Identifiable};
use crate::plugin::{Plugin, PluginError, PluginInfo};

pub const KEY_ADDRESS: &str = "address";

/// The shipped plugin: tracks the devices the host starts under it and
/// refreshes their records on every poll. Construction is pure; the only
/// work it does is deriving the cached settings.
pub struct PollerPlugin {
    info: PluginInfo,
    settings: Settings,
    devices: DeviceTable,
    registry: Arc<DeviceRegistry>,
}

impl PollerPlugin {
    pub fn new(info: PluginInfo, prefs: &ConfigValues, registry: Arc<DeviceRegistry>) -> Self {
        let settings = Settings::from_values(prefs);
        if settings.debug() {
            debug!("[{}] debug logging enabled", info.id);
        }
        Self {
            info,
            settings,
            devices: DeviceTable::new(),
            registry,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn devices(&self) -> &DeviceTable {
        &self.devices
    }

    fn refresh_device(&self, id: &str) -> anyhow::Result<()> {
        let device = self
            .registry
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("device {id} is gone from the registry"))?;
        self.devices.touch(id, Local::now());
        if self.settings.debug() {
            debug!(
                "[{}] refreshed {} (on={})",
                self.info.id,
                device.name(),
                device.is_on()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for PollerPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    async fn start(&self) -> Result<(), PluginError> {
        info!(
            "[{}] {} {} started",
            self.info.id, self.info.display_name, self.info.version
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        info!("[{}] {} shutting down", self.info.id, self.info.display_name);
        Ok(())
    }

    /// Refresh every tracked device. Each device gets its own failure
    /// boundary so one bad device cannot end the sweep.
    async fn poll(&self) -> anyhow::Result<()> {
        for id in self.devices.ids() {
            if let Err(err) = self.refresh_device(&id) {
                warn!("[{}] failed to refresh {}: {:#}", self.info.id, id, err);
            }
        }
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        self.settings.poll_interval()
    }

    fn validate_config(&self, values: ConfigValues) -> Validation {
        let mut errors = FieldErrors::new();
        if let Some(raw) = values.get(config::KEY_UPDATE_FREQUENCY) {
            match config::parse_u64(raw) {
                None => errors.add(
                    config::KEY_UPDATE_FREQUENCY,
                    "Must be a whole number of seconds",
                ),
                Some(freq) if freq < MIN_UPDATE_FREQUENCY => errors.add(
                    config::KEY_UPDATE_FREQUENCY,
                    format!(
                        "Update frequency must be at least {} seconds",
                        MIN_UPDATE_FREQUENCY
                    ),
                ),
                Some(_) => {}
            }
        }
        Validation::with_errors(values, errors)
    }

    fn config_saved(&self, values: ConfigValues, cancelled: bool) {
        if cancelled {
            return;
        }
        self.settings.apply(&values);
        info!("[{}] configuration updated", self.info.id);
    }

    fn device_start(&self, device: &Device) {
        info!("[{}] starting device: {}", self.info.id, device.name());
        self.devices.insert(device.id());
    }

    fn device_stop(&self, device: &Device) {
        info!("[{}] stopping device: {}", self.info.id, device.name());
        self.devices.remove(&device.id());
    }

    fn validate_device_config(
        &self,
        values: ConfigValues,
        _type_id: &str,
        _device_id: &str,
    ) -> Validation {
        let mut errors = FieldErrors::new();
        let address = values
            .get(KEY_ADDRESS)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or_default();
        if address.is_empty() {
            errors.add(KEY_ADDRESS, "Device address is required");
        }
        Validation::with_errors(values, errors)
    }

    async fn handle_device_action(&self, action: DeviceAction, device: &Device) {
        match action {
            DeviceAction::TurnOn => {
                info!("[{}] turn on device: {}", self.info.id, device.name());
                device.set_on(true);
            }
            DeviceAction::TurnOff => {
                info!("[{}] turn off device: {}", self.info.id, device.name());
                device.set_on(false);
            }
            DeviceAction::Toggle => {
                let on = device.toggle();
                info!(
                    "[{}] toggle device: {} (now {})",
                    self.info.id,
                    device.name(),
                    if on { "on" } else { "off" }
                );
            }
        }
    }
}
