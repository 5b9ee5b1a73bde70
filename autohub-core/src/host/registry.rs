use std::sync::Arc;

use dashmap::DashMap;

use crate::host::{Device, Identifiable};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("device {0} is already attached")]
    AlreadyAttached(String),
}

/// The host's registry of currently active devices, shared with the plugin
/// read-only through `get`/`snapshot`.
pub struct DeviceRegistry {
    devices: DashMap<String, Arc<Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::with_capacity(16)
    }

    pub fn with_capacity(dev_len: usize) -> Self {
        Self {
            devices: DashMap::with_capacity(dev_len),
        }
    }

    pub fn attach(&self, device: Arc<Device>) -> Result<(), RegistryError> {
        use dashmap::mapref::entry::Entry as DashEntry;
        match self.devices.entry(device.id()) {
            DashEntry::Vacant(v) => {
                v.insert(device);
                Ok(())
            }
            DashEntry::Occupied(_) => Err(RegistryError::AlreadyAttached(device.id())),
        }
    }

    pub fn detach(&self, dev: &impl Identifiable) -> Option<Arc<Device>> {
        self.devices.remove(&dev.id()).map(|(_, d)| d)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Device>> {
        self.devices.get(id).map(|d| Arc::clone(&d))
    }

    pub fn snapshot(&self) -> Vec<Arc<Device>> {
        self.devices.iter().map(|d| Arc::clone(&d)).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_attach_get_detach() {
        let registry = DeviceRegistry::new();
        let dev = Arc::new(Device::new("relay-1", "Pump Relay", "relay", false));
        assert!(registry.get("relay-1").is_none());

        registry.attach(Arc::clone(&dev)).unwrap();
        let found = registry.get("relay-1").unwrap();
        assert_eq!(found.name(), "Pump Relay");

        let detached = registry.detach(dev.as_ref());
        assert!(detached.is_some());
        assert!(registry.get("relay-1").is_none());
    }

    #[test]
    fn test_attach_twice_is_rejected() {
        let registry = DeviceRegistry::new();
        let dev = Arc::new(Device::new("relay-1", "Pump Relay", "relay", false));
        registry.attach(Arc::clone(&dev)).unwrap();
        assert!(matches!(
            registry.attach(dev),
            Err(RegistryError::AlreadyAttached(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_lists_all_attached() {
        let registry = DeviceRegistry::new();
        registry
            .attach(Arc::new(Device::new("a", "A", "relay", false)))
            .unwrap();
        registry
            .attach(Arc::new(Device::new("b", "B", "relay", true)))
            .unwrap();
        assert_eq!(registry.snapshot().len(), 2);
    }
}
