//! In-memory device table.

use parking_lot::RwLock;

use super::{DeviceAddr, DeviceError, DeviceSource};

/// A [`DeviceSource`] serving a fixed, editable table of devices.
///
/// Used by tests and benches; devices keep their insertion order.
#[derive(Debug, Default)]
pub struct StaticDevices {
    devices: RwLock<Vec<(String, Vec<DeviceAddr>)>>,
}

impl StaticDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set_device`](Self::set_device).
    pub fn with_device(self, name: &str, addrs: Vec<DeviceAddr>) -> Self {
        self.set_device(name, addrs);
        self
    }

    /// Add a device or replace the addresses of an existing one.
    pub fn set_device(&self, name: &str, addrs: Vec<DeviceAddr>) {
        let mut devices = self.devices.write();
        match devices.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = addrs,
            None => devices.push((name.to_string(), addrs)),
        }
    }

    /// Remove a device from the table.
    pub fn remove_device(&self, name: &str) {
        self.devices.write().retain(|(n, _)| n != name);
    }

    /// Names of all devices, in insertion order.
    pub fn device_names(&self) -> Vec<String> {
        self.devices.read().iter().map(|(n, _)| n.clone()).collect()
    }
}

impl DeviceSource for StaticDevices {
    async fn addresses(&self, device: Option<&str>) -> Result<Vec<DeviceAddr>, DeviceError> {
        let devices = self.devices.read();
        match device {
            Some(name) => devices
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, addrs)| addrs.clone())
                .ok_or_else(|| DeviceError::DeviceNotFound(name.to_string())),
            None => Ok(devices
                .iter()
                .flat_map(|(_, addrs)| addrs.iter().copied())
                .collect()),
        }
    }
}
