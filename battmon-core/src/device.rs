/*!
 * Device Records
 * Per-accessory state and the ordered collection that owns it
 */

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// One paired Bluetooth accessory as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    name: String,
    connected: bool,
    instance_id: String,
    battery_level: Option<u8>,
}

/// Structural fingerprint of a [`Device`].
///
/// Two states compare equal exactly when every field of the device they were
/// taken from is equal, so a polling loop can diff `Vec<DeviceState>` cheaply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceState {
    pub name: String,
    pub connected: bool,
    pub instance_id: String,
    pub battery_level: Option<u8>,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
            instance_id: String::new(),
            battery_level: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Whether the audio subsystem last reported this device as connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// OS instance identifier, empty until resolved.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn set_instance_id(&mut self, instance_id: impl Into<String>) {
        self.instance_id = instance_id.into();
    }

    pub fn has_instance_id(&self) -> bool {
        !self.instance_id.is_empty()
    }

    /// Last battery percentage read, `None` if never read.
    ///
    /// Disconnecting does not clear this value.
    pub fn battery_level(&self) -> Option<u8> {
        self.battery_level
    }

    pub fn set_battery_level(&mut self, level: u8) -> Result<(), DeviceError> {
        if level > 100 {
            return Err(DeviceError::BatteryOutOfRange(level));
        }
        self.battery_level = Some(level);
        Ok(())
    }

    pub fn state(&self) -> DeviceState {
        DeviceState {
            name: self.name.clone(),
            connected: self.connected,
            instance_id: self.instance_id.clone(),
            battery_level: self.battery_level,
        }
    }
}

/// Ordered, name-addressable set of devices.
///
/// Names are not guaranteed unique; lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceCollection {
    devices: Vec<Device>,
}

impl DeviceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, device: Device) {
        self.devices.push(device);
    }

    /// Removes and returns the first device called `name`.
    pub fn remove(&mut self, name: &str) -> Option<Device> {
        let index = self.position(name)?;
        Some(self.devices.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|device| device.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|device| device.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.devices.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Device> {
        self.devices.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn states(&self) -> Vec<DeviceState> {
        self.devices.iter().map(Device::state).collect()
    }

    pub(crate) fn by_index_mut(&mut self, index: usize) -> Option<&mut Device> {
        self.devices.get_mut(index)
    }
}

impl FromIterator<Device> for DeviceCollection {
    fn from_iter<I: IntoIterator<Item = Device>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DeviceCollection {
    type Item = &'a Device;
    type IntoIter = std::slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

impl IntoIterator for DeviceCollection {
    type Item = Device;
    type IntoIter = std::vec::IntoIter<Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.into_iter()
    }
}
