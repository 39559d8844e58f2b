//! Model of the devolo Home Control gateway connection.
//!
//! The gateway owns the authoritative device data. Entities keep an
//! `Arc<dyn HomeControl>` to re-read it whenever the publisher tells them
//! something changed.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::PoisonError;
use std::sync::RwLock;

use tracing::debug;

use super::config::Config;
use super::publisher::Publisher;

/// Prefix of element UIDs belonging to binary sensor properties
pub const BINARY_SENSOR_PREFIX: &str = "devolo.BinarySensor";

/// Prefix of device UIDs (home device manager)
pub const DEVICE_PREFIX: &str = "hdm";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HomeControlError {
    #[error("Duplicate device uid: {0}")]
    DuplicateDevice(String),

    #[error("Duplicate element uid: {0}")]
    DuplicateElement(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Unknown binary sensor: {0}")]
    UnknownBinarySensor(String),
}

/// Binary sensor property of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySensorProperty {
    pub element_uid: String,
    pub sub_type: String,
    pub sensor_type: String,
    pub state: bool,
}

/// A device as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub uid: String,
    pub item_name: String,
    pub brand: String,
    pub name: String,
    pub zone: Option<String>,
    pub online: bool,
    /// Element UID -> property
    pub binary_sensor_property: BTreeMap<String, BinarySensorProperty>,
}

impl Device {
    pub fn is_online(&self) -> bool {
        self.online
    }
}

/// Push notification from the gateway.
///
/// `uid` is either an element UID (a property changed) or a device UID
/// (the device itself changed, e.g. went offline).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub uid: String,
    pub value: serde_json::Value,
}

impl Message {
    pub fn new(uid: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            uid: uid.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.uid
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.uid, self.value)
    }
}

/// Connection to a devolo Home Control gateway
pub trait HomeControl: Send + Sync {
    /// Devices exposing at least one binary sensor property
    fn binary_sensor_devices(&self) -> Vec<Device>;

    /// Current data of a binary sensor property
    fn binary_sensor_property(
        &self,
        device_uid: &str,
        element_uid: &str,
    ) -> Option<BinarySensorProperty>;

    /// Whether the gateway reaches the device. Unknown devices are offline.
    fn is_online(&self, device_uid: &str) -> bool;

    /// Subscription hub for push notifications, keyed by device UID
    fn publisher(&self) -> &Publisher;
}

/// Gateway connection backed by a fixed device inventory.
///
/// Pushed changes are written to the inventory before subscribers are notified,
/// so a subscriber re-reading the gateway always sees the new value.
pub struct StaticHomeControl {
    gateway_id: String,
    devices: RwLock<Vec<Device>>,
    publisher: Publisher,
}

impl StaticHomeControl {
    pub fn new(
        gateway_id: impl Into<String>,
        devices: Vec<Device>,
    ) -> Result<Self, HomeControlError> {
        let mut device_uids = HashSet::new();
        let mut element_uids = HashSet::new();
        for device in &devices {
            if !device_uids.insert(device.uid.clone()) {
                return Err(HomeControlError::DuplicateDevice(device.uid.clone()));
            }
            for element_uid in device.binary_sensor_property.keys() {
                if !element_uids.insert(element_uid.clone()) {
                    return Err(HomeControlError::DuplicateElement(element_uid.clone()));
                }
            }
        }

        let publisher = Publisher::new(devices.iter().map(|d| d.uid.clone()));
        Ok(Self {
            gateway_id: gateway_id.into(),
            devices: RwLock::new(devices),
            publisher,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, HomeControlError> {
        let devices = config
            .devices
            .iter()
            .map(|device| {
                let mut binary_sensor_property = BTreeMap::new();
                for sensor in &device.binary_sensors {
                    let property = BinarySensorProperty {
                        element_uid: sensor.element_uid.clone(),
                        sub_type: sensor.sub_type.clone(),
                        sensor_type: sensor.sensor_type.clone(),
                        state: sensor.state,
                    };
                    if binary_sensor_property
                        .insert(sensor.element_uid.clone(), property)
                        .is_some()
                    {
                        return Err(HomeControlError::DuplicateElement(
                            sensor.element_uid.clone(),
                        ));
                    }
                }
                Ok(Device {
                    uid: device.uid.clone(),
                    item_name: device.item_name.clone(),
                    brand: device.brand.clone(),
                    name: device.name.clone(),
                    zone: device.zone.clone(),
                    online: device.online,
                    binary_sensor_property,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(config.gateway_id.clone(), devices)
    }

    pub fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    /// Record a new sensor state and notify the device's subscribers
    pub fn update_binary_sensor(
        &self,
        element_uid: &str,
        state: bool,
    ) -> Result<(), HomeControlError> {
        let device_uid = {
            let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
            let (device_uid, property) = devices
                .iter_mut()
                .find_map(|device| {
                    let uid = device.uid.clone();
                    device
                        .binary_sensor_property
                        .get_mut(element_uid)
                        .map(|property| (uid, property))
                })
                .ok_or_else(|| HomeControlError::UnknownBinarySensor(element_uid.to_string()))?;
            property.state = state;
            device_uid
        };

        debug!("Binary sensor {} on {} -> {}", element_uid, device_uid, state);
        self.publisher
            .dispatch(&device_uid, Message::new(element_uid, state));
        Ok(())
    }

    /// Record a device going on- or offline and notify its subscribers
    pub fn set_device_online(&self, device_uid: &str, online: bool) -> Result<(), HomeControlError> {
        {
            let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
            let device = devices
                .iter_mut()
                .find(|device| device.uid == device_uid)
                .ok_or_else(|| HomeControlError::UnknownDevice(device_uid.to_string()))?;
            device.online = online;
        }

        debug!("Device {} online -> {}", device_uid, online);
        self.publisher
            .dispatch(device_uid, Message::new(device_uid, online));
        Ok(())
    }
}

impl HomeControl for StaticHomeControl {
    fn binary_sensor_devices(&self) -> Vec<Device> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|device| !device.binary_sensor_property.is_empty())
            .cloned()
            .collect()
    }

    fn binary_sensor_property(
        &self,
        device_uid: &str,
        element_uid: &str,
    ) -> Option<BinarySensorProperty> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|device| device.uid == device_uid)
            .and_then(|device| device.binary_sensor_property.get(element_uid))
            .cloned()
    }

    fn is_online(&self, device_uid: &str) -> bool {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|device| device.uid == device_uid)
            .is_some_and(Device::is_online)
    }

    fn publisher(&self) -> &Publisher {
        &self.publisher
    }
}


#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::fixtures::*;
    use super::*;
    use crate::integrations::devolo::config::BinarySensorConfig;
    use crate::integrations::devolo::config::DeviceConfig;
    use crate::integrations::devolo::publisher::Subscriber;

    fn home_control() -> StaticHomeControl {
        StaticHomeControl::new(
            "1409301750000598",
            vec![
                device(
                    "hdm_device_1",
                    "Front door",
                    vec![property("devolo.BinarySensor_door_1", "", "door", false)],
                ),
                device("hdm_device_2", "Wall plug", vec![]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_binary_sensor_devices_skips_devices_without_sensors() {
        let hc = home_control();
        let devices = hc.binary_sensor_devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].uid, "hdm_device_1");
    }

    #[test]
    fn test_duplicate_uids_rejected() {
        let result = StaticHomeControl::new(
            "gw",
            vec![
                device("hdm_a", "A", vec![property("devolo.BinarySensor_x", "", "door", false)]),
                device("hdm_b", "B", vec![property("devolo.BinarySensor_x", "", "door", false)]),
            ],
        );
        assert_eq!(
            result.err(),
            Some(HomeControlError::DuplicateElement(
                "devolo.BinarySensor_x".to_string()
            ))
        );

        let result = StaticHomeControl::new(
            "gw",
            vec![device("hdm_a", "A", vec![]), device("hdm_a", "B", vec![])],
        );
        assert_eq!(
            result.err(),
            Some(HomeControlError::DuplicateDevice("hdm_a".to_string()))
        );
    }

    #[test]
    fn test_update_binary_sensor_writes_then_dispatches() {
        let hc = home_control();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hc.publisher().register(
            "hdm_device_1",
            Subscriber::new("devolo.BinarySensor_door_1", tx),
        );

        hc.update_binary_sensor("devolo.BinarySensor_door_1", true)
            .unwrap();

        let property = hc
            .binary_sensor_property("hdm_device_1", "devolo.BinarySensor_door_1")
            .unwrap();
        assert!(property.state);

        let notification = rx.try_recv().unwrap();
        assert_eq!(
            notification.message,
            Message::new("devolo.BinarySensor_door_1", true)
        );
    }

    #[test]
    fn test_update_unknown_binary_sensor() {
        let hc = home_control();
        assert_eq!(
            hc.update_binary_sensor("devolo.BinarySensor_nope", true),
            Err(HomeControlError::UnknownBinarySensor(
                "devolo.BinarySensor_nope".to_string()
            ))
        );
    }

    #[test]
    fn test_set_device_online() {
        let hc = home_control();
        assert!(hc.is_online("hdm_device_1"));
        hc.set_device_online("hdm_device_1", false).unwrap();
        assert!(!hc.is_online("hdm_device_1"));
        assert!(!hc.is_online("hdm_unknown"));
        assert!(hc.set_device_online("hdm_unknown", true).is_err());
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            gateway_id: "gw".to_string(),
            devices: vec![DeviceConfig {
                uid: "hdm:ZWave:CBC56091/24".to_string(),
                item_name: "Kitchen".to_string(),
                brand: "devolo".to_string(),
                name: "Smoke Detector".to_string(),
                zone: None,
                online: false,
                binary_sensors: vec![BinarySensorConfig {
                    element_uid: "devolo.BinarySensor:hdm:ZWave:CBC56091/24".to_string(),
                    sub_type: "Smoke Alarm".to_string(),
                    sensor_type: "alarm".to_string(),
                    state: true,
                }],
            }],
        };

        let hc = StaticHomeControl::from_config(&config).unwrap();
        assert_eq!(hc.gateway_id(), "gw");
        assert!(!hc.is_online("hdm:ZWave:CBC56091/24"));
        let property = hc
            .binary_sensor_property(
                "hdm:ZWave:CBC56091/24",
                "devolo.BinarySensor:hdm:ZWave:CBC56091/24",
            )
            .unwrap();
        assert_eq!(property.sub_type, "Smoke Alarm");
        assert!(property.state);
    }

    #[test]
    fn test_message_display() {
        let message = Message::new("hdm_device_1", false);
        assert_eq!(message.key(), "hdm_device_1");
        assert_eq!(message.to_string(), "(hdm_device_1, false)");
    }
}
