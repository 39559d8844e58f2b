use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::binary_sensor::BinarySensorDeviceClass;
use super::binary_sensor::PLATFORM as BINARY_SENSOR_PLATFORM;
use super::device::DeviceInfo;

/// State of a binary sensor entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BinarySensorState {
    /// Whether the sensor is active (meaning depends on device class:
    /// motion detected, door open, smoke detected, etc.)
    pub on: bool,

    /// Standard classification, absent for generic sensors
    pub device_class: Option<BinarySensorDeviceClass>,
}

/// Snapshot of a single registered entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub entity_id: String,
    pub unique_id: String,
    pub platform: String,
    pub name: String,
    pub available: bool,
    pub should_poll: bool,

    /// Platform specific state as produced by `Entity::state_json`
    pub state: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
}

impl EntityState {
    /// Decode the platform state of a binary sensor.
    ///
    /// Returns `None` for entities of other platforms.
    pub fn binary_sensor(&self) -> Option<BinarySensorState> {
        if self.platform != BINARY_SENSOR_PLATFORM {
            return None;
        }
        serde_json::from_value(self.state.clone()).ok()
    }
}

/// Centralized snapshot of the entire engine state, keyed by entity id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub entities: BTreeMap<String, EntityState>,
}

impl State {
    pub fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.entities.get(entity_id)
    }

    pub fn binary_sensors(&self) -> impl Iterator<Item = (&str, BinarySensorState)> {
        self.entities
            .iter()
            .filter_map(|(id, entity)| Some((id.as_str(), entity.binary_sensor()?)))
    }
}
