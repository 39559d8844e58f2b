use serde::Deserialize;
use serde::Serialize;
use strum::AsRefStr;
use strum::Display;
use strum::EnumString;

use super::entity::Entity;
use super::state::BinarySensorState;

/// Platform name used for entity ids and state snapshots
pub const PLATFORM: &str = "binary_sensor";

/// Device class for binary sensors, matching Home Assistant's binary_sensor device classes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BinarySensorDeviceClass {
    Battery,
    BatteryCharging,
    CarbonMonoxide,
    Cold,
    Connectivity,
    Door,
    GarageDoor,
    Gas,
    Heat,
    Light,
    Lock,
    Moisture,
    Motion,
    Moving,
    Occupancy,
    Opening,
    Plug,
    Power,
    Presence,
    Problem,
    Running,
    Safety,
    Smoke,
    Sound,
    Tamper,
    Update,
    Vibration,
    Window,
}

/// Accessors the engine reads from every binary sensor.
pub trait BinarySensorEntity: Entity {
    fn is_on(&self) -> bool;

    fn device_class(&self) -> Option<BinarySensorDeviceClass>;

    /// State JSON shared by all binary sensor implementations
    fn binary_sensor_state(&self) -> BinarySensorState {
        BinarySensorState {
            on: self.is_on(),
            device_class: self.device_class(),
        }
    }
}
