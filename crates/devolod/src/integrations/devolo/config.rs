use serde::Deserialize;

fn default_brand() -> String {
    "devolo".to_string()
}

fn default_online() -> bool {
    true
}

/// Configuration for the devolo Home Control integration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Serial number of the Central Unit
    pub gateway_id: String,

    /// Device inventory served by the gateway
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// A Z-Wave device known to the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Device UID, e.g. "hdm:ZWave:CBC56091/24"
    pub uid: String,

    /// Name the user gave the device in the devolo app
    pub item_name: String,

    /// Manufacturer shown as device info (default: "devolo")
    #[serde(default = "default_brand")]
    pub brand: String,

    /// Product name
    #[serde(default)]
    pub name: String,

    /// Room the device is assigned to
    pub zone: Option<String>,

    /// Whether the gateway currently reaches the device (default: true)
    #[serde(default = "default_online")]
    pub online: bool,

    #[serde(default)]
    pub binary_sensors: Vec<BinarySensorConfig>,
}

/// One binary sensor property of a device
#[derive(Debug, Clone, Deserialize)]
pub struct BinarySensorConfig {
    /// Element UID, e.g. "devolo.BinarySensor:hdm:ZWave:CBC56091/24"
    pub element_uid: String,

    /// Alarm category such as "Smoke Alarm", empty for plain sensors
    #[serde(default)]
    pub sub_type: String,

    /// Sensor type such as "door" or "alarm"
    #[serde(default)]
    pub sensor_type: String,

    /// Last known state
    #[serde(default)]
    pub state: bool,
}
