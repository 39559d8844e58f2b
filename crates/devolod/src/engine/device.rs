use serde::Serialize;

/// A device in the devolod system.
///
/// A device represents a physical or logical device that contains one or more entities.
/// Entities report the device they belong to; the engine keeps it next to their state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// (domain, identifier) pairs, e.g. ("devolo_home_control", "hdm:ZWave:CBC56091/24")
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_area: Option<String>,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identifiers: Vec::new(),
            name: name.into(),
            manufacturer: None,
            model: None,
            suggested_area: None,
        }
    }

    pub fn add_identifier(&mut self, domain: impl Into<String>, id: impl Into<String>) {
        let identifier = (domain.into(), id.into());
        if !self.identifiers.contains(&identifier) {
            self.identifiers.push(identifier);
        }
    }
}
