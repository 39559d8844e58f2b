//! devolo binary sensors: door/window contacts, motion sensors and the
//! smoke, water and heat alarms.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;

use super::devolo_device::DevoloDeviceEntity;
use super::home_control::BINARY_SENSOR_PREFIX;
use super::home_control::BinarySensorProperty;
use super::home_control::DEVICE_PREFIX;
use super::home_control::Device;
use super::home_control::HomeControl;
use super::home_control::Message;
use crate::engine::AddEntities;
use crate::engine::BinarySensorDeviceClass;
use crate::engine::BinarySensorEntity;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::SharedEntity;
use crate::engine::UpdateScheduler;
use crate::engine::binary_sensor::PLATFORM;

/// Vendor sub type (or sensor type) -> device class
pub const DEVICE_CLASS_MAPPING: &[(&str, BinarySensorDeviceClass)] = &[
    ("Water alarm", BinarySensorDeviceClass::Moisture),
    ("Home Security", BinarySensorDeviceClass::Motion),
    ("Smoke Alarm", BinarySensorDeviceClass::Smoke),
    ("Heat Alarm", BinarySensorDeviceClass::Heat),
    ("door", BinarySensorDeviceClass::Door),
];

/// Look up the device class for a vendor type string. Unmapped strings have no class.
pub fn device_class_for(vendor_type: &str) -> Option<BinarySensorDeviceClass> {
    DEVICE_CLASS_MAPPING
        .iter()
        .find(|(name, _)| *name == vendor_type)
        .map(|(_, class)| *class)
}

/// The sub type if set, otherwise the sensor type
fn effective_subtype(property: &BinarySensorProperty) -> &str {
    if property.sub_type.is_empty() {
        &property.sensor_type
    } else {
        &property.sub_type
    }
}

pub type SharedBinarySensor = Arc<Mutex<DevoloBinaryDeviceEntity>>;

/// Create one entity per binary sensor property and hand them to the engine.
///
/// The batch is registered even when empty. Initial states come from the gateway
/// data captured at construction, so no update is requested before adding.
pub async fn async_setup_entry(
    home_control: &Arc<dyn HomeControl>,
    add_entities: &AddEntities,
) -> Vec<SharedBinarySensor> {
    let mut entities = Vec::new();

    for device in home_control.binary_sensor_devices() {
        for property in device.binary_sensor_property.values() {
            entities.push(Arc::new(Mutex::new(DevoloBinaryDeviceEntity::new(
                home_control.clone(),
                &device,
                property,
            ))));
        }
    }

    debug!("Found {} devolo binary sensors", entities.len());
    add_entities
        .add(
            entities
                .iter()
                .map(|entity| entity.clone() as SharedEntity)
                .collect(),
            false,
        )
        .await;

    entities
}

/// Representation of a binary sensor within devolo Home Control
pub struct DevoloBinaryDeviceEntity {
    base: DevoloDeviceEntity,
    state: bool,
    device_class: Option<BinarySensorDeviceClass>,
}

impl DevoloBinaryDeviceEntity {
    pub fn new(
        home_control: Arc<dyn HomeControl>,
        device: &Device,
        property: &BinarySensorProperty,
    ) -> Self {
        let subtype = effective_subtype(property);
        let name = format!("{} {}", device.item_name, subtype);

        Self {
            device_class: device_class_for(subtype),
            state: property.state,
            base: DevoloDeviceEntity::new(home_control, device, &property.element_uid, name),
        }
    }

    pub fn base(&self) -> &DevoloDeviceEntity {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut DevoloDeviceEntity {
        &mut self.base
    }

    /// Handle a message the gateway pushed for this entity's device.
    ///
    /// Binary sensor messages refresh the cached state, device messages refresh
    /// availability. Anything else is ignored. The engine is asked to re-read
    /// the entity in every case.
    pub fn sync(&mut self, message: &Message) {
        let key = message.key();
        if key.starts_with(BINARY_SENSOR_PREFIX) {
            if key == self.base.unique_id() {
                self.refresh_state();
            } else {
                debug!(
                    "{} ignoring message for sibling sensor {}",
                    self.base.unique_id(),
                    key
                );
            }
        } else if key.starts_with(DEVICE_PREFIX) {
            self.base.refresh_available();
        } else {
            debug!("No valid message received: {}", message);
        }
        self.base.schedule_update();
    }

    fn refresh_state(&mut self) {
        let property = self
            .base
            .home_control()
            .binary_sensor_property(self.base.device_uid(), self.base.unique_id());
        match property {
            Some(property) => self.state = property.state,
            None => warn!(
                "Binary sensor {} is unknown to the gateway, keeping last state",
                self.base.unique_id()
            ),
        }
    }
}

impl Entity for DevoloBinaryDeviceEntity {
    fn unique_id(&self) -> &str {
        self.base.unique_id()
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn available(&self) -> bool {
        self.base.available()
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(self.base.device_info().clone())
    }

    fn state_json(&self) -> serde_json::Value {
        serde_json::json!({
            "on": self.is_on(),
            "device_class": self.device_class(),
        })
    }

    fn update(&mut self) {
        self.refresh_state();
        self.base.refresh_available();
    }

    fn added_to_engine(&mut self, scheduler: UpdateScheduler) {
        self.base.attach(scheduler);
    }
}

impl BinarySensorEntity for DevoloBinaryDeviceEntity {
    fn is_on(&self) -> bool {
        self.state
    }

    fn device_class(&self) -> Option<BinarySensorDeviceClass> {
        self.device_class
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::Engine;
    use crate::engine::FromIntegrationMessage;
    use crate::integrations::devolo::home_control::StaticHomeControl;
    use crate::integrations::devolo::home_control::fixtures::*;

    fn home_control(properties: Vec<BinarySensorProperty>) -> Arc<StaticHomeControl> {
        Arc::new(
            StaticHomeControl::new(
                "gw",
                vec![device("hdm_device_1", "Front door", properties)],
            )
            .unwrap(),
        )
    }

    fn entity(hc: &Arc<StaticHomeControl>, element_uid: &str) -> DevoloBinaryDeviceEntity {
        let device = hc
            .binary_sensor_devices()
            .into_iter()
            .find(|d| d.binary_sensor_property.contains_key(element_uid))
            .unwrap();
        let property = device.binary_sensor_property[element_uid].clone();
        DevoloBinaryDeviceEntity::new(hc.clone(), &device, &property)
    }

    #[test]
    fn test_device_class_mapping() {
        assert_eq!(
            device_class_for("Water alarm"),
            Some(BinarySensorDeviceClass::Moisture)
        );
        assert_eq!(
            device_class_for("Home Security"),
            Some(BinarySensorDeviceClass::Motion)
        );
        assert_eq!(
            device_class_for("Smoke Alarm"),
            Some(BinarySensorDeviceClass::Smoke)
        );
        assert_eq!(
            device_class_for("Heat Alarm"),
            Some(BinarySensorDeviceClass::Heat)
        );
        assert_eq!(device_class_for("door"), Some(BinarySensorDeviceClass::Door));
        assert_eq!(device_class_for("Door"), None);
        assert_eq!(device_class_for("overload"), None);
        assert_eq!(device_class_for(""), None);
    }

    #[test]
    fn test_name_uses_sensor_type_without_sub_type() {
        let hc = home_control(vec![property("devolo.BinarySensor_door_1", "", "door", false)]);
        let sensor = entity(&hc, "devolo.BinarySensor_door_1");
        assert_eq!(sensor.name(), "Front door door");
        assert_eq!(sensor.device_class(), Some(BinarySensorDeviceClass::Door));
        assert!(!sensor.should_poll());
    }

    #[test]
    fn test_name_prefers_sub_type() {
        let hc = home_control(vec![property(
            "devolo.BinarySensor_alarm_1",
            "Smoke Alarm",
            "alarm",
            true,
        )]);
        let sensor = entity(&hc, "devolo.BinarySensor_alarm_1");
        assert_eq!(sensor.name(), "Front door Smoke Alarm");
        assert_eq!(sensor.device_class(), Some(BinarySensorDeviceClass::Smoke));
        assert!(sensor.is_on());
    }

    #[test]
    fn test_unmapped_type_has_no_class() {
        let hc = home_control(vec![property("devolo.BinarySensor_x", "", "overload", false)]);
        let sensor = entity(&hc, "devolo.BinarySensor_x");
        assert_eq!(sensor.device_class(), None);
    }

    #[test]
    fn test_sync_binary_sensor_message_rereads_state() {
        let hc = home_control(vec![property("devolo.BinarySensor_door_1", "", "door", false)]);
        let mut sensor = entity(&hc, "devolo.BinarySensor_door_1");
        assert!(!sensor.is_on());

        hc.update_binary_sensor("devolo.BinarySensor_door_1", true)
            .unwrap();
        let message = Message::new("devolo.BinarySensor_door_1", true);
        sensor.sync(&message);
        assert!(sensor.is_on());

        // Same message again, same result
        sensor.sync(&message);
        assert!(sensor.is_on());
    }

    #[test]
    fn test_sync_device_message_updates_availability_only() {
        let hc = home_control(vec![property("devolo.BinarySensor_door_1", "", "door", true)]);
        let mut sensor = entity(&hc, "devolo.BinarySensor_door_1");

        hc.set_device_online("hdm_device_1", false).unwrap();
        sensor.sync(&Message::new("hdm_device_1", false));

        assert!(!sensor.available());
        assert!(sensor.is_on());
    }

    #[test]
    fn test_sync_unknown_message_changes_nothing() {
        let hc = home_control(vec![property("devolo.BinarySensor_door_1", "", "door", false)]);
        let mut sensor = entity(&hc, "devolo.BinarySensor_door_1");

        sensor.sync(&Message::new("unknown_prefix_x", true));

        assert!(!sensor.is_on());
        assert!(sensor.available());
    }

    #[test]
    fn test_sync_ignores_sibling_sensor() {
        let hc = home_control(vec![
            property("devolo.BinarySensor_alarm_1", "Smoke Alarm", "alarm", false),
            property("devolo.BinarySensor_alarm_2", "Heat Alarm", "alarm", false),
        ]);
        let mut smoke = entity(&hc, "devolo.BinarySensor_alarm_1");

        hc.update_binary_sensor("devolo.BinarySensor_alarm_2", true)
            .unwrap();
        smoke.sync(&Message::new("devolo.BinarySensor_alarm_2", true));

        assert!(!smoke.is_on());
    }

    #[test]
    fn test_state_json() {
        let hc = home_control(vec![property("devolo.BinarySensor_door_1", "", "door", true)]);
        let sensor = entity(&hc, "devolo.BinarySensor_door_1");

        insta::assert_json_snapshot!(sensor.state_json(), @r#"
        {
          "device_class": "door",
          "on": true
        }
        "#);
    }

    #[tokio::test]
    async fn test_sync_schedules_update_in_every_branch() {
        let hc = home_control(vec![property("devolo.BinarySensor_door_1", "", "door", false)]);
        let home_control: Arc<dyn HomeControl> = hc.clone();
        let (tx, mut rx) = mpsc::channel(8);
        let add_entities = AddEntities::new("devolo", tx);

        let entities = async_setup_entry(&home_control, &add_entities).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(FromIntegrationMessage::EntitiesAdded { .. })
        ));

        {
            let mut sensor = entities[0].lock().await;
            sensor.sync(&Message::new("devolo.BinarySensor_door_1", true));
            sensor.sync(&Message::new("hdm_device_1", true));
            sensor.sync(&Message::new("unknown_prefix_x", true));
        }

        for _ in 0..3 {
            match rx.try_recv() {
                Ok(FromIntegrationMessage::StateUpdateScheduled { unique_id }) => {
                    assert_eq!(unique_id, "devolo.BinarySensor_door_1");
                }
                other => panic!("expected StateUpdateScheduled, got {:?}", other),
            }
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unresolvable_sensor_keeps_last_state() {
        let hc = home_control(vec![property("devolo.BinarySensor_door_1", "", "door", false)]);
        let device = device(
            "hdm_device_1",
            "Front door",
            vec![property("devolo.BinarySensor_gone", "", "door", true)],
        );
        let mut sensor = DevoloBinaryDeviceEntity::new(
            hc.clone(),
            &device,
            &device.binary_sensor_property["devolo.BinarySensor_gone"],
        );
        assert!(sensor.is_on());

        sensor.sync(&Message::new("devolo.BinarySensor_gone", false));
        assert!(sensor.is_on());

        sensor.update();
        assert!(sensor.is_on());
        assert!(sensor.available());
    }

    #[tokio::test]
    async fn test_setup_entry_creates_one_entity_per_property() {
        let hc = Arc::new(
            StaticHomeControl::new(
                "gw",
                vec![
                    device(
                        "hdm_device_1",
                        "Kitchen",
                        vec![
                            property("devolo.BinarySensor_alarm_1", "Smoke Alarm", "alarm", false),
                            property("devolo.BinarySensor_alarm_2", "Heat Alarm", "alarm", false),
                        ],
                    ),
                    device(
                        "hdm_device_2",
                        "Cellar",
                        vec![property("devolo.BinarySensor_water_1", "Water alarm", "alarm", true)],
                    ),
                ],
            )
            .unwrap(),
        );
        let home_control: Arc<dyn HomeControl> = hc;
        let engine = Engine::new();
        let add_entities = AddEntities::new("devolo", engine.sender());

        let entities = async_setup_entry(&home_control, &add_entities).await;
        assert_eq!(entities.len(), 3);
        engine.process_next().await;

        let state = engine.state_snapshot();
        let classes: Vec<_> = state
            .binary_sensors()
            .map(|(id, s)| (id.to_string(), s.device_class))
            .collect();
        assert_eq!(
            classes,
            vec![
                (
                    "binary_sensor.cellar_water_alarm".to_string(),
                    Some(BinarySensorDeviceClass::Moisture)
                ),
                (
                    "binary_sensor.kitchen_heat_alarm".to_string(),
                    Some(BinarySensorDeviceClass::Heat)
                ),
                (
                    "binary_sensor.kitchen_smoke_alarm".to_string(),
                    Some(BinarySensorDeviceClass::Smoke)
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_setup_entry_without_devices_registers_empty_batch() {
        let home_control: Arc<dyn HomeControl> =
            Arc::new(StaticHomeControl::new("gw", Vec::new()).unwrap());
        let (tx, mut rx) = mpsc::channel(8);
        let add_entities = AddEntities::new("devolo", tx);

        let entities = async_setup_entry(&home_control, &add_entities).await;
        assert!(entities.is_empty());

        match rx.recv().await {
            Some(FromIntegrationMessage::EntitiesAdded {
                integration_name,
                entities,
                update_before_add,
            }) => {
                assert_eq!(integration_name, "devolo");
                assert!(entities.is_empty());
                assert!(!update_before_add);
            }
            other => panic!("expected EntitiesAdded, got {:?}", other),
        }
    }
}
