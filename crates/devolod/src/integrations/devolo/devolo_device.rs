use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use super::home_control::Device;
use super::home_control::HomeControl;
use super::publisher::Notification;
use super::publisher::Subscriber;
use crate::engine::DeviceInfo;
use crate::engine::UpdateScheduler;

/// Device domain used in device identifiers
pub const DOMAIN: &str = "devolo_home_control";

/// Fields and behavior shared by every devolo entity.
///
/// Platform entities embed this and delegate the common `Entity` accessors to it.
pub struct DevoloDeviceEntity {
    home_control: Arc<dyn HomeControl>,
    device_uid: String,
    unique_id: String,
    name: String,
    available: bool,
    device_info: DeviceInfo,
    scheduler: Option<UpdateScheduler>,
    subscribed: bool,
}

impl DevoloDeviceEntity {
    pub fn new(
        home_control: Arc<dyn HomeControl>,
        device: &Device,
        element_uid: &str,
        name: String,
    ) -> Self {
        let mut device_info = DeviceInfo::new(device.item_name.clone());
        device_info.add_identifier(DOMAIN, device.uid.clone());
        device_info.manufacturer = Some(device.brand.clone());
        device_info.model = Some(device.name.clone()).filter(|m| !m.is_empty());
        device_info.suggested_area = device.zone.clone();

        Self {
            home_control,
            device_uid: device.uid.clone(),
            unique_id: element_uid.to_string(),
            name,
            available: device.is_online(),
            device_info,
            scheduler: None,
            subscribed: false,
        }
    }

    pub fn home_control(&self) -> &dyn HomeControl {
        self.home_control.as_ref()
    }

    pub fn device_uid(&self) -> &str {
        &self.device_uid
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Re-read the device's online flag from the gateway
    pub fn refresh_available(&mut self) {
        self.available = self.home_control.is_online(&self.device_uid);
    }

    pub fn attach(&mut self, scheduler: UpdateScheduler) {
        self.scheduler = Some(scheduler);
    }

    /// Ask the engine to re-read this entity; a no-op until the entity is added
    pub fn schedule_update(&self) {
        match &self.scheduler {
            Some(scheduler) => scheduler.schedule_update(),
            None => debug!("{} not added yet, skipping state update", self.unique_id),
        }
    }

    /// Start receiving the device's messages on `tx`
    pub fn subscribe(&mut self, tx: mpsc::UnboundedSender<Notification>) {
        self.home_control
            .publisher()
            .register(&self.device_uid, Subscriber::new(self.unique_id.clone(), tx));
        self.subscribed = true;
    }

    pub fn unsubscribe(&mut self) {
        if self.subscribed {
            self.home_control
                .publisher()
                .unregister(&self.device_uid, &self.unique_id);
            self.subscribed = false;
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}
