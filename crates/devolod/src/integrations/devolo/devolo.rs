use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::binary_sensor;
use super::binary_sensor::SharedBinarySensor;
use super::home_control::HomeControl;
use super::publisher::Notification;
use crate::engine::AddEntities;
use crate::engine::BinarySensorEntity;
use crate::engine::Entity;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;

/// Type alias for the shared binary sensors map, keyed by unique id
type BinarySensorsMap = Arc<Mutex<HashMap<String, SharedBinarySensor>>>;

/// devolo Home Control integration for devolod
///
/// Exposes the binary sensors of one gateway as entities and keeps them in sync
/// with the messages the gateway pushes.
pub struct DevoloIntegration {
    home_control: Arc<dyn HomeControl>,
    binary_sensors: BinarySensorsMap,
    to_engine: Option<FromIntegrationSender>,
    /// Handle to the background notification processing task
    notification_task: Option<JoinHandle<()>>,
}

impl DevoloIntegration {
    pub fn new(home_control: Arc<dyn HomeControl>) -> Self {
        Self {
            home_control,
            binary_sensors: Arc::new(Mutex::new(HashMap::new())),
            to_engine: None,
            notification_task: None,
        }
    }

    /// Deliver gateway notifications to their entities, one at a time
    async fn process_notifications_task(
        mut rx: mpsc::UnboundedReceiver<Notification>,
        binary_sensors: BinarySensorsMap,
    ) {
        while let Some(notification) = rx.recv().await {
            let sensor = binary_sensors
                .lock()
                .await
                .get(&notification.unique_id)
                .cloned();
            match sensor {
                Some(sensor) => sensor.lock().await.sync(&notification.message),
                None => debug!(
                    "Notification for unknown entity {}: {}",
                    notification.unique_id, notification.message
                ),
            }
        }
        info!("devolo notification task exiting");
    }

    /// Re-read an entity from the gateway and publish the result
    async fn update_entity(&self, unique_id: &str) -> Result<(), Box<dyn Error + Send>> {
        let sensor = self
            .binary_sensors
            .lock()
            .await
            .get(unique_id)
            .cloned()
            .ok_or_else(|| -> Box<dyn Error + Send> {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Binary sensor not found: {}", unique_id),
                ))
            })?;

        let mut sensor = sensor.lock().await;
        sensor.update();
        debug!("Refreshed {} -> on={}", unique_id, sensor.is_on());
        sensor.base().schedule_update();
        Ok(())
    }
}

#[async_trait]
impl Integration for DevoloIntegration {
    fn name(&self) -> &str {
        "devolo"
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        self.to_engine = Some(tx.clone());

        let add_entities = AddEntities::new(self.name(), tx);
        let sensors = binary_sensor::async_setup_entry(&self.home_control, &add_entities).await;
        info!("Set up {} devolo binary sensors", sensors.len());

        // Subscribe after the engine has the entities, so every scheduled update
        // finds them registered.
        let (notification_tx, notification_rx) = mpsc::unbounded_channel();
        {
            let mut map = self.binary_sensors.lock().await;
            for sensor in sensors {
                let unique_id = {
                    let mut guard = sensor.lock().await;
                    guard.base_mut().subscribe(notification_tx.clone());
                    guard.base().unique_id().to_string()
                };
                map.insert(unique_id, sensor);
            }
        }

        let binary_sensors = self.binary_sensors.clone();
        self.notification_task = Some(tokio::spawn(async move {
            Self::process_notifications_task(notification_rx, binary_sensors).await;
        }));

        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::UpdateEntity { unique_id } => {
                self.update_entity(&unique_id).await?;
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("devolo integration shutting down");

        let sensors: Vec<_> = self.binary_sensors.lock().await.drain().collect();
        for (unique_id, sensor) in sensors {
            sensor.lock().await.base_mut().unsubscribe();
            if let Some(tx) = &self.to_engine {
                let msg = FromIntegrationMessage::EntityRemoved {
                    unique_id: unique_id.clone(),
                };
                if let Err(e) = tx.try_send(msg) {
                    warn!("Failed to send EntityRemoved for {}: {}", unique_id, e);
                }
            }
        }

        if let Some(task) = self.notification_task.take() {
            task.abort();
        }
        Ok(())
    }
}
