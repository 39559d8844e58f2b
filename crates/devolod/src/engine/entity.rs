//! Entity abstraction for devolod
//!
//! All entities (binary sensors today, more platforms later) implement the Entity trait.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;

use super::device::DeviceInfo;
use super::integration::FromIntegrationSender;
use super::message::FromIntegrationMessage;

/// Entity shared between its integration and the engine registry
pub type SharedEntity = Arc<Mutex<dyn Entity>>;

/// Base trait that all entities must implement
pub trait Entity: Send + Sync {
    /// Stable identifier assigned by the integration (never changes across restarts)
    fn unique_id(&self) -> &str;

    /// Human-readable name, also used to derive the entity id
    fn name(&self) -> &str;

    /// Return the platform type of this entity (e.g. "binary_sensor")
    fn platform(&self) -> &'static str;

    /// Whether the underlying device can currently be reached
    fn available(&self) -> bool {
        true
    }

    /// Device this entity belongs to, if any
    fn device_info(&self) -> Option<DeviceInfo> {
        None
    }

    /// Push-based entities never need the engine to poll them
    fn should_poll(&self) -> bool {
        false
    }

    /// Serialize current state to JSON for Engine storage
    fn state_json(&self) -> serde_json::Value;

    /// Refresh cached state from the integration's data source.
    ///
    /// Called before the first state is recorded when an integration asks for it,
    /// and when an update is requested through the engine.
    fn update(&mut self) {}

    /// Called once the engine has accepted the entity.
    ///
    /// The scheduler is how the entity asks the engine to re-read its state later on.
    fn added_to_engine(&mut self, scheduler: UpdateScheduler);
}

/// Handle an entity uses to ask the engine to re-publish its state.
///
/// Scheduling is fire-and-forget: the engine reads the entity's accessors when
/// it gets to the request, and a full channel only loses that one refresh.
#[derive(Debug, Clone)]
pub struct UpdateScheduler {
    unique_id: String,
    tx: FromIntegrationSender,
}

impl UpdateScheduler {
    pub fn new(unique_id: impl Into<String>, tx: FromIntegrationSender) -> Self {
        Self {
            unique_id: unique_id.into(),
            tx,
        }
    }

    pub fn schedule_update(&self) {
        let msg = FromIntegrationMessage::StateUpdateScheduled {
            unique_id: self.unique_id.clone(),
        };
        match self.tx.try_send(msg) {
            Ok(()) => debug!("Scheduled state update for {}", self.unique_id),
            Err(e) => warn!(
                "Failed to schedule state update for {}: {}",
                self.unique_id, e
            ),
        }
    }
}

/// Registration callback handed to platforms during setup.
///
/// Platforms collect their entities and hand them over in a single batch.
pub struct AddEntities {
    integration_name: String,
    tx: FromIntegrationSender,
}

impl AddEntities {
    pub fn new(integration_name: impl Into<String>, tx: FromIntegrationSender) -> Self {
        Self {
            integration_name: integration_name.into(),
            tx,
        }
    }

    /// Register a batch of entities with the engine.
    ///
    /// When `update_before_add` is set the engine calls [`Entity::update`] on each
    /// entity before recording its first state.
    pub async fn add(&self, entities: Vec<SharedEntity>, update_before_add: bool) {
        for entity in &entities {
            let mut entity = entity.lock().await;
            let scheduler = UpdateScheduler::new(entity.unique_id(), self.tx.clone());
            entity.added_to_engine(scheduler);
        }

        let count = entities.len();
        let msg = FromIntegrationMessage::EntitiesAdded {
            integration_name: self.integration_name.clone(),
            entities,
            update_before_add,
        };
        if let Err(e) = self.tx.send(msg).await {
            warn!("Failed to send EntitiesAdded message: {}", e);
        } else {
            debug!(
                "Handed {} entities from {} to the engine",
                count, self.integration_name
            );
        }
    }
}
