use std::collections::HashMap;
use std::sync::Arc;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::entity::Entity;
use super::entity::SharedEntity;
use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::registry::EntityRegistry;
use super::state::EntityState;
use super::state::State;
use crate::engine::IntegrationContext;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No entity registered as {0}")]
    UnknownEntity(String),

    #[error("Integration channel not found: {0}")]
    IntegrationUnavailable(String),
}

/// devolod engine
///
/// This structure handles the flow of events, registering the entities integrations discover,
/// routing commands to the integration that owns an entity, and maintaining a view of the world
/// with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Entity registry: entity ids, unique ids and owning integrations
    registry: std::sync::Mutex<EntityRegistry>,

    /// Communication channels to integrations (for commands)
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

fn lock<T>(mutex: &std::sync::Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn snapshot(entity_id: &str, entity: &dyn Entity) -> EntityState {
    EntityState {
        entity_id: entity_id.to_string(),
        unique_id: entity.unique_id().to_string(),
        platform: entity.platform().to_string(),
        name: entity.name().to_string(),
        available: entity.available(),
        should_poll: entity.should_poll(),
        state: entity.state_json(),
        device: entity.device_info(),
    }
}

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            registry: std::sync::Mutex::new(EntityRegistry::default()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register integrations from configuration
    ///
    /// Every factory in the integration registry gets a look at the config; the ones
    /// that find their section are registered. Factory failures are logged and skipped.
    pub fn register_integrations_from_config(&self, cfg: &crate::config::Config) -> usize {
        let ctx = IntegrationContext { config: cfg };
        let mut registered = 0;
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
            registered += 1;
        }
        registered
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        lock(&self.integration_channels).insert(name.clone(), to_integration_tx);

        info!("Registering integration '{}'", name);
        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process commands from engine
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        lock(&self.integration_handles).push(handle);
    }

    /// Send a command to an integration
    ///
    /// Routes the command to the integration that owns the entity it names.
    pub fn send_command(&self, msg: ToIntegrationMessage) -> Result<(), EngineError> {
        let unique_id = match &msg {
            ToIntegrationMessage::UpdateEntity { unique_id } => unique_id.clone(),
        };

        let integration_name = lock(&self.registry)
            .get_by_unique_id(&unique_id)
            .map(|entry| entry.integration_name.clone())
            .ok_or_else(|| EngineError::UnknownEntity(unique_id.clone()))?;

        let channels = lock(&self.integration_channels);
        let tx = channels
            .get(&integration_name)
            .ok_or_else(|| EngineError::IntegrationUnavailable(integration_name.clone()))?;

        tx.send(msg)
            .map_err(|_| EngineError::IntegrationUnavailable(integration_name))
    }

    /// Ask the owning integration to refresh an entity from its data source
    pub fn request_update(&self, entity_id: &str) -> Result<(), EngineError> {
        let unique_id = lock(&self.registry)
            .get(entity_id)
            .map(|entry| entry.unique_id.clone())
            .ok_or_else(|| EngineError::UnknownEntity(entity_id.to_string()))?;

        self.send_command(ToIntegrationMessage::UpdateEntity { unique_id })
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg).await;
        }

        info!("Engine shutting down");
    }

    /// Stop all integrations and wait for their tasks to finish.
    ///
    /// Dropping the command channels ends each integration's command loop, which
    /// then runs the integration's shutdown.
    pub async fn shutdown(&self) {
        let channels = std::mem::take(&mut *lock(&self.integration_channels));
        drop(channels);

        let handles = std::mem::take(&mut *lock(&self.integration_handles));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Integration task ended abnormally: {}", e);
            }
        }
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Number of entities in the registry
    pub fn entity_count(&self) -> usize {
        lock(&self.registry).len()
    }

    fn modify_state(&self, f: impl FnOnce(&mut State)) {
        let mut state = State::clone(&self.state.load());
        f(&mut state);
        self.state.store(Arc::new(state));
    }

    /// Handle an event from an integration
    async fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::EntitiesAdded {
                integration_name,
                entities,
                update_before_add,
            } => {
                self.add_entities(&integration_name, entities, update_before_add)
                    .await;
            }
            FromIntegrationMessage::EntityRemoved { unique_id } => {
                let removed = lock(&self.registry).remove_by_unique_id(&unique_id);
                match removed {
                    Some(entry) => {
                        info!("Entity removed: {}", entry.entity_id);
                        self.modify_state(|state| {
                            state.entities.remove(&entry.entity_id);
                        });
                    }
                    None => debug!("Removal of unknown entity {}", unique_id),
                }
            }
            FromIntegrationMessage::StateUpdateScheduled { unique_id } => {
                let entry = lock(&self.registry)
                    .get_by_unique_id(&unique_id)
                    .map(|entry| (entry.entity_id.clone(), entry.entity.clone()));
                let Some((entity_id, entity)) = entry else {
                    debug!("State update scheduled for unknown entity {}", unique_id);
                    return;
                };

                let entity_state = {
                    let entity = entity.lock().await;
                    snapshot(&entity_id, &*entity)
                };
                debug!(
                    "State of {} -> available={}, state={}",
                    entity_id, entity_state.available, entity_state.state
                );
                self.modify_state(|state| {
                    state.entities.insert(entity_id, entity_state);
                });
            }
        }
    }

    async fn add_entities(
        &self,
        integration_name: &str,
        entities: Vec<SharedEntity>,
        update_before_add: bool,
    ) {
        info!(
            "Adding {} entities from {}",
            entities.len(),
            integration_name
        );

        let mut added = Vec::with_capacity(entities.len());
        for entity in entities {
            let (unique_id, name, platform) = {
                let entity = entity.lock().await;
                (
                    entity.unique_id().to_string(),
                    entity.name().to_string(),
                    entity.platform(),
                )
            };

            let entity_id = lock(&self.registry).register(
                platform,
                &name,
                &unique_id,
                integration_name,
                entity.clone(),
            );
            let Some(entity_id) = entity_id else {
                warn!(
                    "Entity with unique id {} from {} is already registered, ignoring",
                    unique_id, integration_name
                );
                continue;
            };

            let mut entity = entity.lock().await;
            if update_before_add {
                entity.update();
            }
            info!("Entity registered: {} ({})", entity_id, unique_id);
            added.push(snapshot(&entity_id, &*entity));
        }

        self.modify_state(|state| {
            for entity_state in added {
                state
                    .entities
                    .insert(entity_state.entity_id.clone(), entity_state);
            }
        });
    }

    /// Sender integrations use to reach the engine
    #[cfg(test)]
    pub(crate) fn sender(&self) -> FromIntegrationSender {
        self.message_tx.clone()
    }

    /// Wait for the next event and handle it
    #[cfg(test)]
    pub(crate) async fn process_next(&self) {
        let msg = self.message_rx.lock().await.recv().await;
        if let Some(msg) = msg {
            self.handle_event(msg).await;
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
