//! Type-safe message system for devolod
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use super::entity::SharedEntity;

/// Messages FROM integrations TO the engine (events/state updates)
pub enum FromIntegrationMessage {
    /// A platform finished discovery and hands over its entities
    EntitiesAdded {
        integration_name: String,
        entities: Vec<SharedEntity>,
        update_before_add: bool,
    },

    /// An entity was removed (integration unloaded, device gone, etc.)
    EntityRemoved { unique_id: String },

    /// An entity asks the engine to re-read its state
    StateUpdateScheduled { unique_id: String },
}

impl std::fmt::Debug for FromIntegrationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FromIntegrationMessage::EntitiesAdded {
                integration_name,
                entities,
                update_before_add,
            } => f
                .debug_struct("EntitiesAdded")
                .field("integration_name", integration_name)
                .field("entities", &format_args!("<{} entities>", entities.len()))
                .field("update_before_add", update_before_add)
                .finish(),
            FromIntegrationMessage::EntityRemoved { unique_id } => f
                .debug_struct("EntityRemoved")
                .field("unique_id", unique_id)
                .finish(),
            FromIntegrationMessage::StateUpdateScheduled { unique_id } => f
                .debug_struct("StateUpdateScheduled")
                .field("unique_id", unique_id)
                .finish(),
        }
    }
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToIntegrationMessage {
    /// Re-read an entity's state from its data source and publish it
    UpdateEntity { unique_id: String },
}
