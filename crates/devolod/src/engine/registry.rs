use std::collections::HashMap;

use super::entity::SharedEntity;

/// Registered entity and the integration that owns it
#[derive(Clone)]
pub struct RegistryEntry {
    pub entity_id: String,
    pub unique_id: String,
    pub integration_name: String,
    pub entity: SharedEntity,
}

/// Entity registry: assigns entity ids and routes by entity id or unique id.
#[derive(Default)]
pub struct EntityRegistry {
    entries: HashMap<String, RegistryEntry>,
    by_unique_id: HashMap<String, String>,
}

impl EntityRegistry {
    /// Register an entity, returning its assigned entity id.
    ///
    /// Entity ids are `<platform>.<slug(name)>`, suffixed with `_2`, `_3`, ... when
    /// taken. Returns `None` if the unique id is already registered.
    pub fn register(
        &mut self,
        platform: &str,
        name: &str,
        unique_id: &str,
        integration_name: &str,
        entity: SharedEntity,
    ) -> Option<String> {
        if self.by_unique_id.contains_key(unique_id) {
            return None;
        }

        let base = format!("{}.{}", platform, slugify(name));
        let mut entity_id = base.clone();
        let mut suffix = 2;
        while self.entries.contains_key(&entity_id) {
            entity_id = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        self.by_unique_id
            .insert(unique_id.to_string(), entity_id.clone());
        self.entries.insert(
            entity_id.clone(),
            RegistryEntry {
                entity_id: entity_id.clone(),
                unique_id: unique_id.to_string(),
                integration_name: integration_name.to_string(),
                entity,
            },
        );
        Some(entity_id)
    }

    pub fn get(&self, entity_id: &str) -> Option<&RegistryEntry> {
        self.entries.get(entity_id)
    }

    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<&RegistryEntry> {
        self.by_unique_id
            .get(unique_id)
            .and_then(|entity_id| self.entries.get(entity_id))
    }

    pub fn remove_by_unique_id(&mut self, unique_id: &str) -> Option<RegistryEntry> {
        let entity_id = self.by_unique_id.remove(unique_id)?;
        self.entries.remove(&entity_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lowercase ASCII slug: runs of anything that is not a letter or digit become one `_`.
pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("unnamed");
    }
    slug
}
