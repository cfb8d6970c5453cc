//! Instance display-name registry
//!
//! Debug-display aid mapping instance ids to human-readable names. Populated
//! once per persistent instance at scene-build time and never touched on the
//! per-frame path; only the scene-browser UI panel reads it.

use crate::render::error::{RenderError, RenderResult};
use crate::scene::instance_table::MeshInstanceId;

/// Fixed-capacity id → display-name side table
pub struct NameRegistry {
    entries: Vec<Option<(MeshInstanceId, String)>>,
}

impl NameRegistry {
    /// Create a registry with a fixed capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: vec![None; capacity],
        }
    }

    /// Register a display name for `id`
    pub fn set(&mut self, id: MeshInstanceId, name: &str) -> RenderResult<()> {
        let capacity = self.entries.len();

        // Overwrite an existing entry for the same id rather than duplicating it.
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| matches!(e, Some((existing, _)) if *existing == id))
        {
            *entry = Some((id, name.to_string()));
            return Ok(());
        }

        let free = self
            .entries
            .iter_mut()
            .find(|e| e.is_none())
            .ok_or(RenderError::NameRegistryFull { capacity })?;
        *free = Some((id, name.to_string()));
        Ok(())
    }

    /// Display name for `id`, if registered
    pub fn get(&self, id: MeshInstanceId) -> Option<&str> {
        self.entries.iter().find_map(|e| match e {
            Some((existing, name)) if *existing == id => Some(name.as_str()),
            _ => None,
        })
    }

    /// Drop the entry for `id`, if any
    pub fn remove(&mut self, id: MeshInstanceId) {
        for entry in &mut self.entries {
            if matches!(entry, Some((existing, _)) if *existing == id) {
                *entry = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Mat4;
    use crate::render::material::tests_support::{stub_material, stub_mesh};
    use crate::scene::instance_table::{MeshInstanceFlags, MeshInstanceTable, PUSH_CONSTANT_BYTES};

    fn fresh_id() -> MeshInstanceId {
        let mut table = MeshInstanceTable::with_capacity(1);
        table
            .add(
                stub_mesh(),
                stub_material(),
                [0u8; PUSH_CONSTANT_BYTES],
                Mat4::identity(),
                MeshInstanceFlags::VISIBLE,
            )
            .unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let mut registry = NameRegistry::with_capacity(4);
        let id = fresh_id();
        registry.set(id, "player ship").unwrap();
        assert_eq!(registry.get(id), Some("player ship"));
        assert_eq!(registry.get(MeshInstanceId::INVALID), None);
    }

    #[test]
    fn test_set_overwrites_existing() {
        let mut registry = NameRegistry::with_capacity(1);
        let id = fresh_id();
        registry.set(id, "old").unwrap();
        registry.set(id, "new").unwrap();
        assert_eq!(registry.get(id), Some("new"));
    }

    #[test]
    fn test_full_registry_is_defined_error() {
        let mut registry = NameRegistry::with_capacity(1);
        registry.set(fresh_id(), "a").unwrap();
        assert!(matches!(
            registry.set(fresh_id(), "b"),
            Err(RenderError::NameRegistryFull { capacity: 1 })
        ));
    }

    #[test]
    fn test_remove_frees_slot() {
        let mut registry = NameRegistry::with_capacity(1);
        let id = fresh_id();
        registry.set(id, "a").unwrap();
        registry.remove(id);
        assert_eq!(registry.get(id), None);
        registry.set(fresh_id(), "b").unwrap();
    }
}
