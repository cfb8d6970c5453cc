//! Persistent scene model
//!
//! The scene is a fixed-capacity table of mesh instances plus a display-name
//! side table. It is owned by the renderer and only ever mutated from the render
//! thread between frames; during frame recording it is read-only while its
//! instances are copied into the active frame's table.

pub mod instance_table;
pub mod name_registry;

pub use instance_table::{
    MeshInstanceFlags, MeshInstanceId, MeshInstanceRef, MeshInstanceTable, PUSH_CONSTANT_BYTES,
};
pub use name_registry::NameRegistry;

use std::sync::Arc;

use crate::math::Mat4;
use crate::render::error::RenderResult;
use crate::render::material::{GpuMesh, Material};

/// Persistent collection of mesh instances
pub struct Scene {
    instances: MeshInstanceTable,
    names: NameRegistry,
}

impl Scene {
    /// Create an empty scene with fixed instance capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            instances: MeshInstanceTable::with_capacity(capacity),
            names: NameRegistry::with_capacity(capacity),
        }
    }

    /// Create a mesh instance and add it to the scene
    pub fn create_and_add_mesh_instance(
        &mut self,
        mesh: Arc<GpuMesh>,
        material: Arc<Material>,
        push_constants: [u8; PUSH_CONSTANT_BYTES],
        transform: Mat4,
        flags: MeshInstanceFlags,
        name: Option<&str>,
    ) -> RenderResult<MeshInstanceId> {
        let id = self
            .instances
            .add(mesh, material, push_constants, transform, flags)?;
        if let Some(name) = name {
            self.names.set(id, name)?;
        }
        log::debug!("Scene: added mesh instance {:?} ({:?})", id, name);
        Ok(id)
    }

    /// Remove a mesh instance; returns whether it was present
    pub fn remove_mesh_instance(&mut self, id: MeshInstanceId) -> bool {
        self.names.remove(id);
        let removed = self.instances.remove(id);
        if removed {
            log::debug!("Scene: removed mesh instance {:?}", id);
        }
        removed
    }

    /// Overwrite an instance's world transform; returns whether it was present
    pub fn set_mesh_instance_transform(&mut self, id: MeshInstanceId, transform: Mat4) -> bool {
        self.instances.set_transform(id, transform)
    }

    /// The persistent instance table (read-only during frame collection)
    pub fn instances(&self) -> &MeshInstanceTable {
        &self.instances
    }

    /// Display name of an instance, if one was registered
    pub fn instance_name(&self, id: MeshInstanceId) -> Option<&str> {
        self.names.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::material::tests_support::{stub_material, stub_mesh};

    #[test]
    fn test_scene_add_remove_round_trip() {
        let mut scene = Scene::with_capacity(4);
        let id = scene
            .create_and_add_mesh_instance(
                stub_mesh(),
                stub_material(),
                [0u8; PUSH_CONSTANT_BYTES],
                Mat4::identity(),
                MeshInstanceFlags::VISIBLE,
                Some("asteroid"),
            )
            .unwrap();

        assert_eq!(scene.instance_name(id), Some("asteroid"));
        assert_eq!(scene.instances().len(), 1);

        assert!(scene.remove_mesh_instance(id));
        assert_eq!(scene.instance_name(id), None);
        assert!(scene.instances().is_empty());
    }

    #[test]
    fn test_set_transform_on_missing_instance() {
        let mut scene = Scene::with_capacity(2);
        assert!(!scene.set_mesh_instance_transform(MeshInstanceId::INVALID, Mat4::identity()));
    }
}
