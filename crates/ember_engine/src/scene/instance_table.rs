//! Fixed-capacity mesh-instance table
//!
//! The table of "things to draw this frame". Capacity is fixed at init time and
//! never grows; adding past capacity is a defined error, not a corruption. Slots
//! are keyed by an opaque, monotonically increasing instance id drawn from one
//! process-global counter, so ids never collide even across independently built
//! tables. Lookup is a linear scan: table sizes are hundreds to low thousands,
//! which is fine at per-frame cadence and keeps iteration order slot-stable.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::math::Mat4;
use crate::render::error::{RenderError, RenderResult};
use crate::render::material::{GpuMesh, Material};

/// Size of the per-instance push-constant blob forwarded to material pipelines
pub const PUSH_CONSTANT_BYTES: usize = 64;

/// Sentinel marking an empty slot
const INVALID_ID: u32 = u32::MAX;

/// Global id source shared by every table in the process
static NEXT_INSTANCE_ID: AtomicU32 = AtomicU32::new(0);

/// Opaque handle to a mesh instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshInstanceId(u32);

impl MeshInstanceId {
    /// The invalid id marking an empty slot
    pub const INVALID: MeshInstanceId = MeshInstanceId(INVALID_ID);

    /// Whether this id refers to an actual instance
    pub fn is_valid(self) -> bool {
        self.0 != INVALID_ID
    }

    fn allocate() -> Self {
        let id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        debug_assert_ne!(id, INVALID_ID, "instance id counter wrapped");
        MeshInstanceId(id)
    }
}

bitflags::bitflags! {
    /// Per-instance behavior flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MeshInstanceFlags: u32 {
        /// Instance is drawn by passes whose material pipeline exists
        const VISIBLE = 1 << 0;
        /// Draw with the wireframe variant if the material provides one
        const WIREFRAME = 1 << 1;
    }
}

impl Default for MeshInstanceFlags {
    fn default() -> Self {
        MeshInstanceFlags::VISIBLE
    }
}

/// Borrowed view of one occupied slot
pub struct MeshInstanceRef<'a> {
    /// Instance id
    pub id: MeshInstanceId,
    /// Behavior flags
    pub flags: MeshInstanceFlags,
    /// Mesh to draw
    pub mesh: &'a Arc<GpuMesh>,
    /// Material providing the per-pass pipelines
    pub material: &'a Arc<Material>,
    /// Raw push-constant blob handed to the pipeline at draw time
    pub push_constants: &'a [u8; PUSH_CONSTANT_BYTES],
    /// World transform
    pub transform: &'a Mat4,
}

/// Fixed-capacity structure-of-arrays instance table
pub struct MeshInstanceTable {
    ids: Vec<MeshInstanceId>,
    flags: Vec<MeshInstanceFlags>,
    meshes: Vec<Option<Arc<GpuMesh>>>,
    materials: Vec<Option<Arc<Material>>>,
    push_constants: Vec<[u8; PUSH_CONSTANT_BYTES]>,
    transforms: Vec<Mat4>,
}

impl MeshInstanceTable {
    /// Create a table with a fixed capacity; all slots start empty
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: vec![MeshInstanceId::INVALID; capacity],
            flags: vec![MeshInstanceFlags::empty(); capacity],
            meshes: vec![None; capacity],
            materials: vec![None; capacity],
            push_constants: vec![[0u8; PUSH_CONSTANT_BYTES]; capacity],
            transforms: vec![Mat4::identity(); capacity],
        }
    }

    /// Fixed capacity chosen at init time
    pub fn capacity(&self) -> usize {
        self.ids.len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.ids.iter().filter(|id| id.is_valid()).count()
    }

    /// Whether the table has no occupied slots
    pub fn is_empty(&self) -> bool {
        self.ids.iter().all(|id| !id.is_valid())
    }

    /// Add an instance, assigning a fresh globally unique id
    ///
    /// Returns [`RenderError::InstanceTableFull`] when every slot is occupied.
    pub fn add(
        &mut self,
        mesh: Arc<GpuMesh>,
        material: Arc<Material>,
        push_constants: [u8; PUSH_CONSTANT_BYTES],
        transform: Mat4,
        flags: MeshInstanceFlags,
    ) -> RenderResult<MeshInstanceId> {
        let slot = self
            .ids
            .iter()
            .position(|id| !id.is_valid())
            .ok_or(RenderError::InstanceTableFull {
                capacity: self.capacity(),
            })?;

        let id = MeshInstanceId::allocate();
        self.ids[slot] = id;
        self.flags[slot] = flags;
        self.meshes[slot] = Some(mesh);
        self.materials[slot] = Some(material);
        self.push_constants[slot] = push_constants;
        self.transforms[slot] = transform;
        Ok(id)
    }

    /// Copy every occupied slot of `src` into the first free slots of `self`
    ///
    /// The destination scan resumes from the last filled index so repeated
    /// appends within one call stay linear overall. Ids are copied as-is; they
    /// cannot collide because all tables draw from one global counter.
    pub fn append(&mut self, src: &MeshInstanceTable) -> RenderResult<()> {
        let mut cursor = 0usize;
        for slot in 0..src.ids.len() {
            if !src.ids[slot].is_valid() {
                continue;
            }

            let dst = loop {
                if cursor >= self.ids.len() {
                    return Err(RenderError::InstanceTableFull {
                        capacity: self.capacity(),
                    });
                }
                if !self.ids[cursor].is_valid() {
                    break cursor;
                }
                cursor += 1;
            };

            self.ids[dst] = src.ids[slot];
            self.flags[dst] = src.flags[slot];
            self.meshes[dst] = src.meshes[slot].clone();
            self.materials[dst] = src.materials[slot].clone();
            self.push_constants[dst] = src.push_constants[slot];
            self.transforms[dst] = src.transforms[slot];
            cursor += 1;
        }
        Ok(())
    }

    /// Slot index of `id`, if present
    pub fn index_of(&self, id: MeshInstanceId) -> Option<usize> {
        if !id.is_valid() {
            return None;
        }
        self.ids.iter().position(|&slot_id| slot_id == id)
    }

    /// Remove the instance with `id`; returns whether it was present
    pub fn remove(&mut self, id: MeshInstanceId) -> bool {
        match self.index_of(id) {
            Some(slot) => {
                self.ids[slot] = MeshInstanceId::INVALID;
                self.flags[slot] = MeshInstanceFlags::empty();
                self.meshes[slot] = None;
                self.materials[slot] = None;
                self.push_constants[slot] = [0u8; PUSH_CONSTANT_BYTES];
                self.transforms[slot] = Mat4::identity();
                true
            }
            None => false,
        }
    }

    /// Overwrite the transform of `id`; returns whether it was present
    pub fn set_transform(&mut self, id: MeshInstanceId, transform: Mat4) -> bool {
        match self.index_of(id) {
            Some(slot) => {
                self.transforms[slot] = transform;
                true
            }
            None => false,
        }
    }

    /// Empty every slot, dropping mesh/material references
    pub fn clear(&mut self) {
        for slot in 0..self.ids.len() {
            self.ids[slot] = MeshInstanceId::INVALID;
            self.flags[slot] = MeshInstanceFlags::empty();
            self.meshes[slot] = None;
            self.materials[slot] = None;
        }
    }

    /// Iterate occupied slots in slot-index order (the order-stable draw order)
    pub fn occupied(&self) -> impl Iterator<Item = (usize, MeshInstanceRef<'_>)> {
        self.ids.iter().enumerate().filter_map(move |(slot, &id)| {
            if !id.is_valid() {
                return None;
            }
            Some((
                slot,
                MeshInstanceRef {
                    id,
                    flags: self.flags[slot],
                    mesh: self.meshes[slot].as_ref()?,
                    material: self.materials[slot].as_ref()?,
                    push_constants: &self.push_constants[slot],
                    transform: &self.transforms[slot],
                },
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::material::tests_support::{stub_material, stub_mesh};
    use std::collections::HashSet;

    fn add_stub(table: &mut MeshInstanceTable) -> RenderResult<MeshInstanceId> {
        table.add(
            stub_mesh(),
            stub_material(),
            [0u8; PUSH_CONSTANT_BYTES],
            Mat4::identity(),
            MeshInstanceFlags::VISIBLE,
        )
    }

    #[test]
    fn test_add_returns_distinct_ids() {
        let mut a = MeshInstanceTable::with_capacity(8);
        let mut b = MeshInstanceTable::with_capacity(8);

        let mut seen = HashSet::new();
        for _ in 0..8 {
            assert!(seen.insert(add_stub(&mut a).unwrap()));
            assert!(seen.insert(add_stub(&mut b).unwrap()));
        }
        assert_eq!(seen.len(), 16);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    let mut table = MeshInstanceTable::with_capacity(32);
                    (0..32)
                        .map(|_| add_stub(&mut table).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate instance id {:?}", id);
            }
        }
    }

    #[test]
    fn test_add_over_capacity_is_defined_error() {
        let mut table = MeshInstanceTable::with_capacity(2);
        let first = add_stub(&mut table).unwrap();
        let second = add_stub(&mut table).unwrap();
        assert_ne!(first, second);

        match add_stub(&mut table) {
            Err(RenderError::InstanceTableFull { capacity }) => assert_eq!(capacity, 2),
            other => panic!("expected InstanceTableFull, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_append_copies_occupied_slots() {
        let mut src = MeshInstanceTable::with_capacity(4);
        let kept = add_stub(&mut src).unwrap();
        let removed = add_stub(&mut src).unwrap();
        let kept2 = add_stub(&mut src).unwrap();
        src.remove(removed);

        let mut dst = MeshInstanceTable::with_capacity(8);
        add_stub(&mut dst).unwrap();
        let free_before = dst.capacity() - dst.len();

        dst.append(&src).unwrap();

        assert!(dst.index_of(kept).is_some());
        assert!(dst.index_of(kept2).is_some());
        assert!(dst.index_of(removed).is_none());
        assert_eq!(dst.capacity() - dst.len(), free_before - 2);
    }

    #[test]
    fn test_append_never_exceeds_capacity() {
        let mut src = MeshInstanceTable::with_capacity(4);
        for _ in 0..4 {
            add_stub(&mut src).unwrap();
        }

        let mut dst = MeshInstanceTable::with_capacity(2);
        assert!(matches!(
            dst.append(&src),
            Err(RenderError::InstanceTableFull { capacity: 2 })
        ));
        assert!(dst.len() <= dst.capacity());
    }

    #[test]
    fn test_remove_and_reuse_slot() {
        let mut table = MeshInstanceTable::with_capacity(1);
        let id = add_stub(&mut table).unwrap();
        assert!(table.remove(id));
        assert!(!table.remove(id));

        let next = add_stub(&mut table).unwrap();
        assert_ne!(id, next, "slot reuse must still mint a fresh id");
        assert_eq!(table.index_of(next), Some(0));
    }

    #[test]
    fn test_occupied_iterates_in_slot_order() {
        let mut table = MeshInstanceTable::with_capacity(4);
        let a = add_stub(&mut table).unwrap();
        let b = add_stub(&mut table).unwrap();
        let c = add_stub(&mut table).unwrap();
        table.remove(b);

        let order: Vec<_> = table.occupied().map(|(_, inst)| inst.id).collect();
        assert_eq!(order, vec![a, c]);
    }

    #[test]
    fn test_clear_empties_table() {
        let mut table = MeshInstanceTable::with_capacity(4);
        add_stub(&mut table).unwrap();
        add_stub(&mut table).unwrap();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.occupied().count(), 0);
    }
}
