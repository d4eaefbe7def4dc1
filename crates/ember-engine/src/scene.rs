//! Graphics scene collaborator
//!
//! The scene owns renderable state; components own the ids they were
//! issued. A component must hand every id back on detach.

use ember_core::SceneObjectId;
use std::collections::HashMap;

/// How much of a scene object the next synchronization pass must rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Transform, mesh binding, and materials
    Full,
    /// Transform only
    TransformOnly,
}

/// Renderable state for one registered scene object
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub world_matrix: [[f32; 4]; 4],
    pub mesh: Option<String>,
    pub materials: Vec<String>,
    /// Mode of the last synchronization applied to this object
    pub last_update: Option<UpdateMode>,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            world_matrix: ember_core::Transform::IDENTITY.to_matrix(),
            mesh: None,
            materials: Vec::new(),
            last_update: None,
        }
    }
}

/// Per-submesh render data, owned by a scene object
#[derive(Debug, Clone)]
pub struct SubMeshData {
    pub owner: SceneObjectId,
    pub material: Option<String>,
}

/// The externally-owned store of renderable state.
///
/// Issues opaque ids for scene objects and sub-mesh bindings. Releasing an
/// id that is no longer present is a no-op, so double releases during
/// teardown are harmless.
#[derive(Debug, Default)]
pub struct GraphicsScene {
    next_id: u64,
    objects: HashMap<SceneObjectId, SceneObject>,
    sub_meshes: HashMap<SceneObjectId, SubMeshData>,
}

impl GraphicsScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> SceneObjectId {
        self.next_id += 1;
        SceneObjectId(self.next_id)
    }

    /// Register a new scene object and return its id
    pub fn allocate_scene_object(&mut self) -> SceneObjectId {
        let id = self.next_id();
        self.objects.insert(id, SceneObject::default());
        id
    }

    /// Release a scene object and every sub-mesh it owns
    pub fn release_scene_object(&mut self, id: SceneObjectId) {
        self.objects.remove(&id);
        self.sub_meshes.retain(|_, data| data.owner != id);
    }

    /// Register sub-mesh data owned by a scene object
    pub fn allocate_sub_mesh(&mut self, owner: SceneObjectId) -> SceneObjectId {
        let id = self.next_id();
        self.sub_meshes.insert(
            id,
            SubMeshData {
                owner,
                material: None,
            },
        );
        id
    }

    /// Release a single sub-mesh binding
    pub fn release_sub_mesh(&mut self, id: SceneObjectId) {
        self.sub_meshes.remove(&id);
    }

    pub fn scene_object(&self, id: SceneObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn scene_object_mut(&mut self, id: SceneObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    pub fn sub_mesh(&self, id: SceneObjectId) -> Option<&SubMeshData> {
        self.sub_meshes.get(&id)
    }

    pub fn sub_mesh_mut(&mut self, id: SceneObjectId) -> Option<&mut SubMeshData> {
        self.sub_meshes.get_mut(&id)
    }

    /// Number of live scene object registrations
    pub fn live_object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of live sub-mesh registrations
    pub fn live_sub_mesh_count(&self) -> usize {
        self.sub_meshes.len()
    }
}
