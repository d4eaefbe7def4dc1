//! Mesh component and its shared definition

use crate::component::{AttachState, Component};
use crate::scene::UpdateMode;
use crate::transform::TransformComponent;
use crate::world::World;
use ember_core::{EmberError, Result, SceneObjectId};
use ember_reflect::{
    element_ref, mismatch, Class, Element, ElementRef, FieldKind, Registry, Value,
};
use std::any::Any;
use std::rc::Rc;

/// Registered class name of the mesh component definition
pub const MESH_COMPONENT_DEFINITION: &str = "MeshComponentDefinition";

/// One renderable section of a mesh
#[derive(Debug, Clone, Default)]
pub struct SubMesh {
    pub material: String,
}

/// The mesh binding a component registers with the scene
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub sub_meshes: Vec<SubMesh>,
}

/// Immutable shared template data for mesh components.
///
/// Many components may share one definition; `finalize` copies the data a
/// component needs into its own state, so definitions are never mutated
/// after registration. Reflectable, so definitions clone and archive like
/// any other asset.
#[derive(Debug, Clone, Default)]
pub struct MeshComponentDefinition {
    pub mesh_name: String,
    /// Default material per submesh; the length defines the submesh count
    pub sub_mesh_materials: Vec<String>,
    pub override_materials: Vec<String>,
}

impl MeshComponentDefinition {
    /// Build the mesh binding this definition describes
    pub fn build_mesh(&self) -> Mesh {
        Mesh {
            name: self.mesh_name.clone(),
            sub_meshes: self
                .sub_mesh_materials
                .iter()
                .map(|material| SubMesh {
                    material: material.clone(),
                })
                .collect(),
        }
    }

    /// Recover a shared definition from a reflected element, e.g. one
    /// loaded from an archive
    pub fn from_element(element: &ElementRef) -> Option<Rc<Self>> {
        element
            .borrow()
            .as_any()
            .downcast_ref::<Self>()
            .cloned()
            .map(Rc::new)
    }
}

impl Element for MeshComponentDefinition {
    fn class_name(&self) -> &'static str {
        MESH_COMPONENT_DEFINITION
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "mesh" => Some(Value::String(self.mesh_name.clone())),
            "sub_mesh_materials" => Some(Value::from(self.sub_mesh_materials.clone())),
            "override_materials" => Some(Value::from(self.override_materials.clone())),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<()> {
        match (field, value) {
            ("mesh", Value::String(v)) => self.mesh_name = v,
            ("sub_mesh_materials", v @ Value::Array(_)) => {
                self.sub_mesh_materials = string_vec(field, v)?;
            }
            ("override_materials", v @ Value::Array(_)) => {
                self.override_materials = string_vec(field, v)?;
            }
            (f, v) if matches!(f, "mesh" | "sub_mesh_materials" | "override_materials") => {
                return Err(mismatch(f, "string or array of strings", &v));
            }
            (f, _) => return Err(EmberError::UnknownField(f.to_string())),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn string_vec(field: &str, value: Value) -> Result<Vec<String>> {
    value.clone().into_string_vec().ok_or_else(|| {
        mismatch(field, "array of strings", &value)
    })
}

/// Register this module's element classes
pub fn register_classes(registry: &mut Registry) -> Result<()> {
    registry.register(
        Class::new(MESH_COMPONENT_DEFINITION, || {
            element_ref(MeshComponentDefinition::default())
        })
        .with_field("mesh", FieldKind::String)
        .with_field(
            "sub_mesh_materials",
            FieldKind::Array {
                element: Box::new(FieldKind::String),
            },
        )
        .with_field(
            "override_materials",
            FieldKind::Array {
                element: Box::new(FieldKind::String),
            },
        ),
    )
}

/// A mesh bound to a world's graphics scene.
///
/// Holds the scene object id and one sub-mesh id per submesh for the
/// duration of an attach/detach bracket. Scene-visible state is only
/// written during `graphics_scene_object_update`, driven by the dirty flag.
#[derive(Debug)]
pub struct MeshComponent {
    definition: Option<Rc<MeshComponentDefinition>>,
    mesh: Option<Mesh>,
    override_materials: Vec<String>,
    scene_object_id: Option<SceneObjectId>,
    sub_mesh_ids: Vec<SceneObjectId>,
    needs_scene_update: Option<UpdateMode>,
    needs_reattach: bool,
    state: AttachState,
}

impl Default for MeshComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshComponent {
    pub fn new() -> Self {
        Self {
            definition: None,
            mesh: None,
            override_materials: Vec::new(),
            scene_object_id: None,
            sub_mesh_ids: Vec::new(),
            needs_scene_update: None,
            needs_reattach: false,
            state: AttachState::Unattached,
        }
    }

    /// Bind this component to its shared definition.
    ///
    /// Must happen before the first attach; the definition stays shared and
    /// is never written through.
    pub fn finalize(&mut self, definition: &Rc<MeshComponentDefinition>) {
        if self.state == AttachState::Attached {
            contract_violation("finalize called on an attached MeshComponent");
            return;
        }
        self.mesh = Some(definition.build_mesh());
        self.override_materials = definition.override_materials.clone();
        self.definition = Some(definition.clone());
    }

    pub fn definition(&self) -> Option<&Rc<MeshComponentDefinition>> {
        self.definition.as_ref()
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn scene_object_id(&self) -> Option<SceneObjectId> {
        self.scene_object_id
    }

    pub fn sub_mesh_ids(&self) -> &[SceneObjectId] {
        &self.sub_mesh_ids
    }

    /// Swap the mesh binding. Takes effect on the next update via a single
    /// coalesced reattach.
    pub fn set_mesh(&mut self, mesh: Mesh) {
        self.mesh = Some(mesh);
        if self.state == AttachState::Attached {
            self.deferred_reattach();
        }
    }

    /// Swap the override material set. Takes effect on the next update via
    /// a single coalesced reattach.
    pub fn set_override_materials(&mut self, materials: Vec<String>) {
        self.override_materials = materials;
        if self.state == AttachState::Attached {
            self.deferred_reattach();
        }
    }

    fn deferred_reattach(&mut self) {
        self.needs_reattach = true;
    }

    /// Mark the scene object dirty. Scene state is not touched here; the
    /// flag is consumed by the next `graphics_scene_object_update`.
    pub fn set_needs_graphics_scene_object_update(&mut self, mode: UpdateMode) {
        self.needs_scene_update = match (self.needs_scene_update, mode) {
            (Some(UpdateMode::Full), _) | (_, UpdateMode::Full) => Some(UpdateMode::Full),
            _ => Some(UpdateMode::TransformOnly),
        };
    }

    /// Scene synchronization callback, invoked by the world's scene-update
    /// pass. Consumes the dirty flag; a clean component is a no-op.
    pub fn graphics_scene_object_update(
        &mut self,
        world: &mut World,
        transform: &TransformComponent,
    ) {
        let Some(mode) = self.needs_scene_update.take() else {
            return;
        };
        if self.state != AttachState::Attached {
            return;
        }
        let Some(id) = self.scene_object_id else {
            return;
        };

        let materials = self.resolved_materials();
        let scene = world.scene_mut();
        if let Some(object) = scene.scene_object_mut(id) {
            object.world_matrix = transform.world_matrix();
            if mode == UpdateMode::Full {
                object.mesh = self.mesh.as_ref().map(|mesh| mesh.name.clone());
                object.materials = materials.clone();
            }
            object.last_update = Some(mode);
        }
        if mode == UpdateMode::Full {
            for (index, sub_id) in self.sub_mesh_ids.iter().enumerate() {
                if let Some(sub) = scene.sub_mesh_mut(*sub_id) {
                    sub.material = materials.get(index).cloned();
                }
            }
        }
    }

    /// Override material if one is set for the slot, else the submesh default
    fn resolved_materials(&self) -> Vec<String> {
        let Some(mesh) = &self.mesh else {
            return Vec::new();
        };
        mesh.sub_meshes
            .iter()
            .enumerate()
            .map(|(index, sub)| {
                self.override_materials
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| sub.material.clone())
            })
            .collect()
    }
}

impl Component for MeshComponent {
    /// Register with the world's scene: one scene object id plus one
    /// sub-mesh id per submesh, then mark a full update.
    fn attach(&mut self, world: &mut World, _transform: &TransformComponent) {
        if self.state == AttachState::Attached {
            contract_violation("attach called on an already-attached MeshComponent");
            return;
        }

        let scene = world.scene_mut();
        let id = scene.allocate_scene_object();
        let sub_count = self.mesh.as_ref().map(|mesh| mesh.sub_meshes.len()).unwrap_or(0);
        self.sub_mesh_ids = (0..sub_count).map(|_| scene.allocate_sub_mesh(id)).collect();
        self.scene_object_id = Some(id);
        self.state = AttachState::Attached;
        self.set_needs_graphics_scene_object_update(UpdateMode::Full);
    }

    /// Release the scene object id and drain every sub-mesh id. After this
    /// the component holds no scene references.
    fn detach(&mut self, world: &mut World) {
        if self.state != AttachState::Attached {
            contract_violation("detach called on a MeshComponent that is not attached");
            return;
        }

        let scene = world.scene_mut();
        for sub_id in self.sub_mesh_ids.drain(..) {
            scene.release_sub_mesh(sub_id);
        }
        if let Some(id) = self.scene_object_id.take() {
            scene.release_scene_object(id);
        }
        self.needs_scene_update = None;
        self.state = AttachState::Detached;
    }

    /// Per-frame step: consume a pending reattach (mesh/material swaps made
    /// since the last frame coalesce into this one detach/attach pair),
    /// then mark a transform update.
    fn update(&mut self, world: &mut World, transform: &TransformComponent) {
        if self.state != AttachState::Attached {
            contract_violation("update called on a MeshComponent that is not attached");
            return;
        }

        if std::mem::take(&mut self.needs_reattach) {
            self.detach(world);
            self.attach(world, transform);
        }
        self.set_needs_graphics_scene_object_update(UpdateMode::TransformOnly);
    }

    fn attach_state(&self) -> AttachState {
        self.state
    }
}

fn contract_violation(message: &str) {
    debug_assert!(false, "{}", message);
    log::warn!("{}", message);
}
