//! Ember Engine - Engine-object layer
//!
//! This crate binds the reflection object model to a live world:
//! - `Type` / `TypeRegistry` - runtime descriptors for engine-object types
//! - `GraphicsScene` - the externally-owned scene the engine registers
//!   renderable state with, keyed by opaque ids
//! - `World`, `TransformComponent` - spatial collaborators
//! - `MeshComponent` / `MeshComponentDefinition` - the component attachment
//!   state machine and its shared template data

mod component;
mod mesh;
mod scene;
mod transform;
mod ty;
mod world;

pub use component::{AttachState, Component};
pub use mesh::{
    register_classes, Mesh, MeshComponent, MeshComponentDefinition, SubMesh,
    MESH_COMPONENT_DEFINITION,
};
pub use scene::{GraphicsScene, SceneObject, SubMeshData, UpdateMode};
pub use transform::TransformComponent;
pub use ty::{type_flags, Type, TypeRef, TypeRegistry};
pub use world::World;
