//! Ember Core - Foundational types for the Ember object model
//!
//! This crate provides the types that all other Ember crates depend on:
//! - `SceneObjectId` - Opaque graphics scene handles
//! - `ContentHash` - SHA-256 based content hashing
//! - `Transform`, `Vec3` - Spatial types
//! - Error types and Result alias

mod error;
mod hash;
mod id;
mod types;

pub use error::{EmberError, Result};
pub use hash::ContentHash;
pub use id::SceneObjectId;
pub use types::{mat4_mul, Color, Transform, Vec3};
