//! Opaque graphics scene handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque handle identifying an object registered with a graphics scene.
///
/// Ids are issued by the scene that owns the object and are only meaningful
/// to that scene. Components record the ids they were issued and must hand
/// every one of them back on detach.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneObjectId(pub u64);

impl SceneObjectId {
    /// Create an id from a raw value (for testing)
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SceneObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SceneObjectId({})", self.0)
    }
}

impl fmt::Display for SceneObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
