//! Spatial transform collaborator

use ember_core::{Transform, Vec3};

/// Supplies the spatial transform a component reads each update.
///
/// Components never own a transform; they borrow one for the duration of
/// each attach/update/detach call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformComponent {
    pub transform: Transform,
}

impl TransformComponent {
    pub fn new(transform: Transform) -> Self {
        Self { transform }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            transform: Transform::from_position(position),
        }
    }

    /// World matrix for scene synchronization
    pub fn world_matrix(&self) -> [[f32; 4]; 4] {
        self.transform.to_matrix()
    }
}
