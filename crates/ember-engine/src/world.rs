//! The world a component attaches to

use crate::scene::GraphicsScene;

/// Owns the graphics scene components register their renderable state with.
///
/// Components hold no reference to the world; it is passed by reference
/// into every attach/update/detach call.
#[derive(Debug, Default)]
pub struct World {
    scene: GraphicsScene,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(&self) -> &GraphicsScene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut GraphicsScene {
        &mut self.scene
    }
}
