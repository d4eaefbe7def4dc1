//! Component attachment contract

use crate::transform::TransformComponent;
use crate::world::World;

/// Where a component is in its attachment lifecycle.
///
/// `Unattached -> Attached -> (update)* -> Detached`; a detached component
/// may be attached again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    Unattached,
    Attached,
    Detached,
}

/// A live component bound to a world for the duration of an
/// attach/detach bracket.
///
/// Calling `attach` on an attached component, or `update`/`detach` on one
/// that is not attached, is a contract violation: it asserts in debug
/// builds and is a logged no-op in release builds. Violations never
/// overwrite or leak a live scene registration.
pub trait Component {
    fn attach(&mut self, world: &mut World, transform: &TransformComponent);
    fn detach(&mut self, world: &mut World);
    fn update(&mut self, world: &mut World, transform: &TransformComponent);
    fn attach_state(&self) -> AttachState;
}
