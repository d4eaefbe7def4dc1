//! Ember Reflect - Runtime reflection for engine objects
//!
//! This crate provides the reflection object model:
//! - `Class` - per-type field metadata and a creator function
//! - `Element` - the base reflectable object trait
//! - `Registry` - class lookup, instantiation, and the clone protocol
//! - `Visitor` - depth-first traversal over element graphs

mod class;
mod element;
mod registry;
mod value;
mod visitor;

pub use class::{field_flags, Class, Field};
pub use element::{element_ref, Element, ElementRef, ElementWeak};
pub use registry::Registry;
pub use value::{mismatch, FieldKind, Value};
pub use visitor::{walk, FindByTypeSetVisitor, FindByTypeVisitor, Visitor};
