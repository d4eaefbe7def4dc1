//! The base reflectable object trait

use crate::value::Value;
use ember_core::Result;
use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A strong, owning reference to a reflectable object.
///
/// Object graphs are single-threaded; strong references form the ownership
/// tree that clone and traversal walk.
pub type ElementRef = Rc<RefCell<dyn Element>>;

/// A weak back-reference that does not extend the target's lifetime
pub type ElementWeak = Weak<RefCell<dyn Element>>;

/// The base reflectable object.
///
/// Implementations expose their state through `get`/`set` keyed on the field
/// names their `Class` declares. The four lifecycle hooks bracket clone and
/// archive operations in a fixed order: `pre_serialize` / `post_serialize`
/// on the object being read, `pre_deserialize` / `post_deserialize` on the
/// object being populated.
pub trait Element: Any {
    /// The registered class name of this object's dynamic type
    fn class_name(&self) -> &'static str;

    /// Read a field by name; `None` if the field is not exposed
    fn get(&self, field: &str) -> Option<Value>;

    /// Write a field by name
    fn set(&mut self, field: &str, value: Value) -> Result<()>;

    fn pre_serialize(&mut self) {}
    fn post_serialize(&mut self) {}
    fn pre_deserialize(&mut self) {}
    fn post_deserialize(&mut self) {}

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Wrap a concrete element in the shared reference type
pub fn element_ref<T: Element>(element: T) -> ElementRef {
    Rc::new(RefCell::new(element))
}
