//! Class registry: lookup, instantiation, and the clone protocol

use crate::class::Class;
use crate::element::ElementRef;
use crate::value::Value;
use ember_core::{EmberError, Result};
use std::collections::HashMap;

#[cfg(feature = "diagnostics")]
use crate::element::ElementWeak;
#[cfg(feature = "diagnostics")]
use std::cell::RefCell;
#[cfg(feature = "diagnostics")]
use std::rc::Rc;

/// Registry that holds all registered element classes.
///
/// An explicitly-constructed context object: callers create one at startup,
/// register classes into it, pass it by reference to clone/traversal/archive
/// code, and call `shutdown` at teardown. After shutdown every lookup fails
/// deterministically.
#[derive(Debug, Default)]
pub struct Registry {
    classes: HashMap<String, Class>,
    shut_down: bool,
    /// Weak ledger of every instance created through this registry
    #[cfg(feature = "diagnostics")]
    live: RefCell<Vec<(ElementWeak, String)>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class.
    ///
    /// Fails with `DuplicateRegistration` if the name is taken; the original
    /// registration is left intact.
    pub fn register(&mut self, class: Class) -> Result<()> {
        if self.shut_down {
            return Err(EmberError::RegistryShutDown);
        }
        if self.classes.contains_key(&class.name) {
            log::warn!("class {} is already registered", class.name);
            return Err(EmberError::DuplicateRegistration(class.name));
        }
        log::debug!("registered class {}", class.name);
        self.classes.insert(class.name.clone(), class);
        Ok(())
    }

    /// Get a class by name
    pub fn find(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    /// List all registered class names
    pub fn class_names(&self) -> Vec<&str> {
        self.classes.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Default-construct an instance of a registered class
    pub fn create_instance(&self, name: &str) -> Result<ElementRef> {
        let class = self
            .find(name)
            .ok_or_else(|| EmberError::ClassNotFound(name.to_string()))?;
        let instance = (class.creator)();
        #[cfg(feature = "diagnostics")]
        self.live
            .borrow_mut()
            .push((Rc::downgrade(&instance), class.name.clone()));
        Ok(instance)
    }

    /// Clone an element graph, tolerating a null source
    pub fn clone_optional(&self, element: Option<&ElementRef>) -> Result<Option<ElementRef>> {
        match element {
            Some(element) => Ok(Some(self.clone_element(element)?)),
            None => Ok(None),
        }
    }

    /// Deep-clone an element.
    ///
    /// The hook order is fixed: `pre_serialize` on the source,
    /// `pre_deserialize` on the clone, field-by-field copy (element-valued
    /// fields are cloned recursively, not aliased), `post_deserialize` on
    /// the clone, `post_serialize` on the source. If a field copy fails the
    /// partial clone is discarded and `CloneFailure` is returned; the source
    /// still receives `post_serialize` so its hooks stay balanced, while the
    /// discarded clone never sees `post_deserialize`.
    pub fn clone_element(&self, element: &ElementRef) -> Result<ElementRef> {
        let class_name = element.borrow().class_name();
        let class = self
            .find(class_name)
            .ok_or_else(|| EmberError::ClassNotFound(class_name.to_string()))?;
        let clone = self.create_instance(class_name)?;

        element.borrow_mut().pre_serialize();
        clone.borrow_mut().pre_deserialize();

        let copied = self.copy_fields(class, element, &clone);

        match copied {
            Ok(()) => {
                clone.borrow_mut().post_deserialize();
                element.borrow_mut().post_serialize();
                Ok(clone)
            }
            Err(err) => {
                element.borrow_mut().post_serialize();
                Err(err)
            }
        }
    }

    fn copy_fields(&self, class: &Class, src: &ElementRef, dst: &ElementRef) -> Result<()> {
        for field in &class.fields {
            let value = src.borrow().get(&field.name).ok_or_else(|| {
                EmberError::CloneFailure {
                    class: class.name.clone(),
                    field: field.name.clone(),
                    reason: "source does not expose the declared field".to_string(),
                }
            })?;
            let value = self.copy_value(value).map_err(|err| EmberError::CloneFailure {
                class: class.name.clone(),
                field: field.name.clone(),
                reason: err.to_string(),
            })?;
            dst.borrow_mut()
                .set(&field.name, value)
                .map_err(|err| EmberError::CloneFailure {
                    class: class.name.clone(),
                    field: field.name.clone(),
                    reason: err.to_string(),
                })?;
        }
        Ok(())
    }

    fn copy_value(&self, value: Value) -> Result<Value> {
        match value {
            Value::Element(Some(child)) => Ok(Value::Element(Some(self.clone_element(&child)?))),
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.copy_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }

    /// Structural equality of two element graphs: same dynamic class and
    /// deep-equal declared fields. Element-valued fields compare by
    /// contents, not identity.
    pub fn deep_eq(&self, a: &ElementRef, b: &ElementRef) -> bool {
        let class_name = a.borrow().class_name();
        if class_name != b.borrow().class_name() {
            return false;
        }
        let Some(class) = self.find(class_name) else {
            return false;
        };
        for field in &class.fields {
            let (va, vb) = (a.borrow().get(&field.name), b.borrow().get(&field.name));
            match (va, vb) {
                (Some(va), Some(vb)) => {
                    if !self.value_eq(&va, &vb) {
                        return false;
                    }
                }
                (None, None) => {}
                _ => return false,
            }
        }
        true
    }

    fn value_eq(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Vec3(a), Value::Vec3(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::Element(None), Value::Element(None)) => true,
            (Value::Element(Some(a)), Value::Element(Some(b))) => self.deep_eq(a, b),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| self.value_eq(a, b))
            }
            _ => false,
        }
    }

    /// Tear the registry down.
    ///
    /// Idempotent. Afterwards `find` returns `None` and `register` fails
    /// with `RegistryShutDown`.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        log::debug!("shutting down class registry ({} classes)", self.classes.len());
        self.classes.clear();
        self.shut_down = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Enumerate instances created through this registry that are still
    /// alive, as (class name, strong count) pairs. Dead entries are pruned.
    #[cfg(feature = "diagnostics")]
    pub fn live_instances(&self) -> Vec<(String, usize)> {
        let mut live = self.live.borrow_mut();
        live.retain(|(weak, _)| weak.strong_count() > 0);
        live.iter()
            .map(|(weak, name)| (name.clone(), weak.strong_count()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::field_flags;
    use crate::element::{element_ref, Element};
    use crate::value::{mismatch, FieldKind};
    use std::any::Any;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Leaf {
        id: i32,
    }

    impl Element for Leaf {
        fn class_name(&self) -> &'static str {
            "Leaf"
        }
        fn get(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(Value::I32(self.id)),
                _ => None,
            }
        }
        fn set(&mut self, field: &str, value: Value) -> Result<()> {
            match (field, value) {
                ("id", Value::I32(v)) => {
                    self.id = v;
                    Ok(())
                }
                ("id", v) => Err(mismatch(field, "i32", &v)),
                (_, _) => Err(EmberError::UnknownField(field.to_string())),
            }
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Default)]
    struct Node {
        label: String,
        child: Option<ElementRef>,
    }

    impl Element for Node {
        fn class_name(&self) -> &'static str {
            "Node"
        }
        fn get(&self, field: &str) -> Option<Value> {
            match field {
                "label" => Some(Value::String(self.label.clone())),
                "child" => Some(Value::Element(self.child.clone())),
                _ => None,
            }
        }
        fn set(&mut self, field: &str, value: Value) -> Result<()> {
            match (field, value) {
                ("label", Value::String(v)) => {
                    self.label = v;
                    Ok(())
                }
                ("child", Value::Element(v)) => {
                    self.child = v;
                    Ok(())
                }
                ("label", v) => Err(mismatch(field, "string", &v)),
                ("child", v) => Err(mismatch(field, "element", &v)),
                (_, _) => Err(EmberError::UnknownField(field.to_string())),
            }
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    thread_local! {
        static HOOK_LOG: RefCell<Vec<(usize, &'static str)>> = RefCell::new(Vec::new());
    }

    #[derive(Default)]
    struct Hooked {
        value: i32,
    }

    impl Hooked {
        fn log(&self, hook: &'static str) {
            let addr = self as *const Hooked as usize;
            HOOK_LOG.with(|log| log.borrow_mut().push((addr, hook)));
        }
    }

    impl Element for Hooked {
        fn class_name(&self) -> &'static str {
            "Hooked"
        }
        fn get(&self, field: &str) -> Option<Value> {
            match field {
                "value" => Some(Value::I32(self.value)),
                _ => None,
            }
        }
        fn set(&mut self, field: &str, value: Value) -> Result<()> {
            match (field, value) {
                ("value", Value::I32(v)) => {
                    self.value = v;
                    Ok(())
                }
                (_, _) => Err(EmberError::UnknownField(field.to_string())),
            }
        }
        fn pre_serialize(&mut self) {
            self.log("pre_serialize");
        }
        fn post_serialize(&mut self) {
            self.log("post_serialize");
        }
        fn pre_deserialize(&mut self) {
            self.log("pre_deserialize");
        }
        fn post_deserialize(&mut self) {
            self.log("post_deserialize");
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn leaf_class() -> Class {
        Class::new("Leaf", || element_ref(Leaf::default())).with_field("id", FieldKind::I32)
    }

    fn node_class() -> Class {
        Class::new("Node", || element_ref(Node::default()))
            .with_field("label", FieldKind::String)
            .with_field("child", FieldKind::Element)
    }

    fn hooked_class() -> Class {
        Class::new("Hooked", || element_ref(Hooked::default())).with_field("value", FieldKind::I32)
    }

    fn test_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(leaf_class()).unwrap();
        registry.register(node_class()).unwrap();
        registry.register(hooked_class()).unwrap();
        registry
    }

    fn addr_of(element: &ElementRef) -> usize {
        let borrowed = element.borrow();
        borrowed.as_any().downcast_ref::<Hooked>().unwrap() as *const Hooked as usize
    }

    #[test]
    fn test_duplicate_registration_keeps_original() {
        let mut registry = Registry::new();
        registry.register(leaf_class()).unwrap();

        let replacement =
            Class::new("Leaf", || element_ref(Leaf::default())).with_field("other", FieldKind::Bool);
        assert!(matches!(
            registry.register(replacement),
            Err(EmberError::DuplicateRegistration(_))
        ));

        // The original field layout is still the registered one
        let class = registry.find("Leaf").unwrap();
        assert!(class.field("id").is_some());
        assert!(class.field("other").is_none());
    }

    #[test]
    fn test_find_miss_is_none() {
        let registry = test_registry();
        assert!(registry.find("Missing").is_none());
    }

    #[test]
    fn test_clone_null_is_null() {
        let registry = test_registry();
        assert!(registry.clone_optional(None).unwrap().is_none());
    }

    #[test]
    fn test_clone_is_deep_and_independent() {
        let registry = test_registry();

        let leaf = element_ref(Leaf { id: 7 });
        let node = element_ref(Node {
            label: "root".to_string(),
            child: Some(leaf.clone()),
        });

        let clone = registry.clone_element(&node).unwrap();
        assert!(registry.deep_eq(&node, &clone));

        // The clone's child is a fresh object, not an alias
        let cloned_child = match clone.borrow().get("child").unwrap() {
            Value::Element(Some(child)) => child,
            other => panic!("unexpected child value: {:?}", other),
        };
        assert!(!std::rc::Rc::ptr_eq(&leaf, &cloned_child));

        // Mutating the source leaf no longer affects the clone
        leaf.borrow_mut().set("id", Value::I32(99)).unwrap();
        assert!(!registry.deep_eq(&node, &clone));
    }

    #[test]
    fn test_clone_of_clone_matches_clone() {
        let registry = test_registry();

        let node = element_ref(Node {
            label: "a".to_string(),
            child: Some(element_ref(Leaf { id: 3 })),
        });

        let once = registry.clone_element(&node).unwrap();
        let twice = registry.clone_element(&once).unwrap();
        assert!(registry.deep_eq(&once, &twice));
    }

    #[test]
    fn test_clone_hook_order() {
        let registry = test_registry();
        let src = element_ref(Hooked { value: 5 });
        let src_addr = addr_of(&src);

        let clone = registry.clone_element(&src).unwrap();
        let clone_addr = addr_of(&clone);

        let log = HOOK_LOG.with(|log| log.borrow().clone());
        assert_eq!(
            log,
            vec![
                (src_addr, "pre_serialize"),
                (clone_addr, "pre_deserialize"),
                (clone_addr, "post_deserialize"),
                (src_addr, "post_serialize"),
            ]
        );
    }

    #[test]
    fn test_clone_failure_discards_clone_and_balances_source_hooks() {
        let mut registry = Registry::new();
        // Declare a field the element does not expose; the copy must fail
        registry
            .register(
                Class::new("Hooked", || element_ref(Hooked::default()))
                    .with_field("value", FieldKind::I32)
                    .with_field("phantom", FieldKind::Bool),
            )
            .unwrap();

        let src = element_ref(Hooked { value: 1 });
        let src_addr = addr_of(&src);

        let result = registry.clone_element(&src);
        assert!(matches!(result, Err(EmberError::CloneFailure { .. })));

        let log = HOOK_LOG.with(|log| log.borrow().clone());
        // Source hooks are balanced; the discarded clone never reached
        // post_deserialize
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], (src_addr, "pre_serialize"));
        assert_eq!(log[1].1, "pre_deserialize");
        assert_ne!(log[1].0, src_addr);
        assert_eq!(log[2], (src_addr, "post_serialize"));
    }

    #[test]
    fn test_transient_fields_are_still_cloned() {
        let mut registry = Registry::new();
        registry
            .register(
                Class::new("Leaf", || element_ref(Leaf::default())).with_flagged_field(
                    "id",
                    FieldKind::I32,
                    field_flags::TRANSIENT,
                ),
            )
            .unwrap();

        let leaf = element_ref(Leaf { id: 42 });
        let clone = registry.clone_element(&leaf).unwrap();
        assert!(matches!(
            clone.borrow().get("id").unwrap(),
            Value::I32(42)
        ));
    }

    #[test]
    fn test_shutdown_is_deterministic() {
        let mut registry = test_registry();
        registry.shutdown();

        assert!(registry.find("Leaf").is_none());
        assert!(matches!(
            registry.register(leaf_class()),
            Err(EmberError::RegistryShutDown)
        ));
        assert!(matches!(
            registry.create_instance("Leaf"),
            Err(EmberError::ClassNotFound(_))
        ));

        // Idempotent
        registry.shutdown();
        assert!(registry.is_shut_down());
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn test_live_instance_ledger() {
        let registry = test_registry();

        let kept = registry.create_instance("Leaf").unwrap();
        {
            let _dropped = registry.create_instance("Node").unwrap();
            assert_eq!(registry.live_instances().len(), 2);
        }

        let live = registry.live_instances();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, "Leaf");
        drop(kept);
        assert!(registry.live_instances().is_empty());
    }
}
