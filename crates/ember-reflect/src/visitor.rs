//! Depth-first traversal over element graphs

use crate::class::Field;
use crate::element::ElementRef;
use crate::registry::Registry;
use crate::value::Value;
use std::collections::HashSet;
use std::rc::Rc;

/// A traversal strategy invoked per element, pointer, and field during a
/// graph walk.
///
/// Every callback defaults to `true` (continue). Returning `false` prunes
/// the subtree under the visited node; sibling fields of the same element
/// are still visited.
pub trait Visitor {
    /// Called for every element reached by the walk, including the root
    fn visit_element(&mut self, _element: &ElementRef) -> bool {
        true
    }

    /// Called for every element-valued slot before the walk descends into
    /// it. The visitor may substitute a different target (or null the slot);
    /// a substitution is written back into the owning field and the walk
    /// descends into the new target.
    fn visit_pointer(&mut self, _pointer: &mut Option<ElementRef>) -> bool {
        true
    }

    /// Called for every declared field before its value is examined
    fn visit_field(&mut self, _element: &ElementRef, _field: &Field) -> bool {
        true
    }
}

/// Walk an element graph depth-first in field declaration order.
///
/// Descends through element-valued fields and element entries inside array
/// fields. Strong references form an ownership tree, so the walk does not
/// track visited objects; an element reachable through two fields is
/// visited twice.
pub fn walk(registry: &Registry, element: &ElementRef, visitor: &mut dyn Visitor) {
    if !visitor.visit_element(element) {
        return;
    }

    let class_name = element.borrow().class_name();
    let Some(class) = registry.find(class_name) else {
        log::debug!("walk reached unregistered class {}", class_name);
        return;
    };

    for field in &class.fields {
        if !visitor.visit_field(element, field) {
            continue;
        }
        let value = match element.borrow().get(&field.name) {
            Some(value) => value,
            None => continue,
        };
        match value {
            Value::Element(slot) => {
                let mut slot = slot;
                let before = slot.clone();
                let descend = visitor.visit_pointer(&mut slot);
                if !same_target(&before, &slot) {
                    if let Err(err) = element
                        .borrow_mut()
                        .set(&field.name, Value::Element(slot.clone()))
                    {
                        log::warn!("pointer substitution on {} rejected: {}", field.name, err);
                    }
                }
                if descend {
                    if let Some(target) = slot {
                        walk(registry, &target, visitor);
                    }
                }
            }
            Value::Array(items) => {
                let mut items = items;
                let mut substituted = false;
                let mut targets = Vec::new();
                for item in items.iter_mut() {
                    if let Value::Element(slot) = item {
                        let before = slot.clone();
                        let descend = visitor.visit_pointer(slot);
                        if !same_target(&before, slot) {
                            substituted = true;
                        }
                        if descend {
                            if let Some(target) = slot.clone() {
                                targets.push(target);
                            }
                        }
                    }
                }
                if substituted {
                    if let Err(err) = element.borrow_mut().set(&field.name, Value::Array(items)) {
                        log::warn!("pointer substitution on {} rejected: {}", field.name, err);
                    }
                }
                for target in &targets {
                    walk(registry, target, visitor);
                }
            }
            _ => {}
        }
    }
}

fn same_target(a: &Option<ElementRef>, b: &Option<ElementRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// Collects every visited element whose dynamic class matches a single
/// class name exactly, in encounter order, without deduplication.
///
/// The result sequence is owned by the caller and must outlive the visitor.
pub struct FindByTypeVisitor<'a> {
    class_name: &'a str,
    found: &'a mut Vec<ElementRef>,
}

impl<'a> FindByTypeVisitor<'a> {
    pub fn new(class_name: &'a str, found: &'a mut Vec<ElementRef>) -> Self {
        Self { class_name, found }
    }
}

impl Visitor for FindByTypeVisitor<'_> {
    fn visit_element(&mut self, element: &ElementRef) -> bool {
        if element.borrow().class_name() == self.class_name {
            self.found.push(element.clone());
        }
        true
    }
}

/// Collects every visited element whose dynamic class is a member of a
/// caller-owned class name set, in encounter order, without deduplication.
pub struct FindByTypeSetVisitor<'a> {
    class_names: &'a HashSet<String>,
    found: &'a mut Vec<ElementRef>,
}

impl<'a> FindByTypeSetVisitor<'a> {
    pub fn new(class_names: &'a HashSet<String>, found: &'a mut Vec<ElementRef>) -> Self {
        Self { class_names, found }
    }
}

impl Visitor for FindByTypeSetVisitor<'_> {
    fn visit_element(&mut self, element: &ElementRef) -> bool {
        if self.class_names.contains(element.borrow().class_name()) {
            self.found.push(element.clone());
        }
        true
    }
}
