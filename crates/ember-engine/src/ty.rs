//! Runtime type descriptors for engine objects

use ember_core::{EmberError, Result};
use ember_reflect::ElementRef;
use std::collections::HashMap;
use std::rc::Rc;

/// General type flags
pub mod type_flags {
    /// Type should not be instantiated
    pub const ABSTRACT: u32 = 1 << 0;
    /// Instances of this type are never archived
    pub const TRANSIENT: u32 = 1 << 1;
    /// Instances of this type cannot be used as templates
    pub const NO_TEMPLATE: u32 = 1 << 2;
}

/// Shared-ownership handle to a type descriptor
pub type TypeRef = Rc<Type>;

/// Run-time type information for engine-object classes.
///
/// Types form a tree: every type except the root has exactly one parent.
/// A type shares ownership of its parent and of its template instance, so
/// neither can be torn down while the type is alive.
pub struct Type {
    name: String,
    package: String,
    parent: Option<TypeRef>,
    template: Option<ElementRef>,
    flags: u32,
}

impl Type {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package path grouping this type's template object
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn parent(&self) -> Option<&TypeRef> {
        self.parent.as_ref()
    }

    /// Default template instance for this type, if it has one
    pub fn template(&self) -> Option<&ElementRef> {
        self.template.as_ref()
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn is_abstract(&self) -> bool {
        self.flags & type_flags::ABSTRACT != 0
    }

    pub fn is_transient(&self) -> bool {
        self.flags & type_flags::TRANSIENT != 0
    }

    /// True iff `other` is this type or an ancestor of it.
    ///
    /// Walks the parent chain; the root type is only a subtype of itself.
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty.name == other.name {
                return true;
            }
            current = ty.parent.as_deref();
        }
        false
    }
}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Type")
            .field("name", &self.name)
            .field("package", &self.package)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("has_template", &self.template.is_some())
            .field("flags", &self.flags)
            .finish()
    }
}

/// Registry of engine-object types, keyed by name.
///
/// An explicitly-constructed context object bracketed by startup
/// registration and a single `shutdown` at teardown.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeRef>,
    shut_down: bool,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new type.
    ///
    /// Fails with `DuplicateRegistration` if the name is taken; the original
    /// registration is left intact. Takes shared ownership of `parent` and
    /// `template`.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        package: impl Into<String>,
        parent: Option<TypeRef>,
        template: Option<ElementRef>,
        flags: u32,
    ) -> Result<TypeRef> {
        if self.shut_down {
            return Err(EmberError::RegistryShutDown);
        }
        let name = name.into();
        if self.types.contains_key(&name) {
            log::warn!("type {} is already registered", name);
            return Err(EmberError::DuplicateRegistration(name));
        }

        let ty = Rc::new(Type {
            name: name.clone(),
            package: package.into(),
            parent,
            template,
            flags,
        });
        log::debug!("registered type {}", name);
        self.types.insert(name, ty.clone());
        Ok(ty)
    }

    /// Look a type up by name
    pub fn find(&self, name: &str) -> Option<TypeRef> {
        self.types.get(name).cloned()
    }

    /// Remove a type from the registry.
    ///
    /// Caller contract: no strong references beyond the registry's own may
    /// be outstanding (other types still naming this one as parent keep it
    /// alive and make the removal pointless).
    pub fn unregister(&mut self, ty: &Type) -> bool {
        self.types.remove(ty.name()).is_some()
    }

    /// Iterate over all registered types
    pub fn iter(&self) -> impl Iterator<Item = &TypeRef> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Tear the registry down.
    ///
    /// Idempotent. Afterwards `find` returns `None` and `create` fails with
    /// `RegistryShutDown`.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        log::debug!("shutting down type registry ({} types)", self.types.len());
        self.types.clear();
        self.shut_down = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}
