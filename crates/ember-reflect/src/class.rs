//! Per-class field metadata

use crate::element::ElementRef;
use crate::value::FieldKind;
use ember_core::ContentHash;

/// Field behavior flags
pub mod field_flags {
    /// Skipped by archives; still copied by clone
    pub const TRANSIENT: u32 = 1 << 0;
}

/// Metadata for a single field declared by a class
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub flags: u32,
}

impl Field {
    pub fn is_transient(&self) -> bool {
        self.flags & field_flags::TRANSIENT != 0
    }
}

/// Reflection metadata for one element type: a creator function and the
/// declared field list.
///
/// Fields are kept in declaration order; traversal and the archives walk
/// them in that order, so reordering a class's fields changes its
/// fingerprint.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub creator: fn() -> ElementRef,
    pub fields: Vec<Field>,
}

impl Class {
    pub fn new(name: impl Into<String>, creator: fn() -> ElementRef) -> Self {
        Self {
            name: name.into(),
            creator,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            flags: 0,
        });
        self
    }

    pub fn with_flagged_field(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        flags: u32,
    ) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            flags,
        });
        self
    }

    /// Look up a declared field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All declared field names, in declaration order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Hash of the class name and ordered field layout.
    ///
    /// Archives stamp records with this so a reader can tell when the
    /// layout that wrote a record differs from the one reading it back.
    pub fn fingerprint(&self) -> ContentHash {
        let mut layout = String::new();
        layout.push_str(&self.name);
        for field in &self.fields {
            layout.push(';');
            layout.push_str(&field.name);
            layout.push(':');
            layout.push_str(&field.kind.signature());
        }
        ContentHash::from_str(&layout)
    }
}
