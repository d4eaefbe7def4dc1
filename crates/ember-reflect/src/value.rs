//! Dynamic field values and field kinds

use crate::element::ElementRef;
use ember_core::{Color, EmberError, Vec3};
use serde::{Deserialize, Serialize};

/// The kind of a field declared in class metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Bool,
    I32,
    I64,
    F32,
    F64,
    String,
    Vec3,
    Color,
    Element,
    Array { element: Box<FieldKind> },
}

impl FieldKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::I32 => "i32",
            FieldKind::I64 => "i64",
            FieldKind::F32 => "f32",
            FieldKind::F64 => "f64",
            FieldKind::String => "string",
            FieldKind::Vec3 => "vec3",
            FieldKind::Color => "color",
            FieldKind::Element => "element",
            FieldKind::Array { .. } => "array",
        }
    }

    /// Full signature, including the element kind of arrays.
    ///
    /// Feeds class fingerprints, so the result must be stable across runs.
    pub fn signature(&self) -> String {
        match self {
            FieldKind::Array { element } => format!("array<{}>", element.signature()),
            other => other.kind_name().to_string(),
        }
    }
}

/// A dynamically-typed field value
///
/// `Element` carries a strong reference to another reflectable object
/// (`None` is a null reference). Everything an element exposes through
/// `get`/`set` crosses this type, so clone, traversal, and the archives
/// never touch concrete element structs.
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Vec3(Vec3),
    Color(Color),
    Element(Option<ElementRef>),
    Array(Vec<Value>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Vec3(_) => "vec3",
            Value::Color(_) => "color",
            Value::Element(_) => "element",
            Value::Array(_) => "array",
        }
    }

    /// Whether this value is acceptable for a field of the given kind
    pub fn matches(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Value::Bool(_), FieldKind::Bool)
            | (Value::I32(_), FieldKind::I32)
            | (Value::I64(_), FieldKind::I64)
            | (Value::F32(_), FieldKind::F32)
            | (Value::F64(_), FieldKind::F64)
            | (Value::String(_), FieldKind::String)
            | (Value::Vec3(_), FieldKind::Vec3)
            | (Value::Color(_), FieldKind::Color)
            | (Value::Element(_), FieldKind::Element) => true,
            (Value::Array(items), FieldKind::Array { element }) => {
                items.iter().all(|item| item.matches(element))
            }
            _ => false,
        }
    }

    /// Extract a Vec<String> from an array of string values
    pub fn into_string_vec(self) -> Option<Vec<String>> {
        match self {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::I32(v) => write!(f, "I32({})", v),
            Value::I64(v) => write!(f, "I64({})", v),
            Value::F32(v) => write!(f, "F32({})", v),
            Value::F64(v) => write!(f, "F64({})", v),
            Value::String(v) => write!(f, "String({:?})", v),
            Value::Vec3(v) => write!(f, "Vec3({:?})", v),
            Value::Color(v) => write!(f, "Color({:?})", v),
            Value::Element(None) => write!(f, "Element(None)"),
            Value::Element(Some(target)) => match target.try_borrow() {
                Ok(target) => write!(f, "Element({})", target.class_name()),
                Err(_) => write!(f, "Element(<borrowed>)"),
            },
            Value::Array(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::Array(items.into_iter().map(Value::String).collect())
    }
}

/// Build the standard error for a `set` with a value of the wrong kind
pub fn mismatch(field: &str, expected: &str, got: &Value) -> EmberError {
    EmberError::FieldTypeMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
        got: got.kind_name().to_string(),
    }
}
