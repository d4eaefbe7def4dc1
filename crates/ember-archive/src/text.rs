//! TOML text archive

use ember_core::{ContentHash, EmberError, Result};
use ember_reflect::{Class, ElementRef, FieldKind, Registry, Value};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Newest text archive format this build can read
pub const TEXT_VERSION: u32 = 1;

/// Root structure of a text archive document
#[derive(Debug, Serialize, Deserialize)]
struct ArchiveDoc {
    archive: ArchiveHeader,
    #[serde(default)]
    elements: Vec<toml::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveHeader {
    version: u32,
}

/// Save elements to a text archive file
pub fn save_text<P: AsRef<Path>>(
    path: P,
    registry: &Registry,
    elements: &[ElementRef],
) -> Result<()> {
    let content = save_text_string(registry, elements)?;
    fs::write(path, content)?;
    Ok(())
}

/// Save elements to a TOML string
pub fn save_text_string(registry: &Registry, elements: &[ElementRef]) -> Result<String> {
    let mut records = Vec::with_capacity(elements.len());
    for element in elements {
        records.push(write_element(registry, element, true)?);
    }

    let doc = ArchiveDoc {
        archive: ArchiveHeader {
            version: TEXT_VERSION,
        },
        elements: records,
    };
    Ok(toml::to_string_pretty(&doc)?)
}

/// Load elements from a text archive file
pub fn load_text<P: AsRef<Path>>(path: P, registry: &Registry) -> Result<Vec<ElementRef>> {
    let content = fs::read_to_string(path)?;
    load_text_string(registry, &content)
}

/// Load elements from a TOML string
pub fn load_text_string(registry: &Registry, content: &str) -> Result<Vec<ElementRef>> {
    let doc: ArchiveDoc = toml::from_str(content)?;
    if doc.archive.version > TEXT_VERSION {
        return Err(EmberError::ArchiveVersionMismatch {
            found: doc.archive.version,
            supported: TEXT_VERSION,
        });
    }

    doc.elements
        .iter()
        .map(|record| read_element(registry, record))
        .collect()
}

fn write_element(
    registry: &Registry,
    element: &ElementRef,
    top_level: bool,
) -> Result<toml::Value> {
    let class_name = element.borrow().class_name();
    let class = registry
        .find(class_name)
        .ok_or_else(|| EmberError::ClassNotFound(class_name.to_string()))?;

    element.borrow_mut().pre_serialize();
    let fields = write_fields(registry, class, element);
    element.borrow_mut().post_serialize();
    let fields = fields?;

    let mut record = toml::map::Map::new();
    record.insert(
        "class".to_string(),
        toml::Value::String(class_name.to_string()),
    );
    if top_level {
        record.insert(
            "fingerprint".to_string(),
            toml::Value::String(class.fingerprint().to_prefixed_hex()),
        );
    }
    record.insert("fields".to_string(), toml::Value::Table(fields));
    Ok(toml::Value::Table(record))
}

fn write_fields(
    registry: &Registry,
    class: &Class,
    element: &ElementRef,
) -> Result<toml::map::Map<String, toml::Value>> {
    let mut fields = toml::map::Map::new();
    for field in &class.fields {
        if field.is_transient() {
            continue;
        }
        let value = element.borrow().get(&field.name).ok_or_else(|| {
            EmberError::ArchiveFormat(format!(
                "{} does not expose declared field {}",
                class.name, field.name
            ))
        })?;
        if let Some(raw) = value_to_toml(registry, &value)? {
            fields.insert(field.name.clone(), raw);
        }
    }
    Ok(fields)
}

/// Convert a field value to TOML. A null element *field* yields `None`
/// (the key is omitted); a null element inside an array is kept as a
/// `class = ""` marker table so array shape survives the round trip.
fn value_to_toml(registry: &Registry, value: &Value) -> Result<Option<toml::Value>> {
    let raw = match value {
        Value::Bool(v) => toml::Value::Boolean(*v),
        Value::I32(v) => toml::Value::Integer(*v as i64),
        Value::I64(v) => toml::Value::Integer(*v),
        Value::F32(v) => toml::Value::Float(*v as f64),
        Value::F64(v) => toml::Value::Float(*v),
        Value::String(v) => toml::Value::String(v.clone()),
        Value::Vec3(v) => toml::Value::Array(
            v.to_array()
                .iter()
                .map(|c| toml::Value::Float(*c as f64))
                .collect(),
        ),
        Value::Color(v) => toml::Value::Array(
            v.to_array()
                .iter()
                .map(|c| toml::Value::Float(*c as f64))
                .collect(),
        ),
        Value::Element(None) => return Ok(None),
        Value::Element(Some(target)) => write_element(registry, target, false)?,
        Value::Array(items) => {
            let mut raw_items = Vec::with_capacity(items.len());
            for item in items {
                match value_to_toml(registry, item)? {
                    Some(raw) => raw_items.push(raw),
                    None => {
                        let mut null_marker = toml::map::Map::new();
                        null_marker
                            .insert("class".to_string(), toml::Value::String(String::new()));
                        raw_items.push(toml::Value::Table(null_marker));
                    }
                }
            }
            toml::Value::Array(raw_items)
        }
    };
    Ok(Some(raw))
}

fn read_element(registry: &Registry, record: &toml::Value) -> Result<ElementRef> {
    let record = record
        .as_table()
        .ok_or_else(|| EmberError::ArchiveFormat("element record must be a table".to_string()))?;
    let class_name = record
        .get("class")
        .and_then(|v| v.as_str())
        .ok_or_else(|| EmberError::ArchiveFormat("element record missing class".to_string()))?;
    let class = registry
        .find(class_name)
        .ok_or_else(|| EmberError::ClassNotFound(class_name.to_string()))?;

    if let Some(stamp) = record.get("fingerprint").and_then(|v| v.as_str()) {
        match ContentHash::from_prefixed_hex(stamp) {
            Some(hash) if hash != class.fingerprint() => {
                log::warn!(
                    "archive fingerprint for {} does not match the registered layout",
                    class_name
                );
            }
            None => log::warn!("unparseable fingerprint on {} record", class_name),
            _ => {}
        }
    }

    let instance = registry.create_instance(class_name)?;
    instance.borrow_mut().pre_deserialize();
    read_fields(registry, class, &instance, record)?;
    instance.borrow_mut().post_deserialize();
    Ok(instance)
}

fn read_fields(
    registry: &Registry,
    class: &Class,
    instance: &ElementRef,
    record: &toml::map::Map<String, toml::Value>,
) -> Result<()> {
    let Some(fields) = record.get("fields").and_then(|v| v.as_table()) else {
        return Ok(());
    };

    for (key, raw) in fields {
        match class.field(key) {
            Some(field) if field.is_transient() => {
                log::debug!("ignoring archived transient field {}", key);
            }
            Some(field) => {
                let value = value_from_toml(registry, &field.kind, key, raw)?;
                instance.borrow_mut().set(key, value)?;
            }
            None => {
                log::warn!("ignoring unknown field {} on {} record", key, class.name);
            }
        }
    }
    Ok(())
}

fn value_from_toml(
    registry: &Registry,
    kind: &FieldKind,
    field_name: &str,
    raw: &toml::Value,
) -> Result<Value> {
    let value = match kind {
        FieldKind::Bool => Value::Bool(expect(raw.as_bool(), kind, field_name, raw)?),
        FieldKind::I32 => {
            let v = expect(raw.as_integer(), kind, field_name, raw)?;
            Value::I32(v.try_into().map_err(|_| {
                EmberError::ArchiveFormat(format!("field {}: {} overflows i32", field_name, v))
            })?)
        }
        FieldKind::I64 => Value::I64(expect(raw.as_integer(), kind, field_name, raw)?),
        FieldKind::F32 => Value::F32(expect(as_float_lenient(raw), kind, field_name, raw)? as f32),
        FieldKind::F64 => Value::F64(expect(as_float_lenient(raw), kind, field_name, raw)?),
        FieldKind::String => {
            Value::String(expect(raw.as_str(), kind, field_name, raw)?.to_string())
        }
        FieldKind::Vec3 => {
            let parts = float_seq(raw, 3, field_name)?;
            Value::Vec3(ember_core::Vec3::new(
                parts[0] as f32,
                parts[1] as f32,
                parts[2] as f32,
            ))
        }
        FieldKind::Color => {
            let parts = float_seq(raw, 4, field_name)?;
            Value::Color(ember_core::Color::new(
                parts[0] as f32,
                parts[1] as f32,
                parts[2] as f32,
                parts[3] as f32,
            ))
        }
        FieldKind::Element => {
            let table = expect(raw.as_table(), kind, field_name, raw)?;
            if table.get("class").and_then(|v| v.as_str()) == Some("") {
                Value::Element(None)
            } else {
                Value::Element(Some(read_element(registry, raw)?))
            }
        }
        FieldKind::Array { element } => {
            let items = expect(raw.as_array(), kind, field_name, raw)?;
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(value_from_toml(registry, element, field_name, item)?);
            }
            Value::Array(values)
        }
    };
    Ok(value)
}

fn expect<T>(
    parsed: Option<T>,
    kind: &FieldKind,
    field_name: &str,
    raw: &toml::Value,
) -> Result<T> {
    parsed.ok_or_else(|| EmberError::FieldTypeMismatch {
        field: field_name.to_string(),
        expected: kind.kind_name().to_string(),
        got: raw.type_str().to_string(),
    })
}

/// Allow integers where floats are expected
fn as_float_lenient(raw: &toml::Value) -> Option<f64> {
    raw.as_float().or_else(|| raw.as_integer().map(|v| v as f64))
}

fn float_seq(raw: &toml::Value, len: usize, field_name: &str) -> Result<Vec<f64>> {
    let items = raw.as_array().ok_or_else(|| EmberError::ArchiveFormat(format!(
        "field {}: expected an array of {} numbers",
        field_name, len
    )))?;
    if items.len() != len {
        return Err(EmberError::ArchiveFormat(format!(
            "field {}: expected {} components, got {}",
            field_name,
            len,
            items.len()
        )));
    }
    items
        .iter()
        .map(|item| {
            as_float_lenient(item).ok_or_else(|| {
                EmberError::ArchiveFormat(format!("field {}: non-numeric component", field_name))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{Color, Vec3};
    use ember_reflect::{element_ref, field_flags, mismatch, Element};
    use std::any::Any;

    #[derive(Default)]
    struct Gizmo {
        tag: String,
    }

    impl Element for Gizmo {
        fn class_name(&self) -> &'static str {
            "Gizmo"
        }
        fn get(&self, field: &str) -> Option<Value> {
            match field {
                "tag" => Some(Value::String(self.tag.clone())),
                _ => None,
            }
        }
        fn set(&mut self, field: &str, value: Value) -> ember_core::Result<()> {
            match (field, value) {
                ("tag", Value::String(v)) => {
                    self.tag = v;
                    Ok(())
                }
                ("tag", v) => Err(mismatch(field, "string", &v)),
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
    struct Doodad {
        flag: bool,
        count: i32,
        ratio: f32,
        name: String,
        offset: Vec3,
        tint: Color,
        child: Option<ElementRef>,
        tags: Vec<String>,
        scratch: i64,
        // Derived by post_deserialize, never archived
        hydrated: bool,
    }

    impl Element for Doodad {
        fn class_name(&self) -> &'static str {
            "Doodad"
        }
        fn get(&self, field: &str) -> Option<Value> {
            match field {
                "flag" => Some(Value::Bool(self.flag)),
                "count" => Some(Value::I32(self.count)),
                "ratio" => Some(Value::F32(self.ratio)),
                "name" => Some(Value::String(self.name.clone())),
                "offset" => Some(Value::Vec3(self.offset)),
                "tint" => Some(Value::Color(self.tint)),
                "child" => Some(Value::Element(self.child.clone())),
                "tags" => Some(Value::from(self.tags.clone())),
                "scratch" => Some(Value::I64(self.scratch)),
                _ => None,
            }
        }
        fn set(&mut self, field: &str, value: Value) -> ember_core::Result<()> {
            match (field, value) {
                ("flag", Value::Bool(v)) => self.flag = v,
                ("count", Value::I32(v)) => self.count = v,
                ("ratio", Value::F32(v)) => self.ratio = v,
                ("name", Value::String(v)) => self.name = v,
                ("offset", Value::Vec3(v)) => self.offset = v,
                ("tint", Value::Color(v)) => self.tint = v,
                ("child", Value::Element(v)) => self.child = v,
                ("tags", v @ Value::Array(_)) => {
                    self.tags = v
                        .into_string_vec()
                        .ok_or_else(|| EmberError::FieldTypeMismatch {
                            field: field.to_string(),
                            expected: "array of strings".to_string(),
                            got: "mixed array".to_string(),
                        })?;
                }
                ("scratch", Value::I64(v)) => self.scratch = v,
                (f, v)
                    if matches!(
                        f,
                        "flag" | "count" | "ratio" | "name" | "offset" | "tint" | "child"
                            | "tags" | "scratch"
                    ) =>
                {
                    return Err(mismatch(f, "a different kind", &v));
                }
                (f, _) => return Err(EmberError::UnknownField(f.to_string())),
            }
            Ok(())
        }
        fn post_deserialize(&mut self) {
            self.hydrated = true;
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn test_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                ember_reflect::Class::new("Gizmo", || element_ref(Gizmo::default()))
                    .with_field("tag", FieldKind::String),
            )
            .unwrap();
        registry
            .register(
                ember_reflect::Class::new("Doodad", || element_ref(Doodad::default()))
                    .with_field("flag", FieldKind::Bool)
                    .with_field("count", FieldKind::I32)
                    .with_field("ratio", FieldKind::F32)
                    .with_field("name", FieldKind::String)
                    .with_field("offset", FieldKind::Vec3)
                    .with_field("tint", FieldKind::Color)
                    .with_field("child", FieldKind::Element)
                    .with_field(
                        "tags",
                        FieldKind::Array {
                            element: Box::new(FieldKind::String),
                        },
                    )
                    .with_flagged_field("scratch", FieldKind::I64, field_flags::TRANSIENT),
            )
            .unwrap();
        registry
    }

    fn sample_doodad() -> ElementRef {
        element_ref(Doodad {
            flag: true,
            count: -3,
            ratio: 0.5,
            name: "lantern".to_string(),
            offset: Vec3::new(1.0, 2.0, 3.0),
            tint: Color::new(0.25, 0.5, 0.75, 1.0),
            child: Some(element_ref(Gizmo {
                tag: "wick".to_string(),
            })),
            tags: vec!["prop".to_string(), "light".to_string()],
            scratch: 99,
            hydrated: false,
        })
    }

    #[test]
    fn test_round_trip() {
        let registry = test_registry();
        let original = sample_doodad();

        let text = save_text_string(&registry, &[original.clone()]).unwrap();
        let loaded = load_text_string(&registry, &text).unwrap();

        assert_eq!(loaded.len(), 1);
        // Transient state differs, so compare the archived fields directly
        let restored = loaded[0].borrow();
        let restored = restored.as_any().downcast_ref::<Doodad>().unwrap();
        assert!(restored.flag);
        assert_eq!(restored.count, -3);
        assert_eq!(restored.ratio, 0.5);
        assert_eq!(restored.name, "lantern");
        assert_eq!(restored.offset, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(restored.tint, Color::new(0.25, 0.5, 0.75, 1.0));
        assert_eq!(restored.tags, vec!["prop".to_string(), "light".to_string()]);

        let child = restored.child.as_ref().unwrap().borrow();
        let child = child.as_any().downcast_ref::<Gizmo>().unwrap();
        assert_eq!(child.tag, "wick");
    }

    #[test]
    fn test_transient_fields_are_not_written() {
        let registry = test_registry();
        let text = save_text_string(&registry, &[sample_doodad()]).unwrap();
        assert!(!text.contains("scratch"));

        let loaded = load_text_string(&registry, &text).unwrap();
        let restored = loaded[0].borrow();
        let restored = restored.as_any().downcast_ref::<Doodad>().unwrap();
        assert_eq!(restored.scratch, 0);
    }

    #[test]
    fn test_post_deserialize_runs_after_fields() {
        let registry = test_registry();
        let text = save_text_string(&registry, &[sample_doodad()]).unwrap();
        let loaded = load_text_string(&registry, &text).unwrap();
        let restored = loaded[0].borrow();
        let restored = restored.as_any().downcast_ref::<Doodad>().unwrap();
        assert!(restored.hydrated);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let registry = test_registry();
        let text = r#"
[archive]
version = 1

[[elements]]
class = "Gizmo"

[elements.fields]
tag = "ok"
mystery = 12
"#;
        let loaded = load_text_string(&registry, text).unwrap();
        let restored = loaded[0].borrow();
        let restored = restored.as_any().downcast_ref::<Gizmo>().unwrap();
        assert_eq!(restored.tag, "ok");
    }

    #[test]
    fn test_missing_fields_keep_defaults() {
        let registry = test_registry();
        let text = r#"
[archive]
version = 1

[[elements]]
class = "Doodad"

[elements.fields]
name = "bare"
"#;
        let loaded = load_text_string(&registry, text).unwrap();
        let restored = loaded[0].borrow();
        let restored = restored.as_any().downcast_ref::<Doodad>().unwrap();
        assert_eq!(restored.name, "bare");
        assert_eq!(restored.count, 0);
        assert!(restored.child.is_none());
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let registry = test_registry();
        let text = "[archive]\nversion = 99\n";
        assert!(matches!(
            load_text_string(&registry, text),
            Err(EmberError::ArchiveVersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_unregistered_class_is_an_error() {
        let registry = test_registry();
        let text = "[archive]\nversion = 1\n\n[[elements]]\nclass = \"Ghost\"\n";
        assert!(matches!(
            load_text_string(&registry, text),
            Err(EmberError::ClassNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let registry = test_registry();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doodad.ember.toml");

        save_text(&path, &registry, &[sample_doodad()]).unwrap();
        let loaded = load_text(&path, &registry).unwrap();
        assert_eq!(loaded.len(), 1);
    }
}
