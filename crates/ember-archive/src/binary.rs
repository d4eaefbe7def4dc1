//! Length-prefixed binary archive
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic "EMBA" | format version u32 | element count u32 | element...
//! element: class name (u16 len + utf8) | fingerprint 32 bytes |
//!          field count u16 | field...
//! field:   name (u16 len + utf8) | kind tag u8 | payload len u32 | payload
//! ```
//!
//! Every field payload is length-prefixed, so a reader that does not
//! recognize a field name or kind tag skips exactly that many bytes and
//! keeps going. A null element pointer is encoded as a zero-length class
//! name.

use ember_core::{Color, ContentHash, EmberError, Result, Vec3};
use ember_reflect::{Class, ElementRef, FieldKind, Registry, Value};
use std::fs;
use std::path::Path;

pub const MAGIC: [u8; 4] = *b"EMBA";

/// Newest binary archive format this build can read
pub const BINARY_VERSION: u32 = 1;

const TAG_BOOL: u8 = 0x01;
const TAG_I32: u8 = 0x02;
const TAG_I64: u8 = 0x03;
const TAG_F32: u8 = 0x04;
const TAG_F64: u8 = 0x05;
const TAG_STRING: u8 = 0x06;
const TAG_VEC3: u8 = 0x07;
const TAG_COLOR: u8 = 0x08;
const TAG_ELEMENT: u8 = 0x09;
const TAG_ARRAY: u8 = 0x0a;

/// Save elements to a binary archive file
pub fn save_binary<P: AsRef<Path>>(
    path: P,
    registry: &Registry,
    elements: &[ElementRef],
) -> Result<()> {
    let bytes = save_binary_bytes(registry, elements)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Encode elements to binary archive bytes
pub fn save_binary_bytes(registry: &Registry, elements: &[ElementRef]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    write_u32(&mut out, BINARY_VERSION);
    write_u32(&mut out, elements.len() as u32);
    for element in elements {
        encode_element(registry, &mut out, element)?;
    }
    Ok(out)
}

/// Load elements from a binary archive file
pub fn load_binary<P: AsRef<Path>>(path: P, registry: &Registry) -> Result<Vec<ElementRef>> {
    let bytes = fs::read(path)?;
    load_binary_bytes(registry, &bytes)
}

/// Decode elements from binary archive bytes
pub fn load_binary_bytes(registry: &Registry, bytes: &[u8]) -> Result<Vec<ElementRef>> {
    let mut reader = Reader::new(bytes);

    if reader.take(4)? != MAGIC.as_slice() {
        return Err(EmberError::ArchiveCorrupt("bad magic".to_string()));
    }
    let version = reader.u32()?;
    if version > BINARY_VERSION {
        return Err(EmberError::ArchiveVersionMismatch {
            found: version,
            supported: BINARY_VERSION,
        });
    }

    let count = reader.u32()? as usize;
    let mut elements = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        elements.push(decode_element(registry, &mut reader)?);
    }
    if reader.remaining() > 0 {
        log::warn!("{} trailing bytes after last element", reader.remaining());
    }
    Ok(elements)
}

fn encode_element(registry: &Registry, out: &mut Vec<u8>, element: &ElementRef) -> Result<()> {
    let class_name = element.borrow().class_name();
    let class = registry
        .find(class_name)
        .ok_or_else(|| EmberError::ClassNotFound(class_name.to_string()))?;

    element.borrow_mut().pre_serialize();
    let body = encode_fields(registry, class, element);
    element.borrow_mut().post_serialize();
    let body = body?;

    write_str(out, class_name);
    out.extend_from_slice(class.fingerprint().as_bytes());
    out.extend_from_slice(&body);
    Ok(())
}

fn encode_fields(registry: &Registry, class: &Class, element: &ElementRef) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let persisted: Vec<_> = class.fields.iter().filter(|f| !f.is_transient()).collect();
    write_u16(&mut out, persisted.len() as u16);

    for field in persisted {
        let value = element.borrow().get(&field.name).ok_or_else(|| {
            EmberError::ArchiveFormat(format!(
                "{} does not expose declared field {}",
                class.name, field.name
            ))
        })?;
        let mut payload = Vec::new();
        encode_value(registry, &mut payload, &value)?;

        write_str(&mut out, &field.name);
        out.push(value_tag(&value));
        write_u32(&mut out, payload.len() as u32);
        out.extend_from_slice(&payload);
    }
    Ok(out)
}

fn encode_value(registry: &Registry, out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Bool(v) => out.push(*v as u8),
        Value::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::F32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::String(v) => write_str(out, v),
        Value::Vec3(v) => {
            for component in v.to_array() {
                out.extend_from_slice(&component.to_le_bytes());
            }
        }
        Value::Color(v) => {
            for component in v.to_array() {
                out.extend_from_slice(&component.to_le_bytes());
            }
        }
        Value::Element(None) => write_str(out, ""),
        Value::Element(Some(target)) => encode_element(registry, out, target)?,
        Value::Array(items) => {
            write_u32(out, items.len() as u32);
            for item in items {
                let mut payload = Vec::new();
                encode_value(registry, &mut payload, item)?;
                out.push(value_tag(item));
                write_u32(out, payload.len() as u32);
                out.extend_from_slice(&payload);
            }
        }
    }
    Ok(())
}

fn decode_element(registry: &Registry, reader: &mut Reader<'_>) -> Result<ElementRef> {
    let class_name = reader.string()?;
    if class_name.is_empty() {
        return Err(EmberError::ArchiveCorrupt(
            "element record with empty class name".to_string(),
        ));
    }
    decode_element_body(registry, &class_name, reader)
}

fn decode_optional_element(
    registry: &Registry,
    reader: &mut Reader<'_>,
) -> Result<Option<ElementRef>> {
    let class_name = reader.string()?;
    if class_name.is_empty() {
        return Ok(None);
    }
    Ok(Some(decode_element_body(registry, &class_name, reader)?))
}

fn decode_element_body(
    registry: &Registry,
    class_name: &str,
    reader: &mut Reader<'_>,
) -> Result<ElementRef> {
    let class = registry
        .find(class_name)
        .ok_or_else(|| EmberError::ClassNotFound(class_name.to_string()))?;

    let stamp: [u8; 32] = reader
        .take(32)?
        .try_into()
        .expect("take(32) yields 32 bytes");
    if ContentHash::from_raw(stamp) != class.fingerprint() {
        log::warn!(
            "archive fingerprint for {} does not match the registered layout",
            class_name
        );
    }

    let instance = registry.create_instance(class_name)?;
    instance.borrow_mut().pre_deserialize();
    decode_fields(registry, class, &instance, reader)?;
    instance.borrow_mut().post_deserialize();
    Ok(instance)
}

fn decode_fields(
    registry: &Registry,
    class: &Class,
    instance: &ElementRef,
    reader: &mut Reader<'_>,
) -> Result<()> {
    let count = reader.u16()?;
    for _ in 0..count {
        let name = reader.string()?;
        let tag = reader.u8()?;
        let len = reader.u32()? as usize;
        let payload = reader.take(len)?;

        match class.field(&name) {
            Some(field) if !field.is_transient() && tag == kind_tag(&field.kind) => {
                let mut payload_reader = Reader::new(payload);
                let value = decode_value(registry, &field.kind, &mut payload_reader)?;
                instance.borrow_mut().set(&name, value)?;
            }
            _ => {
                log::debug!(
                    "skipping field {} on {} record ({} bytes)",
                    name,
                    class.name,
                    len
                );
            }
        }
    }
    Ok(())
}

fn decode_value(registry: &Registry, kind: &FieldKind, reader: &mut Reader<'_>) -> Result<Value> {
    let value = match kind {
        FieldKind::Bool => Value::Bool(reader.u8()? != 0),
        FieldKind::I32 => Value::I32(reader.i32()?),
        FieldKind::I64 => Value::I64(reader.i64()?),
        FieldKind::F32 => Value::F32(reader.f32()?),
        FieldKind::F64 => Value::F64(reader.f64()?),
        FieldKind::String => Value::String(reader.string()?),
        FieldKind::Vec3 => Value::Vec3(Vec3::new(reader.f32()?, reader.f32()?, reader.f32()?)),
        FieldKind::Color => Value::Color(Color::new(
            reader.f32()?,
            reader.f32()?,
            reader.f32()?,
            reader.f32()?,
        )),
        FieldKind::Element => Value::Element(decode_optional_element(registry, reader)?),
        FieldKind::Array { element } => {
            let count = reader.u32()? as usize;
            let mut items = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                let tag = reader.u8()?;
                let len = reader.u32()? as usize;
                let payload = reader.take(len)?;
                if tag == kind_tag(element) {
                    let mut payload_reader = Reader::new(payload);
                    items.push(decode_value(registry, element, &mut payload_reader)?);
                } else {
                    log::debug!("skipping array entry with unexpected tag {:#04x}", tag);
                }
            }
            Value::Array(items)
        }
    };
    Ok(value)
}

fn kind_tag(kind: &FieldKind) -> u8 {
    match kind {
        FieldKind::Bool => TAG_BOOL,
        FieldKind::I32 => TAG_I32,
        FieldKind::I64 => TAG_I64,
        FieldKind::F32 => TAG_F32,
        FieldKind::F64 => TAG_F64,
        FieldKind::String => TAG_STRING,
        FieldKind::Vec3 => TAG_VEC3,
        FieldKind::Color => TAG_COLOR,
        FieldKind::Element => TAG_ELEMENT,
        FieldKind::Array { .. } => TAG_ARRAY,
    }
}

fn value_tag(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => TAG_BOOL,
        Value::I32(_) => TAG_I32,
        Value::I64(_) => TAG_I64,
        Value::F32(_) => TAG_F32,
        Value::F64(_) => TAG_F64,
        Value::String(_) => TAG_STRING,
        Value::Vec3(_) => TAG_VEC3,
        Value::Color(_) => TAG_COLOR,
        Value::Element(_) => TAG_ELEMENT,
        Value::Array(_) => TAG_ARRAY,
    }
}

fn write_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    write_u16(out, s.len() as u16);
    out.extend_from_slice(s.as_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(EmberError::ArchiveCorrupt(
                "unexpected end of data".to_string(),
            ));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| EmberError::ArchiveCorrupt("invalid utf-8 in string".to_string()))
    }
}
