//! Little-endian encoding of field values.

use crate::error::{Error, Result};
use crate::value::{ScalarKind, Value, ValueShape};

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn floats<const N: usize>(bytes: &[u8]) -> [f32; N] {
    let mut out = [0.0f32; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = f32::from_le_bytes(array(&bytes[i * 4..]));
    }
    out
}

fn check_len(shape: &ValueShape, len: usize) -> Result<()> {
    if len != shape.size() {
        return Err(Error::Codec(format!(
            "{} needs {} bytes, got {}",
            shape,
            shape.size(),
            len
        )));
    }
    Ok(())
}

/// Decode the bytes of one field
pub fn decode(shape: &ValueShape, bytes: &[u8]) -> Result<Value> {
    check_len(shape, bytes.len())?;

    let value = match shape {
        ValueShape::Scalar(kind) => match kind {
            ScalarKind::Bool => Value::Bool(bytes[0] != 0),
            ScalarKind::U8 => Value::U8(bytes[0]),
            ScalarKind::I8 => Value::I8(bytes[0] as i8),
            ScalarKind::U16 => Value::U16(u16::from_le_bytes(array(bytes))),
            ScalarKind::I16 => Value::I16(i16::from_le_bytes(array(bytes))),
            ScalarKind::U32 => Value::U32(u32::from_le_bytes(array(bytes))),
            ScalarKind::I32 => Value::I32(i32::from_le_bytes(array(bytes))),
            ScalarKind::U64 => Value::U64(u64::from_le_bytes(array(bytes))),
            ScalarKind::I64 => Value::I64(i64::from_le_bytes(array(bytes))),
            ScalarKind::F32 => Value::F32(f32::from_le_bytes(array(bytes))),
            ScalarKind::F64 => Value::F64(f64::from_le_bytes(array(bytes))),
            ScalarKind::Vector2 => Value::Vector2(floats(bytes)),
            ScalarKind::Vector3 => Value::Vector3(floats(bytes)),
            ScalarKind::Quaternion => Value::Quaternion(floats(bytes)),
        },
        ValueShape::Enum(shape) => Value::Enum(match shape.width {
            1 => bytes[0] as u32,
            2 => u16::from_le_bytes(array(bytes)) as u32,
            _ => u32::from_le_bytes(array(bytes)),
        }),
        ValueShape::String { .. } => {
            let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
            Value::String(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        ValueShape::Struct(layout) => {
            let mut members = Vec::with_capacity(layout.len());
            for field in layout.fields() {
                let start = field.offset as usize;
                let member = decode(&field.shape, &bytes[start..start + field.size()])?;
                members.push((field.name.clone(), member));
            }
            Value::Struct(members)
        }
    };
    Ok(value)
}

/// Encode a value into a fresh, zero-initialized buffer
pub fn encode(shape: &ValueShape, value: &Value) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; shape.size()];
    encode_into(shape, value, &mut buf)?;
    Ok(buf)
}

/// Encode a value over an existing buffer.
///
/// Struct members missing from the value leave their bytes untouched, so the
/// buffer can be seeded with the last known remote bytes.
pub fn encode_into(shape: &ValueShape, value: &Value, buf: &mut [u8]) -> Result<()> {
    check_len(shape, buf.len())?;

    match (shape, value) {
        (ValueShape::Scalar(_), value) if shape.accepts(value) => encode_scalar(value, buf),
        (ValueShape::Enum(enum_shape), Value::Enum(raw)) if shape.accepts(value) => {
            match enum_shape.width {
                1 => buf[0] = *raw as u8,
                2 => buf.copy_from_slice(&(*raw as u16).to_le_bytes()),
                _ => buf.copy_from_slice(&raw.to_le_bytes()),
            }
        }
        (ValueShape::String { .. }, Value::String(s)) if shape.accepts(value) => {
            buf.fill(0);
            buf[..s.len()].copy_from_slice(s.as_bytes());
        }
        (ValueShape::Struct(layout), Value::Struct(members)) => {
            for (name, member) in members {
                let field = layout.field(name).ok_or_else(|| {
                    Error::Codec(format!("struct {} has no member {}", layout.name(), name))
                })?;
                let start = field.offset as usize;
                encode_into(&field.shape, member, &mut buf[start..start + field.size()])?;
            }
        }
        _ => {
            return Err(Error::Codec(format!(
                "cannot encode {} value as {}",
                value.kind_name(),
                shape
            )));
        }
    }
    Ok(())
}

fn put_floats(values: &[f32], buf: &mut [u8]) {
    for (chunk, v) in buf.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
}

fn encode_scalar(value: &Value, buf: &mut [u8]) {
    match value {
        Value::Bool(v) => buf[0] = *v as u8,
        Value::U8(v) => buf[0] = *v,
        Value::I8(v) => buf[0] = *v as u8,
        Value::U16(v) => buf.copy_from_slice(&v.to_le_bytes()),
        Value::I16(v) => buf.copy_from_slice(&v.to_le_bytes()),
        Value::U32(v) => buf.copy_from_slice(&v.to_le_bytes()),
        Value::I32(v) => buf.copy_from_slice(&v.to_le_bytes()),
        Value::U64(v) => buf.copy_from_slice(&v.to_le_bytes()),
        Value::I64(v) => buf.copy_from_slice(&v.to_le_bytes()),
        Value::F32(v) => buf.copy_from_slice(&v.to_le_bytes()),
        Value::F64(v) => buf.copy_from_slice(&v.to_le_bytes()),
        Value::Vector2(v) => put_floats(v, buf),
        Value::Vector3(v) => put_floats(v, buf),
        Value::Quaternion(v) => put_floats(v, buf),
        Value::Enum(_) | Value::String(_) | Value::Struct(_) => {}
    }
}
