//! Value shapes and decoded field values.
//!
//! A [`ValueShape`] says how many bytes a field occupies and how they are
//! interpreted; a [`Value`] is the decoded local representation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, Result};
use crate::layout::Layout;

/// Fixed-size scalar and vector kinds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Vector2,
    Vector3,
    Quaternion,
}

impl ScalarKind {
    pub fn size(&self) -> usize {
        match self {
            Self::Bool | Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 | Self::Vector2 => 8,
            Self::Vector3 => 12,
            Self::Quaternion => 16,
        }
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Unsigned integer enum stored in 1, 2 or 4 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumShape {
    pub width: u8,
    #[serde(default)]
    pub variants: BTreeMap<String, u32>,
}

impl EnumShape {
    pub fn new(width: u8) -> Self {
        Self {
            width,
            variants: BTreeMap::new(),
        }
    }

    pub fn variant(mut self, name: impl Into<String>, raw: u32) -> Self {
        self.variants.insert(name.into(), raw);
        self
    }

    /// Name of the variant with the given raw value, if declared.
    pub fn name_of(&self, raw: u32) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| **v == raw)
            .map(|(name, _)| name.as_str())
    }

    /// Largest raw value the width can hold.
    pub fn max_raw(&self) -> u32 {
        match self.width {
            1 => u8::MAX as u32,
            2 => u16::MAX as u32,
            _ => u32::MAX,
        }
    }
}

/// How the bytes of a field are laid out.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueShape {
    Scalar(ScalarKind),
    Enum(EnumShape),
    /// Fixed-length NUL-padded UTF-8 buffer.
    String { len: usize },
    /// Nested layout; member offsets are relative to the field offset.
    Struct(Arc<Layout>),
}

impl ValueShape {
    pub const BOOL: Self = Self::Scalar(ScalarKind::Bool);
    pub const U8: Self = Self::Scalar(ScalarKind::U8);
    pub const I32: Self = Self::Scalar(ScalarKind::I32);
    pub const U32: Self = Self::Scalar(ScalarKind::U32);
    pub const F32: Self = Self::Scalar(ScalarKind::F32);
    pub const VECTOR2: Self = Self::Scalar(ScalarKind::Vector2);
    pub const VECTOR3: Self = Self::Scalar(ScalarKind::Vector3);
    pub const QUATERNION: Self = Self::Scalar(ScalarKind::Quaternion);

    /// Size of the shape in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Scalar(kind) => kind.size(),
            Self::Enum(shape) => shape.width as usize,
            Self::String { len } => *len,
            Self::Struct(layout) => layout.size(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Scalar(kind) => kind.name().to_string(),
            Self::Enum(shape) => format!("enum{}", shape.width as usize * 8),
            Self::String { len } => format!("string[{}]", len),
            Self::Struct(layout) => format!("struct {}", layout.name()),
        }
    }

    /// Check whether a value can be stored in this shape.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Scalar(kind), value) => value.scalar_kind() == Some(*kind),
            (Self::Enum(shape), Value::Enum(raw)) => *raw <= shape.max_raw(),
            // A NUL would end the string early when read back
            (Self::String { len }, Value::String(s)) => s.len() <= *len && !s.contains('\0'),
            (Self::Struct(layout), Value::Struct(members)) => {
                members.iter().all(|(name, member)| {
                    layout
                        .field(name)
                        .is_some_and(|field| field.shape.accepts(member))
                })
            }
            _ => false,
        }
    }
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<ScalarKind> for ValueShape {
    fn from(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }
}

/// Decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    /// x, y, z, w
    Quaternion([f32; 4]),
    Enum(u32),
    String(String),
    Struct(Vec<(String, Value)>),
}

impl Value {
    fn scalar_kind(&self) -> Option<ScalarKind> {
        let kind = match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::U8(_) => ScalarKind::U8,
            Self::I8(_) => ScalarKind::I8,
            Self::U16(_) => ScalarKind::U16,
            Self::I16(_) => ScalarKind::I16,
            Self::U32(_) => ScalarKind::U32,
            Self::I32(_) => ScalarKind::I32,
            Self::U64(_) => ScalarKind::U64,
            Self::I64(_) => ScalarKind::I64,
            Self::F32(_) => ScalarKind::F32,
            Self::F64(_) => ScalarKind::F64,
            Self::Vector2(_) => ScalarKind::Vector2,
            Self::Vector3(_) => ScalarKind::Vector3,
            Self::Quaternion(_) => ScalarKind::Quaternion,
            Self::Enum(_) | Self::String(_) | Self::Struct(_) => return None,
        };
        Some(kind)
    }

    /// Short name of the value's variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Enum(_) => "enum",
            Self::String(_) => "string",
            Self::Struct(_) => "struct",
            other => other.scalar_kind().map(|k| k.name()).unwrap_or("value"),
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Look up a member of a struct value by name.
    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct(members) => members.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Parse a value from text according to the target shape.
    ///
    /// Vectors are comma separated (`1.5,2`), enums accept a variant name or a
    /// raw number, strings are taken verbatim.
    pub fn parse(shape: &ValueShape, text: &str) -> Result<Self> {
        let text = text.trim();
        match shape {
            ValueShape::Scalar(kind) => parse_scalar(*kind, text),
            ValueShape::Enum(enum_shape) => {
                let raw = match enum_shape.variants.get(text) {
                    Some(raw) => *raw,
                    None => parse_num::<u32>(text)?,
                };
                if raw > enum_shape.max_raw() {
                    return Err(Error::ValueParse(format!(
                        "{} does not fit in {} byte(s)",
                        raw, enum_shape.width
                    )));
                }
                Ok(Self::Enum(raw))
            }
            ValueShape::String { len } => {
                if text.len() > *len {
                    return Err(Error::ValueParse(format!(
                        "string of {} bytes exceeds field length {}",
                        text.len(),
                        len
                    )));
                }
                if text.contains('\0') {
                    return Err(Error::ValueParse(format!("{:?} contains a NUL byte", text)));
                }
                Ok(Self::String(text.to_string()))
            }
            ValueShape::Struct(layout) => Err(Error::ValueParse(format!(
                "struct {} cannot be parsed from text; set its members individually",
                layout.name()
            ))),
        }
    }

    /// Render the value, using variant names for enums when the shape knows them.
    pub fn display_with(&self, shape: &ValueShape) -> String {
        match (self, shape) {
            (Self::Enum(raw), ValueShape::Enum(enum_shape)) => match enum_shape.name_of(*raw) {
                Some(name) => format!("{} ({})", name, raw),
                None => raw.to_string(),
            },
            _ => self.to_string(),
        }
    }
}

fn parse_num<T: std::str::FromStr>(text: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    text.parse::<T>()
        .map_err(|e| Error::ValueParse(format!("{:?}: {}", text, e)))
}

fn parse_floats<const N: usize>(text: &str) -> Result<[f32; N]> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(Error::ValueParse(format!(
            "expected {} comma-separated components, got {}",
            N,
            parts.len()
        )));
    }
    let mut out = [0.0f32; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = parse_num(part)?;
    }
    Ok(out)
}

fn parse_scalar(kind: ScalarKind, text: &str) -> Result<Value> {
    let value = match kind {
        ScalarKind::Bool => match text {
            "true" | "1" | "on" => Value::Bool(true),
            "false" | "0" | "off" => Value::Bool(false),
            _ => return Err(Error::ValueParse(format!("{:?} is not a bool", text))),
        },
        ScalarKind::U8 => Value::U8(parse_num(text)?),
        ScalarKind::I8 => Value::I8(parse_num(text)?),
        ScalarKind::U16 => Value::U16(parse_num(text)?),
        ScalarKind::I16 => Value::I16(parse_num(text)?),
        ScalarKind::U32 => Value::U32(parse_num(text)?),
        ScalarKind::I32 => Value::I32(parse_num(text)?),
        ScalarKind::U64 => Value::U64(parse_num(text)?),
        ScalarKind::I64 => Value::I64(parse_num(text)?),
        ScalarKind::F32 => Value::F32(parse_num(text)?),
        ScalarKind::F64 => Value::F64(parse_num(text)?),
        ScalarKind::Vector2 => Value::Vector2(parse_floats(text)?),
        ScalarKind::Vector3 => Value::Vector3(parse_floats(text)?),
        ScalarKind::Quaternion => Value::Quaternion(parse_floats(text)?),
    };
    Ok(value)
}

fn write_floats(f: &mut fmt::Formatter<'_>, values: &[f32]) -> fmt::Result {
    f.write_str("(")?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", v)?;
    }
    f.write_str(")")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::U8(v) => write!(f, "{}", v),
            Self::I8(v) => write!(f, "{}", v),
            Self::U16(v) => write!(f, "{}", v),
            Self::I16(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::I32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::F32(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
            Self::Vector2(v) => write_floats(f, v),
            Self::Vector3(v) => write_floats(f, v),
            Self::Quaternion(v) => write_floats(f, v),
            Self::Enum(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{:?}", v),
            Self::Struct(members) => {
                f.write_str("{ ")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str(" }")
            }
        }
    }
}
