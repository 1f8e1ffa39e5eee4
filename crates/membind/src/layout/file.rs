//! JSON layout files
//!
//! Offsets move between target builds, so layouts are usually shipped as data:
//!
//! ```json
//! {
//!   "name": "camera",
//!   "version": "2024.07.23",
//!   "fields": [
//!     { "name": "Zoom", "offset": "0x114", "shape": "f32" },
//!     { "name": "Label", "offset": 512, "shape": { "string": 32 } }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Layout, LayoutBuilder};
use crate::error::{Error, Result};
use crate::value::{EnumShape, ScalarKind, ValueShape};

/// Serialized form of a [`Layout`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub offset: OffsetDef,
    pub shape: ShapeDef,
}

/// Offset written either as a number or as a hex string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OffsetDef {
    Number(u64),
    Text(String),
}

impl OffsetDef {
    pub fn resolve(&self) -> Result<u64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => {
                let trimmed = s.trim();
                let parsed = match trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => trimmed.parse::<u64>(),
                };
                parsed.map_err(|e| Error::Configuration(format!("invalid offset {:?}: {}", s, e)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapeDef {
    Scalar(ScalarKind),
    Compound(CompoundShapeDef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompoundShapeDef {
    Enum(EnumShape),
    String(usize),
    Struct(LayoutDef),
}

impl ShapeDef {
    fn into_shape(self) -> Result<ValueShape> {
        let shape = match self {
            Self::Scalar(kind) => ValueShape::Scalar(kind),
            Self::Compound(CompoundShapeDef::Enum(shape)) => ValueShape::Enum(shape),
            Self::Compound(CompoundShapeDef::String(len)) => ValueShape::String { len },
            Self::Compound(CompoundShapeDef::Struct(def)) => {
                ValueShape::Struct(Arc::new(def.into_layout()?))
            }
        };
        Ok(shape)
    }

    fn from_shape(shape: &ValueShape) -> Self {
        match shape {
            ValueShape::Scalar(kind) => Self::Scalar(*kind),
            ValueShape::Enum(shape) => Self::Compound(CompoundShapeDef::Enum(shape.clone())),
            ValueShape::String { len } => Self::Compound(CompoundShapeDef::String(*len)),
            ValueShape::Struct(layout) => {
                Self::Compound(CompoundShapeDef::Struct(LayoutDef::from_layout(layout)))
            }
        }
    }
}

impl LayoutDef {
    /// Validate the definition and build a [`Layout`]
    pub fn into_layout(self) -> Result<Layout> {
        let mut builder = LayoutBuilder::new(self.name);
        if let Some(version) = self.version {
            builder = builder.version(version);
        }
        for field in self.fields {
            let offset = field.offset.resolve()?;
            builder = builder.field(field.name, offset, field.shape.into_shape()?);
        }
        builder.build()
    }

    pub fn from_layout(layout: &Layout) -> Self {
        Self {
            name: layout.name().to_string(),
            version: layout.version().map(str::to_string),
            fields: layout
                .fields()
                .iter()
                .map(|f| FieldDef {
                    name: f.name.clone(),
                    offset: OffsetDef::Text(format!("0x{:X}", f.offset)),
                    shape: ShapeDef::from_shape(&f.shape),
                })
                .collect(),
        }
    }
}

/// Parse a layout from JSON text
pub fn parse_layout(json: &str) -> Result<Layout> {
    let def: LayoutDef = serde_json::from_str(json)?;
    def.into_layout()
}

/// Load a layout from a JSON file
pub fn load_layout<P: AsRef<Path>>(path: P) -> Result<Layout> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let layout = parse_layout(&content)?;
    debug!(
        "Loaded layout {} ({} fields) from {}",
        layout.name(),
        layout.len(),
        path.display()
    );
    Ok(layout)
}

/// Save a layout to a JSON file
pub fn save_layout<P: AsRef<Path>>(path: P, layout: &Layout) -> Result<()> {
    let content = serde_json::to_string_pretty(&LayoutDef::from_layout(layout))?;
    fs::write(&path, content)?;
    info!("Saved layout {} to {}", layout.name(), path.as_ref().display());
    Ok(())
}
