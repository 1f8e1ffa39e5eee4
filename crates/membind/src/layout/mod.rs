//! Field layouts for binding targets
//!
//! A [`Layout`] is the static descriptor table of one binding-target type:
//! named fields at fixed byte offsets from the target's base address. Layouts
//! are validated once when built and shared read-only between binders.

pub mod builtin;
pub mod file;

use std::collections::HashMap;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::value::{ScalarKind, ValueShape};

/// Static metadata for a single field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Byte offset from the base address of the binding target
    pub offset: u64,
    pub shape: ValueShape,
}

impl FieldDescriptor {
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// First byte past the end of the field, relative to the base address.
    pub fn end(&self) -> u64 {
        self.offset + self.size() as u64
    }
}

/// Validated descriptor table for one binding-target type
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    name: String,
    version: Option<String>,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl Layout {
    pub fn builder(name: impl Into<String>) -> LayoutBuilder {
        LayoutBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target version this layout was written for, if recorded.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of bytes from the base address to the end of the last field.
    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.end()).max().unwrap_or(0) as usize
    }

    /// Byte range actually covered by fields, relative to the base address.
    pub fn span(&self) -> Option<Range<u64>> {
        let start = self.fields.iter().map(|f| f.offset).min()?;
        let end = self.fields.iter().map(|f| f.end()).max()?;
        Some(start..end)
    }
}

/// Builder for [`Layout`]
///
/// Registration errors are reported by [`LayoutBuilder::build`], before any
/// binder can use the layout.
#[derive(Debug, Clone)]
pub struct LayoutBuilder {
    name: String,
    version: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl LayoutBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            fields: Vec::new(),
        }
    }

    /// Record the target version the offsets belong to
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Declare a field
    pub fn field(mut self, name: impl Into<String>, offset: u64, shape: impl Into<ValueShape>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            offset,
            shape: shape.into(),
        });
        self
    }

    /// Shorthand for a scalar field
    pub fn scalar(self, name: impl Into<String>, offset: u64, kind: ScalarKind) -> Self {
        self.field(name, offset, ValueShape::Scalar(kind))
    }

    /// Validate and build the layout
    pub fn build(self) -> Result<Layout> {
        let mut index = HashMap::with_capacity(self.fields.len());

        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(Error::Configuration(format!(
                    "{}: field at offset {:#x} has an empty name",
                    self.name, field.offset
                )));
            }
            if index.insert(field.name.clone(), i).is_some() {
                return Err(Error::Configuration(format!(
                    "{}: duplicate field {}",
                    self.name, field.name
                )));
            }
            if field.size() == 0 {
                return Err(Error::Configuration(format!(
                    "{}: field {} has zero size",
                    self.name, field.name
                )));
            }
            if let ValueShape::Enum(shape) = &field.shape {
                if !matches!(shape.width, 1 | 2 | 4) {
                    return Err(Error::Configuration(format!(
                        "{}: enum field {} has unsupported width {}",
                        self.name, field.name, shape.width
                    )));
                }
            }
            if field.offset.checked_add(field.size() as u64).is_none() {
                return Err(Error::Configuration(format!(
                    "{}: field {} overflows the address space",
                    self.name, field.name
                )));
            }
        }

        let mut by_offset: Vec<&FieldDescriptor> = self.fields.iter().collect();
        by_offset.sort_by_key(|f| f.offset);
        for pair in by_offset.windows(2) {
            if pair[0].end() > pair[1].offset {
                return Err(Error::Configuration(format!(
                    "{}: field {} ({:#x}..{:#x}) overlaps field {} at {:#x}",
                    self.name,
                    pair[0].name,
                    pair[0].offset,
                    pair[0].end(),
                    pair[1].name,
                    pair[1].offset
                )));
            }
        }

        Ok(Layout {
            name: self.name,
            version: self.version,
            fields: self.fields,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EnumShape;

    #[test]
    fn test_build_and_lookup() {
        let layout = Layout::builder("camera")
            .scalar("Zoom", 0x114, ScalarKind::F32)
            .scalar("Angle", 0x130, ScalarKind::Vector2)
            .build()
            .unwrap();

        assert_eq!(layout.len(), 2);
        assert_eq!(layout.index_of("Angle"), Some(1));
        assert_eq!(layout.field("Zoom").unwrap().offset, 0x114);
        assert!(layout.field("Missing").is_none());
        assert_eq!(layout.size(), 0x138);
        assert_eq!(layout.span(), Some(0x114..0x138));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Layout::builder("camera")
            .scalar("Zoom", 0x114, ScalarKind::F32)
            .scalar("Zoom", 0x200, ScalarKind::F32)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("duplicate field Zoom")));
    }

    #[test]
    fn test_overlapping_fields_rejected() {
        let err = Layout::builder("camera")
            .scalar("Angle", 0x130, ScalarKind::Vector2)
            .scalar("Inner", 0x134, ScalarKind::F32)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("overlaps")));
    }

    #[test]
    fn test_adjacent_fields_allowed() {
        let layout = Layout::builder("pair")
            .scalar("A", 0, ScalarKind::U32)
            .scalar("B", 4, ScalarKind::U32)
            .build();
        assert!(layout.is_ok());
    }

    #[test]
    fn test_invalid_shapes_rejected() {
        let zero = Layout::builder("bad")
            .field("Name", 0, ValueShape::String { len: 0 })
            .build();
        assert!(matches!(zero, Err(Error::Configuration(_))));

        let wide = Layout::builder("bad")
            .field("Kind", 0, ValueShape::Enum(EnumShape::new(3)))
            .build();
        assert!(matches!(wide, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_empty_layout() {
        let layout = Layout::builder("empty").build().unwrap();
        assert!(layout.is_empty());
        assert_eq!(layout.size(), 0);
        assert_eq!(layout.span(), None);
    }
}
