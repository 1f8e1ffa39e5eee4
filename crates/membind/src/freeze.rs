//! Freeze table
//!
//! Held values that the binder re-asserts into remote memory on every refresh.
//! Each entry keeps the exact bytes to write next to their decoded value, so
//! re-assertion never depends on re-encoding. Iteration follows insertion
//! order so write-back is deterministic.

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct FreezeEntry {
    pub field: String,
    pub value: Value,
    /// Bytes written back on every refresh
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct FreezeTable {
    entries: Vec<FreezeEntry>,
}

impl FreezeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `value` for `field`.
    ///
    /// Re-freezing an already frozen field replaces the value and keeps its
    /// position. Returns the previously held value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value, raw: Vec<u8>) -> Option<Value> {
        let field = field.into();
        match self.entries.iter_mut().find(|e| e.field == field) {
            Some(entry) => {
                entry.raw = raw;
                Some(std::mem::replace(&mut entry.value, value))
            }
            None => {
                self.entries.push(FreezeEntry { field, value, raw });
                None
            }
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|e| e.field == field)?;
        Some(self.entries.remove(pos).value)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.field == field)
            .map(|e| &e.value)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.iter().any(|e| e.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FreezeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
