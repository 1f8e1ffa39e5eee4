//! Refresh cycle: pull unfrozen fields, then re-assert frozen ones.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::{CachedField, MemoryBinder};
use crate::codec;
use crate::error::{Error, Result};
use crate::freeze::FreezeEntry;
use crate::layout::{FieldDescriptor, Layout};
use crate::notify::FieldChange;

/// What one refresh cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Unfrozen fields read successfully
    pub read: usize,
    /// Change events delivered
    pub changed: usize,
    /// Unfrozen fields whose read failed; they keep their last good value
    pub skipped: usize,
    /// Frozen fields written back
    pub reasserted: usize,
    /// Frozen fields whose write-back failed
    pub reassert_failed: usize,
}

/// Bytes of the whole layout span, fetched in one read
struct Block {
    start: u64,
    bytes: Vec<u8>,
}

impl Block {
    fn slice(&self, field: &FieldDescriptor) -> Vec<u8> {
        let start = (field.offset - self.start) as usize;
        self.bytes[start..start + field.size()].to_vec()
    }
}

impl MemoryBinder {
    /// Run one refresh cycle.
    ///
    /// Every unfrozen field is read and compared with the cache; every frozen
    /// field is then written back in freeze order. Change events are delivered
    /// in field declaration order before this returns. A failed read is logged
    /// and skipped for this cycle. If the target turns out to be gone the
    /// binder detaches and `Detached` is returned.
    pub fn refresh(&mut self) -> Result<RefreshReport> {
        let base = self.require_attached()?;
        let layout = Arc::clone(&self.layout);

        let mut report = RefreshReport::default();
        let mut changes: Vec<(usize, FieldChange)> = Vec::new();

        let result = self
            .pull_fields(base, &layout, &mut report, &mut changes)
            .and_then(|()| self.reassert_frozen(base, &layout, &mut report, &mut changes));

        // The cache already holds these values, even if the cycle ended early
        changes.sort_by_key(|(idx, _)| *idx);
        for (_, change) in &changes {
            self.notifier.publish(change);
        }
        report.changed = changes.len();

        result?;
        trace!(
            "Refreshed {}: read={} changed={} skipped={} reasserted={}",
            layout.name(),
            report.read,
            report.changed,
            report.skipped,
            report.reasserted
        );
        Ok(report)
    }

    fn pull_fields(
        &mut self,
        base: u64,
        layout: &Layout,
        report: &mut RefreshReport,
        changes: &mut Vec<(usize, FieldChange)>,
    ) -> Result<()> {
        if self.freezes.len() >= layout.len() {
            return Ok(());
        }

        let block = self.read_block(base, layout)?;

        for (idx, field) in layout.fields().iter().enumerate() {
            if self.freezes.contains(&field.name) {
                continue;
            }

            let raw = match &block {
                Some(block) => block.slice(field),
                None => match self.accessor.read_bytes(base + field.offset, field.size()) {
                    Ok(raw) => raw,
                    Err(e) => match self.classify(base, e) {
                        Error::Detached => return Err(Error::Detached),
                        e => {
                            warn!(
                                "Skipping {}.{} this cycle: {}",
                                layout.name(),
                                field.name,
                                e
                            );
                            report.skipped += 1;
                            continue;
                        }
                    },
                },
            };

            report.read += 1;
            if let Some(change) = self.apply(idx, field, raw) {
                changes.push((idx, change));
            }
        }

        Ok(())
    }

    /// Read the whole layout span at once, or `None` to fall back to per-field reads.
    fn read_block(&mut self, base: u64, layout: &Layout) -> Result<Option<Block>> {
        if !self.config.block_reads {
            return Ok(None);
        }
        let Some(span) = layout.span() else {
            return Ok(None);
        };
        let len = (span.end - span.start) as usize;
        if len > self.config.max_block_read {
            return Ok(None);
        }

        match self.accessor.read_bytes(base + span.start, len) {
            Ok(bytes) => Ok(Some(Block {
                start: span.start,
                bytes,
            })),
            Err(e) => match self.classify(base, e) {
                Error::Detached => Err(Error::Detached),
                e => {
                    debug!(
                        "Block read of {} failed ({}), reading fields individually",
                        layout.name(),
                        e
                    );
                    Ok(None)
                }
            },
        }
    }

    fn reassert_frozen(
        &mut self,
        base: u64,
        layout: &Layout,
        report: &mut RefreshReport,
        changes: &mut Vec<(usize, FieldChange)>,
    ) -> Result<()> {
        let entries: Vec<FreezeEntry> = self.freezes.iter().cloned().collect();

        for entry in entries {
            let Some(idx) = layout.index_of(&entry.field) else {
                continue;
            };
            let field = &layout.fields()[idx];

            // Held bytes go out verbatim; they need not decode cleanly
            match self.accessor.write_bytes(base + field.offset, &entry.raw) {
                Ok(()) => {
                    report.reasserted += 1;
                    if let Some(change) = self.apply(idx, field, entry.raw) {
                        changes.push((idx, change));
                    }
                }
                Err(e) => match self.classify(base, e) {
                    Error::Detached => return Err(Error::Detached),
                    e => {
                        warn!(
                            "Failed to re-assert frozen {}.{}: {}",
                            layout.name(),
                            field.name,
                            e
                        );
                        report.reassert_failed += 1;
                    }
                },
            }
        }

        Ok(())
    }

    /// Store new bytes for a field if they differ from the cache.
    fn apply(&mut self, idx: usize, field: &FieldDescriptor, raw: Vec<u8>) -> Option<FieldChange> {
        if self.cache[idx].as_ref().is_some_and(|c| c.raw == raw) {
            return None;
        }

        let value = match codec::decode(&field.shape, &raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Cannot decode {}: {}", field.name, e);
                return None;
            }
        };

        let previous = self.cache[idx].replace(CachedField {
            raw,
            value: value.clone(),
        });
        Some(FieldChange {
            field: field.name.clone(),
            old: previous.map(|p| p.value),
            new: value,
        })
    }
}
