//! Memory binder: one binding-target instance kept in sync with remote memory.
//!
//! The binder owns the cached value of every field of its layout, the freeze
//! table and the change notifier. It reconciles the cache with the remote
//! process on [`MemoryBinder::refresh`] and pushes local edits out on
//! [`MemoryBinder::set`].
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use membind::{MemoryBinder, ProcessMemory, Value, layout::builtin};
//!
//! let memory = Arc::new(ProcessMemory::open(pid)?);
//! let mut camera = MemoryBinder::new(Arc::new(builtin::camera()?), memory);
//! camera.attach(camera_address)?;
//!
//! camera.subscribe("Zoom", |change| println!("{} -> {}", change.field, change.new))?;
//! camera.refresh()?;
//! camera.set("Zoom", Value::F32(2.5))?;
//! camera.freeze("Angle", None)?;
//! ```

mod refresh;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::codec;
use crate::error::{Error, Result};
use crate::freeze::FreezeTable;
use crate::layout::{FieldDescriptor, Layout};
use crate::memory::MemoryAccessor;
use crate::notify::{ChangeNotifier, FieldChange, SubscriptionId};
use crate::value::{Value, ValueShape};

pub use refresh::RefreshReport;

/// A binder shared between threads; callers lock it per operation
pub type SharedBinder = Arc<Mutex<MemoryBinder>>;

/// Largest span fetched with a single block read by default
pub const DEFAULT_MAX_BLOCK_READ: usize = 64 * 1024;

/// Configuration for a memory binder
#[derive(Debug, Clone)]
pub struct BinderConfig {
    /// Fetch all unfrozen fields with one read spanning the layout
    pub block_reads: bool,
    /// Spans larger than this are read field by field
    pub max_block_read: usize,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            block_reads: true,
            max_block_read: DEFAULT_MAX_BLOCK_READ,
        }
    }
}

impl BinderConfig {
    /// Create a new configuration builder
    pub fn builder() -> BinderConfigBuilder {
        BinderConfigBuilder::default()
    }
}

/// Builder for BinderConfig
#[derive(Debug, Clone, Default)]
pub struct BinderConfigBuilder {
    block_reads: Option<bool>,
    max_block_read: Option<usize>,
}

impl BinderConfigBuilder {
    /// Enable or disable single-read refresh of the whole layout
    pub fn block_reads(mut self, enabled: bool) -> Self {
        self.block_reads = Some(enabled);
        self
    }

    /// Set the largest span read in one call
    pub fn max_block_read(mut self, bytes: usize) -> Self {
        self.max_block_read = Some(bytes);
        self
    }

    /// Build the configuration
    pub fn build(self) -> BinderConfig {
        let default = BinderConfig::default();
        BinderConfig {
            block_reads: self.block_reads.unwrap_or(default.block_reads),
            max_block_read: self.max_block_read.unwrap_or(default.max_block_read),
        }
    }
}

/// Last known state of one field: the remote bytes and their decoded value
#[derive(Debug, Clone)]
pub(crate) struct CachedField {
    pub(crate) raw: Vec<u8>,
    pub(crate) value: Value,
}

/// Runtime state of one binding target
pub struct MemoryBinder {
    pub(crate) layout: Arc<Layout>,
    pub(crate) accessor: Arc<dyn MemoryAccessor>,
    pub(crate) config: BinderConfig,
    /// `None` while detached
    pub(crate) base: Option<u64>,
    /// Indexed like `layout.fields()`
    pub(crate) cache: Vec<Option<CachedField>>,
    pub(crate) freezes: FreezeTable,
    pub(crate) notifier: ChangeNotifier,
}

impl MemoryBinder {
    /// Create a detached binder with default configuration
    pub fn new(layout: Arc<Layout>, accessor: Arc<dyn MemoryAccessor>) -> Self {
        Self::with_config(layout, accessor, BinderConfig::default())
    }

    /// Create a detached binder with custom configuration
    pub fn with_config(
        layout: Arc<Layout>,
        accessor: Arc<dyn MemoryAccessor>,
        config: BinderConfig,
    ) -> Self {
        let cache = vec![None; layout.len()];
        Self {
            layout,
            accessor,
            config,
            base: None,
            cache,
            freezes: FreezeTable::new(),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Wrap the binder for use from several threads
    pub fn into_shared(self) -> SharedBinder {
        Arc::new(Mutex::new(self))
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    /// Base address of the bound object, `None` while detached
    pub fn base_address(&self) -> Option<u64> {
        self.base
    }

    pub fn is_attached(&self) -> bool {
        self.base.is_some()
    }

    /// Bind to the remote object at `address`.
    ///
    /// Clears cached values and the detached state. Freeze entries and
    /// subscriptions carry over; frozen values are written to the new object on
    /// the next refresh. The whole layout must fit below the top of the address
    /// space.
    pub fn attach(&mut self, address: u64) -> Result<()> {
        if address == 0 || address.checked_add(self.layout.size() as u64).is_none() {
            return Err(Error::InvalidAddress {
                address,
                len: self.layout.size(),
            });
        }

        self.base = Some(address);
        self.cache = vec![None; self.layout.len()];
        info!("Attached {} at {:#x}", self.layout.name(), address);
        Ok(())
    }

    /// Stop touching remote memory until the next attach. Cached values stay readable.
    pub fn detach(&mut self) {
        if let Some(base) = self.base.take() {
            info!("Detached {} from {:#x}", self.layout.name(), base);
        }
    }

    /// Cached value of a field, `None` until it has been read or written
    pub fn get(&self, field: &str) -> Result<Option<&Value>> {
        let idx = self.field_index(field)?;
        Ok(self.cache[idx].as_ref().map(|c| &c.value))
    }

    /// Every field with its cached value, in declaration order
    pub fn values(&self) -> impl Iterator<Item = (&FieldDescriptor, Option<&Value>)> {
        self.layout
            .fields()
            .iter()
            .zip(self.cache.iter())
            .map(|(field, cached)| (field, cached.as_ref().map(|c| &c.value)))
    }

    /// Write a field to remote memory.
    ///
    /// The cache is updated first and restored if the write fails, so it never
    /// silently disagrees with the remote side. Setting a frozen field also
    /// replaces its held value.
    pub fn set(&mut self, field: &str, value: Value) -> Result<()> {
        let base = self.require_attached()?;
        let idx = self.field_index(field)?;
        self.check_shape(idx, &value)?;

        let (stored, change) = self.commit(base, idx, &value)?;
        if self.freezes.contains(field) {
            self.freezes.insert(field, stored.value, stored.raw);
        }
        if let Some(change) = change {
            self.notifier.publish(&change);
        }
        Ok(())
    }

    /// Freeze a field at `value`, or at its cached value when `None`.
    ///
    /// A given value is written immediately; afterwards every refresh writes it
    /// back regardless of what the remote process stored in between. Without a
    /// value the last read bytes are held as they are, even if they do not
    /// decode cleanly.
    pub fn freeze(&mut self, field: &str, value: Option<Value>) -> Result<()> {
        let base = self.require_attached()?;
        let idx = self.field_index(field)?;

        let held = match value {
            Some(value) => {
                self.check_shape(idx, &value)?;
                let (stored, change) = self.commit(base, idx, &value)?;
                if let Some(change) = change {
                    self.notifier.publish(&change);
                }
                stored
            }
            None => self.cache[idx]
                .clone()
                .ok_or_else(|| Error::NotLoaded(field.to_string()))?,
        };

        debug!("Freezing {}.{} at {}", self.layout.name(), field, held.value);
        self.freezes.insert(field, held.value, held.raw);
        Ok(())
    }

    /// Release a frozen field. Returns whether it was frozen.
    pub fn unfreeze(&mut self, field: &str) -> Result<bool> {
        self.field_index(field)?;
        let was_frozen = self.freezes.remove(field).is_some();
        if was_frozen {
            debug!("Unfroze {}.{}", self.layout.name(), field);
        }
        Ok(was_frozen)
    }

    pub fn is_frozen(&self, field: &str) -> bool {
        self.freezes.contains(field)
    }

    pub fn freezes(&self) -> &FreezeTable {
        &self.freezes
    }

    /// Names of frozen fields, in freeze order
    pub fn frozen_fields(&self) -> impl Iterator<Item = &str> {
        self.freezes.iter().map(|e| e.field.as_str())
    }

    /// Call `callback` whenever `field` changes
    pub fn subscribe<F>(&mut self, field: &str, callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(&FieldChange) + Send + 'static,
    {
        self.field_index(field)?;
        Ok(self.notifier.subscribe(field, callback))
    }

    /// Call `callback` whenever any field changes
    pub fn subscribe_all<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&FieldChange) + Send + 'static,
    {
        self.notifier.subscribe_all(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    fn field_index(&self, field: &str) -> Result<usize> {
        self.layout
            .index_of(field)
            .ok_or_else(|| Error::UnknownField(field.to_string()))
    }

    fn check_shape(&self, idx: usize, value: &Value) -> Result<()> {
        let descriptor = &self.layout.fields()[idx];
        if !descriptor.shape.accepts(value) {
            return Err(Error::ShapeMismatch {
                field: descriptor.name.clone(),
                expected: descriptor.shape.name(),
                actual: value.kind_name().to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn require_attached(&self) -> Result<u64> {
        self.base.ok_or(Error::Detached)
    }

    /// Turn an access error into `Detached` when the target is gone.
    ///
    /// An invalid field address alone is not enough: one byte at the base is read back
    /// and only an unreadable base (or a dead process) detaches the binder.
    pub(crate) fn classify(&mut self, base: u64, err: Error) -> Error {
        let gone = match &err {
            Error::ProcessExited => true,
            Error::InvalidAddress { .. } => {
                !self.accessor.is_alive() || self.accessor.read_bytes(base, 1).is_err()
            }
            _ => false,
        };

        if gone {
            info!(
                "{} at {:#x} is no longer readable ({}), detaching",
                self.layout.name(),
                base,
                err
            );
            self.base = None;
            Error::Detached
        } else {
            err
        }
    }

    /// Encode `value` over the last known bytes, update the cache and write.
    ///
    /// Returns the stored bytes and value, and the change to publish if the bytes moved.
    fn commit(
        &mut self,
        base: u64,
        idx: usize,
        value: &Value,
    ) -> Result<(CachedField, Option<FieldChange>)> {
        let layout = Arc::clone(&self.layout);
        let field = &layout.fields()[idx];
        let address = base + field.offset;

        // Partial struct values need the current member bytes underneath
        let cached_raw = self.cache[idx].as_ref().map(|c| c.raw.clone());
        let mut raw = match cached_raw {
            Some(raw) => raw,
            None if matches!(field.shape, ValueShape::Struct(_)) => {
                match self.accessor.read_bytes(address, field.size()) {
                    Ok(raw) => raw,
                    Err(e) => return Err(self.classify(base, e)),
                }
            }
            None => vec![0u8; field.size()],
        };
        codec::encode_into(&field.shape, value, &mut raw)?;
        let stored = codec::decode(&field.shape, &raw)?;

        let entry = CachedField { raw, value: stored };
        let previous = self.cache[idx].replace(entry.clone());
        let raw = &entry.raw;

        if let Err(e) = self.accessor.write_bytes(address, raw) {
            self.cache[idx] = previous;
            return Err(self.classify(base, e));
        }

        let changed = previous.as_ref().is_none_or(|p| &p.raw != raw);
        let change = changed.then(|| FieldChange {
            field: field.name.clone(),
            old: previous.map(|p| p.value),
            new: entry.value.clone(),
        });
        Ok((entry, change))
    }
}

impl std::fmt::Debug for MemoryBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBinder")
            .field("layout", &self.layout.name())
            .field("base", &self.base)
            .field("frozen", &self.freezes.len())
            .field("notifier", &self.notifier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::layout::builtin;
    use crate::memory::MockMemory;
    use crate::value::ScalarKind;

    const BASE: u64 = 0x7FF6_1000_0000;
    const ZOOM: u64 = BASE + builtin::camera::ZOOM;

    fn camera_binder(config: BinderConfig) -> (MockMemory, MemoryBinder) {
        let memory = MockMemory::new().with_region(BASE, 0x200);
        memory.poke_f32(ZOOM, 1.0);

        let layout = Arc::new(builtin::camera().unwrap());
        let mut binder = MemoryBinder::with_config(layout, Arc::new(memory.clone()), config);
        binder.attach(BASE).unwrap();
        (memory, binder)
    }

    fn setup() -> (MockMemory, MemoryBinder) {
        camera_binder(BinderConfig::default())
    }

    fn record_changes(binder: &mut MemoryBinder) -> Arc<Mutex<Vec<FieldChange>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        binder.subscribe_all(move |change| sink.lock().unwrap().push(change.clone()));
        seen
    }

    fn zoom(binder: &MemoryBinder) -> Option<f32> {
        binder.get("Zoom").unwrap().and_then(Value::as_f32)
    }

    #[test]
    fn test_refresh_reads_remote_values() {
        let (memory, mut binder) = setup();
        memory.poke(BASE + builtin::camera::ANGLE, &[0, 0, 0x80, 0x3F, 0, 0, 0, 0x40]);

        let report = binder.refresh().unwrap();

        assert_eq!(report.read, 9);
        assert_eq!(report.changed, 9);
        assert_eq!(report.skipped, 0);
        assert_eq!(zoom(&binder), Some(1.0));
        assert_eq!(
            binder.get("Angle").unwrap(),
            Some(&Value::Vector2([1.0, 2.0]))
        );
        assert_eq!(binder.get("Rotation").unwrap(), Some(&Value::F32(0.0)));
    }

    #[test]
    fn test_get_before_refresh_is_empty() {
        let (_memory, binder) = setup();
        assert_eq!(binder.get("Zoom").unwrap(), None);
        assert!(matches!(binder.get("Nope"), Err(Error::UnknownField(_))));
    }

    #[test]
    fn test_refresh_uses_one_block_read() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();
        binder.refresh().unwrap();
        assert_eq!(memory.read_count(), 2);
    }

    #[test]
    fn test_set_zoom_writes_through() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();

        binder.set("Zoom", Value::F32(2.5)).unwrap();
        assert_eq!(zoom(&binder), Some(2.5));
        assert_eq!(memory.peek_f32(ZOOM), Some(2.5));

        binder.refresh().unwrap();
        assert_eq!(zoom(&binder), Some(2.5));
    }

    #[test]
    fn test_freeze_overrides_external_writes() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();

        binder.freeze("Zoom", Some(Value::F32(5.0))).unwrap();
        memory.poke_f32(ZOOM, 9.9);

        let report = binder.refresh().unwrap();
        assert_eq!(report.reasserted, 1);
        assert_eq!(report.read, 8);
        assert_eq!(zoom(&binder), Some(5.0));
        assert_eq!(memory.peek_f32(ZOOM), Some(5.0));
    }

    #[test]
    fn test_freeze_without_value_holds_cached_value() {
        let (memory, mut binder) = setup();
        assert!(matches!(
            binder.freeze("Zoom", None),
            Err(Error::NotLoaded(_))
        ));

        binder.refresh().unwrap();
        binder.freeze("Zoom", None).unwrap();
        memory.poke_f32(ZOOM, 3.0);
        binder.refresh().unwrap();

        assert_eq!(memory.peek_f32(ZOOM), Some(1.0));
        assert_eq!(binder.freezes().get("Zoom"), Some(&Value::F32(1.0)));
    }

    #[test]
    fn test_unfreeze_restores_sync() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();
        binder.freeze("Zoom", Some(Value::F32(5.0))).unwrap();

        binder.freeze("Rotation", None).unwrap();
        assert_eq!(
            binder.frozen_fields().collect::<Vec<_>>(),
            vec!["Zoom", "Rotation"]
        );

        assert!(binder.unfreeze("Zoom").unwrap());
        assert!(!binder.unfreeze("Zoom").unwrap());
        assert!(binder.unfreeze("Rotation").unwrap());
        assert!(!binder.is_frozen("Zoom"));

        memory.poke_f32(ZOOM, 3.0);
        binder.refresh().unwrap();
        assert_eq!(zoom(&binder), Some(3.0));
        assert_eq!(memory.peek_f32(ZOOM), Some(3.0));
    }

    #[test]
    fn test_freeze_holds_undecodable_string_bytes() {
        let layout = Layout::builder("tag")
            .field("Name", 0, ValueShape::String { len: 4 })
            .build()
            .unwrap();
        let memory = MockMemory::new().with_region(BASE, 0x10);
        let original = [b'a', 0xFF, 0xFE, 0xFD];
        memory.poke(BASE, &original);

        let mut binder = MemoryBinder::new(Arc::new(layout), Arc::new(memory.clone()));
        binder.attach(BASE).unwrap();
        binder.refresh().unwrap();
        binder.freeze("Name", None).unwrap();

        memory.poke(BASE, b"zzzz");
        let report = binder.refresh().unwrap();

        assert_eq!(report.reasserted, 1);
        assert_eq!(report.reassert_failed, 0);
        assert_eq!(memory.peek(BASE, 4).unwrap(), original.to_vec());
    }

    #[test]
    fn test_frozen_fields_written_back_in_freeze_order() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();

        binder.freeze("Rotation", None).unwrap();
        binder.freeze("Zoom", Some(Value::F32(2.0))).unwrap();
        binder.freeze("Angle", None).unwrap();
        // Re-freezing keeps the original position
        binder.freeze("Rotation", Some(Value::F32(0.25))).unwrap();
        memory.take_write_log();

        binder.refresh().unwrap();

        assert_eq!(
            memory.take_write_log(),
            vec![
                BASE + builtin::camera::ROTATION,
                ZOOM,
                BASE + builtin::camera::ANGLE
            ]
        );
        assert_eq!(memory.peek_f32(BASE + builtin::camera::ROTATION), Some(0.25));
    }

    #[test]
    fn test_set_on_frozen_field_replaces_held_value() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();
        binder.freeze("Zoom", Some(Value::F32(5.0))).unwrap();

        binder.set("Zoom", Value::F32(6.0)).unwrap();
        memory.poke_f32(ZOOM, 9.9);
        binder.refresh().unwrap();

        assert_eq!(zoom(&binder), Some(6.0));
        assert_eq!(memory.peek_f32(ZOOM), Some(6.0));
    }

    #[test]
    fn test_detached_set_fails_and_keeps_cache() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();
        let writes = memory.write_count();

        binder.detach();
        let err = binder.set("Zoom", Value::F32(1.0)).unwrap_err();

        assert!(matches!(err, Error::Detached));
        assert_eq!(zoom(&binder), Some(1.0));
        assert_eq!(memory.write_count(), writes);
        assert!(matches!(binder.refresh(), Err(Error::Detached)));
        assert!(matches!(
            binder.freeze("Zoom", Some(Value::F32(2.0))),
            Err(Error::Detached)
        ));
    }

    #[test]
    fn test_write_failure_rolls_back_cache() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();
        let seen = record_changes(&mut binder);

        memory.deny_access(true);
        let err = binder.set("Zoom", Value::F32(2.5)).unwrap_err();

        assert!(matches!(err, Error::AccessDenied { .. }));
        assert_eq!(zoom(&binder), Some(1.0));
        assert!(binder.is_attached());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_partial_write_is_surfaced() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();

        memory.limit_writes(Some(2));
        let err = binder.set("Zoom", Value::F32(2.5)).unwrap_err();

        assert!(matches!(
            err,
            Error::PartialWrite {
                expected: 4,
                written: 2,
                ..
            }
        ));
        assert_eq!(zoom(&binder), Some(1.0));
    }

    #[test]
    fn test_transient_read_failure_keeps_last_value() {
        let (memory, mut binder) = camera_binder(BinderConfig::builder().block_reads(false).build());
        binder.refresh().unwrap();

        memory.poke_f32(ZOOM, 4.0);
        memory.fail_reads(ZOOM, 1);
        let report = binder.refresh().unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.read, 8);
        assert_eq!(zoom(&binder), Some(1.0));
        assert!(binder.is_attached());

        binder.refresh().unwrap();
        assert_eq!(zoom(&binder), Some(4.0));
    }

    #[test]
    fn test_unreadable_field_with_live_base_is_skipped() {
        let memory = MockMemory::new().with_region(BASE, 0x100);
        let layout = Layout::builder("sparse")
            .scalar("Near", 0x10, ScalarKind::U32)
            .scalar("Far", 0x1000, ScalarKind::U32)
            .build()
            .unwrap();
        let mut binder = MemoryBinder::new(Arc::new(layout), Arc::new(memory.clone()));
        binder.attach(BASE).unwrap();

        let report = binder.refresh().unwrap();

        assert_eq!(report.read, 1);
        assert_eq!(report.skipped, 1);
        assert!(binder.is_attached());
        assert_eq!(binder.get("Near").unwrap(), Some(&Value::U32(0)));
        assert_eq!(binder.get("Far").unwrap(), None);
    }

    #[test]
    fn test_freed_object_detaches_until_reattached() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();

        memory.unmap(BASE);
        assert!(matches!(binder.refresh(), Err(Error::Detached)));
        assert!(!binder.is_attached());
        assert_eq!(zoom(&binder), Some(1.0));

        memory.map(BASE, 0x200);
        let reads = memory.read_count();
        assert!(matches!(binder.refresh(), Err(Error::Detached)));
        assert_eq!(memory.read_count(), reads);

        binder.attach(BASE).unwrap();
        binder.refresh().unwrap();
        assert_eq!(zoom(&binder), Some(0.0));
    }

    #[test]
    fn test_process_exit_detaches() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();

        memory.kill();
        assert!(matches!(
            binder.set("Zoom", Value::F32(3.0)),
            Err(Error::Detached)
        ));
        assert!(!binder.is_attached());
        assert_eq!(zoom(&binder), Some(1.0));
    }

    #[test]
    fn test_change_events_in_declaration_order() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();
        let seen = record_changes(&mut binder);

        memory.poke_f32(BASE + builtin::camera::ROTATION, 0.5);
        memory.poke_f32(ZOOM, 3.0);
        memory.poke_f32(BASE + builtin::camera::Y_MAX, 10.0);
        binder.refresh().unwrap();

        let seen = seen.lock().unwrap();
        let fields: Vec<&str> = seen.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["Zoom", "YMax", "Rotation"]);
        assert_eq!(seen[0].old, Some(Value::F32(1.0)));
        assert_eq!(seen[0].new, Value::F32(3.0));
    }

    #[test]
    fn test_frozen_change_ordered_with_reads() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();
        binder.freeze("Zoom", None).unwrap();

        // Re-attaching drops the cache, so the held value is reported again
        binder.attach(BASE).unwrap();
        let seen = record_changes(&mut binder);
        memory.poke_f32(ZOOM, 9.0);
        binder.refresh().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 9);
        assert_eq!(seen[0].field, "Zoom");
        assert_eq!(seen[0].old, None);
        assert_eq!(seen[0].new, Value::F32(1.0));
        assert_eq!(memory.peek_f32(ZOOM), Some(1.0));
    }

    #[test]
    fn test_field_subscription_and_no_event_without_change() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = binder
            .subscribe("Zoom", move |c| sink.lock().unwrap().push(c.new.clone()))
            .unwrap();

        memory.poke_f32(ZOOM, 3.0);
        binder.refresh().unwrap();
        binder.refresh().unwrap();
        binder.set("Zoom", Value::F32(3.0)).unwrap();
        binder.set("Zoom", Value::F32(4.0)).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Value::F32(3.0), Value::F32(4.0)]
        );
        assert!(binder.unsubscribe(id));
        assert!(matches!(
            binder.subscribe("Nope", |_| {}),
            Err(Error::UnknownField(_))
        ));
    }

    #[test]
    fn test_set_rejects_string_with_nul() {
        let layout = Layout::builder("tag")
            .field("Name", 0, ValueShape::String { len: 8 })
            .build()
            .unwrap();
        let memory = MockMemory::new().with_region(BASE, 0x10);
        let mut binder = MemoryBinder::new(Arc::new(layout), Arc::new(memory.clone()));
        binder.attach(BASE).unwrap();

        let err = binder
            .set("Name", Value::String("a\0b".to_string()))
            .unwrap_err();

        assert!(matches!(err, Error::ShapeMismatch { .. }));
        assert_eq!(memory.write_count(), 0);
        binder.set("Name", Value::String("ab".to_string())).unwrap();
        assert_eq!(
            binder.get("Name").unwrap(),
            Some(&Value::String("ab".to_string()))
        );
    }

    #[test]
    fn test_shape_mismatch_does_not_write() {
        let (memory, mut binder) = setup();
        binder.refresh().unwrap();
        let writes = memory.write_count();

        let err = binder.set("Zoom", Value::I32(2)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
        assert_eq!(memory.write_count(), writes);
        assert!(matches!(
            binder.set("Nope", Value::F32(1.0)),
            Err(Error::UnknownField(_))
        ));
    }

    #[test]
    fn test_attach_rejects_null_and_overflow() {
        let (_memory, mut binder) = setup();
        assert!(matches!(
            binder.attach(0),
            Err(Error::InvalidAddress { .. })
        ));
        assert!(matches!(
            binder.attach(u64::MAX - 0x10),
            Err(Error::InvalidAddress { .. })
        ));
        assert_eq!(binder.base_address(), Some(BASE));
    }

    #[test]
    fn test_reattach_keeps_freezes() {
        const OTHER: u64 = 0x7FF6_2000_0000;
        let (memory, mut binder) = setup();
        memory.map(OTHER, 0x200);
        binder.refresh().unwrap();
        binder.freeze("Zoom", Some(Value::F32(5.0))).unwrap();

        binder.detach();
        binder.attach(OTHER).unwrap();
        binder.refresh().unwrap();

        assert_eq!(memory.peek_f32(OTHER + builtin::camera::ZOOM), Some(5.0));
        assert_eq!(zoom(&binder), Some(5.0));
    }

    #[test]
    fn test_partial_struct_set_keeps_other_members() {
        let color = Layout::builder("color")
            .scalar("R", 0, ScalarKind::F32)
            .scalar("G", 4, ScalarKind::F32)
            .build()
            .unwrap();
        let layout = Layout::builder("customize")
            .field("Skin", 0x20, ValueShape::Struct(Arc::new(color)))
            .build()
            .unwrap();

        let memory = MockMemory::new().with_region(BASE, 0x40);
        memory.poke_f32(BASE + 0x20, 0.75);
        let mut binder = MemoryBinder::new(Arc::new(layout), Arc::new(memory.clone()));
        binder.attach(BASE).unwrap();

        binder
            .set(
                "Skin",
                Value::Struct(vec![("G".to_string(), Value::F32(0.5))]),
            )
            .unwrap();

        assert_eq!(memory.peek_f32(BASE + 0x20), Some(0.75));
        assert_eq!(memory.peek_f32(BASE + 0x24), Some(0.5));
        let skin = binder.get("Skin").unwrap().unwrap();
        assert_eq!(skin.member("R"), Some(&Value::F32(0.75)));
    }

    #[test]
    fn test_shared_binder_across_threads() {
        let (memory, binder) = setup();
        let shared = binder.into_shared();

        let worker = Arc::clone(&shared);
        std::thread::spawn(move || worker.lock().set("Zoom", Value::F32(7.0)))
            .join()
            .unwrap()
            .unwrap();

        shared.lock().refresh().unwrap();
        assert_eq!(memory.peek_f32(ZOOM), Some(7.0));
        assert_eq!(zoom(&shared.lock()), Some(7.0));
    }

    #[test]
    fn test_binders_share_one_accessor_across_threads() {
        const OTHER: u64 = 0x7FF6_2000_0000;
        let memory = MockMemory::new()
            .with_region(BASE, 0x200)
            .with_region(OTHER, 0x200);
        let accessor: Arc<dyn MemoryAccessor> = Arc::new(memory.clone());
        let layout = Arc::new(builtin::camera().unwrap());

        let workers: Vec<_> = [(BASE, 2.0f32), (OTHER, 100.0f32)]
            .into_iter()
            .map(|(base, start)| {
                let mut binder = MemoryBinder::new(Arc::clone(&layout), Arc::clone(&accessor));
                std::thread::spawn(move || {
                    binder.attach(base).unwrap();
                    for step in 0..50 {
                        binder.set("Zoom", Value::F32(start + step as f32)).unwrap();
                        binder.refresh().unwrap();
                    }
                    binder
                })
            })
            .collect();

        let binders: Vec<MemoryBinder> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        assert_eq!(zoom(&binders[0]), Some(51.0));
        assert_eq!(zoom(&binders[1]), Some(149.0));
        assert_eq!(memory.peek_f32(ZOOM), Some(51.0));
        assert_eq!(memory.peek_f32(OTHER + builtin::camera::ZOOM), Some(149.0));
    }
}
