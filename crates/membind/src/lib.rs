//! # membind
//!
//! Bind named fields of an object living in another process's memory to
//! local, observable values.
//!
//! This crate provides:
//! - Layouts: named fields at fixed offsets from a base address, built in code
//!   or loaded from JSON
//! - Little-endian encoding of scalars, vectors, enums, fixed strings and
//!   nested structs
//! - Remote memory access for Linux (`/proc/<pid>/mem`) and Windows
//!   (`ReadProcessMemory`), plus an in-memory mock for tests
//! - [`MemoryBinder`]: refresh, set, freeze and change notification for one
//!   bound object
//! - [`RefreshDriver`]: a background loop refreshing binders on an interval

pub mod binder;
pub mod codec;
pub mod driver;
pub mod error;
pub mod freeze;
pub mod layout;
pub mod memory;
pub mod notify;
pub mod prelude;
pub mod value;

pub use binder::{
    BinderConfig, BinderConfigBuilder, MemoryBinder, RefreshReport, SharedBinder,
};
pub use driver::{RefreshDriver, ShutdownSignal};
pub use error::{Error, Result};
pub use freeze::{FreezeEntry, FreezeTable};
pub use layout::file::{load_layout, parse_layout, save_layout};
pub use layout::{FieldDescriptor, Layout, LayoutBuilder};
pub use memory::{MemoryAccessor, MockMemory, ProcessMemory};
pub use notify::{ChangeNotifier, FieldChange, SubscriptionId};
pub use value::{EnumShape, ScalarKind, Value, ValueShape};
