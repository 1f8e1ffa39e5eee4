//! Prelude module for convenient imports
//!
//! ```ignore
//! use membind::prelude::*;
//! ```

// Binding
pub use crate::binder::{BinderConfig, MemoryBinder, SharedBinder};
pub use crate::driver::{RefreshDriver, ShutdownSignal};
pub use crate::notify::FieldChange;

// Layouts and values
pub use crate::layout::{Layout, LayoutBuilder};
pub use crate::value::{ScalarKind, Value, ValueShape};

// Memory access
pub use crate::memory::{MemoryAccessor, ProcessMemory};

// Error handling
pub use crate::error::{Error, Result};
