use std::fmt;

use crate::error::Result;

/// Raw access to another process's address space
///
/// This is the only seam that touches the OS boundary. Implementations must be
/// safe to share between threads: several binders may use one accessor
/// concurrently.
pub trait MemoryAccessor: Send + Sync {
    /// Read exactly `len` bytes at `address`.
    ///
    /// Fails with `AccessDenied`, `InvalidAddress` or `ProcessExited`.
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>>;

    /// Write all of `data` at `address`.
    ///
    /// A short write is reported as `PartialWrite`, never swallowed.
    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()>;

    /// Whether the target process is still running
    fn is_alive(&self) -> bool {
        true
    }
}

impl fmt::Debug for dyn MemoryAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAccessor").finish_non_exhaustive()
    }
}
