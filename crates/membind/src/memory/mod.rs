mod accessor;
mod process;

// Mock address space for testing (always available for unit and integration tests)
#[doc(hidden)]
pub mod mock;

pub use accessor::MemoryAccessor;
pub use process::ProcessMemory;

#[doc(hidden)]
pub use mock::MockMemory;
