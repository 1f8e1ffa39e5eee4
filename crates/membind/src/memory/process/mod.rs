//! Access to a live process's memory by process id

#[cfg(target_os = "linux")]
mod procfs;
#[cfg(target_os = "windows")]
mod win32;

#[cfg(target_os = "linux")]
use procfs::ProcHandle;
#[cfg(target_os = "windows")]
use win32::ProcHandle;

use tracing::info;

use super::MemoryAccessor;
use crate::error::{Error, Result};

/// Memory of a running process, opened for reading and writing
pub struct ProcessMemory {
    pid: u32,
    #[cfg(any(target_os = "linux", target_os = "windows"))]
    handle: ProcHandle,
}

impl ProcessMemory {
    /// Open a process by id
    #[cfg(any(target_os = "linux", target_os = "windows"))]
    pub fn open(pid: u32) -> Result<Self> {
        let handle = ProcHandle::open(pid)?;
        info!("Opened process {} for memory access", pid);
        Ok(Self { pid, handle })
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    pub fn open(pid: u32) -> Result<Self> {
        info!("Process memory access is unavailable on this platform");
        Err(Error::ProcessOpenFailed(format!(
            "process {}: memory access is only supported on Linux and Windows",
            pid
        )))
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

/// Reject null and ranges running past the top of the address space
#[cfg(any(target_os = "linux", target_os = "windows"))]
fn check_range(address: u64, len: usize) -> Result<()> {
    if address == 0 || address.checked_add(len as u64).is_none() {
        return Err(Error::InvalidAddress { address, len });
    }
    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "windows"))]
impl MemoryAccessor for ProcessMemory {
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        check_range(address, len)?;
        self.handle.read(address, len)
    }

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        check_range(address, data.len())?;
        self.handle.write(address, data)
    }

    fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
impl MemoryAccessor for ProcessMemory {
    fn read_bytes(&self, _address: u64, _len: usize) -> Result<Vec<u8>> {
        Err(Error::ProcessExited)
    }

    fn write_bytes(&self, _address: u64, _data: &[u8]) -> Result<()> {
        Err(Error::ProcessExited)
    }
}
