//! Windows implementation over `ReadProcessMemory`/`WriteProcessMemory`

use std::ffi::c_void;

use tracing::debug;
use windows::Win32::Foundation::{
    BOOL, CloseHandle, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, ERROR_NOACCESS,
    ERROR_PARTIAL_COPY, HANDLE,
};
use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_VM_OPERATION,
    PROCESS_VM_READ, PROCESS_VM_WRITE,
};

use crate::error::{Error, Result};

/// Exit code reported by `GetExitCodeProcess` while the process runs
const STILL_ACTIVE: u32 = 259;

pub(super) struct ProcHandle {
    pid: u32,
    handle: HANDLE,
}

// SAFETY: a process HANDLE is a kernel object reference; Read/WriteProcessMemory
// may be called on it from any thread concurrently.
unsafe impl Send for ProcHandle {}
unsafe impl Sync for ProcHandle {}

impl ProcHandle {
    pub(super) fn open(pid: u32) -> Result<Self> {
        let access = PROCESS_VM_READ
            | PROCESS_VM_WRITE
            | PROCESS_VM_OPERATION
            | PROCESS_QUERY_LIMITED_INFORMATION;

        // SAFETY: OpenProcess has no memory-safety preconditions; the returned
        // handle is owned by ProcHandle and closed in Drop.
        let handle = unsafe { OpenProcess(access, BOOL::from(false), pid) }.map_err(|e| {
            if e.code() == ERROR_ACCESS_DENIED.to_hresult() {
                Error::AccessDenied {
                    address: 0,
                    message: format!("cannot open process {}: {}", pid, e),
                }
            } else if e.code() == ERROR_INVALID_PARAMETER.to_hresult() {
                Error::ProcessNotFound(pid)
            } else {
                Error::ProcessOpenFailed(format!("process {}: {}", pid, e))
            }
        })?;

        Ok(Self { pid, handle })
    }

    pub(super) fn is_alive(&self) -> bool {
        let mut code = 0u32;
        // SAFETY: the handle is valid for the lifetime of self and `code` is a
        // live stack variable.
        let result = unsafe { GetExitCodeProcess(self.handle, &mut code) };
        result.is_ok() && code == STILL_ACTIVE
    }

    pub(super) fn read(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        let mut read = 0usize;

        // SAFETY: the buffer holds `len` bytes and outlives the call; the remote
        // address is validated by the OS.
        let result = unsafe {
            ReadProcessMemory(
                self.handle,
                address as usize as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                len,
                Some(&mut read as *mut usize),
            )
        };

        match result {
            Ok(()) if read == len => Ok(buffer),
            Ok(()) => Err(Error::InvalidAddress { address, len }),
            Err(e) => Err(self.map_error(e, address, len)),
        }
    }

    pub(super) fn write(&self, address: u64, data: &[u8]) -> Result<()> {
        let mut written = 0usize;

        // SAFETY: `data` is a live slice of `data.len()` bytes.
        let result = unsafe {
            WriteProcessMemory(
                self.handle,
                address as usize as *const c_void,
                data.as_ptr() as *const c_void,
                data.len(),
                Some(&mut written as *mut usize),
            )
        };

        match result {
            Ok(()) if written == data.len() => Ok(()),
            _ if written > 0 && written < data.len() => {
                debug!(
                    "Short write to process {} at {:#x}: {} of {} bytes",
                    self.pid,
                    address,
                    written,
                    data.len()
                );
                Err(Error::PartialWrite {
                    address,
                    expected: data.len(),
                    written,
                })
            }
            Ok(()) => Err(Error::InvalidAddress {
                address,
                len: data.len(),
            }),
            Err(e) => Err(self.map_error(e, address, data.len())),
        }
    }

    fn map_error(&self, e: windows::core::Error, address: u64, len: usize) -> Error {
        if !self.is_alive() {
            return Error::ProcessExited;
        }
        let code = e.code();
        if code == ERROR_PARTIAL_COPY.to_hresult() || code == ERROR_NOACCESS.to_hresult() {
            Error::InvalidAddress { address, len }
        } else if code == ERROR_ACCESS_DENIED.to_hresult() {
            Error::AccessDenied {
                address,
                message: e.to_string(),
            }
        } else {
            Error::Io(std::io::Error::other(e.to_string()))
        }
    }
}

impl Drop for ProcHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by OpenProcess and is closed once.
        if let Err(e) = unsafe { CloseHandle(self.handle) } {
            debug!("Failed to close handle of process {}: {}", self.pid, e);
        }
    }
}
