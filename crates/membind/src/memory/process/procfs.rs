//! Linux implementation over `/proc/<pid>/mem`
//!
//! Positioned reads and writes (`pread`/`pwrite`) carry their own offset, so
//! one handle can be shared between threads without a lock.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::{Error, Result};

const EPERM: i32 = 1;
const ESRCH: i32 = 3;
const EIO: i32 = 5;
const EFAULT: i32 = 14;
const EINVAL: i32 = 22;

pub(super) struct ProcHandle {
    pid: u32,
    mem: File,
    writable: bool,
}

impl ProcHandle {
    pub(super) fn open(pid: u32) -> Result<Self> {
        let proc_dir = PathBuf::from(format!("/proc/{}", pid));
        if !proc_dir.exists() {
            return Err(Error::ProcessNotFound(pid));
        }

        let mem_path = proc_dir.join("mem");
        match OpenOptions::new().read(true).write(true).open(&mem_path) {
            Ok(mem) => Ok(Self {
                pid,
                mem,
                writable: true,
            }),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!(
                    "No write access to {}, opening read-only: {}",
                    mem_path.display(),
                    e
                );
                let mem = File::open(&mem_path).map_err(|e| open_error(pid, e))?;
                Ok(Self {
                    pid,
                    mem,
                    writable: false,
                })
            }
            Err(e) => Err(open_error(pid, e)),
        }
    }

    pub(super) fn is_alive(&self) -> bool {
        PathBuf::from(format!("/proc/{}", self.pid)).exists()
    }

    pub(super) fn read(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            match self.mem.read_at(&mut buffer[filled..], address + filled as u64) {
                Ok(0) => return Err(Error::InvalidAddress { address, len }),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.map_io_error(e, address, len)),
            }
        }

        Ok(buffer)
    }

    pub(super) fn write(&self, address: u64, data: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::AccessDenied {
                address,
                message: format!("process {} memory was opened read-only", self.pid),
            });
        }

        let mut written = 0;
        while written < data.len() {
            let result = self.mem.write_at(&data[written..], address + written as u64);
            match result {
                Ok(n) if n > 0 => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Ok(_) if written == 0 => {
                    return Err(Error::InvalidAddress {
                        address,
                        len: data.len(),
                    });
                }
                Err(e) if written == 0 => return Err(self.map_io_error(e, address, data.len())),
                _ => {
                    debug!(
                        "Short write to process {} at {:#x}: {} of {} bytes",
                        self.pid,
                        address,
                        written,
                        data.len()
                    );
                    return Err(Error::PartialWrite {
                        address,
                        expected: data.len(),
                        written,
                    });
                }
            }
        }

        Ok(())
    }

    fn map_io_error(&self, e: std::io::Error, address: u64, len: usize) -> Error {
        if !self.is_alive() {
            return Error::ProcessExited;
        }
        match e.raw_os_error() {
            Some(ESRCH) => Error::ProcessExited,
            // Offsets above i64::MAX are refused with EINVAL
            Some(EIO) | Some(EFAULT) | Some(EINVAL) => Error::InvalidAddress { address, len },
            Some(EPERM) => Error::AccessDenied {
                address,
                message: e.to_string(),
            },
            _ if e.kind() == ErrorKind::PermissionDenied => Error::AccessDenied {
                address,
                message: e.to_string(),
            },
            _ => Error::Io(e),
        }
    }
}

fn open_error(pid: u32, e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::NotFound => Error::ProcessNotFound(pid),
        ErrorKind::PermissionDenied => Error::AccessDenied {
            address: 0,
            message: format!("cannot open memory of process {}: {}", pid, e),
        },
        _ => Error::ProcessOpenFailed(format!("process {}: {}", pid, e)),
    }
}
