//! In-memory address space for testing
//!
//! [`MockMemory`] stands in for a remote process: regions are mapped at
//! absolute addresses, and faults (denied access, short writes, transient
//! read failures, process exit) can be injected to exercise error paths.
//! Clones share the same address space, so a test can keep one handle to
//! play the "remote process" while a binder holds another.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use super::MemoryAccessor;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct MockState {
    regions: BTreeMap<u64, Vec<u8>>,
    deny_access: bool,
    write_limit: Option<usize>,
    failing_reads: HashMap<u64, usize>,
    exited: bool,
    reads: usize,
    writes: usize,
    /// Start address of every write, oldest first
    write_log: Vec<u64>,
}

impl MockState {
    /// Find the region fully containing `[address, address + len)`.
    fn locate(&self, address: u64, len: usize) -> Option<(u64, usize)> {
        let (&base, data) = self.regions.range(..=address).next_back()?;
        let offset = (address - base) as usize;
        if offset.checked_add(len)? <= data.len() {
            Some((base, offset))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockMemory {
    state: Arc<Mutex<MockState>>,
}

impl MockMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a zero-filled region
    pub fn with_region(self, address: u64, len: usize) -> Self {
        self.map(address, len);
        self
    }

    /// Map a zero-filled region, replacing any region at the same address
    pub fn map(&self, address: u64, len: usize) {
        self.state.lock().regions.insert(address, vec![0u8; len]);
    }

    /// Unmap the region starting at `address`
    pub fn unmap(&self, address: u64) -> bool {
        self.state.lock().regions.remove(&address).is_some()
    }

    /// Write bytes as the remote process would, bypassing injected faults.
    ///
    /// Returns `false` if the range is not mapped.
    pub fn poke(&self, address: u64, data: &[u8]) -> bool {
        let mut state = self.state.lock();
        match state.locate(address, data.len()) {
            Some((base, offset)) => {
                if let Some(region) = state.regions.get_mut(&base) {
                    region[offset..offset + data.len()].copy_from_slice(data);
                }
                true
            }
            None => false,
        }
    }

    /// Read bytes without going through the accessor (no faults, no counters)
    pub fn peek(&self, address: u64, len: usize) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let (base, offset) = state.locate(address, len)?;
        state
            .regions
            .get(&base)
            .map(|region| region[offset..offset + len].to_vec())
    }

    pub fn poke_f32(&self, address: u64, value: f32) -> bool {
        self.poke(address, &value.to_le_bytes())
    }

    pub fn peek_f32(&self, address: u64) -> Option<f32> {
        let bytes = self.peek(address, 4)?;
        Some(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Make every access fail with `AccessDenied`
    pub fn deny_access(&self, deny: bool) {
        self.state.lock().deny_access = deny;
    }

    /// Cap the number of bytes a single write may store
    pub fn limit_writes(&self, limit: Option<usize>) {
        self.state.lock().write_limit = limit;
    }

    /// Fail the next `times` reads starting exactly at `address`
    pub fn fail_reads(&self, address: u64, times: usize) {
        self.state.lock().failing_reads.insert(address, times);
    }

    /// Simulate the target process exiting
    pub fn kill(&self) {
        self.state.lock().exited = true;
    }

    /// Number of reads that reached the address space
    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }

    /// Number of writes that reached the address space
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    /// Drain the addresses of writes recorded so far
    pub fn take_write_log(&self) -> Vec<u64> {
        std::mem::take(&mut self.state.lock().write_log)
    }

    fn check_access(state: &MockState, address: u64) -> Result<()> {
        if state.exited {
            return Err(Error::ProcessExited);
        }
        if state.deny_access {
            return Err(Error::AccessDenied {
                address,
                message: "access denied by mock".to_string(),
            });
        }
        Ok(())
    }
}

impl MemoryAccessor for MockMemory {
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        Self::check_access(&state, address)?;

        if let Some(remaining) = state.failing_reads.get_mut(&address) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::InvalidAddress { address, len });
            }
        }

        let (base, offset) = state
            .locate(address, len)
            .ok_or(Error::InvalidAddress { address, len })?;
        state.reads += 1;
        Ok(state.regions[&base][offset..offset + len].to_vec())
    }

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_access(&state, address)?;

        let (base, offset) = state.locate(address, data.len()).ok_or(Error::InvalidAddress {
            address,
            len: data.len(),
        })?;

        let written = state.write_limit.map_or(data.len(), |l| l.min(data.len()));
        state.writes += 1;
        state.write_log.push(address);
        if let Some(region) = state.regions.get_mut(&base) {
            region[offset..offset + written].copy_from_slice(&data[..written]);
        }

        if written < data.len() {
            return Err(Error::PartialWrite {
                address,
                expected: data.len(),
                written,
            });
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.state.lock().exited
    }
}
