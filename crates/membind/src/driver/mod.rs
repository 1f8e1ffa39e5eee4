//! Periodic refresh of one or more binders

mod shutdown;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::binder::SharedBinder;
use crate::error::{Error, Result};

pub use shutdown::ShutdownSignal;

/// Tick interval used when none is configured
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Drives `refresh` on a set of binders at a fixed interval
#[derive(Debug)]
pub struct RefreshDriver {
    binders: Vec<SharedBinder>,
    /// Whether each binder was detached on the last tick
    detached: Vec<bool>,
    interval: Duration,
    stop_on_detach: bool,
}

impl Default for RefreshDriver {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl RefreshDriver {
    pub fn new(interval: Duration) -> Self {
        Self {
            binders: Vec::new(),
            detached: Vec::new(),
            interval,
            stop_on_detach: false,
        }
    }

    /// Return from `run` once every binder is detached
    pub fn stop_on_detach(mut self, stop: bool) -> Self {
        self.stop_on_detach = stop;
        self
    }

    fn all_detached(&self) -> bool {
        !self.detached.is_empty() && self.detached.iter().all(|d| *d)
    }

    pub fn add(&mut self, binder: SharedBinder) {
        self.binders.push(binder);
        self.detached.push(false);
    }

    pub fn with_binder(mut self, binder: SharedBinder) -> Self {
        self.add(binder);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn len(&self) -> usize {
        self.binders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binders.is_empty()
    }

    /// Refresh every binder once. Returns how many refreshed successfully.
    pub fn tick(&mut self) -> usize {
        let mut ok = 0;
        for (binder, was_detached) in self.binders.iter().zip(self.detached.iter_mut()) {
            let mut binder = binder.lock();
            match binder.refresh() {
                Ok(_) => {
                    if *was_detached {
                        info!("{} is attached again", binder.layout().name());
                        *was_detached = false;
                    }
                    ok += 1;
                }
                Err(Error::Detached) => {
                    if !*was_detached {
                        warn!(
                            "{} is detached, waiting for a new attach",
                            binder.layout().name()
                        );
                        *was_detached = true;
                    }
                }
                Err(e) => warn!("Refresh of {} failed: {}", binder.layout().name(), e),
            }
        }
        ok
    }

    /// Tick until `shutdown` is triggered
    pub fn run(mut self, shutdown: &ShutdownSignal) {
        debug!(
            "Refresh loop started: {} binder(s) every {:?}",
            self.binders.len(),
            self.interval
        );
        while !shutdown.is_shutdown() {
            self.tick();
            if self.stop_on_detach && self.all_detached() {
                info!("Every binder is detached, stopping refresh loop");
                break;
            }
            if shutdown.wait(self.interval) {
                break;
            }
        }
        debug!("Refresh loop stopped");
    }

    /// Run the loop on a background thread
    pub fn spawn(self, shutdown: Arc<ShutdownSignal>) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("membind-refresh".to_string())
            .spawn(move || self.run(&shutdown))?;
        Ok(handle)
    }
}
