//! Gate - runtime toggle for forwarding

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Enable/disable switch consulted by the dispatcher on every tick
///
/// Closing the gate only suppresses the append call; producers keep
/// enqueueing and the pending batch keeps growing.
#[derive(Debug, Clone)]
pub struct Gate {
    open: Arc<AtomicBool>,
}

impl Gate {
    pub fn new(open: bool) -> Self {
        Self {
            open: Arc::new(AtomicBool::new(open)),
        }
    }

    /// Stop forwarding
    pub fn pause(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    /// Resume forwarding
    pub fn resume(&self) {
        self.open.store(true, Ordering::Relaxed);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new(true)
    }
}
