use crate::clock::ClockSource;
use std::sync::atomic::{AtomicU64, Ordering};

/// A manually-driven clock source.
pub struct Mock {
    offset: AtomicU64,
}

impl Mock {
    pub fn new(offset: u64) -> Self {
        Self {
            offset: AtomicU64::new(offset),
        }
    }

    pub fn increment(&self, amount: u64) {
        self.offset.fetch_add(amount, Ordering::Release);
    }

    pub fn set(&self, offset: u64) {
        self.offset.store(offset, Ordering::Release);
    }
}

impl ClockSource for Mock {
    fn now(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }
}
