use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic version counter shared between an owner and the tasks it spawns.
///
/// Work scheduled on behalf of the owner captures an [`EpochStamp`]; once the
/// owner calls [`Epoch::advance`] every previously issued stamp is stale and
/// the work must be dropped instead of applied.
#[derive(Debug, Clone, Default)]
pub struct Epoch {
    value: Arc<AtomicU64>,
}

/// Snapshot of an [`Epoch`] at the time some work was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpochStamp(u64);

impl EpochStamp {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl Epoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamp(&self) -> EpochStamp {
        EpochStamp(self.value.load(Ordering::Acquire))
    }

    /// Invalidate all outstanding stamps and return the new current stamp.
    pub fn advance(&self) -> EpochStamp {
        EpochStamp(self.value.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
    }

    pub fn is_current(&self, stamp: EpochStamp) -> bool {
        self.stamp() == stamp
    }
}
