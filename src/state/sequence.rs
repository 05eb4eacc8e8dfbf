use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing request sequence numbers.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    next: AtomicU64,
}

impl RequestSequencer {
    /// Sequencer whose first number is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number.
    pub fn issue(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Highest sequence number whose response was applied to a stream.
///
/// Must be checked and updated under the same lock as the state it guards.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AppliedWatermark(u64);

impl AppliedWatermark {
    /// Accept `seq` if it is newer than anything applied so far.
    pub fn admit(&mut self, seq: u64) -> bool {
        if seq <= self.0 {
            return false;
        }
        self.0 = seq;
        true
    }

    /// Move the watermark forward without applying a response.
    pub fn advance_to(&mut self, seq: u64) {
        self.0 = self.0.max(seq);
    }

    /// Highest number applied so far; 0 before the first response.
    pub fn value(&self) -> u64 {
        self.0
    }
}
