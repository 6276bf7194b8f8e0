//! Deferred continuations
//!
//! A min-heap of timed actions. Each entry records the session and segment
//! index it was armed for; the scheduler re-validates both when it fires.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// What a deferred continuation does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredKind {
    /// Start the next segment early, overlapping the fade-out
    Crossfade,
    /// The segment reached its natural end
    SegmentEnd,
    /// Advance past a segment whose audio could not be played
    SkipMissing,
}

/// One armed continuation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deferred {
    pub due: f64,
    pub session: u64,
    pub index: usize,
    pub kind: DeferredKind,
    seq: u64,
}

impl Eq for Deferred {}

impl Ord for Deferred {
    // Reversed so BinaryHeap pops the earliest; ties fire in arm order
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Deferred {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending continuations ordered by due time
#[derive(Debug, Default)]
pub struct DeferredQueue {
    heap: BinaryHeap<Deferred>,
    next_seq: u64,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a continuation
    pub fn arm(&mut self, due: f64, session: u64, index: usize, kind: DeferredKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Deferred {
            due,
            session,
            index,
            kind,
            seq,
        });
    }

    /// Remove and return the earliest continuation due at or before `now`
    pub fn pop_due(&mut self, now: f64) -> Option<Deferred> {
        if self.heap.peek()?.due <= now {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Due time of the earliest continuation
    pub fn next_due(&self) -> Option<f64> {
        self.heap.peek().map(|d| d.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
