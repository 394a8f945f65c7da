//! Restores submission order from results that arrive in completion order.
//!
//! - [`OrderedReassembler`] releases a result only once every lower index has been
//!   released, holding early arrivals in an index-keyed map.
//! - [`ArrivalOrder`] releases results as they come; with a single worker that is
//!   already submission order.
//! - [`BatchCollector`] buffers every result into its slot and yields the whole
//!   batch at the end.
//!
//! All three are plain synchronous state machines; the async plumbing lives in the
//! adapters.

use crate::config::EmitPolicy;
use crate::types::{BatchResponse, FetchResult};
use std::collections::HashMap;

/// Streaming reassembly for either emit policy
#[derive(Debug)]
pub enum Reassembler {
    /// Cursor + holding map
    Ordered(OrderedReassembler),
    /// Pass-through
    AsArrived(ArrivalOrder),
}

impl Reassembler {
    /// Reassembler for `total` results under `policy`
    pub fn for_policy(policy: EmitPolicy, total: usize) -> Self {
        match policy {
            EmitPolicy::Ordered => Reassembler::Ordered(OrderedReassembler::new(total)),
            EmitPolicy::AsArrived => Reassembler::AsArrived(ArrivalOrder::new(total)),
        }
    }

    /// Accept one result and return every result that may now be emitted, in
    /// emission order.
    pub fn push(&mut self, result: FetchResult) -> Vec<FetchResult> {
        match self {
            Reassembler::Ordered(r) => r.push(result),
            Reassembler::AsArrived(r) => r.push(result),
        }
    }

    /// Results released so far
    pub fn emitted(&self) -> usize {
        match self {
            Reassembler::Ordered(r) => r.emitted(),
            Reassembler::AsArrived(r) => r.emitted(),
        }
    }

    /// Whether all expected results have been released
    pub fn is_complete(&self) -> bool {
        match self {
            Reassembler::Ordered(r) => r.is_complete(),
            Reassembler::AsArrived(r) => r.is_complete(),
        }
    }
}

/// Ordered-emit reassembly: strict ascending release regardless of arrival order.
#[derive(Debug)]
pub struct OrderedReassembler {
    next_expected: usize,
    total: usize,
    held: HashMap<usize, FetchResult>,
}

impl OrderedReassembler {
    /// Expect indices `0..total`
    pub fn new(total: usize) -> Self {
        Self {
            next_expected: 0,
            total,
            held: HashMap::new(),
        }
    }

    /// Accept one result; returns the (possibly empty) run of results now in order.
    ///
    /// Results outside `0..total`, already released, or already held are dropped.
    pub fn push(&mut self, result: FetchResult) -> Vec<FetchResult> {
        let index = result.index;
        if index >= self.total || index < self.next_expected || self.held.contains_key(&index) {
            tracing::warn!(
                index,
                next_expected = self.next_expected,
                total = self.total,
                "dropping unexpected or duplicate result"
            );
            return Vec::new();
        }

        if index != self.next_expected {
            self.held.insert(index, result);
            return Vec::new();
        }

        let mut ready = vec![result];
        self.next_expected += 1;
        while let Some(held) = self.held.remove(&self.next_expected) {
            ready.push(held);
            self.next_expected += 1;
        }
        ready
    }

    /// Next index that will be released
    pub fn next_expected(&self) -> usize {
        self.next_expected
    }

    /// Results waiting on an earlier index
    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Results released so far
    pub fn emitted(&self) -> usize {
        self.next_expected
    }

    /// Whether every index has been released
    pub fn is_complete(&self) -> bool {
        self.next_expected == self.total
    }
}

/// Emit-as-arrives reassembly. Only order-preserving when one worker fetches
/// sequentially; configuration validation enforces that.
#[derive(Debug)]
pub struct ArrivalOrder {
    total: usize,
    seen: Vec<bool>,
    emitted: usize,
}

impl ArrivalOrder {
    /// Expect indices `0..total`
    pub fn new(total: usize) -> Self {
        Self {
            total,
            seen: vec![false; total],
            emitted: 0,
        }
    }

    /// Accept one result and release it immediately unless it is a duplicate or
    /// out of range.
    pub fn push(&mut self, result: FetchResult) -> Vec<FetchResult> {
        match self.seen.get_mut(result.index) {
            Some(seen) if !*seen => {
                *seen = true;
                self.emitted += 1;
                vec![result]
            }
            _ => {
                tracing::warn!(
                    index = result.index,
                    total = self.total,
                    "dropping unexpected or duplicate result"
                );
                Vec::new()
            }
        }
    }

    /// Results released so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Whether every index has been released
    pub fn is_complete(&self) -> bool {
        self.emitted == self.total
    }
}

/// Fully-buffered batch collection into a fixed-size slot array.
#[derive(Debug)]
pub struct BatchCollector {
    slots: Vec<Option<String>>,
    filled: usize,
    failed: usize,
}

impl BatchCollector {
    /// Expect indices `0..total`
    pub fn new(total: usize) -> Self {
        Self {
            slots: vec![None; total],
            filled: 0,
            failed: 0,
        }
    }

    /// Store one rendered result in its slot; duplicates and out-of-range indices
    /// are dropped.
    pub fn push(&mut self, result: FetchResult) {
        let index = result.index;
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                if result.is_error() {
                    self.failed += 1;
                }
                *slot = Some(result.render());
                self.filled += 1;
            }
            _ => {
                tracing::warn!(
                    index,
                    total = self.slots.len(),
                    "dropping unexpected or duplicate result"
                );
            }
        }
    }

    /// Slots filled so far
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Filled slots holding an error placeholder
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Whether every slot is filled
    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// The batch in index order, or `None` while any slot is still empty
    pub fn finish(self) -> Option<BatchResponse> {
        let items = self.slots.into_iter().collect::<Option<Vec<_>>>()?;
        Some(BatchResponse { items })
    }
}
