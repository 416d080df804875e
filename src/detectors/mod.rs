//! Heuristic pattern detectors
//!
//! Each detector is an independent, pure function over a whole [`Trace`].
//! None of them can fail: an absent signal is reported as "not detected"
//! with zero metrics. All thresholds are best-effort heuristics.

pub mod dp;
pub mod operations;
pub mod pointers;
pub mod recursion;

pub use dp::{DpDetector, DpSignal};
pub use operations::{
    AccumulationSignal, CollectionDetector, ConditionalDetector, ForLoopSignal, IfElseSignal,
    ListOpsSignal, LoopDetector, NestedLoopSignal, OperationDetector, SearchSignal, SortSignal,
    TallySignal, WhileLoopSignal,
};
pub use pointers::{PointerDetector, SlidingWindowSignal, TwoPointerSignal};
pub use recursion::{RecursionDetector, RecursionSignal};

use crate::trace::{OrderedMap, Trace, VarChange};

/// Changes to plain (non-indexed) variables
pub(crate) fn scalar_changes(trace: &Trace) -> impl Iterator<Item = &VarChange> {
    trace.var_changes().filter(|change| !change.is_indexed())
}

/// Non-zero integer deltas per plain variable, in first-seen order.
///
/// No-op changes are skipped so that producers emitting them do not
/// distort step sequences.
pub(crate) fn integer_deltas(trace: &Trace) -> OrderedMap<Vec<i64>> {
    let mut deltas: OrderedMap<Vec<i64>> = OrderedMap::new();
    for change in scalar_changes(trace) {
        match change.int_delta() {
            Some(0) | None => {}
            Some(delta) => deltas.entry(change.name.clone()).or_default().push(delta),
        }
    }
    deltas
}

/// Write counts per indexed family (`dp[0]`, `dp[1]` count towards `dp`)
pub(crate) fn table_writes(trace: &Trace) -> OrderedMap<usize> {
    let mut writes: OrderedMap<usize> = OrderedMap::new();
    for change in trace.var_changes() {
        if let Some(indexed) = change.indexed() {
            *writes.entry(indexed.base.to_string()).or_default() += 1;
        }
    }
    writes
}
