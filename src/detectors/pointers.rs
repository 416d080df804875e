//! Two-pointer and sliding-window detection
//!
//! Both patterns show up as integer variables that move one step at a time.
//! Two pointers need at least two variables that only ever walk in one
//! direction; a sliding window additionally needs one side to grow and
//! another to move back.

use super::integer_deltas;
use crate::report::{names, Signal};
use crate::trace::{Mapping, OrderedMap, Trace, Value};
use serde::Serialize;

/// Minimum number of stepping variables for either pattern
pub const MIN_POINTERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwoPointerSignal {
    pub detected: bool,
    /// Variables that only moved by +1
    pub advancing: Vec<String>,
    /// Variables that only moved by -1
    pub retreating: Vec<String>,
}

impl TwoPointerSignal {
    pub fn pointer_count(&self) -> usize {
        self.advancing.len() + self.retreating.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlidingWindowSignal {
    pub detected: bool,
    /// Unit moves per stepping variable
    pub moves: OrderedMap<Vec<i64>>,
    /// Variables whose unit moves were all forward
    pub expanding: Vec<String>,
    /// Variables with at least one backward unit move
    pub shrinking: Vec<String>,
}

pub struct PointerDetector;

impl PointerDetector {
    /// Two or more plain integer variables whose every change is +1, or
    /// whose every change is -1
    pub fn detect_two_pointers(trace: &Trace) -> TwoPointerSignal {
        let mut advancing = Vec::new();
        let mut retreating = Vec::new();

        for (name, deltas) in integer_deltas(trace).iter() {
            if deltas.iter().all(|&d| d == 1) {
                advancing.push(name.to_string());
            } else if deltas.iter().all(|&d| d == -1) {
                retreating.push(name.to_string());
            }
        }

        let detected = advancing.len() + retreating.len() >= MIN_POINTERS;
        log::debug!(
            "two pointers: advancing={:?} retreating={:?} detected={}",
            advancing,
            retreating,
            detected
        );
        TwoPointerSignal {
            detected,
            advancing,
            retreating,
        }
    }

    /// Two or more variables stepping by one, with one side only ever
    /// expanding and some variable moving backwards
    pub fn detect_sliding_window(trace: &Trace) -> SlidingWindowSignal {
        let mut moves: OrderedMap<Vec<i64>> = OrderedMap::new();
        for (name, deltas) in integer_deltas(trace).iter() {
            let unit: Vec<i64> = deltas.iter().copied().filter(|&d| matches!(d, 1 | -1)).collect();
            if !unit.is_empty() {
                moves.insert(name.clone(), unit);
            }
        }

        let expanding: Vec<String> = moves
            .iter()
            .filter(|(_, m)| m.iter().all(|&d| d > 0))
            .map(|(name, _)| name.to_string())
            .collect();
        let shrinking: Vec<String> = moves
            .iter()
            .filter(|(_, m)| m.iter().any(|&d| d < 0))
            .map(|(name, _)| name.to_string())
            .collect();

        let detected = moves.len() >= MIN_POINTERS && !expanding.is_empty() && !shrinking.is_empty();
        SlidingWindowSignal {
            detected,
            moves,
            expanding,
            shrinking,
        }
    }
}

impl Signal for TwoPointerSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("advancing".into(), names(&self.advancing));
        metrics.insert("retreating".into(), names(&self.retreating));
        metrics
    }
}

impl Signal for SlidingWindowSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let moves: Mapping = self
            .moves
            .iter()
            .map(|(name, m)| (name.clone(), Value::from(m.clone())))
            .collect();
        let mut metrics = Mapping::new();
        metrics.insert("moves".into(), Value::Mapping(moves));
        metrics.insert("expanding".into(), names(&self.expanding));
        metrics.insert("shrinking".into(), names(&self.shrinking));
        metrics
    }
}
