//! Dynamic-programming detection from write counts

use super::{scalar_changes, table_writes};
use crate::report::{counts, Signal};
use crate::trace::{Mapping, OrderedMap, Trace};
use serde::Serialize;

/// A scalar or a table rewritten this many times looks like a DP fill
pub const DP_WRITE_THRESHOLD: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DpSignal {
    pub detected: bool,
    /// Numeric-to-numeric rewrite counts per plain variable
    pub scalar_writes: OrderedMap<usize>,
    /// Write counts per indexed family
    pub table_writes: OrderedMap<usize>,
}

pub struct DpDetector;

impl DpDetector {
    pub fn detect(trace: &Trace) -> DpSignal {
        let mut scalar_writes: OrderedMap<usize> = OrderedMap::new();
        for change in scalar_changes(trace).filter(|c| c.is_numeric_change()) {
            *scalar_writes.entry(change.name.clone()).or_default() += 1;
        }
        let table_writes = table_writes(trace);

        let detected = scalar_writes.values().any(|&n| n >= DP_WRITE_THRESHOLD)
            || table_writes.values().any(|&n| n >= DP_WRITE_THRESHOLD);

        DpSignal {
            detected,
            scalar_writes,
            table_writes,
        }
    }
}

impl Signal for DpSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("scalar_writes".into(), counts(&self.scalar_writes));
        metrics.insert("table_writes".into(), counts(&self.table_writes));
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceBuilder;

    #[test]
    fn test_three_table_writes() {
        let trace = TraceBuilder::new()
            .enter("climb")
            .change("dp[0]", 0, 1)
            .change("dp[1]", 0, 1)
            .change("dp[2]", 0, 2)
            .build();
        let signal = DpDetector::detect(&trace);
        assert!(signal.detected);
        assert_eq!(signal.table_writes.get("dp"), Some(&3));
    }

    #[test]
    fn test_two_table_writes_are_not_enough() {
        let trace = TraceBuilder::new()
            .enter("climb")
            .change("dp[0]", 0, 1)
            .change("dp[1]", 0, 1)
            .build();
        assert!(!DpDetector::detect(&trace).detected);
    }

    #[test]
    fn test_rolling_scalars() {
        let trace = TraceBuilder::new()
            .enter("fib")
            .change("a", 0, 1)
            .change("a", 1, 1)
            .change("a", 1, 2)
            .build();
        let signal = DpDetector::detect(&trace);
        assert!(signal.detected);
        assert!(signal.table_writes.is_empty());
    }

    #[test]
    fn test_non_numeric_rewrites_are_ignored() {
        let trace = TraceBuilder::new()
            .enter("f")
            .change("s", "a", "ab")
            .change("s", "ab", "abc")
            .change("s", "abc", "abcd")
            .build();
        assert!(!DpDetector::detect(&trace).detected);
    }
}
