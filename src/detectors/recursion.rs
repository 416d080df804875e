//! Recursion detection from call-stack depth

use crate::report::{count, Signal};
use crate::trace::{Event, Mapping, Trace};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecursionSignal {
    pub detected: bool,
    /// Deepest nesting reached by the Call/Return sequence
    pub max_depth: u32,
}

pub struct RecursionDetector;

impl RecursionDetector {
    /// A computation is recursive-looking when calls ever nest.
    ///
    /// Depth is recomputed from the Call/Return order rather than trusted
    /// from the events; a stray Return never drives it below zero.
    pub fn detect(trace: &Trace) -> RecursionSignal {
        let mut depth: u32 = 0;
        let mut max_depth: u32 = 0;

        for event in trace.events() {
            match event {
                Event::Call(_) => {
                    depth += 1;
                    max_depth = max_depth.max(depth);
                }
                Event::Return(_) => depth = depth.saturating_sub(1),
                Event::VarChange(_) => {}
            }
        }

        RecursionSignal {
            detected: max_depth > 1,
            max_depth,
        }
    }

    pub fn is_recursive(trace: &Trace) -> bool {
        Self::detect(trace).detected
    }
}

impl Signal for RecursionSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("max_depth".into(), count(self.max_depth as usize));
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceBuilder;

    #[test]
    fn test_nested_calls_are_recursive() {
        let trace = TraceBuilder::new()
            .call("fact", [("n", 2)])
            .call("fact", [("n", 1)])
            .ret(1)
            .ret(2)
            .build();
        let signal = RecursionDetector::detect(&trace);
        assert!(signal.detected);
        assert_eq!(signal.max_depth, 2);
    }

    #[test]
    fn test_flat_call_is_not_recursive() {
        let trace = TraceBuilder::new().call("f", [("x", 1)]).ret(2).build();
        assert!(!RecursionDetector::is_recursive(&trace));
    }

    #[test]
    fn test_unmatched_returns_do_not_underflow() {
        let trace = TraceBuilder::new()
            .ret(0)
            .ret(0)
            .enter("f")
            .enter("g")
            .build();
        assert_eq!(RecursionDetector::detect(&trace).max_depth, 2);
    }

    #[test]
    fn test_empty_trace() {
        let signal = RecursionDetector::detect(&Trace::default());
        assert!(!signal.detected);
        assert_eq!(signal.max_depth, 0);
    }
}
