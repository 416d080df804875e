//! Detectors for general operations: loops, branches, collection usage,
//! accumulation, searching and sorting.

use super::table_writes;
use crate::report::{count, counts, names, Signal};
use crate::trace::{Mapping, OrderedMap, Trace, Value};
use serde::Serialize;
use std::collections::BTreeSet;

/// Unit increments a variable needs before it looks like a loop counter
pub const FOR_LOOP_MIN_INCREMENTS: usize = 2;
/// A variable changed more often than this is churning
pub const CHURN_THRESHOLD: usize = 2;
/// Churning variables needed for a while-loop
pub const WHILE_LOOP_MIN_VARS: usize = 2;
/// An indexed family written more often than this looks like a sort
pub const SORT_WRITE_THRESHOLD: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForLoopSignal {
    pub detected: bool,
    /// Variables incremented by exactly one at least twice
    pub counters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhileLoopSignal {
    pub detected: bool,
    pub churning: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedLoopSignal {
    pub detected: bool,
    /// Number of distinct depths at which variables changed
    pub nesting_level: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfElseSignal {
    pub detected: bool,
    /// Distinct depths at which functions returned
    pub branches: usize,
    pub has_else: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListOpsSignal {
    pub detected: bool,
    pub read_count: usize,
    pub write_count: usize,
    pub accessed_lists: Vec<String>,
}

/// Simple operation tally used for mapping, set and text usage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TallySignal {
    pub detected: bool,
    pub operations: usize,
    pub transformations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccumulationSignal {
    pub detected: bool,
    pub accumulator_vars: Vec<String>,
    pub operations_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSignal {
    pub detected: bool,
    pub comparisons: usize,
    pub pointer_moves: usize,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortSignal {
    pub detected: bool,
    pub swap_count: usize,
    pub table_writes: OrderedMap<usize>,
}

pub struct LoopDetector;

impl LoopDetector {
    pub fn detect_for_loops(trace: &Trace) -> ForLoopSignal {
        let mut increments: OrderedMap<usize> = OrderedMap::new();
        for change in trace.var_changes() {
            if change.int_delta() == Some(1) {
                *increments.entry(change.name.clone()).or_default() += 1;
            }
        }

        let counters: Vec<String> = increments
            .iter()
            .filter(|&(_, &n)| n >= FOR_LOOP_MIN_INCREMENTS)
            .map(|(name, _)| name.to_string())
            .collect();
        ForLoopSignal {
            detected: !counters.is_empty(),
            counters,
        }
    }

    pub fn detect_while_loops(trace: &Trace) -> WhileLoopSignal {
        let churning = churning_variables(trace);
        WhileLoopSignal {
            detected: churning.len() >= WHILE_LOOP_MIN_VARS,
            churning,
        }
    }

    pub fn detect_nested_loops(trace: &Trace) -> NestedLoopSignal {
        let depths: BTreeSet<u32> = trace.var_changes().map(|c| c.depth).collect();
        NestedLoopSignal {
            detected: depths.len() > 1,
            nesting_level: if depths.len() > 1 { depths.len() } else { 0 },
        }
    }
}

/// Variables changed more than [`CHURN_THRESHOLD`] times, in first-seen order
pub(crate) fn churning_variables(trace: &Trace) -> Vec<String> {
    let mut changes: OrderedMap<usize> = OrderedMap::new();
    for change in trace.var_changes() {
        *changes.entry(change.name.clone()).or_default() += 1;
    }
    changes
        .iter()
        .filter(|&(_, &n)| n > CHURN_THRESHOLD)
        .map(|(name, _)| name.to_string())
        .collect()
}

pub struct ConditionalDetector;

impl ConditionalDetector {
    /// Returns at more than one depth mean some frames took a different path
    pub fn detect_if_else(trace: &Trace) -> IfElseSignal {
        let depths: BTreeSet<u32> = trace.returns().map(|r| r.depth).collect();
        let detected = depths.len() > 1;
        IfElseSignal {
            detected,
            branches: if detected { depths.len() } else { 0 },
            has_else: detected,
        }
    }
}

pub struct CollectionDetector;

impl CollectionDetector {
    /// Indexed changes; a change that leaves the element as it was counts as a read
    pub fn detect_list_operations(trace: &Trace) -> ListOpsSignal {
        let mut read_count = 0;
        let mut write_count = 0;
        let mut accessed_lists: Vec<String> = Vec::new();

        for change in trace.var_changes() {
            let Some(indexed) = change.indexed() else {
                continue;
            };
            if !accessed_lists.iter().any(|l| l == indexed.base) {
                accessed_lists.push(indexed.base.to_string());
            }
            if change.old != change.new {
                write_count += 1;
            } else {
                read_count += 1;
            }
        }

        ListOpsSignal {
            detected: read_count + write_count > 0,
            read_count,
            write_count,
            accessed_lists,
        }
    }

    pub fn detect_dict_operations(trace: &Trace) -> TallySignal {
        let operations = trace
            .var_changes()
            .filter(|c| matches!(c.new, Value::Mapping(_)) || matches!(c.old, Value::Mapping(_)))
            .count();
        TallySignal {
            detected: operations > 0,
            operations,
            transformations: 0,
        }
    }

    pub fn detect_set_operations(trace: &Trace) -> TallySignal {
        let operations = trace
            .var_changes()
            .filter(|c| matches!(c.new, Value::SetOf(_)))
            .count();
        TallySignal {
            detected: operations > 0,
            operations,
            transformations: 0,
        }
    }

    pub fn detect_string_operations(trace: &Trace) -> TallySignal {
        let mut operations = 0;
        let mut transformations = 0;
        for change in trace.var_changes() {
            if let Value::Text(new) = &change.new {
                operations += 1;
                if matches!(&change.old, Value::Text(old) if old != new) {
                    transformations += 1;
                }
            }
        }
        TallySignal {
            detected: operations > 0,
            operations,
            transformations,
        }
    }
}

pub struct OperationDetector;

impl OperationDetector {
    /// Numeric variables whose successive values strictly increase
    pub fn detect_accumulation(trace: &Trace) -> AccumulationSignal {
        let mut history: OrderedMap<Vec<f64>> = OrderedMap::new();
        for change in trace.var_changes().filter(|c| c.is_numeric_change()) {
            if let Some(new) = change.new.as_f64() {
                history.entry(change.name.clone()).or_default().push(new);
            }
        }

        let mut accumulator_vars = Vec::new();
        let mut operations_count = 0;
        for (name, values) in history.iter() {
            if values.len() > 1 && values.windows(2).all(|w| w[1] > w[0]) {
                accumulator_vars.push(name.to_string());
                operations_count += values.len();
            }
        }

        AccumulationSignal {
            detected: !accumulator_vars.is_empty(),
            accumulator_vars,
            operations_count,
        }
    }

    /// Comparison results interleaved with unit pointer steps
    pub fn detect_search(trace: &Trace) -> SearchSignal {
        let mut comparisons = 0;
        let mut pointer_moves = 0;
        for change in trace.var_changes() {
            if matches!(change.new, Value::Boolean(_)) {
                comparisons += 1;
            } else if matches!(change.int_delta(), Some(1 | -1)) {
                pointer_moves += 1;
            }
        }

        let detected = comparisons > 0 && pointer_moves > 0;
        SearchSignal {
            detected,
            comparisons,
            pointer_moves,
            iterations: if detected {
                comparisons.max(pointer_moves)
            } else {
                0
            },
        }
    }

    /// Heavy rewriting of one indexed family
    pub fn detect_sorting(trace: &Trace) -> SortSignal {
        let table_writes = table_writes(trace);
        let detected = table_writes.values().any(|&n| n > SORT_WRITE_THRESHOLD);
        let swap_count = if detected {
            table_writes.values().sum::<usize>() / 2
        } else {
            0
        };
        SortSignal {
            detected,
            swap_count,
            table_writes,
        }
    }
}

impl Signal for ForLoopSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("counters".into(), names(&self.counters));
        metrics
    }
}

impl Signal for WhileLoopSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("churning".into(), names(&self.churning));
        metrics
    }
}

impl Signal for NestedLoopSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("nesting_level".into(), count(self.nesting_level));
        metrics
    }
}

impl Signal for IfElseSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("branches".into(), count(self.branches));
        metrics.insert("has_else".into(), Value::Boolean(self.has_else));
        metrics
    }
}

impl Signal for ListOpsSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("read_count".into(), count(self.read_count));
        metrics.insert("write_count".into(), count(self.write_count));
        metrics.insert("accessed_lists".into(), names(&self.accessed_lists));
        metrics
    }
}

impl Signal for TallySignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("operations".into(), count(self.operations));
        metrics.insert("transformations".into(), count(self.transformations));
        metrics
    }
}

impl Signal for AccumulationSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("accumulator_vars".into(), names(&self.accumulator_vars));
        metrics.insert("operations_count".into(), count(self.operations_count));
        metrics
    }
}

impl Signal for SearchSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("comparisons".into(), count(self.comparisons));
        metrics.insert("pointer_moves".into(), count(self.pointer_moves));
        metrics.insert("iterations".into(), count(self.iterations));
        metrics
    }
}

impl Signal for SortSignal {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("swap_count".into(), count(self.swap_count));
        metrics.insert("table_writes".into(), counts(&self.table_writes));
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceBuilder;

    #[test]
    fn test_for_loop_counter() {
        let trace = TraceBuilder::new()
            .enter("f")
            .change("i", 0, 1)
            .change("i", 1, 2)
            .build();
        let signal = LoopDetector::detect_for_loops(&trace);
        assert!(signal.detected);
        assert_eq!(signal.counters, vec!["i"]);

        let once = TraceBuilder::new().enter("f").change("i", 0, 1).build();
        assert!(!LoopDetector::detect_for_loops(&once).detected);
    }

    #[test]
    fn test_while_loop_needs_two_churning_vars() {
        let mut builder = TraceBuilder::new().enter("collatz");
        for n in 0..3 {
            builder = builder.change("n", n, n + 1);
        }
        assert!(!LoopDetector::detect_while_loops(&builder.build()).detected);

        let mut builder = TraceBuilder::new().enter("collatz");
        for n in 0..3 {
            builder = builder.change("n", n, n + 1).change("steps", n, n + 1);
        }
        let signal = LoopDetector::detect_while_loops(&builder.build());
        assert!(signal.detected);
        assert_eq!(signal.churning, vec!["n", "steps"]);
    }

    #[test]
    fn test_nested_and_if_else() {
        let trace = TraceBuilder::new()
            .call("depth", [("n", 1)])
            .change("x", 0, 1)
            .call("depth", [("n", 0)])
            .change("x", 0, 2)
            .ret(0)
            .ret(1)
            .build();
        let nested = LoopDetector::detect_nested_loops(&trace);
        assert!(nested.detected);
        assert_eq!(nested.nesting_level, 2);

        let branches = ConditionalDetector::detect_if_else(&trace);
        assert!(branches.detected);
        assert_eq!(branches.branches, 2);
    }

    #[test]
    fn test_list_operations_reads_and_writes() {
        let trace = TraceBuilder::new()
            .enter("f")
            .change("arr[0]", 3, 1)
            .change("arr[1]", 2, 2)
            .change("seen[4]", false, true)
            .build();
        let signal = CollectionDetector::detect_list_operations(&trace);
        assert_eq!(signal.write_count, 2);
        assert_eq!(signal.read_count, 1);
        assert_eq!(signal.accessed_lists, vec!["arr", "seen"]);
    }

    #[test]
    fn test_string_transformations() {
        let trace = TraceBuilder::new()
            .enter("f")
            .change("s", "a", "ab")
            .change("t", 1, "x")
            .build();
        let signal = CollectionDetector::detect_string_operations(&trace);
        assert_eq!(signal.operations, 2);
        assert_eq!(signal.transformations, 1);
    }

    #[test]
    fn test_strict_accumulator() {
        let trace = TraceBuilder::new()
            .enter("sum")
            .change("total", 0, 1)
            .change("total", 1, 3)
            .change("total", 3, 6)
            .change("x", 5, 4)
            .change("x", 4, 7)
            .build();
        let signal = OperationDetector::detect_accumulation(&trace);
        assert!(signal.detected);
        assert_eq!(signal.accumulator_vars, vec!["total"]);
        assert_eq!(signal.operations_count, 3);
    }

    #[test]
    fn test_search_needs_both_signals() {
        let trace = TraceBuilder::new()
            .enter("find")
            .change("found", false, true)
            .change("i", 0, 1)
            .build();
        let signal = OperationDetector::detect_search(&trace);
        assert!(signal.detected);
        assert_eq!(signal.iterations, 1);

        let only_compare = TraceBuilder::new().enter("f").change("ok", false, true).build();
        assert!(!OperationDetector::detect_search(&only_compare).detected);
    }

    #[test]
    fn test_sorting_family_writes() {
        let mut builder = TraceBuilder::new().enter("bubble");
        for i in 0..6 {
            builder = builder.change(&format!("arr[{}]", i % 3), i, i + 10);
        }
        let signal = OperationDetector::detect_sorting(&builder.build());
        assert!(signal.detected);
        assert_eq!(signal.swap_count, 3);
    }

    #[test]
    fn test_empty_trace_yields_zero_forms() {
        let trace = Trace::default();
        assert!(!LoopDetector::detect_for_loops(&trace).detected);
        assert!(!LoopDetector::detect_while_loops(&trace).detected);
        assert!(!LoopDetector::detect_nested_loops(&trace).detected);
        assert!(!ConditionalDetector::detect_if_else(&trace).detected);
        assert!(!CollectionDetector::detect_list_operations(&trace).detected);
        assert!(!OperationDetector::detect_accumulation(&trace).detected);
        assert!(!OperationDetector::detect_search(&trace).detected);
        let sort = OperationDetector::detect_sorting(&trace);
        assert!(!sort.detected);
        assert_eq!(sort.swap_count, 0);
    }
}
