//! Generic multi-signal analysis
//!
//! Aggregates eight independent sub-signals (loops, conditionals, data
//! structure usage, arithmetic, comparisons, mutations, call pattern and
//! type transformations) into one report, without assuming any particular
//! algorithm.

use crate::detectors::operations::churning_variables;
use crate::report::{count, counts, names, PatternReport, Signal};
use crate::trace::{Event, Mapping, OrderedMap, Trace, Value, ValueKind};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopPattern {
    pub detected: bool,
    pub loop_vars: Vec<String>,
    /// Change count of the first loop-like variable
    pub iteration_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalPattern {
    pub detected: bool,
    /// Variables that took more than one distinct (value, line) pair
    pub branches: usize,
    /// Returns shallower than the deepest call
    pub early_returns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataStructurePattern {
    pub detected: bool,
    /// Changes to indexed references
    pub indexed_accesses: usize,
    pub sequence_values: usize,
    pub mapping_values: usize,
    pub set_values: usize,
    pub text_values: usize,
    /// Container kinds in first-seen order
    pub detected_types: Vec<ValueKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArithmeticPattern {
    pub detected: bool,
    pub numeric_ops: usize,
    pub increment_ops: usize,
    pub decrement_ops: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonPattern {
    pub detected: bool,
    /// Boolean-valued changes
    pub comparison_chains: usize,
    /// Distinct new values seen across all changes
    pub values_compared: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationPattern {
    pub detected: bool,
    pub total_mutations: usize,
    pub mutation_frequency: OrderedMap<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallPattern {
    pub detected: bool,
    pub total_calls: usize,
    /// A function was entered while an earlier frame of it was still open
    pub recursive: bool,
    pub max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationPattern {
    pub detected: bool,
    pub type_conversions: usize,
    pub value_transformations: usize,
    pub transformation_pairs: Vec<(ValueKind, ValueKind)>,
}

/// All eight sub-signals for one trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenericReport {
    pub loops: LoopPattern,
    pub conditionals: ConditionalPattern,
    pub data_structures: DataStructurePattern,
    pub arithmetic: ArithmeticPattern,
    pub comparisons: ComparisonPattern,
    pub mutations: MutationPattern,
    pub function_calls: CallPattern,
    pub transformations: TransformationPattern,
}

pub struct GenericAnalyzer;

impl GenericAnalyzer {
    pub fn analyze(trace: &Trace) -> GenericReport {
        GenericReport {
            loops: Self::loops(trace),
            conditionals: Self::conditionals(trace),
            data_structures: Self::data_structures(trace),
            arithmetic: Self::arithmetic(trace),
            comparisons: Self::comparisons(trace),
            mutations: Self::mutations(trace),
            function_calls: Self::function_calls(trace),
            transformations: Self::transformations(trace),
        }
    }

    fn loops(trace: &Trace) -> LoopPattern {
        let loop_vars = churning_variables(trace);
        let iteration_count = loop_vars
            .first()
            .map(|name| trace.var_changes().filter(|c| &c.name == name).count())
            .unwrap_or(0);
        LoopPattern {
            detected: !loop_vars.is_empty(),
            loop_vars,
            iteration_count,
        }
    }

    fn conditionals(trace: &Trace) -> ConditionalPattern {
        let max_depth = trace.max_call_depth();
        let early_returns = trace.returns().filter(|r| r.depth < max_depth).count();

        let mut paths: OrderedMap<Vec<(&Value, u32)>> = OrderedMap::new();
        for change in trace.var_changes() {
            let seen = paths.entry(change.name.clone()).or_default();
            if !seen.iter().any(|(v, line)| *v == &change.new && *line == change.line) {
                seen.push((&change.new, change.line));
            }
        }
        let branches = paths.values().filter(|seen| seen.len() > 1).count();

        ConditionalPattern {
            detected: early_returns > 0 || branches > 0,
            branches,
            early_returns,
        }
    }

    fn data_structures(trace: &Trace) -> DataStructurePattern {
        let mut pattern = DataStructurePattern {
            detected: false,
            indexed_accesses: 0,
            sequence_values: 0,
            mapping_values: 0,
            set_values: 0,
            text_values: 0,
            detected_types: Vec::new(),
        };

        for change in trace.var_changes() {
            if change.is_indexed() {
                pattern.indexed_accesses += 1;
            }
            let kind = change.new.kind();
            let tally = match kind {
                ValueKind::Sequence => &mut pattern.sequence_values,
                ValueKind::Mapping => &mut pattern.mapping_values,
                ValueKind::Set => &mut pattern.set_values,
                ValueKind::Text => &mut pattern.text_values,
                _ => continue,
            };
            *tally += 1;
            if !pattern.detected_types.contains(&kind) {
                pattern.detected_types.push(kind);
            }
        }

        pattern.detected = !pattern.detected_types.is_empty() || pattern.indexed_accesses > 0;
        pattern
    }

    fn arithmetic(trace: &Trace) -> ArithmeticPattern {
        let mut numeric_ops = 0;
        let mut increment_ops = 0;
        let mut decrement_ops = 0;

        for change in trace.var_changes().filter(|c| c.is_numeric_change()) {
            numeric_ops += 1;
            let step = match change.int_delta() {
                Some(delta @ (1 | -1)) => delta,
                Some(_) => 0,
                None => match (change.old.as_f64(), change.new.as_f64()) {
                    (Some(old), Some(new)) if new - old == 1.0 => 1,
                    (Some(old), Some(new)) if new - old == -1.0 => -1,
                    _ => 0,
                },
            };
            match step {
                1 => increment_ops += 1,
                -1 => decrement_ops += 1,
                _ => {}
            }
        }

        ArithmeticPattern {
            detected: numeric_ops > 0,
            numeric_ops,
            increment_ops,
            decrement_ops,
        }
    }

    fn comparisons(trace: &Trace) -> ComparisonPattern {
        let mut comparison_chains = 0;
        let mut distinct: Vec<&Value> = Vec::new();
        for change in trace.var_changes() {
            if matches!(change.new, Value::Boolean(_)) {
                comparison_chains += 1;
            }
            if !distinct.contains(&&change.new) {
                distinct.push(&change.new);
            }
        }
        ComparisonPattern {
            detected: comparison_chains > 0,
            comparison_chains,
            values_compared: distinct.len(),
        }
    }

    fn mutations(trace: &Trace) -> MutationPattern {
        let mut mutation_frequency: OrderedMap<usize> = OrderedMap::new();
        let mut total_mutations = 0;
        for change in trace.var_changes() {
            total_mutations += 1;
            *mutation_frequency.entry(change.name.clone()).or_default() += 1;
        }
        MutationPattern {
            detected: total_mutations > 0,
            total_mutations,
            mutation_frequency,
        }
    }

    fn function_calls(trace: &Trace) -> CallPattern {
        let mut stack: Vec<&str> = Vec::new();
        let mut total_calls = 0;
        let mut recursive = false;
        let mut max_depth = 0;

        for event in trace.events() {
            match event {
                Event::Call(call) => {
                    if stack.contains(&call.function.as_str()) {
                        recursive = true;
                    }
                    stack.push(&call.function);
                    total_calls += 1;
                    max_depth = max_depth.max(stack.len());
                }
                Event::Return(_) => {
                    stack.pop();
                }
                Event::VarChange(_) => {}
            }
        }

        CallPattern {
            detected: recursive,
            total_calls,
            recursive,
            max_depth,
        }
    }

    fn transformations(trace: &Trace) -> TransformationPattern {
        let mut transformation_pairs = Vec::new();
        let mut value_transformations = 0;
        for change in trace.var_changes() {
            let (from, to) = (change.old.kind(), change.new.kind());
            if from != to {
                transformation_pairs.push((from, to));
            }
            if change.old != change.new {
                value_transformations += 1;
            }
        }
        TransformationPattern {
            detected: !transformation_pairs.is_empty(),
            type_conversions: transformation_pairs.len(),
            value_transformations,
            transformation_pairs,
        }
    }
}

impl GenericReport {
    /// Every sub-signal, detected or not
    pub fn all_patterns(&self) -> PatternReport {
        let mut report = PatternReport::new();
        report.insert("loops".into(), self.loops.to_detection());
        report.insert("conditionals".into(), self.conditionals.to_detection());
        report.insert("data_structures".into(), self.data_structures.to_detection());
        report.insert("arithmetic".into(), self.arithmetic.to_detection());
        report.insert("comparisons".into(), self.comparisons.to_detection());
        report.insert("variable_mutations".into(), self.mutations.to_detection());
        report.insert("function_calls".into(), self.function_calls.to_detection());
        report.insert("data_transformations".into(), self.transformations.to_detection());
        report
    }

    /// Only what was detected, plus the loop / conditional / data-structure
    /// / recursion sections whenever they carry anything. Call statistics
    /// appear under `recursion` only, never as `function_calls`.
    pub fn summary(&self) -> PatternReport {
        let mut summary: PatternReport = self
            .all_patterns()
            .into_iter()
            .filter(|(name, detection)| detection.detected && name != "function_calls")
            .collect();

        if self.loops.detected {
            summary.insert("loops".into(), self.loops.to_detection());
        }
        if self.conditionals.detected {
            summary.insert("conditionals".into(), self.conditionals.to_detection());
        }
        if !self.data_structures.detected_types.is_empty() {
            summary.insert("data_structures".into(), self.data_structures.to_detection());
        }
        if self.function_calls.recursive {
            summary.insert("recursion".into(), self.function_calls.to_detection());
        }
        summary
    }
}

impl Signal for LoopPattern {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("loop_vars".into(), names(&self.loop_vars));
        metrics.insert("iteration_count".into(), count(self.iteration_count));
        metrics
    }
}

impl Signal for ConditionalPattern {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("branches".into(), count(self.branches));
        metrics.insert("early_returns".into(), count(self.early_returns));
        metrics
    }
}

impl Signal for DataStructurePattern {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let kinds: Vec<&str> = self.detected_types.iter().map(|k| k.name()).collect();
        let mut metrics = Mapping::new();
        metrics.insert("indexed_accesses".into(), count(self.indexed_accesses));
        metrics.insert("sequence_values".into(), count(self.sequence_values));
        metrics.insert("mapping_values".into(), count(self.mapping_values));
        metrics.insert("set_values".into(), count(self.set_values));
        metrics.insert("text_values".into(), count(self.text_values));
        metrics.insert("detected_types".into(), names(&kinds));
        metrics
    }
}

impl Signal for ArithmeticPattern {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("numeric_ops".into(), count(self.numeric_ops));
        metrics.insert("increment_ops".into(), count(self.increment_ops));
        metrics.insert("decrement_ops".into(), count(self.decrement_ops));
        metrics
    }
}

impl Signal for ComparisonPattern {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("comparison_chains".into(), count(self.comparison_chains));
        metrics.insert("values_compared".into(), count(self.values_compared));
        metrics
    }
}

impl Signal for MutationPattern {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("total_mutations".into(), count(self.total_mutations));
        metrics.insert("mutation_frequency".into(), counts(&self.mutation_frequency));
        metrics
    }
}

impl Signal for CallPattern {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let mut metrics = Mapping::new();
        metrics.insert("total_calls".into(), count(self.total_calls));
        metrics.insert("recursive".into(), Value::Boolean(self.recursive));
        metrics.insert("max_depth".into(), count(self.max_depth));
        metrics
    }
}

impl Signal for TransformationPattern {
    fn detected(&self) -> bool {
        self.detected
    }

    fn metrics(&self) -> Mapping {
        let pairs: Vec<String> = self
            .transformation_pairs
            .iter()
            .map(|(from, to)| format!("{}->{}", from, to))
            .collect();
        let mut metrics = Mapping::new();
        metrics.insert("type_conversions".into(), count(self.type_conversions));
        metrics.insert("value_transformations".into(), count(self.value_transformations));
        metrics.insert("transformation_pairs".into(), names(&pairs));
        metrics
    }
}
