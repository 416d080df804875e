//! Behavior reconstruction
//!
//! Pairs Call/Return events into [`CallRecord`]s, keeps a history of every
//! variable, and derives input/output, control-flow and complexity
//! summaries from them.

use crate::trace::{Event, Mapping, OrderedMap, Trace, Value, ValueKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::ops::Range;

/// A completed invocation: one Call matched with its Return
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallRecord {
    pub function: String,
    pub arguments: Mapping,
    pub depth: u32,
    pub return_value: Value,
    /// Event indices covered by the call, Return included
    pub span: Range<usize>,
}

/// What the function under study was given and what it produced.
///
/// Only the first call record is considered, so for a recursive function
/// this is the outermost invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputOutput {
    pub inputs: Mapping,
    pub input_types: BTreeSet<ValueKind>,
    /// `None` when there was no call or it returned null
    pub outputs: Option<Value>,
    pub output_type: Option<ValueKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub old: Value,
    pub new: Value,
    pub line: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableFlow {
    pub name: String,
    pub changes: usize,
    pub final_value: Value,
    /// Consecutive history entries whose new values differ in kind
    pub type_changes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlFlow {
    pub call_count: usize,
    pub return_count: usize,
    pub max_call_depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Complexity {
    pub recursion_depth: u32,
    /// Longest sequence seen as a new value
    pub data_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviorReport {
    pub calls: Vec<CallRecord>,
    pub input_output: InputOutput,
    pub histories: OrderedMap<Vec<StateChange>>,
    pub variables: Vec<VariableFlow>,
    pub control_flow: ControlFlow,
    pub complexity: Complexity,
}

pub struct BehaviorAnalyzer;

impl BehaviorAnalyzer {
    pub fn analyze(trace: &Trace) -> BehaviorReport {
        let calls = Self::call_records(trace);
        let input_output = Self::input_output(&calls);
        let histories = Self::histories(trace);
        let variables = Self::variable_flow(&histories);
        let control_flow = ControlFlow {
            call_count: trace.calls().count(),
            return_count: trace.returns().count(),
            max_call_depth: trace.max_call_depth(),
        };
        let complexity = Complexity {
            recursion_depth: control_flow.max_call_depth,
            data_size: histories
                .values()
                .flatten()
                .filter_map(|state| state.new.as_sequence().map(<[Value]>::len))
                .max()
                .unwrap_or(0),
        };

        BehaviorReport {
            calls,
            input_output,
            histories,
            variables,
            control_flow,
            complexity,
        }
    }

    /// Match Calls with Returns in LIFO order.
    ///
    /// Records come back ordered by the position of their Call. A Return
    /// with no open Call is skipped; Calls still open at the end of the
    /// trace produce no record.
    pub fn call_records(trace: &Trace) -> Vec<CallRecord> {
        let mut open = Vec::new();
        let mut records = Vec::new();

        for (index, event) in trace.events().iter().enumerate() {
            match event {
                Event::Call(call) => open.push((index, call)),
                Event::Return(ret) => match open.pop() {
                    Some((start, call)) => records.push(CallRecord {
                        function: call.function.clone(),
                        arguments: call.arguments.clone(),
                        depth: call.depth,
                        return_value: ret.value.clone(),
                        span: start..index + 1,
                    }),
                    None => log::debug!(
                        "ignoring unmatched return from `{}` at event {}",
                        ret.function,
                        index
                    ),
                },
                Event::VarChange(_) => {}
            }
        }

        records.sort_by_key(|record| record.span.start);
        records
    }

    fn input_output(calls: &[CallRecord]) -> InputOutput {
        let Some(first) = calls.first() else {
            return InputOutput {
                inputs: Mapping::new(),
                input_types: BTreeSet::new(),
                outputs: None,
                output_type: None,
            };
        };

        let outputs = match &first.return_value {
            Value::Null => None,
            value => Some(value.clone()),
        };
        InputOutput {
            inputs: first.arguments.clone(),
            input_types: first.arguments.values().map(Value::kind).collect(),
            output_type: outputs.as_ref().map(Value::kind),
            outputs,
        }
    }

    fn histories(trace: &Trace) -> OrderedMap<Vec<StateChange>> {
        let mut histories: OrderedMap<Vec<StateChange>> = OrderedMap::new();
        for change in trace.var_changes() {
            histories.entry(change.name.clone()).or_default().push(StateChange {
                old: change.old.clone(),
                new: change.new.clone(),
                line: change.line,
                depth: change.depth,
            });
        }
        histories
    }

    fn variable_flow(histories: &OrderedMap<Vec<StateChange>>) -> Vec<VariableFlow> {
        histories
            .iter()
            .filter_map(|(name, states)| {
                let last = states.last()?;
                let type_changes = states
                    .windows(2)
                    .filter(|pair| pair[0].new.kind() != pair[1].new.kind())
                    .count();
                Some(VariableFlow {
                    name: name.to_string(),
                    changes: states.len(),
                    final_value: last.new.clone(),
                    type_changes,
                })
            })
            .collect()
    }
}

impl BehaviorReport {
    /// One-line description such as
    /// `Inputs: n | Returns: integer | Variables modified: 2 | Recursion depth: 4`
    pub fn summary_line(&self) -> String {
        let inputs: Vec<&str> = self.input_output.inputs.keys().map(String::as_str).collect();
        let returns = self.input_output.output_type.map_or("none", ValueKind::name);

        let mut parts = vec![
            format!("Inputs: {}", inputs.join(", ")),
            format!("Returns: {}", returns),
        ];
        if !self.variables.is_empty() {
            parts.push(format!("Variables modified: {}", self.variables.len()));
        }
        if self.complexity.recursion_depth > 1 {
            parts.push(format!("Recursion depth: {}", self.complexity.recursion_depth));
        }
        if self.complexity.data_size > 0 {
            parts.push(format!("Max data size: {}", self.complexity.data_size));
        }
        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceBuilder;

    fn fib_trace() -> Trace {
        TraceBuilder::new()
            .call("fib", [("n", 2)])
            .call("fib", [("n", 1)])
            .ret(1)
            .call("fib", [("n", 0)])
            .ret(0)
            .at_line(4)
            .change("result", Value::Null, 1)
            .ret(1)
            .build()
    }

    #[test]
    fn test_records_ordered_by_call() {
        let calls = BehaviorAnalyzer::call_records(&fib_trace());
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].arguments.get("n"), Some(&Value::Integer(2)));
        assert_eq!(calls[0].span, 0..7);
        assert_eq!(calls[1].span, 1..3);
        assert_eq!(calls[2].depth, 2);
    }

    #[test]
    fn test_input_output_from_outermost_call() {
        let report = BehaviorAnalyzer::analyze(&fib_trace());
        let io = &report.input_output;
        assert_eq!(io.input_types.iter().copied().collect::<Vec<_>>(), vec![ValueKind::Integer]);
        assert_eq!(io.outputs, Some(Value::Integer(1)));
        assert_eq!(io.output_type, Some(ValueKind::Integer));
        assert_eq!(report.control_flow.call_count, 3);
        assert_eq!(report.control_flow.max_call_depth, 2);
        assert_eq!(
            report.summary_line(),
            "Inputs: n | Returns: integer | Variables modified: 1 | Recursion depth: 2"
        );
    }

    #[test]
    fn test_unmatched_return_is_dropped() {
        let trace = TraceBuilder::new()
            .ret(Value::Null)
            .call("f", [("x", 1)])
            .ret(2)
            .build();
        let report = BehaviorAnalyzer::analyze(&trace);
        assert_eq!(report.calls.len(), 1);
        assert_eq!(report.calls[0].span, 1..3);
        assert_eq!(report.control_flow.return_count, 2);
    }

    #[test]
    fn test_variable_flow_and_data_size() {
        let trace = TraceBuilder::new()
            .enter("f")
            .change("x", Value::Null, 1)
            .change("x", 1, "one")
            .change("xs", Vec::<i64>::new(), vec![1, 2, 3])
            .change("xs", vec![1, 2, 3], vec![1, 2])
            .build();
        let report = BehaviorAnalyzer::analyze(&trace);
        let x = &report.variables[0];
        assert_eq!(x.name, "x");
        assert_eq!(x.changes, 2);
        assert_eq!(x.type_changes, 1);
        assert_eq!(x.final_value, Value::from("one"));
        assert_eq!(report.complexity.data_size, 3);
        assert_eq!(report.histories.get("xs").map(Vec::len), Some(2));
    }

    #[test]
    fn test_empty_trace() {
        let report = BehaviorAnalyzer::analyze(&Trace::default());
        assert!(report.calls.is_empty());
        assert!(report.input_output.outputs.is_none());
        assert_eq!(report.summary_line(), "Inputs:  | Returns: none");
    }
}
