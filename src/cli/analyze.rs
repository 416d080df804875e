//! Full analysis of a recorded trace
//!
//! Runs every detector and analyzer over one trace and renders the result
//! as plain text or JSON.

use crate::analysis::{BehaviorAnalyzer, BehaviorReport, DpReconstructor, DpUpdate, GenericAnalyzer};
use crate::config::{AnalysisConfig, RenderMode};
use crate::detectors::{
    CollectionDetector, ConditionalDetector, DpDetector, LoopDetector, OperationDetector,
    PointerDetector, RecursionDetector,
};
use crate::report::{Detection, PatternReport, Signal};
use crate::trace::{Event, OrderedMap, Trace, Value};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Report keys of the algorithm-level patterns and their display names
pub const ALGORITHM_PATTERNS: &[(&str, &str)] = &[
    ("recursion", "Recursion"),
    ("sliding_window", "Sliding Window"),
    ("two_pointers", "Two Pointers"),
    ("dynamic_programming", "Dynamic Programming"),
    ("accumulation", "Accumulation"),
    ("search", "Search"),
    ("sorting", "Sorting"),
];

/// Report keys of the lower-level operation patterns
const OPERATION_PATTERNS: &[&str] = &[
    "for_loop",
    "while_loop",
    "nested_loops",
    "if_else",
    "list_operations",
    "dict_operations",
    "set_operations",
    "string_operations",
];

/// Variables changed more often than this are listed as high activity
const HIGH_ACTIVITY_CHANGES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceStats {
    pub total_events: usize,
    pub var_changes: usize,
    pub unique_vars: usize,
    pub calls: usize,
    pub returns: usize,
}

impl TraceStats {
    pub fn from_trace(trace: &Trace) -> Self {
        let unique: BTreeSet<&str> = trace.var_changes().map(|c| c.name.as_str()).collect();
        Self {
            total_events: trace.len(),
            var_changes: trace.var_changes().count(),
            unique_vars: unique.len(),
            calls: trace.calls().count(),
            returns: trace.returns().count(),
        }
    }
}

/// Everything known about one trace
#[derive(Serialize)]
pub struct AnalysisReport<'a> {
    #[serde(skip)]
    trace: &'a Trace,
    #[serde(skip)]
    show_generic: bool,
    pub stats: TraceStats,
    /// Display names of the detected algorithm patterns
    pub detected: Vec<&'static str>,
    pub patterns: PatternReport,
    pub behavior: BehaviorReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dp_updates: Vec<DpUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic: Option<PatternReport>,
}

impl<'a> AnalysisReport<'a> {
    pub fn build(trace: &'a Trace, config: &AnalysisConfig) -> Self {
        let patterns = detect_patterns(trace);
        let detected = detected_names(&patterns);
        let dp_detected = patterns
            .get("dynamic_programming")
            .map_or(false, |d| d.detected);
        let dp_updates = if dp_detected {
            DpReconstructor::analyze(trace)
        } else {
            Vec::new()
        };
        let generic = config
            .show_generic
            .then(|| GenericAnalyzer::analyze(trace).summary());

        Self {
            trace,
            show_generic: config.show_generic,
            stats: TraceStats::from_trace(trace),
            detected,
            patterns,
            behavior: BehaviorAnalyzer::analyze(trace),
            dp_updates,
            generic,
        }
    }

    pub fn render(&self, mode: RenderMode) -> Result<String> {
        match mode {
            RenderMode::Text => Ok(TextView(self).to_string()),
            RenderMode::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

/// Run every specialised detector, keyed by pattern name
pub fn detect_patterns(trace: &Trace) -> PatternReport {
    let mut report = PatternReport::new();
    report.insert("recursion".into(), RecursionDetector::detect(trace).to_detection());
    report.insert(
        "sliding_window".into(),
        PointerDetector::detect_sliding_window(trace).to_detection(),
    );
    report.insert(
        "two_pointers".into(),
        PointerDetector::detect_two_pointers(trace).to_detection(),
    );
    report.insert("dynamic_programming".into(), DpDetector::detect(trace).to_detection());
    report.insert("for_loop".into(), LoopDetector::detect_for_loops(trace).to_detection());
    report.insert("while_loop".into(), LoopDetector::detect_while_loops(trace).to_detection());
    report.insert("nested_loops".into(), LoopDetector::detect_nested_loops(trace).to_detection());
    report.insert("if_else".into(), ConditionalDetector::detect_if_else(trace).to_detection());
    report.insert(
        "list_operations".into(),
        CollectionDetector::detect_list_operations(trace).to_detection(),
    );
    report.insert(
        "dict_operations".into(),
        CollectionDetector::detect_dict_operations(trace).to_detection(),
    );
    report.insert(
        "set_operations".into(),
        CollectionDetector::detect_set_operations(trace).to_detection(),
    );
    report.insert(
        "string_operations".into(),
        CollectionDetector::detect_string_operations(trace).to_detection(),
    );
    report.insert("accumulation".into(), OperationDetector::detect_accumulation(trace).to_detection());
    report.insert("search".into(), OperationDetector::detect_search(trace).to_detection());
    report.insert("sorting".into(), OperationDetector::detect_sorting(trace).to_detection());
    report
}

/// Display names of the detected algorithm patterns, in fixed order
pub fn detected_names(patterns: &PatternReport) -> Vec<&'static str> {
    ALGORITHM_PATTERNS
        .iter()
        .filter(|(key, _)| patterns.get(*key).map_or(false, |d| d.detected))
        .map(|&(_, label)| label)
        .collect()
}

/// Run the analyze subcommand
pub fn analyze(input: &Path, config: &AnalysisConfig) -> Result<()> {
    let trace = Trace::load(input)?;
    // logs a warning when recorded depths disagree with the call/return order
    trace.depth_anomalies();

    let report = AnalysisReport::build(&trace, config);
    print!("{}", report.render(config.mode)?);
    Ok(())
}

struct TextView<'r, 'a>(&'r AnalysisReport<'a>);

impl fmt::Display for TextView<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;

        if !report.detected.is_empty() {
            writeln!(f, "[*] Detected Algorithm Patterns: {}", report.detected.join(", "))?;
        }

        if report.show_generic {
            write_behavior(f, &report.behavior)?;
            write_stats(f, &report.stats)?;
            if let Some(generic) = report.generic.as_ref().filter(|g| !g.is_empty()) {
                section(f, "DETECTED PATTERNS")?;
                for (name, detection) in generic.iter() {
                    write_detection(f, name, detection)?;
                }
            }
            let operations: Vec<_> = OPERATION_PATTERNS
                .iter()
                .filter_map(|key| report.patterns.get(*key).map(|d| (*key, d)))
                .filter(|(_, d)| d.detected)
                .collect();
            if !operations.is_empty() {
                section(f, "OPERATIONS")?;
                for (name, detection) in operations {
                    write_detection(f, name, detection)?;
                }
            }
            write_variables(f, &report.behavior)?;
            write_data_flow(f, report.trace)?;
        }

        if !report.dp_updates.is_empty() {
            writeln!(f, "\n[*] DP Table Evolution")?;
            writeln!(f, "{}", "-".repeat(60))?;
            for line in super::dp::evolution_lines(&report.dp_updates) {
                writeln!(f, "{}", line)?;
            }
        }

        if let Some(pointers) = pointer_names(&report.patterns, report.trace) {
            write_pointer_timeline(f, report.trace, &pointers)?;
        }

        write_steps(f, report.trace)?;

        if report.patterns.get("recursion").map_or(false, |d| d.detected) {
            write_recursion_tree(f, report.trace)?;
        }
        Ok(())
    }
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "\n{}", "=".repeat(60))?;
    writeln!(f, "  {}", title)?;
    writeln!(f, "{}", "=".repeat(60))
}

fn truncate(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        return text;
    }
    let mut short: String = text.chars().take(max.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

fn write_behavior(f: &mut fmt::Formatter<'_>, behavior: &BehaviorReport) -> fmt::Result {
    section(f, "FUNCTION BEHAVIOR")?;
    writeln!(f, "\n{}", behavior.summary_line())?;

    let io = &behavior.input_output;
    if !io.inputs.is_empty() {
        writeln!(f, "\n[INPUT] Arguments:")?;
        for (name, value) in io.inputs.iter() {
            writeln!(f, "   - {}: {} ({})", name, truncate(value.to_string(), 50), value.kind())?;
        }
    }
    if let Some(output_type) = io.output_type {
        writeln!(f, "\n[OUTPUT] Type: {}", output_type)?;
    }

    let flow = &behavior.control_flow;
    if flow.call_count > 0 {
        writeln!(f, "\n[EXECUTION]")?;
        writeln!(f, "   - Function calls: {}", flow.call_count)?;
        writeln!(f, "   - Call depth: {}", flow.max_call_depth)?;
    }
    if behavior.complexity.recursion_depth > 1 {
        writeln!(f, "   - Recursion depth: {}", behavior.complexity.recursion_depth)?;
    }
    if behavior.complexity.data_size > 0 {
        writeln!(f, "   - Max data size: {} items", behavior.complexity.data_size)?;
    }
    Ok(())
}

fn write_stats(f: &mut fmt::Formatter<'_>, stats: &TraceStats) -> fmt::Result {
    section(f, "EXECUTION STATISTICS")?;
    writeln!(f, "\n[TRACE SUMMARY]")?;
    writeln!(f, "   - Total events: {}", stats.total_events)?;
    writeln!(f, "   - Variable changes: {}", stats.var_changes)?;
    writeln!(f, "   - Unique variables: {}", stats.unique_vars)?;
    writeln!(f, "   - Function calls: {}", stats.calls)?;
    writeln!(f, "   - Returns: {}", stats.returns)
}

fn write_detection(f: &mut fmt::Formatter<'_>, name: &str, detection: &Detection) -> fmt::Result {
    let metrics: Vec<String> = detection
        .metrics
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    writeln!(f, "   - {}: {}", name, metrics.join(", "))
}

fn write_variables(f: &mut fmt::Formatter<'_>, behavior: &BehaviorReport) -> fmt::Result {
    if behavior.variables.is_empty() {
        return Ok(());
    }
    section(f, "VARIABLE TRACKING")?;

    let (mut high, mut low): (Vec<_>, Vec<_>) = behavior
        .variables
        .iter()
        .partition(|v| v.changes > HIGH_ACTIVITY_CHANGES);
    high.sort_by(|a, b| b.changes.cmp(&a.changes));
    low.sort_by_key(|v| v.changes);

    for (title, group) in [
        ("[HIGH ACTIVITY] (frequently changed):", high),
        ("[LOW ACTIVITY] (set once or twice):", low),
    ] {
        if group.is_empty() {
            continue;
        }
        writeln!(f, "\n{}", title)?;
        for var in group {
            write!(
                f,
                "   - {}: {} change(s), final = {}",
                var.name,
                var.changes,
                truncate(var.final_value.to_string(), 40)
            )?;
            if var.type_changes > 0 {
                write!(f, ", {} type change(s)", var.type_changes)?;
            }
            writeln!(f)?;
        }
    }
    Ok(())
}

/// First old value and number of distinct new values, per variable
fn write_data_flow(f: &mut fmt::Formatter<'_>, trace: &Trace) -> fmt::Result {
    let mut flows: OrderedMap<(&Value, Vec<&Value>)> = OrderedMap::new();
    for change in trace.var_changes() {
        let (_, targets) = flows
            .entry(change.name.clone())
            .or_insert_with(|| (&change.old, Vec::new()));
        if !targets.contains(&&change.new) {
            targets.push(&change.new);
        }
    }
    if flows.is_empty() {
        return Ok(());
    }

    writeln!(f, "\n[*] Data Flow")?;
    writeln!(f, "{}", "-".repeat(60))?;
    for (name, (origin, targets)) in flows.iter() {
        writeln!(f, "\n{}:", name)?;
        writeln!(f, "  From: {} ({})", truncate(origin.to_string(), 40), origin.kind())?;
        writeln!(f, "  To: {} different value(s)", targets.len())?;
    }
    Ok(())
}

/// Stepping variables to draw over the input array: the window bounds when
/// a sliding window was detected, otherwise the two pointers
fn pointer_names(patterns: &PatternReport, trace: &Trace) -> Option<Vec<String>> {
    let detected = |key: &str| patterns.get(key).map_or(false, |d| d.detected);
    if detected("sliding_window") {
        let window = PointerDetector::detect_sliding_window(trace);
        return Some(window.moves.keys().cloned().collect());
    }
    if detected("two_pointers") {
        let pointers = PointerDetector::detect_two_pointers(trace);
        return Some(pointers.advancing.into_iter().chain(pointers.retreating).collect());
    }
    None
}

/// Positions of each pointer over the first sequence argument, one line
/// per step. A pointer that stopped moving keeps its last position.
fn write_pointer_timeline(
    f: &mut fmt::Formatter<'_>,
    trace: &Trace,
    pointers: &[String],
) -> fmt::Result {
    let Some(array) = trace
        .calls()
        .flat_map(|call| call.arguments.values())
        .find_map(Value::as_sequence)
    else {
        return Ok(());
    };

    let mut positions: OrderedMap<Vec<i64>> = OrderedMap::new();
    for change in trace.var_changes().filter(|c| pointers.contains(&c.name)) {
        if let Value::Integer(position) = change.new {
            positions.entry(change.name.clone()).or_default().push(position);
        }
    }
    let steps = positions.values().map(Vec::len).max().unwrap_or(0);
    if steps == 0 {
        return Ok(());
    }
    positions.sort_keys();

    writeln!(f, "\n[*] Pointer Timeline")?;
    writeln!(f, "{}", "-".repeat(40))?;
    let cells: Vec<String> = array.iter().map(ToString::to_string).collect();
    writeln!(f, "Array: [{}]", cells.join(", "))?;

    for step in 0..steps {
        let current: Vec<(&String, i64)> = positions
            .iter()
            .filter_map(|(name, moves)| moves.get(step).or(moves.last()).map(|&p| (name, p)))
            .collect();

        write!(f, "Step {:02}:", step + 1)?;
        for (index, cell) in cells.iter().enumerate() {
            let here: Vec<&str> = current
                .iter()
                .filter(|(_, p)| usize::try_from(*p).map_or(false, |p| p == index))
                .map(|(name, _)| name.as_str())
                .collect();
            if here.is_empty() {
                write!(f, " [{}]", cell)?;
            } else {
                write!(f, " [{}]({})", cell, here.join(","))?;
            }
        }
        writeln!(f)?;

        let labels: Vec<String> = current.iter().map(|(name, p)| format!("{}={}", name, p)).collect();
        writeln!(f, "         {}", labels.join(" "))?;
    }
    Ok(())
}

fn write_steps(f: &mut fmt::Formatter<'_>, trace: &Trace) -> fmt::Result {
    writeln!(f, "\n[*] Algorithm Trace")?;
    writeln!(f, "{}", "-".repeat(40))?;
    for (i, event) in trace.events().iter().enumerate() {
        if let Event::VarChange(change) = event {
            writeln!(
                f,
                "Step {:02} | line {} | {}: {} -> {}",
                i + 1,
                change.line,
                change.name,
                change.old,
                change.new
            )?;
        }
    }
    Ok(())
}

fn write_recursion_tree(f: &mut fmt::Formatter<'_>, trace: &Trace) -> fmt::Result {
    writeln!(f, "\n[*] Recursion Tree")?;
    writeln!(f, "{}", "-".repeat(40))?;
    // Nesting follows the Call/Return order; recorded depths are not trusted
    let mut depth: usize = 0;
    for event in trace.events() {
        match event {
            Event::Call(call) => {
                depth += 1;
                let args: Vec<String> = call
                    .arguments
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                let indent = "  ".repeat(depth - 1);
                writeln!(f, "{}[+] {}({})", indent, call.function, args.join(", "))?;
            }
            Event::Return(ret) => {
                let indent = "  ".repeat(depth.saturating_sub(1));
                writeln!(f, "{}[-] return {}", indent, ret.value)?;
                depth = depth.saturating_sub(1);
            }
            Event::VarChange(_) => {}
        }
    }
    Ok(())
}
