//! DP formula reconstruction
//!
//! For a write such as `dp[4] = 5` produced by the line
//! `dp[i] = dp[i-1] + dp[i-2]`, recover which cells of `dp` were read and
//! what they held: `{"i-1": 3, "i-2": 2}`. Only direct self-references of
//! the written table are recognised; this is not general data-flow tracing.

use super::expr;
use crate::trace::{Mapping, Trace, Value, VarChange};
use serde::Serialize;

/// One reconstructed table update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DpUpdate {
    pub table: String,
    /// Index text of the written element, as recorded in the event name
    pub index: String,
    /// Index expression text to the value read from the table, in source order
    pub inputs: Mapping,
    pub result: Value,
    pub line: u32,
}

impl DpUpdate {
    /// `dp[i-1]=3 + dp[i-2]=2`, or `None` when no inputs were recovered
    pub fn formula(&self) -> Option<String> {
        if self.inputs.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .inputs
            .iter()
            .map(|(expr, value)| format!("{}[{}]={}", self.table, expr, value))
            .collect();
        Some(parts.join(" + "))
    }
}

pub struct DpReconstructor;

impl DpReconstructor {
    /// Reconstruct every qualifying indexed write in the trace, in order
    pub fn analyze(trace: &Trace) -> Vec<DpUpdate> {
        trace.var_changes().filter_map(Self::reconstruct).collect()
    }

    /// Reconstruct a single change.
    ///
    /// Returns `None` unless the change writes a numeric or sequence value
    /// into an indexed reference. Missing snapshot or source text only
    /// leaves the inputs empty.
    pub fn reconstruct(change: &VarChange) -> Option<DpUpdate> {
        let target = change.indexed()?;
        if !(change.new.is_numeric() || matches!(change.new, Value::Sequence(_))) {
            return None;
        }

        let inputs = match (&change.source, &change.snapshot) {
            (Some(source), Some(snapshot)) => Self::extract_inputs(source, snapshot, target.base),
            _ => Mapping::new(),
        };

        Some(DpUpdate {
            table: target.base.to_string(),
            index: target.index.to_string(),
            inputs,
            result: change.new.clone(),
            line: change.line,
        })
    }

    /// Find `table[<expr>]` reads on the right-hand side of `source` and
    /// resolve each one against `snapshot`.
    ///
    /// Candidates that fail to evaluate, evaluate to a non-integer, or fall
    /// outside the table are dropped.
    pub fn extract_inputs(source: &str, snapshot: &Mapping, table: &str) -> Mapping {
        let mut inputs = Mapping::new();
        let Some(rhs) = assignment_rhs(source) else {
            return inputs;
        };
        let Some(cells) = snapshot.get(table).and_then(Value::as_sequence) else {
            log::debug!("no sequence named `{}` in snapshot", table);
            return inputs;
        };

        for index_expr in table_references(rhs, table) {
            let index = match expr::evaluate(index_expr, snapshot) {
                Ok(expr::Number::Int(index)) => index,
                Ok(other) => {
                    log::debug!("dropping {}[{}]: non-integer index {:?}", table, index_expr, other);
                    continue;
                }
                Err(err) => {
                    log::debug!("dropping {}[{}]: {}", table, index_expr, err);
                    continue;
                }
            };
            match usize::try_from(index).ok().and_then(|i| cells.get(i)) {
                Some(cell) => {
                    inputs.insert(index_expr.to_string(), cell.clone());
                }
                None => log::debug!(
                    "dropping {}[{}]: index {} outside 0..{}",
                    table,
                    index_expr,
                    index,
                    cells.len()
                ),
            }
        }
        inputs
    }
}

/// Text after the first top-level assignment `=` (plain or augmented).
///
/// Comparison operators (`==`, `<=`, `>=`, `!=`) and `=` inside brackets
/// are not assignments.
fn assignment_rhs(source: &str) -> Option<&str> {
    let bytes = source.as_bytes();
    let mut depth: i32 = 0;

    for (pos, &c) in bytes.iter().enumerate() {
        match c {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = pos.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(pos + 1).copied();
                let is_comparison = next == Some(b'=')
                    || matches!(prev, Some(b'=') | Some(b'<') | Some(b'>') | Some(b'!'));
                if !is_comparison {
                    return Some(&source[pos + 1..]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Index texts of every `table[...]` in `text`, with balanced brackets.
///
/// `mydp[...]` and `obj.dp[...]` do not count as references to `dp`.
fn table_references<'a>(text: &'a str, table: &str) -> Vec<&'a str> {
    let bytes = text.as_bytes();
    let needle = format!("{}[", table);
    let mut found = Vec::new();

    for (start, _) in text.match_indices(&needle) {
        let preceded_by_name = start > 0 && {
            let prev = bytes[start - 1];
            prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'.'
        };
        if preceded_by_name {
            continue;
        }

        let open = start + needle.len();
        let mut depth = 1;
        let mut close = None;
        for (offset, &c) in bytes[open..].iter().enumerate() {
            match c {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        if let Some(close) = close {
            if close > open {
                found.push(&text[open..close]);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceBuilder;

    fn snapshot(i: i64, dp: Vec<i64>) -> Mapping {
        vec![("i".to_string(), Value::Integer(i)), ("dp".to_string(), Value::from(dp))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_fibonacci_recurrence() {
        let inputs = DpReconstructor::extract_inputs(
            "dp[i] = dp[i-1] + dp[i-2]",
            &snapshot(4, vec![1, 1, 2, 3, 0]),
            "dp",
        );
        let keys: Vec<_> = inputs.keys().collect();
        assert_eq!(keys, vec!["i-1", "i-2"]);
        assert_eq!(inputs.get("i-1"), Some(&Value::Integer(3)));
        assert_eq!(inputs.get("i-2"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_reconstruct_event() {
        let trace = TraceBuilder::new()
            .call("climb", [("n", 4)])
            .at_line(5)
            .indexed_change("dp", 4, 0, 5, snapshot(4, vec![1, 1, 2, 3, 0]), "dp[i] = dp[i-1] + dp[i-2]")
            .build();
        let updates = DpReconstructor::analyze(&trace);
        assert_eq!(updates.len(), 1);
        let update = &updates[0];
        assert_eq!(update.table, "dp");
        assert_eq!(update.index, "4");
        assert_eq!(update.result, Value::Integer(5));
        assert_eq!(update.line, 5);
        assert_eq!(update.formula().as_deref(), Some("dp[i-1]=3 + dp[i-2]=2"));
    }

    #[test]
    fn test_failed_candidates_are_dropped() {
        let inputs = DpReconstructor::extract_inputs(
            "dp[i] = dp[i-1] + dp[j] + dp[i+7] + dp[i/2] + dp[len(dp)-1]",
            &snapshot(4, vec![1, 1, 2, 3, 0]),
            "dp",
        );
        let keys: Vec<_> = inputs.keys().collect();
        assert_eq!(keys, vec!["i-1"]);
    }

    #[test]
    fn test_augmented_assignment_and_nesting() {
        let inputs = DpReconstructor::extract_inputs(
            "dp[i] += dp[(i - 1) // 2] * 2",
            &snapshot(4, vec![1, 7, 2, 3, 0]),
            "dp",
        );
        assert_eq!(inputs.get("(i - 1) // 2"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_index_text_is_kept_verbatim() {
        let inputs = DpReconstructor::extract_inputs(
            "dp[i] = dp[ i-1 ]",
            &snapshot(4, vec![1, 1, 2, 3, 0]),
            "dp",
        );
        let keys: Vec<_> = inputs.keys().collect();
        assert_eq!(keys, vec![" i-1 "]);
        assert!(inputs.get("i-1").is_none());
    }

    #[test]
    fn test_no_assignment_means_no_inputs() {
        let snap = snapshot(4, vec![1, 1, 2, 3, 0]);
        assert!(DpReconstructor::extract_inputs("", &snap, "dp").is_empty());
        assert!(DpReconstructor::extract_inputs("if dp[i] == dp[i-1]:", &snap, "dp").is_empty());
        assert!(DpReconstructor::extract_inputs("dp[i] = 0", &snap, "other").is_empty());
    }

    #[test]
    fn test_table_references_respect_boundaries() {
        let refs = table_references("mydp[0] + self.dp[1] + dp[a[2]] + dp[]", "dp");
        assert_eq!(refs, vec!["a[2]"]);
    }

    #[test]
    fn test_assignment_rhs() {
        assert_eq!(assignment_rhs("x[a == b] = y"), Some(" y"));
        assert_eq!(assignment_rhs("x <= y"), None);
        assert_eq!(assignment_rhs("x -= 1"), Some(" 1"));
    }

    #[test]
    fn test_non_qualifying_changes() {
        let trace = TraceBuilder::new()
            .enter("f")
            .change("total", 0, 1)
            .change("names[0]", "a", "b")
            .change("dp[0]", 0, 1)
            .build();
        let updates = DpReconstructor::analyze(&trace);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].inputs.is_empty());
        assert!(updates[0].formula().is_none());
    }
}
