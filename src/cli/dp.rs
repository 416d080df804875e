//! DP table evolution

use crate::analysis::{DpReconstructor, DpUpdate};
use crate::trace::Trace;
use anyhow::Result;
use std::path::Path;

/// One line per update, numbered from 1:
/// `Step 01 | Line 5 | dp[4] = dp[i-1]=3 + dp[i-2]=2 -> 5`
pub fn evolution_lines(updates: &[DpUpdate]) -> Vec<String> {
    updates
        .iter()
        .enumerate()
        .map(|(i, update)| {
            let target = format!("{}[{}]", update.table, update.index);
            match update.formula() {
                Some(formula) => format!(
                    "Step {:02} | Line {} | {} = {} -> {}",
                    i + 1,
                    update.line,
                    target,
                    formula,
                    update.result
                ),
                None => format!(
                    "Step {:02} | Line {} | {} = {}",
                    i + 1,
                    update.line,
                    target,
                    update.result
                ),
            }
        })
        .collect()
}

/// Run the dp subcommand
pub fn dp(input: &Path) -> Result<()> {
    let trace = Trace::load(input)?;
    let updates = DpReconstructor::analyze(&trace);

    if updates.is_empty() {
        println!("No DP table updates found");
        return Ok(());
    }
    for line in evolution_lines(&updates) {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Mapping, Value};

    #[test]
    fn test_evolution_lines() {
        let mut inputs = Mapping::new();
        inputs.insert("i-1".into(), Value::Integer(3));
        inputs.insert("i-2".into(), Value::Integer(2));
        let updates = vec![
            DpUpdate {
                table: "dp".into(),
                index: "0".into(),
                inputs: Mapping::new(),
                result: Value::Integer(1),
                line: 3,
            },
            DpUpdate {
                table: "dp".into(),
                index: "4".into(),
                inputs,
                result: Value::Integer(5),
                line: 5,
            },
        ];
        assert_eq!(
            evolution_lines(&updates),
            vec![
                "Step 01 | Line 3 | dp[0] = 1",
                "Step 02 | Line 5 | dp[4] = dp[i-1]=3 + dp[i-2]=2 -> 5",
            ]
        );
    }
}
