use algoviz_rs::analysis::expr::{evaluate, EvalError, Number};
use algoviz_rs::trace::Mapping;
use algoviz_rs::{DpReconstructor, Trace, TraceBuilder, Value};

fn snapshot(i: i64, dp: &[i64]) -> Mapping {
    let mut snap = Mapping::new();
    snap.insert("i".into(), Value::Integer(i));
    snap.insert("dp".into(), Value::from(dp.to_vec()));
    snap
}

/// Bottom-up Fibonacci over `n = 4`, recorded the way an instrumenter would
fn fibonacci_fill() -> Trace {
    let source = "dp[i] = dp[i-1] + dp[i-2]";
    let mut dp = vec![1, 1, 0, 0, 0];
    let mut builder = TraceBuilder::new()
        .call("fib", [("n", 4)])
        .at_line(3)
        .change("dp", Vec::<i64>::new(), dp.clone());

    for i in 2..5 {
        let next = dp[i - 1] + dp[i - 2];
        builder = builder
            .at_line(4)
            .change("i", i as i64 - 1, i as i64)
            .at_line(5)
            .indexed_change("dp", i as i64, 0, next, snapshot(i as i64, &dp), source);
        dp[i] = next;
    }
    builder.ret(dp[4]).build()
}

#[test]
fn test_fibonacci_updates() {
    let updates = DpReconstructor::analyze(&fibonacci_fill());
    assert_eq!(updates.len(), 3);

    let last = &updates[2];
    assert_eq!(last.table, "dp");
    assert_eq!(last.index, "4");
    assert_eq!(last.line, 5);
    assert_eq!(last.result, Value::Integer(5));
    let keys: Vec<_> = last.inputs.keys().collect();
    assert_eq!(keys, vec!["i-1", "i-2"]);
    assert_eq!(last.inputs.get("i-1"), Some(&Value::Integer(3)));
    assert_eq!(last.inputs.get("i-2"), Some(&Value::Integer(2)));
}

#[test]
fn test_inputs_are_read_from_snapshot_not_result() {
    let trace = TraceBuilder::new()
        .enter("f")
        .indexed_change("dp", 1, 7, 8, snapshot(1, &[5, 7]), "dp[i] = dp[i] + 1")
        .build();
    let updates = DpReconstructor::analyze(&trace);
    assert_eq!(updates[0].inputs.get("i"), Some(&Value::Integer(7)));
    assert_eq!(updates[0].result, Value::Integer(8));
}

#[test]
fn test_unsafe_candidates_are_dropped() {
    let inputs = DpReconstructor::extract_inputs(
        "dp[i] = dp[__import__('os').getpid()] + dp[i.real] + dp[dp[0]] + dp[i-1]",
        &snapshot(2, &[1, 1, 0]),
        "dp",
    );
    // `dp[dp[0]]` itself is refused, but the inner `dp[0]` is a plain read
    let keys: Vec<_> = inputs.keys().collect();
    assert_eq!(keys, vec!["0", "i-1"]);
}

#[test]
fn test_division_by_zero_and_negative_index_are_dropped() {
    let inputs = DpReconstructor::extract_inputs(
        "dp[i] = dp[i // 0] + dp[i - 5] + dp[i % 2]",
        &snapshot(3, &[4, 5, 6, 0]),
        "dp",
    );
    let keys: Vec<_> = inputs.keys().collect();
    assert_eq!(keys, vec!["i % 2"]);
    assert_eq!(inputs.get("i % 2"), Some(&Value::Integer(5)));
}

#[test]
fn test_missing_snapshot_keeps_update() {
    let trace = TraceBuilder::new()
        .enter("f")
        .change("dp[0]", 0, 1)
        .change("dp[1]", 0, Value::Float(1.5))
        .build();
    let updates = DpReconstructor::analyze(&trace);
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|u| u.inputs.is_empty()));
}

#[test]
fn test_evaluator_contract() {
    let bindings = snapshot(7, &[]);
    assert_eq!(evaluate("(i + 1) * 2", &bindings), Ok(Number::Int(16)));
    assert_eq!(evaluate("-7 // 2", &bindings), Ok(Number::Int(-4)));
    assert_eq!(evaluate("i / 2", &bindings), Ok(Number::Float(3.5)));
    assert_eq!(evaluate("i % 0", &bindings), Err(EvalError::DivisionByZero));
    assert!(matches!(
        evaluate("j + 1", &bindings),
        Err(EvalError::UnknownIdentifier(_))
    ));
    assert!(evaluate("dp", &bindings).is_err());
    assert!(evaluate(&"(".repeat(100), &bindings).is_err());
}
