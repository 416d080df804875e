//! Trace-wide analysis beyond single-pattern detection
//!
//! - Generic multi-signal report
//! - Behavior reconstruction (call records, variable histories)
//! - DP formula reconstruction over a sandboxed index evaluator

pub mod behavior;
pub mod dp;
pub mod expr;
pub mod generic;

pub use behavior::{BehaviorAnalyzer, BehaviorReport, CallRecord, InputOutput, VariableFlow};
pub use dp::{DpReconstructor, DpUpdate};
pub use expr::{evaluate, EvalError, Expr, Number};
pub use generic::{GenericAnalyzer, GenericReport};
