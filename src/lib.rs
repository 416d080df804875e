//! algoviz-rs: execution-trace analysis
//!
//! This library consumes a recorded trace of a computation (calls, returns
//! and variable changes) and classifies its algorithmic behavior: recursion,
//! pointer walks, dynamic programming, loops, searching and sorting. It also
//! reconstructs call records, variable histories and DP recurrences.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod detectors;
pub mod error;
pub mod report;
pub mod trace;

pub use config::{AnalysisConfig, RenderMode};
pub use error::{Error as AlgovizError, Result as AlgovizResult};

// Re-export commonly used types
pub use analysis::{BehaviorAnalyzer, DpReconstructor, DpUpdate, GenericAnalyzer};
pub use report::{Detection, PatternReport, Signal};
pub use trace::{Event, Trace, TraceBuilder, Value, ValueKind};
