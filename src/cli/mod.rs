//! Command-line interface module
//!
//! This module contains the implementations for the CLI subcommands.

pub mod analyze;
pub mod dp;
pub mod patterns;

pub use analyze::{AnalysisReport, TraceStats};
