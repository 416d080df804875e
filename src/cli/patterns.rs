//! Detected algorithm patterns only

use super::analyze::{detect_patterns, detected_names};
use crate::trace::Trace;
use anyhow::Result;
use std::path::Path;

/// Run the patterns subcommand
pub fn patterns(input: &Path) -> Result<()> {
    let trace = Trace::load(input)?;
    let names = detected_names(&detect_patterns(&trace));

    if names.is_empty() {
        println!("No algorithm patterns detected");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}
