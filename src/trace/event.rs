//! Trace events and the trace container
//!
//! A [`Trace`] is produced once by an instrumenter and is read-only input to
//! every detector and analyzer in this crate.

use super::value::{Mapping, Value};
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// A function was entered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub function: String,
    pub arguments: Mapping,
    /// 1-based call-stack depth of the new frame
    pub depth: u32,
    pub line: u32,
}

/// A function returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Return {
    pub function: String,
    pub value: Value,
    pub depth: u32,
    pub line: u32,
}

/// A variable (or one element of a sequence) changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarChange {
    /// Plain identifier or an indexed reference such as `dp[4]`
    pub name: String,
    pub old: Value,
    pub new: Value,
    pub depth: u32,
    pub line: u32,
    /// Every binding visible at this point. Only set for indexed changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Mapping>,
    /// The literal source line that produced the change. Only set for indexed changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl VarChange {
    /// Parse the name as `base[index]`, if it is an indexed reference
    pub fn indexed(&self) -> Option<IndexedRef<'_>> {
        IndexedRef::parse(&self.name)
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed().is_some()
    }

    /// Integer delta `new - old`, if both sides are integers
    pub fn int_delta(&self) -> Option<i64> {
        Value::int_delta(&self.old, &self.new)
    }

    /// Both old and new values are numeric
    pub fn is_numeric_change(&self) -> bool {
        self.old.is_numeric() && self.new.is_numeric()
    }
}

/// One event of an execution trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Call(Call),
    Return(Return),
    VarChange(VarChange),
}

impl Event {
    pub fn depth(&self) -> u32 {
        match self {
            Event::Call(call) => call.depth,
            Event::Return(ret) => ret.depth,
            Event::VarChange(change) => change.depth,
        }
    }

    pub fn line(&self) -> u32 {
        match self {
            Event::Call(call) => call.line,
            Event::Return(ret) => ret.line,
            Event::VarChange(change) => change.line,
        }
    }
}

static INDEXED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)\[(.+)\]$").expect("valid indexed-name regex"));

/// A textual `base[index]` reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedRef<'a> {
    /// The sequence variable (`dp` in `dp[i-1]`)
    pub base: &'a str,
    /// The index text (`i-1` in `dp[i-1]`)
    pub index: &'a str,
}

impl<'a> IndexedRef<'a> {
    pub fn parse(name: &'a str) -> Option<Self> {
        let captures = INDEXED_NAME.captures(name)?;
        Some(IndexedRef {
            base: captures.get(1)?.as_str(),
            index: captures.get(2)?.as_str(),
        })
    }
}

/// An inconsistency between recorded depths and the Call/Return sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthAnomaly {
    pub event_index: usize,
    pub expected: u32,
    pub recorded: u32,
}

/// The complete ordered record of one instrumented computation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    events: Vec<Event>,
}

impl Trace {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Decode a trace from its JSON form
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load a trace file from disk
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn calls(&self) -> impl Iterator<Item = &Call> {
        self.events.iter().filter_map(|e| match e {
            Event::Call(call) => Some(call),
            _ => None,
        })
    }

    pub fn returns(&self) -> impl Iterator<Item = &Return> {
        self.events.iter().filter_map(|e| match e {
            Event::Return(ret) => Some(ret),
            _ => None,
        })
    }

    pub fn var_changes(&self) -> impl Iterator<Item = &VarChange> {
        self.events.iter().filter_map(|e| match e {
            Event::VarChange(change) => Some(change),
            _ => None,
        })
    }

    /// Largest depth recorded on any Call event (0 for a trace without calls)
    pub fn max_call_depth(&self) -> u32 {
        self.calls().map(|c| c.depth).max().unwrap_or(0)
    }

    /// Compare recorded depths against a counter driven by Call/Return.
    ///
    /// Unmatched returns do not push the counter below zero.
    pub fn depth_anomalies(&self) -> Vec<DepthAnomaly> {
        let mut anomalies = Vec::new();
        let mut depth: u32 = 0;

        for (event_index, event) in self.events.iter().enumerate() {
            let expected = match event {
                Event::Call(_) => {
                    depth += 1;
                    depth
                }
                Event::Return(_) => {
                    let current = depth;
                    depth = depth.saturating_sub(1);
                    current
                }
                Event::VarChange(_) => depth,
            };
            if event.depth() != expected {
                anomalies.push(DepthAnomaly {
                    event_index,
                    expected,
                    recorded: event.depth(),
                });
            }
        }

        if !anomalies.is_empty() {
            log::warn!(
                "Trace depth bookkeeping disagrees with call/return order at {} event(s)",
                anomalies.len()
            );
        }
        anomalies
    }
}

impl From<Vec<Event>> for Trace {
    fn from(events: Vec<Event>) -> Self {
        Trace::new(events)
    }
}
