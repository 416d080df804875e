//! Uniform detection payloads
//!
//! Every detector and analyzer returns its own typed metrics record. The
//! [`Signal`] trait flattens any of them into a [`Detection`] so that
//! renderers can treat them uniformly inside a [`PatternReport`].

use crate::trace::{Mapping, OrderedMap, Value};
use serde::Serialize;

/// `{ detected, metrics }` payload for one pattern
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub detected: bool,
    pub metrics: Mapping,
}

impl Detection {
    /// The zero form: not detected, no metrics
    pub fn absent() -> Self {
        Self {
            detected: false,
            metrics: Mapping::new(),
        }
    }
}

/// Pattern name to detection payload, in insertion order
pub type PatternReport = OrderedMap<Detection>;

/// A typed detector result that can be flattened into a [`Detection`]
pub trait Signal {
    fn detected(&self) -> bool;

    fn metrics(&self) -> Mapping;

    fn to_detection(&self) -> Detection {
        Detection {
            detected: self.detected(),
            metrics: self.metrics(),
        }
    }
}

/// A count as a metric value
pub fn count(n: usize) -> Value {
    Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

/// A list of names as a metric value
pub fn names<S: AsRef<str>>(items: &[S]) -> Value {
    Value::Sequence(items.iter().map(|s| Value::from(s.as_ref())).collect())
}

/// Per-name counts as a metric value
pub fn counts(map: &OrderedMap<usize>) -> Value {
    Value::Mapping(map.iter().map(|(k, &n)| (k.clone(), count(n))).collect())
}
