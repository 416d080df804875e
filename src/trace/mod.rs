//! Trace model: values, events and the trace container

pub mod builder;
pub mod event;
pub mod value;

pub use builder::TraceBuilder;
pub use event::{Call, DepthAnomaly, Event, IndexedRef, Return, Trace, VarChange};
pub use value::{Mapping, OrderedMap, Value, ValueKind};
