//! Incremental trace construction
//!
//! `TraceBuilder` keeps the call-stack depth consistent while events are
//! appended, the way an instrumenter would. It is used for fixtures,
//! benchmarks and any embedding that records events by hand.

use super::event::{Call, Event, Return, Trace, VarChange};
use super::value::{Mapping, Value};

#[derive(Debug, Default)]
pub struct TraceBuilder {
    events: Vec<Event>,
    stack: Vec<String>,
    line: u32,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the line number attached to subsequent events
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    fn depth(&self) -> u32 {
        self.stack.len() as u32
    }

    /// Enter `function` with the given arguments
    pub fn call<K, V>(mut self, function: &str, arguments: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.stack.push(function.to_string());
        let arguments: Mapping = arguments
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.events.push(Event::Call(Call {
            function: function.to_string(),
            arguments,
            depth: self.depth(),
            line: self.line,
        }));
        self
    }

    /// Enter `function` without arguments
    pub fn enter(self, function: &str) -> Self {
        self.call(function, std::iter::empty::<(String, Value)>())
    }

    /// Return from the innermost open call.
    ///
    /// With no open call this records an unmatched return at depth 1.
    pub fn ret(mut self, value: impl Into<Value>) -> Self {
        let depth = self.depth().max(1);
        let function = self.stack.pop().unwrap_or_default();
        self.events.push(Event::Return(Return {
            function,
            value: value.into(),
            depth,
            line: self.line,
        }));
        self
    }

    /// Record a plain variable change at the current depth
    pub fn change(mut self, name: &str, old: impl Into<Value>, new: impl Into<Value>) -> Self {
        self.events.push(Event::VarChange(VarChange {
            name: name.to_string(),
            old: old.into(),
            new: new.into(),
            depth: self.depth().max(1),
            line: self.line,
            snapshot: None,
            source: None,
        }));
        self
    }

    /// Record a change to `table[index]` together with the bindings
    /// visible at that point and the source line that wrote it
    pub fn indexed_change(
        mut self,
        table: &str,
        index: i64,
        old: impl Into<Value>,
        new: impl Into<Value>,
        snapshot: Mapping,
        source: &str,
    ) -> Self {
        self.events.push(Event::VarChange(VarChange {
            name: format!("{}[{}]", table, index),
            old: old.into(),
            new: new.into(),
            depth: self.depth().max(1),
            line: self.line,
            snapshot: Some(snapshot),
            source: Some(source.to_string()),
        }));
        self
    }

    /// Append a pre-built event as-is
    pub fn event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn build(self) -> Trace {
        Trace::new(self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_tracks_depth() {
        let trace = TraceBuilder::new()
            .call("fib", [("n", 2)])
            .call("fib", [("n", 1)])
            .change("a", 0, 1)
            .ret(1)
            .ret(1)
            .build();

        let depths: Vec<u32> = trace.events().iter().map(Event::depth).collect();
        assert_eq!(depths, vec![1, 2, 2, 2, 1]);
        assert!(trace.depth_anomalies().is_empty());
    }
}
