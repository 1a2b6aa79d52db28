//! Serializer tracing infrastructure.
//!
//! Provides a trait-based tracing system with zero-cost abstraction: with
//! [`NoopTracer`] every hook is an empty default method and compiles away
//! via monomorphization. Concrete implementations collect different data:
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (production default) |
//! | [`StderrTracer`] | Human-readable event log to stderr |
//! | [`RecordingTracer`] | Full event recording for assertions or post-mortem |
//!
//! The serializer entry points are generic over the tracer; callers choose
//! one at the call site:
//!
//! ```ignore
//! let module = serialize_with(&heap, root, &options, &ScopeChainResolver, &mut NoopTracer)?;
//! ```

use crate::heap::HeapId;

/// A trace event emitted during serialization.
///
/// Used by [`RecordingTracer`] to capture the full sequence for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A probe round-trip was issued.
    ProbeRequest {
        /// Wire method name.
        method: String,
        /// The probe's monotonically-incrementing request id.
        id: u64,
    },
    /// A heap value was requested that was already emitted.
    CacheHit { id: HeapId, ident: String },
    /// A heap value was emitted under a fresh identifier.
    ValueEmitted {
        id: HeapId,
        /// Static kind name (`"Object"`, `"Function"`, ...).
        kind: &'static str,
        ident: String,
    },
    /// A free variable was looked up for a function being emitted.
    FreeVariable {
        function: String,
        name: String,
        resolved: bool,
    },
    /// A rewrite pipeline phase ran over a function's source.
    Rewrite { phase: &'static str, changed: bool },
}

/// Hook points at the serializer's interesting moments.
///
/// All methods have empty defaults; implement only what you need.
pub trait SerializeTracer {
    fn probe_request(&mut self, _method: &str, _id: u64) {}

    fn cache_hit(&mut self, _id: HeapId, _ident: &str) {}

    fn value_emitted(&mut self, _id: HeapId, _kind: &'static str, _ident: &str) {}

    fn free_variable(&mut self, _function: &str, _name: &str, _resolved: bool) {}

    fn rewrite(&mut self, _phase: &'static str, _changed: bool) {}
}

/// Zero-cost tracer: every hook is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl SerializeTracer for NoopTracer {}

/// Logs every event to stderr, one line each.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrTracer;

impl StderrTracer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializeTracer for StderrTracer {
    fn probe_request(&mut self, method: &str, id: u64) {
        eprintln!("probe #{id}: {method}");
    }

    fn cache_hit(&mut self, id: HeapId, ident: &str) {
        eprintln!("cache hit: {id:?} -> {ident}");
    }

    fn value_emitted(&mut self, id: HeapId, kind: &'static str, ident: &str) {
        eprintln!("emit {kind}: {id:?} -> {ident}");
    }

    fn free_variable(&mut self, function: &str, name: &str, resolved: bool) {
        let state = if resolved { "resolved" } else { "unresolved" };
        eprintln!("free variable `{name}` of `{function}`: {state}");
    }

    fn rewrite(&mut self, phase: &'static str, changed: bool) {
        eprintln!("rewrite {phase}: changed={changed}");
    }
}

/// Records every event into a vector.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl SerializeTracer for RecordingTracer {
    fn probe_request(&mut self, method: &str, id: u64) {
        self.events.push(TraceEvent::ProbeRequest {
            method: method.to_owned(),
            id,
        });
    }

    fn cache_hit(&mut self, id: HeapId, ident: &str) {
        self.events.push(TraceEvent::CacheHit {
            id,
            ident: ident.to_owned(),
        });
    }

    fn value_emitted(&mut self, id: HeapId, kind: &'static str, ident: &str) {
        self.events.push(TraceEvent::ValueEmitted {
            id,
            kind,
            ident: ident.to_owned(),
        });
    }

    fn free_variable(&mut self, function: &str, name: &str, resolved: bool) {
        self.events.push(TraceEvent::FreeVariable {
            function: function.to_owned(),
            name: name.to_owned(),
            resolved,
        });
    }

    fn rewrite(&mut self, phase: &'static str, changed: bool) {
        self.events.push(TraceEvent::Rewrite { phase, changed });
    }
}
