#![doc = include_str!("../../../README.md")]

mod analyze;
mod capture;
mod emit;
mod error;
mod function;
mod graph;
mod heap;
mod names;
mod parse;
mod probe;
mod registry;
mod serialize;
mod tracer;
mod transform;
mod value;

pub use crate::{
    analyze::{Analysis, CaptureResolver, Occurrence, ScopeChainResolver, analyze},
    capture::Capture,
    error::{ProbeError, RegistryError, SerializeError, SerializeErrorKind},
    function::{BOUND_PREFIX, BoundInternals, FunctionData, NATIVE_BODY_MARKER, ScopeFrame},
    heap::{ArrayData, Heap, HeapData, HeapId, MapData, ObjectData, Proto, RegExpData, STANDARD_GLOBALS, SetData},
    names::NameAllocator,
    parse::{FunctionAst, FunctionKind, FunctionNode, SourceEdit, apply_edits, parse_function},
    probe::{EngineProbe, InspectorProbe, RemoteBoundInternals, RemoteObjectId, RemoteScope, RemoteValue, Transport},
    registry::{ClosureRegistry, RegistrationId, RegistryEntry, RegistryResolver, extractor_names},
    serialize::{serialize, serialize_with},
    tracer::{NoopTracer, RecordingTracer, SerializeTracer, StderrTracer, TraceEvent},
    transform::{PreSerializeValue, SerializeOptions, SourceRewrite},
    value::{JsValue, is_identifier_name, number_literal, string_literal},
};
