//! The value-graph serializer.
//!
//! Converts an arbitrary heap value into module statements that rebuild it.
//! Emission is two-phase: the *preamble* declares every composite value
//! (empty shells for containers), the *postamble* populates own properties,
//! wires prototypes and closes cycles. A value that reaches itself
//! transitively simply references its already-cached identifier, which is
//! why the shell declaration and the cache insertion both precede the walk
//! over the value's own content.

use ahash::AHashMap;

use crate::{
    analyze::CaptureResolver,
    error::{SerializeError, SerializeErrorKind},
    function::FunctionData,
    heap::{Heap, HeapData, HeapId, Proto, data_kind},
    names::{NameAllocator, VALUE_PREFIX},
    tracer::SerializeTracer,
    transform::SerializeOptions,
    value::{JsValue, is_identifier_name, number_literal, string_literal},
};

/// Deepest value-graph nesting the serializer will follow before failing
/// closed. Cycles don't count against this (they hit the cache); only
/// genuinely deep acyclic graphs do.
pub(crate) const MAX_GRAPH_DEPTH: usize = 200;

/// Per-call emission state: the identity cache, the two statement lists, the
/// name allocator, and breadcrumbs for error context.
pub(crate) struct ModuleBuilder<'a, R: CaptureResolver, T: SerializeTracer> {
    pub(crate) heap: &'a Heap,
    pub(crate) options: &'a SerializeOptions,
    pub(crate) resolver: &'a R,
    pub(crate) tracer: &'a mut T,
    pub(crate) cache: AHashMap<HeapId, String>,
    pub(crate) preamble: Vec<String>,
    pub(crate) postamble: Vec<String>,
    pub(crate) names: NameAllocator,
    path: Vec<String>,
    pub(crate) function_stack: Vec<String>,
    depth: usize,
}

impl<'a, R: CaptureResolver, T: SerializeTracer> ModuleBuilder<'a, R, T> {
    pub fn new(heap: &'a Heap, options: &'a SerializeOptions, resolver: &'a R, tracer: &'a mut T) -> Self {
        Self {
            heap,
            options,
            resolver,
            tracer,
            cache: AHashMap::new(),
            preamble: Vec::new(),
            postamble: Vec::new(),
            names: NameAllocator::new(),
            path: Vec::new(),
            function_stack: Vec::new(),
            depth: 0,
        }
    }

    /// Wraps an error kind with the current breadcrumb context.
    pub(crate) fn err(&self, kind: SerializeErrorKind) -> SerializeError {
        SerializeError {
            kind,
            function: self.function_stack.last().cloned(),
            path: self.path_string(),
        }
    }

    fn path_string(&self) -> String {
        let mut out = "root".to_owned();
        for segment in &self.path {
            out.push_str(segment);
        }
        out
    }

    pub(crate) fn push_path(&mut self, segment: String) {
        self.path.push(segment);
    }

    pub(crate) fn pop_path(&mut self) {
        self.path.pop();
    }

    /// Serializes a value, returning the expression text that denotes it:
    /// a literal for primitives, an identifier (or global name) for heap
    /// values.
    pub fn serialize_value(&mut self, value: &JsValue) -> Result<String, SerializeError> {
        let replaced = self
            .options
            .pre_serialize_value
            .as_ref()
            .and_then(|hook| hook(self.heap, value));
        let value = replaced.as_ref().unwrap_or(value);
        match value {
            JsValue::Ref(id) => self.serialize_ref(*id),
            primitive => Ok(primitive.literal().expect("non-ref values always have a literal")),
        }
    }

    fn serialize_ref(&mut self, id: HeapId) -> Result<String, SerializeError> {
        if let Some(ident) = self.cache.get(&id) {
            let ident = ident.clone();
            self.tracer.cache_hit(id, &ident);
            return Ok(ident);
        }
        if self.depth >= MAX_GRAPH_DEPTH {
            return Err(self.err(SerializeErrorKind::GraphTooDeep));
        }
        self.depth += 1;
        let result = self.emit_data(id);
        self.depth -= 1;
        let ident = result?;
        self.tracer.value_emitted(id, data_kind(self.heap.get(id)), &ident);
        Ok(ident)
    }

    fn emit_data(&mut self, id: HeapId) -> Result<String, SerializeError> {
        let heap = self.heap;
        match heap.get(id) {
            HeapData::Global(name) => {
                // referenced by its global identifier, never copied
                self.cache.insert(id, name.clone());
                Ok(name.clone())
            }
            HeapData::Object(object) => {
                let ident = self.declare_shell(id, "{}");
                for (key, value) in &object.properties {
                    self.push_path(property_segment(key));
                    let expr = self.serialize_value(value)?;
                    self.postamble.push(property_assign(&ident, key, &expr));
                    self.pop_path();
                }
                self.emit_proto(id, &ident, &object.proto)?;
                Ok(ident)
            }
            HeapData::Array(array) => {
                let ident = self.declare_shell(id, "[]");
                let mut filled = 0usize;
                for (index, element) in array.elements.iter().enumerate() {
                    let Some(value) = element else { continue };
                    if index > filled {
                        // holes: bump length so the next push lands at `index`
                        self.postamble.push(format!("{ident}.length = {index};"));
                    }
                    self.push_path(format!("[{index}]"));
                    let expr = self.serialize_value(value)?;
                    self.postamble.push(format!("{ident}.push({expr});"));
                    self.pop_path();
                    filled = index + 1;
                }
                if array.elements.len() > filled {
                    self.postamble.push(format!("{ident}.length = {};", array.elements.len()));
                }
                for (key, value) in &array.properties {
                    self.push_path(property_segment(key));
                    let expr = self.serialize_value(value)?;
                    self.postamble.push(property_assign(&ident, key, &expr));
                    self.pop_path();
                }
                self.emit_proto(id, &ident, &array.proto)?;
                Ok(ident)
            }
            HeapData::Function(function) => self.emit_function(id, function),
            HeapData::Date(ms) => {
                let ident = self.names.next_name(VALUE_PREFIX);
                self.cache.insert(id, ident.clone());
                self.preamble.push(format!("var {ident} = new Date({});", number_literal(*ms)));
                Ok(ident)
            }
            HeapData::RegExp(regex) => {
                let ident = self.names.next_name(VALUE_PREFIX);
                self.cache.insert(id, ident.clone());
                self.preamble
                    .push(format!("var {ident} = /{}/{};", regex.source, regex.flags));
                Ok(ident)
            }
            HeapData::Map(map) => {
                let ident = self.declare_shell(id, "new Map()");
                for (index, (key, value)) in map.entries.iter().enumerate() {
                    self.push_path(format!(".<entry {index}>"));
                    let key_expr = self.serialize_value(key)?;
                    let value_expr = self.serialize_value(value)?;
                    self.postamble.push(format!("{ident}.set({key_expr}, {value_expr});"));
                    self.pop_path();
                }
                Ok(ident)
            }
            HeapData::Set(set) => {
                let ident = self.declare_shell(id, "new Set()");
                for (index, value) in set.entries.iter().enumerate() {
                    self.push_path(format!(".<entry {index}>"));
                    let expr = self.serialize_value(value)?;
                    self.postamble.push(format!("{ident}.add({expr});"));
                    self.pop_path();
                }
                Ok(ident)
            }
        }
    }

    /// Allocates an identifier, caches it (cycles resolve to it from here
    /// on) and declares the empty shell in the preamble.
    fn declare_shell(&mut self, id: HeapId, shell: &str) -> String {
        let ident = self.names.next_name(VALUE_PREFIX);
        self.cache.insert(id, ident.clone());
        self.preamble.push(format!("var {ident} = {shell};"));
        ident
    }

    /// Emits the prototype wiring for a non-default prototype.
    pub(crate) fn emit_proto(&mut self, owner: HeapId, ident: &str, proto: &Proto) -> Result<(), SerializeError> {
        match proto {
            Proto::Default => Ok(()),
            Proto::Null => {
                self.postamble.push(format!("Object.setPrototypeOf({ident}, null);"));
                Ok(())
            }
            Proto::Explicit(value) => {
                self.check_proto_chain(owner)?;
                self.push_path(".<prototype>".to_owned());
                let expr = self.serialize_value(value)?;
                self.postamble.push(format!("Object.setPrototypeOf({ident}, {expr});"));
                self.pop_path();
                Ok(())
            }
        }
    }

    /// Rejects prototype chains that revisit a value: evaluating the emitted
    /// `setPrototypeOf` calls would throw, so the serializer fails closed
    /// instead.
    pub(crate) fn check_proto_chain(&self, start: HeapId) -> Result<(), SerializeError> {
        let mut seen = vec![start];
        let mut current = start;
        loop {
            let proto = match self.heap.get(current) {
                HeapData::Object(object) => &object.proto,
                HeapData::Array(array) => &array.proto,
                HeapData::Function(function) => &function.meta_proto,
                _ => return Ok(()),
            };
            let Proto::Explicit(JsValue::Ref(next)) = proto else {
                return Ok(());
            };
            if seen.contains(next) {
                return Err(self.err(SerializeErrorKind::CyclicPrototype));
            }
            seen.push(*next);
            current = *next;
        }
    }

    /// The function record behind a value, when it is one.
    pub(crate) fn function_data(&self, value: &JsValue) -> Option<(HeapId, &'a FunctionData)> {
        if let JsValue::Ref(id) = value
            && let HeapData::Function(function) = self.heap.get(*id)
        {
            return Some((*id, function));
        }
        None
    }

    /// Assembles the final module text.
    pub fn into_module(self, root_expr: &str, factory: bool) -> String {
        let mut out = String::new();
        for line in &self.preamble {
            out.push_str(line);
            out.push('\n');
        }
        for line in &self.postamble {
            out.push_str(line);
            out.push('\n');
        }
        if factory {
            out.push_str(&format!("exports.handler = {root_expr}();\n"));
        } else {
            out.push_str(&format!("exports.handler = {root_expr};\n"));
        }
        out
    }
}

/// `ident.key = expr;` when the key is identifier-safe, bracket syntax
/// otherwise.
fn property_assign(ident: &str, key: &str, expr: &str) -> String {
    if is_identifier_name(key) {
        format!("{ident}.{key} = {expr};")
    } else {
        format!("{ident}[{}] = {expr};", string_literal(key))
    }
}

fn property_segment(key: &str) -> String {
    if is_identifier_name(key) {
        format!(".{key}")
    } else {
        format!("[{}]", string_literal(key))
    }
}
