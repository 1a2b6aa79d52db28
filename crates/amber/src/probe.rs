//! The engine probe: ingesting live values over an inspector session.
//!
//! [`InspectorProbe`] speaks a debugger wire protocol shaped after the three
//! operations every inspector exposes — *evaluate-in-context*,
//! *get-properties-of-object-id* and *call-function-on-object-id* — through
//! a pluggable [`Transport`]. The probe owns the session state the protocol
//! requires:
//!
//! - a monotonically-incrementing request id. The remote side keys a single
//!   shared table by these ids, so requests must be strictly serialized;
//!   the `&mut self` receivers guarantee at most one outstanding request.
//! - a scratch table, created lazily by evaluating an empty object in a
//!   side-channel context so concurrently-running host code can neither
//!   observe nor clobber it. Remote values are parked there under fresh
//!   string keys to pin them for the session's lifetime.
//!
//! Object ids handed out by the engine are treated as stable for the
//! session; the probe dedups on them so a remote object materializes into
//! exactly one heap slot per ingest session.

use ahash::AHashMap;
use num_bigint::BigInt;
use serde_json::{Value, json};

use crate::{
    error::ProbeError,
    function::{BOUND_PREFIX, BoundInternals, FunctionData, ScopeFrame},
    heap::{ArrayData, Heap, HeapData, HeapId, MapData, ObjectData, RegExpData, SetData},
    value::JsValue,
};

/// An opaque object id assigned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RemoteObjectId(pub String);

/// A raw remote value as the wire reports it (a `RemoteObject` mirror).
pub type RemoteValue = Value;

/// Bound-internals as reported by the engine, still in wire form.
#[derive(Debug, Clone)]
pub struct RemoteBoundInternals {
    pub target: RemoteValue,
    pub this: RemoteValue,
    pub args: Vec<RemoteValue>,
}

/// One frame of a remote scope chain: bindings in report order.
#[derive(Debug, Clone, Default)]
pub struct RemoteScope {
    pub bindings: Vec<(String, RemoteValue)>,
}

/// The wire seam: sends one request and blocks for its response.
///
/// Implementations carry the actual protocol plumbing (a websocket to a
/// debugger port, a pipe to an embedded engine, a scripted fake in tests).
/// `id` is the probe's request id and must be echoed by the remote side.
pub trait Transport {
    fn request(&mut self, id: u64, method: &str, params: Value) -> Result<Value, ProbeError>;
}

/// The three introspection primitives the serializer needs from the engine.
///
/// `bound_internals_of` may only be called for functions whose declared
/// name carries the `bound ` prefix; anything else answers `NotBound`.
/// `scopes_of` reports the captured scope chain innermost first. Of the
/// failure modes only `ScopesMissing` is fatal to a whole serialization —
/// the caller falls back to the closure registry.
pub trait EngineProbe {
    fn source_of(&mut self, function: &RemoteObjectId) -> Result<String, ProbeError>;

    fn bound_internals_of(&mut self, function: &RemoteObjectId) -> Result<RemoteBoundInternals, ProbeError>;

    fn scopes_of(&mut self, function: &RemoteObjectId) -> Result<Vec<RemoteScope>, ProbeError>;
}

/// An inspector-protocol probe over a [`Transport`].
pub struct InspectorProbe<T: Transport> {
    transport: T,
    next_request_id: u64,
    scratch_id: Option<String>,
    next_slot: u64,
    /// remote object id -> heap slot, for identity dedup within the session
    seen: AHashMap<String, HeapId>,
    /// remote object id -> global name, filled on first use
    global_ids: Option<AHashMap<String, String>>,
    /// when false, functions with an unavailable scope chain ingest with an
    /// empty one (the closure registry supplies their captures instead)
    scopes_required: bool,
}

impl<T: Transport> InspectorProbe<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_request_id: 1,
            scratch_id: None,
            next_slot: 1,
            seen: AHashMap::new(),
            global_ids: None,
            scopes_required: true,
        }
    }

    /// The underlying transport (for inspection after a session).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn request(&mut self, method: &str, params: Value) -> Result<Value, ProbeError> {
        let id = self.next_request_id;
        self.next_request_id += 1;
        self.transport.request(id, method, params)
    }

    fn evaluate(&mut self, expression: &str) -> Result<Value, ProbeError> {
        let response = self.request("Runtime.evaluate", json!({ "expression": expression }))?;
        result_object(response)
    }

    fn call_on(&mut self, object_id: &str, declaration: &str, by_value: bool) -> Result<Value, ProbeError> {
        let response = self.request(
            "Runtime.callFunctionOn",
            json!({
                "objectId": object_id,
                "functionDeclaration": declaration,
                "returnByValue": by_value,
            }),
        )?;
        result_object(response)
    }

    fn get_properties(&mut self, object_id: &str) -> Result<Value, ProbeError> {
        self.request(
            "Runtime.getProperties",
            json!({ "objectId": object_id, "ownProperties": true }),
        )
    }

    /// The scratch table's object id, creating it on first use.
    fn ensure_scratch(&mut self) -> Result<String, ProbeError> {
        if let Some(id) = &self.scratch_id {
            return Ok(id.clone());
        }
        let result = self.evaluate("({})")?;
        let id = object_id_of(&result)?;
        self.scratch_id = Some(id.clone());
        Ok(id)
    }

    /// Parks a remote object in the scratch table under a fresh string key,
    /// pinning it for the session. Returns the key.
    pub fn park(&mut self, object: &RemoteObjectId) -> Result<String, ProbeError> {
        let scratch = self.ensure_scratch()?;
        let key = format!("k{}", self.next_slot);
        self.next_slot += 1;
        self.request(
            "Runtime.callFunctionOn",
            json!({
                "objectId": object.0,
                "functionDeclaration": "function(table, key) { table[key] = this; }",
                "arguments": [{ "objectId": scratch }, { "value": key }],
                "returnByValue": true,
            }),
        )?;
        Ok(key)
    }

    fn name_of(&mut self, function: &RemoteObjectId) -> Result<String, ProbeError> {
        let result = self.call_on(&function.0, "function() { return this.name; }", true)?;
        Ok(result.get("value").and_then(Value::as_str).unwrap_or_default().to_owned())
    }

    /// Maps remote object ids of host globals to their names, querying
    /// `globalThis`'s own properties once per session.
    fn ensure_global_ids(&mut self) -> Result<&AHashMap<String, String>, ProbeError> {
        if self.global_ids.is_none() {
            let global_object = self.evaluate("globalThis")?;
            let global_object_id = object_id_of(&global_object)?;
            let response = self.get_properties(&global_object_id)?;
            let mut map = AHashMap::new();
            map.insert(global_object_id, "globalThis".to_owned());
            for descriptor in own_properties(&response) {
                let Some(name) = descriptor.get("name").and_then(Value::as_str) else {
                    continue;
                };
                if !crate::heap::STANDARD_GLOBALS.contains(&name) {
                    continue;
                }
                if let Some(value) = descriptor.get("value")
                    && let Some(object_id) = value.get("objectId").and_then(Value::as_str)
                {
                    map.insert(object_id.to_owned(), name.to_owned());
                }
            }
            self.global_ids = Some(map);
        }
        Ok(self.global_ids.as_ref().expect("filled above"))
    }

    /// Ingests a live function into the heap: source, scope chain with all
    /// captured values, bound-internals for `bind` wrappers. Fails with
    /// `ScopesMissing` when the chain is unavailable.
    pub fn ingest_function(&mut self, heap: &mut Heap, function: &RemoteObjectId) -> Result<HeapId, ProbeError> {
        self.scopes_required = true;
        self.ingest_function_inner(heap, function)
    }

    /// Like [`Self::ingest_function`] but tolerates a missing scope chain
    /// (for this function and everything reachable from it), leaving it
    /// empty. Used when closure-registry entries supply the captured values
    /// instead.
    pub fn ingest_function_unscoped(
        &mut self,
        heap: &mut Heap,
        function: &RemoteObjectId,
    ) -> Result<HeapId, ProbeError> {
        self.scopes_required = false;
        let result = self.ingest_function_inner(heap, function);
        self.scopes_required = true;
        result
    }

    fn ingest_function_inner(&mut self, heap: &mut Heap, function: &RemoteObjectId) -> Result<HeapId, ProbeError> {
        if let Some(id) = self.seen.get(&function.0) {
            return Ok(*id);
        }
        self.park(function)?;
        let name = self.name_of(function)?;

        if name.starts_with(BOUND_PREFIX) {
            let internals = self.bound_internals_of(function)?;
            let id = heap.alloc_function(FunctionData::new_bound(
                name,
                BoundInternals {
                    target: JsValue::Undefined,
                    this: JsValue::Undefined,
                    args: Vec::new(),
                },
            ));
            self.seen.insert(function.0.clone(), id);
            let target = self.materialize(heap, &internals.target)?;
            let this = self.materialize(heap, &internals.this)?;
            let mut args = Vec::with_capacity(internals.args.len());
            for arg in &internals.args {
                args.push(self.materialize(heap, arg)?);
            }
            if let HeapData::Function(data) = heap.get_mut(id) {
                data.bound = Some(BoundInternals { target, this, args });
            }
            return Ok(id);
        }

        let source = self.source_of(function)?;
        let remote_scopes = match self.scopes_of(function) {
            Ok(scopes) => scopes,
            Err(ProbeError::ScopesMissing) if !self.scopes_required => Vec::new(),
            Err(error) => return Err(error),
        };

        let id = heap.alloc_function(FunctionData::new(source, name));
        self.seen.insert(function.0.clone(), id);

        let mut scopes = Vec::with_capacity(remote_scopes.len());
        for remote_scope in &remote_scopes {
            let mut frame = ScopeFrame::default();
            for (binding_name, remote_value) in &remote_scope.bindings {
                let value = self.materialize(heap, remote_value)?;
                frame.bindings.insert(binding_name.clone(), value);
            }
            scopes.push(frame);
        }
        if let HeapData::Function(data) = heap.get_mut(id) {
            data.scopes = scopes;
        }
        Ok(id)
    }

    /// Converts a wire `RemoteObject` into a heap value, recursing through
    /// object graphs with identity dedup on remote object ids.
    pub fn materialize(&mut self, heap: &mut Heap, remote: &RemoteValue) -> Result<JsValue, ProbeError> {
        let kind = remote
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ProbeError::Protocol("remote value has no type".to_owned()))?;
        match kind {
            "undefined" => Ok(JsValue::Undefined),
            "boolean" => Ok(JsValue::Bool(
                remote.get("value").and_then(Value::as_bool).unwrap_or_default(),
            )),
            "string" => Ok(JsValue::Str(
                remote.get("value").and_then(Value::as_str).unwrap_or_default().to_owned(),
            )),
            "number" => {
                if let Some(n) = remote.get("value").and_then(Value::as_f64) {
                    return Ok(JsValue::Num(n));
                }
                match remote.get("unserializableValue").and_then(Value::as_str) {
                    Some("NaN") => Ok(JsValue::Num(f64::NAN)),
                    Some("Infinity") => Ok(JsValue::Num(f64::INFINITY)),
                    Some("-Infinity") => Ok(JsValue::Num(f64::NEG_INFINITY)),
                    Some("-0") => Ok(JsValue::Num(-0.0)),
                    other => Err(ProbeError::Protocol(format!("unrecognized number form: {other:?}"))),
                }
            }
            "bigint" => {
                let raw = remote
                    .get("unserializableValue")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProbeError::Protocol("bigint without unserializableValue".to_owned()))?;
                let digits = raw.strip_suffix('n').unwrap_or(raw);
                digits
                    .parse::<BigInt>()
                    .map(JsValue::BigInt)
                    .map_err(|_| ProbeError::Protocol(format!("invalid bigint literal: {raw}")))
            }
            "function" => {
                let object_id = object_id_of(remote)?;
                if let Some(name) = self.global_name_for(&object_id)? {
                    return Ok(JsValue::Ref(self.global_slot(heap, &name)));
                }
                self.ingest_function_inner(heap, &RemoteObjectId(object_id)).map(JsValue::Ref)
            }
            "object" => self.materialize_object(heap, remote),
            "symbol" => Err(ProbeError::Protocol("symbol values are not serializable".to_owned())),
            other => Err(ProbeError::Protocol(format!("unrecognized remote type: {other}"))),
        }
    }

    fn materialize_object(&mut self, heap: &mut Heap, remote: &RemoteValue) -> Result<JsValue, ProbeError> {
        let subtype = remote.get("subtype").and_then(Value::as_str).unwrap_or_default();
        if subtype == "null" {
            return Ok(JsValue::Null);
        }
        let object_id = object_id_of(remote)?;
        if let Some(name) = self.global_name_for(&object_id)? {
            return Ok(JsValue::Ref(self.global_slot(heap, &name)));
        }
        if let Some(id) = self.seen.get(&object_id) {
            return Ok(JsValue::Ref(*id));
        }
        match subtype {
            "array" => {
                let id = heap.allocate(HeapData::Array(ArrayData::default()));
                self.seen.insert(object_id.clone(), id);
                let response = self.get_properties(&object_id)?;
                let mut elements: Vec<Option<JsValue>> = Vec::new();
                let mut extra = Vec::new();
                for descriptor in own_enumerable(&response) {
                    let (name, remote_value) = descriptor;
                    let value = self.materialize(heap, remote_value)?;
                    if let Ok(index) = name.parse::<usize>() {
                        if elements.len() <= index {
                            elements.resize(index + 1, None);
                        }
                        elements[index] = Some(value);
                    } else {
                        extra.push((name.to_owned(), value));
                    }
                }
                if let HeapData::Array(data) = heap.get_mut(id) {
                    data.elements = elements;
                    data.properties.extend(extra);
                }
                Ok(JsValue::Ref(id))
            }
            "date" => {
                let ms = self.call_on(&object_id, "function() { return this.getTime(); }", true)?;
                let ms = ms.get("value").and_then(Value::as_f64).unwrap_or(f64::NAN);
                let id = heap.allocate(HeapData::Date(ms));
                self.seen.insert(object_id, id);
                Ok(JsValue::Ref(id))
            }
            "regexp" => {
                let parts = self.call_on(
                    &object_id,
                    "function() { return { source: this.source, flags: this.flags }; }",
                    true,
                )?;
                let value = parts
                    .get("value")
                    .ok_or_else(|| ProbeError::Protocol("regexp probe returned no value".to_owned()))?;
                let data = RegExpData {
                    source: value
                        .get("source")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned(),
                    flags: value.get("flags").and_then(Value::as_str).unwrap_or_default().to_owned(),
                };
                let id = heap.allocate(HeapData::RegExp(data));
                self.seen.insert(object_id, id);
                Ok(JsValue::Ref(id))
            }
            "map" => {
                let id = heap.allocate(HeapData::Map(MapData::default()));
                self.seen.insert(object_id.clone(), id);
                let entries_remote = self.call_on(&object_id, "function() { return Array.from(this.entries()); }", false)?;
                let entries = self.materialize_pairs(heap, &entries_remote)?;
                if let HeapData::Map(data) = heap.get_mut(id) {
                    data.entries = entries;
                }
                Ok(JsValue::Ref(id))
            }
            "set" => {
                let id = heap.allocate(HeapData::Set(SetData::default()));
                self.seen.insert(object_id.clone(), id);
                let values_remote = self.call_on(&object_id, "function() { return Array.from(this); }", false)?;
                let values = self.materialize_elements(heap, &values_remote)?;
                if let HeapData::Set(data) = heap.get_mut(id) {
                    data.entries = values;
                }
                Ok(JsValue::Ref(id))
            }
            "" | "error" => {
                let id = heap.allocate(HeapData::Object(ObjectData::default()));
                self.seen.insert(object_id.clone(), id);
                let response = self.get_properties(&object_id)?;
                let mut properties = Vec::new();
                for (name, remote_value) in own_enumerable(&response) {
                    let value = self.materialize(heap, remote_value)?;
                    properties.push((name.to_owned(), value));
                }
                if let HeapData::Object(data) = heap.get_mut(id) {
                    data.properties.extend(properties);
                }
                Ok(JsValue::Ref(id))
            }
            other => Err(ProbeError::Protocol(format!("unsupported object subtype: {other}"))),
        }
    }

    /// Materializes a remote array's elements in index order.
    fn materialize_elements(&mut self, heap: &mut Heap, remote: &RemoteValue) -> Result<Vec<JsValue>, ProbeError> {
        let object_id = object_id_of(remote)?;
        let response = self.get_properties(&object_id)?;
        let mut indexed: Vec<(usize, JsValue)> = Vec::new();
        for (name, remote_value) in own_enumerable(&response) {
            if let Ok(index) = name.parse::<usize>() {
                let value = self.materialize(heap, remote_value)?;
                indexed.push((index, value));
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, value)| value).collect())
    }

    /// Materializes a remote array of `[key, value]` pair arrays.
    fn materialize_pairs(
        &mut self,
        heap: &mut Heap,
        remote: &RemoteValue,
    ) -> Result<Vec<(JsValue, JsValue)>, ProbeError> {
        let elements = self.materialize_elements(heap, remote)?;
        let mut pairs = Vec::with_capacity(elements.len());
        for element in elements {
            let JsValue::Ref(pair_id) = element else {
                return Err(ProbeError::Protocol("map entry is not a pair array".to_owned()));
            };
            let HeapData::Array(pair) = heap.get(pair_id) else {
                return Err(ProbeError::Protocol("map entry is not a pair array".to_owned()));
            };
            let key = pair.elements.first().cloned().flatten().unwrap_or(JsValue::Undefined);
            let value = pair.elements.get(1).cloned().flatten().unwrap_or(JsValue::Undefined);
            pairs.push((key, value));
        }
        Ok(pairs)
    }

    fn global_name_for(&mut self, object_id: &str) -> Result<Option<String>, ProbeError> {
        Ok(self.ensure_global_ids()?.get(object_id).cloned())
    }

    /// The heap slot for a named global, seeding it if the heap was not
    /// created with [`Heap::standard`].
    fn global_slot(&mut self, heap: &mut Heap, name: &str) -> HeapId {
        if let Some(id) = heap.global(name) {
            return id;
        }
        heap.allocate(HeapData::Global(name.to_owned()))
    }
}

impl<T: Transport> EngineProbe for InspectorProbe<T> {
    fn source_of(&mut self, function: &RemoteObjectId) -> Result<String, ProbeError> {
        let result = self.call_on(
            &function.0,
            "function() { return Function.prototype.toString.call(this); }",
            true,
        )?;
        result
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ProbeError::Protocol("stringification returned no value".to_owned()))
    }

    fn bound_internals_of(&mut self, function: &RemoteObjectId) -> Result<RemoteBoundInternals, ProbeError> {
        let response = self.get_properties(&function.0)?;
        let internals = response.get("internalProperties").and_then(Value::as_array);
        let find = |name: &str| -> Option<Value> {
            internals?
                .iter()
                .find(|p| p.get("name").and_then(Value::as_str) == Some(name))
                .and_then(|p| p.get("value").cloned())
        };
        let (Some(target), Some(this)) = (find("[[TargetFunction]]"), find("[[BoundThis]]")) else {
            return Err(ProbeError::NotBound);
        };
        let args = match find("[[BoundArgs]]") {
            Some(args_remote) => {
                let object_id = object_id_of(&args_remote)?;
                let response = self.get_properties(&object_id)?;
                let mut indexed: Vec<(usize, Value)> = Vec::new();
                for (name, value) in own_enumerable(&response) {
                    if let Ok(index) = name.parse::<usize>() {
                        indexed.push((index, value.clone()));
                    }
                }
                indexed.sort_by_key(|(index, _)| *index);
                indexed.into_iter().map(|(_, value)| value).collect()
            }
            None => Vec::new(),
        };
        Ok(RemoteBoundInternals { target, this, args })
    }

    fn scopes_of(&mut self, function: &RemoteObjectId) -> Result<Vec<RemoteScope>, ProbeError> {
        let response = self.get_properties(&function.0)?;
        let scopes_remote = response
            .get("internalProperties")
            .and_then(Value::as_array)
            .and_then(|props| {
                props
                    .iter()
                    .find(|p| p.get("name").and_then(Value::as_str) == Some("[[Scopes]]"))
            })
            .and_then(|p| p.get("value").cloned())
            .ok_or(ProbeError::ScopesMissing)?;
        let scopes_id = object_id_of(&scopes_remote).map_err(|_| ProbeError::ScopesMissing)?;

        let response = self.get_properties(&scopes_id)?;
        let mut indexed: Vec<(usize, String)> = Vec::new();
        for (name, value) in own_enumerable(&response) {
            if let Ok(index) = name.parse::<usize>()
                && let Some(scope_object_id) = value.get("objectId").and_then(Value::as_str)
            {
                indexed.push((index, scope_object_id.to_owned()));
            }
        }
        indexed.sort_by_key(|(index, _)| *index);

        let mut scopes = Vec::with_capacity(indexed.len());
        for (_, scope_object_id) in indexed {
            let response = self.get_properties(&scope_object_id)?;
            let mut frame = RemoteScope::default();
            for (name, value) in own_enumerable(&response) {
                frame.bindings.push((name.to_owned(), value.clone()));
            }
            scopes.push(frame);
        }
        Ok(scopes)
    }
}

/// Pulls `result` out of a wire response.
fn result_object(response: Value) -> Result<Value, ProbeError> {
    response
        .get("result")
        .cloned()
        .ok_or_else(|| ProbeError::Protocol("response has no result".to_owned()))
}

fn object_id_of(remote: &Value) -> Result<String, ProbeError> {
    remote
        .get("objectId")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ProbeError::Protocol("remote value has no objectId".to_owned()))
}

/// Property descriptors of a get-properties response.
fn own_properties(response: &Value) -> impl Iterator<Item = &Value> {
    response
        .get("result")
        .and_then(Value::as_array)
        .map(|a| a.iter())
        .unwrap_or_default()
}

/// `(name, value)` pairs of the own enumerable data properties in a
/// get-properties response, in report order.
fn own_enumerable(response: &Value) -> Vec<(&str, &Value)> {
    own_properties(response)
        .filter(|descriptor| {
            descriptor
                .get("enumerable")
                .and_then(Value::as_bool)
                .unwrap_or_default()
        })
        .filter_map(|descriptor| {
            let name = descriptor.get("name").and_then(Value::as_str)?;
            let value = descriptor.get("value")?;
            Some((name, value))
        })
        .collect()
}
