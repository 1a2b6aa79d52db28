//! Inspector-probe tests against a scripted fake transport.
//!
//! The fake answers requests from a fixed script and records everything it
//! was asked, so these tests pin down the wire contract: request
//! serialization order, monotonic ids, scratch-table setup, scope
//! materialization, global identity, and the `ScopesMissing` fallback.

use std::collections::VecDeque;

use amber::{
    EngineProbe, Heap, HeapData, InspectorProbe, JsValue, ProbeError, RemoteObjectId, SerializeOptions, Transport,
    serialize,
};
use serde_json::{Value, json};

struct FakeTransport {
    script: VecDeque<(&'static str, Value)>,
    log: Vec<(u64, String, Value)>,
}

impl FakeTransport {
    fn new(script: Vec<(&'static str, Value)>) -> Self {
        Self {
            script: script.into(),
            log: Vec::new(),
        }
    }

    fn methods(&self) -> Vec<&str> {
        self.log.iter().map(|(_, method, _)| method.as_str()).collect()
    }
}

impl Transport for FakeTransport {
    fn request(&mut self, id: u64, method: &str, params: Value) -> Result<Value, ProbeError> {
        self.log.push((id, method.to_owned(), params));
        let (expected, response) = self
            .script
            .pop_front()
            .ok_or_else(|| ProbeError::Protocol(format!("unexpected request: {method}")))?;
        assert_eq!(method, expected, "request out of order");
        Ok(response)
    }
}

fn scratch_setup() -> Vec<(&'static str, Value)> {
    vec![
        // ensure_scratch: evaluate an empty object in the side context
        ("Runtime.evaluate", json!({ "result": { "type": "object", "objectId": "scratch" } })),
        // park the function handle in the scratch table
        ("Runtime.callFunctionOn", json!({ "result": { "type": "undefined" } })),
    ]
}

// ============================================================================
// Function ingest
// ============================================================================

#[test]
fn ingests_a_function_with_scopes() {
    let mut script = scratch_setup();
    script.extend([
        // name
        ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "" } })),
        // source
        ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "() => x" } })),
        // [[Scopes]] internal property
        (
            "Runtime.getProperties",
            json!({
                "result": [],
                "internalProperties": [
                    { "name": "[[Scopes]]", "value": { "type": "object", "objectId": "scopes" } }
                ]
            }),
        ),
        // the scope chain array, innermost first
        (
            "Runtime.getProperties",
            json!({
                "result": [
                    { "name": "0", "value": { "type": "object", "objectId": "scope0" }, "enumerable": true }
                ]
            }),
        ),
        // bindings of the innermost scope
        (
            "Runtime.getProperties",
            json!({
                "result": [
                    { "name": "x", "value": { "type": "string", "value": "hi" }, "enumerable": true }
                ]
            }),
        ),
    ]);

    let mut heap = Heap::standard();
    let mut probe = InspectorProbe::new(FakeTransport::new(script));
    let root = probe.ingest_function(&mut heap, &RemoteObjectId("fn1".to_owned())).unwrap();

    let HeapData::Function(data) = heap.get(root) else {
        panic!("expected a function on the heap");
    };
    assert_eq!(data.source, "() => x");
    assert_eq!(data.scopes.len(), 1);
    assert_eq!(data.scopes[0].bindings.get("x"), Some(&JsValue::from("hi")));

    // the whole session is serialized through one id counter
    let ids: Vec<u64> = probe.transport().log.iter().map(|(id, _, _)| *id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);

    // and the ingested closure serializes end to end
    let module = serialize(&heap, root, &SerializeOptions::new()).unwrap();
    assert_eq!(module, "var v1 = ((x) => () => x)(\"hi\");\nexports.handler = v1;\n");
}

#[test]
fn park_uses_the_scratch_table() {
    let mut script = scratch_setup();
    script.extend([
        ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "" } })),
        ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "() => 1" } })),
        (
            "Runtime.getProperties",
            json!({
                "result": [],
                "internalProperties": [
                    { "name": "[[Scopes]]", "value": { "type": "object", "objectId": "scopes" } }
                ]
            }),
        ),
        ("Runtime.getProperties", json!({ "result": [] })),
    ]);

    let mut heap = Heap::standard();
    let mut probe = InspectorProbe::new(FakeTransport::new(script));
    probe.ingest_function(&mut heap, &RemoteObjectId("fn1".to_owned())).unwrap();

    let log = &probe.transport().log;
    // request 2 is the park call: `this` is the function, the scratch table
    // and a fresh string key ride in as arguments
    let (_, method, params) = &log[1];
    assert_eq!(method, "Runtime.callFunctionOn");
    assert_eq!(params["objectId"], "fn1");
    assert_eq!(params["arguments"][0]["objectId"], "scratch");
    assert_eq!(params["arguments"][1]["value"], "k1");
}

#[test]
fn missing_scopes_fail_unless_tolerated() {
    let script_without_scopes = || {
        let mut script = scratch_setup();
        script.extend([
            ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "" } })),
            ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "() => x" } })),
            // no [[Scopes]] internal property
            ("Runtime.getProperties", json!({ "result": [] })),
        ]);
        script
    };

    let mut heap = Heap::standard();
    let mut probe = InspectorProbe::new(FakeTransport::new(script_without_scopes()));
    let err = probe
        .ingest_function(&mut heap, &RemoteObjectId("fn1".to_owned()))
        .unwrap_err();
    assert_eq!(err, ProbeError::ScopesMissing);

    // the registry path ingests the same function without a scope chain
    let mut heap = Heap::standard();
    let mut probe = InspectorProbe::new(FakeTransport::new(script_without_scopes()));
    let root = probe
        .ingest_function_unscoped(&mut heap, &RemoteObjectId("fn1".to_owned()))
        .unwrap();
    let HeapData::Function(data) = heap.get(root) else {
        panic!("expected a function on the heap");
    };
    assert!(data.scopes.is_empty());
}

// ============================================================================
// Bound functions
// ============================================================================

#[test]
fn bound_functions_ingest_their_internals() {
    let mut script = scratch_setup();
    script.extend([
        // name carries the bound prefix
        ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "bound g" } })),
        // bound internals
        (
            "Runtime.getProperties",
            json!({
                "result": [],
                "internalProperties": [
                    { "name": "[[TargetFunction]]", "value": { "type": "function", "objectId": "target" } },
                    { "name": "[[BoundThis]]", "value": { "type": "object", "subtype": "null" } }
                ]
            }),
        ),
        // materializing the target: global identity check first
        ("Runtime.evaluate", json!({ "result": { "type": "object", "objectId": "global-this" } })),
        ("Runtime.getProperties", json!({ "result": [] })),
        // then the target ingests like any function
        ("Runtime.callFunctionOn", json!({ "result": { "type": "undefined" } })),
        ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "g" } })),
        ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "function g(){return this}" } })),
        (
            "Runtime.getProperties",
            json!({
                "result": [],
                "internalProperties": [
                    { "name": "[[Scopes]]", "value": { "type": "object", "objectId": "scopes" } }
                ]
            }),
        ),
        ("Runtime.getProperties", json!({ "result": [] })),
    ]);

    let mut heap = Heap::standard();
    let mut probe = InspectorProbe::new(FakeTransport::new(script));
    let root = probe.ingest_function(&mut heap, &RemoteObjectId("bound1".to_owned())).unwrap();

    let HeapData::Function(data) = heap.get(root) else {
        panic!("expected a function on the heap");
    };
    assert!(data.is_bound());
    let internals = data.bound.as_ref().unwrap();
    assert_eq!(internals.this, JsValue::Null);
    assert!(matches!(internals.target, JsValue::Ref(_)));

    let module = serialize(&heap, root, &SerializeOptions::new()).unwrap();
    assert_eq!(
        module,
        "var v1 = ((_self) => (function g(){return this}).bind(_self))(null);\nexports.handler = v1;\n"
    );
}

#[test]
fn non_bound_functions_answer_not_bound() {
    let script = vec![("Runtime.getProperties", json!({ "result": [] }))];
    let mut probe = InspectorProbe::new(FakeTransport::new(script));
    let err = probe.bound_internals_of(&RemoteObjectId("fn1".to_owned())).unwrap_err();
    assert_eq!(err, ProbeError::NotBound);
}

// ============================================================================
// Value materialization
// ============================================================================

#[test]
fn objects_materialize_with_global_identity() {
    let script = vec![
        // ensure_global_ids: globalThis and its own properties
        ("Runtime.evaluate", json!({ "result": { "type": "object", "objectId": "global-this" } })),
        (
            "Runtime.getProperties",
            json!({
                "result": [
                    { "name": "Object", "value": { "type": "function", "objectId": "g-object" }, "enumerable": false }
                ]
            }),
        ),
        // the object's own properties: a primitive and the Object global
        (
            "Runtime.getProperties",
            json!({
                "result": [
                    { "name": "n", "value": { "type": "number", "value": 1 }, "enumerable": true },
                    { "name": "ctor", "value": { "type": "function", "objectId": "g-object" }, "enumerable": true },
                    { "name": "hidden", "value": { "type": "number", "value": 2 }, "enumerable": false }
                ]
            }),
        ),
    ];

    let mut heap = Heap::standard();
    let mut probe = InspectorProbe::new(FakeTransport::new(script));
    let value = probe
        .materialize(&mut heap, &json!({ "type": "object", "objectId": "obj1" }))
        .unwrap();

    let JsValue::Ref(id) = value else { panic!("expected a heap ref") };
    let HeapData::Object(data) = heap.get(id) else {
        panic!("expected an object on the heap");
    };
    assert_eq!(data.properties.get("n"), Some(&JsValue::Num(1.0)));
    // the captured global is the seeded `Object` slot, by identity
    assert_eq!(data.properties.get("ctor"), Some(&JsValue::Ref(heap.global("Object").unwrap())));
    // non-enumerable properties are not carried
    assert!(!data.properties.contains_key("hidden"));
}

#[test]
fn special_remote_values_materialize() {
    let mut heap = Heap::standard();
    let mut probe = InspectorProbe::new(FakeTransport::new(Vec::new()));

    let cases = [
        (json!({ "type": "undefined" }), JsValue::Undefined),
        (json!({ "type": "object", "subtype": "null" }), JsValue::Null),
        (json!({ "type": "boolean", "value": true }), JsValue::Bool(true)),
        (json!({ "type": "number", "value": 1.5 }), JsValue::Num(1.5)),
        (json!({ "type": "number", "unserializableValue": "Infinity" }), JsValue::Num(f64::INFINITY)),
        (json!({ "type": "string", "value": "s" }), JsValue::from("s")),
    ];
    for (remote, expected) in cases {
        assert_eq!(probe.materialize(&mut heap, &remote).unwrap(), expected);
    }

    let nan = probe.materialize(&mut heap, &json!({ "type": "number", "unserializableValue": "NaN" })).unwrap();
    assert!(matches!(nan, JsValue::Num(n) if n.is_nan()));

    let bigint = probe
        .materialize(&mut heap, &json!({ "type": "bigint", "unserializableValue": "12345678901234567890n" }))
        .unwrap();
    assert!(matches!(bigint, JsValue::BigInt(_)));

    let err = probe.materialize(&mut heap, &json!({ "type": "symbol", "objectId": "sym1" })).unwrap_err();
    assert!(matches!(err, ProbeError::Protocol(_)));
}

#[test]
fn shared_remote_objects_dedup_by_object_id() {
    let script = vec![
        ("Runtime.evaluate", json!({ "result": { "type": "object", "objectId": "global-this" } })),
        ("Runtime.getProperties", json!({ "result": [] })),
        ("Runtime.getProperties", json!({ "result": [] })),
    ];
    let mut heap = Heap::standard();
    let mut probe = InspectorProbe::new(FakeTransport::new(script));

    let first = probe.materialize(&mut heap, &json!({ "type": "object", "objectId": "shared" })).unwrap();
    let second = probe.materialize(&mut heap, &json!({ "type": "object", "objectId": "shared" })).unwrap();
    assert_eq!(first, second, "same remote id must map to the same heap slot");
}

// ============================================================================
// Request serialization
// ============================================================================

#[test]
fn request_ids_are_monotonic_across_operations() {
    let script = vec![
        ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "function a(){}" } })),
        ("Runtime.callFunctionOn", json!({ "result": { "type": "string", "value": "function b(){}" } })),
    ];
    let mut probe = InspectorProbe::new(FakeTransport::new(script));
    probe.source_of(&RemoteObjectId("a".to_owned())).unwrap();
    probe.source_of(&RemoteObjectId("b".to_owned())).unwrap();

    let ids: Vec<u64> = probe.transport().log.iter().map(|(id, _, _)| *id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(probe.transport().methods(), vec!["Runtime.callFunctionOn"; 2]);
}
