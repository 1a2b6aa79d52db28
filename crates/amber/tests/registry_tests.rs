//! Closure-registry tests: registration, duplicate rejection, extractor
//! shape validation, and serialization through the registry resolver.

use amber::{
    ClosureRegistry, FunctionData, Heap, JsValue, NoopTracer, RegistryEntry, RegistryError, RegistryResolver,
    SerializeErrorKind, SerializeOptions, serialize_with,
};

fn entry(extractor: &str, captured: Vec<JsValue>) -> RegistryEntry {
    RegistryEntry {
        source_file: "app.js".to_owned(),
        extractor_source: extractor.to_owned(),
        captured,
    }
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn register_and_lookup() {
    let mut registry = ClosureRegistry::new();
    let id = registry.register("app.js:1:0", entry("() => [x]", vec![JsValue::from(1)])).unwrap();
    assert_eq!(registry.lookup(id).unwrap().source_file, "app.js");
    assert_eq!(registry.id_for("app.js:1:0"), Some(id));
    assert_eq!(registry.len(), 1);
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = ClosureRegistry::new();
    registry.register("app.js:1:0", entry("() => [x]", vec![JsValue::from(1)])).unwrap();
    let err = registry
        .register("app.js:1:0", entry("() => [y]", vec![JsValue::from(2)]))
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateRegistration(key) if key == "app.js:1:0"));
}

#[test]
fn entries_are_never_removed() {
    let mut registry = ClosureRegistry::new();
    let first = registry.register("a", entry("() => []", Vec::new())).unwrap();
    let second = registry.register("b", entry("() => []", Vec::new())).unwrap();
    assert_ne!(first, second);
    assert!(registry.lookup(first).is_some());
    assert!(registry.lookup(second).is_some());
}

// ============================================================================
// Serialization through the registry resolver
// ============================================================================

#[test]
fn registry_supplies_captured_values() {
    let mut registry = ClosureRegistry::new();
    let registration = registry
        .register(
            "app.js:3:4",
            entry("() => [greeting, count]", vec![JsValue::from("hi"), JsValue::from(2)]),
        )
        .unwrap();

    let mut heap = Heap::standard();
    let mut f = FunctionData::new("() => greeting.repeat(count)", "");
    f.registration = Some(registration);
    let root = heap.alloc_function(f);

    let resolver = RegistryResolver::new(&registry);
    let options = SerializeOptions::new();
    let module = serialize_with(&heap, root, &options, &resolver, &mut NoopTracer).unwrap();
    assert_eq!(
        module,
        "var v1 = ((greeting, count) => () => greeting.repeat(count))(\"hi\", 2);\nexports.handler = v1;\n"
    );
}

#[test]
fn unregistered_functions_fall_back_to_scope_chains() {
    let registry = ClosureRegistry::new();
    let mut heap = Heap::standard();
    let mut f = FunctionData::new("() => x", "");
    f.scopes = vec![amber::ScopeFrame::new([("x".to_owned(), JsValue::from(9))])];
    let root = heap.alloc_function(f);

    let resolver = RegistryResolver::new(&registry);
    let options = SerializeOptions::new();
    let module = serialize_with(&heap, root, &options, &resolver, &mut NoopTracer).unwrap();
    assert!(module.contains(")(9);"), "{module}");
}

// ============================================================================
// Malformed entries
// ============================================================================

#[test]
fn arity_mismatch_is_malformed() {
    let mut registry = ClosureRegistry::new();
    let registration = registry
        .register("app.js:9:0", entry("() => [a, b]", vec![JsValue::from(1)]))
        .unwrap();

    let mut heap = Heap::standard();
    let mut f = FunctionData::new("() => a + b", "");
    f.registration = Some(registration);
    let root = heap.alloc_function(f);

    let resolver = RegistryResolver::new(&registry);
    let options = SerializeOptions::new();
    let err = serialize_with(&heap, root, &options, &resolver, &mut NoopTracer).unwrap_err();
    assert!(matches!(err.kind, SerializeErrorKind::MalformedRegistryEntry(_)));
}

#[test]
fn non_extractor_shapes_are_malformed() {
    for bad in ["(x) => [x]", "() => x", "() => [a.b]", "function f() { return [a]; }"] {
        let mut registry = ClosureRegistry::new();
        let registration = registry.register("k", entry(bad, Vec::new())).unwrap();

        let mut heap = Heap::standard();
        let mut f = FunctionData::new("() => a", "");
        f.registration = Some(registration);
        let root = heap.alloc_function(f);

        let resolver = RegistryResolver::new(&registry);
        let options = SerializeOptions::new();
        let err = serialize_with(&heap, root, &options, &resolver, &mut NoopTracer).unwrap_err();
        assert!(
            matches!(err.kind, SerializeErrorKind::MalformedRegistryEntry(_)),
            "extractor `{bad}` should be malformed"
        );
    }
}

#[test]
fn names_not_in_the_extractor_are_unresolved() {
    let mut registry = ClosureRegistry::new();
    let registration = registry.register("k", entry("() => [a]", vec![JsValue::from(1)])).unwrap();

    let mut heap = Heap::standard();
    let mut f = FunctionData::new("() => a + mystery", "");
    f.registration = Some(registration);
    let root = heap.alloc_function(f);

    let resolver = RegistryResolver::new(&registry);
    // non-strict: the unknown name is left in place
    let options = SerializeOptions::new();
    let module = serialize_with(&heap, root, &options, &resolver, &mut NoopTracer).unwrap();
    assert!(module.contains("a + mystery"), "{module}");

    let strict = SerializeOptions::new().strict(true);
    let err = serialize_with(&heap, root, &strict, &resolver, &mut NoopTracer).unwrap_err();
    assert_eq!(err.kind, SerializeErrorKind::UnresolvedFreeVariable("mystery".to_owned()));
}
