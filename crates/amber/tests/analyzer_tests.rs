//! Free-variable analysis against the scoping rules the serializer relies
//! on: hoisting, shadowing, destructuring, and the identifier-use
//! classifications (member properties, keys, labels are not references).

use amber::{analyze, parse_function};

fn free_of(source: &str) -> Vec<String> {
    analyze(&parse_function(source).unwrap()).free
}

// ============================================================================
// Hoisting
// ============================================================================

#[test]
fn function_declarations_are_visible_before_their_position() {
    assert!(free_of("() => { before(); function before() {} }").is_empty());
}

#[test]
fn let_shadows_only_after_its_declarator() {
    // the same name resolves to the outer binding before the declarator and
    // to the inner one after
    let free = free_of("() => { take(x); const x = 1; take(x); }");
    assert_eq!(free, vec!["take", "x"]);
}

#[test]
fn var_without_initializer_hoists_to_block_top() {
    assert!(free_of("() => { seen(x); var x; function seen(v) {} }").is_empty());
}

#[test]
fn var_with_initializer_binds_after_the_declarator() {
    assert_eq!(free_of("() => { seen(x); var x = 1; function seen(v) {} }"), vec!["x"]);
}

#[test]
fn hoisting_is_per_block() {
    // the inner block's function declaration is not visible outside it
    assert_eq!(free_of("() => { inner(); { function inner() {} } }"), vec!["inner"]);
}

// ============================================================================
// Scope entries
// ============================================================================

#[test]
fn nested_function_parameters_shadow_outer_names() {
    assert_eq!(free_of("() => { return (x) => x + y; }"), vec!["y"]);
}

#[test]
fn named_function_expression_binds_its_own_name() {
    assert!(free_of("(function walk(n) { return n && walk(n - 1); })").is_empty());
}

#[test]
fn catch_parameter_binds_inside_the_handler() {
    assert!(free_of("() => { try {} catch (e) { return e; } }").is_empty());
    assert_eq!(free_of("() => { try {} catch { return e; } }"), vec!["e"]);
}

#[test]
fn for_loop_bindings_cover_head_and_body() {
    assert!(free_of("() => { for (let i = 0; i < 3; i++) { take(i); } function take(v) {} }").is_empty());
    assert!(free_of("() => { for (const [k, v] of []) { take(k, v); } function take(a, b) {} }").is_empty());
    assert!(free_of("() => { for (const k in {}) { take(k); } function take(v) {} }").is_empty());
}

#[test]
fn switch_cases_share_one_scope() {
    assert!(free_of("(mode) => { switch (mode) { case 1: let tag = \"a\"; break; default: tag = \"b\"; } }").is_empty());
}

#[test]
fn class_name_is_bound_in_its_own_body_and_heritage() {
    assert!(free_of("class Node { static of() { return new Node(); } }").is_empty());
    assert_eq!(free_of("class Sub extends Base {}"), vec!["Base"]);
}

// ============================================================================
// Identifier-use classification
// ============================================================================

#[test]
fn member_properties_and_keys_are_not_references() {
    assert_eq!(free_of("() => cfg.mode"), vec!["cfg"]);
    assert_eq!(free_of("() => ({ mode: 1, deep: { mode: 2 } })"), Vec::<String>::new());
    assert_eq!(free_of("() => cfg?.mode"), vec!["cfg"]);
}

#[test]
fn computed_members_and_keys_are_references() {
    assert_eq!(free_of("() => cfg[mode]"), vec!["cfg", "mode"]);
    assert_eq!(free_of("() => ({ [mode]: 1 })"), vec!["mode"]);
}

#[test]
fn shorthand_properties_are_references() {
    assert_eq!(free_of("() => ({ mode })"), vec!["mode"]);
}

#[test]
fn labels_are_not_references() {
    assert!(free_of("() => { hop: for (;;) { continue hop; } }").is_empty());
}

#[test]
fn destructuring_defaults_are_references_but_keys_are_not() {
    assert_eq!(free_of("({ width = fallback }) => width"), vec!["fallback"]);
    assert_eq!(free_of("({ width: w }) => w"), Vec::<String>::new());
}

#[test]
fn template_literals_reference_their_interpolations() {
    assert_eq!(free_of("() => `${greeting}, ${name}`"), vec!["greeting", "name"]);
    assert_eq!(free_of("() => tag`${x}`"), vec!["tag", "x"]);
}

#[test]
fn writes_are_references() {
    assert_eq!(free_of("() => { total += 1; }"), vec!["total"]);
    assert_eq!(free_of("() => { [first, second] = pair; }"), vec!["first", "second", "pair"]);
}

#[test]
fn this_and_super_are_not_identifiers() {
    assert!(free_of("function f() { return this.x; }").is_empty());
    // only the heritage target is a reference; `super.m` is not
    assert_eq!(free_of("class A extends Object { m() { return super.m(); } }"), vec!["Object"]);
}

// ============================================================================
// Method shorthand normalization
// ============================================================================

#[test]
fn method_shorthand_analyzes_like_a_function() {
    assert_eq!(free_of("handler(event) { return process(event); }"), vec!["process"]);
    assert_eq!(free_of("async fetchIt() { return await client.get(url); }"), vec!["client", "url"]);
}

// ============================================================================
// Generators and async
// ============================================================================

#[test]
fn yield_and_await_arguments_are_references() {
    assert_eq!(free_of("async function f() { return await pending; }"), vec!["pending"]);
    assert_eq!(free_of("function* g() { yield item; }"), vec!["item"]);
}
