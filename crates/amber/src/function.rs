use indexmap::IndexMap;

use crate::{heap::Proto, registry::RegistrationId, value::JsValue};

/// Name prefix the engine gives functions produced by `Function.prototype.bind`.
pub const BOUND_PREFIX: &str = "bound ";

/// Marker the engine embeds in the stringification of native functions.
pub const NATIVE_BODY_MARKER: &str = "[native code]";

/// One frame of a function's captured scope chain: an ordered table of
/// lexical bindings visible at that level.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ScopeFrame {
    pub bindings: IndexMap<String, JsValue>,
}

impl ScopeFrame {
    pub fn new(bindings: impl IntoIterator<Item = (String, JsValue)>) -> Self {
        Self {
            bindings: bindings.into_iter().collect(),
        }
    }
}

/// The internals of a bound function: the wrapped target, the captured
/// receiver and the captured leading arguments.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BoundInternals {
    /// The function the bound wrapper delegates to.
    pub target: JsValue,
    /// The captured `this`.
    pub this: JsValue,
    /// The captured leading arguments.
    pub args: Vec<JsValue>,
}

/// Everything the engine reported about a live function.
///
/// This is the serializer's model of a `LiveFunction`: the canonical source
/// text, the declared name, the captured scope chain, both prototypes, and
/// bound-internals when the function is a `bind` wrapper. Populated by the
/// engine probe, by a capture file, or by an embedder building graphs by
/// hand.
///
/// # Invariants
///
/// - If `name` starts with [`BOUND_PREFIX`], `bound` must be `Some`: the
///   serializer never parses a bound wrapper's source, it unwraps to the
///   target and re-applies `.bind`.
/// - `scopes` is ordered innermost first, matching what the inspector
///   protocol reports; free-variable resolution takes the first match.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionData {
    /// The engine's canonical stringification of the function.
    pub source: String,
    /// The declared name; possibly empty, possibly `"bound inner"`.
    pub name: String,
    /// Captured lexical scope chain, innermost first.
    #[serde(default)]
    pub scopes: Vec<ScopeFrame>,
    /// The object stored as the function's `prototype` property, if carried.
    ///
    /// When present it is serialized and assigned in the postamble; its
    /// `constructor` back-reference survives through the two-phase emission.
    #[serde(default)]
    pub prototype: Option<JsValue>,
    /// The function's own prototype (what it delegates lookup to).
    /// `Proto::Default` means `Function.prototype` and emits nothing.
    #[serde(default)]
    pub meta_proto: Proto,
    /// Bound-internals, present iff this is a `bind` wrapper.
    #[serde(default)]
    pub bound: Option<BoundInternals>,
    /// Link to a closure-registry entry, when the load-time transformer
    /// annotated this function. Used as the free-variable fallback when the
    /// engine probe cannot supply scopes.
    #[serde(default)]
    pub registration: Option<RegistrationId>,
}

impl FunctionData {
    /// Creates a function record with just source and name; scope chain and
    /// prototypes start empty.
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            scopes: Vec::new(),
            prototype: None,
            meta_proto: Proto::Default,
            bound: None,
            registration: None,
        }
    }

    /// Creates a bound-wrapper record. The source is the engine's native-body
    /// stub, which is never parsed.
    pub fn new_bound(name: impl Into<String>, internals: BoundInternals) -> Self {
        Self {
            source: format!("function () {{ {NATIVE_BODY_MARKER} }}"),
            name: name.into(),
            scopes: Vec::new(),
            prototype: None,
            meta_proto: Proto::Default,
            bound: Some(internals),
            registration: None,
        }
    }

    /// Whether the declared name carries the engine's bound prefix.
    pub fn is_bound(&self) -> bool {
        self.name.starts_with(BOUND_PREFIX)
    }

    /// Whether the reported source is a native body rather than user code.
    pub fn is_native(&self) -> bool {
        self.source.contains(NATIVE_BODY_MARKER)
    }

    /// The declared name with any `bound ` prefixes stripped.
    pub fn unbound_name(&self) -> &str {
        let mut name = self.name.as_str();
        while let Some(rest) = name.strip_prefix(BOUND_PREFIX) {
            name = rest;
        }
        name
    }

    /// Looks up `name` in the captured scope chain, innermost frame first.
    pub fn lookup_scope(&self, name: &str) -> Option<&JsValue> {
        self.scopes.iter().find_map(|frame| frame.bindings.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_name_detection() {
        let plain = FunctionData::new("function f() {}", "f");
        assert!(!plain.is_bound());

        let bound = FunctionData::new_bound(
            "bound bound f",
            BoundInternals {
                target: JsValue::Undefined,
                this: JsValue::Null,
                args: Vec::new(),
            },
        );
        assert!(bound.is_bound());
        assert!(bound.is_native());
        assert_eq!(bound.unbound_name(), "f");
    }

    #[test]
    fn scope_lookup_prefers_innermost() {
        let mut f = FunctionData::new("() => x", "");
        f.scopes = vec![
            ScopeFrame::new([("x".to_owned(), JsValue::from(1))]),
            ScopeFrame::new([("x".to_owned(), JsValue::from(2))]),
        ];
        assert_eq!(f.lookup_scope("x"), Some(&JsValue::Num(1.0)));
        assert_eq!(f.lookup_scope("missing"), None);
    }
}
