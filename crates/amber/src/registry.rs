//! The closure registry: the ingest path for hosts without an inspector.
//!
//! A load-time transformer wraps every function literal in the host program
//! with a call that registers the function together with a trivial
//! extractor of the form `() => [a, b, c]` — an arrow returning an array of
//! bare identifiers, one per captured variable — plus the captured values
//! themselves. When a function record carries a [`RegistrationId`], the
//! [`RegistryResolver`] pairs the extractor's identifier names with the
//! captured values positionally instead of consulting the engine probe.

use ahash::AHashMap;
use swc_ecma_ast::{BlockStmtOrExpr, Expr};

use crate::{
    analyze::CaptureResolver,
    error::{RegistryError, SerializeErrorKind},
    function::FunctionData,
    heap::Heap,
    parse::{FunctionNode, parse_function, unwrap_parens},
    value::JsValue,
};

/// Handle to a registry entry, carried by annotated function records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RegistrationId(u32);

impl RegistrationId {
    pub fn new(index: usize) -> Self {
        Self(index.try_into().expect("Invalid registration id"))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One registered function: where it came from and what it captured.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegistryEntry {
    /// Identifier of the source file the registering transformer annotated.
    pub source_file: String,
    /// Source text of the extractor; must parse as `() => [a, b, c]`.
    pub extractor_source: String,
    /// Captured values, positionally matching the extractor's identifiers.
    pub captured: Vec<JsValue>,
}

/// Table of registered functions, keyed by the stable function key the
/// load-time transformer mints (typically `file:line:col`).
///
/// Entries are never removed; registering the same key twice is rejected.
/// The registry lives for the whole process in the original host model; in
/// this crate it lives as long as the embedder keeps it, alongside the heap
/// it shares values with.
#[derive(Debug, Default)]
pub struct ClosureRegistry {
    entries: Vec<RegistryEntry>,
    keys: AHashMap<String, RegistrationId>,
}

impl ClosureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function's entry under its key.
    pub fn register(&mut self, key: impl Into<String>, entry: RegistryEntry) -> Result<RegistrationId, RegistryError> {
        let key = key.into();
        if self.keys.contains_key(&key) {
            return Err(RegistryError::DuplicateRegistration(key));
        }
        let id = RegistrationId::new(self.entries.len());
        self.entries.push(entry);
        self.keys.insert(key, id);
        Ok(id)
    }

    pub fn lookup(&self, id: RegistrationId) -> Option<&RegistryEntry> {
        self.entries.get(id.index())
    }

    /// The id a key was registered under, if any.
    pub fn id_for(&self, key: &str) -> Option<RegistrationId> {
        self.keys.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses an extractor source into its captured-variable names.
///
/// The only accepted shape is an arrow with no parameters whose body is an
/// array literal of bare identifiers.
pub fn extractor_names(extractor_source: &str) -> Result<Vec<String>, SerializeErrorKind> {
    let malformed = |message: &str| SerializeErrorKind::MalformedRegistryEntry(message.to_owned());
    let ast =
        parse_function(extractor_source).map_err(|_| malformed("extractor source does not parse as a function"))?;
    let FunctionNode::Arrow(arrow) = ast.node() else {
        return Err(malformed("extractor is not an arrow function"));
    };
    if !arrow.params.is_empty() {
        return Err(malformed("extractor must take no parameters"));
    }
    let BlockStmtOrExpr::Expr(body) = &*arrow.body else {
        return Err(malformed("extractor body must be an array literal"));
    };
    let Expr::Array(array) = unwrap_parens(body) else {
        return Err(malformed("extractor body must be an array literal"));
    };
    let mut names = Vec::with_capacity(array.elems.len());
    for elem in &array.elems {
        let Some(elem) = elem else {
            return Err(malformed("extractor array must not contain holes"));
        };
        if elem.spread.is_some() {
            return Err(malformed("extractor array must not contain spreads"));
        }
        let Expr::Ident(ident) = unwrap_parens(&elem.expr) else {
            return Err(malformed("extractor array elements must be bare identifiers"));
        };
        names.push(ident.sym.to_string());
    }
    Ok(names)
}

/// Free-variable resolution backed by the closure registry, falling back to
/// the probe-fed scope chain for functions without a registration.
#[derive(Debug, Clone, Copy)]
pub struct RegistryResolver<'r> {
    registry: &'r ClosureRegistry,
}

impl<'r> RegistryResolver<'r> {
    pub fn new(registry: &'r ClosureRegistry) -> Self {
        Self { registry }
    }
}

impl CaptureResolver for RegistryResolver<'_> {
    fn resolve(
        &self,
        _heap: &Heap,
        function: &FunctionData,
        name: &str,
    ) -> Result<Option<JsValue>, SerializeErrorKind> {
        let Some(registration) = function.registration else {
            return Ok(function.lookup_scope(name).cloned());
        };
        let entry = self
            .registry
            .lookup(registration)
            .ok_or_else(|| SerializeErrorKind::MalformedRegistryEntry("registration id has no entry".to_owned()))?;
        let names = extractor_names(&entry.extractor_source)?;
        if names.len() != entry.captured.len() {
            return Err(SerializeErrorKind::MalformedRegistryEntry(format!(
                "extractor lists {} identifiers but {} values were captured",
                names.len(),
                entry.captured.len()
            )));
        }
        Ok(names
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| entry.captured[index].clone()))
    }
}
