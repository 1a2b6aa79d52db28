use std::fmt;

/// What went wrong during a `serialize` call.
///
/// Every failure is fail-closed: no partial module text is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializeErrorKind {
    /// The function's source did not parse, even after the shorthand retry.
    UnparseableSource(String),
    /// The function is engine-native and not a bound-target wrapper.
    NativeFunctionUnsupported,
    /// The engine exposes no inspector protocol.
    ProbeUnavailable,
    /// The scope chain was not retrievable and no registry entry exists.
    ScopesMissing,
    /// A pre/post-process rewrite did not produce a single function/class.
    InvalidConfiguration(String),
    /// Setting the requested prototype chain would cycle.
    CyclicPrototype,
    /// A registry extractor did not have the `() => [a, b, c]` shape, or its
    /// captured-value count mismatched the identifier count.
    MalformedRegistryEntry(String),
    /// A free variable could not be resolved in any enclosing scope
    /// (fatal only in strict mode).
    UnresolvedFreeVariable(String),
    /// The value graph nests deeper than the serializer's guard allows.
    GraphTooDeep,
}

impl fmt::Display for SerializeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparseableSource(message) => write!(f, "unparseable source: {message}"),
            Self::NativeFunctionUnsupported => write!(f, "native functions cannot be serialized"),
            Self::ProbeUnavailable => write!(f, "engine probe unavailable"),
            Self::ScopesMissing => write!(f, "scope chain unavailable and no registry entry exists"),
            Self::InvalidConfiguration(message) => write!(f, "invalid configuration: {message}"),
            Self::CyclicPrototype => write!(f, "prototype chain would cycle"),
            Self::MalformedRegistryEntry(message) => write!(f, "malformed registry entry: {message}"),
            Self::UnresolvedFreeVariable(name) => {
                write!(f, "free variable `{name}` not found in any enclosing scope")
            }
            Self::GraphTooDeep => write!(f, "value graph exceeds the maximum serialization depth"),
        }
    }
}

/// A serialization failure with the context a caller needs to locate it: the
/// function being emitted (if any) and the path of the offending sub-value
/// from the serialization root (e.g. `root.config.handlers[2]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeError {
    pub kind: SerializeErrorKind,
    /// Name of the function being emitted when the failure occurred.
    pub function: Option<String>,
    /// Path from the root value to the failing sub-value.
    pub path: String,
}

impl SerializeError {
    pub fn new(kind: SerializeErrorKind) -> Self {
        Self {
            kind,
            function: None,
            path: "root".to_owned(),
        }
    }
}

impl fmt::Display for SerializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        write!(f, " (at {}", self.path)?;
        if let Some(function) = &self.function {
            write!(f, ", in function `{function}`")?;
        }
        write!(f, ")")
    }
}

impl std::error::Error for SerializeError {}

impl From<SerializeErrorKind> for SerializeError {
    fn from(kind: SerializeErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Error type for closure-registry insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The same function key was registered twice.
    DuplicateRegistration(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRegistration(key) => write!(f, "function `{key}` is already registered"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Error type for the engine-probe wire layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The engine exposes no inspector protocol (or the transport refused).
    Unavailable(String),
    /// Bound-internals were asked of a non-bound function.
    NotBound,
    /// The scope chain was not retrievable for this function.
    ScopesMissing,
    /// The remote side answered with something the probe cannot interpret.
    Protocol(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "probe unavailable: {message}"),
            Self::NotBound => write!(f, "bound-internals requested for a non-bound function"),
            Self::ScopesMissing => write!(f, "scope chain not retrievable"),
            Self::Protocol(message) => write!(f, "protocol error: {message}"),
        }
    }
}

impl std::error::Error for ProbeError {}

impl From<ProbeError> for SerializeErrorKind {
    fn from(error: ProbeError) -> Self {
        match error {
            ProbeError::Unavailable(_) | ProbeError::NotBound | ProbeError::Protocol(_) => Self::ProbeUnavailable,
            ProbeError::ScopesMissing => Self::ScopesMissing,
        }
    }
}
