use std::fmt::Write;

use num_bigint::BigInt;

use crate::heap::HeapId;

/// A JavaScript value as seen by the serializer.
///
/// Primitives own their data and are emitted inline as literals; everything
/// with identity (objects, arrays, functions, boxed built-ins, whitelisted
/// globals) lives on the [`Heap`](crate::heap::Heap) and is referenced by
/// `Ref`. Two `Ref`s are the same JavaScript value iff their `HeapId`s are
/// equal; that is the identity the deduplication cache keys on.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum JsValue {
    /// The `undefined` value.
    Undefined,
    /// The `null` value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number (64-bit IEEE 754, including `-0`, `NaN` and the infinities).
    Num(f64),
    /// A string (UTF-8; lone surrogates are out of scope).
    Str(String),
    /// An arbitrary-precision `BigInt`.
    BigInt(BigInt),
    /// A reference to a heap value.
    Ref(HeapId),
}

impl JsValue {
    /// Returns true for values that are inlined as literals and never cached.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Ref(_))
    }

    /// Renders this value as a JavaScript literal, or `None` for heap
    /// references (those are emitted as identifiers by the graph serializer).
    pub fn literal(&self) -> Option<String> {
        let text = match self {
            Self::Undefined => "undefined".to_owned(),
            Self::Null => "null".to_owned(),
            Self::Bool(true) => "true".to_owned(),
            Self::Bool(false) => "false".to_owned(),
            Self::Num(n) => number_literal(*n),
            Self::Str(s) => string_literal(s),
            Self::BigInt(b) => format!("{b}n"),
            Self::Ref(_) => return None,
        };
        Some(text)
    }
}

impl From<bool> for JsValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for JsValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<i32> for JsValue {
    fn from(value: i32) -> Self {
        Self::Num(f64::from(value))
    }
}

impl From<&str> for JsValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for JsValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<HeapId> for JsValue {
    fn from(value: HeapId) -> Self {
        Self::Ref(value)
    }
}

/// Largest double below which every integral f64 is exactly representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Renders a number the way it must appear in emitted source.
///
/// Integral values in the safe range print without a fractional part, `-0`
/// keeps its sign, and non-finite values print as the global identifiers
/// `NaN` / `Infinity` (valid in any standard host). Everything else goes
/// through ryu for the shortest representation that round-trips.
pub fn number_literal(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_owned() } else { "-Infinity".to_owned() };
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0".to_owned() } else { "0".to_owned() };
    }
    if n == n.trunc() && n.abs() <= MAX_SAFE_INTEGER {
        #[expect(clippy::cast_possible_truncation, reason = "integral and within the i64-exact range")]
        return format!("{}", n as i64);
    }
    ryu::Buffer::new().format(n).to_owned()
}

/// Renders a string as a double-quoted JavaScript string literal.
///
/// U+2028 and U+2029 are escaped as well: they are line terminators in
/// JavaScript source even though they are ordinary characters in the string.
pub fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => {
                write!(out, "\\u{:04x}", c as u32).expect("writing to a String cannot fail");
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Returns true if `name` can be used as a bare property key or `.name`
/// member access in emitted source.
pub fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$') && !is_reserved_word(name)
}

/// Reserved words that cannot appear as bare identifiers in emitted code.
fn is_reserved_word(name: &str) -> bool {
    matches!(
        name,
        "break"
            | "case"
            | "catch"
            | "class"
            | "const"
            | "continue"
            | "debugger"
            | "default"
            | "delete"
            | "do"
            | "else"
            | "enum"
            | "export"
            | "extends"
            | "false"
            | "finally"
            | "for"
            | "function"
            | "if"
            | "import"
            | "in"
            | "instanceof"
            | "new"
            | "null"
            | "return"
            | "super"
            | "switch"
            | "this"
            | "throw"
            | "true"
            | "try"
            | "typeof"
            | "var"
            | "void"
            | "while"
            | "with"
            | "yield"
    )
}
