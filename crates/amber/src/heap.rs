use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{function::FunctionData, value::JsValue};

/// Unique identifier for a value stored on the heap.
///
/// Uses `u32` to save space; heap identity is the serializer's notion of
/// JavaScript object identity, so the deduplication cache and the global
/// whitelist are both keyed by `HeapId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HeapId(u32);

impl HeapId {
    pub fn new(index: usize) -> Self {
        Self(index.try_into().expect("Invalid heap id"))
    }

    /// Returns the raw index value.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The prototype of a heap value.
///
/// `Default` means "whatever the intrinsic prototype for this kind of value
/// is" (`Object.prototype` for objects, `Array.prototype` for arrays, and so
/// on); the serializer emits nothing for it. Anything else is wired in the
/// postamble with `Object.setPrototypeOf`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Proto {
    /// The intrinsic prototype for the value's kind; nothing is emitted.
    #[default]
    Default,
    /// A `null` prototype (`Object.create(null)` shapes).
    Null,
    /// An explicit prototype value, serialized like any other value.
    Explicit(JsValue),
}

impl Proto {
    /// Returns true when no `setPrototypeOf` call needs to be emitted.
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

/// An ordinary object: insertion-ordered own string-keyed properties plus a
/// prototype.
///
/// Symbol keys, accessors and non-enumerable properties are outside the
/// supported surface; see DESIGN.md.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ObjectData {
    pub properties: IndexMap<String, JsValue>,
    pub proto: Proto,
}

/// An array: elements in index order (with holes), non-index own properties,
/// and a prototype.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ArrayData {
    /// `None` entries are holes; they round-trip as missing indices.
    pub elements: Vec<Option<JsValue>>,
    /// Own properties other than array indices (`arr.tag = "x"`).
    pub properties: IndexMap<String, JsValue>,
    pub proto: Proto,
}

/// A `RegExp` value, emitted as a regex literal.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegExpData {
    pub source: String,
    pub flags: String,
}

/// A `Map` value; entries in iteration order.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MapData {
    pub entries: Vec<(JsValue, JsValue)>,
}

/// A `Set` value; entries in iteration order.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SetData {
    pub entries: Vec<JsValue>,
}

/// A value stored on the heap.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum HeapData {
    /// An ordinary object.
    Object(ObjectData),
    /// An array.
    Array(ArrayData),
    /// A function or class, with everything the engine reported about it.
    Function(FunctionData),
    /// A `Date`, carried as epoch milliseconds.
    Date(f64),
    /// A `RegExp`.
    RegExp(RegExpData),
    /// A `Map`.
    Map(MapData),
    /// A `Set`.
    Set(SetData),
    /// A whitelisted host global, referenced by its global identifier in the
    /// emitted module and never copied.
    Global(String),
}

/// Host globals seeded by [`Heap::standard`].
///
/// The emitted module assumes these exist in the target environment, so the
/// list stays conservative: intrinsic constructors and the host console /
/// process / timer surface. `module` and `exports` are deliberately absent
/// (the emitted module assigns to `exports` itself).
pub const STANDARD_GLOBALS: &[&str] = &[
    "globalThis",
    "Object",
    "Array",
    "Function",
    "String",
    "Number",
    "Boolean",
    "Symbol",
    "BigInt",
    "Math",
    "JSON",
    "Reflect",
    "Proxy",
    "Promise",
    "Error",
    "TypeError",
    "RangeError",
    "SyntaxError",
    "EvalError",
    "ReferenceError",
    "URIError",
    "Map",
    "Set",
    "WeakMap",
    "WeakSet",
    "RegExp",
    "Date",
    "ArrayBuffer",
    "SharedArrayBuffer",
    "DataView",
    "Int8Array",
    "Uint8Array",
    "Uint8ClampedArray",
    "Int16Array",
    "Uint16Array",
    "Int32Array",
    "Uint32Array",
    "Float32Array",
    "Float64Array",
    "BigInt64Array",
    "BigUint64Array",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "encodeURIComponent",
    "decodeURIComponent",
    "encodeURI",
    "decodeURI",
    "console",
    "process",
    "Buffer",
    "setTimeout",
    "clearTimeout",
    "setInterval",
    "clearInterval",
    "setImmediate",
    "queueMicrotask",
    "require",
];

/// Arena of JavaScript values reachable from the closure being serialized.
///
/// The heap is the in-process model of the live engine's object graph: the
/// probe (or the embedder, or a capture file) populates it, and the
/// serializer walks it. Slots are never freed; a serializer call borrows the
/// heap immutably, so every `HeapId` handed out stays valid for the whole
/// call.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Heap {
    slots: Vec<HeapData>,
    /// Seeded host globals by name. Whitelist membership is decided by
    /// identity: a captured value is a global iff its `HeapId` is one of
    /// these, regardless of what identifier it was captured under.
    globals: AHashMap<String, HeapId>,
}

impl Heap {
    /// Creates an empty heap with no seeded globals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a heap pre-seeded with the standard host globals.
    pub fn standard() -> Self {
        let mut heap = Self::new();
        for name in STANDARD_GLOBALS {
            let id = heap.allocate(HeapData::Global((*name).to_owned()));
            heap.globals.insert((*name).to_owned(), id);
        }
        heap
    }

    /// Stores a value and returns its id.
    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let id = HeapId::new(self.slots.len());
        self.slots.push(data);
        id
    }

    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.slots[id.index()]
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Looks up a seeded host global by name.
    pub fn global(&self, name: &str) -> Option<HeapId> {
        self.globals.get(name).copied()
    }

    /// Allocates an empty ordinary object.
    pub fn alloc_object(&mut self) -> HeapId {
        self.allocate(HeapData::Object(ObjectData::default()))
    }

    /// Allocates an array from dense elements (no holes).
    pub fn alloc_array(&mut self, elements: impl IntoIterator<Item = JsValue>) -> HeapId {
        let data = ArrayData {
            elements: elements.into_iter().map(Some).collect(),
            ..ArrayData::default()
        };
        self.allocate(HeapData::Array(data))
    }

    /// Allocates a function value.
    pub fn alloc_function(&mut self, data: FunctionData) -> HeapId {
        self.allocate(HeapData::Function(data))
    }

    /// Sets an own property on an object or array slot.
    ///
    /// # Panics
    /// Panics if the slot holds a value kind without own properties; the
    /// builder APIs are for embedders and tests constructing graphs by hand.
    pub fn set_property(&mut self, id: HeapId, key: impl Into<String>, value: JsValue) {
        match self.get_mut(id) {
            HeapData::Object(object) => {
                object.properties.insert(key.into(), value);
            }
            HeapData::Array(array) => {
                array.properties.insert(key.into(), value);
            }
            other => panic!("cannot set property on {}", data_kind(other)),
        }
    }

    /// Sets the prototype of an object, array or function slot.
    ///
    /// # Panics
    /// Panics if the slot kind carries no prototype field.
    pub fn set_proto(&mut self, id: HeapId, proto: Proto) {
        match self.get_mut(id) {
            HeapData::Object(object) => object.proto = proto,
            HeapData::Array(array) => array.proto = proto,
            HeapData::Function(function) => function.meta_proto = proto,
            other => panic!("cannot set prototype on {}", data_kind(other)),
        }
    }
}

/// Static name of a heap value's kind, for error messages.
pub fn data_kind(data: &HeapData) -> &'static str {
    match data {
        HeapData::Object(_) => "Object",
        HeapData::Array(_) => "Array",
        HeapData::Function(_) => "Function",
        HeapData::Date(_) => "Date",
        HeapData::RegExp(_) => "RegExp",
        HeapData::Map(_) => "Map",
        HeapData::Set(_) => "Set",
        HeapData::Global(_) => "Global",
    }
}
