use crate::heap::{Heap, HeapId};

/// A saved ingest session: a heap plus the root value to serialize.
///
/// This is the offline hand-off between capturing a closure (probe,
/// registry, or an embedder building graphs directly) and emitting the
/// module, in the same spirit as a session snapshot: everything is plain
/// data with serde derives, so captures round-trip through JSON.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Capture {
    pub heap: Heap,
    pub root: HeapId,
}

impl Capture {
    pub fn new(heap: Heap, root: HeapId) -> Self {
        Self { heap, root }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{function::FunctionData, value::JsValue};

    #[test]
    fn captures_round_trip_through_json() {
        let mut heap = Heap::new();
        let f = heap.alloc_function(FunctionData::new("() => x", ""));
        let o = heap.alloc_object();
        heap.set_property(o, "tag", JsValue::from("t"));
        let capture = Capture::new(heap, f);

        let text = capture.to_json().unwrap();
        let restored = Capture::from_json(&text).unwrap();
        assert_eq!(restored.root, f);
        assert_eq!(restored.heap.len(), capture.heap.len());
    }
}
