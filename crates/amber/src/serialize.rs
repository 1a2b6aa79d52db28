use crate::{
    analyze::{CaptureResolver, ScopeChainResolver},
    error::SerializeError,
    graph::ModuleBuilder,
    heap::{Heap, HeapId},
    tracer::{NoopTracer, SerializeTracer},
    transform::SerializeOptions,
    value::JsValue,
};

/// Serializes the closure graph rooted at `root` into a self-contained
/// module text ending in `exports.handler = <expression>;`.
///
/// Captured values resolve through the function records' probe-fed scope
/// chains; use [`serialize_with`] to plug in the closure registry or a
/// tracer. Fails closed: on any error no partial module text is returned.
pub fn serialize(heap: &Heap, root: HeapId, options: &SerializeOptions) -> Result<String, SerializeError> {
    serialize_with(heap, root, options, &ScopeChainResolver, &mut NoopTracer)
}

/// [`serialize`] with an explicit capture resolver and tracer.
pub fn serialize_with<R: CaptureResolver, T: SerializeTracer>(
    heap: &Heap,
    root: HeapId,
    options: &SerializeOptions,
    resolver: &R,
    tracer: &mut T,
) -> Result<String, SerializeError> {
    let mut builder = ModuleBuilder::new(heap, options, resolver, tracer);
    let root_expr = builder.serialize_value(&JsValue::Ref(root))?;
    Ok(builder.into_module(&root_expr, options.is_factory_function))
}
