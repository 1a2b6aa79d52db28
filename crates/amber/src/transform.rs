use crate::{
    error::SerializeErrorKind,
    heap::Heap,
    parse::{FunctionAst, parse_function},
    tracer::SerializeTracer,
    value::JsValue,
};

/// A user-supplied syntactic rewrite of a function's source.
///
/// Rewrites receive the current parse and return replacement source text
/// (`None` for "no change"). The pipeline re-parses after every change and
/// rejects anything that is no longer a single function/class node with
/// `InvalidConfiguration`. A rewrite's own error string is surfaced the same
/// way.
pub trait SourceRewrite {
    fn rewrite(&self, ast: &FunctionAst) -> Result<Option<String>, String>;
}

impl<F> SourceRewrite for F
where
    F: Fn(&FunctionAst) -> Result<Option<String>, String>,
{
    fn rewrite(&self, ast: &FunctionAst) -> Result<Option<String>, String> {
        self(ast)
    }
}

/// Value-replacement hook, called before any cache lookup. Returning a
/// replacement changes the identity the serializer sees for this and all
/// further references; `None` keeps the original.
pub type PreSerializeValue = Box<dyn Fn(&Heap, &JsValue) -> Option<JsValue>>;

/// Configuration for one `serialize` call.
///
/// Built in the consuming-setter style:
///
/// ```ignore
/// let options = SerializeOptions::new().factory_function(true).strict(true);
/// ```
#[derive(Default)]
pub struct SerializeOptions {
    /// Rewrites applied to a function's parse before free-variable analysis.
    pub pre_process: Vec<Box<dyn SourceRewrite>>,
    /// Rewrites applied after free-variable analysis, before emission.
    pub post_process: Vec<Box<dyn SourceRewrite>>,
    /// Value-replacement hook, applied before the deduplication cache.
    pub pre_serialize_value: Option<PreSerializeValue>,
    /// When set, the export line invokes the root once at module load and
    /// exports its return value: `exports.handler = v1();`.
    pub is_factory_function: bool,
    /// Promotes `UnresolvedFreeVariable` from leave-as-is to a hard error.
    pub strict: bool,
}

impl SerializeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_process(mut self, rewrite: impl SourceRewrite + 'static) -> Self {
        self.pre_process.push(Box::new(rewrite));
        self
    }

    pub fn post_process(mut self, rewrite: impl SourceRewrite + 'static) -> Self {
        self.post_process.push(Box::new(rewrite));
        self
    }

    pub fn pre_serialize_value(mut self, hook: impl Fn(&Heap, &JsValue) -> Option<JsValue> + 'static) -> Self {
        self.pre_serialize_value = Some(Box::new(hook));
        self
    }

    pub fn factory_function(mut self, yes: bool) -> Self {
        self.is_factory_function = yes;
        self
    }

    pub fn strict(mut self, yes: bool) -> Self {
        self.strict = yes;
        self
    }
}

/// Runs one pipeline phase over a function's parse, re-parsing and
/// shape-checking after every rewrite that reports a change.
pub(crate) fn apply_rewrites<T: SerializeTracer>(
    mut ast: FunctionAst,
    rewrites: &[Box<dyn SourceRewrite>],
    phase: &'static str,
    tracer: &mut T,
) -> Result<FunctionAst, SerializeErrorKind> {
    for rewrite in rewrites {
        match rewrite.rewrite(&ast) {
            Ok(Some(new_source)) => {
                tracer.rewrite(phase, true);
                ast = parse_function(&new_source).map_err(|e| {
                    SerializeErrorKind::InvalidConfiguration(format!("{phase} rewrite produced an invalid function: {e}"))
                })?;
            }
            Ok(None) => tracer.rewrite(phase, false),
            Err(message) => return Err(SerializeErrorKind::InvalidConfiguration(message)),
        }
    }
    Ok(ast)
}
