//! The closure emitter.
//!
//! Turns one function record into a single top-level declaration whose right
//! side evaluates to the re-hydrated function. Free variables are re-bound
//! by wrapping the original function expression in an immediately-invoked
//! arrow whose parameters carry the captured values back into scope:
//!
//! ```text
//! var v1 = ((_self, _super, a, b) => function inner(x) { /* body */ }.bind(_self))(
//!     <this>, <super>, <a>, <b>);
//! ```
//!
//! The function's own text is spliced from its (possibly rewritten) source;
//! the only surgery performed on it is by span edits — heritage substitution
//! for classes with an altered meta-prototype, and renames of locals that
//! collide with an injected free-variable parameter. Free-variable names are
//! authoritative and never renamed.

use swc_common::Spanned;

use crate::{
    analyze::{Analysis, CaptureResolver, analyze},
    error::{SerializeError, SerializeErrorKind},
    function::{BoundInternals, FunctionData},
    graph::ModuleBuilder,
    heap::{HeapData, HeapId, Proto},
    names::{SELF_BASE, SUPER_BASE, VALUE_PREFIX},
    parse::{FunctionAst, FunctionNode, SourceEdit, apply_edits, parse_function, span_range},
    tracer::SerializeTracer,
    transform::apply_rewrites,
    value::JsValue,
};

/// Injected parameter base name for re-applied bound arguments.
const ARG_BASE: &str = "_arg";

impl<R: CaptureResolver, T: SerializeTracer> ModuleBuilder<'_, R, T> {
    /// Emits a function value, returning its identifier.
    pub(crate) fn emit_function(&mut self, id: HeapId, data: &FunctionData) -> Result<String, SerializeError> {
        let display_name = if data.name.is_empty() {
            "<anonymous>".to_owned()
        } else {
            data.name.clone()
        };
        self.function_stack.push(display_name);
        let result = if let Some(bound) = &data.bound {
            self.emit_bound(id, bound)
        } else {
            self.emit_plain(id, data)
        };
        self.function_stack.pop();
        result
    }

    fn emit_plain(&mut self, id: HeapId, data: &FunctionData) -> Result<String, SerializeError> {
        if data.is_native() {
            return Err(self.err(SerializeErrorKind::NativeFunctionUnsupported));
        }

        let (ast, analysis) = self.parse_and_analyze(data)?;
        let captures = self.resolve_captures(data, &analysis)?;

        let ident = self.names.next_name(VALUE_PREFIX);
        self.cache.insert(id, ident.clone());

        // heritage substitution applies when the class's own prototype was
        // altered away from what its source reproduces
        let super_binding = if ast.kind().is_class()
            && matches!(data.meta_proto, Proto::Explicit(_))
            && class_heritage_span(&ast).is_some()
        {
            Some(self.names.tail_name(SUPER_BASE))
        } else {
            None
        };

        let mut edits = Vec::new();
        if let Some(super_name) = &super_binding {
            let span = class_heritage_span(&ast).expect("checked above");
            edits.push(SourceEdit::new(span, super_name.clone()));
        }
        self.rename_collisions(&analysis, &captures, &mut edits);
        let body = apply_edits(ast.source(), edits);

        let mut params: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(super_name) = &super_binding {
            let Proto::Explicit(meta) = &data.meta_proto else {
                unreachable!("super binding implies an explicit meta-prototype")
            };
            self.check_proto_chain(id)?;
            self.push_path(".<prototype>".to_owned());
            let expr = self.serialize_value(meta)?;
            self.pop_path();
            params.push(super_name.clone());
            args.push(expr);
        }
        for (name, value) in &captures {
            self.push_path(format!(".<capture {name}>"));
            let expr = self.serialize_value(value)?;
            self.pop_path();
            params.push(name.clone());
            args.push(expr);
        }

        let declaration = if params.is_empty() {
            format!("var {ident} = {body};")
        } else {
            format!("var {ident} = (({}) => {body})({});", params.join(", "), args.join(", "))
        };
        self.preamble.push(declaration);

        if let Some(prototype) = &data.prototype {
            self.push_path(".prototype".to_owned());
            let expr = self.serialize_value(prototype)?;
            self.postamble.push(format!("{ident}.prototype = {expr};"));
            self.pop_path();
        }
        // classes with substituted heritage get their meta-prototype from
        // the extends clause; everything else is wired explicitly
        if super_binding.is_none() {
            self.emit_proto(id, &ident, &data.meta_proto)?;
        }

        Ok(ident)
    }

    /// Emits a bound function. The wrapped target is re-hydrated and
    /// `.bind` is re-applied with the serialized receiver and leading
    /// arguments.
    fn emit_bound(&mut self, id: HeapId, bound: &BoundInternals) -> Result<String, SerializeError> {
        if let Some((_, target)) = self.function_data(&bound.target)
            && target.bound.is_none()
            && !target.is_native()
        {
            return self.emit_bound_folded(id, target, bound);
        }

        // target is itself bound, native-but-whitelisted, or not a plain
        // function record: serialize it on its own and rebind by reference
        let ident = self.names.next_name(VALUE_PREFIX);
        self.cache.insert(id, ident.clone());
        self.push_path(".<bound target>".to_owned());
        let target_expr = self.serialize_value(&bound.target)?;
        self.pop_path();
        let bind_args = self.serialize_bound_args(bound)?;
        self.preamble
            .push(format!("var {ident} = {target_expr}.bind({});", bind_args.join(", ")));
        Ok(ident)
    }

    /// The single-declaration shape: the target's source is wrapped so its
    /// free variables re-enter scope, and the receiver rides in through a
    /// minted `_self` parameter.
    fn emit_bound_folded(
        &mut self,
        id: HeapId,
        target: &FunctionData,
        bound: &BoundInternals,
    ) -> Result<String, SerializeError> {
        let (ast, analysis) = self.parse_and_analyze(target)?;
        let captures = self.resolve_captures(target, &analysis)?;

        let ident = self.names.next_name(VALUE_PREFIX);
        self.cache.insert(id, ident.clone());

        let self_name = self.names.tail_name(SELF_BASE);
        let mut arg_names = Vec::with_capacity(bound.args.len());
        for _ in &bound.args {
            arg_names.push(self.names.tail_name(ARG_BASE));
        }

        let mut edits = Vec::new();
        self.rename_collisions(&analysis, &captures, &mut edits);
        let body = apply_edits(ast.source(), edits);

        let mut params = vec![self_name.clone()];
        params.extend(arg_names.iter().cloned());
        let mut args = self.serialize_bound_args(bound)?;
        for (name, value) in &captures {
            self.push_path(format!(".<capture {name}>"));
            let expr = self.serialize_value(value)?;
            self.pop_path();
            params.push(name.clone());
            args.push(expr);
        }

        let mut bind_call = self_name;
        for arg_name in &arg_names {
            bind_call.push_str(", ");
            bind_call.push_str(arg_name);
        }
        self.preamble.push(format!(
            "var {ident} = (({}) => ({body}).bind({bind_call}))({});",
            params.join(", "),
            args.join(", ")
        ));
        Ok(ident)
    }

    /// Serializes a bound receiver and leading arguments, in call order.
    fn serialize_bound_args(&mut self, bound: &BoundInternals) -> Result<Vec<String>, SerializeError> {
        let mut out = Vec::with_capacity(1 + bound.args.len());
        self.push_path(".<bound this>".to_owned());
        out.push(self.serialize_value(&bound.this)?);
        self.pop_path();
        for (index, arg) in bound.args.iter().enumerate() {
            self.push_path(format!(".<bound arg {index}>"));
            out.push(self.serialize_value(arg)?);
            self.pop_path();
        }
        Ok(out)
    }

    /// Parses a function's source, runs the pre-process rewrites, analyzes
    /// free variables, runs the post-process rewrites, and seeds the name
    /// allocator's exclusion set. When a post-process rewrite changed the
    /// source, occurrence spans are re-derived from the final text.
    fn parse_and_analyze(&mut self, data: &FunctionData) -> Result<(FunctionAst, Analysis), SerializeError> {
        let ast = match parse_function(&data.source) {
            Ok(ast) => ast,
            Err(kind) => return Err(self.err(kind)),
        };
        let ast = match apply_rewrites(ast, &self.options.pre_process, "pre-process", &mut *self.tracer) {
            Ok(ast) => ast,
            Err(kind) => return Err(self.err(kind)),
        };
        let analysis = analyze(&ast);
        let ast = match apply_rewrites(ast, &self.options.post_process, "post-process", &mut *self.tracer) {
            Ok(ast) => ast,
            Err(kind) => return Err(self.err(kind)),
        };
        let analysis = if self.options.post_process.is_empty() {
            analysis
        } else {
            // keep the pre-rewrite free list, refresh spans and identifiers
            let mut refreshed = analyze(&ast);
            refreshed.free = analysis.free;
            refreshed
        };
        self.names.reserve_all(analysis.identifiers.iter().cloned());
        self.names.reserve_all(analysis.free.iter().cloned());
        Ok((ast, analysis))
    }

    /// Resolves the analyzer's free names to values. Names bound to
    /// whitelisted globals under their own name are dropped (the body
    /// reference already points at the target environment's global);
    /// unresolvable names are left in place unless strict mode is on.
    fn resolve_captures(
        &mut self,
        data: &FunctionData,
        analysis: &Analysis,
    ) -> Result<Vec<(String, JsValue)>, SerializeError> {
        let function_name = data.name.clone();
        let mut captures = Vec::new();
        for name in &analysis.free {
            let resolved = match self.resolver.resolve(self.heap, data, name) {
                Ok(resolved) => resolved,
                Err(kind) => return Err(self.err(kind)),
            };
            match resolved {
                Some(value) => {
                    self.tracer.free_variable(&function_name, name, true);
                    if let JsValue::Ref(id) = &value
                        && let HeapData::Global(global_name) = self.heap.get(*id)
                        && global_name == name
                    {
                        continue;
                    }
                    captures.push((name.clone(), value));
                }
                None => {
                    self.tracer.free_variable(&function_name, name, false);
                    if self.options.strict {
                        return Err(self.err(SerializeErrorKind::UnresolvedFreeVariable(name.clone())));
                    }
                }
            }
        }
        Ok(captures)
    }

    /// Free-variable parameter names are authoritative: body identifiers
    /// that resolved to a local of the same text are renamed out of the way.
    fn rename_collisions(&mut self, analysis: &Analysis, captures: &[(String, JsValue)], edits: &mut Vec<SourceEdit>) {
        for (name, _) in captures {
            let Some(occurrences) = analysis.bound_occurrences.get(name) else {
                continue;
            };
            if occurrences.is_empty() {
                continue;
            }
            let replacement = self.names.next_name(&format!("{name}_"));
            for occurrence in occurrences {
                let text = if occurrence.shorthand {
                    format!("{name}: {replacement}")
                } else {
                    replacement.clone()
                };
                edits.push(SourceEdit::new((occurrence.start, occurrence.end), text));
            }
        }
    }
}

/// The byte range of a class's heritage-clause target expression, when the
/// root node is a class with one.
fn class_heritage_span(ast: &FunctionAst) -> Option<(usize, usize)> {
    let class = match ast.node() {
        FunctionNode::ClassDecl(decl) => &decl.class,
        FunctionNode::ClassExpr(expr) => &expr.class,
        _ => return None,
    };
    class.super_class.as_ref().map(|expr| span_range(expr.span()))
}
