//! Free-variable analysis over a parsed function.
//!
//! A single depth-first traversal walks the function body in evaluation
//! order, threading a stack of lexical scope frames. Bindings enter frames
//! the way the language introduces them: function declarations and bare
//! `var` names hoist to the top of their block, `let`/`const`/`class`
//! bindings take effect only after their declaration is visited (so
//! right-hand sides see the pre-declaration scope), parameters and catch
//! clauses bind their own frames.
//!
//! An identifier occurrence is a free variable iff it is a true value
//! reference — not a declaration name, not a member-access property, not an
//! object-literal key, not a label — and no frame on the stack binds its
//! text at that point.

use ahash::{AHashMap, AHashSet};
use swc_ecma_ast::{
    AssignTarget, AssignTargetPat, BlockStmtOrExpr, Callee, Class, ClassMember, Decl, Expr, ForHead, Function, Ident,
    MemberProp, ObjectPatProp, ParamOrTsParamProp, Pat, Prop, PropName, PropOrSpread, SimpleAssignTarget, Stmt,
    SuperProp, VarDeclKind, VarDeclOrExpr, VarDeclarator,
};

use crate::{
    error::SerializeErrorKind,
    function::FunctionData,
    heap::Heap,
    parse::{FunctionAst, FunctionNode, span_range},
    value::JsValue,
};

/// One identifier occurrence, as a byte range of the analyzed source.
///
/// `shorthand` marks object shorthand positions (`{ x }` in literals and
/// patterns), where a rename must expand to `x: <new>` instead of replacing
/// the text in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub start: usize,
    pub end: usize,
    pub shorthand: bool,
}

/// What the analyzer learned about one function body.
#[derive(Debug, Default)]
pub struct Analysis {
    /// Free variable names, deduplicated, in first-occurrence order.
    pub free: Vec<String>,
    /// Every identifier text seen anywhere in the body (bindings,
    /// references, property names). Seeds the name allocator's exclusion
    /// set.
    pub identifiers: AHashSet<String>,
    /// Occurrences of identifiers that resolved to a local binding, keyed by
    /// name. Consulted when a free-variable parameter would collide with a
    /// local of the same text: the local occurrences are the ones renamed.
    pub bound_occurrences: AHashMap<String, Vec<Occurrence>>,
}

/// Analyzes the root function of `ast`, returning its free variables.
pub fn analyze(ast: &FunctionAst) -> Analysis {
    let mut analyzer = Analyzer::default();
    match ast.node() {
        FunctionNode::FnDecl(f) => analyzer.walk_function(Some(&f.ident), &f.function),
        FunctionNode::FnExpr(f) => analyzer.walk_function(f.ident.as_ref(), &f.function),
        FunctionNode::Arrow(a) => analyzer.walk_arrow(a),
        FunctionNode::ClassDecl(c) => analyzer.walk_class(Some(&c.ident), &c.class),
        FunctionNode::ClassExpr(c) => analyzer.walk_class(c.ident.as_ref(), &c.class),
    }
    Analysis {
        free: analyzer.free,
        identifiers: analyzer.identifiers,
        bound_occurrences: analyzer.bound_occurrences,
    }
}

/// The single interface through which free-variable values are looked up.
///
/// Two implementations ship with the crate: [`ScopeChainResolver`] reads the
/// probe-fed scope chain carried by the function record, and
/// [`RegistryResolver`](crate::registry::RegistryResolver) consults the
/// closure registry when the function was annotated at load time. `Ok(None)`
/// means "not found in any enclosing scope", which is non-fatal unless the
/// caller runs in strict mode.
pub trait CaptureResolver {
    fn resolve(&self, heap: &Heap, function: &FunctionData, name: &str)
    -> Result<Option<JsValue>, SerializeErrorKind>;
}

/// Resolves captured values from the function's own scope chain, innermost
/// frame first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeChainResolver;

impl CaptureResolver for ScopeChainResolver {
    fn resolve(
        &self,
        _heap: &Heap,
        function: &FunctionData,
        name: &str,
    ) -> Result<Option<JsValue>, SerializeErrorKind> {
        Ok(function.lookup_scope(name).cloned())
    }
}

/// Traversal state: the scope-frame stack plus the accumulated results.
#[derive(Default)]
struct Analyzer {
    scopes: Vec<AHashSet<String>>,
    free: Vec<String>,
    free_set: AHashSet<String>,
    identifiers: AHashSet<String>,
    bound_occurrences: AHashMap<String, Vec<Occurrence>>,
}

impl Analyzer {
    fn push_frame(&mut self) {
        self.scopes.push(AHashSet::new());
    }

    fn pop_frame(&mut self) {
        self.scopes.pop();
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|frame| frame.contains(name))
    }

    fn note(&mut self, name: &str) {
        if !self.identifiers.contains(name) {
            self.identifiers.insert(name.to_owned());
        }
    }

    /// Introduces a binding into the innermost frame.
    fn bind(&mut self, ident: &Ident) {
        self.bind_occurrence(ident, false);
    }

    fn bind_occurrence(&mut self, ident: &Ident, shorthand: bool) {
        let name = &*ident.sym;
        self.note(name);
        let (start, end) = span_range(ident.span);
        self.bound_occurrences
            .entry(name.to_owned())
            .or_default()
            .push(Occurrence { start, end, shorthand });
        self.scopes
            .last_mut()
            .expect("binding outside any scope frame")
            .insert(name.to_owned());
    }

    /// Hoisted binding by name only (no occurrence span: the declarator
    /// visit records it).
    fn bind_hoisted(&mut self, name: &str) {
        self.note(name);
        self.scopes
            .last_mut()
            .expect("binding outside any scope frame")
            .insert(name.to_owned());
    }

    /// Records a value reference: bound occurrences are remembered for
    /// collision renaming, unbound ones become free variables.
    fn reference(&mut self, ident: &Ident, shorthand: bool) {
        let name = &*ident.sym;
        self.note(name);
        let (start, end) = span_range(ident.span);
        if self.is_bound(name) {
            self.bound_occurrences
                .entry(name.to_owned())
                .or_default()
                .push(Occurrence { start, end, shorthand });
        } else if !self.free_set.contains(name) {
            self.free_set.insert(name.to_owned());
            self.free.push(name.to_owned());
        }
    }

    // ------------------------------------------------------------------
    // Scope entries
    // ------------------------------------------------------------------

    fn walk_function(&mut self, name: Option<&Ident>, function: &Function) {
        self.push_frame();
        if let Some(ident) = name {
            self.bind(ident);
        }
        for param in &function.params {
            self.collect_pat_bindings(&param.pat);
        }
        if let Some(body) = &function.body {
            self.walk_stmts_hoisted(&body.stmts);
        }
        self.pop_frame();
    }

    fn walk_arrow(&mut self, arrow: &swc_ecma_ast::ArrowExpr) {
        self.push_frame();
        for pat in &arrow.params {
            self.collect_pat_bindings(pat);
        }
        match &*arrow.body {
            BlockStmtOrExpr::BlockStmt(block) => self.walk_stmts_hoisted(&block.stmts),
            BlockStmtOrExpr::Expr(expr) => self.walk_expr(expr),
        }
        self.pop_frame();
    }

    fn walk_class(&mut self, name: Option<&Ident>, class: &Class) {
        self.push_frame();
        if let Some(ident) = name {
            self.bind(ident);
        }
        if let Some(super_class) = &class.super_class {
            self.walk_expr(super_class);
        }
        for member in &class.body {
            match member {
                ClassMember::Constructor(ctor) => {
                    self.walk_prop_name(&ctor.key);
                    self.push_frame();
                    for param in &ctor.params {
                        if let ParamOrTsParamProp::Param(p) = param {
                            self.collect_pat_bindings(&p.pat);
                        }
                    }
                    if let Some(body) = &ctor.body {
                        self.walk_stmts_hoisted(&body.stmts);
                    }
                    self.pop_frame();
                }
                ClassMember::Method(method) => {
                    self.walk_prop_name(&method.key);
                    self.walk_function(None, &method.function);
                }
                ClassMember::PrivateMethod(method) => {
                    self.walk_function(None, &method.function);
                }
                ClassMember::ClassProp(prop) => {
                    self.walk_prop_name(&prop.key);
                    if let Some(value) = &prop.value {
                        self.walk_expr(value);
                    }
                }
                ClassMember::PrivateProp(prop) => {
                    if let Some(value) = &prop.value {
                        self.walk_expr(value);
                    }
                }
                ClassMember::StaticBlock(block) => {
                    self.push_frame();
                    self.walk_stmts_hoisted(&block.body.stmts);
                    self.pop_frame();
                }
                ClassMember::TsIndexSignature(_) | ClassMember::AutoAccessor(_) | ClassMember::Empty(_) => {}
            }
        }
        self.pop_frame();
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Walks a statement list with its block-level hoisting applied first:
    /// function declaration names and bare `var` names are in scope for the
    /// whole list.
    fn walk_stmts_hoisted(&mut self, stmts: &[Stmt]) {
        self.hoist_names(stmts);
        for stmt in stmts {
            self.walk_stmt(stmt);
        }
    }

    fn hoist_names(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Decl(Decl::Fn(f)) => {
                    let name = f.ident.sym.to_string();
                    self.bind_hoisted(&name);
                }
                Stmt::Decl(Decl::Var(var)) if var.kind == VarDeclKind::Var => {
                    for decl in &var.decls {
                        if decl.init.is_none()
                            && let Pat::Ident(binding) = &decl.name
                        {
                            let name = binding.id.sym.to_string();
                            self.bind_hoisted(&name);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                self.push_frame();
                self.walk_stmts_hoisted(&block.stmts);
                self.pop_frame();
            }
            Stmt::Empty(_) | Stmt::Debugger(_) => {}
            Stmt::With(with) => {
                self.walk_expr(&with.obj);
                self.walk_stmt(&with.body);
            }
            Stmt::Return(ret) => {
                if let Some(arg) = &ret.arg {
                    self.walk_expr(arg);
                }
            }
            Stmt::Labeled(labeled) => {
                self.note(&labeled.label.sym.to_string());
                self.walk_stmt(&labeled.body);
            }
            Stmt::Break(br) => {
                if let Some(label) = &br.label {
                    self.note(&label.sym.to_string());
                }
            }
            Stmt::Continue(cont) => {
                if let Some(label) = &cont.label {
                    self.note(&label.sym.to_string());
                }
            }
            Stmt::If(if_stmt) => {
                self.walk_expr(&if_stmt.test);
                self.walk_stmt(&if_stmt.cons);
                if let Some(alt) = &if_stmt.alt {
                    self.walk_stmt(alt);
                }
            }
            Stmt::Switch(switch) => {
                self.walk_expr(&switch.discriminant);
                self.push_frame();
                for case in &switch.cases {
                    self.hoist_names(&case.cons);
                }
                for case in &switch.cases {
                    if let Some(test) = &case.test {
                        self.walk_expr(test);
                    }
                    for stmt in &case.cons {
                        self.walk_stmt(stmt);
                    }
                }
                self.pop_frame();
            }
            Stmt::Throw(throw) => self.walk_expr(&throw.arg),
            Stmt::Try(try_stmt) => {
                self.push_frame();
                self.walk_stmts_hoisted(&try_stmt.block.stmts);
                self.pop_frame();
                if let Some(handler) = &try_stmt.handler {
                    self.push_frame();
                    if let Some(param) = &handler.param {
                        self.collect_pat_bindings(param);
                    }
                    self.walk_stmts_hoisted(&handler.body.stmts);
                    self.pop_frame();
                }
                if let Some(finalizer) = &try_stmt.finalizer {
                    self.push_frame();
                    self.walk_stmts_hoisted(&finalizer.stmts);
                    self.pop_frame();
                }
            }
            Stmt::While(while_stmt) => {
                self.walk_expr(&while_stmt.test);
                self.walk_stmt(&while_stmt.body);
            }
            Stmt::DoWhile(do_while) => {
                self.walk_stmt(&do_while.body);
                self.walk_expr(&do_while.test);
            }
            Stmt::For(for_stmt) => {
                self.push_frame();
                match &for_stmt.init {
                    Some(VarDeclOrExpr::VarDecl(var)) => self.walk_var_decl(var),
                    Some(VarDeclOrExpr::Expr(expr)) => self.walk_expr(expr),
                    None => {}
                }
                if let Some(test) = &for_stmt.test {
                    self.walk_expr(test);
                }
                if let Some(update) = &for_stmt.update {
                    self.walk_expr(update);
                }
                self.walk_stmt(&for_stmt.body);
                self.pop_frame();
            }
            Stmt::ForIn(for_in) => {
                self.push_frame();
                self.walk_expr(&for_in.right);
                self.walk_for_head(&for_in.left);
                self.walk_stmt(&for_in.body);
                self.pop_frame();
            }
            Stmt::ForOf(for_of) => {
                self.push_frame();
                self.walk_expr(&for_of.right);
                self.walk_for_head(&for_of.left);
                self.walk_stmt(&for_of.body);
                self.pop_frame();
            }
            Stmt::Decl(decl) => self.walk_decl(decl),
            Stmt::Expr(expr_stmt) => self.walk_expr(&expr_stmt.expr),
        }
    }

    fn walk_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Fn(f) => {
                // name already hoisted into the enclosing block frame
                self.bind(&f.ident);
                self.walk_function(Some(&f.ident), &f.function);
            }
            Decl::Class(c) => {
                self.walk_class(Some(&c.ident), &c.class);
                self.bind(&c.ident);
            }
            Decl::Var(var) => self.walk_var_decl(var),
            Decl::Using(using) => {
                for declarator in &using.decls {
                    self.walk_declarator(declarator);
                }
            }
            _ => {}
        }
    }

    fn walk_var_decl(&mut self, var: &swc_ecma_ast::VarDecl) {
        for declarator in &var.decls {
            self.walk_declarator(declarator);
        }
    }

    /// Right-hand side first (it sees the pre-declaration scope), then the
    /// binding pattern extends the current frame.
    fn walk_declarator(&mut self, declarator: &VarDeclarator) {
        if let Some(init) = &declarator.init {
            self.walk_expr(init);
        }
        self.collect_pat_bindings(&declarator.name);
    }

    fn walk_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::VarDecl(var) => {
                for declarator in &var.decls {
                    self.collect_pat_bindings(&declarator.name);
                }
            }
            ForHead::UsingDecl(using) => {
                for declarator in &using.decls {
                    self.collect_pat_bindings(&declarator.name);
                }
            }
            ForHead::Pat(pat) => self.walk_pat_refs(pat),
        }
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    /// Collects binding names from a declaration-position pattern into the
    /// innermost frame. Default expressions are walked with their binding
    /// already in scope.
    fn collect_pat_bindings(&mut self, pat: &Pat) {
        match pat {
            Pat::Ident(binding) => self.bind(&binding.id),
            Pat::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.collect_pat_bindings(elem);
                }
            }
            Pat::Rest(rest) => self.collect_pat_bindings(&rest.arg),
            Pat::Object(object) => {
                for prop in &object.props {
                    match prop {
                        ObjectPatProp::KeyValue(kv) => {
                            self.walk_prop_name(&kv.key);
                            self.collect_pat_bindings(&kv.value);
                        }
                        ObjectPatProp::Assign(assign) => {
                            self.bind_occurrence(&assign.key.id, true);
                            if let Some(value) = &assign.value {
                                self.walk_expr(value);
                            }
                        }
                        ObjectPatProp::Rest(rest) => self.collect_pat_bindings(&rest.arg),
                    }
                }
            }
            Pat::Assign(assign) => {
                self.collect_pat_bindings(&assign.left);
                self.walk_expr(&assign.right);
            }
            Pat::Expr(expr) => self.walk_expr(expr),
            Pat::Invalid(_) => {}
        }
    }

    /// Walks an assignment-position pattern, where identifiers are writes to
    /// existing bindings, not declarations.
    fn walk_pat_refs(&mut self, pat: &Pat) {
        match pat {
            Pat::Ident(binding) => self.reference(&binding.id, false),
            Pat::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.walk_pat_refs(elem);
                }
            }
            Pat::Rest(rest) => self.walk_pat_refs(&rest.arg),
            Pat::Object(object) => {
                for prop in &object.props {
                    match prop {
                        ObjectPatProp::KeyValue(kv) => {
                            self.walk_prop_name(&kv.key);
                            self.walk_pat_refs(&kv.value);
                        }
                        ObjectPatProp::Assign(assign) => {
                            self.reference(&assign.key.id, true);
                            if let Some(value) = &assign.value {
                                self.walk_expr(value);
                            }
                        }
                        ObjectPatProp::Rest(rest) => self.walk_pat_refs(&rest.arg),
                    }
                }
            }
            Pat::Assign(assign) => {
                self.walk_pat_refs(&assign.left);
                self.walk_expr(&assign.right);
            }
            Pat::Expr(expr) => self.walk_expr(expr),
            Pat::Invalid(_) => {}
        }
    }

    fn walk_prop_name(&mut self, key: &PropName) {
        match key {
            PropName::Ident(name) => self.note(&name.sym.to_string()),
            PropName::Computed(computed) => self.walk_expr(&computed.expr),
            PropName::Str(_) | PropName::Num(_) | PropName::BigInt(_) => {}
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => self.reference(ident, false),
            Expr::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.walk_expr(&elem.expr);
                }
            }
            Expr::Object(object) => {
                for prop in &object.props {
                    match prop {
                        PropOrSpread::Spread(spread) => self.walk_expr(&spread.expr),
                        PropOrSpread::Prop(prop) => match &**prop {
                            Prop::Shorthand(ident) => self.reference(ident, true),
                            Prop::KeyValue(kv) => {
                                self.walk_prop_name(&kv.key);
                                self.walk_expr(&kv.value);
                            }
                            Prop::Assign(assign) => {
                                self.note(&assign.key.sym.to_string());
                                self.walk_expr(&assign.value);
                            }
                            Prop::Getter(getter) => {
                                self.walk_prop_name(&getter.key);
                                self.push_frame();
                                if let Some(body) = &getter.body {
                                    self.walk_stmts_hoisted(&body.stmts);
                                }
                                self.pop_frame();
                            }
                            Prop::Setter(setter) => {
                                self.walk_prop_name(&setter.key);
                                self.push_frame();
                                self.collect_pat_bindings(&setter.param);
                                if let Some(body) = &setter.body {
                                    self.walk_stmts_hoisted(&body.stmts);
                                }
                                self.pop_frame();
                            }
                            Prop::Method(method) => {
                                self.walk_prop_name(&method.key);
                                self.walk_function(None, &method.function);
                            }
                        },
                    }
                }
            }
            Expr::Fn(f) => self.walk_function(f.ident.as_ref(), &f.function),
            Expr::Arrow(arrow) => self.walk_arrow(arrow),
            Expr::Class(c) => self.walk_class(c.ident.as_ref(), &c.class),
            Expr::Unary(unary) => self.walk_expr(&unary.arg),
            Expr::Update(update) => self.walk_expr(&update.arg),
            Expr::Bin(bin) => {
                self.walk_expr(&bin.left);
                self.walk_expr(&bin.right);
            }
            Expr::Assign(assign) => {
                self.walk_assign_target(&assign.left);
                self.walk_expr(&assign.right);
            }
            Expr::Member(member) => {
                self.walk_expr(&member.obj);
                self.walk_member_prop(&member.prop);
            }
            Expr::SuperProp(super_prop) => match &super_prop.prop {
                SuperProp::Ident(name) => self.note(&name.sym.to_string()),
                SuperProp::Computed(computed) => self.walk_expr(&computed.expr),
            },
            Expr::Cond(cond) => {
                self.walk_expr(&cond.test);
                self.walk_expr(&cond.cons);
                self.walk_expr(&cond.alt);
            }
            Expr::Call(call) => {
                match &call.callee {
                    Callee::Expr(callee) => self.walk_expr(callee),
                    Callee::Super(_) | Callee::Import(_) => {}
                }
                for arg in &call.args {
                    self.walk_expr(&arg.expr);
                }
            }
            Expr::New(new) => {
                self.walk_expr(&new.callee);
                if let Some(args) = &new.args {
                    for arg in args {
                        self.walk_expr(&arg.expr);
                    }
                }
            }
            Expr::Seq(seq) => {
                for expr in &seq.exprs {
                    self.walk_expr(expr);
                }
            }
            Expr::Tpl(tpl) => {
                for expr in &tpl.exprs {
                    self.walk_expr(expr);
                }
            }
            Expr::TaggedTpl(tagged) => {
                self.walk_expr(&tagged.tag);
                for expr in &tagged.tpl.exprs {
                    self.walk_expr(expr);
                }
            }
            Expr::Yield(yield_expr) => {
                if let Some(arg) = &yield_expr.arg {
                    self.walk_expr(arg);
                }
            }
            Expr::Await(await_expr) => self.walk_expr(&await_expr.arg),
            Expr::Paren(paren) => self.walk_expr(&paren.expr),
            Expr::OptChain(opt) => match &*opt.base {
                swc_ecma_ast::OptChainBase::Member(member) => {
                    self.walk_expr(&member.obj);
                    self.walk_member_prop(&member.prop);
                }
                swc_ecma_ast::OptChainBase::Call(call) => {
                    self.walk_expr(&call.callee);
                    for arg in &call.args {
                        self.walk_expr(&arg.expr);
                    }
                }
            },
            Expr::This(_) | Expr::MetaProp(_) | Expr::PrivateName(_) | Expr::Lit(_) | Expr::Invalid(_) => {}
            _ => {}
        }
    }

    fn walk_member_prop(&mut self, prop: &MemberProp) {
        match prop {
            MemberProp::Ident(name) => self.note(&name.sym.to_string()),
            MemberProp::Computed(computed) => self.walk_expr(&computed.expr),
            MemberProp::PrivateName(_) => {}
        }
    }

    fn walk_assign_target(&mut self, target: &AssignTarget) {
        match target {
            AssignTarget::Simple(simple) => match simple {
                SimpleAssignTarget::Ident(binding) => self.reference(&binding.id, false),
                SimpleAssignTarget::Member(member) => {
                    self.walk_expr(&member.obj);
                    self.walk_member_prop(&member.prop);
                }
                SimpleAssignTarget::SuperProp(super_prop) => {
                    if let SuperProp::Computed(computed) = &super_prop.prop {
                        self.walk_expr(&computed.expr);
                    }
                }
                SimpleAssignTarget::Paren(paren) => self.walk_expr(&paren.expr),
                SimpleAssignTarget::OptChain(opt) => match &*opt.base {
                    swc_ecma_ast::OptChainBase::Member(member) => {
                        self.walk_expr(&member.obj);
                        self.walk_member_prop(&member.prop);
                    }
                    swc_ecma_ast::OptChainBase::Call(call) => self.walk_expr(&call.callee),
                },
                _ => {}
            },
            AssignTarget::Pat(pat) => match pat {
                AssignTargetPat::Array(array) => {
                    for elem in array.elems.iter().flatten() {
                        self.walk_pat_refs(elem);
                    }
                }
                AssignTargetPat::Object(object) => {
                    for prop in &object.props {
                        match prop {
                            ObjectPatProp::KeyValue(kv) => {
                                self.walk_prop_name(&kv.key);
                                self.walk_pat_refs(&kv.value);
                            }
                            ObjectPatProp::Assign(assign) => {
                                self.reference(&assign.key.id, true);
                                if let Some(value) = &assign.value {
                                    self.walk_expr(value);
                                }
                            }
                            ObjectPatProp::Rest(rest) => self.walk_pat_refs(&rest.arg),
                        }
                    }
                }
                AssignTargetPat::Invalid(_) => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_function;

    fn free_of(source: &str) -> Vec<String> {
        analyze(&parse_function(source).unwrap()).free
    }

    #[test]
    fn params_and_locals_are_not_free() {
        assert!(free_of("(a, b) => a + b").is_empty());
        assert!(free_of("function f(x) { let y = x; return y; }").is_empty());
    }

    #[test]
    fn outer_names_are_free_in_first_occurrence_order() {
        assert_eq!(free_of("() => b + a + b"), vec!["b", "a"]);
    }

    #[test]
    fn function_own_name_is_bound() {
        assert!(free_of("function fact(n) { return n < 2 ? 1 : n * fact(n - 1); }").is_empty());
    }

    #[test]
    fn member_properties_are_not_references() {
        assert_eq!(free_of("() => obj.field.deeper"), vec!["obj"]);
        assert_eq!(free_of("() => obj[key]"), vec!["obj", "key"]);
    }

    #[test]
    fn object_keys_are_not_references_but_shorthand_is() {
        assert_eq!(free_of("() => ({ a: 1 })"), Vec::<String>::new());
        assert_eq!(free_of("() => ({ a })"), vec!["a"]);
        assert_eq!(free_of("() => ({ [k]: v })"), vec!["k", "v"]);
    }

    #[test]
    fn destructured_params_bind_all_names() {
        assert!(free_of("({ a, b: { c } }, [d, ...e]) => a + c + d + e.length").is_empty());
        assert_eq!(free_of("({ a = dflt }) => a"), vec!["dflt"]);
    }

    #[test]
    fn let_const_do_not_hoist() {
        // the reference runs before the declarator, so it sees the outer name
        assert_eq!(free_of("() => { f(x); const x = 1; }"), vec!["f", "x"]);
        // after the declarator the local wins
        assert!(free_of("() => { const x = 1; g(x); }").iter().all(|n| n != "x"));
    }

    #[test]
    fn function_declarations_hoist() {
        assert!(free_of("() => { helper(); function helper() {} }").is_empty());
        assert!(free_of("() => { if (1) { helper(); function helper() {} } }").is_empty());
    }

    #[test]
    fn bare_var_hoists() {
        assert!(free_of("() => { use(x); var x; function use(v) {} }").is_empty());
    }

    #[test]
    fn initialized_var_extends_scope_after_declarator() {
        assert_eq!(free_of("() => { h(x); var x = 1; }"), vec!["h", "x"]);
    }

    #[test]
    fn rhs_sees_pre_declaration_scope() {
        assert_eq!(free_of("() => { let x = x; }"), vec!["x"]);
    }

    #[test]
    fn catch_and_for_bindings() {
        assert!(free_of("() => { try { } catch (e) { return e; } }").is_empty());
        assert!(free_of("() => { for (const it of []) { use(it); } function use(v) {} }").is_empty());
        assert_eq!(free_of("() => { for (existing of source) {} }"), vec!["source", "existing"]);
    }

    #[test]
    fn assignments_count_as_references() {
        assert_eq!(free_of("() => { counter += 1; }"), vec!["counter"]);
        assert_eq!(free_of("() => { ({ a } = state); }"), vec!["a", "state"]);
    }

    #[test]
    fn labels_are_not_references() {
        assert!(free_of("() => { outer: for (;;) { break outer; } }").is_empty());
    }

    #[test]
    fn class_bodies_resolve_against_class_scope() {
        assert_eq!(
            free_of("class A extends Base { constructor() { super(); this.x = seed; } }"),
            vec!["Base", "seed"]
        );
        assert!(free_of("class A { static make() { return new A(); } }").is_empty());
    }

    #[test]
    fn nested_shadowing_records_bound_occurrences() {
        let analysis = analyze(&parse_function("() => { use(gx); { let gx = 1; use(gx); } }").unwrap());
        assert_eq!(analysis.free, vec!["use", "gx"]);
        // the inner let and its reference are bound occurrences, available
        // for collision renaming
        assert_eq!(analysis.bound_occurrences.get("gx").map(Vec::len), Some(2));
    }

    #[test]
    fn identifier_set_covers_properties_and_bindings() {
        let analysis = analyze(&parse_function("(p) => obj.field + p").unwrap());
        for name in ["p", "obj", "field"] {
            assert!(analysis.identifiers.contains(name), "missing {name}");
        }
    }
}
