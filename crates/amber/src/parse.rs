use swc_common::{BytePos, Span};
use swc_ecma_ast::{Decl, EsVersion, Expr, Script, Stmt};
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, lexer::Lexer};

use crate::error::SerializeErrorKind;

/// Spans start at this offset: swc reserves `BytePos(0)` for synthesized
/// nodes, so parses begin at 1 and [`span_range`] subtracts it back out.
const SPAN_BASE: u32 = 1;

/// Converts a span from a [`parse_function`] parse into byte offsets within
/// [`FunctionAst::source`].
pub fn span_range(span: Span) -> (usize, usize) {
    (
        (span.lo.0.saturating_sub(SPAN_BASE)) as usize,
        (span.hi.0.saturating_sub(SPAN_BASE)) as usize,
    )
}

/// The normalized shape of a parsed function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    FunctionDecl,
    FunctionExpr,
    Arrow,
    ClassDecl,
    ClassExpr,
}

impl FunctionKind {
    pub fn is_class(self) -> bool {
        matches!(self, Self::ClassDecl | Self::ClassExpr)
    }
}

/// A view of the single function/class node at the root of a parse.
pub enum FunctionNode<'a> {
    FnDecl(&'a swc_ecma_ast::FnDecl),
    FnExpr(&'a swc_ecma_ast::FnExpr),
    Arrow(&'a swc_ecma_ast::ArrowExpr),
    ClassDecl(&'a swc_ecma_ast::ClassDecl),
    ClassExpr(&'a swc_ecma_ast::ClassExpr),
}

/// The parse of a single function or class.
///
/// `source` is the text that was actually handed to the parser — it may
/// differ from the engine's stringification when normalization kicked in
/// (method shorthand gets a `function ` keyword prepended, expression forms
/// that cannot stand alone get wrapped in parentheses). All spans in
/// `script`, and therefore every [`SourceEdit`], are byte offsets into this
/// text, and this text is what the emitter splices into the output module.
#[derive(Debug, Clone)]
pub struct FunctionAst {
    source: String,
    script: Script,
    kind: FunctionKind,
}

impl FunctionAst {
    /// The (possibly normalized) source text the spans refer to.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// The containing script, usable as a print/walk context.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// The root function/class node.
    pub fn node(&self) -> FunctionNode<'_> {
        let stmt = self.script.body.first().expect("validated at construction");
        match stmt {
            Stmt::Decl(Decl::Fn(f)) => FunctionNode::FnDecl(f),
            Stmt::Decl(Decl::Class(c)) => FunctionNode::ClassDecl(c),
            Stmt::Expr(expr_stmt) => match unwrap_parens(&expr_stmt.expr) {
                Expr::Fn(f) => FunctionNode::FnExpr(f),
                Expr::Arrow(a) => FunctionNode::Arrow(a),
                Expr::Class(c) => FunctionNode::ClassExpr(c),
                _ => unreachable!("validated at construction"),
            },
            _ => unreachable!("validated at construction"),
        }
    }

    /// The name in the function/class's own name position, if any.
    pub fn declared_name(&self) -> Option<String> {
        match self.node() {
            FunctionNode::FnDecl(f) => Some(f.ident.sym.to_string()),
            FunctionNode::FnExpr(f) => f.ident.as_ref().map(|i| i.sym.to_string()),
            FunctionNode::Arrow(_) => None,
            FunctionNode::ClassDecl(c) => Some(c.ident.sym.to_string()),
            FunctionNode::ClassExpr(c) => c.ident.as_ref().map(|i| i.sym.to_string()),
        }
    }
}

/// Strips any number of wrapping parentheses.
pub(crate) fn unwrap_parens(expr: &Expr) -> &Expr {
    let mut current = expr;
    while let Expr::Paren(p) = current {
        current = &p.expr;
    }
    current
}

/// Parses the source of a single function or class, normalizing the forms an
/// engine's stringification can produce.
///
/// Attempts, in order:
/// 1. a standalone parse (declarations and statement-position expressions
///    such as arrows),
/// 2. a parenthesized parse (anonymous `function () {}` / `class {}`
///    expressions, which cannot stand alone as statements),
/// 3. a retry with a leading `function ` keyword (method shorthand like
///    `foo(a) { ... }` stringifies without one), `async`-aware so that
///    `async foo() { ... }` becomes `async function foo() { ... }`.
///
/// Anything else fails with `UnparseableSource`.
pub fn parse_function(source: &str) -> Result<FunctionAst, SerializeErrorKind> {
    let trimmed = source.trim();

    let mut first_error = None;
    match parse_script_text(trimmed) {
        Ok(script) => {
            if let Some(kind) = classify(&script) {
                return Ok(FunctionAst {
                    source: trimmed.to_owned(),
                    script,
                    kind,
                });
            }
        }
        Err(message) => first_error = Some(message),
    }

    let wrapped = format!("({trimmed})");
    if let Ok(script) = parse_script_text(&wrapped)
        && let Some(kind) = classify(&script)
    {
        return Ok(FunctionAst {
            source: wrapped,
            script,
            kind,
        });
    }

    let prefixed = if let Some(rest) = trimmed.strip_prefix("async ") {
        format!("async function {rest}")
    } else {
        format!("function {trimmed}")
    };
    if let Ok(script) = parse_script_text(&prefixed)
        && let Some(kind) = classify(&script)
    {
        return Ok(FunctionAst {
            source: prefixed,
            script,
            kind,
        });
    }

    Err(SerializeErrorKind::UnparseableSource(
        first_error.unwrap_or_else(|| "source is not a single function or class".to_owned()),
    ))
}

/// Runs the swc parser over `src` as a script, treating recovered errors as
/// failures: the serializer must not emit code the parser only accepted
/// loosely.
fn parse_script_text(src: &str) -> Result<Script, String> {
    let len = u32::try_from(src.len()).map_err(|_| "source too large".to_owned())?;
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::latest(),
        StringInput::new(src, BytePos(SPAN_BASE), BytePos(SPAN_BASE + len)),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let script = parser.parse_script().map_err(|e| e.kind().msg().to_string())?;
    if let Some(error) = parser.take_errors().into_iter().next() {
        return Err(error.kind().msg().to_string());
    }
    Ok(script)
}

/// Classifies a parse as one of the accepted shapes: a lone function/class
/// declaration, or a lone expression statement wrapping a
/// function/arrow/class expression.
fn classify(script: &Script) -> Option<FunctionKind> {
    if script.body.len() != 1 {
        return None;
    }
    match &script.body[0] {
        Stmt::Decl(Decl::Fn(_)) => Some(FunctionKind::FunctionDecl),
        Stmt::Decl(Decl::Class(_)) => Some(FunctionKind::ClassDecl),
        Stmt::Expr(expr_stmt) => match unwrap_parens(&expr_stmt.expr) {
            Expr::Fn(_) => Some(FunctionKind::FunctionExpr),
            Expr::Arrow(_) => Some(FunctionKind::Arrow),
            Expr::Class(_) => Some(FunctionKind::ClassExpr),
            _ => None,
        },
        _ => None,
    }
}

/// A textual replacement of a byte range of a function's source.
///
/// Rewrites (identifier renames, heritage substitution) are expressed as
/// edits against the original text rather than AST reprinting, so untouched
/// code survives byte-for-byte.
#[derive(Debug, Clone)]
pub struct SourceEdit {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl SourceEdit {
    pub fn new(range: (usize, usize), text: impl Into<String>) -> Self {
        Self {
            start: range.0,
            end: range.1,
            text: text.into(),
        }
    }
}

/// Applies edits to `source`. Edits must not overlap; they are sorted here.
pub fn apply_edits(source: &str, mut edits: Vec<SourceEdit>) -> String {
    edits.sort_by_key(|e| e.start);
    let mut out = String::with_capacity(source.len());
    let mut pos = 0;
    for edit in edits {
        debug_assert!(edit.start >= pos, "overlapping source edits");
        debug_assert!(edit.end <= source.len(), "edit past end of source");
        out.push_str(&source[pos..edit.start]);
        out.push_str(&edit.text);
        pos = edit.end;
    }
    out.push_str(&source[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_declaration_forms() {
        let f = parse_function("function g() { return 1; }").unwrap();
        assert_eq!(f.kind(), FunctionKind::FunctionDecl);
        assert_eq!(f.declared_name().as_deref(), Some("g"));

        let c = parse_function("class A { constructor() {} }").unwrap();
        assert_eq!(c.kind(), FunctionKind::ClassDecl);
        assert_eq!(c.declared_name().as_deref(), Some("A"));
    }

    #[test]
    fn parses_expression_forms() {
        let a = parse_function("(x) => x + 1").unwrap();
        assert_eq!(a.kind(), FunctionKind::Arrow);
        assert_eq!(a.declared_name(), None);

        let anon = parse_function("function () { return 1; }").unwrap();
        assert_eq!(anon.kind(), FunctionKind::FunctionExpr);

        let class = parse_function("class { m() {} }").unwrap();
        assert_eq!(class.kind(), FunctionKind::ClassExpr);
    }

    #[test]
    fn normalizes_method_shorthand() {
        let m = parse_function("foo(a, b) { return a + b; }").unwrap();
        assert_eq!(m.kind(), FunctionKind::FunctionDecl);
        assert_eq!(m.declared_name().as_deref(), Some("foo"));
        assert!(m.source().starts_with("function foo"));

        let am = parse_function("async foo() { return 1; }").unwrap();
        assert_eq!(am.kind(), FunctionKind::FunctionDecl);
        assert!(am.source().starts_with("async function foo"));
    }

    #[test]
    fn rejects_non_functions() {
        assert!(parse_function("const x = 1;").is_err());
        assert!(parse_function("1 + 2").is_err());
        assert!(parse_function("function f() { oops").is_err());
    }

    #[test]
    fn edits_apply_in_order() {
        let out = apply_edits(
            "abc def ghi",
            vec![SourceEdit::new((8, 11), "GHI"), SourceEdit::new((0, 3), "ABC")],
        );
        assert_eq!(out, "ABC def GHI");
    }
}
