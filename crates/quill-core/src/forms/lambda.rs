use std::sync::Arc;

use crate::argspec::ArgSpec;
use crate::backtrace::Backtrace;
use crate::compiler::Compiler;
use crate::ctx::CtxRef;
use crate::error::QuillError;
use crate::forms::{expect_args, symbol_name};
use crate::function::{Callable, Lambda};
use crate::interpreter::Interpreter;
use crate::node::{Code, Node, Params};
use crate::syntax::{Span, Syntax, SyntaxKind};
use crate::value::Value;

struct LambdaParts {
    spec: Arc<ArgSpec>,
    doc: Option<String>,
    body: Arc<[Node]>,
}

impl LambdaParts {
    fn compile(
        compiler: &Compiler<'_>,
        params: &Syntax,
        rest: &[Syntax],
    ) -> Result<Self, QuillError> {
        let Some(items) = params.as_list() else {
            return Err(QuillError::compile_at(
                params.span,
                format!("parameter list expected, got {}", params),
            ));
        };
        let spec = Arc::new(ArgSpec::compile(compiler, items)?);
        let (doc, body) = match rest {
            [first, more @ ..] if !more.is_empty() => match &first.kind {
                SyntaxKind::Leaf(Value::String(doc)) => (Some(doc.clone()), more),
                _ => (None, rest),
            },
            _ => (None, rest),
        };
        Ok(Self {
            spec,
            doc,
            body: compiler.compile_all(body)?.into(),
        })
    }

    fn close_over(&self, name: Option<String>, ctx: &CtxRef) -> Callable {
        Callable::Lambda(Arc::new(Lambda::new(
            name,
            self.spec.clone(),
            self.body.clone(),
            ctx.clone(),
            self.doc.clone(),
        )))
    }
}

#[derive(Default)]
pub struct LambdaForm {
    parts: Params<LambdaParts>,
}

impl Code for LambdaForm {
    fn evaluate(&self, _: &Interpreter, _: &mut Backtrace, ctx: &CtxRef) -> Result<Value, QuillError> {
        Ok(Value::Function(self.parts.get()?.close_over(None, ctx)))
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("LAMBDA", params, span, 1, None)?;
        self.parts
            .set(LambdaParts::compile(compiler, &params[0], &params[1..])?, span)
    }
}

#[derive(Default)]
pub struct Defun {
    parts: Params<(String, LambdaParts)>,
}

impl Code for Defun {
    fn evaluate(
        &self,
        rt: &Interpreter,
        _: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let (name, parts) = self.parts.get()?;
        let callable = parts.close_over(Some(name.clone()), ctx);
        rt.define_function(name, callable.clone());
        Ok(Value::Function(callable))
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("DEFUN", params, span, 2, None)?;
        let name = symbol_name(&params[0], "DEFUN name")?;
        let parts = LambdaParts::compile(compiler, &params[1], &params[2..])?;
        self.parts.set((name, parts), span)
    }
}

enum FunctionTarget {
    Named(String),
    Expr(Node),
}

#[derive(Default)]
pub struct FunctionRef {
    target: Params<FunctionTarget>,
}

impl Code for FunctionRef {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        match self.target.get()? {
            FunctionTarget::Named(name) => Ok(Value::Function(rt.resolve_function(name, ctx, bt)?)),
            FunctionTarget::Expr(node) => match node.evaluate(rt, bt, ctx)? {
                value @ Value::Function(_) => Ok(value),
                other => Err(QuillError::type_mismatch("function", &other)),
            },
        }
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("FUNCTION", params, span, 1, Some(1))?;
        let target = match params[0].as_symbol() {
            Some(name) => FunctionTarget::Named(name.to_string()),
            None => FunctionTarget::Expr(compiler.compile(&params[0])?),
        };
        self.target.set(target, span)
    }
}
