use std::fmt;
use std::sync::Arc;

use crate::backtrace::{Backtrace, Frame};
use crate::compiler::Compiler;
use crate::ctx::CtxRef;
use crate::error::QuillError;
use crate::interpreter::Interpreter;
use crate::syntax::{Span, Syntax};
use crate::value::Value;

// Remaining host stack below which evaluation moves to a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Behaviour behind a compiled node.
///
/// Special forms receive their raw syntax through [`Code::set_raw_params`];
/// expression builtins receive compiled children through [`Code::set_params`].
/// Either is called at most once per instance.
pub trait Code: Send + Sync {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError>;

    fn set_raw_params(
        &mut self,
        _compiler: &Compiler<'_>,
        _params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        Err(QuillError::compile_at(span, "form does not take raw parameters"))
    }

    fn set_params(&mut self, _params: Vec<Node>, span: Span) -> Result<(), QuillError> {
        Err(QuillError::compile_at(
            span,
            "expression does not take compiled parameters",
        ))
    }

    fn constant(&self) -> Option<&Value> {
        None
    }
}

pub struct Params<T>(Option<T>);

impl<T> Default for Params<T> {
    fn default() -> Self {
        Params(None)
    }
}

impl<T> Params<T> {
    pub fn set(&mut self, value: T, span: Span) -> Result<(), QuillError> {
        if self.0.is_some() {
            return Err(QuillError::illegal_state("parameters are already set").with_span(span));
        }
        self.0 = Some(value);
        Ok(())
    }

    pub fn get(&self) -> Result<&T, QuillError> {
        self.0
            .as_ref()
            .ok_or_else(|| QuillError::illegal_state("node evaluated before its parameters were set"))
    }
}

#[derive(Clone)]
pub struct Node {
    code: Arc<dyn Code>,
    name: Arc<str>,
    span: Option<Span>,
}

impl Node {
    pub fn new(code: impl Code + 'static, name: impl Into<Arc<str>>, span: Option<Span>) -> Self {
        Self {
            code: Arc::new(code),
            name: name.into(),
            span,
        }
    }

    pub fn from_boxed(code: Box<dyn Code>, name: impl Into<Arc<str>>, span: Option<Span>) -> Self {
        Self {
            code: Arc::from(code),
            name: name.into(),
            span,
        }
    }

    pub fn literal(value: Value, span: Option<Span>) -> Self {
        let name = value.repr();
        Self::new(Literal(value), name, span)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    pub fn constant(&self) -> Option<&Value> {
        self.code.constant()
    }

    /// Runs the node inside its own backtrace frame. Failures leave with this
    /// node's position and a snapshot of the stack unless an inner node already
    /// attached them.
    pub fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        bt.push(
            Frame::new(self.name.clone(), self.span, ctx.clone()),
            rt.options().max_depth,
        )?;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.code.evaluate(rt, bt, ctx)
        })
        .map_err(|err| {
            let err = match self.span {
                Some(span) => err.with_span(span),
                None => err,
            };
            err.with_backtrace(bt)
        });
        bt.pop();
        result
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "#<node {} @{}>", self.name, span),
            None => write!(f, "#<node {}>", self.name),
        }
    }
}

pub struct Literal(pub Value);

impl Code for Literal {
    fn evaluate(&self, _: &Interpreter, _: &mut Backtrace, _: &CtxRef) -> Result<Value, QuillError> {
        Ok(self.0.clone())
    }

    fn constant(&self) -> Option<&Value> {
        Some(&self.0)
    }
}

pub struct VarRef {
    pub name: String,
}

impl Code for VarRef {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        ctx.get(&self.name, rt, bt)
    }
}

pub fn eval_body(
    body: &[Node],
    rt: &Interpreter,
    bt: &mut Backtrace,
    ctx: &CtxRef,
) -> Result<Value, QuillError> {
    let mut last = Value::Nil;
    for node in body {
        last = node.evaluate(rt, bt, ctx)?;
    }
    Ok(last)
}
