use crate::backtrace::Backtrace;
use crate::compiler::Compiler;
use crate::ctx::{Ctx, CtxRef};
use crate::error::{ErrorKind, QuillError};
use crate::forms::{expect_args, symbol_name};
use crate::interpreter::{BuiltinKind, Interpreter};
use crate::node::{eval_body, Code, Node, Params};
use crate::syntax::{Span, Syntax, SyntaxKind};
use crate::value::Value;

#[derive(Default)]
pub struct Quote {
    value: Params<Value>,
}

impl Code for Quote {
    fn evaluate(&self, _: &Interpreter, _: &mut Backtrace, _: &CtxRef) -> Result<Value, QuillError> {
        Ok(self.value.get()?.clone())
    }

    fn set_raw_params(
        &mut self,
        _: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("QUOTE", params, span, 1, Some(1))?;
        self.value.set(params[0].to_value(), span)
    }

    fn constant(&self) -> Option<&Value> {
        self.value.get().ok()
    }
}

#[derive(Default)]
pub struct Progn {
    body: Params<Vec<Node>>,
}

impl Code for Progn {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        eval_body(self.body.get()?, rt, bt, ctx)
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        self.body.set(compiler.compile_all(params)?, span)
    }
}

struct IfParts {
    test: Node,
    then: Node,
    otherwise: Vec<Node>,
}

#[derive(Default)]
pub struct If {
    parts: Params<IfParts>,
}

impl Code for If {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let parts = self.parts.get()?;
        if parts.test.evaluate(rt, bt, ctx)?.is_truthy() {
            parts.then.evaluate(rt, bt, ctx)
        } else {
            eval_body(&parts.otherwise, rt, bt, ctx)
        }
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("IF", params, span, 2, None)?;
        let parts = IfParts {
            test: compiler.compile(&params[0])?,
            then: compiler.compile(&params[1])?,
            otherwise: compiler.compile_all(&params[2..])?,
        };
        self.parts.set(parts, span)
    }
}

#[derive(Default)]
pub struct Cond {
    clauses: Params<Vec<(Node, Vec<Node>)>>,
}

impl Code for Cond {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        for (test, body) in self.clauses.get()? {
            let value = test.evaluate(rt, bt, ctx)?;
            if !value.is_truthy() {
                continue;
            }
            if body.is_empty() {
                return Ok(value);
            }
            return eval_body(body, rt, bt, ctx);
        }
        Ok(Value::Nil)
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        let mut clauses = Vec::with_capacity(params.len());
        for clause in params {
            let items = match clause.as_list() {
                Some(items) if !items.is_empty() => items,
                _ => {
                    return Err(QuillError::compile_at(
                        clause.span,
                        format!("COND clause must be (test body...), got {}", clause),
                    ));
                }
            };
            clauses.push((compiler.compile(&items[0])?, compiler.compile_all(&items[1..])?));
        }
        self.clauses.set(clauses, span)
    }
}

struct Guarded {
    test: Node,
    body: Vec<Node>,
}

fn compile_guarded(
    form: &str,
    compiler: &Compiler<'_>,
    params: &[Syntax],
    span: Span,
) -> Result<Guarded, QuillError> {
    expect_args(form, params, span, 1, None)?;
    Ok(Guarded {
        test: compiler.compile(&params[0])?,
        body: compiler.compile_all(&params[1..])?,
    })
}

#[derive(Default)]
pub struct When {
    parts: Params<Guarded>,
}

impl Code for When {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let parts = self.parts.get()?;
        if parts.test.evaluate(rt, bt, ctx)?.is_truthy() {
            eval_body(&parts.body, rt, bt, ctx)
        } else {
            Ok(Value::Nil)
        }
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        self.parts.set(compile_guarded("WHEN", compiler, params, span)?, span)
    }
}

#[derive(Default)]
pub struct Unless {
    parts: Params<Guarded>,
}

impl Code for Unless {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let parts = self.parts.get()?;
        if parts.test.evaluate(rt, bt, ctx)?.is_truthy() {
            Ok(Value::Nil)
        } else {
            eval_body(&parts.body, rt, bt, ctx)
        }
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        self.parts.set(compile_guarded("UNLESS", compiler, params, span)?, span)
    }
}

#[derive(Default)]
pub struct And {
    items: Params<Vec<Node>>,
}

impl Code for And {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let mut last = Value::Bool(true);
        for item in self.items.get()? {
            last = item.evaluate(rt, bt, ctx)?;
            if !last.is_truthy() {
                break;
            }
        }
        Ok(last)
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        self.items.set(compiler.compile_all(params)?, span)
    }
}

#[derive(Default)]
pub struct Or {
    items: Params<Vec<Node>>,
}

impl Code for Or {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        for item in self.items.get()? {
            let value = item.evaluate(rt, bt, ctx)?;
            if value.is_truthy() {
                return Ok(value);
            }
        }
        Ok(Value::Nil)
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        self.items.set(compiler.compile_all(params)?, span)
    }
}

#[derive(Default)]
pub struct While {
    parts: Params<Guarded>,
}

impl Code for While {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let parts = self.parts.get()?;
        let mut last = Value::Nil;
        while parts.test.evaluate(rt, bt, ctx)?.is_truthy() {
            last = eval_body(&parts.body, rt, bt, ctx)?;
        }
        Ok(last)
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        self.parts.set(compile_guarded("WHILE", compiler, params, span)?, span)
    }
}

struct ForeachParts {
    var: String,
    source: Node,
    result: Option<Node>,
    body: Vec<Node>,
}

#[derive(Default)]
pub struct Foreach {
    parts: Params<ForeachParts>,
}

fn elements(source: &Value) -> Result<Vec<Value>, QuillError> {
    match source {
        Value::Nil => Ok(Vec::new()),
        Value::List(items) => Ok(items.iter().cloned().collect()),
        Value::String(s) => Ok(s.chars().map(Value::Char).collect()),
        Value::Map(map) => Ok(map.values().cloned().collect()),
        Value::Object(obj) => obj
            .iter()
            .map(|iter| iter.collect())
            .ok_or_else(|| QuillError::type_mismatch("sequence", source)),
        other => Err(QuillError::type_mismatch("sequence", other)),
    }
}

impl Code for Foreach {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let parts = self.parts.get()?;
        let source = parts.source.evaluate(rt, bt, ctx)?;
        let scope = Ctx::new_child(ctx);
        scope.set_local(&parts.var, Value::Nil);
        for item in elements(&source)? {
            scope.set_local(&parts.var, item);
            eval_body(&parts.body, rt, bt, &scope)?;
        }
        scope.set_local(&parts.var, Value::Nil);
        match &parts.result {
            Some(result) => result.evaluate(rt, bt, &scope),
            None => Ok(Value::Nil),
        }
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("FOREACH", params, span, 1, None)?;
        let header = match params[0].as_list() {
            Some(items) if (2..=3).contains(&items.len()) => items,
            _ => {
                return Err(QuillError::compile_at(
                    params[0].span,
                    "FOREACH header must be (var source [result])",
                ));
            }
        };
        let parts = ForeachParts {
            var: symbol_name(&header[0], "FOREACH variable")?,
            source: compiler.compile(&header[1])?,
            result: header.get(2).map(|r| compiler.compile(r)).transpose()?,
            body: compiler.compile_all(&params[1..])?,
        };
        self.parts.set(parts, span)
    }
}

#[derive(Default)]
pub struct Return {
    value: Params<Option<Node>>,
}

impl Code for Return {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let value = match self.value.get()? {
            Some(node) => node.evaluate(rt, bt, ctx)?,
            None => Value::Nil,
        };
        Err(QuillError::Return(value))
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("RETURN", params, span, 0, Some(1))?;
        let value = params.first().map(|p| compiler.compile(p)).transpose()?;
        self.value.set(value, span)
    }
}

struct ThrowParts {
    kind: ErrorKind,
    message: Node,
}

#[derive(Default)]
pub struct Throw {
    parts: Params<ThrowParts>,
}

impl Code for Throw {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let parts = self.parts.get()?;
        match parts.message.evaluate(rt, bt, ctx)? {
            Value::String(message) => Err(QuillError::thrown(parts.kind, message, None)),
            Value::Error(original) => Err(original.as_ref().clone()),
            other => Err(QuillError::thrown(parts.kind, other.to_string(), Some(other))),
        }
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("THROW", params, span, 1, Some(2))?;
        let (kind, message) = match params {
            [kind, message] => {
                let name = symbol_name(kind, "exception kind")?;
                let kind = ErrorKind::from_name(&name).ok_or_else(|| {
                    QuillError::compile_at(kind.span, format!("unknown exception kind {}", name))
                })?;
                (kind, message)
            }
            _ => (ErrorKind::RuntimeException, &params[0]),
        };
        let parts = ThrowParts {
            kind,
            message: compiler.compile(message)?,
        };
        self.parts.set(parts, span)
    }
}

const PIPE_VAR: &str = "->%value";

struct PipeParts {
    init: Node,
    steps: Vec<Node>,
}

#[derive(Default)]
pub struct Pipe {
    parts: Params<PipeParts>,
}

fn pipe_position(rt: &Interpreter, head: &str, arg_count: usize) -> usize {
    let Some(BuiltinKind::Function(callable)) = rt.lookup(head).map(|b| b.kind) else {
        return 0;
    };
    let spec = callable.spec();
    let Some(idx) = spec.pipe_index() else {
        return 0;
    };
    if spec.descriptors()[..idx].iter().all(|d| d.role.is_positional()) {
        idx.min(arg_count)
    } else {
        0
    }
}

fn pipe_step(rt: &Interpreter, step: &Syntax) -> Result<Syntax, QuillError> {
    let slot = Syntax::symbol(PIPE_VAR, step.span);
    match &step.kind {
        SyntaxKind::Leaf(Value::Symbol(_)) => Ok(Syntax::list(vec![step.clone(), slot], step.span)),
        SyntaxKind::List {
            items,
            literal: false,
        } if !items.is_empty() => {
            let mut items = items.clone();
            let position = match items[0].as_symbol() {
                Some(head) => pipe_position(rt, head, items.len() - 1),
                None => 0,
            };
            items.insert(position + 1, slot);
            Ok(Syntax::list(items, step.span))
        }
        _ => Err(QuillError::compile_at(
            step.span,
            format!("-> step must be a symbol or a call, got {}", step),
        )),
    }
}

impl Code for Pipe {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let parts = self.parts.get()?;
        let mut value = parts.init.evaluate(rt, bt, ctx)?;
        for step in &parts.steps {
            let scope = Ctx::new_child(ctx);
            scope.set_local(PIPE_VAR, value);
            value = step.evaluate(rt, bt, &scope)?;
        }
        Ok(value)
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("->", params, span, 1, None)?;
        let rt = compiler.interpreter();
        let mut steps = Vec::with_capacity(params.len() - 1);
        for step in &params[1..] {
            steps.push(compiler.compile(&pipe_step(rt, step)?)?);
        }
        let parts = PipeParts {
            init: compiler.compile(&params[0])?,
            steps,
        };
        self.parts.set(parts, span)
    }
}
