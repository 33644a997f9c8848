use crate::backtrace::Backtrace;
use crate::compiler::Compiler;
use crate::ctx::{Ctx, CtxRef};
use crate::error::QuillError;
use crate::forms::{expect_args, symbol_name};
use crate::interpreter::Interpreter;
use crate::node::{eval_body, Code, Node, Params};
use crate::syntax::{Span, Syntax};
use crate::value::Value;

struct LetParts {
    bindings: Vec<(String, Option<Node>)>,
    body: Vec<Node>,
}

#[derive(Default)]
pub struct Let {
    parts: Params<LetParts>,
}

fn compile_binding(
    compiler: &Compiler<'_>,
    binding: &Syntax,
) -> Result<(String, Option<Node>), QuillError> {
    if binding.as_symbol().is_some() {
        return Ok((symbol_name(binding, "LET variable")?, None));
    }
    match binding.as_list() {
        Some([name]) => Ok((symbol_name(name, "LET variable")?, None)),
        Some([name, value]) => Ok((
            symbol_name(name, "LET variable")?,
            Some(compiler.compile(value)?),
        )),
        _ => Err(QuillError::compile_at(
            binding.span,
            format!("LET binding must be name or (name value), got {}", binding),
        )),
    }
}

impl Code for Let {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let parts = self.parts.get()?;
        let scope = Ctx::new_child(ctx);
        for (name, value) in &parts.bindings {
            let value = match value {
                Some(node) => node.evaluate(rt, bt, &scope)?,
                None => Value::Nil,
            };
            scope.define(name, value)?;
        }
        eval_body(&parts.body, rt, bt, &scope)
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("LET", params, span, 1, None)?;
        let Some(bindings) = params[0].as_list() else {
            return Err(QuillError::compile_at(
                params[0].span,
                "LET expects a list of bindings",
            ));
        };
        let bindings = bindings
            .iter()
            .map(|binding| compile_binding(compiler, binding))
            .collect::<Result<Vec<_>, _>>()?;
        let parts = LetParts {
            bindings,
            body: compiler.compile_all(&params[1..])?,
        };
        self.parts.set(parts, span)
    }
}

struct DletParts {
    names: Vec<String>,
    rest: Option<String>,
    source: Node,
    body: Vec<Node>,
}

#[derive(Default)]
pub struct Dlet {
    parts: Params<DletParts>,
}

impl Code for Dlet {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let parts = self.parts.get()?;
        let items = match parts.source.evaluate(rt, bt, ctx)? {
            Value::List(items) => items,
            Value::Nil => im::Vector::new(),
            other => return Err(QuillError::type_mismatch("list", &other)),
        };
        let scope = Ctx::new_child(ctx);
        for (idx, name) in parts.names.iter().enumerate() {
            scope.define(name, items.get(idx).cloned().unwrap_or(Value::Nil))?;
        }
        if let Some(rest) = &parts.rest {
            let tail = if items.len() > parts.names.len() {
                items.skip(parts.names.len())
            } else {
                im::Vector::new()
            };
            scope.define(rest, Value::List(tail))?;
        }
        eval_body(&parts.body, rt, bt, &scope)
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        expect_args("DLET", params, span, 2, None)?;
        let Some(pattern) = params[0].as_list() else {
            return Err(QuillError::compile_at(
                params[0].span,
                "DLET expects a list of names",
            ));
        };
        let mut names = Vec::with_capacity(pattern.len());
        let mut rest = None;
        let mut iter = pattern.iter();
        while let Some(item) = iter.next() {
            let name = symbol_name(item, "DLET variable")?;
            if !name.eq_ignore_ascii_case("&REST") {
                names.push(name);
                continue;
            }
            match (iter.next(), iter.next()) {
                (Some(last), None) => rest = Some(symbol_name(last, "DLET rest variable")?),
                _ => {
                    return Err(QuillError::compile_at(
                        item.span,
                        "&REST in DLET must be followed by exactly one name",
                    ));
                }
            }
        }
        let parts = DletParts {
            names,
            rest,
            source: compiler.compile(&params[1])?,
            body: compiler.compile_all(&params[2..])?,
        };
        self.parts.set(parts, span)
    }
}

fn compile_assignments(
    form: &str,
    compiler: &Compiler<'_>,
    params: &[Syntax],
    span: Span,
) -> Result<Vec<(String, Node)>, QuillError> {
    if params.is_empty() || params.len() % 2 != 0 {
        return Err(QuillError::compile_at(
            span,
            format!("{} expects name/value pairs", form),
        ));
    }
    params
        .chunks(2)
        .map(|pair| Ok((symbol_name(&pair[0], "variable")?, compiler.compile(&pair[1])?)))
        .collect()
}

#[derive(Clone, Copy)]
enum Discipline {
    Global,
    Nearest,
}

fn assign(
    pairs: &[(String, Node)],
    discipline: Discipline,
    rt: &Interpreter,
    bt: &mut Backtrace,
    ctx: &CtxRef,
) -> Result<Value, QuillError> {
    let mut last = Value::Nil;
    for (name, node) in pairs {
        last = node.evaluate(rt, bt, ctx)?;
        match discipline {
            Discipline::Global => ctx.update_global(name, last.clone()),
            Discipline::Nearest => ctx.update_nearest(name, last.clone()),
        }
    }
    Ok(last)
}

#[derive(Default)]
pub struct Setq {
    pairs: Params<Vec<(String, Node)>>,
}

impl Code for Setq {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        assign(self.pairs.get()?, Discipline::Global, rt, bt, ctx)
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        self.pairs
            .set(compile_assignments("SETQ", compiler, params, span)?, span)
    }
}

#[derive(Default)]
pub struct Setv {
    pairs: Params<Vec<(String, Node)>>,
}

impl Code for Setv {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        assign(self.pairs.get()?, Discipline::Nearest, rt, bt, ctx)
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        self.pairs
            .set(compile_assignments("SETV", compiler, params, span)?, span)
    }
}
