use std::sync::Arc;

use tracing::trace;

use crate::backtrace::Backtrace;
use crate::compiler::Compiler;
use crate::ctx::{Ctx, CtxRef};
use crate::error::{ErrorKind, QuillError};
use crate::forms::{clause_head, symbol_name};
use crate::interpreter::Interpreter;
use crate::node::{eval_body, Code, Node, Params};
use crate::syntax::{Span, Syntax};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClauseKind {
    Catch,
    Finally,
}

fn clause_kind(form: &Syntax) -> Option<ClauseKind> {
    match clause_head(form)?.as_str() {
        "CATCH" => Some(ClauseKind::Catch),
        "FINALLY" => Some(ClauseKind::Finally),
        _ => None,
    }
}

struct CatchClause {
    kind: ErrorKind,
    var: String,
    body: Vec<Node>,
}

struct TryParts {
    body: Vec<Node>,
    catches: Vec<CatchClause>,
    finally: Option<Vec<Node>>,
}

#[derive(Default)]
pub struct Try {
    parts: Params<TryParts>,
}

fn split_clauses(params: &[Syntax]) -> Result<(&[Syntax], &[Syntax], Option<&Syntax>), QuillError> {
    let mut end = params.len();
    let mut finally = None;
    if end > 0 && clause_kind(&params[end - 1]) == Some(ClauseKind::Finally) {
        finally = Some(&params[end - 1]);
        end -= 1;
    }
    let mut start = end;
    while start > 0 && clause_kind(&params[start - 1]) == Some(ClauseKind::Catch) {
        start -= 1;
    }
    for form in &params[..start] {
        if let Some(kind) = clause_kind(form) {
            let msg = match kind {
                ClauseKind::Catch => "CATCH must follow the body of TRY",
                ClauseKind::Finally if finally.is_some() => "TRY accepts a single FINALLY clause",
                ClauseKind::Finally => "FINALLY must be the last clause of TRY",
            };
            return Err(QuillError::compile_at(form.span, msg));
        }
    }
    Ok((&params[..start], &params[start..end], finally))
}

fn compile_catch(compiler: &Compiler<'_>, clause: &Syntax) -> Result<CatchClause, QuillError> {
    let items = clause.as_list().unwrap_or_default();
    if items.len() < 3 {
        return Err(QuillError::compile_at(
            clause.span,
            "CATCH clause must be (CATCH Kind var body...)",
        ));
    }
    let kind_name = symbol_name(&items[1], "exception kind")?;
    let kind = ErrorKind::from_name(&kind_name).ok_or_else(|| {
        QuillError::compile_at(items[1].span, format!("unknown exception kind {}", kind_name))
    })?;
    Ok(CatchClause {
        kind,
        var: symbol_name(&items[2], "CATCH variable")?,
        body: compiler.compile_all(&items[3..])?,
    })
}

impl Try {
    fn handle(
        &self,
        parts: &TryParts,
        err: QuillError,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let Some(kind) = err.kind() else {
            return Err(err);
        };
        let Some(clause) = parts.catches.iter().find(|c| kind.is_a(c.kind)) else {
            return Err(err);
        };
        trace!(caught = %kind, clause = %clause.kind, "exception caught");
        let scope = Ctx::new_child(ctx);
        scope.define(&clause.var, Value::Error(Arc::new(err)))?;
        eval_body(&clause.body, rt, bt, &scope)
    }
}

impl Code for Try {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let parts = self.parts.get()?;
        let outcome = match eval_body(&parts.body, rt, bt, ctx) {
            Err(err) => self.handle(parts, err, rt, bt, ctx),
            ok => ok,
        };
        if let Some(finally) = &parts.finally {
            eval_body(finally, rt, bt, ctx)?;
        }
        outcome
    }

    fn set_raw_params(
        &mut self,
        compiler: &Compiler<'_>,
        params: &[Syntax],
        span: Span,
    ) -> Result<(), QuillError> {
        let (body, catches, finally) = split_clauses(params)?;
        let catches = catches
            .iter()
            .map(|clause| compile_catch(compiler, clause))
            .collect::<Result<Vec<_>, _>>()?;
        let finally = match finally {
            Some(clause) => Some(compiler.compile_all(&clause.as_list().unwrap_or_default()[1..])?),
            None => None,
        };
        let parts = TryParts {
            body: compiler.compile_all(body)?,
            catches,
            finally,
        };
        self.parts.set(parts, span)
    }
}
