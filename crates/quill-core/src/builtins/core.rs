use crate::backtrace::Backtrace;
use crate::builtins::{err, spread, NativeRecord};
use crate::ctx::CtxRef;
use crate::error::QuillError;
use crate::function::{Callable, NativeResult};
use crate::interpreter::Interpreter;
use crate::node::{Code, Node, Params};
use crate::number::Version;
use crate::syntax::Span;
use crate::value::Value;

pub(crate) static NATIVES: &[NativeRecord] = &[
    NativeRecord {
        name: "NOT",
        params: &["x"],
        doc: "True when x is nil or false.",
        func: not,
    },
    NativeRecord {
        name: "LIST",
        params: &["&REST", "items"],
        doc: "A list of the arguments.",
        func: list,
    },
    NativeRecord {
        name: "EQUAL",
        params: &["a", "b"],
        doc: "True when a and b are structurally equal.",
        func: equal,
    },
    NativeRecord {
        name: "VERSION",
        params: &["text"],
        doc: "Parses a dotted version such as \"1.2.3\".",
        func: version,
    },
    NativeRecord {
        name: "ERROR-MESSAGE",
        params: &["error"],
        doc: "Message of a caught exception.",
        func: error_message,
    },
    NativeRecord {
        name: "ERROR-KIND",
        params: &["error"],
        doc: "Kind of a caught exception, as a symbol.",
        func: error_kind,
    },
    NativeRecord {
        name: "ERROR-PAYLOAD",
        params: &["error"],
        doc: "Non-string value given to THROW, or nil.",
        func: error_payload,
    },
];

fn not(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn list(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    Ok(Value::list(spread(args)))
}

fn equal(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    Ok(Value::Bool(args[0] == args[1]))
}

fn version(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    match &args[0] {
        Value::String(text) => Ok(Value::Version(Version::parse(text)?)),
        Value::Version(v) => Ok(Value::Version(v.clone())),
        other => Err(QuillError::type_mismatch("string", other)),
    }
}

fn caught(value: &Value) -> Result<&QuillError, QuillError> {
    match value {
        Value::Error(error) => Ok(error),
        other => Err(QuillError::type_mismatch("error", other)),
    }
}

fn error_message(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    Ok(Value::string(caught(&args[0])?.message()))
}

fn error_kind(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    Ok(caught(&args[0])?
        .kind()
        .map(|kind| Value::Symbol(kind.name().to_string()))
        .unwrap_or(Value::Nil))
}

fn error_payload(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    Ok(caught(&args[0])?.payload().cloned().unwrap_or(Value::Nil))
}

fn callee(value: Value) -> Result<Callable, QuillError> {
    match value {
        Value::Function(callable) => Ok(callable),
        other => Err(QuillError::type_mismatch("function", &other)),
    }
}

fn eval_all(
    nodes: &[Node],
    rt: &Interpreter,
    bt: &mut Backtrace,
    ctx: &CtxRef,
) -> Result<Vec<Value>, QuillError> {
    nodes.iter().map(|node| node.evaluate(rt, bt, ctx)).collect()
}

fn set_callee_params(
    slot: &mut Params<Vec<Node>>,
    form: &str,
    params: Vec<Node>,
    min: usize,
    span: Span,
) -> Result<(), QuillError> {
    if params.len() < min {
        return Err(QuillError::compile_at(
            span,
            format!("{} expects at least {} arguments, got {}", form, min, params.len()),
        ));
    }
    slot.set(params, span)
}

#[derive(Default)]
pub struct Funcall {
    params: Params<Vec<Node>>,
}

impl Code for Funcall {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let params = self.params.get()?;
        let f = callee(params[0].evaluate(rt, bt, ctx)?)?;
        let args = eval_all(&params[1..], rt, bt, ctx)?;
        f.call(rt, bt, args)
    }

    fn set_params(&mut self, params: Vec<Node>, span: Span) -> Result<(), QuillError> {
        set_callee_params(&mut self.params, "FUNCALL", params, 1, span)
    }
}

#[derive(Default)]
pub struct ApplyList {
    params: Params<Vec<Node>>,
}

impl Code for ApplyList {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let params = self.params.get()?;
        let f = callee(params[0].evaluate(rt, bt, ctx)?)?;
        let mut args = eval_all(&params[1..], rt, bt, ctx)?;
        match args.last() {
            Some(Value::List(_)) | Some(Value::Nil) => {}
            Some(other) => return Err(QuillError::type_mismatch("list", other)),
            None => return err("APPLY expects a trailing list"),
        }
        if let Some(Value::Nil) = args.last() {
            args.pop();
            args.push(Value::List(im::Vector::new()));
        }
        f.call(rt, bt, spread(args))
    }

    fn set_params(&mut self, params: Vec<Node>, span: Span) -> Result<(), QuillError> {
        set_callee_params(&mut self.params, "APPLY", params, 2, span)
    }
}
