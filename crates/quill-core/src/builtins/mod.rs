use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::argspec::ArgSpec;
use crate::backtrace::Backtrace;
use crate::error::QuillError;
use crate::forms::{self, ctor};
use crate::function::NativeResult;
use crate::interpreter::Interpreter;
use crate::value::Value;

pub(crate) mod core;
mod math;

pub(crate) type NativeSig = fn(&Interpreter, &mut Backtrace, Vec<Value>) -> NativeResult;

pub(crate) struct NativeRecord {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub doc: &'static str,
    pub func: NativeSig,
}

type ParsedNative = (&'static NativeRecord, Result<Arc<ArgSpec>, QuillError>);

static NATIVE_SPECS: Lazy<Vec<ParsedNative>> = Lazy::new(|| {
    math::NATIVES
        .iter()
        .chain(core::NATIVES)
        .map(|record| (record, ArgSpec::parse(record.params).map(Arc::new)))
        .collect()
});

pub(crate) fn install(rt: &Interpreter) {
    forms::install(rt);
    rt.register_expression(
        "FUNCALL",
        "(FUNCALL f arg...) calls the function value f with the given arguments.",
        ctor::<core::Funcall>,
    );
    rt.register_expression(
        "APPLY",
        "(APPLY f arg... list) calls f with the arguments followed by the elements of list.",
        ctor::<core::ApplyList>,
    );
    for (record, spec) in NATIVE_SPECS.iter() {
        match spec {
            Ok(spec) => rt.register_native_spec(record.name, spec.clone(), record.doc, record.func),
            Err(err) => warn!(name = record.name, error = %err, "builtin skipped"),
        }
    }
}

pub fn err<T>(msg: impl Into<String>) -> Result<T, QuillError> {
    Err(QuillError::illegal_argument(msg))
}

pub(crate) fn spread(mut args: Vec<Value>) -> Vec<Value> {
    match args.pop() {
        Some(Value::List(rest)) => {
            args.extend(rest);
            args
        }
        Some(other) => {
            args.push(other);
            args
        }
        None => args,
    }
}
