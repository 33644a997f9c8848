use std::cmp::Ordering;

use crate::backtrace::Backtrace;
use crate::builtins::{spread, NativeRecord};
use crate::function::NativeResult;
use crate::interpreter::Interpreter;
use crate::number::{compare_chain, fold, ArithOp};
use crate::value::Value;

pub(crate) static NATIVES: &[NativeRecord] = &[
    NativeRecord {
        name: "+",
        params: &["&REST", "numbers"],
        doc: "Sum of the numbers; 0 when called without arguments.",
        func: add,
    },
    NativeRecord {
        name: "-",
        params: &["&REST", "numbers"],
        doc: "Subtracts the remaining numbers from the first, or negates a single number.",
        func: sub,
    },
    NativeRecord {
        name: "*",
        params: &["&REST", "numbers"],
        doc: "Product of the numbers; 1 when called without arguments.",
        func: mul,
    },
    NativeRecord {
        name: "/",
        params: &["&REST", "numbers"],
        doc: "Divides the first number by the rest; integer operands divide truncating.",
        func: div,
    },
    NativeRecord {
        name: "MOD",
        params: &["&REST", "numbers"],
        doc: "Remainder of dividing the first number by the rest.",
        func: rem,
    },
    NativeRecord {
        name: "=",
        params: &["x", "&REST", "more"],
        doc: "True when all numbers are numerically equal.",
        func: num_eq,
    },
    NativeRecord {
        name: "<",
        params: &["x", "&REST", "more"],
        doc: "True when the numbers are strictly increasing.",
        func: lt,
    },
    NativeRecord {
        name: ">",
        params: &["x", "&REST", "more"],
        doc: "True when the numbers are strictly decreasing.",
        func: gt,
    },
    NativeRecord {
        name: "<=",
        params: &["x", "&REST", "more"],
        doc: "True when the numbers never decrease.",
        func: le,
    },
    NativeRecord {
        name: ">=",
        params: &["x", "&REST", "more"],
        doc: "True when the numbers never increase.",
        func: ge,
    },
];

fn arith(op: ArithOp, args: Vec<Value>) -> NativeResult {
    fold(op, &spread(args))
}

fn add(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    arith(ArithOp::Add, args)
}

fn sub(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    arith(ArithOp::Sub, args)
}

fn mul(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    arith(ArithOp::Mul, args)
}

fn div(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    arith(ArithOp::Div, args)
}

fn rem(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    arith(ArithOp::Rem, args)
}

fn compare(args: Vec<Value>, pred: impl Fn(Ordering) -> bool) -> NativeResult {
    compare_chain(&spread(args), pred).map(Value::Bool)
}

fn num_eq(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    compare(args, |o| o == Ordering::Equal)
}

fn lt(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    compare(args, |o| o == Ordering::Less)
}

fn gt(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    compare(args, |o| o == Ordering::Greater)
}

fn le(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    compare(args, |o| o != Ordering::Greater)
}

fn ge(_: &Interpreter, _: &mut Backtrace, args: Vec<Value>) -> NativeResult {
    compare(args, |o| o != Ordering::Less)
}
