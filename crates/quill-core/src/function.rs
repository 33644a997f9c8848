use std::fmt;
use std::sync::Arc;

use crate::arglist::{ArgList, Eargs};
use crate::argspec::ArgSpec;
use crate::backtrace::Backtrace;
use crate::ctx::CtxRef;
use crate::error::QuillError;
use crate::interpreter::Interpreter;
use crate::node::{eval_body, Node};
use crate::value::Value;

pub type NativeResult = Result<Value, QuillError>;

pub type NativeImpl = dyn Fn(&Interpreter, &mut Backtrace, Vec<Value>) -> NativeResult + Send + Sync;

pub struct NativeFn {
    name: String,
    spec: Arc<ArgSpec>,
    doc: Option<String>,
    func: Box<NativeImpl>,
}

impl NativeFn {
    pub fn new(
        name: impl Into<String>,
        spec: Arc<ArgSpec>,
        doc: Option<String>,
        func: impl Fn(&Interpreter, &mut Backtrace, Vec<Value>) -> NativeResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            doc,
            func: Box::new(func),
        }
    }
}

pub struct Lambda {
    name: Option<String>,
    spec: Arc<ArgSpec>,
    body: Arc<[Node]>,
    env: CtxRef,
    doc: Option<String>,
}

impl Lambda {
    pub fn new(
        name: Option<String>,
        spec: Arc<ArgSpec>,
        body: Arc<[Node]>,
        env: CtxRef,
        doc: Option<String>,
    ) -> Self {
        Self {
            name,
            spec,
            body,
            env,
            doc,
        }
    }

    pub fn env(&self) -> &CtxRef {
        &self.env
    }
}

#[derive(Clone)]
pub enum Callable {
    Lambda(Arc<Lambda>),
    Native(Arc<NativeFn>),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Lambda(lambda) => lambda.name.as_deref().unwrap_or("lambda"),
            Callable::Native(native) => &native.name,
        }
    }

    pub fn spec(&self) -> &Arc<ArgSpec> {
        match self {
            Callable::Lambda(lambda) => &lambda.spec,
            Callable::Native(native) => &native.spec,
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            Callable::Lambda(lambda) => lambda.doc.as_deref(),
            Callable::Native(native) => native.doc.as_deref(),
        }
    }

    pub fn ptr_eq(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Lambda(a), Callable::Lambda(b)) => Arc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn invoke(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        caller: &CtxRef,
        args: &ArgList,
    ) -> Result<Value, QuillError> {
        match self {
            Callable::Lambda(lambda) => {
                let eargs = Eargs::new(rt, bt, caller, &lambda.env, args)?;
                match eval_body(&lambda.body, rt, bt, eargs.frame()) {
                    Err(QuillError::Return(value)) => Ok(value),
                    other => other,
                }
            }
            Callable::Native(native) => {
                let values = args.values(rt, bt, caller)?;
                (native.func)(rt, bt, values)
            }
        }
    }

    pub fn call(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        values: Vec<Value>,
    ) -> Result<Value, QuillError> {
        let nodes = values
            .into_iter()
            .map(|value| Node::literal(value, None))
            .collect();
        let args = ArgList::bind(self.spec().clone(), nodes)?;
        self.invoke(rt, bt, rt.root(), &args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<function {} {}>", self.name(), self.spec())
    }
}
