use std::sync::{Arc, Mutex};

use crate::arglist::ArgList;
use crate::backtrace::Backtrace;
use crate::ctx::CtxRef;
use crate::error::QuillError;
use crate::function::Callable;
use crate::interpreter::{BuiltinKind, Interpreter};
use crate::node::{Code, Literal, Node, VarRef};
use crate::syntax::{Syntax, SyntaxKind};
use crate::value::Value;

pub struct Compiler<'a> {
    rt: &'a Interpreter,
}

impl<'a> Compiler<'a> {
    pub fn new(rt: &'a Interpreter) -> Self {
        Self { rt }
    }

    pub fn interpreter(&self) -> &'a Interpreter {
        self.rt
    }

    pub fn compile(&self, syntax: &Syntax) -> Result<Node, QuillError> {
        if let Some(problem) = &syntax.problem {
            return Err(QuillError::compile_at(syntax.span, problem.clone()));
        }
        let span = Some(syntax.span);
        match &syntax.kind {
            SyntaxKind::Leaf(Value::Symbol(name)) => Ok(Node::new(
                VarRef { name: name.clone() },
                name.as_str(),
                span,
            )),
            SyntaxKind::Leaf(value) => Ok(Node::literal(value.clone(), span)),
            SyntaxKind::List { literal: true, .. } => Ok(Node::new(
                Literal(syntax.to_value()),
                syntax.to_string(),
                span,
            )),
            SyntaxKind::List { items, .. } => match items.split_first() {
                None => Ok(Node::literal(Value::List(im::Vector::new()), span)),
                Some((head, tail)) => self.compile_call(syntax, head, tail),
            },
        }
    }

    pub fn compile_all(&self, items: &[Syntax]) -> Result<Vec<Node>, QuillError> {
        items.iter().map(|item| self.compile(item)).collect()
    }

    fn compile_call(
        &self,
        syntax: &Syntax,
        head: &Syntax,
        tail: &[Syntax],
    ) -> Result<Node, QuillError> {
        let span = syntax.span;
        if head.is_list() {
            let callee = self.compile(head)?;
            let args = self.compile_all(tail)?;
            return Ok(Node::new(
                Apply {
                    callee,
                    site: CallSite::new(args),
                },
                format!("({} ...)", head),
                Some(span),
            ));
        }
        let Some(name) = head.as_symbol() else {
            return Err(QuillError::compile_at(
                head.span,
                format!("{} cannot be called", head),
            ));
        };
        match self.rt.lookup(name).map(|builtin| builtin.kind) {
            Some(BuiltinKind::Form(ctor)) => {
                let mut code = ctor();
                code.set_raw_params(self, tail, span)?;
                Ok(Node::from_boxed(code, name, Some(span)))
            }
            Some(BuiltinKind::Expression(ctor)) => {
                let mut code = ctor();
                code.set_params(self.compile_all(tail)?, span)?;
                Ok(Node::from_boxed(code, name, Some(span)))
            }
            Some(BuiltinKind::Function(_)) | None => {
                let args = self.compile_all(tail)?;
                Ok(Node::new(
                    CallNamed {
                        name: name.to_string(),
                        site: CallSite::new(args),
                    },
                    name,
                    Some(span),
                ))
            }
        }
    }
}

/// Call-site arguments plus the binding made for the last callee seen.
pub(crate) struct CallSite {
    args: Vec<Node>,
    cache: Mutex<Option<(Callable, Arc<ArgList>)>>,
}

impl CallSite {
    pub(crate) fn new(args: Vec<Node>) -> Self {
        Self {
            args,
            cache: Mutex::new(None),
        }
    }

    fn bind(&self, callee: &Callable) -> Result<Arc<ArgList>, QuillError> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached, args)) = cache.as_ref() {
            if cached.ptr_eq(callee) {
                return Ok(args.clone());
            }
        }
        let args = Arc::new(ArgList::bind(callee.spec().clone(), self.args.clone())?);
        *cache = Some((callee.clone(), args.clone()));
        Ok(args)
    }

    pub(crate) fn call(
        &self,
        callee: &Callable,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let args = self.bind(callee)?;
        callee.invoke(rt, bt, ctx, &args)
    }
}

/// Call of a function looked up by name at each evaluation.
struct CallNamed {
    name: String,
    site: CallSite,
}

impl Code for CallNamed {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        let callee = rt.resolve_function(&self.name, ctx, bt)?;
        self.site.call(&callee, rt, bt, ctx)
    }
}

/// Call whose head is itself an expression, e.g. `((LAMBDA (x) x) 1)`.
struct Apply {
    callee: Node,
    site: CallSite,
}

impl Code for Apply {
    fn evaluate(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        match self.callee.evaluate(rt, bt, ctx)? {
            Value::Function(callee) => self.site.call(&callee, rt, bt, ctx),
            other => Err(QuillError::type_mismatch("function", &other)),
        }
    }
}
