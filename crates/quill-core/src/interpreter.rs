use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::argspec::ArgSpec;
use crate::backtrace::Backtrace;
use crate::builtins;
use crate::compiler::Compiler;
use crate::ctx::{Ctx, CtxRef};
use crate::error::QuillError;
use crate::function::{Callable, NativeFn, NativeResult};
use crate::node::{Code, Node};
use crate::options::EvalOptions;
use crate::syntax::Syntax;
use crate::value::Value;

pub type CodeCtor = fn() -> Box<dyn Code>;

#[derive(Clone)]
pub enum BuiltinKind {
    Form(CodeCtor),
    Expression(CodeCtor),
    Function(Callable),
}

impl BuiltinKind {
    fn label(&self) -> &'static str {
        match self {
            BuiltinKind::Form(_) => "form",
            BuiltinKind::Expression(_) => "expression",
            BuiltinKind::Function(_) => "function",
        }
    }
}

#[derive(Clone)]
pub struct Builtin {
    pub kind: BuiltinKind,
    pub doc: Option<String>,
}

struct Inner {
    table: RwLock<HashMap<String, Builtin>>,
    root: CtxRef,
    options: EvalOptions,
}

/// Shared handle; clones see the same table and root frame.
#[derive(Clone)]
pub struct Interpreter {
    inner: Arc<Inner>,
}

fn canonical(name: &str) -> String {
    name.to_ascii_uppercase()
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(EvalOptions::default())
    }
}

impl Interpreter {
    pub fn new(options: EvalOptions) -> Self {
        let rt = Self {
            inner: Arc::new(Inner {
                table: RwLock::new(HashMap::new()),
                root: Ctx::new_root(options.missing_variable),
                options,
            }),
        };
        builtins::install(&rt);
        rt
    }

    pub fn options(&self) -> &EvalOptions {
        &self.inner.options
    }

    pub fn root(&self) -> &CtxRef {
        &self.inner.root
    }

    pub fn compile(&self, syntax: &Syntax) -> Result<Node, QuillError> {
        if let Some((problem, span)) = syntax.first_problem() {
            return Err(QuillError::compile_at(span, problem));
        }
        Compiler::new(self).compile(syntax)
    }

    /// Compiles and evaluates one top-level form in the root frame.
    pub fn eval(&self, syntax: &Syntax) -> Result<Value, QuillError> {
        let node = self.compile(syntax)?;
        let mut bt = Backtrace::new();
        self.eval_node(&node, &mut bt, self.root())
    }

    /// Evaluates forms in order, compiling each just before it runs so that
    /// definitions made by earlier forms are visible to later ones.
    pub fn eval_all(&self, forms: &[Syntax]) -> Result<Value, QuillError> {
        let mut last = Value::Nil;
        for form in forms {
            last = self.eval(form)?;
        }
        Ok(last)
    }

    /// Top-level evaluation of a compiled node in `ctx`. A stray `RETURN`
    /// ends the evaluation with its value.
    pub fn eval_node(
        &self,
        node: &Node,
        bt: &mut Backtrace,
        ctx: &CtxRef,
    ) -> Result<Value, QuillError> {
        match node.evaluate(self, bt, ctx) {
            Err(QuillError::Return(value)) => Ok(value),
            Err(err) => {
                debug!(error = %err, node = node.name(), "uncaught evaluation failure");
                Err(err)
            }
            ok => ok,
        }
    }

    pub fn call(
        &self,
        bt: &mut Backtrace,
        callable: &Callable,
        args: Vec<Value>,
    ) -> Result<Value, QuillError> {
        match callable.call(self, bt, args) {
            Err(QuillError::Return(value)) => Ok(value),
            other => other,
        }
    }

    pub fn register_form(&self, name: &str, doc: &str, ctor: CodeCtor) {
        self.install(name, BuiltinKind::Form(ctor), Some(doc.to_string()));
    }

    pub fn register_expression(&self, name: &str, doc: &str, ctor: CodeCtor) {
        self.install(name, BuiltinKind::Expression(ctor), Some(doc.to_string()));
    }

    pub fn register_native(
        &self,
        name: &str,
        params: &[&str],
        doc: &str,
        func: impl Fn(&Interpreter, &mut Backtrace, Vec<Value>) -> NativeResult + Send + Sync + 'static,
    ) -> Result<(), QuillError> {
        let spec = ArgSpec::parse(params)?;
        if let Some(lazy) = spec.descriptors().iter().find(|d| d.lazy) {
            return Err(QuillError::illegal_argument(format!(
                "native {} receives evaluated arguments; {} cannot be &LAZY",
                name, lazy.name
            )));
        }
        self.register_native_spec(name, Arc::new(spec), doc, func);
        Ok(())
    }

    pub(crate) fn register_native_spec(
        &self,
        name: &str,
        spec: Arc<ArgSpec>,
        doc: &str,
        func: impl Fn(&Interpreter, &mut Backtrace, Vec<Value>) -> NativeResult + Send + Sync + 'static,
    ) {
        let native = NativeFn::new(canonical(name), spec, Some(doc.to_string()), func);
        self.install(
            name,
            BuiltinKind::Function(Callable::Native(Arc::new(native))),
            Some(doc.to_string()),
        );
    }

    pub fn define_function(&self, name: &str, callable: Callable) {
        let doc = callable.doc().map(str::to_string);
        self.install(name, BuiltinKind::Function(callable), doc);
    }

    pub fn lookup(&self, name: &str) -> Option<Builtin> {
        let table = self.inner.table.read().unwrap_or_else(|e| e.into_inner());
        table.get(&canonical(name)).cloned()
    }

    pub fn documentation(&self, name: &str) -> Option<String> {
        self.lookup(name)?.doc
    }

    pub fn function_names(&self) -> Vec<String> {
        let table = self.inner.table.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = table.keys().cloned().collect();
        names.sort();
        names
    }

    fn install(&self, name: &str, kind: BuiltinKind, doc: Option<String>) {
        let key = canonical(name);
        let label = kind.label();
        let mut table = self.inner.table.write().unwrap_or_else(|e| e.into_inner());
        let replaced = table.insert(key.clone(), Builtin { kind, doc }).is_some();
        debug!(name = %key, kind = label, replaced, "function table entry installed");
    }

    /// Current callable for a named call: the table entry, else a function
    /// value bound to the name in `ctx`.
    pub(crate) fn resolve_function(
        &self,
        name: &str,
        ctx: &CtxRef,
        bt: &mut Backtrace,
    ) -> Result<Callable, QuillError> {
        match self.lookup(name).map(|builtin| builtin.kind) {
            Some(BuiltinKind::Function(callable)) => return Ok(callable),
            Some(BuiltinKind::Form(_)) | Some(BuiltinKind::Expression(_)) => {
                return Err(QuillError::illegal_state(format!(
                    "{} was registered after this call was compiled",
                    name
                )));
            }
            None => {}
        }
        if !ctx.contains(name) {
            return Err(QuillError::undefined_function(name));
        }
        match ctx.get(name, self, bt)? {
            Value::Function(callable) => Ok(callable),
            other => Err(QuillError::type_mismatch("function", &other)),
        }
    }
}
