//! Expression compiler and evaluation engine for the quill Lisp dialect.
//!
//! A reader hands [`Syntax`] trees to an [`Interpreter`], which compiles them
//! into [`Node`]s and evaluates those against chained [`Ctx`] frames.

pub mod arglist;
pub mod argspec;
pub mod backtrace;
pub mod builtins;
pub mod compiler;
pub mod ctx;
pub mod error;
pub mod forms;
pub mod function;
pub mod interpreter;
pub mod node;
pub mod number;
pub mod options;
pub mod syntax;
pub mod value;

pub use arglist::{ArgList, Bound, Eargs, Thunk};
pub use argspec::{ArgDescriptor, ArgSpec, Role};
pub use backtrace::{Backtrace, Frame};
pub use compiler::Compiler;
pub use ctx::{Ctx, CtxRef, MissingVariable};
pub use error::{format_error, ErrorKind, QuillError};
pub use function::{Callable, Lambda, NativeFn};
pub use interpreter::{Builtin, BuiltinKind, Interpreter};
pub use node::{Code, Node, Params};
pub use number::{ArithOp, NumKind, Promotion, Version};
pub use options::EvalOptions;
pub use syntax::{Span, Syntax, SyntaxKind};
pub use value::{HostObject, Key, Value};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
