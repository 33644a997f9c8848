mod binding;
mod control;
mod lambda;
mod try_form;

use crate::error::QuillError;
use crate::interpreter::{CodeCtor, Interpreter};
use crate::node::Code;
use crate::syntax::{Span, Syntax};

pub(crate) fn ctor<T: Code + Default + 'static>() -> Box<dyn Code> {
    Box::new(T::default())
}

struct FormRecord {
    name: &'static str,
    doc: &'static str,
    ctor: CodeCtor,
}

static FORMS: &[FormRecord] = &[
    FormRecord {
        name: "QUOTE",
        doc: "(QUOTE x) returns x unevaluated.",
        ctor: ctor::<control::Quote>,
    },
    FormRecord {
        name: "PROGN",
        doc: "(PROGN body...) evaluates body in order and returns the last value.",
        ctor: ctor::<control::Progn>,
    },
    FormRecord {
        name: "IF",
        doc: "(IF test then else...) evaluates then when test is true, else the else forms.",
        ctor: ctor::<control::If>,
    },
    FormRecord {
        name: "COND",
        doc: "(COND (test body...)...) runs the body of the first clause whose test is true.",
        ctor: ctor::<control::Cond>,
    },
    FormRecord {
        name: "WHEN",
        doc: "(WHEN test body...) evaluates body when test is true.",
        ctor: ctor::<control::When>,
    },
    FormRecord {
        name: "UNLESS",
        doc: "(UNLESS test body...) evaluates body when test is false.",
        ctor: ctor::<control::Unless>,
    },
    FormRecord {
        name: "AND",
        doc: "(AND x...) returns the first false value, or the last value.",
        ctor: ctor::<control::And>,
    },
    FormRecord {
        name: "OR",
        doc: "(OR x...) returns the first true value, or nil.",
        ctor: ctor::<control::Or>,
    },
    FormRecord {
        name: "WHILE",
        doc: "(WHILE test body...) repeats body while test is true.",
        ctor: ctor::<control::While>,
    },
    FormRecord {
        name: "FOREACH",
        doc: "(FOREACH (var source [result]) body...) runs body once per element of source.",
        ctor: ctor::<control::Foreach>,
    },
    FormRecord {
        name: "RETURN",
        doc: "(RETURN [value]) leaves the innermost function call with value.",
        ctor: ctor::<control::Return>,
    },
    FormRecord {
        name: "THROW",
        doc: "(THROW [Kind] message) raises an exception of Kind (RuntimeException by default).",
        ctor: ctor::<control::Throw>,
    },
    FormRecord {
        name: "->",
        doc: "(-> value step...) threads value through each step as its piped argument.",
        ctor: ctor::<control::Pipe>,
    },
    FormRecord {
        name: "LET",
        doc: "(LET ((name value)...) body...) binds names in order in a new scope.",
        ctor: ctor::<binding::Let>,
    },
    FormRecord {
        name: "DLET",
        doc: "(DLET (name... [&REST rest]) list body...) binds the elements of list by position.",
        ctor: ctor::<binding::Dlet>,
    },
    FormRecord {
        name: "SETQ",
        doc: "(SETQ name value...) assigns each name in the global scope.",
        ctor: ctor::<binding::Setq>,
    },
    FormRecord {
        name: "SETV",
        doc: "(SETV name value...) assigns each name where it is nearest bound.",
        ctor: ctor::<binding::Setv>,
    },
    FormRecord {
        name: "LAMBDA",
        doc: "(LAMBDA params [doc] body...) creates a closure over the current scope.",
        ctor: ctor::<lambda::LambdaForm>,
    },
    FormRecord {
        name: "DEFUN",
        doc: "(DEFUN name params [doc] body...) defines or replaces a global function.",
        ctor: ctor::<lambda::Defun>,
    },
    FormRecord {
        name: "FUNCTION",
        doc: "(FUNCTION name) returns the function currently stored under name.",
        ctor: ctor::<lambda::FunctionRef>,
    },
    FormRecord {
        name: "TRY",
        doc: "(TRY body... (CATCH Kind var body...)... (FINALLY body...)) handles exceptions.",
        ctor: ctor::<try_form::Try>,
    },
];

pub(crate) fn install(rt: &Interpreter) {
    for record in FORMS {
        rt.register_form(record.name, record.doc, record.ctor);
    }
}

pub(crate) fn expect_args(
    form: &str,
    params: &[Syntax],
    span: Span,
    min: usize,
    max: Option<usize>,
) -> Result<(), QuillError> {
    let count = params.len();
    let ok = count >= min && max.map_or(true, |max| count <= max);
    if ok {
        return Ok(());
    }
    let expected = match max {
        Some(max) if max == min => format!("{}", min),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    };
    Err(QuillError::compile_at(
        span,
        format!("{} expects {} arguments, got {}", form, expected, count),
    ))
}

pub(crate) fn symbol_name(param: &Syntax, what: &str) -> Result<String, QuillError> {
    param.as_symbol().map(str::to_string).ok_or_else(|| {
        QuillError::compile_at(param.span, format!("{} must be a symbol, got {}", what, param))
    })
}

pub(crate) fn clause_head(param: &Syntax) -> Option<String> {
    param
        .as_list()?
        .first()?
        .as_symbol()
        .map(str::to_ascii_uppercase)
}
