use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::backtrace::Backtrace;
use crate::syntax::Span;
use crate::value::Value;

pub const ERROR_TAG: &str = "\x1b[31m[ERROR]\x1b[0m";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Throwable,
    Error,
    StackOverflowError,
    Exception,
    CompileException,
    RuntimeException,
    ArithmeticException,
    IllegalArgumentException,
    ArityException,
    IllegalStateException,
    TypeException,
    UnboundVariableException,
    UndefinedFunctionException,
}

const ALL_KINDS: &[ErrorKind] = &[
    ErrorKind::Throwable,
    ErrorKind::Error,
    ErrorKind::StackOverflowError,
    ErrorKind::Exception,
    ErrorKind::CompileException,
    ErrorKind::RuntimeException,
    ErrorKind::ArithmeticException,
    ErrorKind::IllegalArgumentException,
    ErrorKind::ArityException,
    ErrorKind::IllegalStateException,
    ErrorKind::TypeException,
    ErrorKind::UnboundVariableException,
    ErrorKind::UndefinedFunctionException,
];

static KINDS_BY_NAME: Lazy<HashMap<String, ErrorKind>> = Lazy::new(|| {
    ALL_KINDS
        .iter()
        .map(|kind| (kind.name().to_ascii_uppercase(), *kind))
        .collect()
});

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Throwable => "Throwable",
            ErrorKind::Error => "Error",
            ErrorKind::StackOverflowError => "StackOverflowError",
            ErrorKind::Exception => "Exception",
            ErrorKind::CompileException => "CompileException",
            ErrorKind::RuntimeException => "RuntimeException",
            ErrorKind::ArithmeticException => "ArithmeticException",
            ErrorKind::IllegalArgumentException => "IllegalArgumentException",
            ErrorKind::ArityException => "ArityException",
            ErrorKind::IllegalStateException => "IllegalStateException",
            ErrorKind::TypeException => "TypeException",
            ErrorKind::UnboundVariableException => "UnboundVariableException",
            ErrorKind::UndefinedFunctionException => "UndefinedFunctionException",
        }
    }

    pub fn parent(self) -> Option<ErrorKind> {
        match self {
            ErrorKind::Throwable => None,
            ErrorKind::Error | ErrorKind::Exception => Some(ErrorKind::Throwable),
            ErrorKind::StackOverflowError => Some(ErrorKind::Error),
            ErrorKind::CompileException | ErrorKind::RuntimeException => {
                Some(ErrorKind::Exception)
            }
            ErrorKind::ArityException => Some(ErrorKind::IllegalArgumentException),
            ErrorKind::ArithmeticException
            | ErrorKind::IllegalArgumentException
            | ErrorKind::IllegalStateException
            | ErrorKind::TypeException
            | ErrorKind::UnboundVariableException
            | ErrorKind::UndefinedFunctionException => Some(ErrorKind::RuntimeException),
        }
    }

    pub fn is_a(self, ancestor: ErrorKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == ancestor {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    pub fn from_name(name: &str) -> Option<ErrorKind> {
        KINDS_BY_NAME.get(&name.to_ascii_uppercase()).copied()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ErrorContext {
    pub span: Option<Span>,
    pub trace: Option<Backtrace>,
}

impl ErrorContext {
    fn set_span(&mut self, span: Span) {
        if self.span.is_none() {
            self.span = Some(span);
        }
    }

    fn set_trace(&mut self, trace: &Backtrace) {
        if self.trace.is_none() {
            self.trace = Some(trace.clone());
        }
    }
}

#[derive(Clone, Debug)]
pub struct ErrorData {
    pub kind: ErrorKind,
    pub message: String,
    pub payload: Option<Value>,
    pub context: ErrorContext,
}

impl ErrorData {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            payload: None,
            context: ErrorContext::default(),
        }
    }
}

impl fmt::Display for ErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Error, Debug, Clone)]
pub enum QuillError {
    #[error("Compile error: {0}")]
    Compile(ErrorData),

    #[error("Binding error: {0}")]
    Binding(ErrorData),

    #[error("{0}")]
    UnboundVariable(ErrorData),

    #[error("{0}")]
    Runtime(ErrorData),

    #[error("internal return signal")]
    Return(Value),
}

impl QuillError {
    pub fn compile(message: impl Into<String>) -> Self {
        QuillError::Compile(ErrorData::new(ErrorKind::CompileException, message))
    }

    pub fn compile_at(span: Span, message: impl Into<String>) -> Self {
        Self::compile(message).with_span(span)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        QuillError::Binding(ErrorData::new(ErrorKind::ArityException, message))
    }

    pub fn binding(message: impl Into<String>) -> Self {
        QuillError::Binding(ErrorData::new(ErrorKind::IllegalArgumentException, message))
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        QuillError::Binding(ErrorData::new(ErrorKind::IllegalStateException, message))
    }

    pub fn unbound_variable(name: &str) -> Self {
        QuillError::UnboundVariable(ErrorData::new(
            ErrorKind::UnboundVariableException,
            format!("unbound variable {}", name),
        ))
    }

    pub fn runtime(kind: ErrorKind, message: impl Into<String>) -> Self {
        QuillError::Runtime(ErrorData::new(kind, message))
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::ArithmeticException, message)
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::IllegalArgumentException, message)
    }

    pub fn type_mismatch(expected: &str, actual: &Value) -> Self {
        Self::runtime(
            ErrorKind::TypeException,
            format!("expected {}, got {}", expected, actual.type_name()),
        )
    }

    pub fn undefined_function(name: &str) -> Self {
        Self::runtime(
            ErrorKind::UndefinedFunctionException,
            format!("undefined function {}", name),
        )
    }

    pub fn thrown(kind: ErrorKind, message: impl Into<String>, payload: Option<Value>) -> Self {
        let mut data = ErrorData::new(kind, message);
        data.payload = payload;
        QuillError::Runtime(data)
    }

    pub fn is_return(&self) -> bool {
        matches!(self, QuillError::Return(_))
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.data().map(|data| data.kind)
    }

    pub fn message(&self) -> &str {
        self.data().map(|data| data.message.as_str()).unwrap_or("")
    }

    pub fn payload(&self) -> Option<&Value> {
        self.data().and_then(|data| data.payload.as_ref())
    }

    pub fn span(&self) -> Option<Span> {
        self.data().and_then(|data| data.context.span)
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.data().and_then(|data| data.context.trace.as_ref())
    }

    pub fn with_span(mut self, span: Span) -> Self {
        if let Some(data) = self.data_mut() {
            data.context.set_span(span);
        }
        self
    }

    pub fn with_backtrace(mut self, trace: &Backtrace) -> Self {
        if let Some(data) = self.data_mut() {
            data.context.set_trace(trace);
        }
        self
    }

    fn data(&self) -> Option<&ErrorData> {
        match self {
            QuillError::Compile(data)
            | QuillError::Binding(data)
            | QuillError::UnboundVariable(data)
            | QuillError::Runtime(data) => Some(data),
            QuillError::Return(_) => None,
        }
    }

    fn data_mut(&mut self) -> Option<&mut ErrorData> {
        match self {
            QuillError::Compile(data)
            | QuillError::Binding(data)
            | QuillError::UnboundVariable(data)
            | QuillError::Runtime(data) => Some(data),
            QuillError::Return(_) => None,
        }
    }
}

pub fn format_error(err: &QuillError) -> Vec<String> {
    let mut lines = vec![format!("{} {}", ERROR_TAG, err)];
    if let Some(span) = err.span() {
        lines.push(format!("  at {}", span));
    }
    if let Some(trace) = err.backtrace() {
        lines.extend(trace.render().lines().map(|line| format!("  {}", line)));
    }
    lines
}

impl From<String> for QuillError {
    fn from(s: String) -> Self {
        QuillError::runtime(ErrorKind::RuntimeException, s)
    }
}

impl From<&str> for QuillError {
    fn from(s: &str) -> Self {
        QuillError::runtime(ErrorKind::RuntimeException, s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_their_ancestors() {
        assert!(ErrorKind::ArityException.is_a(ErrorKind::IllegalArgumentException));
        assert!(ErrorKind::ArityException.is_a(ErrorKind::RuntimeException));
        assert!(ErrorKind::ArityException.is_a(ErrorKind::Throwable));
        assert!(!ErrorKind::ArithmeticException.is_a(ErrorKind::IllegalArgumentException));
        assert!(!ErrorKind::StackOverflowError.is_a(ErrorKind::Exception));
    }

    #[test]
    fn kind_names_resolve_case_insensitively() {
        assert_eq!(
            ErrorKind::from_name("arithmeticexception"),
            Some(ErrorKind::ArithmeticException)
        );
        assert_eq!(ErrorKind::from_name("NoSuchException"), None);
    }

    #[test]
    fn first_span_wins() {
        let err = QuillError::arithmetic("division by zero")
            .with_span(Span::new(3, 4, 10))
            .with_span(Span::new(9, 9, 99));
        assert_eq!(err.span(), Some(Span::new(3, 4, 10)));
    }

    #[test]
    fn return_signal_carries_no_context() {
        let err = QuillError::Return(Value::Int(1)).with_span(Span::new(1, 1, 0));
        assert!(err.span().is_none());
        assert!(err.kind().is_none());
    }
}
