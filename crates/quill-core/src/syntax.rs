use std::fmt;

use crate::value::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: usize,
    pub col: usize,
    pub index: usize,
}

impl Span {
    pub fn new(line: usize, col: usize, index: usize) -> Self {
        Self { line, col, index }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Clone, Debug)]
pub enum SyntaxKind {
    Leaf(Value),
    List { items: Vec<Syntax>, literal: bool },
}

#[derive(Clone, Debug)]
pub struct Syntax {
    pub kind: SyntaxKind,
    pub span: Span,
    pub problem: Option<String>,
}

impl Syntax {
    pub fn leaf(value: Value, span: Span) -> Self {
        Self {
            kind: SyntaxKind::Leaf(value),
            span,
            problem: None,
        }
    }

    pub fn symbol(name: impl Into<String>, span: Span) -> Self {
        Self::leaf(Value::Symbol(name.into()), span)
    }

    pub fn list(items: Vec<Syntax>, span: Span) -> Self {
        Self {
            kind: SyntaxKind::List {
                items,
                literal: false,
            },
            span,
            problem: None,
        }
    }

    pub fn literal_list(items: Vec<Syntax>, span: Span) -> Self {
        Self {
            kind: SyntaxKind::List {
                items,
                literal: true,
            },
            span,
            problem: None,
        }
    }

    pub fn with_problem(mut self, problem: impl Into<String>) -> Self {
        self.problem = Some(problem.into());
        self
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            SyntaxKind::Leaf(Value::Symbol(name)) => Some(name),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Syntax]> {
        match &self.kind {
            SyntaxKind::List { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, SyntaxKind::List { .. })
    }

    pub fn has_problems(&self) -> bool {
        self.first_problem().is_some()
    }

    pub fn first_problem(&self) -> Option<(&str, Span)> {
        if let Some(problem) = &self.problem {
            return Some((problem, self.span));
        }
        match &self.kind {
            SyntaxKind::Leaf(_) => None,
            SyntaxKind::List { items, .. } => items.iter().find_map(Syntax::first_problem),
        }
    }

    pub fn to_value(&self) -> Value {
        match &self.kind {
            SyntaxKind::Leaf(value) => value.clone(),
            SyntaxKind::List { items, .. } => {
                Value::List(items.iter().map(Syntax::to_value).collect())
            }
        }
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SyntaxKind::Leaf(value) => write!(f, "{}", value.repr()),
            SyntaxKind::List { items, literal } => {
                if *literal {
                    write!(f, "'")?;
                }
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
