#![allow(dead_code)]

use quill_core::{EvalOptions, Interpreter, MissingVariable, QuillError, Span, Syntax, Value};

/// Small S-expression reader producing syntax trees for tests.
struct Reader<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn span(&mut self) -> Span {
        let index = self.chars.peek().map(|(i, _)| *i).unwrap_or(0);
        Span::new(self.line, self.col, index)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn read_all(&mut self) -> Vec<Syntax> {
        let mut forms = Vec::new();
        loop {
            self.skip_trivia();
            if self.chars.peek().is_none() {
                return forms;
            }
            forms.push(self.read());
        }
    }

    fn read(&mut self) -> Syntax {
        self.skip_trivia();
        let span = self.span();
        match self.chars.peek().map(|(_, c)| *c) {
            None => panic!("unexpected end of input at {}", span),
            Some('(') => {
                self.bump();
                Syntax::list(self.read_items(), span)
            }
            Some(')') => panic!("unexpected ) at {}", span),
            Some('\'') => {
                self.bump();
                let quoted = self.read();
                match quoted.as_list() {
                    Some(items) => Syntax::literal_list(items.to_vec(), span),
                    None => Syntax::list(vec![Syntax::symbol("QUOTE", span), quoted], span),
                }
            }
            Some('"') => {
                self.bump();
                Syntax::leaf(Value::String(self.read_string()), span)
            }
            Some(_) => self.read_atom(span),
        }
    }

    fn read_items(&mut self) -> Vec<Syntax> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.chars.peek().map(|(_, c)| *c) {
                Some(')') => {
                    self.bump();
                    return items;
                }
                None => panic!("unterminated list"),
                Some(_) => items.push(self.read()),
            }
        }
    }

    fn read_string(&mut self) -> String {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return out,
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => panic!("unterminated string"),
                },
                Some(c) => out.push(c),
                None => panic!("unterminated string"),
            }
        }
    }

    fn read_atom(&mut self, span: Span) -> Syntax {
        let mut text = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == ';' {
                break;
            }
            text.push(c);
            self.bump();
        }
        Syntax::leaf(atom_value(&text), span)
    }
}

fn atom_value(text: &str) -> Value {
    match text {
        "nil" => return Value::Nil,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Some(keyword) = text.strip_prefix(':') {
        return Value::Keyword(keyword.to_string());
    }
    if let Ok(n) = text.parse::<i64>() {
        return match i32::try_from(n) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::Long(n),
        };
    }
    let numeric_start = text
        .trim_start_matches('-')
        .starts_with(|c: char| c.is_ascii_digit() || c == '.');
    if numeric_start {
        if let Ok(f) = text.parse::<f64>() {
            return Value::Double(f);
        }
    }
    Value::Symbol(text.to_string())
}

pub fn read(src: &str) -> Vec<Syntax> {
    Reader::new(src).read_all()
}

pub fn read_one(src: &str) -> Syntax {
    let mut forms = read(src);
    assert_eq!(forms.len(), 1, "expected exactly one form in {:?}", src);
    forms.remove(0)
}

pub fn strict_options() -> EvalOptions {
    EvalOptions {
        missing_variable: MissingVariable::Raise,
        max_depth: 256,
    }
}

pub fn interpreter() -> Interpreter {
    Interpreter::new(strict_options())
}

pub fn eval_in(rt: &Interpreter, src: &str) -> Result<Value, QuillError> {
    rt.eval_all(&read(src))
}

pub fn eval(src: &str) -> Result<Value, QuillError> {
    eval_in(&interpreter(), src)
}

pub fn eval_ok(src: &str) -> Value {
    eval(src).unwrap_or_else(|e| panic!("evaluation of {:?} failed: {}", src, e))
}

pub fn int(n: i32) -> Value {
    Value::Int(n)
}

pub fn list(items: Vec<Value>) -> Value {
    Value::list(items)
}
