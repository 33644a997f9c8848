use std::collections::HashMap;
use std::fmt;

use crate::compiler::Compiler;
use crate::error::QuillError;
use crate::node::Node;
use crate::syntax::{Span, Syntax};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Mandatory,
    MandatoryAfterOptional,
    Optional,
    Rest,
    Keyword,
    RestThenKeyword,
}

impl Role {
    pub fn is_keyword(self) -> bool {
        matches!(self, Role::Keyword | Role::RestThenKeyword)
    }

    pub fn is_positional(self) -> bool {
        matches!(
            self,
            Role::Mandatory | Role::Optional | Role::MandatoryAfterOptional
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Marker {
    Required,
    Optional,
    Rest,
    Key,
    AllowOtherKeys,
    Lazy,
    Eager,
    Pipe,
}

impl Marker {
    fn parse(token: &str) -> Option<Marker> {
        match token.to_ascii_uppercase().as_str() {
            "&REQUIRED" => Some(Marker::Required),
            "&OPTIONAL" => Some(Marker::Optional),
            "&REST" => Some(Marker::Rest),
            "&KEY" => Some(Marker::Key),
            "&ALLOW-OTHER-KEYS" => Some(Marker::AllowOtherKeys),
            "&LAZY" => Some(Marker::Lazy),
            "&EAGER" => Some(Marker::Eager),
            "&PIPE" => Some(Marker::Pipe),
            _ => None,
        }
    }

    /// Role reached from `role` on this marker; `None` when the marker is misplaced.
    fn transition(self, role: Role) -> Option<Role> {
        match (role, self) {
            (Role::Mandatory, Marker::Optional) => Some(Role::Optional),
            (Role::Mandatory, Marker::Rest) => Some(Role::Rest),
            (Role::Mandatory | Role::Optional, Marker::Key) => Some(Role::Keyword),
            (Role::Optional, Marker::Required) => Some(Role::MandatoryAfterOptional),
            (Role::Rest, Marker::Key) => Some(Role::RestThenKeyword),
            (Role::Rest | Role::Keyword | Role::RestThenKeyword, Marker::Required) => {
                Some(Role::MandatoryAfterOptional)
            }
            _ => None,
        }
    }
}

/// One lambda-list element before it becomes a descriptor.
pub enum ArgToken {
    Name(String),
    Marker(String),
    Compound {
        name: String,
        default: Option<Node>,
        supplied_p: Option<String>,
    },
}

#[derive(Clone, Debug)]
pub struct ArgDescriptor {
    pub name: String,
    pub role: Role,
    pub default: Option<Node>,
    pub supplied_p: Option<String>,
    pub allow_other_keys: bool,
    pub lazy: bool,
    pub pipe: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ArgSpec {
    descriptors: Vec<ArgDescriptor>,
    has_rest: bool,
    by_name: HashMap<String, usize>,
    by_supplied: HashMap<String, usize>,
}

struct SpecBuilder {
    role: Role,
    lazy: bool,
    allow_other_keys: bool,
    pipe_pending: bool,
    pipe_used: bool,
    spec: ArgSpec,
}

impl SpecBuilder {
    fn new() -> Self {
        Self {
            role: Role::Mandatory,
            lazy: false,
            allow_other_keys: false,
            pipe_pending: false,
            pipe_used: false,
            spec: ArgSpec::default(),
        }
    }

    fn marker(&mut self, token: &str) -> Result<(), String> {
        let marker =
            Marker::parse(token).ok_or_else(|| format!("unknown argument keyword {}", token))?;
        match marker {
            Marker::Lazy => self.lazy = true,
            Marker::Eager => self.lazy = false,
            Marker::Pipe => {
                if self.pipe_pending || self.pipe_used {
                    return Err("only one &PIPE argument is allowed".into());
                }
                self.pipe_pending = true;
            }
            Marker::AllowOtherKeys => {
                if !self.role.is_keyword() {
                    return Err(format!("misplaced argument keyword {}", token));
                }
                self.allow_other_keys = true;
                for desc in &mut self.spec.descriptors {
                    if desc.role.is_keyword() {
                        desc.allow_other_keys = true;
                    }
                }
            }
            _ => {
                self.role = marker
                    .transition(self.role)
                    .ok_or_else(|| format!("misplaced argument keyword {}", token))?;
            }
        }
        Ok(())
    }

    fn descriptor(
        &mut self,
        name: String,
        default: Option<Node>,
        supplied_p: Option<String>,
        compound: bool,
    ) -> Result<(), String> {
        if compound && !matches!(self.role, Role::Optional) && !self.role.is_keyword() {
            return Err(format!(
                "argument {} cannot declare a default outside &OPTIONAL or &KEY",
                name
            ));
        }
        if self.role == Role::Rest && self.spec.has_rest {
            return Err(format!("only one &REST argument is allowed, found {}", name));
        }
        let idx = self.spec.descriptors.len();
        if self.spec.by_name.insert(name.clone(), idx).is_some() {
            return Err(format!("duplicate argument name {}", name));
        }
        if let Some(flag) = &supplied_p {
            if self.spec.by_name.contains_key(flag)
                || self.spec.by_supplied.insert(flag.clone(), idx).is_some()
            {
                return Err(format!("duplicate argument name {}", flag));
            }
        }
        if self.role == Role::Rest {
            self.spec.has_rest = true;
        }
        let pipe = std::mem::take(&mut self.pipe_pending);
        self.pipe_used |= pipe;
        self.spec.descriptors.push(ArgDescriptor {
            name,
            role: self.role,
            default,
            supplied_p,
            allow_other_keys: self.allow_other_keys && self.role.is_keyword(),
            lazy: self.lazy,
            pipe,
        });
        Ok(())
    }

    fn push(&mut self, token: ArgToken) -> Result<(), String> {
        match token {
            ArgToken::Marker(text) => self.marker(&text),
            ArgToken::Name(name) => self.descriptor(name, None, None, false),
            ArgToken::Compound {
                name,
                default,
                supplied_p,
            } => self.descriptor(name, default, supplied_p, true),
        }
    }

    fn finish(self) -> Result<ArgSpec, String> {
        if self.pipe_pending {
            return Err("&PIPE must be followed by an argument".into());
        }
        Ok(self.spec)
    }
}

impl ArgSpec {
    /// Builds a spec from already classified tokens.
    pub fn from_tokens(tokens: impl IntoIterator<Item = ArgToken>) -> Result<Self, QuillError> {
        let mut builder = SpecBuilder::new();
        for token in tokens {
            builder.push(token).map_err(QuillError::compile)?;
        }
        builder.finish().map_err(QuillError::compile)
    }

    /// Builds a spec from plain names and `&` keywords, as native builtins declare them.
    pub fn parse(tokens: &[&str]) -> Result<Self, QuillError> {
        Self::from_tokens(tokens.iter().map(|token| {
            if token.starts_with('&') {
                ArgToken::Marker(token.to_string())
            } else {
                ArgToken::Name(token.to_string())
            }
        }))
    }

    /// Compiles a lambda list; default-value forms are compiled once here.
    pub fn compile(compiler: &Compiler<'_>, params: &[Syntax]) -> Result<Self, QuillError> {
        let mut builder = SpecBuilder::new();
        for param in params {
            let token = param_token(compiler, param)?;
            builder
                .push(token)
                .map_err(|msg| QuillError::compile_at(param.span, msg))?;
        }
        let span = params.last().map(|p| p.span).unwrap_or_default();
        builder
            .finish()
            .map_err(|msg| QuillError::compile_at(span, msg))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[ArgDescriptor] {
        &self.descriptors
    }

    pub fn has_rest(&self) -> bool {
        self.has_rest
    }

    pub fn has_keywords(&self) -> bool {
        self.descriptors.iter().any(|d| d.role.is_keyword())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn supplied_index(&self, name: &str) -> Option<usize> {
        self.by_supplied.get(name).copied()
    }

    pub fn keyword_index(&self, key: &str) -> Option<usize> {
        self.index_of(key)
            .filter(|idx| self.descriptors[*idx].role.is_keyword())
    }

    pub fn allows_other_keys(&self) -> bool {
        self.descriptors
            .iter()
            .any(|d| d.role.is_keyword() && d.allow_other_keys)
    }

    pub fn pipe_index(&self) -> Option<usize> {
        self.descriptors.iter().position(|d| d.pipe)
    }
}

fn param_token(compiler: &Compiler<'_>, param: &Syntax) -> Result<ArgToken, QuillError> {
    if let Some(name) = param.as_symbol() {
        return Ok(if name.starts_with('&') {
            ArgToken::Marker(name.to_string())
        } else {
            ArgToken::Name(name.to_string())
        });
    }
    let Some(items) = param.as_list() else {
        return Err(QuillError::compile_at(
            param.span,
            format!("invalid argument declaration {}", param),
        ));
    };
    let name = items
        .first()
        .and_then(Syntax::as_symbol)
        .filter(|name| !name.starts_with('&'))
        .ok_or_else(|| compound_error(param.span))?;
    if items.len() > 3 {
        return Err(compound_error(param.span));
    }
    let default = items.get(1).map(|form| compiler.compile(form)).transpose()?;
    let supplied_p = match items.get(2) {
        Some(flag) => Some(
            flag.as_symbol()
                .ok_or_else(|| compound_error(flag.span))?
                .to_string(),
        ),
        None => None,
    };
    Ok(ArgToken::Compound {
        name: name.to_string(),
        default,
        supplied_p,
    })
}

fn compound_error(span: Span) -> QuillError {
    QuillError::compile_at(
        span,
        "argument declaration must be (name [default [supplied-p]])",
    )
}

impl fmt::Display for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut role = Role::Mandatory;
        let mut parts = Vec::new();
        for desc in &self.descriptors {
            if desc.role != role {
                parts.push(
                    match desc.role {
                        Role::Mandatory => "",
                        Role::MandatoryAfterOptional => "&REQUIRED",
                        Role::Optional => "&OPTIONAL",
                        Role::Rest => "&REST",
                        Role::Keyword | Role::RestThenKeyword => "&KEY",
                    }
                    .to_string(),
                );
                role = desc.role;
            }
            if desc.pipe {
                parts.push("&PIPE".into());
            }
            parts.push(desc.name.clone());
        }
        write!(f, "({})", parts.join(" "))
    }
}
