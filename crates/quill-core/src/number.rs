//! Numeric promotion: operator sites fold every operand into a running
//! "widest kind seen", compute in that kind's working representation and
//! narrow the result back down to it.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::QuillError;
use crate::value::Value;

/// Dotted numeric version such as `1.4.2`. Missing components compare as zero.
#[derive(Clone, Debug)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    pub fn new(parts: Vec<u64>) -> Self {
        Self { parts }
    }

    pub fn parse(text: &str) -> Result<Self, QuillError> {
        let trimmed = text.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(QuillError::illegal_argument("empty version string"));
        }
        let parts = trimmed
            .split('.')
            .map(|part| {
                part.parse::<u64>().map_err(|_| {
                    QuillError::illegal_argument(format!("invalid version component '{}'", part))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    fn significant(&self) -> &[u64] {
        let len = self
            .parts
            .iter()
            .rposition(|part| *part != 0)
            .map_or(0, |idx| idx + 1);
        &self.parts[..len]
    }

    fn zip_with(
        &self,
        other: &Version,
        f: impl Fn(u64, u64) -> Option<u64>,
    ) -> Option<Version> {
        let len = self.parts.len().max(other.parts.len());
        let mut parts = Vec::with_capacity(len);
        for idx in 0..len {
            let a = self.parts.get(idx).copied().unwrap_or(0);
            let b = other.parts.get(idx).copied().unwrap_or(0);
            parts.push(f(a, b)?);
        }
        Some(Version { parts })
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.significant().cmp(other.significant())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(u64::to_string).collect();
        write!(f, "{}", rendered.join("."))
    }
}

/// Numeric kinds ordered from narrowest to widest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumKind {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Version,
}

impl NumKind {
    pub fn of(value: &Value) -> Option<NumKind> {
        match value {
            Value::Byte(_) => Some(NumKind::Byte),
            Value::Short(_) => Some(NumKind::Short),
            Value::Int(_) => Some(NumKind::Int),
            Value::Long(_) => Some(NumKind::Long),
            Value::Float(_) => Some(NumKind::Float),
            Value::Double(_) => Some(NumKind::Double),
            Value::Version(_) => Some(NumKind::Version),
            _ => None,
        }
    }

    pub fn is_integer(self) -> bool {
        self <= NumKind::Long
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "MOD",
        }
    }

    /// Operand used when an operator is applied to fewer operands than it folds over.
    pub fn neutral(self) -> Option<Value> {
        match self {
            ArithOp::Add | ArithOp::Sub => Some(Value::Int(0)),
            ArithOp::Mul | ArithOp::Div => Some(Value::Int(1)),
            ArithOp::Rem => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Promotion {
    widest: Option<NumKind>,
}

impl Promotion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn widest(&self) -> Option<NumKind> {
        self.widest
    }

    /// Folds one operand into the widest kind seen. Never narrows.
    pub fn promote(&mut self, value: &Value) -> Result<NumKind, QuillError> {
        let kind = NumKind::of(value).ok_or_else(|| QuillError::type_mismatch("number", value))?;
        self.widest = Some(self.widest.map_or(kind, |widest| widest.max(kind)));
        Ok(kind)
    }

    /// Applies `op` in the working representation of the widest kind seen:
    /// `Long` for the integer family, `Float`, `Double` or `Version`.
    pub fn combine(&self, op: ArithOp, a: &Value, b: &Value) -> Result<Value, QuillError> {
        match self.widest.unwrap_or(NumKind::Int) {
            kind if kind.is_integer() => {
                let (x, y) = (int_operand(a)?, int_operand(b)?);
                combine_long(op, x, y).map(Value::Long)
            }
            NumKind::Float => {
                let (x, y) = (float_operand(a)? as f32, float_operand(b)? as f32);
                Ok(Value::Float(match op {
                    ArithOp::Add => x + y,
                    ArithOp::Sub => x - y,
                    ArithOp::Mul => x * y,
                    ArithOp::Div => x / y,
                    ArithOp::Rem => x % y,
                }))
            }
            NumKind::Double => {
                let (x, y) = (float_operand(a)?, float_operand(b)?);
                Ok(Value::Double(match op {
                    ArithOp::Add => x + y,
                    ArithOp::Sub => x - y,
                    ArithOp::Mul => x * y,
                    ArithOp::Div => x / y,
                    ArithOp::Rem => x % y,
                }))
            }
            _ => {
                let (x, y) = (version_operand(a)?, version_operand(b)?);
                let result = match op {
                    ArithOp::Add => x.zip_with(&y, u64::checked_add),
                    ArithOp::Sub => x.zip_with(&y, u64::checked_sub),
                    _ => {
                        return Err(QuillError::arithmetic(format!(
                            "operator {} is not defined for versions",
                            op.symbol()
                        )))
                    }
                };
                result.map(Value::Version).ok_or_else(|| {
                    QuillError::arithmetic(format!(
                        "version component out of range in {} {} {}",
                        x,
                        op.symbol(),
                        y
                    ))
                })
            }
        }
    }

    /// Narrows a working-representation result back down to the widest kind seen.
    pub fn finish(&self, result: Value) -> Value {
        match (self.widest, result) {
            (Some(NumKind::Byte), Value::Long(n)) => Value::Byte(n as i8),
            (Some(NumKind::Short), Value::Long(n)) => Value::Short(n as i16),
            (Some(NumKind::Int), Value::Long(n)) => Value::Int(n as i32),
            (Some(NumKind::Float), Value::Double(n)) => Value::Float(n as f32),
            (_, other) => other,
        }
    }

    /// Orders two operands in the widest kind seen; `None` when unordered (NaN).
    pub fn compare(&self, a: &Value, b: &Value) -> Result<Option<Ordering>, QuillError> {
        match self.widest.unwrap_or(NumKind::Int) {
            kind if kind.is_integer() => Ok(Some(int_operand(a)?.cmp(&int_operand(b)?))),
            NumKind::Float | NumKind::Double => {
                Ok(float_operand(a)?.partial_cmp(&float_operand(b)?))
            }
            _ => Ok(Some(version_operand(a)?.cmp(&version_operand(b)?))),
        }
    }
}

fn combine_long(op: ArithOp, x: i64, y: i64) -> Result<i64, QuillError> {
    if matches!(op, ArithOp::Div | ArithOp::Rem) && y == 0 {
        return Err(QuillError::arithmetic("division by zero"));
    }
    let result = match op {
        ArithOp::Add => x.checked_add(y),
        ArithOp::Sub => x.checked_sub(y),
        ArithOp::Mul => x.checked_mul(y),
        ArithOp::Div => x.checked_div(y),
        ArithOp::Rem => x.checked_rem(y),
    };
    result.ok_or_else(|| {
        QuillError::arithmetic(format!("integer overflow in {} {} {}", x, op.symbol(), y))
    })
}

fn int_operand(value: &Value) -> Result<i64, QuillError> {
    value
        .as_i64()
        .ok_or_else(|| QuillError::type_mismatch("integer", value))
}

fn float_operand(value: &Value) -> Result<f64, QuillError> {
    match value {
        Value::Float(n) => Ok(f64::from(*n)),
        Value::Double(n) => Ok(*n),
        other => other
            .as_i64()
            .map(|n| n as f64)
            .ok_or_else(|| QuillError::type_mismatch("number", other)),
    }
}

fn version_operand(value: &Value) -> Result<Version, QuillError> {
    match value {
        Value::Version(v) => Ok(v.clone()),
        Value::Float(n) => Version::parse(&n.to_string()),
        Value::Double(n) => Version::parse(&n.to_string()),
        other => match other.as_i64() {
            Some(n) if n >= 0 => Ok(Version::new(vec![n as u64])),
            Some(n) => Err(QuillError::arithmetic(format!(
                "cannot promote negative number {} to a version",
                n
            ))),
            None => Err(QuillError::type_mismatch("number", other)),
        },
    }
}

/// Folds `op` left to right over `args` with promotion decided from all operands first.
pub fn fold(op: ArithOp, args: &[Value]) -> Result<Value, QuillError> {
    let mut promotion = Promotion::new();
    for arg in args {
        promotion.promote(arg)?;
    }
    let neutral = || {
        op.neutral().ok_or_else(|| {
            QuillError::arity(format!("{} expects at least 2 arguments", op.symbol()))
        })
    };
    let result = match args {
        [] => {
            let identity = neutral()?;
            promotion.promote(&identity)?;
            identity
        }
        [single] => match op {
            ArithOp::Sub | ArithOp::Div => {
                let identity = neutral()?;
                promotion.promote(&identity)?;
                promotion.combine(op, &identity, single)?
            }
            ArithOp::Rem => {
                return Err(QuillError::arity("MOD expects at least 2 arguments"));
            }
            _ => single.clone(),
        },
        [first, rest @ ..] => {
            let mut acc = first.clone();
            for arg in rest {
                acc = promotion.combine(op, &acc, arg)?;
            }
            acc
        }
    };
    Ok(promotion.finish(result))
}

/// True when every adjacent pair satisfies `pred` under promotion.
pub fn compare_chain(
    args: &[Value],
    pred: impl Fn(Ordering) -> bool,
) -> Result<bool, QuillError> {
    let mut promotion = Promotion::new();
    for arg in args {
        promotion.promote(arg)?;
    }
    for pair in args.windows(2) {
        match promotion.compare(&pair[0], &pair[1])? {
            Some(ordering) if pred(ordering) => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}
