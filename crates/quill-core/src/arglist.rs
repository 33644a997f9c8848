use std::sync::{Arc, Mutex};

use crate::argspec::{ArgSpec, Role};
use crate::backtrace::Backtrace;
use crate::ctx::{Ctx, CtxRef, Slot};
use crate::error::QuillError;
use crate::interpreter::Interpreter;
use crate::node::Node;
use crate::value::Value;

/// What a call site supplied for one descriptor.
#[derive(Clone, Debug)]
pub enum Bound {
    Missing,
    Expr(Node),
    Rest(Vec<Node>),
}

/// Call-site expressions distributed over the descriptors of a spec.
#[derive(Clone, Debug)]
pub struct ArgList {
    spec: Arc<ArgSpec>,
    bound: Vec<Bound>,
}

impl ArgList {
    pub fn bind(spec: Arc<ArgSpec>, exprs: Vec<Node>) -> Result<Self, QuillError> {
        let descriptors = spec.descriptors();
        let mut bound = vec![Bound::Missing; descriptors.len()];

        let head: Vec<usize> = indices(&spec, |role| role == Role::Mandatory);
        let tail: Vec<usize> = indices(&spec, |role| role == Role::MandatoryAfterOptional);
        let optional: Vec<usize> = indices(&spec, |role| role == Role::Optional);
        let rest = descriptors.iter().position(|d| d.role == Role::Rest);

        let required = head.len() + tail.len();
        if exprs.len() < required {
            return Err(QuillError::arity(format!(
                "insufficient arguments: expected at least {}, got {}",
                required,
                exprs.len()
            )));
        }

        let mut middle = exprs;
        let trailing = middle.split_off(middle.len() - tail.len());
        for (idx, expr) in tail.iter().zip(trailing) {
            bound[*idx] = Bound::Expr(expr);
        }
        let mut remaining = middle.into_iter();
        for idx in &head {
            if let Some(expr) = remaining.next() {
                bound[*idx] = Bound::Expr(expr);
            }
        }
        for idx in &optional {
            match remaining.next() {
                Some(expr) => bound[*idx] = Bound::Expr(expr),
                None => break,
            }
        }
        let remaining: Vec<Node> = remaining.collect();

        if spec.has_keywords() {
            bind_keywords(&spec, &remaining, &mut bound)?;
        }
        match rest {
            Some(idx) => bound[idx] = Bound::Rest(remaining),
            None if !spec.has_keywords() && !remaining.is_empty() => {
                return Err(QuillError::arity(format!(
                    "too many arguments: expected at most {}, got {}",
                    head.len() + tail.len() + optional.len(),
                    required + optional.len() + remaining.len()
                )));
            }
            None => {}
        }
        Ok(Self { spec, bound })
    }

    pub fn spec(&self) -> &Arc<ArgSpec> {
        &self.spec
    }

    pub fn bound(&self) -> &[Bound] {
        &self.bound
    }

    /// Evaluates every bound expression eagerly in `caller`, in descriptor
    /// order. Missing arguments are nil and rest arguments become one list.
    pub fn values(
        &self,
        rt: &Interpreter,
        bt: &mut Backtrace,
        caller: &CtxRef,
    ) -> Result<Vec<Value>, QuillError> {
        let mut values = Vec::with_capacity(self.bound.len());
        for bound in &self.bound {
            values.push(match bound {
                Bound::Missing => Value::Nil,
                Bound::Expr(expr) => expr.evaluate(rt, bt, caller)?,
                Bound::Rest(exprs) => eval_rest(exprs, rt, bt, caller)?,
            });
        }
        Ok(values)
    }
}

fn indices(spec: &ArgSpec, pred: impl Fn(Role) -> bool) -> Vec<usize> {
    spec.descriptors()
        .iter()
        .enumerate()
        .filter(|(_, d)| pred(d.role))
        .map(|(idx, _)| idx)
        .collect()
}

fn bind_keywords(spec: &ArgSpec, exprs: &[Node], bound: &mut [Bound]) -> Result<(), QuillError> {
    if exprs.len() % 2 != 0 {
        return Err(QuillError::binding(
            "odd number of keyword arguments: expected :key value pairs",
        ));
    }
    for pair in exprs.chunks(2) {
        let key = pair[0]
            .constant()
            .and_then(Value::as_keyword)
            .ok_or_else(|| {
                QuillError::binding(format!("expected a keyword, got {}", pair[0].name()))
            })?;
        match spec.keyword_index(key) {
            Some(idx) => {
                if !matches!(bound[idx], Bound::Missing) {
                    return Err(QuillError::binding(format!(
                        "keyword argument :{} supplied twice",
                        key
                    )));
                }
                bound[idx] = Bound::Expr(pair[1].clone());
            }
            None if spec.allows_other_keys() => {}
            None => {
                return Err(QuillError::binding(format!(
                    "unknown keyword argument :{}",
                    key
                )));
            }
        }
    }
    Ok(())
}

fn eval_rest(
    exprs: &[Node],
    rt: &Interpreter,
    bt: &mut Backtrace,
    caller: &CtxRef,
) -> Result<Value, QuillError> {
    let mut items = im::Vector::new();
    for expr in exprs {
        items.push_back(expr.evaluate(rt, bt, caller)?);
    }
    Ok(Value::List(items))
}

/// A call frame populated from an [`ArgList`].
pub struct Eargs {
    frame: CtxRef,
}

impl Eargs {
    /// Builds the frame for one invocation. Supplied arguments are evaluated in
    /// `caller`; defaults are evaluated in the new frame, which is chained to
    /// `defining`.
    pub fn new(
        rt: &Interpreter,
        bt: &mut Backtrace,
        caller: &CtxRef,
        defining: &CtxRef,
        args: &ArgList,
    ) -> Result<Self, QuillError> {
        let frame = Ctx::new_call_frame(defining, args.spec.clone());
        for (idx, (desc, bound)) in args.spec.descriptors().iter().zip(&args.bound).enumerate() {
            match bound {
                Bound::Missing => {
                    let value = match &desc.default {
                        Some(default) => default.evaluate(rt, bt, &frame)?,
                        None if desc.role == Role::Rest => Value::List(im::Vector::new()),
                        None => Value::Nil,
                    };
                    frame.fill_slot(idx, Slot::Ready(value), false);
                }
                Bound::Expr(expr) if desc.lazy => {
                    let thunk = Thunk::new(expr.clone(), caller.clone());
                    frame.fill_slot(idx, Slot::Deferred(Arc::new(thunk)), true);
                }
                Bound::Expr(expr) => {
                    let value = expr.evaluate(rt, bt, caller)?;
                    frame.fill_slot(idx, Slot::Ready(value), true);
                }
                Bound::Rest(exprs) => {
                    let value = eval_rest(exprs, rt, bt, caller)?;
                    frame.fill_slot(idx, Slot::Ready(value), !exprs.is_empty());
                }
            }
        }
        Ok(Self { frame })
    }

    pub fn frame(&self) -> &CtxRef {
        &self.frame
    }

    pub fn into_frame(self) -> CtxRef {
        self.frame
    }
}

enum ThunkState {
    Pending { expr: Node, env: CtxRef },
    Forcing,
    Done(Value),
}

/// Deferred argument, evaluated on first read and memoized.
pub struct Thunk {
    state: Mutex<ThunkState>,
}

impl Thunk {
    pub fn new(expr: Node, env: CtxRef) -> Self {
        Self {
            state: Mutex::new(ThunkState::Pending { expr, env }),
        }
    }

    pub fn force(&self, rt: &Interpreter, bt: &mut Backtrace) -> Result<Value, QuillError> {
        let (expr, env) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match std::mem::replace(&mut *state, ThunkState::Forcing) {
                ThunkState::Done(value) => {
                    *state = ThunkState::Done(value.clone());
                    return Ok(value);
                }
                ThunkState::Forcing => {
                    return Err(QuillError::illegal_state(
                        "lazy argument refers to itself while being evaluated",
                    ));
                }
                ThunkState::Pending { expr, env } => (expr, env),
            }
        };
        let result = expr.evaluate(rt, bt, &env);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match result {
            Ok(value) => {
                *state = ThunkState::Done(value.clone());
                Ok(value)
            }
            Err(err) => {
                *state = ThunkState::Pending { expr, env };
                Err(err)
            }
        }
    }

    pub fn is_forced(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            ThunkState::Done(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(tokens: &[&str]) -> Arc<ArgSpec> {
        Arc::new(ArgSpec::parse(tokens).unwrap())
    }

    fn lits(values: Vec<Value>) -> Vec<Node> {
        values.into_iter().map(|v| Node::literal(v, None)).collect()
    }

    fn kw(name: &str) -> Value {
        Value::Keyword(name.into())
    }

    fn bound_values(args: &ArgList) -> Vec<Value> {
        let rt = Interpreter::default();
        let mut bt = Backtrace::new();
        args.values(&rt, &mut bt, rt.root()).unwrap()
    }

    #[test]
    fn too_few_and_too_many() {
        let err = ArgList::bind(spec(&["a", "b"]), lits(vec![Value::Int(1)])).unwrap_err();
        assert!(err.to_string().contains("insufficient arguments"));
        let err = ArgList::bind(spec(&["a"]), lits(vec![Value::Int(1), Value::Int(2)]))
            .unwrap_err();
        assert!(err.to_string().contains("too many arguments"));
    }

    #[test]
    fn empty_rest() {
        let args = ArgList::bind(spec(&["&REST", "a"]), Vec::new()).unwrap();
        assert_eq!(bound_values(&args), vec![Value::list(Vec::new())]);
    }

    #[test]
    fn keywords_bind_in_any_order() {
        let spec = spec(&["&KEY", "a", "b", "c"]);
        let shuffled = ArgList::bind(
            spec.clone(),
            lits(vec![kw("c"), Value::Int(3), kw("b"), Value::Int(2), kw("a"), Value::Int(1)]),
        )
        .unwrap();
        let ordered = ArgList::bind(
            spec,
            lits(vec![kw("a"), Value::Int(1), kw("b"), Value::Int(2), kw("c"), Value::Int(3)]),
        )
        .unwrap();
        let expected = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
        assert_eq!(bound_values(&shuffled), expected);
        assert_eq!(bound_values(&ordered), expected);
    }

    #[test]
    fn unknown_keywords() {
        let err = ArgList::bind(spec(&["&KEY", "a"]), lits(vec![kw("z"), Value::Int(1)])).unwrap_err();
        assert!(err.to_string().contains("unknown keyword argument :z"));
        let args = ArgList::bind(
            spec(&["&KEY", "a", "&ALLOW-OTHER-KEYS"]),
            lits(vec![kw("z"), Value::Int(1), kw("a"), Value::Int(2)]),
        )
        .unwrap();
        assert_eq!(bound_values(&args), vec![Value::Int(2)]);
    }

    #[test]
    fn mandatory_after_optional_takes_the_last_argument() {
        let spec = spec(&["&OPTIONAL", "b", "&REQUIRED", "c"]);
        let args = ArgList::bind(spec.clone(), lits(vec![Value::Int(9)])).unwrap();
        assert_eq!(bound_values(&args), vec![Value::Nil, Value::Int(9)]);
        let args = ArgList::bind(spec, lits(vec![Value::Int(1), Value::Int(2)])).unwrap();
        assert_eq!(bound_values(&args), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn rest_and_keywords_share_the_remainder() {
        let args = ArgList::bind(
            spec(&["x", "&REST", "more", "&KEY", "k"]),
            lits(vec![Value::Int(0), kw("k"), Value::Int(5)]),
        )
        .unwrap();
        assert_eq!(
            bound_values(&args),
            vec![
                Value::Int(0),
                Value::list(vec![kw("k"), Value::Int(5)]),
                Value::Int(5)
            ]
        );
    }

    #[test]
    fn call_frame_records_supplied_flags() {
        let rt = Interpreter::default();
        let mut bt = Backtrace::new();
        let spec = spec(&["a", "&OPTIONAL", "b"]);
        let args = ArgList::bind(spec, lits(vec![Value::Int(1)])).unwrap();
        let eargs = Eargs::new(&rt, &mut bt, rt.root(), rt.root(), &args).unwrap();
        let frame = eargs.frame();
        assert_eq!(frame.get("a", &rt, &mut bt).unwrap(), Value::Int(1));
        assert_eq!(frame.get("b", &rt, &mut bt).unwrap(), Value::Nil);
        assert!(frame.is_call_frame());
    }
}
