use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Deserialize;

use crate::argspec::ArgSpec;
use crate::arglist::Thunk;
use crate::backtrace::Backtrace;
use crate::error::QuillError;
use crate::interpreter::Interpreter;
use crate::value::Value;

pub type CtxRef = Arc<Ctx>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingVariable {
    Nil,
    #[default]
    Raise,
}

#[derive(Default)]
struct Scope {
    vars: HashMap<String, Value>,
    props: HashMap<String, HashMap<String, Value>>,
}

#[derive(Clone)]
pub(crate) enum Slot {
    Unset,
    Ready(Value),
    Deferred(Arc<Thunk>),
}

pub(crate) struct CallSlots {
    spec: Arc<ArgSpec>,
    values: RwLock<Vec<Slot>>,
    supplied: RwLock<Vec<Option<bool>>>,
}

pub struct Ctx {
    scope: RwLock<Scope>,
    parent: Option<CtxRef>,
    call: Option<CallSlots>,
    missing: MissingVariable,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl Ctx {
    pub fn new_root(missing: MissingVariable) -> CtxRef {
        Arc::new(Self {
            scope: RwLock::new(Scope::default()),
            parent: None,
            call: None,
            missing,
        })
    }

    pub fn new_child(parent: &CtxRef) -> CtxRef {
        Arc::new(Self {
            scope: RwLock::new(Scope::default()),
            parent: Some(parent.clone()),
            call: None,
            missing: parent.missing,
        })
    }

    pub(crate) fn new_call_frame(parent: &CtxRef, spec: Arc<ArgSpec>) -> CtxRef {
        let len = spec.len();
        Arc::new(Self {
            scope: RwLock::new(Scope::default()),
            parent: Some(parent.clone()),
            call: Some(CallSlots {
                spec,
                values: RwLock::new(vec![Slot::Unset; len]),
                supplied: RwLock::new(vec![None; len]),
            }),
            missing: parent.missing,
        })
    }

    pub fn parent(&self) -> Option<&CtxRef> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_call_frame(&self) -> bool {
        self.call.is_some()
    }

    pub fn missing_variable(&self) -> MissingVariable {
        self.missing
    }

    fn root(&self) -> &Ctx {
        let mut current = self;
        while let Some(parent) = &current.parent {
            current = parent;
        }
        current
    }

    fn chain(&self) -> impl Iterator<Item = &Ctx> {
        std::iter::successors(Some(self), |ctx| ctx.parent.as_deref())
    }

    pub fn get(
        &self,
        name: &str,
        rt: &Interpreter,
        bt: &mut Backtrace,
    ) -> Result<Value, QuillError> {
        for ctx in self.chain() {
            if let Some(value) = ctx.lookup_local(name, rt, bt)? {
                return Ok(value);
            }
        }
        match self.missing {
            MissingVariable::Nil => Ok(Value::Nil),
            MissingVariable::Raise => Err(QuillError::unbound_variable(name)),
        }
    }

    fn lookup_local(
        &self,
        name: &str,
        rt: &Interpreter,
        bt: &mut Backtrace,
    ) -> Result<Option<Value>, QuillError> {
        if let Some(value) = read(&self.scope).vars.get(name) {
            return Ok(Some(value.clone()));
        }
        let Some(call) = &self.call else {
            return Ok(None);
        };
        if let Some(idx) = call.spec.index_of(name) {
            let slot = read(&call.values)[idx].clone();
            match slot {
                Slot::Unset => {}
                Slot::Ready(value) => return Ok(Some(value)),
                Slot::Deferred(thunk) => return thunk.force(rt, bt).map(Some),
            }
        }
        if let Some(idx) = call.spec.supplied_index(name) {
            if let Some(supplied) = read(&call.supplied)[idx] {
                return Ok(Some(Value::Bool(supplied)));
            }
        }
        Ok(None)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chain().any(|ctx| ctx.contains_local(name))
    }

    pub fn contains_local(&self, name: &str) -> bool {
        if read(&self.scope).vars.contains_key(name) {
            return true;
        }
        let Some(call) = &self.call else {
            return false;
        };
        if let Some(idx) = call.spec.index_of(name) {
            if !matches!(read(&call.values)[idx], Slot::Unset) {
                return true;
            }
        }
        call.spec
            .supplied_index(name)
            .is_some_and(|idx| read(&call.supplied)[idx].is_some())
    }

    pub fn define(&self, name: &str, value: Value) -> Result<(), QuillError> {
        if self.contains_local(name) {
            return Err(QuillError::illegal_state(format!(
                "variable {} is already defined in this scope",
                name
            )));
        }
        self.set_local(name, value);
        Ok(())
    }

    pub fn set_local(&self, name: &str, value: Value) {
        write(&self.scope).vars.insert(name.to_string(), value);
    }

    pub fn update_nearest(&self, name: &str, value: Value) {
        let target = self
            .chain()
            .find(|ctx| ctx.contains_local(name))
            .unwrap_or(self);
        target.set_local(name, value);
    }

    pub fn update_global(&self, name: &str, value: Value) {
        self.root().set_local(name, value);
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut removed = false;
        for ctx in self.chain() {
            removed |= ctx.remove_local(name);
        }
        removed
    }

    fn remove_local(&self, name: &str) -> bool {
        let mut removed = write(&self.scope).vars.remove(name).is_some();
        let Some(call) = &self.call else {
            return removed;
        };
        if let Some(idx) = call.spec.index_of(name) {
            let previous = std::mem::replace(&mut write(&call.values)[idx], Slot::Unset);
            removed |= !matches!(previous, Slot::Unset);
        }
        if let Some(idx) = call.spec.supplied_index(name) {
            removed |= write(&call.supplied)[idx].take().is_some();
        }
        removed
    }

    fn property_owner(&self, name: &str) -> Option<&Ctx> {
        self.chain()
            .find(|ctx| ctx.contains_local(name) || read(&ctx.scope).props.contains_key(name))
    }

    pub fn set_property(&self, name: &str, key: &str, value: Value) {
        let owner = self.property_owner(name).unwrap_or(self);
        write(&owner.scope)
            .props
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn get_property(&self, name: &str, key: &str) -> Option<Value> {
        let owner = self.property_owner(name)?;
        let scope = read(&owner.scope);
        let value = scope.props.get(name).and_then(|props| props.get(key)).cloned();
        value
    }

    pub fn get_properties(&self, name: &str) -> HashMap<String, Value> {
        self.property_owner(name)
            .and_then(|owner| read(&owner.scope).props.get(name).cloned())
            .unwrap_or_default()
    }

    pub fn find_matching_names(&self, prefix: &str) -> Vec<String> {
        let mut names = BTreeSet::new();
        for ctx in self.chain() {
            for name in ctx.local_names() {
                if name.starts_with(prefix) {
                    names.insert(name);
                }
            }
        }
        names.into_iter().collect()
    }

    fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.scope).vars.keys().cloned().collect();
        if let Some(call) = &self.call {
            let values = read(&call.values);
            let supplied = read(&call.supplied);
            for (idx, desc) in call.spec.descriptors().iter().enumerate() {
                if !matches!(values[idx], Slot::Unset) {
                    names.push(desc.name.clone());
                }
                if let (Some(flag), Some(_)) = (&desc.supplied_p, supplied[idx]) {
                    names.push(flag.clone());
                }
            }
        }
        names
    }

    pub(crate) fn fill_slot(&self, idx: usize, slot: Slot, supplied: bool) {
        if let Some(call) = &self.call {
            write(&call.values)[idx] = slot;
            write(&call.supplied)[idx] = Some(supplied);
        }
    }
}

impl fmt::Debug for Ctx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.local_names();
        names.sort();
        f.debug_struct("Ctx")
            .field("names", &names)
            .field("call_frame", &self.call.is_some())
            .field("root", &self.parent.is_none())
            .finish()
    }
}
