use crate::value::{RuntimeError, Val};
use rustc_hash::FxHashMap;
use std::{cell::RefCell, rc::Rc};

pub type ScopeLink = Rc<RefCell<Scope>>;

/// One level of the lexical environment. Lookups walk the parent chain;
/// closures keep their defining scope alive by holding a link to it.
#[derive(Default)]
pub struct Scope {
    vars: FxHashMap<Rc<str>, Val>,
    parent: Option<ScopeLink>,
}

impl Scope {
    pub fn root() -> ScopeLink {
        Rc::new(RefCell::new(Scope::default()))
    }

    pub fn extend(parent: &ScopeLink) -> ScopeLink {
        Rc::new(RefCell::new(Scope {
            vars: FxHashMap::default(),
            parent: Some(parent.clone()),
        }))
    }

    /// Introduces `id` in this scope, shadowing any outer binding.
    pub fn def(&mut self, id: Rc<str>, val: Val) {
        self.vars.insert(id, val);
    }

    pub fn get_here(&self, id: &str) -> Option<Val> {
        self.vars.get(id).cloned()
    }

    /// Nearest scope in the chain that binds `id`.
    pub fn lookup(scope: &ScopeLink, id: &str) -> Option<ScopeLink> {
        let mut cur = scope.clone();
        loop {
            let next = {
                let borrow = cur.borrow();
                if borrow.vars.contains_key(id) {
                    None
                } else {
                    Some(borrow.parent.clone()?)
                }
            };
            match next {
                Some(parent) => cur = parent,
                None => return Some(cur),
            }
        }
    }

    pub fn get(scope: &ScopeLink, id: &str) -> Result<Val, RuntimeError> {
        let found = Scope::lookup(scope, id).ok_or_else(|| RuntimeError::UndefinedVariable(id.into()))?;
        let val = found.borrow().get_here(id);
        val.ok_or_else(|| RuntimeError::UndefinedVariable(id.into()))
    }

    /// Rebinds the nearest existing `id`. Assigning to an unbound name is an error.
    pub fn set(scope: &ScopeLink, id: &str, val: Val) -> Result<(), RuntimeError> {
        let found = Scope::lookup(scope, id).ok_or_else(|| RuntimeError::UndefinedVariable(id.into()))?;
        let mut borrow = found.borrow_mut();
        match borrow.vars.get_mut(id) {
            Some(slot) => {
                *slot = val;
                Ok(())
            }
            None => Err(RuntimeError::UndefinedVariable(id.into())),
        }
    }
}
