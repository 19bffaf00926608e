use crate::ast::FuncBody;
use crate::scope::ScopeLink;
use rustc_hash::FxHashMap;
use std::{
    cell::RefCell,
    fmt,
    rc::Rc,
};
use thiserror::Error;

pub type TableRef = Rc<RefCell<Table>>;

#[derive(Clone)]
pub enum Val {
    String(Rc<str>),
    Num(f64),
    Bool(bool),
    Table(TableRef),
    LuaFunc(Rc<Closure>),
    NativeFunc(NativeFunc),
    Generator(Generator),
    Nil,
}

impl Val {
    /// Only `nil` and `false` are falsy.
    pub fn truthy(&self) -> bool {
        !matches!(self, Val::Nil | Val::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::String(_) => "string",
            Val::Num(_) => "number",
            Val::Bool(_) => "boolean",
            Val::Table(_) => "table",
            Val::LuaFunc(_) | Val::NativeFunc(_) => "function",
            Val::Generator(_) => "iterator",
            Val::Nil => "nil",
        }
    }

    pub fn table(table: Table) -> Val {
        Val::Table(Rc::new(RefCell::new(table)))
    }
}

// Typed equality: no coercion between kinds, reference kinds compare by identity.
impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::String(a), Val::String(b)) => a == b,
            (Val::Num(a), Val::Num(b)) => a == b,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Nil, Val::Nil) => true,
            (Val::Table(a), Val::Table(b)) => Rc::ptr_eq(a, b),
            (Val::LuaFunc(a), Val::LuaFunc(b)) => Rc::ptr_eq(a, b),
            (Val::NativeFunc(a), Val::NativeFunc(b)) => Rc::ptr_eq(&a.func, &b.func),
            (Val::Generator(a), Val::Generator(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::String(x) => write!(f, "{}", x),
            Self::Num(x) => fmt_number(*x, f),
            Self::Bool(x) => write!(f, "{}", x),
            Self::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            Self::LuaFunc(c) => write!(f, "function: {}", c.name),
            Self::NativeFunc(n) => write!(f, "function: builtin: {}", n.name),
            Self::Generator(g) => write!(f, "iterator: {:p}", Rc::as_ptr(&g.0)),
            Self::Nil => write!(f, "nil"),
        }
    }
}

// Tables may contain themselves, so Debug never recurses into them.
impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::String(x) => write!(f, "String({:?})", x),
            Self::Num(x) => write!(f, "Num({:?})", x),
            Self::Bool(x) => write!(f, "Bool({})", x),
            Self::Nil => write!(f, "Nil"),
            other => write!(f, "{}", other),
        }
    }
}

fn fmt_number(x: f64, f: &mut fmt::Formatter) -> fmt::Result {
    if x.is_nan() {
        write!(f, "nan")
    } else if x.is_infinite() {
        write!(f, "{}", if x > 0.0 { "inf" } else { "-inf" })
    } else if x.fract() == 0.0 && x.abs() < 1e15 {
        write!(f, "{}", x as i64)
    } else {
        write!(f, "{}", x)
    }
}

/// A Lua function value: the shared body plus the scope it was defined in.
pub struct Closure {
    pub name: Rc<str>,
    pub body: Rc<FuncBody>,
    pub scope: ScopeLink,
}

pub type NativeFn = dyn Fn(&[Val]) -> Result<Val, RuntimeError>;

/// A host function installed into the root scope.
#[derive(Clone)]
pub struct NativeFunc {
    pub name: Rc<str>,
    func: Rc<NativeFn>,
}

impl NativeFunc {
    pub fn new(name: &str, func: impl Fn(&[Val]) -> Result<Val, RuntimeError> + 'static) -> Self {
        NativeFunc {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn call(&self, args: &[Val]) -> Result<Val, RuntimeError> {
        (self.func)(args)
    }
}

/// Iterator-protocol object driving a generic `for`. Each step produces the
/// values bound positionally to the loop names; `None` signals completion.
#[derive(Clone)]
pub struct Generator(Rc<RefCell<dyn Iterator<Item = Vec<Val>>>>);

impl Generator {
    pub fn new(iter: impl Iterator<Item = Vec<Val>> + 'static) -> Self {
        Generator(Rc::new(RefCell::new(iter)))
    }

    pub fn advance(&self) -> Option<Vec<Val>> {
        self.0.borrow_mut().next()
    }
}

/// Hashable form of a table key. Integral numbers collapse to `Int` so that
/// `t[1]` and `t[1.0]` address the same slot and `ipairs` can find them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Int(i64),
    Float(u64),
    String(Rc<str>),
    Bool(bool),
    Ref(usize),
}

impl TableKey {
    pub fn from_val(val: &Val) -> Result<TableKey, RuntimeError> {
        Ok(match val {
            Val::Nil => return Err(RuntimeError::InvalidKey("nil")),
            Val::Num(n) if n.is_nan() => return Err(RuntimeError::InvalidKey("NaN")),
            Val::Num(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => TableKey::Int(*n as i64),
            Val::Num(n) => TableKey::Float(n.to_bits()),
            Val::String(s) => TableKey::String(s.clone()),
            Val::Bool(b) => TableKey::Bool(*b),
            Val::Table(t) => TableKey::Ref(Rc::as_ptr(t) as *const () as usize),
            Val::LuaFunc(c) => TableKey::Ref(Rc::as_ptr(c) as *const () as usize),
            Val::NativeFunc(n) => TableKey::Ref(Rc::as_ptr(&n.func) as *const () as usize),
            Val::Generator(g) => TableKey::Ref(Rc::as_ptr(&g.0) as *const () as usize),
        })
    }
}

/// Insertion-ordered map from values to values.
#[derive(Default)]
pub struct Table {
    entries: Vec<(Val, Val)>,
    index: FxHashMap<TableKey, usize>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing keys, including keys that could never be stored, read as `nil`.
    pub fn get(&self, key: &Val) -> Val {
        TableKey::from_val(key)
            .ok()
            .and_then(|k| self.index.get(&k))
            .map_or(Val::Nil, |&i| self.entries[i].1.clone())
    }

    /// Stores `value` under `key`; storing `nil` removes the entry.
    pub fn set(&mut self, key: Val, value: Val) -> Result<(), RuntimeError> {
        let hashed = TableKey::from_val(&key)?;
        match (self.index.get(&hashed).copied(), value) {
            (Some(i), Val::Nil) => {
                self.index.remove(&hashed);
                self.entries.remove(i);
                for slot in self.index.values_mut() {
                    if *slot > i {
                        *slot -= 1;
                    }
                }
            }
            (Some(i), value) => self.entries[i].1 = value,
            (None, Val::Nil) => {}
            (None, value) => {
                self.index.insert(hashed, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[(Val, Val)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(Rc<str>),
    #[error("attempt to call a {0} value")]
    NotCallable(&'static str),
    #[error("attempt to iterate over a {0} value")]
    NotIterable(&'static str),
    #[error("attempt to get length of a {0} value (only strings have a length)")]
    LengthOfNonString(&'static str),
    #[error("attempt to perform arithmetic ({op}) on a {type_name} value")]
    Arithmetic {
        op: &'static str,
        type_name: &'static str,
    },
    #[error("attempt to concatenate a {0} value")]
    Concat(&'static str),
    #[error("attempt to compare {left} with {right}")]
    Compare {
        left: &'static str,
        right: &'static str,
    },
    #[error("attempt to index a {0} value")]
    IndexNonTable(&'static str),
    #[error("table index is {0}")]
    InvalidKey(&'static str),
    #[error("method reference outside of a call")]
    MethodOutsideCall,
    #[error("cannot assign to this expression")]
    InvalidAssignTarget,
    #[error("'for' {0} value must be a number")]
    ForNonNumber(&'static str),
    #[error("break outside of a loop")]
    BreakOutsideLoop,
    #[error("stack overflow (more than {0} nested calls)")]
    StackOverflow(usize),
    #[error("bad argument #{position} to '{func}' ({expected} expected, got {got})")]
    BadArgument {
        func: Rc<str>,
        position: usize,
        expected: &'static str,
        got: &'static str,
    },
    #[error("output error: {0}")]
    Output(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numbers_display_like_lua() {
        assert_eq!(Val::Num(7.0).to_string(), "7");
        assert_eq!(Val::Num(-2.5).to_string(), "-2.5");
        assert_eq!(Val::Num(f64::NAN).to_string(), "nan");
        assert_eq!(Val::Num(f64::NEG_INFINITY).to_string(), "-inf");
    }

    #[test]
    fn integral_keys_share_a_slot() {
        let mut t = Table::new();
        t.set(Val::Num(1.0), Val::String("one".into())).unwrap();
        t.set(Val::Num(1.5), Val::Bool(true)).unwrap();
        assert_eq!(t.get(&Val::Num(1.0)), Val::String("one".into()));
        assert_eq!(t.get(&Val::Num(1.5)), Val::Bool(true));
        assert_eq!(t.get(&Val::Num(2.0)), Val::Nil);
        assert_eq!(t.get(&Val::Nil), Val::Nil);
    }

    #[test]
    fn setting_nil_removes_and_keeps_order() {
        let mut t = Table::new();
        for (k, v) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
            t.set(Val::String(k.into()), Val::Num(v)).unwrap();
        }
        t.set(Val::String("a".into()), Val::Nil).unwrap();
        t.set(Val::String("c".into()), Val::Num(30.0)).unwrap();
        let keys: Vec<_> = t.entries().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "c"]);
        assert_eq!(t.get(&Val::String("c".into())), Val::Num(30.0));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn invalid_keys() {
        let mut t = Table::new();
        assert_eq!(t.set(Val::Nil, Val::Num(1.0)), Err(RuntimeError::InvalidKey("nil")));
        assert_eq!(
            t.set(Val::Num(f64::NAN), Val::Num(1.0)),
            Err(RuntimeError::InvalidKey("NaN"))
        );
        assert!(t.is_empty());
    }

    #[test]
    fn tables_compare_by_identity() {
        let a = Val::table(Table::new());
        let b = Val::table(Table::new());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        let mut t = Table::new();
        t.set(a.clone(), Val::Num(1.0)).unwrap();
        assert_eq!(t.get(&a), Val::Num(1.0));
        assert_eq!(t.get(&b), Val::Nil);
    }
}
