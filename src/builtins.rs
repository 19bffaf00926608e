//! Host functions available to every program.

use crate::scope::ScopeLink;
use crate::value::{Generator, NativeFunc, RuntimeError, TableRef, Val};
use std::{cell::RefCell, io, io::Write, iter, rc::Rc};

pub(crate) fn install(scope: &ScopeLink) {
    let mut scope = scope.borrow_mut();
    for native in [print(Rc::new(RefCell::new(io::stdout()))), pairs(), ipairs()] {
        scope.def(native.name.clone(), Val::NativeFunc(native));
    }
}

/// `print(...)`: display forms joined by tabs, then a newline.
pub fn print(out: Rc<RefCell<dyn Write>>) -> NativeFunc {
    NativeFunc::new("print", move |args| {
        let line = args.iter().map(Val::to_string).collect::<Vec<_>>().join("\t");
        writeln!(out.borrow_mut(), "{line}").map_err(|err| RuntimeError::Output(err.to_string()))?;
        Ok(Val::Nil)
    })
}

/// `pairs(t)`: every entry of a snapshot of `t`, in insertion order.
pub fn pairs() -> NativeFunc {
    NativeFunc::new("pairs", |args| {
        let table = expect_table("pairs", args)?;
        let snapshot = table.borrow().entries().to_vec();
        Ok(Val::Generator(Generator::new(
            snapshot.into_iter().map(|(key, value)| vec![key, value]),
        )))
    })
}

/// `ipairs(t)`: `(i, t[i])` for `i = 1, 2, ...` up to the first hole.
pub fn ipairs() -> NativeFunc {
    NativeFunc::new("ipairs", |args| {
        let table = expect_table("ipairs", args)?;
        let mut i = 0.0;
        let items = iter::from_fn(move || {
            i += 1.0;
            match table.borrow().get(&Val::Num(i)) {
                Val::Nil => None,
                value => Some(vec![Val::Num(i), value]),
            }
        });
        Ok(Val::Generator(Generator::new(items)))
    })
}

fn expect_table(func: &str, args: &[Val]) -> Result<TableRef, RuntimeError> {
    match args.first() {
        Some(Val::Table(table)) => Ok(table.clone()),
        other => Err(RuntimeError::BadArgument {
            func: func.into(),
            position: 1,
            expected: "table",
            got: other.map_or("no value", Val::type_name),
        }),
    }
}
