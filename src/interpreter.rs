use crate::ast::*;
use crate::builtins;
use crate::operators::BinOp;
use crate::scope::{Scope, ScopeLink};
use crate::stack::ensure_sufficient_stack;
use crate::value::{Closure, NativeFunc, Table};
use crate::Error;
use std::{cell::RefCell, io::Write, rc::Rc};
use tracing::{debug, trace};

pub use crate::value::{RuntimeError, Val};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Nested Lua calls allowed before [`RuntimeError::StackOverflow`].
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config { max_call_depth: 200 }
    }
}

impl Config {
    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }
}

/// Anything that stops a block before its last statement.
pub enum ExecInterruption {
    Return(Val),
    Break,
    Err(RuntimeError),
}

impl From<RuntimeError> for ExecInterruption {
    fn from(value: RuntimeError) -> Self {
        ExecInterruption::Err(value)
    }
}

type ExecResult = Result<(), ExecInterruption>;

pub struct Interpreter {
    global_scope: ScopeLink,
    config: Config,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Interpreter {
        let global_scope = Scope::root();
        builtins::install(&global_scope);
        Interpreter {
            global_scope,
            config,
            depth: 0,
        }
    }

    /// Sends `print` output to `out` instead of stdout.
    pub fn with_output(self, out: impl Write + 'static) -> Self {
        let print = builtins::print(Rc::new(RefCell::new(out)));
        self.global_scope
            .borrow_mut()
            .def(print.name.clone(), Val::NativeFunc(print));
        self
    }

    pub fn register_native(
        &mut self,
        name: &str,
        func: impl Fn(&[Val]) -> Result<Val, RuntimeError> + 'static,
    ) {
        let native = NativeFunc::new(name, func);
        self.global_scope
            .borrow_mut()
            .def(native.name.clone(), Val::NativeFunc(native));
    }

    pub fn get_global(&self, id: &str) -> Option<Val> {
        self.global_scope.borrow().get_here(id)
    }

    /// Parses and runs `source` in the root scope. Top-level locals survive
    /// between calls.
    pub fn run(&mut self, source: &str) -> Result<Val, Error> {
        let chunk = crate::parse(source)?;
        Ok(self.interpret(&chunk)?)
    }

    /// Runs a parsed chunk. A top-level `return` ends it early and becomes
    /// the result.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn interpret(&mut self, chunk: &Chunk) -> Result<Val, RuntimeError> {
        let scope = self.global_scope.clone();
        let result = match self.exec_block(&chunk.block, &scope) {
            Ok(()) => Ok(Val::Nil),
            Err(ExecInterruption::Return(val)) => Ok(val),
            Err(ExecInterruption::Break) => Err(RuntimeError::BreakOutsideLoop),
            Err(ExecInterruption::Err(err)) => Err(err),
        };
        debug!(statements = chunk.block.body.len(), ok = result.is_ok(), "chunk finished");
        result
    }

    fn exec_block(&mut self, block: &Block, scope: &ScopeLink) -> ExecResult {
        ensure_sufficient_stack(|| -> ExecResult {
            for stat in &block.body {
                self.exec(stat, scope)?;
            }
            Ok(())
        })
    }

    /// Runs one loop iteration; `Ok(true)` means the loop was broken out of.
    fn loop_body(&mut self, body: &Block, scope: &ScopeLink) -> Result<bool, ExecInterruption> {
        match self.exec_block(body, scope) {
            Ok(()) => Ok(false),
            Err(ExecInterruption::Break) => Ok(true),
            Err(other) => Err(other),
        }
    }

    fn exec(&mut self, stat: &Stat, scope: &ScopeLink) -> ExecResult {
        match stat {
            Stat::Do(body) => self.exec_block(body, &Scope::extend(scope))?,
            Stat::Break => return Err(ExecInterruption::Break),
            Stat::Return(exprs) => {
                // Only the last value survives.
                let mut last = Val::Nil;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                return Err(ExecInterruption::Return(last));
            }
            Stat::Expr(expr) => {
                self.eval(expr, scope)?;
            }
            Stat::Function(decl) => {
                let func = self.make_closure(decl, scope);
                match &decl.name {
                    Some(Expr::Identifier(id)) => scope.borrow_mut().def(id.name.clone(), func),
                    Some(Expr::Member {
                        object,
                        sep,
                        property,
                    }) => {
                        let table = self.eval(object, scope)?;
                        let key = self.member_key(*sep, property, scope)?;
                        set_index(&table, key, func)?;
                    }
                    _ => return Err(RuntimeError::InvalidAssignTarget.into()),
                }
            }
            Stat::Local { variables, init } => {
                let values = self.eval_list(init, variables.len(), scope)?;
                let mut frame = scope.borrow_mut();
                for (var, val) in variables.iter().zip(values) {
                    frame.def(var.name.clone(), val);
                }
            }
            Stat::If(stat) => {
                let branch = if self.eval(&stat.cond, scope)?.truthy() {
                    Some(&stat.body)
                } else {
                    self.pick_branch(stat, scope)?
                };
                if let Some(body) = branch {
                    self.exec_block(body, &Scope::extend(scope))?;
                }
            }
            Stat::Fornum {
                var,
                start,
                end,
                step,
                body,
            } => {
                let start = self.for_number(start, "initial", scope)?;
                let end = self.for_number(end, "limit", scope)?;
                let step = self.for_number(step, "step", scope)?;
                let mut current = start;
                while current < end {
                    let inner = Scope::extend(scope);
                    inner.borrow_mut().def(var.name.clone(), Val::Num(current));
                    if self.loop_body(body, &inner)? {
                        break;
                    }
                    current += step;
                }
            }
            Stat::Forlist { names, iter, body } => {
                let iter = self.eval(iter, scope)?;
                loop {
                    let values = match &iter {
                        Val::Generator(generator) => match generator.advance() {
                            Some(values) => values,
                            None => break,
                        },
                        Val::LuaFunc(_) | Val::NativeFunc(_) => match self.call_value(&iter, vec![])? {
                            Val::Nil => break,
                            val => vec![val],
                        },
                        other => return Err(RuntimeError::NotIterable(other.type_name()).into()),
                    };
                    let inner = Scope::extend(scope);
                    {
                        let mut frame = inner.borrow_mut();
                        let mut values = values.into_iter();
                        for name in names {
                            frame.def(name.name.clone(), values.next().unwrap_or(Val::Nil));
                        }
                    }
                    if self.loop_body(body, &inner)? {
                        break;
                    }
                }
            }
            Stat::While { cond, body } => {
                while self.eval(cond, scope)?.truthy() {
                    if self.loop_body(body, &Scope::extend(scope))? {
                        break;
                    }
                }
            }
            Stat::Repeat { body, cond } => loop {
                // The condition can see the body's locals.
                let inner = Scope::extend(scope);
                if self.loop_body(body, &inner)? || self.eval(cond, &inner)?.truthy() {
                    break;
                }
            },
        }
        Ok(())
    }

    fn pick_branch<'a>(
        &mut self,
        stat: &'a IfStat,
        scope: &ScopeLink,
    ) -> Result<Option<&'a Block>, RuntimeError> {
        for clause in &stat.elseifs {
            if self.eval(&clause.cond, scope)?.truthy() {
                return Ok(Some(&clause.body));
            }
        }
        Ok(stat.otherwise.as_ref())
    }

    fn for_number(&mut self, expr: &Expr, what: &'static str, scope: &ScopeLink) -> Result<f64, RuntimeError> {
        match self.eval(expr, scope)? {
            Val::Num(n) => Ok(n),
            _ => Err(RuntimeError::ForNonNumber(what)),
        }
    }

    /// Evaluates every expression, then pads with `nil` or truncates to `want`.
    fn eval_list(&mut self, exprs: &[Expr], want: usize, scope: &ScopeLink) -> Result<Vec<Val>, RuntimeError> {
        let mut values = exprs
            .iter()
            .map(|expr| self.eval(expr, scope))
            .collect::<Result<Vec<_>, _>>()?;
        values.resize(want, Val::Nil);
        Ok(values)
    }

    fn eval(&mut self, expr: &Expr, scope: &ScopeLink) -> Result<Val, RuntimeError> {
        ensure_sufficient_stack(|| self.eval_expr(expr, scope))
    }

    fn eval_expr(&mut self, expr: &Expr, scope: &ScopeLink) -> Result<Val, RuntimeError> {
        match expr {
            Expr::Identifier(id) => Scope::get(scope, &id.name),
            Expr::Literal(lit) => Ok(match lit {
                Literal::Nil => Val::Nil,
                Literal::Bool(b) => Val::Bool(*b),
                Literal::Number(n) => Val::Num(*n),
                Literal::String(s) => Val::String(s.clone()),
            }),
            Expr::Unary { op, argument } => op.apply(self.eval(argument, scope)?),
            Expr::Binary {
                op: op @ (BinOp::And | BinOp::Or),
                left,
                right,
            } => {
                let left = self.eval(left, scope)?;
                if left.truthy() == (*op == BinOp::Or) {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                op.apply(left, right)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, scope),
            Expr::Member {
                sep: MemberSep::Colon,
                ..
            } => Err(RuntimeError::MethodOutsideCall),
            Expr::Member {
                object,
                sep,
                property,
            } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(*sep, property, scope)?;
                index(&object, &key)
            }
            Expr::Assign { left, right } => {
                self.assign(left, right, scope)?;
                Ok(Val::Nil)
            }
            Expr::Table(fields) => self.table(fields, scope),
            Expr::Function(decl) => Ok(self.make_closure(decl, scope)),
        }
    }

    /// The key a member expression addresses: the literal name for `.name`
    /// and `:name`, the evaluated expression for `[expr]`.
    fn member_key(&mut self, sep: MemberSep, property: &Expr, scope: &ScopeLink) -> Result<Val, RuntimeError> {
        match (sep, property) {
            (MemberSep::Dot | MemberSep::Colon, Expr::Identifier(id)) => Ok(Val::String(id.name.clone())),
            (_, expr) => self.eval(expr, scope),
        }
    }

    fn assign(&mut self, targets: &[Expr], values: &[Expr], scope: &ScopeLink) -> Result<(), RuntimeError> {
        let values = self.eval_list(values, targets.len(), scope)?;
        for (target, val) in targets.iter().zip(values) {
            match target {
                Expr::Identifier(id) => Scope::set(scope, &id.name, val)?,
                Expr::Member {
                    object,
                    sep: sep @ (MemberSep::Dot | MemberSep::Bracket),
                    property,
                } => {
                    let table = self.eval(object, scope)?;
                    let key = self.member_key(*sep, property, scope)?;
                    set_index(&table, key, val)?;
                }
                _ => return Err(RuntimeError::InvalidAssignTarget),
            }
        }
        Ok(())
    }

    fn table(&mut self, fields: &[Field], scope: &ScopeLink) -> Result<Val, RuntimeError> {
        let mut table = Table::new();
        // Positional fields count from 1 regardless of any explicit keys.
        let mut position = 1.0;
        for field in fields {
            match field {
                Field::Rec(Recfield { key, value }) => {
                    let key = match key {
                        FieldKey::Name(id) => Val::String(id.name.clone()),
                        FieldKey::Expr(expr) => self.eval(expr, scope)?,
                    };
                    let value = self.eval(value, scope)?;
                    table.set(key, value)?;
                }
                Field::List(Listfield { value }) => {
                    let value = self.eval(value, scope)?;
                    table.set(Val::Num(position), value)?;
                    position += 1.0;
                }
            }
        }
        Ok(Val::table(table))
    }

    fn make_closure(&self, decl: &FunctionDecl, scope: &ScopeLink) -> Val {
        let name = decl
            .name
            .as_ref()
            .and_then(Expr::dotted_name)
            .unwrap_or_else(|| "anonymous".to_string());
        Val::LuaFunc(Rc::new(Closure {
            name: name.into(),
            body: decl.body.clone(),
            scope: scope.clone(),
        }))
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], scope: &ScopeLink) -> Result<Val, RuntimeError> {
        let (func, mut argv) = match callee {
            Expr::Member {
                object,
                sep: MemberSep::Colon,
                property,
            } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(MemberSep::Colon, property, scope)?;
                (index(&object, &key)?, vec![object])
            }
            _ => (self.eval(callee, scope)?, vec![]),
        };
        for arg in args {
            argv.push(self.eval(arg, scope)?);
        }
        self.call_value(&func, argv)
    }

    fn call_value(&mut self, func: &Val, args: Vec<Val>) -> Result<Val, RuntimeError> {
        match func {
            Val::NativeFunc(native) => {
                trace!(name = %native.name, args = args.len(), "native call");
                native.call(&args)
            }
            Val::LuaFunc(closure) => self.call_closure(closure, args),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Val>) -> Result<Val, RuntimeError> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow(self.config.max_call_depth));
        }
        trace!(name = %closure.name, args = args.len(), depth = self.depth, "call");

        let frame = Scope::extend(&closure.scope);
        {
            let mut frame = frame.borrow_mut();
            let mut args = args.into_iter();
            for param in &closure.body.params {
                frame.def(param.name.clone(), args.next().unwrap_or(Val::Nil));
            }
        }

        self.depth += 1;
        let result = self.exec_block(&closure.body.block, &frame);
        self.depth -= 1;

        match result {
            Ok(()) => Ok(Val::Nil),
            Err(ExecInterruption::Return(val)) => Ok(val),
            Err(ExecInterruption::Break) => Err(RuntimeError::BreakOutsideLoop),
            Err(ExecInterruption::Err(err)) => Err(err),
        }
    }
}

fn index(object: &Val, key: &Val) -> Result<Val, RuntimeError> {
    match object {
        Val::Table(table) => Ok(table.borrow().get(key)),
        other => Err(RuntimeError::IndexNonTable(other.type_name())),
    }
}

fn set_index(object: &Val, key: Val, val: Val) -> Result<(), RuntimeError> {
    match object {
        Val::Table(table) => table.borrow_mut().set(key, val),
        other => Err(RuntimeError::IndexNonTable(other.type_name())),
    }
}
