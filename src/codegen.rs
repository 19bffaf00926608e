//! JavaScript backend.
//!
//! Lowers a parsed [`Chunk`] to a self-contained script. The output keeps the
//! shape of the source rather than its exact semantics: truthiness, `%` and
//! table layout follow JavaScript, and positional table fields are numbered
//! from 0.

use crate::ast::*;
use crate::operators::{BinOp, UnOp};
use rustc_hash::FxHashSet;
use std::{fmt::Write as _, mem, rc::Rc};
use tracing::debug;

const PRELUDE: &str = r#"const print = (...args) => console.log(args.map(String).join("\t"));
const pairs = (table) => {
    const keys = Object.keys(table);
    let i = 0;
    return () => (i < keys.length ? [keys[i], table[keys[i++]]] : [undefined, undefined]);
};
const ipairs = (table) => {
    let i = 0;
    return () => (i in table ? [i, table[i++]] : [undefined, undefined]);
};
const $method = (object, name, ...args) => object[name](object, ...args);
"#;

/// Names the prelude binds at the top level.
const PRELUDE_NAMES: [&str; 3] = ["print", "pairs", "ipairs"];

const INDENT: &str = "    ";

/// `let` bindings of one emitted JavaScript block.
#[derive(Debug, Default)]
struct JsScope {
    declared: FxHashSet<Rc<str>>,
    /// Extra `{` opened to shadow a name, closed when the block ends.
    reopened: usize,
}

#[derive(Debug, Default)]
pub struct JsGenerator {
    out: String,
    indent: usize,
    scopes: Vec<JsScope>,
    temps: usize,
}

impl JsGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn generate(mut self, chunk: &Chunk) -> String {
        self.out.push_str(PRELUDE);
        self.out.push('\n');
        for comment in &chunk.comments {
            self.comment(comment);
        }
        let prelude: Vec<Rc<str>> = PRELUDE_NAMES.into_iter().map(Rc::from).collect();
        self.open_scope(&prelude);
        for stat in &chunk.block.body {
            self.stat(stat);
        }
        self.close_scope();
        debug!(bytes = self.out.len(), "generated javascript");
        self.out
    }

    fn pad(&self) -> String {
        INDENT.repeat(self.indent)
    }

    fn line(&mut self, text: &str) {
        let pad = self.pad();
        self.out.push_str(&pad);
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn comment(&mut self, comment: &Comment) {
        if comment.text.contains('\n') {
            let text = comment.text.replace("*/", "* /");
            self.line(&format!("/*{text}*/"));
        } else {
            self.line(&format!("//{}", comment.text));
        }
    }

    fn stats(&mut self, block: &Block) {
        self.open_scope(&[]);
        for stat in &block.body {
            self.stat(stat);
        }
        self.close_scope();
    }

    fn open_scope(&mut self, bound: &[Rc<str>]) {
        self.scopes.push(JsScope {
            declared: bound.iter().cloned().collect(),
            reopened: 0,
        });
    }

    fn close_scope(&mut self) {
        let reopened = self.scopes.pop().map_or(0, |scope| scope.reopened);
        for _ in 0..reopened {
            self.indent -= 1;
            self.line("}");
        }
    }

    /// Whether declaring `names` with `let` would clash with a binding
    /// already made in the current block.
    fn redeclares<'a>(&self, mut names: impl Iterator<Item = &'a Rc<str>>) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| names.any(|name| scope.declared.contains(name)))
    }

    /// Opens a nested `{` that runs to the end of the current block, so
    /// later `let`s may reuse names.
    fn reopen(&mut self) {
        self.line("{");
        self.indent += 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.declared.clear();
            scope.reopened += 1;
        }
    }

    fn declare<'a>(&mut self, names: impl Iterator<Item = &'a Rc<str>>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.declared.extend(names.cloned());
        }
    }

    fn temp(&mut self) -> String {
        self.temps += 1;
        format!("$local{}", self.temps)
    }

    /// `head {`, the indented body, then `}`.
    fn braced(&mut self, head: &str, block: &Block) {
        if head.is_empty() {
            self.line("{");
        } else {
            self.line(&format!("{head} {{"));
        }
        self.indent += 1;
        self.stats(block);
        self.indent -= 1;
        self.line("}");
    }

    fn stat(&mut self, stat: &Stat) {
        match stat {
            Stat::Do(body) => self.braced("", body),
            Stat::Break => self.line("break;"),
            Stat::Return(exprs) => {
                let text = match exprs.as_slice() {
                    [] => "return;".to_string(),
                    [expr] => format!("return {};", self.expr(expr)),
                    // The comma operator evaluates all of them and keeps the last.
                    exprs => format!("return ({});", self.list(exprs)),
                };
                self.line(&text);
            }
            Stat::Expr(expr) => {
                let text = match expr {
                    Expr::Assign { left, right } => self.assign(left, right),
                    expr => self.expr(expr),
                };
                self.line(&format!("{text};"));
            }
            Stat::Function(decl) => {
                if let Some(Expr::Identifier(id)) = decl.name.as_ref().filter(|_| decl.local) {
                    if self.redeclares(std::iter::once(&id.name)) {
                        self.reopen();
                    }
                    self.declare(std::iter::once(&id.name));
                }
                let body = self.function(&decl.body);
                let text = match &decl.name {
                    Some(Expr::Identifier(id)) if decl.local => format!("let {} = {body};", id.name),
                    Some(Expr::Identifier(id)) => format!("var {} = {body};", id.name),
                    Some(target) => format!("{} = {body};", self.target(target)),
                    None => format!("{body};"),
                };
                self.line(&text);
            }
            Stat::Local { variables, init } => {
                let mut values: Vec<_> = init.iter().map(|expr| self.expr(expr)).collect();
                let shadowing = self.redeclares(variables.iter().map(|var| &var.name));
                if shadowing {
                    // Initializers still see the outer bindings.
                    for value in &mut values {
                        let temp = self.temp();
                        self.line(&format!("const {temp} = {value};"));
                        *value = temp;
                    }
                    self.reopen();
                }
                self.declare(variables.iter().map(|var| &var.name));
                let decls: Vec<_> = variables
                    .iter()
                    .enumerate()
                    .map(|(i, var)| match values.get(i) {
                        Some(value) => format!("{} = {value}", var.name),
                        None => var.name.to_string(),
                    })
                    .collect();
                self.line(&format!("let {};", decls.join(", ")));
                if !shadowing {
                    for extra in values.iter().skip(variables.len()) {
                        self.line(&format!("{extra};"));
                    }
                }
            }
            Stat::If(stat) => {
                let cond = self.expr(&stat.cond);
                self.line(&format!("if ({cond}) {{"));
                self.nested(&stat.body);
                for clause in &stat.elseifs {
                    let cond = self.expr(&clause.cond);
                    self.line(&format!("}} else if ({cond}) {{"));
                    self.nested(&clause.body);
                }
                if let Some(otherwise) = &stat.otherwise {
                    self.line("} else {");
                    self.nested(otherwise);
                }
                self.line("}");
            }
            Stat::Fornum {
                var,
                start,
                end,
                step,
                body,
            } => {
                let head = format!(
                    "for (let {name} = {}; {name} < {}; {name} += {})",
                    self.expr(start),
                    self.expr(end),
                    self.expr(step),
                    name = var.name
                );
                self.braced(&head, body);
            }
            Stat::Forlist { names, iter, body } => {
                let iter = self.expr(iter);
                self.line(&format!("for (const $iter = {iter};;) {{"));
                self.indent += 1;
                self.line("const $value = $iter();");
                self.line("if ($value[0] === undefined) break;");
                let bindings: Vec<_> = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| format!("{} = $value[{i}]", name.name))
                    .collect();
                self.line(&format!("let {};", bindings.join(", ")));
                let bound: Vec<_> = names.iter().map(|name| name.name.clone()).collect();
                self.open_scope(&bound);
                for stat in &body.body {
                    self.stat(stat);
                }
                self.close_scope();
                self.indent -= 1;
                self.line("}");
            }
            Stat::While { cond, body } => {
                let head = format!("while ({})", self.expr(cond));
                self.braced(&head, body);
            }
            Stat::Repeat { body, cond } => {
                self.line("for (;;) {");
                self.indent += 1;
                self.open_scope(&[]);
                for stat in &body.body {
                    self.stat(stat);
                }
                let cond = self.expr(cond);
                self.line(&format!("if ({cond}) break;"));
                self.close_scope();
                self.indent -= 1;
                self.line("}");
            }
        }
    }

    fn nested(&mut self, block: &Block) {
        self.indent += 1;
        self.stats(block);
        self.indent -= 1;
    }

    fn list(&mut self, exprs: &[Expr]) -> String {
        let parts: Vec<_> = exprs.iter().map(|e| self.expr(e)).collect();
        parts.join(", ")
    }

    fn assign(&mut self, left: &[Expr], right: &[Expr]) -> String {
        match (left, right) {
            ([target], [value]) => format!("{} = {}", self.target(target), self.expr(value)),
            _ => {
                let targets: Vec<_> = left.iter().map(|t| self.target(t)).collect();
                format!("[{}] = [{}]", targets.join(", "), self.list(right))
            }
        }
    }

    /// Assignment targets; method segments are plain properties here.
    fn target(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Member {
                object,
                sep: MemberSep::Colon,
                property,
            } => format!("{}.{}", self.expr(object), self.expr(property)),
            expr => self.expr(expr),
        }
    }

    fn function(&mut self, body: &FuncBody) -> String {
        let params: Vec<_> = body.params.iter().map(|p| p.name.clone()).collect();
        let saved = mem::take(&mut self.out);
        self.indent += 1;
        self.open_scope(&params);
        for stat in &body.block.body {
            self.stat(stat);
        }
        self.close_scope();
        self.indent -= 1;
        let inner = mem::replace(&mut self.out, saved);
        format!("function ({}) {{\n{inner}{}}}", params.join(", "), self.pad())
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Identifier(id) => id.name.to_string(),
            Expr::Literal(lit) => literal(lit),
            Expr::Unary { op, argument } => {
                let argument_text = self.expr(argument);
                match op {
                    UnOp::Neg => format!("(-{argument_text})"),
                    UnOp::Not => format!("(!{argument_text})"),
                    UnOp::Len if matches!(argument.as_ref(), Expr::Literal(Literal::Number(_))) => {
                        format!("({argument_text}).length")
                    }
                    UnOp::Len => format!("{argument_text}.length"),
                }
            }
            Expr::Binary { op, left, right } => {
                let (left, right) = (self.expr(left), self.expr(right));
                match op {
                    BinOp::Concat => format!("(\"\" + {left} + {right})"),
                    op => format!("({left} {} {right})", js_binop(*op)),
                }
            }
            Expr::Call { callee, args } => match callee.as_ref() {
                Expr::Member {
                    object,
                    sep: MemberSep::Colon,
                    property,
                } => {
                    let mut parts = vec![self.expr(object), self.key(property)];
                    parts.extend(args.iter().map(|a| self.expr(a)));
                    format!("$method({})", parts.join(", "))
                }
                callee => format!("{}({})", self.expr(callee), self.list(args)),
            },
            Expr::Member {
                object,
                sep: MemberSep::Bracket,
                property,
            } => format!("{}[{}]", self.expr(object), self.expr(property)),
            Expr::Member { object, property, .. } => {
                format!("{}.{}", self.expr(object), self.expr(property))
            }
            Expr::Assign { left, right } => format!("({})", self.assign(left, right)),
            Expr::Table(fields) => self.table(fields),
            Expr::Function(decl) => self.function(&decl.body),
        }
    }

    /// A method or field name as a JavaScript string literal.
    fn key(&mut self, property: &Expr) -> String {
        match property {
            Expr::Identifier(id) => quote(&id.name),
            other => self.expr(other),
        }
    }

    fn table(&mut self, fields: &[Field]) -> String {
        let mut position = 0;
        let mut parts = vec![];
        for field in fields {
            let part = match field {
                Field::Rec(Recfield {
                    key: FieldKey::Name(id),
                    value,
                }) => format!("{}: {}", quote(&id.name), self.expr(value)),
                Field::Rec(Recfield {
                    key: FieldKey::Expr(key),
                    value,
                }) => format!("[{}]: {}", self.expr(key), self.expr(value)),
                Field::List(Listfield { value }) => {
                    let part = format!("\"{position}\": {}", self.expr(value));
                    position += 1;
                    part
                }
            };
            parts.push(part);
        }
        format!("{{{}}}", parts.join(", "))
    }
}

fn js_binop(op: BinOp) -> &'static str {
    match op {
        BinOp::Or => "||",
        BinOp::And => "&&",
        BinOp::Equal => "===",
        BinOp::NotEqual => "!==",
        BinOp::Pow => "**",
        BinOp::Concat => "+",
        other => other.as_str(),
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Nil => "undefined".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Number(n) if n.is_infinite() => "Infinity".to_string(),
        Literal::Number(n) => n.to_string(),
        Literal::String(s) => quote(s),
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
