//! Node constructors used by the parser.
//!
//! Every constructor builds exactly one node, shows it to the visitor (if
//! one was supplied) and hands it back untouched. No validation happens here.

use crate::ast::*;
use crate::operators::{BinOp, UnOp};
use std::rc::Rc;

type Visitor<'v> = Box<dyn FnMut(Node<'_>) + 'v>;

#[derive(Default)]
pub struct AstFactory<'v> {
    visitor: Option<Visitor<'v>>,
}

impl<'v> AstFactory<'v> {
    pub fn new() -> Self {
        AstFactory { visitor: None }
    }

    pub fn with_visitor(visitor: impl FnMut(Node<'_>) + 'v) -> Self {
        AstFactory {
            visitor: Some(Box::new(visitor)),
        }
    }

    fn notify(&mut self, node: Node<'_>) {
        if let Some(visitor) = self.visitor.as_mut() {
            visitor(node);
        }
    }

    fn stat(&mut self, stat: Stat) -> Stat {
        self.notify(Node::Stat(&stat));
        stat
    }

    fn expr(&mut self, expr: Expr) -> Expr {
        self.notify(Node::Expr(&expr));
        expr
    }

    fn field(&mut self, field: Field) -> Field {
        self.notify(Node::Field(&field));
        field
    }

    pub fn chunk(&mut self, block: Block, comments: Vec<Comment>) -> Chunk {
        let chunk = Chunk { block, comments };
        self.notify(Node::Chunk(&chunk));
        chunk
    }

    pub fn block(&mut self, body: Vec<Stat>) -> Block {
        let block = Block { body };
        self.notify(Node::Block(&block));
        block
    }

    pub fn comment(&mut self, text: Rc<str>, line: usize, column: usize) -> Comment {
        let comment = Comment { text, line, column };
        self.notify(Node::Comment(&comment));
        comment
    }

    pub fn do_stat(&mut self, body: Block) -> Stat {
        self.stat(Stat::Do(body))
    }

    pub fn break_stat(&mut self) -> Stat {
        self.stat(Stat::Break)
    }

    pub fn return_stat(&mut self, exprs: Vec<Expr>) -> Stat {
        self.stat(Stat::Return(exprs))
    }

    pub fn expr_stat(&mut self, expr: Expr) -> Stat {
        self.stat(Stat::Expr(expr))
    }

    pub fn func_stat(&mut self, name: Expr, local: bool, body: FuncBody) -> Stat {
        self.stat(Stat::Function(FunctionDecl {
            name: Some(name),
            local,
            body: Rc::new(body),
        }))
    }

    pub fn func_expr(&mut self, body: FuncBody) -> Expr {
        self.expr(Expr::Function(Box::new(FunctionDecl {
            name: None,
            local: false,
            body: Rc::new(body),
        })))
    }

    pub fn local_stat(&mut self, variables: Vec<Identifier>, init: Vec<Expr>) -> Stat {
        self.stat(Stat::Local { variables, init })
    }

    pub fn if_clause(&mut self, cond: Expr, body: Block) -> IfStat {
        let clause = IfStat {
            cond,
            body,
            elseifs: vec![],
            otherwise: None,
        };
        self.notify(Node::IfClause(&clause));
        clause
    }

    pub fn if_stat(&mut self, cond: Expr, body: Block, elseifs: Vec<IfStat>, otherwise: Option<Block>) -> Stat {
        self.stat(Stat::If(IfStat {
            cond,
            body,
            elseifs,
            otherwise,
        }))
    }

    pub fn fornum_stat(&mut self, var: Identifier, start: Expr, end: Expr, step: Expr, body: Block) -> Stat {
        self.stat(Stat::Fornum {
            var,
            start,
            end,
            step,
            body,
        })
    }

    pub fn forlist_stat(&mut self, names: Vec<Identifier>, iter: Expr, body: Block) -> Stat {
        self.stat(Stat::Forlist { names, iter, body })
    }

    pub fn while_stat(&mut self, cond: Expr, body: Block) -> Stat {
        self.stat(Stat::While { cond, body })
    }

    pub fn repeat_stat(&mut self, body: Block, cond: Expr) -> Stat {
        self.stat(Stat::Repeat { body, cond })
    }

    pub fn identifier(&mut self, name: Rc<str>) -> Identifier {
        let id = Identifier { name };
        self.notify(Node::Identifier(&id));
        id
    }

    pub fn literal(&mut self, value: Literal) -> Expr {
        self.expr(Expr::Literal(value))
    }

    pub fn unary_expr(&mut self, op: UnOp, argument: Expr) -> Expr {
        self.expr(Expr::Unary {
            op,
            argument: Box::new(argument),
        })
    }

    pub fn binary_expr(&mut self, op: BinOp, left: Expr, right: Expr) -> Expr {
        self.expr(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn call_expr(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(Expr::Call {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn member_expr(&mut self, object: Expr, sep: MemberSep, property: Expr) -> Expr {
        self.expr(Expr::Member {
            object: Box::new(object),
            sep,
            property: Box::new(property),
        })
    }

    pub fn assign_expr(&mut self, left: Vec<Expr>, right: Vec<Expr>) -> Expr {
        self.expr(Expr::Assign { left, right })
    }

    pub fn table_expr(&mut self, fields: Vec<Field>) -> Expr {
        self.expr(Expr::Table(fields))
    }

    pub fn recfield(&mut self, key: FieldKey, value: Expr) -> Field {
        self.field(Field::Rec(Recfield { key, value }))
    }

    pub fn listfield(&mut self, value: Expr) -> Field {
        self.field(Field::List(Listfield { value }))
    }
}
