//! Syntax tree for the Lua subset.
//!
//! Every node owns its children and the tree is never mutated after the
//! parser hands it out. Function bodies sit behind an `Rc` so closures can
//! keep them alive without copying.

use crate::operators::{BinOp, UnOp};
use std::{fmt, rc::Rc};

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub block: Block,
    /// Comments in source order. They never take part in evaluation.
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub body: Vec<Stat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: Rc<str>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: Rc<str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stat {
    Do(Block),
    Break,
    Return(Vec<Expr>),
    /// A call or an assignment evaluated for its effect.
    Expr(Expr),
    Function(FunctionDecl),
    Local {
        variables: Vec<Identifier>,
        init: Vec<Expr>,
    },
    If(IfStat),
    Fornum {
        var: Identifier,
        start: Expr,
        end: Expr,
        step: Expr,
        body: Block,
    },
    Forlist {
        names: Vec<Identifier>,
        iter: Expr,
        body: Block,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Repeat {
        body: Block,
        cond: Expr,
    },
}

/// `if` with its `elseif` chain. Each `elseif` clause is itself an `IfStat`
/// with no clauses and no `else` arm of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStat {
    pub cond: Expr,
    pub body: Block,
    pub elseifs: Vec<IfStat>,
    pub otherwise: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// A name or a member chain (`a.b.c`, `a.b:m`); `None` for function expressions.
    pub name: Option<Expr>,
    pub local: bool,
    pub body: Rc<FuncBody>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncBody {
    pub params: Vec<Identifier>,
    pub block: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberSep {
    Dot,
    Bracket,
    Colon,
}

impl MemberSep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dot => ".",
            Self::Bracket => "[",
            Self::Colon => ":",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(Identifier),
    Literal(Literal),
    Unary {
        op: UnOp,
        argument: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `object.name`, `object[expr]` or `object:name`. For the dotted and
    /// method forms `property` is always an [`Expr::Identifier`].
    Member {
        object: Box<Expr>,
        sep: MemberSep,
        property: Box<Expr>,
    },
    Assign {
        left: Vec<Expr>,
        right: Vec<Expr>,
    },
    Table(Vec<Field>),
    Function(Box<FunctionDecl>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Rec(Recfield),
    List(Listfield),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recfield {
    pub key: FieldKey,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKey {
    /// `name = value`
    Name(Identifier),
    /// `[expr] = value`
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listfield {
    pub value: Expr,
}

/// Discriminator shared by every node the factory builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Chunk,
    Block,
    DoStatement,
    BreakStatement,
    ReturnStatement,
    ExpressionStatement,
    FunctionDeclaration,
    LocalStatement,
    IfStatement,
    FornumStatement,
    ForlistStatement,
    WhileStatement,
    RepeatStatement,
    Identifier,
    Literal,
    UnaryExpression,
    BinaryExpression,
    CallExpression,
    MemberExpression,
    AssignExpression,
    TableExpression,
    Recfield,
    Listfield,
    Comment,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Borrowed view of a freshly built node, handed to parse visitors.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Chunk(&'a Chunk),
    Block(&'a Block),
    Stat(&'a Stat),
    /// An `elseif` clause, which is not wrapped in a [`Stat`].
    IfClause(&'a IfStat),
    Expr(&'a Expr),
    Identifier(&'a Identifier),
    Field(&'a Field),
    Comment(&'a Comment),
}

impl Node<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Chunk(_) => NodeKind::Chunk,
            Node::Block(_) => NodeKind::Block,
            Node::Stat(stat) => stat.kind(),
            Node::IfClause(_) => NodeKind::IfStatement,
            Node::Expr(expr) => expr.kind(),
            Node::Identifier(_) => NodeKind::Identifier,
            Node::Field(Field::Rec(_)) => NodeKind::Recfield,
            Node::Field(Field::List(_)) => NodeKind::Listfield,
            Node::Comment(_) => NodeKind::Comment,
        }
    }
}

impl Stat {
    pub fn kind(&self) -> NodeKind {
        match self {
            Stat::Do(_) => NodeKind::DoStatement,
            Stat::Break => NodeKind::BreakStatement,
            Stat::Return(_) => NodeKind::ReturnStatement,
            Stat::Expr(_) => NodeKind::ExpressionStatement,
            Stat::Function(_) => NodeKind::FunctionDeclaration,
            Stat::Local { .. } => NodeKind::LocalStatement,
            Stat::If(_) => NodeKind::IfStatement,
            Stat::Fornum { .. } => NodeKind::FornumStatement,
            Stat::Forlist { .. } => NodeKind::ForlistStatement,
            Stat::While { .. } => NodeKind::WhileStatement,
            Stat::Repeat { .. } => NodeKind::RepeatStatement,
        }
    }
}

impl Expr {
    pub fn kind(&self) -> NodeKind {
        match self {
            Expr::Identifier(_) => NodeKind::Identifier,
            Expr::Literal(_) => NodeKind::Literal,
            Expr::Unary { .. } => NodeKind::UnaryExpression,
            Expr::Binary { .. } => NodeKind::BinaryExpression,
            Expr::Call { .. } => NodeKind::CallExpression,
            Expr::Member { .. } => NodeKind::MemberExpression,
            Expr::Assign { .. } => NodeKind::AssignExpression,
            Expr::Table(_) => NodeKind::TableExpression,
            Expr::Function(_) => NodeKind::FunctionDeclaration,
        }
    }

    /// Renders a function name target such as `a.b:c`.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expr::Identifier(id) => Some(id.name.to_string()),
            Expr::Member {
                object,
                sep: sep @ (MemberSep::Dot | MemberSep::Colon),
                property,
            } => {
                let Expr::Identifier(prop) = property.as_ref() else {
                    return None;
                };
                Some(format!("{}{}{}", object.dotted_name()?, sep.as_str(), prop.name))
            }
            _ => None,
        }
    }
}
