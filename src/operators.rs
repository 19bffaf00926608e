//! Operator table: source text, binding power, associativity and the
//! function each operator applies to already-evaluated operands.

use crate::token::TokenType;
use crate::value::{RuntimeError, Val};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
}

/// Unary operators bind tighter than every binary operator except `^`.
pub const UNARY_PRECEDENCE: u8 = 7;

impl BinOp {
    pub fn from_token(tok: &TokenType) -> Option<Self> {
        Some(match tok {
            TokenType::Or => Self::Or,
            TokenType::And => Self::And,
            TokenType::Less => Self::Less,
            TokenType::Greater => Self::Greater,
            TokenType::LessEqual => Self::LessEqual,
            TokenType::GreaterEqual => Self::GreaterEqual,
            TokenType::Equal => Self::Equal,
            TokenType::NotEqual => Self::NotEqual,
            TokenType::Concat => Self::Concat,
            TokenType::Plus => Self::Add,
            TokenType::Minus => Self::Sub,
            TokenType::Star => Self::Mul,
            TokenType::Slash => Self::Div,
            TokenType::Percent => Self::Mod,
            TokenType::Caret => Self::Pow,
            _ => return None,
        })
    }

    pub fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Less
            | Self::Greater
            | Self::LessEqual
            | Self::GreaterEqual
            | Self::Equal
            | Self::NotEqual => 3,
            Self::Concat => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Mod => 6,
            Self::Pow => 8,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        matches!(self, Self::Concat | Self::Pow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "~=",
            Self::Concat => "..",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "^",
        }
    }

    /// Applies the operator to two evaluated operands. `and`/`or` are eager
    /// here; the interpreter short-circuits them before reaching this point.
    pub fn apply(self, left: Val, right: Val) -> Result<Val, RuntimeError> {
        match self {
            Self::Or => Ok(if left.truthy() { left } else { right }),
            Self::And => Ok(if left.truthy() { right } else { left }),
            Self::Equal => Ok(Val::Bool(left == right)),
            Self::NotEqual => Ok(Val::Bool(left != right)),
            Self::Less | Self::Greater | Self::LessEqual | Self::GreaterEqual => {
                self.compare(&left, &right)
            }
            Self::Concat => concat(&left, &right),
            Self::Add => self.arith(&left, &right, |a, b| a + b),
            Self::Sub => self.arith(&left, &right, |a, b| a - b),
            Self::Mul => self.arith(&left, &right, |a, b| a * b),
            Self::Div => self.arith(&left, &right, |a, b| a / b),
            Self::Mod => self.arith(&left, &right, |a, b| a - (a / b).floor() * b),
            Self::Pow => self.arith(&left, &right, f64::powf),
        }
    }

    fn arith(self, left: &Val, right: &Val, f: fn(f64, f64) -> f64) -> Result<Val, RuntimeError> {
        match (left, right) {
            (Val::Num(a), Val::Num(b)) => Ok(Val::Num(f(*a, *b))),
            (Val::Num(_), other) | (other, _) => Err(RuntimeError::Arithmetic {
                op: self.as_str(),
                type_name: other.type_name(),
            }),
        }
    }

    fn compare(self, left: &Val, right: &Val) -> Result<Val, RuntimeError> {
        let ordering = match (left, right) {
            (Val::Num(a), Val::Num(b)) => a.partial_cmp(b),
            (Val::String(a), Val::String(b)) => Some(a.cmp(b)),
            _ => {
                return Err(RuntimeError::Compare {
                    left: left.type_name(),
                    right: right.type_name(),
                })
            }
        };
        let result = match (self, ordering) {
            (Self::Less, Some(o)) => o == Ordering::Less,
            (Self::LessEqual, Some(o)) => o != Ordering::Greater,
            (Self::Greater, Some(o)) => o == Ordering::Greater,
            (Self::GreaterEqual, Some(o)) => o != Ordering::Less,
            // NaN is unordered against everything.
            _ => false,
        };
        Ok(Val::Bool(result))
    }
}

fn concat(left: &Val, right: &Val) -> Result<Val, RuntimeError> {
    match (left, right) {
        (Val::String(_) | Val::Num(_), Val::String(_) | Val::Num(_)) => {
            Ok(Val::String(format!("{left}{right}").into()))
        }
        (Val::String(_) | Val::Num(_), other) | (other, _) => {
            Err(RuntimeError::Concat(other.type_name()))
        }
    }
}

impl UnOp {
    pub fn from_token(tok: &TokenType) -> Option<Self> {
        match tok {
            TokenType::Minus => Some(Self::Neg),
            TokenType::Not => Some(Self::Not),
            TokenType::Hash => Some(Self::Len),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "not",
            Self::Len => "#",
        }
    }

    pub fn apply(self, operand: Val) -> Result<Val, RuntimeError> {
        match (self, operand) {
            (Self::Neg, Val::Num(a)) => Ok(Val::Num(-a)),
            (Self::Neg, other) => Err(RuntimeError::Arithmetic {
                op: self.as_str(),
                type_name: other.type_name(),
            }),
            (Self::Not, v) => Ok(Val::Bool(!v.truthy())),
            (Self::Len, Val::String(s)) => Ok(Val::Num(s.len() as f64)),
            (Self::Len, other) => Err(RuntimeError::LengthOfNonString(other.type_name())),
        }
    }
}
