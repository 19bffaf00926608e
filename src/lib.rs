pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod factory;
pub mod interpreter;
pub mod lexer;
pub mod operators;
pub mod parser;
pub mod scope;
mod stack;
pub mod token;
pub mod value;

use crate::ast::{Chunk, Node};
use crate::lexer::Lexer;
use crate::parser::{ParseError, Parser};
use crate::value::RuntimeError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub fn parse(source: &str) -> Result<Chunk, ParseError> {
    Parser::new(Lexer::new(source)).parse()
}

/// Parses `source`, calling `visitor` on every node as it is built.
pub fn parse_with_visitor<'v>(source: &str, visitor: impl FnMut(Node<'_>) + 'v) -> Result<Chunk, ParseError> {
    Parser::with_visitor(Lexer::new(source), visitor).parse()
}
