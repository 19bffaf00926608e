use crate::ast::*;
use crate::factory::AstFactory;
use crate::lexer::{LexError, Lexer};
use crate::operators::{BinOp, UnOp, UNARY_PRECEDENCE};
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenType};
use std::mem;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}:{column}] {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

type ParseResult<T> = Result<T, ParseError>;

/// Nested blocks plus nested expressions allowed before giving up.
const MAX_SYNTAX_LEVELS: usize = 200;

/// Recursive-descent parser with a single token of lookahead. Binary
/// expressions are parsed by precedence climbing over the table in
/// [`crate::operators`].
pub struct Parser<'v> {
    lexer: Lexer,
    cur_token: Token,
    ast: AstFactory<'v>,
    comments: Vec<Comment>,
    levels: usize,
}

impl<'v> Parser<'v> {
    pub fn new(lexer: Lexer) -> Self {
        Self::with_factory(lexer, AstFactory::new())
    }

    /// Like [`Parser::new`], but every node is shown to `visitor` as soon as
    /// it is built.
    pub fn with_visitor(lexer: Lexer, visitor: impl FnMut(Node<'_>) + 'v) -> Self {
        Self::with_factory(lexer, AstFactory::with_visitor(visitor))
    }

    fn with_factory(lexer: Lexer, ast: AstFactory<'v>) -> Self {
        Parser {
            lexer,
            cur_token: Token::new(TokenType::Eos, 1, 1),
            ast,
            comments: vec![],
            levels: 0,
        }
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn parse(mut self) -> ParseResult<Chunk> {
        self.next()?;
        let block = self.block()?;
        if !self.check(&TokenType::Eos) {
            return Err(self.error("'<eof>' expected"));
        }
        debug!(
            statements = block.body.len(),
            comments = self.comments.len(),
            "parsed chunk"
        );
        let comments = mem::take(&mut self.comments);
        Ok(self.ast.chunk(block, comments))
    }

    /// Advances to the next significant token. Comments are turned into
    /// nodes on the way and never reach the grammar.
    fn next(&mut self) -> ParseResult<()> {
        loop {
            let tok = self.lexer.scan()?;
            match tok.data {
                TokenType::Comment(text) => {
                    let comment = self.ast.comment(text, tok.line, tok.column);
                    self.comments.push(comment);
                }
                data => {
                    self.cur_token = Token::new(data, tok.line, tok.column);
                    return Ok(());
                }
            }
        }
    }

    fn error(&self, message: impl AsRef<str>) -> ParseError {
        let near = match &self.cur_token.data {
            TokenType::Eos => "<eof>".to_string(),
            other => format!("'{other}'"),
        };
        SyntaxError {
            line: self.cur_token.line,
            column: self.cur_token.column,
            message: format!("{} near {near}", message.as_ref()),
        }
        .into()
    }

    fn check(&self, tok: &TokenType) -> bool {
        self.cur_token.data == *tok
    }

    /// Skips `tok` if it is next. Used for optional separators.
    fn consume(&mut self, tok: &TokenType) -> ParseResult<bool> {
        if self.check(tok) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, tok: TokenType) -> ParseResult<()> {
        if self.consume(&tok)? {
            Ok(())
        } else {
            Err(self.error(format!("'{tok}' expected")))
        }
    }

    /// Expects the token closing `who`, which was opened on `line`.
    fn expect_match(&mut self, what: TokenType, who: TokenType, line: usize) -> ParseResult<()> {
        if self.consume(&what)? {
            Ok(())
        } else if line == self.cur_token.line {
            Err(self.error(format!("'{what}' expected")))
        } else {
            Err(self.error(format!("'{what}' expected (to close '{who}' at line {line})")))
        }
    }

    fn expect_name(&mut self) -> ParseResult<Identifier> {
        let TokenType::Identifier(name) = &self.cur_token.data else {
            return Err(self.error("<name> expected"));
        };
        let name = name.clone();
        self.next()?;
        Ok(self.ast.identifier(name))
    }

    /// Runs `f` one syntax level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.levels >= MAX_SYNTAX_LEVELS {
            return Err(self.error("chunk has too many syntax levels"));
        }
        self.levels += 1;
        let result = ensure_sufficient_stack(|| f(self));
        self.levels -= 1;
        result
    }

    fn block(&mut self) -> ParseResult<Block> {
        self.nested(Self::block_body)
    }

    fn block_body(&mut self) -> ParseResult<Block> {
        let mut body = vec![];
        while !self.cur_token.data.is_block_follow() {
            if self.check(&TokenType::Return) {
                body.push(self.return_stat()?);
                self.consume(&TokenType::Semicolon)?;
                break;
            }
            body.push(self.statement()?);
            self.consume(&TokenType::Semicolon)?;
        }
        Ok(self.ast.block(body))
    }

    fn statement(&mut self) -> ParseResult<Stat> {
        let line = self.cur_token.line;
        match self.cur_token.data {
            TokenType::Do => {
                self.next()?;
                let body = self.block()?;
                self.expect_match(TokenType::End, TokenType::Do, line)?;
                Ok(self.ast.do_stat(body))
            }
            TokenType::Break => {
                self.next()?;
                Ok(self.ast.break_stat())
            }
            TokenType::Function => self.function_stat(),
            TokenType::Local => {
                self.next()?;
                if self.consume(&TokenType::Function)? {
                    let name = self.expect_name()?;
                    let body = self.func_body(false, line)?;
                    Ok(self.ast.func_stat(Expr::Identifier(name), true, body))
                } else {
                    self.local_stat()
                }
            }
            TokenType::If => self.if_stat(),
            TokenType::For => self.for_stat(),
            TokenType::While => {
                self.next()?;
                let cond = self.expr()?;
                self.expect(TokenType::Do)?;
                let body = self.block()?;
                self.expect_match(TokenType::End, TokenType::While, line)?;
                Ok(self.ast.while_stat(cond, body))
            }
            TokenType::Repeat => {
                self.next()?;
                let body = self.block()?;
                self.expect_match(TokenType::Until, TokenType::Repeat, line)?;
                let cond = self.expr()?;
                Ok(self.ast.repeat_stat(body, cond))
            }
            _ => self.expr_stat(),
        }
    }

    fn return_stat(&mut self) -> ParseResult<Stat> {
        self.next()?;
        let exprs = if self.cur_token.data.is_block_follow() || self.check(&TokenType::Semicolon) {
            vec![]
        } else {
            self.expr_list()?
        };
        Ok(self.ast.return_stat(exprs))
    }

    fn function_stat(&mut self) -> ParseResult<Stat> {
        let line = self.cur_token.line;
        self.next()?;
        let mut name = Expr::Identifier(self.expect_name()?);
        while self.consume(&TokenType::Dot)? {
            let key = self.expect_name()?;
            name = self.ast.member_expr(name, MemberSep::Dot, Expr::Identifier(key));
        }
        let is_method = self.consume(&TokenType::Colon)?;
        if is_method {
            let key = self.expect_name()?;
            name = self.ast.member_expr(name, MemberSep::Colon, Expr::Identifier(key));
        }
        let body = self.func_body(is_method, line)?;
        Ok(self.ast.func_stat(name, false, body))
    }

    /// `(params) block end`. Methods get an implicit leading `self`.
    fn func_body(&mut self, is_method: bool, line: usize) -> ParseResult<FuncBody> {
        self.expect(TokenType::LeftParen)?;
        let mut params = vec![];
        if is_method {
            params.push(self.ast.identifier("self".into()));
        }
        if !self.check(&TokenType::RightParen) {
            loop {
                if self.check(&TokenType::Ellipsis) {
                    return Err(self.error("varargs are not supported"));
                }
                params.push(self.expect_name()?);
                if !self.consume(&TokenType::Comma)? {
                    break;
                }
            }
        }
        self.expect(TokenType::RightParen)?;
        let block = self.block()?;
        self.expect_match(TokenType::End, TokenType::Function, line)?;
        Ok(FuncBody { params, block })
    }

    fn local_stat(&mut self) -> ParseResult<Stat> {
        let mut variables = vec![self.expect_name()?];
        while self.consume(&TokenType::Comma)? {
            variables.push(self.expect_name()?);
        }
        let init = if self.consume(&TokenType::Assign)? {
            self.expr_list()?
        } else {
            vec![]
        };
        Ok(self.ast.local_stat(variables, init))
    }

    fn if_stat(&mut self) -> ParseResult<Stat> {
        let line = self.cur_token.line;
        self.next()?;
        let (cond, body) = self.cond_then_block()?;
        let mut elseifs = vec![];
        while self.consume(&TokenType::Elseif)? {
            let (cond, body) = self.cond_then_block()?;
            elseifs.push(self.ast.if_clause(cond, body));
        }
        let otherwise = if self.consume(&TokenType::Else)? {
            Some(self.block()?)
        } else {
            None
        };
        self.expect_match(TokenType::End, TokenType::If, line)?;
        Ok(self.ast.if_stat(cond, body, elseifs, otherwise))
    }

    fn cond_then_block(&mut self) -> ParseResult<(Expr, Block)> {
        let cond = self.expr()?;
        self.expect(TokenType::Then)?;
        Ok((cond, self.block()?))
    }

    fn for_stat(&mut self) -> ParseResult<Stat> {
        let line = self.cur_token.line;
        self.next()?;
        let first = self.expect_name()?;
        match self.cur_token.data {
            TokenType::Assign => self.fornum(first, line),
            TokenType::Comma | TokenType::In => self.forlist(first, line),
            _ => Err(self.error("'=' or 'in' expected")),
        }
    }

    fn fornum(&mut self, var: Identifier, line: usize) -> ParseResult<Stat> {
        self.next()?;
        let start = self.expr()?;
        self.expect(TokenType::Comma)?;
        let end = self.expr()?;
        let step = if self.consume(&TokenType::Comma)? {
            self.expr()?
        } else {
            self.ast.literal(Literal::Number(1.0))
        };
        self.expect(TokenType::Do)?;
        let body = self.block()?;
        self.expect_match(TokenType::End, TokenType::For, line)?;
        Ok(self.ast.fornum_stat(var, start, end, step, body))
    }

    fn forlist(&mut self, first: Identifier, line: usize) -> ParseResult<Stat> {
        let mut names = vec![first];
        while self.consume(&TokenType::Comma)? {
            names.push(self.expect_name()?);
        }
        self.expect(TokenType::In)?;
        let iter = self.expr()?;
        self.expect(TokenType::Do)?;
        let body = self.block()?;
        self.expect_match(TokenType::End, TokenType::For, line)?;
        Ok(self.ast.forlist_stat(names, iter, body))
    }

    /// A call, or an assignment to one or more names/members.
    fn expr_stat(&mut self) -> ParseResult<Stat> {
        let expr = self.primary_expr()?;
        if !self.check(&TokenType::Assign) && !self.check(&TokenType::Comma) {
            return match expr {
                Expr::Call { .. } => Ok(self.ast.expr_stat(expr)),
                _ => Err(self.error("syntax error")),
            };
        }

        let mut targets = vec![self.assign_target(expr)?];
        while self.consume(&TokenType::Comma)? {
            let target = self.primary_expr()?;
            targets.push(self.assign_target(target)?);
        }
        self.expect(TokenType::Assign)?;
        let values = self.expr_list()?;
        let assign = self.ast.assign_expr(targets, values);
        Ok(self.ast.expr_stat(assign))
    }

    fn assign_target(&self, expr: Expr) -> ParseResult<Expr> {
        match expr {
            Expr::Identifier(_) | Expr::Member { .. } => Ok(expr),
            _ => Err(self.error("syntax error")),
        }
    }

    fn expr_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut exprs = vec![self.expr()?];
        while self.consume(&TokenType::Comma)? {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        self.subexpr(1)
    }

    /// Parses an expression whose binary operators all bind at least as
    /// tightly as `limit`.
    fn subexpr(&mut self, limit: u8) -> ParseResult<Expr> {
        self.nested(|parser| parser.climb(limit))
    }

    fn climb(&mut self, limit: u8) -> ParseResult<Expr> {
        let mut left = if let Some(op) = UnOp::from_token(&self.cur_token.data) {
            self.next()?;
            let argument = self.subexpr(UNARY_PRECEDENCE)?;
            self.ast.unary_expr(op, argument)
        } else {
            self.simple_expr()?
        };

        while let Some(op) = BinOp::from_token(&self.cur_token.data) {
            let prec = op.precedence();
            if prec < limit {
                break;
            }
            self.next()?;
            let right = self.subexpr(if op.is_right_assoc() { prec } else { prec + 1 })?;
            left = self.ast.binary_expr(op, left, right);
        }
        Ok(left)
    }

    fn simple_expr(&mut self) -> ParseResult<Expr> {
        let literal = match &self.cur_token.data {
            TokenType::Number(n) => Literal::Number(*n),
            TokenType::String(s) => Literal::String(s.clone()),
            TokenType::Nil => Literal::Nil,
            TokenType::True => Literal::Bool(true),
            TokenType::False => Literal::Bool(false),
            TokenType::LeftBrace => return self.table(),
            TokenType::Function => {
                let line = self.cur_token.line;
                self.next()?;
                let body = self.func_body(false, line)?;
                return Ok(self.ast.func_expr(body));
            }
            TokenType::Ellipsis => return Err(self.error("varargs are not supported")),
            _ => return self.primary_expr(),
        };
        self.next()?;
        Ok(self.ast.literal(literal))
    }

    fn prefix_expr(&mut self) -> ParseResult<Expr> {
        match self.cur_token.data {
            TokenType::Identifier(_) => Ok(Expr::Identifier(self.expect_name()?)),
            TokenType::LeftParen => {
                let line = self.cur_token.line;
                self.next()?;
                let inner = self.expr()?;
                self.expect_match(TokenType::RightParen, TokenType::LeftParen, line)?;
                Ok(inner)
            }
            _ => Err(self.error("unexpected symbol")),
        }
    }

    /// A prefix expression followed by any chain of `.name`, `[expr]`,
    /// `:name args` and call arguments.
    fn primary_expr(&mut self) -> ParseResult<Expr> {
        let mut expr = self.prefix_expr()?;
        loop {
            match self.cur_token.data {
                TokenType::Dot => {
                    self.next()?;
                    let key = self.expect_name()?;
                    expr = self.ast.member_expr(expr, MemberSep::Dot, Expr::Identifier(key));
                }
                TokenType::LeftBracket => {
                    self.next()?;
                    let key = self.expr()?;
                    self.expect(TokenType::RightBracket)?;
                    expr = self.ast.member_expr(expr, MemberSep::Bracket, key);
                }
                TokenType::Colon => {
                    self.next()?;
                    let key = self.expect_name()?;
                    let method = self.ast.member_expr(expr, MemberSep::Colon, Expr::Identifier(key));
                    let args = self.call_args()?;
                    expr = self.ast.call_expr(method, args);
                }
                TokenType::LeftParen | TokenType::String(_) | TokenType::LeftBrace => {
                    let args = self.call_args()?;
                    expr = self.ast.call_expr(expr, args);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_args(&mut self) -> ParseResult<Vec<Expr>> {
        match &self.cur_token.data {
            TokenType::String(s) => {
                let s = s.clone();
                self.next()?;
                Ok(vec![self.ast.literal(Literal::String(s))])
            }
            TokenType::LeftBrace => Ok(vec![self.table()?]),
            TokenType::LeftParen => {
                let line = self.cur_token.line;
                self.next()?;
                if self.consume(&TokenType::RightParen)? {
                    return Ok(vec![]);
                }
                let args = self.expr_list()?;
                self.expect_match(TokenType::RightParen, TokenType::LeftParen, line)?;
                Ok(args)
            }
            _ => Err(self.error("function arguments expected")),
        }
    }

    fn table(&mut self) -> ParseResult<Expr> {
        let line = self.cur_token.line;
        self.expect(TokenType::LeftBrace)?;
        let mut fields = vec![];
        while !self.check(&TokenType::RightBrace) {
            fields.push(self.field()?);
            if !self.consume(&TokenType::Comma)? && !self.consume(&TokenType::Semicolon)? {
                break;
            }
        }
        self.expect_match(TokenType::RightBrace, TokenType::LeftBrace, line)?;
        Ok(self.ast.table_expr(fields))
    }

    fn field(&mut self) -> ParseResult<Field> {
        if self.consume(&TokenType::LeftBracket)? {
            let key = self.expr()?;
            self.expect(TokenType::RightBracket)?;
            self.expect(TokenType::Assign)?;
            let value = self.expr()?;
            return Ok(self.ast.recfield(FieldKey::Expr(key), value));
        }

        let value = self.expr()?;
        if !self.check(&TokenType::Assign) {
            return Ok(self.ast.listfield(value));
        }
        let Expr::Identifier(name) = value else {
            return Err(self.error("syntax error"));
        };
        self.next()?;
        let value = self.expr()?;
        Ok(self.ast.recfield(FieldKey::Name(name), value))
    }
}
