use crate::token::{Token, TokenType};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}:{column}] {kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unfinished string")]
    UnterminatedString,
    #[error("unfinished long string or comment")]
    UnterminatedLongBracket,
    #[error("invalid long string delimiter")]
    InvalidLongBracket,
    #[error("malformed number near '{0}'")]
    MalformedNumber(String),
}

/// Pull-based tokenizer. Each call to [`Lexer::scan`] yields one token; once
/// the input is exhausted every further call yields [`TokenType::Eos`].
pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.get(self.index + n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    // "match" is a keyword in the metalanguage already.
    fn match_next(&mut self, c: char) -> bool {
        let res = self.peek() == Some(c);
        if res {
            self.advance();
        }
        res
    }

    fn error(&self, kind: LexErrorKind, line: usize, column: usize) -> LexError {
        LexError { kind, line, column }
    }

    pub fn scan(&mut self) -> Result<Token, LexError> {
        loop {
            let (line, column) = (self.line, self.column);
            let Some(c) = self.advance() else {
                return Ok(Token::new(TokenType::Eos, line, column));
            };

            let tok = match c {
                ' ' | '\t' | '\r' | '\n' | '\x0b' | '\x0c' => continue,
                '(' => TokenType::LeftParen,
                ')' => TokenType::RightParen,
                '{' => TokenType::LeftBrace,
                '}' => TokenType::RightBrace,
                ']' => TokenType::RightBracket,
                ',' => TokenType::Comma,
                ';' => TokenType::Semicolon,
                ':' => TokenType::Colon,
                '+' => TokenType::Plus,
                '*' => TokenType::Star,
                '/' => TokenType::Slash,
                '%' => TokenType::Percent,
                '^' => TokenType::Caret,
                '#' => TokenType::Hash,
                '-' => {
                    if self.match_next('-') {
                        self.comment(line, column)?
                    } else {
                        TokenType::Minus
                    }
                }
                '[' => match self.long_bracket_at(0) {
                    (level, true) => TokenType::String(self.long_bracket(level, line, column)?),
                    (0, false) => TokenType::LeftBracket,
                    (_, false) => {
                        return Err(self.error(LexErrorKind::InvalidLongBracket, line, column))
                    }
                },
                '=' => {
                    if self.match_next('=') {
                        TokenType::Equal
                    } else {
                        TokenType::Assign
                    }
                }
                '<' => {
                    if self.match_next('=') {
                        TokenType::LessEqual
                    } else {
                        TokenType::Less
                    }
                }
                '>' => {
                    if self.match_next('=') {
                        TokenType::GreaterEqual
                    } else {
                        TokenType::Greater
                    }
                }
                '~' => {
                    if self.match_next('=') {
                        TokenType::NotEqual
                    } else {
                        return Err(self.error(LexErrorKind::UnexpectedCharacter('~'), line, column));
                    }
                }
                '.' => {
                    if self.match_next('.') {
                        if self.match_next('.') {
                            TokenType::Ellipsis
                        } else {
                            TokenType::Concat
                        }
                    } else if self.peek().is_some_and(|d| d.is_ascii_digit()) {
                        self.number('.', line, column)?
                    } else {
                        TokenType::Dot
                    }
                }
                '"' | '\'' => self.short_string(c, line, column)?,
                '0'..='9' => self.number(c, line, column)?,
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let mut word = String::from(c);
                    while let Some(c) = self.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
                        word.push(c);
                        self.advance();
                    }
                    TokenType::keyword(&word).unwrap_or_else(|| TokenType::Identifier(word.into()))
                }
                c => return Err(self.error(LexErrorKind::UnexpectedCharacter(c), line, column)),
            };

            return Ok(Token::new(tok, line, column));
        }
    }

    /// Measures a long-bracket opener whose `[` sits just before `index + offset`.
    /// Returns the length of the `=` run and whether a second `[` closes it.
    fn long_bracket_at(&self, offset: usize) -> (usize, bool) {
        let level = self
            .chars
            .get(self.index + offset..)
            .map_or(0, |rest| rest.iter().take_while(|c| **c == '=').count());
        (level, self.peek_nth(offset + level) == Some('['))
    }

    fn long_bracket(&mut self, level: usize, line: usize, column: usize) -> Result<Rc<str>, LexError> {
        // The `=` run and the second `[`.
        for _ in 0..=level {
            self.advance();
        }

        let mut text = String::new();
        loop {
            match self.advance() {
                Some(']') if self.closes_long_bracket(level) => {
                    for _ in 0..=level {
                        self.advance();
                    }
                    return Ok(text.into());
                }
                Some(c) => text.push(c),
                None => {
                    return Err(self.error(LexErrorKind::UnterminatedLongBracket, line, column))
                }
            }
        }
    }

    fn closes_long_bracket(&self, level: usize) -> bool {
        (0..level).all(|i| self.peek_nth(i) == Some('=')) && self.peek_nth(level) == Some(']')
    }

    fn comment(&mut self, line: usize, column: usize) -> Result<TokenType, LexError> {
        if self.peek() == Some('[') {
            if let (level, true) = self.long_bracket_at(1) {
                self.advance();
                return Ok(TokenType::Comment(self.long_bracket(level, line, column)?));
            }
        }

        let mut text = String::new();
        while let Some(c) = self.peek().filter(|c| *c != '\n') {
            text.push(c);
            self.advance();
        }
        Ok(TokenType::Comment(text.into()))
    }

    fn short_string(&mut self, quote: char, line: usize, column: usize) -> Result<TokenType, LexError> {
        let mut text = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(TokenType::String(text.into())),
                Some(c) => text.push(c),
                None => return Err(self.error(LexErrorKind::UnterminatedString, line, column)),
            }
        }
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(d) = self.peek().filter(char::is_ascii_digit) {
            text.push(d);
            self.advance();
        }
    }

    fn number(&mut self, first: char, line: usize, column: usize) -> Result<TokenType, LexError> {
        let mut text = String::from(first);

        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            if let Some(x) = self.advance() {
                text.push(x);
            }
            let mut value = 0.0;
            let mut any = false;
            while let Some(c) = self.peek().filter(char::is_ascii_hexdigit) {
                value = value * 16.0 + f64::from(c.to_digit(16).unwrap_or(0));
                text.push(c);
                any = true;
                self.advance();
            }
            if !any {
                return Err(self.error(LexErrorKind::MalformedNumber(text), line, column));
            }
            self.reject_trailing(text, line, column)?;
            return Ok(TokenType::Number(value));
        }

        self.digits(&mut text);
        // `1..2` is a number followed by a concatenation, not a fraction.
        if first != '.' && self.peek() == Some('.') && self.peek_nth(1) != Some('.') {
            text.push('.');
            self.advance();
            self.digits(&mut text);
        }

        if let Some(e) = self.peek().filter(|c| matches!(c, 'e' | 'E')) {
            text.push(e);
            self.advance();
            if let Some(sign) = self.peek().filter(|c| matches!(c, '+' | '-')) {
                text.push(sign);
                self.advance();
            }
            let before = text.len();
            self.digits(&mut text);
            if text.len() == before {
                return Err(self.error(LexErrorKind::MalformedNumber(text), line, column));
            }
        }

        let text = self.reject_trailing(text, line, column)?;
        text.parse::<f64>()
            .map(TokenType::Number)
            .map_err(|_| self.error(LexErrorKind::MalformedNumber(text), line, column))
    }

    /// A numeral running straight into a name, as in `3abc`, is malformed.
    fn reject_trailing(&mut self, mut text: String, line: usize, column: usize) -> Result<String, LexError> {
        if !self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Ok(text);
        }
        while let Some(c) = self.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
            text.push(c);
            self.advance();
        }
        Err(self.error(LexErrorKind::MalformedNumber(text), line, column))
    }
}

/// Scans the whole source, stopping before the end-of-input token.
pub fn scan_all(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut result = vec![];
    loop {
        let tok = lexer.scan()?;
        if tok.data == TokenType::Eos {
            return Ok(result);
        }
        result.push(tok);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenType> {
        scan_all(source)
            .expect("source should lex")
            .into_iter()
            .map(|t| t.data)
            .collect()
    }

    fn lex_err(source: &str) -> LexErrorKind {
        scan_all(source).expect_err("source should not lex").kind
    }

    #[test]
    fn punctuation_and_operators() {
        assert_eq!(
            kinds("( ) [ ] { } , ; : . .. ... + - * / % ^ # = == ~= < <= > >="),
            vec![
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBracket,
                TokenType::RightBracket,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::Comma,
                TokenType::Semicolon,
                TokenType::Colon,
                TokenType::Dot,
                TokenType::Concat,
                TokenType::Ellipsis,
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::Percent,
                TokenType::Caret,
                TokenType::Hash,
                TokenType::Assign,
                TokenType::Equal,
                TokenType::NotEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
            ]
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(
            kinds("local Local elseif else_ _end"),
            vec![
                TokenType::Local,
                TokenType::Identifier("Local".into()),
                TokenType::Elseif,
                TokenType::Identifier("else_".into()),
                TokenType::Identifier("_end".into()),
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("3 3.25 0x1F 0XfF 2e3 5E-1 1.5e+2 .5"),
            vec![
                TokenType::Number(3.0),
                TokenType::Number(3.25),
                TokenType::Number(31.0),
                TokenType::Number(255.0),
                TokenType::Number(2000.0),
                TokenType::Number(0.5),
                TokenType::Number(150.0),
                TokenType::Number(0.5),
            ]
        );
    }

    #[test]
    fn number_before_concat() {
        assert_eq!(
            kinds("1..2"),
            vec![TokenType::Number(1.0), TokenType::Concat, TokenType::Number(2.0)]
        );
    }

    #[test]
    fn malformed_numbers() {
        assert_eq!(lex_err("0x"), LexErrorKind::MalformedNumber("0x".into()));
        assert_eq!(lex_err("1e+"), LexErrorKind::MalformedNumber("1e+".into()));
        assert_eq!(lex_err("3abc"), LexErrorKind::MalformedNumber("3abc".into()));
    }

    #[test]
    fn short_strings_copy_literally() {
        assert_eq!(
            kinds(r#"'it''s' "a\nb" "'""#),
            vec![
                TokenType::String("it".into()),
                TokenType::String("s".into()),
                TokenType::String("a\\nb".into()),
                TokenType::String("'".into()),
            ]
        );
        assert_eq!(lex_err("\"open"), LexErrorKind::UnterminatedString);
    }

    #[test]
    fn long_brackets_round_trip() {
        for (source, text) in [
            ("[[hello]]", "hello"),
            ("[=[a]]b]=]", "a]]b"),
            ("[==[x]=]y]==]", "x]=]y"),
            ("[[\nline one\nline two]]", "\nline one\nline two"),
        ] {
            assert_eq!(kinds(source), vec![TokenType::String(text.into())], "{source}");
        }
    }

    #[test]
    fn long_bracket_levels_must_match() {
        assert_eq!(lex_err("[==[abc]=]"), LexErrorKind::UnterminatedLongBracket);
        assert_eq!(lex_err("[[abc"), LexErrorKind::UnterminatedLongBracket);
        assert_eq!(lex_err("[=abc"), LexErrorKind::InvalidLongBracket);
    }

    #[test]
    fn comments() {
        assert_eq!(
            kinds("a -- trailing\n--[==[ long\n]] still ]==] b --[x not long"),
            vec![
                TokenType::Identifier("a".into()),
                TokenType::Comment(" trailing".into()),
                TokenType::Comment(" long\n]] still ".into()),
                TokenType::Identifier("b".into()),
                TokenType::Comment("[x not long".into()),
            ]
        );
    }

    #[test]
    fn positions_are_tracked() {
        let toks = scan_all("local a\n  = [[x\ny]] b").expect("source should lex");
        let positions: Vec<_> = toks.iter().map(|t| (t.line, t.column)).collect();
        assert_eq!(positions, vec![(1, 1), (1, 7), (2, 3), (2, 5), (3, 5)]);
    }

    #[test]
    fn eos_repeats() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.scan().map(|t| t.data), Ok(TokenType::Identifier("x".into())));
        assert_eq!(lexer.scan().map(|t| t.data), Ok(TokenType::Eos));
        assert_eq!(lexer.scan().map(|t| t.data), Ok(TokenType::Eos));
    }

    #[test]
    fn unexpected_characters_carry_position() {
        assert_eq!(
            scan_all("a = 1\nb = @"),
            Err(LexError {
                kind: LexErrorKind::UnexpectedCharacter('@'),
                line: 2,
                column: 5
            })
        );
        assert_eq!(lex_err("a ~ b"), LexErrorKind::UnexpectedCharacter('~'));
    }
}
