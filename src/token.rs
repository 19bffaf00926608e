use std::{fmt, rc::Rc};

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub data: TokenType,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(data: TokenType, line: usize, column: usize) -> Self {
        Token { data, line, column }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Concat,
    Ellipsis,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Hash,

    Assign,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    Identifier(Rc<str>),
    String(Rc<str>),
    Number(f64),
    Comment(Rc<str>),

    And,
    Break,
    Do,
    Else,
    Elseif,
    End,
    False,
    For,
    Function,
    If,
    In,
    Local,
    Nil,
    Not,
    Or,
    Repeat,
    Return,
    Then,
    True,
    Until,
    While,

    Eos,
}

impl TokenType {
    pub fn keyword(word: &str) -> Option<TokenType> {
        Some(match word {
            "and" => TokenType::And,
            "break" => TokenType::Break,
            "do" => TokenType::Do,
            "else" => TokenType::Else,
            "elseif" => TokenType::Elseif,
            "end" => TokenType::End,
            "false" => TokenType::False,
            "for" => TokenType::For,
            "function" => TokenType::Function,
            "if" => TokenType::If,
            "in" => TokenType::In,
            "local" => TokenType::Local,
            "nil" => TokenType::Nil,
            "not" => TokenType::Not,
            "or" => TokenType::Or,
            "repeat" => TokenType::Repeat,
            "return" => TokenType::Return,
            "then" => TokenType::Then,
            "true" => TokenType::True,
            "until" => TokenType::Until,
            "while" => TokenType::While,
            _ => return None,
        })
    }

    /// Tokens that close a block: `else`, `elseif`, `end`, `until` and end of input.
    pub fn is_block_follow(&self) -> bool {
        matches!(
            self,
            TokenType::Else | TokenType::Elseif | TokenType::End | TokenType::Until | TokenType::Eos
        )
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Identifier(id) => return write!(f, "{id}"),
            Self::String(s) => return write!(f, "\"{s}\""),
            Self::Number(n) => return write!(f, "{n}"),
            Self::Comment(_) => "comment",
            Self::LeftParen => "(",
            Self::RightParen => ")",
            Self::LeftBracket => "[",
            Self::RightBracket => "]",
            Self::LeftBrace => "{",
            Self::RightBrace => "}",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::Concat => "..",
            Self::Ellipsis => "...",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Caret => "^",
            Self::Hash => "#",
            Self::Assign => "=",
            Self::Equal => "==",
            Self::NotEqual => "~=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::And => "and",
            Self::Break => "break",
            Self::Do => "do",
            Self::Else => "else",
            Self::Elseif => "elseif",
            Self::End => "end",
            Self::False => "false",
            Self::For => "for",
            Self::Function => "function",
            Self::If => "if",
            Self::In => "in",
            Self::Local => "local",
            Self::Nil => "nil",
            Self::Not => "not",
            Self::Or => "or",
            Self::Repeat => "repeat",
            Self::Return => "return",
            Self::Then => "then",
            Self::True => "true",
            Self::Until => "until",
            Self::While => "while",
            Self::Eos => "<eof>",
        };
        f.write_str(text)
    }
}
