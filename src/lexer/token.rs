use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    As,
    Assert,
    Break,
    Const,
    Continue,
    Do,
    Else,
    Export,
    For,
    Foreach,
    If,
    Import,
    In,
    Of,
    Pass,
    Print,
    Return,
    Var,
    While,
    // Identifiers and literals
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Identifier(String),
    // Operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Arrow,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAnd,
    OrOr,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Comma,
    Dot,
    Colon,
    Question,
    // Special tokens
    Eof,

    Error(String, Range<usize>),
}

impl Token {
    /// Keywords that may begin a statement; error recovery resumes at these.
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            Token::Assert
                | Token::Break
                | Token::Const
                | Token::Continue
                | Token::Do
                | Token::For
                | Token::Foreach
                | Token::If
                | Token::Import
                | Token::Export
                | Token::Pass
                | Token::Print
                | Token::Return
                | Token::Var
                | Token::While
        )
    }
}

/// A token together with its byte span and source line.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Range<usize>,
    pub line: usize,
}

impl SpannedToken {
    pub fn new(token: Token, span: Range<usize>, line: usize) -> Self {
        Self { token, span, line }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            // Keywords
            Token::As => write!(f, "as"),
            Token::Assert => write!(f, "assert"),
            Token::Break => write!(f, "break"),
            Token::Const => write!(f, "const"),
            Token::Continue => write!(f, "continue"),
            Token::Do => write!(f, "do"),
            Token::Else => write!(f, "else"),
            Token::Export => write!(f, "export"),
            Token::For => write!(f, "for"),
            Token::Foreach => write!(f, "foreach"),
            Token::If => write!(f, "if"),
            Token::Import => write!(f, "import"),
            Token::In => write!(f, "in"),
            Token::Of => write!(f, "of"),
            Token::Pass => write!(f, "pass"),
            Token::Print => write!(f, "print"),
            Token::Return => write!(f, "return"),
            Token::Var => write!(f, "var"),
            Token::While => write!(f, "while"),
            // Identifiers and literals
            Token::Null => write!(f, "null"),
            Token::Bool(b) => write!(f, "{}", b),
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Identifier(name) => write!(f, "{}", name),
            // Operators and punctuation
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Bang => write!(f, "!"),
            Token::BangEqual => write!(f, "!="),
            Token::Equal => write!(f, "="),
            Token::EqualEqual => write!(f, "=="),
            Token::Arrow => write!(f, "=>"),
            Token::Less => write!(f, "<"),
            Token::LessEqual => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEqual => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Semicolon => write!(f, ";"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Colon => write!(f, ":"),
            Token::Question => write!(f, "?"),
            // Special tokens
            Token::Eof => write!(f, "end of file"),
            Token::Error(msg, _) => write!(f, "error: {}", msg),
        }
    }
}
