mod raw_token;
pub mod token;

use logos::{Lexer as LogosLexer, Logos};
use raw_token::RawToken;
pub use token::{SpannedToken, Token};

/// Scanner over Toy source.
///
/// Cloning is cheap and yields an independent cursor, which the compiler
/// uses to look ahead past a parenthesized group.
#[derive(Clone)]
pub struct Lexer<'source> {
    inner: LogosLexer<'source, RawToken>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Lexer {
            inner: RawToken::lexer(source),
        }
    }

    pub fn source(&self) -> &'source str {
        self.inner.source()
    }

    pub fn next_token(&mut self) -> Token {
        self.next_spanned().token
    }

    pub fn next_spanned(&mut self) -> SpannedToken {
        loop {
            let raw = self.inner.next();
            let span = self.inner.span();
            let line = self.inner.extras.line - self.inner.slice().matches('\n').count();
            return match raw {
                Some(Ok(RawToken::Ignored)) => continue,
                Some(Ok(raw_token)) => SpannedToken::new(Self::convert_token(raw_token), span, line),
                Some(Err(_)) => {
                    // Check if a specific error message was stored in extras
                    let error_msg = self
                        .inner
                        .extras
                        .error_message
                        .take()
                        .unwrap_or_else(|| format!("Unexpected character '{}'", self.inner.slice()));
                    SpannedToken::new(Token::Error(error_msg, span.clone()), span, line)
                }
                None => {
                    let end = self.source().len();
                    SpannedToken::new(Token::Eof, end..end, self.inner.extras.line)
                }
            };
        }
    }

    fn convert_token(raw: RawToken) -> Token {
        match raw {
            RawToken::As => Token::As,
            RawToken::Assert => Token::Assert,
            RawToken::Break => Token::Break,
            RawToken::Const => Token::Const,
            RawToken::Continue => Token::Continue,
            RawToken::Do => Token::Do,
            RawToken::Else => Token::Else,
            RawToken::Export => Token::Export,
            RawToken::For => Token::For,
            RawToken::Foreach => Token::Foreach,
            RawToken::If => Token::If,
            RawToken::Import => Token::Import,
            RawToken::In => Token::In,
            RawToken::Null => Token::Null,
            RawToken::Of => Token::Of,
            RawToken::Pass => Token::Pass,
            RawToken::Print => Token::Print,
            RawToken::Return => Token::Return,
            RawToken::Var => Token::Var,
            RawToken::While => Token::While,

            RawToken::Bool(b) => Token::Bool(b),
            RawToken::Number(n) => Token::Number(n),
            RawToken::String(s) => Token::String(s),
            RawToken::Identifier(name) => Token::Identifier(name),
            RawToken::Plus => Token::Plus,
            RawToken::Minus => Token::Minus,
            RawToken::Star => Token::Star,
            RawToken::Slash => Token::Slash,
            RawToken::Percent => Token::Percent,
            RawToken::Bang => Token::Bang,
            RawToken::BangEqual => Token::BangEqual,
            RawToken::Equal => Token::Equal,
            RawToken::EqualEqual => Token::EqualEqual,
            RawToken::Arrow => Token::Arrow,
            RawToken::Less => Token::Less,
            RawToken::LessEqual => Token::LessEqual,
            RawToken::Greater => Token::Greater,
            RawToken::GreaterEqual => Token::GreaterEqual,
            RawToken::AndAnd => Token::AndAnd,
            RawToken::OrOr => Token::OrOr,
            RawToken::LParen => Token::LParen,
            RawToken::RParen => Token::RParen,
            RawToken::LBracket => Token::LBracket,
            RawToken::RBracket => Token::RBracket,
            RawToken::LBrace => Token::LBrace,
            RawToken::RBrace => Token::RBrace,
            RawToken::Semicolon => Token::Semicolon,
            RawToken::Comma => Token::Comma,
            RawToken::Dot => Token::Dot,
            RawToken::Colon => Token::Colon,
            RawToken::Question => Token::Question,

            // both are filtered out before conversion
            RawToken::Ignored => Token::Error("Unexpected token".to_string(), 0..0),
            RawToken::UnterminatedString => Token::Error("Unterminated string".to_string(), 0..0),
            RawToken::UnterminatedComment => {
                Token::Error("Unterminated comment".to_string(), 0..0)
            }
        }
    }
}
