use logos::{Logos, Skip};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerExtras {
    /// 1-based line of the current position.
    pub line: usize,
    pub error_message: Option<String>,
}

impl Default for LexerExtras {
    fn default() -> Self {
        Self {
            line: 1,
            error_message: None,
        }
    }
}

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(extras = LexerExtras)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"//[^\n]*")]
pub enum RawToken {
    #[token("\n", newline)]
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", multiline_comment)]
    Ignored,
    // 닫히지 않은 주석: 닫힌 주석이 더 길게 매치되므로 끝까지 열린 경우에만 선택됨
    #[regex(r"/\*([^*]|\*+[^*/])*\**", unterminated_comment)]
    UnterminatedComment,

    // Keywords
    #[token("as")]
    As,
    #[token("assert")]
    Assert,
    #[token("break")]
    Break,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("do")]
    Do,
    #[token("else")]
    Else,
    #[token("export")]
    Export,
    #[token("for")]
    For,
    #[token("foreach")]
    Foreach,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("in")]
    In,
    #[token("null")]
    Null,
    #[token("of")]
    Of,
    #[token("pass")]
    Pass,
    #[token("print")]
    Print,
    #[token("return")]
    Return,
    #[token("var")]
    Var,
    #[token("while")]
    While,

    // Identifiers and literals
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Bool(bool),
    #[regex(r"[0-9]+(\.[0-9]+)?", lex_number)]
    Number(f64),
    #[regex(r#""([^"\\]|\\.)*""#, lex_string)]
    String(String),
    #[regex(r#""([^"\\]|\\.)*"#, unterminated_string)]
    UnterminatedString,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", lex_identifier)]
    Identifier(String),

    // Operators and punctuation
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token("=>")]
    Arrow,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("?")]
    Question,
}

fn newline(lexer: &mut logos::Lexer<RawToken>) -> Skip {
    lexer.extras.line += 1;
    Skip
}

fn multiline_comment(lexer: &mut logos::Lexer<RawToken>) -> Skip {
    lexer.extras.line += lexer.slice().matches('\n').count();
    Skip
}

fn lex_number(lexer: &mut logos::Lexer<RawToken>) -> Option<f64> {
    lexer.slice().parse::<f64>().ok()
}

fn lex_identifier(lexer: &mut logos::Lexer<RawToken>) -> Option<String> {
    Some(lexer.slice().to_string())
}

fn lex_string(lexer: &mut logos::Lexer<RawToken>) -> Result<String, ()> {
    let slice = lexer.slice();
    lexer.extras.line += slice.matches('\n').count();
    let body = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                lexer.extras.error_message = Some(format!("Unknown escape sequence '\\{}'", other));
                return Err(());
            }
            None => out.push('\\'),
        }
    }
    Ok(out)
}

fn unterminated_string(lexer: &mut logos::Lexer<RawToken>) -> Result<(), ()> {
    lexer.extras.line += lexer.slice().matches('\n').count();
    lexer.extras.error_message = Some("Unterminated string".to_string());
    Err(())
}

fn unterminated_comment(lexer: &mut logos::Lexer<RawToken>) -> Result<(), ()> {
    lexer.extras.line += lexer.slice().matches('\n').count();
    lexer.extras.error_message = Some("Unterminated comment".to_string());
    Err(())
}
