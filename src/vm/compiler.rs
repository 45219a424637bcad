use super::bytecode::{Chunk, Literal, OpCode};
use super::value::Function;
use crate::Diagnostic;
use crate::config::Config;
use crate::lexer::{Lexer, SpannedToken, Token};
use std::mem::discriminant;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

/// Every diagnostic reported while compiling one source buffer.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("compilation failed with {} error(s)", .diagnostics.len())]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Self {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

type ParseFn<'src> = fn(&mut Compiler<'src>, bool);

struct ParseRule<'src> {
    prefix: Option<ParseFn<'src>>,
    infix: Option<ParseFn<'src>>,
    precedence: Precedence,
}

/// Single-pass compiler: parses with a Pratt table and writes bytecode as it goes.
pub struct Compiler<'src> {
    lexer: Lexer<'src>,
    previous: SpannedToken,
    current: SpannedToken,
    chunk: Chunk,
    /// Nesting of function bodies being compiled; `return` needs at least one.
    function_depth: usize,
    error: bool,
    panic: bool,
    diagnostics: Vec<Diagnostic>,
    config: Config,
}

/// Compiles `source` into a chunk.
pub fn compile(source: &str, config: &Config) -> Result<Chunk, CompileError> {
    Compiler::new(source, config.clone()).compile()
}

impl<'src> Compiler<'src> {
    pub fn new(source: &'src str, config: Config) -> Self {
        let start = SpannedToken::new(Token::Eof, 0..0, 1);
        Self {
            lexer: Lexer::new(source),
            previous: start.clone(),
            current: start,
            chunk: Chunk::new(),
            function_depth: 0,
            error: false,
            panic: false,
            diagnostics: Vec::new(),
            config,
        }
    }

    pub fn compile(mut self) -> Result<Chunk, CompileError> {
        self.advance();
        while !self.match_token(&Token::Eof) {
            self.declaration();
        }
        self.emit_op(OpCode::Eof);

        if self.error {
            debug!(errors = self.diagnostics.len(), "compilation failed");
            Err(CompileError {
                diagnostics: self.diagnostics,
            })
        } else {
            Ok(self.chunk)
        }
    }

    // ========== 토큰 처리 ==========

    fn advance(&mut self) {
        loop {
            let next = self.lexer.next_spanned();
            if self.config.verbose {
                trace!(line = next.line, token = %next.token, "scan");
            }
            if let Token::Error(message, _) = &next.token {
                let message = message.clone();
                self.error_at(&next, &message);
                continue;
            }
            self.previous = std::mem::replace(&mut self.current, next);
            return;
        }
    }

    fn check(&self, kind: &Token) -> bool {
        discriminant(&self.current.token) == discriminant(kind)
    }

    fn match_token(&mut self, kind: &Token) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: &Token, message: &str) {
        if self.check(kind) {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Option<String> {
        if let Token::Identifier(name) = &self.current.token {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            self.error_at_current(message);
            None
        }
    }

    // ========== 오류 보고 ==========

    fn error_at_current(&mut self, message: &str) {
        let token = self.current.clone();
        self.error_at(&token, message);
    }

    fn error_at_previous(&mut self, message: &str) {
        let token = self.previous.clone();
        self.error_at(&token, message);
    }

    fn error_at(&mut self, token: &SpannedToken, message: &str) {
        if self.panic {
            return;
        }
        self.panic = true;
        self.error = true;

        let message = match &token.token {
            Token::Eof => format!("Error at end: {}", message),
            Token::Error(..) => format!("Error: {}", message),
            _ => {
                let lexeme = self.lexer.source().get(token.span.clone()).unwrap_or("");
                format!("Error at '{}': {}", lexeme, message)
            }
        };
        debug!(line = token.line, "{}", message);
        self.diagnostics.push(Diagnostic {
            message,
            span: token.span.clone(),
            line: token.line,
        });
    }

    /// Skips to the next statement boundary after an error.
    fn synchronize(&mut self) {
        self.panic = false;
        while self.current.token != Token::Eof {
            if self.previous.token == Token::Semicolon || self.current.token.starts_statement() {
                return;
            }
            self.advance();
        }
    }

    // ========== 코드 생성 ==========

    fn emit_op(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.previous.line);
    }

    fn emit_literal(&mut self, literal: Literal) {
        self.chunk.emit_literal(literal, self.previous.line);
    }

    // ========== 문장 ==========

    fn declaration(&mut self) {
        if self.match_token(&Token::Var) {
            self.binding_declaration(false);
        } else if self.match_token(&Token::Const) {
            self.binding_declaration(true);
        } else {
            self.statement();
        }

        if self.panic {
            self.synchronize();
        }
    }

    fn binding_declaration(&mut self, constant: bool) {
        let Some(name) = self.consume_identifier("Expected variable name") else {
            return;
        };
        self.emit_literal(Literal::String(name));

        if self.match_token(&Token::Equal) {
            self.expression();
        } else if constant {
            self.error_at_current("Constants must be initialized");
            return;
        } else {
            self.emit_literal(Literal::Nil);
        }

        self.consume(&Token::Semicolon, "Expected ';' after variable declaration");
        self.emit_op(if constant {
            OpCode::ConstantDeclare
        } else {
            OpCode::VariableDeclare
        });
    }

    fn statement(&mut self) {
        match self.current.token {
            Token::Print => {
                self.advance();
                self.expression();
                self.consume(&Token::Semicolon, "Expected ';' after value");
                self.emit_op(OpCode::Print);
            }
            Token::Assert => {
                self.advance();
                self.expression();
                self.consume(&Token::Comma, "Expected ',' after assertion");
                self.expression();
                self.consume(&Token::Semicolon, "Expected ';' after assertion message");
                self.emit_op(OpCode::Assert);
            }
            Token::Return => {
                self.advance();
                self.return_statement();
            }
            Token::Pass => {
                self.advance();
                self.consume(&Token::Semicolon, "Expected ';' after pass");
            }
            Token::LBrace => {
                self.advance();
                self.emit_op(OpCode::ScopeBegin);
                self.block();
                self.emit_op(OpCode::ScopeEnd);
            }
            Token::If
            | Token::Else
            | Token::While
            | Token::For
            | Token::Foreach
            | Token::Do
            | Token::Break
            | Token::Continue
            | Token::Import
            | Token::Export => {
                let keyword = self.current.token.to_string();
                self.error_at_current(&format!("'{}' is not supported", keyword));
                self.advance();
            }
            _ => {
                self.expression();
                self.consume(&Token::Semicolon, "Expected ';' after expression");
                self.emit_op(OpCode::Pop);
            }
        }
    }

    fn block(&mut self) {
        while !self.check(&Token::RBrace) && !self.check(&Token::Eof) {
            self.declaration();
        }
        self.consume(&Token::RBrace, "Expected '}' after block");
    }

    fn return_statement(&mut self) {
        if self.function_depth == 0 {
            self.error_at_previous("Can't return from top-level code");
        }
        if self.match_token(&Token::Semicolon) {
            self.emit_literal(Literal::Nil);
        } else {
            self.expression();
            self.consume(&Token::Semicolon, "Expected ';' after return value");
        }
        self.emit_op(OpCode::Return);
    }

    // ========== 표현식 ==========

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn rule(token: &Token) -> ParseRule<'src> {
        let (prefix, infix, precedence): (Option<ParseFn<'src>>, Option<ParseFn<'src>>, _) =
            match token {
                Token::LParen => (Some(Self::grouping), Some(Self::call), Precedence::Call),
                Token::Minus => (Some(Self::unary), Some(Self::binary), Precedence::Term),
                Token::Plus => (None, Some(Self::binary), Precedence::Term),
                Token::Star | Token::Slash | Token::Percent => {
                    (None, Some(Self::binary), Precedence::Factor)
                }
                Token::Bang => (Some(Self::unary), None, Precedence::None),
                Token::EqualEqual | Token::BangEqual => {
                    (None, Some(Self::binary), Precedence::Equality)
                }
                Token::Less | Token::LessEqual | Token::Greater | Token::GreaterEqual => {
                    (None, Some(Self::binary), Precedence::Comparison)
                }
                Token::Identifier(_) => (Some(Self::variable), None, Precedence::None),
                Token::Number(_) | Token::String(_) | Token::Bool(_) | Token::Null => {
                    (Some(Self::literal), None, Precedence::None)
                }
                _ => (None, None, Precedence::None),
            };
        ParseRule {
            prefix,
            infix,
            precedence,
        }
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = Self::rule(&self.previous.token).prefix else {
            self.error_at_previous("Expected expression");
            return;
        };

        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= Self::rule(&self.current.token).precedence {
            self.advance();
            if let Some(infix) = Self::rule(&self.previous.token).infix {
                infix(self, can_assign);
            }
        }

        if can_assign && self.match_token(&Token::Equal) {
            self.error_at_previous("Invalid assignment target");
        }
    }

    fn literal(&mut self, _can_assign: bool) {
        let literal = match &self.previous.token {
            Token::Number(n) => Literal::Number(*n),
            Token::String(s) => Literal::String(s.clone()),
            Token::Bool(b) => Literal::Bool(*b),
            _ => Literal::Nil,
        };
        self.emit_literal(literal);
    }

    fn variable(&mut self, can_assign: bool) {
        let name = match &self.previous.token {
            Token::Identifier(name) => name.clone(),
            _ => return,
        };
        self.emit_literal(Literal::String(name));

        if can_assign && self.match_token(&Token::Equal) {
            self.expression();
            self.emit_op(OpCode::VariableSet);
        } else {
            self.emit_op(OpCode::VariableGet);
        }
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.token.clone();
        self.parse_precedence(Precedence::Unary);
        match operator {
            Token::Minus => self.emit_op(OpCode::Negate),
            Token::Bang => self.emit_op(OpCode::Not),
            _ => {}
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.token.clone();
        let precedence = Self::rule(&operator).precedence;
        self.parse_precedence(precedence.next());

        match operator {
            Token::Plus => self.emit_op(OpCode::Add),
            Token::Minus => self.emit_op(OpCode::Subtract),
            Token::Star => self.emit_op(OpCode::Multiply),
            Token::Slash => self.emit_op(OpCode::Divide),
            Token::Percent => self.emit_op(OpCode::Modulo),
            Token::EqualEqual => self.emit_op(OpCode::Equality),
            Token::BangEqual => {
                self.emit_op(OpCode::Equality);
                self.emit_op(OpCode::Not);
            }
            Token::Greater => self.emit_op(OpCode::Greater),
            Token::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            Token::Less => self.emit_op(OpCode::Less),
            Token::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            _ => {}
        }
    }

    /// Infix `(`: the callee is already on the stack.
    fn call(&mut self, _can_assign: bool) {
        self.emit_op(OpCode::GroupingBegin);
        if !self.check(&Token::RParen) {
            loop {
                self.expression();
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "Expected ')' after arguments");
        self.emit_op(OpCode::GroupingEnd);
    }

    /// Prefix `(`: a parameter list when the matching `)` is followed by `=>`,
    /// otherwise a plain grouping, which needs no code of its own.
    fn grouping(&mut self, _can_assign: bool) {
        if self.arrow_follows_group() {
            self.function_literal();
            return;
        }
        self.expression();
        self.consume(&Token::RParen, "Expected ')' after expression");
    }

    fn arrow_follows_group(&self) -> bool {
        let mut ahead = self.lexer.clone();
        let mut token = self.current.token.clone();
        let mut depth = 1usize;
        loop {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return ahead.next_token() == Token::Arrow;
                    }
                }
                Token::Eof => return false,
                _ => {}
            }
            token = ahead.next_token();
        }
    }

    fn function_literal(&mut self) {
        let mut parameters = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let Some(name) = self.consume_identifier("Expected parameter name") else {
                    return;
                };
                let parameter = Literal::String(name);
                if parameters.contains(&parameter) {
                    self.error_at_previous("Duplicate parameter name");
                }
                parameters.push(parameter);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "Expected ')' after parameters");
        self.consume(&Token::Arrow, "Expected '=>' after parameters");

        let enclosing = std::mem::take(&mut self.chunk);
        self.function_depth += 1;
        if self.match_token(&Token::LBrace) {
            self.block();
        } else {
            // expression body: implicit return
            self.expression();
            self.emit_op(OpCode::Return);
        }
        self.emit_op(OpCode::Eof);
        self.function_depth -= 1;
        let body = std::mem::replace(&mut self.chunk, enclosing);

        self.emit_literal(Literal::Function(Rc::new(Function::new(parameters, body))));
        self.emit_op(OpCode::FunctionDeclare);
    }
}
