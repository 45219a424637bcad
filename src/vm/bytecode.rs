use serde::{Deserialize, Serialize};
use std::rc::Rc;
use strum::{Display, FromRepr};

use super::dictionary::Dictionary;
use super::value::{Event, Function};

/// Tagged runtime value.
///
/// Compiled literals, stack values and dictionary entries all use this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Literal {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Literal>),
    Dictionary(Box<Dictionary>),
    Function(Rc<Function>),
    Event(Event),
}

impl Literal {
    pub fn is_nil(&self) -> bool {
        matches!(self, Literal::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<Function>> {
        match self {
            Literal::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        super::utils::literals_equal(self, other)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(n)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

/// One-byte opcodes. Everything above `LongSentinel` carries a 4-byte operand.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OpCode {
    Eof = 0,
    Return,

    // scopes and groupings
    ScopeBegin,
    ScopeEnd,
    GroupingBegin,
    GroupingEnd,

    // arithmetic and comparison
    Equality,
    Greater,
    Less,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
    Not,

    // short operand (1 byte)
    Literal,

    // bindings
    ConstantDeclare,
    VariableDeclare,
    VariableGet,
    VariableSet,
    FunctionDeclare,

    Print,
    Assert,
    Pop,

    LongSentinel,

    // long operand (4 bytes, little endian)
    LiteralLong,
}

impl OpCode {
    pub fn is_long(self) -> bool {
        (self as u8) > OpCode::LongSentinel as u8
    }

    /// Number of operand bytes following the opcode.
    pub fn operand_width(self) -> usize {
        match self {
            OpCode::Literal => 1,
            OpCode::LiteralLong => 4,
            _ => 0,
        }
    }
}

/// Compiled unit: bytecode, a line for every byte, and the literal pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub lines: Vec<usize>,
    pub literals: Vec<Literal>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn write(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.write(op as u8, line);
    }

    pub fn write_long(&mut self, value: u32, line: usize) {
        for byte in value.to_le_bytes() {
            self.write(byte, line);
        }
    }

    pub fn find_literal(&self, literal: &Literal) -> Option<usize> {
        self.literals.iter().position(|l| l == literal)
    }

    /// Returns the pool index of `literal`, appending it on a miss.
    pub fn intern_literal(&mut self, literal: Literal) -> usize {
        if let Some(index) = self.find_literal(&literal) {
            return index;
        }
        self.literals.push(literal);
        self.literals.len() - 1
    }

    /// Emits `OP_LITERAL` or `OP_LITERAL_LONG` depending on the pool index.
    pub fn emit_literal(&mut self, literal: Literal, line: usize) -> usize {
        let index = self.intern_literal(literal);
        if index < 256 {
            self.write_op(OpCode::Literal, line);
            self.write(index as u8, line);
        } else {
            self.write_op(OpCode::LiteralLong, line);
            self.write_long(index as u32, line);
        }
        index
    }

    pub fn read_u8(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.code.get(offset..offset + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Source line of the byte at `offset`.
    pub fn line_at(&self, offset: usize) -> Option<usize> {
        self.lines.get(offset).copied()
    }
}

/// On-disk container for a compiled chunk.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkFile {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub build: String,
    pub chunk: Chunk,
}

impl ChunkFile {
    pub const MAJOR: u8 = 0;
    pub const MINOR: u8 = 1;
    pub const PATCH: u8 = 0;

    pub fn new(chunk: Chunk) -> Self {
        Self {
            major: Self::MAJOR,
            minor: Self::MINOR,
            patch: Self::PATCH,
            build: env!("CARGO_PKG_VERSION").to_string(),
            chunk,
        }
    }

    pub fn version_matches(&self) -> bool {
        (self.major, self.minor, self.patch) == (Self::MAJOR, Self::MINOR, Self::PATCH)
    }
}
