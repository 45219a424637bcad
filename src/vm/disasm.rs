use super::bytecode::{Chunk, Literal, OpCode};
use super::utils::display_literal;
use std::fmt::{self, Write};

pub fn disassemble_chunk_to_string(chunk: &Chunk, name: &str) -> String {
    let mut output = String::new();
    let _ = disassemble_chunk(chunk, name, &mut output);
    output
}

/// Writes every instruction of `chunk`, then the chunks of any function literals it holds.
pub fn disassemble_chunk(chunk: &Chunk, name: &str, w: &mut impl Write) -> fmt::Result {
    writeln!(w, "== {} ==", name)?;

    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, offset, w)?;
        writeln!(w)?;
    }

    for (index, literal) in chunk.literals.iter().enumerate() {
        if let Literal::Function(function) = literal {
            writeln!(w)?;
            disassemble_chunk(&function.chunk, &format!("<function {}>", index), w)?;
        }
    }
    Ok(())
}

/// Writes the instruction at `offset` (without a newline) and returns the next offset.
pub fn disassemble_instruction(
    chunk: &Chunk,
    offset: usize,
    w: &mut impl Write,
) -> Result<usize, fmt::Error> {
    write!(w, "{:04} ", offset)?;
    let line = chunk.line_at(offset).unwrap_or(0);
    if offset > 0 && chunk.line_at(offset - 1) == Some(line) {
        write!(w, "   | ")?;
    } else {
        write!(w, "{:4} ", line)?;
    }

    let byte = chunk.code[offset];
    let Some(op) = OpCode::from_repr(byte) else {
        write!(w, "Unknown opcode {}", byte)?;
        return Ok(offset + 1);
    };

    let index = match op {
        OpCode::Literal => chunk.read_u8(offset + 1).map(usize::from),
        OpCode::LiteralLong => chunk.read_u32(offset + 1).map(|i| i as usize),
        _ => {
            write!(w, "OP_{}", op)?;
            return Ok(offset + 1);
        }
    };

    let name = format!("OP_{}", op);
    match index {
        Some(index) => {
            let value = chunk
                .literals
                .get(index)
                .map(display_literal)
                .unwrap_or_else(|| "<out of range>".to_string());
            write!(w, "{:<20} {:4} '{}'", name, index, value)?;
        }
        None => write!(w, "{:<20} <truncated>", name)?,
    }
    Ok(offset + 1 + op.operand_width())
}
