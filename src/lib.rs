pub mod config;
pub mod lexer;
pub mod repl;
pub mod runtime_io;
pub mod vm;

use ariadne::{Color, Label, Report, ReportKind, Source};
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use config::Config;
use runtime_io::RuntimeIo;
use vm::{Chunk, ChunkFile, CompileError, Toy, VmError};

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    pub span: std::ops::Range<usize>,
    pub line: usize,
}

impl Diagnostic {
    pub fn format(&self, path: &str, src: &str, kind: &str, code: usize) -> String {
        let mut buffer = Vec::new();
        Report::build(ReportKind::Error, (path, self.span.clone()))
            .with_config(ariadne::Config::new().with_index_type(ariadne::IndexType::Byte))
            .with_code(code)
            .with_message(kind)
            .with_label(
                Label::new((path, self.span.clone()))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            )
            .finish()
            .write((path, Source::from(src)), &mut buffer)
            .ok();
        String::from_utf8_lossy(&buffer).to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] {}", self.line, self.message)
    }
}

/// Failure reading or writing a bytecode file.
#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode chunk: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode chunk: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Everything the host can see go wrong.
#[derive(Debug, Error)]
pub enum ToyError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("[Line {line}] Runtime Error: {0}", line = line_label(.0.line))]
    Runtime(#[from] VmError),
    #[error(transparent)]
    Bytecode(#[from] BytecodeError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

fn line_label(line: Option<usize>) -> String {
    line.map_or_else(|| "?".to_string(), |l| l.to_string())
}

impl ToyError {
    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            ToyError::Compile(_) => 1,
            ToyError::Runtime(_) => 2,
            ToyError::Bytecode(_) | ToyError::Io(_) => 3,
        }
    }
}

pub fn compile_source(src: &str, config: &Config) -> Result<Chunk, CompileError> {
    vm::compile(src, config)
}

/// Compiles `src` and runs it on `machine`, keeping whatever it declares.
pub fn run_source<IO: RuntimeIo>(src: &str, machine: &mut Toy, io: &mut IO) -> Result<(), ToyError> {
    let chunk = compile_source(src, machine.config())?;
    machine.run_with_io(Rc::new(chunk), io)?;
    Ok(())
}

pub fn save_chunk(chunk: &Chunk, path: impl AsRef<Path>) -> Result<(), BytecodeError> {
    let cfg = bincode::config::standard();
    let bytes = bincode::serde::encode_to_vec(ChunkFile::new(chunk.clone()), cfg)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn load_chunk(path: impl AsRef<Path>) -> Result<Chunk, BytecodeError> {
    let bytes = std::fs::read(path)?;
    let cfg = bincode::config::standard();
    let (file, _consumed): (ChunkFile, usize) = bincode::serde::decode_from_slice(&bytes, cfg)?;
    if !file.version_matches() {
        warn!(
            "bytecode version {}.{}.{} (build {}) differs from {}.{}.{}",
            file.major,
            file.minor,
            file.patch,
            file.build,
            ChunkFile::MAJOR,
            ChunkFile::MINOR,
            ChunkFile::PATCH
        );
    }
    Ok(file.chunk)
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "toy=debug" } else { "toy=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
