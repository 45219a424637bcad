pub mod bytecode;
pub mod compiler;
pub mod dictionary; // 문자열 키 해시 테이블
pub mod disasm; // 디스어셈블러
pub mod error;
pub mod machine; // machine/ 디렉토리
pub mod scope;
pub mod utils;
pub mod value;

pub use bytecode::{Chunk, ChunkFile, Literal, OpCode};
pub use compiler::{CompileError, Compiler, compile};
pub use dictionary::Dictionary;
pub use error::{InternalError, InternalResult};
pub use machine::{Toy, VmError, VmErrorKind, VmResult, err};
pub use scope::{Binding, ScopeId, Scopes};
pub use value::{Event, Function};
