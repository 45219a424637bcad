use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;

use super::bytecode::{Chunk, Literal};
use super::scope::ScopeId;

/// A compiled function.
///
/// The compiler produces a template with no scope; `OP_FUNCTION_DECLARE`
/// clones it into a closure holding a reference to the active scope.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Function {
    /// Parameter names, as `Literal::String`.
    pub parameters: Vec<Literal>,
    pub chunk: Rc<Chunk>,
    /// Captured scope. Never serialized: captures only exist at runtime.
    #[serde(skip)]
    pub scope: Cell<Option<ScopeId>>,
}

impl Function {
    pub fn new(parameters: Vec<Literal>, chunk: Chunk) -> Self {
        Self {
            parameters,
            chunk: Rc::new(chunk),
            scope: Cell::new(None),
        }
    }

    /// Fresh closure sharing this function's code, capturing `scope`.
    pub fn capture(&self, scope: ScopeId) -> Self {
        Self {
            parameters: self.parameters.clone(),
            chunk: Rc::clone(&self.chunk),
            scope: Cell::new(Some(scope)),
        }
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn captured(&self) -> Option<ScopeId> {
        self.scope.get()
    }

    /// Clears the capture, returning what was held.
    pub fn detach(&self) -> Option<ScopeId> {
        self.scope.take()
    }
}

/// Named event handle. Reserved in the value model; no opcode creates one yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
}
