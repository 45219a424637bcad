// machine 모듈 - VM 실행 엔진
//
// 바이트코드 청크를 실행하는 스택 머신입니다. 값 스택에는 garbage 풀의 인덱스가 쌓이고,
// 이름은 모두 실행 시점에 Scope 체인을 통해 해석됩니다.

use crate::config::Config;
use crate::runtime_io::{RuntimeIo, StdIo};
use crate::vm::bytecode::{Chunk, Literal, OpCode};
use crate::vm::error::InternalError;
use crate::vm::scope::{Binding, ScopeId, Scopes};
use crate::vm::value::Function;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

// 서브모듈
mod instruction;

#[cfg(test)]
mod tests;

use instruction::ExecutionFlow;

// ========== 타입 정의 ==========

#[derive(Debug, Clone, PartialEq)]
pub enum VmErrorKind {
    TypeError(&'static str),
    Redefinition,
    AssignToConstant,
    UndefinedVariable,
    StackUnderflow,
    StackOverflow,
    ArityError { expected: usize, got: usize },
    NotWholeNumber,
    ModuloByZero,
    AssertionFailed,
    DetachedFunction,
    MalformedBytecode,
    Internal(InternalError),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct VmError {
    pub kind: VmErrorKind,
    pub message: String,
    /// Source line of the opcode that failed.
    pub line: Option<usize>,
}

impl VmError {
    fn at(mut self, line: Option<usize>) -> Self {
        if self.line.is_none() {
            self.line = line;
        }
        self
    }
}

impl From<InternalError> for VmError {
    fn from(e: InternalError) -> Self {
        let message = e.to_string();
        err(VmErrorKind::Internal(e), message)
    }
}

pub type VmResult<T> = Result<T, VmError>;

/// Open `GROUPING_BEGIN` marker.
#[derive(Debug)]
struct Grouping {
    stack_base: usize,
    /// Function that was on top of the stack when the grouping began.
    callee: Option<Rc<Function>>,
}

#[derive(Debug)]
struct Frame {
    chunk: Rc<Chunk>,
    pc: usize,
    stack_base: usize,
    /// Scope active when the frame started; for calls, the parameter scope.
    scope: ScopeId,
    /// Scope to restore when a call frame ends. `None` for the top-level frame.
    caller: Option<ScopeId>,
    groupings: Vec<Grouping>,
}

pub struct Toy {
    pub error: bool,
    pub panic: bool,
    garbage: Vec<Literal>,
    stack: Vec<usize>,
    frames: Vec<Frame>,
    scopes: Scopes,
    scope: ScopeId,
    global: ScopeId,
    config: Config,
    /// Offset of the opcode being executed in the current frame's chunk.
    op_offset: usize,
}

// ========== 유틸리티 함수 ==========

/// VmError 생성 헬퍼 함수
pub fn err(kind: VmErrorKind, message: String) -> VmError {
    VmError {
        kind,
        message,
        line: None,
    }
}

// ========== VM 구현 ==========

impl Toy {
    pub fn new(config: Config) -> Self {
        let mut scopes = Scopes::new();
        let global = scopes.push_root();
        Self {
            error: false,
            panic: false,
            garbage: Vec::with_capacity(128),
            stack: Vec::with_capacity(128),
            frames: Vec::with_capacity(32),
            scopes,
            scope: global,
            global,
            config,
            op_offset: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&mut self, chunk: Rc<Chunk>) -> VmResult<()> {
        let mut stdio = StdIo;
        self.run_with_io(chunk, &mut stdio)
    }

    /// Executes `chunk` in the current scope.
    ///
    /// On a runtime error both flags are set, every frame and scope entered by
    /// this call is unwound, and the error carries the failing opcode's line.
    pub fn run_with_io<IO: RuntimeIo>(&mut self, chunk: Rc<Chunk>, io: &mut IO) -> VmResult<()> {
        self.error = false;
        self.panic = false;

        let entry_scope = self.scope;
        let entry_stack = self.stack.len();
        let result = self.enter(chunk).and_then(|_| self.execute(io));

        result.map_err(|e| {
            self.error = true;
            self.panic = true;
            self.unwind(entry_scope, entry_stack);
            debug!(line = ?e.line, kind = ?e.kind, "runtime error: {}", e.message);
            e
        })
    }

    fn enter(&mut self, chunk: Rc<Chunk>) -> VmResult<()> {
        if self.stack.is_empty() {
            self.clear_garbage()?;
        }
        self.frames.push(Frame {
            chunk,
            pc: 0,
            stack_base: self.stack.len(),
            scope: self.scope,
            caller: None,
            groupings: Vec::new(),
        });
        Ok(())
    }

    fn execute<IO: RuntimeIo>(&mut self, io: &mut IO) -> VmResult<()> {
        while !self.panic {
            let Some(frame) = self.frames.last_mut() else {
                break;
            };
            let offset = frame.pc;
            let byte = frame.chunk.code.get(offset).copied();
            if byte.is_some() {
                frame.pc += 1;
            }

            let flow = match byte {
                // 코드 끝에 도달하면 EOF와 같음
                None => ExecutionFlow::FrameEnd,
                Some(byte) => {
                    self.op_offset = offset;
                    let op = OpCode::from_repr(byte).ok_or_else(|| {
                        err(
                            VmErrorKind::MalformedBytecode,
                            format!("Unknown opcode {}", byte),
                        )
                        .at(self.current_line())
                    })?;
                    if self.config.verbose {
                        trace!(offset, op = %op, depth = self.frames.len(), "exec");
                    }
                    self.execute_instruction(op, io)
                        .map_err(|e| e.at(self.current_line()))?
                }
            };

            if flow == ExecutionFlow::FrameEnd {
                let line = self.current_line();
                if self.finish_frame().map_err(|e| e.at(line))? {
                    break;
                }
            }
        }
        Ok(())
    }

    fn current_line(&self) -> Option<usize> {
        self.frames
            .last()
            .and_then(|frame| frame.chunk.line_at(self.op_offset))
    }

    // ========== 스택 연산 ==========

    fn push_literal(&mut self, value: Literal) -> VmResult<()> {
        if self.stack.len() >= self.config.max_stack {
            return Err(err(VmErrorKind::StackOverflow, "Stack overflow".into()));
        }
        self.garbage.push(value);
        self.stack.push(self.garbage.len() - 1);
        Ok(())
    }

    fn pop_literal(&mut self) -> VmResult<Literal> {
        let index = self
            .stack
            .pop()
            .ok_or_else(|| err(VmErrorKind::StackUnderflow, "Stack underflow".into()))?;
        self.garbage.get(index).cloned().ok_or_else(|| {
            err(
                VmErrorKind::MalformedBytecode,
                format!("Dangling stack slot {}", index),
            )
        })
    }

    fn peek(&self, distance: usize) -> VmResult<&Literal> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .and_then(|slot| self.garbage.get(self.stack[slot]))
            .ok_or_else(|| err(VmErrorKind::StackUnderflow, "Stack underflow".into()))
    }

    /// Releases every pooled value. Only valid while nothing on the stack points into the pool.
    fn clear_garbage(&mut self) -> VmResult<()> {
        for value in std::mem::take(&mut self.garbage) {
            self.scopes.release(value)?;
        }
        Ok(())
    }

    // ========== 프레임 관리 ==========

    fn frame_mut(&mut self) -> VmResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| err(VmErrorKind::StackUnderflow, "no frame".into()))
    }

    /// Ends the current frame. Returns `true` when it was the top-level frame.
    fn finish_frame(&mut self) -> VmResult<bool> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| err(VmErrorKind::StackUnderflow, "no frame".into()))?;

        // 반환값이 있으면 팝, 없으면 null (암묵적 return)
        let result = if self.stack.len() > frame.stack_base {
            self.pop_literal()?
        } else {
            Literal::Nil
        };
        self.stack.truncate(frame.stack_base);
        self.close_scopes(&frame)?;

        if frame.caller.is_none() {
            return Ok(true);
        }
        self.push_literal(result)?;
        Ok(false)
    }

    /// Pops every scope the frame pushed, then restores the caller's scope.
    fn close_scopes(&mut self, frame: &Frame) -> VmResult<()> {
        while self.scope != frame.scope {
            self.scope = self
                .scopes
                .pop(self.scope)?
                .ok_or(InternalError::DetachedRoot)?;
        }
        if let Some(caller) = frame.caller {
            self.scopes.pop(frame.scope)?;
            self.scope = caller;
        }
        Ok(())
    }

    fn unwind(&mut self, entry_scope: ScopeId, entry_stack: usize) {
        while let Some(frame) = self.frames.pop() {
            if let Err(e) = self.close_scopes(&frame) {
                debug!("unwind stopped early: {}", e);
                break;
            }
        }
        self.frames.clear();
        self.scope = entry_scope;
        self.stack.truncate(entry_stack);
    }

    // ========== 조회 ==========

    /// Resolves `name` from the active scope, as `VARIABLE_GET` would.
    pub fn lookup(&self, name: &str) -> Option<Literal> {
        self.scopes
            .get(self.scope, &Literal::from(name))
            .ok()
            .flatten()
    }

    /// Names bound in the active scope.
    pub fn bindings(&self) -> VmResult<Vec<Binding>> {
        Ok(self.scopes.bindings(self.scope)?)
    }

    pub fn global_scope(&self) -> ScopeId {
        self.global
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn garbage_len(&self) -> usize {
        self.garbage.len()
    }
}
