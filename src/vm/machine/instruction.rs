use super::{Frame, Grouping, Toy, VmErrorKind, VmResult, err};
use crate::runtime_io::RuntimeIo;
use crate::vm::bytecode::{Literal, OpCode};
use crate::vm::error::InternalError;
use crate::vm::utils::{display_literal, is_truthy, literals_equal, type_name};
use std::mem::discriminant;
use std::rc::Rc;

/// 명령어 실행 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionFlow {
    /// 다음 명령어 계속 실행
    Continue,
    /// 현재 프레임 종료 (OP_RETURN / OP_EOF)
    FrameEnd,
}

impl Toy {
    /// 단일 명령어 실행 (디스패처)
    pub(super) fn execute_instruction<IO: RuntimeIo>(
        &mut self,
        op: OpCode,
        io: &mut IO,
    ) -> VmResult<ExecutionFlow> {
        match op {
            // ===== 제어 =====
            OpCode::Eof | OpCode::Return => Ok(ExecutionFlow::FrameEnd),
            OpCode::ScopeBegin => self.handle_scope_begin(),
            OpCode::ScopeEnd => self.handle_scope_end(),
            OpCode::GroupingBegin => self.handle_grouping_begin(),
            OpCode::GroupingEnd => self.handle_grouping_end(),

            // ===== 비교 연산 =====
            OpCode::Equality => self.handle_equality(),
            OpCode::Greater | OpCode::Less => self.handle_comparison(op),

            // ===== 산술 연산 =====
            OpCode::Add => self.handle_add(),
            OpCode::Subtract | OpCode::Multiply | OpCode::Divide => self.handle_arithmetic(op),
            OpCode::Modulo => self.handle_modulo(),
            OpCode::Negate => self.handle_negate(),
            OpCode::Not => self.handle_not(),

            // ===== 리터럴 =====
            OpCode::Literal | OpCode::LiteralLong => self.handle_literal(op),

            // ===== 바인딩 =====
            OpCode::ConstantDeclare => self.handle_declare(true),
            OpCode::VariableDeclare => self.handle_declare(false),
            OpCode::VariableGet => self.handle_variable_get(),
            OpCode::VariableSet => self.handle_variable_set(),
            OpCode::FunctionDeclare => self.handle_function_declare(),

            // ===== 문장 =====
            OpCode::Print => self.handle_print(io),
            OpCode::Assert => self.handle_assert(),
            OpCode::Pop => self.handle_pop(),

            OpCode::LongSentinel => Err(err(
                VmErrorKind::MalformedBytecode,
                "Long sentinel is not an instruction".into(),
            )),
        }
    }

    // ==================== 리터럴 핸들러 ====================

    fn handle_literal(&mut self, op: OpCode) -> VmResult<ExecutionFlow> {
        let frame = self.frame_mut()?;
        let index = if op.is_long() {
            frame.chunk.read_u32(frame.pc).map(|i| i as usize)
        } else {
            frame.chunk.read_u8(frame.pc).map(usize::from)
        };
        let index = index.ok_or_else(|| {
            err(
                VmErrorKind::MalformedBytecode,
                "Truncated literal operand".into(),
            )
        })?;
        frame.pc += op.operand_width();

        let literal = frame.chunk.literals.get(index).cloned().ok_or_else(|| {
            err(
                VmErrorKind::MalformedBytecode,
                format!("Literal index {} out of range", index),
            )
        })?;
        self.push_literal(literal)?;
        Ok(ExecutionFlow::Continue)
    }

    fn handle_pop(&mut self) -> VmResult<ExecutionFlow> {
        self.pop_literal()?;
        Ok(ExecutionFlow::Continue)
    }

    // ==================== 스코프 핸들러 ====================

    fn handle_scope_begin(&mut self) -> VmResult<ExecutionFlow> {
        self.scope = self.scopes.push(Some(self.scope))?;
        Ok(ExecutionFlow::Continue)
    }

    fn handle_scope_end(&mut self) -> VmResult<ExecutionFlow> {
        let base = self.frame_mut()?.scope;
        if self.scope == base {
            return Err(err(
                VmErrorKind::MalformedBytecode,
                "Scope end without a matching scope begin".into(),
            ));
        }
        self.scope = self
            .scopes
            .pop(self.scope)?
            .ok_or(InternalError::DetachedRoot)?;
        Ok(ExecutionFlow::Continue)
    }

    // ==================== 변수 핸들러 ====================

    /// Pops a binding name, which the compiler always emits as a string literal.
    fn pop_name(&mut self) -> VmResult<String> {
        match self.pop_literal()? {
            Literal::String(name) => Ok(name),
            other => Err(err(
                VmErrorKind::TypeError("string"),
                format!("Expected a name, found {}", type_name(&other)),
            )),
        }
    }

    fn handle_declare(&mut self, constant: bool) -> VmResult<ExecutionFlow> {
        let value = self.pop_literal()?;
        let name = self.pop_name()?;
        let key = Literal::String(name.clone());

        let declared = if constant {
            self.scopes.set_constant(self.scope, key, value, true)?
        } else {
            self.scopes.set_variable(self.scope, key, value, true)?
        };
        if !declared {
            return Err(err(
                VmErrorKind::Redefinition,
                format!("Can't redefine '{}'", name),
            ));
        }
        Ok(ExecutionFlow::Continue)
    }

    fn handle_variable_get(&mut self) -> VmResult<ExecutionFlow> {
        let name = self.pop_name()?;
        let value = self
            .scopes
            .get(self.scope, &Literal::String(name.clone()))?
            .ok_or_else(|| {
                err(
                    VmErrorKind::UndefinedVariable,
                    format!("Undefined variable '{}'", name),
                )
            })?;
        self.push_literal(value)?;
        Ok(ExecutionFlow::Continue)
    }

    fn handle_variable_set(&mut self) -> VmResult<ExecutionFlow> {
        let value = self.pop_literal()?;
        let name = self.pop_name()?;
        let key = Literal::String(name.clone());

        let previous = self.scopes.get(self.scope, &key)?;
        if !self
            .scopes
            .set_variable(self.scope, key, value.clone(), false)?
        {
            return Err(match previous {
                None => err(
                    VmErrorKind::UndefinedVariable,
                    format!("Undefined variable '{}'", name),
                ),
                Some(_) => err(
                    VmErrorKind::AssignToConstant,
                    format!("Can't assign to constant '{}'", name),
                ),
            });
        }
        // 덮어쓴 값이 마지막 소유자였다면 캡처한 스코프를 놓아줌
        if let Some(previous) = previous {
            self.scopes.release(previous)?;
        }

        // 대입식의 값
        self.push_literal(value)?;
        Ok(ExecutionFlow::Continue)
    }

    fn handle_function_declare(&mut self) -> VmResult<ExecutionFlow> {
        let template = match self.pop_literal()? {
            Literal::Function(function) => function,
            other => {
                return Err(err(
                    VmErrorKind::TypeError("function"),
                    format!("Can't declare a function from {}", type_name(&other)),
                ));
            }
        };
        self.scopes.reference(self.scope)?;
        let closure = template.capture(self.scope);
        self.push_literal(Literal::Function(Rc::new(closure)))?;
        Ok(ExecutionFlow::Continue)
    }

    // ==================== 호출 핸들러 ====================

    fn handle_grouping_begin(&mut self) -> VmResult<ExecutionFlow> {
        let callee = self
            .peek(0)
            .ok()
            .and_then(|value| value.as_function())
            .cloned();
        let stack_base = self.stack.len();
        self.frame_mut()?
            .groupings
            .push(Grouping { stack_base, callee });
        Ok(ExecutionFlow::Continue)
    }

    fn handle_grouping_end(&mut self) -> VmResult<ExecutionFlow> {
        let grouping = self.frame_mut()?.groupings.pop().ok_or_else(|| {
            err(
                VmErrorKind::MalformedBytecode,
                "Grouping end without a matching grouping begin".into(),
            )
        })?;
        // 그룹 바로 아래 슬롯이 호출 대상
        let Some(function) = grouping.callee else {
            let found = grouping
                .stack_base
                .checked_sub(1)
                .and_then(|slot| self.stack.get(slot))
                .and_then(|&index| self.garbage.get(index))
                .map_or("nothing", type_name);
            return Err(err(
                VmErrorKind::TypeError("function"),
                format!("Can't call a value of type '{}'", found),
            ));
        };

        let got = self
            .stack
            .len()
            .checked_sub(grouping.stack_base)
            .ok_or_else(|| err(VmErrorKind::StackUnderflow, "Stack underflow".into()))?;
        let expected = function.arity();
        if got != expected {
            return Err(err(
                VmErrorKind::ArityError { expected, got },
                format!("Expected {} arguments but got {}", expected, got),
            ));
        }

        // 인자는 역순으로 팝
        let mut arguments = Vec::with_capacity(got);
        for _ in 0..got {
            arguments.push(self.pop_literal()?);
        }
        arguments.reverse();
        self.pop_literal()?;

        let captured = function.captured().ok_or_else(|| {
            err(
                VmErrorKind::DetachedFunction,
                "Function called after its scope ended".into(),
            )
        })?;
        if self.frames.len() >= self.config.max_frames {
            return Err(err(
                VmErrorKind::StackOverflow,
                "Too many nested calls".into(),
            ));
        }

        let scope = self.scopes.push(Some(captured))?;
        for (parameter, argument) in function.parameters.iter().zip(arguments) {
            if !self
                .scopes
                .set_variable(scope, parameter.clone(), argument, true)?
            {
                return Err(err(
                    VmErrorKind::Redefinition,
                    format!("Can't redefine '{}'", display_literal(parameter)),
                ));
            }
        }

        self.frames.push(Frame {
            chunk: Rc::clone(&function.chunk),
            pc: 0,
            stack_base: self.stack.len(),
            scope,
            caller: Some(self.scope),
            groupings: Vec::new(),
        });
        self.scope = scope;
        Ok(ExecutionFlow::Continue)
    }

    // ==================== 산술 연산 핸들러 ====================

    fn pop_operands(&mut self) -> VmResult<(Literal, Literal)> {
        let b = self.pop_literal()?;
        let a = self.pop_literal()?;
        Ok((a, b))
    }

    fn handle_add(&mut self) -> VmResult<ExecutionFlow> {
        let result = match self.pop_operands()? {
            (Literal::Number(a), Literal::Number(b)) => Literal::Number(a + b),
            (Literal::String(a), Literal::String(b)) => Literal::String(a + &b),
            _ => {
                return Err(err(
                    VmErrorKind::TypeError("number or string"),
                    "Mismatched types in addition".into(),
                ));
            }
        };
        self.push_literal(result)?;
        Ok(ExecutionFlow::Continue)
    }

    fn handle_arithmetic(&mut self, op: OpCode) -> VmResult<ExecutionFlow> {
        let (Literal::Number(a), Literal::Number(b)) = self.pop_operands()? else {
            let operation = match op {
                OpCode::Subtract => "subtraction",
                OpCode::Multiply => "multiplication",
                _ => "division",
            };
            return Err(err(
                VmErrorKind::TypeError("number"),
                format!("Mismatched types in {}", operation),
            ));
        };
        let result = match op {
            OpCode::Subtract => a - b,
            OpCode::Multiply => a * b,
            // IEEE 754: 0으로 나누면 inf / NaN
            _ => a / b,
        };
        self.push_literal(Literal::Number(result))?;
        Ok(ExecutionFlow::Continue)
    }

    fn handle_modulo(&mut self) -> VmResult<ExecutionFlow> {
        let (Literal::Number(a), Literal::Number(b)) = self.pop_operands()? else {
            return Err(err(
                VmErrorKind::TypeError("number"),
                "Mismatched types in modulo".into(),
            ));
        };
        if a.fract() != 0.0 || b.fract() != 0.0 {
            return Err(err(
                VmErrorKind::NotWholeNumber,
                "Operands to modulo must be whole numbers".into(),
            ));
        }
        if b == 0.0 {
            return Err(err(VmErrorKind::ModuloByZero, "Modulo by zero".into()));
        }
        self.push_literal(Literal::Number(a % b))?;
        Ok(ExecutionFlow::Continue)
    }

    fn handle_negate(&mut self) -> VmResult<ExecutionFlow> {
        match self.pop_literal()? {
            Literal::Number(n) => self.push_literal(Literal::Number(-n))?,
            other => {
                return Err(err(
                    VmErrorKind::TypeError("number"),
                    format!("Can't negate a value of type '{}'", type_name(&other)),
                ));
            }
        }
        Ok(ExecutionFlow::Continue)
    }

    // ==================== 비교/논리 연산 핸들러 ====================

    fn handle_not(&mut self) -> VmResult<ExecutionFlow> {
        let value = self.pop_literal()?;
        self.push_literal(Literal::Bool(!is_truthy(&value)))?;
        Ok(ExecutionFlow::Continue)
    }

    fn handle_equality(&mut self) -> VmResult<ExecutionFlow> {
        let (a, b) = self.pop_operands()?;
        if discriminant(&a) != discriminant(&b) {
            return Err(err(
                VmErrorKind::TypeError("matching types"),
                format!(
                    "Can't compare values of type '{}' and '{}'",
                    type_name(&a),
                    type_name(&b)
                ),
            ));
        }
        self.push_literal(Literal::Bool(literals_equal(&a, &b)))?;
        Ok(ExecutionFlow::Continue)
    }

    fn handle_comparison(&mut self, op: OpCode) -> VmResult<ExecutionFlow> {
        let (Literal::Number(a), Literal::Number(b)) = self.pop_operands()? else {
            return Err(err(
                VmErrorKind::TypeError("number"),
                "Operands to comparison must be numbers".into(),
            ));
        };
        let result = if op == OpCode::Greater { a > b } else { a < b };
        self.push_literal(Literal::Bool(result))?;
        Ok(ExecutionFlow::Continue)
    }

    // ==================== 문장 핸들러 ====================

    fn handle_print<IO: RuntimeIo>(&mut self, io: &mut IO) -> VmResult<ExecutionFlow> {
        let value = self.pop_literal()?;
        io.write_line(&display_literal(&value));
        Ok(ExecutionFlow::Continue)
    }

    fn handle_assert(&mut self) -> VmResult<ExecutionFlow> {
        let message = self.pop_literal()?;
        let value = self.pop_literal()?;
        let Literal::String(message) = message else {
            return Err(err(
                VmErrorKind::TypeError("string"),
                "Assertion message must be a string".into(),
            ));
        };
        if !is_truthy(&value) {
            return Err(err(
                VmErrorKind::AssertionFailed,
                format!("Assertion failure: {}", message),
            ));
        }
        Ok(ExecutionFlow::Continue)
    }
}
