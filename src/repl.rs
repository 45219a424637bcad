//! Toy REPL (Read-Eval-Print Loop)
//!
//! 대화형 실행 환경을 제공합니다. 하나의 VM을 계속 사용하므로 전역 스코프에 선언한
//! 이름은 다음 입력에서도 보입니다.

use crate::config::Config;
use crate::runtime_io::RuntimeIo;
use crate::vm::Toy;
use crate::vm::disasm::disassemble_chunk_to_string;
use crate::vm::utils::display_literal;
use crate::{ToyError, compile_source};
use std::rc::Rc;

/// REPL 세션 상태
pub struct ReplState {
    /// VM 인스턴스 (재사용)
    pub vm: Toy,
    config: Config,
}

impl ReplState {
    /// 새 REPL 세션 생성
    pub fn new(config: Config) -> Self {
        Self {
            vm: Toy::new(config.clone()),
            config,
        }
    }

    /// 입력을 컴파일하고 실행
    ///
    /// 컴파일 오류는 실행 전에 보고되고, 런타임 오류 뒤에도 세션은 계속 사용할 수 있습니다.
    pub fn eval_line<IO: RuntimeIo>(&mut self, input: &str, io: &mut IO) -> Result<(), String> {
        // 입력이 비어있으면 무시
        if input.trim().is_empty() {
            return Ok(());
        }

        let chunk = compile_source(input, &self.config).map_err(|e| {
            e.diagnostics
                .iter()
                .map(|d| d.format("<repl>", input, "Compile Error", 1))
                .collect::<String>()
        })?;

        if self.config.verbose {
            io.write(&disassemble_chunk_to_string(&chunk, "<repl>"));
        }

        self.vm
            .run_with_io(Rc::new(chunk), io)
            .map_err(|e| ToyError::from(e).to_string())
    }

    /// 현재 스코프의 이름 목록 출력
    pub fn list_bindings<IO: RuntimeIo>(&self, io: &mut IO) -> Result<(), String> {
        let bindings = self.vm.bindings().map_err(|e| e.to_string())?;
        if bindings.is_empty() {
            io.write_line("No names defined.");
        }
        for binding in bindings {
            let kind = if binding.constant { "const" } else { "var" };
            io.write_line(&format!(
                "  {} {} = {}",
                kind,
                binding.name,
                display_literal(&binding.value)
            ));
        }
        Ok(())
    }

    /// 실행하지 않고 바이트코드만 출력
    pub fn disassemble<IO: RuntimeIo>(&self, source: &str, io: &mut IO) -> Result<(), String> {
        let chunk = compile_source(source, &self.config).map_err(|e| {
            e.diagnostics
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        })?;
        io.write(&disassemble_chunk_to_string(&chunk, "<repl>"));
        Ok(())
    }
}

impl Default for ReplState {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// 특수 명령어 처리
///
/// 반환값: true이면 REPL 종료
pub fn handle_command<IO: RuntimeIo>(
    cmd: &str,
    state: &mut ReplState,
    io: &mut IO,
) -> Result<bool, String> {
    let cmd = cmd.trim();
    let (name, rest) = cmd.split_once(char::is_whitespace).unwrap_or((cmd, ""));

    match name {
        "" => Ok(false),
        ":quit" | ":q" => {
            io.write_line("Goodbye!");
            Ok(true)
        }
        ":help" | ":h" => {
            io.write(HELP);
            Ok(false)
        }
        ":clear" | ":c" => {
            *state = ReplState::new(state.config.clone());
            io.write_line("Session cleared.");
            Ok(false)
        }
        ":scope" | ":s" => {
            state.list_bindings(io)?;
            Ok(false)
        }
        ":disasm" | ":d" => {
            if rest.trim().is_empty() {
                io.write_line("Usage: :disasm <source>");
            } else {
                state.disassemble(rest, io)?;
            }
            Ok(false)
        }
        _ => Err(format!("Unknown command: {}", name)),
    }
}

const HELP: &str = r#"Toy REPL Commands:
  :quit, :q              Exit the REPL
  :help, :h              Show this help
  :clear, :c             Start a fresh session
  :scope, :s             List names in the current scope
  :disasm <src>, :d      Show the bytecode for <src> without running it

Tips:
  - Input continues while a '{' or '(' is left open
  - Use arrow keys to navigate history
"#;

/// 입력이 계속되어야 하는지 확인 (닫히지 않은 괄호)
pub fn needs_more_lines(buffer: &str) -> bool {
    let mut depth = 0i32;
    let mut chars = buffer.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                // 문자열 내부 건너뛰기
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            chars.next();
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '{' | '(' => depth += 1,
            '}' | ')' => depth -= 1,
            _ => {}
        }
    }
    depth > 0
}
