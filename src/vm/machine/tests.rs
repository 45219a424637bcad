//! VM 테스트 모듈

use super::*;
use crate::runtime_io::BufferIo;
use crate::vm::compiler::compile;

fn run(source: &str) -> (Toy, VmResult<()>, String) {
    let mut vm = Toy::new(Config::default());
    let (result, output) = run_on(&mut vm, source);
    (vm, result, output)
}

/// 기존 VM에서 실행하고 (결과, 출력)을 반환
fn run_on(vm: &mut Toy, source: &str) -> (VmResult<()>, String) {
    let chunk = compile(source, vm.config()).expect("test source compiles");
    let mut io = BufferIo::new();
    let result = vm.run_with_io(Rc::new(chunk), &mut io);
    (result, io.take_output())
}

fn output(source: &str) -> String {
    let (_, result, output) = run(source);
    assert_eq!(result, Ok(()), "{} should run", source);
    output
}

fn error_kind(source: &str) -> VmErrorKind {
    let (_, result, _) = run(source);
    result.expect_err("should fail").kind
}

// ========== 스택 연산 테스트 ==========

#[test]
fn test_stack_push_pop() {
    let mut vm = Toy::new(Config::default());
    vm.push_literal(Literal::Number(42.0)).unwrap();
    assert_eq!(vm.peek(0).unwrap(), &Literal::Number(42.0));
    assert_eq!(vm.pop_literal().unwrap(), Literal::Number(42.0));
    assert_eq!(vm.garbage_len(), 1);
}

#[test]
fn test_stack_underflow() {
    let mut vm = Toy::new(Config::default());
    let result = vm.pop_literal();
    assert!(matches!(
        result.map_err(|e| e.kind),
        Err(VmErrorKind::StackUnderflow)
    ));
}

#[test]
fn test_stack_overflow() {
    let config = Config {
        max_stack: 2,
        ..Config::default()
    };
    let mut vm = Toy::new(config);
    assert!(vm.push_literal(Literal::Nil).is_ok());
    assert!(vm.push_literal(Literal::Nil).is_ok());
    let result = vm.push_literal(Literal::Nil);
    assert!(matches!(
        result.map_err(|e| e.kind),
        Err(VmErrorKind::StackOverflow)
    ));
}

// ========== 산술 연산 테스트 ==========

#[test]
fn test_arithmetic() {
    assert_eq!(output("print 10 + 32;"), "42\n");
    assert_eq!(output("print 10 - 32;"), "-22\n");
    assert_eq!(output("print 6 * 7;"), "42\n");
    assert_eq!(output("print 1 / 4;"), "0.25\n");
    assert_eq!(output("print -(2 + 3);"), "-5\n");
}

#[test]
fn test_long_literal_operands() {
    // 256번째 리터럴부터 OP_LITERAL_LONG (4바이트 피연산자)
    let source: String = (0..300).map(|i| format!("print {};\n", i)).collect();
    let expected: String = (0..300).map(|i| format!("{}\n", i)).collect();
    let (vm, result, output) = run(&source);
    assert_eq!(result, Ok(()));
    assert_eq!(output.lines().last(), Some("299"));
    assert_eq!(output, expected);
    assert_eq!(vm.stack_len(), 0);
}

#[test]
fn test_string_concatenation() {
    assert_eq!(output("print \"foo\" + \"bar\";"), "foobar\n");
}

#[test]
fn test_modulo() {
    assert_eq!(output("print 5 % 2;"), "1\n");
    assert_eq!(output("print -7 % 3;"), "-1\n");
    assert_eq!(error_kind("print 5.5 % 2;"), VmErrorKind::NotWholeNumber);
    assert_eq!(error_kind("print 5 % 0;"), VmErrorKind::ModuloByZero);
}

#[test]
fn test_division_by_zero_is_ieee() {
    assert_eq!(output("print 1 / 0;"), "inf\n");
    assert_eq!(output("print -1 / 0;"), "-inf\n");
}

#[test]
fn test_mismatched_types() {
    let (_, result, _) = run("print 1 + \"a\";");
    let e = result.unwrap_err();
    assert_eq!(e.kind, VmErrorKind::TypeError("number or string"));
    assert_eq!(e.message, "Mismatched types in addition");

    assert_eq!(error_kind("print \"a\" * 2;"), VmErrorKind::TypeError("number"));
    assert_eq!(error_kind("print -\"a\";"), VmErrorKind::TypeError("number"));
    assert_eq!(error_kind("print \"a\" < 2;"), VmErrorKind::TypeError("number"));
}

// ========== 비교/논리 연산 테스트 ==========

#[test]
fn test_equality() {
    assert_eq!(output("print 1 == 1.0;"), "true\n");
    assert_eq!(output("print \"a\" == \"a\";"), "true\n");
    assert_eq!(output("print null == null;"), "true\n");
    assert_eq!(output("print true != false;"), "true\n");
    assert_eq!(
        error_kind("print 1 == \"1\";"),
        VmErrorKind::TypeError("matching types")
    );
}

#[test]
fn test_comparisons() {
    assert_eq!(output("print 1 < 2; print 2 <= 2; print 3 > 4; print 4 >= 5;"), "true\ntrue\nfalse\nfalse\n");
}

#[test]
fn test_truthiness() {
    assert_eq!(output("print !null;"), "true\n");
    assert_eq!(output("print !0;"), "true\n");
    assert_eq!(output("print !\"\";"), "false\n");
    assert_eq!(output("print !1;"), "false\n");
    assert_eq!(output("print !false;"), "true\n");
}

// ========== 바인딩 테스트 ==========

#[test]
fn test_bindings() {
    assert_eq!(output("var x; print x;"), "null\n");
    assert_eq!(output("var x = 1; x = x + 1; print x;"), "2\n");
    assert_eq!(output("var x = 1; print x = 5; print x;"), "5\n5\n");
    assert_eq!(error_kind("var x = 1; var x = 2;"), VmErrorKind::Redefinition);
    assert_eq!(error_kind("const x = 1; x = 2;"), VmErrorKind::AssignToConstant);
    assert_eq!(error_kind("y = 2;"), VmErrorKind::UndefinedVariable);
    assert_eq!(error_kind("print y;"), VmErrorKind::UndefinedVariable);
}

#[test]
fn test_shadowing() {
    assert_eq!(
        output("var x = 1; { var x = 2; print x; } print x;"),
        "2\n1\n"
    );
    assert_eq!(
        output("const x = 1; { var x = 2; x = 3; print x; } print x;"),
        "3\n1\n"
    );
}

#[test]
fn test_block_assigns_outer() {
    assert_eq!(output("var x = 1; { x = 2; } print x;"), "2\n");
}

#[test]
fn test_block_names_do_not_leak() {
    let (vm, result, _) = run("{ var inner = 1; }");
    assert_eq!(result, Ok(()));
    assert_eq!(vm.lookup("inner"), None);
    assert_eq!(vm.scopes().len(), 1);
}

// ========== 함수 테스트 ==========

#[test]
fn test_function_call() {
    assert_eq!(output("var f = (a, b) => a + b; print f(2, 3);"), "5\n");
    assert_eq!(output("var f = () => { print \"side\"; }; print f();"), "side\nnull\n");
    assert_eq!(output("print ((n) => n * 2)(21);"), "42\n");
}

#[test]
fn test_nested_calls() {
    assert_eq!(
        output("var sq = (n) => n * n; var add = (a, b) => a + b; print add(sq(3), sq(4));"),
        "25\n"
    );
}

#[test]
fn test_closure_captures_call_scope() {
    let source = "
        var make = (x) => (y) => x + y;
        var add2 = make(2);
        print add2(40);
    ";
    assert_eq!(output(source), "42\n");
}

#[test]
fn test_arity_error() {
    assert_eq!(
        error_kind("var f = (a) => a; f(1, 2);"),
        VmErrorKind::ArityError {
            expected: 1,
            got: 2
        }
    );
}

#[test]
fn test_detached_function() {
    assert_eq!(
        error_kind("var g; { var f = () => 1; g = f; } g();"),
        VmErrorKind::DetachedFunction
    );
}

#[test]
fn test_block_alias_keeps_outer_function() {
    // 블록을 닫아도 바깥 스코프가 캡처한 함수는 분리되지 않음
    assert_eq!(output("var f = () => 1; { var g = f; } print f();"), "1\n");
}

#[test]
fn test_call_non_function() {
    let (vm, result, output) = run("var x = 1; print x(2);");
    let e = result.unwrap_err();
    assert_eq!(e.kind, VmErrorKind::TypeError("function"));
    assert_eq!(e.message, "Can't call a value of type 'number'");
    assert_eq!(output, "");
    assert_eq!(vm.stack_len(), 0);

    assert_eq!(
        error_kind("\"text\"();"),
        VmErrorKind::TypeError("function")
    );
}

#[test]
fn test_call_non_function_inside_body() {
    let source = "var g = () => {\n  var x = 1;\n  x(5);\n};\nprint g();";
    let (vm, result, output) = run(source);
    let e = result.unwrap_err();
    assert_eq!(e.kind, VmErrorKind::TypeError("function"));
    assert_eq!(e.line, Some(3));
    assert_eq!(output, "");
    assert_eq!(vm.scopes().len(), 1);
}

#[test]
fn test_recursion_limit() {
    let config = Config {
        max_frames: 16,
        ..Config::default()
    };
    let mut vm = Toy::new(config);
    let (result, _) = run_on(&mut vm, "var f = () => f(); f();");
    assert_eq!(result.unwrap_err().kind, VmErrorKind::StackOverflow);
    assert!(vm.error && vm.panic);
    assert_eq!(vm.scopes().len(), 1);
}

#[test]
fn test_call_scopes_are_released() {
    let (vm, result, _) = run("var f = (a) => { var b = a; return b; }; f(1); f(2);");
    assert_eq!(result, Ok(()));
    assert_eq!(vm.scopes().len(), 1);
    assert_eq!(vm.stack_len(), 0);
}

// ========== 문장 테스트 ==========

#[test]
fn test_assert() {
    assert_eq!(output("assert true, \"fine\";"), "");
    let (_, result, _) = run("assert 0, \"zero is falsy\";");
    let e = result.unwrap_err();
    assert_eq!(e.kind, VmErrorKind::AssertionFailed);
    assert_eq!(e.message, "Assertion failure: zero is falsy");
    assert_eq!(
        error_kind("assert true, 1;"),
        VmErrorKind::TypeError("string")
    );
}

// ========== 오류 처리 테스트 ==========

#[test]
fn test_error_line_is_failing_opcode() {
    let (_, result, output) = run("print 1;\nprint 2;\n\nprint 3 + true;\nprint 4;");
    assert_eq!(output, "1\n2\n");
    assert_eq!(result.unwrap_err().line, Some(4));
}

#[test]
fn test_error_line_inside_function() {
    let source = "var f = () => {\n  return missing;\n};\nf();";
    let (_, result, _) = run(source);
    assert_eq!(result.unwrap_err().line, Some(2));
}

#[test]
fn test_vm_usable_after_error() {
    let mut vm = Toy::new(Config::default());
    let (result, _) = run_on(&mut vm, "var x = 1; { var y = 2; print nope; }");
    assert!(result.is_err());
    assert!(vm.error && vm.panic);
    assert_eq!(vm.scopes().len(), 1);

    let (result, output) = run_on(&mut vm, "print x;");
    assert_eq!(result, Ok(()));
    assert!(!vm.error && !vm.panic);
    assert_eq!(output, "1\n");
}

#[test]
fn test_garbage_cleared_between_runs() {
    let mut vm = Toy::new(Config::default());
    let _ = run_on(&mut vm, "print 1 + 2;");
    assert!(vm.garbage_len() > 0);
    let _ = run_on(&mut vm, "");
    assert_eq!(vm.garbage_len(), 0);
}

#[test]
fn test_malformed_bytecode() {
    let mut chunk = Chunk::new();
    chunk.write_op(OpCode::GroupingEnd, 1);
    let mut vm = Toy::new(Config::default());
    let result = vm.run_with_io(Rc::new(chunk), &mut BufferIo::new());
    assert_eq!(result.unwrap_err().kind, VmErrorKind::MalformedBytecode);

    let mut chunk = Chunk::new();
    chunk.write(200, 1);
    let result = vm.run_with_io(Rc::new(chunk), &mut BufferIo::new());
    assert_eq!(result.unwrap_err().kind, VmErrorKind::MalformedBytecode);
}

#[test]
fn test_internal_error_is_distinct() {
    let e = VmError::from(InternalError::DetachedRoot);
    assert_eq!(e.kind, VmErrorKind::Internal(InternalError::DetachedRoot));
    assert_eq!(e.message, "cannot pop the root scope");
}
