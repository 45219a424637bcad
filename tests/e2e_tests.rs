use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use toy::config::Config;
use toy::runtime_io::BufferIo;
use toy::vm::Toy;

/// E2E 통합 테스트: tests/programs/ 디렉터리의 모든 .toy 파일을
/// 컴파일하고 VM으로 실행하여 출력을 확인합니다.

/// Result of running one program to completion or to its first runtime error.
struct Outcome {
    output: String,
    error: Option<String>,
}

fn get_test_programs() -> Vec<PathBuf> {
    let test_dir = PathBuf::from("tests/programs");
    if !test_dir.exists() {
        return vec![];
    }

    let mut programs = vec![];
    if let Ok(entries) = fs::read_dir(&test_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("toy") {
                programs.push(path);
            }
        }
    }
    programs.sort();
    programs
}

/// Compile errors come back as `Err` with one diagnostic per line.
fn run_test_program(path: &PathBuf) -> Result<Outcome, String> {
    let source = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let config = Config::default();

    let chunk = toy::compile_source(&source, &config).map_err(|e| {
        e.diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    })?;

    let mut vm = Toy::new(config);
    let mut vm_io = BufferIo::new();
    let error = vm
        .run_with_io(Rc::new(chunk), &mut vm_io)
        .err()
        .map(|e| toy::ToyError::from(e).to_string());

    Ok(Outcome {
        output: vm_io.take_output(),
        error,
    })
}

#[test]
fn test_e2e_all_programs() {
    let programs = get_test_programs();

    if programs.is_empty() {
        println!("Warning: No test programs found in tests/programs/");
        return;
    }

    let mut compiled = 0;
    let mut rejected = 0;

    for path in programs {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        print!("Testing {}... ", name);

        match run_test_program(&path) {
            Ok(outcome) => {
                match outcome.error {
                    None => println!("✓ PASSED"),
                    Some(err) => println!("✓ RAN ({})", err),
                }
                compiled += 1;
            }
            Err(err) => {
                println!("✗ REJECTED: {}", err);
                rejected += 1;
            }
        }
    }

    println!("\n========================================");
    println!("E2E Test Summary:");
    println!("  Compiled: {}", compiled);
    println!("  Rejected: {}", rejected);
    println!("  Total:    {}", compiled + rejected);
    println!("========================================");

    // unsupported.toy is the only program meant to fail compilation
    assert_eq!(rejected, 1, "Unexpected compile failures");
}

macro_rules! test_program {
    ($test_name:ident, $filename:literal, output = $expected:literal) => {
        #[test]
        fn $test_name() {
            let _ = include_str!(concat!("programs/", $filename));

            let path = PathBuf::from(concat!("tests/programs/", $filename));
            let outcome = match run_test_program(&path) {
                Ok(outcome) => outcome,
                Err(err) => panic!("{} should compile: {}", $filename, err),
            };
            assert_eq!(outcome.error, None, "{} should run without errors", $filename);
            assert_eq!(outcome.output, $expected);
        }
    };

    ($test_name:ident, $filename:literal, output = $expected:literal, error = $error:literal) => {
        #[test]
        fn $test_name() {
            let _ = include_str!(concat!("programs/", $filename));

            let path = PathBuf::from(concat!("tests/programs/", $filename));
            let outcome = match run_test_program(&path) {
                Ok(outcome) => outcome,
                Err(err) => panic!("{} should compile: {}", $filename, err),
            };
            assert_eq!(outcome.output, $expected);
            assert_eq!(outcome.error.as_deref(), Some($error));
        }
    };

    ($test_name:ident, $filename:literal, compile_error = $error:literal) => {
        #[test]
        fn $test_name() {
            let _ = include_str!(concat!("programs/", $filename));

            let path = PathBuf::from(concat!("tests/programs/", $filename));
            match run_test_program(&path) {
                Ok(_) => panic!("{} should not compile", $filename),
                Err(err) => assert_eq!(err, $error),
            }
        }
    };
}

// Generate tests for each program
test_program!(test_hello, "hello.toy", output = "hello world\n");
test_program!(test_shadowing, "shadowing.toy", output = "2\n1\n");
test_program!(
    test_const_assign,
    "const_assign.toy",
    output = "",
    error = "[Line 2] Runtime Error: Can't assign to constant 'x'"
);
test_program!(test_function_call, "function_call.toy", output = "5\n");
test_program!(test_closures, "closures.toy", output = "5\n13\n3\nhello, toy\n");
test_program!(
    test_arithmetic,
    "arithmetic.toy",
    output = "7\n9\n2.5\n1\n-2\nfoobar\ntrue\nfalse\ntrue\nfalse\ntrue\nfalse\nnull\n"
);
test_program!(
    test_assert,
    "assert.toy",
    output = "after first\n",
    error = "[Line 3] Runtime Error: Assertion failure: one is not two"
);
test_program!(test_comments, "comments.toy", output = "1\n2\n");
test_program!(
    test_detached,
    "detached.toy",
    output = "1\n",
    error = "[Line 7] Runtime Error: Function called after its scope ended"
);
test_program!(
    test_recursion_limit,
    "recursion.toy",
    output = "start\n",
    error = "[Line 1] Runtime Error: Too many nested calls"
);
test_program!(
    test_unsupported_keyword,
    "unsupported.toy",
    compile_error = "[line 2] Error at 'if': 'if' is not supported"
);
