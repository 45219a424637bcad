use std::rc::Rc;
use std::time::Instant;
use toy::config::Config;
use toy::runtime_io::BufferIo;
use toy::vm::Toy;

const STATEMENTS: usize = 20_000;

fn main() {
    // 반복문이 없으므로 같은 호출을 많이 나열한 프로그램을 생성
    let mut source = String::from(
        "var x = 0;\nvar step = (a, b) => { const c = a + b; return c % 1000; };\n",
    );
    for i in 0..STATEMENTS {
        source.push_str(&format!("x = step(x, {});\n", i % 97));
    }
    source.push_str("print x;\n");

    println!("=== Toy VM Benchmark ===\n");
    println!("Test: {} closure calls, one statement each\n", STATEMENTS);

    let config = Config::default();
    let start = Instant::now();
    let chunk = match toy::compile_source(&source, &config) {
        Ok(chunk) => chunk,
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            return;
        }
    };
    let compile_time = start.elapsed();
    println!(
        "Compiled {} bytes of code, {} literals",
        chunk.code.len(),
        chunk.literals.len()
    );

    let start = Instant::now();
    let mut vm = Toy::new(config);
    let mut io = BufferIo::new();
    match vm.run_with_io(Rc::new(chunk), &mut io) {
        Ok(()) => {
            let elapsed = start.elapsed();
            println!("\n=== Results ===");
            println!("Output: {}", io.get_output().trim_end());
            println!("Compile time: {:.2}ms", compile_time.as_secs_f64() * 1000.0);
            println!("Execution time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
            println!(
                "Average time per call: {:.4}ms",
                elapsed.as_secs_f64() * 1000.0 / STATEMENTS as f64
            );
        }
        Err(e) => {
            eprintln!("Runtime error: {}", e);
        }
    }
}
