use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;

use std::time::Instant;
use toy::config::Config;
use toy::runtime_io::StdIo;
use toy::vm::Toy;

fn main() -> io::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let filter = args.first().map(|s| s.as_str());
    let dir = Path::new("tests/programs");
    if !dir.exists() {
        eprintln!("tests/programs not found.");
        return Ok(());
    }
    let mut entries = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "toy").unwrap_or(false))
        .collect::<Vec<_>>();
    entries.sort();

    let config = Config::default();
    for path in entries {
        if let Some(f) = filter && !path.to_string_lossy().contains(f) { continue; }
        let path_str = path.to_string_lossy().to_string();
        println!("==== [{}] ====", path_str);
        let src = fs::read_to_string(&path_str)?;

        let t0 = Instant::now();
        let chunk = match toy::compile_source(&src, &config) {
            Ok(chunk) => chunk,
            Err(e) => {
                for diag in &e.diagnostics {
                    eprint!("{}", diag.format(&path_str, &src, "Compile Error", 1));
                }
                println!();
                continue;
            }
        };
        let compile_ms = t0.elapsed().as_millis();

        let t1 = Instant::now();
        let mut machine = Toy::new(config.clone());
        if let Err(e) = machine.run_with_io(Rc::new(chunk), &mut StdIo) {
            println!("{}", toy::ToyError::from(e));
        }
        let exec_ms = t1.elapsed().as_millis();
        println!("[vm] compile={} ms, exec={} ms, total={} ms", compile_ms, exec_ms, compile_ms + exec_ms);
        println!();
    }

    Ok(())
}
