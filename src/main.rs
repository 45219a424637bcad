use clap::Parser as ClapParser;
use std::process::ExitCode;
use std::rc::Rc;
use toy::config::Config;
use toy::repl::{ReplState, handle_command, needs_more_lines};
use toy::runtime_io::StdIo;
use toy::vm::Toy;
use toy::vm::disasm::disassemble_chunk_to_string;
use toy::{ToyError, compile_source, init_tracing, load_chunk, save_chunk};

fn main() -> ExitCode {
    let opt = Opt::parse();
    init_tracing(opt.debug);

    if opt.version {
        println!("toy {}", env!("CARGO_PKG_VERSION"));
        println!("Released under the {} licence.", env!("CARGO_PKG_LICENSE"));
        return ExitCode::SUCCESS;
    }

    let config = Config::default().verbose(opt.debug);
    let result = if let Some(path) = &opt.bytecode {
        run_bytecode(path, &config)
    } else if let Some(src) = &opt.input {
        run_program(src, "<input>", &opt, &config)
    } else if let Some(path) = &opt.file {
        std::fs::read_to_string(path)
            .map_err(ToyError::from)
            .and_then(|src| run_program(&src, path, &opt, &config))
    } else {
        return repl(config);
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // 컴파일 오류는 run_program에서 소스와 함께 이미 출력됨
            if !matches!(e, ToyError::Compile(_)) {
                eprintln!("{}", e);
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run_program(src: &str, path: &str, opt: &Opt, config: &Config) -> Result<(), ToyError> {
    let chunk = compile_source(src, config).map_err(|e| {
        for diag in &e.diagnostics {
            eprint!("{}", diag.format(path, src, "Compile Error", 1));
        }
        e
    })?;

    if opt.debug {
        eprint!("{}", disassemble_chunk_to_string(&chunk, path));
    }

    if let Some(out) = &opt.output {
        save_chunk(&chunk, out)?;
        println!("wrote {}", out);
        return Ok(());
    }

    let mut machine = Toy::new(config.clone());
    machine.run_with_io(Rc::new(chunk), &mut StdIo)?;
    Ok(())
}

fn run_bytecode(path: &str, config: &Config) -> Result<(), ToyError> {
    let chunk = load_chunk(path)?;
    let mut machine = Toy::new(config.clone());
    machine.run_with_io(Rc::new(chunk), &mut StdIo)?;
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn repl(config: Config) -> ExitCode {
    use rustyline::error::ReadlineError;

    let mut rl = match rustyline::DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to start the REPL: {}", e);
            return ExitCode::from(3);
        }
    };
    let history = dirs::home_dir().map(|home| home.join(".toy_history"));
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    println!(
        "Toy {} REPL. Type :help for commands.",
        env!("CARGO_PKG_VERSION")
    );
    let mut state = ReplState::new(config);
    let mut io = StdIo;
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "> " } else { "... " };
        match rl.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() && line.trim_start().starts_with(':') {
                    let _ = rl.add_history_entry(line.as_str());
                    match handle_command(&line, &mut state, &mut io) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => eprintln!("{}", e),
                    }
                    continue;
                }

                buffer.push_str(&line);
                buffer.push('\n');
                if needs_more_lines(&buffer) {
                    continue;
                }

                let _ = rl.add_history_entry(buffer.trim_end());
                if let Err(e) = state.eval_line(&buffer, &mut io) {
                    eprintln!("{}", e);
                }
                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => buffer.clear(),
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    if let Some(path) = &history {
        let _ = rl.save_history(path);
    }
    ExitCode::SUCCESS
}

#[cfg(target_arch = "wasm32")]
fn repl(_config: Config) -> ExitCode {
    eprintln!("The REPL is not available on this target.");
    ExitCode::from(3)
}

#[derive(clap::Parser)]
#[command(about, author, disable_version_flag = true)]
struct Opt {
    /// Print version and licence information.
    #[arg(short, long)]
    version: bool,

    /// Verbose output: debug logging, token and instruction traces, disassembly.
    #[arg(short, long)]
    debug: bool,

    /// Compile and execute the given file.
    #[arg(short, long, conflicts_with_all = ["input", "bytecode"])]
    file: Option<String>,

    /// Compile and execute the given string as a Toy program.
    #[arg(short, long, conflicts_with = "bytecode")]
    input: Option<String>,

    /// Execute a bytecode file written with `--output`.
    #[arg(short, long)]
    bytecode: Option<String>,

    /// Write the compiled bytecode to this file instead of executing it.
    #[arg(short, long)]
    output: Option<String>,
}
