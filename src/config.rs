/// Settings shared by the compiler and the VM.
///
/// Constructed by the host (CLI, REPL, tests) and handed to `Compiler::new`
/// and `Toy::new`; nothing in the core reads process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Trace every scanned token and executed instruction at `trace` level.
    pub verbose: bool,
    /// Upper bound on the value stack.
    pub max_stack: usize,
    /// Upper bound on nested call frames.
    pub max_frames: usize,
}

impl Config {
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            max_stack: 1 << 16,
            max_frames: 1024,
        }
    }
}
