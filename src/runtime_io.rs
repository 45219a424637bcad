/// Where `print` output goes, so the VM never touches the process directly.
pub trait RuntimeIo {
    fn write_line(&mut self, s: &str);
    fn write(&mut self, s: &str);
}

/// Default I/O that talks to process stdout (CLI use).
pub struct StdIo;

impl RuntimeIo for StdIo {
    fn write_line(&mut self, s: &str) {
        println!("{}", s);
    }
    fn write(&mut self, s: &str) {
        use std::io::Write;
        print!("{}", s);
        let _ = std::io::stdout().flush();
    }
}

/// Buffer-based I/O for tests and embedding: output accumulates in memory.
pub struct BufferIo {
    output: String,
}

impl BufferIo {
    pub fn new() -> Self {
        Self {
            output: String::new(),
        }
    }
    pub fn take_output(self) -> String {
        self.output
    }
    pub fn get_output(&self) -> &str {
        &self.output
    }
    pub fn drain_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl Default for BufferIo {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeIo for BufferIo {
    fn write_line(&mut self, s: &str) {
        self.output.push_str(s);
        self.output.push('\n');
    }
    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }
}
