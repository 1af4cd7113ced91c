use parking_lot::Mutex;

/// Destination for user-visible output. Diagnostics go through `tracing` instead.
pub trait Bus: Send + Sync {
    fn console_println(&self, line: &str);
    fn error_println(&self, line: &str);
}

/// Writes to stdout and stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleBus;

impl Bus for ConsoleBus {
    fn console_println(&self, line: &str) {
        println!("{}", line);
    }

    fn error_println(&self, line: &str) {
        eprintln!("{}", line);
    }
}

/// Keeps every line for later inspection.
#[derive(Debug, Default)]
pub struct RecordingBus {
    console: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn console_lines(&self) -> Vec<String> {
        self.console.lock().clone()
    }

    pub fn error_lines(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    pub fn console_text(&self) -> String {
        join_lines(&self.console.lock())
    }

    pub fn error_text(&self) -> String {
        join_lines(&self.errors.lock())
    }
}

fn join_lines(lines: &[String]) -> String {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

impl Bus for RecordingBus {
    fn console_println(&self, line: &str) {
        self.console.lock().push(line.to_string());
    }

    fn error_println(&self, line: &str) {
        self.errors.lock().push(line.to_string());
    }
}
