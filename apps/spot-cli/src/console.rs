use crate::status::StatusChannel;
use command_supervisor::{InputSource, OutputSink};
use std::io::{self, BufRead, Write};

/// Reads turns from stdin, printing the prompt first.
pub struct ConsoleInput {
    stdin: io::StdinLock<'static>,
}

impl ConsoleInput {
    pub fn new() -> Self {
        Self {
            stdin: io::stdin().lock(),
        }
    }
}

impl InputSource for ConsoleInput {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match self.stdin.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(e) => {
                tracing::error!("failed to read stdin: {}", e);
                None
            }
        }
    }
}

/// Prints to stdout and mirrors every message to the status channel, if any.
pub struct ConsoleOutput {
    status: Option<StatusChannel>,
}

impl ConsoleOutput {
    pub fn new(status: Option<StatusChannel>) -> Self {
        Self { status }
    }
}

impl OutputSink for ConsoleOutput {
    fn say(&mut self, message: &str) {
        println!("{message}");
        if let Some(status) = self.status.as_mut() {
            status.send(message);
        }
    }
}
