/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::io::{self, Write};

/// The seam between the trap handlers and the terminal, so tests can drive
/// programs without a tty.
pub trait Console {
    /// One line of program input, without the trailing newline.
    fn input_line(&mut self) -> io::Result<String>;
    /// One line of program output; the newline is appended here.
    fn output_line(&mut self, text: &str) -> io::Result<()>;
}

/// Production console on stdin/stdout. Prompts are framing chatter and can
/// be switched off.
pub struct StdConsole {
    pub prompts: bool,
}

impl StdConsole {
    pub fn new(prompts: bool) -> Self {
        StdConsole { prompts }
    }
}

impl Console for StdConsole {
    fn input_line(&mut self) -> io::Result<String> {
        if self.prompts {
            print!("IN > ");
            io::stdout().flush()?;
        }
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    fn output_line(&mut self, text: &str) -> io::Result<()> {
        if self.prompts {
            println!("OUT> {}", text);
        } else {
            println!("{}", text);
        }
        io::stdout().flush()
    }
}

/// Scripted console for tests: queued input lines, captured output lines.
#[derive(Default)]
pub struct MockConsole {
    inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl MockConsole {
    pub fn with_input(lines: &[&str]) -> Self {
        MockConsole {
            // Popped from the back.
            inputs: lines.iter().rev().map(|s| s.to_string()).collect(),
            outputs: Vec::new(),
        }
    }
}

impl Console for MockConsole {
    fn input_line(&mut self) -> io::Result<String> {
        Ok(self.inputs.pop().unwrap_or_default())
    }

    fn output_line(&mut self, text: &str) -> io::Result<()> {
        self.outputs.push(text.to_string());
        Ok(())
    }
}
