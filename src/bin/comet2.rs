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

use anyhow::{Context, Result};
use casl2::object;
use casl2::vm::Machine;
use casl2::vm::console::StdConsole;
use casl2::vm::debugger::Debugger;
use clap::Parser;
use std::path::PathBuf;
use std::process;

/// COMET II simulator with an interactive debugger.
#[derive(Parser)]
#[command(name = "comet2")]
struct Opts {
    /// Suppress the banner and chatter, keep the IN/OUT prompts
    #[arg(short = 'q')]
    quiet: bool,
    /// Suppress the IN/OUT prompts as well
    #[arg(short = 'Q')]
    silent: bool,
    /// Print the version and exit
    #[arg(short = 'v')]
    version: bool,
    file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    if opts.version {
        println!("comet2 version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let quiet = opts.quiet || opts.silent;
    if quiet {
        // Quiet mode is non-interactive: load and run to completion.
        let Some(path) = opts.file else {
            eprintln!("Usage: comet2 [-qQv] <file>");
            process::exit(1);
        };
        let obj = object::read_file(&path)
            .with_context(|| format!("Failed to read object file: {}", path.display()))?;
        let mut machine = Machine::new();
        if let Err(error) = machine.load(&obj) {
            eprintln!("{}", error);
            process::exit(1);
        }
        let mut console = StdConsole::new(!opts.silent);
        if let Err(error) = machine.run(&mut console) {
            eprintln!("{}", error);
            process::exit(1);
        }
        return Ok(());
    }

    println!("COMET II simulator version {}", env!("CARGO_PKG_VERSION"));
    println!("Type \"help\" for a command list.");

    let mut debugger = Debugger::new(Box::new(StdConsole::new(true)));
    if let Some(path) = opts.file {
        debugger.load_file(&path.to_string_lossy());
    }
    if let Err(error) = debugger.run_repl() {
        eprintln!("{}", error);
        process::exit(1);
    }
    Ok(())
}
