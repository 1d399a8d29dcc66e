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
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process;

/// CASL II assembler: `FILE.cas` in, `FILE.com` out.
#[derive(Parser)]
#[command(name = "casl2")]
struct Opts {
    /// Print the assembly listing and defined symbols
    #[arg(short = 'a')]
    listing: bool,
    /// Print the version and exit
    #[arg(short = 'v')]
    version: bool,
    file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    if opts.version {
        println!("casl2 version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let Some(path) = opts.file else {
        eprintln!("Usage: casl2 [-av] <file>");
        process::exit(1);
    };

    let source = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let assembly = match casl2::assemble(&name, &source) {
        Ok(assembly) => assembly,
        Err(error) => {
            eprintln!("{}", error);
            process::exit(1);
        }
    };

    // The object lands in the current directory regardless of where the
    // source came from.
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "a".to_string());
    let output = PathBuf::from(format!("{}.com", stem));
    object::write_file(&output, &assembly.object)
        .with_context(|| format!("Failed to write object file: {}", output.display()))?;

    if opts.listing {
        print!("{}", assembly.listing);
    }

    Ok(())
}
