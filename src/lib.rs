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

//! A CASL II assembler and COMET II simulator. The assembler turns one
//! source file into one object file; the simulator loads object files into
//! an emulated 16-bit machine behind a gdb-style debugger.

pub mod assembler;
pub mod errors;
pub mod instructions;
pub mod object;
pub mod parser;
pub mod vm;

use assembler::listing::Listing;
use errors::AsmError;
use object::ObjectFile;

/// The finished translation of one source file.
#[derive(Debug)]
pub struct Assembly {
    pub object: ObjectFile,
    pub listing: Listing,
}

/// Assemble one CASL II source text. `file` names the translation unit in
/// diagnostics.
pub fn assemble(file: &str, source: &str) -> Result<Assembly, AsmError> {
    let first_pass = assembler::run_first_pass(file, source)?;
    let (object, listing) = assembler::generate_object(&first_pass)?;
    Ok(Assembly { object, listing })
}
