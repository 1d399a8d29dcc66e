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

use std::fmt;

/// One emitted word in the listing. `text` is present on the first word a
/// source line contributes; follow-up words elide the address column.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub line: usize,
    pub address: u16,
    pub word: u16,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRow {
    pub file: String,
    pub line: usize,
    pub name: String,
    pub value: u16,
}

/// The `-a` output: image rows followed by the defined-symbol table.
#[derive(Debug, Default)]
pub struct Listing {
    pub rows: Vec<ListingRow>,
    pub symbols: Vec<SymbolRow>,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            match &row.text {
                Some(text) => writeln!(
                    f,
                    "{:4} {:04x} {:04x}\t{}",
                    row.line, row.address, row.word, text
                )?,
                None => writeln!(f, "{:4}      {:04x}", row.line, row.word)?,
            }
        }
        if !self.symbols.is_empty() {
            writeln!(f, "\nDefined symbols:")?;
            for sym in &self.symbols {
                writeln!(
                    f,
                    "{}:{}: {} = #{:04x}",
                    sym.file, sym.line, sym.name, sym.value
                )?;
            }
        }
        Ok(())
    }
}
