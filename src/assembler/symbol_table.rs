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

use crate::errors::AsmError;
use crate::parser;
use std::collections::HashMap;

/// A resolved name with its defining location, kept for diagnostics and the
/// listing's symbol table.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub value: u16,
    pub file: String,
    pub line: usize,
}

/// Qualified names (`scope.local`, plus literal texts such as `='A'`) to
/// 16-bit values.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a label definition. A second definition of the same qualified
    /// name is an error.
    pub fn add_label(
        &mut self,
        name: &str,
        value: u16,
        file: &str,
        line: usize,
    ) -> Result<(), AsmError> {
        if self.symbols.contains_key(name) {
            return Err(AsmError::Symbol {
                file: file.to_string(),
                line,
                reason: format!("Label \"{}\" already defined", display_name(name)),
            });
        }
        self.symbols.insert(
            name.to_string(),
            Symbol {
                value,
                file: file.to_string(),
                line,
            },
        );
        Ok(())
    }

    /// Re-point an existing label, used when a routine's entry label turns
    /// out to sit past its `START` line.
    pub fn update_label(
        &mut self,
        name: &str,
        value: u16,
        file: &str,
        line: usize,
    ) -> Result<(), AsmError> {
        match self.symbols.get_mut(name) {
            Some(symbol) => {
                symbol.value = value;
                Ok(())
            }
            None => Err(AsmError::Symbol {
                file: file.to_string(),
                line,
                reason: format!("Label \"{}\" is not defined", display_name(name)),
            }),
        }
    }

    /// Register a pooled literal under its textual name. Re-registration
    /// re-points the name at the newest pool copy.
    pub fn add_literal(&mut self, name: &str, value: u16, file: &str, line: usize) {
        self.symbols.insert(
            name.to_string(),
            Symbol {
                value,
                file: file.to_string(),
                line,
            },
        );
    }

    /// Resolve a deferred expression: `#hhhh`, signed decimal, or a known
    /// symbol.
    pub fn resolve(&self, expr: &str, file: &str, line: usize) -> Result<u16, AsmError> {
        if let Some(value) = parse_hex(expr) {
            return Ok(value);
        }
        if let Some(value) = parse_decimal(expr) {
            return Ok(value);
        }
        if let Some(symbol) = self.symbols.get(expr) {
            return Ok(symbol.value);
        }
        Err(AsmError::Symbol {
            file: file.to_string(),
            line,
            reason: format!("Undefined symbol \"{}\"", display_name(expr)),
        })
    }

    /// Resolve a CALL operand: the qualified form first, then the target's
    /// own entry label (`X` resolves against `X.X`).
    pub fn resolve_call(&self, expr: &str, file: &str, line: usize) -> Result<u16, AsmError> {
        if let Some(symbol) = self.symbols.get(expr) {
            return Ok(symbol.value);
        }
        if let Some((_, tail)) = expr.split_once('.') {
            if parser::is_identifier(tail) {
                let entry = format!("{}.{}", tail, tail);
                if let Some(symbol) = self.symbols.get(&entry) {
                    return Ok(symbol.value);
                }
            }
        }
        self.resolve(expr, file, line)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// All symbols, sorted by the source line that defined them.
    pub fn sorted_by_line(&self) -> Vec<(&str, &Symbol)> {
        let mut entries: Vec<_> = self.symbols.iter().map(|(n, s)| (n.as_str(), s)).collect();
        entries.sort_by(|a, b| (a.1.line, a.0).cmp(&(b.1.line, b.0)));
        entries
    }
}

/// Strip qualification for diagnostics: `X.X` reads as `X`, `S.Y` as
/// `Y in routine S`.
pub fn display_name(name: &str) -> String {
    match name.split_once('.') {
        Some((scope, local)) if scope == local => local.to_string(),
        Some((scope, local)) => format!("{} in routine {}", local, scope),
        None => name.to_string(),
    }
}

pub(crate) fn parse_hex(expr: &str) -> Option<u16> {
    let digits = expr.strip_prefix('#')?;
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

pub(crate) fn parse_decimal(expr: &str) -> Option<u16> {
    let unsigned = expr.strip_prefix(['+', '-']).unwrap_or(expr);
    if unsigned.is_empty() || !unsigned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    expr.parse::<i32>().ok().map(|v| v as u16)
}
