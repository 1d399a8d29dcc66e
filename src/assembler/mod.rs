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

pub mod listing;
pub mod memory_image;
pub mod symbol_table;

use crate::errors::AsmError;
use crate::instructions::{self, Form, Instruction, REG_FORM_OFFSET, SYS_IN, SYS_OUT, opcode};
use crate::object::ObjectFile;
use crate::parser::{self, SourceLine};
use listing::{Listing, ListingRow, SymbolRow};
use memory_image::{MemoryImage, WordValue};
use std::collections::BTreeMap;
use symbol_table::SymbolTable;

/// Everything the first pass produces: the symbol table, the staged image,
/// the entry-point expression, and the per-line source buffer the listing
/// prints from.
#[derive(Debug)]
pub struct FirstPass {
    pub file: String,
    pub symbols: SymbolTable,
    pub image: MemoryImage,
    pub entry: WordValue,
    pub entry_line: usize,
    pub lines: BTreeMap<usize, String>,
}

/// Pass 1: walk the source once, binding labels to addresses, expanding
/// macros, staging literals, and emitting provisional words.
pub fn run_first_pass(file: &str, source: &str) -> Result<FirstPass, AsmError> {
    let mut asm = Assembler::new(file);
    let mut last_line = 1;
    for (index, text) in source.lines().enumerate() {
        last_line = index + 1;
        asm.process_line(last_line, text)?;
    }
    if asm.in_block {
        return Err(asm.semantic(last_line, "No \"END\" instruction found".to_string()));
    }
    Ok(FirstPass {
        file: asm.file,
        symbols: asm.symbols,
        image: asm.image,
        entry: asm.entry,
        entry_line: asm.entry_line,
        lines: asm.lines,
    })
}

/// Pass 2: fold every staged word through the symbol table and lay the
/// resolved image out contiguously from address 0.
pub fn generate_object(pass: &FirstPass) -> Result<(ObjectFile, Listing), AsmError> {
    let size = pass.image.last_address().map_or(0, |a| a as usize + 1);
    let mut words = vec![0u16; size];
    let mut rows = Vec::new();
    let mut previous_line = None;

    for (address, cell) in pass.image.iter() {
        let value = resolve_word(&pass.symbols, &cell.value, &pass.file, cell.line)?;
        words[address as usize] = value;
        let text = if previous_line == Some(cell.line) {
            None
        } else {
            pass.lines.get(&cell.line).cloned()
        };
        rows.push(ListingRow {
            line: cell.line,
            address,
            word: value,
            text,
        });
        previous_line = Some(cell.line);
    }

    let entry = resolve_word(&pass.symbols, &pass.entry, &pass.file, pass.entry_line)?;

    let symbols = pass
        .symbols
        .sorted_by_line()
        .into_iter()
        .map(|(name, sym)| SymbolRow {
            file: sym.file.clone(),
            line: sym.line,
            name: name.to_string(),
            value: sym.value,
        })
        .collect();

    Ok((
        ObjectFile { entry, words },
        Listing { rows, symbols },
    ))
}

fn resolve_word(
    symbols: &SymbolTable,
    value: &WordValue,
    file: &str,
    line: usize,
) -> Result<u16, AsmError> {
    match value {
        WordValue::Concrete(word) => Ok(*word),
        WordValue::Deferred(expr) => symbols.resolve(expr, file, line),
        WordValue::CallTarget(expr) => symbols.resolve_call(expr, file, line),
    }
}

/// A later `START` whose operand names an entry label further down the
/// block; the routine's own symbol is re-pointed when that label appears.
#[derive(Debug)]
struct PendingEntry {
    virtual_name: String,
    target: String,
}

/// The first-pass context: address counter, current scope, literal stack,
/// and the tables being built.
#[derive(Debug)]
struct Assembler {
    file: String,
    address: u16,
    scope: String,
    in_block: bool,
    saw_start: bool,
    entry: WordValue,
    entry_line: usize,
    literals: Vec<String>,
    pending_entry: Option<PendingEntry>,
    symbols: SymbolTable,
    image: MemoryImage,
    lines: BTreeMap<usize, String>,
}

impl Assembler {
    fn new(file: &str) -> Self {
        Assembler {
            file: file.to_string(),
            address: 0,
            scope: String::new(),
            in_block: false,
            saw_start: false,
            entry: WordValue::Concrete(0),
            entry_line: 0,
            literals: Vec::new(),
            pending_entry: None,
            symbols: SymbolTable::new(),
            image: MemoryImage::new(),
            lines: BTreeMap::new(),
        }
    }

    fn process_line(&mut self, number: usize, text: &str) -> Result<(), AsmError> {
        let Some(line) = parser::parse_line(&self.file, number, text)? else {
            return Ok(());
        };
        self.lines.insert(number, text.trim_end().to_string());

        let inst = instructions::lookup(&line.mnemonic)
            .ok_or_else(|| self.semantic(number, "Illegal instruction".to_string()))?;

        if inst.form == Form::Start {
            return self.handle_start(&line, number);
        }
        if !self.in_block {
            return Err(self.semantic(number, "No \"START\" instruction found".to_string()));
        }
        if inst.form == Form::End {
            return self.handle_end(&line, number);
        }

        if let Some(label) = &line.label {
            self.define_label(label, number)?;
        }

        let operands = parser::split_operands(&line.operands);
        match inst.form {
            Form::RegAdr => self.emit_reg_adr(inst, &operands, number),
            Form::Adr => self.emit_adr(inst, &operands, number),
            Form::Reg => self.emit_reg(inst, &operands, number),
            Form::Nullary => self.emit_nullary(inst, &operands, number),
            Form::RegAdrOrReg => self.emit_reg_adr_or_reg(inst, &operands, number),
            Form::Ds => self.handle_ds(&operands, number),
            Form::Dc => self.handle_dc(&operands, number),
            Form::In => self.expand_io(&operands, number, SYS_IN),
            Form::Out => self.expand_io(&operands, number, SYS_OUT),
            Form::Rpush => self.expand_rpush(&operands, number),
            Form::Rpop => self.expand_rpop(&operands, number),
            Form::Start | Form::End => unreachable!(),
        }
    }

    fn handle_start(&mut self, line: &SourceLine, number: usize) -> Result<(), AsmError> {
        let Some(label) = &line.label else {
            return Err(self.semantic(number, "No label found at START".to_string()));
        };
        let operands = parser::split_operands(&line.operands);
        if operands.len() > 1 {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }

        self.scope = label.clone();
        self.in_block = true;
        let qualified = format!("{}.{}", label, label);
        self.symbols
            .add_label(&qualified, self.address, &self.file, number)?;

        if !self.saw_start {
            // The first START fixes the program entry point.
            self.entry = match operands.first() {
                Some(target) => WordValue::Deferred(format!("{}.{}", label, target)),
                None => WordValue::Concrete(self.address),
            };
            self.entry_line = number;
        } else if let Some(target) = operands.first() {
            self.pending_entry = Some(PendingEntry {
                virtual_name: qualified,
                target: format!("{}.{}", label, target),
            });
        }
        self.saw_start = true;
        Ok(())
    }

    fn handle_end(&mut self, line: &SourceLine, number: usize) -> Result<(), AsmError> {
        if let Some(label) = &line.label {
            return Err(self.semantic(number, format!("Can't use label \"{}\" at END", label)));
        }
        if !line.operands.is_empty() {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }
        while let Some(text) = self.literals.pop() {
            self.flush_literal(&text, number)?;
        }
        self.in_block = false;
        Ok(())
    }

    /// Materialise one staged literal at the current address and register
    /// its textual name.
    fn flush_literal(&mut self, text: &str, number: usize) -> Result<(), AsmError> {
        let form = &text[1..];
        let address = self.address;
        if form.starts_with('\'') {
            let Some(decoded) = parser::decode_quoted(form) else {
                return Err(self.symbol_error(number, format!("Invalid literal: {}", text)));
            };
            for c in decoded.chars() {
                self.emit(WordValue::Concrete((c as u32 % 256) as u16), number);
            }
        } else if let Some(value) =
            symbol_table::parse_hex(form).or_else(|| symbol_table::parse_decimal(form))
        {
            self.emit(WordValue::Concrete(value), number);
        } else {
            return Err(self.symbol_error(number, format!("Invalid literal: {}", text)));
        }
        self.symbols.add_literal(text, address, &self.file, number);
        Ok(())
    }

    fn define_label(&mut self, name: &str, number: usize) -> Result<(), AsmError> {
        let qualified = format!("{}.{}", self.scope, name);
        self.symbols
            .add_label(&qualified, self.address, &self.file, number)?;
        if let Some(pending) = self.pending_entry.take() {
            if pending.target == qualified {
                self.symbols
                    .update_label(&pending.virtual_name, self.address, &self.file, number)?;
            } else {
                self.pending_entry = Some(pending);
            }
        }
        Ok(())
    }

    fn emit(&mut self, value: WordValue, line: usize) {
        self.image.put(self.address, value, line);
        self.address = self.address.wrapping_add(1);
    }

    /// `GR, adr[, XR]` — two words.
    fn emit_reg_adr(
        &mut self,
        inst: &Instruction,
        operands: &[String],
        number: usize,
    ) -> Result<(), AsmError> {
        if operands.len() < 2 || operands.len() > 3 {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }
        let gr = self.register_operand(&operands[0], number)?;
        let xr = self.index_operand(operands.get(2), number)?;
        let adr = self.address_operand(&operands[1], false);
        self.emit(
            WordValue::Concrete(((inst.opcode as u16) << 8) | (gr << 4) | xr),
            number,
        );
        self.emit(adr, number);
        Ok(())
    }

    /// `adr[, XR]` — two words.
    fn emit_adr(
        &mut self,
        inst: &Instruction,
        operands: &[String],
        number: usize,
    ) -> Result<(), AsmError> {
        if operands.is_empty() || operands.len() > 2 {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }
        let xr = self.index_operand(operands.get(1), number)?;
        let adr = self.address_operand(&operands[0], inst.opcode == opcode::CALL);
        self.emit(
            WordValue::Concrete(((inst.opcode as u16) << 8) | xr),
            number,
        );
        self.emit(adr, number);
        Ok(())
    }

    /// `GR` — one word.
    fn emit_reg(
        &mut self,
        inst: &Instruction,
        operands: &[String],
        number: usize,
    ) -> Result<(), AsmError> {
        if operands.len() != 1 {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }
        let gr = self.register_operand(&operands[0], number)?;
        self.emit(
            WordValue::Concrete(((inst.opcode as u16) << 8) | (gr << 4)),
            number,
        );
        Ok(())
    }

    /// No operands — one word.
    fn emit_nullary(
        &mut self,
        inst: &Instruction,
        operands: &[String],
        number: usize,
    ) -> Result<(), AsmError> {
        if !operands.is_empty() {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }
        self.emit(WordValue::Concrete((inst.opcode as u16) << 8), number);
        Ok(())
    }

    /// `GR, GR` collapses to the one-word register form; anything else is
    /// the two-word memory form.
    fn emit_reg_adr_or_reg(
        &mut self,
        inst: &Instruction,
        operands: &[String],
        number: usize,
    ) -> Result<(), AsmError> {
        if operands.len() == 2 {
            if let Some(gr2) = parser::parse_register(&operands[1]) {
                let gr = self.register_operand(&operands[0], number)?;
                let op = (inst.opcode + REG_FORM_OFFSET) as u16;
                self.emit(WordValue::Concrete((op << 8) | (gr << 4) | gr2), number);
                return Ok(());
            }
        }
        self.emit_reg_adr(inst, operands, number)
    }

    fn handle_ds(&mut self, operands: &[String], number: usize) -> Result<(), AsmError> {
        if operands.len() != 1 {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }
        let count: u16 = operands[0]
            .parse()
            .map_err(|_| self.semantic(number, format!("\"{}\" must be decimal", operands[0])))?;
        for _ in 0..count {
            self.emit(WordValue::Concrete(0), number);
        }
        Ok(())
    }

    fn handle_dc(&mut self, operands: &[String], number: usize) -> Result<(), AsmError> {
        if operands.is_empty() {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }
        for operand in operands {
            if operand.starts_with('\'') {
                let Some(decoded) = parser::decode_quoted(operand) else {
                    return Err(self.semantic(number, "Invalid operand".to_string()));
                };
                for c in decoded.chars() {
                    self.emit(WordValue::Concrete((c as u32 % 256) as u16), number);
                }
            } else if let Some(value) = symbol_table::parse_decimal(operand) {
                self.emit(WordValue::Concrete(value), number);
            } else if parser::is_identifier(operand) && parser::parse_register(operand).is_none() {
                let qualified = format!("{}.{}", self.scope, operand);
                self.emit(WordValue::Deferred(qualified), number);
            } else {
                // Hex and anything else go through the pass-2 resolver.
                self.emit(WordValue::Deferred(operand.clone()), number);
            }
        }
        Ok(())
    }

    /// IN and OUT expand to the same save/load/trap/restore sequence,
    /// differing only in the vector.
    fn expand_io(
        &mut self,
        operands: &[String],
        number: usize,
        vector: u16,
    ) -> Result<(), AsmError> {
        if operands.len() != 2 {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }
        let push = (opcode::PUSH as u16) << 8;
        let lad = (opcode::LAD as u16) << 8;
        let pop = (opcode::POP as u16) << 8;
        let svc = (opcode::SVC as u16) << 8;
        let buffer = self.address_operand(&operands[0], false);
        let length = self.address_operand(&operands[1], false);

        self.emit(WordValue::Concrete(push | 1), number); // PUSH 0, GR1
        self.emit(WordValue::Concrete(0), number);
        self.emit(WordValue::Concrete(push | 2), number); // PUSH 0, GR2
        self.emit(WordValue::Concrete(0), number);
        self.emit(WordValue::Concrete(lad | 1 << 4), number); // LAD GR1, buffer
        self.emit(buffer, number);
        self.emit(WordValue::Concrete(lad | 2 << 4), number); // LAD GR2, length
        self.emit(length, number);
        self.emit(WordValue::Concrete(svc), number); // SVC vector
        self.emit(WordValue::Concrete(vector), number);
        self.emit(WordValue::Concrete(pop | 2 << 4), number); // POP GR2
        self.emit(WordValue::Concrete(pop | 1 << 4), number); // POP GR1
        Ok(())
    }

    fn expand_rpush(&mut self, operands: &[String], number: usize) -> Result<(), AsmError> {
        if !operands.is_empty() {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }
        for n in 1..=7u16 {
            self.emit(
                WordValue::Concrete(((opcode::PUSH as u16) << 8) | n),
                number,
            );
            self.emit(WordValue::Concrete(0), number);
        }
        Ok(())
    }

    fn expand_rpop(&mut self, operands: &[String], number: usize) -> Result<(), AsmError> {
        if !operands.is_empty() {
            return Err(self.semantic(number, "Invalid operand".to_string()));
        }
        for n in (1..=7u16).rev() {
            self.emit(
                WordValue::Concrete(((opcode::POP as u16) << 8) | (n << 4)),
                number,
            );
        }
        Ok(())
    }

    fn register_operand(&self, token: &str, number: usize) -> Result<u16, AsmError> {
        parser::parse_register(token)
            .ok_or_else(|| self.semantic(number, "Invalid operand".to_string()))
    }

    /// An optional third (or second) operand naming the index register.
    /// GR0 cannot carry an index.
    fn index_operand(&self, token: Option<&String>, number: usize) -> Result<u16, AsmError> {
        match token {
            None => Ok(0),
            Some(t) => match parser::parse_register(t) {
                Some(0) => Err(self.semantic(
                    number,
                    "Can't use GR0 as an index register".to_string(),
                )),
                Some(n) => Ok(n),
                None => Err(self.semantic(number, "Invalid operand".to_string())),
            },
        }
    }

    /// Classify an address operand: stage a literal, qualify an identifier
    /// into the current scope, or defer the raw text for pass 2.
    fn address_operand(&mut self, token: &str, call: bool) -> WordValue {
        if token.starts_with('=') {
            if !self.literals.iter().any(|l| l == token) {
                self.literals.push(token.to_string());
            }
            return WordValue::Deferred(token.to_string());
        }
        if parser::is_identifier(token) && parser::parse_register(token).is_none() {
            let qualified = format!("{}.{}", self.scope, token);
            return if call {
                WordValue::CallTarget(qualified)
            } else {
                WordValue::Deferred(qualified)
            };
        }
        WordValue::Deferred(token.to_string())
    }

    fn semantic(&self, line: usize, reason: String) -> AsmError {
        AsmError::Semantic {
            file: self.file.clone(),
            line,
            reason,
        }
    }

    fn symbol_error(&self, line: usize, reason: String) -> AsmError {
        AsmError::Symbol {
            file: self.file.clone(),
            line,
            reason,
        }
    }
}
