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

//! Word-to-mnemonic decoding for the disassembler and the register dump.

use crate::instructions::{self, Form};

/// A decoded memory word: rendering text plus the instruction length in
/// words. A word no opcode claims renders as its own `DC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disasm {
    pub mnemonic: String,
    pub operands: String,
    pub size: u16,
}

pub fn disassemble(memory: &[u16], pc: u16) -> Disasm {
    let word = memory[pc as usize];
    let op = (word >> 8) as u8;
    let gr = (word >> 4) & 0xF;
    let xr = word & 0xF;
    let adr = memory[pc.wrapping_add(1) as usize];

    let Some((inst, register_form)) = instructions::decode(op) else {
        return Disasm {
            mnemonic: "DC".to_string(),
            operands: format!("#{:04x}", word),
            size: 1,
        };
    };

    let (operands, size) = if register_form {
        (format!("GR{}, GR{}", gr, xr), 1)
    } else {
        match inst.form {
            Form::RegAdr | Form::RegAdrOrReg => (format!("GR{}, {}", gr, adr_text(adr, xr)), 2),
            Form::Adr => (adr_text(adr, xr), 2),
            Form::Reg => (format!("GR{}", gr), 1),
            Form::Nullary => (String::new(), 1),
            _ => unreachable!("directives never decode"),
        }
    };

    Disasm {
        mnemonic: inst.mnemonic.to_string(),
        operands,
        size,
    }
}

fn adr_text(adr: u16, xr: u16) -> String {
    if xr == 0 {
        format!("#{:04x}", adr)
    } else {
        format!("#{:04x}, GR{}", adr, xr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_at(words: &[u16]) -> Disasm {
        let mut memory = vec![0u16; 32];
        memory[..words.len()].copy_from_slice(words);
        disassemble(&memory, 0)
    }

    #[test]
    fn memory_form_renders_address_and_index() {
        let d = decode_at(&[0x1012, 0x0040]);
        assert_eq!(d.mnemonic, "LD");
        assert_eq!(d.operands, "GR1, #0040, GR2");
        assert_eq!(d.size, 2);
    }

    #[test]
    fn register_form_is_one_word() {
        let d = decode_at(&[0x1412]);
        assert_eq!(d.mnemonic, "LD");
        assert_eq!(d.operands, "GR1, GR2");
        assert_eq!(d.size, 1);
    }

    #[test]
    fn nullary_and_reg_forms() {
        assert_eq!(decode_at(&[0x8100]).mnemonic, "RET");
        assert_eq!(decode_at(&[0x8100]).size, 1);

        let pop = decode_at(&[0x7130]);
        assert_eq!(pop.mnemonic, "POP");
        assert_eq!(pop.operands, "GR3");
        assert_eq!(pop.size, 1);
    }

    #[test]
    fn unknown_word_renders_as_dc() {
        let d = decode_at(&[0xABCD]);
        assert_eq!(d.mnemonic, "DC");
        assert_eq!(d.operands, "#abcd");
        assert_eq!(d.size, 1);
    }
}
