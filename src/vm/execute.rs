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

//! Single-step instruction semantics. All results are masked to 16 bits;
//! overflow is judged on the pre-mask value.

use super::Machine;
use super::console::Console;
use super::decode;
use crate::errors::VmError;
use crate::instructions::{REG_FORM_OFFSET, STACK_TOP, SYS_IN, SYS_OUT, opcode};

const LD_R: u8 = opcode::LD + REG_FORM_OFFSET;
const ADDA_R: u8 = opcode::ADDA + REG_FORM_OFFSET;
const SUBA_R: u8 = opcode::SUBA + REG_FORM_OFFSET;
const ADDL_R: u8 = opcode::ADDL + REG_FORM_OFFSET;
const SUBL_R: u8 = opcode::SUBL + REG_FORM_OFFSET;
const AND_R: u8 = opcode::AND + REG_FORM_OFFSET;
const OR_R: u8 = opcode::OR + REG_FORM_OFFSET;
const XOR_R: u8 = opcode::XOR + REG_FORM_OFFSET;
const CPA_R: u8 = opcode::CPA + REG_FORM_OFFSET;
const CPL_R: u8 = opcode::CPL + REG_FORM_OFFSET;

/// Whether the machine keeps going after a step. A RET that unwinds past
/// the stack top is the main routine returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Running,
    Exit,
}

impl Machine {
    /// Execute the instruction at PR.
    pub fn step(&mut self, console: &mut dyn Console) -> Result<StepResult, VmError> {
        let pc = self.pr;
        let inst = self.read(pc);
        let op = (inst >> 8) as u8;
        let r = ((inst >> 4) & 0x7) as usize;
        let xr = inst & 0xF;
        let src = (xr & 0x7) as usize;
        let adr = self.read(pc.wrapping_add(1));
        let eadr = self.effective_address(adr, xr);

        match op {
            opcode::NOP => self.pr = pc.wrapping_add(1),

            opcode::LD | LD_R => {
                let (value, size) = self.fetch_operand(op == LD_R, eadr, src);
                self.fr.set(value, false);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(size);
            }

            opcode::ST => {
                self.write(eadr, self.gr[r]);
                self.pr = pc.wrapping_add(2);
            }

            opcode::LAD => {
                self.gr[r] = eadr;
                self.pr = pc.wrapping_add(2);
            }

            opcode::ADDA | ADDA_R => {
                let (rhs, size) = self.fetch_operand(op == ADDA_R, eadr, src);
                let (value, overflow) = add_signed(self.gr[r], rhs);
                self.fr.set(value, overflow);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(size);
            }

            opcode::SUBA | SUBA_R => {
                let (rhs, size) = self.fetch_operand(op == SUBA_R, eadr, src);
                let (value, overflow) = sub_signed(self.gr[r], rhs);
                self.fr.set(value, overflow);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(size);
            }

            opcode::ADDL | ADDL_R => {
                let (rhs, size) = self.fetch_operand(op == ADDL_R, eadr, src);
                let (value, overflow) = add_unsigned(self.gr[r], rhs);
                self.fr.set(value, overflow);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(size);
            }

            opcode::SUBL | SUBL_R => {
                let (rhs, size) = self.fetch_operand(op == SUBL_R, eadr, src);
                let (value, overflow) = sub_unsigned(self.gr[r], rhs);
                self.fr.set(value, overflow);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(size);
            }

            opcode::AND | AND_R => {
                let (rhs, size) = self.fetch_operand(op == AND_R, eadr, src);
                let value = self.gr[r] & rhs;
                self.fr.set(value, false);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(size);
            }

            opcode::OR | OR_R => {
                let (rhs, size) = self.fetch_operand(op == OR_R, eadr, src);
                let value = self.gr[r] | rhs;
                self.fr.set(value, false);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(size);
            }

            opcode::XOR | XOR_R => {
                let (rhs, size) = self.fetch_operand(op == XOR_R, eadr, src);
                let value = self.gr[r] ^ rhs;
                self.fr.set(value, false);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(size);
            }

            opcode::CPA | CPA_R => {
                let (rhs, size) = self.fetch_operand(op == CPA_R, eadr, src);
                let value = compare_signed(self.gr[r], rhs);
                self.fr.set(value, false);
                self.pr = pc.wrapping_add(size);
            }

            opcode::CPL | CPL_R => {
                let (rhs, size) = self.fetch_operand(op == CPL_R, eadr, src);
                let value = compare_unsigned(self.gr[r], rhs);
                self.fr.set(value, false);
                self.pr = pc.wrapping_add(size);
            }

            opcode::SLA => {
                let (value, out) = shift_left_arith(self.gr[r], eadr);
                self.fr.set(value, out);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(2);
            }

            opcode::SRA => {
                let (value, out) = shift_right_arith(self.gr[r], eadr);
                self.fr.set(value, out);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(2);
            }

            opcode::SLL => {
                let (value, out) = shift_left_logical(self.gr[r], eadr);
                self.fr.set(value, out);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(2);
            }

            opcode::SRL => {
                let (value, out) = shift_right_logical(self.gr[r], eadr);
                self.fr.set(value, out);
                self.gr[r] = value;
                self.pr = pc.wrapping_add(2);
            }

            opcode::JMI => self.branch(self.fr.sign, eadr, pc),
            opcode::JPL => self.branch(!self.fr.sign && !self.fr.zero, eadr, pc),
            opcode::JZE => self.branch(self.fr.zero, eadr, pc),
            opcode::JNZ => self.branch(!self.fr.zero, eadr, pc),
            opcode::JOV => self.branch(self.fr.overflow, eadr, pc),
            opcode::JUMP => self.branch(true, eadr, pc),

            opcode::PUSH => {
                self.sp = self.sp.wrapping_sub(1);
                self.write(self.sp, eadr);
                self.pr = pc.wrapping_add(2);
            }

            opcode::POP => {
                self.gr[r] = self.read(self.sp);
                self.sp = self.sp.wrapping_add(1);
                self.pr = pc.wrapping_add(1);
            }

            opcode::CALL => {
                self.sp = self.sp.wrapping_sub(1);
                self.write(self.sp, pc.wrapping_add(2));
                self.pr = eadr;
            }

            opcode::RET => {
                self.pr = self.read(self.sp);
                self.sp = self.sp.wrapping_add(1);
                if self.sp > STACK_TOP {
                    return Ok(StepResult::Exit);
                }
            }

            opcode::SVC => {
                match eadr {
                    SYS_IN => self.trap_in(console)?,
                    SYS_OUT => self.trap_out(console)?,
                    _ => {}
                }
                self.pr = pc.wrapping_add(2);
            }

            _ => {
                let d = decode::disassemble(&self.memory, pc);
                return Err(VmError::IllegalInstruction {
                    mnemonic: format!("{} {}", d.mnemonic, d.operands),
                    pc,
                });
            }
        }

        Ok(StepResult::Running)
    }

    /// Step until the main routine returns.
    pub fn run(&mut self, console: &mut dyn Console) -> Result<(), VmError> {
        while self.step(console)? == StepResult::Running {}
        Ok(())
    }

    /// `adr` plus the index register when one is named; GR0 never indexes.
    pub fn effective_address(&self, adr: u16, xr: u16) -> u16 {
        let index = if (1..=7).contains(&xr) {
            self.gr[xr as usize]
        } else {
            0
        };
        adr.wrapping_add(index)
    }

    fn fetch_operand(&self, register_form: bool, eadr: u16, src: usize) -> (u16, u16) {
        if register_form {
            (self.gr[src], 1)
        } else {
            (self.read(eadr), 2)
        }
    }

    fn branch(&mut self, take: bool, eadr: u16, pc: u16) {
        self.pr = if take { eadr } else { pc.wrapping_add(2) };
    }

    /// Read one line, store its length through GR2 and its characters,
    /// one per word, through GR1.
    fn trap_in(&mut self, console: &mut dyn Console) -> Result<(), VmError> {
        let line = console.input_line()?;
        let truncated: Vec<char> = line.chars().take(256).collect();
        let buffer = self.gr[1];
        let length = self.gr[2];
        self.write(length, truncated.len() as u16);
        for (i, c) in truncated.iter().enumerate() {
            self.write(buffer.wrapping_add(i as u16), (*c as u32 % 256) as u16);
        }
        Ok(())
    }

    /// Write the low bytes of the words at GR1, for the count stored
    /// through GR2, as one output line.
    fn trap_out(&mut self, console: &mut dyn Console) -> Result<(), VmError> {
        let buffer = self.gr[1];
        let count = self.read(self.gr[2]);
        let text: String = (0..count)
            .map(|i| (self.read(buffer.wrapping_add(i)) & 0xFF) as u8 as char)
            .collect();
        console.output_line(&text)?;
        Ok(())
    }
}

fn add_signed(a: u16, b: u16) -> (u16, bool) {
    let sum = (a as i16 as i32) + (b as i16 as i32);
    (sum as u16, sum < i16::MIN as i32 || sum > i16::MAX as i32)
}

fn sub_signed(a: u16, b: u16) -> (u16, bool) {
    let diff = (a as i16 as i32) - (b as i16 as i32);
    (diff as u16, diff < i16::MIN as i32 || diff > i16::MAX as i32)
}

fn add_unsigned(a: u16, b: u16) -> (u16, bool) {
    let sum = a as u32 + b as u32;
    (sum as u16, sum > u16::MAX as u32)
}

fn sub_unsigned(a: u16, b: u16) -> (u16, bool) {
    let diff = a as i32 - b as i32;
    (diff as u16, diff < 0)
}

/// Saturating signed difference, reinterpreted as a word for flag purposes.
fn compare_signed(a: u16, b: u16) -> u16 {
    let diff = (a as i16 as i32) - (b as i16 as i32);
    diff.clamp(i16::MIN as i32, i16::MAX as i32) as i16 as u16
}

fn compare_unsigned(a: u16, b: u16) -> u16 {
    let diff = a as i32 - b as i32;
    diff.clamp(i16::MIN as i32, i16::MAX as i32) as i16 as u16
}

/// Left shift that preserves the sign bit. The overflow output is the last
/// bit pushed out of bit 14.
fn shift_left_arith(value: u16, count: u16) -> (u16, bool) {
    if count == 0 {
        return (value, false);
    }
    let sign = value & 0x8000;
    let shifted = if count >= 15 {
        0
    } else {
        (value << count) & 0x7FFF
    };
    let out = count <= 15 && (value >> (15 - count)) & 1 != 0;
    (sign | shifted, out)
}

/// Sign-extending right shift. The overflow output is the last bit shifted
/// out, bit `count - 1` of the original value.
fn shift_right_arith(value: u16, count: u16) -> (u16, bool) {
    if count == 0 {
        return (value, false);
    }
    let out = count <= 16 && (value >> (count - 1)) & 1 != 0;
    let result = ((value as i16) >> count.min(15)) as u16;
    (result, out)
}

fn shift_left_logical(value: u16, count: u16) -> (u16, bool) {
    if count == 0 {
        return (value, false);
    }
    let out = count <= 16 && (value >> (16 - count)) & 1 != 0;
    let result = if count >= 16 { 0 } else { value << count };
    (result, out)
}

fn shift_right_logical(value: u16, count: u16) -> (u16, bool) {
    if count == 0 {
        return (value, false);
    }
    let out = count <= 16 && (value >> (count - 1)) & 1 != 0;
    let result = if count >= 16 { 0 } else { value >> count };
    (result, out)
}
