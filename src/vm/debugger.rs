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

//! The interactive debugger: a blocking read-eval-print loop over a fixed
//! command table. Bad arguments are warnings; a decoded-but-unknown control
//! word during execution is fatal.

use super::Machine;
use super::console::Console;
use super::decode;
use super::execute::StepResult;
use crate::errors::VmError;
use crate::object;
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

/// What the REPL does after a command.
pub enum Flow {
    Stay,
    Quit,
    Fatal(VmError),
}

struct Command {
    short: &'static str,
    long: &'static str,
    usage: &'static str,
    help: &'static str,
    list_after: bool,
    handler: fn(&mut Debugger, &[&str]) -> Flow,
}

const COMMANDS: &[Command] = &[
    Command {
        short: "r",
        long: "run",
        usage: "run",
        help: "Run until PR hits a breakpoint",
        list_after: true,
        handler: Debugger::cmd_run,
    },
    Command {
        short: "s",
        long: "step",
        usage: "step [N]",
        help: "Execute N instructions (default 1)",
        list_after: true,
        handler: Debugger::cmd_step,
    },
    Command {
        short: "b",
        long: "break",
        usage: "break ADDR",
        help: "Set a breakpoint at ADDR",
        list_after: false,
        handler: Debugger::cmd_break,
    },
    Command {
        short: "d",
        long: "delete",
        usage: "delete [N]",
        help: "Delete breakpoint N, or all breakpoints",
        list_after: false,
        handler: Debugger::cmd_delete,
    },
    Command {
        short: "i",
        long: "info",
        usage: "info",
        help: "List breakpoints",
        list_after: false,
        handler: Debugger::cmd_info,
    },
    Command {
        short: "p",
        long: "print",
        usage: "print",
        help: "Show PR, SP, FR and the general registers",
        list_after: false,
        handler: Debugger::cmd_print,
    },
    Command {
        short: "du",
        long: "dump",
        usage: "dump [ADDR]",
        help: "Dump 128 words of memory from ADDR",
        list_after: false,
        handler: Debugger::cmd_dump,
    },
    Command {
        short: "st",
        long: "stack",
        usage: "stack",
        help: "Dump memory from SP",
        list_after: false,
        handler: Debugger::cmd_stack,
    },
    Command {
        short: "f",
        long: "file",
        usage: "file PATH",
        help: "Load an object file",
        list_after: true,
        handler: Debugger::cmd_file,
    },
    Command {
        short: "j",
        long: "jump",
        usage: "jump ADDR",
        help: "Set PR to ADDR",
        list_after: true,
        handler: Debugger::cmd_jump,
    },
    Command {
        short: "m",
        long: "memory",
        usage: "memory ADDR VAL",
        help: "Store VAL at ADDR",
        list_after: true,
        handler: Debugger::cmd_memory,
    },
    Command {
        short: "di",
        long: "disasm",
        usage: "disasm [ADDR]",
        help: "Disassemble 16 instructions from ADDR",
        list_after: false,
        handler: Debugger::cmd_disasm,
    },
    Command {
        short: "h",
        long: "help",
        usage: "help",
        help: "Show this list",
        list_after: false,
        handler: Debugger::cmd_help,
    },
    Command {
        short: "q",
        long: "quit",
        usage: "quit",
        help: "Exit the simulator",
        list_after: false,
        handler: Debugger::cmd_quit,
    },
];

/// A command name matches its exact short form first, then as a prefix of a
/// long form, earliest table entry winning.
fn resolve(name: &str) -> Option<&'static Command> {
    COMMANDS
        .iter()
        .find(|c| c.short == name)
        .or_else(|| COMMANDS.iter().find(|c| c.long.starts_with(name)))
}

pub struct Debugger {
    pub machine: Machine,
    pub breakpoints: Vec<u16>,
    pub console: Box<dyn Console>,
    last_input: String,
}

impl Debugger {
    pub fn new(console: Box<dyn Console>) -> Self {
        Debugger {
            machine: Machine::new(),
            breakpoints: Vec::new(),
            console,
            last_input: String::new(),
        }
    }

    /// Blocking command loop until quit, end of input, or a fatal error.
    pub fn run_repl(&mut self) -> Result<(), VmError> {
        loop {
            print!("comet2> ");
            io::stdout().flush()?;
            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line)? == 0 {
                return Ok(());
            }
            match self.execute_line(&line) {
                Flow::Stay => {}
                Flow::Quit => return Ok(()),
                Flow::Fatal(error) => return Err(error),
            }
        }
    }

    /// Dispatch one input line. Empty input repeats the previous command.
    pub fn execute_line(&mut self, input: &str) -> Flow {
        let trimmed = input.trim();
        let line = if trimmed.is_empty() {
            self.last_input.clone()
        } else {
            self.last_input = trimmed.to_string();
            trimmed.to_string()
        };
        if line.is_empty() {
            return Flow::Stay;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(command) = resolve(tokens[0]) else {
            println!("Undefined command: \"{}\". Try \"help\".", tokens[0]);
            return Flow::Stay;
        };

        let flow = (command.handler)(self, &tokens[1..]);
        if command.list_after && matches!(flow, Flow::Stay) {
            print!("{}", format_registers(&self.machine));
        }
        flow
    }

    pub fn load_file(&mut self, path: &str) -> bool {
        match object::read_file(path) {
            Ok(obj) => match self.machine.load(&obj) {
                Ok(()) => {
                    println!("Loaded {} words, start #{:04x}", obj.words.len(), obj.entry);
                    true
                }
                Err(error) => {
                    println!("{}", error);
                    false
                }
            },
            Err(error) => {
                println!("{}: {}", path, error);
                false
            }
        }
    }

    fn step_once(&mut self) -> Result<StepResult, VmError> {
        let Debugger {
            machine, console, ..
        } = self;
        machine.step(console.as_mut())
    }

    fn cmd_run(&mut self, _args: &[&str]) -> Flow {
        loop {
            match self.step_once() {
                Ok(StepResult::Exit) => return Flow::Quit,
                Ok(StepResult::Running) => {}
                Err(error) => return Flow::Fatal(error),
            }
            if self.breakpoints.contains(&self.machine.pr) {
                return Flow::Stay;
            }
        }
    }

    fn cmd_step(&mut self, args: &[&str]) -> Flow {
        let count = match args.first() {
            None => 1,
            Some(token) => match parse_number(token) {
                Some(n) => n as u32,
                None => {
                    println!("Invalid number \"{}\"", token);
                    return Flow::Stay;
                }
            },
        };
        for _ in 0..count {
            match self.step_once() {
                Ok(StepResult::Exit) => return Flow::Quit,
                Ok(StepResult::Running) => {}
                Err(error) => return Flow::Fatal(error),
            }
        }
        Flow::Stay
    }

    fn cmd_break(&mut self, args: &[&str]) -> Flow {
        match args.first().and_then(|t| parse_number(t)) {
            Some(address) => self.breakpoints.push(address),
            None => println!("Breakpoint needs an address"),
        }
        Flow::Stay
    }

    fn cmd_delete(&mut self, args: &[&str]) -> Flow {
        match args.first() {
            Some(token) => match parse_number(token) {
                Some(n) if n >= 1 && (n as usize) <= self.breakpoints.len() => {
                    self.breakpoints.remove(n as usize - 1);
                }
                _ => println!("No breakpoint {}", token),
            },
            None => {
                print!("Delete all breakpoints? (y or n) ");
                io::stdout().flush().ok();
                let mut answer = String::new();
                io::stdin().lock().read_line(&mut answer).ok();
                if answer.trim_start().starts_with('y') {
                    self.breakpoints.clear();
                }
            }
        }
        Flow::Stay
    }

    fn cmd_info(&mut self, _args: &[&str]) -> Flow {
        if self.breakpoints.is_empty() {
            println!("No breakpoints");
        } else {
            println!("Num  Address");
            for (index, address) in self.breakpoints.iter().enumerate() {
                println!("{:>3}  #{:04x}", index + 1, address);
            }
        }
        Flow::Stay
    }

    fn cmd_print(&mut self, _args: &[&str]) -> Flow {
        print!("{}", format_registers(&self.machine));
        Flow::Stay
    }

    fn cmd_dump(&mut self, args: &[&str]) -> Flow {
        let start = match args.first() {
            None => 0,
            Some(token) => match parse_number(token) {
                Some(address) => address,
                None => {
                    println!("Invalid number \"{}\"", token);
                    return Flow::Stay;
                }
            },
        };
        print!("{}", format_memory(&self.machine, start));
        Flow::Stay
    }

    fn cmd_stack(&mut self, _args: &[&str]) -> Flow {
        print!("{}", format_memory(&self.machine, self.machine.sp));
        Flow::Stay
    }

    fn cmd_file(&mut self, args: &[&str]) -> Flow {
        match args.first() {
            Some(path) => {
                self.load_file(path);
            }
            None => println!("file needs a path"),
        }
        Flow::Stay
    }

    fn cmd_jump(&mut self, args: &[&str]) -> Flow {
        match args.first().and_then(|t| parse_number(t)) {
            Some(address) => self.machine.pr = address,
            None => println!("jump needs an address"),
        }
        Flow::Stay
    }

    fn cmd_memory(&mut self, args: &[&str]) -> Flow {
        match (
            args.first().and_then(|t| parse_number(t)),
            args.get(1).and_then(|t| parse_number(t)),
        ) {
            (Some(address), Some(value)) => self.machine.write(address, value),
            _ => println!("memory needs an address and a value"),
        }
        Flow::Stay
    }

    fn cmd_disasm(&mut self, args: &[&str]) -> Flow {
        let mut address = match args.first() {
            None => self.machine.pr,
            Some(token) => match parse_number(token) {
                Some(address) => address,
                None => {
                    println!("Invalid number \"{}\"", token);
                    return Flow::Stay;
                }
            },
        };
        for _ in 0..16 {
            let d = decode::disassemble(&self.machine.memory, address);
            println!("#{:04x}\t{:<8} {}", address, d.mnemonic, d.operands);
            address = address.wrapping_add(d.size);
        }
        Flow::Stay
    }

    fn cmd_help(&mut self, _args: &[&str]) -> Flow {
        for command in COMMANDS {
            println!("{:<4}{:<16}{}", command.short, command.usage, command.help);
        }
        Flow::Stay
    }

    fn cmd_quit(&mut self, _args: &[&str]) -> Flow {
        Flow::Quit
    }
}

/// Accept `#hhhh` hex or signed decimal, masked to 16 bits.
pub fn parse_number(token: &str) -> Option<u16> {
    if let Some(hex) = token.strip_prefix('#') {
        return u32::from_str_radix(hex, 16).ok().map(|v| v as u16);
    }
    token.parse::<i32>().ok().map(|v| v as u16)
}

/// The register dump, field widths fixed:
///
/// ```text
/// PR  #hhhh [ MNEM     OPERANDS        ]
/// SP  #hhhh( ddddd)  FR  bbb  (ddddd)
/// GR0 #hhhh(ddddd)  ...
/// ```
pub fn format_registers(machine: &Machine) -> String {
    let d = decode::disassemble(&machine.memory, machine.pr);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "PR  #{:04x} [ {:<8} {:<15} ]",
        machine.pr, d.mnemonic, d.operands
    );
    let _ = writeln!(
        out,
        "SP  #{:04x}({:6})  FR  {:03b}  ({:5})",
        machine.sp,
        machine.sp,
        machine.fr.bits(),
        machine.fr.bits()
    );
    for row in 0..2 {
        let mut line = String::new();
        for col in 0..4 {
            let n = row * 4 + col;
            if col > 0 {
                line.push_str("  ");
            }
            let _ = write!(line, "GR{} #{:04x}({:5})", n, machine.gr[n], machine.gr[n]);
        }
        let _ = writeln!(out, "{}", line);
    }
    out
}

/// Sixteen rows of eight words with their low-byte ASCII rendering.
pub fn format_memory(machine: &Machine, start: u16) -> String {
    let mut out = String::new();
    for row in 0..16u16 {
        let base = start.wrapping_add(row * 8);
        let _ = write!(out, "#{:04x}:", base);
        let mut ascii = String::new();
        for col in 0..8u16 {
            let word = machine.read(base.wrapping_add(col));
            let _ = write!(out, " {:04x}", word);
            let byte = (word & 0xFF) as u8;
            ascii.push(if (0x20..=0x7F).contains(&byte) {
                byte as char
            } else {
                '.'
            });
        }
        let _ = writeln!(out, "  {}", ascii);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::console::MockConsole;

    fn debugger() -> Debugger {
        Debugger::new(Box::new(MockConsole::default()))
    }

    #[test]
    fn command_resolution_prefers_exact_short_forms() {
        assert_eq!(resolve("s").unwrap().long, "step");
        assert_eq!(resolve("st").unwrap().long, "stack");
        assert_eq!(resolve("ste").unwrap().long, "step");
        assert_eq!(resolve("sta").unwrap().long, "stack");
        assert_eq!(resolve("d").unwrap().long, "delete");
        assert_eq!(resolve("du").unwrap().long, "dump");
        assert_eq!(resolve("di").unwrap().long, "disasm");
        assert_eq!(resolve("r").unwrap().long, "run");
        assert_eq!(resolve("quit").unwrap().long, "quit");
        assert!(resolve("x").is_none());
    }

    #[test]
    fn number_parsing_masks_to_a_word() {
        assert_eq!(parse_number("#0010"), Some(0x10));
        assert_eq!(parse_number("#ffff"), Some(0xFFFF));
        assert_eq!(parse_number("255"), Some(255));
        assert_eq!(parse_number("-1"), Some(0xFFFF));
        assert_eq!(parse_number("65536"), Some(0));
        assert_eq!(parse_number("zz"), None);
    }

    #[test]
    fn register_dump_format_is_stable() {
        let mut d = debugger();
        d.machine.memory[0] = 0x8100;
        d.machine.gr[1] = 5;
        let dump = format_registers(&d.machine);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "PR  #0000 [ RET                      ]");
        assert_eq!(lines[1], "SP  #ff00( 65280)  FR  001  (    1)");
        assert_eq!(
            lines[2],
            "GR0 #0000(    0)  GR1 #0005(    5)  GR2 #0000(    0)  GR3 #0000(    0)"
        );
        assert_eq!(
            lines[3],
            "GR4 #0000(    0)  GR5 #0000(    0)  GR6 #0000(    0)  GR7 #0000(    0)"
        );
    }

    #[test]
    fn memory_dump_shows_ascii() {
        let mut d = debugger();
        d.machine.memory[0] = 0x0041; // 'A'
        d.machine.memory[1] = 0x0009; // control char
        let dump = format_memory(&d.machine, 0);
        let first = dump.lines().next().unwrap();
        assert_eq!(first, "#0000: 0041 0009 0000 0000 0000 0000 0000 0000  A.......");
        assert_eq!(dump.lines().count(), 16);
    }

    #[test]
    fn breakpoint_commands_mutate_the_list() {
        let mut d = debugger();
        assert!(matches!(d.execute_line("b #0010"), Flow::Stay));
        assert!(matches!(d.execute_line("break 32"), Flow::Stay));
        assert_eq!(d.breakpoints, vec![0x10, 32]);
        assert!(matches!(d.execute_line("d 1"), Flow::Stay));
        assert_eq!(d.breakpoints, vec![32]);
    }

    #[test]
    fn jump_and_memory_commands_mutate_the_machine() {
        let mut d = debugger();
        d.execute_line("j #0040");
        assert_eq!(d.machine.pr, 0x40);
        d.execute_line("m #0002 #1234");
        assert_eq!(d.machine.read(2), 0x1234);
    }

    #[test]
    fn run_stops_at_breakpoints() {
        let mut d = debugger();
        // NOP; NOP; RET
        d.machine.memory[0] = 0x0000;
        d.machine.memory[1] = 0x0000;
        d.machine.memory[2] = 0x8100;
        d.breakpoints.push(2);
        assert!(matches!(d.execute_line("r"), Flow::Stay));
        assert_eq!(d.machine.pr, 2);
        // Resuming runs the RET, which ends the session.
        assert!(matches!(d.execute_line("r"), Flow::Quit));
    }

    #[test]
    fn empty_input_repeats_the_last_command() {
        let mut d = debugger();
        d.machine.memory[0] = 0x0000;
        d.machine.memory[1] = 0x0000;
        d.machine.memory[2] = 0x8100;
        d.execute_line("s");
        assert_eq!(d.machine.pr, 1);
        d.execute_line("");
        assert_eq!(d.machine.pr, 2);
    }

    #[test]
    fn unknown_commands_do_not_change_state() {
        let mut d = debugger();
        assert!(matches!(d.execute_line("frobnicate"), Flow::Stay));
        assert_eq!(d.machine.pr, 0);
    }
}
