use thiserror::Error;

/// Assembler diagnostics. Every variant renders as `file:line: message` and
/// the driver stops at the first one.
#[derive(Error, Debug, PartialEq)]
pub enum AsmError {
    #[error("{file}:{line}: {reason}")]
    Lexical {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("{file}:{line}: {reason}")]
    Semantic {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("{file}:{line}: {reason}")]
    Symbol {
        file: String,
        line: usize,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("Not a CASL object file")]
    BadMagic,

    #[error("Truncated object file")]
    Truncated,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum VmError {
    #[error("Illegal instruction {mnemonic} at #{pc:04x}")]
    IllegalInstruction { mnemonic: String, pc: u16 },

    #[error("Out of memory")]
    OutOfMemory,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
