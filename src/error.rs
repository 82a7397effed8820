//! Error types for the emulator core.
//!
//! Mirrors the teacher's convention of one `thiserror` enum per concern
//! (`riscvemu/src/hart/memory.rs`'s `ReadError`/`WriteError`,
//! `riscvemu/src/instr/decode.rs`'s `DecodeError`) rather than a single
//! catch-all error type.

use thiserror::Error;

/// The kind half of the `(kind, data)` pair spec.md §7 requires every
/// machine exception to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidElf,
    ProtectionFault,
    MisalignedInstruction,
    IllegalOperation,
    FeatureDisabled,
    SystemCallFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidElf => "INVALID_ELF",
            ErrorKind::ProtectionFault => "PROTECTION_FAULT",
            ErrorKind::MisalignedInstruction => "MISALIGNED_INSTRUCTION",
            ErrorKind::IllegalOperation => "ILLEGAL_OPERATION",
            ErrorKind::FeatureDisabled => "FEATURE_DISABLED",
            ErrorKind::SystemCallFailed => "SYSTEM_CALL_FAILED",
        }
    }
}

/// A structured fault raised by a handler, the loader, or a syscall.
///
/// Per spec.md §7/§9, the fast-path dispatcher never lets this unwind as a
/// panic: handlers stash it via `Cpu::raise` and return a sentinel, and the
/// dispatch loop turns it into this `Result` at the `simulate()` boundary.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{} (data=0x{data:x})", kind.as_str())]
pub struct MachineException {
    pub kind: ErrorKind,
    pub data: u64,
}

impl MachineException {
    pub fn new(kind: ErrorKind, data: u64) -> Self {
        Self { kind, data }
    }

    pub fn protection_fault(address: u64) -> Self {
        Self::new(ErrorKind::ProtectionFault, address)
    }

    pub fn illegal_operation(instruction_word: u32) -> Self {
        Self::new(ErrorKind::IllegalOperation, instruction_word as u64)
    }

    pub fn misaligned_instruction(pc: u64) -> Self {
        Self::new(ErrorKind::MisalignedInstruction, pc)
    }
}

#[derive(Debug, Error)]
pub enum ElfLoadError {
    #[error("not an ELF file: bad magic")]
    BadMagic,
    #[error("only 64-bit ELF class is supported (EI_CLASS=64); got {0}")]
    Not64Bit(u8),
    #[error("unsupported e_machine {0:#x}, expected LoongArch")]
    WrongMachine(u16),
    #[error("ELF appears dynamically linked (PT_INTERP present); only static binaries are supported")]
    DynamicallyLinked,
    #[error("malformed or truncated ELF: {0}")]
    Malformed(String),
    #[error("program header requests a segment that does not fit in the arena (need {needed} bytes, arena is {arena_size})")]
    SegmentTooLarge { needed: u64, arena_size: u64 },
}

impl From<elf::ParseError> for ElfLoadError {
    fn from(e: elf::ParseError) -> Self {
        ElfLoadError::Malformed(e.to_string())
    }
}
