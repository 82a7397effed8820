//! `syscall`/`break` decode.
//!
//! These instructions never fall through: `syscall` hands control to
//! [`crate::syscalls`] via the machine-level dispatch loop (the handler
//! itself only raises a sentinel the interpreter recognizes — actual
//! syscall dispatch needs the `Machine`'s syscall table, which a bare
//! `fn(&mut Cpu, &mut Arena, u32)` handler cannot reach), and `break` always
//! faults.

use super::fields::rd;
use super::{DecodedInstruction, HandlerFn, PrinterFn};
use crate::arena::Arena;
use crate::cpu::Cpu;
use crate::error::MachineException;

/// Sentinel data value the interpreter's dispatch loop checks for on a
/// `SystemCallFailed`-kind fault to distinguish "this is a syscall trap,
/// dispatch it" from a genuine failed syscall raised by a handler.
pub const SYSCALL_TRAP_DATA: u64 = u64::MAX;

fn h_syscall(cpu: &mut Cpu, _arena: &mut Arena, _instr: u32) {
    cpu.raise(MachineException::new(
        crate::error::ErrorKind::SystemCallFailed,
        SYSCALL_TRAP_DATA,
    ));
}

fn h_break(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    cpu.raise(MachineException::illegal_operation(instr));
}

fn p_syscall(instr: u32) -> String {
    format!("syscall {:#x}", rd(instr))
}

fn p_break(instr: u32) -> String {
    format!("break {:#x}", rd(instr))
}

pub fn decode(instr: u32, op: u32) -> DecodedInstruction {
    let pair: (HandlerFn, PrinterFn) = if op == super::opcodes::SYSCALL {
        (h_syscall, p_syscall)
    } else {
        (h_break, p_break)
    };
    DecodedInstruction::control_flow(pair.0, pair.1, instr)
}
