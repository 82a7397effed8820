//! Instruction decode: bit-fields → a dispatchable [`DecodedInstruction`].
//!
//! `DecodedInstruction` pairs a handler function pointer with a printer
//! function pointer, grounded on the teacher's `platform.rs::Instr<E>`
//! (`{ executer: fn(&mut E, u32) -> Result<(), Exception>, printer: fn(u32)
//! -> String }`). The handler signature here drops the `Result` in favor of
//! the stashed-fault pattern (spec.md §7/§9, strategy (b)): handlers call
//! `cpu.raise(...)` instead of returning `Err`, so the fast-path dispatcher
//! never has to unwind a `Result` out of a function-pointer call.
//!
//! Unknown opcodes decode to [`Handler::Fallback`], a tagged variant rather
//! than a function that dispatches internally (spec.md §9's "Fallback
//! handler pattern" redesign note) — the segment builder can count
//! fallbacks for `--stats` without calling into the handler.

pub mod branch;
pub mod fields;
pub mod fp;
pub mod integer;
pub mod memory;
pub mod opcodes;
pub mod syscall_instr;
pub mod vector;

use crate::arena::Arena;
use crate::cpu::Cpu;

pub type HandlerFn = fn(&mut Cpu, &mut Arena, u32);
pub type PrinterFn = fn(u32) -> String;

#[derive(Clone, Copy)]
pub enum Handler {
    Native(HandlerFn),
    Fallback,
}

/// One decoded instruction slot (spec.md §4.5).
///
/// `block_bytes` starts at 0; the segment builder's reachability pass fills
/// it in with the byte distance to the next divergent instruction or
/// reachable branch target (spec.md §9, open question 2). `control_flow`
/// marks branches/jumps/syscalls/breaks: instructions that never fall
/// through to straight-line execution, so the reachability pass always
/// leaves them at `block_bytes = 0`.
#[derive(Clone)]
pub struct DecodedInstruction {
    pub handler: Handler,
    pub printer: PrinterFn,
    pub raw: u32,
    pub block_bytes: u32,
    pub control_flow: bool,
}

impl DecodedInstruction {
    fn native(handler: HandlerFn, printer: PrinterFn, raw: u32) -> Self {
        Self {
            handler: Handler::Native(handler),
            printer,
            raw,
            block_bytes: 0,
            control_flow: false,
        }
    }

    fn control_flow(handler: HandlerFn, printer: PrinterFn, raw: u32) -> Self {
        Self {
            control_flow: true,
            ..Self::native(handler, printer, raw)
        }
    }

    fn fallback(raw: u32) -> Self {
        Self {
            handler: Handler::Fallback,
            printer: fallback_printer,
            raw,
            block_bytes: 0,
            control_flow: true,
        }
    }
}

fn fallback_printer(instr: u32) -> String {
    format!("unknown({instr:#010x})")
}

use opcodes::*;

/// Top-level decode: dispatch by format, then by opcode value within that
/// format (spec.md §4.3 — "Dispatch is by the LoongArch opcode field
/// (high-order bits), with table-driven sub-dispatch").
pub fn decode(instr: u32) -> DecodedInstruction {
    let prefix = vector_prefix(instr);
    if prefix == LSX_PREFIX || prefix == LASX_PREFIX {
        if let Some(d) = vector::decode(instr) {
            return d;
        }
    }

    let op17 = op3r(instr);
    if let Some(d) = integer::decode_3r(instr, op17) {
        return d;
    }
    if let Some(d) = fp::decode_3r(instr, op17) {
        return d;
    }
    if op17 == SYSCALL || op17 == BREAK {
        return syscall_instr::decode(instr, op17);
    }

    let op10 = op2r(instr);
    if let Some(d) = integer::decode_2r(instr, op10) {
        return d;
    }
    if let Some(d) = fp::decode_2r(instr, op10) {
        return d;
    }

    // Shift-by-immediate formats overlap the 3R opcode field's high bits;
    // check them before the generic 2RI12 group.
    if let Some(d) = integer::decode_shift_imm(instr) {
        return d;
    }

    let op10b = op2ri12(instr);
    if let Some(d) = integer::decode_2ri12(instr, op10b) {
        return d;
    }
    if let Some(d) = memory::decode(instr, op10b) {
        return d;
    }

    let op7 = op1ri20(instr);
    if let Some(d) = integer::decode_1ri20(instr, op7) {
        return d;
    }

    let cmp = op_fcmp(instr);
    if cmp == FCMP_COND_S || cmp == FCMP_COND_D {
        return fp::decode_fcmp(instr, cmp);
    }
    if cmp == FSEL {
        return fp::decode_fsel(instr);
    }

    let maj = major6(instr);
    if let Some(d) = branch::decode(instr, maj) {
        return d;
    }

    DecodedInstruction::fallback(instr)
}
