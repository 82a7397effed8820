//! Branch and jump handlers.
//!
//! All branch/jump targets are PC-relative and pre-scaled by 4 (LoongArch
//! instructions are always 4-byte aligned); `Cpu::jump` applies the
//! alignment mask again defensively (spec.md §3).

use super::fields::{rd, rj, sign_extend, si16, si26};
use super::opcodes::*;
use super::{DecodedInstruction, HandlerFn, PrinterFn};
use crate::arena::Arena;
use crate::cpu::Cpu;

fn extract(instr: u32, end: u32, start: u32) -> u32 {
    ((1u32 << (end - start + 1)) - 1) & (instr >> start)
}

/// `beqz`/`bnez`'s split 21-bit offset: low 16 bits in [25:10], high 5 bits
/// in [4:0].
fn offset21(instr: u32) -> i64 {
    let low16 = extract(instr, 25, 10);
    let high5 = extract(instr, 4, 0);
    let combined = (high5 << 16) | low16;
    sign_extend(combined, 21) << 2
}

fn h_beqz(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    if cpu.reg(rj(instr)) == 0 {
        let target = (cpu.pc() as i64).wrapping_add(offset21(instr)) as u64;
        cpu.jump(target);
    } else {
        cpu.jump(cpu.pc() + 4);
    }
}

fn h_bnez(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    if cpu.reg(rj(instr)) != 0 {
        let target = (cpu.pc() as i64).wrapping_add(offset21(instr)) as u64;
        cpu.jump(target);
    } else {
        cpu.jump(cpu.pc() + 4);
    }
}

macro_rules! cond_branch {
    ($name:ident, $cond:expr) => {
        fn $name(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
            let a = cpu.reg(rj(instr));
            let b = cpu.reg(rd(instr));
            if $cond(a, b) {
                let target = (cpu.pc() as i64).wrapping_add(si16(instr) << 2) as u64;
                cpu.jump(target);
            } else {
                cpu.jump(cpu.pc() + 4);
            }
        }
    };
}

cond_branch!(h_beq, |a: u64, b: u64| a == b);
cond_branch!(h_bne, |a: u64, b: u64| a != b);
cond_branch!(h_blt, |a: u64, b: u64| (a as i64) < (b as i64));
cond_branch!(h_bge, |a: u64, b: u64| (a as i64) >= (b as i64));
cond_branch!(h_bltu, |a: u64, b: u64| a < b);
cond_branch!(h_bgeu, |a: u64, b: u64| a >= b);

fn h_b(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let target = (cpu.pc() as i64).wrapping_add(si26(instr) << 2) as u64;
    cpu.jump(target);
}

fn h_bl(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let ret = cpu.pc() + 4;
    let target = (cpu.pc() as i64).wrapping_add(si26(instr) << 2) as u64;
    cpu.set_reg(1, ret); // r1 = ra
    cpu.jump(target);
}

fn h_jirl(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let ret = cpu.pc() + 4;
    let base = cpu.reg(rj(instr));
    let target = (base as i64).wrapping_add(si16(instr) << 2) as u64;
    cpu.set_reg(rd(instr), ret);
    cpu.jump(target);
}

fn p_beqz(instr: u32) -> String {
    format!("beqz r{}, {}", rj(instr), offset21(instr))
}
fn p_bnez(instr: u32) -> String {
    format!("bnez r{}, {}", rj(instr), offset21(instr))
}
fn p_beq(instr: u32) -> String {
    format!("beq r{}, r{}, {}", rj(instr), rd(instr), si16(instr) << 2)
}
fn p_bne(instr: u32) -> String {
    format!("bne r{}, r{}, {}", rj(instr), rd(instr), si16(instr) << 2)
}
fn p_blt(instr: u32) -> String {
    format!("blt r{}, r{}, {}", rj(instr), rd(instr), si16(instr) << 2)
}
fn p_bge(instr: u32) -> String {
    format!("bge r{}, r{}, {}", rj(instr), rd(instr), si16(instr) << 2)
}
fn p_bltu(instr: u32) -> String {
    format!("bltu r{}, r{}, {}", rj(instr), rd(instr), si16(instr) << 2)
}
fn p_bgeu(instr: u32) -> String {
    format!("bgeu r{}, r{}, {}", rj(instr), rd(instr), si16(instr) << 2)
}
fn p_b(instr: u32) -> String {
    format!("b {}", si26(instr) << 2)
}
fn p_bl(instr: u32) -> String {
    format!("bl {}", si26(instr) << 2)
}
fn p_jirl(instr: u32) -> String {
    format!(
        "jirl r{}, r{}, {}",
        rd(instr),
        rj(instr),
        si16(instr) << 2
    )
}

/// The static PC-relative byte offset of a branch/jump, when one exists
/// (every form except `jirl`, whose target depends on a register value at
/// run time). Used by the segment builder's reachability pass to find
/// in-segment branch targets that must start a new block (spec.md §9, open
/// question 2).
pub fn static_offset(instr: u32, maj: u32) -> Option<i64> {
    match maj {
        BEQZ | BNEZ => Some(offset21(instr)),
        BEQ | BNE | BLT | BGE | BLTU | BGEU => Some(si16(instr) << 2),
        B | BL => Some(si26(instr) << 2),
        _ => None,
    }
}

pub fn decode(instr: u32, maj: u32) -> Option<DecodedInstruction> {
    let pair: (HandlerFn, PrinterFn) = match maj {
        BEQZ => (h_beqz, p_beqz),
        BNEZ => (h_bnez, p_bnez),
        BEQ => (h_beq, p_beq),
        BNE => (h_bne, p_bne),
        BLT => (h_blt, p_blt),
        BGE => (h_bge, p_bge),
        BLTU => (h_bltu, p_bltu),
        BGEU => (h_bgeu, p_bgeu),
        B => (h_b, p_b),
        BL => (h_bl, p_bl),
        JIRL => (h_jirl, p_jirl),
        _ => return None,
    };
    Some(DecodedInstruction::control_flow(pair.0, pair.1, instr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beqz_taken_jumps_to_offset() {
        let mut cpu = Cpu::default();
        cpu.set_pc(0x1000);
        // offset21 = 16: low16 field = 4 (4*4=16), high5 = 0
        let instr = (BEQZ << 26) | (4u32 << 10) | (5 << 5);
        h_beqz(&mut cpu, &mut Arena::new(16), instr);
        assert_eq!(cpu.pc(), 0x1010);
    }

    #[test]
    fn beqz_not_taken_falls_through() {
        let mut cpu = Cpu::default();
        cpu.set_pc(0x1000);
        cpu.set_reg(5, 1);
        let instr = (BEQZ << 26) | (4u32 << 10) | (5 << 5);
        h_beqz(&mut cpu, &mut Arena::new(16), instr);
        assert_eq!(cpu.pc(), 0x1004);
    }

    #[test]
    fn jirl_sets_return_address_and_jumps() {
        let mut cpu = Cpu::default();
        cpu.set_pc(0x2000);
        cpu.set_reg(5, 0x4000);
        let instr = (JIRL << 26) | (0u32 << 10) | (5 << 5) | 1;
        h_jirl(&mut cpu, &mut Arena::new(16), instr);
        assert_eq!(cpu.reg(1), 0x2004);
        assert_eq!(cpu.pc(), 0x4000);
    }

    #[test]
    fn bl_links_ra_and_jumps_pc_relative() {
        let mut cpu = Cpu::default();
        cpu.set_pc(0x1000);
        // si26 encoding for +8: low16=2, high10=0
        let instr = (BL << 26) | (2u32 << 10);
        h_bl(&mut cpu, &mut Arena::new(16), instr);
        assert_eq!(cpu.reg(1), 0x1004);
        assert_eq!(cpu.pc(), 0x1008);
    }
}
