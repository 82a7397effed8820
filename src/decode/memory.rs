//! Load/store handlers.
//!
//! Faults raised by the arena (out-of-bounds, write-into-read-only, etc.)
//! propagate through `Cpu::raise` rather than a `Result` return, matching
//! the stashed-fault convention the rest of the decode handlers use
//! (spec.md §7/§9).

use super::fields::{rd, rj, si12};
use super::opcodes::*;
use super::{DecodedInstruction, HandlerFn, PrinterFn};
use crate::arena::Arena;
use crate::cpu::Cpu;

fn addr(cpu: &Cpu, instr: u32) -> u64 {
    (cpu.reg(rj(instr)) as i64).wrapping_add(si12(instr)) as u64
}

macro_rules! load {
    ($name:ident, $ty:ty, $ext:expr) => {
        fn $name(cpu: &mut Cpu, arena: &mut Arena, instr: u32) {
            let a = addr(cpu, instr);
            match arena.read::<$ty>(a) {
                Ok(v) => cpu.set_reg(rd(instr), $ext(v)),
                Err(e) => cpu.raise(e),
            }
        }
    };
}

load!(h_ld_b, i8, |v: i8| v as i64 as u64);
load!(h_ld_h, i16, |v: i16| v as i64 as u64);
load!(h_ld_w, i32, |v: i32| v as i64 as u64);
load!(h_ld_d, i64, |v: i64| v as u64);
load!(h_ld_bu, u8, |v: u8| v as u64);
load!(h_ld_hu, u16, |v: u16| v as u64);
load!(h_ld_wu, u32, |v: u32| v as u64);

macro_rules! store {
    ($name:ident, $ty:ty) => {
        fn $name(cpu: &mut Cpu, arena: &mut Arena, instr: u32) {
            let a = addr(cpu, instr);
            let v = cpu.reg(rd(instr)) as $ty;
            if let Err(e) = arena.write::<$ty>(a, v) {
                cpu.raise(e);
            }
        }
    };
}

store!(h_st_b, u8);
store!(h_st_h, u16);
store!(h_st_w, u32);
store!(h_st_d, u64);

macro_rules! mem_printer {
    ($fname:ident, $name:literal) => {
        fn $fname(instr: u32) -> String {
            format!("{} r{}, {}(r{})", $name, rd(instr), si12(instr), rj(instr))
        }
    };
}

mem_printer!(p_ld_b, "ld.b");
mem_printer!(p_ld_h, "ld.h");
mem_printer!(p_ld_w, "ld.w");
mem_printer!(p_ld_d, "ld.d");
mem_printer!(p_ld_bu, "ld.bu");
mem_printer!(p_ld_hu, "ld.hu");
mem_printer!(p_ld_wu, "ld.wu");
mem_printer!(p_st_b, "st.b");
mem_printer!(p_st_h, "st.h");
mem_printer!(p_st_w, "st.w");
mem_printer!(p_st_d, "st.d");

pub fn decode(instr: u32, op: u32) -> Option<DecodedInstruction> {
    let pair: (HandlerFn, PrinterFn) = match op {
        LD_B => (h_ld_b, p_ld_b),
        LD_H => (h_ld_h, p_ld_h),
        LD_W => (h_ld_w, p_ld_w),
        LD_D => (h_ld_d, p_ld_d),
        LD_BU => (h_ld_bu, p_ld_bu),
        LD_HU => (h_ld_hu, p_ld_hu),
        LD_WU => (h_ld_wu, p_ld_wu),
        ST_B => (h_st_b, p_st_b),
        ST_H => (h_st_h, p_st_h),
        ST_W => (h_st_w, p_st_w),
        ST_D => (h_st_d, p_st_d),
        _ => return None,
    };
    Some(DecodedInstruction::native(pair.0, pair.1, instr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load_doubleword_round_trips() {
        let mut cpu = Cpu::default();
        let mut arena = Arena::new(4096);
        cpu.set_reg(5, 0x100);
        cpu.set_reg(4, 0xdead_beef_cafe_babe);
        // st.d rd=4, 0(r5)
        let st = (ST_D << 22) | (0u32 << 10) | (5 << 5) | 4;
        h_st_d(&mut cpu, &mut arena, st);
        let ld = (LD_D << 22) | (0u32 << 10) | (5 << 5) | 6;
        h_ld_d(&mut cpu, &mut arena, ld);
        assert_eq!(cpu.reg(6), 0xdead_beef_cafe_babe);
    }

    #[test]
    fn ld_b_sign_extends_and_ld_bu_zero_extends() {
        let mut cpu = Cpu::default();
        let mut arena = Arena::new(4096);
        cpu.set_reg(5, 0x100);
        arena.write::<u8>(0x100, 0x80).unwrap();
        h_ld_b(&mut cpu, &mut arena, (LD_B << 22) | (5 << 5) | 4);
        assert_eq!(cpu.reg(4) as i64, -128);
        h_ld_bu(&mut cpu, &mut arena, (LD_BU << 22) | (5 << 5) | 6);
        assert_eq!(cpu.reg(6), 0x80);
    }

    #[test]
    fn out_of_bounds_load_raises_fault() {
        let mut cpu = Cpu::default();
        let mut arena = Arena::new(16);
        cpu.set_reg(5, 0x1000);
        h_ld_d(&mut cpu, &mut arena, (LD_D << 22) | (5 << 5) | 4);
        assert!(cpu.has_fault());
    }
}
