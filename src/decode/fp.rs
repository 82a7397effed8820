//! Floating-point arithmetic, compare, select, and conversion handlers.
//!
//! FP registers alias the low bits of the vector file (spec.md §3); scalar
//! FP ops read/write lane 0 of `VectorFile` via `as_f64`/`set_f64` etc.
//! Rounding is always to-nearest-even — Rust's native float semantics — per
//! the FCSR open question resolved at [`crate::cpu::registers::Fcsr`].

use super::fields::{fcond, ra, rd, rj, rk};
use super::opcodes::*;
use super::{DecodedInstruction, HandlerFn, PrinterFn};
use crate::arena::Arena;
use crate::cpu::Cpu;

fn fd(cpu: &Cpu, i: u8) -> f64 {
    cpu.vector.get(i).as_f64()
}
fn set_fd(cpu: &mut Cpu, i: u8, v: f64) {
    cpu.vector.get_mut(i).set_f64(v);
}
fn fs(cpu: &Cpu, i: u8) -> f32 {
    cpu.vector.get(i).as_f32()
}
fn set_fs(cpu: &mut Cpu, i: u8, v: f32) {
    cpu.vector.get_mut(i).set_f32(v);
}

macro_rules! fp3r_d {
    ($name:ident, $op:expr) => {
        fn $name(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
            let a = fd(cpu, rj(instr));
            let b = fd(cpu, rk(instr));
            set_fd(cpu, rd(instr), $op(a, b));
        }
    };
}
macro_rules! fp3r_s {
    ($name:ident, $op:expr) => {
        fn $name(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
            let a = fs(cpu, rj(instr));
            let b = fs(cpu, rk(instr));
            set_fs(cpu, rd(instr), $op(a, b));
        }
    };
}

fp3r_s!(h_fadd_s, |a: f32, b: f32| a + b);
fp3r_d!(h_fadd_d, |a: f64, b: f64| a + b);
fp3r_s!(h_fsub_s, |a: f32, b: f32| a - b);
fp3r_d!(h_fsub_d, |a: f64, b: f64| a - b);
fp3r_s!(h_fmul_s, |a: f32, b: f32| a * b);
fp3r_d!(h_fmul_d, |a: f64, b: f64| a * b);
fp3r_s!(h_fdiv_s, |a: f32, b: f32| a / b);
fp3r_d!(h_fdiv_d, |a: f64, b: f64| a / b);

fn p_fadd_s(i: u32) -> String {
    format!("fadd.s f{}, f{}, f{}", rd(i), rj(i), rk(i))
}
fn p_fadd_d(i: u32) -> String {
    format!("fadd.d f{}, f{}, f{}", rd(i), rj(i), rk(i))
}
fn p_fsub_s(i: u32) -> String {
    format!("fsub.s f{}, f{}, f{}", rd(i), rj(i), rk(i))
}
fn p_fsub_d(i: u32) -> String {
    format!("fsub.d f{}, f{}, f{}", rd(i), rj(i), rk(i))
}
fn p_fmul_s(i: u32) -> String {
    format!("fmul.s f{}, f{}, f{}", rd(i), rj(i), rk(i))
}
fn p_fmul_d(i: u32) -> String {
    format!("fmul.d f{}, f{}, f{}", rd(i), rj(i), rk(i))
}
fn p_fdiv_s(i: u32) -> String {
    format!("fdiv.s f{}, f{}, f{}", rd(i), rj(i), rk(i))
}
fn p_fdiv_d(i: u32) -> String {
    format!("fdiv.d f{}, f{}, f{}", rd(i), rj(i), rk(i))
}

pub fn decode_3r(instr: u32, op: u32) -> Option<DecodedInstruction> {
    let pair: (HandlerFn, PrinterFn) = match op {
        FADD_S => (h_fadd_s, p_fadd_s),
        FADD_D => (h_fadd_d, p_fadd_d),
        FSUB_S => (h_fsub_s, p_fsub_s),
        FSUB_D => (h_fsub_d, p_fsub_d),
        FMUL_S => (h_fmul_s, p_fmul_s),
        FMUL_D => (h_fmul_d, p_fmul_d),
        FDIV_S => (h_fdiv_s, p_fdiv_s),
        FDIV_D => (h_fdiv_d, p_fdiv_d),
        _ => return None,
    };
    Some(DecodedInstruction::native(pair.0, pair.1, instr))
}

fn h_fcvt_s_d(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let v = fd(cpu, rj(instr)) as f32;
    set_fs(cpu, rd(instr), v);
}
fn h_fcvt_d_s(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let v = fs(cpu, rj(instr)) as f64;
    set_fd(cpu, rd(instr), v);
}
fn h_ftintrz_w_s(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let v = fs(cpu, rj(instr)).trunc() as i32;
    cpu.vector.get_mut(rd(instr)).set_lane_u32(0, v as u32);
}
fn h_ftintrz_w_d(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let v = fd(cpu, rj(instr)).trunc() as i32;
    cpu.vector.get_mut(rd(instr)).set_lane_u32(0, v as u32);
}
fn h_ffint_s_w(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let v = cpu.vector.get(rj(instr)).lane_u32(0) as i32;
    set_fs(cpu, rd(instr), v as f32);
}
fn h_ffint_d_w(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let v = cpu.vector.get(rj(instr)).lane_u32(0) as i32;
    set_fd(cpu, rd(instr), v as f64);
}

fn p_fcvt_s_d(i: u32) -> String {
    format!("fcvt.s.d f{}, f{}", rd(i), rj(i))
}
fn p_fcvt_d_s(i: u32) -> String {
    format!("fcvt.d.s f{}, f{}", rd(i), rj(i))
}
fn p_ftintrz_w_s(i: u32) -> String {
    format!("ftintrz.w.s f{}, f{}", rd(i), rj(i))
}
fn p_ftintrz_w_d(i: u32) -> String {
    format!("ftintrz.w.d f{}, f{}", rd(i), rj(i))
}
fn p_ffint_s_w(i: u32) -> String {
    format!("ffint.s.w f{}, f{}", rd(i), rj(i))
}
fn p_ffint_d_w(i: u32) -> String {
    format!("ffint.d.w f{}, f{}", rd(i), rj(i))
}

pub fn decode_2r(instr: u32, op: u32) -> Option<DecodedInstruction> {
    let pair: (HandlerFn, PrinterFn) = match op {
        FCVT_S_D => (h_fcvt_s_d, p_fcvt_s_d),
        FCVT_D_S => (h_fcvt_d_s, p_fcvt_d_s),
        FTINTRZ_W_S => (h_ftintrz_w_s, p_ftintrz_w_s),
        FTINTRZ_W_D => (h_ftintrz_w_d, p_ftintrz_w_d),
        FFINT_S_W => (h_ffint_s_w, p_ffint_s_w),
        FFINT_D_W => (h_ffint_d_w, p_ffint_d_w),
        _ => return None,
    };
    Some(DecodedInstruction::native(pair.0, pair.1, instr))
}

/// `fcmp.cond.{s,d}` writes an FCC bit rather than a GPR (spec.md §4.3,
/// "comparisons writing FCC"). `cond` bit 2 selects unordered-is-true
/// (covers the common `cueq`/`ceq` pairing used by the NaN test scenario).
fn fcmp_result(cond: u8, a: f64, b: f64) -> bool {
    let unordered = a.is_nan() || b.is_nan();
    if unordered {
        return cond & 0b1000 != 0;
    }
    let eq = a == b;
    let lt = a < b;
    let mut result = false;
    if cond & 0b0001 != 0 {
        result |= eq;
    }
    if cond & 0b0010 != 0 {
        result |= lt;
    }
    if cond & 0b0100 != 0 {
        result |= a > b;
    }
    result
}

fn h_fcmp_cond_s(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let a = fs(cpu, rj(instr)) as f64;
    let b = fs(cpu, rk(instr)) as f64;
    let cc = super::fields::cc(instr);
    let r = fcmp_result(fcond(instr), a, b);
    cpu.fcc.set(cc, r);
}

fn h_fcmp_cond_d(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let a = fd(cpu, rj(instr));
    let b = fd(cpu, rk(instr));
    let cc = super::fields::cc(instr);
    let r = fcmp_result(fcond(instr), a, b);
    cpu.fcc.set(cc, r);
}

fn p_fcmp_cond_s(i: u32) -> String {
    format!(
        "fcmp.cond.s cc{}, f{}, f{}",
        super::fields::cc(i),
        rj(i),
        rk(i)
    )
}
fn p_fcmp_cond_d(i: u32) -> String {
    format!(
        "fcmp.cond.d cc{}, f{}, f{}",
        super::fields::cc(i),
        rj(i),
        rk(i)
    )
}

pub fn decode_fcmp(instr: u32, op: u32) -> DecodedInstruction {
    let (handler, printer): (HandlerFn, PrinterFn) = if op == FCMP_COND_S {
        (h_fcmp_cond_s, p_fcmp_cond_s)
    } else {
        (h_fcmp_cond_d, p_fcmp_cond_d)
    };
    DecodedInstruction::native(handler, printer, instr)
}

/// `fsel`: select `fj` or `fk` into `fd` based on an FCC bit encoded in the
/// `ra`/`ca` field (4R format).
fn h_fsel(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let ca = ra(instr) & 0b111;
    let chosen = if cpu.fcc.get(ca) {
        cpu.vector.get(rk(instr)).lane_u64(0)
    } else {
        cpu.vector.get(rj(instr)).lane_u64(0)
    };
    cpu.vector.get_mut(rd(instr)).set_lane_u64(0, chosen);
}

fn p_fsel(i: u32) -> String {
    format!(
        "fsel f{}, f{}, f{}, cc{}",
        rd(i),
        rj(i),
        rk(i),
        ra(i) & 0b111
    )
}

pub fn decode_fsel(instr: u32) -> DecodedInstruction {
    DecodedInstruction::native(h_fsel, p_fsel, instr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fcmp_ceq_sets_fcc_true_for_equal_operands() {
        let mut cpu = Cpu::default();
        cpu.vector.get_mut(5).set_f64(3.0);
        cpu.vector.get_mut(6).set_f64(3.0);
        // fcmp.ceq.d: cond bits = 0b0001, fj=5, fk=6, cc=0
        let instr = (FCMP_COND_D << 20) | (0b0001u32 << 15) | (6 << 10) | (5 << 5);
        h_fcmp_cond_d(&mut cpu, &mut Arena::new(16), instr);
        assert!(cpu.fcc.get(0));
    }

    #[test]
    fn fcmp_ceq_with_nan_sets_fcc_false() {
        let mut cpu = Cpu::default();
        cpu.vector.get_mut(5).set_f64(f64::NAN);
        cpu.vector.get_mut(6).set_f64(3.0);
        let instr = (FCMP_COND_D << 20) | (0b0001u32 << 15) | (6 << 10) | (5 << 5);
        h_fcmp_cond_d(&mut cpu, &mut Arena::new(16), instr);
        assert!(!cpu.fcc.get(0));
    }

    #[test]
    fn fadd_d_adds_low_lanes() {
        let mut cpu = Cpu::default();
        cpu.vector.get_mut(5).set_f64(1.5);
        cpu.vector.get_mut(6).set_f64(2.5);
        let instr = (FADD_D << 15) | (6 << 10) | (5 << 5) | 4;
        h_fadd_d(&mut cpu, &mut Arena::new(16), instr);
        assert_eq!(cpu.vector.get(4).as_f64(), 4.0);
    }
}
