//! LSX (128-bit) / LASX (256-bit) vector handlers.
//!
//! Both widths share the same sub-opcode table; the prefix
//! (`LSX_PREFIX`/`LASX_PREFIX`) selects the lane count each handler
//! processes, matching `tr_api.cpp`'s single `lasx_reg` union used for both
//! `vr` (LSX) and `xr` (LASX) register views (spec.md §3/§4.4).

use super::fields::{rd, rj, rk, si12};
use super::opcodes::*;
use super::{DecodedInstruction, HandlerFn, PrinterFn};
use crate::arena::Arena;
use crate::cpu::Cpu;

/// Number of 64-bit lanes covered: 2 for LSX, 4 for LASX.
fn lane_count(prefix: u32) -> usize {
    if prefix == LASX_PREFIX {
        4
    } else {
        2
    }
}

/// Zero the destination's upper 128 bits after an LSX (128-bit) op, so the
/// 256-bit register doesn't keep stale aliasing state from a prior LASX
/// write (spec.md §3).
fn clear_lsx_upper(cpu: &mut Cpu, prefix: u32, rd: u8) {
    if prefix != LASX_PREFIX {
        cpu.vector.get_mut(rd).clear_upper(16);
    }
}

macro_rules! v_int_op {
    ($name:ident, $lane_ty:ty, $get:ident, $set:ident, $op:expr) => {
        fn $name(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
            let prefix = vector_prefix(instr);
            let n = lane_count(prefix) * (8 / std::mem::size_of::<$lane_ty>());
            for i in 0..n {
                let a = cpu.vector.get(rj(instr)).$get(i);
                let b = cpu.vector.get(rk(instr)).$get(i);
                let r = $op(a, b);
                cpu.vector.get_mut(rd(instr)).$set(i, r);
            }
            clear_lsx_upper(cpu, prefix, rd(instr));
        }
    };
}

v_int_op!(h_v_add_b, u8, lane_u8, set_lane_u8, |a: u8, b: u8| a.wrapping_add(b));
v_int_op!(h_v_add_h, u16, lane_u16, set_lane_u16, |a: u16, b: u16| a.wrapping_add(b));
v_int_op!(h_v_add_w, u32, lane_u32, set_lane_u32, |a: u32, b: u32| a.wrapping_add(b));
v_int_op!(h_v_add_d, u64, lane_u64, set_lane_u64, |a: u64, b: u64| a.wrapping_add(b));

fn h_v_fadd_s(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let prefix = vector_prefix(instr);
    let n = lane_count(prefix) * 2;
    for i in 0..n {
        let a = cpu.vector.get(rj(instr)).lane_f32(i);
        let b = cpu.vector.get(rk(instr)).lane_f32(i);
        cpu.vector.get_mut(rd(instr)).set_lane_f32(i, a + b);
    }
    clear_lsx_upper(cpu, prefix, rd(instr));
}

fn h_v_fadd_d(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let prefix = vector_prefix(instr);
    let n = lane_count(prefix);
    for i in 0..n {
        let a = cpu.vector.get(rj(instr)).lane_f64(i);
        let b = cpu.vector.get(rk(instr)).lane_f64(i);
        cpu.vector.get_mut(rd(instr)).set_lane_f64(i, a + b);
    }
    clear_lsx_upper(cpu, prefix, rd(instr));
}

/// `xvilvl.d`: interleave the low halves of two vectors' doubleword lanes.
fn h_v_ilvl_d(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let src_j = *cpu.vector.get(rj(instr));
    let src_k = *cpu.vector.get(rk(instr));
    let dst = cpu.vector.get_mut(rd(instr));
    dst.set_lane_u64(0, src_k.lane_u64(0));
    dst.set_lane_u64(1, src_j.lane_u64(0));
    if vector_prefix(instr) == LASX_PREFIX {
        dst.set_lane_u64(2, src_k.lane_u64(2));
        dst.set_lane_u64(3, src_j.lane_u64(2));
    } else {
        dst.clear_upper(16);
    }
}

/// `xvpermi.q`: permute 128-bit halves between `vj`/`vk` per an 8-bit
/// immediate (carried in the `si12` field's low byte here).
fn h_v_permi_q(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let imm = si12(instr) as u8;
    let src_j = *cpu.vector.get(rj(instr));
    let src_k = *cpu.vector.get(rk(instr));
    let dst = cpu.vector.get_mut(rd(instr));
    let low_from_k = imm & 0b1 == 0;
    let high_from_k = (imm >> 4) & 0b1 == 0;
    let low = if low_from_k {
        [src_k.lane_u64(0), src_k.lane_u64(1)]
    } else {
        [src_j.lane_u64(0), src_j.lane_u64(1)]
    };
    let high = if high_from_k {
        [src_k.lane_u64(0), src_k.lane_u64(1)]
    } else {
        [src_j.lane_u64(0), src_j.lane_u64(1)]
    };
    dst.set_lane_u64(0, low[0]);
    dst.set_lane_u64(1, low[1]);
    dst.set_lane_u64(2, high[0]);
    dst.set_lane_u64(3, high[1]);
}

/// `xvori.b`: bitwise-OR every byte lane with an 8-bit immediate.
fn h_v_ori_b(cpu: &mut Cpu, _arena: &mut Arena, instr: u32) {
    let imm = si12(instr) as u8;
    let prefix = vector_prefix(instr);
    let n = lane_count(prefix) * 8;
    for i in 0..n {
        let a = cpu.vector.get(rj(instr)).lane_u8(i);
        cpu.vector.get_mut(rd(instr)).set_lane_u8(i, a | imm);
    }
    clear_lsx_upper(cpu, prefix, rd(instr));
}

fn h_v_ld(cpu: &mut Cpu, arena: &mut Arena, instr: u32) {
    let width = if vector_prefix(instr) == LASX_PREFIX {
        32
    } else {
        16
    };
    let addr = (cpu.reg(rj(instr)) as i64).wrapping_add(si12(instr)) as u64;
    match arena.array_view::<u8>(addr, width) {
        Ok(slice) => {
            let mut bytes = [0u8; 32];
            bytes[..width as usize].copy_from_slice(slice);
            *cpu.vector.get_mut(rd(instr)) = crate::cpu::registers::VectorReg::from_bytes(bytes);
        }
        Err(e) => cpu.raise(e),
    }
}

fn h_v_st(cpu: &mut Cpu, arena: &mut Arena, instr: u32) {
    let width = if vector_prefix(instr) == LASX_PREFIX {
        32
    } else {
        16
    };
    let addr = (cpu.reg(rj(instr)) as i64).wrapping_add(si12(instr)) as u64;
    let bytes = *cpu.vector.get(rd(instr)).bytes();
    if let Err(e) = arena.memcpy_in(addr, &bytes[..width as usize]) {
        cpu.raise(e);
    }
}

fn p_prefix(instr: u32) -> &'static str {
    if vector_prefix(instr) == LASX_PREFIX {
        "xv"
    } else {
        "v"
    }
}

fn p_v_add_b(i: u32) -> String {
    format!("{}add.b v{}, v{}, v{}", p_prefix(i), rd(i), rj(i), rk(i))
}
fn p_v_add_h(i: u32) -> String {
    format!("{}add.h v{}, v{}, v{}", p_prefix(i), rd(i), rj(i), rk(i))
}
fn p_v_add_w(i: u32) -> String {
    format!("{}add.w v{}, v{}, v{}", p_prefix(i), rd(i), rj(i), rk(i))
}
fn p_v_add_d(i: u32) -> String {
    format!("{}add.d v{}, v{}, v{}", p_prefix(i), rd(i), rj(i), rk(i))
}
fn p_v_fadd_s(i: u32) -> String {
    format!("{}fadd.s v{}, v{}, v{}", p_prefix(i), rd(i), rj(i), rk(i))
}
fn p_v_fadd_d(i: u32) -> String {
    format!("{}fadd.d v{}, v{}, v{}", p_prefix(i), rd(i), rj(i), rk(i))
}
fn p_v_ilvl_d(i: u32) -> String {
    format!("{}ilvl.d v{}, v{}, v{}", p_prefix(i), rd(i), rj(i), rk(i))
}
fn p_v_permi_q(i: u32) -> String {
    format!("{}permi.q v{}, v{}, {}", p_prefix(i), rd(i), rj(i), si12(i))
}
fn p_v_ori_b(i: u32) -> String {
    format!("{}ori.b v{}, v{}, {}", p_prefix(i), rd(i), rj(i), si12(i))
}
fn p_v_ld(i: u32) -> String {
    format!("{}ld v{}, {}(r{})", p_prefix(i), rd(i), si12(i), rj(i))
}
fn p_v_st(i: u32) -> String {
    format!("{}st v{}, {}(r{})", p_prefix(i), rd(i), si12(i), rj(i))
}

pub fn decode(instr: u32) -> Option<DecodedInstruction> {
    let sub = vector_subop(instr);
    let pair: (HandlerFn, PrinterFn) = match sub {
        V_ADD_B => (h_v_add_b, p_v_add_b),
        V_ADD_H => (h_v_add_h, p_v_add_h),
        V_ADD_W => (h_v_add_w, p_v_add_w),
        V_ADD_D => (h_v_add_d, p_v_add_d),
        V_FADD_S => (h_v_fadd_s, p_v_fadd_s),
        V_FADD_D => (h_v_fadd_d, p_v_fadd_d),
        V_ILVL_D => (h_v_ilvl_d, p_v_ilvl_d),
        V_PERMI_Q => (h_v_permi_q, p_v_permi_q),
        V_ORI_B => (h_v_ori_b, p_v_ori_b),
        V_LD => (h_v_ld, p_v_ld),
        V_ST => (h_v_st, p_v_st),
        _ => return None,
    };
    Some(DecodedInstruction::native(pair.0, pair.1, instr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_instr(prefix: u32, sub: u32, rd_: u8, rj_: u8, rk_: u8) -> u32 {
        (prefix << 24) | (sub << 15) | ((rk_ as u32) << 10) | ((rj_ as u32) << 5) | rd_ as u32
    }

    #[test]
    fn lasx_fadd_d_doubles_four_lanes() {
        let mut cpu = Cpu::default();
        for i in 0..4 {
            cpu.vector.get_mut(5).set_lane_f64(i, (i + 1) as f64);
            cpu.vector.get_mut(5).set_lane_f64(i, (i + 1) as f64);
        }
        let instr = vec_instr(LASX_PREFIX, V_FADD_D, 4, 5, 5);
        h_v_fadd_d(&mut cpu, &mut Arena::new(16), instr);
        for i in 0..4 {
            assert_eq!(cpu.vector.get(4).lane_f64(i), 2.0 * (i + 1) as f64);
        }
    }

    #[test]
    fn lsx_add_w_only_touches_two_lanes() {
        let mut cpu = Cpu::default();
        cpu.vector.get_mut(5).set_lane_u32(0, 10);
        cpu.vector.get_mut(5).set_lane_u32(1, 20);
        cpu.vector.get_mut(6).set_lane_u32(0, 1);
        cpu.vector.get_mut(6).set_lane_u32(1, 1);
        let instr = vec_instr(LSX_PREFIX, V_ADD_W, 4, 5, 6);
        h_v_add_w(&mut cpu, &mut Arena::new(16), instr);
        assert_eq!(cpu.vector.get(4).lane_u32(0), 11);
        assert_eq!(cpu.vector.get(4).lane_u32(1), 21);
        assert_eq!(cpu.vector.get(4).bytes()[16..], [0u8; 16]);
    }

    #[test]
    fn lsx_op_clears_stale_upper_bits_left_by_a_prior_lasx_write() {
        let mut cpu = Cpu::default();
        cpu.vector.get_mut(4).bytes_mut().fill(0xff);
        cpu.vector.get_mut(5).set_lane_u32(0, 1);
        cpu.vector.get_mut(6).set_lane_u32(0, 1);
        let instr = vec_instr(LSX_PREFIX, V_ADD_W, 4, 5, 6);
        h_v_add_w(&mut cpu, &mut Arena::new(16), instr);
        assert_eq!(cpu.vector.get(4).bytes()[16..], [0u8; 16]);
    }
}
