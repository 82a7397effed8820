//! Seed scenario (spec.md §8): load four LASX (256-bit) registers out of a
//! 128-byte arena slab, double each lane with `xvfadd.d vX, vX, vX`, and
//! store the results back — verifying the whole vector path end to end
//! (decode, LASX lane arithmetic, memory load/store) rather than a single
//! handler in isolation.

mod support;

use loongarch_emu::decode::opcodes::LASX_PREFIX;
use loongarch_emu::machine::Machine;
use loongarch_emu::syscalls::linux;
use support::{encode_lu12i_w, encode_ori, encode_syscall, encode_vld, encode_vst, encode_xvfadd_d};

const REG_A0: u8 = 4;
const REG_A7: u8 = 11;
const T0: u8 = 12;
const T1: u8 = 13;
const T2: u8 = 14;
const T3: u8 = 15;

#[test]
fn lasx_fadd_d_doubles_sixteen_lanes_round_tripped_through_memory() {
    const CODE_BYTES: u64 = 0x1000;
    const SLAB: u64 = CODE_BYTES; // first byte of the read/write range

    let bases = [T0, T1, T2, T3];
    let v_regs = [10u8, 11, 12, 13];

    let mut code = Vec::new();
    // Each tN = SLAB + 32*k, built as lu12i.w (sets the 0x1000 page) + ori
    // for the small per-register offset.
    for (k, &reg) in bases.iter().enumerate() {
        code.push(encode_lu12i_w(reg, 1)); // reg = 0x1000
        code.push(encode_ori(reg, reg, (32 * k) as u16));
    }
    for (&reg, &v) in bases.iter().zip(v_regs.iter()) {
        code.push(encode_vld(LASX_PREFIX, v, reg, 0));
    }
    for &v in &v_regs {
        code.push(encode_xvfadd_d(v, v, v));
    }
    for (&reg, &v) in bases.iter().zip(v_regs.iter()) {
        code.push(encode_vst(LASX_PREFIX, v, reg, 0));
    }
    code.push(encode_ori(REG_A0, 0, 0));
    code.push(encode_ori(REG_A7, 0, linux::SYS_EXIT as u16));
    code.push(encode_syscall());

    let mut machine = Machine::new_bare(CODE_BYTES * 2, 0, CODE_BYTES);
    for (i, instr) in code.iter().enumerate() {
        machine
            .arena
            .memcpy_in_unchecked((i as u64) * 4, &instr.to_le_bytes())
            .unwrap();
    }

    let originals: Vec<f64> = (0..16).map(|i| (i + 1) as f64).collect();
    for (i, &value) in originals.iter().enumerate() {
        machine
            .arena
            .write::<f64>(SLAB + (i as u64) * 8, value)
            .unwrap();
    }

    machine.setup_linux_syscalls();
    machine.simulate(1000).unwrap();

    for (i, &original) in originals.iter().enumerate() {
        let doubled = machine.arena.read::<f64>(SLAB + (i as u64) * 8).unwrap();
        assert_eq!(doubled, original * 2.0);
    }
}
