//! Host/guest interop: hand-assemble three instructions into a custom
//! arena layout and override syscall 93 with a host-side handler instead of
//! installing the Linux syscall table.
//!
//! Adapted from `examples/custom_syscall.cpp`'s
//! `machine.install_syscall_handler` pattern.

use loongarch_emu::cpu::registers::{REG_A0, REG_A7, REG_SP};
use loongarch_emu::decode::opcodes;
use loongarch_emu::machine::Machine;

const SYSCALL_EXIT: u64 = 93;

fn syscall_exit(machine: &mut Machine) -> i64 {
    let exit_code = machine.cpu.reg(REG_A0);
    println!("Guest program exited with code: {exit_code}");
    machine.cpu.stop();
    exit_code as i64
}

fn encode_ori(rd: u8, rj: u8, imm12: u16) -> u32 {
    (opcodes::ORI << 22) | ((imm12 as u32 & 0xfff) << 10) | ((rj as u32) << 5) | rd as u32
}

fn encode_syscall() -> u32 {
    opcodes::SYSCALL << 15
}

fn main() {
    println!("LoongArch64 emulator — custom syscall example");
    println!("===============================================\n");

    let mut machine = Machine::new_bare(16 << 20, 0x10000, 0x20000);
    machine.cpu.set_reg(REG_SP, 0x80_0000);

    // ori $a0, $zero, 8 ; ori $a7, $zero, 93 ; syscall
    let instructions = [
        encode_ori(REG_A0, 0, 8),
        encode_ori(REG_A7, 0, SYSCALL_EXIT as u16),
        encode_syscall(),
    ];
    // Must land inside the arena's executable sub-range — [rodata_end,
    // data_start) — or `simulate` would fault before fetching a segment.
    let code_addr = 0x10000u64;
    for (i, instr) in instructions.iter().enumerate() {
        machine
            .arena
            .memcpy_in_unchecked(code_addr + (i as u64) * 4, &instr.to_le_bytes())
            .unwrap();
    }

    machine.install_syscall_handler(SYSCALL_EXIT, syscall_exit);

    println!("Custom syscalls installed:");
    println!("  syscall {SYSCALL_EXIT}: exit(code)\n");

    machine.cpu.set_pc(code_addr);
    machine.simulate(1_000).unwrap();
}
