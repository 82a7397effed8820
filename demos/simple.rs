//! Minimal end-to-end walkthrough: build a machine, inspect its initial
//! state, install the Linux syscall table, and poke at guest memory.
//!
//! Adapted from `examples/simple.cpp`'s tour of the same API surface.

use loongarch_emu::cpu::registers::REG_SP;
use loongarch_emu::machine::Machine;

fn main() {
    println!("LoongArch64 emulator — simple example");
    println!("======================================\n");

    // A real program would come from `std::fs::read("path/to/elf")`
    // followed by `Machine::new_from_elf`; here we just need an arena to
    // poke at, so build a bare one directly.
    let mut machine = Machine::new_bare(16 * 1024 * 1024, 0x1000, 0x2000);
    machine.cpu.set_reg(REG_SP, 0x80_0000);

    println!("Machine created successfully!");
    println!("Stack pointer: {:#x}\n", machine.cpu.reg(REG_SP));

    machine.setup_linux_syscalls();

    let args = vec![
        "example_program".to_string(),
        "arg1".to_string(),
        "arg2".to_string(),
    ];
    machine.setup_linux(&args, &[]);

    println!("Initial state:");
    println!("  pc: {:#x}", machine.cpu.pc());
    println!("  sp: {:#x}\n", machine.cpu.reg(REG_SP));

    println!("Memory operations:");
    let test_addr = machine.cpu.reg(REG_SP);
    machine
        .arena
        .write::<u64>(test_addr, 0xdead_beef_cafe_babe)
        .unwrap();
    let value = machine.arena.read::<u64>(test_addr).unwrap();
    println!("  wrote and read back: {value:#x}\n");

    println!("Example completed successfully!");
}
