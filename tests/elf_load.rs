//! `Machine::new_from_elf` must actually be able to run what it loads:
//! `elf::load` has to tag the arena's executable range from the ELF's own
//! `PT_LOAD` segment flags, or `Machine::fetch_segment_for`'s very first PC
//! lookup faults before a single instruction runs (spec.md §4.2).

mod support;

use loongarch_emu::interpreter::StepOutcome;
use loongarch_emu::machine::Machine;
use loongarch_emu::syscalls::linux;
use support::{build_minimal_elf, encode_ori, encode_syscall};

const REG_A0: u8 = 4;
const REG_A7: u8 = 11;

#[test]
fn elf_loaded_program_runs_to_completion_through_the_public_api() {
    const CODE_VADDR: u64 = 0x1000;
    const DATA_VADDR: u64 = 0x2000;

    let code = [
        encode_ori(REG_A0, 0, 42),
        encode_ori(REG_A7, 0, linux::SYS_EXIT as u16),
        encode_syscall(),
    ];
    let mut code_bytes = Vec::new();
    for instr in &code {
        code_bytes.extend_from_slice(&instr.to_le_bytes());
    }

    let elf = build_minimal_elf(&code_bytes, CODE_VADDR, CODE_VADDR, DATA_VADDR, 0x1000);

    let mut machine = Machine::new_from_elf(&elf, 0x4000).unwrap();
    assert_eq!(
        machine.arena.executable_range(),
        Some((CODE_VADDR, CODE_VADDR + code_bytes.len() as u64))
    );

    machine.setup_linux_syscalls();
    let outcome = machine.simulate(100).unwrap();
    assert!(matches!(outcome, StepOutcome::Stopped));
    assert_eq!(machine.exit_code(), Some(42));
}

#[test]
fn elf_loaded_text_segment_rejects_writes() {
    const CODE_VADDR: u64 = 0x1000;
    const DATA_VADDR: u64 = 0x2000;

    let code_bytes = encode_syscall().to_le_bytes();
    let elf = build_minimal_elf(&code_bytes, CODE_VADDR, CODE_VADDR, DATA_VADDR, 0x1000);

    let mut machine = Machine::new_from_elf(&elf, 0x4000).unwrap();
    let err = machine.arena.write::<u32>(CODE_VADDR, 0).unwrap_err();
    assert_eq!(err.kind, loongarch_emu::error::ErrorKind::ProtectionFault);
}
