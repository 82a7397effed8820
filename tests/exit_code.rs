//! Seed scenario (spec.md §8): the smallest possible guest program —
//! `li.w $a0, 42; li.w $a7, 93; syscall` — exits with code 42 after exactly
//! three dispatched instructions.

mod support;

use loongarch_emu::interpreter::StepOutcome;
use loongarch_emu::machine::Machine;
use loongarch_emu::syscalls::linux;
use support::{encode_ori, encode_syscall};

const REG_A0: u8 = 4;
const REG_A7: u8 = 11;

#[test]
fn exit_42_stops_after_three_instructions() {
    let code = [
        encode_ori(REG_A0, 0, 42),
        encode_ori(REG_A7, 0, linux::SYS_EXIT as u16),
        encode_syscall(),
    ];

    let mut machine = Machine::new_bare(4096, 0, code.len() as u64 * 4);
    for (i, instr) in code.iter().enumerate() {
        machine
            .arena
            .memcpy_in_unchecked((i as u64) * 4, &instr.to_le_bytes())
            .unwrap();
    }
    machine.setup_linux_syscalls();

    let outcome = machine.simulate(100).unwrap();
    assert!(matches!(outcome, StepOutcome::Stopped));
    assert_eq!(machine.exit_code(), Some(42));
    assert_eq!(machine.collect_bytecode_statistics().instructions_run, 3);
}
