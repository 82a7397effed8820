//! Seed scenario (spec.md §8): a single `syscall` with an unresolved number
//! (the host-callback range starting at `HOST_SYSCALL_BASE`) dispatches to a
//! handler installed on the host side instead of faulting, the same
//! mechanism `demos/custom_syscall.rs` walks through for a guest/host
//! bridge — here the handler squares `a0`.

mod support;

use loongarch_emu::cpu::registers::{REG_A0, REG_A7};
use loongarch_emu::machine::Machine;
use loongarch_emu::syscalls::HOST_SYSCALL_BASE;
use support::encode_syscall;

#[test]
fn unknown_syscall_falls_back_to_host_handler_which_squares_a0() {
    fn square(m: &mut Machine) -> i64 {
        let a0: i64 = m.sysarg(0);
        a0 * a0
    }

    let code = [encode_syscall()];

    let mut machine = Machine::new_bare(4096, 0, code.len() as u64 * 4);
    machine
        .arena
        .memcpy_in_unchecked(0, &code[0].to_le_bytes())
        .unwrap();
    machine.install_unknown_syscall_handler(square);
    machine.cpu.set_reg(REG_A7, HOST_SYSCALL_BASE);
    machine.cpu.set_reg(REG_A0, 7);

    // The single instruction is the whole executable range, so once the
    // syscall resumes at pc+4 the next fetch runs off the end and faults —
    // the handler's effect on a0 is already observable by then.
    let err = machine.simulate(10).unwrap_err();
    assert_eq!(err.kind, loongarch_emu::error::ErrorKind::ProtectionFault);
    assert_eq!(machine.cpu.reg(REG_A0), 49);
}
