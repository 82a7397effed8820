//! Precise (slow-path) interpreter: decode one instruction at a time
//! straight from the arena, no segment cache involved. Used for
//! `--precise` and for single-stepping under a debugger (spec.md §4.6).
//!
//! Must agree with [`super::fast`] on every observable state change at
//! syscall boundaries — both paths route faults through `Cpu::raise` and
//! recognize the same syscall-trap sentinel.

use super::StepOutcome;
use crate::arena::Arena;
use crate::cpu::Cpu;
use crate::decode::syscall_instr::SYSCALL_TRAP_DATA;
use crate::decode::{self, Handler};
use crate::error::ErrorKind;

pub fn run(cpu: &mut Cpu, arena: &mut Arena, budget: &mut u64) -> StepOutcome {
    while *budget > 0 {
        let pc = cpu.pc();
        let word = match arena.read::<u32>(pc) {
            Ok(w) => w,
            Err(e) => return StepOutcome::Fault(e),
        };
        let decoded = decode::decode(word);

        match decoded.handler {
            Handler::Native(f) => f(cpu, arena, word),
            Handler::Fallback => cpu.raise(crate::error::MachineException::illegal_operation(word)),
        }
        *budget -= 1;

        if let Some(exc) = cpu.take_fault() {
            if exc.kind == ErrorKind::SystemCallFailed && exc.data == SYSCALL_TRAP_DATA {
                return StepOutcome::SyscallTrap;
            }
            return StepOutcome::Fault(exc);
        }

        if cpu.is_stopped() {
            return StepOutcome::Stopped;
        }

        if !decoded.control_flow {
            cpu.set_pc(pc + 4);
        }
    }
    StepOutcome::FuelExhausted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::opcodes;

    #[test]
    fn single_step_advances_pc_by_four() {
        let mut arena = Arena::new(64);
        let instr = (opcodes::ADDI_D << 22) | (1u32 << 10);
        arena.memcpy_in_unchecked(0, &instr.to_le_bytes()).unwrap();
        let mut cpu = Cpu::default();
        let mut budget = 1u64;
        run(&mut cpu, &mut arena, &mut budget);
        assert_eq!(cpu.pc(), 4);
    }
}
