//! Threaded-bytecode fast path: walks a [`DecodedExecuteSegment`] by index,
//! only recomputing `(pc - base_pc) / 4` when control flow actually leaves
//! the predicted straight-line run (spec.md §4.6).

use super::StepOutcome;
use crate::arena::Arena;
use crate::cpu::Cpu;
use crate::decode::syscall_instr::SYSCALL_TRAP_DATA;
use crate::decode::{DecodedInstruction, Handler};
use crate::error::ErrorKind;
use crate::segment::DecodedExecuteSegment;

/// Runs one decoded entry and translates a raised fault/syscall-trap/stop
/// into the outcome that should end the dispatch loop, if any.
fn dispatch(cpu: &mut Cpu, arena: &mut Arena, entry: &DecodedInstruction) -> Option<StepOutcome> {
    match entry.handler {
        Handler::Native(f) => f(cpu, arena, entry.raw),
        Handler::Fallback => cpu.raise(crate::error::MachineException::illegal_operation(entry.raw)),
    }

    if let Some(exc) = cpu.take_fault() {
        return Some(if exc.kind == ErrorKind::SystemCallFailed && exc.data == SYSCALL_TRAP_DATA {
            StepOutcome::SyscallTrap
        } else {
            StepOutcome::Fault(exc)
        });
    }
    if cpu.is_stopped() {
        return Some(StepOutcome::Stopped);
    }
    None
}

/// Run until fuel runs out, a syscall traps, control leaves the segment, or
/// a fault/stop occurs. `budget` is decremented in place so the caller can
/// resume across segment/syscall boundaries without losing the remaining
/// fuel count.
///
/// After a non-divergent entry, `entry.block_bytes` names how many further
/// bytes are guaranteed straight-line and in-segment (the reachability pass
/// in `segment::DecodedExecuteSegment::build`, spec.md §4.6 step 3 / §9's
/// open question 2) — that run is walked without re-checking
/// `control_flow` per instruction the way the checkpoint-by-checkpoint path
/// below has to.
pub fn run(
    cpu: &mut Cpu,
    arena: &mut Arena,
    segment: &DecodedExecuteSegment,
    budget: &mut u64,
) -> StepOutcome {
    let Some(mut idx) = segment.index_of(cpu.pc()) else {
        return StepOutcome::LeftSegment;
    };

    while *budget > 0 {
        let entry = segment.entry(idx);
        if let Some(outcome) = dispatch(cpu, arena, entry) {
            *budget -= 1;
            return outcome;
        }
        *budget -= 1;

        if entry.control_flow {
            match segment.index_of(cpu.pc()) {
                Some(next_idx) => idx = next_idx,
                None => return StepOutcome::LeftSegment,
            }
            continue;
        }

        cpu.set_pc(cpu.pc() + 4);
        idx += 1;
        if idx >= segment.entry_count() {
            return StepOutcome::LeftSegment;
        }

        let mut run_len = (entry.block_bytes / 4) as u64;
        while run_len > 0 && *budget > 0 {
            let batched = segment.entry(idx);
            if let Some(outcome) = dispatch(cpu, arena, batched) {
                *budget -= 1;
                return outcome;
            }
            *budget -= 1;
            cpu.set_pc(cpu.pc() + 4);
            idx += 1;
            if idx >= segment.entry_count() {
                return StepOutcome::LeftSegment;
            }
            run_len -= 1;
        }
    }

    StepOutcome::FuelExhausted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::opcodes;

    fn encode_addi_d(rd: u8, rj: u8, imm: i16) -> u32 {
        (opcodes::ADDI_D << 22) | ((imm as u32 & 0xfff) << 10) | ((rj as u32) << 5) | rd as u32
    }

    #[test]
    fn straight_line_run_consumes_fuel_per_instruction() {
        let mut arena = Arena::new(64);
        for i in 0..4u64 {
            let instr = encode_addi_d(4, 4, 1);
            arena.memcpy_in_unchecked(i * 4, &instr.to_le_bytes()).unwrap();
        }
        let segment = DecodedExecuteSegment::build(&arena, 0, 16).unwrap();
        let mut cpu = Cpu::default();
        let mut budget = 4u64;
        let outcome = run(&mut cpu, &mut arena, &segment, &mut budget);
        assert!(matches!(outcome, StepOutcome::LeftSegment));
        assert_eq!(budget, 0);
        assert_eq!(cpu.reg(4), 4);
    }

    #[test]
    fn batched_run_stops_exactly_at_fuel_exhaustion_mid_block() {
        let mut arena = Arena::new(64);
        for i in 0..6u64 {
            let instr = encode_addi_d(4, 4, 1);
            arena.memcpy_in_unchecked(i * 4, &instr.to_le_bytes()).unwrap();
        }
        let segment = DecodedExecuteSegment::build(&arena, 0, 24).unwrap();
        assert_eq!(segment.entry_at(0).unwrap().block_bytes, 20);

        let mut cpu = Cpu::default();
        let mut budget = 3u64;
        let outcome = run(&mut cpu, &mut arena, &segment, &mut budget);
        assert!(matches!(outcome, StepOutcome::FuelExhausted));
        assert_eq!(budget, 0);
        assert_eq!(cpu.reg(4), 3);
        assert_eq!(cpu.pc(), 12);
    }

    #[test]
    fn syscall_traps_without_consuming_extra_fuel() {
        let mut arena = Arena::new(64);
        let instr = (opcodes::SYSCALL << 15) as u32;
        arena.memcpy_in_unchecked(0, &instr.to_le_bytes()).unwrap();
        let segment = DecodedExecuteSegment::build(&arena, 0, 4).unwrap();
        let mut cpu = Cpu::default();
        let mut budget = 10u64;
        let outcome = run(&mut cpu, &mut arena, &segment, &mut budget);
        assert!(matches!(outcome, StepOutcome::SyscallTrap));
        assert_eq!(budget, 9);
    }
}
