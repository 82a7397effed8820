//! Decoded execute segments: a code range's instructions, decoded once.
//!
//! Grounded on the teacher's `platform.rs` `Decoder<Instr<E>>` (a
//! pre-decoded table addressed by PC), extended with the CRC32-C identity
//! and `block_bytes` run-length precomputation spec.md §4.5 requires for
//! process-wide sharing.

use crate::arena::Arena;
use crate::decode::{self, branch, fields, opcodes, DecodedInstruction};
use crate::error::MachineException;

/// A code range, decoded once and addressable by `(base_pc, crc32c,
/// arena_size)` in the [`crate::registry::SharedSegmentRegistry`].
pub struct DecodedExecuteSegment {
    base_pc: u64,
    len: u64,
    hash: u32,
    entries: Vec<DecodedInstruction>,
}

/// Cheap identity hash for a code range, used by the machine to build a
/// [`crate::registry::SegmentKey`] before deciding whether a full decode is
/// necessary.
pub fn hash_code(arena: &Arena, base_pc: u64, len: u64) -> Result<u32, MachineException> {
    Ok(crc32c::crc32c(arena.code_bytes(base_pc, len)?))
}

impl DecodedExecuteSegment {
    /// Decode every 4-byte-aligned instruction in `[base_pc, base_pc+len)`
    /// and run the reachability pass that fills in `block_bytes`.
    pub fn build(arena: &Arena, base_pc: u64, len: u64) -> Result<Self, MachineException> {
        let code = arena.code_bytes(base_pc, len)?;
        let hash = crc32c::crc32c(code);

        let count = (len / 4) as usize;
        let mut entries: Vec<DecodedInstruction> = Vec::with_capacity(count);
        let mut is_branch_target = vec![false; count];

        for i in 0..count {
            let word = u32::from_le_bytes(code[i * 4..i * 4 + 4].try_into().unwrap());
            let maj = fields::extract_field!(word, 31, 26);
            if let Some(offset) = branch::static_offset(word, maj) {
                let target = (i as i64) * 4 + offset;
                if target >= 0 && (target as u64) < len && target % 4 == 0 {
                    is_branch_target[(target / 4) as usize] = true;
                }
            }
            entries.push(decode::decode(word));
        }

        // Backward pass: block_bytes[i] is the number of straight-line
        // bytes guaranteed to follow instruction i before the next
        // "checkpoint" — an instruction that is itself divergent, or that
        // is a reachable branch target (and so could be entered directly
        // by a jump, bypassing any batched prediction built from i).
        // Spec.md §9, open question 2's reachability-pass resolution.
        let is_checkpoint: Vec<bool> = (0..count)
            .map(|i| entries[i].control_flow || is_branch_target[i])
            .collect();
        let mut next_block_bytes = 0u32;
        for i in (0..count).rev() {
            entries[i].block_bytes = if is_checkpoint[i] {
                0
            } else if i + 1 < count && !is_checkpoint[i + 1] {
                4 + next_block_bytes
            } else {
                0
            };
            next_block_bytes = entries[i].block_bytes;
        }

        Ok(Self {
            base_pc,
            len,
            hash,
            entries,
        })
    }

    pub fn base_pc(&self) -> u64 {
        self.base_pc
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn contains(&self, pc: u64) -> bool {
        pc >= self.base_pc && pc < self.base_pc + self.len
    }

    /// Slot index for `pc`, used by the fast interpreter to walk forward by
    /// index instead of recomputing `(pc - base_pc) / 4` every instruction.
    pub fn index_of(&self, pc: u64) -> Option<usize> {
        if !self.contains(pc) {
            return None;
        }
        Some(((pc - self.base_pc) / 4) as usize)
    }

    pub fn entry(&self, idx: usize) -> &DecodedInstruction {
        &self.entries[idx]
    }

    pub fn entry_at(&self, pc: u64) -> Option<&DecodedInstruction> {
        if !self.contains(pc) {
            return None;
        }
        let idx = ((pc - self.base_pc) / 4) as usize;
        self.entries.get(idx)
    }

    /// Host callback installation: patch the instruction at `pc` with a
    /// handler the host supplies directly, bypassing the decode table
    /// (grounded on `custom_syscall.cpp`'s `machine.cpu.init_execute_area`
    /// pattern of pre-seeding raw instruction bytes at a known address, here
    /// generalized to pre-seeding a already-decoded handler slot).
    ///
    /// Resets `block_bytes` on the patched entry to 0, since the patched
    /// handler's divergence behavior is unknown to the reachability pass
    /// that built this segment (spec.md §9, open question 2).
    pub fn install(&mut self, pc: u64, decoded: DecodedInstruction) -> bool {
        if !self.contains(pc) {
            return false;
        }
        let idx = ((pc - self.base_pc) / 4) as usize;
        let mut decoded = decoded;
        decoded.block_bytes = 0;
        self.entries[idx] = decoded;
        true
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Counts fallback (unrecognized-opcode) entries, used by
    /// `--stats` reporting (spec.md §6).
    pub fn fallback_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.handler, decode::Handler::Fallback))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_addi_d(rd: u8, rj: u8, imm: i16) -> u32 {
        (opcodes::ADDI_D << 22) | ((imm as u32 & 0xfff) << 10) | ((rj as u32) << 5) | rd as u32
    }

    #[test]
    fn segment_hash_matches_crc32c_of_bytes() {
        let mut arena = Arena::new(64);
        let instr = encode_addi_d(4, 0, 1);
        arena.memcpy_in_unchecked(0, &instr.to_le_bytes()).unwrap();
        let seg = DecodedExecuteSegment::build(&arena, 0, 4).unwrap();
        assert_eq!(seg.hash(), crc32c::crc32c(&instr.to_le_bytes()));
    }

    #[test]
    fn straight_line_block_bytes_counts_remaining_instructions() {
        let mut arena = Arena::new(64);
        for i in 0..4u64 {
            let instr = encode_addi_d(4, 0, 1);
            arena.memcpy_in_unchecked(i * 4, &instr.to_le_bytes()).unwrap();
        }
        let seg = DecodedExecuteSegment::build(&arena, 0, 16).unwrap();
        assert_eq!(seg.entry_at(0).unwrap().block_bytes, 12);
        assert_eq!(seg.entry_at(12).unwrap().block_bytes, 0);
    }

    #[test]
    fn branch_target_forces_block_boundary() {
        let mut arena = Arena::new(64);
        // beqz r0, +8 at pc=0 (targets pc=8)
        let beqz = (opcodes::BEQZ << 26) | (2u32 << 10);
        arena.memcpy_in_unchecked(0, &beqz.to_le_bytes()).unwrap();
        let addi = encode_addi_d(4, 0, 1);
        arena.memcpy_in_unchecked(4, &addi.to_le_bytes()).unwrap();
        arena.memcpy_in_unchecked(8, &addi.to_le_bytes()).unwrap();
        let seg = DecodedExecuteSegment::build(&arena, 0, 12).unwrap();
        // instruction at offset 4 (the target-adjacent one) still predicts
        // only up to the branch target at 8, i.e. 0 trailing bytes since
        // pc=8 is itself a branch target and thus a block boundary.
        assert_eq!(seg.entry_at(4).unwrap().block_bytes, 0);
    }
}
