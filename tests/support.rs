//! Hand-assembly helpers shared by the integration tests.
//!
//! Building an ELF toolchain for a 64-bit LoongArch target is out of scope
//! here, so these tests construct tiny instruction streams by hand and
//! `memcpy_in_unchecked` them straight into an arena, the same pattern
//! `demos/custom_syscall.rs` uses for its host-callback walkthrough.

#![allow(dead_code)]

use loongarch_emu::decode::opcodes;

pub fn encode_ori(rd: u8, rj: u8, imm12: u16) -> u32 {
    (opcodes::ORI << 22) | ((imm12 as u32 & 0xfff) << 10) | ((rj as u32) << 5) | rd as u32
}

pub fn encode_addi_d(rd: u8, rj: u8, imm12: i16) -> u32 {
    (opcodes::ADDI_D << 22) | ((imm12 as u32 & 0xfff) << 10) | ((rj as u32) << 5) | rd as u32
}

pub fn encode_add_d(rd: u8, rj: u8, rk: u8) -> u32 {
    (opcodes::ADD_D << 15) | ((rk as u32) << 10) | ((rj as u32) << 5) | rd as u32
}

pub fn encode_lu12i_w(rd: u8, imm20: i32) -> u32 {
    (opcodes::LU12I_W << 25) | ((imm20 as u32 & 0xfffff) << 5) | rd as u32
}

pub fn encode_syscall() -> u32 {
    opcodes::SYSCALL << 15
}

/// `beqz rj, +offset_bytes`. `offset_bytes` must be a multiple of 4.
pub fn encode_beqz(rj: u8, offset_bytes: i32) -> u32 {
    let word = ((offset_bytes / 4) as u32) & 0x1f_ffff;
    let low16 = word & 0xffff;
    let high5 = (word >> 16) & 0x1f;
    (opcodes::BEQZ << 26) | (low16 << 10) | ((rj as u32) << 5) | high5
}

/// Unconditional `b +offset_bytes`.
pub fn encode_b(offset_bytes: i32) -> u32 {
    let word = ((offset_bytes / 4) as u32) & 0x3ff_ffff;
    let low16 = word & 0xffff;
    let high10 = (word >> 16) & 0x3ff;
    (opcodes::B << 26) | (low16 << 10) | high10
}

/// `{v,xv}ld rd, offset(rj)`, `offset` kept small (0..31) so its field does
/// not bleed into the sub-opcode bits it shares [23:15] with.
pub fn encode_vld(prefix: u32, rd: u8, rj: u8, offset: u32) -> u32 {
    (prefix << 24) | (opcodes::V_LD << 15) | ((offset & 0x1f) << 10) | ((rj as u32) << 5) | rd as u32
}

pub fn encode_vst(prefix: u32, rd: u8, rj: u8, offset: u32) -> u32 {
    (prefix << 24) | (opcodes::V_ST << 15) | ((offset & 0x1f) << 10) | ((rj as u32) << 5) | rd as u32
}

pub fn encode_xvfadd_d(rd: u8, rj: u8, rk: u8) -> u32 {
    (opcodes::LASX_PREFIX << 24)
        | (opcodes::V_FADD_D << 15)
        | ((rk as u32) << 10)
        | ((rj as u32) << 5)
        | rd as u32
}

/// `fcmp.ceq.d ccN, fj, fk` — cond bits `0b0001`.
pub fn encode_fcmp_ceq_d(cc: u8, fj: u8, fk: u8) -> u32 {
    (opcodes::FCMP_COND_D << 20)
        | (0b0001 << 15)
        | ((fk as u32) << 10)
        | ((fj as u32) << 5)
        | (cc as u32 & 0b111)
}

const PF_X: u32 = 1;
const PF_W: u32 = 2;
const PF_R: u32 = 4;
const EM_LOONGARCH: u16 = 258;

/// A minimal two-segment 64-bit LoongArch ELF: an R+X text segment holding
/// `code` at `code_vaddr`, and an R+W data segment of `data_memsz` zeroed
/// bytes at `data_vaddr`, generalized from
/// `examples/light-player-lightplayer/lp-riscv/lp-emu-shared/src/simple_elf.rs`'s
/// 32-bit single-segment RISC-V generator to the 64-bit `Elf64_Ehdr`/
/// `Elf64_Phdr` layout and two flag-tagged segments `elf::load` needs to
/// exercise its `p_flags`-driven permission tagging.
pub fn build_minimal_elf(
    code: &[u8],
    code_vaddr: u64,
    entry: u64,
    data_vaddr: u64,
    data_memsz: u64,
) -> Vec<u8> {
    let mut elf = Vec::new();

    // e_ident
    elf.extend_from_slice(b"\x7fELF");
    elf.push(2); // ELFCLASS64
    elf.push(1); // ELFDATA2LSB
    elf.push(1); // EV_CURRENT
    elf.push(0); // ELFOSABI_SYSV
    elf.extend_from_slice(&[0u8; 8]); // padding

    elf.extend_from_slice(&2u16.to_le_bytes()); // e_type: ET_EXEC
    elf.extend_from_slice(&EM_LOONGARCH.to_le_bytes());
    elf.extend_from_slice(&1u32.to_le_bytes()); // e_version
    elf.extend_from_slice(&entry.to_le_bytes());
    elf.extend_from_slice(&64u64.to_le_bytes()); // e_phoff: right after this header
    elf.extend_from_slice(&0u64.to_le_bytes()); // e_shoff: none
    elf.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    elf.extend_from_slice(&64u16.to_le_bytes()); // e_ehsize
    elf.extend_from_slice(&56u16.to_le_bytes()); // e_phentsize
    elf.extend_from_slice(&2u16.to_le_bytes()); // e_phnum: text + data
    elf.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
    elf.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
    elf.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx

    assert_eq!(elf.len(), 64);
    let code_offset = 64 + 2 * 56u64;

    let push_phdr = |buf: &mut Vec<u8>, flags: u32, offset: u64, vaddr: u64, filesz: u64, memsz: u64| {
        buf.extend_from_slice(&1u32.to_le_bytes()); // p_type: PT_LOAD
        buf.extend_from_slice(&flags.to_le_bytes());
        buf.extend_from_slice(&offset.to_le_bytes());
        buf.extend_from_slice(&vaddr.to_le_bytes());
        buf.extend_from_slice(&vaddr.to_le_bytes()); // p_paddr
        buf.extend_from_slice(&filesz.to_le_bytes());
        buf.extend_from_slice(&memsz.to_le_bytes());
        buf.extend_from_slice(&0x1000u64.to_le_bytes()); // p_align
    };

    push_phdr(
        &mut elf,
        PF_R | PF_X,
        code_offset,
        code_vaddr,
        code.len() as u64,
        code.len() as u64,
    );
    push_phdr(&mut elf, PF_R | PF_W, code_offset, data_vaddr, 0, data_memsz);

    assert_eq!(elf.len() as u64, code_offset);
    elf.extend_from_slice(code);

    elf
}
