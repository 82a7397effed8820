//! ELF loading for 64-bit LoongArch static binaries (spec.md §4.2).
//!
//! Grounded on `riscvemu/src/elf_utils.rs`'s use of the `elf` crate
//! (`ElfBytes<AnyEndian>`, iterating `segments()`, reading the symbol
//! table), generalized from RISC-V's byte-by-byte `Memory::write` loop to a
//! single `Arena::memcpy_in_unchecked` per `PT_LOAD` segment.

use crate::arena::Arena;
use crate::error::ElfLoadError;
use elf::endian::AnyEndian;
use elf::file::Class;
use elf::ElfBytes;
use std::collections::HashMap;

const PT_LOAD: u32 = 1;
const PT_INTERP: u32 = 3;
const EM_LOONGARCH: u16 = 258;

const PF_X: u32 = 1;

/// What `Machine::load_elf` needs after parsing: the entry point, the
/// program break (end of the last loaded segment, page-aligned up), and a
/// name→address map for host-side symbol lookups (spec.md §4.2).
pub struct LoadedElf {
    pub entry: u64,
    pub initial_brk: u64,
    pub symbols: HashMap<String, u64>,
}

/// Parse `data`, validate it's a static 64-bit LoongArch binary, copy its
/// `PT_LOAD` segments into `arena` at their `p_vaddr`, and tag the arena's
/// executable range from the union of segments carrying `PF_X`.
pub fn load(data: &[u8], arena: &mut Arena) -> Result<LoadedElf, ElfLoadError> {
    if data.len() < 5 || &data[0..4] != b"\x7fELF" {
        return Err(ElfLoadError::BadMagic);
    }

    let file = ElfBytes::<AnyEndian>::minimal_parse(data)?;

    if file.ehdr.class != Class::ELF64 {
        let class_byte = if file.ehdr.class == Class::ELF32 { 32 } else { 0 };
        return Err(ElfLoadError::Not64Bit(class_byte));
    }
    if file.ehdr.e_machine != EM_LOONGARCH {
        return Err(ElfLoadError::WrongMachine(file.ehdr.e_machine));
    }

    let segments = file
        .segments()
        .ok_or_else(|| ElfLoadError::Malformed("no program headers".into()))?;

    let mut max_end = 0u64;
    let mut exec_start: Option<u64> = None;
    let mut exec_end = 0u64;
    for phdr in segments.iter() {
        if phdr.p_type == PT_INTERP {
            return Err(ElfLoadError::DynamicallyLinked);
        }
        if phdr.p_type != PT_LOAD {
            continue;
        }

        let start = phdr.p_offset as usize;
        let filesz = phdr.p_filesz as usize;
        let end = start
            .checked_add(filesz)
            .ok_or_else(|| ElfLoadError::Malformed("segment overflows file".into()))?;
        let bytes = data
            .get(start..end)
            .ok_or_else(|| ElfLoadError::Malformed("segment extends past file end".into()))?;

        let needed = phdr.p_vaddr + phdr.p_memsz;
        if needed > arena.len() {
            return Err(ElfLoadError::SegmentTooLarge {
                needed,
                arena_size: arena.len(),
            });
        }

        arena
            .memcpy_in_unchecked(phdr.p_vaddr, bytes)
            .map_err(|_| ElfLoadError::SegmentTooLarge {
                needed,
                arena_size: arena.len(),
            })?;

        // p_memsz may exceed p_filesz (.bss): zero-fill the remainder.
        let bss_len = phdr.p_memsz - phdr.p_filesz;
        if bss_len > 0 {
            arena
                .memset(phdr.p_vaddr + phdr.p_filesz, 0, bss_len)
                .map_err(|_| ElfLoadError::SegmentTooLarge {
                    needed,
                    arena_size: arena.len(),
                })?;
        }

        max_end = max_end.max(phdr.p_vaddr + phdr.p_memsz);

        if phdr.p_flags & PF_X != 0 {
            exec_start = Some(exec_start.map_or(phdr.p_vaddr, |s| s.min(phdr.p_vaddr)));
            exec_end = exec_end.max(phdr.p_vaddr + phdr.p_memsz);
        }
    }

    // Tag the arena's permission ranges from the segments' p_flags (spec.md
    // §4.2: "sets the executable-range tags so writes to .text fail").
    // Everything below the executable range is read-only, everything from
    // its end onward (.data/.bss/heap/stack) is read/write — the same
    // three-range shape `Arena::set_layout` always assumes, with the two
    // boundaries now derived from the real segment layout instead of left
    // at their all-read/write default.
    if let Some(start) = exec_start {
        arena.set_layout(start, exec_end);
    }

    let mut symbols = HashMap::new();
    if let Some((symtab, strtab)) = file.symbol_table().map_err(ElfLoadError::from)? {
        for sym in symtab.iter() {
            if sym.st_name == 0 {
                continue;
            }
            if let Ok(name) = strtab.get(sym.st_name as usize) {
                symbols.insert(name.to_string(), sym.st_value);
            }
        }
    }

    let page_size = 0x1000u64;
    let initial_brk = (max_end + page_size - 1) & !(page_size - 1);

    Ok(LoadedElf {
        entry: file.ehdr.e_entry,
        initial_brk,
        symbols,
    })
}
