//! The `Machine`: couples a [`Cpu`], an [`Arena`], and a syscall table into
//! the end-to-end simulation loop (spec.md §4, §5, §8).
//!
//! Grounded on the teacher's top-level emulator struct that owns a `Hart`
//! and drives its `step()` loop from `main.rs`, generalized here to own a
//! *handle* into the process-wide shared-segment cache instead of owning
//! decoded code directly (spec.md §4.5) — decoding is no longer a
//! per-`Machine` concern.

use crate::arena::Arena;
use crate::cpu::registers::{REG_A0, REG_A7, REG_RA, REG_SP};
use crate::cpu::Cpu;
use crate::elf::{self, LoadedElf};
use crate::error::{ElfLoadError, ErrorKind, MachineException};
use crate::interpreter::{fast, precise, StepOutcome};
use crate::registry::{SegmentKey, SharedSegmentRegistry};
use crate::segment::{self, DecodedExecuteSegment};
use crate::syscalls::{self, SyscallFn, SyscallTable};
use std::collections::HashMap;
use std::fs::File;
use std::sync::Arc;

/// Sentinel `ra` value [`Machine::vmcall`] installs so it can recognize the
/// moment a called guest function returns, without reserving a real guest
/// address for it (spec.md §4.7).
const RETURN_TRAMPOLINE: u64 = 0xffff_ffff_ffff_fff0;

/// How much of the top of the arena is reserved for the initial stack before
/// `setup_linux`'s bump-allocated mmap region starts handing out addresses.
const STACK_RESERVATION: u64 = 8 * 1024 * 1024;

/// Host-side open file descriptors. `0`/`1`/`2` are handled specially
/// (stdin/stdout/stderr) rather than occupying a table slot.
#[derive(Default)]
pub struct FdTable {
    files: HashMap<i32, File>,
    next_fd: i32,
}

impl FdTable {
    fn new() -> Self {
        Self {
            files: HashMap::new(),
            next_fd: 3,
        }
    }

    pub fn insert(&mut self, file: File) -> i32 {
        let fd = self.next_fd;
        self.next_fd += 1;
        self.files.insert(fd, file);
        fd
    }

    pub fn close(&mut self, fd: i32) -> bool {
        if fd <= 2 {
            return true;
        }
        self.files.remove(&fd).is_some()
    }

    pub fn get_mut(&mut self, fd: i32) -> Option<&mut File> {
        self.files.get_mut(&fd)
    }

    pub fn file_size(&self, fd: i32) -> Option<u64> {
        self.files
            .get(&fd)
            .and_then(|f| f.metadata().ok())
            .map(|m| m.len())
    }

    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> std::io::Result<usize> {
        use std::io::Read;
        if fd == 0 {
            return std::io::stdin().read(buf);
        }
        match self.files.get_mut(&fd) {
            Some(f) => f.read(buf),
            None => Err(std::io::Error::from(std::io::ErrorKind::NotFound)),
        }
    }

    pub fn write(&mut self, fd: i32, buf: &[u8]) -> std::io::Result<usize> {
        use std::io::Write;
        match fd {
            1 => std::io::stdout().write_all(buf).map(|_| buf.len()),
            2 => std::io::stderr().write_all(buf).map(|_| buf.len()),
            _ => match self.files.get_mut(&fd) {
                Some(f) => f.write(buf),
                None => Err(std::io::Error::from(std::io::ErrorKind::NotFound)),
            },
        }
    }
}

/// A scalar syscall/vmcall argument, widened or truncated from the raw
/// 64-bit register value (spec.md §4.7's calling-convention helpers).
pub trait FromSysArg: Sized {
    fn from_sysarg(raw: u64) -> Self;
}

macro_rules! impl_from_sysarg {
    ($t:ty) => {
        impl FromSysArg for $t {
            fn from_sysarg(raw: u64) -> Self {
                raw as $t
            }
        }
    };
}

impl_from_sysarg!(u64);
impl_from_sysarg!(i64);
impl_from_sysarg!(u32);
impl_from_sysarg!(i32);
impl_from_sysarg!(usize);

/// Snapshot of decoder-cache behavior for `--stats` reporting (spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct BytecodeStats {
    pub segments_cached_process_wide: usize,
    pub segments_touched_by_this_machine: usize,
    pub fallback_instructions: usize,
    pub instructions_run: u64,
}

/// Couples CPU state, the flat memory arena, and the syscall table that
/// drives a single guest program (spec.md §4, §5).
pub struct Machine {
    pub arena: Arena,
    pub cpu: Cpu,
    pub(crate) fds: FdTable,
    syscalls: SyscallTable,
    max_instructions: u64,
    instructions_run: u64,
    symbols: HashMap<String, u64>,
    precise: bool,
    local_segments: Vec<(SegmentKey, Arc<DecodedExecuteSegment>)>,
    exit_code: Option<i32>,
    mmap_next: u64,
    pub(crate) rng_state: u64,
}

impl Machine {
    /// A bare machine with no code loaded: the arena is entirely read/write
    /// until [`Arena::set_layout`] (or loading an ELF) tags a range
    /// executable (spec.md §3).
    pub fn new(memory_size: u64) -> Self {
        Self {
            arena: Arena::new(memory_size),
            cpu: Cpu::default(),
            fds: FdTable::new(),
            syscalls: SyscallTable::new(),
            max_instructions: u64::MAX,
            instructions_run: 0,
            symbols: HashMap::new(),
            precise: false,
            local_segments: Vec::new(),
            exit_code: None,
            mmap_next: memory_size.saturating_sub(STACK_RESERVATION),
            rng_state: 0x9e37_79b9_7f4a_7c15,
        }
    }

    /// A machine whose arena already carries a custom permission layout,
    /// grounded on `examples/custom_syscall.cpp`'s
    /// `machine.memory.allocate_custom_arena(...)` host-callback scenario —
    /// no ELF is loaded, the host pre-seeds code and data itself.
    pub fn new_bare(memory_size: u64, rodata_end: u64, data_start: u64) -> Self {
        let mut machine = Self::new(memory_size);
        machine.arena = Arena::allocate_custom_arena(memory_size, rodata_end, data_start);
        machine.mmap_next = data_start.max(memory_size.saturating_sub(STACK_RESERVATION));
        machine
    }

    /// Parse and load a static LoongArch64 ELF, positioning `pc` at its
    /// entry point (spec.md §4.2).
    pub fn new_from_elf(data: &[u8], memory_size: u64) -> Result<Self, ElfLoadError> {
        let mut machine = Self::new(memory_size);
        let loaded: LoadedElf = elf::load(data, &mut machine.arena)?;
        machine.cpu.set_pc(loaded.entry);
        machine.arena.set_brk(loaded.initial_brk);
        machine.mmap_next = loaded.initial_brk.max(memory_size.saturating_sub(STACK_RESERVATION));
        machine.symbols = loaded.symbols;
        Ok(machine)
    }

    pub fn symbol(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    /// Cap the total instructions this machine will ever dispatch, across
    /// every future `simulate`/`vmcall` call combined (spec.md §5). Lowering
    /// this below `instructions_run` makes the very next call return
    /// immediately with zero budget — the cooperative-cancellation mechanism
    /// spec.md §5 describes, minus true cross-thread mutation: `&mut self`
    /// here means a host can only lower the budget between calls, not while
    /// one is in flight.
    pub fn set_max_instructions(&mut self, max: u64) {
        self.max_instructions = max;
    }

    pub fn set_precise(&mut self, precise: bool) {
        self.precise = precise;
    }

    pub fn is_precise(&self) -> bool {
        self.precise
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub(crate) fn set_exit_code(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    pub fn install_syscall_handler(&mut self, number: u64, handler: SyscallFn) {
        self.syscalls.install(number, handler);
    }

    pub fn install_unknown_syscall_handler(&mut self, handler: SyscallFn) {
        self.syscalls.install_unknown_handler(handler);
    }

    pub fn setup_linux_syscalls(&mut self) {
        syscalls::linux::install(&mut self.syscalls);
    }

    /// Alias kept for readers coming from the teacher's naming: this
    /// emulator has no JIT, so there is no faster syscall path to opt into
    /// beyond installing the same handler table.
    pub fn setup_accelerated_syscalls(&mut self) {
        self.setup_linux_syscalls();
    }

    /// Lay out the initial stack: `argc`, `argv[]`, a NULL, `envp[]`, a
    /// NULL, and an auxv terminator, 16-byte aligned, growing down from the
    /// top of the arena (spec.md §4.2/§4.8 — the process entry state a
    /// static libc-linked binary expects).
    pub fn setup_linux(&mut self, argv: &[String], envp: &[String]) {
        let mut sp = self.arena.len().saturating_sub(16);

        let mut push_str = |arena: &mut Arena, sp: &mut u64, s: &str| -> u64 {
            let bytes = s.as_bytes();
            *sp -= bytes.len() as u64 + 1;
            arena.write_cstr(*sp, bytes).expect("stack overflow writing argv/envp string");
            *sp
        };

        let argv_ptrs: Vec<u64> = argv
            .iter()
            .map(|s| push_str(&mut self.arena, &mut sp, s))
            .collect();
        let envp_ptrs: Vec<u64> = envp
            .iter()
            .map(|s| push_str(&mut self.arena, &mut sp, s))
            .collect();

        sp &= !0xf;

        // AT_NULL auxv terminator; this emulator does not populate any real
        // auxv entries (no vDSO, no HWCAP probing).
        sp -= 16;
        self.arena.write::<u64>(sp, 0).unwrap();
        self.arena.write::<u64>(sp + 8, 0).unwrap();

        sp -= 8;
        self.arena.write::<u64>(sp, 0).unwrap(); // envp NULL terminator
        for &ptr in envp_ptrs.iter().rev() {
            sp -= 8;
            self.arena.write::<u64>(sp, ptr).unwrap();
        }

        sp -= 8;
        self.arena.write::<u64>(sp, 0).unwrap(); // argv NULL terminator
        for &ptr in argv_ptrs.iter().rev() {
            sp -= 8;
            self.arena.write::<u64>(sp, ptr).unwrap();
        }

        sp -= 8;
        self.arena.write::<u64>(sp, argv.len() as u64).unwrap();

        self.cpu.set_reg(REG_SP, sp);
        self.arena.set_stack_address(sp);
    }

    /// Bump-allocate `aligned_len` bytes below the current mmap frontier,
    /// above `brk` (spec.md §4.1's single contiguous arena has no
    /// page-fault-backed mapping mechanism, so anonymous `mmap` is modeled
    /// as a second bump allocator growing down from the stack reservation).
    pub(crate) fn bump_mmap(&mut self, aligned_len: u64) -> Option<u64> {
        let candidate = self.mmap_next.checked_sub(aligned_len)?;
        if candidate <= self.arena.brk() {
            return None;
        }
        self.mmap_next = candidate;
        Some(candidate)
    }

    /// Read syscall/vmcall argument `index` (0-5, mapping to `a0`-`a5`).
    pub(crate) fn arg(&self, index: u8) -> u64 {
        self.cpu.reg(REG_A0 + index)
    }

    /// Generic typed accessor for [`Self::arg`] (spec.md §4.7).
    pub fn sysarg<T: FromSysArg>(&self, index: u8) -> T {
        T::from_sysarg(self.arg(index))
    }

    /// Floating-point scalar argument `index`, read from `fa0`-`fa7`
    /// (vector registers `v0`-`v7`'s low 64 bits, per the LoongArch FP
    /// calling convention — spec.md §3, §4.7).
    pub fn fsysarg(&self, index: u8) -> f64 {
        self.cpu.vector.get(index).as_f64()
    }

    fn fetch_segment_for(&mut self, pc: u64) -> Result<Arc<DecodedExecuteSegment>, MachineException> {
        if let Some((_, seg)) = self.local_segments.iter().find(|(_, s)| s.contains(pc)) {
            return Ok(seg.clone());
        }

        let (exec_start, exec_end) = self
            .arena
            .executable_range()
            .ok_or_else(|| MachineException::protection_fault(pc))?;
        if pc < exec_start || pc >= exec_end {
            return Err(MachineException::protection_fault(pc));
        }

        let len = exec_end - exec_start;
        let crc = segment::hash_code(&self.arena, exec_start, len)?;
        let key = SegmentKey {
            base_pc: exec_start,
            crc32c: crc,
            arena_size: self.arena.len(),
        };
        let segment = SharedSegmentRegistry::global().get_or_build(key, &self.arena, len)?;
        self.local_segments.push((key, segment.clone()));
        Ok(segment)
    }

    fn dispatch_syscall(&mut self) -> Result<(), MachineException> {
        let number = self.cpu.reg(REG_A7);
        match self.syscalls.resolve(number) {
            Some(handler) => {
                let result = handler(self);
                self.cpu.set_reg(REG_A0, result as u64);
                Ok(())
            }
            None => {
                self.cpu.stop();
                Err(MachineException::new(ErrorKind::SystemCallFailed, number))
            }
        }
    }

    /// Run until fuel runs out, the guest stops itself, or a fault occurs,
    /// dispatching syscalls and crossing segment boundaries transparently
    /// (spec.md §4.6, §8). The budget actually dispatched is `fuel` capped by
    /// whatever is left of `max_instructions` (spec.md §5) — lowering
    /// `max_instructions` below `instructions_run` between calls (the only
    /// time a host can mutate it, see [`Self::set_max_instructions`]) always
    /// wins over however much `fuel` this particular call offers.
    pub fn simulate(&mut self, fuel: u64) -> Result<StepOutcome, MachineException> {
        let starting_budget = fuel.min(self.max_instructions.saturating_sub(self.instructions_run));
        let mut budget = starting_budget;
        let result = loop {
            let outcome = if self.precise {
                precise::run(&mut self.cpu, &mut self.arena, &mut budget)
            } else {
                let segment = match self.fetch_segment_for(self.cpu.pc()) {
                    Ok(s) => s,
                    Err(e) => break Err(e),
                };
                fast::run(&mut self.cpu, &mut self.arena, &segment, &mut budget)
            };

            match outcome {
                StepOutcome::FuelExhausted => break Ok(StepOutcome::FuelExhausted),
                StepOutcome::Stopped => break Ok(StepOutcome::Stopped),
                StepOutcome::Fault(e) => break Err(e),
                StepOutcome::SyscallTrap => {
                    if let Err(e) = self.dispatch_syscall() {
                        break Err(e);
                    }
                    if self.cpu.is_stopped() {
                        break Ok(StepOutcome::Stopped);
                    }
                    // `syscall` itself never advances `pc` (spec.md §4.3);
                    // the dispatch loop plays the kernel's role of resuming
                    // at the following instruction once the call returns.
                    self.cpu.set_pc(self.cpu.pc() + 4);
                }
                StepOutcome::LeftSegment => {}
            }
        };
        self.instructions_run += starting_budget - budget;
        result
    }

    /// [`Self::simulate`], forcing the one-instruction-at-a-time path for
    /// the duration of the call (spec.md §6's `--precise` flag).
    pub fn simulate_precise(&mut self, fuel: u64) -> Result<StepOutcome, MachineException> {
        let was_precise = self.precise;
        self.precise = true;
        let result = self.simulate(fuel);
        self.precise = was_precise;
        result
    }

    /// Call a guest function at `addr` with up to 6 integer arguments and
    /// return its `a0` result, grounded on `examples/custom_syscall.cpp`'s
    /// host-calls-guest pattern. Saves and restores `pc`/`ra` around the
    /// call; `sp` and the rest of guest state are left as the callee leaves
    /// them, matching normal call semantics.
    pub fn vmcall(&mut self, addr: u64, args: &[u64]) -> Result<i64, MachineException> {
        let saved_pc = self.cpu.pc();
        let saved_ra = self.cpu.reg(REG_RA);

        for (i, &value) in args.iter().take(6).enumerate() {
            self.cpu.set_reg(REG_A0 + i as u8, value);
        }
        self.cpu.set_reg(REG_RA, RETURN_TRAMPOLINE);
        self.cpu.set_pc(addr);
        self.cpu.clear_stop();

        // Same `max_instructions`-capped budget `simulate` uses — a low
        // configured limit bounds a `vmcall` exactly as it bounds `simulate`,
        // with no artificial floor propping the budget back up.
        let starting_budget = self.max_instructions.saturating_sub(self.instructions_run);
        let mut budget = starting_budget;
        let result = loop {
            if self.cpu.pc() == RETURN_TRAMPOLINE {
                break Ok(());
            }
            let outcome = if self.precise {
                precise::run(&mut self.cpu, &mut self.arena, &mut budget)
            } else {
                let segment = match self.fetch_segment_for(self.cpu.pc()) {
                    Ok(s) => s,
                    Err(e) => break Err(e),
                };
                fast::run(&mut self.cpu, &mut self.arena, &segment, &mut budget)
            };
            match outcome {
                StepOutcome::FuelExhausted => {
                    break Err(MachineException::new(ErrorKind::SystemCallFailed, addr))
                }
                StepOutcome::Fault(e) => break Err(e),
                StepOutcome::Stopped => break Ok(()),
                StepOutcome::SyscallTrap => {
                    if let Err(e) = self.dispatch_syscall() {
                        break Err(e);
                    }
                    self.cpu.set_pc(self.cpu.pc() + 4);
                }
                StepOutcome::LeftSegment => {}
            }
        };
        self.instructions_run += starting_budget - budget;
        result?;

        let result = self.cpu.reg(REG_A0) as i64;
        self.cpu.set_pc(saved_pc);
        self.cpu.set_reg(REG_RA, saved_ra);
        Ok(result)
    }

    pub fn collect_bytecode_statistics(&self) -> BytecodeStats {
        BytecodeStats {
            segments_cached_process_wide: SharedSegmentRegistry::global().len(),
            segments_touched_by_this_machine: self.local_segments.len(),
            fallback_instructions: self
                .local_segments
                .iter()
                .map(|(_, s)| s.fallback_count())
                .sum(),
            instructions_run: self.instructions_run,
        }
    }
}

impl Drop for Machine {
    /// Release this machine's references into the shared-segment registry;
    /// a segment is only actually dropped once every `Machine` sharing its
    /// key has done the same (spec.md §4.5).
    fn drop(&mut self) {
        for (key, _) in self.local_segments.drain(..) {
            SharedSegmentRegistry::global().remove_if_unique(&key);
        }
    }
}
