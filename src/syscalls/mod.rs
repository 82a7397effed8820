//! Syscall dispatch (spec.md §4.7).
//!
//! Syscall number in `a7`, up to 6 arguments in `a0`-`a5`, return value in
//! `a0` — the same convention the teacher's M-mode trap code assumes for
//! ecalls, carried over unchanged since LoongArch's Linux syscall ABI uses
//! the same register layout.
//!
//! Deviation from the teacher/`tr_api.cpp`: the "unknown syscall" fallback
//! here is per-[`crate::machine::Machine`], not a single process-wide
//! function pointer — different `Machine`s in the same process (e.g. one
//! running a test harness, one running a real guest) may want different
//! fallback behavior, and nothing in spec.md requires them to share one.

pub mod linux;

use crate::machine::Machine;
use std::collections::HashMap;

/// Syscall numbers `1024..2047` are reserved for host/vmcall interop
/// (spec.md §4.7) and must never collide with a real Linux syscall number.
pub const HOST_SYSCALL_BASE: u64 = 1024;
pub const HOST_SYSCALL_END: u64 = 2047;

pub type SyscallFn = fn(&mut Machine) -> i64;

#[derive(Default)]
pub struct SyscallTable {
    handlers: HashMap<u64, SyscallFn>,
    unknown: Option<SyscallFn>,
}

impl SyscallTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, number: u64, handler: SyscallFn) {
        self.handlers.insert(number, handler);
    }

    pub fn install_unknown_handler(&mut self, handler: SyscallFn) {
        self.unknown = Some(handler);
    }

    /// Resolve the handler for `number`, falling back to the per-`Machine`
    /// unknown-syscall handler if one has been installed.
    pub fn resolve(&self, number: u64) -> Option<SyscallFn> {
        self.handlers.get(&number).copied().or(self.unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_syscall_range_does_not_overlap_linux_numbers() {
        assert!(HOST_SYSCALL_BASE > linux::SYS_GETRANDOM);
    }
}
