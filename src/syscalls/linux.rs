//! Linux syscall handlers for the generic LP64 syscall ABI (the same
//! numbering RISC-V64, AArch64, and LoongArch64 all share).
//!
//! Grounded on `examples/original_source/emulator/src/main.cpp`'s
//! `machine->setup_linux_syscalls()` call and `examples/custom_syscall.cpp`'s
//! `install_syscall_handler` pattern, reimplemented as Rust `fn(&mut
//! Machine) -> i64` handlers registered in a [`super::SyscallTable`] instead
//! of a process-wide `CallbackTable`.

use super::SyscallTable;
use crate::machine::Machine;
use std::io::{Seek, SeekFrom};

pub const SYS_SET_TID_ADDRESS: u64 = 96;
pub const SYS_CLOSE: u64 = 57;
pub const SYS_LSEEK: u64 = 62;
pub const SYS_READ: u64 = 63;
pub const SYS_WRITE: u64 = 64;
pub const SYS_WRITEV: u64 = 66;
pub const SYS_OPENAT: u64 = 56;
pub const SYS_FSTAT: u64 = 80;
pub const SYS_EXIT: u64 = 93;
pub const SYS_EXIT_GROUP: u64 = 94;
pub const SYS_SET_ROBUST_LIST: u64 = 99;
pub const SYS_CLOCK_GETTIME: u64 = 113;
pub const SYS_RT_SIGACTION: u64 = 134;
pub const SYS_RT_SIGPROCMASK: u64 = 135;
pub const SYS_GETTID: u64 = 178;
pub const SYS_BRK: u64 = 214;
pub const SYS_MUNMAP: u64 = 215;
pub const SYS_MMAP: u64 = 222;
pub const SYS_MPROTECT: u64 = 226;
pub const SYS_GETRANDOM: u64 = 278;

const EBADF: i64 = -9;
const EINVAL: i64 = -22;

/// Install the handlers a static libc-linked binary is expected to need at
/// startup and for basic I/O (spec.md §4.7's "common Linux syscall
/// surface").
pub fn install(table: &mut SyscallTable) {
    table.install(SYS_SET_TID_ADDRESS, sys_set_tid_address);
    table.install(SYS_CLOSE, sys_close);
    table.install(SYS_LSEEK, sys_lseek);
    table.install(SYS_READ, sys_read);
    table.install(SYS_WRITE, sys_write);
    table.install(SYS_WRITEV, sys_writev);
    table.install(SYS_OPENAT, sys_openat);
    table.install(SYS_FSTAT, sys_fstat);
    table.install(SYS_EXIT, sys_exit);
    table.install(SYS_EXIT_GROUP, sys_exit);
    table.install(SYS_SET_ROBUST_LIST, sys_ok);
    table.install(SYS_CLOCK_GETTIME, sys_clock_gettime);
    table.install(SYS_RT_SIGACTION, sys_ok);
    table.install(SYS_RT_SIGPROCMASK, sys_ok);
    table.install(SYS_GETTID, sys_gettid);
    table.install(SYS_BRK, sys_brk);
    table.install(SYS_MUNMAP, sys_ok);
    table.install(SYS_MMAP, sys_mmap);
    table.install(SYS_MPROTECT, sys_ok);
    table.install(SYS_GETRANDOM, sys_getrandom);
}

fn sys_ok(_m: &mut Machine) -> i64 {
    0
}

fn sys_exit(m: &mut Machine) -> i64 {
    let code = m.arg(0) as i32;
    m.set_exit_code(code);
    m.cpu.stop();
    code as i64
}

fn sys_set_tid_address(_m: &mut Machine) -> i64 {
    1
}

fn sys_gettid(_m: &mut Machine) -> i64 {
    1
}

fn sys_close(m: &mut Machine) -> i64 {
    let fd = m.arg(0) as i32;
    if m.fds.close(fd) {
        0
    } else {
        EBADF
    }
}

fn sys_lseek(m: &mut Machine) -> i64 {
    let fd = m.arg(0) as i32;
    let offset = m.arg(1) as i64;
    let whence = m.arg(2) as i32;
    let Some(file) = m.fds.get_mut(fd) else {
        return EBADF;
    };
    let seek_from = match whence {
        0 => SeekFrom::Start(offset as u64),
        1 => SeekFrom::Current(offset),
        2 => SeekFrom::End(offset),
        _ => return EINVAL,
    };
    match file.seek(seek_from) {
        Ok(pos) => pos as i64,
        Err(_) => -5, // EIO
    }
}

fn sys_read(m: &mut Machine) -> i64 {
    let fd = m.arg(0) as i32;
    let buf_addr = m.arg(1);
    let count = m.arg(2);
    let mut buf = vec![0u8; count as usize];
    let n = match m.fds.read(fd, &mut buf) {
        Ok(n) => n,
        Err(_) => return EBADF,
    };
    if m.arena.memcpy_in(buf_addr, &buf[..n]).is_err() {
        return -14; // EFAULT
    }
    n as i64
}

fn sys_write(m: &mut Machine) -> i64 {
    let fd = m.arg(0) as i32;
    let buf_addr = m.arg(1);
    let count = m.arg(2);
    let bytes = match m.arena.memcpy_out(buf_addr, count) {
        Ok(b) => b.to_vec(),
        Err(_) => return -14,
    };
    match m.fds.write(fd, &bytes) {
        Ok(n) => n as i64,
        Err(_) => EBADF,
    }
}

/// `writev`: iterate a guest `iovec[iovcnt]` array, each entry `{ base: u64,
/// len: u64 }`, and hand every buffer to the same path as `write`.
fn sys_writev(m: &mut Machine) -> i64 {
    let fd = m.arg(0) as i32;
    let iov_addr = m.arg(1);
    let iovcnt = m.arg(2);
    let mut total = 0i64;
    for i in 0..iovcnt {
        let entry_addr = iov_addr + i * 16;
        let base = match m.arena.read::<u64>(entry_addr) {
            Ok(v) => v,
            Err(_) => return -14,
        };
        let len = match m.arena.read::<u64>(entry_addr + 8) {
            Ok(v) => v,
            Err(_) => return -14,
        };
        let bytes = match m.arena.memcpy_out(base, len) {
            Ok(b) => b.to_vec(),
            Err(_) => return -14,
        };
        match m.fds.write(fd, &bytes) {
            Ok(n) => total += n as i64,
            Err(_) => return EBADF,
        }
    }
    total
}

const O_WRONLY: u32 = 0o1;
const O_RDWR: u32 = 0o2;
const O_CREAT: u32 = 0o100;
const O_TRUNC: u32 = 0o1000;
const O_APPEND: u32 = 0o2000;

fn sys_openat(m: &mut Machine) -> i64 {
    let path_addr = m.arg(1);
    let flags = m.arg(2) as u32;
    let path_bytes = match m.arena.read_cstr(path_addr, 4096) {
        Ok(b) => b,
        Err(_) => return -14,
    };
    let path = String::from_utf8_lossy(&path_bytes).into_owned();

    let mut options = std::fs::OpenOptions::new();
    if flags & (O_WRONLY | O_RDWR) == 0 {
        options.read(true);
    } else {
        if flags & O_RDWR != 0 {
            options.read(true);
        }
        options.write(true);
    }
    if flags & O_CREAT != 0 {
        options.create(true);
    }
    if flags & O_TRUNC != 0 {
        options.truncate(true);
    }
    if flags & O_APPEND != 0 {
        options.append(true);
    }

    match options.open(&path) {
        Ok(file) => m.fds.insert(file) as i64,
        Err(_) => -2, // ENOENT
    }
}

/// A minimal `struct stat` layout sufficient for libc's `isatty`/buffering
/// probes: only `st_mode` and `st_size` are populated meaningfully.
fn sys_fstat(m: &mut Machine) -> i64 {
    let fd = m.arg(0) as i32;
    let out_addr = m.arg(1);
    let size = m.fds.file_size(fd).unwrap_or(0);
    // offsets follow the LP64 `struct stat` layout used by LoongArch's libc.
    let mode: u32 = 0o100644; // S_IFREG
    if m.arena.write::<u64>(out_addr + 24, size).is_err() {
        return -14;
    }
    let _ = m.arena.write::<u32>(out_addr + 16, mode);
    0
}

fn sys_brk(m: &mut Machine) -> i64 {
    let requested = m.arg(0);
    if requested == 0 {
        return m.arena.brk() as i64;
    }
    if requested > m.arena.len() {
        return m.arena.brk() as i64;
    }
    m.arena.set_brk(requested);
    requested as i64
}

const MAP_ANONYMOUS: u32 = 0x20;

/// Anonymous mmap only: bump-allocates from a region above `brk`, since the
/// flat arena has no separate page-fault-backed mapping mechanism (spec.md
/// §4.1 — a single contiguous buffer).
fn sys_mmap(m: &mut Machine) -> i64 {
    let length = m.arg(1);
    let flags = m.arg(3) as u32;
    if flags & MAP_ANONYMOUS == 0 {
        return EINVAL;
    }
    let aligned = (length + 0xfff) & !0xfff;
    match m.bump_mmap(aligned) {
        Some(addr) => addr as i64,
        None => -12, // ENOMEM
    }
}

fn sys_clock_gettime(m: &mut Machine) -> i64 {
    let out_addr = m.arg(1);
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    if m.arena.write::<u64>(out_addr, now.as_secs()).is_err() {
        return -14;
    }
    let _ = m.arena.write::<u64>(out_addr + 8, now.subsec_nanos() as u64);
    0
}

/// Non-cryptographic PRNG (splitmix64), seeded once per `Machine`
/// (`Machine::rng_state`). Adequate for a guest's own `/dev/urandom`-backed
/// seeding during startup; this emulator makes no security claims.
fn sys_getrandom(m: &mut Machine) -> i64 {
    let buf_addr = m.arg(0);
    let count = m.arg(1) as usize;
    let mut bytes = Vec::with_capacity(count);
    while bytes.len() < count {
        m.rng_state = m.rng_state.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = m.rng_state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^= z >> 31;
        bytes.extend_from_slice(&z.to_le_bytes());
    }
    bytes.truncate(count);
    if m.arena.memcpy_in(buf_addr, &bytes).is_err() {
        return -14;
    }
    count as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmap_rejects_non_anonymous_requests() {
        // flags bit 0x20 (MAP_ANONYMOUS) unset: EINVAL.
        assert_eq!(MAP_ANONYMOUS, 0x20);
    }
}
