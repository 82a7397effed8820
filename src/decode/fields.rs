//! Bit-field extraction for 32-bit LoongArch instruction words.
//!
//! The `mask!`/`extract_field!` macros and the `rd`/`rj`/`rk` naming
//! directly follow the teacher's `src/instr.rs` / `src/utils.rs`
//! (`mask!(n)`, `extract_field!(val, end, start)`), adapted to LoongArch's
//! register field layout (`rd` in bits [4:0], `rj` in [9:5], `rk` in
//! [14:10], `ra` in [19:15] for 4R forms) instead of RISC-V's.

/// Make a bit-mask of `n` bits.
macro_rules! mask {
    ($n:expr) => {
        (1u32 << $n) - 1
    };
}
pub(crate) use mask;

/// Extract `val[end:start]` (inclusive, Verilog-style).
macro_rules! extract_field {
    ($val:expr, $end:expr, $start:expr) => {
        (mask!($end - $start + 1) & ($val >> $start))
    };
}
pub(crate) use extract_field;

/// Sign-extend the low `bits` bits of `value` to a full `i64`.
pub fn sign_extend(value: u32, bits: u32) -> i64 {
    let shift = 64 - bits;
    (((value as u64) << shift) as i64) >> shift
}

/// `rd`: destination register, bits [4:0].
pub fn rd(instr: u32) -> u8 {
    extract_field!(instr, 4, 0) as u8
}

/// `rj`: first source register, bits [9:5].
pub fn rj(instr: u32) -> u8 {
    extract_field!(instr, 9, 5) as u8
}

/// `rk`: second source register, bits [14:10].
pub fn rk(instr: u32) -> u8 {
    extract_field!(instr, 14, 10) as u8
}

/// `ra`: third source register for 4R forms (fmadd etc.), bits [19:15].
pub fn ra(instr: u32) -> u8 {
    extract_field!(instr, 19, 15) as u8
}

/// Primary opcode field: the high-order bits that the first decode level
/// dispatches on (spec.md §4.3 — "Dispatch is by the LoongArch opcode
/// field (high-order bits), with table-driven sub-dispatch").
pub fn major_opcode(instr: u32) -> u32 {
    extract_field!(instr, 31, 22)
}

/// 12-bit signed immediate, bits [21:10] (2RI12 forms: addi.d, ld.*, st.*).
pub fn si12(instr: u32) -> i64 {
    sign_extend(extract_field!(instr, 21, 10), 12)
}

/// 12-bit unsigned immediate, same field as `si12` (andi, ori, xori).
pub fn ui12(instr: u32) -> u32 {
    extract_field!(instr, 21, 10)
}

/// 14-bit signed immediate, bits [23:10], scaled by 4 at the call site
/// (ll.d/sc.d style addressing; unused by the currently decoded subset but
/// kept for completeness of the field table).
pub fn si14(instr: u32) -> i64 {
    sign_extend(extract_field!(instr, 23, 10), 14)
}

/// 16-bit signed immediate, bits [25:10] (branch/jirl offsets, pre-shift).
pub fn si16(instr: u32) -> i64 {
    sign_extend(extract_field!(instr, 25, 10), 16)
}

/// 20-bit signed immediate, bits [24:5] (lu12i.w, pcaddu12i, pcalau12i).
pub fn si20(instr: u32) -> i64 {
    sign_extend(extract_field!(instr, 24, 5), 20)
}

/// 5-bit shift amount / unsigned immediate, bits [14:10] (slli.w etc. share
/// the `rk` field position for the shift amount).
pub fn ui5(instr: u32) -> u32 {
    extract_field!(instr, 14, 10)
}

/// 6-bit shift amount, bits [15:10] (slli.d etc., one bit wider than .w
/// forms since d-word shifts need 0..63).
pub fn ui6(instr: u32) -> u32 {
    extract_field!(instr, 15, 10)
}

/// Split 26-bit PC-relative immediate used by `b`/`bl`: low 16 bits in
/// [25:10], high 10 bits in [9:0], reassembled high-then-low.
pub fn si26(instr: u32) -> i64 {
    let low16 = extract_field!(instr, 25, 10);
    let high10 = extract_field!(instr, 9, 0);
    let combined = (high10 << 16) | low16;
    sign_extend(combined, 26)
}

/// `cond`/`fcond` field for FP compares, bits [19:15].
pub fn fcond(instr: u32) -> u8 {
    extract_field!(instr, 19, 15) as u8
}

/// `cc`/`cj` FCC index field, bits [2:0] (destination) — used by
/// `fcmp`/`fsel`/branch-on-FCC forms where the condition-code register is
/// encoded in the low 3 bits of the `rd` field.
pub fn cc(instr: u32) -> u8 {
    extract_field!(instr, 2, 0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extend_negative_value() {
        // 12-bit -1 is 0xfff
        assert_eq!(sign_extend(0xfff, 12), -1);
        assert_eq!(sign_extend(0x800, 12), -2048);
        assert_eq!(sign_extend(0x7ff, 12), 2047);
    }

    #[test]
    fn register_fields_extract_expected_bits() {
        // rd=5, rj=10, rk=3
        let instr = (3u32 << 10) | (10u32 << 5) | 5u32;
        assert_eq!(rd(instr), 5);
        assert_eq!(rj(instr), 10);
        assert_eq!(rk(instr), 3);
    }

    #[test]
    fn si26_reassembles_high_and_low_halves() {
        // Encode offset = 4 (low16 = 1 since unit is 4 bytes in the caller,
        // but si26 itself just returns the raw sign-extended bit pattern).
        let low16 = 1u32 & mask!(16);
        let high10 = 0u32;
        let instr = (low16 << 10) | high10;
        assert_eq!(si26(instr), 1);
    }
}
