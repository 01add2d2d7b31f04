//! Immediate legality checks and field encoders.
//!
//! Each family answers the same two questions: does the value fit, and if so,
//! what bits go into the instruction word. A value that does not fit is an
//! error; no family truncates.
//!
//! The logical (bitmask) family lives in [`crate::bitmask`].

use crate::error::{AsmError, ImmKind};

// ── Plain integer fields ─────────────────────────────────────────────────

/// Whether `value` fits a signed field of `bits` bits.
#[inline]
pub fn fits_signed(value: i64, bits: u32) -> bool {
    debug_assert!(bits > 0 && bits < 64);
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    (min..=max).contains(&value)
}

/// Whether `value` fits an unsigned field of `bits` bits.
#[inline]
pub fn fits_unsigned(value: u64, bits: u32) -> bool {
    bits >= 64 || value >> bits == 0
}

/// Check a signed field, returning the low `bits` bits of its two's-complement form.
pub fn signed_field(value: i64, bits: u32) -> Result<u32, AsmError> {
    if !fits_signed(value, bits) {
        return Err(AsmError::ImmediateOverflow {
            value: value as i128,
            min: -(1i128 << (bits - 1)),
            max: (1i128 << (bits - 1)) - 1,
        });
    }
    Ok((value as u32) & low_mask(bits))
}

/// Check an unsigned field.
pub fn unsigned_field(value: u64, bits: u32) -> Result<u32, AsmError> {
    if !fits_unsigned(value, bits) {
        return Err(AsmError::ImmediateOverflow {
            value: value as i128,
            min: 0,
            max: (1i128 << bits) - 1,
        });
    }
    Ok(value as u32)
}

/// Sign-extend the low `bits` bits of `field`.
#[inline]
pub fn sign_extend(field: u32, bits: u32) -> i64 {
    let shift = 64 - bits;
    (((field as u64) << shift) as i64) >> shift
}

#[inline]
fn low_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

// ── Arithmetic (ADD/SUB) ─────────────────────────────────────────────────

/// Whether `value` is an ADD/SUB immediate: `imm12` or `imm12 << 12`.
pub fn is_arith_imm(value: u64) -> bool {
    value <= 0xFFF || (value & 0xFFF == 0 && value >> 12 <= 0xFFF)
}

/// Encode an ADD/SUB immediate as `sh << 22 | imm12 << 10`.
///
/// # Examples
///
/// ```
/// use risc_asm::imm::encode_arith_imm;
///
/// assert_eq!(encode_arith_imm(0x123)?, 0x123 << 10);
/// assert_eq!(encode_arith_imm(0x45_6000)?, (1 << 22) | (0x456 << 10));
/// assert!(encode_arith_imm(0x1001).is_err());
/// # Ok::<(), risc_asm::AsmError>(())
/// ```
pub fn encode_arith_imm(value: u64) -> Result<u32, AsmError> {
    if value <= 0xFFF {
        return Ok((value as u32) << 10);
    }
    if value & 0xFFF == 0 && value >> 12 <= 0xFFF {
        return Ok((1 << 22) | (((value >> 12) as u32) << 10));
    }
    Err(AsmError::InvalidImmediate {
        kind: ImmKind::Arithmetic,
        value,
    })
}

/// Recover the value of an ADD/SUB immediate field produced by [`encode_arith_imm`].
pub fn decode_arith_imm(field: u32) -> u64 {
    let imm12 = ((field >> 10) & 0xFFF) as u64;
    if field & (1 << 22) != 0 {
        imm12 << 12
    } else {
        imm12
    }
}

// ── Floating point (FMOV) ────────────────────────────────────────────────

/// Whether `value` is an FMOV double immediate.
///
/// The bit pattern must be `a:~b:bbbbbbbb:cdefgh` followed by 48 zero bits.
pub fn is_f64_imm(value: f64) -> bool {
    let bits = value.to_bits();
    if bits & 0x0000_FFFF_FFFF_FFFF != 0 {
        return false;
    }
    let b_run = (bits >> 54) & 0xFF;
    if b_run != 0 && b_run != 0xFF {
        return false;
    }
    ((bits >> 62) & 1) != ((bits >> 61) & 1)
}

/// Whether `value` is an FMOV single immediate.
///
/// The bit pattern must be `a:~b:bbbbb:cdefgh` followed by 19 zero bits.
pub fn is_f32_imm(value: f32) -> bool {
    let bits = value.to_bits();
    if bits & 0x7_FFFF != 0 {
        return false;
    }
    let b_run = (bits >> 25) & 0x1F;
    if b_run != 0 && b_run != 0x1F {
        return false;
    }
    ((bits >> 30) & 1) != ((bits >> 29) & 1)
}

/// Encode an FMOV double immediate into its 8-bit `imm8` form.
pub fn encode_f64_imm(value: f64) -> Result<u32, AsmError> {
    if !is_f64_imm(value) {
        return Err(AsmError::InvalidImmediate {
            kind: ImmKind::Float,
            value: value.to_bits(),
        });
    }
    let bits = value.to_bits();
    let a = ((bits >> 63) & 1) as u32;
    let b = ((bits >> 61) & 1) as u32;
    let cdefgh = ((bits >> 48) & 0x3F) as u32;
    Ok((a << 7) | (b << 6) | cdefgh)
}

/// Encode an FMOV single immediate into its 8-bit `imm8` form.
pub fn encode_f32_imm(value: f32) -> Result<u32, AsmError> {
    if !is_f32_imm(value) {
        return Err(AsmError::InvalidImmediate {
            kind: ImmKind::Float,
            value: value.to_bits() as u64,
        });
    }
    let bits = value.to_bits();
    let a = (bits >> 31) & 1;
    let b = (bits >> 29) & 1;
    let cdefgh = (bits >> 19) & 0x3F;
    Ok((a << 7) | (b << 6) | cdefgh)
}

/// Expand an 8-bit FMOV immediate back into the double it denotes.
pub fn decode_fp_imm8(imm8: u32) -> f64 {
    let a = ((imm8 >> 7) & 1) as u64;
    let b = ((imm8 >> 6) & 1) as u64;
    let cdefgh = (imm8 & 0x3F) as u64;
    let b_run = if b == 1 { 0xFF } else { 0 };
    let bits = (a << 63) | ((b ^ 1) << 62) | (b_run << 54) | (cdefgh << 48);
    f64::from_bits(bits)
}

// ── Branch displacements ─────────────────────────────────────────────────

/// A PC-relative displacement field: `bits` wide in bytes, stored right-shifted
/// by `align_log2`.
///
/// # Examples
///
/// ```
/// use risc_asm::imm::BranchDisplacement;
///
/// let b = BranchDisplacement::A64_IMM26;
/// assert_eq!(b.encode(8)?, 2);
/// assert_eq!(b.encode(-4)?, 0x03FF_FFFF);
/// assert!(b.encode(1 << 27).is_err());
/// assert!(b.encode(6).is_err());
/// # Ok::<(), risc_asm::AsmError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchDisplacement {
    bits: u32,
    align_log2: u32,
}

impl BranchDisplacement {
    /// AArch64 B/BL: ±128 MiB.
    pub const A64_IMM26: Self = Self::new(28, 2);
    /// AArch64 B.cond, CBZ/CBNZ, LDR (literal): ±1 MiB.
    pub const A64_IMM19: Self = Self::new(21, 2);
    /// AArch64 TBZ/TBNZ: ±32 KiB.
    pub const A64_IMM14: Self = Self::new(16, 2);
    /// AArch64 ADR: ±1 MiB, byte granular.
    pub const A64_ADR: Self = Self::new(21, 0);
    /// PowerPC I-form `LI` (b, ba, bl, bla): ±32 MiB.
    pub const PPC_LI: Self = Self::new(26, 2);
    /// PowerPC B-form `BD` (bc family): ±32 KiB.
    pub const PPC_BD: Self = Self::new(16, 2);

    /// A field spanning `bits` bits of byte displacement whose low
    /// `align_log2` bits must be zero.
    pub const fn new(bits: u32, align_log2: u32) -> Self {
        Self { bits, align_log2 }
    }

    /// Smallest encodable displacement.
    pub const fn min(&self) -> i64 {
        -(1i64 << (self.bits - 1))
    }

    /// Largest encodable displacement.
    pub const fn max(&self) -> i64 {
        (1i64 << (self.bits - 1)) - (1i64 << self.align_log2)
    }

    /// Required alignment in bytes.
    pub const fn align(&self) -> u64 {
        1u64 << self.align_log2
    }

    /// Width of the stored field.
    pub const fn field_bits(&self) -> u32 {
        self.bits - self.align_log2
    }

    /// Validate range and alignment of `disp`.
    pub fn check(&self, disp: i64) -> Result<(), AsmError> {
        if disp < self.min() || disp > self.max() {
            return Err(AsmError::BranchOutOfRange {
                disp,
                min: self.min(),
                max: self.max(),
            });
        }
        if disp & (self.align() as i64 - 1) != 0 {
            return Err(AsmError::MisalignedDisplacement {
                disp,
                align: self.align(),
            });
        }
        Ok(())
    }

    /// Validate `disp` and return the right-shifted field value, masked to
    /// [`field_bits`](Self::field_bits).
    pub fn encode(&self, disp: i64) -> Result<u32, AsmError> {
        self.check(disp)?;
        Ok(((disp >> self.align_log2) as u32) & low_mask(self.field_bits()))
    }

    /// Recover the byte displacement from a field produced by [`encode`](Self::encode).
    pub fn decode(&self, field: u32) -> i64 {
        sign_extend(field & low_mask(self.field_bits()), self.field_bits()) << self.align_log2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arith_boundaries() {
        assert!(is_arith_imm(0));
        assert!(is_arith_imm(0xFFF));
        assert!(!is_arith_imm(0x1000 + 1));
        assert!(is_arith_imm(0x1000));
        assert!(is_arith_imm(0xFFF000));
        assert!(!is_arith_imm(0x1000000));
        assert!(!is_arith_imm(u64::MAX));
    }

    #[test]
    fn arith_round_trip() {
        for v in [0u64, 1, 0x7FF, 0xFFF, 0x1000, 0x5000, 0xFFF000] {
            let field = encode_arith_imm(v).unwrap();
            assert_eq!(decode_arith_imm(field), v, "value {:#x}", v);
        }
    }

    #[test]
    fn arith_rejects_without_truncation() {
        let err = encode_arith_imm(0x1234).unwrap_err();
        assert_eq!(
            err,
            AsmError::InvalidImmediate {
                kind: ImmKind::Arithmetic,
                value: 0x1234
            }
        );
    }

    #[test]
    fn f64_known_encodings() {
        assert_eq!(encode_f64_imm(1.0).unwrap(), 0x70);
        assert_eq!(encode_f64_imm(2.0).unwrap(), 0x00);
        assert_eq!(encode_f64_imm(0.5).unwrap(), 0x60);
        assert_eq!(encode_f64_imm(-1.0).unwrap(), 0xF0);
        assert_eq!(encode_f64_imm(31.0).unwrap(), 0x3F);
        assert_eq!(encode_f64_imm(0.125).unwrap(), 0x40);
    }

    #[test]
    fn f64_rejects() {
        assert!(!is_f64_imm(0.0));
        assert!(!is_f64_imm(0.1));
        assert!(!is_f64_imm(32.0));
        assert!(!is_f64_imm(f64::NAN));
        assert!(!is_f64_imm(f64::INFINITY));
        assert!(encode_f64_imm(1.1).is_err());
    }

    #[test]
    fn f32_matches_f64_encoding() {
        for v in [1.0f32, 2.0, 0.5, -1.0, 31.0, 0.125, 1.5, -3.75] {
            assert_eq!(
                encode_f32_imm(v).unwrap(),
                encode_f64_imm(v as f64).unwrap(),
                "value {}",
                v
            );
        }
        assert!(!is_f32_imm(0.0));
        assert!(!is_f32_imm(0.1));
    }

    #[test]
    fn fp_imm8_exhaustive_round_trip() {
        for imm8 in 0..256u32 {
            let v = decode_fp_imm8(imm8);
            assert!(is_f64_imm(v), "imm8 {:#x} -> {}", imm8, v);
            assert_eq!(encode_f64_imm(v).unwrap(), imm8);
            assert_eq!(encode_f32_imm(v as f32).unwrap(), imm8);
        }
    }

    #[test]
    fn displacement_limits() {
        let b = BranchDisplacement::A64_IMM26;
        assert_eq!(b.min(), -(1 << 27));
        assert_eq!(b.max(), (1 << 27) - 4);
        assert_eq!(BranchDisplacement::A64_IMM19.max(), (1 << 20) - 4);
        assert_eq!(BranchDisplacement::A64_ADR.max(), (1 << 20) - 1);
        assert_eq!(BranchDisplacement::PPC_LI.max(), 33_554_428);
        assert_eq!(BranchDisplacement::PPC_LI.min(), -33_554_432);
        assert_eq!(BranchDisplacement::PPC_BD.max(), 32_764);
        assert_eq!(BranchDisplacement::PPC_BD.min(), -32_768);
    }

    #[test]
    fn displacement_one_past_range_is_rejected() {
        for b in [
            BranchDisplacement::A64_IMM26,
            BranchDisplacement::A64_IMM19,
            BranchDisplacement::A64_IMM14,
            BranchDisplacement::A64_ADR,
            BranchDisplacement::PPC_LI,
            BranchDisplacement::PPC_BD,
        ] {
            assert!(b.check(b.max()).is_ok());
            assert!(b.check(b.min()).is_ok());
            let step = b.align() as i64;
            assert!(matches!(
                b.check(b.max() + step),
                Err(AsmError::BranchOutOfRange { .. })
            ));
            assert!(matches!(
                b.check(b.min() - step),
                Err(AsmError::BranchOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn displacement_misaligned() {
        assert_eq!(
            BranchDisplacement::PPC_BD.check(2),
            Err(AsmError::MisalignedDisplacement { disp: 2, align: 4 })
        );
        assert!(BranchDisplacement::A64_ADR.check(3).is_ok());
    }

    #[test]
    fn displacement_round_trip() {
        let b = BranchDisplacement::A64_IMM19;
        for disp in [0i64, 4, -4, 1024, -1024, b.max(), b.min()] {
            assert_eq!(b.decode(b.encode(disp).unwrap()), disp);
        }
    }

    #[test]
    fn signed_and_unsigned_fields() {
        assert_eq!(signed_field(-1, 9).unwrap(), 0x1FF);
        assert_eq!(signed_field(255, 9).unwrap(), 0xFF);
        assert!(signed_field(256, 9).is_err());
        assert!(signed_field(-257, 9).is_err());
        assert_eq!(unsigned_field(0xFFFF, 16).unwrap(), 0xFFFF);
        assert_eq!(
            unsigned_field(0x10000, 16).unwrap_err(),
            AsmError::ImmediateOverflow {
                value: 0x10000,
                min: 0,
                max: 0xFFFF
            }
        );
        assert_eq!(sign_extend(0x1FF, 9), -1);
        assert_eq!(sign_extend(0x0FF, 9), 255);
    }
}
