//! AArch64 load/store addressing modes.
//!
//! An [`Address`] can only be obtained through its constructors, which check
//! every field against the mode's encoding. The load/store encoders can
//! therefore trust whatever they are handed.

use super::regs::{ExtendType, Reg, Width};
use crate::error::AsmError;
use crate::imm::fits_signed;

/// Discriminant of an [`Address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    /// `[Xn]`
    BaseRegisterOnly,
    /// `[Xn, #uimm12 * size]`
    ImmediateScaled,
    /// `[Xn, #simm9]`
    ImmediateUnscaled,
    /// `[Xn, Xm{, LSL #size}]`
    RegisterOffset,
    /// `[Xn, Wm, UXTW|SXTW {#size}]` or `[Xn, Xm, SXTX {#size}]`
    ExtendedRegisterOffset,
    /// `label` (PC-relative literal)
    PcLiteral,
    /// `[Xn, #simm9]!`
    ImmediatePreIndexed,
    /// `[Xn], #simm9`
    ImmediatePostIndexed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Mode {
    Base(Reg),
    Scaled { base: Reg, imm12: u32 },
    Unscaled { base: Reg, imm9: i32 },
    Register { base: Reg, offset: Reg, scaled: bool },
    Extended { base: Reg, offset: Reg, extend: ExtendType, scaled: bool },
    PcLiteral { disp: i32 },
    PreIndexed { base: Reg, imm9: i32 },
    PostIndexed { base: Reg, imm9: i32 },
}

/// A validated load/store address.
///
/// # Examples
///
/// ```
/// use risc_asm::aarch64::{Address, AddressingMode, Reg};
///
/// let a = Address::scaled(Reg::X(1), 2)?;
/// assert_eq!(a.mode(), AddressingMode::ImmediateScaled);
/// assert!(Address::scaled(Reg::X(1), 4096).is_err());
/// assert!(Address::base(Reg::Xzr).is_err());
/// # Ok::<(), risc_asm::AsmError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub(crate) Mode);

fn invalid(detail: String) -> AsmError {
    AsmError::InvalidAddress { detail }
}

fn check_base(base: Reg) -> Result<Reg, AsmError> {
    base.code()?;
    if base.is_zr() || base.width() != Width::W64 {
        return Err(invalid(format!(
            "base register must be a 64-bit register or sp, got {}",
            base
        )));
    }
    Ok(base)
}

fn check_imm9(imm9: i32) -> Result<i32, AsmError> {
    if !fits_signed(imm9 as i64, 9) {
        return Err(invalid(format!("offset {} does not fit a signed 9-bit field", imm9)));
    }
    Ok(imm9)
}

impl Address {
    /// `[base]`
    pub fn base(base: Reg) -> Result<Self, AsmError> {
        Ok(Address(Mode::Base(check_base(base)?)))
    }

    /// `[base, #imm12 * size]`. `imm12` is already divided by the access size.
    pub fn scaled(base: Reg, imm12: u32) -> Result<Self, AsmError> {
        let base = check_base(base)?;
        if imm12 > 0xFFF {
            return Err(invalid(format!(
                "scaled offset {} does not fit an unsigned 12-bit field",
                imm12
            )));
        }
        Ok(Address(Mode::Scaled { base, imm12 }))
    }

    /// `[base, #imm9]` with a byte offset in -256..=255.
    pub fn unscaled(base: Reg, imm9: i32) -> Result<Self, AsmError> {
        Ok(Address(Mode::Unscaled {
            base: check_base(base)?,
            imm9: check_imm9(imm9)?,
        }))
    }

    /// `[base, offset{, LSL #size}]` with a 64-bit offset register.
    pub fn register_offset(base: Reg, offset: Reg, scaled: bool) -> Result<Self, AsmError> {
        let base = check_base(base)?;
        offset.code()?;
        if offset.is_sp() || offset.width() != Width::W64 {
            return Err(invalid(format!(
                "offset register must be a 64-bit general register, got {}",
                offset
            )));
        }
        Ok(Address(Mode::Register {
            base,
            offset,
            scaled,
        }))
    }

    /// `[base, offset, extend {#size}]`.
    ///
    /// `UXTW`/`SXTW` take a 32-bit offset register, `SXTX` a 64-bit one.
    pub fn extended_register_offset(
        base: Reg,
        offset: Reg,
        extend: ExtendType,
        scaled: bool,
    ) -> Result<Self, AsmError> {
        let base = check_base(base)?;
        offset.code()?;
        let want = match extend {
            ExtendType::Uxtw | ExtendType::Sxtw => Width::W32,
            ExtendType::Sxtx => Width::W64,
            other => {
                return Err(invalid(format!(
                    "{:?} is not a load/store index extension",
                    other
                )))
            }
        };
        if offset.is_sp() || offset.width() != want {
            return Err(invalid(format!(
                "{:?} needs a {}-bit offset register, got {}",
                extend,
                want.bits(),
                offset
            )));
        }
        Ok(Address(Mode::Extended {
            base,
            offset,
            extend,
            scaled,
        }))
    }

    /// PC-relative literal at byte displacement `disp`.
    pub fn pc_literal(disp: i32) -> Result<Self, AsmError> {
        if disp & 3 != 0 {
            return Err(invalid(format!("literal displacement {} is not word aligned", disp)));
        }
        if !fits_signed(disp as i64, 21) {
            return Err(invalid(format!(
                "literal displacement {} exceeds ±1 MiB",
                disp
            )));
        }
        Ok(Address(Mode::PcLiteral { disp }))
    }

    /// `[base, #imm9]!`
    pub fn pre_indexed(base: Reg, imm9: i32) -> Result<Self, AsmError> {
        Ok(Address(Mode::PreIndexed {
            base: check_base(base)?,
            imm9: check_imm9(imm9)?,
        }))
    }

    /// `[base], #imm9`
    pub fn post_indexed(base: Reg, imm9: i32) -> Result<Self, AsmError> {
        Ok(Address(Mode::PostIndexed {
            base: check_base(base)?,
            imm9: check_imm9(imm9)?,
        }))
    }

    /// Cheapest immediate form for a byte displacement from `base`, for an
    /// access of `1 << size_log2` bytes.
    ///
    /// Zero gives `[base]`; an aligned displacement within range gives the
    /// scaled form; anything else within ±256 gives the unscaled form.
    pub fn create(base: Reg, disp: i64, size_log2: u32) -> Result<Self, AsmError> {
        if size_log2 > 4 {
            return Err(invalid(format!("access size 1 << {} is too large", size_log2)));
        }
        if disp == 0 {
            return Address::base(base);
        }
        let unit = 1i64 << size_log2;
        if disp > 0 && disp % unit == 0 && disp / unit <= 0xFFF {
            return Address::scaled(base, (disp / unit) as u32);
        }
        if fits_signed(disp, 9) {
            return Address::unscaled(base, disp as i32);
        }
        Err(invalid(format!(
            "displacement {} is not reachable with an immediate offset",
            disp
        )))
    }

    /// Which addressing mode this is.
    pub fn mode(&self) -> AddressingMode {
        match self.0 {
            Mode::Base(_) => AddressingMode::BaseRegisterOnly,
            Mode::Scaled { .. } => AddressingMode::ImmediateScaled,
            Mode::Unscaled { .. } => AddressingMode::ImmediateUnscaled,
            Mode::Register { .. } => AddressingMode::RegisterOffset,
            Mode::Extended { .. } => AddressingMode::ExtendedRegisterOffset,
            Mode::PcLiteral { .. } => AddressingMode::PcLiteral,
            Mode::PreIndexed { .. } => AddressingMode::ImmediatePreIndexed,
            Mode::PostIndexed { .. } => AddressingMode::ImmediatePostIndexed,
        }
    }

    /// Base register, absent for PC-relative literals.
    pub fn base_register(&self) -> Option<Reg> {
        match self.0 {
            Mode::Base(base)
            | Mode::Scaled { base, .. }
            | Mode::Unscaled { base, .. }
            | Mode::Register { base, .. }
            | Mode::Extended { base, .. }
            | Mode::PreIndexed { base, .. }
            | Mode::PostIndexed { base, .. } => Some(base),
            Mode::PcLiteral { .. } => None,
        }
    }

    /// Whether the base register is written back.
    pub fn writes_back(&self) -> bool {
        matches!(self.0, Mode::PreIndexed { .. } | Mode::PostIndexed { .. })
    }
}
