//! AArch64 register, condition, shift and extend operands.

use core::fmt;

use crate::error::AsmError;

/// Operand width of a general-purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Width {
    /// 32-bit (`W` registers).
    W32,
    /// 64-bit (`X` registers).
    W64,
}

impl Width {
    /// Width in bits.
    pub fn bits(self) -> u32 {
        match self {
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }

    /// The `sf` bit.
    pub(crate) fn sf(self) -> u32 {
        match self {
            Width::W32 => 0,
            Width::W64 => 1,
        }
    }
}

/// A general-purpose register.
///
/// Register number 31 is either the stack pointer or the zero register
/// depending on the instruction, so both are spelled out as their own
/// variants and the encoders accept whichever one the field allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reg {
    /// `X0`..`X30`.
    X(u8),
    /// `W0`..`W30`.
    W(u8),
    /// 64-bit stack pointer.
    Sp,
    /// 32-bit stack pointer.
    Wsp,
    /// 64-bit zero register.
    Xzr,
    /// 32-bit zero register.
    Wzr,
}

/// Frame pointer.
pub const FP: Reg = Reg::X(29);
/// Link register.
pub const LR: Reg = Reg::X(30);

impl Reg {
    /// Operand width.
    pub fn width(self) -> Width {
        match self {
            Reg::X(_) | Reg::Sp | Reg::Xzr => Width::W64,
            Reg::W(_) | Reg::Wsp | Reg::Wzr => Width::W32,
        }
    }

    /// Whether this is `SP` or `WSP`.
    pub fn is_sp(self) -> bool {
        matches!(self, Reg::Sp | Reg::Wsp)
    }

    /// Whether this is `XZR` or `WZR`.
    pub fn is_zr(self) -> bool {
        matches!(self, Reg::Xzr | Reg::Wzr)
    }

    /// The same register at another width.
    pub fn with_width(self, width: Width) -> Reg {
        match (self, width) {
            (Reg::X(n) | Reg::W(n), Width::W64) => Reg::X(n),
            (Reg::X(n) | Reg::W(n), Width::W32) => Reg::W(n),
            (Reg::Sp | Reg::Wsp, Width::W64) => Reg::Sp,
            (Reg::Sp | Reg::Wsp, Width::W32) => Reg::Wsp,
            (Reg::Xzr | Reg::Wzr, Width::W64) => Reg::Xzr,
            (Reg::Xzr | Reg::Wzr, Width::W32) => Reg::Wzr,
        }
    }

    /// The 5-bit register field. Fails for register numbers above 30.
    pub fn code(self) -> Result<u32, AsmError> {
        match self {
            Reg::X(n) | Reg::W(n) if n <= 30 => Ok(n as u32),
            Reg::X(_) | Reg::W(_) => Err(AsmError::InvalidOperands {
                detail: format!("{} is not a general-purpose register", self),
            }),
            Reg::Sp | Reg::Wsp | Reg::Xzr | Reg::Wzr => Ok(31),
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::X(n) => write!(f, "x{}", n),
            Reg::W(n) => write!(f, "w{}", n),
            Reg::Sp => write!(f, "sp"),
            Reg::Wsp => write!(f, "wsp"),
            Reg::Xzr => write!(f, "xzr"),
            Reg::Wzr => write!(f, "wzr"),
        }
    }
}

/// A floating-point register viewed as single or double precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VReg {
    /// `S0`..`S31`.
    S(u8),
    /// `D0`..`D31`.
    D(u8),
}

impl VReg {
    /// The 5-bit register field.
    pub fn code(self) -> Result<u32, AsmError> {
        match self {
            VReg::S(n) | VReg::D(n) if n <= 31 => Ok(n as u32),
            _ => Err(AsmError::InvalidOperands {
                detail: format!("{} is not a floating-point register", self),
            }),
        }
    }

    /// `log2` of the register size in bytes.
    pub(crate) fn size_log2(self) -> u32 {
        match self {
            VReg::S(_) => 2,
            VReg::D(_) => 3,
        }
    }
}

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VReg::S(n) => write!(f, "s{}", n),
            VReg::D(n) => write!(f, "d{}", n),
        }
    }
}

/// Condition codes for `B.cond` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Cond {
    Eq = 0x0,
    Ne = 0x1,
    Hs = 0x2,
    Lo = 0x3,
    Mi = 0x4,
    Pl = 0x5,
    Vs = 0x6,
    Vc = 0x7,
    Hi = 0x8,
    Ls = 0x9,
    Ge = 0xA,
    Lt = 0xB,
    Gt = 0xC,
    Le = 0xD,
    Al = 0xE,
    Nv = 0xF,
}

impl Cond {
    /// 4-bit condition field.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// The opposite condition. `AL` and `NV` both mean "always" and are
    /// returned unchanged.
    pub fn negate(self) -> Cond {
        use Cond::*;
        match self {
            Eq => Ne,
            Ne => Eq,
            Hs => Lo,
            Lo => Hs,
            Mi => Pl,
            Pl => Mi,
            Vs => Vc,
            Vc => Vs,
            Hi => Ls,
            Ls => Hi,
            Ge => Lt,
            Lt => Ge,
            Gt => Le,
            Le => Gt,
            Al => Al,
            Nv => Nv,
        }
    }
}

/// Shift applied to the second register of a data-processing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShiftType {
    Lsl = 0,
    Lsr = 1,
    Asr = 2,
    Ror = 3,
}

/// Extension applied to an index register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExtendType {
    Uxtb = 0,
    Uxth = 1,
    Uxtw = 2,
    Uxtx = 3,
    Sxtb = 4,
    Sxth = 5,
    Sxtw = 6,
    Sxtx = 7,
}
