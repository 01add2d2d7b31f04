//! AArch64 (ARM64) assembler.
//!
//! All A64 instructions are 32 bits, stored little-endian. The top bits
//! encode the instruction class, register fields are always 5 bits, and the
//! `sf` bit selects between 32-bit (W) and 64-bit (X) variants.
//!
//! ## Encoding Classes
//!
//! - **Data processing (immediate)**: ADD/SUB with shifted imm12,
//!   AND/ORR/EOR/ANDS with bitmask immediates, MOVZ/MOVN/MOVK
//! - **Data processing (register)**: ADD/SUB/AND/ORR/EOR with shifted Rm
//! - **Branch**: B/BL (imm26), B.cond/CBZ/CBNZ (imm19), TBZ/TBNZ (imm14),
//!   BR/BLR/RET
//! - **Load/Store**: every [`Address`] mode, LDP/STP, LDR (literal)
//! - **Floating point**: FMOV (immediate)
//!
//! Label operands go through [`Emitter::emit_with_label`]: a bound label is
//! encoded on the spot, an unbound one leaves a placeholder that
//! [`A64Fixup`] rebuilds when the label is bound.

mod address;
mod regs;

use core::fmt::Display;
use core::ops::{Deref, DerefMut};

pub use address::{Address, AddressingMode};
pub use regs::{Cond, ExtendType, Reg, ShiftType, VReg, Width, FP, LR};

use address::Mode;

use crate::assembler::{Arch, AssemblyResult, Emitter};
use crate::bitmask::{encode_logical_imm, LogicalImmediateTable};
use crate::error::{AsmError, ImmKind};
use crate::imm::{
    encode_arith_imm, encode_f32_imm, encode_f64_imm, signed_field, unsigned_field,
    BranchDisplacement,
};
use crate::label::{FixupForm, Label};

// ── Opcode bases ─────────────────────────────────────────────────────────

const ADD_SUB_IMM: u32 = 0x1100_0000;
const LOGICAL_IMM: u32 = 0x1200_0000;
const MOVE_WIDE_IMM: u32 = 0x1280_0000;
const ADD_SUB_SHIFTED: u32 = 0x0B00_0000;
const LOGICAL_SHIFTED: u32 = 0x0A00_0000;
const UNCOND_BRANCH_IMM: u32 = 0x1400_0000;
const COND_BRANCH_IMM: u32 = 0x5400_0000;
const COMPARE_BRANCH: u32 = 0x3400_0000;
const TEST_BRANCH: u32 = 0x3600_0000;
const PC_REL_ADR: u32 = 0x1000_0000;
const LOAD_LITERAL: u32 = 0x1800_0000;
const LDST_SCALED: u32 = 0x3900_0000;
const LDST_UNSCALED: u32 = 0x3800_0000;
const LDST_POST_INDEXED: u32 = 0x3800_0400;
const LDST_PRE_INDEXED: u32 = 0x3800_0C00;
const LDST_REGISTER: u32 = 0x3820_0800;
const LDST_PAIR: u32 = 0x2800_0000;
const FP_IMM: u32 = 0x1E20_1000;

const BR: u32 = 0xD61F_0000;
const BLR: u32 = 0xD63F_0000;
const RET: u32 = 0xD65F_0000;
const BRK: u32 = 0xD420_0000;
/// `NOP`, also used as code padding.
pub const NOP: u32 = 0xD503_201F;

// ── Fixups ───────────────────────────────────────────────────────────────

/// A label-relative AArch64 instruction with every operand but its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum A64Fixup {
    /// `B` / `BL`.
    Branch {
        /// Set for `BL`.
        link: bool,
    },
    /// `B.cond`.
    CondBranch {
        /// Condition tested.
        cond: Cond,
    },
    /// `CBZ` / `CBNZ`.
    CompareBranch {
        /// Set for `CBNZ`.
        nonzero: bool,
        /// `sf` bit.
        sf: u32,
        /// Tested register.
        rt: u32,
    },
    /// `TBZ` / `TBNZ`.
    TestBranch {
        /// Set for `TBNZ`.
        nonzero: bool,
        /// Bit number 0..=63.
        bit: u32,
        /// Tested register.
        rt: u32,
    },
    /// `ADR`.
    Adr {
        /// Destination register.
        rd: u32,
    },
    /// `LDR (literal)`.
    LoadLiteral {
        /// `opc` field (size of the load).
        opc: u32,
        /// Set for SIMD&FP registers.
        fp: bool,
        /// Destination register.
        rt: u32,
    },
}

impl FixupForm for A64Fixup {
    fn encode(&self, origin: u64, target: u64) -> Result<u32, AsmError> {
        let disp = target.wrapping_sub(origin) as i64;
        Ok(match *self {
            A64Fixup::Branch { link } => {
                let imm26 = BranchDisplacement::A64_IMM26.encode(disp)?;
                UNCOND_BRANCH_IMM | (u32::from(link) << 31) | imm26
            }
            A64Fixup::CondBranch { cond } => {
                let imm19 = BranchDisplacement::A64_IMM19.encode(disp)?;
                COND_BRANCH_IMM | (imm19 << 5) | cond.code()
            }
            A64Fixup::CompareBranch { nonzero, sf, rt } => {
                let imm19 = BranchDisplacement::A64_IMM19.encode(disp)?;
                (sf << 31) | COMPARE_BRANCH | (u32::from(nonzero) << 24) | (imm19 << 5) | rt
            }
            A64Fixup::TestBranch { nonzero, bit, rt } => {
                let imm14 = BranchDisplacement::A64_IMM14.encode(disp)?;
                ((bit >> 5) << 31)
                    | TEST_BRANCH
                    | (u32::from(nonzero) << 24)
                    | ((bit & 0x1F) << 19)
                    | (imm14 << 5)
                    | rt
            }
            A64Fixup::Adr { rd } => {
                let imm21 = BranchDisplacement::A64_ADR.encode(disp)?;
                PC_REL_ADR | ((imm21 & 3) << 29) | ((imm21 >> 2) << 5) | rd
            }
            A64Fixup::LoadLiteral { opc, fp, rt } => {
                let imm19 = BranchDisplacement::A64_IMM19.encode(disp)?;
                (opc << 30) | LOAD_LITERAL | (u32::from(fp) << 26) | (imm19 << 5) | rt
            }
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn invalid_ops(mnemonic: &str, detail: impl Display) -> AsmError {
    AsmError::InvalidOperands {
        detail: format!("{}: {}", mnemonic, detail),
    }
}

/// Register field where number 31 means SP.
fn gpr_or_sp(mnemonic: &str, reg: Reg) -> Result<u32, AsmError> {
    if reg.is_zr() {
        return Err(invalid_ops(mnemonic, format!("{} is not allowed here", reg)));
    }
    reg.code()
}

/// Register field where number 31 means ZR.
fn gpr_or_zr(mnemonic: &str, reg: Reg) -> Result<u32, AsmError> {
    if reg.is_sp() {
        return Err(invalid_ops(mnemonic, format!("{} is not allowed here", reg)));
    }
    reg.code()
}

fn same_width(mnemonic: &str, regs: &[Reg]) -> Result<Width, AsmError> {
    let width = regs[0].width();
    if regs.iter().any(|r| r.width() != width) {
        return Err(invalid_ops(mnemonic, "register width mismatch"));
    }
    Ok(width)
}

fn require_x(mnemonic: &str, reg: Reg) -> Result<(), AsmError> {
    if reg.width() != Width::W64 {
        return Err(invalid_ops(mnemonic, format!("expected a 64-bit register, got {}", reg)));
    }
    Ok(())
}

fn halfword(value: u64, index: u32) -> u32 {
    ((value >> (16 * index)) & 0xFFFF) as u32
}

/// Load/store with a register-based address. `PcLiteral` is handled by the caller.
fn encode_ldst(
    mnemonic: &str,
    size: u32,
    fp: bool,
    opc: u32,
    addr: &Address,
    rt: u32,
) -> Result<u32, AsmError> {
    let common = (size << 30) | (u32::from(fp) << 26) | (opc << 22) | rt;
    Ok(match addr.0 {
        Mode::Base(base) => LDST_SCALED | common | (base.code()? << 5),
        Mode::Scaled { base, imm12 } => LDST_SCALED | common | (imm12 << 10) | (base.code()? << 5),
        Mode::Unscaled { base, imm9 } => {
            LDST_UNSCALED | common | (signed_field(imm9 as i64, 9)? << 12) | (base.code()? << 5)
        }
        Mode::PreIndexed { base, imm9 } => {
            LDST_PRE_INDEXED | common | (signed_field(imm9 as i64, 9)? << 12) | (base.code()? << 5)
        }
        Mode::PostIndexed { base, imm9 } => {
            LDST_POST_INDEXED | common | (signed_field(imm9 as i64, 9)? << 12) | (base.code()? << 5)
        }
        Mode::Register {
            base,
            offset,
            scaled,
        } => {
            LDST_REGISTER
                | common
                | (offset.code()? << 16)
                | ((ExtendType::Uxtx as u32) << 13)
                | (u32::from(scaled) << 12)
                | (base.code()? << 5)
        }
        Mode::Extended {
            base,
            offset,
            extend,
            scaled,
        } => {
            LDST_REGISTER
                | common
                | (offset.code()? << 16)
                | ((extend as u32) << 13)
                | (u32::from(scaled) << 12)
                | (base.code()? << 5)
        }
        Mode::PcLiteral { .. } => {
            return Err(AsmError::InvalidAddress {
                detail: format!("{}: PC-relative literal is not allowed here", mnemonic),
            })
        }
    })
}

/// Index mode of an `LDP`/`STP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairIndex {
    /// `[Xn, #imm]`
    Offset,
    /// `[Xn, #imm]!`
    PreIndex,
    /// `[Xn], #imm`
    PostIndex,
}

// ── Assembler ────────────────────────────────────────────────────────────

/// AArch64 assembler.
///
/// Label management, configuration and raw data emission come from the
/// wrapped [`Emitter`].
///
/// # Examples
///
/// ```
/// use risc_asm::aarch64::{Aarch64Assembler, Cond, Reg};
///
/// let mut asm = Aarch64Assembler::new();
/// let done = asm.new_label()?;
/// asm.cmp_imm(Reg::X(0), 0)?;
/// asm.b_cond(Cond::Eq, done)?;
/// asm.sub_imm(Reg::X(0), Reg::X(0), 1)?;
/// asm.bind(done)?;
/// asm.ret(Reg::X(30))?;
/// let result = asm.finish()?;
/// assert_eq!(
///     result.words().collect::<Vec<_>>(),
///     vec![0xF100_001F, 0x5400_0040, 0xD100_0400, 0xD65F_03C0]
/// );
/// # Ok::<(), risc_asm::AsmError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Aarch64Assembler {
    core: Emitter<A64Fixup>,
}

impl Default for Aarch64Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Aarch64Assembler {
    type Target = Emitter<A64Fixup>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl DerefMut for Aarch64Assembler {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.core
    }
}

impl Aarch64Assembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self {
            core: Emitter::new(Arch::Aarch64),
        }
    }

    /// Finish the unit; fails if any label reference is unresolved.
    pub fn finish(self) -> Result<AssemblyResult, AsmError> {
        self.core.finish()
    }

    /// Pad with `NOP` up to a power-of-two boundary.
    pub fn align_code(&mut self, alignment: u64) -> Result<(), AsmError> {
        self.core.align(alignment, &NOP.to_le_bytes())
    }

    // ── Branches ─────────────────────────────────────────────────────────

    /// `B label`
    pub fn b(&mut self, label: Label) -> Result<(), AsmError> {
        self.core
            .emit_with_label(label, A64Fixup::Branch { link: false })
    }

    /// `BL label`
    pub fn bl(&mut self, label: Label) -> Result<(), AsmError> {
        self.core.emit_with_label(label, A64Fixup::Branch { link: true })
    }

    /// `B.cond label`
    pub fn b_cond(&mut self, cond: Cond, label: Label) -> Result<(), AsmError> {
        self.core
            .emit_with_label(label, A64Fixup::CondBranch { cond })
    }

    /// `CBZ Rt, label`
    pub fn cbz(&mut self, rt: Reg, label: Label) -> Result<(), AsmError> {
        self.compare_branch("cbz", false, rt, label)
    }

    /// `CBNZ Rt, label`
    pub fn cbnz(&mut self, rt: Reg, label: Label) -> Result<(), AsmError> {
        self.compare_branch("cbnz", true, rt, label)
    }

    fn compare_branch(
        &mut self,
        mnemonic: &str,
        nonzero: bool,
        rt: Reg,
        label: Label,
    ) -> Result<(), AsmError> {
        let form = A64Fixup::CompareBranch {
            nonzero,
            sf: rt.width().sf(),
            rt: gpr_or_zr(mnemonic, rt)?,
        };
        self.core.emit_with_label(label, form)
    }

    /// `TBZ Rt, #bit, label`
    pub fn tbz(&mut self, rt: Reg, bit: u32, label: Label) -> Result<(), AsmError> {
        self.test_branch("tbz", false, rt, bit, label)
    }

    /// `TBNZ Rt, #bit, label`
    pub fn tbnz(&mut self, rt: Reg, bit: u32, label: Label) -> Result<(), AsmError> {
        self.test_branch("tbnz", true, rt, bit, label)
    }

    fn test_branch(
        &mut self,
        mnemonic: &str,
        nonzero: bool,
        rt: Reg,
        bit: u32,
        label: Label,
    ) -> Result<(), AsmError> {
        if bit >= rt.width().bits() {
            return Err(AsmError::ImmediateOverflow {
                value: bit as i128,
                min: 0,
                max: rt.width().bits() as i128 - 1,
            });
        }
        let form = A64Fixup::TestBranch {
            nonzero,
            bit,
            rt: gpr_or_zr(mnemonic, rt)?,
        };
        self.core.emit_with_label(label, form)
    }

    /// `ADR Xd, label`
    pub fn adr(&mut self, rd: Reg, label: Label) -> Result<(), AsmError> {
        require_x("adr", rd)?;
        let rd = gpr_or_zr("adr", rd)?;
        self.core.emit_with_label(label, A64Fixup::Adr { rd })
    }

    /// `LDR Rt, label`
    pub fn ldr_literal(&mut self, rt: Reg, label: Label) -> Result<(), AsmError> {
        let form = A64Fixup::LoadLiteral {
            opc: rt.width().sf(),
            fp: false,
            rt: gpr_or_zr("ldr", rt)?,
        };
        self.core.emit_with_label(label, form)
    }

    /// `BR Xn`
    pub fn br(&mut self, rn: Reg) -> Result<(), AsmError> {
        self.branch_reg("br", BR, rn)
    }

    /// `BLR Xn`
    pub fn blr(&mut self, rn: Reg) -> Result<(), AsmError> {
        self.branch_reg("blr", BLR, rn)
    }

    /// `RET Xn`
    pub fn ret(&mut self, rn: Reg) -> Result<(), AsmError> {
        self.branch_reg("ret", RET, rn)
    }

    fn branch_reg(&mut self, mnemonic: &str, base: u32, rn: Reg) -> Result<(), AsmError> {
        require_x(mnemonic, rn)?;
        let rn = gpr_or_zr(mnemonic, rn)?;
        self.core.emit_word(base | (rn << 5))
    }

    /// `NOP`
    pub fn nop(&mut self) -> Result<(), AsmError> {
        self.core.emit_word(NOP)
    }

    /// `BRK #imm16`
    pub fn brk(&mut self, imm16: u32) -> Result<(), AsmError> {
        let imm16 = unsigned_field(imm16 as u64, 16)?;
        self.core.emit_word(BRK | (imm16 << 5))
    }

    // ── Arithmetic immediate ─────────────────────────────────────────────

    /// `ADD Rd|SP, Rn|SP, #imm`
    pub fn add_imm(&mut self, rd: Reg, rn: Reg, imm: u64) -> Result<(), AsmError> {
        self.addsub_imm("add", 0, false, rd, rn, imm)
    }

    /// `ADDS Rd, Rn|SP, #imm`
    pub fn adds_imm(&mut self, rd: Reg, rn: Reg, imm: u64) -> Result<(), AsmError> {
        self.addsub_imm("adds", 0, true, rd, rn, imm)
    }

    /// `SUB Rd|SP, Rn|SP, #imm`
    pub fn sub_imm(&mut self, rd: Reg, rn: Reg, imm: u64) -> Result<(), AsmError> {
        self.addsub_imm("sub", 1, false, rd, rn, imm)
    }

    /// `SUBS Rd, Rn|SP, #imm`
    pub fn subs_imm(&mut self, rd: Reg, rn: Reg, imm: u64) -> Result<(), AsmError> {
        self.addsub_imm("subs", 1, true, rd, rn, imm)
    }

    /// `CMP Rn|SP, #imm` (alias of `SUBS ZR, Rn, #imm`)
    pub fn cmp_imm(&mut self, rn: Reg, imm: u64) -> Result<(), AsmError> {
        let zr = Reg::Xzr.with_width(rn.width());
        self.addsub_imm("cmp", 1, true, zr, rn, imm)
    }

    /// `CMN Rn|SP, #imm` (alias of `ADDS ZR, Rn, #imm`)
    pub fn cmn_imm(&mut self, rn: Reg, imm: u64) -> Result<(), AsmError> {
        let zr = Reg::Xzr.with_width(rn.width());
        self.addsub_imm("cmn", 0, true, zr, rn, imm)
    }

    fn addsub_imm(
        &mut self,
        mnemonic: &str,
        op: u32,
        set_flags: bool,
        rd: Reg,
        rn: Reg,
        imm: u64,
    ) -> Result<(), AsmError> {
        let width = same_width(mnemonic, &[rd, rn])?;
        let rd = if set_flags {
            gpr_or_zr(mnemonic, rd)?
        } else {
            gpr_or_sp(mnemonic, rd)?
        };
        let rn = gpr_or_sp(mnemonic, rn)?;
        let field = encode_arith_imm(imm)?;
        // sf|op|S|10001|sh|imm12|Rn|Rd
        let word = (width.sf() << 31)
            | (op << 30)
            | (u32::from(set_flags) << 29)
            | ADD_SUB_IMM
            | field
            | (rn << 5)
            | rd;
        self.core.emit_word(word)
    }

    // ── Logical immediate ────────────────────────────────────────────────

    /// `AND Rd|SP, Rn, #bitmask`
    pub fn and_imm(&mut self, rd: Reg, rn: Reg, imm: u64) -> Result<(), AsmError> {
        self.logical_imm("and", 0b00, rd, rn, imm)
    }

    /// `ORR Rd|SP, Rn, #bitmask`
    pub fn orr_imm(&mut self, rd: Reg, rn: Reg, imm: u64) -> Result<(), AsmError> {
        self.logical_imm("orr", 0b01, rd, rn, imm)
    }

    /// `EOR Rd|SP, Rn, #bitmask`
    pub fn eor_imm(&mut self, rd: Reg, rn: Reg, imm: u64) -> Result<(), AsmError> {
        self.logical_imm("eor", 0b10, rd, rn, imm)
    }

    /// `ANDS Rd, Rn, #bitmask`
    pub fn ands_imm(&mut self, rd: Reg, rn: Reg, imm: u64) -> Result<(), AsmError> {
        self.logical_imm("ands", 0b11, rd, rn, imm)
    }

    /// `TST Rn, #bitmask` (alias of `ANDS ZR, Rn, #bitmask`)
    pub fn tst_imm(&mut self, rn: Reg, imm: u64) -> Result<(), AsmError> {
        let zr = Reg::Xzr.with_width(rn.width());
        self.logical_imm("tst", 0b11, zr, rn, imm)
    }

    fn logical_imm(
        &mut self,
        mnemonic: &str,
        opc: u32,
        rd: Reg,
        rn: Reg,
        imm: u64,
    ) -> Result<(), AsmError> {
        let width = same_width(mnemonic, &[rd, rn])?;
        let rd = if opc == 0b11 {
            gpr_or_zr(mnemonic, rd)?
        } else {
            gpr_or_sp(mnemonic, rd)?
        };
        let rn = gpr_or_zr(mnemonic, rn)?;
        let field = encode_logical_imm(imm, width == Width::W64)?;
        // sf|opc|100100|N|immr|imms|Rn|Rd
        let word = (width.sf() << 31) | (opc << 29) | LOGICAL_IMM | field | (rn << 5) | rd;
        self.core.emit_word(word)
    }

    // ── Move wide ────────────────────────────────────────────────────────

    /// `MOVZ Rd, #imm16, LSL #shift`
    pub fn movz(&mut self, rd: Reg, imm16: u32, shift: u32) -> Result<(), AsmError> {
        self.move_wide("movz", 0b10, rd, imm16, shift)
    }

    /// `MOVK Rd, #imm16, LSL #shift`
    pub fn movk(&mut self, rd: Reg, imm16: u32, shift: u32) -> Result<(), AsmError> {
        self.move_wide("movk", 0b11, rd, imm16, shift)
    }

    /// `MOVN Rd, #imm16, LSL #shift`
    pub fn movn(&mut self, rd: Reg, imm16: u32, shift: u32) -> Result<(), AsmError> {
        self.move_wide("movn", 0b00, rd, imm16, shift)
    }

    fn move_wide(
        &mut self,
        mnemonic: &str,
        opc: u32,
        rd: Reg,
        imm16: u32,
        shift: u32,
    ) -> Result<(), AsmError> {
        let width = rd.width();
        if shift % 16 != 0 || shift >= width.bits() {
            return Err(invalid_ops(
                mnemonic,
                format!("shift {} must be a multiple of 16 below {}", shift, width.bits()),
            ));
        }
        let rd = gpr_or_zr(mnemonic, rd)?;
        let imm16 = unsigned_field(imm16 as u64, 16)?;
        // sf|opc|100101|hw|imm16|Rd
        let word = (width.sf() << 31)
            | (opc << 29)
            | MOVE_WIDE_IMM
            | ((shift / 16) << 21)
            | (imm16 << 5)
            | rd;
        self.core.emit_word(word)
    }

    /// Load an arbitrary constant with the shortest sequence.
    ///
    /// Tries a single `MOVZ`, a single `MOVN`, then `ORR` with a bitmask
    /// immediate, and finally `MOVZ` followed by one `MOVK` per remaining
    /// non-zero halfword.
    pub fn mov_imm(&mut self, rd: Reg, value: u64) -> Result<(), AsmError> {
        let width = rd.width();
        if width == Width::W32 && value >> 32 != 0 {
            return Err(AsmError::ImmediateOverflow {
                value: value as i128,
                min: 0,
                max: u32::MAX as i128,
            });
        }
        let halves = width.bits() / 16;
        let mask = if width == Width::W64 { u64::MAX } else { 0xFFFF_FFFF };
        let inverted = !value & mask;
        let nonzero = |v: u64| (0..halves).filter(|&i| halfword(v, i) != 0).count();

        if nonzero(value) <= 1 {
            let i = (0..halves).find(|&i| halfword(value, i) != 0).unwrap_or(0);
            return self.movz(rd, halfword(value, i), i * 16);
        }
        if nonzero(inverted) <= 1 {
            let i = (0..halves).find(|&i| halfword(inverted, i) != 0).unwrap_or(0);
            return self.movn(rd, halfword(inverted, i), i * 16);
        }
        if !rd.is_zr() {
            let table = LogicalImmediateTable::get();
            let fits = if width == Width::W64 {
                table.lookup64(value).is_some()
            } else {
                table.lookup32(value as u32).for_width(false).is_some()
            };
            if fits {
                return self.orr_imm(rd, Reg::Xzr.with_width(width), value);
            }
        }
        let mut first = true;
        for i in (0..halves).filter(|&i| halfword(value, i) != 0) {
            if first {
                self.movz(rd, halfword(value, i), i * 16)?;
                first = false;
            } else {
                self.movk(rd, halfword(value, i), i * 16)?;
            }
        }
        Ok(())
    }

    // ── Data processing (register) ───────────────────────────────────────

    /// `ADD Rd, Rn, Rm`
    pub fn add(&mut self, rd: Reg, rn: Reg, rm: Reg) -> Result<(), AsmError> {
        self.addsub_shifted("add", 0, false, rd, rn, rm, ShiftType::Lsl, 0)
    }

    /// `ADDS Rd, Rn, Rm`
    pub fn adds(&mut self, rd: Reg, rn: Reg, rm: Reg) -> Result<(), AsmError> {
        self.addsub_shifted("adds", 0, true, rd, rn, rm, ShiftType::Lsl, 0)
    }

    /// `SUB Rd, Rn, Rm`
    pub fn sub(&mut self, rd: Reg, rn: Reg, rm: Reg) -> Result<(), AsmError> {
        self.addsub_shifted("sub", 1, false, rd, rn, rm, ShiftType::Lsl, 0)
    }

    /// `SUBS Rd, Rn, Rm`
    pub fn subs(&mut self, rd: Reg, rn: Reg, rm: Reg) -> Result<(), AsmError> {
        self.addsub_shifted("subs", 1, true, rd, rn, rm, ShiftType::Lsl, 0)
    }

    /// `CMP Rn, Rm`
    pub fn cmp(&mut self, rn: Reg, rm: Reg) -> Result<(), AsmError> {
        let zr = Reg::Xzr.with_width(rn.width());
        self.addsub_shifted("cmp", 1, true, zr, rn, rm, ShiftType::Lsl, 0)
    }

    /// `ADD Rd, Rn, Rm, shift #amount`
    pub fn add_shifted(
        &mut self,
        rd: Reg,
        rn: Reg,
        rm: Reg,
        shift: ShiftType,
        amount: u32,
    ) -> Result<(), AsmError> {
        self.addsub_shifted("add", 0, false, rd, rn, rm, shift, amount)
    }

    /// `SUB Rd, Rn, Rm, shift #amount`
    pub fn sub_shifted(
        &mut self,
        rd: Reg,
        rn: Reg,
        rm: Reg,
        shift: ShiftType,
        amount: u32,
    ) -> Result<(), AsmError> {
        self.addsub_shifted("sub", 1, false, rd, rn, rm, shift, amount)
    }

    fn addsub_shifted(
        &mut self,
        mnemonic: &str,
        op: u32,
        set_flags: bool,
        rd: Reg,
        rn: Reg,
        rm: Reg,
        shift: ShiftType,
        amount: u32,
    ) -> Result<(), AsmError> {
        if shift == ShiftType::Ror {
            return Err(invalid_ops(mnemonic, "ROR is not a valid shift for add/sub"));
        }
        let word = self.shifted_fields(mnemonic, rd, rn, rm, shift, amount)?;
        // sf|op|S|01011|shift|0|Rm|imm6|Rn|Rd
        self.core
            .emit_word(word | (op << 30) | (u32::from(set_flags) << 29) | ADD_SUB_SHIFTED)
    }

    /// `AND Rd, Rn, Rm`
    pub fn and(&mut self, rd: Reg, rn: Reg, rm: Reg) -> Result<(), AsmError> {
        self.logical_shifted("and", 0b00, rd, rn, rm, ShiftType::Lsl, 0)
    }

    /// `ORR Rd, Rn, Rm`
    pub fn orr(&mut self, rd: Reg, rn: Reg, rm: Reg) -> Result<(), AsmError> {
        self.logical_shifted("orr", 0b01, rd, rn, rm, ShiftType::Lsl, 0)
    }

    /// `EOR Rd, Rn, Rm`
    pub fn eor(&mut self, rd: Reg, rn: Reg, rm: Reg) -> Result<(), AsmError> {
        self.logical_shifted("eor", 0b10, rd, rn, rm, ShiftType::Lsl, 0)
    }

    /// `ANDS Rd, Rn, Rm`
    pub fn ands(&mut self, rd: Reg, rn: Reg, rm: Reg) -> Result<(), AsmError> {
        self.logical_shifted("ands", 0b11, rd, rn, rm, ShiftType::Lsl, 0)
    }

    /// `ORR Rd, Rn, Rm, shift #amount`
    pub fn orr_shifted(
        &mut self,
        rd: Reg,
        rn: Reg,
        rm: Reg,
        shift: ShiftType,
        amount: u32,
    ) -> Result<(), AsmError> {
        self.logical_shifted("orr", 0b01, rd, rn, rm, shift, amount)
    }

    fn logical_shifted(
        &mut self,
        mnemonic: &str,
        opc: u32,
        rd: Reg,
        rn: Reg,
        rm: Reg,
        shift: ShiftType,
        amount: u32,
    ) -> Result<(), AsmError> {
        let word = self.shifted_fields(mnemonic, rd, rn, rm, shift, amount)?;
        // sf|opc|01010|shift|N=0|Rm|imm6|Rn|Rd
        self.core.emit_word(word | (opc << 29) | LOGICAL_SHIFTED)
    }

    /// Shared `sf|shift|Rm|imm6|Rn|Rd` fields of the shifted-register class.
    fn shifted_fields(
        &self,
        mnemonic: &str,
        rd: Reg,
        rn: Reg,
        rm: Reg,
        shift: ShiftType,
        amount: u32,
    ) -> Result<u32, AsmError> {
        let width = same_width(mnemonic, &[rd, rn, rm])?;
        if amount >= width.bits() {
            return Err(AsmError::ImmediateOverflow {
                value: amount as i128,
                min: 0,
                max: width.bits() as i128 - 1,
            });
        }
        let rd = gpr_or_zr(mnemonic, rd)?;
        let rn = gpr_or_zr(mnemonic, rn)?;
        let rm = gpr_or_zr(mnemonic, rm)?;
        Ok((width.sf() << 31)
            | ((shift as u32) << 22)
            | (rm << 16)
            | (amount << 10)
            | (rn << 5)
            | rd)
    }

    /// `MOV Rd, Rm`
    ///
    /// Moves involving SP are encoded as `ADD Rd, Rn, #0`, everything else as
    /// `ORR Rd, ZR, Rm`.
    pub fn mov(&mut self, rd: Reg, rm: Reg) -> Result<(), AsmError> {
        if rd.is_sp() || rm.is_sp() {
            return self.add_imm(rd, rm, 0);
        }
        let zr = Reg::Xzr.with_width(rd.width());
        self.logical_shifted("mov", 0b01, rd, zr, rm, ShiftType::Lsl, 0)
    }

    // ── Floating point ───────────────────────────────────────────────────

    /// `FMOV Sd|Dd, #imm`
    ///
    /// For `Sd` the value must be exactly representable as `f32`.
    pub fn fmov_imm(&mut self, vd: VReg, value: f64) -> Result<(), AsmError> {
        let rd = vd.code()?;
        let (ftype, imm8) = match vd {
            VReg::D(_) => (1u32, encode_f64_imm(value)?),
            VReg::S(_) => {
                let single = value as f32;
                if single as f64 != value {
                    return Err(AsmError::InvalidImmediate {
                        kind: ImmKind::Float,
                        value: value.to_bits(),
                    });
                }
                (0u32, encode_f32_imm(single)?)
            }
        };
        // 00011110|type|1|imm8|100|00000|Rd
        self.core
            .emit_word(FP_IMM | (ftype << 22) | (imm8 << 13) | rd)
    }

    // ── Loads and stores ─────────────────────────────────────────────────

    /// `LDR Wt|Xt, addr`
    pub fn ldr(&mut self, rt: Reg, addr: Address) -> Result<(), AsmError> {
        let size = 2 + rt.width().sf();
        let code = gpr_or_zr("ldr", rt)?;
        if let Mode::PcLiteral { disp } = addr.0 {
            let form = A64Fixup::LoadLiteral {
                opc: rt.width().sf(),
                fp: false,
                rt: code,
            };
            return self.emit_literal(form, disp);
        }
        self.load_store("ldr", size, false, 0b01, rt, addr)
    }

    /// `STR Wt|Xt, addr`
    pub fn str(&mut self, rt: Reg, addr: Address) -> Result<(), AsmError> {
        let size = 2 + rt.width().sf();
        self.load_store("str", size, false, 0b00, rt, addr)
    }

    /// `LDRB Wt, addr`
    pub fn ldrb(&mut self, rt: Reg, addr: Address) -> Result<(), AsmError> {
        self.load_store_narrow("ldrb", 0, 0b01, rt, addr)
    }

    /// `STRB Wt, addr`
    pub fn strb(&mut self, rt: Reg, addr: Address) -> Result<(), AsmError> {
        self.load_store_narrow("strb", 0, 0b00, rt, addr)
    }

    /// `LDRH Wt, addr`
    pub fn ldrh(&mut self, rt: Reg, addr: Address) -> Result<(), AsmError> {
        self.load_store_narrow("ldrh", 1, 0b01, rt, addr)
    }

    /// `STRH Wt, addr`
    pub fn strh(&mut self, rt: Reg, addr: Address) -> Result<(), AsmError> {
        self.load_store_narrow("strh", 1, 0b00, rt, addr)
    }

    fn load_store_narrow(
        &mut self,
        mnemonic: &str,
        size: u32,
        opc: u32,
        rt: Reg,
        addr: Address,
    ) -> Result<(), AsmError> {
        if rt.width() != Width::W32 {
            return Err(invalid_ops(mnemonic, format!("expected a 32-bit register, got {}", rt)));
        }
        self.load_store(mnemonic, size, false, opc, rt, addr)
    }

    /// `LDR St|Dt, addr`
    pub fn ldr_fp(&mut self, vt: VReg, addr: Address) -> Result<(), AsmError> {
        let rt = vt.code()?;
        if let Mode::PcLiteral { disp } = addr.0 {
            let form = A64Fixup::LoadLiteral {
                opc: vt.size_log2() - 2,
                fp: true,
                rt,
            };
            return self.emit_literal(form, disp);
        }
        let word = encode_ldst("ldr", vt.size_log2(), true, 0b01, &addr, rt)?;
        self.core.emit_word(word)
    }

    /// `STR St|Dt, addr`
    pub fn str_fp(&mut self, vt: VReg, addr: Address) -> Result<(), AsmError> {
        let rt = vt.code()?;
        let word = encode_ldst("str", vt.size_log2(), true, 0b00, &addr, rt)?;
        self.core.emit_word(word)
    }

    fn load_store(
        &mut self,
        mnemonic: &str,
        size: u32,
        fp: bool,
        opc: u32,
        rt: Reg,
        addr: Address,
    ) -> Result<(), AsmError> {
        let code = gpr_or_zr(mnemonic, rt)?;
        if addr.writes_back() {
            if let Some(base) = addr.base_register() {
                if !base.is_sp() && base.code()? == code {
                    return Err(invalid_ops(
                        mnemonic,
                        format!("writeback base {} overlaps transfer register {}", base, rt),
                    ));
                }
            }
        }
        let word = encode_ldst(mnemonic, size, fp, opc, &addr, code)?;
        self.core.emit_word(word)
    }

    /// A literal load whose displacement is already known.
    fn emit_literal(&mut self, form: A64Fixup, disp: i32) -> Result<(), AsmError> {
        let origin = self.core.current_address();
        let word = form.encode(origin, origin.wrapping_add(disp as i64 as u64))?;
        self.core.emit_word(word)
    }

    /// `LDP Rt1, Rt2, [Xn, #offset]` (with the given index mode)
    pub fn ldp(
        &mut self,
        rt1: Reg,
        rt2: Reg,
        base: Reg,
        offset: i32,
        index: PairIndex,
    ) -> Result<(), AsmError> {
        self.load_store_pair("ldp", true, rt1, rt2, base, offset, index)
    }

    /// `STP Rt1, Rt2, [Xn, #offset]` (with the given index mode)
    pub fn stp(
        &mut self,
        rt1: Reg,
        rt2: Reg,
        base: Reg,
        offset: i32,
        index: PairIndex,
    ) -> Result<(), AsmError> {
        self.load_store_pair("stp", false, rt1, rt2, base, offset, index)
    }

    fn load_store_pair(
        &mut self,
        mnemonic: &str,
        load: bool,
        rt1: Reg,
        rt2: Reg,
        base: Reg,
        offset: i32,
        index: PairIndex,
    ) -> Result<(), AsmError> {
        let width = same_width(mnemonic, &[rt1, rt2])?;
        let t1 = gpr_or_zr(mnemonic, rt1)?;
        let t2 = gpr_or_zr(mnemonic, rt2)?;
        if load && t1 == t2 {
            return Err(invalid_ops(mnemonic, "both destinations are the same register"));
        }
        Address::base(base)?;
        let rn = gpr_or_sp(mnemonic, base)?;
        if index != PairIndex::Offset && !base.is_sp() && (rn == t1 || rn == t2) {
            return Err(invalid_ops(mnemonic, "writeback base overlaps a transfer register"));
        }
        let unit = (width.bits() / 8) as i32;
        if offset % unit != 0 {
            return Err(invalid_ops(
                mnemonic,
                format!("offset {} is not a multiple of {}", offset, unit),
            ));
        }
        let imm7 = signed_field((offset / unit) as i64, 7)?;
        let opc = if width == Width::W64 { 0b10 } else { 0b00 };
        let idx = match index {
            PairIndex::PostIndex => 0b01,
            PairIndex::Offset => 0b10,
            PairIndex::PreIndex => 0b11,
        };
        // opc|101|V|idx|L|imm7|Rt2|Rn|Rt
        let word = (opc << 30)
            | LDST_PAIR
            | (idx << 23)
            | (u32::from(load) << 22)
            | (imm7 << 15)
            | (t2 << 10)
            | (rn << 5)
            | t1;
        self.core.emit_word(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(asm: Aarch64Assembler) -> Vec<u32> {
        asm.finish().unwrap().words().collect()
    }

    fn one(f: impl FnOnce(&mut Aarch64Assembler) -> Result<(), AsmError>) -> u32 {
        let mut asm = Aarch64Assembler::new();
        f(&mut asm).unwrap();
        let w = words(asm);
        assert_eq!(w.len(), 1);
        w[0]
    }

    // ── Data processing ──────────────────────────────────────────────────

    #[test]
    fn add_sub_immediate() {
        assert_eq!(one(|a| a.add_imm(Reg::X(0), Reg::X(1), 1)), 0x9100_0420);
        assert_eq!(one(|a| a.add_imm(Reg::X(0), Reg::X(1), 0x1000)), 0x9140_0420);
        assert_eq!(one(|a| a.sub_imm(Reg::Sp, Reg::Sp, 16)), 0xD100_43FF);
        assert_eq!(one(|a| a.cmp_imm(Reg::X(0), 5)), 0xF100_141F);
        assert_eq!(one(|a| a.add_imm(Reg::W(0), Reg::W(1), 1)), 0x1100_0420);
    }

    #[test]
    fn add_imm_rejects_bad_operands() {
        let mut asm = Aarch64Assembler::new();
        assert!(matches!(
            asm.add_imm(Reg::X(0), Reg::X(1), 0x1001),
            Err(AsmError::InvalidImmediate { kind: ImmKind::Arithmetic, .. })
        ));
        assert!(asm.add_imm(Reg::X(0), Reg::W(1), 1).is_err());
        assert!(asm.add_imm(Reg::Xzr, Reg::X(1), 1).is_err());
        assert!(asm.adds_imm(Reg::Sp, Reg::X(1), 1).is_err());
        assert_eq!(asm.position(), 0);
    }

    #[test]
    fn logical_immediate() {
        assert_eq!(one(|a| a.and_imm(Reg::X(0), Reg::X(1), 0xFF)), 0x9240_1C20);
        assert_eq!(one(|a| a.and_imm(Reg::W(0), Reg::W(1), 0xFF)), 0x1200_1C20);
        let mut asm = Aarch64Assembler::new();
        assert!(matches!(
            asm.orr_imm(Reg::W(0), Reg::W(1), 0),
            Err(AsmError::InvalidImmediate { kind: ImmKind::Logical, .. })
        ));
        assert!(asm.orr_imm(Reg::W(0), Reg::W(1), 0xFFFF_FFFF_0000_0000).is_err());
        assert!(asm.orr_imm(Reg::X(0), Reg::X(1), 0xFFFF_FFFF_0000_0000).is_ok());
    }

    #[test]
    fn move_wide() {
        assert_eq!(one(|a| a.movz(Reg::X(0), 0x1234, 0)), 0xD282_4680);
        assert_eq!(one(|a| a.movk(Reg::X(0), 0x5678, 16)), 0xF2AA_CF00);
        assert_eq!(one(|a| a.movn(Reg::X(0), 0, 0)), 0x9280_0000);
        let mut asm = Aarch64Assembler::new();
        assert!(asm.movz(Reg::W(0), 1, 32).is_err());
        assert!(asm.movz(Reg::X(0), 1, 8).is_err());
        assert!(asm.movz(Reg::X(0), 0x10000, 0).is_err());
    }

    #[test]
    fn mov_imm_sequences() {
        assert_eq!(one(|a| a.mov_imm(Reg::X(0), 0x1234)), 0xD282_4680);
        assert_eq!(one(|a| a.mov_imm(Reg::X(0), 0)), 0xD280_0000);
        assert_eq!(one(|a| a.mov_imm(Reg::X(0), 0xFFFF_FFFF_FFFF_FFFE)), 0x9280_0020);
        assert_eq!(one(|a| a.mov_imm(Reg::X(0), 0x00FF_00FF_00FF_00FF)), 0xB200_9FE0);

        let mut asm = Aarch64Assembler::new();
        asm.mov_imm(Reg::X(0), 0x1234_0000_5678).unwrap();
        assert_eq!(words(asm), vec![0xD28A_CF00, 0xF2C2_4680]);

        let mut asm = Aarch64Assembler::new();
        assert!(asm.mov_imm(Reg::W(0), 0x1_0000_0000).is_err());
    }

    #[test]
    fn register_forms() {
        assert_eq!(one(|a| a.add(Reg::X(0), Reg::X(1), Reg::X(2))), 0x8B02_0020);
        assert_eq!(one(|a| a.sub(Reg::W(0), Reg::W(1), Reg::W(2))), 0x4B02_0020);
        assert_eq!(one(|a| a.and(Reg::X(0), Reg::X(1), Reg::X(2))), 0x8A02_0020);
        assert_eq!(one(|a| a.eor(Reg::X(0), Reg::X(1), Reg::X(2))), 0xCA02_0020);
        assert_eq!(one(|a| a.mov(Reg::X(0), Reg::X(1))), 0xAA01_03E0);
        assert_eq!(one(|a| a.mov(Reg::X(0), Reg::Sp)), 0x9100_03E0);
        assert_eq!(one(|a| a.mov(Reg::Sp, Reg::X(0))), 0x9100_001F);
        assert_eq!(
            one(|a| a.add_shifted(Reg::X(0), Reg::X(1), Reg::X(2), ShiftType::Lsl, 3)),
            0x8B02_0C20
        );
        let mut asm = Aarch64Assembler::new();
        assert!(asm
            .add_shifted(Reg::X(0), Reg::X(1), Reg::X(2), ShiftType::Ror, 1)
            .is_err());
        assert!(asm
            .orr_shifted(Reg::W(0), Reg::W(1), Reg::W(2), ShiftType::Lsl, 32)
            .is_err());
        assert!(asm.add(Reg::Sp, Reg::X(1), Reg::X(2)).is_err());
    }

    #[test]
    fn fmov_immediate() {
        assert_eq!(one(|a| a.fmov_imm(VReg::D(0), 1.0)), 0x1E6E_1000);
        assert_eq!(one(|a| a.fmov_imm(VReg::S(0), 1.0)), 0x1E2E_1000);
        assert_eq!(one(|a| a.fmov_imm(VReg::D(3), 2.0)), 0x1E60_1003);
        let mut asm = Aarch64Assembler::new();
        assert!(asm.fmov_imm(VReg::D(0), 0.0).is_err());
        assert!(asm.fmov_imm(VReg::D(0), 0.1).is_err());
    }

    // ── Branches ─────────────────────────────────────────────────────────

    #[test]
    fn system_and_register_branches() {
        assert_eq!(one(|a| a.ret(LR)), 0xD65F_03C0);
        assert_eq!(one(|a| a.br(Reg::X(16))), 0xD61F_0200);
        assert_eq!(one(|a| a.blr(Reg::X(1))), 0xD63F_0020);
        assert_eq!(one(|a| a.nop()), 0xD503_201F);
        assert_eq!(one(|a| a.brk(1)), 0xD420_0020);
        let mut asm = Aarch64Assembler::new();
        assert!(asm.ret(Reg::W(30)).is_err());
    }

    #[test]
    fn forward_branch_family() {
        let mut asm = Aarch64Assembler::new();
        let l = asm.new_label().unwrap();
        asm.b(l).unwrap(); // 0, disp 32
        asm.bl(l).unwrap(); // 4, disp 28
        asm.b_cond(Cond::Ne, l).unwrap(); // 8, disp 24
        asm.cbz(Reg::X(0), l).unwrap(); // 12, disp 20
        asm.cbnz(Reg::W(1), l).unwrap(); // 16, disp 16
        asm.tbz(Reg::X(0), 33, l).unwrap(); // 20, disp 12
        asm.tbnz(Reg::W(3), 3, l).unwrap(); // 24, disp 8
        asm.adr(Reg::X(0), l).unwrap(); // 28, disp 4
        asm.bind(l).unwrap();
        assert_eq!(
            words(asm),
            vec![
                0x1400_0008,
                0x9400_0007,
                0x5400_00C1,
                0xB400_00A0,
                0x3500_0081,
                0xB608_0060,
                0x3718_0043,
                0x1000_0020,
            ]
        );
    }

    #[test]
    fn backward_branch() {
        let mut asm = Aarch64Assembler::new();
        let top = asm.new_label().unwrap();
        asm.bind(top).unwrap();
        asm.nop().unwrap();
        asm.b(top).unwrap();
        assert_eq!(words(asm), vec![NOP, 0x17FF_FFFF]);
    }

    #[test]
    fn adr_byte_granular() {
        let mut asm = Aarch64Assembler::new();
        let l = asm.new_label().unwrap();
        asm.adr(Reg::X(1), l).unwrap();
        asm.emit_bytes(&[0]).unwrap();
        asm.bind(l).unwrap();
        asm.emit_bytes(&[0, 0, 0]).unwrap();
        assert_eq!(asm.finish().unwrap().words().next(), Some(0x3000_0021));
    }

    #[test]
    fn misaligned_branch_target_is_rejected() {
        let mut asm = Aarch64Assembler::new();
        let l = asm.new_label().unwrap();
        asm.b(l).unwrap();
        asm.emit_bytes(&[0, 0]).unwrap();
        assert_eq!(
            asm.bind(l),
            Err(AsmError::MisalignedDisplacement { disp: 6, align: 4 })
        );
    }

    #[test]
    fn tbz_bit_range() {
        let mut asm = Aarch64Assembler::new();
        let l = asm.new_label().unwrap();
        assert!(asm.tbz(Reg::W(0), 32, l).is_err());
        assert!(asm.tbz(Reg::X(0), 64, l).is_err());
        assert!(asm.tbz(Reg::X(0), 63, l).is_ok());
    }

    // ── Loads and stores ─────────────────────────────────────────────────

    #[test]
    fn load_store_modes() {
        let x1 = Reg::X(1);
        assert_eq!(one(|a| a.ldr(Reg::X(0), Address::base(x1)?)), 0xF940_0020);
        assert_eq!(one(|a| a.ldr(Reg::X(0), Address::scaled(x1, 1)?)), 0xF940_0420);
        assert_eq!(one(|a| a.str(Reg::W(2), Address::scaled(Reg::Sp, 1)?)), 0xB900_07E2);
        assert_eq!(one(|a| a.ldr(Reg::X(0), Address::unscaled(x1, -8)?)), 0xF85F_8020);
        assert_eq!(one(|a| a.ldr(Reg::X(0), Address::post_indexed(x1, 8)?)), 0xF840_8420);
        assert_eq!(one(|a| a.str(Reg::X(0), Address::pre_indexed(Reg::Sp, -16)?)), 0xF81F_0FE0);
        assert_eq!(
            one(|a| a.ldr(Reg::X(0), Address::register_offset(x1, Reg::X(2), true)?)),
            0xF862_7820
        );
        assert_eq!(
            one(|a| a.ldr(
                Reg::W(0),
                Address::extended_register_offset(x1, Reg::W(2), ExtendType::Sxtw, true)?
            )),
            0xB862_D820
        );
        assert_eq!(one(|a| a.ldrb(Reg::W(0), Address::base(x1)?)), 0x3940_0020);
        assert_eq!(one(|a| a.strh(Reg::W(0), Address::scaled(x1, 1)?)), 0x7900_0420);
        assert_eq!(one(|a| a.ldr_fp(VReg::D(0), Address::scaled(x1, 1)?)), 0xFD40_0420);
    }

    #[test]
    fn pc_literal_loads() {
        assert_eq!(one(|a| a.ldr(Reg::X(0), Address::pc_literal(8)?)), 0x5800_0040);
        assert_eq!(one(|a| a.ldr(Reg::W(0), Address::pc_literal(8)?)), 0x1800_0040);
        assert_eq!(one(|a| a.ldr_fp(VReg::S(0), Address::pc_literal(8)?)), 0x1C00_0040);
        let mut asm = Aarch64Assembler::new();
        assert!(matches!(
            asm.str(Reg::X(0), Address::pc_literal(8).unwrap()),
            Err(AsmError::InvalidAddress { .. })
        ));
        assert!(asm.ldrb(Reg::W(0), Address::pc_literal(8).unwrap()).is_err());
    }

    #[test]
    fn ldr_literal_label() {
        let mut asm = Aarch64Assembler::new();
        let pool = asm.new_label().unwrap();
        asm.ldr_literal(Reg::X(0), pool).unwrap();
        asm.ret(LR).unwrap();
        asm.bind(pool).unwrap();
        asm.emit_u64(0xDEAD_BEEF_0000_0001).unwrap();
        let result = asm.finish().unwrap();
        let w: Vec<u32> = result.words().collect();
        assert_eq!(w[0], 0x5800_0040);
        assert_eq!(&result.bytes()[8..], &0xDEAD_BEEF_0000_0001u64.to_le_bytes());
    }

    #[test]
    fn load_store_operand_checks() {
        let mut asm = Aarch64Assembler::new();
        let x1 = Reg::X(1);
        assert!(asm.ldr(Reg::Sp, Address::base(x1).unwrap()).is_err());
        assert!(asm.ldrb(Reg::X(0), Address::base(x1).unwrap()).is_err());
        assert!(asm.ldr(x1, Address::post_indexed(x1, 8).unwrap()).is_err());
        assert!(asm.ldr(x1, Address::unscaled(x1, 8).unwrap()).is_ok());
    }

    #[test]
    fn load_store_pair() {
        let mut asm = Aarch64Assembler::new();
        asm.stp(FP, LR, Reg::Sp, -16, PairIndex::PreIndex).unwrap();
        asm.ldp(FP, LR, Reg::Sp, 16, PairIndex::PostIndex).unwrap();
        assert_eq!(words(asm), vec![0xA9BF_7BFD, 0xA8C1_7BFD]);

        let mut asm = Aarch64Assembler::new();
        assert!(asm.stp(FP, LR, Reg::Sp, 12, PairIndex::Offset).is_err());
        assert!(asm.stp(FP, LR, Reg::Sp, 512, PairIndex::Offset).is_err());
        assert!(asm.ldp(Reg::X(0), Reg::X(0), Reg::Sp, 0, PairIndex::Offset).is_err());
        assert!(asm.stp(Reg::X(0), Reg::W(1), Reg::Sp, 0, PairIndex::Offset).is_err());
    }

    #[test]
    fn align_code_pads_with_nop() {
        let mut asm = Aarch64Assembler::new();
        asm.ret(LR).unwrap();
        asm.align_code(16).unwrap();
        assert_eq!(words(asm), vec![0xD65F_03C0, NOP, NOP, NOP]);
    }
}
