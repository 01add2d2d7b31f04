//! PowerPC assembler (32-bit and 64-bit).
//!
//! Instructions are 32 bits, stored big-endian, with the primary opcode in
//! the top six bits. Branches come in two label-relative forms:
//!
//! - **I-form** `b`/`ba`/`bl`/`bla`: 24-bit word displacement (`LI`), ±32 MiB
//! - **B-form** `bc`/`bca`/`bcl`/`bcla`: 14-bit word displacement (`BD`), ±32 KiB
//!
//! The `AA` variants (`ba`, `bla`, `bca`, `bcla`) encode the absolute target
//! address instead of a displacement. The conditional mnemonics (`beq`,
//! `bdnz`, ...) are spelled in terms of `bc` with a [`Bo`] value and a CR bit.

use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::assembler::{Arch, AssemblyResult, Emitter};
use crate::error::AsmError;
use crate::imm::{signed_field, unsigned_field, BranchDisplacement};
use crate::label::{FixupForm, Label};

/// `nop` (`ori 0, 0, 0`), also used as code padding.
pub const NOP: u32 = 0x6000_0000;

const OP_B: u32 = 18;
const OP_BC: u32 = 16;
const OP_XL: u32 = 19;
const OP_X: u32 = 31;

// ── Operands ─────────────────────────────────────────────────────────────

/// General-purpose register `r0`..`r31`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gpr(pub u8);

/// Stack pointer by ABI convention.
pub const SP: Gpr = Gpr(1);

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Condition-register field `cr0`..`cr7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Crf(pub u8);

impl fmt::Display for Crf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cr{}", self.0)
    }
}

/// Bit within a condition-register field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CrBit {
    /// Less than.
    Lt = 0,
    /// Greater than.
    Gt = 1,
    /// Equal.
    Eq = 2,
    /// Summary overflow.
    So = 3,
}

/// Static branch-prediction hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Prediction {
    /// No hint.
    #[default]
    None,
    /// Likely taken (`+` / `++` suffix).
    Taken,
    /// Likely not taken (`-` / `--` suffix).
    NotTaken,
}

/// The 5-bit `BO` field of a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bo(pub u8);

impl Bo {
    /// Decrement CTR, branch if CTR != 0 and the CR bit is false.
    pub const DNZF: Bo = Bo(0);
    /// Decrement CTR, branch if CTR == 0 and the CR bit is false.
    pub const DZF: Bo = Bo(2);
    /// Branch if the CR bit is false.
    pub const FALSE: Bo = Bo(4);
    /// Decrement CTR, branch if CTR != 0 and the CR bit is true.
    pub const DNZT: Bo = Bo(8);
    /// Decrement CTR, branch if CTR == 0 and the CR bit is true.
    pub const DZT: Bo = Bo(10);
    /// Branch if the CR bit is true.
    pub const TRUE: Bo = Bo(12);
    /// Decrement CTR, branch if CTR != 0.
    pub const DNZ: Bo = Bo(16);
    /// Decrement CTR, branch if CTR == 0.
    pub const DZ: Bo = Bo(18);
    /// Branch always.
    pub const ALWAYS: Bo = Bo(20);

    /// Add a prediction hint.
    ///
    /// Only the CR-only forms ([`Bo::TRUE`], [`Bo::FALSE`]) and the CTR-only
    /// forms ([`Bo::DNZ`], [`Bo::DZ`]) have hint bits.
    pub fn with_prediction(self, prediction: Prediction) -> Result<Bo, AsmError> {
        let hint = match (self.0, prediction) {
            (_, Prediction::None) => 0,
            (4 | 12, Prediction::Taken) => 0b00011,
            (4 | 12, Prediction::NotTaken) => 0b00010,
            (16 | 18, Prediction::Taken) => 0b01001,
            (16 | 18, Prediction::NotTaken) => 0b01000,
            _ => {
                return Err(AsmError::InvalidOperands {
                    detail: format!("BO {} has no prediction bits", self.0),
                })
            }
        };
        Ok(Bo(self.0 | hint))
    }
}

// ── Fixups ───────────────────────────────────────────────────────────────

/// A label-relative PowerPC branch with every operand but its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpcFixup {
    /// I-form `b`.
    Branch {
        /// `AA`: encode the absolute target.
        absolute: bool,
        /// `LK`: write the return address to LR.
        link: bool,
    },
    /// B-form `bc`.
    CondBranch {
        /// `BO` field.
        bo: u32,
        /// `BI` field.
        bi: u32,
        /// `AA`: encode the absolute target.
        absolute: bool,
        /// `LK`: write the return address to LR.
        link: bool,
    },
}

impl FixupForm for PpcFixup {
    fn encode(&self, origin: u64, target: u64) -> Result<u32, AsmError> {
        Ok(match *self {
            PpcFixup::Branch { absolute, link } => {
                let li = BranchDisplacement::PPC_LI.encode(branch_value(absolute, origin, target))?;
                (OP_B << 26) | (li << 2) | (u32::from(absolute) << 1) | u32::from(link)
            }
            PpcFixup::CondBranch {
                bo,
                bi,
                absolute,
                link,
            } => {
                let bd = BranchDisplacement::PPC_BD.encode(branch_value(absolute, origin, target))?;
                (OP_BC << 26)
                    | (bo << 21)
                    | (bi << 16)
                    | (bd << 2)
                    | (u32::from(absolute) << 1)
                    | u32::from(link)
            }
        })
    }
}

/// Absolute branches sign-extend their field, so the target is read as signed.
fn branch_value(absolute: bool, origin: u64, target: u64) -> i64 {
    if absolute {
        target as i64
    } else {
        target.wrapping_sub(origin) as i64
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn invalid_ops(mnemonic: &str, detail: impl fmt::Display) -> AsmError {
    AsmError::InvalidOperands {
        detail: format!("{}: {}", mnemonic, detail),
    }
}

fn gpr(mnemonic: &str, r: Gpr) -> Result<u32, AsmError> {
    if r.0 > 31 {
        return Err(invalid_ops(mnemonic, format!("{} is not a register", r)));
    }
    Ok(r.0 as u32)
}

fn crf(mnemonic: &str, c: Crf) -> Result<u32, AsmError> {
    if c.0 > 7 {
        return Err(invalid_ops(mnemonic, format!("{} is not a CR field", c)));
    }
    Ok(c.0 as u32)
}

fn bo_bi(mnemonic: &str, bo: Bo, bi: u32) -> Result<(u32, u32), AsmError> {
    if bo.0 > 31 {
        return Err(invalid_ops(mnemonic, format!("BO {} exceeds 5 bits", bo.0)));
    }
    if bi > 31 {
        return Err(invalid_ops(mnemonic, format!("BI {} exceeds 5 bits", bi)));
    }
    Ok((bo.0 as u32, bi))
}

fn si16(value: i32) -> Result<u32, AsmError> {
    signed_field(value as i64, 16)
}

// ── Assembler ────────────────────────────────────────────────────────────

/// PowerPC assembler.
///
/// # Examples
///
/// ```
/// use risc_asm::ppc::PpcAssembler;
///
/// let mut asm = PpcAssembler::ppc32();
/// let l = asm.new_label()?;
/// asm.b(l)?;
/// asm.bind(l)?;
/// let result = asm.finish()?;
/// assert_eq!(result.bytes(), &[0x48, 0x00, 0x00, 0x04]);
/// # Ok::<(), risc_asm::AsmError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PpcAssembler {
    core: Emitter<PpcFixup>,
}

impl Deref for PpcAssembler {
    type Target = Emitter<PpcFixup>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl DerefMut for PpcAssembler {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.core
    }
}

impl PpcAssembler {
    /// Assembler for 32-bit PowerPC.
    pub fn ppc32() -> Self {
        Self {
            core: Emitter::new(Arch::Ppc32),
        }
    }

    /// Assembler for 64-bit PowerPC.
    pub fn ppc64() -> Self {
        Self {
            core: Emitter::new(Arch::Ppc64),
        }
    }

    /// Finish the unit; fails if any label reference is unresolved.
    pub fn finish(self) -> Result<AssemblyResult, AsmError> {
        self.core.finish()
    }

    /// Pad with `nop` up to a power-of-two boundary.
    pub fn align_code(&mut self, alignment: u64) -> Result<(), AsmError> {
        self.core.align(alignment, &NOP.to_be_bytes())
    }

    fn require_64(&self, mnemonic: &str) -> Result<(), AsmError> {
        if !self.core.arch().is_64bit() {
            return Err(invalid_ops(mnemonic, "requires 64-bit PowerPC"));
        }
        Ok(())
    }

    // ── I-form branches ──────────────────────────────────────────────────

    /// `b label`
    pub fn b(&mut self, label: Label) -> Result<(), AsmError> {
        self.branch(label, false, false)
    }

    /// `ba label`
    pub fn ba(&mut self, label: Label) -> Result<(), AsmError> {
        self.branch(label, true, false)
    }

    /// `bl label`
    pub fn bl(&mut self, label: Label) -> Result<(), AsmError> {
        self.branch(label, false, true)
    }

    /// `bla label`
    pub fn bla(&mut self, label: Label) -> Result<(), AsmError> {
        self.branch(label, true, true)
    }

    fn branch(&mut self, label: Label, absolute: bool, link: bool) -> Result<(), AsmError> {
        self.core
            .emit_with_label(label, PpcFixup::Branch { absolute, link })
    }

    // ── B-form branches ──────────────────────────────────────────────────

    /// `bc BO, BI, label`
    pub fn bc(&mut self, bo: Bo, bi: u32, label: Label) -> Result<(), AsmError> {
        self.cond_branch("bc", bo, bi, label, false, false)
    }

    /// `bca BO, BI, label`
    pub fn bca(&mut self, bo: Bo, bi: u32, label: Label) -> Result<(), AsmError> {
        self.cond_branch("bca", bo, bi, label, true, false)
    }

    /// `bcl BO, BI, label`
    pub fn bcl(&mut self, bo: Bo, bi: u32, label: Label) -> Result<(), AsmError> {
        self.cond_branch("bcl", bo, bi, label, false, true)
    }

    /// `bcla BO, BI, label`
    pub fn bcla(&mut self, bo: Bo, bi: u32, label: Label) -> Result<(), AsmError> {
        self.cond_branch("bcla", bo, bi, label, true, true)
    }

    fn cond_branch(
        &mut self,
        mnemonic: &str,
        bo: Bo,
        bi: u32,
        label: Label,
        absolute: bool,
        link: bool,
    ) -> Result<(), AsmError> {
        let (bo, bi) = bo_bi(mnemonic, bo, bi)?;
        let form = PpcFixup::CondBranch {
            bo,
            bi,
            absolute,
            link,
        };
        self.core.emit_with_label(label, form)
    }

    /// `bt BI, label`: branch if CR bit `bi` is set.
    pub fn bt(&mut self, bi: u32, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.bc(Bo::TRUE.with_prediction(prediction)?, bi, label)
    }

    /// `bf BI, label`: branch if CR bit `bi` is clear.
    pub fn bf(&mut self, bi: u32, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.bc(Bo::FALSE.with_prediction(prediction)?, bi, label)
    }

    /// `bdnz label`: decrement CTR, branch if it is non-zero.
    pub fn bdnz(&mut self, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.bc(Bo::DNZ.with_prediction(prediction)?, 0, label)
    }

    /// `bdz label`: decrement CTR, branch if it is zero.
    pub fn bdz(&mut self, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.bc(Bo::DZ.with_prediction(prediction)?, 0, label)
    }

    fn cr_branch(
        &mut self,
        mnemonic: &str,
        when: bool,
        field: Crf,
        bit: CrBit,
        label: Label,
        prediction: Prediction,
    ) -> Result<(), AsmError> {
        let bi = crf(mnemonic, field)? * 4 + bit as u32;
        let bo = if when { Bo::TRUE } else { Bo::FALSE };
        self.cond_branch(mnemonic, bo.with_prediction(prediction)?, bi, label, false, false)
    }

    /// `blt crf, label`
    pub fn blt(&mut self, field: Crf, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.cr_branch("blt", true, field, CrBit::Lt, label, prediction)
    }

    /// `ble crf, label`
    pub fn ble(&mut self, field: Crf, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.cr_branch("ble", false, field, CrBit::Gt, label, prediction)
    }

    /// `beq crf, label`
    pub fn beq(&mut self, field: Crf, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.cr_branch("beq", true, field, CrBit::Eq, label, prediction)
    }

    /// `bge crf, label`
    pub fn bge(&mut self, field: Crf, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.cr_branch("bge", false, field, CrBit::Lt, label, prediction)
    }

    /// `bgt crf, label`
    pub fn bgt(&mut self, field: Crf, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.cr_branch("bgt", true, field, CrBit::Gt, label, prediction)
    }

    /// `bne crf, label`
    pub fn bne(&mut self, field: Crf, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.cr_branch("bne", false, field, CrBit::Eq, label, prediction)
    }

    /// `bso crf, label`
    pub fn bso(&mut self, field: Crf, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.cr_branch("bso", true, field, CrBit::So, label, prediction)
    }

    /// `bns crf, label`
    pub fn bns(&mut self, field: Crf, label: Label, prediction: Prediction) -> Result<(), AsmError> {
        self.cr_branch("bns", false, field, CrBit::So, label, prediction)
    }

    // ── XL-form branches ─────────────────────────────────────────────────

    /// `bclr BO, BI`
    pub fn bclr(&mut self, bo: Bo, bi: u32) -> Result<(), AsmError> {
        self.branch_spr("bclr", bo, bi, 16, false)
    }

    /// `bcctr BO, BI`
    pub fn bcctr(&mut self, bo: Bo, bi: u32) -> Result<(), AsmError> {
        self.branch_spr("bcctr", bo, bi, 528, false)
    }

    /// `blr`
    pub fn blr(&mut self) -> Result<(), AsmError> {
        self.branch_spr("blr", Bo::ALWAYS, 0, 16, false)
    }

    /// `blrl`
    pub fn blrl(&mut self) -> Result<(), AsmError> {
        self.branch_spr("blrl", Bo::ALWAYS, 0, 16, true)
    }

    /// `bctr`
    pub fn bctr(&mut self) -> Result<(), AsmError> {
        self.branch_spr("bctr", Bo::ALWAYS, 0, 528, false)
    }

    /// `bctrl`
    pub fn bctrl(&mut self) -> Result<(), AsmError> {
        self.branch_spr("bctrl", Bo::ALWAYS, 0, 528, true)
    }

    fn branch_spr(
        &mut self,
        mnemonic: &str,
        bo: Bo,
        bi: u32,
        xo: u32,
        link: bool,
    ) -> Result<(), AsmError> {
        let (bo, bi) = bo_bi(mnemonic, bo, bi)?;
        self.core
            .emit_word((OP_XL << 26) | (bo << 21) | (bi << 16) | (xo << 1) | u32::from(link))
    }

    // ── D-form arithmetic and loads ──────────────────────────────────────

    fn d_form(&mut self, mnemonic: &str, opcd: u32, rt: Gpr, ra: Gpr, imm: u32) -> Result<(), AsmError> {
        let rt = gpr(mnemonic, rt)?;
        let ra = gpr(mnemonic, ra)?;
        self.core
            .emit_word((opcd << 26) | (rt << 21) | (ra << 16) | imm)
    }

    /// `addi rt, ra, si` (`ra` = r0 reads as zero)
    pub fn addi(&mut self, rt: Gpr, ra: Gpr, si: i32) -> Result<(), AsmError> {
        self.d_form("addi", 14, rt, ra, si16(si)?)
    }

    /// `addis rt, ra, si`
    pub fn addis(&mut self, rt: Gpr, ra: Gpr, si: i32) -> Result<(), AsmError> {
        self.d_form("addis", 15, rt, ra, si16(si)?)
    }

    /// `li rt, si`
    pub fn li(&mut self, rt: Gpr, si: i32) -> Result<(), AsmError> {
        self.addi(rt, Gpr(0), si)
    }

    /// `lis rt, si`
    pub fn lis(&mut self, rt: Gpr, si: i32) -> Result<(), AsmError> {
        self.addis(rt, Gpr(0), si)
    }

    /// `ori ra, rs, ui`
    pub fn ori(&mut self, ra: Gpr, rs: Gpr, ui: u32) -> Result<(), AsmError> {
        let ui = unsigned_field(ui as u64, 16)?;
        self.d_form("ori", 24, rs, ra, ui)
    }

    /// `oris ra, rs, ui`
    pub fn oris(&mut self, ra: Gpr, rs: Gpr, ui: u32) -> Result<(), AsmError> {
        let ui = unsigned_field(ui as u64, 16)?;
        self.d_form("oris", 25, rs, ra, ui)
    }

    /// `lwz rt, d(ra)`
    pub fn lwz(&mut self, rt: Gpr, d: i32, ra: Gpr) -> Result<(), AsmError> {
        self.d_form("lwz", 32, rt, ra, si16(d)?)
    }

    /// `stw rs, d(ra)`
    pub fn stw(&mut self, rs: Gpr, d: i32, ra: Gpr) -> Result<(), AsmError> {
        self.d_form("stw", 36, rs, ra, si16(d)?)
    }

    /// `ld rt, ds(ra)` (64-bit only)
    pub fn ld(&mut self, rt: Gpr, ds: i32, ra: Gpr) -> Result<(), AsmError> {
        self.ds_form("ld", 58, 0, rt, ds, ra)
    }

    /// `std rs, ds(ra)` (64-bit only)
    pub fn std(&mut self, rs: Gpr, ds: i32, ra: Gpr) -> Result<(), AsmError> {
        self.ds_form("std", 62, 0, rs, ds, ra)
    }

    fn ds_form(
        &mut self,
        mnemonic: &str,
        opcd: u32,
        xo: u32,
        rt: Gpr,
        ds: i32,
        ra: Gpr,
    ) -> Result<(), AsmError> {
        self.require_64(mnemonic)?;
        if ds & 3 != 0 {
            return Err(invalid_ops(mnemonic, format!("offset {} is not a multiple of 4", ds)));
        }
        let field = si16(ds)? & 0xFFFC;
        self.d_form(mnemonic, opcd, rt, ra, field | xo)
    }

    // ── Compares ─────────────────────────────────────────────────────────

    /// `cmpwi crf, ra, si`
    pub fn cmpwi(&mut self, field: Crf, ra: Gpr, si: i32) -> Result<(), AsmError> {
        self.cmp_imm("cmpwi", field, false, ra, si)
    }

    /// `cmpdi crf, ra, si` (64-bit only)
    pub fn cmpdi(&mut self, field: Crf, ra: Gpr, si: i32) -> Result<(), AsmError> {
        self.require_64("cmpdi")?;
        self.cmp_imm("cmpdi", field, true, ra, si)
    }

    fn cmp_imm(
        &mut self,
        mnemonic: &str,
        field: Crf,
        doubleword: bool,
        ra: Gpr,
        si: i32,
    ) -> Result<(), AsmError> {
        let bf = crf(mnemonic, field)?;
        let ra = gpr(mnemonic, ra)?;
        let si = si16(si)?;
        self.core.emit_word(
            (11 << 26) | (bf << 23) | (u32::from(doubleword) << 21) | (ra << 16) | si,
        )
    }

    /// `cmpw crf, ra, rb`
    pub fn cmpw(&mut self, field: Crf, ra: Gpr, rb: Gpr) -> Result<(), AsmError> {
        let bf = crf("cmpw", field)?;
        self.x_form("cmpw", bf << 2, ra, rb, 0, false)
    }

    // ── X/XO-form register operations ────────────────────────────────────

    /// `(31 << 26) | rt << 21 | ra << 16 | rb << 11 | xo << 1 | rc`
    fn x_form(
        &mut self,
        mnemonic: &str,
        rt: u32,
        ra: Gpr,
        rb: Gpr,
        xo: u32,
        rc: bool,
    ) -> Result<(), AsmError> {
        let ra = gpr(mnemonic, ra)?;
        let rb = gpr(mnemonic, rb)?;
        self.core.emit_word(
            (OP_X << 26) | (rt << 21) | (ra << 16) | (rb << 11) | (xo << 1) | u32::from(rc),
        )
    }

    /// `add rt, ra, rb`
    pub fn add(&mut self, rt: Gpr, ra: Gpr, rb: Gpr) -> Result<(), AsmError> {
        let rt = gpr("add", rt)?;
        self.x_form("add", rt, ra, rb, 266, false)
    }

    /// `subf rt, ra, rb` (rt = rb - ra)
    pub fn subf(&mut self, rt: Gpr, ra: Gpr, rb: Gpr) -> Result<(), AsmError> {
        let rt = gpr("subf", rt)?;
        self.x_form("subf", rt, ra, rb, 40, false)
    }

    /// `or ra, rs, rb`
    pub fn or(&mut self, ra: Gpr, rs: Gpr, rb: Gpr) -> Result<(), AsmError> {
        let rs = gpr("or", rs)?;
        self.x_form("or", rs, ra, rb, 444, false)
    }

    /// `mr ra, rs`
    pub fn mr(&mut self, ra: Gpr, rs: Gpr) -> Result<(), AsmError> {
        self.or(ra, rs, rs)
    }

    /// `nop`
    pub fn nop(&mut self) -> Result<(), AsmError> {
        self.core.emit_word(NOP)
    }

    // ── Special-purpose registers ────────────────────────────────────────

    fn spr_move(&mut self, mnemonic: &str, xo: u32, r: Gpr, spr: u32) -> Result<(), AsmError> {
        let r = gpr(mnemonic, r)?;
        // The SPR number is stored with its two 5-bit halves swapped.
        let field = ((spr & 0x1F) << 5) | (spr >> 5);
        self.core
            .emit_word((OP_X << 26) | (r << 21) | (field << 11) | (xo << 1))
    }

    /// `mtctr rs`
    pub fn mtctr(&mut self, rs: Gpr) -> Result<(), AsmError> {
        self.spr_move("mtctr", 467, rs, 9)
    }

    /// `mtlr rs`
    pub fn mtlr(&mut self, rs: Gpr) -> Result<(), AsmError> {
        self.spr_move("mtlr", 467, rs, 8)
    }

    /// `mflr rt`
    pub fn mflr(&mut self, rt: Gpr) -> Result<(), AsmError> {
        self.spr_move("mflr", 339, rt, 8)
    }

    /// `mfctr rt`
    pub fn mfctr(&mut self, rt: Gpr) -> Result<(), AsmError> {
        self.spr_move("mfctr", 339, rt, 9)
    }
}
