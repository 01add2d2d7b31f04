//! # risc-asm: Label-Resolving Assembler Core for AArch64 and PowerPC
//!
//! `risc-asm` emits fixed-width RISC machine code into a growable buffer,
//! resolving forward and backward label references as labels are bound.
//!
//! ## Quick Start
//!
//! ```rust
//! use risc_asm::aarch64::{Aarch64Assembler, Reg};
//!
//! let mut asm = Aarch64Assembler::new();
//! let done = asm.new_label()?;
//! asm.cbz(Reg::X(0), done)?;
//! asm.sub_imm(Reg::X(0), Reg::X(0), 1)?;
//! asm.bind(done)?;
//! asm.ret(Reg::X(30))?;
//! let result = asm.finish()?;
//! assert_eq!(result.len(), 12);
//! # Ok::<(), risc_asm::AsmError>(())
//! ```
//!
//! ## Features
//!
//! - **Two targets**: AArch64 (little-endian) and 32/64-bit PowerPC
//!   (big-endian), each behind its own cargo feature.
//! - **Labels**: forward references are emitted as placeholders and patched
//!   exactly once when the label is bound; labels may also be pinned to an
//!   absolute address outside the buffer.
//! - **Immediate encoders**: AArch64 arithmetic, logical bitmask and
//!   floating-point immediates plus every branch displacement field, usable
//!   on their own.
//! - **Checked operands**: out-of-range immediates and displacements are
//!   reported as [`AsmError`] values, never silently truncated.

#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// Instruction encoding is mostly narrowing casts and dense hex literals.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::fn_params_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::many_single_char_names,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

/// AArch64 assembler, registers and addressing modes.
#[cfg(feature = "aarch64")]
pub mod aarch64;
/// Architecture-independent emitter, limits and `AssemblyResult`.
pub mod assembler;
/// AArch64 logical (bitmask) immediate table.
pub mod bitmask;
/// Growable byte buffer with endian-aware word emission and patching.
pub mod buffer;
/// Error types.
pub mod error;
/// Immediate and displacement field encoders.
pub mod imm;
/// Labels and fixup sites.
pub mod label;
/// PowerPC assembler.
#[cfg(feature = "ppc")]
pub mod ppc;

// Re-exports
#[cfg(feature = "aarch64")]
pub use aarch64::Aarch64Assembler;
pub use assembler::{AppliedFixup, Arch, AssemblyResult, Emitter, ResourceLimits};
pub use buffer::{CodeBuffer, Endianness};
pub use error::{AsmError, ImmKind};
pub use label::{DataWidth, FixupForm, FixupSite, Label, LabelState, SiteKind};
#[cfg(feature = "ppc")]
pub use ppc::PpcAssembler;
