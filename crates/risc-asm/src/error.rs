//! Error types for encoding and label resolution.

use core::fmt;

use thiserror::Error;

use crate::label::Label;

/// The immediate family that rejected a value, carried by
/// [`AsmError::InvalidImmediate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImmKind {
    /// Unsigned 12-bit value, optionally shifted left by 12.
    Arithmetic,
    /// AArch64 bitmask immediate (`N:immr:imms`).
    Logical,
    /// 8-bit restricted floating-point immediate.
    Float,
}

impl fmt::Display for ImmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImmKind::Arithmetic => write!(f, "arithmetic"),
            ImmKind::Logical => write!(f, "logical"),
            ImmKind::Float => write!(f, "floating-point"),
        }
    }
}

/// Encoding or label-resolution failure.
///
/// Every variant aborts the current compilation unit. Nothing is clamped,
/// truncated, or wrapped to make an operand fit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsmError {
    /// Invalid operand combination for the instruction.
    #[error("invalid operand combination: {detail}")]
    InvalidOperands {
        /// Description of why the operands are invalid.
        detail: String,
    },

    /// An addressing mode was built with fields it cannot encode.
    #[error("invalid addressing mode: {detail}")]
    InvalidAddress {
        /// Description of the violated constraint.
        detail: String,
    },

    /// Immediate value exceeds the allowed range.
    #[error("immediate value {value} out of range [{min}, {max}]")]
    ImmediateOverflow {
        /// The immediate value that overflowed.
        value: i128,
        /// Minimum allowed value.
        min: i128,
        /// Maximum allowed value.
        max: i128,
    },

    /// Immediate value has no encoding in the requested family.
    #[error("{kind} immediate {value:#x} is not encodable")]
    InvalidImmediate {
        /// The family that was asked to encode the value.
        kind: ImmKind,
        /// Raw bits of the rejected value.
        value: u64,
    },

    /// PC-relative displacement does not fit its field.
    #[error("branch displacement {disp} out of range [{min}, {max}]")]
    BranchOutOfRange {
        /// The actual displacement to the target.
        disp: i64,
        /// Minimum allowed displacement.
        min: i64,
        /// Maximum allowed displacement.
        max: i64,
    },

    /// PC-relative displacement is not a multiple of the field's unit.
    #[error("displacement {disp} is not a multiple of {align}")]
    MisalignedDisplacement {
        /// The displacement to the target.
        disp: i64,
        /// Required alignment in bytes.
        align: u64,
    },

    /// A label still has pending references when the unit is finished.
    #[error("label {label} is never bound ({sites} pending reference(s))")]
    UnresolvedLabel {
        /// The label that was never bound.
        label: Label,
        /// Number of instructions still waiting for it.
        sites: usize,
    },

    /// Label was bound (or fixed) more than once.
    #[error("label {label} is already bound")]
    DuplicateLabel {
        /// The label bound twice.
        label: Label,
    },

    /// Position of a label was requested before the label was bound.
    #[error("label {label} is not bound yet")]
    UnboundLabel {
        /// The unbound label.
        label: Label,
    },

    /// Label handle does not belong to this assembler.
    #[error("unknown label {label}")]
    UnknownLabel {
        /// The foreign label handle.
        label: Label,
    },

    /// A patch touched bytes that were never emitted.
    #[error("patch of {len} byte(s) at offset {offset} exceeds buffer of {size} byte(s)")]
    PatchOutOfBounds {
        /// Start of the patched region.
        offset: u64,
        /// Length of the patched region.
        len: usize,
        /// Current buffer length.
        size: usize,
    },

    /// A configurable resource limit was exceeded.
    #[error("resource limit exceeded: {resource} (limit: {limit})")]
    ResourceLimitExceeded {
        /// Human-readable name of the resource (e.g. "labels", "output bytes").
        resource: String,
        /// The configured limit that was exceeded.
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_operands() {
        let err = AsmError::InvalidOperands {
            detail: "add: register width mismatch".into(),
        };
        assert_eq!(
            format!("{}", err),
            "invalid operand combination: add: register width mismatch"
        );
    }

    #[test]
    fn display_immediate_overflow() {
        let err = AsmError::ImmediateOverflow {
            value: 70000,
            min: -32768,
            max: 32767,
        };
        assert_eq!(
            format!("{}", err),
            "immediate value 70000 out of range [-32768, 32767]"
        );
    }

    #[test]
    fn display_invalid_immediate() {
        let err = AsmError::InvalidImmediate {
            kind: ImmKind::Logical,
            value: 0,
        };
        assert_eq!(format!("{}", err), "logical immediate 0x0 is not encodable");
        let err = AsmError::InvalidImmediate {
            kind: ImmKind::Float,
            value: 0x3FF1_0000_0000_0000,
        };
        assert!(format!("{}", err).starts_with("floating-point immediate 0x3ff1"));
    }

    #[test]
    fn display_branch_out_of_range() {
        let err = AsmError::BranchOutOfRange {
            disp: 1 << 20,
            min: -(1 << 20),
            max: (1 << 20) - 4,
        };
        assert_eq!(
            format!("{}", err),
            "branch displacement 1048576 out of range [-1048576, 1048572]"
        );
    }

    #[test]
    fn display_label_errors() {
        let l = Label::from_index(3);
        assert_eq!(
            format!("{}", AsmError::UnresolvedLabel { label: l, sites: 2 }),
            "label L3 is never bound (2 pending reference(s))"
        );
        assert_eq!(
            format!("{}", AsmError::DuplicateLabel { label: l }),
            "label L3 is already bound"
        );
        assert_eq!(
            format!("{}", AsmError::UnboundLabel { label: l }),
            "label L3 is not bound yet"
        );
    }

    #[test]
    fn display_patch_out_of_bounds() {
        let err = AsmError::PatchOutOfBounds {
            offset: 8,
            len: 4,
            size: 10,
        };
        assert_eq!(
            format!("{}", err),
            "patch of 4 byte(s) at offset 8 exceeds buffer of 10 byte(s)"
        );
    }

    #[test]
    fn display_resource_limit() {
        let err = AsmError::ResourceLimitExceeded {
            resource: "labels".into(),
            limit: 100,
        };
        assert_eq!(
            format!("{}", err),
            "resource limit exceeded: labels (limit: 100)"
        );
    }

    #[test]
    fn errors_are_std_errors() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&AsmError::MisalignedDisplacement { disp: 6, align: 4 });
    }
}
