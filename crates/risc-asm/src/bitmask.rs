//! AArch64 logical ("bitmask") immediates.
//!
//! A logical immediate is a 2, 4, 8, 16, 32 or 64-bit element holding a single
//! run of 1..e-1 set bits, rotated right by 0..e-1, replicated to fill 64
//! bits. That gives exactly 5,334 distinct 64-bit patterns. They are
//! enumerated once into a sorted table and every query is a binary search.

use std::sync::OnceLock;

use crate::error::{AsmError, ImmKind};

/// Number of distinct 64-bit logical immediates.
pub const LOGICAL_IMMEDIATE_COUNT: usize = 5334;

/// One encodable bitmask pattern with its `N:immr:imms` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicalImmediate {
    /// The replicated 64-bit pattern.
    pub value: u64,
    /// `N` bit: set only for 64-bit elements.
    pub n: u32,
    /// Right-rotation applied to the run.
    pub immr: u32,
    /// Element size and run length.
    pub imms: u32,
}

impl LogicalImmediate {
    /// The 13-bit `N:immr:imms` field positioned at bits 22..10.
    pub fn field(&self) -> u32 {
        (self.n << 22) | (self.immr << 16) | (self.imms << 10)
    }

    /// Whether the pattern has a 64-bit element, so no 32-bit encoding exists.
    pub fn is_64bit_only(&self) -> bool {
        self.n == 1
    }
}

/// Outcome of asking whether a value is a logical immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representable {
    /// Encodable for both 32-bit and 64-bit operations.
    Both(LogicalImmediate),
    /// Encodable only for 64-bit operations.
    Only64(LogicalImmediate),
    /// Not a logical immediate.
    No,
}

impl Representable {
    /// The entry usable at the requested width, if any.
    pub fn for_width(self, is64: bool) -> Option<LogicalImmediate> {
        match self {
            Representable::Both(imm) => Some(imm),
            Representable::Only64(imm) if is64 => Some(imm),
            _ => None,
        }
    }
}

/// Sorted table of every logical immediate.
///
/// # Examples
///
/// ```
/// use risc_asm::bitmask::{LogicalImmediateTable, Representable};
///
/// let table = LogicalImmediateTable::get();
/// assert_eq!(table.len(), 5334);
/// assert!(matches!(table.lookup(0x00FF_00FF_00FF_00FF), Representable::Both(_)));
/// assert!(matches!(table.lookup(0xFFFF_FFFF_0000_0000), Representable::Only64(_)));
/// assert_eq!(table.lookup32(0), Representable::No);
/// ```
#[derive(Debug, Clone)]
pub struct LogicalImmediateTable {
    entries: Vec<LogicalImmediate>,
}

static TABLE: OnceLock<LogicalImmediateTable> = OnceLock::new();

impl LogicalImmediateTable {
    /// The process-wide table, built on first use.
    pub fn get() -> &'static Self {
        TABLE.get_or_init(Self::build)
    }

    /// Enumerate every (element size, run length, rotation) triple.
    pub fn build() -> Self {
        let mut entries = Vec::with_capacity(LOGICAL_IMMEDIATE_COUNT);
        for log_size in 1..=6u32 {
            let size = 1u32 << log_size;
            let mask = element_mask(size);
            for ones in 1..size {
                let run = (1u64 << ones) - 1;
                for rot in 0..size {
                    let elem = rotate_right(run, rot, size) & mask;
                    let imms = if size == 64 {
                        ones - 1
                    } else {
                        (!(size * 2 - 1) & 0x3F) | (ones - 1)
                    };
                    entries.push(LogicalImmediate {
                        value: replicate(elem, size),
                        n: u32::from(size == 64),
                        immr: rot,
                        imms,
                    });
                }
            }
        }
        entries.sort_unstable_by_key(|e| e.value);
        debug_assert!(entries.windows(2).all(|w| w[0].value < w[1].value));
        debug_assert_eq!(entries.len(), LOGICAL_IMMEDIATE_COUNT);
        Self { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty (never, once built).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in ascending order of `value`.
    pub fn entries(&self) -> &[LogicalImmediate] {
        &self.entries
    }

    /// Find the entry for a 64-bit pattern.
    pub fn lookup64(&self, value: u64) -> Option<LogicalImmediate> {
        self.entries
            .binary_search_by_key(&value, |e| e.value)
            .ok()
            .map(|i| self.entries[i])
    }

    /// Classify a 64-bit pattern.
    pub fn lookup(&self, value: u64) -> Representable {
        match self.lookup64(value) {
            Some(imm) if imm.is_64bit_only() => Representable::Only64(imm),
            Some(imm) => Representable::Both(imm),
            None => Representable::No,
        }
    }

    /// Classify a 32-bit pattern by replicating it into both halves.
    pub fn lookup32(&self, value: u32) -> Representable {
        self.lookup(((value as u64) << 32) | value as u64)
    }
}

/// Encode `value` as the `N:immr:imms` field (bits 22..10) of a logical
/// instruction of the given width.
///
/// For 32-bit operations `value` must fit in 32 bits; the upper half is
/// never discarded silently.
pub fn encode_logical_imm(value: u64, is64: bool) -> Result<u32, AsmError> {
    let table = LogicalImmediateTable::get();
    let found = if is64 {
        table.lookup64(value)
    } else if value >> 32 == 0 {
        table.lookup32(value as u32).for_width(false)
    } else {
        None
    };
    found
        .map(|imm| imm.field())
        .ok_or(AsmError::InvalidImmediate {
            kind: ImmKind::Logical,
            value,
        })
}

/// Expand `N:immr:imms` back into the 64-bit pattern.
///
/// Returns `None` for reserved encodings (all-ones runs, undefined sizes).
pub fn decode_logical_imm(n: u32, immr: u32, imms: u32) -> Option<u64> {
    let combined = (n << 6) | (!imms & 0x3F);
    if combined == 0 {
        return None;
    }
    let len = 31 - combined.leading_zeros();
    if len == 0 {
        return None;
    }
    let size = 1u32 << len;
    let levels = size - 1;
    let s = imms & levels;
    if s == levels {
        return None;
    }
    let r = immr & levels;
    let run = (1u64 << (s + 1)) - 1;
    Some(replicate(rotate_right(run, r, size) & element_mask(size), size))
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn element_mask(size: u32) -> u64 {
    if size == 64 {
        u64::MAX
    } else {
        (1u64 << size) - 1
    }
}

fn rotate_right(elem: u64, rot: u32, size: u32) -> u64 {
    if size == 64 {
        return elem.rotate_right(rot);
    }
    if rot == 0 {
        return elem;
    }
    ((elem >> rot) | (elem << (size - rot))) & element_mask(size)
}

fn replicate(elem: u64, size: u32) -> u64 {
    let mut value = elem;
    let mut width = size;
    while width < 64 {
        value |= value << width;
        width <<= 1;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_all_patterns_strictly_increasing() {
        let table = LogicalImmediateTable::build();
        assert_eq!(table.len(), LOGICAL_IMMEDIATE_COUNT);
        assert!(table
            .entries()
            .windows(2)
            .all(|w| w[0].value < w[1].value));
        // All-zeros and all-ones are never encodable.
        assert!(table.lookup64(0).is_none());
        assert!(table.lookup64(u64::MAX).is_none());
    }

    #[test]
    fn shared_table_is_built_once() {
        let a = LogicalImmediateTable::get() as *const _;
        let b = LogicalImmediateTable::get() as *const _;
        assert_eq!(a, b);
    }

    #[test]
    fn every_entry_decodes_to_itself() {
        for e in LogicalImmediateTable::get().entries() {
            assert_eq!(
                decode_logical_imm(e.n, e.immr, e.imms),
                Some(e.value),
                "N={} immr={} imms={:#x}",
                e.n,
                e.immr,
                e.imms
            );
        }
    }

    #[test]
    fn known_fields() {
        // and x0, x1, #0xff
        assert_eq!(encode_logical_imm(0xFF, true).unwrap(), 0x0040_1C00);
        // orr w0, w1, #0xff00ff00 style 16-bit element
        let imm = LogicalImmediateTable::get()
            .lookup64(0x5555_5555_5555_5555)
            .unwrap();
        assert_eq!((imm.n, imm.immr, imm.imms), (0, 0, 0x3C));
        let imm = LogicalImmediateTable::get().lookup64(0x1).unwrap();
        assert_eq!((imm.n, imm.immr, imm.imms), (1, 0, 0));
    }

    #[test]
    fn width_classification() {
        let table = LogicalImmediateTable::get();
        assert!(matches!(table.lookup(0xFFFF_FFFF_0000_0000), Representable::Only64(_)));
        assert!(matches!(table.lookup(0x0000_00FF_0000_00FF), Representable::Both(_)));
        assert_eq!(table.lookup32(0), Representable::No);
        assert_eq!(table.lookup32(u32::MAX), Representable::No);
        assert!(matches!(table.lookup32(0xFFFF_0000), Representable::Both(_)));
        assert!(matches!(table.lookup32(0x8000_0001), Representable::Both(_)));
        assert_eq!(table.lookup32(0x1234_5678), Representable::No);
    }

    #[test]
    fn encode_32bit_rejects_wide_values() {
        assert!(encode_logical_imm(0xFF, false).is_ok());
        assert_eq!(
            encode_logical_imm(0x1_0000_00FF, false),
            Err(AsmError::InvalidImmediate {
                kind: ImmKind::Logical,
                value: 0x1_0000_00FF
            })
        );
        assert!(encode_logical_imm(0xFFFF_FFFF_0000_0000, false).is_err());
        assert!(encode_logical_imm(0xFFFF_FFFF_0000_0000, true).is_ok());
    }

    #[test]
    fn decode_rejects_reserved() {
        // N=0, imms=0b111111 has no element size.
        assert_eq!(decode_logical_imm(0, 0, 0x3F), None);
        // 64-bit element of all ones.
        assert_eq!(decode_logical_imm(1, 0, 0x3F), None);
        // 2-bit element of all ones.
        assert_eq!(decode_logical_imm(0, 0, 0x3D), None);
    }
}
