//! Growable byte buffer holding emitted machine code.
//!
//! The buffer only grows at its end. Earlier bytes may be rewritten in place
//! with [`CodeBuffer::patch_at`], which never changes the length.

use crate::error::AsmError;

/// Byte order used for multi-byte values written into a [`CodeBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endianness {
    /// Least significant byte first (AArch64).
    Little,
    /// Most significant byte first (PowerPC).
    Big,
}

/// Append-only code buffer with in-place patching.
///
/// # Examples
///
/// ```
/// use risc_asm::{CodeBuffer, Endianness};
///
/// let mut buf = CodeBuffer::new(Endianness::Big);
/// buf.emit_word(0);
/// buf.emit_word(0x6000_0000);
/// buf.patch_word(0, 0x4800_0008)?;
/// assert_eq!(buf.position(), 8);
/// assert_eq!(buf.as_slice(), &[0x48, 0, 0, 8, 0x60, 0, 0, 0]);
/// # Ok::<(), risc_asm::AsmError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBuffer {
    data: Vec<u8>,
    endian: Endianness,
}

impl CodeBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new(endian: Endianness) -> Self {
        Self {
            data: Vec::new(),
            endian,
        }
    }

    /// Create an empty buffer with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(endian: Endianness, capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            endian,
        }
    }

    /// Byte order of multi-byte writes.
    pub fn endianness(&self) -> Endianness {
        self.endian
    }

    /// Current append offset.
    pub fn position(&self) -> u64 {
        self.data.len() as u64
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a single byte.
    pub fn emit_byte(&mut self, byte: u8) {
        self.data.push(byte);
    }

    /// Append raw bytes as-is.
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append a 16-bit value in buffer byte order.
    pub fn emit_u16(&mut self, value: u16) {
        match self.endian {
            Endianness::Little => self.data.extend_from_slice(&value.to_le_bytes()),
            Endianness::Big => self.data.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Append a 32-bit value in buffer byte order.
    pub fn emit_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&self.word_bytes(value));
    }

    /// Append a 64-bit value in buffer byte order.
    pub fn emit_u64(&mut self, value: u64) {
        match self.endian {
            Endianness::Little => self.data.extend_from_slice(&value.to_le_bytes()),
            Endianness::Big => self.data.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Append one 4-byte instruction word.
    #[inline]
    pub fn emit_word(&mut self, word: u32) {
        self.emit_u32(word);
    }

    /// Overwrite previously emitted bytes at `pos`.
    ///
    /// The whole region must already be written; the buffer length and the
    /// append position are unchanged.
    pub fn patch_at(&mut self, pos: u64, bytes: &[u8]) -> Result<(), AsmError> {
        let range = self.checked_range(pos, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Overwrite the instruction word at `pos`.
    pub fn patch_word(&mut self, pos: u64, word: u32) -> Result<(), AsmError> {
        let bytes = self.word_bytes(word);
        self.patch_at(pos, &bytes)
    }

    /// Overwrite the 64-bit value at `pos` in buffer byte order.
    pub fn patch_u64(&mut self, pos: u64, value: u64) -> Result<(), AsmError> {
        let bytes = match self.endian {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        self.patch_at(pos, &bytes)
    }

    /// Read back the instruction word at `pos`.
    pub fn read_word(&self, pos: u64) -> Result<u32, AsmError> {
        let range = self.checked_range(pos, 4)?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[range]);
        Ok(match self.endian {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        })
    }

    /// Pad up to the next multiple of `alignment` by repeating `fill`.
    ///
    /// Each padding byte is `fill[position % fill.len()]`, so a fill word
    /// lands on its natural boundary. An empty `fill` pads with zeros.
    pub fn align(&mut self, alignment: u64, fill: &[u8]) -> Result<(), AsmError> {
        self.align_from(0, alignment, fill)
    }

    /// Pad until `origin + position` is a multiple of `alignment`, where
    /// `origin` is the absolute address of offset 0.
    ///
    /// The fill pattern is indexed by absolute address.
    pub fn align_from(&mut self, origin: u64, alignment: u64, fill: &[u8]) -> Result<(), AsmError> {
        let pad = padding(origin.wrapping_add(self.position()), alignment)?;
        for _ in 0..pad {
            let addr = origin.wrapping_add(self.position());
            let byte = if fill.is_empty() {
                0
            } else {
                fill[(addr % fill.len() as u64) as usize]
            };
            self.data.push(byte);
        }
        Ok(())
    }

    /// Drop all bytes, keeping the byte order.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// View the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn word_bytes(&self, word: u32) -> [u8; 4] {
        match self.endian {
            Endianness::Little => word.to_le_bytes(),
            Endianness::Big => word.to_be_bytes(),
        }
    }

    fn checked_range(&self, pos: u64, len: usize) -> Result<core::ops::Range<usize>, AsmError> {
        let err = || AsmError::PatchOutOfBounds {
            offset: pos,
            len,
            size: self.data.len(),
        };
        let start = usize::try_from(pos).map_err(|_| err())?;
        let end = start.checked_add(len).ok_or_else(err)?;
        if end > self.data.len() {
            return Err(err());
        }
        Ok(start..end)
    }
}

/// Bytes needed to bring `addr` up to a multiple of `alignment`.
pub(crate) fn padding(addr: u64, alignment: u64) -> Result<u64, AsmError> {
    if !alignment.is_power_of_two() {
        return Err(AsmError::InvalidOperands {
            detail: format!("alignment {} is not a power of two", alignment),
        });
    }
    Ok(addr.wrapping_neg() & (alignment - 1))
}
