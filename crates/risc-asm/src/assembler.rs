//! Architecture-independent emission core.
//!
//! [`Emitter`] owns the code buffer, the label table and the pending fixups
//! of one compilation unit. The per-architecture assemblers wrap it and add
//! mnemonics; everything about labels, limits and the final result lives
//! here.

use core::fmt;

use tracing::{debug, trace};

use crate::buffer::{self, CodeBuffer, Endianness};
use crate::error::AsmError;
use crate::label::{DataWidth, FixupForm, FixupSite, Label, LabelState, LabelTable, SiteKind};

/// Target instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Arch {
    /// ARMv8-A 64-bit.
    Aarch64,
    /// 32-bit PowerPC.
    Ppc32,
    /// 64-bit PowerPC.
    Ppc64,
}

impl Arch {
    /// Byte order of instruction words.
    pub fn endianness(self) -> Endianness {
        match self {
            Arch::Aarch64 => Endianness::Little,
            Arch::Ppc32 | Arch::Ppc64 => Endianness::Big,
        }
    }

    /// Whether the target has 64-bit general registers.
    pub fn is_64bit(self) -> bool {
        !matches!(self, Arch::Ppc32)
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Aarch64 => write!(f, "AArch64"),
            Arch::Ppc32 => write!(f, "PPC32"),
            Arch::Ppc64 => write!(f, "PPC64"),
        }
    }
}

/// Caps on the resources one compilation unit may consume.
///
/// # Examples
///
/// ```rust
/// use risc_asm::{Aarch64Assembler, ResourceLimits};
///
/// let mut asm = Aarch64Assembler::new();
/// asm.limits(ResourceLimits {
///     max_labels: 16,
///     max_output_bytes: 4096,
///     max_fixups_per_label: 64,
/// });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceLimits {
    /// Maximum number of labels. Default: 100,000.
    pub max_labels: usize,
    /// Maximum output size in bytes. Default: 16 MiB.
    pub max_output_bytes: usize,
    /// Maximum pending references to a single label. Default: 65,536.
    pub max_fixups_per_label: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_labels: 100_000,
            max_output_bytes: 16 * 1024 * 1024,
            max_fixups_per_label: 65_536,
        }
    }
}

/// A label reference resolved into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AppliedFixup {
    /// Buffer offset of the instruction word.
    pub offset: u64,
    /// The referenced label.
    pub label: Label,
    /// Absolute address the label resolved to.
    pub target: u64,
    /// Whether the word was patched after the fact (forward reference).
    pub deferred: bool,
}

/// Output of a finished compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[must_use]
pub struct AssemblyResult {
    arch: Arch,
    bytes: Vec<u8>,
    labels: Vec<(Label, u64)>,
    fixups: Vec<AppliedFixup>,
    base_address: u64,
}

impl AssemblyResult {
    /// Target the code was assembled for.
    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// The assembled bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume and return the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Byte count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Instruction words in target byte order. A trailing partial word is skipped.
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        let endian = self.arch.endianness();
        self.bytes.chunks_exact(4).map(move |c| {
            let b = [c[0], c[1], c[2], c[3]];
            match endian {
                Endianness::Little => u32::from_le_bytes(b),
                Endianness::Big => u32::from_be_bytes(b),
            }
        })
    }

    /// Absolute addresses of every resolved label.
    #[must_use]
    pub fn labels(&self) -> &[(Label, u64)] {
        &self.labels
    }

    /// Absolute address of `label`, if it was resolved.
    #[must_use]
    pub fn label_address(&self, label: Label) -> Option<u64> {
        self.labels
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, addr)| *addr)
    }

    /// Every label reference written into the output.
    #[must_use]
    pub fn fixups(&self) -> &[AppliedFixup] {
        &self.fixups
    }

    /// Absolute address of byte 0.
    #[must_use]
    pub fn base_address(&self) -> u64 {
        self.base_address
    }
}

/// Outcome of encoding one site.
enum Resolution {
    /// Final value of the placeholder.
    Value(u64),
    /// The other label of an offset literal is still unresolved.
    Waiting(Label),
}

fn address_literal(address: u64, width: DataWidth) -> Result<u64, AsmError> {
    match width {
        DataWidth::W64 => Ok(address),
        DataWidth::W32 => u32::try_from(address)
            .map(u64::from)
            .map_err(|_| AsmError::ImmediateOverflow {
                value: i128::from(address),
                min: 0,
                max: i128::from(u32::MAX),
            }),
    }
}

fn offset_literal(target: u64, base: u64, width: DataWidth) -> Result<u64, AsmError> {
    let diff = target.wrapping_sub(base) as i64;
    match width {
        DataWidth::W64 => Ok(diff as u64),
        DataWidth::W32 => i32::try_from(diff)
            .map(|v| u64::from(v as u32))
            .map_err(|_| AsmError::ImmediateOverflow {
                value: i128::from(diff),
                min: i128::from(i32::MIN),
                max: i128::from(i32::MAX),
            }),
    }
}

/// Code buffer, labels and fixups of one compilation unit.
///
/// `F` is the architecture's [`FixupForm`].
#[derive(Debug, Clone)]
pub struct Emitter<F> {
    arch: Arch,
    buf: CodeBuffer,
    labels: LabelTable<F>,
    base_address: u64,
    limits: ResourceLimits,
    applied: Vec<AppliedFixup>,
}

impl<F: FixupForm> Emitter<F> {
    /// Create an empty emitter for `arch`.
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            buf: CodeBuffer::new(arch.endianness()),
            labels: LabelTable::new(),
            base_address: 0,
            limits: ResourceLimits::default(),
            applied: Vec::new(),
        }
    }

    /// Target architecture.
    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Set the absolute address of buffer offset 0.
    pub fn base_address(&mut self, addr: u64) -> &mut Self {
        self.base_address = addr;
        self
    }

    /// Replace the resource limits.
    pub fn limits(&mut self, limits: ResourceLimits) -> &mut Self {
        self.limits = limits;
        self
    }

    /// Current buffer offset.
    pub fn position(&self) -> u64 {
        self.buf.position()
    }

    /// Absolute address of the next emitted byte.
    pub fn current_address(&self) -> u64 {
        self.base_address.wrapping_add(self.buf.position())
    }

    /// The bytes emitted so far.
    pub fn buffer(&self) -> &CodeBuffer {
        &self.buf
    }

    /// Number of placeholders still waiting for a label.
    pub fn pending_fixups(&self) -> usize {
        self.labels.pending_total()
    }

    // ── Raw emission ─────────────────────────────────────────────────────

    /// Append one instruction word.
    pub fn emit_word(&mut self, word: u32) -> Result<(), AsmError> {
        self.reserve(4)?;
        self.buf.emit_word(word);
        Ok(())
    }

    /// Append inline data bytes.
    pub fn emit_bytes(&mut self, bytes: &[u8]) -> Result<(), AsmError> {
        self.reserve(bytes.len())?;
        self.buf.emit_bytes(bytes);
        Ok(())
    }

    /// Append an inline 32-bit value in target byte order.
    pub fn emit_u32(&mut self, value: u32) -> Result<(), AsmError> {
        self.reserve(4)?;
        self.buf.emit_u32(value);
        Ok(())
    }

    /// Append an inline 64-bit value in target byte order.
    pub fn emit_u64(&mut self, value: u64) -> Result<(), AsmError> {
        self.reserve(8)?;
        self.buf.emit_u64(value);
        Ok(())
    }

    /// Pad with a repeating fill pattern until the absolute address of the
    /// next byte is a multiple of `alignment`.
    pub fn align(&mut self, alignment: u64, fill: &[u8]) -> Result<(), AsmError> {
        let pad = buffer::padding(self.current_address(), alignment)?;
        self.reserve(usize::try_from(pad).unwrap_or(usize::MAX))?;
        self.buf.align_from(self.base_address, alignment, fill)
    }

    fn emit_value(&mut self, value: u64, size: u64) -> Result<(), AsmError> {
        if size == 8 {
            self.emit_u64(value)
        } else {
            self.emit_u32(value as u32)
        }
    }

    fn reserve(&self, extra: usize) -> Result<(), AsmError> {
        if self.buf.len().saturating_add(extra) > self.limits.max_output_bytes {
            return Err(AsmError::ResourceLimitExceeded {
                resource: "output bytes".into(),
                limit: self.limits.max_output_bytes,
            });
        }
        Ok(())
    }

    // ── Labels ───────────────────────────────────────────────────────────

    /// Create a new unbound label.
    pub fn new_label(&mut self) -> Result<Label, AsmError> {
        if self.labels.len() >= self.limits.max_labels {
            return Err(AsmError::ResourceLimitExceeded {
                resource: "labels".into(),
                limit: self.limits.max_labels,
            });
        }
        Ok(self.labels.create())
    }

    /// Bind `label` to the current position and patch every instruction
    /// that referenced it.
    pub fn bind(&mut self, label: Label) -> Result<(), AsmError> {
        let pos = self.position();
        let target = self.base_address.wrapping_add(pos);
        self.resolve(label, LabelState::Bound(pos), target)
    }

    /// Pin `label` to an absolute address outside the buffer and patch every
    /// instruction that referenced it.
    pub fn fix(&mut self, label: Label, address: u64) -> Result<(), AsmError> {
        self.resolve(label, LabelState::Fixed(address), address)
    }

    /// Resolve `label` to `target` and patch its sites.
    ///
    /// Every site is encoded before anything is written. If one fails, the
    /// label stays unbound and keeps all of its sites.
    fn resolve(&mut self, label: Label, state: LabelState, target: u64) -> Result<(), AsmError> {
        self.labels.ensure_unbound(label)?;
        let mut writes = Vec::new();
        let mut waits = Vec::new();
        for site in self.labels.sites(label)? {
            match self.site_value(site, label, target)? {
                Resolution::Value(value) => writes.push((*site, value)),
                Resolution::Waiting(other) => waits.push((other, *site)),
            }
        }

        let taken = self.labels.resolve(label, state)?;
        debug_assert_eq!(taken.len(), writes.len() + waits.len());
        debug!(%label, ?state, patched = writes.len(), requeued = waits.len(), "resolved label");

        for (site, value) in writes {
            if site.kind.size() == 8 {
                self.buf.patch_u64(site.position, value)?;
            } else {
                self.buf.patch_word(site.position, value as u32)?;
            }
            self.applied.push(AppliedFixup {
                offset: site.position,
                label,
                target,
                deferred: true,
            });
        }
        for (other, site) in waits {
            self.labels.add_site(other, site)?;
        }
        Ok(())
    }

    /// Value for `site`, taking `label` as resolved to `target`.
    fn site_value(
        &self,
        site: &FixupSite<F>,
        label: Label,
        target: u64,
    ) -> Result<Resolution, AsmError> {
        let lookup = |l: Label| {
            if l == label {
                Ok(Some(target))
            } else {
                self.labels.target(l, self.base_address)
            }
        };
        match site.kind {
            SiteKind::Insn(form) => {
                let origin = self.base_address.wrapping_add(site.position);
                Ok(Resolution::Value(u64::from(form.encode(origin, target)?)))
            }
            SiteKind::Address(width) => address_literal(target, width).map(Resolution::Value),
            SiteKind::Offset {
                target: to,
                base: from,
                width,
            } => match (lookup(to)?, lookup(from)?) {
                (Some(t), Some(b)) => offset_literal(t, b, width).map(Resolution::Value),
                (None, _) => Ok(Resolution::Waiting(to)),
                (_, None) => Ok(Resolution::Waiting(from)),
            },
        }
    }

    /// Current state of `label`.
    pub fn label_state(&self, label: Label) -> Result<LabelState, AsmError> {
        self.labels.state(label)
    }

    /// Whether `label` has been bound or fixed.
    pub fn is_resolved(&self, label: Label) -> bool {
        matches!(
            self.labels.state(label),
            Ok(LabelState::Bound(_) | LabelState::Fixed(_))
        )
    }

    /// Buffer offset `label` is bound to.
    pub fn label_position(&self, label: Label) -> Result<u64, AsmError> {
        match self.labels.state(label)? {
            LabelState::Bound(pos) => Ok(pos),
            LabelState::Fixed(addr) => Err(AsmError::InvalidOperands {
                detail: format!("label {} is fixed at {:#x}, not bound in the buffer", label, addr),
            }),
            LabelState::Unbound => Err(AsmError::UnboundLabel { label }),
        }
    }

    /// Absolute address of `label`.
    pub fn label_address(&self, label: Label) -> Result<u64, AsmError> {
        self.labels
            .target(label, self.base_address)?
            .ok_or(AsmError::UnboundLabel { label })
    }

    /// Emit a label-relative instruction.
    ///
    /// If `label` is resolved the final word is written directly; otherwise a
    /// zero placeholder is written and `form` is kept until the label is bound.
    pub fn emit_with_label(&mut self, label: Label, form: F) -> Result<(), AsmError> {
        self.emit_site(label, SiteKind::Insn(form))
    }

    /// Emit the absolute address of `label` as an inline literal.
    ///
    /// The literal is 8 bytes on 64-bit targets and 4 bytes otherwise, in
    /// target byte order.
    pub fn inline_address(&mut self, label: Label) -> Result<(), AsmError> {
        let width = if self.arch.is_64bit() {
            DataWidth::W64
        } else {
            DataWidth::W32
        };
        self.emit_site(label, SiteKind::Address(width))
    }

    /// Emit `address(target) - address(base)` as a signed inline literal.
    ///
    /// Either label may be unresolved; the literal is written once both are.
    pub fn inline_offset(
        &mut self,
        target: Label,
        base: Label,
        width: DataWidth,
    ) -> Result<(), AsmError> {
        self.labels.state(base)?;
        self.emit_site(target, SiteKind::Offset {
            target,
            base,
            width,
        })
    }

    fn emit_site(&mut self, label: Label, kind: SiteKind<F>) -> Result<(), AsmError> {
        let site = FixupSite {
            position: self.position(),
            kind,
        };
        let owner = match self.labels.target(label, self.base_address)? {
            Some(target) => match self.site_value(&site, label, target)? {
                Resolution::Value(value) => {
                    self.emit_value(value, kind.size())?;
                    self.applied.push(AppliedFixup {
                        offset: site.position,
                        label,
                        target,
                        deferred: false,
                    });
                    return Ok(());
                }
                Resolution::Waiting(other) => other,
            },
            None => label,
        };

        if self.labels.pending(owner)? >= self.limits.max_fixups_per_label {
            return Err(AsmError::ResourceLimitExceeded {
                resource: "fixups per label".into(),
                limit: self.limits.max_fixups_per_label,
            });
        }
        self.emit_value(0, kind.size())?;
        self.labels.add_site(owner, site)?;
        trace!(label = %owner, position = site.position, ?kind, "registered fixup");
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Discard all code and labels, keeping configuration.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.labels.clear();
        self.applied.clear();
    }

    /// Finish the unit.
    ///
    /// Fails if any instruction still waits for a label; no placeholder is
    /// ever left in the output.
    pub fn finish(self) -> Result<AssemblyResult, AsmError> {
        if let Some((label, sites)) = self.labels.first_unresolved() {
            return Err(AsmError::UnresolvedLabel { label, sites });
        }
        let base = self.base_address;
        let labels: Vec<(Label, u64)> = self
            .labels
            .states()
            .filter_map(|(l, s)| match s {
                LabelState::Bound(pos) => Some((l, base.wrapping_add(pos))),
                LabelState::Fixed(addr) => Some((l, addr)),
                LabelState::Unbound => None,
            })
            .collect();
        debug!(
            arch = %self.arch,
            bytes = self.buf.len(),
            labels = labels.len(),
            fixups = self.applied.len(),
            "finished assembly"
        );
        Ok(AssemblyResult {
            arch: self.arch,
            bytes: self.buf.into_bytes(),
            labels,
            fixups: self.applied,
            base_address: base,
        })
    }
}
