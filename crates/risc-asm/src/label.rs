//! Labels and forward-reference fixups.
//!
//! A [`Label`] is a small copyable handle into its assembler's label table.
//! It starts unbound, and is resolved exactly once, either to a buffer
//! position ([`LabelState::Bound`]) or to an absolute address outside the
//! buffer ([`LabelState::Fixed`]).
//!
//! An instruction that references an unresolved label leaves a 4-byte
//! placeholder and records a [`FixupSite`] on the label. The site owns every
//! non-label operand of the instruction, so resolving the label can rebuild
//! the whole word. Inline address and offset literals use the same
//! mechanism with a 4- or 8-byte data placeholder.

use core::fmt;

use crate::error::AsmError;

/// Handle to a branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Label(u32);

impl Label {
    pub(crate) fn from_index(index: usize) -> Self {
        Label(index as u32)
    }

    /// Index of this label in its assembler's table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Resolution state of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelState {
    /// Not resolved yet.
    Unbound,
    /// Bound to a buffer offset.
    Bound(u64),
    /// Pinned to an absolute address outside the buffer.
    Fixed(u64),
}

/// How an architecture rebuilds a label-relative instruction.
///
/// Implementors carry the instruction family and every operand other than
/// the label.
pub trait FixupForm: Copy + fmt::Debug {
    /// Encode the full instruction word for an instruction at absolute
    /// address `origin` whose label resolves to absolute address `target`.
    fn encode(&self, origin: u64, target: u64) -> Result<u32, AsmError>;
}

/// Size of an inline data literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataWidth {
    /// 4 bytes.
    W32,
    /// 8 bytes.
    W64,
}

impl DataWidth {
    /// Number of bytes.
    pub fn bytes(self) -> u64 {
        match self {
            DataWidth::W32 => 4,
            DataWidth::W64 => 8,
        }
    }
}

/// What a placeholder turns into once its labels resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind<F> {
    /// A label-relative instruction word.
    Insn(F),
    /// The absolute address of the label.
    Address(DataWidth),
    /// The signed distance `target - base` between two labels.
    Offset {
        /// Label the distance is measured to.
        target: Label,
        /// Label the distance is measured from.
        base: Label,
        /// Literal size.
        width: DataWidth,
    },
}

impl<F> SiteKind<F> {
    /// Placeholder size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            SiteKind::Insn(_) => 4,
            SiteKind::Address(width) | SiteKind::Offset { width, .. } => width.bytes(),
        }
    }
}

/// A placeholder waiting for its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixupSite<F> {
    /// Buffer offset of the placeholder.
    pub position: u64,
    /// What to write there.
    pub kind: SiteKind<F>,
}

#[derive(Debug, Clone)]
struct LabelEntry<F> {
    state: LabelState,
    sites: Vec<FixupSite<F>>,
}

/// Label states plus the pending fixups of each unbound label.
#[derive(Debug, Clone)]
pub(crate) struct LabelTable<F> {
    entries: Vec<LabelEntry<F>>,
}

impl<F: FixupForm> LabelTable<F> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn create(&mut self) -> Label {
        let label = Label::from_index(self.entries.len());
        self.entries.push(LabelEntry {
            state: LabelState::Unbound,
            sites: Vec::new(),
        });
        label
    }

    pub(crate) fn state(&self, label: Label) -> Result<LabelState, AsmError> {
        Ok(self.entry(label)?.state)
    }

    /// Absolute address of `label`, or `None` while it is unbound.
    pub(crate) fn target(&self, label: Label, base_address: u64) -> Result<Option<u64>, AsmError> {
        Ok(match self.entry(label)?.state {
            LabelState::Unbound => None,
            LabelState::Bound(pos) => Some(base_address.wrapping_add(pos)),
            LabelState::Fixed(addr) => Some(addr),
        })
    }

    pub(crate) fn pending(&self, label: Label) -> Result<usize, AsmError> {
        Ok(self.entry(label)?.sites.len())
    }

    pub(crate) fn add_site(&mut self, label: Label, site: FixupSite<F>) -> Result<(), AsmError> {
        self.entry_mut(label)?.sites.push(site);
        Ok(())
    }

    /// Sites waiting on `label`.
    pub(crate) fn sites(&self, label: Label) -> Result<&[FixupSite<F>], AsmError> {
        Ok(&self.entry(label)?.sites)
    }

    /// Fail with `DuplicateLabel` unless `label` is still unbound.
    pub(crate) fn ensure_unbound(&self, label: Label) -> Result<(), AsmError> {
        if self.entry(label)?.state != LabelState::Unbound {
            return Err(AsmError::DuplicateLabel { label });
        }
        Ok(())
    }

    /// Resolve `label` and hand back its pending sites.
    pub(crate) fn resolve(
        &mut self,
        label: Label,
        state: LabelState,
    ) -> Result<Vec<FixupSite<F>>, AsmError> {
        self.ensure_unbound(label)?;
        let entry = self.entry_mut(label)?;
        entry.state = state;
        Ok(core::mem::take(&mut entry.sites))
    }

    /// First label that still has pending sites.
    pub(crate) fn first_unresolved(&self) -> Option<(Label, usize)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, e)| !e.sites.is_empty())
            .map(|(i, e)| (Label::from_index(i), e.sites.len()))
    }

    pub(crate) fn pending_total(&self) -> usize {
        self.entries.iter().map(|e| e.sites.len()).sum()
    }

    pub(crate) fn states(&self) -> impl Iterator<Item = (Label, LabelState)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (Label::from_index(i), e.state))
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    fn entry(&self, label: Label) -> Result<&LabelEntry<F>, AsmError> {
        self.entries
            .get(label.index())
            .ok_or(AsmError::UnknownLabel { label })
    }

    fn entry_mut(&mut self, label: Label) -> Result<&mut LabelEntry<F>, AsmError> {
        self.entries
            .get_mut(label.index())
            .ok_or(AsmError::UnknownLabel { label })
    }
}
