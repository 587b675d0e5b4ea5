use core::fmt::{self, Debug};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;

/// One piece of text recovered from a concurrent, overlapping delete,
/// together with the offset (relative to the owning delete's own start)
/// at which it must be spliced back in to reconstruct the original text.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq)]
pub struct ReconSegment {
    pub offset: usize,
    pub buffer: Buffer,
}

impl Debug for ReconSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:?})", self.offset, self.buffer)
    }
}

/// Accumulates the text lost from a non-reversible delete as it gets
/// transformed against other concurrent deletes, so the delete can later be
/// reconstructed (and thus mirrored into an insert) on demand.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq, Default)]
pub struct Recon(Vec<ReconSegment>);

impl Recon {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Returns a new `Recon` with one more segment appended; never mutates
    /// `self`, since a delete's existing recon must stay stable until a
    /// `transform` call produces a new delete (and a new recon) outright.
    #[must_use]
    pub fn update(&self, offset: usize, buffer: Buffer) -> Self {
        let mut segments = self.0.clone();
        segments.push(ReconSegment { offset, buffer });
        Recon(segments)
    }

    /// Splices every recorded segment back into `buffer`, in recording order.
    pub fn restore(&self, buffer: &mut Buffer) {
        for segment in &self.0 {
            buffer.splice(segment.offset, 0, Some(&segment.buffer)).expect(
                "recon offsets are always within the buffer they were recorded against",
            );
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Shifts every segment's offset by `by`; used when a delete carrying
    /// this recon is split or repositioned during a transform.
    #[must_use]
    pub fn shifted(&self, by: i64) -> Self {
        Recon(
            self.0
                .iter()
                .map(|segment| ReconSegment {
                    offset: (segment.offset as i64 + by).max(0) as usize,
                    buffer: segment.buffer.clone(),
                })
                .collect(),
        )
    }

    /// Concatenates two recons, shifting the second's offsets by `offset`.
    /// Used when merging two deletes back into one.
    #[must_use]
    pub fn merge(&self, other: &Recon, offset: usize) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.shifted(offset as i64).0);
        Recon(segments)
    }

    /// Splits the recon at character offset `at`, the way [`Buffer::splice`]
    /// would split the delete that owns it: segments recorded before `at`
    /// stay on the left untouched, segments at or after `at` move to the
    /// right with their offsets shifted back by `at`.
    #[must_use]
    pub fn split_at(&self, at: usize) -> (Self, Self) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for segment in &self.0 {
            if segment.offset < at {
                left.push(segment.clone());
            } else {
                right.push(ReconSegment { offset: segment.offset - at, buffer: segment.buffer.clone() });
            }
        }
        (Recon(left), Recon(right))
    }
}

impl Debug for Recon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Recon({:?})", self.0) }
}
