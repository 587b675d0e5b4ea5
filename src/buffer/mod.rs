mod error;

use core::fmt::{self, Debug};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use self::error::BufferError;
use crate::user_id::UserId;

/// A chunk of text together with the user who wrote it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq, Eq)]
pub struct Segment {
    pub user: UserId,
    pub text: String,
}

impl Segment {
    #[must_use]
    pub fn new(user: UserId, text: impl Into<String>) -> Self { Segment { user, text: text.into() } }

    #[must_use]
    pub fn char_len(&self) -> usize { self.text.chars().count() }
}

impl Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.user, self.text)
    }
}

/// An ordered sequence of [`Segment`]s, holding the full text of a document
/// or a sub-range of it, with per-character author attribution.
///
/// Invariant, maintained by every public mutator: no empty segment, and no
/// two adjacent segments share a user (see [`Buffer::compact`]).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Buffer {
    segments: Vec<Segment>,
}

impl Buffer {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let mut buffer = Buffer { segments };
        buffer.compact();
        buffer
    }

    /// Convenience constructor for tests and callers that don't care about
    /// authorship: the whole string is attributed to one user.
    #[must_use]
    pub fn from_text(user: UserId, text: impl Into<String>) -> Self {
        Buffer::from_segments(vec![Segment::new(user, text)])
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] { &self.segments }

    #[must_use]
    pub fn length(&self) -> usize { self.segments.iter().map(Segment::char_len).sum() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.segments.is_empty() }

    fn flatten(&self) -> Vec<(UserId, char)> {
        self.segments
            .iter()
            .flat_map(|segment| segment.text.chars().map(move |c| (segment.user, c)))
            .collect()
    }

    fn from_flat(flat: Vec<(UserId, char)>) -> Self {
        let mut segments: Vec<Segment> = Vec::new();
        for (user, c) in flat {
            match segments.last_mut() {
                Some(last) if last.user == user => last.text.push(c),
                _ => segments.push(Segment::new(user, c.to_string())),
            }
        }
        Buffer { segments }
    }

    /// Extracts a deep copy of the character range `[begin, end)`. `end`
    /// defaults to [`Buffer::length`] and is clamped to it.
    #[must_use]
    pub fn slice(&self, begin: usize, end: Option<usize>) -> Self {
        let length = self.length();
        let end = end.unwrap_or(length).min(length);
        let begin = begin.min(end);

        let flat = self.flatten();
        Buffer::from_flat(flat[begin..end].to_vec())
    }

    /// Deep copy of the whole buffer.
    #[must_use]
    pub fn copy(&self) -> Self { self.clone() }

    /// Removes `remove` characters starting at `index`, then inserts a copy
    /// of `insert`'s characters at that same position.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::OutOfBounds`] if `index` exceeds the buffer's
    /// length.
    pub fn splice(
        &mut self,
        index: usize,
        remove: usize,
        insert: Option<&Buffer>,
    ) -> Result<(), BufferError> {
        let length = self.length();
        if index > length {
            return Err(BufferError::OutOfBounds { index, length });
        }

        let mut flat = self.flatten();
        let remove_end = (index + remove).min(flat.len());
        flat.drain(index..remove_end);

        if let Some(insert) = insert {
            let inserted = insert.flatten();
            flat.splice(index..index, inserted);
        }

        *self = Buffer::from_flat(flat);
        Ok(())
    }

    /// Removes empty segments and merges adjacent segments from the same
    /// user. Idempotent; called automatically by every public mutator.
    pub fn compact(&mut self) {
        self.segments.retain(|segment| !segment.text.is_empty());

        let mut merged: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for segment in self.segments.drain(..) {
            match merged.last_mut() {
                Some(last) if last.user == segment.user => last.text.push_str(&segment.text),
                _ => merged.push(segment),
            }
        }
        self.segments = merged;
    }

    #[must_use]
    pub fn to_text(&self) -> String { self.segments.iter().map(|segment| segment.text.as_str()).collect() }
}

impl Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Buffer({:?})", self.segments) }
}
