mod error;

use core::fmt::{self, Debug, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use self::error::OperationError;
use crate::buffer::Buffer;
use crate::recon::Recon;

/// Which side wins a positional tie between two concurrent inserts (or,
/// recursively, between the matching children of two concurrent splits).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Winner {
    Left,
    Right,
}

impl Winner {
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Winner::Left => Winner::Right,
            Winner::Right => Winner::Left,
        }
    }
}

/// The payload of a delete: either the actual removed text (a *reversible*
/// delete, which can be mirrored back into an insert) or just a character
/// count (a *non-reversible* delete, typically one received from a remote
/// peer before its `recon` has reconstructed the lost text).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DeleteWhat {
    Reversible(Buffer),
    Count(usize),
}

impl DeleteWhat {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            DeleteWhat::Reversible(buffer) => buffer.length(),
            DeleteWhat::Count(count) => *count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    #[must_use]
    pub fn is_reversible(&self) -> bool { matches!(self, DeleteWhat::Reversible(_)) }

    #[must_use]
    pub fn split_at(&self, at: usize) -> (Self, Self) {
        match self {
            DeleteWhat::Reversible(buffer) => (
                DeleteWhat::Reversible(buffer.slice(0, Some(at))),
                DeleteWhat::Reversible(buffer.slice(at, None)),
            ),
            DeleteWhat::Count(count) => (DeleteWhat::Count(at), DeleteWhat::Count(count - at)),
        }
    }

    /// Returns the removed text for range `[a, b)`, or `None` if this delete
    /// doesn't carry actual text (non-reversible).
    #[must_use]
    pub fn slice(&self, a: usize, b: usize) -> Option<Buffer> {
        match self {
            DeleteWhat::Reversible(buffer) => Some(buffer.slice(a, Some(b))),
            DeleteWhat::Count(_) => None,
        }
    }

    #[must_use]
    pub fn empty_like(&self) -> Self {
        match self {
            DeleteWhat::Reversible(_) => DeleteWhat::Reversible(Buffer::new()),
            DeleteWhat::Count(_) => DeleteWhat::Count(0),
        }
    }

    pub fn merge(&self, other: &Self) -> Result<Self, OperationError> {
        match (self, other) {
            (DeleteWhat::Reversible(a), DeleteWhat::Reversible(b)) => {
                let mut merged = a.clone();
                let len = merged.length();
                merged.splice(len, 0, Some(b))?;
                Ok(DeleteWhat::Reversible(merged))
            }
            (DeleteWhat::Count(a), DeleteWhat::Count(b)) => Ok(DeleteWhat::Count(a + b)),
            _ => Err(OperationError::MergeMismatch),
        }
    }
}

/// A single edit to a [`Buffer`]. Insert and Split require a `cid` tie-break
/// when transformed against another operation at the same position; NoOp
/// and Delete don't.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq)]
pub enum Operation {
    NoOp,
    Insert { position: usize, text: Buffer },
    Delete { position: usize, what: DeleteWhat, recon: Recon },
    Split(Box<Operation>, Box<Operation>),
}

impl Operation {
    #[must_use]
    pub fn insert(position: usize, text: Buffer) -> Self { Operation::Insert { position, text } }

    #[must_use]
    pub fn delete_reversible(position: usize, text: Buffer) -> Self {
        Operation::Delete { position, what: DeleteWhat::Reversible(text), recon: Recon::new() }
    }

    #[must_use]
    pub fn delete_count(position: usize, count: usize) -> Self {
        Operation::Delete { position, what: DeleteWhat::Count(count), recon: Recon::new() }
    }

    #[must_use]
    pub fn split(first: Operation, second: Operation) -> Self {
        Operation::Split(Box::new(first), Box::new(second))
    }

    #[must_use]
    pub fn requires_cid(&self) -> bool { matches!(self, Operation::Insert { .. } | Operation::Split(..)) }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Operation::NoOp => 0,
            Operation::Insert { text, .. } => text.length(),
            Operation::Delete { what, .. } => what.len(),
            Operation::Split(a, b) => a.len() + b.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Applies this operation to `buffer` in place.
    pub fn apply(&self, buffer: &mut Buffer) -> Result<(), OperationError> {
        match self {
            Operation::NoOp => Ok(()),
            Operation::Insert { position, text } => {
                buffer.splice(*position, 0, Some(text))?;
                Ok(())
            }
            Operation::Delete { position, what, .. } => {
                buffer.splice(*position, what.len(), None)?;
                Ok(())
            }
            Operation::Split(first, second) => {
                first.apply(buffer)?;
                second.transform(first, None)?.apply(buffer)
            }
        }
    }

    /// Returns the inverse of this operation, or an error if it's a
    /// non-reversible delete.
    pub fn mirror(&self) -> Result<Self, OperationError> {
        match self {
            Operation::NoOp => Ok(Operation::NoOp),
            Operation::Insert { position, text } => {
                Ok(Operation::Delete {
                    position: *position,
                    what: DeleteWhat::Reversible(text.copy()),
                    recon: Recon::new(),
                })
            }
            Operation::Delete { position, what: DeleteWhat::Reversible(text), .. } => {
                Ok(Operation::Insert { position: *position, text: text.copy() })
            }
            Operation::Delete { what: DeleteWhat::Count(_), .. } => Err(OperationError::MirrorUndefined),
            Operation::Split(first, second) => {
                let first_mirror = first.mirror()?;
                let second_mirror = second.transform(first, None)?.mirror()?;
                Ok(Operation::Split(Box::new(first_mirror), Box::new(second_mirror)))
            }
        }
    }

    /// Tie-break oracle for two concurrent inserts (recursing through
    /// splits by pairing up their first halves, then second halves).
    #[must_use]
    pub fn cid(&self, other: &Operation) -> Option<Winner> {
        match (self, other) {
            (Operation::Insert { position: p1, .. }, Operation::Insert { position: p2, .. }) => {
                match p1.cmp(p2) {
                    core::cmp::Ordering::Less => Some(Winner::Right),
                    core::cmp::Ordering::Greater => Some(Winner::Left),
                    core::cmp::Ordering::Equal => None,
                }
            }
            (Operation::Split(a1, b1), Operation::Split(a2, b2)) => a1.cid(a2).or_else(|| b1.cid(b2)),
            (Operation::Split(a1, b1), other) => a1.cid(other).or_else(|| b1.cid(other)),
            (self_, Operation::Split(a2, b2)) => self_.cid(a2).or_else(|| self_.cid(b2)),
            _ => None,
        }
    }

    /// Transforms `self` so it can be applied after `other` has already
    /// been applied to the same base state. `cid` breaks position ties
    /// between two concurrent inserts; it's ignored by NoOp and Delete.
    pub fn transform(&self, other: &Operation, cid: Option<Winner>) -> Result<Self, OperationError> {
        if let Operation::Split(first, second) = other {
            let after_first = self.transform(first, cid)?;
            let second_after_first = second.transform(first, None)?;
            return after_first.transform(&second_after_first, cid);
        }

        match self {
            Operation::NoOp => Ok(Operation::NoOp),
            Operation::Insert { position, text } => transform_insert(*position, text, other, cid),
            Operation::Delete { position, what, recon } => transform_delete(*position, what, recon, other, cid),
            Operation::Split(first, second) => {
                Ok(Operation::Split(
                    Box::new(first.transform(other, cid)?),
                    Box::new(second.transform(other, cid)?),
                ))
            }
        }
    }

    /// Splits a delete at character offset `at` into a `Split` of two
    /// deletes covering `[0, at)` and `[at, len)` of its removed range.
    #[must_use]
    pub fn split_delete(&self, at: usize) -> Self {
        match self {
            Operation::Delete { position, what, recon } => {
                let (left_what, right_what) = what.split_at(at);
                let (left_recon, right_recon) = recon.split_at(at);
                Operation::Split(
                    Box::new(Operation::Delete { position: *position, what: left_what, recon: left_recon }),
                    Box::new(Operation::Delete { position: position + at, what: right_what, recon: right_recon }),
                )
            }
            other => other.clone(),
        }
    }

    /// Reads off the text this (translated) operation removed from
    /// `buffer`, restoring any recorded recon segments, so it can be turned
    /// into a reversible delete. A translated delete may have become a
    /// `Split` (when a concurrent insert landed inside its range); `second`
    /// is transformed against `first` first, the same way [`Operation::apply`]
    /// handles a `Split`.
    fn affected_text(&self, buffer: &Buffer) -> Result<Buffer, OperationError> {
        match self {
            Operation::Delete { position, what, recon } => {
                let mut text = buffer.slice(*position, Some(position + what.len()));
                recon.restore(&mut text);
                Ok(text)
            }
            Operation::Split(first, second) => {
                let first_text = first.affected_text(buffer)?;

                let mut buffer_after_first = buffer.clone();
                first.apply(&mut buffer_after_first)?;
                let second_transformed = second.transform(first, None)?;
                let second_text = second_transformed.affected_text(&buffer_after_first)?;

                let mut merged = first_text;
                let merged_len = merged.length();
                merged.splice(merged_len, 0, Some(&second_text))?;
                Ok(merged)
            }
            _ => Err(OperationError::MirrorUndefined),
        }
    }

    /// Given `translated` (this operation's form against the current
    /// state) and `buffer` (the state's buffer right before `translated`
    /// is applied), returns an equivalent operation that carries its own
    /// removed text, so it can later be mirrored.
    pub fn make_reversible(&self, translated: &Operation, buffer: &Buffer) -> Result<Self, OperationError> {
        match self {
            Operation::Delete { position, what, .. } if what.is_reversible() => {
                let _ = (position, translated, buffer);
                Ok(self.clone())
            }
            Operation::Delete { position, .. } => {
                let text = translated.affected_text(buffer)?;
                Ok(Operation::Delete { position: *position, what: DeleteWhat::Reversible(text), recon: Recon::new() })
            }
            Operation::Split(first, second) => {
                let Operation::Split(translated_first, translated_second) = translated else {
                    return Err(OperationError::ShapeMismatch);
                };
                let first_reversible = first.make_reversible(translated_first, buffer)?;

                let mut buffer_after_first = buffer.clone();
                translated_first.apply(&mut buffer_after_first)?;
                let second_reversible = second.make_reversible(translated_second, &buffer_after_first)?;

                Ok(Operation::Split(Box::new(first_reversible), Box::new(second_reversible)))
            }
            other => Ok(other.clone()),
        }
    }
}

fn transform_insert(
    position: usize,
    text: &Buffer,
    other: &Operation,
    cid: Option<Winner>,
) -> Result<Operation, OperationError> {
    match other {
        Operation::NoOp => Ok(Operation::Insert { position, text: text.copy() }),
        Operation::Insert { position: other_position, text: other_text } => {
            let other_len = other_text.length();
            // A position tie is broken by `cid`: the side it names as the
            // anchor (`Winner::Left` = self, `Winner::Right` = other) keeps
            // the lower position; the other side shifts past it.
            let shift_right = position > *other_position
                || (position == *other_position && cid == Some(Winner::Right));
            let stays = position < *other_position
                || (position == *other_position && cid == Some(Winner::Left));

            if stays {
                Ok(Operation::Insert { position, text: text.copy() })
            } else if shift_right {
                Ok(Operation::Insert { position: position + other_len, text: text.copy() })
            } else {
                Err(OperationError::AmbiguousCid { position })
            }
        }
        Operation::Delete { position: other_position, what: other_what, .. } => {
            let other_len = other_what.len();
            if position >= other_position + other_len {
                Ok(Operation::Insert { position: position - other_len, text: text.copy() })
            } else if position < *other_position {
                Ok(Operation::Insert { position, text: text.copy() })
            } else {
                Ok(Operation::Insert { position: *other_position, text: text.copy() })
            }
        }
        Operation::Split(..) => unreachable!("split handled by Operation::transform before dispatch"),
    }
}

#[allow(clippy::too_many_lines)]
fn transform_delete(
    position: usize,
    what: &DeleteWhat,
    recon: &Recon,
    other: &Operation,
    cid: Option<Winner>,
) -> Result<Operation, OperationError> {
    match other {
        Operation::NoOp => Ok(Operation::Delete { position, what: what.clone(), recon: recon.clone() }),

        Operation::Insert { position: other_position, text: other_text } => {
            let other_len = other_text.length();
            let len = what.len();

            if *other_position >= position + len {
                Ok(Operation::Delete { position, what: what.clone(), recon: recon.clone() })
            } else if *other_position <= position {
                Ok(Operation::Delete { position: position + other_len, what: what.clone(), recon: recon.clone() })
            } else {
                let at = other_position - position;
                let (left_what, right_what) = what.split_at(at);
                let (left_recon, right_recon) = recon.split_at(at);
                Ok(Operation::Split(
                    Box::new(Operation::Delete { position, what: left_what, recon: left_recon }),
                    Box::new(Operation::Delete {
                        position: position + at + other_len,
                        what: right_what,
                        recon: right_recon,
                    }),
                ))
            }
        }

        Operation::Delete { position: py, what: other_what, .. } => {
            let px = position;
            let lx = what.len();
            let ly = other_what.len();
            let py = *py;

            if px + lx <= py {
                // entirely left of other
                Ok(Operation::Delete { position: px, what: what.clone(), recon: recon.clone() })
            } else if px >= py + ly {
                // entirely right of other
                Ok(Operation::Delete { position: px - ly, what: what.clone(), recon: recon.clone() })
            } else if py <= px && py + ly >= px + lx {
                // X entirely inside other: whatever X removed, other removed it first
                let overlap = other_what.slice(px - py, px - py + lx);
                let new_recon = match overlap {
                    Some(buffer) => recon.update(0, buffer),
                    None => recon.clone(),
                };
                Ok(Operation::Delete { position: py, what: what.empty_like(), recon: new_recon })
            } else if py <= px && py + ly < px + lx {
                // other clips X's left edge
                let clipped = py + ly - px;
                let (_, right_what) = what.split_at(clipped);
                let (_, right_recon) = recon.split_at(clipped);
                let overlap = other_what.slice(px - py, ly);
                let new_recon = match overlap {
                    Some(buffer) => right_recon.update(0, buffer),
                    None => right_recon,
                };
                Ok(Operation::Delete { position: py, what: right_what, recon: new_recon })
            } else if px < py && py + ly >= px + lx {
                // other clips X's right edge
                let left_len = py - px;
                let (left_what, _) = what.split_at(left_len);
                let (left_recon, _) = recon.split_at(left_len);
                let overlap = other_what.slice(0, px + lx - py);
                let new_recon = match overlap {
                    Some(buffer) => left_recon.update(left_len, buffer),
                    None => left_recon,
                };
                Ok(Operation::Delete { position: px, what: left_what, recon: new_recon })
            } else {
                // other strictly inside X: px < py and py+ly < px+lx
                let at1 = py - px;
                let (left_what, rest_what) = what.split_at(at1);
                let (_, right_what) = rest_what.split_at(ly);
                let merged_what = left_what.merge(&right_what)?;

                let (left_recon, rest_recon) = recon.split_at(at1);
                let (_, right_recon) = rest_recon.split_at(ly);
                let merged_recon = left_recon.merge(&right_recon, at1);
                let merged_recon = match other_what.slice(0, ly) {
                    Some(buffer) => merged_recon.update(at1, buffer),
                    None => merged_recon,
                };

                Ok(Operation::Delete { position: px, what: merged_what, recon: merged_recon })
            }
        }

        Operation::Split(..) => unreachable!("split handled by Operation::transform before dispatch"),
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::NoOp => write!(f, "<noop>"),
            Operation::Insert { position, text } => write!(f, "<insert '{}' at {position}>", text.to_text()),
            Operation::Delete { position, what, .. } => match what {
                DeleteWhat::Reversible(buffer) => {
                    write!(f, "<delete '{}' from {position}>", buffer.to_text())
                }
                DeleteWhat::Count(count) => write!(f, "<delete {count} characters from {position}>"),
            },
            Operation::Split(first, second) => write!(f, "<split {first} ++ {second}>"),
        }
    }
}

impl Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{self}") }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::user_id::UserId;

    fn u(id: u64) -> UserId { UserId(id) }

    fn text(s: &str) -> Buffer { Buffer::from_text(u(1), s) }

    #[test]
    fn insert_apply() {
        let mut buffer = text("hello");
        Operation::insert(5, text(" world")).apply(&mut buffer).unwrap();
        assert_eq!(buffer.to_text(), "hello world");
    }

    #[test]
    fn delete_apply_reversible() {
        let mut buffer = text("hello world");
        Operation::delete_reversible(0, text("hello ")).apply(&mut buffer).unwrap();
        assert_eq!(buffer.to_text(), "world");
    }

    #[test]
    fn mirror_insert_then_apply_restores() {
        let original = text("hello world");
        let mut mutated = original.copy();
        let insert = Operation::insert(5, text(","));
        insert.apply(&mut mutated).unwrap();
        insert.mirror().unwrap().apply(&mut mutated).unwrap();
        assert_eq!(mutated.to_text(), original.to_text());
    }

    #[test]
    fn mirror_reversible_delete_restores() {
        let original = text("hello world");
        let mut mutated = original.copy();
        let removed = original.slice(0, Some(6));
        let delete = Operation::delete_reversible(0, removed);
        delete.apply(&mut mutated).unwrap();
        delete.mirror().unwrap().apply(&mut mutated).unwrap();
        assert_eq!(mutated.to_text(), original.to_text());
    }

    #[test]
    fn mirror_non_reversible_delete_errors() {
        let delete = Operation::delete_count(0, 3);
        assert_eq!(delete.mirror().unwrap_err(), OperationError::MirrorUndefined);
    }

    #[test]
    fn concurrent_inserts_same_position_resolved_by_cid() {
        // `a` is named the anchor (`Winner::Left` from `b`'s perspective
        // would mean `b` itself stays put; here the caller names `a` the
        // winner, so `b` shifts past it).
        let a = Operation::insert(0, text("A"));
        let b = Operation::insert(0, text("B"));
        let b_after_a = b.transform(&a, Some(Winner::Right)).unwrap();
        match b_after_a {
            Operation::Insert { position, .. } => assert_eq!(position, 1),
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn delete_split_around_concurrent_insert() {
        let delete = Operation::delete_count(1, 4); // removes "bcde" from "abcdef"
        let insert = Operation::insert(3, text("X")); // inserted inside the deleted range
        let transformed = delete.transform(&insert, None).unwrap();
        assert!(matches!(transformed, Operation::Split(..)));

        let mut buffer = text("abcXdef");
        transformed.apply(&mut buffer).unwrap();
        assert_eq!(buffer.to_text(), "aXf");
    }

    #[test]
    fn delete_entirely_inside_another_delete_collapses_to_empty() {
        let x = Operation::delete_count(2, 2); // "cd" from "abcdef"
        let y = Operation::delete_reversible(1, text("bcde")); // removes "bcde" first
        let transformed = x.transform(&y, None).unwrap();
        match transformed {
            Operation::Delete { position, what, .. } => {
                assert_eq!(position, 1);
                assert_eq!(what.len(), 0);
            }
            other => panic!("expected delete, got {other:?}"),
        }
    }

    #[test]
    fn delete_makes_reversible_against_prior_buffer() {
        let buffer = text("abcdef");
        let delete = Operation::delete_count(2, 3); // "cde"
        let reversible = delete.make_reversible(&delete, &buffer).unwrap();
        match reversible {
            Operation::Delete { what: DeleteWhat::Reversible(text), .. } => assert_eq!(text.to_text(), "cde"),
            other => panic!("expected reversible delete, got {other:?}"),
        }
    }
}
