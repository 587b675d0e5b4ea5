mod error;

use core::fmt::{self, Debug, Display};
use core::sync::atomic::{AtomicU64, Ordering};

pub use self::error::RequestError;
use crate::operation::{Operation, Winner};
use crate::user_id::UserId;
use crate::vector::Vector;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 { NEXT_ID.fetch_add(1, Ordering::Relaxed) }

/// A request issued by a user at a point in logical time.
///
/// `Do` carries its own operation; `Undo`/`Redo` don't — they refer back to
/// an earlier request found by walking the log (see [`Request::associated_request`]).
///
/// Every request is tagged with a process-unique `id`, used only as a
/// translation-cache key so repeated calls to [`crate::state::State::translate`]
/// with the same `(request, target)` pair can be memoized; it plays no part
/// in the protocol's semantics and is never compared for equality across
/// processes.
#[derive(Clone)]
pub enum Request {
    Do { id: u64, user: UserId, vector: Vector, operation: Operation },
    Undo { id: u64, user: UserId, vector: Vector },
    Redo { id: u64, user: UserId, vector: Vector },
}

impl Request {
    #[must_use]
    pub fn do_request(user: UserId, vector: Vector, operation: Operation) -> Self {
        Request::Do { id: next_id(), user, vector, operation }
    }

    #[must_use]
    pub fn undo_request(user: UserId, vector: Vector) -> Self {
        Request::Undo { id: next_id(), user, vector }
    }

    #[must_use]
    pub fn redo_request(user: UserId, vector: Vector) -> Self {
        Request::Redo { id: next_id(), user, vector }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            Request::Do { id, .. } | Request::Undo { id, .. } | Request::Redo { id, .. } => *id,
        }
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        match self {
            Request::Do { user, .. } | Request::Undo { user, .. } | Request::Redo { user, .. } => *user,
        }
    }

    #[must_use]
    pub fn vector(&self) -> &Vector {
        match self {
            Request::Do { vector, .. } | Request::Undo { vector, .. } | Request::Redo { vector, .. } => vector,
        }
    }

    #[must_use]
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            Request::Do { operation, .. } => Some(operation),
            Request::Undo { .. } | Request::Redo { .. } => None,
        }
    }

    /// Same logical request, re-tagged with a different vector. Keeps the
    /// original `id` so the translation cache still treats it as "the same
    /// request, viewed at a different time".
    #[must_use]
    pub fn with_vector(&self, vector: Vector) -> Self {
        match self {
            Request::Do { id, user, operation, .. } => {
                Request::Do { id: *id, user: *user, vector, operation: operation.clone() }
            }
            Request::Undo { id, user, .. } => Request::Undo { id: *id, user: *user, vector },
            Request::Redo { id, user, .. } => Request::Redo { id: *id, user: *user, vector },
        }
    }

    /// Applies a `Do` request's operation to `buffer`. A no-op for
    /// `Undo`/`Redo`, which must be resolved to a `Do` by translation before
    /// they ever reach execution.
    pub fn execute(&self, buffer: &mut crate::buffer::Buffer) -> Result<(), RequestError> {
        if let Request::Do { operation, .. } = self {
            operation.apply(buffer)?;
        }
        Ok(())
    }

    /// Transforms a `Do` request so it applies after `other` has already
    /// been applied, advancing its vector by `other`'s user's contribution.
    pub fn transform(&self, other: &Request, cid: Option<Winner>) -> Result<Self, RequestError> {
        match self {
            Request::Do { id, user, vector, operation } => {
                let other_op = other.operation().cloned().unwrap_or(Operation::NoOp);
                let transformed = if matches!(operation, Operation::NoOp) {
                    Operation::NoOp
                } else {
                    operation.transform(&other_op, cid)?
                };
                Ok(Request::Do {
                    id: *id,
                    user: *user,
                    vector: vector.incr(other.user(), 1),
                    operation: transformed,
                })
            }
            Request::Undo { .. } | Request::Redo { .. } => {
                Err(RequestError::Operation(crate::operation::OperationError::ShapeMismatch))
            }
        }
    }

    /// Flips a `Do` request's operation and advances its own user's vector
    /// component by `amount` (used by the late-mirror undo/redo strategy).
    pub fn mirror(&self, amount: i64) -> Result<Self, RequestError> {
        match self {
            Request::Do { id, user, vector, operation } => Ok(Request::Do {
                id: *id,
                user: *user,
                vector: vector.incr(*user, amount),
                operation: operation.mirror()?,
            }),
            Request::Undo { .. } | Request::Redo { .. } => {
                Err(RequestError::Operation(crate::operation::OperationError::ShapeMismatch))
            }
        }
    }

    /// Collapses a do/undo or undo/redo pair authored by `user`, advancing
    /// `user`'s component in this request's vector by `amount`. `amount`
    /// must be even: a fold always removes a matched pair.
    pub fn fold(&self, user: UserId, amount: i64) -> Result<Self, RequestError> {
        if amount % 2 != 0 {
            return Err(RequestError::FoldParity { amount });
        }
        Ok(self.with_vector(self.vector().incr(user, amount)))
    }

    /// Walks `log` backwards (excluding this request) to find the prior
    /// request this undo/redo refers to. Returns `None` for `Do` requests
    /// and when no matching entry exists.
    #[must_use]
    pub fn associated_request<'a>(&self, log: &'a [Request]) -> Option<&'a Request> {
        let (user, is_undo) = match self {
            Request::Undo { user, .. } => (*user, true),
            Request::Redo { user, .. } => (*user, false),
            Request::Do { .. } => return None,
        };

        let mut seq: i64 = 1;
        for entry in log.iter().rev() {
            // `log` may itself contain `self` (callers routinely look up a
            // request's associated request by its own logged form); the walk
            // must start strictly before `self`, so skip that entry rather
            // than letting it throw off the seq count.
            if entry.id() == self.id() {
                continue;
            }
            if entry.user() != user {
                continue;
            }
            if entry.vector().get(user) > self.vector().get(user) {
                continue;
            }

            let delta = match entry {
                Request::Undo { .. } if is_undo => 1,
                Request::Undo { .. } => -1,
                Request::Redo { .. } if is_undo => -1,
                Request::Redo { .. } => 1,
                Request::Do { .. } => -1,
            };
            seq += delta;

            if seq == 0 {
                return Some(entry);
            }
        }
        None
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool { self.id() == other.id() }
}

impl Eq for Request {}

impl Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Do { user, vector, operation, .. } => {
                write!(f, "Do({user}, {vector}, {operation})")
            }
            Request::Undo { user, vector, .. } => write!(f, "Undo({user}, {vector})"),
            Request::Redo { user, vector, .. } => write!(f, "Redo({user}, {vector})"),
        }
    }
}

impl Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{self}") }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::buffer::Buffer;

    fn u(id: u64) -> UserId { UserId(id) }

    #[test]
    fn do_request_execute_applies_operation() {
        let mut buffer = Buffer::from_text(u(1), "hello");
        let request = Request::do_request(u(1), Vector::new(), Operation::insert(5, Buffer::from_text(u(1), "!")));
        request.execute(&mut buffer).unwrap();
        assert_eq!(buffer.to_text(), "hello!");
    }

    #[test]
    fn fold_requires_even_amount() {
        let request = Request::do_request(u(1), Vector::new(), Operation::NoOp);
        assert!(matches!(request.fold(u(1), 1), Err(RequestError::FoldParity { amount: 1 })));
        assert!(request.fold(u(1), 2).is_ok());
    }

    #[test]
    fn associated_request_finds_matching_do() {
        let insert = Request::do_request(u(1), Vector::new(), Operation::insert(0, Buffer::from_text(u(1), "hi")));
        let undo = Request::undo_request(u(1), Vector::new().incr(u(1), 1));
        let log = vec![insert.clone()];
        let found = undo.associated_request(&log).unwrap();
        assert_eq!(found.id(), insert.id());
    }

    #[test]
    fn associated_request_skips_other_users() {
        let mine = Request::do_request(u(1), Vector::new(), Operation::insert(0, Buffer::from_text(u(1), "a")));
        let theirs = Request::do_request(u(2), Vector::new(), Operation::insert(0, Buffer::from_text(u(2), "b")));
        let undo = Request::undo_request(u(1), Vector::new().incr(u(1), 1).incr(u(2), 1));
        let log = vec![mine.clone(), theirs];
        let found = undo.associated_request(&log).unwrap();
        assert_eq!(found.id(), mine.id());
    }

    #[test]
    fn associated_request_excludes_self_when_already_logged() {
        // `State::reachable_user` looks up a logged undo/redo's own associated
        // request by calling this on the log it's already part of; the walk
        // must skip that entry rather than count it against itself.
        let insert = Request::do_request(u(1), Vector::new(), Operation::insert(0, Buffer::from_text(u(1), "hi")));
        let undo = Request::undo_request(u(1), Vector::new().incr(u(1), 1));
        let log = vec![insert.clone(), undo.clone()];
        let found = undo.associated_request(&log).unwrap();
        assert_eq!(found.id(), insert.id());
    }
}
