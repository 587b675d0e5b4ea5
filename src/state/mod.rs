mod error;

use core::fmt::{self, Debug};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use lru::LruCache;

pub use self::error::StateError;
use crate::buffer::Buffer;
use crate::operation::{Operation, Winner};
use crate::request::{Request, RequestError};
use crate::user_id::UserId;
use crate::vector::Vector;

fn with_component(vector: &Vector, user: UserId, value: u64) -> Vector {
    let delta = value as i64 - vector.get(user) as i64;
    vector.incr(user, delta)
}

/// The shared document: its text, the logical clock of everything applied
/// to it, the append-only log of executed requests, a queue of requests
/// waiting on a causal dependency, and a translation memo cache.
///
/// Single-threaded and cooperative: all mutation happens through
/// [`State::execute`]/[`State::execute_all`]; `translate` only reads the
/// log and buffer (aside from memoizing into its own cache).
pub struct State {
    buffer: Buffer,
    vector: Vector,
    log: Vec<Request>,
    queue: Vec<Request>,
    cache: LruCache<(u64, Vector), Request>,
    on_execute: Option<Box<dyn FnMut(&Request)>>,
}

impl State {
    #[must_use]
    pub fn new() -> Self { Self::with_cache_capacity(None) }

    /// `capacity = None` keeps the default, unbounded translation cache,
    /// matching the reference algorithm exactly. `Some(n)` bounds it to the
    /// `n` most recently used translations; eviction only ever discards a
    /// memoized result, never log or buffer state, so it cannot change what
    /// `translate` returns, only whether a given call recomputes it.
    #[must_use]
    pub fn with_cache_capacity(capacity: Option<NonZeroUsize>) -> Self {
        State {
            buffer: Buffer::new(),
            vector: Vector::new(),
            log: Vec::new(),
            queue: Vec::new(),
            cache: capacity.map_or_else(LruCache::unbounded, LruCache::new),
            on_execute: None,
        }
    }

    pub fn set_on_execute(&mut self, callback: impl FnMut(&Request) + 'static) {
        self.on_execute = Some(Box::new(callback));
    }

    #[must_use]
    pub fn buffer(&self) -> &Buffer { &self.buffer }

    #[must_use]
    pub fn vector(&self) -> &Vector { &self.vector }

    #[must_use]
    pub fn log(&self) -> &[Request] { &self.log }

    #[must_use]
    pub fn queue(&self) -> &[Request] { &self.queue }

    pub fn enqueue(&mut self, request: Request) { self.queue.push(request); }

    #[must_use]
    pub fn request_by_user(&self, user: UserId, index: usize) -> Option<&Request> {
        self.log.iter().filter(|request| request.user() == user).nth(index)
    }

    #[must_use]
    pub fn can_execute(&self, request: &Request) -> bool {
        match request {
            Request::Do { vector, .. } => vector.causally_before(&self.vector),
            Request::Undo { .. } | Request::Redo { .. } => request.associated_request(&self.log).is_some(),
        }
    }

    fn reachable_user(&self, target: &Vector, user: UserId) -> bool {
        let mut n = target.get(user);
        loop {
            if n == 0 {
                return true;
            }
            let Some(request) = self.request_by_user(user, (n - 1) as usize) else {
                return false;
            };
            match request {
                Request::Do { vector, .. } => return vector.causally_before(target),
                Request::Undo { .. } | Request::Redo { .. } => {
                    let Some(associated) = request.associated_request(&self.log) else {
                        return false;
                    };
                    n = associated.vector().get(user);
                }
            }
        }
    }

    /// `true` iff the state could, in principle, have its clock advanced to
    /// exactly `target` given the current log — i.e. every user's
    /// contribution to `target` names a causally consistent prefix of the
    /// log.
    #[must_use]
    pub fn reachable(&self, target: &Vector) -> bool {
        let mut users: BTreeSet<UserId> = target.users().collect();
        users.extend(self.log.iter().map(Request::user));
        users.iter().all(|&user| self.reachable_user(target, user))
    }

    /// Returns an operation-equivalent form of `request` that can be
    /// applied after the log has reached `target`. Memoized per
    /// `(request identity, target)`.
    pub fn translate(&mut self, request: &Request, target: &Vector) -> Result<Request, StateError> {
        self.translate_impl(request, target, false)
    }

    fn translate_impl(&mut self, request: &Request, target: &Vector, no_cache: bool) -> Result<Request, StateError> {
        // Undo/Redo carry no operation of their own: even when their vector
        // already equals `target`, they still need late-mirror resolution
        // to produce a concrete, applicable operation.
        if matches!(request, Request::Do { .. }) && request.vector().equals(target) {
            return Ok(request.with_vector(target.clone()));
        }

        let key = (request.id(), target.clone());
        if !no_cache {
            if let Some(hit) = self.cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let result = self.translate_uncached(request, target)?;

        if !no_cache {
            self.cache.put(key, result.clone());
        }
        Ok(result)
    }

    fn translate_uncached(&mut self, request: &Request, target: &Vector) -> Result<Request, StateError> {
        if matches!(request, Request::Undo { .. } | Request::Redo { .. }) {
            return self.translate_by_late_mirror(request, target);
        }
        self.translate_by_transform(request, target)
    }

    /// Tries to resolve an undo/redo by mirroring its (translated)
    /// associated request, rather than transforming through every
    /// intervening request individually. Falls back to the general
    /// transform loop when the mirror point isn't reachable — e.g. an undo
    /// of an edit that another user has since built on top of.
    fn translate_by_late_mirror(&mut self, request: &Request, target: &Vector) -> Result<Request, StateError> {
        let associated = request
            .associated_request(&self.log)
            .ok_or(RequestError::NoAssociatedRequest)?
            .clone();

        let user = request.user();
        let mirror_at = with_component(target, user, associated.vector().get(user));

        if !self.reachable(&mirror_at) {
            return self.translate_by_transform(request, target);
        }

        let translated_associated = self.translate_impl(&associated, &mirror_at, false)?;
        let amount = target.get(user) as i64 - mirror_at.get(user) as i64;
        Ok(translated_associated.mirror(amount)?)
    }

    fn translate_by_transform(&mut self, request: &Request, target: &Vector) -> Result<Request, StateError> {
        let self_user = request.user();

        let mut users: Vec<UserId> = target.users().chain(self.log.iter().map(Request::user)).collect();
        users.sort();
        users.dedup();

        for user in users {
            if user == self_user || target.get(user) <= request.vector().get(user) {
                continue;
            }

            let last_index = (target.get(user) - 1) as usize;
            // `target` names more of `user`'s contributions than the log
            // actually holds — only possible if a caller handed us a target
            // that was never checked against `reachable` first.
            let last = self
                .request_by_user(user, last_index)
                .cloned()
                .ok_or(StateError::UnknownRequest)?;

            if let Some(translated) = self.try_fold(request, target, user, &last)? {
                return Ok(translated);
            }

            let transform_at = target.incr(user, -1);
            if self.reachable(&transform_at) {
                let r1 = self.translate_impl(request, &transform_at, false)?;
                let r2 = self.translate_impl(&last, &transform_at, false)?;

                let cid = if r1.operation().is_some_and(Operation::requires_cid) {
                    Some(self.resolve_cid(&r1, &r2, request, &last, target)?)
                } else {
                    None
                };

                return Ok(r1.transform(&r2, cid)?);
            }
        }

        Err(StateError::NoTranslationPath { target: target.clone() })
    }

    fn try_fold(
        &mut self,
        request: &Request,
        target: &Vector,
        user: UserId,
        last: &Request,
    ) -> Result<Option<Request>, StateError> {
        if !matches!(last, Request::Undo { .. } | Request::Redo { .. }) {
            return Ok(None);
        }
        let Some(associated) = last.associated_request(&self.log) else {
            return Ok(None);
        };
        let associated = associated.clone();

        let fold_by = target.get(user) as i64 - associated.vector().get(user) as i64;
        if fold_by <= 0 || (target.get(user) as i64) < fold_by {
            return Ok(None);
        }

        let fold_at = target.incr(user, -fold_by);
        if !self.reachable(&fold_at) || !request.vector().causally_before(&fold_at) {
            return Ok(None);
        }

        let translated = self.translate_impl(request, &fold_at, false)?;
        Ok(Some(translated.fold(user, fold_by)?))
    }

    fn resolve_cid(
        &mut self,
        r1: &Request,
        r2: &Request,
        original_request: &Request,
        original_other: &Request,
        frame_target: &Vector,
    ) -> Result<Winner, StateError> {
        let op1 = r1.operation().cloned().unwrap_or(Operation::NoOp);
        let op2 = r2.operation().cloned().unwrap_or(Operation::NoOp);

        if let Some(winner) = op1.cid(&op2) {
            return Ok(winner);
        }

        let lcs = Vector::least_common_successor(original_request.vector(), original_other.vector());
        // `original_request`/`original_other` are `request`/`last` from the
        // enclosing `translate_by_transform(request, frame_target)` call. If
        // their lcs equals `frame_target`, retrying the translation there
        // would just re-enter that same in-progress call with nothing
        // smaller to make progress on — skip straight to the user-id
        // tie-break instead of recursing forever.
        if !lcs.equals(frame_target) && self.reachable(&lcs) {
            let r1_lcs = self.translate_impl(original_request, &lcs, false)?;
            let r2_lcs = self.translate_impl(original_other, &lcs, false)?;
            let op1_lcs = r1_lcs.operation().cloned().unwrap_or(Operation::NoOp);
            let op2_lcs = r2_lcs.operation().cloned().unwrap_or(Operation::NoOp);
            if let Some(winner) = op1_lcs.cid(&op2_lcs) {
                return Ok(winner);
            }
        }

        Ok(if original_request.user().0 < original_other.user().0 { Winner::Left } else { Winner::Right })
    }

    /// Executes `request`, or (when `None`) the first queued request that's
    /// currently executable. Returns the executed, fully-translated
    /// request, or `None` if nothing was ready.
    #[tracing::instrument(skip_all)]
    pub fn execute(&mut self, request: Option<Request>) -> Result<Option<Request>, StateError> {
        let request = match request {
            Some(request) => request,
            None => {
                let Some(index) = self.queue.iter().position(|request| self.can_execute(request)) else {
                    return Ok(None);
                };
                self.queue.remove(index)
            }
        };

        if !self.can_execute(&request) {
            tracing::debug!("request not yet executable, re-queueing");
            self.queue.push(request);
            return Ok(None);
        }

        let resolved = match &request {
            Request::Undo { .. } | Request::Redo { .. } => {
                let associated = request
                    .associated_request(&self.log)
                    .ok_or(RequestError::NoAssociatedRequest)?
                    .clone();
                let preserved = request.vector().get(request.user());
                let new_vector = with_component(associated.vector(), request.user(), preserved);
                request.with_vector(new_vector)
            }
            Request::Do { .. } => request.clone(),
        };

        let target = self.vector.clone();
        let translated = self.translate_impl(&resolved, &target, false)?;

        let log_entry = match (&resolved, translated.operation()) {
            (Request::Do { operation: Operation::Delete { .. }, .. }, Some(translated_operation)) => {
                let reversible =
                    resolved.operation().expect("Do carries an operation").make_reversible(
                        translated_operation,
                        &self.buffer,
                    )?;
                match &resolved {
                    Request::Do { id, user, vector, .. } => {
                        Request::Do { id: *id, user: *user, vector: vector.clone(), operation: reversible }
                    }
                    _ => unreachable!("matched on Request::Do above"),
                }
            }
            _ => resolved,
        };
        self.log.push(log_entry);

        translated.execute(&mut self.buffer)?;
        self.vector = self.vector.incr(translated.user(), 1);

        if let Some(callback) = &mut self.on_execute {
            callback(&translated);
        }

        tracing::debug!(vector = %self.vector, "executed request");
        Ok(Some(translated))
    }

    /// Repeatedly executes queued requests until none are ready, returning
    /// everything that ran, in execution order.
    pub fn execute_all(&mut self) -> Result<Vec<Request>, StateError> {
        let mut executed = Vec::new();
        while let Some(request) = self.execute(None)? {
            executed.push(request);
        }
        Ok(executed)
    }
}

impl Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("buffer", &self.buffer)
            .field("vector", &self.vector)
            .field("log_len", &self.log.len())
            .field("queue_len", &self.queue.len())
            .finish()
    }
}

impl Default for State {
    fn default() -> Self { Self::new() }
}
