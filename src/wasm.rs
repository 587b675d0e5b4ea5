//! A thin optional surface over [`State`] for JavaScript callers, mirroring
//! the wasm-bindgen surface the rest of this crate's ecosystem exposes over
//! its own core. Not part of the core protocol: session management,
//! transport, and persistence remain the embedder's responsibility.

use wasm_bindgen::prelude::*;

use crate::buffer::Buffer;
use crate::operation::Operation;
use crate::request::Request;
use crate::state::State;
use crate::user_id::UserId;
use crate::vector::Vector;

/// Installs a panic hook that forwards Rust panics to `console.error`,
/// making wasm failures visible in the browser console instead of a bare
/// "unreachable executed" trap.
#[wasm_bindgen]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

/// JS-facing wrapper around [`State`].
#[wasm_bindgen]
#[derive(Debug)]
pub struct JsState(State);

#[wasm_bindgen]
impl JsState {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> Self { JsState(State::new()) }

    #[wasm_bindgen(getter)]
    #[must_use]
    pub fn text(&self) -> String { self.0.buffer().to_text() }

    #[wasm_bindgen(getter)]
    #[must_use]
    pub fn vector(&self) -> String { self.0.vector().to_string() }

    /// Enqueues and immediately attempts to run a local insert by `user` at
    /// `position`. Returns `true` if it executed, `false` if it had to wait.
    pub fn do_insert(&mut self, user: u64, position: usize, text: String) -> Result<bool, JsError> {
        let user = UserId(user);
        let vector = self.0.vector().clone();
        let request =
            Request::do_request(user, vector, Operation::insert(position, Buffer::from_text(user, text)));
        Ok(self.0.execute(Some(request)).map_err(|error| JsError::new(&error.to_string()))?.is_some())
    }

    /// Enqueues and immediately attempts to run a local delete by `user`.
    pub fn do_delete(&mut self, user: u64, position: usize, count: usize) -> Result<bool, JsError> {
        let user = UserId(user);
        let vector = self.0.vector().clone();
        let request = Request::do_request(user, vector, Operation::delete_count(position, count));
        Ok(self.0.execute(Some(request)).map_err(|error| JsError::new(&error.to_string()))?.is_some())
    }

    /// Drains the queue, running every request that's become executable.
    pub fn execute_all(&mut self) -> Result<usize, JsError> {
        Ok(self.0.execute_all().map_err(|error| JsError::new(&error.to_string()))?.len())
    }
}

impl Default for JsState {
    fn default() -> Self { Self::new() }
}

/// Parses the canonical `"u1:n1;u2:n2"` vector grammar, throwing a
/// `JsError` on malformed input rather than returning a sentinel.
#[wasm_bindgen]
pub fn parse_vector(input: &str) -> Result<String, JsError> {
    let vector: Vector = input.parse().map_err(|error: crate::vector::VectorParseError| {
        JsError::new(&error.to_string())
    })?;
    Ok(vector.to_string())
}
