//! Infinote-style operational transformation for real-time collaborative
//! text editing.
//!
//! Each user's edits are wrapped in a [`Request`] tagged with a [`Vector`]
//! (their logical clock at the time of issuing it). A [`State`] queues
//! incoming requests, translates them against whatever the local log has
//! already applied, and executes them against a user-attributed [`Buffer`].
//! Deletes carry a [`Recon`] so that even a delete whose removed text was
//! never locally observed can be reconstructed and later undone.
//!
//! ```
//! use infinote_ot::{Buffer, Operation, Request, State, UserId, Vector};
//!
//! let mut state = State::new();
//! let alice = UserId(1);
//!
//! let insert = Request::do_request(alice, Vector::new(), Operation::insert(0, Buffer::from_text(alice, "hi")));
//! state.execute(Some(insert)).unwrap();
//! assert_eq!(state.buffer().to_text(), "hi");
//! ```

pub mod buffer;
pub mod error;
pub mod operation;
pub mod recon;
pub mod request;
pub mod state;
pub mod user_id;
pub mod vector;

pub use buffer::{Buffer, BufferError, Segment};
pub use error::Error;
pub use operation::{DeleteWhat, Operation, OperationError, Winner};
pub use recon::{Recon, ReconSegment};
pub use request::{Request, RequestError};
pub use state::{State, StateError};
pub use user_id::UserId;
pub use vector::{Vector, VectorParseError};

#[cfg(feature = "wasm")]
pub mod wasm;
