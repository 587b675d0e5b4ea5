//! Replays a small hard-coded edit history through a [`State`] and prints
//! the resulting document. A stand-in for a real transport: in production
//! these requests would arrive over the network, not be built in `main`.

use infinote_ot::{Buffer, Operation, Request, State, UserId, Vector};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut state = State::new();
    let alice = UserId(1);
    let bob = UserId(2);

    let alice_insert =
        Request::do_request(alice, Vector::new(), Operation::insert(0, Buffer::from_text(alice, "hello")));
    state.execute(Some(alice_insert)).expect("alice's insert is causally ready");

    let bob_insert = Request::do_request(
        bob,
        Vector::new().incr(alice, 1),
        Operation::insert(5, Buffer::from_text(bob, "!")),
    );
    state.execute(Some(bob_insert)).expect("bob's insert is causally ready");

    println!("document: {}", state.buffer().to_text());
    println!("vector:   {}", state.vector());
}
