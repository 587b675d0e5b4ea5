//! End-to-end scenarios driven entirely through `State`, the way a real
//! transport would feed it requests arriving out of causal order.

use infinote_ot::{Buffer, Operation, Request, State, UserId, Vector};
use pretty_assertions::assert_eq;

#[test]
fn concurrent_inserts_at_the_same_position_are_ordered_by_cid() {
    let mut state = State::new();
    let alice = UserId(1);
    let bob = UserId(2);

    let alice_insert =
        Request::do_request(alice, Vector::new(), Operation::insert(0, Buffer::from_text(alice, "A")));
    let bob_insert =
        Request::do_request(bob, Vector::new(), Operation::insert(0, Buffer::from_text(bob, "B")));

    state.execute(Some(alice_insert)).unwrap();
    state.execute(Some(bob_insert)).unwrap();

    // Lower user id wins the tie and keeps position 0; the other insert is
    // pushed past it.
    assert_eq!(state.buffer().to_text(), "AB");
}

#[test]
fn single_user_undo_then_redo_round_trips_the_document() {
    let mut state = State::new();
    let alice = UserId(1);

    let insert =
        Request::do_request(alice, Vector::new(), Operation::insert(0, Buffer::from_text(alice, "hello")));
    state.execute(Some(insert)).unwrap();
    assert_eq!(state.buffer().to_text(), "hello");

    // An undo/redo's own vector names the state it expects to land in, so
    // its author's own component is pre-incremented by one past the state
    // it's issued against.
    let undo = Request::undo_request(alice, state.vector().incr(alice, 1));
    state.execute(Some(undo)).unwrap();
    assert_eq!(state.buffer().to_text(), "");

    let redo = Request::redo_request(alice, state.vector().incr(alice, 1));
    state.execute(Some(redo)).unwrap();
    assert_eq!(state.buffer().to_text(), "hello");
}

#[test]
fn undo_across_a_concurrent_edit_falls_back_to_transform_based_translation() {
    // Mirrors the canonical undo-after-concurrent-edit walkthrough: alice
    // inserts "hello", bob concurrently appends "!", then alice undoes her
    // insert. The undo's late-mirror point lands on a vector bob's own log
    // entry hasn't reached yet, so this only resolves if undo/redo
    // translation falls through to the general transform loop instead of
    // erroring out.
    let mut state = State::new();
    let alice = UserId(1);
    let bob = UserId(2);

    let alice_insert =
        Request::do_request(alice, Vector::new(), Operation::insert(0, Buffer::from_text(alice, "hello")));
    state.execute(Some(alice_insert)).unwrap();

    let bob_insert =
        Request::do_request(bob, state.vector().clone(), Operation::insert(5, Buffer::from_text(bob, "!")));
    state.execute(Some(bob_insert)).unwrap();
    assert_eq!(state.buffer().to_text(), "hello!");

    let undo = Request::undo_request(alice, state.vector().incr(alice, 1));
    state.execute(Some(undo)).unwrap();
    assert_eq!(state.buffer().to_text(), "!");
    assert_eq!(state.log().len(), 3);

    // Redoing re-enters the same fallback path one level deeper (the undo
    // being redone is itself re-resolved via transform-chasing against
    // bob's edit). This still terminates and executes without error, which
    // is what this test exists to pin down; see DESIGN.md for the known gap
    // in exactly where the redone text ends up relative to bob's "!".
    let redo = Request::redo_request(alice, state.vector().incr(alice, 1));
    state.execute(Some(redo)).unwrap();
    assert_eq!(state.buffer().to_text(), "!hello");
}

#[test]
fn non_reversible_delete_is_made_reversible_on_execute_and_undo_restores_it() {
    let mut state = State::new();
    let alice = UserId(1);
    let bob = UserId(2);

    let insert =
        Request::do_request(alice, Vector::new(), Operation::insert(0, Buffer::from_text(alice, "abcdef")));
    state.execute(Some(insert)).unwrap();

    // `bob` only ever names a count, never the text: this is the "peer who
    // never saw the content" case the recon machinery exists for.
    let delete = Request::do_request(bob, state.vector().clone(), Operation::delete_count(2, 3));
    state.execute(Some(delete)).unwrap();
    assert_eq!(state.buffer().to_text(), "abf");

    let undo = Request::undo_request(bob, state.vector().incr(bob, 1));
    state.execute(Some(undo)).unwrap();
    assert_eq!(state.buffer().to_text(), "abcdef");
}

#[test]
fn delete_spanning_a_concurrent_insert_splits_and_stays_reversible() {
    let mut state = State::new();
    let alice = UserId(1);
    let bob = UserId(2);

    let initial =
        Request::do_request(alice, Vector::new(), Operation::insert(0, Buffer::from_text(alice, "abcdef")));
    state.execute(Some(initial)).unwrap();
    let base = state.vector().clone();

    // Both requests are issued against the same base vector: concurrent
    // from each author's point of view.
    let alice_insert = Request::do_request(alice, base.clone(), Operation::insert(3, Buffer::from_text(alice, "X")));
    state.execute(Some(alice_insert)).unwrap();
    assert_eq!(state.buffer().to_text(), "abcXdef");

    // Removes "bcde" from the original text; by the time it lands, alice's
    // "X" sits in the middle of that range and the delete must split
    // around it.
    let bob_delete = Request::do_request(bob, base, Operation::delete_count(1, 4));
    state.execute(Some(bob_delete)).unwrap();
    assert_eq!(state.buffer().to_text(), "aXf");

    let undo = Request::undo_request(bob, state.vector().incr(bob, 1));
    state.execute(Some(undo)).unwrap();
    assert_eq!(state.buffer().to_text(), "abcXdef");
}

#[test]
fn out_of_order_delivery_is_queued_until_causally_ready() {
    let mut state = State::new();
    let alice = UserId(1);
    let bob = UserId(2);

    let first =
        Request::do_request(alice, Vector::new(), Operation::insert(0, Buffer::from_text(alice, "ab")));
    let depends_on_first = Request::do_request(
        bob,
        Vector::new().incr(alice, 1),
        Operation::insert(2, Buffer::from_text(bob, "c")),
    );

    // Arrives before `first`: not yet causally ready, must wait.
    state.enqueue(depends_on_first);
    assert_eq!(state.execute(None).unwrap(), None);
    assert_eq!(state.buffer().to_text(), "");

    state.execute(Some(first)).unwrap();
    let executed = state.execute(None).unwrap().expect("now causally ready");
    assert_eq!(executed.user(), bob);
    assert_eq!(state.buffer().to_text(), "abc");
}
