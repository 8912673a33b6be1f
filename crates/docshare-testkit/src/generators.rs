//! Proptest generators for property-based testing.

use proptest::prelude::*;

use docshare_core::{Operation, PeerId};

/// Generate a random PeerId.
pub fn peer_id() -> impl Strategy<Value = PeerId> {
    any::<[u8; 32]>().prop_map(PeerId::from_bytes)
}

/// Generate short text over a small alphabet, including multi-byte chars.
pub fn text(max_chars: usize) -> impl Strategy<Value = String> {
    let ch = prop_oneof![Just('a'), Just('b'), Just('c'), Just('é'), Just('☃')];
    prop::collection::vec(ch, 0..=max_chars).prop_map(|chars| chars.into_iter().collect())
}

/// Generate a document body.
pub fn document_text() -> impl Strategy<Value = String> {
    text(12)
}

/// Generate an operation that fits a document of `len` chars.
pub fn operation_on(len: usize) -> impl Strategy<Value = Operation> {
    (0..=len)
        .prop_flat_map(move |position| (Just(position), 0..=len - position, text(3)))
        .prop_map(|(position, delete_len, inserted)| Operation::new(position, delete_len, inserted))
}

/// Generate a document and two edits made on it concurrently.
pub fn concurrent_edits() -> impl Strategy<Value = (String, Operation, Operation)> {
    document_text().prop_flat_map(|doc| {
        let len = doc.chars().count();
        (Just(doc), operation_on(len), operation_on(len))
    })
}

/// Generate a document and a chain of edits, each valid after the previous.
pub fn edit_sequence(max_edits: usize) -> impl Strategy<Value = (String, Vec<Operation>)> {
    let pick = (
        any::<prop::sample::Index>(),
        any::<prop::sample::Index>(),
        text(3),
    );
    (document_text(), prop::collection::vec(pick, 0..=max_edits)).prop_map(|(doc, picks)| {
        let mut len = doc.chars().count();
        let ops: Vec<Operation> = picks
            .into_iter()
            .map(|(at, span, inserted)| {
                let position = at.index(len + 1);
                let delete_len = span.index(len - position + 1);
                let op = Operation::new(position, delete_len, inserted);
                len = len - delete_len + op.inserted_len();
                op
            })
            .collect();
        (doc, ops)
    })
}
