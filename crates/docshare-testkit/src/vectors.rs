//! Scenario vectors for concurrent edits.
//!
//! Each vector is a base text plus one edit from each party, made at the
//! same time on that base. Both parties must end up with `expected`. The
//! vectors can be exported as JSON to check other implementations of the
//! protocol against the same cases.

use serde::Serialize;

use docshare_core::Operation;
use docshare_sync::{ColaStrategy, Role, SyncStrategy};

/// One replace edit, as plain data.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Edit {
    pub position: usize,
    pub delete_len: usize,
    pub text: &'static str,
}

impl Edit {
    pub fn to_operation(self) -> Operation {
        Operation::new(self.position, self.delete_len, self.text)
    }
}

/// A named concurrent-edit scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Text both parties start from.
    pub base: &'static str,
    /// The initiator's edit.
    pub initiator: Edit,
    /// The receiver's edit.
    pub receiver: Edit,
    /// Text both parties must converge on.
    pub expected: &'static str,
}

const fn edit(position: usize, delete_len: usize, text: &'static str) -> Edit {
    Edit {
        position,
        delete_len,
        text,
    }
}

/// Get all scenario vectors.
pub fn all_vectors() -> Vec<ScenarioVector> {
    vec![
        ScenarioVector {
            name: "inserts at both ends",
            base: "hello",
            initiator: edit(5, 0, "X"),
            receiver: edit(0, 0, "Y"),
            expected: "YhelloX",
        },
        ScenarioVector {
            name: "inserts at the same offset",
            base: "ab",
            initiator: edit(1, 0, "I"),
            receiver: edit(1, 0, "R"),
            expected: "aIRb",
        },
        ScenarioVector {
            name: "overlapping deletes",
            base: "abcdef",
            initiator: edit(1, 3, ""),
            receiver: edit(2, 3, ""),
            expected: "af",
        },
        ScenarioVector {
            name: "insert inside a replaced range",
            base: "abcdef",
            initiator: edit(1, 4, "Z"),
            receiver: edit(3, 0, "r"),
            expected: "aZf",
        },
        ScenarioVector {
            name: "disjoint replacements",
            base: "one two",
            initiator: edit(0, 3, "1"),
            receiver: edit(4, 3, "2"),
            expected: "1 2",
        },
        ScenarioVector {
            name: "multi-byte chars",
            base: "héllo",
            initiator: edit(5, 0, "☃"),
            receiver: edit(0, 1, ""),
            expected: "éllo☃",
        },
    ]
}

/// Play a vector through a pair of strategies.
///
/// Returns the initiator's and the receiver's final text.
pub fn run_vector(vector: &ScenarioVector) -> (String, String) {
    let mut initiator = ColaStrategy::new(Role::Initiator);
    let mut receiver = ColaStrategy::new(Role::Receiver);

    let from_initiator = initiator.register_outgoing(vector.initiator.to_operation());
    let from_receiver = receiver.register_outgoing(vector.receiver.to_operation());

    let mut initiator_text = vector.base.to_string();
    let mut receiver_text = vector.base.to_string();
    from_initiator
        .operation
        .apply_in_place(&mut initiator_text)
        .expect("initiator edit fits base");
    from_receiver
        .operation
        .apply_in_place(&mut receiver_text)
        .expect("receiver edit fits base");

    initiator
        .check_incoming(&from_receiver, initiator_text.chars().count())
        .expect("receiver edit fits initiator's view of the base");
    receiver
        .check_incoming(&from_initiator, receiver_text.chars().count())
        .expect("initiator edit fits receiver's view of the base");

    initiator
        .transform_incoming(from_receiver)
        .apply_in_place(&mut initiator_text)
        .expect("transformed receiver edit fits");
    receiver
        .transform_incoming(from_initiator)
        .apply_in_place(&mut receiver_text)
        .expect("transformed initiator edit fits");

    (initiator_text, receiver_text)
}

/// All vectors as pretty-printed JSON.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}
