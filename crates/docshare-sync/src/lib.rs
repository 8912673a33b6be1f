//! # DocShare Sync
//!
//! Edit protocol for keeping two copies of a text document identical while
//! both are being edited.
//!
//! ## Overview
//!
//! Each party applies its own edits immediately and sends them to the other.
//! Edits that cross on the wire are reconciled with operational
//! transformation: a [`SyncStrategy`] remembers which local edits the peer
//! has not yet seen and rewrites incoming edits against them. Every update
//! carries two counters, edits sent and edits seen, so the receiving side
//! knows which of its own edits the sender had already applied.
//!
//! ## Key Properties
//!
//! - **Optimistic**: local edits never wait for the network
//! - **Convergent**: both sides end with the same text once queues drain
//! - **Pluggable**: the transformation algorithm is a trait object
//! - **Opaque transport**: the [`Channel`] only ever sees bytes
//!
//! ## Usage
//!
//! ```rust
//! use docshare_core::Operation;
//! use docshare_sync::{codec, MessageLimits, Role, ShareMessage, StrategyKind, UpdateMessage};
//!
//! let mut strategy = StrategyKind::Cola.build(Role::Initiator);
//! let limits = MessageLimits::default();
//!
//! // A local edit goes out...
//! let outgoing = strategy.register_outgoing(Operation::insert(5, "X"));
//! let bytes = codec::encode(&ShareMessage::Update(outgoing), &limits).unwrap();
//!
//! // ...while a concurrent remote edit comes in: the peer's first edit,
//! // made before it had seen any of ours.
//! let incoming = UpdateMessage::new(Operation::insert(0, "Y"), 1, 0);
//! strategy.check_incoming(&incoming, "helloX".len()).unwrap();
//! let adjusted = strategy.transform_incoming(incoming);
//! assert_eq!(adjusted, Operation::insert(0, "Y"));
//! # let _ = bytes;
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Initiator                           Receiver
//!   |-------- Start (full text) ------->|   receiver asks its user
//!   |-------- Update ------------------>|   buffered until accepted
//!   |<------- Update -------------------|
//!   |-------- Update ------------------>|
//!   |<------- Stop ---------------------|   either side may stop
//! ```

pub mod codec;
pub mod convergence;
pub mod error;
pub mod messages;
pub mod strategy;
pub mod transport;

pub use convergence::{verify_convergence, ConvergenceResult};
pub use error::{Result, SyncError};
pub use messages::{
    Envelope, MessageLimits, ShareMessage, StartMessage, UpdateMessage, PROTOCOL_VERSION,
};
pub use strategy::{ColaStrategy, IdentityStrategy, Role, StrategyKind, SyncStrategy};
pub use transport::{
    memory::MemoryChannel, memory::MemoryNetwork, Channel, ChannelEvent,
};
