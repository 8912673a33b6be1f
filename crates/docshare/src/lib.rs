//! # DocShare
//!
//! Real-time sharing of one text document between two peers.
//!
//! ## Overview
//!
//! DocShare lets two participants edit the same text at the same time. Each
//! side applies its own edits immediately; edits that cross on the wire are
//! reconciled with operational transformation so both copies converge.
//!
//! - **Sessions**: strictly one-to-one, at most one per [`DocShare`]
//! - **Editors**: anything implementing [`Document`](document::Document)
//! - **Transport**: anything implementing [`Channel`](sync::Channel)
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use docshare::{DocShare, ShareConfig, SessionState};
//! use docshare::core::PeerId;
//! use docshare::document::{Document, MemoryDocument};
//! use docshare::sync::MemoryNetwork;
//!
//! let alice_id = PeerId::random();
//! let bob_id = PeerId::random();
//! let network = MemoryNetwork::new();
//! let alice = DocShare::new(network.create_channel(alice_id), ShareConfig::default());
//! let bob = DocShare::new(network.create_channel(bob_id), ShareConfig::default());
//!
//! let alice_doc = Arc::new(MemoryDocument::new("hello"));
//! alice
//!     .start_share(alice_id, Some("alice"), bob_id, "notes.txt", alice_doc.clone())
//!     .unwrap();
//!
//! // Bob's host delivers the request and accepts it.
//! bob.pump().unwrap();
//! let bob_doc = Arc::new(MemoryDocument::default());
//! bob.accept_share(bob_doc.clone()).unwrap();
//! assert_eq!(bob_doc.text(), "hello");
//!
//! // Bob edits; Alice receives the edit and is now fully sharing.
//! bob_doc.replace(5, 0, "!").unwrap();
//! alice.pump().unwrap();
//! assert_eq!(alice_doc.text(), "hello!");
//! assert_eq!(alice.state(), SessionState::Sharing);
//! ```
//!
//! ## Re-exports
//!
//! - `docshare::core` - Operations, transformation, peer ids
//! - `docshare::document` - The editing surface abstraction
//! - `docshare::sync` - Strategies, wire messages, channels

pub mod error;
pub mod share;

pub use docshare_core as core;
pub use docshare_document as document;
pub use docshare_sync as sync;

pub use error::{Result, ShareError};
pub use share::{DocShare, EndReason, SessionState, ShareConfig, ShareEvent, ShareOffer};

pub use docshare_core::{DocumentDigest, Operation, PeerId};
pub use docshare_sync::{Role, StrategyKind};
