//! # DocShare Document
//!
//! Abstraction over the text editing surface a session shares. Provides a
//! trait-based interface with an in-memory implementation.
//!
//! ## Overview
//!
//! The sync engine never owns the text. It reads it, replaces ranges of it,
//! and listens for edits through the [`Document`] trait, so any editor can be
//! plugged in. [`MemoryDocument`] is the reference surface used by tests and
//! headless embeddings.
//!
//! ## Key Types
//!
//! - [`Document`] - The trait every editing surface implements
//! - [`MemoryDocument`] - In-memory text with synchronous listeners
//! - [`EditSubscription`] - RAII handle that detaches its listener on drop
//! - [`EditListener`] - Callback invoked with each edit as an [`Operation`]
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use docshare_document::{subscribe, Document, MemoryDocument};
//!
//! let doc: Arc<dyn Document> = Arc::new(MemoryDocument::new("hello"));
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! let subscription = subscribe(&doc, Arc::new(move |op| sink.lock().unwrap().push(op.clone())));
//!
//! doc.replace(5, 0, " world").unwrap();
//! drop(subscription);
//! doc.replace(0, 1, "H").unwrap();
//!
//! assert_eq!(doc.text(), "Hello world");
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```
//!
//! ## Design Notes
//!
//! - **No origin tagging**: listeners see programmatic and user edits alike.
//!   Callers that must ignore their own writes detach the listener around them.
//! - **Listeners run outside the text lock**: a listener may read the document.
//!
//! [`Operation`]: docshare_core::Operation

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{DocumentError, Result};
pub use memory::MemoryDocument;
pub use traits::{subscribe, Document, EditListener, EditSubscription, ListenerId};
