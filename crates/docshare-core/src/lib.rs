//! # DocShare Core
//!
//! Pure primitives for DocShare: text operations, operational transformation
//! and document digests.
//!
//! This crate contains no I/O, no editor surface, no networking. It is pure
//! computation over text.
//!
//! ## Key Types
//!
//! - [`Operation`] - A single text mutation (position, delete length, inserted text)
//! - [`PeerId`] - Identifier of a sharing participant
//! - [`DocumentDigest`] - Blake3 digest of a document, for convergence checks
//! - [`Priority`] - Tie-break policy for concurrent inserts at one offset
//!
//! ## Transformation
//!
//! ```rust
//! use docshare_core::{transform, Operation};
//!
//! // Both edits were made against "hello".
//! let local = Operation::insert(5, "X");
//! let remote = Operation::insert(0, "Y");
//!
//! // The local edit is already applied; the remote one precedes it.
//! let adjusted = transform(&remote, &local);
//! assert_eq!(adjusted, remote);
//!
//! let text = adjusted.apply(&local.apply("hello").unwrap()).unwrap();
//! assert_eq!(text, "YhelloX");
//! ```
//!
//! All positions and lengths count Unicode scalar values (`char`s), never bytes.

pub mod digest;
pub mod error;
pub mod operation;
pub mod transform;
pub mod types;

pub use digest::DocumentDigest;
pub use error::{OperationError, Result};
pub use operation::Operation;
pub use transform::{transform, transform_with, Priority};
pub use types::PeerId;
