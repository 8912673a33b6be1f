//! # DocShare Testkit
//!
//! Testing utilities for DocShare.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Scenario vectors**: Named concurrent-edit cases with the text both
//!   parties must end up with
//! - **Generators**: Proptest strategies for documents and operations
//! - **Fixtures**: A ready-made two-party session over an in-memory network
//!
//! ## Scenario Vectors
//!
//! ```rust
//! use docshare_testkit::vectors::{all_vectors, run_vector};
//!
//! for vector in all_vectors() {
//!     let (initiator, receiver) = run_vector(&vector);
//!     assert_eq!(initiator, vector.expected);
//!     assert_eq!(receiver, vector.expected);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use docshare_testkit::generators::concurrent_edits;
//!
//! proptest! {
//!     #[test]
//!     fn edits_fit((doc, a, b) in concurrent_edits()) {
//!         prop_assert!(a.apply(&doc).is_ok());
//!         prop_assert!(b.apply(&doc).is_ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use docshare::document::Document;
//! use docshare_testkit::fixtures::TwoPartyFixture;
//!
//! let fixture = TwoPartyFixture::sharing("hello");
//! fixture.alice_doc.replace(5, 0, "!").unwrap();
//! fixture.pump();
//! assert_eq!(fixture.bob_doc.text(), "hello!");
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{peer, TwoPartyFixture};
