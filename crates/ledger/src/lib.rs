//! Ledger types for the rill node.
//!
//! A ledger is an immutable snapshot of global state: a header plus two
//! content-addressed trees (transactions and account state) whose root
//! digests the header declares. The ledger is identified by the digest
//! of its header, so the header bytes bind the entire snapshot.
//!
//! This crate provides the canonical header codec ([`LedgerHeader`]) and
//! the [`Ledger`] aggregate that pairs a parsed header with its two
//! (possibly still synchronizing) trees.

pub mod error;
pub mod header;
pub mod ledger;

pub use error::{LedgerError, Result};
pub use header::{LedgerHeader, HEADER_SIZE};
pub use ledger::Ledger;
