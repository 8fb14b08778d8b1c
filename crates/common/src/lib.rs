//! Common types and utilities for the rill ledger node.
//!
//! This crate provides the shared foundation used across the rill
//! workspace. It is dependency-light and contains pure data types and
//! helpers with no I/O or side effects.
//!
//! # Overview
//!
//! - [`hash`] - The [`Hash256`] content digest used to identify ledgers
//!   and tree nodes
//! - [`error`] - Common error types and the [`Result`] type alias
//! - [`codec`] - Fixed-layout binary reader/writer for canonical
//!   serialization
//!
//! # Example
//!
//! ```rust
//! use rill_common::Hash256;
//!
//! let digest = Hash256::digest(b"hello world");
//! println!("digest: {}", digest.to_hex());
//! ```

pub mod codec;
pub mod error;
pub mod hash;

pub use codec::{ByteReader, ByteWriter};
pub use error::{Error, Result};
pub use hash::Hash256;
