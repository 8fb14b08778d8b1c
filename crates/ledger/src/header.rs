//! Ledger header and its canonical codec.
//!
//! The header is a fixed-layout structure; its digest is the ledger's
//! identity, so the byte layout is part of the protocol. Hashing is
//! namespaced with a four-byte prefix so header bytes can never collide
//! with tree-node bytes that happen to share a layout.

use crate::error::Result;
use rill_common::{ByteReader, ByteWriter, Hash256};

/// Size of the canonical header encoding.
pub const HEADER_SIZE: usize = 118;

/// Namespace prefix mixed into the header digest.
const LEDGER_HASH_PREFIX: [u8; 4] = *b"LGR\0";

/// Parsed ledger header.
///
/// `tx_root` and `state_root` are the declared root digests of the
/// transaction tree and the account-state tree; a zero digest declares
/// the tree empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerHeader {
    /// Sequence number of this ledger in the chain.
    pub seq: u32,
    /// Total unit supply after this ledger closed.
    pub total_coins: u64,
    /// Digest of the previous ledger's header.
    pub parent_hash: Hash256,
    /// Root digest of the transaction tree.
    pub tx_root: Hash256,
    /// Root digest of the account-state tree.
    pub state_root: Hash256,
    /// Close time, seconds since the network epoch.
    pub close_time: u64,
    /// Close-time resolution in seconds.
    pub close_resolution: u8,
    /// Close flags.
    pub close_flags: u8,
}

impl LedgerHeader {
    /// Serialize to the canonical byte form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(HEADER_SIZE);
        writer.put_u32(self.seq);
        writer.put_u64(self.total_coins);
        writer.put_hash(&self.parent_hash);
        writer.put_hash(&self.tx_root);
        writer.put_hash(&self.state_root);
        writer.put_u64(self.close_time);
        writer.put_u8(self.close_resolution);
        writer.put_u8(self.close_flags);
        writer.into_bytes()
    }

    /// Parse the canonical byte form. The input must be exactly
    /// [`HEADER_SIZE`] bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let header = Self {
            seq: reader.read_u32()?,
            total_coins: reader.read_u64()?,
            parent_hash: reader.read_hash()?,
            tx_root: reader.read_hash()?,
            state_root: reader.read_hash()?,
            close_time: reader.read_u64()?,
            close_resolution: reader.read_u8()?,
            close_flags: reader.read_u8()?,
        };
        reader.finish()?;
        Ok(header)
    }

    /// The ledger's identity: the namespaced digest of the canonical
    /// header bytes.
    pub fn hash(&self) -> Hash256 {
        Hash256::digest_all(&[&LEDGER_HASH_PREFIX, &self.to_bytes()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> LedgerHeader {
        LedgerHeader {
            seq: 7,
            total_coins: 100_000_000_000,
            parent_hash: Hash256::digest(b"parent"),
            tx_root: Hash256::digest(b"tx"),
            state_root: Hash256::digest(b"state"),
            close_time: 1_234_567,
            close_resolution: 10,
            close_flags: 0,
        }
    }

    #[test]
    fn test_round_trip() {
        let header = sample_header();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(LedgerHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_rejects_truncated() {
        let bytes = sample_header().to_bytes();
        assert!(LedgerHeader::from_bytes(&bytes[..HEADER_SIZE - 1]).is_err());
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = sample_header().to_bytes();
        bytes.push(0);
        assert!(LedgerHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_hash_is_stable() {
        let header = sample_header();
        assert_eq!(header.hash(), header.hash());
    }

    #[test]
    fn test_hash_covers_every_field() {
        let header = sample_header();
        let mut changed = header.clone();
        changed.seq += 1;
        assert_ne!(header.hash(), changed.hash());

        let mut changed = header.clone();
        changed.tx_root = Hash256::ZERO;
        assert_ne!(header.hash(), changed.hash());
    }

    #[test]
    fn test_hash_is_namespaced() {
        // The digest is not the bare digest of the header bytes.
        let header = sample_header();
        assert_ne!(header.hash(), Hash256::digest(&header.to_bytes()));
    }
}
