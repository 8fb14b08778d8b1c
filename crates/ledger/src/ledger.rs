//! The ledger aggregate.

use crate::error::Result;
use crate::header::LedgerHeader;
use rill_common::Hash256;
use rill_shamap::ShaMap;

/// A ledger: a parsed header plus its two content-addressed trees.
///
/// A ledger built from a network header blob starts with both trees
/// empty and synchronizing; the acquisition machinery fills them in
/// against the root digests the header declares. While that is in
/// progress the ledger is marked *acquiring* so other subsystems do not
/// treat it as canonical.
pub struct Ledger {
    header: LedgerHeader,
    hash: Hash256,
    tx_map: ShaMap,
    state_map: ShaMap,
    acquiring: bool,
}

impl Ledger {
    /// Build a ledger from a parsed header.
    pub fn new(header: LedgerHeader) -> Self {
        let hash = header.hash();
        Self {
            header,
            hash,
            tx_map: ShaMap::new(),
            state_map: ShaMap::new(),
            acquiring: false,
        }
    }

    /// Parse a canonical header blob into a ledger with empty trees.
    pub fn from_header_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self::new(LedgerHeader::from_bytes(data)?))
    }

    /// The parsed header.
    pub fn header(&self) -> &LedgerHeader {
        &self.header
    }

    /// The ledger's identity (digest of the header).
    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    /// Sequence number, from the header.
    pub fn seq(&self) -> u32 {
        self.header.seq
    }

    /// Declared root digest of the transaction tree.
    pub fn tx_root(&self) -> Hash256 {
        self.header.tx_root
    }

    /// Declared root digest of the account-state tree.
    pub fn state_root(&self) -> Hash256 {
        self.header.state_root
    }

    /// The transaction tree.
    pub fn tx_map(&self) -> &ShaMap {
        &self.tx_map
    }

    /// The transaction tree, mutable.
    pub fn tx_map_mut(&mut self) -> &mut ShaMap {
        &mut self.tx_map
    }

    /// The account-state tree.
    pub fn state_map(&self) -> &ShaMap {
        &self.state_map
    }

    /// The account-state tree, mutable.
    pub fn state_map_mut(&mut self) -> &mut ShaMap {
        &mut self.state_map
    }

    /// Mark the ledger as still being reconstructed.
    pub fn set_acquiring(&mut self) {
        self.acquiring = true;
    }

    /// Whether the ledger is still being reconstructed.
    pub fn is_acquiring(&self) -> bool {
        self.acquiring
    }
}
