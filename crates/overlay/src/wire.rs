//! Ledger acquisition wire messages.
//!
//! Message bodies are protobuf-encoded; the structs below are the
//! hand-maintained schema. A framed message on the wire is one
//! [`MessageType`] byte followed by the protobuf body. [`PackedMessage`]
//! holds a body encoded once so the same frame can be handed to any
//! number of peers without re-encoding.

use crate::error::OverlayError;
use crate::Result;
use bytes::Bytes;
use prost::Message;
use rill_common::Hash256;

/// Which component of a ledger a message refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LedgerInfoType {
    /// The ledger header.
    Base = 0,
    /// Nodes of the transaction tree.
    TxNode = 1,
    /// Nodes of the account-state tree.
    AsNode = 2,
}

/// Request for ledger components, sent to a peer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLedger {
    /// Digest identifying the target ledger.
    #[prost(bytes = "vec", tag = "1")]
    pub ledger_hash: Vec<u8>,
    /// Which component is wanted.
    #[prost(enumeration = "LedgerInfoType", tag = "2")]
    pub itype: i32,
    /// The ledger's sequence number; present for tree-node requests.
    #[prost(uint32, optional, tag = "3")]
    pub ledger_seq: ::core::option::Option<u32>,
    /// Serialized ids of the wanted tree nodes; the root is the id with
    /// the empty path.
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub node_ids: Vec<Vec<u8>>,
}

/// One node carried in a [`LedgerData`] reply.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LedgerNode {
    /// Serialized node bytes (the header blob for `Base` replies).
    #[prost(bytes = "vec", optional, tag = "1")]
    pub node_data: ::core::option::Option<Vec<u8>>,
    /// Serialized node id; unused for `Base` replies.
    #[prost(bytes = "vec", optional, tag = "2")]
    pub node_id: ::core::option::Option<Vec<u8>>,
}

/// Ledger components, received from a peer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LedgerData {
    /// Digest identifying the ledger the data belongs to.
    #[prost(bytes = "vec", tag = "1")]
    pub ledger_hash: Vec<u8>,
    /// Which component the nodes belong to.
    #[prost(enumeration = "LedgerInfoType", tag = "2")]
    pub itype: i32,
    /// The carried nodes; exactly one (the header) for `Base`.
    #[prost(message, repeated, tag = "3")]
    pub nodes: Vec<LedgerNode>,
}

impl GetLedger {
    /// Request the header of `hash`.
    pub fn base(hash: Hash256) -> Self {
        Self {
            ledger_hash: hash.as_bytes().to_vec(),
            itype: LedgerInfoType::Base as i32,
            ledger_seq: None,
            node_ids: Vec::new(),
        }
    }

    /// Request tree nodes of `hash`.
    pub fn tree_nodes(
        hash: Hash256,
        seq: u32,
        itype: LedgerInfoType,
        node_ids: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            ledger_hash: hash.as_bytes().to_vec(),
            itype: itype as i32,
            ledger_seq: Some(seq),
            node_ids,
        }
    }
}

/// Discriminator for framed overlay messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// A [`GetLedger`] request.
    GetLedger = 1,
    /// A [`LedgerData`] reply.
    LedgerData = 2,
}

impl MessageType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::GetLedger),
            2 => Some(Self::LedgerData),
            _ => None,
        }
    }
}

/// A message encoded once, shareable across peers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedMessage {
    message_type: MessageType,
    payload: Bytes,
}

impl PackedMessage {
    /// Pack a [`GetLedger`] request.
    pub fn get_ledger(msg: &GetLedger) -> Self {
        Self {
            message_type: MessageType::GetLedger,
            payload: Bytes::from(msg.encode_to_vec()),
        }
    }

    /// Pack a [`LedgerData`] reply.
    pub fn ledger_data(msg: &LedgerData) -> Self {
        Self {
            message_type: MessageType::LedgerData,
            payload: Bytes::from(msg.encode_to_vec()),
        }
    }

    /// The frame discriminator.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Serialize the full frame (type byte plus body).
    pub fn to_frame(&self) -> Bytes {
        let mut frame = Vec::with_capacity(1 + self.payload.len());
        frame.push(self.message_type as u8);
        frame.extend_from_slice(&self.payload);
        Bytes::from(frame)
    }

    /// Parse a full frame.
    pub fn from_frame(frame: &[u8]) -> Result<Self> {
        let (&tag, payload) = frame
            .split_first()
            .ok_or_else(|| OverlayError::InvalidMessage("empty frame".to_string()))?;
        let message_type = MessageType::from_u8(tag)
            .ok_or_else(|| OverlayError::InvalidMessage(format!("unknown frame type {tag}")))?;
        Ok(Self {
            message_type,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Decode the body as a [`GetLedger`] request.
    pub fn decode_get_ledger(&self) -> Result<GetLedger> {
        if self.message_type != MessageType::GetLedger {
            return Err(OverlayError::InvalidMessage(format!(
                "expected GetLedger frame, got {:?}",
                self.message_type
            )));
        }
        Ok(GetLedger::decode(self.payload.clone())?)
    }

    /// Decode the body as a [`LedgerData`] reply.
    pub fn decode_ledger_data(&self) -> Result<LedgerData> {
        if self.message_type != MessageType::LedgerData {
            return Err(OverlayError::InvalidMessage(format!(
                "expected LedgerData frame, got {:?}",
                self.message_type
            )));
        }
        Ok(LedgerData::decode(self.payload.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_ledger_round_trip() {
        let hash = Hash256::digest(b"ledger");
        let msg = GetLedger::tree_nodes(
            hash,
            42,
            LedgerInfoType::TxNode,
            vec![vec![0u8; 33], vec![1u8; 33]],
        );
        let packed = PackedMessage::get_ledger(&msg);
        assert_eq!(packed.message_type(), MessageType::GetLedger);

        let decoded = packed.decode_get_ledger().unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.ledger_hash, hash.as_bytes());
        assert_eq!(decoded.ledger_seq, Some(42));
        assert_eq!(
            LedgerInfoType::try_from(decoded.itype).unwrap(),
            LedgerInfoType::TxNode
        );
    }

    #[test]
    fn test_base_request_has_no_seq() {
        let msg = GetLedger::base(Hash256::digest(b"ledger"));
        assert_eq!(msg.ledger_seq, None);
        assert!(msg.node_ids.is_empty());
        assert_eq!(
            LedgerInfoType::try_from(msg.itype).unwrap(),
            LedgerInfoType::Base
        );
    }

    #[test]
    fn test_frame_round_trip() {
        let msg = LedgerData {
            ledger_hash: vec![7u8; 32],
            itype: LedgerInfoType::AsNode as i32,
            nodes: vec![LedgerNode {
                node_data: Some(b"data".to_vec()),
                node_id: Some(vec![0u8; 33]),
            }],
        };
        let packed = PackedMessage::ledger_data(&msg);
        let frame = packed.to_frame();

        let unpacked = PackedMessage::from_frame(&frame).unwrap();
        assert_eq!(unpacked, packed);
        assert_eq!(unpacked.decode_ledger_data().unwrap(), msg);
    }

    #[test]
    fn test_decode_wrong_type_rejected() {
        let packed = PackedMessage::get_ledger(&GetLedger::base(Hash256::ZERO));
        assert!(packed.decode_ledger_data().is_err());
    }

    #[test]
    fn test_from_frame_rejects_garbage() {
        assert!(PackedMessage::from_frame(&[]).is_err());
        assert!(PackedMessage::from_frame(&[9, 1, 2]).is_err());
    }
}
