// Wire messages (spec.md §6): peer-to-peer, length-prefixed, deserialized
// until not-enough-bytes. The actual TCP framing (length prefix, connection
// lifecycle) is a networking-transport concern the core explicitly leaves
// external (spec.md §1 Non-goal); this module only defines the message
// payloads and their canonical encoding, tagged by a one-byte discriminant
// the same way every other enum in this codebase's wire format is tagged
// (see `blockflow_common::transaction::LockupScript`).

use blockflow_common::block::{Block, BlockHeader};
use blockflow_common::crypto::Hash;
use blockflow_common::serializer::{Reader, ReaderError, Serializer, Writer};

/// Opaque per-node identifier exchanged during the handshake. The core does
/// not prescribe its contents beyond "identifies one node"; this daemon
/// uses a random 32-byte value minted once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeId(pub Hash);

impl Serializer for NodeId {
    fn write(&self, writer: &mut Writer) {
        self.0.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(NodeId(Hash::read(reader)?))
    }

    fn size(&self) -> usize {
        self.0.size()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Handshake: each side sends exactly one. An invalid reply closes the
    /// connection (spec.md §6).
    Hello(NodeId),
    HelloAck(NodeId),
    /// Periodic liveness check. An unmatched `Pong` nonce, or a missing
    /// `Pong` within the configured ping frequency, closes the connection.
    Ping { nonce: i32, timestamp_ms: i64 },
    Pong { nonce: i32 },
    SendBlocks(Vec<Block>),
    GetBlocks { locators: Vec<Hash> },
    SendHeaders(Vec<BlockHeader>),
    GetHeaders { locators: Vec<Hash> },
}

impl Message {
    fn tag(&self) -> u8 {
        match self {
            Message::Hello(_) => 0,
            Message::HelloAck(_) => 1,
            Message::Ping { .. } => 2,
            Message::Pong { .. } => 3,
            Message::SendBlocks(_) => 4,
            Message::GetBlocks { .. } => 5,
            Message::SendHeaders(_) => 6,
            Message::GetHeaders { .. } => 7,
        }
    }
}

impl Serializer for Message {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.tag());
        match self {
            Message::Hello(id) | Message::HelloAck(id) => id.write(writer),
            Message::Ping { nonce, timestamp_ms } => {
                writer.write_i32(nonce);
                writer.write_i64(timestamp_ms);
            }
            Message::Pong { nonce } => writer.write_i32(nonce),
            Message::SendBlocks(blocks) => blocks.write(writer),
            Message::GetBlocks { locators } => locators.write(writer),
            Message::SendHeaders(headers) => headers.write(writer),
            Message::GetHeaders { locators } => locators.write(writer),
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => Message::Hello(NodeId::read(reader)?),
            1 => Message::HelloAck(NodeId::read(reader)?),
            2 => Message::Ping { nonce: reader.read_i32()?, timestamp_ms: reader.read_i64()? },
            3 => Message::Pong { nonce: reader.read_i32()? },
            4 => Message::SendBlocks(Vec::<Block>::read(reader)?),
            5 => Message::GetBlocks { locators: Vec::<Hash>::read(reader)? },
            6 => Message::SendHeaders(Vec::<BlockHeader>::read(reader)?),
            7 => Message::GetHeaders { locators: Vec::<Hash>::read(reader)? },
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        1 + match self {
            Message::Hello(id) | Message::HelloAck(id) => id.size(),
            Message::Ping { .. } => 4 + 8,
            Message::Pong { .. } => 4,
            Message::SendBlocks(blocks) => blocks.size(),
            Message::GetBlocks { locators } => locators.size(),
            Message::SendHeaders(headers) => headers.size(),
            Message::GetHeaders { locators } => locators.size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockflow_common::crypto::hash;
    use blockflow_common::difficulty::max_target;

    #[test]
    fn test_ping_pong_roundtrip() {
        let msg = Message::Ping { nonce: 42, timestamp_ms: 1_700_000_000_000 };
        let bytes = msg.to_bytes();
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);

        let pong = Message::Pong { nonce: 42 };
        assert_eq!(Message::from_bytes(&pong.to_bytes()).unwrap(), pong);
    }

    #[test]
    fn test_hello_roundtrip() {
        let msg = Message::Hello(NodeId(hash(b"node-a")));
        let bytes = msg.to_bytes();
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_get_headers_roundtrip() {
        let msg = Message::GetHeaders { locators: vec![hash(b"a"), hash(b"b")] };
        let bytes = msg.to_bytes();
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_send_headers_roundtrip() {
        let header = BlockHeader::genesis(hash(b"txs"), 0, max_target());
        let msg = Message::SendHeaders(vec![header]);
        let bytes = msg.to_bytes();
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_truncated_bytes_fail_not_panic() {
        let msg = Message::Ping { nonce: 1, timestamp_ms: 2 };
        let mut bytes = msg.to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(Message::from_bytes(&bytes).is_err());
    }
}
