// NetworkId (spec.md §6 configuration, §4.3 checkNetworkId): every signed
// transaction commits to the network it was built for, so a tx crafted for
// one network is rejected outright by any other.

use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NetworkId {
    Mainnet,
    Testnet,
    Devnet,
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkId::Mainnet => "mainnet",
            NetworkId::Testnet => "testnet",
            NetworkId::Devnet => "devnet",
        };
        write!(f, "{}", name)
    }
}

impl Serializer for NetworkId {
    fn write(&self, writer: &mut Writer) {
        let tag = match self {
            NetworkId::Mainnet => 0u8,
            NetworkId::Testnet => 1u8,
            NetworkId::Devnet => 2u8,
        };
        writer.write_u8(tag);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => NetworkId::Mainnet,
            1 => NetworkId::Testnet,
            2 => NetworkId::Devnet,
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_id_roundtrip() {
        for network in [NetworkId::Mainnet, NetworkId::Testnet, NetworkId::Devnet] {
            let bytes = network.to_bytes();
            assert_eq!(NetworkId::from_bytes(&bytes).unwrap(), network);
        }
    }

    #[test]
    fn test_distinct_networks_differ() {
        assert_ne!(NetworkId::Mainnet, NetworkId::Testnet);
    }
}
