// Lockup and unlock script kinds (spec.md §3 data model, §4.3 checkGasAndWitnesses).

use crate::crypto::{Hash, PublicKey, Signature};
use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use crate::vm::Script;

/// How an output may be spent, stored inside the output itself.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LockupScript {
    /// Pay to public key hash: spendable by one signature from the key
    /// whose hash matches `pubKeyHash`.
    P2PKH(Hash),
    /// Pay to m-of-n public keys, unlocked in strictly increasing index
    /// order (spec.md §4.3 P2MPKH rule).
    P2MPKH { pub_keys: Vec<PublicKey>, m: u8 },
    /// Pay to script hash: spendable by revealing a stateless script whose
    /// hash matches `scriptHash`, plus arguments for it.
    P2SH(Hash),
}

impl LockupScript {
    pub fn p2pkh(pub_key: &PublicKey) -> Self {
        LockupScript::P2PKH(pub_key.hash())
    }

    pub fn p2sh(script: &Script) -> Self {
        LockupScript::P2SH(crate::crypto::hash(&script.to_bytes()))
    }

    /// The hash this lockup's group membership is derived from — the same
    /// low-bits-against-`G` mapping used for block hashes (spec.md §3:
    /// "the script hint for addresses"). P2MPKH has no single hash of its
    /// own, so it hashes its full public key list.
    pub fn group_hash(&self) -> Hash {
        match self {
            LockupScript::P2PKH(pub_key_hash) => *pub_key_hash,
            LockupScript::P2SH(script_hash) => *script_hash,
            LockupScript::P2MPKH { pub_keys, .. } => {
                let mut bytes = Vec::new();
                for pub_key in pub_keys {
                    bytes.extend_from_slice(pub_key.as_bytes());
                }
                crate::crypto::hash(&bytes)
            }
        }
    }
}

impl Serializer for LockupScript {
    fn write(&self, writer: &mut Writer) {
        match self {
            LockupScript::P2PKH(pub_key_hash) => {
                writer.write_u8(0);
                writer.write_hash(pub_key_hash);
            }
            LockupScript::P2MPKH { pub_keys, m } => {
                writer.write_u8(1);
                pub_keys.write(writer);
                writer.write_u8(*m);
            }
            LockupScript::P2SH(script_hash) => {
                writer.write_u8(2);
                writer.write_hash(script_hash);
            }
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => LockupScript::P2PKH(reader.read_hash()?),
            1 => {
                let pub_keys = Vec::<PublicKey>::read(reader)?;
                let m = reader.read_u8()?;
                LockupScript::P2MPKH { pub_keys, m }
            }
            2 => LockupScript::P2SH(reader.read_hash()?),
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        1 + match self {
            LockupScript::P2PKH(_) => 32,
            LockupScript::P2MPKH { pub_keys, .. } => pub_keys.size() + 1,
            LockupScript::P2SH(_) => 32,
        }
    }
}

/// Proof that the spender satisfies the matching `LockupScript`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnlockScript {
    P2PKH(PublicKey),
    /// `(pubKey, index into the lockup's pubKeys)` pairs, exactly `m` of
    /// them, `index` strictly increasing (spec.md §4.3).
    P2MPKH(Vec<(PublicKey, u8)>),
    P2SH { script: Script, args: Vec<Vec<u8>> },
}

impl Serializer for UnlockScript {
    fn write(&self, writer: &mut Writer) {
        match self {
            UnlockScript::P2PKH(pub_key) => {
                writer.write_u8(0);
                pub_key.write(writer);
            }
            UnlockScript::P2MPKH(entries) => {
                writer.write_u8(1);
                writer.write_u32(&(entries.len() as u32));
                for (pub_key, index) in entries {
                    pub_key.write(writer);
                    writer.write_u8(*index);
                }
            }
            UnlockScript::P2SH { script, args } => {
                writer.write_u8(2);
                script.write(writer);
                writer.write_u32(&(args.len() as u32));
                for arg in args {
                    writer.write_blob(arg);
                }
            }
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(match reader.read_u8()? {
            0 => UnlockScript::P2PKH(PublicKey::read(reader)?),
            1 => {
                let len = reader.read_u32()? as usize;
                let mut entries = Vec::with_capacity(len.min(1 << 16));
                for _ in 0..len {
                    entries.push((PublicKey::read(reader)?, reader.read_u8()?));
                }
                UnlockScript::P2MPKH(entries)
            }
            2 => {
                let script = Script::read(reader)?;
                let len = reader.read_u32()? as usize;
                let mut args = Vec::with_capacity(len.min(1 << 16));
                for _ in 0..len {
                    args.push(reader.read_blob()?);
                }
                UnlockScript::P2SH { script, args }
            }
            _ => return Err(ReaderError::InvalidValue),
        })
    }

    fn size(&self) -> usize {
        1 + match self {
            UnlockScript::P2PKH(pub_key) => pub_key.size(),
            UnlockScript::P2MPKH(entries) => {
                4 + entries.iter().map(|(pk, _)| pk.size() + 1).sum::<usize>()
            }
            UnlockScript::P2SH { script, args } => {
                script.size() + 4 + args.iter().map(|a| 4 + a.len()).sum::<usize>()
            }
        }
    }
}

/// A signature provided alongside a transaction, matched against unlock
/// conditions by position (spec.md §4.3 signature-compression rule).
pub type TxSignature = Signature;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_p2pkh_lockup_roundtrip() {
        let key_pair = KeyPair::generate();
        let lockup = LockupScript::p2pkh(&key_pair.public_key());
        let bytes = lockup.to_bytes();
        assert_eq!(bytes.len(), lockup.size());
        assert_eq!(LockupScript::from_bytes(&bytes).unwrap(), lockup);
    }

    #[test]
    fn test_p2mpkh_lockup_roundtrip() {
        let keys: Vec<PublicKey> = (0..3).map(|_| KeyPair::generate().public_key()).collect();
        let lockup = LockupScript::P2MPKH { pub_keys: keys, m: 2 };
        let bytes = lockup.to_bytes();
        assert_eq!(LockupScript::from_bytes(&bytes).unwrap(), lockup);
    }

    #[test]
    fn test_unlock_p2pkh_roundtrip() {
        let key_pair = KeyPair::generate();
        let unlock = UnlockScript::P2PKH(key_pair.public_key());
        let bytes = unlock.to_bytes();
        assert_eq!(bytes.len(), unlock.size());
        match UnlockScript::from_bytes(&bytes).unwrap() {
            UnlockScript::P2PKH(pk) => assert_eq!(pk, key_pair.public_key()),
            _ => panic!("wrong variant"),
        }
    }
}
