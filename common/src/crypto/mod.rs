mod ed25519;
mod hash;

pub mod error;

pub use ed25519::{
    Ed25519Error, KeyPair, PrivateKey, PublicKey, Signature, PUBLIC_KEY_SIZE, SIGNATURE_SIZE,
};
pub use error::CryptoError;
pub use hash::{hash, Hash, Hashable, HASH_SIZE};
