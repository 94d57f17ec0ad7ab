//! Owner signing capability: `{address, sign_raw_hash, sign_personal_message,
//! sign_typed_data}`. `sign_raw_hash` is the one primitive every other
//! signing mode is built from — personal-message and typed-data hashing
//! happen in `aa-core::hash`, not inside the signer.

use crate::error::{Error, Result};
use crate::hash::hash_personal_message;
use alloy_primitives::{Address, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

/// A 65-byte `r || s || v` ECDSA signature.
pub type RawSignature = [u8; 65];

/// Capability set every account family signs through. A raw-hash signature
/// carries no message prefix; callers (or `aa-core::hash`) are responsible
/// for producing whatever digest the family's on-chain verifier expects.
pub trait Owner {
    fn address(&self) -> Address;
    fn sign_raw_hash(&self, hash: [u8; 32]) -> Result<RawSignature>;

    /// EIP-191 personal-message signature: hashes `message` with
    /// [`hash_personal_message`] then signs the raw digest.
    fn sign_personal_message(&self, message: &[u8]) -> Result<RawSignature> {
        self.sign_raw_hash(hash_personal_message(message))
    }

    /// Signs an already-computed EIP-712 digest (see
    /// `aa-core::hash::hash_typed_data`) as a raw hash.
    fn sign_typed_data(&self, digest: [u8; 32]) -> Result<RawSignature> {
        self.sign_raw_hash(digest)
    }
}

/// An [`Owner`] backed by an in-process private key.
pub struct LocalOwner {
    signer: PrivateKeySigner,
}

impl LocalOwner {
    /// Constructs from a raw 32-byte private key.
    pub fn from_bytes(key: &[u8; 32]) -> Result<Self> {
        let signer = PrivateKeySigner::from_bytes(key.into())
            .map_err(|e| Error::bad_input(format!("invalid private key: {e}")))?;
        Ok(Self { signer })
    }

    pub fn inner(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl Owner for LocalOwner {
    fn address(&self) -> Address {
        alloy_signer::Signer::address(&self.signer)
    }

    fn sign_raw_hash(&self, hash: [u8; 32]) -> Result<RawSignature> {
        let signature = self
            .signer
            .sign_hash_sync(&B256::from(hash))
            .map_err(|e| Error::bad_input(format!("signing failed: {e}")))?;
        Ok(signature.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    fn fixture_owner() -> LocalOwner {
        LocalOwner::from_bytes(&[0x42; 32]).unwrap()
    }

    #[test]
    fn sign_raw_hash_produces_65_byte_signature() {
        let owner = fixture_owner();
        let hash = b256!("0x0000000000000000000000000000000000000000000000000000000000000001");
        let sig = owner.sign_raw_hash(*hash).unwrap();
        assert_eq!(sig.len(), 65);
    }

    #[test]
    fn sign_personal_message_is_deterministic() {
        let owner = fixture_owner();
        let sig1 = owner.sign_personal_message(b"hello").unwrap();
        let sig2 = owner.sign_personal_message(b"hello").unwrap();
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn different_owners_have_different_addresses() {
        let a = LocalOwner::from_bytes(&[0x11; 32]).unwrap();
        let b = LocalOwner::from_bytes(&[0x22; 32]).unwrap();
        assert_ne!(a.address(), b.address());
    }
}
