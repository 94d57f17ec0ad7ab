//! Etherspot modular account: modular-account CREATE2, ERC-7579 `execute`,
//! raw ECDSA over the operation hash, default nonce key.

use crate::account::{Account, EntryPointVersion, local_create2_address};
use aa_core::erc7579::{ExecutionMode, encode_execute};
use aa_core::error::{Error, Result};
use aa_core::owner::Owner;
use aa_core::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256, keccak256};
use std::sync::Arc;

#[derive(Clone)]
pub struct EtherspotAccount {
    pub owner: Arc<dyn Owner + Send + Sync>,
    pub factory: Address,
    pub salt: U256,
    pub runtime_init_code: Option<Bytes>,
    pub precomputed_address: Option<Address>,
}

impl std::fmt::Debug for EtherspotAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtherspotAccount")
            .field("factory", &self.factory)
            .field("salt", &self.salt)
            .field("precomputed_address", &self.precomputed_address)
            .finish()
    }
}

impl EtherspotAccount {
    pub fn new(owner: Arc<dyn Owner + Send + Sync>, factory: Address, salt: U256) -> Self {
        Self { owner, factory, salt, runtime_init_code: None, precomputed_address: None }
    }

    pub fn with_precomputed_address(mut self, address: Address) -> Self {
        self.precomputed_address = Some(address);
        self
    }

    /// Enables local `CREATE2` computation once the caller supplies the
    /// deployed runtime init code to hash.
    pub fn with_runtime_init_code(mut self, init_code: Bytes) -> Self {
        self.runtime_init_code = Some(init_code);
        self
    }
}

impl Account for EtherspotAccount {
    fn precomputed_address(&self) -> Option<Address> {
        self.precomputed_address
    }

    fn local_address(&self) -> Option<Address> {
        let init_code = self.runtime_init_code.as_ref()?;
        let init_hash = keccak256(init_code).0;
        let salt_bytes = self.salt.to_be_bytes::<32>();
        Some(local_create2_address(self.factory, salt_bytes, init_hash))
    }

    fn family_name(&self) -> &'static str {
        "etherspot"
    }

    fn entry_point_version(&self) -> EntryPointVersion {
        EntryPointVersion::V07
    }

    fn init_code(&self) -> Bytes {
        self.runtime_init_code.clone().unwrap_or_default()
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes> {
        if calls.is_empty() {
            return Err(Error::bad_input("EtherspotAccount requires at least one call"));
        }
        let mode = ExecutionMode::batch(true);
        Ok(Bytes::from(encode_execute(&mode, calls)?))
    }

    fn stub_signature(&self) -> Bytes {
        Bytes::from(vec![0u8; 65])
    }

    fn sign_user_op(&self, hash: [u8; 32]) -> Result<Bytes> {
        Ok(Bytes::from(self.owner.sign_raw_hash(hash)?.to_vec()))
    }

    fn sign_message(&self, message: &[u8]) -> Result<Bytes> {
        let sig = self.owner.sign_personal_message(message)?;
        Ok(Bytes::from(sig.to_vec()))
    }

    fn sign_typed_data(&self, digest: [u8; 32]) -> Result<Bytes> {
        let sig = self.owner.sign_typed_data(digest)?;
        Ok(Bytes::from(sig.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aa_core::owner::LocalOwner;

    #[test]
    fn local_address_requires_runtime_init_code() {
        let owner = Arc::new(LocalOwner::from_bytes(&[0x22; 32]).unwrap());
        let account = EtherspotAccount::new(owner, Address::ZERO, U256::ZERO);
        assert!(account.local_address().is_none());
    }
}
