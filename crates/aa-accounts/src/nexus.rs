//! Biconomy Nexus: computed address via RPC/client, ERC-7579 `execute`,
//! raw ECDSA over the operation hash.

use crate::account::{Account, EntryPointVersion};
use aa_core::erc7579::{ExecutionMode, encode_execute, structured_nonce_key};
use aa_core::error::{Error, Result};
use aa_core::owner::Owner;
use aa_core::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256};
use std::sync::Arc;

#[derive(Clone)]
pub struct NexusAccount {
    pub owner: Arc<dyn Owner + Send + Sync>,
    pub validator: Address,
    pub salt: u16,
    pub precomputed_address: Option<Address>,
    pub factory_init_code: Bytes,
}

impl std::fmt::Debug for NexusAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NexusAccount")
            .field("validator", &self.validator)
            .field("salt", &self.salt)
            .field("precomputed_address", &self.precomputed_address)
            .finish()
    }
}

impl NexusAccount {
    pub fn new(owner: Arc<dyn Owner + Send + Sync>, validator: Address, salt: u16) -> Self {
        Self { owner, validator, salt, precomputed_address: None, factory_init_code: Bytes::new() }
    }

    pub fn with_precomputed_address(mut self, address: Address) -> Self {
        self.precomputed_address = Some(address);
        self
    }

    /// Factory call data, when the account isn't deployed yet. Left as
    /// caller-supplied bytes rather than a hand-rolled, unverified selector.
    pub fn with_factory_init_code(mut self, init_code: Bytes) -> Self {
        self.factory_init_code = init_code;
        self
    }
}

impl Account for NexusAccount {
    fn precomputed_address(&self) -> Option<Address> {
        self.precomputed_address
    }

    fn local_address(&self) -> Option<Address> {
        None
    }

    fn family_name(&self) -> &'static str {
        "nexus"
    }

    fn entry_point_version(&self) -> EntryPointVersion {
        EntryPointVersion::V07
    }

    fn init_code(&self) -> Bytes {
        self.factory_init_code.clone()
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes> {
        if calls.is_empty() {
            return Err(Error::bad_input("NexusAccount requires at least one call"));
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

    fn nonce_key(&self) -> U256 {
        structured_nonce_key(self.validator, self.salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aa_core::owner::LocalOwner;
    use alloy_primitives::{address, bytes};

    fn fixture() -> NexusAccount {
        let owner = Arc::new(LocalOwner::from_bytes(&[0x11; 32]).unwrap());
        NexusAccount::new(owner, address!("0x3333333333333333333333333333333333333333"), 0)
    }

    #[test]
    fn nonce_key_encodes_validator() {
        let account = fixture();
        let key = account.nonce_key();
        assert_ne!(key, U256::ZERO);
    }

    #[test]
    fn encode_calls_uses_erc7579_execute() {
        let account = fixture();
        let call = Call { to: Address::ZERO, value: U256::ZERO, data: bytes!("0x") };
        let encoded = account.encode_calls(std::slice::from_ref(&call)).unwrap();
        assert_eq!(&encoded[..4], &aa_core::erc7579::EXECUTE_SELECTOR);
    }
}
