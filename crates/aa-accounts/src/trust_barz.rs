//! Trust Wallet (Barz diamond) account: diamond-proxy CREATE2, diamond-facet
//! `execute`, raw ECDSA, EntryPoint v0.6 only. There's no batch-execute
//! facet, so only single calls are supported.

use crate::account::{Account, EntryPointVersion, local_create2_address};
use aa_core::abi::{AbiPart, encode_address, encode_bytes, encode_uint256, encode_with_dynamics, function_selector};
use aa_core::error::{Error, Result};
use aa_core::owner::Owner;
use aa_core::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256, keccak256};
use std::sync::Arc;

fn execute_selector() -> [u8; 4] {
    function_selector("execute(address,uint256,bytes)")
}

#[derive(Clone)]
pub struct TrustBarzAccount {
    pub owner: Arc<dyn Owner + Send + Sync>,
    pub factory: Address,
    pub salt: U256,
    pub runtime_init_code: Option<Bytes>,
    pub precomputed_address: Option<Address>,
}

impl std::fmt::Debug for TrustBarzAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustBarzAccount")
            .field("factory", &self.factory)
            .field("salt", &self.salt)
            .field("precomputed_address", &self.precomputed_address)
            .finish()
    }
}

impl TrustBarzAccount {
    pub fn new(owner: Arc<dyn Owner + Send + Sync>, factory: Address, salt: U256) -> Self {
        Self { owner, factory, salt, runtime_init_code: None, precomputed_address: None }
    }

    pub fn with_precomputed_address(mut self, address: Address) -> Self {
        self.precomputed_address = Some(address);
        self
    }

    pub fn with_runtime_init_code(mut self, init_code: Bytes) -> Self {
        self.runtime_init_code = Some(init_code);
        self
    }
}

impl Account for TrustBarzAccount {
    fn precomputed_address(&self) -> Option<Address> {
        self.precomputed_address
    }

    fn local_address(&self) -> Option<Address> {
        let init_code = self.runtime_init_code.as_ref()?;
        let init_hash = keccak256(init_code).0;
        Some(local_create2_address(self.factory, self.salt.to_be_bytes::<32>(), init_hash))
    }

    fn family_name(&self) -> &'static str {
        "trust_barz"
    }

    fn entry_point_version(&self) -> EntryPointVersion {
        EntryPointVersion::V06
    }

    fn init_code(&self) -> Bytes {
        self.runtime_init_code.clone().unwrap_or_default()
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes> {
        if calls.len() != 1 {
            return Err(Error::bad_input(
                "TrustBarzAccount's diamond-facet execute only supports a single call",
            ));
        }
        let call = &calls[0];
        let mut out = Vec::new();
        out.extend_from_slice(&execute_selector());
        out.extend_from_slice(&encode_with_dynamics(&[
            AbiPart::static_word(encode_address(call.to)),
            AbiPart::static_word(encode_uint256(call.value)),
            AbiPart::dynamic(encode_bytes(&call.data)),
        ])?);
        Ok(Bytes::from(out))
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
    use alloy_primitives::bytes;

    #[test]
    fn batch_calls_rejected() {
        let owner = Arc::new(LocalOwner::from_bytes(&[0x44; 32]).unwrap());
        let account = TrustBarzAccount::new(owner, Address::ZERO, U256::ZERO);
        let calls = vec![
            Call { to: Address::ZERO, value: U256::ZERO, data: bytes!("0x") },
            Call { to: Address::ZERO, value: U256::ZERO, data: bytes!("0x") },
        ];
        assert!(account.encode_calls(&calls).is_err());
    }
}
