//! Kernel v0.3.x and its v0.3.3 EIP-7702 variant. Both speak ERC-7579
//! `execute` and use the structured validator nonce key, but differ in how
//! an account comes to exist and how signatures are produced:
//!
//! - v0.3.x: meta-factory `deployWithFactory(factory, initCalldata, salt)`;
//!   the operation hash is signed with plain ECDSA, no EIP-191 wrapper;
//!   messages/typed-data are wrapped in a Kernel EIP-712 domain carrying the
//!   validator identifier.
//! - v0.3.3 EIP-7702: the account address **is** the EOA's own address, no
//!   factory involved; the operation hash is signed with the EIP-191
//!   raw-prefix; message/typed-data signing requires the caller to assert
//!   the EOA has actually delegated (via an authorization), otherwise it's
//!   rejected rather than silently producing an unverifiable signature.

use crate::account::{Account, EntryPointVersion, sign_raw_191};
use aa_core::erc7579::{ExecutionMode, encode_execute, structured_nonce_key};
use aa_core::error::{Error, Result};
use aa_core::hash::{Eip712Domain, TypeTable, TypedValue, hash_typed_data};
use aa_core::owner::Owner;
use aa_core::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelV3Variant {
    Standard,
    Eip7702,
}

#[derive(Clone)]
pub struct KernelV3Account {
    pub owner: Arc<dyn Owner + Send + Sync>,
    pub validator: Address,
    pub salt: u16,
    pub variant: KernelV3Variant,
    /// Meta-factory call data for `Standard`; ignored for `Eip7702`.
    pub factory_init_code: Bytes,
    /// Whether the EOA has actually delegated to Kernel's code (EIP-7702
    /// authorization applied on-chain). Only meaningful for `Eip7702`.
    pub delegated: bool,
    pub precomputed_address: Option<Address>,
}

impl std::fmt::Debug for KernelV3Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelV3Account")
            .field("validator", &self.validator)
            .field("salt", &self.salt)
            .field("variant", &self.variant)
            .field("delegated", &self.delegated)
            .field("precomputed_address", &self.precomputed_address)
            .finish()
    }
}

impl KernelV3Account {
    pub fn new(owner: Arc<dyn Owner + Send + Sync>, validator: Address, salt: u16, variant: KernelV3Variant) -> Self {
        Self {
            owner,
            validator,
            salt,
            variant,
            factory_init_code: Bytes::new(),
            delegated: false,
            precomputed_address: None,
        }
    }

    pub fn with_precomputed_address(mut self, address: Address) -> Self {
        self.precomputed_address = Some(address);
        self
    }

    pub fn with_factory_init_code(mut self, init_code: Bytes) -> Self {
        self.factory_init_code = init_code;
        self
    }

    pub fn with_delegated(mut self, delegated: bool) -> Self {
        self.delegated = delegated;
        self
    }

    fn message_domain(&self) -> Result<Eip712Domain> {
        let mut salt = [0u8; 32];
        salt[12..].copy_from_slice(self.validator.as_slice());
        Ok(Eip712Domain {
            name: Some("Kernel".to_string()),
            version: Some("0.3.1".to_string()),
            chain_id: None,
            verifying_contract: self.precomputed_address.or(Some(self.owner.address())),
            salt: Some(salt),
        })
    }

    fn wrap_digest(&self, digest: [u8; 32]) -> Result<[u8; 32]> {
        let domain = self.message_domain()?;
        let mut types = TypeTable::new();
        types.insert("Kernel".to_string(), vec![("hash".to_string(), "bytes32".to_string())]);
        let value = TypedValue::Struct(vec![("hash".to_string(), TypedValue::BytesN(32, digest))]);
        hash_typed_data(&domain, "Kernel", &value, &types)
    }
}

impl Account for KernelV3Account {
    fn precomputed_address(&self) -> Option<Address> {
        self.precomputed_address
    }

    fn local_address(&self) -> Option<Address> {
        match self.variant {
            // The address *is* the EOA once delegated.
            KernelV3Variant::Eip7702 => Some(self.owner.address()),
            // Kernel's own CREATE2 math is unreliable against the real
            // meta-factory, defer to the external resolver.
            KernelV3Variant::Standard => None,
        }
    }

    fn family_name(&self) -> &'static str {
        match self.variant {
            KernelV3Variant::Standard => "kernel_v3",
            KernelV3Variant::Eip7702 => "kernel_v3_eip7702",
        }
    }

    fn entry_point_version(&self) -> EntryPointVersion {
        EntryPointVersion::V07
    }

    fn init_code(&self) -> Bytes {
        match self.variant {
            KernelV3Variant::Standard => self.factory_init_code.clone(),
            KernelV3Variant::Eip7702 => Bytes::new(),
        }
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes> {
        if calls.is_empty() {
            return Err(Error::bad_input("KernelV3Account requires at least one call"));
        }
        let mode = ExecutionMode::batch(true);
        Ok(Bytes::from(encode_execute(&mode, calls)?))
    }

    fn stub_signature(&self) -> Bytes {
        Bytes::from(vec![0u8; 65])
    }

    fn sign_user_op(&self, hash: [u8; 32]) -> Result<Bytes> {
        match self.variant {
            KernelV3Variant::Standard => {
                let sig = self.owner.sign_raw_hash(hash)?;
                Ok(Bytes::from(sig.to_vec()))
            }
            KernelV3Variant::Eip7702 => sign_raw_191(self.owner.as_ref(), hash),
        }
    }

    fn sign_message(&self, message: &[u8]) -> Result<Bytes> {
        if self.variant == KernelV3Variant::Eip7702 && !self.delegated {
            return Err(Error::UnsupportedOperation {
                family: self.family_name(),
                operation: "sign_message before EIP-7702 delegation is applied",
            });
        }
        let digest = self.wrap_digest(aa_core::hash::hash_personal_message(message))?;
        let sig = self.owner.sign_typed_data(digest)?;
        Ok(Bytes::from(sig.to_vec()))
    }

    fn sign_typed_data(&self, digest: [u8; 32]) -> Result<Bytes> {
        if self.variant == KernelV3Variant::Eip7702 && !self.delegated {
            return Err(Error::UnsupportedOperation {
                family: self.family_name(),
                operation: "sign_typed_data before EIP-7702 delegation is applied",
            });
        }
        let wrapped = self.wrap_digest(digest)?;
        let sig = self.owner.sign_typed_data(wrapped)?;
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
    use alloy_primitives::address;

    fn fixture(variant: KernelV3Variant) -> KernelV3Account {
        let owner = Arc::new(LocalOwner::from_bytes(&[0x88; 32]).unwrap());
        KernelV3Account::new(owner, address!("0x845a6f3ce5a9f8c8699a9e5e2f51e11321cce57"), 0, variant)
    }

    #[test]
    fn eip7702_address_equals_owner_address() {
        let account = fixture(KernelV3Variant::Eip7702);
        assert_eq!(account.local_address(), Some(account.owner.address()));
    }

    #[test]
    fn standard_defers_local_address_to_resolver() {
        let account = fixture(KernelV3Variant::Standard);
        assert!(account.local_address().is_none());
    }

    #[test]
    fn eip7702_message_signing_rejected_before_delegation() {
        let account = fixture(KernelV3Variant::Eip7702);
        assert!(account.sign_message(b"hi").is_err());
    }

    #[test]
    fn eip7702_message_signing_allowed_after_delegation() {
        let account = fixture(KernelV3Variant::Eip7702).with_delegated(true);
        assert!(account.sign_message(b"hi").is_ok());
    }

    #[test]
    fn nonce_key_matches_structured_layout() {
        let account = fixture(KernelV3Variant::Standard);
        let key = account.nonce_key();
        let expected = structured_nonce_key(account.validator, account.salt);
        assert_eq!(key, expected);
    }
}
