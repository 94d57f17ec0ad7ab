//! Light Account, v1.1.0 and v2.0.0: factory CREATE2, `execute`/`executeBatch`,
//! raw ECDSA over the operation hash. v2.0.0 prepends a 1-byte signature-type
//! tag and wraps messages/typed-data in a `LightAccountMessage` EIP-712
//! struct instead of signing them bare.

use crate::account::{Account, EntryPointVersion, local_create2_address};
use aa_core::abi::{AbiPart, encode_address, encode_bytes, encode_uint256, encode_with_dynamics};
use aa_core::constants::{LIGHT_CREATE_ACCOUNT_SELECTOR, LIGHT_EXECUTE_BATCH_SELECTOR, LIGHT_EXECUTE_SELECTOR};
use aa_core::error::{Error, Result};
use aa_core::hash::{Eip712Domain, TypeTable, TypedValue, hash_typed_data};
use aa_core::owner::Owner;
use aa_core::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256, keccak256};
use std::sync::Arc;

/// The EIP-1271 signature-type tag v2.0.0 prepends ahead of a raw ECDSA
/// signature when the signer is the account's single EOA owner.
const EOA_SIGNATURE_TYPE: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightAccountVersion {
    V1,
    V2,
}

#[derive(Clone)]
pub struct LightAccount {
    pub owner: Arc<dyn Owner + Send + Sync>,
    pub factory: Address,
    pub salt: U256,
    pub version: LightAccountVersion,
    pub entry_point_version: EntryPointVersion,
    pub runtime_init_code: Option<Bytes>,
    pub precomputed_address: Option<Address>,
}

impl std::fmt::Debug for LightAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightAccount")
            .field("factory", &self.factory)
            .field("salt", &self.salt)
            .field("version", &self.version)
            .field("precomputed_address", &self.precomputed_address)
            .finish()
    }
}

impl LightAccount {
    pub fn new(
        owner: Arc<dyn Owner + Send + Sync>,
        factory: Address,
        salt: U256,
        version: LightAccountVersion,
        entry_point_version: EntryPointVersion,
    ) -> Self {
        Self {
            owner,
            factory,
            salt,
            version,
            entry_point_version,
            runtime_init_code: None,
            precomputed_address: None,
        }
    }

    pub fn with_precomputed_address(mut self, address: Address) -> Self {
        self.precomputed_address = Some(address);
        self
    }

    pub fn with_runtime_init_code(mut self, init_code: Bytes) -> Self {
        self.runtime_init_code = Some(init_code);
        self
    }

    fn message_domain(&self) -> Address {
        self.precomputed_address.or_else(|| self.local_address()).unwrap_or_default()
    }

    /// v2.0.0 wraps arbitrary messages/typed-data digests in a
    /// `LightAccountMessage(bytes message)` EIP-712 struct scoped to the
    /// account's own address, rather than signing the digest bare.
    fn wrap_message_v2(&self, message: &[u8]) -> Result<[u8; 32]> {
        let domain = Eip712Domain {
            name: Some("LightAccount".to_string()),
            version: Some("2.0.0".to_string()),
            chain_id: None,
            verifying_contract: Some(self.message_domain()),
            salt: None,
        };
        let mut types = TypeTable::new();
        types.insert("LightAccountMessage".to_string(), vec![("message".to_string(), "bytes".to_string())]);
        let value = TypedValue::Struct(vec![("message".to_string(), TypedValue::Bytes(message.to_vec()))]);
        hash_typed_data(&domain, "LightAccountMessage", &value, &types)
    }

    fn finish_signature(&self, raw: Bytes) -> Bytes {
        match self.version {
            LightAccountVersion::V1 => raw,
            LightAccountVersion::V2 => {
                let mut out = Vec::with_capacity(1 + raw.len());
                out.push(EOA_SIGNATURE_TYPE);
                out.extend_from_slice(&raw);
                Bytes::from(out)
            }
        }
    }
}

impl Account for LightAccount {
    fn precomputed_address(&self) -> Option<Address> {
        self.precomputed_address
    }

    fn local_address(&self) -> Option<Address> {
        let init_code = self.runtime_init_code.as_ref()?;
        let init_hash = keccak256(init_code).0;
        Some(local_create2_address(self.factory, self.salt.to_be_bytes::<32>(), init_hash))
    }

    fn family_name(&self) -> &'static str {
        match self.version {
            LightAccountVersion::V1 => "light_v1",
            LightAccountVersion::V2 => "light_v2",
        }
    }

    fn entry_point_version(&self) -> EntryPointVersion {
        self.entry_point_version
    }

    fn init_code(&self) -> Bytes {
        let mut b = Vec::with_capacity(20 + 4 + 64);
        b.extend_from_slice(self.factory.as_slice());
        b.extend_from_slice(&LIGHT_CREATE_ACCOUNT_SELECTOR);
        b.extend_from_slice(&encode_address(self.owner.address()));
        b.extend_from_slice(&encode_uint256(self.salt));
        Bytes::from(b)
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes> {
        if calls.is_empty() {
            return Err(Error::bad_input("LightAccount requires at least one call"));
        }
        if calls.len() == 1 {
            let call = &calls[0];
            let mut out = Vec::new();
            out.extend_from_slice(&LIGHT_EXECUTE_SELECTOR);
            out.extend_from_slice(&encode_with_dynamics(&[
                AbiPart::static_word(encode_address(call.to)),
                AbiPart::static_word(encode_uint256(call.value)),
                AbiPart::dynamic(encode_bytes(&call.data)),
            ])?);
            return Ok(Bytes::from(out));
        }

        let mut dests = Vec::with_capacity(32 + calls.len() * 32);
        dests.extend_from_slice(&encode_uint256(U256::from(calls.len())));
        for c in calls {
            dests.extend_from_slice(&encode_address(c.to));
        }
        let mut values = Vec::with_capacity(32 + calls.len() * 32);
        values.extend_from_slice(&encode_uint256(U256::from(calls.len())));
        for c in calls {
            values.extend_from_slice(&encode_uint256(c.value));
        }
        let datas: Vec<Vec<u8>> = calls.iter().map(|c| encode_bytes(&c.data)).collect();
        let offsets_len = datas.len() * 32;
        let mut tail = Vec::new();
        let mut offsets = Vec::with_capacity(offsets_len);
        for d in &datas {
            offsets.extend_from_slice(&encode_uint256(U256::from(offsets_len + tail.len())));
            tail.extend_from_slice(d);
        }
        let mut datas_array = Vec::with_capacity(32 + offsets.len() + tail.len());
        datas_array.extend_from_slice(&encode_uint256(U256::from(datas.len())));
        datas_array.extend_from_slice(&offsets);
        datas_array.extend_from_slice(&tail);

        let mut out = Vec::new();
        out.extend_from_slice(&LIGHT_EXECUTE_BATCH_SELECTOR);
        out.extend_from_slice(&encode_with_dynamics(&[
            AbiPart::dynamic(dests),
            AbiPart::dynamic(values),
            AbiPart::dynamic(datas_array),
        ])?);
        Ok(Bytes::from(out))
    }

    fn stub_signature(&self) -> Bytes {
        self.finish_signature(Bytes::from(vec![0u8; 65]))
    }

    fn sign_user_op(&self, hash: [u8; 32]) -> Result<Bytes> {
        let raw = Bytes::from(self.owner.sign_raw_hash(hash)?.to_vec());
        Ok(self.finish_signature(raw))
    }

    fn sign_message(&self, message: &[u8]) -> Result<Bytes> {
        match self.version {
            LightAccountVersion::V1 => {
                let sig = self.owner.sign_personal_message(message)?;
                Ok(Bytes::from(sig.to_vec()))
            }
            LightAccountVersion::V2 => {
                let digest = self.wrap_message_v2(message)?;
                let sig = self.owner.sign_typed_data(digest)?;
                Ok(self.finish_signature(Bytes::from(sig.to_vec())))
            }
        }
    }

    fn sign_typed_data(&self, digest: [u8; 32]) -> Result<Bytes> {
        let sig = self.owner.sign_typed_data(digest)?;
        Ok(self.finish_signature(Bytes::from(sig.to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aa_core::owner::LocalOwner;
    use alloy_primitives::{address, bytes};

    fn fixture(version: LightAccountVersion) -> LightAccount {
        let owner = Arc::new(LocalOwner::from_bytes(&[0x66; 32]).unwrap());
        LightAccount::new(
            owner,
            address!("0x8888888888888888888888888888888888888888"),
            U256::ZERO,
            version,
            EntryPointVersion::V07,
        )
    }

    #[test]
    fn v2_stub_signature_has_type_prefix() {
        let account = fixture(LightAccountVersion::V2);
        let sig = account.stub_signature();
        assert_eq!(sig.len(), 66);
        assert_eq!(sig[0], EOA_SIGNATURE_TYPE);
    }

    #[test]
    fn v1_stub_signature_has_no_type_prefix() {
        let account = fixture(LightAccountVersion::V1);
        let sig = account.stub_signature();
        assert_eq!(sig.len(), 65);
    }

    #[test]
    fn single_call_uses_execute_selector() {
        let account = fixture(LightAccountVersion::V1);
        let call = Call { to: Address::ZERO, value: U256::ZERO, data: bytes!("0x") };
        let encoded = account.encode_calls(std::slice::from_ref(&call)).unwrap();
        assert_eq!(&encoded[..4], &LIGHT_EXECUTE_SELECTOR);
    }

    #[test]
    fn batch_calls_use_execute_batch_selector() {
        let account = fixture(LightAccountVersion::V1);
        let call = Call { to: Address::ZERO, value: U256::ZERO, data: bytes!("0x") };
        let encoded = account.encode_calls(&[call.clone(), call]).unwrap();
        assert_eq!(&encoded[..4], &LIGHT_EXECUTE_BATCH_SELECTOR);
    }
}
