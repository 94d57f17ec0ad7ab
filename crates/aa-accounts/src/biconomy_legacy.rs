//! Biconomy v2 smart account, legacy: proxy CREATE2 via
//! `factory || init(handler, module, setupData)`, custom `execute_ncC` /
//! `executeBatch_y6U` selectors, signature wrapped as
//! `abi.encode(bytes signature, address moduleAddress)`, EntryPoint v0.6.
//!
//! Deprecated upstream: kept here only because it's still one of the
//! supported families, not because new integrations should prefer it over
//! Nexus.

use crate::account::{Account, EntryPointVersion};
use aa_core::abi::{AbiPart, encode_address, encode_bytes, encode_uint256, encode_with_dynamics};
use aa_core::constants::{BICONOMY_EXECUTE_BATCH_Y6U_SELECTOR, BICONOMY_EXECUTE_NCC_SELECTOR, BICONOMY_INIT_SELECTOR};
use aa_core::error::{Error, Result};
use aa_core::owner::Owner;
use aa_core::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256};
use std::sync::Arc;

#[derive(Clone)]
pub struct BiconomyLegacyAccount {
    pub owner: Arc<dyn Owner + Send + Sync>,
    pub factory: Address,
    pub handler: Address,
    pub module: Address,
    pub setup_data: Bytes,
    pub precomputed_address: Option<Address>,
}

impl std::fmt::Debug for BiconomyLegacyAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiconomyLegacyAccount")
            .field("factory", &self.factory)
            .field("module", &self.module)
            .field("precomputed_address", &self.precomputed_address)
            .finish()
    }
}

impl BiconomyLegacyAccount {
    pub fn new(
        owner: Arc<dyn Owner + Send + Sync>,
        factory: Address,
        handler: Address,
        module: Address,
        setup_data: Bytes,
    ) -> Self {
        Self { owner, factory, handler, module, setup_data, precomputed_address: None }
    }

    pub fn with_precomputed_address(mut self, address: Address) -> Self {
        self.precomputed_address = Some(address);
        self
    }
}

impl Account for BiconomyLegacyAccount {
    fn precomputed_address(&self) -> Option<Address> {
        self.precomputed_address
    }

    fn local_address(&self) -> Option<Address> {
        // The proxy creation code must match the target factory exactly,
        // so this family defaults to the external resolver rather than
        // guessing at a CREATE2 preimage.
        None
    }

    fn family_name(&self) -> &'static str {
        "biconomy_legacy"
    }

    fn entry_point_version(&self) -> EntryPointVersion {
        EntryPointVersion::V06
    }

    fn init_code(&self) -> Bytes {
        let mut b = Vec::with_capacity(20 + 4 + 96 + self.setup_data.len());
        b.extend_from_slice(self.factory.as_slice());
        b.extend_from_slice(&BICONOMY_INIT_SELECTOR);
        let args = encode_with_dynamics(&[
            AbiPart::static_word(encode_address(self.handler)),
            AbiPart::static_word(encode_address(self.module)),
            AbiPart::dynamic(encode_bytes(&self.setup_data)),
        ])
        .unwrap_or_default();
        b.extend_from_slice(&args);
        Bytes::from(b)
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes> {
        if calls.is_empty() {
            return Err(Error::bad_input("BiconomyLegacyAccount requires at least one call"));
        }
        if calls.len() == 1 {
            let call = &calls[0];
            let mut out = Vec::new();
            out.extend_from_slice(&BICONOMY_EXECUTE_NCC_SELECTOR);
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
        out.extend_from_slice(&BICONOMY_EXECUTE_BATCH_Y6U_SELECTOR);
        out.extend_from_slice(&encode_with_dynamics(&[
            AbiPart::dynamic(dests),
            AbiPart::dynamic(values),
            AbiPart::dynamic(datas_array),
        ])?);
        Ok(Bytes::from(out))
    }

    fn stub_signature(&self) -> Bytes {
        self.wrap_signature(&[0u8; 65])
    }

    fn sign_user_op(&self, hash: [u8; 32]) -> Result<Bytes> {
        let sig = self.owner.sign_raw_hash(hash)?;
        Ok(self.wrap_signature(&sig))
    }

    fn sign_message(&self, message: &[u8]) -> Result<Bytes> {
        let sig = self.owner.sign_personal_message(message)?;
        Ok(self.wrap_signature(&sig))
    }

    fn sign_typed_data(&self, digest: [u8; 32]) -> Result<Bytes> {
        let sig = self.owner.sign_typed_data(digest)?;
        Ok(self.wrap_signature(&sig))
    }
}

impl BiconomyLegacyAccount {
    /// `abi.encode(bytes signature, address moduleAddress)`.
    fn wrap_signature(&self, raw_signature: &[u8]) -> Bytes {
        let encoded = encode_with_dynamics(&[
            AbiPart::dynamic(encode_bytes(raw_signature)),
            AbiPart::static_word(encode_address(self.module)),
        ])
        .unwrap_or_default();
        Bytes::from(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aa_core::owner::LocalOwner;
    use alloy_primitives::address;

    fn fixture() -> BiconomyLegacyAccount {
        let owner = Arc::new(LocalOwner::from_bytes(&[0x55; 32]).unwrap());
        BiconomyLegacyAccount::new(
            owner,
            address!("0x5555555555555555555555555555555555555555"),
            address!("0x6666666666666666666666666666666666666666"),
            address!("0x7777777777777777777777777777777777777777"),
            Bytes::new(),
        )
    }

    #[test]
    fn wrapped_signature_embeds_module_address() {
        let account = fixture();
        let wrapped = account.wrap_signature(&[0u8; 65]);
        // tail contains the bytes payload; the static word holds the module address.
        assert_eq!(&wrapped[32..64], encode_address(account.module).as_slice());
    }

    #[test]
    fn single_call_uses_execute_ncc_selector() {
        let account = fixture();
        let call = Call { to: Address::ZERO, value: U256::ZERO, data: Bytes::new() };
        let encoded = account.encode_calls(std::slice::from_ref(&call)).unwrap();
        assert_eq!(&encoded[..4], &BICONOMY_EXECUTE_NCC_SELECTOR);
    }
}
