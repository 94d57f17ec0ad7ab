//! Thirdweb smart account: factory CREATE2, `execute`/`executeBatch`,
//! raw ECDSA, v0.6 or v0.7.

use crate::account::{Account, EntryPointVersion};
use aa_core::abi::{AbiPart, encode_address, encode_bytes, encode_uint256, encode_with_dynamics, function_selector};
use aa_core::error::{Error, Result};
use aa_core::owner::Owner;
use aa_core::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256};
use std::sync::Arc;

fn execute_selector() -> [u8; 4] {
    function_selector("execute(address,uint256,bytes)")
}

fn execute_batch_selector() -> [u8; 4] {
    function_selector("executeBatch(address[],uint256[],bytes[])")
}

fn create_account_selector() -> [u8; 4] {
    function_selector("createAccount(address,bytes)")
}

#[derive(Clone)]
pub struct ThirdwebAccount {
    pub owner: Arc<dyn Owner + Send + Sync>,
    pub factory: Address,
    pub extra_data: Bytes,
    pub precomputed_address: Option<Address>,
    pub entry_point_version: EntryPointVersion,
}

impl std::fmt::Debug for ThirdwebAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThirdwebAccount")
            .field("factory", &self.factory)
            .field("precomputed_address", &self.precomputed_address)
            .finish()
    }
}

impl ThirdwebAccount {
    pub fn new(
        owner: Arc<dyn Owner + Send + Sync>,
        factory: Address,
        entry_point_version: EntryPointVersion,
    ) -> Self {
        Self { owner, factory, extra_data: Bytes::new(), precomputed_address: None, entry_point_version }
    }

    pub fn with_precomputed_address(mut self, address: Address) -> Self {
        self.precomputed_address = Some(address);
        self
    }
}

impl Account for ThirdwebAccount {
    fn precomputed_address(&self) -> Option<Address> {
        self.precomputed_address
    }

    fn local_address(&self) -> Option<Address> {
        None
    }

    fn family_name(&self) -> &'static str {
        "thirdweb"
    }

    fn entry_point_version(&self) -> EntryPointVersion {
        self.entry_point_version
    }

    fn init_code(&self) -> Bytes {
        let mut b = Vec::with_capacity(20 + 4 + 64 + self.extra_data.len());
        b.extend_from_slice(self.factory.as_slice());
        b.extend_from_slice(&create_account_selector());
        let encoded = encode_with_dynamics(&[
            AbiPart::static_word(encode_address(self.owner.address())),
            AbiPart::dynamic(encode_bytes(&self.extra_data)),
        ])
        .unwrap_or_default();
        b.extend_from_slice(&encoded);
        Bytes::from(b)
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes> {
        if calls.is_empty() {
            return Err(Error::bad_input("ThirdwebAccount requires at least one call"));
        }
        if calls.len() == 1 {
            let call = &calls[0];
            let mut out = Vec::new();
            out.extend_from_slice(&execute_selector());
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
        out.extend_from_slice(&execute_batch_selector());
        out.extend_from_slice(&encode_with_dynamics(&[
            AbiPart::dynamic(dests),
            AbiPart::dynamic(values),
            AbiPart::dynamic(datas_array),
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
    use alloy_primitives::address;

    #[test]
    fn init_code_starts_with_factory_address() {
        let owner = Arc::new(LocalOwner::from_bytes(&[0x33; 32]).unwrap());
        let account = ThirdwebAccount::new(
            owner,
            address!("0x4444444444444444444444444444444444444444"),
            EntryPointVersion::V07,
        );
        let init = account.init_code();
        assert_eq!(&init[..20], account.factory.as_slice());
    }
}
