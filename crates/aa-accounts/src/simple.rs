//! `SimpleAccount`: CREATE2 via `SimpleAccountFactory.createAccount(owner,salt)`,
//! `execute`/`executeBatch`, raw ECDSA over the operation hash.

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
    function_selector("createAccount(address,uint256)")
}

/// A `SimpleAccount`, optionally not-yet-deployed (construction requires
/// `factory`/`salt` to produce `factory_data`/`init_code`).
#[derive(Clone)]
pub struct SimpleAccount {
    pub owner: Arc<dyn aa_core::owner::Owner + Send + Sync>,
    pub factory: Address,
    pub salt: U256,
    pub precomputed_address: Option<Address>,
    pub entry_point_version: EntryPointVersion,
}

impl std::fmt::Debug for SimpleAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleAccount")
            .field("factory", &self.factory)
            .field("salt", &self.salt)
            .field("precomputed_address", &self.precomputed_address)
            .finish()
    }
}

impl SimpleAccount {
    pub fn new(
        owner: Arc<dyn aa_core::owner::Owner + Send + Sync>,
        factory: Address,
        salt: U256,
        entry_point_version: EntryPointVersion,
    ) -> Self {
        Self { owner, factory, salt, precomputed_address: None, entry_point_version }
    }

    pub fn with_precomputed_address(mut self, address: Address) -> Self {
        self.precomputed_address = Some(address);
        self
    }
}

impl Account for SimpleAccount {
    fn precomputed_address(&self) -> Option<Address> {
        self.precomputed_address
    }

    fn local_address(&self) -> Option<Address> {
        // SimpleAccountFactory's proxy bytecode is fixed per deployment but
        // not embedded here; address resolution falls through to the
        // external resolver for this family.
        None
    }

    fn family_name(&self) -> &'static str {
        "simple"
    }

    fn entry_point_version(&self) -> EntryPointVersion {
        self.entry_point_version
    }

    fn init_code(&self) -> Bytes {
        let mut b = Vec::with_capacity(20 + 4 + 64);
        b.extend_from_slice(self.factory.as_slice());
        b.extend_from_slice(&create_account_selector());
        b.extend_from_slice(&encode_address(self.owner.address()));
        b.extend_from_slice(&encode_uint256(self.salt));
        Bytes::from(b)
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes> {
        if calls.is_empty() {
            return Err(Error::bad_input("SimpleAccount requires at least one call"));
        }
        if calls.len() == 1 {
            let call = &calls[0];
            let mut out = Vec::with_capacity(4 + 96 + call.data.len());
            out.extend_from_slice(&execute_selector());
            out.extend_from_slice(&encode_with_dynamics(&[
                AbiPart::static_word(encode_address(call.to)),
                AbiPart::static_word(encode_uint256(call.value)),
                AbiPart::dynamic(encode_bytes(&call.data)),
            ])?);
            return Ok(Bytes::from(out));
        }

        let dests: Vec<[u8; 32]> = calls.iter().map(|c| encode_address(c.to)).collect();
        let values: Vec<[u8; 32]> = calls.iter().map(|c| encode_uint256(c.value)).collect();
        let datas: Vec<Vec<u8>> = calls.iter().map(|c| encode_bytes(&c.data)).collect();

        let dests_array = encode_array_of_words(&dests);
        let values_array = encode_array_of_words(&values);
        let datas_array = encode_array_of_bytes(&datas);

        let mut out = Vec::new();
        out.extend_from_slice(&execute_batch_selector());
        out.extend_from_slice(&encode_with_dynamics(&[
            AbiPart::dynamic(dests_array),
            AbiPart::dynamic(values_array),
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

/// `T[]` of 32-byte static words (addresses/uints).
fn encode_array_of_words(words: &[[u8; 32]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + words.len() * 32);
    out.extend_from_slice(&encode_uint256(U256::from(words.len())));
    for w in words {
        out.extend_from_slice(w);
    }
    out
}

/// `bytes[]`: length, per-element offsets, then each already-encoded
/// dynamic `bytes` value.
fn encode_array_of_bytes(items: &[Vec<u8>]) -> Vec<u8> {
    let offsets_len = items.len() * 32;
    let mut tail = Vec::new();
    let mut offsets = Vec::with_capacity(offsets_len);
    for item in items {
        offsets.extend_from_slice(&encode_uint256(U256::from(offsets_len + tail.len())));
        tail.extend_from_slice(item);
    }
    let mut out = Vec::with_capacity(32 + offsets.len() + tail.len());
    out.extend_from_slice(&encode_uint256(U256::from(items.len())));
    out.extend_from_slice(&offsets);
    out.extend_from_slice(&tail);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use aa_core::owner::LocalOwner;
    use alloy_primitives::{address, bytes};

    fn fixture() -> SimpleAccount {
        let owner = Arc::new(LocalOwner::from_bytes(&[0x42; 32]).unwrap());
        SimpleAccount::new(
            owner,
            address!("0x9406Cc6185a346906296840746125a0E44976454"),
            U256::ZERO,
            EntryPointVersion::V07,
        )
    }

    #[test]
    fn single_call_encodes_execute_selector() {
        let account = fixture();
        let call = Call {
            to: address!("0x1111111111111111111111111111111111111111"),
            value: U256::ZERO,
            data: bytes!("0x"),
        };
        let encoded = account.encode_calls(std::slice::from_ref(&call)).unwrap();
        assert_eq!(&encoded[..4], &execute_selector());
    }

    #[test]
    fn batch_encodes_execute_batch_selector() {
        let account = fixture();
        let calls = vec![
            Call { to: address!("0x1111111111111111111111111111111111111111"), value: U256::ZERO, data: bytes!("0x") },
            Call { to: address!("0x2222222222222222222222222222222222222222"), value: U256::ZERO, data: bytes!("0x01") },
        ];
        let encoded = account.encode_calls(&calls).unwrap();
        assert_eq!(&encoded[..4], &execute_batch_selector());
    }

    #[test]
    fn empty_calls_rejected() {
        let account = fixture();
        assert!(account.encode_calls(&[]).is_err());
    }
}
