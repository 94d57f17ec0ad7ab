//! Kernel v0.2.4: ERC-1967 proxy via an AdminLess factory,
//! `execute(to,value,data,op)` / `executeBatch(Execution[])`, signature
//! wrapped as `ROOT_MODE(4B) || ECDSA`, EntryPoint v0.6.
//!
//! Kernel's own local `CREATE2` computation is unreliable against the real
//! factory bytecode, so this family never offers a local address and always
//! defers to the external resolver.

use crate::account::{Account, EntryPointVersion};
use aa_core::abi::{AbiPart, encode_address, encode_bytes, encode_uint256, encode_with_dynamics};
use aa_core::constants::KERNEL_V2_EXECUTE_SELECTOR;
use aa_core::error::{Error, Result};
use aa_core::owner::Owner;
use aa_core::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256};
use std::sync::Arc;

/// Kernel v0.2's operation-type discriminant for `execute`'s trailing `op`
/// argument: `0` is a regular call, `1` is a delegatecall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Call,
    DelegateCall,
}

impl Operation {
    fn as_u256(self) -> U256 {
        match self {
            Self::Call => U256::ZERO,
            Self::DelegateCall => U256::from(1u64),
        }
    }
}

/// Signature-mode prefix Kernel v0.2 expects ahead of the raw ECDSA bytes.
/// The default ("root") validator mode is the zero discriminant in Kernel's
/// mode enum; no other value applies to plain-owner signing.
const ROOT_MODE: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

#[derive(Clone)]
pub struct KernelV2Account {
    pub owner: Arc<dyn Owner + Send + Sync>,
    pub factory_init_code: Bytes,
    pub operation: Operation,
    pub precomputed_address: Option<Address>,
}

impl std::fmt::Debug for KernelV2Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelV2Account")
            .field("operation", &self.operation)
            .field("precomputed_address", &self.precomputed_address)
            .finish()
    }
}

impl KernelV2Account {
    pub fn new(owner: Arc<dyn Owner + Send + Sync>) -> Self {
        Self { owner, factory_init_code: Bytes::new(), operation: Operation::Call, precomputed_address: None }
    }

    pub fn with_precomputed_address(mut self, address: Address) -> Self {
        self.precomputed_address = Some(address);
        self
    }

    /// Opaque factory call data for the AdminLess factory: the ABI isn't
    /// pinned down here, only the creation strategy, so this takes
    /// caller-supplied bytes rather than a guessed encoder.
    pub fn with_factory_init_code(mut self, init_code: Bytes) -> Self {
        self.factory_init_code = init_code;
        self
    }
}

impl Account for KernelV2Account {
    fn precomputed_address(&self) -> Option<Address> {
        self.precomputed_address
    }

    fn local_address(&self) -> Option<Address> {
        None
    }

    fn family_name(&self) -> &'static str {
        "kernel_v2"
    }

    fn entry_point_version(&self) -> EntryPointVersion {
        EntryPointVersion::V06
    }

    fn init_code(&self) -> Bytes {
        self.factory_init_code.clone()
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes> {
        if calls.is_empty() {
            return Err(Error::bad_input("KernelV2Account requires at least one call"));
        }
        if calls.len() == 1 {
            let call = &calls[0];
            let mut out = Vec::new();
            out.extend_from_slice(&KERNEL_V2_EXECUTE_SELECTOR);
            out.extend_from_slice(&encode_with_dynamics(&[
                AbiPart::static_word(encode_address(call.to)),
                AbiPart::static_word(encode_uint256(call.value)),
                AbiPart::dynamic(encode_bytes(&call.data)),
                AbiPart::static_word(encode_uint256(self.operation.as_u256())),
            ])?);
            return Ok(Bytes::from(out));
        }

        // executeBatch(Execution[]): array of (address to, uint256 value, bytes data).
        let mut struct_parts = Vec::with_capacity(calls.len());
        for call in calls {
            let mut body = Vec::with_capacity(96 + call.data.len());
            body.extend_from_slice(&encode_address(call.to));
            body.extend_from_slice(&encode_uint256(call.value));
            body.extend_from_slice(&encode_uint256(U256::from(96u64)));
            body.extend_from_slice(&encode_bytes(&call.data));
            struct_parts.push(body);
        }
        let offsets_len = calls.len() * 32;
        let mut tail = Vec::new();
        let mut offsets = Vec::with_capacity(offsets_len);
        for body in &struct_parts {
            offsets.extend_from_slice(&encode_uint256(U256::from(offsets_len + tail.len())));
            tail.extend_from_slice(body);
        }
        let mut array_encoding = Vec::with_capacity(32 + offsets.len() + tail.len());
        array_encoding.extend_from_slice(&encode_uint256(U256::from(calls.len())));
        array_encoding.extend_from_slice(&offsets);
        array_encoding.extend_from_slice(&tail);

        let mut out = Vec::new();
        out.extend_from_slice(&aa_core::abi::function_selector("executeBatch((address,uint256,bytes)[])"));
        out.extend_from_slice(&encode_with_dynamics(&[AbiPart::dynamic(array_encoding)])?);
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

impl KernelV2Account {
    fn wrap_signature(&self, raw_signature: &[u8]) -> Bytes {
        let mut out = Vec::with_capacity(4 + raw_signature.len());
        out.extend_from_slice(&ROOT_MODE);
        out.extend_from_slice(raw_signature);
        Bytes::from(out)
    }
}
