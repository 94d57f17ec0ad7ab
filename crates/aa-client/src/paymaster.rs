//! Paymaster RPC collaborator: `pm_getPaymasterStubData` /
//! `pm_getPaymasterData`.

use crate::error::Result;
use aa_core::user_operation::UserOperation;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;

/// `pm_getPaymasterStubData` response. `is_final` short-circuits the final
/// data call: when true, these fields are the final ones and
/// `get_paymaster_data` is never called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymasterStubData {
    pub paymaster: Address,
    pub paymaster_data: Bytes,
    pub paymaster_verification_gas_limit: Option<U256>,
    pub paymaster_post_op_gas_limit: Option<U256>,
    pub is_final: bool,
}

/// `pm_getPaymasterData` response — always final, no `is_final` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymasterData {
    pub paymaster: Address,
    pub paymaster_data: Bytes,
    pub paymaster_verification_gas_limit: Option<U256>,
    pub paymaster_post_op_gas_limit: Option<U256>,
}

#[async_trait]
pub trait PaymasterClient: Send + Sync {
    async fn get_paymaster_stub_data(
        &self,
        op: &UserOperation,
        entry_point: Address,
        chain_id: u64,
        context: Option<&serde_json::Value>,
    ) -> Result<PaymasterStubData>;

    async fn get_paymaster_data(
        &self,
        op: &UserOperation,
        entry_point: Address,
        chain_id: u64,
        context: Option<&serde_json::Value>,
    ) -> Result<PaymasterData>;
}
