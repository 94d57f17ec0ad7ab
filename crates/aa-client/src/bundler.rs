//! Bundler RPC collaborator: `eth_estimateUserOperationGas`,
//! `eth_sendUserOperation`, `eth_getUserOperationReceipt`,
//! `eth_supportedEntryPoints`, `eth_chainId`. Modeled as a narrow async
//! trait — the transport (JSON-RPC over HTTP) is left to the caller, only
//! the demo binary wires a concrete one.

use crate::error::Result;
use aa_core::user_operation::UserOperation;
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

/// `eth_estimateUserOperationGas` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasEstimate {
    pub pre_verification_gas: U256,
    pub verification_gas_limit: U256,
    pub call_gas_limit: U256,
    pub paymaster_verification_gas_limit: Option<U256>,
    pub paymaster_post_op_gas_limit: Option<U256>,
}

/// `eth_getUserOperationReceipt` response, `None` if the hash isn't mined
/// yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOperationReceipt {
    pub user_op_hash: B256,
    pub success: bool,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
}

#[async_trait]
pub trait BundlerClient: Send + Sync {
    async fn estimate_user_operation_gas(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> Result<GasEstimate>;

    async fn send_user_operation(&self, op: &UserOperation, entry_point: Address) -> Result<B256>;

    async fn get_user_operation_receipt(&self, user_op_hash: B256) -> Result<Option<UserOperationReceipt>>;

    async fn supported_entry_points(&self) -> Result<Vec<Address>>;

    async fn chain_id(&self) -> Result<u64>;
}
