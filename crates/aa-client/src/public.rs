//! Public chain RPC collaborator, optional: `eth_call`,
//! `eth_getCode`, and a `getSenderAddress` helper via `CREATE2` simulation —
//! the external resolver step of `aa_accounts`'s address-resolution policy.

use crate::error::Result;
use aa_accounts::AddressResolver;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

#[async_trait]
pub trait PublicClient: Send + Sync {
    async fn eth_call(&self, to: Address, data: &Bytes) -> Result<Bytes>;

    async fn get_code(&self, address: Address) -> Result<Bytes>;

    /// Simulates `EntryPoint.getSenderAddress(initCode)` to recover the
    /// counterfactual address a factory would deploy to.
    async fn get_sender_address(&self, init_code: &Bytes, entry_point: Address) -> Result<Address>;

    /// Convenience "is this sender already deployed" check; standard
    /// ERC-4337 tooling treats a non-empty `eth_getCode` as "deployed".
    async fn is_deployed(&self, address: Address) -> Result<bool> {
        Ok(!self.get_code(address).await?.is_empty())
    }
}

/// Adapts any [`PublicClient`] into the narrow [`AddressResolver`] port
/// `aa_accounts::resolve_address` expects, so `aa-accounts` doesn't need to
/// depend on `aa-client`'s richer trait.
pub struct PublicResolver<'a>(pub &'a dyn PublicClient);

#[async_trait]
impl AddressResolver for PublicResolver<'_> {
    async fn get_sender_address(&self, init_code: &Bytes, entry_point: Address) -> aa_core::Result<Address> {
        self.0
            .get_sender_address(init_code, entry_point)
            .await
            .map_err(|e| aa_core::Error::bad_input(e.to_string()))
    }
}
