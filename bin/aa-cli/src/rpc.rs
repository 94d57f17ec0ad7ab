//! HTTP-backed bundler/paymaster/public-RPC clients, wrapping a
//! `jsonrpsee::http_client::HttpClient` behind a narrow capability type per
//! collaborator trait. Wire format is handled by
//! `aa_core::user_operation::UserOperation`'s own `Serialize` impl —
//! addresses/bytes/ints already render as the lowercase, no-leading-zero
//! hex Ethereum JSON-RPC expects.

use aa_client::bundler::{BundlerClient, GasEstimate, UserOperationReceipt};
use aa_client::error::{BundlerRpcError, ClientError, PublicRpcError, Result};
use aa_client::paymaster::{PaymasterClient, PaymasterData, PaymasterStubData};
use aa_client::public::PublicClient;
use aa_core::user_operation::UserOperation;
use alloy_primitives::{Address, Bytes, U256, B256};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::Deserialize;
use std::time::Duration;

fn build_client(url: &str, timeout_ms: u64) -> anyhow::Result<HttpClient> {
    Ok(HttpClientBuilder::new().request_timeout(Duration::from_millis(timeout_ms)).build(url)?)
}

/// `jsonrpsee`'s client error only reliably exposes a `Display` impl across
/// versions; the `AA\d+` code, when present, is recovered from that text by
/// [`BundlerRpcError::new`] rather than by matching internal error variants.
fn map_rpc_error(err: jsonrpsee::core::ClientError) -> ClientError {
    ClientError::Bundler(BundlerRpcError::new(-32000, err.to_string(), None))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GasEstimateWire {
    pre_verification_gas: U256,
    verification_gas_limit: U256,
    call_gas_limit: U256,
    #[serde(default)]
    paymaster_verification_gas_limit: Option<U256>,
    #[serde(default)]
    paymaster_post_op_gas_limit: Option<U256>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptWire {
    user_op_hash: B256,
    success: bool,
    actual_gas_cost: U256,
    actual_gas_used: U256,
}

/// `eth_estimateUserOperationGas`/`eth_sendUserOperation`/
/// `eth_getUserOperationReceipt` over plain JSON-RPC HTTP.
pub struct HttpBundlerClient {
    client: HttpClient,
}

impl HttpBundlerClient {
    pub fn new(url: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        Ok(Self { client: build_client(url, timeout_ms)? })
    }
}

#[async_trait]
impl BundlerClient for HttpBundlerClient {
    async fn estimate_user_operation_gas(&self, op: &UserOperation, entry_point: Address) -> Result<GasEstimate> {
        let wire: GasEstimateWire = ClientT::request(&self.client, "eth_estimateUserOperationGas", (op, entry_point))
            .await
            .map_err(map_rpc_error)?;
        Ok(GasEstimate {
            pre_verification_gas: wire.pre_verification_gas,
            verification_gas_limit: wire.verification_gas_limit,
            call_gas_limit: wire.call_gas_limit,
            paymaster_verification_gas_limit: wire.paymaster_verification_gas_limit,
            paymaster_post_op_gas_limit: wire.paymaster_post_op_gas_limit,
        })
    }

    async fn send_user_operation(&self, op: &UserOperation, entry_point: Address) -> Result<B256> {
        ClientT::request(&self.client, "eth_sendUserOperation", (op, entry_point)).await.map_err(map_rpc_error)
    }

    async fn get_user_operation_receipt(&self, user_op_hash: B256) -> Result<Option<UserOperationReceipt>> {
        let wire: Option<ReceiptWire> =
            ClientT::request(&self.client, "eth_getUserOperationReceipt", (user_op_hash,)).await.map_err(map_rpc_error)?;
        Ok(wire.map(|w| UserOperationReceipt {
            user_op_hash: w.user_op_hash,
            success: w.success,
            actual_gas_cost: w.actual_gas_cost,
            actual_gas_used: w.actual_gas_used,
        }))
    }

    async fn supported_entry_points(&self) -> Result<Vec<Address>> {
        ClientT::request(&self.client, "eth_supportedEntryPoints", ()).await.map_err(map_rpc_error)
    }

    async fn chain_id(&self) -> Result<u64> {
        let wire: U256 = ClientT::request(&self.client, "eth_chainId", ()).await.map_err(map_rpc_error)?;
        Ok(wire.to::<u64>())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymasterStubWire {
    paymaster: Address,
    paymaster_data: Bytes,
    #[serde(default)]
    paymaster_verification_gas_limit: Option<U256>,
    #[serde(default)]
    paymaster_post_op_gas_limit: Option<U256>,
    #[serde(default)]
    is_final: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymasterDataWire {
    paymaster: Address,
    paymaster_data: Bytes,
    #[serde(default)]
    paymaster_verification_gas_limit: Option<U256>,
    #[serde(default)]
    paymaster_post_op_gas_limit: Option<U256>,
}

/// `pm_getPaymasterStubData`/`pm_getPaymasterData` over plain JSON-RPC HTTP.
pub struct HttpPaymasterClient {
    client: HttpClient,
}

impl HttpPaymasterClient {
    pub fn new(url: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        Ok(Self { client: build_client(url, timeout_ms)? })
    }
}

#[async_trait]
impl PaymasterClient for HttpPaymasterClient {
    async fn get_paymaster_stub_data(
        &self,
        op: &UserOperation,
        entry_point: Address,
        chain_id: u64,
        context: Option<&serde_json::Value>,
    ) -> Result<PaymasterStubData> {
        let wire: PaymasterStubWire = ClientT::request(
            &self.client,
            "pm_getPaymasterStubData",
            (op, entry_point, chain_id, context.cloned().unwrap_or(serde_json::Value::Null)),
        )
        .await
        .map_err(map_rpc_error)?;
        Ok(PaymasterStubData {
            paymaster: wire.paymaster,
            paymaster_data: wire.paymaster_data,
            paymaster_verification_gas_limit: wire.paymaster_verification_gas_limit,
            paymaster_post_op_gas_limit: wire.paymaster_post_op_gas_limit,
            is_final: wire.is_final,
        })
    }

    async fn get_paymaster_data(
        &self,
        op: &UserOperation,
        entry_point: Address,
        chain_id: u64,
        context: Option<&serde_json::Value>,
    ) -> Result<PaymasterData> {
        let wire: PaymasterDataWire = ClientT::request(
            &self.client,
            "pm_getPaymasterData",
            (op, entry_point, chain_id, context.cloned().unwrap_or(serde_json::Value::Null)),
        )
        .await
        .map_err(map_rpc_error)?;
        Ok(PaymasterData {
            paymaster: wire.paymaster,
            paymaster_data: wire.paymaster_data,
            paymaster_verification_gas_limit: wire.paymaster_verification_gas_limit,
            paymaster_post_op_gas_limit: wire.paymaster_post_op_gas_limit,
        })
    }
}

/// `eth_call`/`eth_getCode`/`getSenderAddress` over plain JSON-RPC HTTP.
pub struct HttpPublicClient {
    client: HttpClient,
}

impl HttpPublicClient {
    pub fn new(url: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        Ok(Self { client: build_client(url, timeout_ms)? })
    }

    fn map_public_error(err: jsonrpsee::core::ClientError) -> ClientError {
        ClientError::Public(PublicRpcError { code: -32000, message: err.to_string(), data: None })
    }
}

#[async_trait]
impl PublicClient for HttpPublicClient {
    async fn eth_call(&self, to: Address, data: &Bytes) -> Result<Bytes> {
        let params = serde_json::json!([{ "to": to, "data": data }, "latest"]);
        ClientT::request(&self.client, "eth_call", params).await.map_err(Self::map_public_error)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        let params = serde_json::json!([address, "latest"]);
        ClientT::request(&self.client, "eth_getCode", params).await.map_err(Self::map_public_error)
    }

    async fn get_sender_address(&self, init_code: &Bytes, entry_point: Address) -> Result<Address> {
        let params = serde_json::json!([{ "initCode": init_code }, entry_point]);
        ClientT::request(&self.client, "getSenderAddress", params).await.map_err(Self::map_public_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Echoes the request's JSON-RPC `id` back in the result envelope —
    /// `jsonrpsee`'s client rejects a response whose `id` doesn't match.
    struct JsonRpcResult(serde_json::Value);

    impl Respond for JsonRpcResult {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: serde_json::Value = request.body_json().expect("valid JSON-RPC request body");
            let id = body.get("id").cloned().unwrap_or(serde_json::Value::from(0));
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": self.0 }))
        }
    }

    #[tokio::test]
    async fn chain_id_parses_hex_quantity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(JsonRpcResult(serde_json::json!("0x2105")))
            .mount(&server)
            .await;

        let client = HttpBundlerClient::new(&server.uri(), 5_000).unwrap();
        let chain_id = client.chain_id().await.unwrap();
        assert_eq!(chain_id, 0x2105);
    }

    #[tokio::test]
    async fn estimate_user_operation_gas_parses_camel_case_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(JsonRpcResult(serde_json::json!({
                "preVerificationGas": "0x5208",
                "verificationGasLimit": "0x186a0",
                "callGasLimit": "0x30d40",
            })))
            .mount(&server)
            .await;

        let client = HttpBundlerClient::new(&server.uri(), 5_000).unwrap();
        let sender = address!("0x1111111111111111111111111111111111111111");
        let op = UserOperation::V07(aa_core::user_operation::UserOperationV07 {
            sender,
            nonce: U256::ZERO,
            factory: None,
            factory_data: None,
            call_data: Bytes::new(),
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            paymaster: None,
            paymaster_verification_gas_limit: None,
            paymaster_post_op_gas_limit: None,
            paymaster_data: None,
            signature: Bytes::new(),
        });

        let estimate = client.estimate_user_operation_gas(&op, sender).await.unwrap();
        assert_eq!(estimate.pre_verification_gas, U256::from(0x5208u64));
        assert_eq!(estimate.verification_gas_limit, U256::from(0x186a0u64));
        assert_eq!(estimate.call_gas_limit, U256::from(0x30d40u64));
        assert!(estimate.paymaster_verification_gas_limit.is_none());
    }

    #[tokio::test]
    async fn bundler_error_maps_to_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 0,
                "error": { "code": -32500, "message": "AA21 didn't pay prefund" }
            })))
            .mount(&server)
            .await;

        let client = HttpBundlerClient::new(&server.uri(), 5_000).unwrap();
        let err = client.chain_id().await.unwrap_err();
        assert!(matches!(err, ClientError::Bundler(_)));
    }
}
