//! Orchestration client: the `prepare → sign → send` pipeline. Stages run
//! strictly sequentially — each depends on the previous — with suspension
//! only at the bundler/paymaster calls and no retained state across a
//! cancelled call.

use crate::bundler::{BundlerClient, GasEstimate};
use crate::error::{ClientError, Result};
use crate::paymaster::PaymasterClient;
use crate::public::{PublicClient, PublicResolver};
use aa_accounts::{Account, EntryPointVersion, resolve_address};
use aa_core::erc7579::encode_nonce;
use aa_core::packing::{user_op_hash_v06, user_op_hash_v07};
use aa_core::user_operation::{Call, UserOperation, UserOperationV06, UserOperationV07};
use alloy_primitives::{Address, B256, U256};
use tracing::{debug, info};

/// Per-transaction fee parameters; the orchestrator has no public client
/// call of its own for fee suggestion, so the caller supplies these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fees {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Gas-estimate multipliers: percentage scalars, `100` = 1.0x.
/// `GasMultipliers::none()` is the identity — every populated component is
/// used unscaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMultipliers {
    pub pre_verification_gas: u64,
    pub verification_gas_limit: u64,
    pub call_gas_limit: u64,
    pub paymaster_verification_gas_limit: u64,
    pub paymaster_post_op_gas_limit: u64,
}

impl GasMultipliers {
    pub const fn none() -> Self {
        Self {
            pre_verification_gas: 100,
            verification_gas_limit: 100,
            call_gas_limit: 100,
            paymaster_verification_gas_limit: 100,
            paymaster_post_op_gas_limit: 100,
        }
    }

    fn scale(value: U256, pct: u64) -> U256 {
        value * U256::from(pct) / U256::from(100u64)
    }

    /// Applies each scalar to its matching [`GasEstimate`] component.
    pub fn apply(&self, estimate: &GasEstimate) -> GasEstimate {
        GasEstimate {
            pre_verification_gas: Self::scale(estimate.pre_verification_gas, self.pre_verification_gas),
            verification_gas_limit: Self::scale(estimate.verification_gas_limit, self.verification_gas_limit),
            call_gas_limit: Self::scale(estimate.call_gas_limit, self.call_gas_limit),
            paymaster_verification_gas_limit: estimate
                .paymaster_verification_gas_limit
                .map(|v| Self::scale(v, self.paymaster_verification_gas_limit)),
            paymaster_post_op_gas_limit: estimate
                .paymaster_post_op_gas_limit
                .map(|v| Self::scale(v, self.paymaster_post_op_gas_limit)),
        }
    }
}

impl Default for GasMultipliers {
    fn default() -> Self {
        Self::none()
    }
}

/// Sum of every populated gas-limit component (`totalGasLimit`).
pub fn total_gas_limit(estimate: &GasEstimate) -> U256 {
    let mut total = estimate.pre_verification_gas + estimate.verification_gas_limit + estimate.call_gas_limit;
    if let Some(v) = estimate.paymaster_verification_gas_limit {
        total += v;
    }
    if let Some(v) = estimate.paymaster_post_op_gas_limit {
        total += v;
    }
    total
}

/// Inputs to one `prepare` call.
pub struct PrepareRequest<'a> {
    pub calls: &'a [Call],
    pub sequence: U256,
    pub fees: Fees,
    pub paymaster_context: Option<&'a serde_json::Value>,
}

/// Drives one account's `prepare → sign → send` pipeline against injected
/// collaborators. Borrowed collaborators are expected to be long-lived and
/// owned by the caller — the orchestrator never owns or closes them.
pub struct Orchestrator<'a, A: Account> {
    account: &'a A,
    bundler: &'a dyn BundlerClient,
    paymaster: Option<&'a dyn PaymasterClient>,
    public_client: Option<&'a dyn PublicClient>,
    entry_point: Address,
    chain_id: u64,
    gas_multipliers: GasMultipliers,
}

impl<'a, A: Account> Orchestrator<'a, A> {
    pub fn new(account: &'a A, bundler: &'a dyn BundlerClient, entry_point: Address, chain_id: u64) -> Self {
        Self {
            account,
            bundler,
            paymaster: None,
            public_client: None,
            entry_point,
            chain_id,
            gas_multipliers: GasMultipliers::none(),
        }
    }

    pub fn with_paymaster(mut self, paymaster: &'a dyn PaymasterClient) -> Self {
        self.paymaster = Some(paymaster);
        self
    }

    pub fn with_public_client(mut self, public_client: &'a dyn PublicClient) -> Self {
        self.public_client = Some(public_client);
        self
    }

    pub fn with_gas_multipliers(mut self, gas_multipliers: GasMultipliers) -> Self {
        self.gas_multipliers = gas_multipliers;
        self
    }

    /// Resolves the sender address and decides whether `initCode`/
    /// `factoryData` are needed. Without a public client to hint deployment
    /// status, a non-empty `init_code` is taken to mean "not yet deployed"
    /// (the conservative default: a bundler rejects a superfluous factory
    /// on an already-deployed sender, but a missing one on an undeployed
    /// sender fails simulation either way, so the signal is at least
    /// actionable).
    async fn collect_factory(&self) -> Result<(Address, bool)> {
        let resolver = self.public_client.map(PublicResolver);
        let sender = resolve_address(
            self.account,
            self.entry_point,
            resolver.as_ref().map(|r| r as &dyn aa_accounts::AddressResolver),
        )
        .await?;

        let include_factory = match self.public_client {
            Some(pc) => !pc.is_deployed(sender).await?,
            None => !self.account.init_code().is_empty(),
        };
        debug!(family = self.account.family_name(), %sender, include_factory, "collect_factory");
        Ok((sender, include_factory))
    }

    /// Builds the zero-gas, stub-signature skeleton for the account's
    /// EntryPoint version.
    fn assemble_skeleton(&self, sender: Address, include_factory: bool, req: &PrepareRequest<'_>) -> Result<UserOperation> {
        let call_data = self.account.encode_calls(req.calls)?;
        let nonce = encode_nonce(self.account.nonce_key(), req.sequence);
        let stub_signature = self.account.stub_signature();

        let op = match self.account.entry_point_version() {
            EntryPointVersion::V06 => UserOperation::V06(UserOperationV06 {
                sender,
                nonce,
                init_code: if include_factory { self.account.init_code() } else { Default::default() },
                call_data,
                call_gas_limit: U256::ZERO,
                verification_gas_limit: U256::ZERO,
                pre_verification_gas: U256::ZERO,
                max_fee_per_gas: req.fees.max_fee_per_gas,
                max_priority_fee_per_gas: req.fees.max_priority_fee_per_gas,
                paymaster_and_data: Default::default(),
                signature: stub_signature,
            }),
            EntryPointVersion::V07 => {
                let (factory, factory_data) = if include_factory {
                    split_init_code(&self.account.init_code())?
                } else {
                    (None, None)
                };
                UserOperation::V07(UserOperationV07 {
                    sender,
                    nonce,
                    factory,
                    factory_data,
                    call_data,
                    call_gas_limit: U256::ZERO,
                    verification_gas_limit: U256::ZERO,
                    pre_verification_gas: U256::ZERO,
                    max_fee_per_gas: req.fees.max_fee_per_gas,
                    max_priority_fee_per_gas: req.fees.max_priority_fee_per_gas,
                    paymaster: None,
                    paymaster_verification_gas_limit: None,
                    paymaster_post_op_gas_limit: None,
                    paymaster_data: None,
                    signature: stub_signature,
                })
            }
        };
        debug!(family = self.account.family_name(), "assemble_skeleton");
        Ok(op)
    }

    /// Runs the full resolve/estimate/paymaster pipeline and returns a
    /// `userOp` whose signature is still the stub — `sign` is a separate
    /// step.
    pub async fn prepare(&self, req: PrepareRequest<'_>) -> Result<UserOperation> {
        let (sender, include_factory) = self.collect_factory().await?;
        let mut op = self.assemble_skeleton(sender, include_factory, &req)?;

        let mut stub_is_final = false;
        if let Some(paymaster) = self.paymaster {
            debug!("paymaster_stub");
            let stub = paymaster
                .get_paymaster_stub_data(&op, self.entry_point, self.chain_id, req.paymaster_context)
                .await?;
            apply_paymaster_stub(&mut op, &stub)?;
            stub_is_final = stub.is_final;
        }

        info!(family = self.account.family_name(), "gas_estimate");
        let estimate = self.bundler.estimate_user_operation_gas(&op, self.entry_point).await?;
        let estimate = self.gas_multipliers.apply(&estimate);
        apply_gas_estimate(&mut op, &estimate)?;

        if let Some(paymaster) = self.paymaster {
            if !stub_is_final {
                debug!("paymaster_final");
                let data = paymaster
                    .get_paymaster_data(&op, self.entry_point, self.chain_id, req.paymaster_context)
                    .await?;
                apply_paymaster_final(&mut op, &data)?;
            }
        }

        Ok(op)
    }

    /// `sign(op)`: computes the UserOperation hash for this account's
    /// EntryPoint/chain and delegates to the account's own signature
    /// scheme.
    pub fn sign(&self, op: &mut UserOperation) -> Result<()> {
        let hash = self.user_op_hash(op)?;
        let signature = self.account.sign_user_op(hash)?;
        op.set_signature(signature);
        debug!(family = self.account.family_name(), "sign");
        Ok(())
    }

    /// The v0.6/v0.7 `userOpHash` this account would sign (exposed
    /// separately from [`Self::sign`] so callers needing the bare hash
    /// don't have to sign to get it).
    pub fn user_op_hash(&self, op: &UserOperation) -> Result<[u8; 32]> {
        match op {
            UserOperation::V06(inner) => Ok(user_op_hash_v06(inner, self.entry_point, self.chain_id)),
            UserOperation::V07(inner) => Ok(user_op_hash_v07(inner, self.entry_point, self.chain_id)?),
        }
    }

    /// `send(op)`: serializes and submits to the bundler.
    pub async fn send(&self, op: &UserOperation) -> Result<B256> {
        info!(family = self.account.family_name(), "send");
        self.bundler.send_user_operation(op, self.entry_point).await
    }
}

fn split_init_code(init_code: &alloy_primitives::Bytes) -> Result<(Option<Address>, Option<alloy_primitives::Bytes>)> {
    if init_code.is_empty() {
        return Ok((None, None));
    }
    if init_code.len() < 20 {
        return Err(ClientError::Core(aa_core::Error::bad_input("initCode shorter than 20 bytes")));
    }
    let factory = Address::from_slice(&init_code[..20]);
    let data = alloy_primitives::Bytes::from(init_code[20..].to_vec());
    Ok((Some(factory), Some(data)))
}

fn apply_paymaster_stub(op: &mut UserOperation, stub: &crate::paymaster::PaymasterStubData) -> Result<()> {
    match op {
        UserOperation::V07(inner) => {
            inner.paymaster = Some(stub.paymaster);
            inner.paymaster_data = Some(stub.paymaster_data.clone());
            inner.paymaster_verification_gas_limit = stub.paymaster_verification_gas_limit;
            inner.paymaster_post_op_gas_limit = stub.paymaster_post_op_gas_limit;
            Ok(())
        }
        UserOperation::V06(inner) => {
            let mut data = Vec::with_capacity(20 + stub.paymaster_data.len());
            data.extend_from_slice(stub.paymaster.as_slice());
            data.extend_from_slice(&stub.paymaster_data);
            inner.paymaster_and_data = alloy_primitives::Bytes::from(data);
            Ok(())
        }
    }
}

fn apply_paymaster_final(op: &mut UserOperation, data: &crate::paymaster::PaymasterData) -> Result<()> {
    match op {
        UserOperation::V07(inner) => {
            inner.paymaster = Some(data.paymaster);
            inner.paymaster_data = Some(data.paymaster_data.clone());
            inner.paymaster_verification_gas_limit = data.paymaster_verification_gas_limit;
            inner.paymaster_post_op_gas_limit = data.paymaster_post_op_gas_limit;
            Ok(())
        }
        UserOperation::V06(inner) => {
            let mut bytes = Vec::with_capacity(20 + data.paymaster_data.len());
            bytes.extend_from_slice(data.paymaster.as_slice());
            bytes.extend_from_slice(&data.paymaster_data);
            inner.paymaster_and_data = alloy_primitives::Bytes::from(bytes);
            Ok(())
        }
    }
}

fn apply_gas_estimate(op: &mut UserOperation, estimate: &GasEstimate) -> Result<()> {
    match op {
        UserOperation::V07(inner) => {
            inner.call_gas_limit = estimate.call_gas_limit;
            inner.verification_gas_limit = estimate.verification_gas_limit;
            inner.pre_verification_gas = estimate.pre_verification_gas;
            if inner.paymaster.is_some() {
                inner.paymaster_verification_gas_limit = estimate.paymaster_verification_gas_limit;
                inner.paymaster_post_op_gas_limit = estimate.paymaster_post_op_gas_limit;
            }
            Ok(())
        }
        UserOperation::V06(inner) => {
            inner.call_gas_limit = estimate.call_gas_limit;
            inner.verification_gas_limit = estimate.verification_gas_limit;
            inner.pre_verification_gas = estimate.pre_verification_gas;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate_fixture() -> GasEstimate {
        GasEstimate {
            pre_verification_gas: U256::from(21_000u64),
            verification_gas_limit: U256::from(100_000u64),
            call_gas_limit: U256::from(100_000u64),
            paymaster_verification_gas_limit: Some(U256::from(30_000u64)),
            paymaster_post_op_gas_limit: Some(U256::from(10_000u64)),
        }
    }

    #[test]
    fn none_multiplier_is_identity() {
        let estimate = estimate_fixture();
        let scaled = GasMultipliers::none().apply(&estimate);
        assert_eq!(scaled, estimate);
    }

    #[test]
    fn multiplier_scales_populated_components_only() {
        let mut multipliers = GasMultipliers::none();
        multipliers.call_gas_limit = 150;
        let estimate = GasEstimate { paymaster_verification_gas_limit: None, paymaster_post_op_gas_limit: None, ..estimate_fixture() };
        let scaled = multipliers.apply(&estimate);
        assert_eq!(scaled.call_gas_limit, U256::from(150_000u64));
        assert_eq!(scaled.pre_verification_gas, estimate.pre_verification_gas);
        assert!(scaled.paymaster_verification_gas_limit.is_none());
    }

    #[test]
    fn total_gas_limit_sums_populated_components() {
        let estimate = estimate_fixture();
        assert_eq!(total_gas_limit(&estimate), U256::from(261_000u64));
    }

    #[test]
    fn total_gas_limit_excludes_absent_paymaster_components() {
        let estimate = GasEstimate { paymaster_verification_gas_limit: None, paymaster_post_op_gas_limit: None, ..estimate_fixture() };
        assert_eq!(total_gas_limit(&estimate), U256::from(221_000u64));
    }

    mod pipeline {
        use super::*;
        use crate::bundler::UserOperationReceipt;
        use crate::paymaster::{PaymasterData, PaymasterStubData};
        use aa_accounts::SimpleAccount;
        use aa_core::owner::LocalOwner;
        use aa_core::user_operation::Call;
        use alloy_primitives::{address, bytes};
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct MockBundler {
            estimate: GasEstimate,
        }

        #[async_trait]
        impl BundlerClient for MockBundler {
            async fn estimate_user_operation_gas(&self, _op: &UserOperation, _entry_point: Address) -> Result<GasEstimate> {
                Ok(self.estimate.clone())
            }

            async fn send_user_operation(&self, _op: &UserOperation, _entry_point: Address) -> Result<B256> {
                Ok(B256::repeat_byte(0xab))
            }

            async fn get_user_operation_receipt(&self, _user_op_hash: B256) -> Result<Option<UserOperationReceipt>> {
                Ok(None)
            }

            async fn supported_entry_points(&self) -> Result<Vec<Address>> {
                Ok(vec![])
            }

            async fn chain_id(&self) -> Result<u64> {
                Ok(11155111)
            }
        }

        struct MockPaymaster {
            is_final: bool,
            final_calls: AtomicUsize,
        }

        impl MockPaymaster {
            fn new(is_final: bool) -> Self {
                Self { is_final, final_calls: AtomicUsize::new(0) }
            }
        }

        #[async_trait]
        impl PaymasterClient for MockPaymaster {
            async fn get_paymaster_stub_data(
                &self,
                _op: &UserOperation,
                _entry_point: Address,
                _chain_id: u64,
                _context: Option<&serde_json::Value>,
            ) -> Result<PaymasterStubData> {
                Ok(PaymasterStubData {
                    paymaster: address!("0x9999999999999999999999999999999999999999"),
                    paymaster_data: bytes!("0x"),
                    paymaster_verification_gas_limit: Some(U256::from(30_000u64)),
                    paymaster_post_op_gas_limit: Some(U256::from(10_000u64)),
                    is_final: self.is_final,
                })
            }

            async fn get_paymaster_data(
                &self,
                _op: &UserOperation,
                _entry_point: Address,
                _chain_id: u64,
                _context: Option<&serde_json::Value>,
            ) -> Result<PaymasterData> {
                self.final_calls.fetch_add(1, Ordering::SeqCst);
                Ok(PaymasterData {
                    paymaster: address!("0x9999999999999999999999999999999999999999"),
                    paymaster_data: bytes!("0xaa"),
                    paymaster_verification_gas_limit: Some(U256::from(30_000u64)),
                    paymaster_post_op_gas_limit: Some(U256::from(10_000u64)),
                })
            }
        }

        fn simple_account() -> SimpleAccount {
            let owner = Arc::new(LocalOwner::from_bytes(&[0x42; 32]).unwrap());
            SimpleAccount::new(owner, address!("0x9406Cc6185a346906296840746125a0E44976454"), U256::ZERO, EntryPointVersion::V07)
                .with_precomputed_address(address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"))
        }

        fn fees() -> Fees {
            Fees { max_fee_per_gas: U256::from(20_000_000_000u64), max_priority_fee_per_gas: U256::from(1_000_000_000u64) }
        }

        #[tokio::test]
        async fn simple_account_self_ping_produces_signed_v07_op() {
            let account = simple_account();
            let bundler = MockBundler {
                estimate: GasEstimate {
                    pre_verification_gas: U256::from(21_000u64),
                    verification_gas_limit: U256::from(100_000u64),
                    call_gas_limit: U256::from(100_000u64),
                    paymaster_verification_gas_limit: None,
                    paymaster_post_op_gas_limit: None,
                },
            };
            let orchestrator = Orchestrator::new(&account, &bundler, aa_core::constants::ENTRY_POINT_V07, 11155111);

            let call = Call { to: account.precomputed_address().unwrap(), value: U256::ZERO, data: bytes!("0x") };
            let req = PrepareRequest { calls: std::slice::from_ref(&call), sequence: U256::ZERO, fees: fees(), paymaster_context: None };

            let mut op = orchestrator.prepare(req).await.unwrap();
            match &op {
                UserOperation::V07(inner) => {
                    assert_eq!(&inner.call_data[..4], &[0xb6, 0x1d, 0x27, 0xf6]);
                    assert_eq!(inner.sender, account.precomputed_address().unwrap());
                }
                UserOperation::V06(_) => panic!("expected a v0.7 op"),
            }

            orchestrator.sign(&mut op).unwrap();
            assert_ne!(op.signature().to_vec(), vec![0u8; 65]);
        }

        #[tokio::test]
        async fn paymaster_short_circuit_skips_final_call() {
            let account = simple_account();
            let bundler = MockBundler {
                estimate: GasEstimate {
                    pre_verification_gas: U256::from(21_000u64),
                    verification_gas_limit: U256::from(100_000u64),
                    call_gas_limit: U256::from(100_000u64),
                    paymaster_verification_gas_limit: Some(U256::from(30_000u64)),
                    paymaster_post_op_gas_limit: Some(U256::from(10_000u64)),
                },
            };
            let paymaster = MockPaymaster::new(true);
            let orchestrator = Orchestrator::new(&account, &bundler, aa_core::constants::ENTRY_POINT_V07, 11155111)
                .with_paymaster(&paymaster);

            let call = Call { to: account.precomputed_address().unwrap(), value: U256::ZERO, data: bytes!("0x") };
            let req = PrepareRequest { calls: std::slice::from_ref(&call), sequence: U256::ZERO, fees: fees(), paymaster_context: None };

            let op = orchestrator.prepare(req).await.unwrap();
            assert_eq!(paymaster.final_calls.load(Ordering::SeqCst), 0);
            match op {
                UserOperation::V07(inner) => assert_eq!(inner.paymaster_data, Some(bytes!("0x"))),
                UserOperation::V06(_) => panic!("expected a v0.7 op"),
            }
        }

        #[tokio::test]
        async fn non_final_stub_triggers_paymaster_final_call() {
            let account = simple_account();
            let bundler = MockBundler {
                estimate: GasEstimate {
                    pre_verification_gas: U256::from(21_000u64),
                    verification_gas_limit: U256::from(100_000u64),
                    call_gas_limit: U256::from(100_000u64),
                    paymaster_verification_gas_limit: Some(U256::from(30_000u64)),
                    paymaster_post_op_gas_limit: Some(U256::from(10_000u64)),
                },
            };
            let paymaster = MockPaymaster::new(false);
            let orchestrator = Orchestrator::new(&account, &bundler, aa_core::constants::ENTRY_POINT_V07, 11155111)
                .with_paymaster(&paymaster);

            let call = Call { to: account.precomputed_address().unwrap(), value: U256::ZERO, data: bytes!("0x") };
            let req = PrepareRequest { calls: std::slice::from_ref(&call), sequence: U256::ZERO, fees: fees(), paymaster_context: None };

            let op = orchestrator.prepare(req).await.unwrap();
            assert_eq!(paymaster.final_calls.load(Ordering::SeqCst), 1);
            match op {
                UserOperation::V07(inner) => assert_eq!(inner.paymaster_data, Some(bytes!("0xaa"))),
                UserOperation::V06(_) => panic!("expected a v0.7 op"),
            }
        }
    }
}
