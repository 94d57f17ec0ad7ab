//! UserOperation data model: the unpacked v0.6/v0.7 shapes and the
//! low-level `Call` tuple every account family's `encode_call(s)` consumes.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// One low-level contract call: `(to, value, data)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Call {
    pub fn new(to: Address, value: U256, data: impl Into<Bytes>) -> Self {
        Self { to, value, data: data.into() }
    }
}

/// Unpacked EntryPoint v0.6 UserOperation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationV06 {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

/// Unpacked EntryPoint v0.7 UserOperation. `factory`/`factory_data` and the
/// paymaster fields are optional and must be present/absent together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationV07 {
    pub sender: Address,
    pub nonce: U256,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub factory: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub factory_data: Option<Bytes>,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub paymaster: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub paymaster_post_op_gas_limit: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub paymaster_data: Option<Bytes>,
    pub signature: Bytes,
}

impl UserOperationV07 {
    /// True if the factory pair is fully absent or fully present; false if
    /// only one of `factory`/`factory_data` is set.
    pub fn factory_pair_consistent(&self) -> bool {
        self.factory.is_some() == self.factory_data.is_some()
    }

    /// True if the paymaster address and its three dependent fields are
    /// fully absent or fully present.
    pub fn paymaster_fields_consistent(&self) -> bool {
        let has_pm = self.paymaster.is_some();
        has_pm == self.paymaster_verification_gas_limit.is_some()
            && has_pm == self.paymaster_post_op_gas_limit.is_some()
            && has_pm == self.paymaster_data.is_some()
    }
}

/// Either EntryPoint version's unpacked UserOperation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserOperation {
    V06(UserOperationV06),
    V07(UserOperationV07),
}

impl UserOperation {
    pub fn sender(&self) -> Address {
        match self {
            Self::V06(op) => op.sender,
            Self::V07(op) => op.sender,
        }
    }

    pub fn nonce(&self) -> U256 {
        match self {
            Self::V06(op) => op.nonce,
            Self::V07(op) => op.nonce,
        }
    }

    pub fn signature(&self) -> &Bytes {
        match self {
            Self::V06(op) => &op.signature,
            Self::V07(op) => &op.signature,
        }
    }

    pub fn set_signature(&mut self, signature: Bytes) {
        match self {
            Self::V06(op) => op.signature = signature,
            Self::V07(op) => op.signature = signature,
        }
    }

    /// Sum of every gas-limit component times `maxFeePerGas`, without the
    /// paymaster-triples-verification-gas v0.6 special case — see
    /// [`crate::packing::required_prefund_v06`]/[`crate::packing::required_prefund_v07`]
    /// for the exact prefund formula.
    pub fn max_cost(&self) -> U256 {
        match self {
            Self::V06(op) => {
                (op.call_gas_limit + op.verification_gas_limit + op.pre_verification_gas)
                    * op.max_fee_per_gas
            }
            Self::V07(op) => {
                let mut limit = op.call_gas_limit + op.verification_gas_limit + op.pre_verification_gas;
                if let Some(v) = op.paymaster_verification_gas_limit {
                    limit += v;
                }
                if let Some(v) = op.paymaster_post_op_gas_limit {
                    limit += v;
                }
                limit * op.max_fee_per_gas
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn v07_fixture() -> UserOperationV07 {
        UserOperationV07 {
            sender: address!("0x1111111111111111111111111111111111111111"),
            nonce: U256::ZERO,
            factory: None,
            factory_data: None,
            call_data: Bytes::new(),
            call_gas_limit: U256::from(100_000u64),
            verification_gas_limit: U256::from(100_000u64),
            pre_verification_gas: U256::from(50_000u64),
            max_fee_per_gas: U256::from(1_000_000_000u64),
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
            paymaster: None,
            paymaster_verification_gas_limit: None,
            paymaster_post_op_gas_limit: None,
            paymaster_data: None,
            signature: Bytes::new(),
        }
    }

    #[test]
    fn field_pairing_invariants_hold_for_fixture() {
        let op = v07_fixture();
        assert!(op.factory_pair_consistent());
        assert!(op.paymaster_fields_consistent());
    }

    #[test]
    fn field_pairing_invariant_detects_mismatch() {
        let mut op = v07_fixture();
        op.factory = Some(address!("0x2222222222222222222222222222222222222222"));
        assert!(!op.factory_pair_consistent());
    }

    #[test]
    fn max_cost_sums_populated_components() {
        let op = UserOperation::V07(v07_fixture());
        let expected = U256::from(250_000u64) * U256::from(1_000_000_000u64);
        assert_eq!(op.max_cost(), expected);
    }

    #[test]
    fn untagged_enum_round_trips_through_json() {
        let op = UserOperation::V07(v07_fixture());
        let json = serde_json::to_string(&op).unwrap();
        let back: UserOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }
}
