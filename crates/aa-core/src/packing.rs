//! v0.7 packing/unpacking and v0.6/v0.7 UserOperation hashing.

use crate::abi::{encode_address, encode_uint256, keccak};
use crate::error::{Error, Result};
use crate::user_operation::{UserOperationV06, UserOperationV07};
use alloy_primitives::{Address, Bytes, U256};

/// v0.7 wire form: `initCode`/`accountGasLimits`/`gasFees`/`paymasterAndData`
/// replace the unpacked op's separated fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedUserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub account_gas_limits: [u8; 32],
    pub pre_verification_gas: U256,
    pub gas_fees: [u8; 32],
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

fn u128_be(n: U256) -> Result<[u8; 16]> {
    let full = n.to_be_bytes::<32>();
    if full[..16].iter().any(|b| *b != 0) {
        return Err(Error::bad_input("value does not fit in 128 bits"));
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&full[16..]);
    Ok(out)
}

/// Packs two 128-bit gas values into one 32-byte word, high half first.
fn pack_two_u128(hi: U256, lo: U256) -> Result<[u8; 32]> {
    let hi = u128_be(hi)?;
    let lo = u128_be(lo)?;
    let mut out = [0u8; 32];
    out[..16].copy_from_slice(&hi);
    out[16..].copy_from_slice(&lo);
    Ok(out)
}

fn unpack_two_u128(word: &[u8; 32]) -> (U256, U256) {
    let hi = U256::from_be_slice(&word[..16]);
    let lo = U256::from_be_slice(&word[16..]);
    (hi, lo)
}

/// Packs an unpacked v0.7 UserOperation into its wire form.
pub fn pack(op: &UserOperationV07) -> Result<PackedUserOperation> {
    let init_code = match (&op.factory, &op.factory_data) {
        (Some(factory), Some(data)) => {
            let mut b = Vec::with_capacity(20 + data.len());
            b.extend_from_slice(factory.as_slice());
            b.extend_from_slice(data);
            Bytes::from(b)
        }
        (None, None) => Bytes::new(),
        _ => return Err(Error::bad_input("factory and factoryData must be present together")),
    };

    let account_gas_limits = pack_two_u128(op.verification_gas_limit, op.call_gas_limit)?;
    let gas_fees = pack_two_u128(op.max_priority_fee_per_gas, op.max_fee_per_gas)?;

    let paymaster_and_data = match (
        &op.paymaster,
        &op.paymaster_verification_gas_limit,
        &op.paymaster_post_op_gas_limit,
        &op.paymaster_data,
    ) {
        (Some(pm), Some(vgl), Some(pgl), Some(data)) => {
            let mut b = Vec::with_capacity(20 + 16 + 16 + data.len());
            b.extend_from_slice(pm.as_slice());
            b.extend_from_slice(&u128_be(*vgl)?);
            b.extend_from_slice(&u128_be(*pgl)?);
            b.extend_from_slice(data);
            Bytes::from(b)
        }
        (None, None, None, None) => Bytes::new(),
        _ => {
            return Err(Error::bad_input(
                "paymaster fields must be present or absent together",
            ));
        }
    };

    Ok(PackedUserOperation {
        sender: op.sender,
        nonce: op.nonce,
        init_code,
        call_data: op.call_data.clone(),
        account_gas_limits,
        pre_verification_gas: op.pre_verification_gas,
        gas_fees,
        paymaster_and_data,
        signature: op.signature.clone(),
    })
}

/// Reverses [`pack`]. Always produces `factory`/`factory_data` and the
/// paymaster quadruple together, so `unpack(pack(op)) == op` for any `op`
/// already satisfying those pairing invariants.
pub fn unpack(packed: &PackedUserOperation) -> Result<UserOperationV07> {
    let (factory, factory_data) = if packed.init_code.is_empty() {
        (None, None)
    } else {
        if packed.init_code.len() < 20 {
            return Err(Error::bad_input("initCode shorter than 20 bytes"));
        }
        let factory = Address::from_slice(&packed.init_code[..20]);
        let data = Bytes::from(packed.init_code[20..].to_vec());
        (Some(factory), Some(data))
    };

    let (verification_gas_limit, call_gas_limit) = unpack_two_u128(&packed.account_gas_limits);
    let (max_priority_fee_per_gas, max_fee_per_gas) = unpack_two_u128(&packed.gas_fees);

    let (paymaster, paymaster_verification_gas_limit, paymaster_post_op_gas_limit, paymaster_data) =
        if packed.paymaster_and_data.is_empty() {
            (None, None, None, None)
        } else {
            if packed.paymaster_and_data.len() < 52 {
                return Err(Error::bad_input("paymasterAndData shorter than 52 bytes"));
            }
            let pm = Address::from_slice(&packed.paymaster_and_data[..20]);
            let vgl = U256::from_be_slice(&packed.paymaster_and_data[20..36]);
            let pgl = U256::from_be_slice(&packed.paymaster_and_data[36..52]);
            let data = Bytes::from(packed.paymaster_and_data[52..].to_vec());
            (Some(pm), Some(vgl), Some(pgl), Some(data))
        };

    Ok(UserOperationV07 {
        sender: packed.sender,
        nonce: packed.nonce,
        factory,
        factory_data,
        call_data: packed.call_data.clone(),
        call_gas_limit,
        verification_gas_limit,
        pre_verification_gas: packed.pre_verification_gas,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        paymaster,
        paymaster_verification_gas_limit,
        paymaster_post_op_gas_limit,
        paymaster_data,
        signature: packed.signature.clone(),
    })
}

/// `inner = keccak(abi_encode(sender, nonce, keccak(initCode), keccak(callData),
/// accountGasLimits, preVerificationGas, gasFees, keccak(paymasterAndData)))`;
/// final = `keccak(abi_encode(inner, entryPoint, chainId))`.
pub fn user_op_hash_v07(op: &UserOperationV07, entry_point: Address, chain_id: u64) -> Result<[u8; 32]> {
    let packed = pack(op)?;
    let mut inner = Vec::with_capacity(32 * 8);
    inner.extend_from_slice(&encode_address(packed.sender));
    inner.extend_from_slice(&encode_uint256(packed.nonce));
    inner.extend_from_slice(&keccak(&packed.init_code));
    inner.extend_from_slice(&keccak(&packed.call_data));
    inner.extend_from_slice(&packed.account_gas_limits);
    inner.extend_from_slice(&encode_uint256(packed.pre_verification_gas));
    inner.extend_from_slice(&packed.gas_fees);
    inner.extend_from_slice(&keccak(&packed.paymaster_and_data));
    let inner_hash = keccak(&inner);

    Ok(wrap_with_entry_point_and_chain(inner_hash, entry_point, chain_id))
}

/// `inner = keccak(abi_encode(sender, nonce, keccak(initCode), keccak(callData),
/// callGasLimit, verificationGasLimit, preVerificationGas, maxFeePerGas,
/// maxPriorityFeePerGas, keccak(paymasterAndData)))`; final uses the same wrapper.
pub fn user_op_hash_v06(op: &UserOperationV06, entry_point: Address, chain_id: u64) -> [u8; 32] {
    let mut inner = Vec::with_capacity(32 * 10);
    inner.extend_from_slice(&encode_address(op.sender));
    inner.extend_from_slice(&encode_uint256(op.nonce));
    inner.extend_from_slice(&keccak(&op.init_code));
    inner.extend_from_slice(&keccak(&op.call_data));
    inner.extend_from_slice(&encode_uint256(op.call_gas_limit));
    inner.extend_from_slice(&encode_uint256(op.verification_gas_limit));
    inner.extend_from_slice(&encode_uint256(op.pre_verification_gas));
    inner.extend_from_slice(&encode_uint256(op.max_fee_per_gas));
    inner.extend_from_slice(&encode_uint256(op.max_priority_fee_per_gas));
    inner.extend_from_slice(&keccak(&op.paymaster_and_data));
    let inner_hash = keccak(&inner);

    wrap_with_entry_point_and_chain(inner_hash, entry_point, chain_id)
}

fn wrap_with_entry_point_and_chain(inner_hash: [u8; 32], entry_point: Address, chain_id: u64) -> [u8; 32] {
    let mut buf = Vec::with_capacity(96);
    buf.extend_from_slice(&inner_hash);
    buf.extend_from_slice(&encode_address(entry_point));
    buf.extend_from_slice(&encode_uint256(U256::from(chain_id)));
    keccak(&buf)
}

/// Required prefund. v0.7: sum of populated gas-limit components times
/// `maxFeePerGas`. v0.6: `verificationGasLimit` is tripled when
/// `paymasterAndData` is non-empty, covering the paymaster's own
/// validation/postOp gas since v0.6 has no separate paymaster gas fields.
pub fn required_prefund_v07(op: &UserOperationV07) -> U256 {
    let mut total = op.verification_gas_limit + op.call_gas_limit + op.pre_verification_gas;
    if let Some(v) = op.paymaster_verification_gas_limit {
        total += v;
    }
    if let Some(v) = op.paymaster_post_op_gas_limit {
        total += v;
    }
    total * op.max_fee_per_gas
}

pub fn required_prefund_v06(op: &UserOperationV06) -> U256 {
    let verification_multiplier = if op.paymaster_and_data.is_empty() { U256::from(1u64) } else { U256::from(3u64) };
    let total = op.verification_gas_limit * verification_multiplier
        + op.call_gas_limit
        + op.pre_verification_gas;
    total * op.max_fee_per_gas
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, bytes};

    fn fixture() -> UserOperationV07 {
        UserOperationV07 {
            sender: address!("0x1111111111111111111111111111111111111111"),
            nonce: U256::from(5u64),
            factory: Some(address!("0x2222222222222222222222222222222222222222")),
            factory_data: Some(bytes!("0xaabbcc")),
            call_data: bytes!("0xdeadbeef"),
            call_gas_limit: U256::from(100_000u64),
            verification_gas_limit: U256::from(80_000u64),
            pre_verification_gas: U256::from(50_000u64),
            max_fee_per_gas: U256::from(2_000_000_000u64),
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
            paymaster: Some(address!("0x3333333333333333333333333333333333333333")),
            paymaster_verification_gas_limit: Some(U256::from(30_000u64)),
            paymaster_post_op_gas_limit: Some(U256::from(10_000u64)),
            paymaster_data: Some(bytes!("0x1234")),
            signature: Bytes::new(),
        }
    }

    #[test]
    fn pack_unpack_round_trips() {
        let op = fixture();
        let packed = pack(&op).unwrap();
        let back = unpack(&packed).unwrap();
        assert_eq!(op, back);
    }

    #[test]
    fn pack_unpack_round_trips_without_factory_or_paymaster() {
        let mut op = fixture();
        op.factory = None;
        op.factory_data = None;
        op.paymaster = None;
        op.paymaster_verification_gas_limit = None;
        op.paymaster_post_op_gas_limit = None;
        op.paymaster_data = None;
        let packed = pack(&op).unwrap();
        let back = unpack(&packed).unwrap();
        assert_eq!(op, back);
    }

    #[test]
    fn account_gas_limits_pack_verification_then_call() {
        let op = fixture();
        let packed = pack(&op).unwrap();
        let (v, c) = unpack_two_u128(&packed.account_gas_limits);
        assert_eq!(v, op.verification_gas_limit);
        assert_eq!(c, op.call_gas_limit);
    }

    #[test]
    fn hash_is_deterministic() {
        let op = fixture();
        let entry_point = address!("0x0000000071727De22E5E9d8BAf0edAc6f37da032");
        let h1 = user_op_hash_v07(&op, entry_point, 1).unwrap();
        let h2 = user_op_hash_v07(&op, entry_point, 1).unwrap();
        assert_eq!(h1, h2);
        let h3 = user_op_hash_v07(&op, entry_point, 2).unwrap();
        assert_ne!(h1, h3);
    }

    #[test]
    fn required_prefund_v06_triples_verification_gas_with_paymaster() {
        let op = UserOperationV06 {
            sender: address!("0x1111111111111111111111111111111111111111"),
            nonce: U256::ZERO,
            init_code: Bytes::new(),
            call_data: Bytes::new(),
            call_gas_limit: U256::from(100u64),
            verification_gas_limit: U256::from(10u64),
            pre_verification_gas: U256::from(5u64),
            max_fee_per_gas: U256::from(1u64),
            max_priority_fee_per_gas: U256::from(1u64),
            paymaster_and_data: bytes!("0xaa"),
            signature: Bytes::new(),
        };
        // (10*3 + 100 + 5) * 1 = 135
        assert_eq!(required_prefund_v06(&op), U256::from(135u64));
    }
}
