//! ERC-7579 execution-mode/calldata codec: `ExecutionMode` layout,
//! single/batch execute encoding, module-management selectors, and
//! nonce-key helpers.

use crate::abi::{AbiPart, encode_address, encode_bytes, encode_uint256, encode_with_dynamics};
use crate::error::{Error, Result};
use crate::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256};

/// `execute(bytes32,bytes)` selector.
pub const EXECUTE_SELECTOR: [u8; 4] = [0xe9, 0xae, 0x5c, 0x53];
pub const INSTALL_MODULE_SELECTOR: [u8; 4] = [0x95, 0x17, 0xe2, 0x9f];
pub const UNINSTALL_MODULE_SELECTOR: [u8; 4] = [0xa4, 0xd6, 0xf1, 0xd2];
pub const IS_MODULE_INSTALLED_SELECTOR: [u8; 4] = [0x6d, 0x61, 0xfe, 0x70];
pub const SUPPORTS_MODULE_SELECTOR: [u8; 4] = [0x12, 0xd7, 0x9d, 0xa3];
pub const ACCOUNT_ID_SELECTOR: [u8; 4] = [0x7b, 0x60, 0x42, 0x4a];
pub const SUPPORTS_EXECUTION_MODE_SELECTOR: [u8; 4] = [0xd0, 0x3c, 0x79, 0x14];

/// The execution call kind, byte 0 of [`ExecutionMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Single,
    Batch,
    Delegate,
}

impl CallKind {
    fn byte(self) -> u8 {
        match self {
            Self::Single => 0x00,
            Self::Batch => 0x01,
            Self::Delegate => 0xff,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0x00 => Ok(Self::Single),
            0x01 => Ok(Self::Batch),
            0xff => Ok(Self::Delegate),
            other => Err(Error::validation(format!("unknown ERC-7579 call kind 0x{other:02x}"))),
        }
    }
}

/// `(callKind, revertOnError, selector?, context?)`, a 32-byte value with
/// layout `[callKind, execType, 4 zeros, selector(4B), context(22B)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMode {
    pub call_kind: CallKind,
    pub revert_on_error: bool,
    pub selector: Option<[u8; 4]>,
    pub context: Option<[u8; 22]>,
}

impl ExecutionMode {
    pub fn single(revert_on_error: bool) -> Self {
        Self { call_kind: CallKind::Single, revert_on_error, selector: None, context: None }
    }

    pub fn batch(revert_on_error: bool) -> Self {
        Self { call_kind: CallKind::Batch, revert_on_error, selector: None, context: None }
    }

    /// Encodes to the 32-byte wire form. Selector/context are truncated to
    /// their declared widths if the caller supplies wider data.
    pub fn encode(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[0] = self.call_kind.byte();
        out[1] = if self.revert_on_error { 0x00 } else { 0x01 };
        if let Some(sel) = self.selector {
            out[6..10].copy_from_slice(&sel);
        }
        if let Some(ctx) = self.context {
            out[10..32].copy_from_slice(&ctx);
        }
        out
    }

    pub fn decode(word: &[u8; 32]) -> Result<Self> {
        let call_kind = CallKind::from_byte(word[0])?;
        let revert_on_error = word[1] == 0x00;
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&word[6..10]);
        let selector = if selector == [0u8; 4] { None } else { Some(selector) };
        let mut context = [0u8; 22];
        context.copy_from_slice(&word[10..32]);
        let context = if context == [0u8; 22] { None } else { Some(context) };
        Ok(Self { call_kind, revert_on_error, selector, context })
    }
}

/// Packed single-call execution payload: `to:20 || value:32 || data:var`.
pub fn encode_single_call(call: &Call) -> Vec<u8> {
    let mut out = Vec::with_capacity(20 + 32 + call.data.len());
    out.extend_from_slice(call.to.as_slice());
    out.extend_from_slice(&encode_uint256(call.value));
    out.extend_from_slice(&call.data);
    out
}

pub fn decode_single_call(payload: &[u8]) -> Result<Call> {
    if payload.len() < 52 {
        return Err(Error::validation("single-call payload shorter than 52 bytes"));
    }
    let to = Address::from_slice(&payload[..20]);
    let value = U256::from_be_slice(&payload[20..52]);
    let data = Bytes::from(payload[52..].to_vec());
    Ok(Call { to, value, data })
}

/// ABI-encodes `Execution[]` for the batch execution payload: a top-level
/// array whose elements are `(address to, uint256 value, bytes data)`
/// structs, each with its own `bytes` offset fixed at `96` (three static
/// words per struct: `to`, `value`, `bytes_offset`).
fn encode_batch_calls(calls: &[Call]) -> Result<Vec<u8>> {
    let mut struct_parts = Vec::with_capacity(calls.len());
    for call in calls {
        let mut body = Vec::with_capacity(96);
        body.extend_from_slice(&encode_address(call.to));
        body.extend_from_slice(&encode_uint256(call.value));
        body.extend_from_slice(&encode_uint256(U256::from(96u64)));
        body.extend_from_slice(&encode_bytes(&call.data));
        struct_parts.push(body);
    }

    // array length word, then one offset per element (measured from right
    // after the offsets block), then each struct body in order.
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

    encode_with_dynamics(&[AbiPart::dynamic(array_encoding)])
}

/// `execute(bytes32 mode, bytes data)`: selector || mode || offset=64 ||
/// `encode_bytes(executionPayload)`. A single-element batch is encoded as a
/// `Single` execution, since that's cheaper for the on-chain executor to
/// dispatch than a one-element batch.
pub fn encode_execute(mode: &ExecutionMode, calls: &[Call]) -> Result<Vec<u8>> {
    if calls.is_empty() {
        return Err(Error::bad_input("encode_execute requires at least one call"));
    }

    let (effective_mode, payload) = if calls.len() == 1 {
        let single_mode = ExecutionMode {
            call_kind: CallKind::Single,
            revert_on_error: mode.revert_on_error,
            selector: mode.selector,
            context: mode.context,
        };
        (single_mode, encode_single_call(&calls[0]))
    } else {
        (mode.clone(), encode_batch_calls(calls)?)
    };

    let mut out = Vec::with_capacity(4 + 32 + 32 + payload.len());
    out.extend_from_slice(&EXECUTE_SELECTOR);
    out.extend_from_slice(&effective_mode.encode());
    out.extend_from_slice(&encode_uint256(U256::from(64u64)));
    out.extend_from_slice(&encode_bytes(&payload));
    Ok(out)
}

/// Decodes `execute(bytes32,bytes)` calldata back into `(mode, calls)`.
pub fn decode_execute(calldata: &[u8]) -> Result<(ExecutionMode, Vec<Call>)> {
    if calldata.len() < 4 || calldata[..4] != EXECUTE_SELECTOR {
        return Err(Error::validation("calldata does not start with the execute selector"));
    }
    if calldata.len() < 4 + 64 {
        return Err(Error::validation("execute calldata truncated before mode/offset"));
    }
    let mut mode_word = [0u8; 32];
    mode_word.copy_from_slice(&calldata[4..36]);
    let mode = ExecutionMode::decode(&mode_word)?;

    let data_offset = U256::from_be_slice(&calldata[36..68]);
    let data_offset: usize = data_offset
        .try_into()
        .map_err(|_| Error::validation("execute data offset overflows usize"))?;
    let body = &calldata[4..];
    if body.len() < data_offset + 32 {
        return Err(Error::validation("execute calldata truncated before payload length"));
    }
    let len = U256::from_be_slice(&body[data_offset..data_offset + 32]);
    let len: usize = len.try_into().map_err(|_| Error::validation("execute payload length overflows usize"))?;
    let payload_start = data_offset + 32;
    if body.len() < payload_start + len {
        return Err(Error::validation("execute calldata truncated before payload data"));
    }
    let payload = &body[payload_start..payload_start + len];

    let calls = match mode.call_kind {
        CallKind::Single => vec![decode_single_call(payload)?],
        CallKind::Batch => decode_batch_calls(payload)?,
        CallKind::Delegate => return Err(Error::validation("delegate call kind has no call list")),
    };
    Ok((mode, calls))
}

fn decode_batch_calls(payload: &[u8]) -> Result<Vec<Call>> {
    // `payload` is `encode_with_dynamics`'s output for one dynamic part: a
    // 32-byte offset pointer (always 32) followed by the array encoding
    // itself (length, then one offset per element, then struct bodies).
    if payload.len() < 32 {
        return Err(Error::validation("batch payload truncated before top-level offset"));
    }
    let top_offset = U256::from_be_slice(&payload[..32]);
    let top_offset: usize =
        top_offset.try_into().map_err(|_| Error::validation("batch top-level offset overflows usize"))?;
    let array = payload
        .get(top_offset..)
        .ok_or_else(|| Error::validation("batch top-level offset out of range"))?;

    if array.len() < 32 {
        return Err(Error::validation("batch payload truncated before array length"));
    }
    let count = U256::from_be_slice(&array[..32]);
    let count: usize = count.try_into().map_err(|_| Error::validation("batch array length overflows usize"))?;

    let mut calls = Vec::with_capacity(count);
    for i in 0..count {
        let offset_slot = 32 + i * 32;
        if array.len() < offset_slot + 32 {
            return Err(Error::validation("batch payload truncated in offsets block"));
        }
        let rel_offset = U256::from_be_slice(&array[offset_slot..offset_slot + 32]);
        let rel_offset: usize =
            rel_offset.try_into().map_err(|_| Error::validation("batch element offset overflows usize"))?;
        let elem_start = 32 + rel_offset;
        let payload = array;
        if payload.len() < elem_start + 96 {
            return Err(Error::validation("batch element truncated before bytes offset"));
        }
        let to = Address::from_slice(&payload[elem_start..elem_start + 20]);
        let value = U256::from_be_slice(&payload[elem_start + 20..elem_start + 52]);
        // payload[elem_start+64..elem_start+96] is the fixed bytes_offset=96, skip it.
        let data_start = elem_start + 96;
        if payload.len() < data_start + 32 {
            return Err(Error::validation("batch element truncated before data length"));
        }
        let data_len = U256::from_be_slice(&payload[data_start..data_start + 32]);
        let data_len: usize =
            data_len.try_into().map_err(|_| Error::validation("batch element data length overflows usize"))?;
        let data_body_start = data_start + 32;
        if payload.len() < data_body_start + data_len {
            return Err(Error::validation("batch element data truncated"));
        }
        let data = Bytes::from(payload[data_body_start..data_body_start + data_len].to_vec());
        calls.push(Call { to, value, data });
    }
    Ok(calls)
}

/// `encode_nonce(key, seq) = (key mod 2^192) << 64 | (seq mod 2^64)`.
pub fn encode_nonce(key: U256, seq: U256) -> U256 {
    let key_mod = key & ((U256::from(1u64) << 192) - U256::from(1u64));
    let seq_mod = seq & ((U256::from(1u64) << 64) - U256::from(1u64));
    (key_mod << 64) | seq_mod
}

/// `decode_nonce(n) = (n >> 64, n mod 2^64)`.
pub fn decode_nonce(n: U256) -> (U256, U256) {
    let seq = n & ((U256::from(1u64) << 64) - U256::from(1u64));
    let key = n >> 64;
    (key, seq)
}

/// Builds the structured nonce key used by Kernel v0.3 / Nexus / EIP-7702
/// Kernel: `[mode=0x00, type=0x00, validatorAddress:20, salt:16]` packed
/// into the low 192 bits.
pub fn structured_nonce_key(validator: Address, salt: u16) -> U256 {
    let mut bytes = [0u8; 24];
    // bytes[0..2] = mode/type, both 0x00; bytes[2..22] = validator; bytes[22..24] = salt.
    bytes[2..22].copy_from_slice(validator.as_slice());
    bytes[22..24].copy_from_slice(&salt.to_be_bytes());
    U256::from_be_slice(&bytes[..24]) & ((U256::from(1u64) << 192) - U256::from(1u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, bytes};

    #[test]
    fn execution_mode_layout_is_32_bytes_and_byte0_is_call_kind() {
        let mode = ExecutionMode::single(true);
        let encoded = mode.encode();
        assert_eq!(encoded.len(), 32);
        assert_eq!(encoded[0], 0x00);
        assert_eq!(encoded[1], 0x00);

        let mode = ExecutionMode::batch(false);
        let encoded = mode.encode();
        assert_eq!(encoded[0], 0x01);
        assert_eq!(encoded[1], 0x01);
    }

    #[test]
    fn selectors_match_known_values() {
        assert_eq!(EXECUTE_SELECTOR, [0xe9, 0xae, 0x5c, 0x53]);
        assert_eq!(INSTALL_MODULE_SELECTOR, [0x95, 0x17, 0xe2, 0x9f]);
        assert_eq!(UNINSTALL_MODULE_SELECTOR, [0xa4, 0xd6, 0xf1, 0xd2]);
    }

    #[test]
    fn single_element_batch_round_trips_as_single() {
        let call = Call {
            to: address!("0x1111111111111111111111111111111111111111"),
            value: U256::from(1u64),
            data: bytes!("0xabcdef"),
        };
        let mode = ExecutionMode::batch(true);
        let calldata = encode_execute(&mode, std::slice::from_ref(&call)).unwrap();
        let (decoded_mode, calls) = decode_execute(&calldata).unwrap();
        assert_eq!(decoded_mode.call_kind, CallKind::Single);
        assert_eq!(calls, vec![call]);
    }

    #[test]
    fn batch_round_trip() {
        let calls = vec![
            Call { to: address!("0x1111111111111111111111111111111111111111"), value: U256::ZERO, data: bytes!("0x01") },
            Call { to: address!("0x2222222222222222222222222222222222222222"), value: U256::from(7u64), data: bytes!("0x0203") },
        ];
        let mode = ExecutionMode::batch(true);
        let calldata = encode_execute(&mode, &calls).unwrap();
        let (decoded_mode, decoded_calls) = decode_execute(&calldata).unwrap();
        assert_eq!(decoded_mode.call_kind, CallKind::Batch);
        assert_eq!(decoded_calls, calls);
    }

    #[test]
    fn nonce_round_trip() {
        let key = U256::from(0xabcdefu64);
        let seq = U256::from(42u64);
        let n = encode_nonce(key, seq);
        assert_eq!(decode_nonce(n), (key, seq));
    }

    #[test]
    fn encode_execute_rejects_empty_calls() {
        assert!(encode_execute(&ExecutionMode::single(true), &[]).is_err());
    }

    #[test]
    fn decode_execute_rejects_wrong_selector() {
        assert!(decode_execute(&[0u8; 68]).is_err());
    }
}
