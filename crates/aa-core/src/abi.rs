//! Solidity ABI encoding primitives: static words for `address`/`uint256`/
//! `bool`/`bytes32`, the dynamic `bytes` encoding, function selectors, and the
//! mixed static/dynamic offset-pointer layout.

use crate::error::{Error, Result};
use alloy_primitives::{Address, Keccak256, U256, keccak256};

const WORD: usize = 32;

/// Rounds `len` up to the next multiple of 32.
fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

/// Encodes an `address` as a 32-byte left-padded word.
pub fn encode_address(a: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(a.as_slice());
    word
}

/// Encodes a `uint256`/`uint128`/`uint48`/... value as a 32-byte big-endian
/// word. The caller is responsible for ensuring `n` fits the declared
/// Solidity width; ABI words are always 32 bytes regardless of the declared
/// width.
pub fn encode_uint256(n: U256) -> [u8; 32] {
    n.to_be_bytes::<32>()
}

/// Encodes a `bool` as a 32-byte word (`0` or `1`).
pub fn encode_bool(b: bool) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[31] = b as u8;
    word
}

/// Encodes a `bytesN` (right-padded) value; accepts input shorter than 32
/// bytes (`b.len() <= 32`).
pub fn encode_bytes32(b: &[u8]) -> Result<[u8; 32]> {
    if b.len() > 32 {
        return Err(Error::bad_input("bytes32 input longer than 32 bytes"));
    }
    let mut word = [0u8; 32];
    word[..b.len()].copy_from_slice(b);
    Ok(word)
}

/// Encodes a dynamic `bytes` value: 32-byte length prefix followed by the
/// data, right-padded to a 32-byte multiple.
pub fn encode_bytes(b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + padded_len(b.len()));
    out.extend_from_slice(&encode_uint256(U256::from(b.len())));
    out.extend_from_slice(b);
    out.resize(32 + padded_len(b.len()), 0u8);
    out
}

/// Computes the 4-byte function selector: the first 4 bytes of
/// `keccak256(signature)`, where `signature` is the canonical ASCII function
/// signature, e.g. `"transfer(address,uint256)"`.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    let hash = hasher.finalize();
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// One parameter to be laid out by [`encode_with_dynamics`]: `is_static`
/// parameters contribute their `payload` directly to the head (and must
/// already be exactly one 32-byte word); dynamic parameters contribute an
/// offset pointer to the head and their `payload` (already ABI-encoded, e.g.
/// via [`encode_bytes`]) to the tail.
#[derive(Debug, Clone)]
pub struct AbiPart {
    pub is_static: bool,
    pub payload: Vec<u8>,
}

impl AbiPart {
    /// A static 32-byte word.
    pub fn static_word(word: [u8; 32]) -> Self {
        Self { is_static: true, payload: word.to_vec() }
    }

    /// A dynamic parameter; `payload` must be a pre-ABI-encoded dynamic value
    /// (e.g. the output of [`encode_bytes`]).
    pub fn dynamic(payload: Vec<u8>) -> Self {
        Self { is_static: false, payload }
    }
}

/// Lays out a mixed sequence of static/dynamic ABI parameters: a static head
/// (one word per parameter, offset pointers for dynamic ones, measured from
/// the start of the parameter block) followed by the dynamic tail in order.
/// Every dynamic segment is padded to a 32-byte boundary by construction
/// (callers must pass already-padded dynamic payloads, as produced by
/// [`encode_bytes`]).
pub fn encode_with_dynamics(parts: &[AbiPart]) -> Result<Vec<u8>> {
    for p in parts {
        if p.is_static && p.payload.len() != WORD {
            return Err(Error::bad_input("static ABI part must be exactly 32 bytes"));
        }
        if !p.is_static && p.payload.len() % WORD != 0 {
            return Err(Error::bad_input("dynamic ABI part must be 32-byte aligned"));
        }
    }

    let head_len = parts.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for p in parts {
        if p.is_static {
            head.extend_from_slice(&p.payload);
        } else {
            let offset = head_len + tail.len();
            head.extend_from_slice(&encode_uint256(U256::from(offset)));
            tail.extend_from_slice(&p.payload);
        }
    }

    let mut out = head;
    out.extend_from_slice(&tail);
    Ok(out)
}

/// Convenience: `keccak256` of arbitrary bytes, re-exported for callers that
/// don't want to depend on `alloy_primitives` directly.
pub fn keccak(data: &[u8]) -> [u8; 32] {
    keccak256(data).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn selectors_match_known_values() {
        assert_eq!(function_selector("approve(address,uint256)"), [0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(function_selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(function_selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn encode_address_left_pads() {
        let a = address!("0x1111111111111111111111111111111111111111");
        let w = encode_address(a);
        assert_eq!(&w[..12], &[0u8; 12]);
        assert_eq!(&w[12..], a.as_slice());
    }

    #[test]
    fn encode_bytes_pads_to_word_multiple() {
        let encoded = encode_bytes(&[1, 2, 3]);
        assert_eq!(encoded.len(), 32 + 32); // len word + one padded word
        assert_eq!(encoded[31], 3); // length = 3
        assert_eq!(&encoded[32..35], &[1, 2, 3]);
        assert!(encoded[35..].iter().all(|b| *b == 0));
    }

    #[test]
    fn encode_bytes32_accepts_short_input() {
        let w = encode_bytes32(&[0xaa, 0xbb]).unwrap();
        assert_eq!(w[0], 0xaa);
        assert_eq!(w[1], 0xbb);
        assert!(w[2..].iter().all(|b| *b == 0));
        assert!(encode_bytes32(&[0u8; 33]).is_err());
    }

    #[test]
    fn encode_with_dynamics_offsets_are_word_aligned_and_measured_from_head() {
        let addr = address!("0x2222222222222222222222222222222222222222");
        let parts = vec![
            AbiPart::static_word(encode_address(addr)),
            AbiPart::dynamic(encode_bytes(b"hello world")),
            AbiPart::static_word(encode_uint256(U256::from(42u64))),
        ];
        let encoded = encode_with_dynamics(&parts).unwrap();
        // head: 3 words; offset for the dynamic param must point past the head.
        let offset = U256::from_be_slice(&encoded[32..64]);
        assert_eq!(offset, U256::from(96u64));
        assert_eq!(encoded.len() % 32, 0);
    }
}
