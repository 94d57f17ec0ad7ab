//! EIP-7702 authorization: signed `(chainId, contractAddress, nonce)` tuple,
//! RLP-list encoding, magic byte `0x05`, raw-hash signing.

use crate::abi::keccak;
use crate::owner::Owner;
use alloy_primitives::Address;

const MAGIC: u8 = 0x05;

/// A signed EIP-7702 authorization tuple, ready to hand to the bundler's
/// off-chain submission path (the core only produces the signed value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAuthorization {
    pub chain_id: u64,
    pub contract_address: Address,
    pub nonce: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub y_parity: u8,
}

/// Minimal big-endian RLP item encoding: `n < 0x80` encodes as itself;
/// otherwise a length-prefixed big-endian byte string. Leading zero bytes
/// are stripped, matching RLP's canonical integer encoding.
fn rlp_uint(n: u64) -> Vec<u8> {
    if n == 0 {
        return vec![0x80];
    }
    let bytes = n.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap();
    let trimmed = &bytes[first_nonzero..];
    if trimmed.len() == 1 && trimmed[0] < 0x80 {
        trimmed.to_vec()
    } else {
        rlp_string(trimmed)
    }
}

fn rlp_string(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return data.to_vec();
    }
    let mut out = rlp_length_prefix(data.len(), 0x80);
    out.extend_from_slice(data);
    out
}

fn rlp_length_prefix(len: usize, short_base: u8) -> Vec<u8> {
    if len <= 55 {
        vec![short_base + len as u8]
    } else {
        let len_bytes = len.to_be_bytes();
        let first_nonzero = len_bytes.iter().position(|b| *b != 0).unwrap_or(len_bytes.len() - 1);
        let trimmed = &len_bytes[first_nonzero..];
        let mut out = vec![short_base + 55 + trimmed.len() as u8];
        out.extend_from_slice(trimmed);
        out
    }
}

fn rlp_address(a: Address) -> Vec<u8> {
    rlp_string(a.as_slice())
}

/// RLP-encodes a list of already-RLP-encoded items.
fn rlp_list(items: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = items.iter().flatten().copied().collect();
    let mut out = rlp_length_prefix(body.len(), 0xc0);
    out.extend_from_slice(&body);
    out
}

/// `digest = keccak(0x05 || rlp([chainId, contractAddress, nonce]))`.
pub fn authorization_digest(chain_id: u64, contract_address: Address, nonce: u64) -> [u8; 32] {
    let list = rlp_list(&[rlp_uint(chain_id), rlp_address(contract_address), rlp_uint(nonce)]);
    let mut buf = Vec::with_capacity(1 + list.len());
    buf.push(MAGIC);
    buf.extend_from_slice(&list);
    keccak(&buf)
}

/// Signs an EIP-7702 authorization tuple with `owner`'s raw-hash signer
/// (no EIP-191 prefix) and normalizes `v` to `yParity ∈ {0, 1}`.
pub fn sign_authorization(
    owner: &dyn Owner,
    chain_id: u64,
    contract_address: Address,
    nonce: u64,
) -> crate::error::Result<SignedAuthorization> {
    let digest = authorization_digest(chain_id, contract_address, nonce);
    let sig = owner.sign_raw_hash(digest)?;
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&sig[0..32]);
    s.copy_from_slice(&sig[32..64]);
    let v = sig[64];
    let y_parity = if v >= 27 { v - 27 } else { v };

    Ok(SignedAuthorization { chain_id, contract_address, nonce, r, s, y_parity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::LocalOwner;
    use alloy_primitives::address;

    #[test]
    fn rlp_uint_matches_known_encodings() {
        assert_eq!(rlp_uint(0), vec![0x80]);
        assert_eq!(rlp_uint(1), vec![0x01]);
        assert_eq!(rlp_uint(127), vec![0x7f]);
        assert_eq!(rlp_uint(128), vec![0x81, 0x80]);
        assert_eq!(rlp_uint(256), vec![0x82, 0x01, 0x00]);
    }

    #[test]
    fn digest_is_deterministic_and_input_sensitive() {
        let addr = address!("0x1111111111111111111111111111111111111111");
        let d1 = authorization_digest(1, addr, 0);
        let d2 = authorization_digest(1, addr, 0);
        assert_eq!(d1, d2);
        let d3 = authorization_digest(1, addr, 1);
        assert_ne!(d1, d3);
    }

    #[test]
    fn sign_authorization_normalizes_y_parity() {
        let owner = LocalOwner::from_bytes(&[0x42; 32]).unwrap();
        let addr = address!("0x2222222222222222222222222222222222222222");
        let signed = sign_authorization(&owner, 1, addr, 0).unwrap();
        assert!(signed.y_parity == 0 || signed.y_parity == 1);
    }
}
