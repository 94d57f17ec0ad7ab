//! Hex/bytes primitives: fixed-length big-integer <-> hex conversion with
//! left/right padding, `0x` tolerant decode, slicing and concatenation.

use crate::error::{Error, Result};
use alloy_primitives::{U256, hex};

/// Strips a leading `0x`/`0X` prefix if present; otherwise returns the input.
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

/// Ensures `s` has a `0x` prefix, adding one if absent.
pub fn with_0x(s: &str) -> String {
    if s.starts_with("0x") || s.starts_with("0X") {
        s.to_string()
    } else {
        format!("0x{s}")
    }
}

/// Decodes a hex string into bytes, tolerating a missing `0x` prefix and an
/// odd number of nibbles (left-padded with an implicit zero nibble).
pub fn hex_decode(s: &str) -> Result<Vec<u8>> {
    let stripped = strip_0x(s);
    let padded;
    let even = if stripped.len() % 2 == 1 {
        padded = format!("0{stripped}");
        padded.as_str()
    } else {
        stripped
    };
    hex::decode(even).map_err(|e| Error::bad_input(format!("invalid hex '{s}': {e}")))
}

/// Encodes bytes as a `0x`-prefixed lowercase hex string.
pub fn hex_from_bytes(b: &[u8]) -> String {
    format!("0x{}", hex::encode(b))
}

/// Left-pads (zero-extends on the left, i.e. big-endian numeric padding) a hex
/// string's byte representation to `byte_len` bytes. Errors if the input is
/// already longer than `byte_len` bytes.
pub fn pad_left(s: &str, byte_len: usize) -> Result<String> {
    let bytes = hex_decode(s)?;
    if bytes.len() > byte_len {
        return Err(Error::bad_input(format!(
            "value is {} bytes, exceeds pad width {byte_len}",
            bytes.len()
        )));
    }
    let mut out = vec![0u8; byte_len - bytes.len()];
    out.extend_from_slice(&bytes);
    Ok(hex_from_bytes(&out))
}

/// Right-pads (zero-extends on the right) a hex string's byte representation
/// to `byte_len` bytes. Errors if the input is already longer than `byte_len`
/// bytes.
pub fn pad_right(s: &str, byte_len: usize) -> Result<String> {
    let mut bytes = hex_decode(s)?;
    if bytes.len() > byte_len {
        return Err(Error::bad_input(format!(
            "value is {} bytes, exceeds pad width {byte_len}",
            bytes.len()
        )));
    }
    bytes.resize(byte_len, 0u8);
    Ok(hex_from_bytes(&bytes))
}

/// Converts a non-negative integer to a `0x`-prefixed, big-endian hex string
/// exactly `byte_len` bytes (`2 * byte_len` hex nibbles) wide. Fails if `n`
/// does not fit in `byte_len` bytes.
pub fn hex_from_uint(n: U256, byte_len: usize) -> Result<String> {
    let full = n.to_be_bytes::<32>();
    if byte_len > 32 {
        return Err(Error::bad_input("byte_len exceeds U256 width"));
    }
    let overflow_region = &full[..32 - byte_len];
    if overflow_region.iter().any(|b| *b != 0) {
        return Err(Error::bad_input(format!(
            "{n} does not fit in {byte_len} bytes"
        )));
    }
    Ok(hex_from_bytes(&full[32 - byte_len..]))
}

/// Parses a hex string (tolerant of a missing `0x` prefix) as a big-endian
/// unsigned integer.
pub fn hex_to_uint(s: &str) -> Result<U256> {
    let bytes = hex_decode(s)?;
    if bytes.len() > 32 {
        return Err(Error::bad_input("value exceeds 256 bits"));
    }
    Ok(U256::from_be_slice(&bytes))
}

/// Returns the number of bytes represented by a hex string (tolerant of a
/// missing `0x` prefix).
pub fn byte_len_of_hex(s: &str) -> Result<usize> {
    Ok(hex_decode(s)?.len())
}

/// Concatenates the raw bytes of several `0x`-prefixed (or bare) hex strings.
pub fn concat_hex(parts: &[&str]) -> Result<String> {
    let mut out = Vec::new();
    for p in parts {
        out.extend_from_slice(&hex_decode(p)?);
    }
    Ok(hex_from_bytes(&out))
}

/// Returns the `len`-byte slice of `s` starting at byte offset `start`.
pub fn slice_hex(s: &str, start: usize, len: usize) -> Result<String> {
    let bytes = hex_decode(s)?;
    if start + len > bytes.len() {
        return Err(Error::bad_input(format!(
            "slice [{start}, {}) out of range for {}-byte input",
            start + len,
            bytes.len()
        )));
    }
    Ok(hex_from_bytes(&bytes[start..start + len]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip_uint() {
        for (n, k) in [(0u64, 1usize), (1, 1), (255, 1), (256, 2), (65535, 2), (65536, 3)] {
            let encoded = hex_from_uint(U256::from(n), k).unwrap();
            assert_eq!(encoded.len(), 2 + 2 * k);
            assert_eq!(hex_to_uint(&encoded).unwrap(), U256::from(n));
        }
    }

    #[test]
    fn hex_from_uint_overflow_fails() {
        assert!(hex_from_uint(U256::from(256u64), 1).is_err());
        assert!(hex_from_uint(U256::from(255u64), 1).is_ok());
    }

    #[test]
    fn strip_and_with_0x_are_inverse_on_prefixed_input() {
        assert_eq!(strip_0x("0xabcd"), "abcd");
        assert_eq!(strip_0x("abcd"), "abcd");
        assert_eq!(with_0x("abcd"), "0xabcd");
        assert_eq!(with_0x("0xabcd"), "0xabcd");
    }

    #[test]
    fn hex_decode_tolerates_missing_prefix_and_odd_length() {
        assert_eq!(hex_decode("0xff").unwrap(), vec![0xff]);
        assert_eq!(hex_decode("ff").unwrap(), vec![0xff]);
        assert_eq!(hex_decode("0xf").unwrap(), vec![0x0f]);
    }

    #[test]
    fn pad_left_and_pad_right() {
        assert_eq!(pad_left("0xabcd", 4).unwrap(), "0x0000abcd");
        assert_eq!(pad_right("0xabcd", 4).unwrap(), "0xabcd0000");
        assert!(pad_left("0xaabbccdd", 2).is_err());
    }

    #[test]
    fn concat_and_slice_hex() {
        let joined = concat_hex(&["0xaa", "0xbb", "0xcc"]).unwrap();
        assert_eq!(joined, "0xaabbcc");
        assert_eq!(slice_hex(&joined, 1, 2).unwrap(), "0xbbcc");
        assert!(slice_hex(&joined, 1, 3).is_err());
    }

    #[test]
    fn byte_len_of_hex_counts_bytes() {
        assert_eq!(byte_len_of_hex("0x").unwrap(), 0);
        assert_eq!(byte_len_of_hex("0xaabbcc").unwrap(), 3);
    }
}
