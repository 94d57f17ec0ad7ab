//! Message hashing: EIP-191 personal/raw hashing and the full EIP-712
//! typed-data pipeline, built on a dynamic tagged-union value model rather
//! than compile-time traits, since account families construct typed data
//! whose shape (Safe's `SafeOp`, Kernel's wrapper, Light's message) isn't
//! known until runtime.

use crate::abi::{encode_address, encode_uint256};
use crate::error::{Error, Result};
use alloy_primitives::{Address, U256, keccak256};
use std::collections::BTreeSet;

/// keccak256 of arbitrary bytes.
fn keccak(data: &[u8]) -> [u8; 32] {
    keccak256(data).0
}

/// EIP-191 personal-message hash: `keccak("\x19Ethereum Signed Message:\n" ||
/// ascii(len(m)) || m)`.
pub fn hash_personal_message(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut buf = Vec::with_capacity(prefix.len() + message.len());
    buf.extend_from_slice(prefix.as_bytes());
    buf.extend_from_slice(message);
    keccak(&buf)
}

/// EIP-191 raw hash: treats a 32-byte hash as the message body (used by
/// Kernel v0.3 operation signing).
pub fn hash_raw_191(hash: &[u8; 32]) -> [u8; 32] {
    hash_personal_message(hash)
}

/// A typed-data leaf value (EIP-712). Dynamic tagged union: callers build
/// values through these constructors rather than passing untyped maps, but
/// the shape of a struct (field names, nesting) is only known at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    Uint(U256),
    /// Signed integer: absolute magnitude plus a `true` flag for negative
    /// values. Encoded to two's complement in [`encode_value`].
    Int(U256, bool),
    Bool(bool),
    Addr(Address),
    Bytes(Vec<u8>),
    BytesN(usize, [u8; 32]),
    Str(String),
    Array(Vec<TypedValue>),
    Struct(Vec<(String, TypedValue)>),
}

/// A named field within a type definition: `(name, solidity_type)`, e.g.
/// `("owner", "address")` or `("calls", "Call[]")`.
pub type FieldDef = (String, String);

/// The full type table for an EIP-712 message: every type name (including the
/// primary type) mapped to its ordered field list.
pub type TypeTable = std::collections::BTreeMap<String, Vec<FieldDef>>;

/// EIP-712 domain; only non-`None` fields participate in the domain type
/// string and encoding, per the canonical field order `name, version,
/// chainId, verifyingContract, salt`.
#[derive(Debug, Clone, Default)]
pub struct Eip712Domain {
    pub name: Option<String>,
    pub version: Option<String>,
    pub chain_id: Option<u64>,
    pub verifying_contract: Option<Address>,
    pub salt: Option<[u8; 32]>,
}

impl Eip712Domain {
    fn present_fields(&self) -> Vec<(&'static str, &'static str)> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push(("name", "string"));
        }
        if self.version.is_some() {
            fields.push(("version", "string"));
        }
        if self.chain_id.is_some() {
            fields.push(("chainId", "uint256"));
        }
        if self.verifying_contract.is_some() {
            fields.push(("verifyingContract", "address"));
        }
        if self.salt.is_some() {
            fields.push(("salt", "bytes32"));
        }
        fields
    }

    /// Computes the EIP-712 domain separator.
    pub fn separator(&self) -> [u8; 32] {
        let fields = self.present_fields();
        let type_string = encode_type_string("EIP712Domain", &fields);
        let type_hash = keccak(type_string.as_bytes());

        let mut words = vec![type_hash];
        if let Some(name) = &self.name {
            words.push(keccak(name.as_bytes()));
        }
        if let Some(version) = &self.version {
            words.push(keccak(version.as_bytes()));
        }
        if let Some(chain_id) = self.chain_id {
            words.push(encode_uint256(U256::from(chain_id)));
        }
        if let Some(verifying_contract) = self.verifying_contract {
            words.push(encode_address(verifying_contract));
        }
        if let Some(salt) = self.salt {
            words.push(salt);
        }

        let mut buf = Vec::with_capacity(words.len() * 32);
        for w in &words {
            buf.extend_from_slice(w);
        }
        keccak(&buf)
    }
}

/// Builds the `Primary(type1 name1,type2 name2,...)` string for one type,
/// given its field list.
fn encode_type_string(name: &str, fields: &[(&str, &str)]) -> String {
    let body = fields.iter().map(|(n, t)| format!("{t} {n}")).collect::<Vec<_>>().join(",");
    format!("{name}({body})")
}

/// Recursively discovers every custom type referenced (directly or through
/// arrays) from `fields`, excluding `primary` itself, and returns them sorted
/// alphabetically. A type name is "custom" if it appears as a key in `types`.
fn referenced_types(primary: &str, types: &TypeTable) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut frontier = vec![primary.to_string()];
    while let Some(current) = frontier.pop() {
        let Some(fields) = types.get(&current) else { continue };
        for (_, ty) in fields {
            let base = strip_array_suffix(ty);
            if types.contains_key(base) && seen.insert(base.to_string()) {
                frontier.push(base.to_string());
            }
        }
    }
    seen.remove(primary);
    seen.into_iter().collect()
}

fn strip_array_suffix(ty: &str) -> &str {
    ty.split_once('[').map(|(base, _)| base).unwrap_or(ty)
}

/// `encode_type` per EIP-712: the primary type's definition, followed by
/// every referenced custom type (alphabetically sorted, primary excluded).
pub fn encode_type(primary: &str, types: &TypeTable) -> Result<String> {
    let primary_fields = types
        .get(primary)
        .ok_or_else(|| Error::bad_input(format!("unknown primary type '{primary}'")))?;
    let mut s = encode_type_string(
        primary,
        &primary_fields.iter().map(|(n, t)| (n.as_str(), t.as_str())).collect::<Vec<_>>(),
    );
    for name in referenced_types(primary, types) {
        let fields = &types[&name];
        s.push_str(&encode_type_string(
            &name,
            &fields.iter().map(|(n, t)| (n.as_str(), t.as_str())).collect::<Vec<_>>(),
        ));
    }
    Ok(s)
}

/// `type_hash` = `keccak(encode_type(type))`.
pub fn type_hash(primary: &str, types: &TypeTable) -> Result<[u8; 32]> {
    Ok(keccak(encode_type(primary, types)?.as_bytes()))
}

/// Encodes one field value per EIP-712's atomic-encoding rules: `bytes` and
/// `string` are hashed to a 32-byte word, structs are hashed recursively via
/// `hash_struct`, arrays are encoded element-wise then hashed as a whole.
fn encode_value(ty: &str, value: &TypedValue, types: &TypeTable) -> Result<[u8; 32]> {
    if let Some(base) = ty.strip_suffix("[]") {
        let TypedValue::Array(items) = value else {
            return Err(Error::bad_input(format!("expected array value for type '{ty}'")));
        };
        let mut buf = Vec::with_capacity(items.len() * 32);
        for item in items {
            buf.extend_from_slice(&encode_value(base, item, types)?);
        }
        return Ok(keccak(&buf));
    }

    if types.contains_key(ty) {
        let TypedValue::Struct(_) = value else {
            return Err(Error::bad_input(format!("expected struct value for type '{ty}'")));
        };
        return hash_struct(ty, value, types);
    }

    match (ty, value) {
        ("string", TypedValue::Str(s)) => Ok(keccak(s.as_bytes())),
        ("bytes", TypedValue::Bytes(b)) => Ok(keccak(b)),
        ("bool", TypedValue::Bool(b)) => {
            let mut w = [0u8; 32];
            w[31] = *b as u8;
            Ok(w)
        }
        ("address", TypedValue::Addr(a)) => Ok(encode_address(*a)),
        (t, TypedValue::Uint(n)) if t.starts_with("uint") => Ok(encode_uint256(*n)),
        (t, TypedValue::Int(n, negative)) if t.starts_with("int") => {
            if *negative {
                Ok(encode_uint256(U256::MAX - *n + U256::from(1u64)))
            } else {
                Ok(encode_uint256(*n))
            }
        }
        (t, TypedValue::BytesN(_, b)) if t.starts_with("bytes") && t != "bytes" => {
            // Stored as a right-padded 32-byte word already; EIP-712 encodes
            // bytesN verbatim, unlike dynamic `bytes` which is hashed.
            Ok(*b)
        }
        _ => Err(Error::bad_input(format!("type/value mismatch for '{ty}'"))),
    }
}

/// `hash_struct(type, value)` = `keccak(type_hash || encode_data(value))`.
pub fn hash_struct(primary: &str, value: &TypedValue, types: &TypeTable) -> Result<[u8; 32]> {
    let TypedValue::Struct(fields) = value else {
        return Err(Error::bad_input("hash_struct requires a Struct value"));
    };
    let field_defs = types
        .get(primary)
        .ok_or_else(|| Error::bad_input(format!("unknown type '{primary}'")))?;

    let th = type_hash(primary, types)?;
    let mut buf = Vec::with_capacity(32 * (1 + field_defs.len()));
    buf.extend_from_slice(&th);

    for (field_name, field_ty) in field_defs {
        let (_, field_value) = fields
            .iter()
            .find(|(n, _)| n == field_name)
            .ok_or_else(|| Error::bad_input(format!("missing field '{field_name}' in struct")))?;
        buf.extend_from_slice(&encode_value(field_ty, field_value, types)?);
    }

    Ok(keccak(&buf))
}

/// Full EIP-712 digest: `keccak(0x19 0x01 || domain_separator ||
/// hash_struct(primary, message))`.
pub fn hash_typed_data(
    domain: &Eip712Domain,
    primary: &str,
    message: &TypedValue,
    types: &TypeTable,
) -> Result<[u8; 32]> {
    let domain_separator = domain.separator();
    let struct_hash = hash_struct(primary, message, types)?;

    let mut buf = Vec::with_capacity(2 + 32 + 32);
    buf.push(0x19);
    buf.push(0x01);
    buf.extend_from_slice(&domain_separator);
    buf.extend_from_slice(&struct_hash);
    Ok(keccak(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, hex};

    #[test]
    fn negative_int_encodes_to_twos_complement() {
        let mut types = TypeTable::new();
        types.insert("Msg".to_string(), vec![("value".to_string(), "int256".to_string())]);

        let positive = TypedValue::Struct(vec![("value".to_string(), TypedValue::Int(U256::from(7u64), false))]);
        let negative = TypedValue::Struct(vec![("value".to_string(), TypedValue::Int(U256::from(7u64), true))]);

        let h_pos = hash_struct("Msg", &positive, &types).unwrap();
        let h_neg = hash_struct("Msg", &negative, &types).unwrap();
        assert_ne!(h_pos, h_neg);

        let encoded_neg = encode_value("int256", &TypedValue::Int(U256::from(7u64), true), &types).unwrap();
        assert_eq!(U256::from_be_bytes::<32>(encoded_neg), U256::MAX - U256::from(6u64));
    }

    #[test]
    fn personal_hash_matches_known_literal() {
        let h = hash_personal_message(b"Hello, World!");
        assert_eq!(
            hex::encode(h),
            "c8ee0d506e864589b799a645ddb88b08f5d39e8049f9f702b3b61fa15e55fc7"
        );
    }

    #[test]
    fn encode_type_sorts_referenced_types_alphabetically() {
        let mut types = TypeTable::new();
        types.insert(
            "Mail".to_string(),
            vec![("from".to_string(), "Person".to_string()), ("to".to_string(), "Person".to_string())],
        );
        types.insert(
            "Person".to_string(),
            vec![("name".to_string(), "string".to_string()), ("wallet".to_string(), "address".to_string())],
        );
        let s = encode_type("Mail", &types).unwrap();
        assert_eq!(s, "Mail(Person from,Person to)Person(string name,address wallet)");
    }

    #[test]
    fn typed_data_hash_is_deterministic_and_field_sensitive() {
        let domain = Eip712Domain {
            name: Some("Test".to_string()),
            version: Some("1".to_string()),
            chain_id: Some(1),
            verifying_contract: Some(address!("0x1111111111111111111111111111111111111111")),
            salt: None,
        };
        let mut types = TypeTable::new();
        types.insert("Msg".to_string(), vec![("value".to_string(), "uint256".to_string())]);
        let msg = TypedValue::Struct(vec![("value".to_string(), TypedValue::Uint(U256::from(7u64)))]);

        let h1 = hash_typed_data(&domain, "Msg", &msg, &types).unwrap();
        let h2 = hash_typed_data(&domain, "Msg", &msg, &types).unwrap();
        assert_eq!(h1, h2);

        let mut types2 = types.clone();
        types2.get_mut("Msg").unwrap().push(("extra".to_string(), "bool".to_string()));
        let msg2 = TypedValue::Struct(vec![
            ("value".to_string(), TypedValue::Uint(U256::from(7u64))),
            ("extra".to_string(), TypedValue::Bool(true)),
        ]);
        let h3 = hash_typed_data(&domain, "Msg", &msg2, &types2).unwrap();
        assert_ne!(h1, h3);
    }

    #[test]
    fn domain_separator_omits_absent_fields() {
        let full = Eip712Domain {
            name: Some("A".to_string()),
            version: None,
            chain_id: Some(1),
            verifying_contract: None,
            salt: None,
        };
        // Should not panic and should differ from an all-fields domain.
        let other = Eip712Domain {
            name: Some("A".to_string()),
            version: Some("1".to_string()),
            chain_id: Some(1),
            verifying_contract: None,
            salt: None,
        };
        assert_ne!(full.separator(), other.separator());
    }
}
