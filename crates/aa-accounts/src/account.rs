//! The `Account` capability trait shared by every family, the
//! address-resolution policy, and the `AnyAccount` closed-enum dispatcher
//! (enum-over-trait mirrors the `UserOperation::V06(..)/V07(..)`
//! match-based dispatch used for the unpacked operation shapes).

use aa_core::error::{Error, Result};
use aa_core::hash::hash_raw_191;
use aa_core::owner::Owner;
use aa_core::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256, keccak256};
use async_trait::async_trait;

use crate::biconomy_legacy::BiconomyLegacyAccount;
use crate::etherspot::EtherspotAccount;
use crate::kernel_v2::KernelV2Account;
use crate::kernel_v3::KernelV3Account;
use crate::light::LightAccount;
use crate::nexus::NexusAccount;
use crate::safe::SafeAccount;
use crate::simple::SimpleAccount;
use crate::thirdweb::ThirdwebAccount;
use crate::trust_barz::TrustBarzAccount;

/// Which EntryPoint version a family targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPointVersion {
    V06,
    V07,
}

/// External collaborator used only as the last-resort step of address
/// resolution: simulates deployment via
/// `getSenderAddress(initCode, entryPoint)`. Kept as a narrow trait here
/// (rather than depending on `aa-client`) so `aa-accounts` stays a leaf
/// crate; `aa-client`'s `PublicClient` is the concrete implementation a
/// caller plugs in.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn get_sender_address(&self, init_code: &Bytes, entry_point: Address) -> Result<Address>;
}

/// Capability set every account family implements.
pub trait Account {
    /// A caller-supplied address, if one was given at construction time
    /// (step "a" of the resolution policy).
    fn precomputed_address(&self) -> Option<Address>;

    /// Step "b": local `CREATE2` computation, for families whose init-code
    /// hash alone determines the address. `None` if the family doesn't
    /// support this (e.g. Kernel, whose proxy address depends on validator
    /// data the client can't always reconstruct locally).
    fn local_address(&self) -> Option<Address>;

    fn family_name(&self) -> &'static str;
    fn entry_point_version(&self) -> EntryPointVersion;

    /// `0x` if the account is assumed already deployed.
    fn init_code(&self) -> Bytes;

    fn encode_call(&self, call: &Call) -> Result<Bytes> {
        self.encode_calls(std::slice::from_ref(call))
    }
    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes>;

    /// A signature-shaped placeholder used to size gas estimation: same
    /// length/shape as a real signature but never verifies.
    fn stub_signature(&self) -> Bytes;

    /// Wraps `hash` per the family's signature scheme (EIP-191 raw, EIP-712,
    /// concatenated multi-owner, etc.) and signs it.
    fn sign_user_op(&self, hash: [u8; 32]) -> Result<Bytes>;

    fn sign_message(&self, message: &[u8]) -> Result<Bytes>;
    fn sign_typed_data(&self, digest: [u8; 32]) -> Result<Bytes>;

    /// `0` for every family except Kernel v0.3/Nexus/EIP-7702 Kernel, which
    /// use a structured validator-identifier key.
    fn nonce_key(&self) -> U256 {
        U256::ZERO
    }
}

/// `keccak(0xff || factory || salt || keccak(init))[12:]`, the standard
/// `CREATE2` address formula. Shared by every family whose address is a
/// pure function of its init-code hash.
pub fn local_create2_address(factory: Address, salt: [u8; 32], init_code_hash: [u8; 32]) -> Address {
    let mut buf = Vec::with_capacity(1 + 20 + 32 + 32);
    buf.push(0xff);
    buf.extend_from_slice(factory.as_slice());
    buf.extend_from_slice(&salt);
    buf.extend_from_slice(&init_code_hash);
    let hash = keccak256(&buf);
    Address::from_slice(&hash[12..])
}

/// Signs the EIP-191 raw-191 wrapping of an operation hash. Used by Kernel
/// v0.3.3's EIP-7702 mode, whose validator expects the hash wrapped in a
/// personal-message prefix rather than signed directly; every other family
/// signs the bare hash via `owner.sign_raw_hash`.
pub fn sign_raw_191(owner: &dyn Owner, hash: [u8; 32]) -> Result<Bytes> {
    let digest = hash_raw_191(&hash);
    let sig = owner.sign_raw_hash(digest)?;
    Ok(Bytes::from(sig.to_vec()))
}

/// Resolves an account's address per the standard policy: precomputed →
/// local `CREATE2` → external resolver → `AddressUnavailable`.
pub async fn resolve_address(
    account: &dyn Account,
    entry_point: Address,
    resolver: Option<&dyn AddressResolver>,
) -> Result<Address> {
    if let Some(addr) = account.precomputed_address() {
        return Ok(addr);
    }
    if let Some(addr) = account.local_address() {
        return Ok(addr);
    }
    if let Some(resolver) = resolver {
        return resolver.get_sender_address(&account.init_code(), entry_point).await;
    }
    Err(Error::AddressUnavailable { family: account.family_name() })
}

/// Closed-enum dispatcher over every implemented family.
#[derive(Debug, Clone)]
pub enum AnyAccount {
    Safe(SafeAccount),
    Simple(SimpleAccount),
    Light(LightAccount),
    KernelV2(KernelV2Account),
    KernelV3(KernelV3Account),
    Nexus(NexusAccount),
    BiconomyLegacy(BiconomyLegacyAccount),
    TrustBarz(TrustBarzAccount),
    Etherspot(EtherspotAccount),
    Thirdweb(ThirdwebAccount),
}

macro_rules! dispatch {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Safe(a) => a.$method($($arg),*),
            Self::Simple(a) => a.$method($($arg),*),
            Self::Light(a) => a.$method($($arg),*),
            Self::KernelV2(a) => a.$method($($arg),*),
            Self::KernelV3(a) => a.$method($($arg),*),
            Self::Nexus(a) => a.$method($($arg),*),
            Self::BiconomyLegacy(a) => a.$method($($arg),*),
            Self::TrustBarz(a) => a.$method($($arg),*),
            Self::Etherspot(a) => a.$method($($arg),*),
            Self::Thirdweb(a) => a.$method($($arg),*),
        }
    };
}

impl Account for AnyAccount {
    fn precomputed_address(&self) -> Option<Address> {
        dispatch!(self, precomputed_address)
    }

    fn local_address(&self) -> Option<Address> {
        dispatch!(self, local_address)
    }

    fn family_name(&self) -> &'static str {
        dispatch!(self, family_name)
    }

    fn entry_point_version(&self) -> EntryPointVersion {
        dispatch!(self, entry_point_version)
    }

    fn init_code(&self) -> Bytes {
        dispatch!(self, init_code)
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes> {
        dispatch!(self, encode_calls, calls)
    }

    fn stub_signature(&self) -> Bytes {
        dispatch!(self, stub_signature)
    }

    fn sign_user_op(&self, hash: [u8; 32]) -> Result<Bytes> {
        dispatch!(self, sign_user_op, hash)
    }

    fn sign_message(&self, message: &[u8]) -> Result<Bytes> {
        dispatch!(self, sign_message, message)
    }

    fn sign_typed_data(&self, digest: [u8; 32]) -> Result<Bytes> {
        dispatch!(self, sign_typed_data, digest)
    }

    fn nonce_key(&self) -> U256 {
        dispatch!(self, nonce_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn local_create2_is_deterministic() {
        let factory = address!("0x1111111111111111111111111111111111111111");
        let salt = [0u8; 32];
        let init_hash = keccak256(b"init").0;
        let a1 = local_create2_address(factory, salt, init_hash);
        let a2 = local_create2_address(factory, salt, init_hash);
        assert_eq!(a1, a2);
    }
}
