//! Account family implementations: the `Account` trait, its closed-enum
//! dispatcher `AnyAccount`, the address-resolution policy, and one module
//! per supported smart-account family.

pub mod account;
pub mod biconomy_legacy;
pub mod etherspot;
pub mod kernel_v2;
pub mod kernel_v3;
pub mod light;
pub mod nexus;
pub mod safe;
pub mod simple;
pub mod thirdweb;
pub mod trust_barz;

pub use account::{Account, AddressResolver, AnyAccount, EntryPointVersion, local_create2_address, resolve_address, sign_raw_191};
pub use biconomy_legacy::BiconomyLegacyAccount;
pub use etherspot::EtherspotAccount;
pub use kernel_v2::{KernelV2Account, Operation as KernelV2Operation};
pub use kernel_v3::{KernelV3Account, KernelV3Variant};
pub use light::{LightAccount, LightAccountVersion};
pub use nexus::NexusAccount;
pub use safe::{SafeAccount, SafeOpFields};
pub use simple::SimpleAccount;
pub use thirdweb::ThirdwebAccount;
pub use trust_barz::TrustBarzAccount;
