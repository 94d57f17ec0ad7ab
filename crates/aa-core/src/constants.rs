//! Well-known constants: EntryPoint addresses and per-family selectors used
//! outside the ERC-7579 module (Safe, Light, Kernel, Biconomy).

use alloy_primitives::{Address, address};

pub const ENTRY_POINT_V06: Address = address!("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");
pub const ENTRY_POINT_V07: Address = address!("0x0000000071727De22E5E9d8BAf0edAc6f37da032");
pub const ENTRY_POINT_V08: Address = address!("0x4337084D9E255Ff0702461CF8895CE9E3b5Ff108");

/// `multiSend(bytes)` on the canonical MultiSend library contract.
pub const SAFE_MULTI_SEND_SELECTOR: [u8; 4] = [0x8d, 0x80, 0xff, 0x0a];

/// Derived via [`crate::abi::function_selector`] from the canonical
/// signature rather than hand-copied, to avoid transcription errors on
/// selectors that aren't otherwise pinned down by a well-known constant.
pub fn safe_setup_selector() -> [u8; 4] {
    crate::abi::function_selector(
        "setup(address[],uint256,address,bytes,address,address,uint256,address)",
    )
}

pub fn safe_enable_modules_selector() -> [u8; 4] {
    crate::abi::function_selector("enableModules(address[])")
}

pub fn safe_execute_user_op_selector() -> [u8; 4] {
    crate::abi::function_selector("executeUserOpWithErrorString(address,uint256,bytes,uint8)")
}

pub fn safe_create_proxy_with_nonce_selector() -> [u8; 4] {
    crate::abi::function_selector("createProxyWithNonce(address,bytes,uint256)")
}

pub const BICONOMY_EXECUTE_NCC_SELECTOR: [u8; 4] = [0x00, 0x00, 0x18, 0x9a];
pub const BICONOMY_EXECUTE_BATCH_Y6U_SELECTOR: [u8; 4] = [0x00, 0x00, 0x46, 0x80];
pub const BICONOMY_DEPLOY_COUNTERFACTUAL_ACCOUNT_SELECTOR: [u8; 4] = [0xdf, 0x20, 0xff, 0xbc];
pub const BICONOMY_INIT_SELECTOR: [u8; 4] = [0x37, 0x8d, 0xfd, 0x8e];
pub const BICONOMY_INIT_FOR_SMART_ACCOUNT_SELECTOR: [u8; 4] = [0x2e, 0xde, 0x3b, 0xc0];

pub const LIGHT_CREATE_ACCOUNT_SELECTOR: [u8; 4] = [0x5f, 0xbf, 0xb9, 0xcf];
pub const LIGHT_EXECUTE_SELECTOR: [u8; 4] = [0xb6, 0x1d, 0x27, 0xf6];
pub const LIGHT_EXECUTE_BATCH_SELECTOR: [u8; 4] = [0x47, 0xe1, 0xda, 0x2a];

pub const KERNEL_V2_EXECUTE_SELECTOR: [u8; 4] = [0xb6, 0x1d, 0x27, 0xf6];
pub const KERNEL_V3_INITIALIZE_SELECTOR: [u8; 4] = [0x3c, 0x3b, 0x75, 0x2b];
pub const KERNEL_META_FACTORY_DEPLOY_WITH_FACTORY_SELECTOR: [u8; 4] = [0xc5, 0x26, 0x5d, 0x5d];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_addresses_match_spec_literals() {
        assert_eq!(
            ENTRY_POINT_V06,
            address!("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789")
        );
        assert_eq!(
            ENTRY_POINT_V07,
            address!("0x0000000071727De22E5E9d8BAf0edAc6f37da032")
        );
    }
}
