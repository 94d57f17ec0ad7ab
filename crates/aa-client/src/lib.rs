//! Bundler/paymaster/public-RPC collaborator traits and the orchestration
//! client: everything a caller needs to drive a `prepare → sign → send`
//! pipeline for an `aa_accounts::Account`, without this crate itself
//! depending on a JSON-RPC transport.

pub mod bundler;
pub mod error;
pub mod orchestrator;
pub mod paymaster;
pub mod public;

pub use bundler::{BundlerClient, GasEstimate, UserOperationReceipt};
pub use error::{BundlerRpcError, ClientError, PublicRpcError, Result};
pub use orchestrator::{Fees, GasMultipliers, Orchestrator, PrepareRequest, total_gas_limit};
pub use paymaster::{PaymasterClient, PaymasterData, PaymasterStubData};
pub use public::{PublicClient, PublicResolver};
