//! # credchain Ledger
//!
//! Attests document fingerprints on an EVM contract and reads them back.
//!
//! ## Key Types
//!
//! - [`Ledger`] - The async trait the coordinator consumes
//! - [`LedgerClient`] - `Ledger` over any [`ChainRpc`]
//! - [`EthersRpc`] - `ChainRpc` over an ethers HTTP provider
//! - [`SignerAccount`] - Signing key plus the lock that serializes its nonces
//! - [`MemoryLedger`] - High-level fake for coordinator tests
//!
//! ## Submission
//!
//! ```text
//! balance check -> [lock] pending nonce -> estimate gas -> sign -> broadcast [unlock]
//!               -> poll receipt (interval x attempts)
//! ```
//!
//! A failed balance check or a predicted revert means nothing was broadcast.
//! After broadcast the outcome is either a receipt, a revert, or
//! `ConfirmationTimeout` (unknown; re-query `exists`).

pub mod abi;
pub mod account;
pub mod client;
pub mod error;
pub mod memory;
pub mod rpc;
pub mod traits;

pub use abi::AttestationContract;
pub use account::SignerAccount;
pub use client::{LedgerClient, LedgerConfig};
pub use error::{ChainError, LedgerError, Result, RpcResult};
pub use memory::MemoryLedger;
pub use rpc::{ChainReceipt, ChainRpc, EthersRpc};
pub use traits::{Attestation, FeeEstimate, Ledger, LedgerReceipt};
