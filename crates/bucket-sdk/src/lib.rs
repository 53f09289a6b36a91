//! Client SDK for the bucket program.
//!
//! A bucket wraps a crate token: depositors hand in whitelisted collateral and
//! receive the bucket's reserve token, redeemers burn reserve tokens for a
//! pro-rata share of every collateral, and a rebalance authority swaps
//! collateral through stable swap pools to track target allocations.
//!
//! [`BucketClient`] is the entry point. Lower layers are public for callers
//! that build transactions themselves:
//!
//! - [`pda`] derives the program addresses of a reserve mint
//! - [`instructions`] encodes every bucket instruction
//! - [`state`] decodes program accounts
//! - [`token_accounts`] finds or creates associated token accounts
//! - [`rpc`] is the JSON-RPC seam, [`swap`] the swap pool registry

pub mod anchor;
pub mod client;
pub mod config;
pub mod error;
pub mod instructions;
pub mod pda;
pub mod rpc;
pub mod signer;
pub mod state;
pub mod swap;
pub mod token_accounts;

#[cfg(test)]
mod mock;

pub use client::{BucketClient, CreateBucketResult, RebalanceConfig, UnauthorizedRebalance};
pub use config::{ClientConfig, Cluster, Commitment, ProgramIds, BUCKET_PROGRAM_ID, CRATE_TOKEN_PROGRAM_ID};
pub use error::SdkError;
pub use pda::BucketAddresses;
pub use rpc::{HttpRpcClient, RpcClient};
pub use signer::{get_signers_from_payer, Payer, SignerInfo};
pub use state::{AuthorityAccount, Bucket, Collateral, CollateralAllocationResult, ParsedTokenAccount};
pub use swap::{SaberRegistry, SwapPool, SwapRegistry, SwapToken};
