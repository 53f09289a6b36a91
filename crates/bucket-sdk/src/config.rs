//! Network selection and client configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sol_wire::Pubkey;

use crate::error::SdkError;

/// Default RPC endpoint for a local validator.
pub const LOCALNET_RPC: &str = "http://127.0.0.1:8899";

/// Default RPC endpoint for testnet.
pub const TESTNET_RPC: &str = "https://api.testnet.solana.com";

/// Default RPC endpoint for devnet.
pub const DEVNET_RPC: &str = "https://api.devnet.solana.com";

/// Default RPC endpoint for mainnet-beta.
pub const MAINNET_BETA_RPC: &str = "https://api.mainnet-beta.solana.com";

/// Saber pool registry for devnet.
pub const DEVNET_SWAP_REGISTRY: &str = "https://registry.saber.so/data/pools-info.devnet.json";

/// Saber pool registry for mainnet-beta.
pub const MAINNET_SWAP_REGISTRY: &str = "https://registry.saber.so/data/pools-info.mainnet.json";

/// Bucket program: `9tFeTGcc6saCgvZqQbqKq76vqgbJsoavjFiMDKRo7v9c`
pub const BUCKET_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x83, 0xfe, 0xad, 0x39, 0xe4, 0x41, 0x6f, 0x90, 0xe4, 0xf1, 0xd7, 0xe1, 0xdf, 0x00, 0xed,
    0x53, 0xaa, 0x21, 0xad, 0xe5, 0x1c, 0xfb, 0xff, 0x5d, 0xb4, 0x97, 0x91, 0xee, 0x37, 0x98,
    0x7b, 0xb7,
]);

/// Crate token program: `CRATwLpu6YZEeiVq9ajjxs61wPQ9f29s1UoQR9siJCRs`
pub const CRATE_TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0xa9, 0xa1, 0x32, 0x73, 0x58, 0xed, 0x71, 0x95, 0x9e, 0x3e, 0x68, 0x1a, 0xd3, 0x3a, 0x20,
    0x25, 0xaf, 0x38, 0x04, 0x96, 0x7c, 0x06, 0x9c, 0xf7, 0xa2, 0xe9, 0xc6, 0x90, 0xfc, 0x06,
    0xa0, 0xa6,
]);

/// Supported Solana clusters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    Localnet,
    Testnet,
    #[default]
    Devnet,
    MainnetBeta,
}

impl Cluster {
    /// Return the default RPC endpoint for this cluster.
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Cluster::Localnet => LOCALNET_RPC,
            Cluster::Testnet => TESTNET_RPC,
            Cluster::Devnet => DEVNET_RPC,
            Cluster::MainnetBeta => MAINNET_BETA_RPC,
        }
    }

    /// Swap pool registry for this cluster, if one is published.
    pub fn swap_registry_url(self) -> Option<&'static str> {
        match self {
            Cluster::Devnet => Some(DEVNET_SWAP_REGISTRY),
            Cluster::MainnetBeta => Some(MAINNET_SWAP_REGISTRY),
            Cluster::Localnet | Cluster::Testnet => None,
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cluster::Localnet => write!(f, "localnet"),
            Cluster::Testnet => write!(f, "testnet"),
            Cluster::Devnet => write!(f, "devnet"),
            Cluster::MainnetBeta => write!(f, "mainnet-beta"),
        }
    }
}

impl FromStr for Cluster {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "localnet" => Ok(Cluster::Localnet),
            "testnet" => Ok(Cluster::Testnet),
            "devnet" => Ok(Cluster::Devnet),
            "mainnet-beta" | "mainnet" => Ok(Cluster::MainnetBeta),
            other => Err(SdkError::Config(format!("unknown cluster '{other}'"))),
        }
    }
}

/// Commitment level used for reads and confirmation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// On-chain programs the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramIds {
    pub bucket: Pubkey,
    pub crate_token: Pubkey,
}

impl Default for ProgramIds {
    fn default() -> Self {
        Self {
            bucket: BUCKET_PROGRAM_ID,
            crate_token: CRATE_TOKEN_PROGRAM_ID,
        }
    }
}

/// Everything a [`crate::BucketClient`] needs to know about its environment.
///
/// Missing JSON fields fall back to the devnet defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub cluster: Cluster,
    /// Overrides the cluster's default RPC endpoint.
    pub rpc_url: Option<String>,
    pub program_ids: ProgramIds,
    pub commitment: Commitment,
    pub confirm_poll_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_cluster(Cluster::default())
    }
}

impl ClientConfig {
    pub fn for_cluster(cluster: Cluster) -> Self {
        Self {
            cluster,
            rpc_url: None,
            program_ids: ProgramIds::default(),
            commitment: Commitment::default(),
            confirm_poll_interval_ms: 500,
            request_timeout_secs: 30,
        }
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SdkError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, SdkError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SdkError> {
        if self.confirm_poll_interval_ms == 0 {
            return Err(SdkError::Config(
                "confirm_poll_interval_ms must be > 0".into(),
            ));
        }
        if let Some(url) = &self.rpc_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SdkError::Config(format!("rpc_url '{url}' is not an http(s) URL")));
            }
        }
        Ok(())
    }

    /// The RPC endpoint in effect: the override, else the cluster default.
    pub fn rpc_url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or_else(|| self.cluster.default_rpc_url())
    }
}
