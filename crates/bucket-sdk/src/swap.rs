//! Swap venue lookup for rebalancing.
//!
//! Pools come from the Saber registry JSON published per cluster, keyed by
//! the lexicographically ordered mint pair.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use sol_wire::Pubkey;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Cluster;
use crate::error::SdkError;
use crate::state::MAX_BPS;

/// One side of a stable swap pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapToken {
    pub mint: Pubkey,
    pub reserve: Pubkey,
    pub admin_fee_account: Pubkey,
}

/// Everything `rebalance` needs to route through a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPool {
    pub swap_account: Pubkey,
    pub swap_program: Pubkey,
    pub authority: Pubkey,
    pub token_a: SwapToken,
    pub token_b: SwapToken,
    pub pool_mint: Pubkey,
}

impl SwapPool {
    /// Order the pool's sides as (input, output) for a swap out of `input_mint`.
    pub fn oriented(&self, input_mint: &Pubkey) -> Result<(SwapToken, SwapToken), SdkError> {
        if self.token_a.mint == *input_mint {
            Ok((self.token_a, self.token_b))
        } else if self.token_b.mint == *input_mint {
            Ok((self.token_b, self.token_a))
        } else {
            Err(SdkError::InvalidArgument(format!(
                "pool {} does not trade {input_mint}",
                self.swap_account
            )))
        }
    }

    pub fn mints(&self) -> [Pubkey; 2] {
        [self.token_a.mint, self.token_b.mint]
    }
}

/// Amounts passed to the program's swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapAmount {
    pub amount_in: u64,
    pub min_amount_out: u64,
}

/// Minimum acceptable output for `amount_in` given a slippage tolerance:
/// `round(amount_in * (10000 - bps) / 10000)`.
pub fn compute_swap_amounts(amount_in: u64, max_slippage_bps: u16) -> Result<SwapAmount, SdkError> {
    if max_slippage_bps > MAX_BPS {
        return Err(SdkError::InvalidArgument(format!(
            "max slippage {max_slippage_bps} bps exceeds {MAX_BPS}"
        )));
    }
    let keep = (MAX_BPS - max_slippage_bps) as u128;
    let scaled = amount_in as u128 * keep;
    // Half-up rounding; the result never exceeds amount_in.
    let min_amount_out = ((scaled + MAX_BPS as u128 / 2) / MAX_BPS as u128) as u64;
    Ok(SwapAmount {
        amount_in,
        min_amount_out,
    })
}

/// Registry key for a mint pair, independent of argument order.
pub fn registry_key(token_a: &Pubkey, token_b: &Pubkey) -> String {
    let (a, b) = (token_a.to_string(), token_b.to_string());
    if a < b {
        format!("{a}-{b}")
    } else {
        format!("{b}-{a}")
    }
}

#[async_trait]
pub trait SwapRegistry: Send + Sync + fmt::Debug {
    async fn find_pool(
        &self,
        cluster: Cluster,
        token_a: &Pubkey,
        token_b: &Pubkey,
    ) -> Result<SwapPool, SdkError>;
}

// ---------------------------------------------------------------------------
// Registry JSON
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RegistryFile {
    pools: Vec<RegistryPool>,
}

#[derive(Deserialize)]
struct RegistryPool {
    swap: RegistrySwap,
}

#[derive(Deserialize)]
struct RegistrySwap {
    config: RegistryConfig,
    state: RegistryState,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryConfig {
    swap_account: Pubkey,
    #[serde(rename = "swapProgramID")]
    swap_program_id: Pubkey,
    authority: Pubkey,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryState {
    token_a: SwapToken,
    token_b: SwapToken,
    pool_token_mint: Pubkey,
}

impl From<RegistryPool> for SwapPool {
    fn from(p: RegistryPool) -> Self {
        SwapPool {
            swap_account: p.swap.config.swap_account,
            swap_program: p.swap.config.swap_program_id,
            authority: p.swap.config.authority,
            token_a: p.swap.state.token_a,
            token_b: p.swap.state.token_b,
            pool_mint: p.swap.state.pool_token_mint,
        }
    }
}

/// Parse a registry document into pools keyed by [`registry_key`].
pub fn parse_registry(json: &str) -> Result<HashMap<String, SwapPool>, SdkError> {
    let file: RegistryFile = serde_json::from_str(json)
        .map_err(|e| SdkError::Config(format!("swap registry: {e}")))?;
    Ok(file
        .pools
        .into_iter()
        .map(SwapPool::from)
        .map(|pool| (registry_key(&pool.token_a.mint, &pool.token_b.mint), pool))
        .collect())
}

// ---------------------------------------------------------------------------
// Saber registry
// ---------------------------------------------------------------------------

/// Saber pool registry, loaded lazily per cluster and kept for the life of
/// the value.
pub struct SaberRegistry {
    http: HttpClient,
    pools: RwLock<HashMap<Cluster, HashMap<String, SwapPool>>>,
}

impl fmt::Debug for SaberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaberRegistry").finish_non_exhaustive()
    }
}

impl SaberRegistry {
    pub fn new(request_timeout_secs: u64) -> Result<Self, SdkError> {
        Ok(Self {
            http: HttpClient::builder()
                .timeout(Duration::from_secs(request_timeout_secs))
                .build()?,
            pools: RwLock::new(HashMap::new()),
        })
    }

    /// Seed a cluster's pools from an already fetched registry document.
    pub async fn load_json(&self, cluster: Cluster, json: &str) -> Result<usize, SdkError> {
        let pools = parse_registry(json)?;
        let count = pools.len();
        self.pools.write().await.insert(cluster, pools);
        Ok(count)
    }

    async fn ensure_loaded(&self, cluster: Cluster) -> Result<(), SdkError> {
        if self.pools.read().await.contains_key(&cluster) {
            return Ok(());
        }
        let url = cluster
            .swap_registry_url()
            .ok_or_else(|| SdkError::UnsupportedCluster(cluster.to_string()))?;

        debug!(%cluster, url, "fetching swap registry");
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let count = self.load_json(cluster, &body).await?;
        info!(%cluster, pools = count, "loaded swap registry");
        Ok(())
    }

    /// Whether any pool on `cluster` trades `mint`.
    pub async fn has_pool_for_mint(&self, cluster: Cluster, mint: &Pubkey) -> Result<bool, SdkError> {
        self.ensure_loaded(cluster).await?;
        let pools = self.pools.read().await;
        let mints: HashSet<Pubkey> = pools
            .get(&cluster)
            .into_iter()
            .flat_map(|p| p.values())
            .flat_map(SwapPool::mints)
            .collect();
        Ok(mints.contains(mint))
    }
}

#[async_trait]
impl SwapRegistry for SaberRegistry {
    async fn find_pool(
        &self,
        cluster: Cluster,
        token_a: &Pubkey,
        token_b: &Pubkey,
    ) -> Result<SwapPool, SdkError> {
        if cluster.swap_registry_url().is_none() {
            return Err(SdkError::UnsupportedCluster(format!(
                "{cluster}: only devnet and mainnet-beta swap pools are supported"
            )));
        }
        self.ensure_loaded(cluster).await?;

        self.pools
            .read()
            .await
            .get(&cluster)
            .and_then(|pools| pools.get(&registry_key(token_a, token_b)))
            .copied()
            .ok_or_else(|| {
                SdkError::SwapPoolNotFound(format!("mints [{token_a}] and [{token_b}] on {cluster}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> Pubkey {
        Pubkey::new_from_array([b; 32])
    }

    fn registry_json() -> String {
        serde_json::json!({
            "pools": [{
                "id": "usdc_usdt",
                "name": "USDT-USDC",
                "swap": {
                    "config": {
                        "swapAccount": key(1).to_string(),
                        "swapProgramID": key(2).to_string(),
                        "tokenProgramID": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
                        "authority": key(3).to_string()
                    },
                    "state": {
                        "isInitialized": true,
                        "tokenA": {
                            "adminFeeAccount": key(4).to_string(),
                            "reserve": key(5).to_string(),
                            "mint": key(6).to_string()
                        },
                        "tokenB": {
                            "adminFeeAccount": key(7).to_string(),
                            "reserve": key(8).to_string(),
                            "mint": key(9).to_string()
                        },
                        "poolTokenMint": key(10).to_string()
                    }
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn slippage_rounds_half_up() {
        assert_eq!(compute_swap_amounts(1000, 50).unwrap().min_amount_out, 995);
        // 3 * 0.5 = 1.5 -> 2
        assert_eq!(compute_swap_amounts(3, 5000).unwrap().min_amount_out, 2);
        assert_eq!(compute_swap_amounts(0, 0).unwrap().min_amount_out, 0);
        assert_eq!(compute_swap_amounts(u64::MAX, 0).unwrap().min_amount_out, u64::MAX);
        assert_eq!(compute_swap_amounts(1000, 10_000).unwrap().min_amount_out, 0);
    }

    #[test]
    fn slippage_above_full_is_rejected() {
        assert!(matches!(
            compute_swap_amounts(1000, 10_001),
            Err(SdkError::InvalidArgument(_))
        ));
    }

    #[test]
    fn registry_key_is_order_independent() {
        assert_eq!(registry_key(&key(1), &key(2)), registry_key(&key(2), &key(1)));
    }

    #[test]
    fn parse_registry_document() {
        let pools = parse_registry(&registry_json()).unwrap();
        let pool = pools.get(&registry_key(&key(9), &key(6))).unwrap();
        assert_eq!(pool.swap_account, key(1));
        assert_eq!(pool.swap_program, key(2));
        assert_eq!(pool.token_b.reserve, key(8));
        assert_eq!(pool.pool_mint, key(10));
    }

    #[test]
    fn orientation_follows_input_mint() {
        let pools = parse_registry(&registry_json()).unwrap();
        let pool = pools.values().next().unwrap();
        let (input, output) = pool.oriented(&key(9)).unwrap();
        assert_eq!(input.mint, key(9));
        assert_eq!(output.mint, key(6));
        assert!(pool.oriented(&key(42)).is_err());
    }

    #[tokio::test]
    async fn lookup_from_loaded_registry() {
        let registry = SaberRegistry::new(5).unwrap();
        registry.load_json(Cluster::Devnet, &registry_json()).await.unwrap();

        let pool = registry.find_pool(Cluster::Devnet, &key(6), &key(9)).await.unwrap();
        assert_eq!(pool.swap_account, key(1));
        assert!(registry.has_pool_for_mint(Cluster::Devnet, &key(6)).await.unwrap());
        assert!(!registry.has_pool_for_mint(Cluster::Devnet, &key(11)).await.unwrap());

        let err = registry.find_pool(Cluster::Devnet, &key(6), &key(11)).await.unwrap_err();
        assert!(matches!(err, SdkError::SwapPoolNotFound(_)));
    }

    #[tokio::test]
    async fn localnet_is_unsupported() {
        let registry = SaberRegistry::new(5).unwrap();
        let err = registry.find_pool(Cluster::Localnet, &key(6), &key(9)).await.unwrap_err();
        assert!(matches!(err, SdkError::UnsupportedCluster(_)));
    }

    #[test]
    fn malformed_registry_is_config_error() {
        assert!(matches!(parse_registry("{\"pools\": 3}"), Err(SdkError::Config(_))));
    }
}
