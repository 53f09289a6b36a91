//! JSON-RPC boundary to a Solana node.
//!
//! [`RpcClient`] is the seam the rest of the SDK talks through; tests swap in
//! an in-memory implementation. [`HttpRpcClient`] speaks JSON-RPC 2.0 over
//! `reqwest`, with base64 account and transaction encoding.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sol_wire::{Pubkey, Signature};
use tracing::debug;

use crate::config::{ClientConfig, Commitment};
use crate::error::SdkError;

/// Raw account as returned by `getAccountInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
    pub executable: bool,
}

/// Token amount as returned by `getTokenAccountBalance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAmount {
    pub amount: u64,
    pub decimals: u8,
}

/// One entry of `getTokenAccountsByOwner` with `jsonParsed` encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcTokenAccount {
    pub pubkey: Pubkey,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub decimals: u8,
}

/// Which token accounts of an owner to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAccountsFilter {
    Mint(Pubkey),
    ProgramId(Pubkey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: [u8; 32],
    pub last_valid_block_height: u64,
}

/// Entry of `getSignatureStatuses`. `err` is the runtime's transaction error
/// object, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmation_status: Option<Commitment>,
    pub err: Option<Value>,
}

impl SignatureStatus {
    /// Whether the transaction has reached at least `commitment`.
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        self.confirmation_status.is_some_and(|c| c >= commitment)
    }
}

#[async_trait]
pub trait RpcClient: Send + Sync + fmt::Debug {
    /// `Ok(None)` when no account exists at `address`.
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Account>, SdkError>;

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, SdkError>;

    async fn get_token_account_balance(&self, token_account: &Pubkey)
        -> Result<TokenAmount, SdkError>;

    async fn get_parsed_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        filter: TokenAccountsFilter,
    ) -> Result<Vec<RpcTokenAccount>, SdkError>;

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize)
        -> Result<u64, SdkError>;

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, SdkError>;

    async fn get_block_height(&self) -> Result<u64, SdkError>;

    /// Submit a signed wire transaction. Preflight failures come back as
    /// [`SdkError::ProgramRejected`].
    async fn send_transaction(&self, wire_transaction: &[u8]) -> Result<Signature, SdkError>;

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, SdkError>;
}

// ---------------------------------------------------------------------------
// Runtime error decoding
// ---------------------------------------------------------------------------

/// Extract the custom program error code from a runtime transaction error,
/// e.g. `{"InstructionError":[0,{"Custom":6003}]}`.
pub fn custom_error_code(err: &Value) -> Option<u32> {
    err.get("InstructionError")?
        .get(1)?
        .get("Custom")?
        .as_u64()
        .and_then(|code| u32::try_from(code).ok())
}

/// Build a [`SdkError::ProgramRejected`] from a runtime error object.
pub fn program_rejection(err: &Value, logs: Vec<String>) -> SdkError {
    SdkError::ProgramRejected {
        code: custom_error_code(err),
        message: err.to_string(),
        logs,
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl From<RpcErrorObject> for SdkError {
    fn from(e: RpcErrorObject) -> Self {
        // Preflight simulation failures carry the runtime error and logs.
        if let Some(err) = e.data.as_ref().and_then(|d| d.get("err")).filter(|v| !v.is_null()) {
            let logs = e
                .data
                .as_ref()
                .and_then(|d| d.get("logs"))
                .and_then(|l| serde_json::from_value::<Vec<String>>(l.clone()).ok())
                .unwrap_or_default();
            return SdkError::ProgramRejected {
                code: custom_error_code(err),
                message: e.message,
                logs,
            };
        }
        SdkError::Rpc {
            code: e.code,
            message: e.message,
        }
    }
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiAccount {
    lamports: u64,
    owner: String,
    data: (String, String),
    executable: bool,
}

impl UiAccount {
    fn decode(self) -> Result<Account, SdkError> {
        if self.data.1 != "base64" {
            return Err(SdkError::InvalidAccountData(format!(
                "unexpected account encoding '{}'",
                self.data.1
            )));
        }
        Ok(Account {
            lamports: self.lamports,
            owner: self.owner.parse()?,
            data: BASE64_STANDARD.decode(self.data.0)?,
            executable: self.executable,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiTokenAmount {
    amount: String,
    decimals: u8,
}

impl UiTokenAmount {
    fn decode(self) -> Result<TokenAmount, SdkError> {
        let amount = self.amount.parse::<u64>().map_err(|e| {
            SdkError::InvalidAccountData(format!("token amount '{}': {e}", self.amount))
        })?;
        Ok(TokenAmount {
            amount,
            decimals: self.decimals,
        })
    }
}

#[derive(Deserialize)]
struct KeyedParsedAccount {
    pubkey: String,
    account: ParsedAccountEnvelope,
}

#[derive(Deserialize)]
struct ParsedAccountEnvelope {
    data: ParsedData,
}

#[derive(Deserialize)]
struct ParsedData {
    parsed: ParsedTokenInfo,
}

#[derive(Deserialize)]
struct ParsedTokenInfo {
    info: TokenInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenInfo {
    mint: String,
    owner: String,
    token_amount: UiTokenAmount,
}

impl KeyedParsedAccount {
    fn decode(self) -> Result<RpcTokenAccount, SdkError> {
        let info = self.account.data.parsed.info;
        let amount = info.token_amount.decode()?;
        Ok(RpcTokenAccount {
            pubkey: self.pubkey.parse()?,
            mint: info.mint.parse()?,
            owner: info.owner.parse()?,
            amount: amount.amount,
            decimals: amount.decimals,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiSignatureStatus {
    slot: u64,
    err: Option<Value>,
    confirmation_status: Option<Commitment>,
}

fn decode_blockhash(encoded: &str) -> Result<[u8; 32], SdkError> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| SdkError::InvalidAccountData(format!("blockhash '{encoded}': {e}")))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        SdkError::InvalidAccountData(format!("blockhash is {} bytes", v.len()))
    })
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 client over HTTP.
pub struct HttpRpcClient {
    http: HttpClient,
    url: String,
    commitment: Commitment,
    next_id: AtomicU64,
}

impl fmt::Debug for HttpRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRpcClient")
            .field("url", &self.url)
            .field("commitment", &self.commitment)
            .finish()
    }
}

impl HttpRpcClient {
    pub fn new(config: &ClientConfig) -> Result<Self, SdkError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: config.rpc_url().to_string(),
            commitment: config.commitment,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, SdkError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "rpc request");

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: RpcResponse = response.json().await?;
        if let Some(err) = body.error {
            return Err(err.into());
        }
        let result = body.result.ok_or_else(|| SdkError::Rpc {
            code: 0,
            message: format!("{method}: response has neither result nor error"),
        })?;
        Ok(serde_json::from_value(result)?)
    }

    fn commitment_config(&self) -> Value {
        json!({ "commitment": self.commitment.as_str() })
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Account>, SdkError> {
        let resp: WithContext<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.commitment.as_str() }
                ]),
            )
            .await?;
        resp.value.map(UiAccount::decode).transpose()
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, SdkError> {
        let resp: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address.to_string(), self.commitment_config()]),
            )
            .await?;
        Ok(resp.value)
    }

    async fn get_token_account_balance(
        &self,
        token_account: &Pubkey,
    ) -> Result<TokenAmount, SdkError> {
        let resp: WithContext<UiTokenAmount> = self
            .call(
                "getTokenAccountBalance",
                json!([token_account.to_string(), self.commitment_config()]),
            )
            .await?;
        resp.value.decode()
    }

    async fn get_parsed_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        filter: TokenAccountsFilter,
    ) -> Result<Vec<RpcTokenAccount>, SdkError> {
        let filter = match filter {
            TokenAccountsFilter::Mint(mint) => json!({ "mint": mint.to_string() }),
            TokenAccountsFilter::ProgramId(program) => json!({ "programId": program.to_string() }),
        };
        let resp: WithContext<Vec<KeyedParsedAccount>> = self
            .call(
                "getTokenAccountsByOwner",
                json!([
                    owner.to_string(),
                    filter,
                    { "encoding": "jsonParsed", "commitment": self.commitment.as_str() }
                ]),
            )
            .await?;
        resp.value.into_iter().map(KeyedParsedAccount::decode).collect()
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, SdkError> {
        self.call("getMinimumBalanceForRentExemption", json!([data_len]))
            .await
    }

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, SdkError> {
        let resp: WithContext<UiBlockhash> = self
            .call("getLatestBlockhash", json!([self.commitment_config()]))
            .await?;
        Ok(LatestBlockhash {
            blockhash: decode_blockhash(&resp.value.blockhash)?,
            last_valid_block_height: resp.value.last_valid_block_height,
        })
    }

    async fn get_block_height(&self) -> Result<u64, SdkError> {
        self.call("getBlockHeight", json!([self.commitment_config()]))
            .await
    }

    async fn send_transaction(&self, wire_transaction: &[u8]) -> Result<Signature, SdkError> {
        let encoded = BASE64_STANDARD.encode(wire_transaction);
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    encoded,
                    { "encoding": "base64", "preflightCommitment": self.commitment.as_str() }
                ]),
            )
            .await?;
        Ok(signature.parse()?)
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, SdkError> {
        let sigs: Vec<String> = signatures.iter().map(Signature::to_string).collect();
        let resp: WithContext<Vec<Option<UiSignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([sigs, { "searchTransactionHistory": false }]),
            )
            .await?;
        Ok(resp
            .value
            .into_iter()
            .map(|status| {
                status.map(|s| SignatureStatus {
                    slot: s.slot,
                    confirmation_status: s.confirmation_status,
                    err: s.err,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_code_from_instruction_error() {
        let err = json!({ "InstructionError": [0, { "Custom": 6003 }] });
        assert_eq!(custom_error_code(&err), Some(6003));
    }

    #[test]
    fn builtin_instruction_error_has_no_code() {
        let err = json!({ "InstructionError": [1, "InvalidAccountData"] });
        assert_eq!(custom_error_code(&err), None);
        assert_eq!(custom_error_code(&json!("AccountNotFound")), None);
    }

    #[test]
    fn preflight_failure_becomes_program_rejection() {
        let obj: RpcErrorObject = serde_json::from_value(json!({
            "code": -32002,
            "message": "Transaction simulation failed: Error processing Instruction 0: custom program error: 0x1773",
            "data": {
                "err": { "InstructionError": [0, { "Custom": 6003 }] },
                "logs": ["Program log: AllocationBpsError"]
            }
        }))
        .unwrap();

        match SdkError::from(obj) {
            SdkError::ProgramRejected { code, logs, .. } => {
                assert_eq!(code, Some(6003));
                assert_eq!(logs, vec!["Program log: AllocationBpsError".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn plain_rpc_error_stays_rpc() {
        let obj: RpcErrorObject = serde_json::from_value(json!({
            "code": -32602,
            "message": "Invalid params"
        }))
        .unwrap();
        assert!(matches!(SdkError::from(obj), SdkError::Rpc { code: -32602, .. }));
    }

    #[test]
    fn decode_base64_account() {
        let ui: WithContext<Option<UiAccount>> = serde_json::from_value(json!({
            "context": { "slot": 1 },
            "value": {
                "lamports": 1461600,
                "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
                "data": ["AQID", "base64"],
                "executable": false,
                "rentEpoch": 361
            }
        }))
        .unwrap();
        let account = ui.value.unwrap().decode().unwrap();
        assert_eq!(account.data, vec![1, 2, 3]);
        assert_eq!(account.owner, sol_wire::TOKEN_PROGRAM_ID);
    }

    #[test]
    fn missing_account_is_none() {
        let ui: WithContext<Option<UiAccount>> =
            serde_json::from_value(json!({ "context": { "slot": 1 }, "value": null })).unwrap();
        assert!(ui.value.is_none());
    }

    #[test]
    fn decode_parsed_token_account() {
        let keyed: KeyedParsedAccount = serde_json::from_value(json!({
            "pubkey": "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr",
            "account": {
                "lamports": 2039280,
                "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
                "executable": false,
                "data": {
                    "program": "spl-token",
                    "space": 165,
                    "parsed": {
                        "type": "account",
                        "info": {
                            "mint": "So11111111111111111111111111111111111111112",
                            "owner": "9tFeTGcc6saCgvZqQbqKq76vqgbJsoavjFiMDKRo7v9c",
                            "state": "initialized",
                            "tokenAmount": {
                                "amount": "1000000",
                                "decimals": 6,
                                "uiAmount": 1.0,
                                "uiAmountString": "1"
                            }
                        }
                    }
                }
            }
        }))
        .unwrap();
        let account = keyed.decode().unwrap();
        assert_eq!(account.amount, 1_000_000);
        assert_eq!(account.decimals, 6);
        assert_eq!(account.owner, crate::config::BUCKET_PROGRAM_ID);
    }

    #[test]
    fn non_numeric_token_amount_is_invalid() {
        let amount = UiTokenAmount {
            amount: "lots".into(),
            decimals: 0,
        };
        assert!(matches!(amount.decode(), Err(SdkError::InvalidAccountData(_))));
    }

    #[test]
    fn signature_status_commitment_ordering() {
        let status = SignatureStatus {
            slot: 5,
            confirmation_status: Some(Commitment::Confirmed),
            err: None,
        };
        assert!(status.satisfies(Commitment::Processed));
        assert!(status.satisfies(Commitment::Confirmed));
        assert!(!status.satisfies(Commitment::Finalized));
    }

    #[test]
    fn blockhash_must_be_32_bytes() {
        assert!(decode_blockhash("1111").is_err());
        let encoded = bs58::encode([7u8; 32]).into_string();
        assert_eq!(decode_blockhash(&encoded).unwrap(), [7u8; 32]);
    }
}
