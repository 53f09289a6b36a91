//! In-memory RPC backend for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sol_wire::{Pubkey, Signature};

use crate::error::SdkError;
use crate::rpc::{
    Account, LatestBlockhash, RpcClient, RpcTokenAccount, SignatureStatus, TokenAccountsFilter,
    TokenAmount,
};

#[derive(Debug, Default)]
pub(crate) struct MockRpc {
    accounts: Mutex<HashMap<Pubkey, Account>>,
    token_accounts: Mutex<Vec<RpcTokenAccount>>,
}

impl MockRpc {
    /// Rent-exempt minimum: (len + 128 byte header) * 6960 lamports.
    pub(crate) fn rent_for(data_len: usize) -> u64 {
        (data_len as u64 + 128) * 6960
    }

    pub(crate) fn put_account(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        let lamports = Self::rent_for(data.len());
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                address,
                Account {
                    lamports,
                    owner,
                    data,
                    executable: false,
                },
            );
        }
    }

    pub(crate) fn put_token_account(&self, account: RpcTokenAccount) {
        if let Ok(mut accounts) = self.token_accounts.lock() {
            accounts.push(account);
        }
    }
}

fn not_mocked(method: &str) -> SdkError {
    SdkError::Rpc {
        code: -32601,
        message: format!("{method} not mocked"),
    }
}

#[async_trait]
impl RpcClient for MockRpc {
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<Account>, SdkError> {
        Ok(self
            .accounts
            .lock()
            .map_err(|_| not_mocked("getAccountInfo"))?
            .get(address)
            .cloned())
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, SdkError> {
        Ok(self
            .get_account_info(address)
            .await?
            .map_or(0, |a| a.lamports))
    }

    async fn get_token_account_balance(
        &self,
        token_account: &Pubkey,
    ) -> Result<TokenAmount, SdkError> {
        self.token_accounts
            .lock()
            .map_err(|_| not_mocked("getTokenAccountBalance"))?
            .iter()
            .find(|a| a.pubkey == *token_account)
            .map(|a| TokenAmount {
                amount: a.amount,
                decimals: a.decimals,
            })
            .ok_or_else(|| SdkError::Rpc {
                code: -32602,
                message: "Invalid param: could not find account".into(),
            })
    }

    async fn get_parsed_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        filter: TokenAccountsFilter,
    ) -> Result<Vec<RpcTokenAccount>, SdkError> {
        Ok(self
            .token_accounts
            .lock()
            .map_err(|_| not_mocked("getTokenAccountsByOwner"))?
            .iter()
            .filter(|a| a.owner == *owner)
            .filter(|a| match filter {
                TokenAccountsFilter::Mint(mint) => a.mint == mint,
                TokenAccountsFilter::ProgramId(_) => true,
            })
            .cloned()
            .collect())
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, SdkError> {
        Ok(Self::rent_for(data_len))
    }

    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, SdkError> {
        Err(not_mocked("getLatestBlockhash"))
    }

    async fn get_block_height(&self) -> Result<u64, SdkError> {
        Err(not_mocked("getBlockHeight"))
    }

    async fn send_transaction(&self, _wire_transaction: &[u8]) -> Result<Signature, SdkError> {
        Err(not_mocked("sendTransaction"))
    }

    async fn get_signature_statuses(
        &self,
        _signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, SdkError> {
        Err(not_mocked("getSignatureStatuses"))
    }
}
