//! `BucketClient`: builds, signs and submits bucket program transactions and
//! reads back program and token state.
//!
//! The client's wallet pays every transaction fee. Operations also take a
//! [`Payer`]: when it is a keypair it co-signs, when it is an address the
//! wallet has to be that address. Reads are never cached.

use std::sync::Arc;
use std::time::Duration;

use sol_wire::{
    compile_transaction, sign_transaction, transfer, Keypair, Mint, Pubkey, Signature, Signer,
    SolInstruction, TOKEN_PROGRAM_ID,
};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ProgramIds};
use crate::error::SdkError;
use crate::instructions::{
    self, AuthorizedUpdateAccounts, CommonAccounts, CreateBucketAccounts, CreateBucketBumps,
    DepositAccounts, RebalanceAccounts, RebalanceLeg, RedeemAccounts, RedeemCollateralAccounts,
};
use crate::pda::BucketAddresses;
use crate::rpc::{program_rejection, Account, HttpRpcClient, RpcClient, TokenAccountsFilter};
use crate::signer::{get_signers_from_payer, Payer, SignerInfo};
use crate::state::{
    AuthorityAccount, Bucket, Collateral, CollateralAllocationResult, ParsedTokenAccount, MAX_BPS,
};
use crate::swap::{compute_swap_amounts, SaberRegistry, SwapPool, SwapRegistry};
use crate::token_accounts::{
    create_mint_instructions, flatten_instructions, get_or_create_ata, get_or_create_atas,
    push_instruction,
};

/// Result of [`BucketClient::create_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateBucketResult {
    pub signature: Signature,
    pub addresses: BucketAddresses,
    pub rebalance_authority: Pubkey,
}

/// Parameters of a single rebalance swap from `token_a` into `token_b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceConfig {
    pub amount_in: u64,
    pub max_slippage_bps: u16,
    pub token_a: Pubkey,
    pub token_b: Pubkey,
    /// Skips the registry lookup, e.g. for pools deployed on localnet.
    pub swap_pool: Option<SwapPool>,
}

/// Result of [`BucketClient::rebalance_unauthorized_collateral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnauthorizedRebalance {
    pub credited_mint: Pubkey,
    pub signature: Signature,
}

pub struct BucketClient {
    config: ClientConfig,
    rpc: Arc<dyn RpcClient>,
    wallet: Arc<dyn Signer>,
    swap_registry: Arc<dyn SwapRegistry>,
}

impl std::fmt::Debug for BucketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketClient")
            .field("cluster", &self.config.cluster)
            .field("wallet", &self.wallet.pubkey())
            .field("rpc", &self.rpc)
            .finish_non_exhaustive()
    }
}

impl BucketClient {
    pub fn new(
        config: ClientConfig,
        rpc: Arc<dyn RpcClient>,
        wallet: Arc<dyn Signer>,
        swap_registry: Arc<dyn SwapRegistry>,
    ) -> Self {
        Self {
            config,
            rpc,
            wallet,
            swap_registry,
        }
    }

    /// Client over HTTP JSON-RPC and the Saber registry.
    pub fn connect(config: ClientConfig, wallet: Arc<dyn Signer>) -> Result<Self, SdkError> {
        let rpc = Arc::new(HttpRpcClient::new(&config)?);
        let registry = Arc::new(SaberRegistry::new(config.request_timeout_secs)?);
        info!(cluster = %config.cluster, url = rpc.url(), wallet = %wallet.pubkey(), "bucket client ready");
        Ok(Self::new(config, rpc, wallet, registry))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn program_ids(&self) -> &ProgramIds {
        &self.config.program_ids
    }

    pub fn rpc(&self) -> &dyn RpcClient {
        self.rpc.as_ref()
    }

    pub fn wallet_pubkey(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    pub fn addresses(&self, reserve: &Pubkey) -> Result<BucketAddresses, SdkError> {
        BucketAddresses::derive(reserve, &self.config.program_ids)
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Compile, sign, submit and confirm `instructions` with the wallet as fee
    /// payer. Every signer account must be the wallet or one of `signers`.
    pub async fn send_and_confirm(
        &self,
        instructions: &[SolInstruction],
        signers: &[&dyn Signer],
    ) -> Result<Signature, SdkError> {
        let latest = self.rpc.get_latest_blockhash().await?;
        let tx = compile_transaction(instructions, &self.wallet.pubkey(), &latest.blockhash)?;

        let mut all_signers: Vec<&dyn Signer> = Vec::with_capacity(signers.len() + 1);
        all_signers.push(self.wallet.as_ref());
        all_signers.extend_from_slice(signers);

        if let Some(missing) = tx
            .signer_keys()
            .iter()
            .find(|key| !all_signers.iter().any(|s| s.pubkey() == **key))
        {
            return Err(SdkError::MissingSignature(missing.to_string()));
        }

        let signed = sign_transaction(&tx, &all_signers)?;
        debug!(
            instructions = instructions.len(),
            signers = signed.signatures.len(),
            "submitting transaction"
        );
        let signature = match self.rpc.send_transaction(&signed.to_wire()).await {
            Ok(sig) => sig,
            Err(err @ SdkError::ProgramRejected { .. }) => {
                warn!(error = %err, "transaction rejected in preflight");
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        info!(%signature, "transaction submitted");

        self.confirm(&signature, latest.last_valid_block_height).await?;
        Ok(signature)
    }

    /// Poll until `signature` reaches the configured commitment.
    ///
    /// Blockhash expiry only ends the wait while the transaction has not been
    /// seen. Once it has landed without error it can no longer expire, so the
    /// wait continues until the commitment is reached.
    async fn confirm(&self, signature: &Signature, last_valid_block_height: u64) -> Result<(), SdkError> {
        let poll = Duration::from_millis(self.config.confirm_poll_interval_ms);
        let mut landed = false;
        loop {
            let status = self
                .rpc
                .get_signature_statuses(std::slice::from_ref(signature))
                .await?
                .into_iter()
                .next()
                .flatten();

            if let Some(status) = status {
                if let Some(err) = &status.err {
                    warn!(%signature, error = %err, "transaction failed");
                    return Err(program_rejection(err, Vec::new()));
                }
                if status.satisfies(self.config.commitment) {
                    info!(%signature, slot = status.slot, "transaction confirmed");
                    return Ok(());
                }
                if !landed {
                    debug!(%signature, slot = status.slot, "transaction landed, awaiting commitment");
                    landed = true;
                }
            }

            if !landed && self.rpc.get_block_height().await? > last_valid_block_height {
                return Err(SdkError::TransactionExpired(signature.to_string()));
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn submit(
        &self,
        instructions: &[SolInstruction],
        signer_info: &SignerInfo,
        extra: &[&dyn Signer],
    ) -> Result<Signature, SdkError> {
        let mut signers: Vec<&dyn Signer> = extra.to_vec();
        signers.extend(signer_info.signers.iter().map(|k| k as &dyn Signer));
        self.send_and_confirm(instructions, &signers).await
    }

    // -----------------------------------------------------------------------
    // Bucket lifecycle
    // -----------------------------------------------------------------------

    /// Create the reserve mint, the crate token's reserve account and the
    /// bucket. The reserve keypair becomes the mint and co-signs; the payer
    /// becomes the bucket's authority and rebalance authority.
    pub async fn create_bucket(
        &self,
        reserve: &Keypair,
        payer: impl Into<Payer>,
        decimals: u8,
    ) -> Result<CreateBucketResult, SdkError> {
        let info = get_signers_from_payer(payer);
        let reserve_mint = reserve.pubkey();
        let addresses = self.addresses(&reserve_mint)?;
        let crate_token = addresses.crate_token.address;

        let crate_ata = get_or_create_ata(self.rpc(), &reserve_mint, &crate_token, &info.payer).await?;

        let mut ixs = create_mint_instructions(
            self.rpc(),
            &info.payer,
            &reserve_mint,
            &crate_token,
            Some(&crate_token),
            decimals,
        )
        .await?;
        push_instruction(crate_ata.instruction, &mut ixs);
        ixs.push(instructions::create_bucket(
            self.program_ids(),
            &CreateBucketAccounts {
                payer: info.payer,
                bucket: addresses.bucket.address,
                issue_authority: addresses.issue_authority.address,
                withdraw_authority: addresses.withdraw_authority.address,
                crate_mint: reserve_mint,
                crate_token,
                rebalance_authority: info.payer,
            },
            CreateBucketBumps {
                bucket: addresses.bucket.bump,
                crate_token: addresses.crate_token.bump,
                issue_authority: addresses.issue_authority.bump,
                withdraw_authority: addresses.withdraw_authority.bump,
            },
        ));

        let signature = self.submit(&ixs, &info, &[reserve as &dyn Signer]).await?;
        info!(bucket = %addresses.bucket.address, reserve = %reserve_mint, "bucket created");
        Ok(CreateBucketResult {
            signature,
            addresses,
            rebalance_authority: info.payer,
        })
    }

    fn authorized_update(
        &self,
        reserve: &Pubkey,
        payer: impl Into<Payer>,
    ) -> Result<(AuthorizedUpdateAccounts, SignerInfo), SdkError> {
        let info = get_signers_from_payer(payer);
        let addresses = self.addresses(reserve)?;
        Ok((
            AuthorizedUpdateAccounts {
                authority: info.payer,
                bucket: addresses.bucket.address,
                crate_token: addresses.crate_token.address,
            },
            info,
        ))
    }

    pub async fn update_rebalance_authority(
        &self,
        reserve: &Pubkey,
        rebalance_authority: &Pubkey,
        payer: impl Into<Payer>,
    ) -> Result<Signature, SdkError> {
        let (accounts, info) = self.authorized_update(reserve, payer)?;
        let ix = instructions::update_rebalance_authority(self.program_ids(), &accounts, rebalance_authority);
        self.submit(&[ix], &info, &[]).await
    }

    /// Whitelist `collateral_mint` with a target share of `allocation_bps`.
    /// The program rejects allocations that would push the total past 100%.
    pub async fn authorize_collateral(
        &self,
        collateral_mint: &Pubkey,
        allocation_bps: u16,
        reserve: &Pubkey,
        payer: impl Into<Payer>,
    ) -> Result<Signature, SdkError> {
        let (accounts, info) = self.authorized_update(reserve, payer)?;
        let ix = instructions::authorize_collateral(
            self.program_ids(),
            &accounts,
            collateral_mint,
            allocation_bps,
        );
        self.submit(&[ix], &info, &[]).await
    }

    pub async fn remove_collateral(
        &self,
        reserve: &Pubkey,
        collateral_mint: &Pubkey,
        payer: impl Into<Payer>,
    ) -> Result<Signature, SdkError> {
        let (accounts, info) = self.authorized_update(reserve, payer)?;
        let ix = instructions::remove_collateral(self.program_ids(), &accounts, collateral_mint);
        self.submit(&[ix], &info, &[]).await
    }

    pub async fn set_collateral_allocations(
        &self,
        reserve: &Pubkey,
        allocations: &[Collateral],
        payer: impl Into<Payer>,
    ) -> Result<Signature, SdkError> {
        let (accounts, info) = self.authorized_update(reserve, payer)?;
        let ix = instructions::set_collateral_allocations(self.program_ids(), &accounts, allocations);
        self.submit(&[ix], &info, &[]).await
    }

    // -----------------------------------------------------------------------
    // Deposit / redeem
    // -----------------------------------------------------------------------

    fn common_accounts(addresses: &BucketAddresses) -> CommonAccounts {
        CommonAccounts {
            bucket: addresses.bucket.address,
            crate_token: addresses.crate_token.address,
            crate_mint: addresses.reserve_mint,
        }
    }

    /// Deposit `amount` of `collateral_mint` and receive reserve tokens.
    /// Missing token accounts are created in the same transaction.
    pub async fn deposit(
        &self,
        amount: u64,
        reserve: &Pubkey,
        collateral_mint: &Pubkey,
        depositor: impl Into<Payer>,
        oracle: &Pubkey,
    ) -> Result<Signature, SdkError> {
        let info = get_signers_from_payer(depositor);
        let addresses = self.addresses(reserve)?;
        let crate_token = addresses.crate_token.address;

        let depositor_collateral =
            get_or_create_ata(self.rpc(), collateral_mint, &info.payer, &info.payer).await?;
        let depositor_reserve = get_or_create_ata(self.rpc(), reserve, &info.payer, &info.payer).await?;
        let crate_collateral =
            get_or_create_ata(self.rpc(), collateral_mint, &crate_token, &info.payer).await?;

        let mut ixs =
            flatten_instructions([&depositor_collateral, &depositor_reserve, &crate_collateral]);
        ixs.push(instructions::deposit(
            self.program_ids(),
            &DepositAccounts {
                depositor: info.payer,
                common: Self::common_accounts(&addresses),
                issue_authority: addresses.issue_authority.address,
                crate_collateral: crate_collateral.address,
                depositor_collateral: depositor_collateral.address,
                depositor_reserve: depositor_reserve.address,
                collateral_mint: *collateral_mint,
                oracle: *oracle,
            },
            amount,
        ));

        debug!(amount, %reserve, collateral = %collateral_mint, "deposit");
        self.submit(&ixs, &info, &[]).await
    }

    /// Burn `amount` reserve tokens for a pro-rata share of every mint in
    /// `collateral_mints`.
    pub async fn redeem(
        &self,
        amount: u64,
        reserve: &Pubkey,
        collateral_mints: &[Pubkey],
        withdrawer: impl Into<Payer>,
    ) -> Result<Signature, SdkError> {
        let info = get_signers_from_payer(withdrawer);
        let addresses = self.addresses(reserve)?;
        let crate_token = addresses.crate_token.address;

        let mut ixs = Vec::new();
        let withdrawer_reserve = get_or_create_ata(self.rpc(), reserve, &info.payer, &info.payer).await?;
        push_instruction(withdrawer_reserve.instruction, &mut ixs);

        let owner_atas = get_or_create_atas(self.rpc(), collateral_mints, &info.payer, &info.payer).await?;
        owner_atas
            .instructions
            .iter()
            .for_each(|ix| push_instruction(ix.clone(), &mut ixs));

        let crate_atas = get_or_create_atas(self.rpc(), collateral_mints, &crate_token, &info.payer).await?;
        crate_atas
            .instructions
            .iter()
            .for_each(|ix| push_instruction(ix.clone(), &mut ixs));

        let remaining = collateral_mints
            .iter()
            .map(|mint| {
                Ok(RedeemCollateralAccounts {
                    mint: *mint,
                    crate_ata: crate_atas.address(mint)?,
                    owner_ata: owner_atas.address(mint)?,
                })
            })
            .collect::<Result<Vec<_>, SdkError>>()?;

        ixs.push(instructions::redeem(
            self.program_ids(),
            &RedeemAccounts {
                withdrawer: info.payer,
                common: Self::common_accounts(&addresses),
                withdraw_authority: addresses.withdraw_authority.address,
                withdrawer_reserve: withdrawer_reserve.address,
            },
            amount,
            &remaining,
        ));

        debug!(amount, %reserve, mints = collateral_mints.len(), "redeem");
        self.submit(&ixs, &info, &[]).await
    }

    // -----------------------------------------------------------------------
    // Rebalancing
    // -----------------------------------------------------------------------

    /// Swap crate-held `token_a` into `token_b` through a stable swap pool.
    /// Only the bucket's rebalance authority may do this.
    pub async fn rebalance(
        &self,
        rebalance: RebalanceConfig,
        reserve: &Pubkey,
        payer: impl Into<Payer>,
    ) -> Result<Signature, SdkError> {
        let info = get_signers_from_payer(payer);
        let addresses = self.addresses(reserve)?;
        let crate_token = addresses.crate_token.address;
        let bucket = addresses.bucket.address;

        let pool = match rebalance.swap_pool {
            Some(pool) => pool,
            None => {
                self.swap_registry
                    .find_pool(self.config.cluster, &rebalance.token_a, &rebalance.token_b)
                    .await?
            }
        };
        let (input, output) = pool.oriented(&rebalance.token_a)?;
        if output.mint != rebalance.token_b {
            return Err(SdkError::InvalidArgument(format!(
                "pool {} does not trade {}",
                pool.swap_account, rebalance.token_b
            )));
        }

        let crate_source = get_or_create_ata(self.rpc(), &rebalance.token_a, &crate_token, &info.payer).await?;
        let bucket_source = get_or_create_ata(self.rpc(), &rebalance.token_a, &bucket, &info.payer).await?;
        let crate_destination =
            get_or_create_ata(self.rpc(), &rebalance.token_b, &crate_token, &info.payer).await?;
        let bucket_destination =
            get_or_create_ata(self.rpc(), &rebalance.token_b, &bucket, &info.payer).await?;

        let amounts = compute_swap_amounts(rebalance.amount_in, rebalance.max_slippage_bps)?;

        let mut ixs = flatten_instructions([
            &crate_source,
            &bucket_source,
            &crate_destination,
            &bucket_destination,
        ]);
        ixs.push(instructions::rebalance(
            self.program_ids(),
            &RebalanceAccounts {
                payer: info.payer,
                bucket,
                crate_token,
                withdraw_authority: addresses.withdraw_authority.address,
                swap: pool.swap_account,
                swap_authority: pool.authority,
                user_authority: info.payer,
                input_a_reserve: input.reserve,
                output_b_reserve: output.reserve,
                output_b_fees: output.admin_fee_account,
                pool_mint: pool.pool_mint,
                swap_program: pool.swap_program,
            },
            amounts.amount_in,
            amounts.min_amount_out,
            &[RebalanceLeg {
                token_a: rebalance.token_a,
                token_b: rebalance.token_b,
                crate_source: crate_source.address,
                bucket_source: bucket_source.address,
                crate_destination: crate_destination.address,
                bucket_destination: bucket_destination.address,
            }],
        ));

        debug!(
            token_a = %rebalance.token_a,
            token_b = %rebalance.token_b,
            amount_in = amounts.amount_in,
            min_amount_out = amounts.min_amount_out,
            "rebalance"
        );
        self.submit(&ixs, &info, &[]).await
    }

    /// Swap the crate's whole balance of a no-longer-authorized mint into the
    /// authorized collateral that is furthest below its target share. A
    /// collateral whose shortfall exceeds the balance being moved is taken
    /// immediately. The program picks the amount.
    pub async fn rebalance_unauthorized_collateral(
        &self,
        mint_to_remove: &Pubkey,
        reserve: &Pubkey,
        payer: impl Into<Payer>,
        swap_pool: Option<SwapPool>,
    ) -> Result<UnauthorizedRebalance, SdkError> {
        let addresses = self.addresses(reserve)?;
        let crate_token = addresses.crate_token.address;
        let bucket = self.fetch_bucket(&addresses.bucket.address).await?;

        if bucket.collateral.is_empty() {
            return Err(SdkError::InvalidArgument(
                "no authorized collateral to swap into".into(),
            ));
        }
        if bucket.is_authorized(mint_to_remove) {
            return Err(SdkError::InvalidArgument(format!(
                "{mint_to_remove} is an authorized mint"
            )));
        }

        let amount_to_remove = self
            .fetch_parsed_token_accounts_by_mints(std::slice::from_ref(mint_to_remove), &crate_token)
            .await?
            .first()
            .map_or(0, |a| a.amount) as i128;
        let holdings = self
            .fetch_parsed_token_accounts_by_mints(&bucket.collateral_mints(), &crate_token)
            .await?;
        let reserve_supply = self.fetch_mint(reserve).await?.supply as i128;

        let mut best: Option<(Pubkey, i128)> = None;
        for holding in &holdings {
            let allocation = bucket.allocation_of(&holding.mint).unwrap_or(0) as i128;
            let shortfall = reserve_supply * allocation / MAX_BPS as i128 - holding.amount as i128;
            if shortfall > amount_to_remove {
                best = Some((holding.mint, shortfall));
                break;
            }
            if shortfall > best.map_or(0, |(_, s)| s) {
                best = Some((holding.mint, shortfall));
            }
        }
        let (credited_mint, shortfall) = best.ok_or_else(|| {
            SdkError::InvalidArgument("no authorized collateral is below its target allocation".into())
        })?;
        debug!(%credited_mint, %shortfall, "selected collateral to credit");

        let signature = self
            .rebalance(
                RebalanceConfig {
                    amount_in: 0,
                    max_slippage_bps: 0,
                    token_a: *mint_to_remove,
                    token_b: credited_mint,
                    swap_pool,
                },
                reserve,
                payer,
            )
            .await?;
        Ok(UnauthorizedRebalance {
            credited_mint,
            signature,
        })
    }

    /// Transfer lamports from the wallet.
    pub async fn fund_wallet(&self, to: &Pubkey, lamports: u64) -> Result<Signature, SdkError> {
        let ix = transfer(&self.wallet.pubkey(), to, lamports);
        self.send_and_confirm(&[ix], &[]).await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    async fn fetch_program_account(&self, address: &Pubkey) -> Result<Account, SdkError> {
        let account = self
            .rpc
            .get_account_info(address)
            .await?
            .ok_or_else(|| SdkError::AccountNotFound(address.to_string()))?;
        if account.owner != self.config.program_ids.bucket {
            return Err(SdkError::InvalidAccountData(format!(
                "{address} is owned by {}, not the bucket program",
                account.owner
            )));
        }
        Ok(account)
    }

    pub async fn fetch_bucket(&self, address: &Pubkey) -> Result<Bucket, SdkError> {
        Bucket::decode(&self.fetch_program_account(address).await?.data)
    }

    pub async fn fetch_bucket_for_reserve(&self, reserve: &Pubkey) -> Result<Bucket, SdkError> {
        let addresses = self.addresses(reserve)?;
        self.fetch_bucket(&addresses.bucket.address).await
    }

    /// The issue authority of `reserve`'s bucket, which signs reserve mints.
    pub async fn fetch_issue_authority(&self, reserve: &Pubkey) -> Result<AuthorityAccount, SdkError> {
        let address = self.addresses(reserve)?.issue_authority.address;
        AuthorityAccount::decode_issue(&self.fetch_program_account(&address).await?.data)
    }

    pub async fn fetch_withdraw_authority(&self, reserve: &Pubkey) -> Result<AuthorityAccount, SdkError> {
        let address = self.addresses(reserve)?.withdraw_authority.address;
        AuthorityAccount::decode_withdraw(&self.fetch_program_account(&address).await?.data)
    }

    pub async fn fetch_mint(&self, mint: &Pubkey) -> Result<Mint, SdkError> {
        let account = self
            .rpc
            .get_account_info(mint)
            .await?
            .ok_or_else(|| SdkError::AccountNotFound(mint.to_string()))?;
        if account.owner != TOKEN_PROGRAM_ID {
            return Err(SdkError::InvalidAccountData(format!(
                "{mint} is not an SPL token mint"
            )));
        }
        Ok(Mint::unpack(&account.data)?)
    }

    /// Balance of `owner`'s associated account for `mint`, in base units.
    pub async fn fetch_token_balance(&self, mint: &Pubkey, owner: &Pubkey) -> Result<u64, SdkError> {
        let ata = crate::token_accounts::find_associated_token_address(owner, mint)?;
        Ok(self.rpc.get_token_account_balance(&ata).await?.amount)
    }

    pub async fn fetch_parsed_token_accounts(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<ParsedTokenAccount>, SdkError> {
        let accounts = self
            .rpc
            .get_parsed_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(TOKEN_PROGRAM_ID))
            .await?;
        Ok(accounts
            .into_iter()
            .map(|a| ParsedTokenAccount {
                mint: a.mint,
                owner: *owner,
                ata: a.pubkey,
                amount: a.amount,
                decimals: a.decimals,
            })
            .collect())
    }

    /// The first token account `owner` holds for each mint; mints without an
    /// account are skipped.
    pub async fn fetch_parsed_token_accounts_by_mints(
        &self,
        mints: &[Pubkey],
        owner: &Pubkey,
    ) -> Result<Vec<ParsedTokenAccount>, SdkError> {
        let mut out = Vec::with_capacity(mints.len());
        for mint in mints {
            let accounts = self
                .rpc
                .get_parsed_token_accounts_by_owner(owner, TokenAccountsFilter::Mint(*mint))
                .await?;
            if let Some(a) = accounts.into_iter().next() {
                out.push(ParsedTokenAccount {
                    mint: *mint,
                    owner: *owner,
                    ata: a.pubkey,
                    amount: a.amount,
                    decimals: a.decimals,
                });
            }
        }
        Ok(out)
    }

    /// Token accounts of `owner` for `mints`, or for every collateral mint the
    /// bucket authorizes when `mints` is `None`.
    pub async fn fetch_parsed_token_accounts_for_authorized_collateral(
        &self,
        bucket: &Pubkey,
        owner: &Pubkey,
        mints: Option<&[Pubkey]>,
    ) -> Result<Vec<ParsedTokenAccount>, SdkError> {
        match mints {
            Some(mints) => self.fetch_parsed_token_accounts_by_mints(mints, owner).await,
            None => {
                let mints = self.fetch_bucket(bucket).await?.collateral_mints();
                self.fetch_parsed_token_accounts_by_mints(&mints, owner).await
            }
        }
    }

    /// Crate holdings of every authorized collateral.
    pub async fn fetch_collateral_allocations(
        &self,
        bucket: &Pubkey,
        crate_token: &Pubkey,
    ) -> Result<CollateralAllocationResult, SdkError> {
        let accounts = self
            .fetch_parsed_token_accounts_for_authorized_collateral(bucket, crate_token, None)
            .await?;
        Ok(CollateralAllocationResult::from_accounts(&accounts))
    }

    /// Whether the crate holds a non-zero balance of any mint that is neither
    /// authorized collateral nor the reserve itself.
    pub async fn has_unauthorized_collateral(&self, reserve: &Pubkey) -> Result<bool, SdkError> {
        let addresses = self.addresses(reserve)?;
        let bucket = self.fetch_bucket(&addresses.bucket.address).await?;
        let held = self
            .fetch_parsed_token_accounts(&addresses.crate_token.address)
            .await?;
        Ok(held
            .iter()
            .any(|a| a.amount > 0 && a.mint != *reserve && !bucket.is_authorized(&a.mint)))
    }

    /// Lamport balance of `address`.
    pub async fn get_balance(&self, address: &Pubkey) -> Result<u64, SdkError> {
        self.rpc.get_balance(address).await
    }
}
