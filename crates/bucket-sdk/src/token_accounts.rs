//! Token account helpers: find-or-create associated token accounts and mint
//! setup instructions.
//!
//! Account creation always uses the Associated Token program's
//! `CreateIdempotent` instruction. Between the existence check here and the
//! transaction landing, someone else may create the same account; with
//! `CreateIdempotent` both transactions still succeed.

use std::collections::BTreeMap;

use sol_wire::{
    create_account, create_associated_token_account_idempotent, derive_associated_token_address,
    initialize_mint, mint_to, Pubkey, SolInstruction, MINT_SIZE, TOKEN_PROGRAM_ID,
};
use tracing::debug;

use crate::error::SdkError;
use crate::rpc::RpcClient;

/// Associated token account address, plus the instruction that creates it
/// when it did not exist at lookup time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtaResult {
    pub address: Pubkey,
    pub instruction: Option<SolInstruction>,
}

/// Batch form of [`AtaResult`].
///
/// `addresses` is keyed by the Base58 mint; `instructions` is positional with
/// the input mints, `None` where the account already existed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtasResult {
    pub addresses: BTreeMap<String, Pubkey>,
    pub instructions: Vec<Option<SolInstruction>>,
}

impl AtasResult {
    /// The account for `mint`, or [`SdkError::MissingAssociatedTokenAccount`].
    pub fn address(&self, mint: &Pubkey) -> Result<Pubkey, SdkError> {
        self.addresses
            .get(&mint.to_string())
            .copied()
            .ok_or_else(|| SdkError::MissingAssociatedTokenAccount(mint.to_string()))
    }
}

pub fn find_associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey, SdkError> {
    Ok(derive_associated_token_address(owner, mint)?)
}

pub async fn get_or_create_ata(
    rpc: &dyn RpcClient,
    mint: &Pubkey,
    owner: &Pubkey,
    payer: &Pubkey,
) -> Result<AtaResult, SdkError> {
    let address = find_associated_token_address(owner, mint)?;
    let instruction = if rpc.get_account_info(&address).await?.is_some() {
        None
    } else {
        debug!(%owner, %mint, %address, "associated token account missing");
        Some(create_associated_token_account_idempotent(
            payer, &address, owner, mint,
        ))
    };
    Ok(AtaResult {
        address,
        instruction,
    })
}

pub async fn get_or_create_atas(
    rpc: &dyn RpcClient,
    mints: &[Pubkey],
    owner: &Pubkey,
    payer: &Pubkey,
) -> Result<AtasResult, SdkError> {
    let mut result = AtasResult::default();
    for mint in mints {
        let ata = get_or_create_ata(rpc, mint, owner, payer).await?;
        result.addresses.insert(mint.to_string(), ata.address);
        result.instructions.push(ata.instruction);
    }
    Ok(result)
}

/// Append `instruction` if present.
pub fn push_instruction(instruction: Option<SolInstruction>, out: &mut Vec<SolInstruction>) {
    out.extend(instruction);
}

/// Collect the creation instructions of several lookups, in order.
pub fn flatten_instructions<'a>(
    results: impl IntoIterator<Item = &'a AtaResult>,
) -> Vec<SolInstruction> {
    results
        .into_iter()
        .filter_map(|r| r.instruction.clone())
        .collect()
}

/// Ensure `owner` has an account for `mint` and optionally mint `amount` into
/// it. `payer` must be the mint authority when `amount > 0`.
pub async fn init_token_account(
    rpc: &dyn RpcClient,
    mint: &Pubkey,
    owner: &Pubkey,
    payer: &Pubkey,
    amount: u64,
) -> Result<Vec<SolInstruction>, SdkError> {
    let ata = get_or_create_ata(rpc, mint, owner, payer).await?;
    let mut instructions = Vec::with_capacity(2);
    push_instruction(ata.instruction, &mut instructions);
    if amount > 0 {
        instructions.push(mint_to(mint, &ata.address, payer, amount)?);
    }
    Ok(instructions)
}

/// `CreateAccount` for a rent-exempt mint followed by `InitializeMint`.
///
/// The new `mint` account has to sign the transaction.
pub async fn create_mint_instructions(
    rpc: &dyn RpcClient,
    payer: &Pubkey,
    mint: &Pubkey,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
    decimals: u8,
) -> Result<Vec<SolInstruction>, SdkError> {
    let lamports = rpc.get_minimum_balance_for_rent_exemption(MINT_SIZE).await?;
    Ok(vec![
        create_account(payer, mint, lamports, MINT_SIZE as u64, &TOKEN_PROGRAM_ID),
        initialize_mint(mint, decimals, mint_authority, freeze_authority),
    ])
}
