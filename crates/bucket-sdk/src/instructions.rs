//! Instruction builders for the bucket program.
//!
//! Each builder emits the Anchor discriminator, Borsh arguments and the
//! account list in the exact order the program's account structs declare.

use sol_wire::{Pubkey, SolAccountMeta, SolInstruction, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};

use crate::anchor::ArgWriter;
use crate::config::ProgramIds;
use crate::state::Collateral;

/// Bumps stored on the accounts `create_bucket` initializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateBucketBumps {
    pub bucket: u8,
    pub crate_token: u8,
    pub issue_authority: u8,
    pub withdraw_authority: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateBucketAccounts {
    pub payer: Pubkey,
    pub bucket: Pubkey,
    pub issue_authority: Pubkey,
    pub withdraw_authority: Pubkey,
    pub crate_mint: Pubkey,
    pub crate_token: Pubkey,
    pub rebalance_authority: Pubkey,
}

pub fn create_bucket(
    program_ids: &ProgramIds,
    accounts: &CreateBucketAccounts,
    bumps: CreateBucketBumps,
) -> SolInstruction {
    let data = ArgWriter::new("create_bucket")
        .u8(bumps.bucket)
        .u8(bumps.crate_token)
        .u8(bumps.issue_authority)
        .u8(bumps.withdraw_authority)
        .finish();

    SolInstruction {
        program_id: program_ids.bucket,
        accounts: vec![
            SolAccountMeta::writable_signer(accounts.payer),
            SolAccountMeta::writable(accounts.bucket),
            SolAccountMeta::writable(accounts.issue_authority),
            SolAccountMeta::writable(accounts.withdraw_authority),
            SolAccountMeta::readonly(accounts.crate_mint),
            SolAccountMeta::writable(accounts.crate_token),
            SolAccountMeta::readonly(accounts.rebalance_authority),
            SolAccountMeta::readonly(SYSTEM_PROGRAM_ID),
            SolAccountMeta::readonly(program_ids.crate_token),
        ],
        data,
    }
}

/// Accounts shared by every authority-gated bucket update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizedUpdateAccounts {
    pub authority: Pubkey,
    pub bucket: Pubkey,
    pub crate_token: Pubkey,
}

impl AuthorizedUpdateAccounts {
    fn metas(&self) -> Vec<SolAccountMeta> {
        vec![
            SolAccountMeta::readonly_signer(self.authority),
            SolAccountMeta::writable(self.bucket),
            SolAccountMeta::readonly(self.crate_token),
        ]
    }
}

fn authorized_update(
    program_ids: &ProgramIds,
    accounts: &AuthorizedUpdateAccounts,
    data: Vec<u8>,
) -> SolInstruction {
    SolInstruction {
        program_id: program_ids.bucket,
        accounts: accounts.metas(),
        data,
    }
}

pub fn authorize_collateral(
    program_ids: &ProgramIds,
    accounts: &AuthorizedUpdateAccounts,
    mint: &Pubkey,
    allocation_bps: u16,
) -> SolInstruction {
    let data = ArgWriter::new("authorize_collateral")
        .pubkey(mint)
        .u16(allocation_bps)
        .finish();
    authorized_update(program_ids, accounts, data)
}

pub fn remove_collateral(
    program_ids: &ProgramIds,
    accounts: &AuthorizedUpdateAccounts,
    mint: &Pubkey,
) -> SolInstruction {
    let data = ArgWriter::new("remove_collateral").pubkey(mint).finish();
    authorized_update(program_ids, accounts, data)
}

pub fn set_collateral_allocations(
    program_ids: &ProgramIds,
    accounts: &AuthorizedUpdateAccounts,
    allocations: &[Collateral],
) -> SolInstruction {
    let data = ArgWriter::new("set_collateral_allocations")
        .vec(allocations, Collateral::write)
        .finish();
    authorized_update(program_ids, accounts, data)
}

pub fn update_rebalance_authority(
    program_ids: &ProgramIds,
    accounts: &AuthorizedUpdateAccounts,
    rebalance_authority: &Pubkey,
) -> SolInstruction {
    let data = ArgWriter::new("update_rebalance_authority")
        .pubkey(rebalance_authority)
        .finish();
    authorized_update(program_ids, accounts, data)
}

/// The `common` account group of deposit and redeem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonAccounts {
    pub bucket: Pubkey,
    pub crate_token: Pubkey,
    pub crate_mint: Pubkey,
}

impl CommonAccounts {
    fn metas(&self, program_ids: &ProgramIds) -> [SolAccountMeta; 6] {
        [
            SolAccountMeta::readonly(self.bucket),
            SolAccountMeta::readonly(self.crate_token),
            SolAccountMeta::writable(self.crate_mint),
            SolAccountMeta::readonly(program_ids.crate_token),
            SolAccountMeta::readonly(SYSTEM_PROGRAM_ID),
            SolAccountMeta::readonly(TOKEN_PROGRAM_ID),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositAccounts {
    pub depositor: Pubkey,
    pub common: CommonAccounts,
    pub issue_authority: Pubkey,
    pub crate_collateral: Pubkey,
    pub depositor_collateral: Pubkey,
    pub depositor_reserve: Pubkey,
    pub collateral_mint: Pubkey,
    pub oracle: Pubkey,
}

pub fn deposit(program_ids: &ProgramIds, accounts: &DepositAccounts, amount: u64) -> SolInstruction {
    let mut metas = Vec::with_capacity(13);
    metas.push(SolAccountMeta::readonly_signer(accounts.depositor));
    metas.extend(accounts.common.metas(program_ids));
    metas.extend([
        SolAccountMeta::readonly(accounts.issue_authority),
        SolAccountMeta::writable(accounts.crate_collateral),
        SolAccountMeta::writable(accounts.depositor_collateral),
        SolAccountMeta::writable(accounts.depositor_reserve),
        SolAccountMeta::readonly(accounts.collateral_mint),
        SolAccountMeta::readonly(accounts.oracle),
    ]);

    SolInstruction {
        program_id: program_ids.bucket,
        accounts: metas,
        data: ArgWriter::new("deposit").u64(amount).finish(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemAccounts {
    pub withdrawer: Pubkey,
    pub common: CommonAccounts,
    pub withdraw_authority: Pubkey,
    pub withdrawer_reserve: Pubkey,
}

/// Per-collateral remaining accounts for `redeem`.
///
/// The program reads five accounts per mint; the last three are the owner's
/// account plus two fee destinations, which all point at the owner's account
/// while the program charges no fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemCollateralAccounts {
    pub mint: Pubkey,
    pub crate_ata: Pubkey,
    pub owner_ata: Pubkey,
}

impl RedeemCollateralAccounts {
    pub fn metas(&self) -> [SolAccountMeta; 5] {
        [
            SolAccountMeta::writable(self.mint),
            SolAccountMeta::writable(self.crate_ata),
            SolAccountMeta::writable(self.owner_ata),
            SolAccountMeta::writable(self.owner_ata),
            SolAccountMeta::writable(self.owner_ata),
        ]
    }
}

pub fn redeem(
    program_ids: &ProgramIds,
    accounts: &RedeemAccounts,
    amount: u64,
    collateral: &[RedeemCollateralAccounts],
) -> SolInstruction {
    let mut metas = Vec::with_capacity(9 + collateral.len() * 5);
    metas.push(SolAccountMeta::readonly_signer(accounts.withdrawer));
    metas.extend(accounts.common.metas(program_ids));
    metas.push(SolAccountMeta::readonly(accounts.withdraw_authority));
    metas.push(SolAccountMeta::writable(accounts.withdrawer_reserve));
    metas.extend(collateral.iter().flat_map(RedeemCollateralAccounts::metas));

    SolInstruction {
        program_id: program_ids.bucket,
        accounts: metas,
        data: ArgWriter::new("redeem").u64(amount).finish(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceAccounts {
    pub payer: Pubkey,
    pub bucket: Pubkey,
    pub crate_token: Pubkey,
    pub withdraw_authority: Pubkey,
    pub swap: Pubkey,
    pub swap_authority: Pubkey,
    pub user_authority: Pubkey,
    pub input_a_reserve: Pubkey,
    pub output_b_reserve: Pubkey,
    pub output_b_fees: Pubkey,
    pub pool_mint: Pubkey,
    pub swap_program: Pubkey,
}

/// One swap leg: token A out of the crate, token B back in, each staged
/// through the bucket's own account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceLeg {
    pub token_a: Pubkey,
    pub token_b: Pubkey,
    pub crate_source: Pubkey,
    pub bucket_source: Pubkey,
    pub crate_destination: Pubkey,
    pub bucket_destination: Pubkey,
}

impl RebalanceLeg {
    pub fn metas(&self) -> [SolAccountMeta; 6] {
        [
            SolAccountMeta::writable(self.token_a),
            SolAccountMeta::writable(self.token_b),
            SolAccountMeta::writable(self.crate_source),
            SolAccountMeta::writable(self.bucket_source),
            SolAccountMeta::writable(self.crate_destination),
            SolAccountMeta::writable(self.bucket_destination),
        ]
    }
}

pub fn rebalance(
    program_ids: &ProgramIds,
    accounts: &RebalanceAccounts,
    amount_in: u64,
    minimum_amount_out: u64,
    legs: &[RebalanceLeg],
) -> SolInstruction {
    let mut metas = vec![
        SolAccountMeta::readonly_signer(accounts.payer),
        SolAccountMeta::readonly(accounts.bucket),
        SolAccountMeta::writable(accounts.crate_token),
        SolAccountMeta::readonly(accounts.withdraw_authority),
        SolAccountMeta::readonly(accounts.swap),
        SolAccountMeta::readonly(accounts.swap_authority),
        SolAccountMeta::readonly_signer(accounts.user_authority),
        SolAccountMeta::writable(accounts.input_a_reserve),
        SolAccountMeta::writable(accounts.output_b_reserve),
        SolAccountMeta::writable(accounts.output_b_fees),
        SolAccountMeta::writable(accounts.pool_mint),
        SolAccountMeta::readonly(program_ids.crate_token),
        SolAccountMeta::readonly(accounts.swap_program),
        SolAccountMeta::readonly(TOKEN_PROGRAM_ID),
    ];
    metas.extend(legs.iter().flat_map(RebalanceLeg::metas));

    SolInstruction {
        program_id: program_ids.bucket,
        accounts: metas,
        data: ArgWriter::new("rebalance")
            .u64(amount_in)
            .u64(minimum_amount_out)
            .finish(),
    }
}
