//! Decoded program and token account state.

use serde::Serialize;
use sol_wire::Pubkey;

use crate::anchor::{AccountReader, ArgWriter};
use crate::error::SdkError;

/// Basis points in 100%.
pub const MAX_BPS: u16 = 10_000;

const COLLATERAL_LEN: usize = 32 + 2;

/// One authorized collateral mint and its target share in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Collateral {
    pub mint: Pubkey,
    pub allocation: u16,
}

impl Collateral {
    pub(crate) fn write(w: ArgWriter, c: &Collateral) -> ArgWriter {
        w.pubkey(&c.mint).u16(c.allocation)
    }
}

/// The bucket program's `Bucket` account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub bump: u8,
    /// Reserve mint issued to depositors.
    pub crate_mint: Pubkey,
    pub crate_token: Pubkey,
    pub authority: Pubkey,
    pub rebalance_authority: Pubkey,
    pub collateral: Vec<Collateral>,
}

impl Bucket {
    pub const ACCOUNT_NAME: &'static str = "Bucket";

    pub fn decode(data: &[u8]) -> Result<Self, SdkError> {
        let mut r = AccountReader::new(data, Self::ACCOUNT_NAME)?;
        Ok(Self {
            bump: r.u8()?,
            crate_mint: r.pubkey()?,
            crate_token: r.pubkey()?,
            authority: r.pubkey()?,
            rebalance_authority: r.pubkey()?,
            collateral: r.vec(COLLATERAL_LEN, |r| {
                Ok(Collateral {
                    mint: r.pubkey()?,
                    allocation: r.u16()?,
                })
            })?,
        })
    }

    pub fn collateral_mints(&self) -> Vec<Pubkey> {
        self.collateral.iter().map(|c| c.mint).collect()
    }

    pub fn is_authorized(&self, mint: &Pubkey) -> bool {
        self.collateral.iter().any(|c| c.mint == *mint)
    }

    pub fn allocation_of(&self, mint: &Pubkey) -> Option<u16> {
        self.collateral
            .iter()
            .find(|c| c.mint == *mint)
            .map(|c| c.allocation)
    }

    /// Sum of all allocations; the program keeps this at or below [`MAX_BPS`].
    pub fn total_allocation_bps(&self) -> u32 {
        self.collateral.iter().map(|c| c.allocation as u32).sum()
    }
}

/// `IssueAuthority` and `WithdrawAuthority` both hold just their bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityAccount {
    pub bump: u8,
}

impl AuthorityAccount {
    pub fn decode_issue(data: &[u8]) -> Result<Self, SdkError> {
        Self::decode(data, "IssueAuthority")
    }

    pub fn decode_withdraw(data: &[u8]) -> Result<Self, SdkError> {
        Self::decode(data, "WithdrawAuthority")
    }

    fn decode(data: &[u8], name: &str) -> Result<Self, SdkError> {
        Ok(Self {
            bump: AccountReader::new(data, name)?.u8()?,
        })
    }
}

/// A token account as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTokenAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub ata: Pubkey,
    pub amount: u64,
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollateralAllocation {
    pub mint: Pubkey,
    pub supply: u64,
}

/// Holdings of each authorized collateral and their total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollateralAllocationResult {
    pub allocations: Vec<CollateralAllocation>,
    pub supply: u64,
}

impl CollateralAllocationResult {
    pub fn from_accounts(accounts: &[ParsedTokenAccount]) -> Self {
        let allocations: Vec<_> = accounts
            .iter()
            .map(|a| CollateralAllocation {
                mint: a.mint,
                supply: a.amount,
            })
            .collect();
        let supply = allocations.iter().map(|a| a.supply).fold(0u64, u64::saturating_add);
        Self {
            allocations,
            supply,
        }
    }
}
