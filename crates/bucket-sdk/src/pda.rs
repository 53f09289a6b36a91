//! Addresses the bucket and crate-token programs derive for a reserve mint.

use sol_wire::{find_program_address_with, PdaDerivation, Pubkey, Seed};
use tracing::debug;

use crate::config::ProgramIds;
use crate::error::SdkError;

pub const CRATE_TOKEN_SEED: &str = "CrateToken";
pub const BUCKET_SEED: &str = "bucket";
pub const ISSUE_AUTHORITY_SEED: &str = "issue";
pub const WITHDRAW_AUTHORITY_SEED: &str = "withdraw";

/// The crate token account for `reserve_mint`, owned by the crate-token program.
pub fn derive_crate_token(
    reserve_mint: &Pubkey,
    crate_token_program: &Pubkey,
) -> Result<PdaDerivation, SdkError> {
    Ok(find_program_address_with(
        &[Seed::from(CRATE_TOKEN_SEED), Seed::from(*reserve_mint)],
        crate_token_program,
    )?)
}

pub fn derive_bucket(
    crate_token: &Pubkey,
    bucket_program: &Pubkey,
) -> Result<PdaDerivation, SdkError> {
    Ok(find_program_address_with(
        &[Seed::from(BUCKET_SEED), Seed::from(*crate_token)],
        bucket_program,
    )?)
}

pub fn derive_issue_authority(
    bucket: &Pubkey,
    bucket_program: &Pubkey,
) -> Result<PdaDerivation, SdkError> {
    Ok(find_program_address_with(
        &[Seed::from(ISSUE_AUTHORITY_SEED), Seed::from(*bucket)],
        bucket_program,
    )?)
}

pub fn derive_withdraw_authority(
    bucket: &Pubkey,
    bucket_program: &Pubkey,
) -> Result<PdaDerivation, SdkError> {
    Ok(find_program_address_with(
        &[Seed::from(WITHDRAW_AUTHORITY_SEED), Seed::from(*bucket)],
        bucket_program,
    )?)
}

/// Every program address tied to one reserve mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketAddresses {
    pub reserve_mint: Pubkey,
    pub crate_token: PdaDerivation,
    pub bucket: PdaDerivation,
    pub issue_authority: PdaDerivation,
    pub withdraw_authority: PdaDerivation,
}

impl BucketAddresses {
    pub fn derive(reserve_mint: &Pubkey, program_ids: &ProgramIds) -> Result<Self, SdkError> {
        let crate_token = derive_crate_token(reserve_mint, &program_ids.crate_token)?;
        let bucket = derive_bucket(&crate_token.address, &program_ids.bucket)?;
        let issue_authority = derive_issue_authority(&bucket.address, &program_ids.bucket)?;
        let withdraw_authority = derive_withdraw_authority(&bucket.address, &program_ids.bucket)?;

        debug!(
            reserve = %reserve_mint,
            crate_token = %crate_token.address,
            bucket = %bucket.address,
            "derived bucket addresses"
        );

        Ok(Self {
            reserve_mint: *reserve_mint,
            crate_token,
            bucket,
            issue_authority,
            withdraw_authority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sol_wire::find_program_address;

    fn reserve() -> Pubkey {
        Pubkey::new_from_array([11u8; 32])
    }

    #[test]
    fn derivation_is_deterministic() {
        let ids = ProgramIds::default();
        assert_eq!(
            BucketAddresses::derive(&reserve(), &ids).unwrap(),
            BucketAddresses::derive(&reserve(), &ids).unwrap()
        );
    }

    #[test]
    fn bucket_is_seeded_by_crate_token() {
        let ids = ProgramIds::default();
        let addrs = BucketAddresses::derive(&reserve(), &ids).unwrap();

        let (crate_token, crate_bump) =
            find_program_address(&[b"CrateToken", reserve().as_ref()], &ids.crate_token).unwrap();
        assert_eq!(addrs.crate_token.address, crate_token);
        assert_eq!(addrs.crate_token.bump, crate_bump);

        let (bucket, _) =
            find_program_address(&[b"bucket", crate_token.as_ref()], &ids.bucket).unwrap();
        assert_eq!(addrs.bucket.address, bucket);
    }

    #[test]
    fn authorities_are_distinct_and_off_curve() {
        let addrs = BucketAddresses::derive(&reserve(), &ProgramIds::default()).unwrap();
        assert_ne!(addrs.issue_authority.address, addrs.withdraw_authority.address);
        assert!(!addrs.issue_authority.address.is_on_curve());
        assert!(!addrs.withdraw_authority.address.is_on_curve());
    }

    #[test]
    fn program_ids_change_addresses() {
        let custom = ProgramIds {
            bucket: Pubkey::new_from_array([1u8; 32]),
            crate_token: Pubkey::new_from_array([2u8; 32]),
        };
        let a = BucketAddresses::derive(&reserve(), &ProgramIds::default()).unwrap();
        let b = BucketAddresses::derive(&reserve(), &custom).unwrap();
        assert_ne!(a.bucket.address, b.bucket.address);
    }
}
