//! SPL Token and Associated Token Account operations.
//!
//! Instruction builders and account layouts for the handful of SPL Token
//! calls a client needs, written against the wire format directly rather than
//! pulling in the `spl-token` crates.

use crate::error::SolError;
use crate::pda::find_program_address;
use crate::pubkey::Pubkey;
use crate::system::{RENT_SYSVAR_ID, SYSTEM_PROGRAM_ID};
use crate::transaction::{SolAccountMeta, SolInstruction};

// ---------------------------------------------------------------------------
// Well-known program IDs
// ---------------------------------------------------------------------------

/// SPL Token Program ID: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
]);

/// Associated Token Account Program ID: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d,
    0x83, 0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8, 0xdb, 0xe9,
    0xf8, 0x59,
]);

/// Size of a packed SPL mint account.
pub const MINT_SIZE: usize = 82;

// SPL Token instruction tags.
const INITIALIZE_MINT_TAG: u8 = 0;
const MINT_TO_TAG: u8 = 7;

// Associated Token Account instruction tags.
const ATA_CREATE_IDEMPOTENT_TAG: u8 = 1;

// ---------------------------------------------------------------------------
// Associated Token Account
// ---------------------------------------------------------------------------

/// Derive the associated token account address for an owner + mint pair.
///
/// Seeds are `[owner, token_program_id, mint]` under the Associated Token
/// Account program.
pub fn derive_associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey, SolError> {
    find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}

/// Build an Associated Token Account `CreateIdempotent` instruction.
///
/// Unlike `Create`, this succeeds when the account already exists with the
/// expected owner and mint, so two clients racing to create the same account
/// both land.
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    associated_account: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> SolInstruction {
    SolInstruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable_signer(*payer),
            SolAccountMeta::writable(*associated_account),
            SolAccountMeta::readonly(*owner),
            SolAccountMeta::readonly(*mint),
            SolAccountMeta::readonly(SYSTEM_PROGRAM_ID),
            SolAccountMeta::readonly(TOKEN_PROGRAM_ID),
        ],
        data: vec![ATA_CREATE_IDEMPOTENT_TAG],
    }
}

// ---------------------------------------------------------------------------
// Mint instructions
// ---------------------------------------------------------------------------

/// Build an SPL Token `InitializeMint` instruction.
///
/// # Wire format
///
/// `[0, decimals, mint_authority(32), freeze_tag, freeze_authority(32)?]`;
/// the freeze authority bytes are present only when the tag is 1.
pub fn initialize_mint(
    mint: &Pubkey,
    decimals: u8,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
) -> SolInstruction {
    let mut data = Vec::with_capacity(67);
    data.push(INITIALIZE_MINT_TAG);
    data.push(decimals);
    data.extend_from_slice(mint_authority.as_ref());
    match freeze_authority {
        Some(key) => {
            data.push(1);
            data.extend_from_slice(key.as_ref());
        }
        None => data.push(0),
    }

    SolInstruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(*mint),
            SolAccountMeta::readonly(RENT_SYSVAR_ID),
        ],
        data,
    }
}

/// Build an SPL Token `MintTo` instruction: tag 7 followed by u64 LE amount.
pub fn mint_to(
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Result<SolInstruction, SolError> {
    if amount == 0 {
        return Err(SolError::TransactionBuildError(
            "mint amount must be > 0".into(),
        ));
    }

    let mut data = Vec::with_capacity(9);
    data.push(MINT_TO_TAG);
    data.extend_from_slice(&amount.to_le_bytes());

    Ok(SolInstruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(*mint),
            SolAccountMeta::writable(*destination),
            SolAccountMeta::readonly_signer(*authority),
        ],
        data,
    })
}

// ---------------------------------------------------------------------------
// Account layouts
// ---------------------------------------------------------------------------

/// A decoded SPL mint account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mint {
    pub mint_authority: Option<Pubkey>,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub freeze_authority: Option<Pubkey>,
}

impl Mint {
    /// Decode the 82-byte packed mint layout:
    ///
    /// ```text
    /// 0..36   mint_authority    COption<Pubkey> (u32 tag + 32 bytes)
    /// 36..44  supply            u64 LE
    /// 44      decimals          u8
    /// 45      is_initialized    bool
    /// 46..82  freeze_authority  COption<Pubkey>
    /// ```
    pub fn unpack(data: &[u8]) -> Result<Self, SolError> {
        if data.len() < MINT_SIZE {
            return Err(SolError::SerializationError(format!(
                "mint account is {} bytes, expected {MINT_SIZE}",
                data.len()
            )));
        }

        let mut supply = [0u8; 8];
        supply.copy_from_slice(&data[36..44]);

        Ok(Self {
            mint_authority: unpack_coption_key(&data[0..36])?,
            supply: u64::from_le_bytes(supply),
            decimals: data[44],
            is_initialized: match data[45] {
                0 => false,
                1 => true,
                other => {
                    return Err(SolError::SerializationError(format!(
                        "invalid is_initialized flag {other}"
                    )))
                }
            },
            freeze_authority: unpack_coption_key(&data[46..82])?,
        })
    }
}

fn unpack_coption_key(src: &[u8]) -> Result<Option<Pubkey>, SolError> {
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&src[0..4]);
    match u32::from_le_bytes(tag) {
        0 => Ok(None),
        1 => Pubkey::try_from_slice(&src[4..36]).map(Some),
        other => Err(SolError::SerializationError(format!(
            "invalid COption tag {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Constant verification ----------------------------------------------

    #[test]
    fn token_program_id_roundtrip() {
        assert_eq!(
            TOKEN_PROGRAM_ID.to_string(),
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        );
    }

    #[test]
    fn associated_token_program_id_roundtrip() {
        assert_eq!(
            ASSOCIATED_TOKEN_PROGRAM_ID.to_string(),
            "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL"
        );
    }

    // -- ATA derivation -----------------------------------------------------

    #[test]
    fn ata_is_deterministic() {
        let owner = Pubkey::new_from_array([0x11; 32]);
        let mint = Pubkey::new_from_array([0x22; 32]);

        let a = derive_associated_token_address(&owner, &mint).unwrap();
        let b = derive_associated_token_address(&owner, &mint).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_on_curve(), "ATA must NOT be on the Ed25519 curve");
    }

    #[test]
    fn ata_differs_per_owner_and_mint() {
        let owner_a = Pubkey::new_from_array([0x01; 32]);
        let owner_b = Pubkey::new_from_array([0x02; 32]);
        let mint_a = Pubkey::new_from_array([0xF1; 32]);
        let mint_b = Pubkey::new_from_array([0xF2; 32]);

        let ata = |o, m| derive_associated_token_address(o, m).unwrap();
        assert_ne!(ata(&owner_a, &mint_a), ata(&owner_b, &mint_a));
        assert_ne!(ata(&owner_a, &mint_a), ata(&owner_a, &mint_b));
    }

    #[test]
    fn derive_ata_for_usdc_mint() {
        let usdc: Pubkey = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".parse().unwrap();
        let ata = derive_associated_token_address(&Pubkey::new_from_array([0x42; 32]), &usdc).unwrap();
        assert!(!ata.is_on_curve());
    }

    #[test]
    fn create_idempotent_layout() {
        let payer = Pubkey::new_from_array([1; 32]);
        let ata = Pubkey::new_from_array([2; 32]);
        let owner = Pubkey::new_from_array([3; 32]);
        let mint = Pubkey::new_from_array([4; 32]);

        let ix = create_associated_token_account_idempotent(&payer, &ata, &owner, &mint);

        assert_eq!(ix.program_id, ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(ix.data, vec![1]);
        assert_eq!(ix.accounts.len(), 6);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[1].pubkey, ata);
        assert!(ix.accounts[1].is_writable && !ix.accounts[1].is_signer);
        assert_eq!(ix.accounts[2].pubkey, owner);
        assert_eq!(ix.accounts[3].pubkey, mint);
        assert_eq!(ix.accounts[5].pubkey, TOKEN_PROGRAM_ID);
    }

    // -- Mint instructions --------------------------------------------------

    #[test]
    fn initialize_mint_with_freeze_authority() {
        let mint = Pubkey::new_from_array([1; 32]);
        let authority = Pubkey::new_from_array([2; 32]);

        let ix = initialize_mint(&mint, 6, &authority, Some(&authority));

        assert_eq!(ix.data.len(), 67);
        assert_eq!(ix.data[0], 0);
        assert_eq!(ix.data[1], 6);
        assert_eq!(&ix.data[2..34], authority.as_ref());
        assert_eq!(ix.data[34], 1);
        assert_eq!(&ix.data[35..67], authority.as_ref());
        assert_eq!(ix.accounts[1].pubkey, RENT_SYSVAR_ID);
    }

    #[test]
    fn initialize_mint_without_freeze_authority() {
        let mint = Pubkey::new_from_array([1; 32]);
        let ix = initialize_mint(&mint, 9, &Pubkey::new_from_array([2; 32]), None);
        assert_eq!(ix.data.len(), 35);
        assert_eq!(ix.data[34], 0);
    }

    #[test]
    fn mint_to_encoding() {
        let mint = Pubkey::new_from_array([1; 32]);
        let dest = Pubkey::new_from_array([2; 32]);
        let auth = Pubkey::new_from_array([3; 32]);

        let ix = mint_to(&mint, &dest, &auth, 500_000).unwrap();

        assert_eq!(ix.data[0], 7);
        assert_eq!(u64::from_le_bytes(ix.data[1..9].try_into().unwrap()), 500_000);
        assert!(ix.accounts[2].is_signer);
        assert!(!ix.accounts[2].is_writable);
    }

    #[test]
    fn mint_to_zero_fails() {
        let key = Pubkey::new_from_array([1; 32]);
        assert!(mint_to(&key, &key, &key, 0).is_err());
    }

    // -- Mint layout --------------------------------------------------------

    fn packed_mint(supply: u64, decimals: u8, authority: Option<Pubkey>) -> Vec<u8> {
        let mut data = vec![0u8; MINT_SIZE];
        if let Some(key) = authority {
            data[0..4].copy_from_slice(&1u32.to_le_bytes());
            data[4..36].copy_from_slice(key.as_ref());
        }
        data[36..44].copy_from_slice(&supply.to_le_bytes());
        data[44] = decimals;
        data[45] = 1;
        data
    }

    #[test]
    fn unpack_mint() {
        let authority = Pubkey::new_from_array([9; 32]);
        let mint = Mint::unpack(&packed_mint(1_000_000, 6, Some(authority))).unwrap();

        assert_eq!(mint.mint_authority, Some(authority));
        assert_eq!(mint.supply, 1_000_000);
        assert_eq!(mint.decimals, 6);
        assert!(mint.is_initialized);
        assert_eq!(mint.freeze_authority, None);
    }

    #[test]
    fn unpack_short_mint_fails() {
        assert!(Mint::unpack(&[0u8; 40]).is_err());
    }

    #[test]
    fn unpack_bad_option_tag_fails() {
        let mut data = packed_mint(1, 6, None);
        data[0] = 5;
        assert!(Mint::unpack(&data).is_err());
    }
}
