//! Program Derived Address (PDA) derivation.
//!
//! A PDA is `SHA-256(seed_0 || ... || seed_n || bump || program_id ||
//! "ProgramDerivedAddress")`, accepted only when the hash is NOT a valid
//! Ed25519 point. Bumps are searched from 255 down to 0 and the first
//! off-curve result is the canonical address.

use sha2::{Digest, Sha256};

use crate::error::SolError;
use crate::pubkey::Pubkey;

/// Maximum length of a single seed.
pub const MAX_SEED_LEN: usize = 32;

/// Maximum number of seeds, counting the bump.
pub const MAX_SEEDS: usize = 16;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// One seed of a derivation: a literal tag, raw bytes or a public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seed {
    Tag(String),
    Bytes(Vec<u8>),
    Key(Pubkey),
}

impl Seed {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Seed::Tag(tag) => tag.as_bytes(),
            Seed::Bytes(bytes) => bytes,
            Seed::Key(key) => key.as_ref(),
        }
    }
}

impl From<&str> for Seed {
    fn from(tag: &str) -> Self {
        Seed::Tag(tag.to_string())
    }
}

impl From<Vec<u8>> for Seed {
    fn from(bytes: Vec<u8>) -> Self {
        Seed::Bytes(bytes)
    }
}

impl From<Pubkey> for Seed {
    fn from(key: Pubkey) -> Self {
        Seed::Key(key)
    }
}

/// Result of a successful derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdaDerivation {
    pub address: Pubkey,
    pub bump: u8,
}

/// Find the canonical PDA for `seeds` under `program_id`.
///
/// Fails with [`SolError::PdaNotFound`] when all 256 bumps land on the curve.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), SolError> {
    check_seeds(seeds, 1)?;

    for bump in (0u8..=255).rev() {
        if let Some(address) = try_create_program_address(seeds, bump, program_id) {
            return Ok((address, bump));
        }
    }

    Err(SolError::PdaNotFound(program_id.to_string()))
}

/// [`find_program_address`] over typed seeds.
pub fn find_program_address_with(
    seeds: &[Seed],
    program_id: &Pubkey,
) -> Result<PdaDerivation, SolError> {
    let raw: Vec<&[u8]> = seeds.iter().map(Seed::as_bytes).collect();
    find_program_address(&raw, program_id).map(|(address, bump)| PdaDerivation { address, bump })
}

/// Create the PDA for an explicit bump.
///
/// Errors when the result lands on the curve, i.e. the bump is not usable.
pub fn create_program_address(
    seeds: &[&[u8]],
    bump: u8,
    program_id: &Pubkey,
) -> Result<Pubkey, SolError> {
    check_seeds(seeds, 1)?;
    try_create_program_address(seeds, bump, program_id).ok_or_else(|| {
        SolError::InvalidSeeds(format!("bump {bump} yields an on-curve address"))
    })
}

fn check_seeds(seeds: &[&[u8]], extra: usize) -> Result<(), SolError> {
    if seeds.len() + extra > MAX_SEEDS {
        return Err(SolError::InvalidSeeds(format!(
            "{} seeds exceeds the limit of {}",
            seeds.len(),
            MAX_SEEDS - extra
        )));
    }
    if let Some((i, seed)) = seeds.iter().enumerate().find(|(_, s)| s.len() > MAX_SEED_LEN) {
        return Err(SolError::InvalidSeeds(format!(
            "seed {i} is {} bytes, max {MAX_SEED_LEN}",
            seed.len()
        )));
    }
    Ok(())
}

/// Returns `Some(address)` if the hash is OFF the curve, `None` otherwise.
fn try_create_program_address(seeds: &[&[u8]], bump: u8, program_id: &Pubkey) -> Option<Pubkey> {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id.as_ref());
    hasher.update(PDA_MARKER);

    let address = Pubkey::new_from_array(hasher.finalize().into());
    if address.is_on_curve() {
        return None;
    }
    Some(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> Pubkey {
        Pubkey::new_from_array([0x42; 32])
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = find_program_address(&[b"bucket", &[1u8; 32]], &program()).unwrap();
        let b = find_program_address(&[b"bucket", &[1u8; 32]], &program()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn derived_address_is_off_curve() {
        let (address, _) = find_program_address(&[b"issue"], &program()).unwrap();
        assert!(!address.is_on_curve());
    }

    #[test]
    fn create_matches_find_for_canonical_bump() {
        let seeds: &[&[u8]] = &[b"withdraw", &[9u8; 32]];
        let (address, bump) = find_program_address(seeds, &program()).unwrap();
        assert_eq!(create_program_address(seeds, bump, &program()).unwrap(), address);
    }

    #[test]
    fn different_seeds_give_different_addresses() {
        let (a, _) = find_program_address(&[b"issue"], &program()).unwrap();
        let (b, _) = find_program_address(&[b"withdraw"], &program()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_programs_give_different_addresses() {
        let (a, _) = find_program_address(&[b"bucket"], &program()).unwrap();
        let (b, _) = find_program_address(&[b"bucket"], &Pubkey::new_from_array([7; 32])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn typed_seeds_match_raw_seeds() {
        let key = Pubkey::new_from_array([3u8; 32]);
        let typed = find_program_address_with(
            &[Seed::from("bucket"), Seed::from(key), Seed::from(vec![1, 2, 3])],
            &program(),
        )
        .unwrap();
        let raw = find_program_address(&[b"bucket", key.as_ref(), &[1, 2, 3]], &program()).unwrap();
        assert_eq!((typed.address, typed.bump), raw);
    }

    #[test]
    fn oversized_seed_is_rejected() {
        let long = [0u8; 33];
        let err = find_program_address(&[&long], &program()).unwrap_err();
        assert!(matches!(err, SolError::InvalidSeeds(_)));
    }

    #[test]
    fn too_many_seeds_are_rejected() {
        let seed: &[u8] = b"s";
        let seeds = vec![seed; MAX_SEEDS];
        assert!(matches!(
            find_program_address(&seeds, &program()),
            Err(SolError::InvalidSeeds(_))
        ));
    }

    #[test]
    fn on_curve_bump_is_an_error() {
        // Under this program, bumps 255 and 254 of "issue" both hash onto the curve.
        let seeds: &[&[u8]] = &[b"issue"];
        let (address, canonical) = find_program_address(seeds, &program()).unwrap();
        assert_eq!(canonical, 253);
        assert_eq!(create_program_address(seeds, 253, &program()).unwrap(), address);
        for bump in [254u8, 255] {
            assert!(matches!(
                create_program_address(seeds, bump, &program()),
                Err(SolError::InvalidSeeds(_))
            ));
        }
    }
}
