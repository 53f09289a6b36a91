//! Solana primitives for the bucket client.
//!
//! Public keys, keypairs, program-derived addresses, System and SPL Token
//! instruction builders, and the legacy transaction wire format. None of it
//! pulls in `solana-sdk` (which drags in 200+ transitive dependencies).
//!
//! The compact binary wire format is implemented by hand, with
//! `ed25519-dalek` for signing, `curve25519-dalek` for the PDA curve check and
//! `bs58` for Base58 encoding.

pub mod error;
pub mod keypair;
pub mod pda;
pub mod pubkey;
pub mod spl_token;
pub mod system;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use error::SolError;
pub use keypair::{Keypair, Signature, Signer};
pub use pda::{create_program_address, find_program_address, find_program_address_with, PdaDerivation, Seed};
pub use pubkey::{validate_address, Pubkey};
pub use spl_token::{
    create_associated_token_account_idempotent, derive_associated_token_address, initialize_mint,
    mint_to, Mint, ASSOCIATED_TOKEN_PROGRAM_ID, MINT_SIZE, TOKEN_PROGRAM_ID,
};
pub use system::{create_account, transfer, RENT_SYSVAR_ID, SYSTEM_PROGRAM_ID};
pub use transaction::{
    compile_transaction, decode_compact_u16, encode_compact_u16, parse_wire_transaction,
    serialize_message, sign_transaction, CompiledInstruction, SignedTransaction, SolAccountMeta,
    SolInstruction, SolTransaction, PACKET_DATA_SIZE,
};
