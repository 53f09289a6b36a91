//! Payer normalization.
//!
//! Operations accept either a bare address (the wallet signs for it) or a
//! local keypair that has to co-sign the transaction.

use sol_wire::{Keypair, Pubkey};

#[derive(Debug, Clone)]
pub enum Payer {
    Address(Pubkey),
    Keypair(Keypair),
}

impl Payer {
    pub fn pubkey(&self) -> Pubkey {
        match self {
            Payer::Address(address) => *address,
            Payer::Keypair(keypair) => keypair.pubkey(),
        }
    }
}

impl From<Pubkey> for Payer {
    fn from(address: Pubkey) -> Self {
        Payer::Address(address)
    }
}

impl From<Keypair> for Payer {
    fn from(keypair: Keypair) -> Self {
        Payer::Keypair(keypair)
    }
}

impl From<&Keypair> for Payer {
    fn from(keypair: &Keypair) -> Self {
        Payer::Keypair(keypair.clone())
    }
}

/// Acting address plus the local keypairs that must sign for it.
#[derive(Debug, Clone)]
pub struct SignerInfo {
    pub payer: Pubkey,
    pub signers: Vec<Keypair>,
}

/// Resolve a [`Payer`] into the acting address and its local signers.
///
/// A keypair yields itself as the only signer; an address yields none and
/// relies on the client's wallet.
pub fn get_signers_from_payer(payer: impl Into<Payer>) -> SignerInfo {
    match payer.into() {
        Payer::Address(address) => SignerInfo {
            payer: address,
            signers: Vec::new(),
        },
        Payer::Keypair(keypair) => SignerInfo {
            payer: keypair.pubkey(),
            signers: vec![keypair],
        },
    }
}
