//! Ed25519 keypairs and transaction signatures.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ed25519_dalek::Signer as _;
use zeroize::Zeroize;

use crate::error::SolError;
use crate::pubkey::Pubkey;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_BYTES: usize = 64;

/// A 64-byte Ed25519 signature. Its Base58 form doubles as the transaction id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_BYTES]);

impl Signature {
    pub const fn new_from_array(bytes: [u8; SIGNATURE_BYTES]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; SIGNATURE_BYTES] {
        self.0
    }

    /// Verify this signature over `message` against `pubkey`.
    pub fn verify(&self, pubkey: &Pubkey, message: &[u8]) -> bool {
        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(pubkey.as_bytes()) else {
            return false;
        };
        key.verify_strict(message, &ed25519_dalek::Signature::from_bytes(&self.0))
            .is_ok()
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; SIGNATURE_BYTES])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl FromStr for Signature {
    type Err = SolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| SolError::SerializationError(format!("signature decode failed: {e}")))?;
        let arr: [u8; SIGNATURE_BYTES] = bytes.try_into().map_err(|v: Vec<u8>| {
            SolError::SerializationError(format!("expected 64 signature bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}

/// Anything that can produce Ed25519 signatures for a fixed public key.
///
/// Local keypairs implement this directly; hardware or interactive wallets
/// can implement it by forwarding the message.
pub trait Signer: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SolError>;
}

/// A local Ed25519 keypair. The secret half is zeroized on drop.
#[derive(Clone)]
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS random source.
    pub fn generate() -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Build a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Build a keypair from the 64-byte `secret || public` layout used by the
    /// Solana CLI. The public half must match the secret half.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SolError> {
        let mut arr: [u8; 64] = bytes.try_into().map_err(|_| {
            SolError::InvalidPrivateKey(format!("expected 64 bytes, got {}", bytes.len()))
        })?;
        let result = ed25519_dalek::SigningKey::from_keypair_bytes(&arr)
            .map_err(|e| SolError::InvalidPrivateKey(e.to_string()));
        arr.zeroize();
        Ok(Self {
            signing_key: result?,
        })
    }

    /// Read a Solana CLI keypair file: a JSON array of 64 integers.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, SolError> {
        let path = path.as_ref();
        let mut contents = std::fs::read_to_string(path).map_err(|e| {
            SolError::InvalidPrivateKey(format!("read {}: {e}", path.display()))
        })?;
        let parsed: Result<Vec<u8>, _> = serde_json::from_str(&contents);
        contents.zeroize();

        let mut bytes = parsed.map_err(|e| {
            SolError::InvalidPrivateKey(format!("parse {}: {e}", path.display()))
        })?;
        let keypair = Self::from_bytes(&bytes);
        bytes.zeroize();
        keypair
    }

    /// The 64-byte `secret || public` encoding.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.signing_key.to_keypair_bytes()
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign_message(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

impl Signer for Keypair {
    fn pubkey(&self) -> Pubkey {
        Keypair::pubkey(self)
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SolError> {
        Ok(self.sign_message(message))
    }
}
