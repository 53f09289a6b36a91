use thiserror::Error;

/// Errors raised while building, deriving or signing Solana wire data.
#[derive(Debug, Error)]
pub enum SolError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid seeds: {0}")]
    InvalidSeeds(String),

    #[error("no viable bump seed found for program {0}")]
    PdaNotFound(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_private_key() {
        let err = SolError::InvalidPrivateKey("key too short".into());
        assert_eq!(err.to_string(), "invalid private key: key too short");
    }

    #[test]
    fn display_invalid_seeds() {
        let err = SolError::InvalidSeeds("seed 0 is 33 bytes".into());
        assert_eq!(err.to_string(), "invalid seeds: seed 0 is 33 bytes");
    }

    #[test]
    fn display_pda_not_found() {
        let err = SolError::PdaNotFound("11111111111111111111111111111111".into());
        assert_eq!(
            err.to_string(),
            "no viable bump seed found for program 11111111111111111111111111111111"
        );
    }

    #[test]
    fn display_transaction_build_error() {
        let err = SolError::TransactionBuildError("no instructions".into());
        assert_eq!(err.to_string(), "transaction build error: no instructions");
    }

    #[test]
    fn display_serialization_error() {
        let err = SolError::SerializationError("compact-u16 overflow".into());
        assert_eq!(err.to_string(), "serialization error: compact-u16 overflow");
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(SolError::SigningError("test".into()));
        assert!(err.to_string().contains("test"));
    }
}
