use sol_wire::SolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("solana primitive error: {0}")]
    Sol(#[from] SolError),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The program (or the runtime on its behalf) rejected the transaction.
    /// `code` is the custom program error code when one was reported.
    #[error("program rejected transaction: {message}")]
    ProgramRejected {
        code: Option<u32>,
        message: String,
        logs: Vec<String>,
    },

    #[error("missing associated token account: {0}")]
    MissingAssociatedTokenAccount(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("invalid account data: {0}")]
    InvalidAccountData(String),

    #[error("missing signature for {0}")]
    MissingSignature(String),

    #[error("transaction expired before confirmation: {0}")]
    TransactionExpired(String),

    #[error("no swap pool found: {0}")]
    SwapPoolNotFound(String),

    #[error("unsupported cluster: {0}")]
    UnsupportedCluster(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for SdkError {
    fn from(e: serde_json::Error) -> Self {
        SdkError::InvalidAccountData(format!("JSON: {e}"))
    }
}

impl From<base64::DecodeError> for SdkError {
    fn from(e: base64::DecodeError) -> Self {
        SdkError::InvalidAccountData(format!("base64: {e}"))
    }
}

impl SdkError {
    /// Custom program error code, when this is a program rejection that carried one.
    pub fn program_error_code(&self) -> Option<u32> {
        match self {
            SdkError::ProgramRejected { code, .. } => *code,
            _ => None,
        }
    }

    pub fn program_logs(&self) -> &[String] {
        match self {
            SdkError::ProgramRejected { logs, .. } => logs,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sol_errors_convert() {
        let err: SdkError = SolError::PdaNotFound("prog".into()).into();
        assert!(matches!(err, SdkError::Sol(_)));
        assert!(err.to_string().contains("no viable bump seed"));
    }

    #[test]
    fn program_error_code_only_for_rejections() {
        let rejected = SdkError::ProgramRejected {
            code: Some(6003),
            message: "custom program error: 0x1773".into(),
            logs: vec![],
        };
        assert_eq!(rejected.program_error_code(), Some(6003));
        assert_eq!(SdkError::Config("x".into()).program_error_code(), None);
        assert!(SdkError::Config("x".into()).program_logs().is_empty());
    }

    #[test]
    fn rpc_error_display() {
        let err = SdkError::Rpc {
            code: -32002,
            message: "Transaction simulation failed".into(),
        };
        assert_eq!(err.to_string(), "RPC error -32002: Transaction simulation failed");
    }
}
