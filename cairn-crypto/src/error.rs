use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid signature: signer {signer_index}")]
    InvalidSignature { signer_index: usize },

    #[error("mismatched batch lengths: {messages} messages, {signatures} signatures, {keys} keys")]
    BatchLengthMismatch {
        messages: usize,
        signatures: usize,
        keys: usize,
    },
}
