use ed25519_dalek::{Signer, Verifier};

use cairn_types::error::CodecError;
use cairn_types::primitives::{PublicKey, Signature};
use cairn_types::tx::{Tx, UnsignedTx};
use cairn_types::utxo::Credential;

use crate::error::CryptoError;

/// Wrapper around an Ed25519 keypair.
pub struct Keypair {
    inner: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            inner: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.inner.verifying_key().to_bytes()
    }

    /// Sign a message, returning the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.inner.sign(message).to_bytes()
    }
}

/// Verify several signatures over the same message.
///
/// Tries batch verification first and falls back to one-by-one checks to
/// report the index of the first bad signature.
pub fn verify_all(
    message: &[u8],
    signatures: &[Signature],
    pubkeys: &[PublicKey],
) -> Result<(), CryptoError> {
    if signatures.len() != pubkeys.len() {
        return Err(CryptoError::BatchLengthMismatch {
            messages: 1,
            signatures: signatures.len(),
            keys: pubkeys.len(),
        });
    }
    if signatures.is_empty() {
        return Ok(());
    }

    let mut verifying_keys = Vec::with_capacity(pubkeys.len());
    let mut dalek_sigs = Vec::with_capacity(signatures.len());
    for (i, (pk, sig)) in pubkeys.iter().zip(signatures).enumerate() {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(pk)
            .map_err(|_| CryptoError::InvalidSignature { signer_index: i })?;
        verifying_keys.push(vk);
        dalek_sigs.push(ed25519_dalek::Signature::from_bytes(sig));
    }

    let messages = vec![message; signatures.len()];
    if ed25519_dalek::verify_batch(&messages, &dalek_sigs, &verifying_keys).is_ok() {
        return Ok(());
    }

    for (i, (sig, vk)) in dalek_sigs.iter().zip(&verifying_keys).enumerate() {
        if vk.verify(message, sig).is_err() {
            return Err(CryptoError::InvalidSignature { signer_index: i });
        }
    }
    Ok(())
}

/// Sign `unsigned` producing one credential per entry of `signers`, in order.
pub fn sign_tx(unsigned: UnsignedTx, signers: &[Vec<&Keypair>]) -> Result<Tx, CodecError> {
    let hash = unsigned.signing_hash()?;
    let credentials = signers
        .iter()
        .map(|keys| Credential {
            signatures: keys.iter().map(|kp| kp.sign(&hash)).collect(),
        })
        .collect();
    Tx::new(unsigned, credentials)
}
