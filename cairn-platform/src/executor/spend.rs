//! Input, output and credential checks shared by every transaction that
//! moves funds.

use std::collections::BTreeSet;

use cairn_crypto::keys::verify_all;
use cairn_types::constants::MAX_MEMO_SIZE;
use cairn_types::primitives::{Amount, Hash, Id, Timestamp, PRIMARY_NETWORK_ID};
use cairn_types::tx::{BaseTx, SubnetAuth, Tx};
use cairn_types::utxo::{Credential, OutputOwners, TransferableInput, TransferableOutput, Utxo};

use super::Context;
use crate::error::PlatformError;
use crate::state::{Chain, Diff};

pub(crate) fn verify_base(ctx: &Context, base: &BaseTx) -> Result<(), PlatformError> {
    if base.network_id != ctx.config.network_id {
        return Err(PlatformError::rejected(format!(
            "network id {} does not match {}",
            base.network_id, ctx.config.network_id
        )));
    }
    if base.blockchain_id != ctx.config.chain_id {
        return Err(PlatformError::rejected(format!(
            "transaction targets chain {}",
            hex::encode(base.blockchain_id)
        )));
    }
    if base.memo.len() > MAX_MEMO_SIZE {
        return Err(PlatformError::rejected(format!(
            "memo of {} bytes exceeds {}",
            base.memo.len(),
            MAX_MEMO_SIZE
        )));
    }
    Ok(())
}

/// Check that `credential` satisfies `owners` through the keys at `sig_indices`.
pub(crate) fn verify_owners(
    owners: &OutputOwners,
    sig_indices: &[u32],
    credential: &Credential,
    message: &Hash,
    now: Timestamp,
) -> Result<(), PlatformError> {
    if owners.locktime > now {
        return Err(PlatformError::rejected(format!(
            "output is locked until {}",
            owners.locktime
        )));
    }
    if sig_indices.len() != owners.threshold as usize {
        return Err(PlatformError::rejected(format!(
            "expected {} signers, got {}",
            owners.threshold,
            sig_indices.len()
        )));
    }
    if credential.signatures.len() != sig_indices.len() {
        return Err(PlatformError::rejected(format!(
            "expected {} signatures, got {}",
            sig_indices.len(),
            credential.signatures.len()
        )));
    }
    if !sig_indices.windows(2).all(|w| w[0] < w[1]) {
        return Err(PlatformError::rejected(
            "signature indices must be strictly increasing",
        ));
    }
    let keys = sig_indices
        .iter()
        .map(|&i| {
            owners.keys.get(i as usize).copied().ok_or_else(|| {
                PlatformError::rejected(format!("signature index {} out of range", i))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    verify_all(message, &credential.signatures, &keys)?;
    Ok(())
}

/// Check that each input spends the matching UTXO with the matching
/// credential. Returns the total consumed.
pub(crate) fn verify_inputs(
    ctx: &Context,
    ins: &[TransferableInput],
    utxos: &[Utxo],
    credentials: &[Credential],
    message: &Hash,
    now: Timestamp,
) -> Result<Amount, PlatformError> {
    if ins.len() != utxos.len() || ins.len() != credentials.len() {
        return Err(PlatformError::rejected(format!(
            "{} inputs but {} credentials",
            ins.len(),
            credentials.len()
        )));
    }

    let mut seen = BTreeSet::new();
    let mut consumed: Amount = 0;
    for ((input, utxo), credential) in ins.iter().zip(utxos).zip(credentials) {
        if !seen.insert(input.utxo_id) {
            return Err(PlatformError::rejected("input spent twice"));
        }
        if input.asset_id != ctx.config.asset_id || utxo.asset_id != input.asset_id {
            return Err(PlatformError::rejected("input asset mismatch"));
        }
        if utxo.amount != input.amount {
            return Err(PlatformError::rejected(format!(
                "input claims {} but utxo holds {}",
                input.amount, utxo.amount
            )));
        }
        verify_owners(&utxo.owners, &input.sig_indices, credential, message, now)?;
        consumed = consumed
            .checked_add(input.amount)
            .ok_or_else(|| PlatformError::rejected("input total overflows"))?;
    }
    Ok(consumed)
}

/// Check that `consumed` covers every output plus `fee`.
pub(crate) fn verify_flow<'o>(
    ctx: &Context,
    consumed: Amount,
    outs: impl IntoIterator<Item = &'o TransferableOutput>,
    fee: Amount,
) -> Result<(), PlatformError> {
    let mut required = fee;
    for out in outs {
        if out.asset_id != ctx.config.asset_id {
            return Err(PlatformError::rejected("output asset mismatch"));
        }
        if out.amount == 0 {
            return Err(PlatformError::rejected("output amount must be positive"));
        }
        required = required
            .checked_add(out.amount)
            .ok_or_else(|| PlatformError::rejected("output total overflows"))?;
    }
    if consumed < required {
        return Err(PlatformError::InsufficientFunds { consumed, required });
    }
    Ok(())
}

/// Full spend check for inputs that live in `chain` or were fetched by the caller.
#[allow(clippy::too_many_arguments)]
pub(crate) fn verify_spend<'o>(
    ctx: &Context,
    chain: &dyn Chain,
    tx: &Tx,
    ins: &[TransferableInput],
    utxos: &[Utxo],
    credentials: &[Credential],
    outs: impl IntoIterator<Item = &'o TransferableOutput>,
    fee: Amount,
) -> Result<(), PlatformError> {
    let message = tx.unsigned().signing_hash()?;
    let consumed = verify_inputs(ctx, ins, utxos, credentials, &message, chain.timestamp()?)?;
    verify_flow(ctx, consumed, outs, fee)
}

/// The UTXOs `ins` spend, all of which must exist in `chain`.
pub(crate) fn local_utxos(
    chain: &dyn Chain,
    ins: &[TransferableInput],
) -> Result<Vec<Utxo>, PlatformError> {
    ins.iter().map(|input| chain.get_utxo(&input.utxo_id)).collect()
}

/// Verify the subnet owner's signatures, carried by the last credential.
/// Returns the credentials left for the inputs.
pub(crate) fn verify_subnet_auth<'t>(
    chain: &dyn Chain,
    tx: &'t Tx,
    subnet_id: &Id,
    auth: &SubnetAuth,
) -> Result<&'t [Credential], PlatformError> {
    if *subnet_id == PRIMARY_NETWORK_ID {
        return Err(PlatformError::rejected(
            "the primary network cannot be used as a subnet",
        ));
    }
    let owner = chain.get_subnet_owner(subnet_id)?;
    let (auth_credential, input_credentials) = tx
        .credentials()
        .split_last()
        .ok_or_else(|| PlatformError::rejected("missing subnet auth credential"))?;
    let message = tx.unsigned().signing_hash()?;
    verify_owners(
        &owner,
        &auth.sig_indices,
        auth_credential,
        &message,
        chain.timestamp()?,
    )?;
    Ok(input_credentials)
}

pub(crate) fn consume(diff: &mut Diff, ins: &[TransferableInput]) {
    for input in ins {
        diff.delete_utxo(input.utxo_id);
    }
}

/// Add `outs` as UTXOs of `tx_id`, numbered from `first_index`.
pub(crate) fn produce<'o>(
    diff: &mut Diff,
    tx_id: Id,
    outs: impl IntoIterator<Item = &'o TransferableOutput>,
    first_index: u32,
) {
    for (i, out) in outs.into_iter().enumerate() {
        diff.add_utxo(out.to_utxo(tx_id, first_index + i as u32));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{funder, Fixture};
    use cairn_crypto::keys::Keypair;

    fn owners(keys: &[&Keypair], threshold: u32) -> OutputOwners {
        OutputOwners {
            locktime: 0,
            threshold,
            keys: keys.iter().map(|k| k.public_key()).collect(),
        }
    }

    #[test]
    fn test_verify_owners_threshold_and_order() {
        let a = Keypair::from_seed(&[1u8; 32]);
        let b = Keypair::from_seed(&[2u8; 32]);
        let message = [9u8; 32];
        let owners = owners(&[&a, &b], 2);
        let credential = Credential {
            signatures: vec![a.sign(&message), b.sign(&message)],
        };

        assert!(verify_owners(&owners, &[0, 1], &credential, &message, 0).is_ok());
        assert!(verify_owners(&owners, &[1, 0], &credential, &message, 0).is_err());
        assert!(verify_owners(&owners, &[0], &credential, &message, 0).is_err());
        assert!(verify_owners(&owners, &[0, 2], &credential, &message, 0).is_err());

        let swapped = Credential {
            signatures: vec![b.sign(&message), a.sign(&message)],
        };
        assert!(matches!(
            verify_owners(&owners, &[0, 1], &swapped, &message, 0),
            Err(PlatformError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_locked_output_rejected() {
        let key = funder();
        let message = [1u8; 32];
        let mut locked = owners(&[&key], 1);
        locked.locktime = 100;
        let credential = Credential {
            signatures: vec![key.sign(&message)],
        };
        assert!(verify_owners(&locked, &[0], &credential, &message, 99).is_err());
        assert!(verify_owners(&locked, &[0], &credential, &message, 100).is_ok());
    }

    #[test]
    fn test_flow_requires_fee() {
        let fixture = Fixture::new();
        let out = TransferableOutput {
            asset_id: fixture.ctx.config.asset_id,
            amount: 90,
            owners: owners(&[&funder()], 1),
        };
        assert!(verify_flow(&fixture.ctx, 100, [&out], 10).is_ok());
        assert!(matches!(
            verify_flow(&fixture.ctx, 100, [&out], 11),
            Err(PlatformError::InsufficientFunds {
                consumed: 100,
                required: 101
            })
        ));

        let foreign = TransferableOutput {
            asset_id: [7u8; 32],
            ..out
        };
        assert!(verify_flow(&fixture.ctx, 100, [&foreign], 0).is_err());
    }

    #[test]
    fn test_base_checks_network_and_chain() {
        let fixture = Fixture::new();
        let mut base = fixture.base_tx(vec![], vec![]);
        assert!(verify_base(&fixture.ctx, &base).is_ok());

        base.network_id += 1;
        assert!(verify_base(&fixture.ctx, &base).is_err());

        let mut base = fixture.base_tx(vec![], vec![]);
        base.memo = vec![0u8; MAX_MEMO_SIZE + 1];
        assert!(verify_base(&fixture.ctx, &base).is_err());
    }
}
