//! Transaction decoder: pairs a ledger's results with the envelopes they belong to.

use std::collections::HashMap;

use crate::error::DecodeError;

use super::{LedgerCloseMeta, LedgerTransaction, TransactionEnvelope};

/// Transactions of one ledger in result order. Exhaustion is the normal end, not an error.
pub type TransactionReader = Box<dyn Iterator<Item = Result<LedgerTransaction, DecodeError>> + Send>;

pub trait TransactionDecoder: Send + Sync {
    fn open_transaction_reader(
        &self,
        network_passphrase: &str,
        meta: LedgerCloseMeta,
    ) -> Result<TransactionReader, DecodeError>;
}

/// Network id: blake3 of the network passphrase. Mixed into every transaction hash so a
/// transaction from one network never matches a result on another.
pub fn network_id(network_passphrase: &str) -> [u8; 32] {
    *blake3::hash(network_passphrase.as_bytes()).as_bytes()
}

/// Hash identifying `envelope` on the network with id `network_id`.
pub fn transaction_hash(
    network_id: &[u8; 32],
    envelope: &TransactionEnvelope,
) -> Result<blake3::Hash, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(network_id);
    hasher.update(&serde_json::to_vec(envelope)?);
    Ok(hasher.finalize())
}

/// Decoder for close metadata whose transaction set is unordered and whose results carry the
/// hash of their envelope. Results define the order transactions are read in.
#[derive(Clone, Copy, Debug, Default)]
pub struct CloseMetaDecoder;

impl TransactionDecoder for CloseMetaDecoder {
    fn open_transaction_reader(
        &self,
        network_passphrase: &str,
        meta: LedgerCloseMeta,
    ) -> Result<TransactionReader, DecodeError> {
        let ledger = meta.ledger_seq();
        if meta.tx_set.len() != meta.tx_processing.len() {
            return Err(DecodeError::ResultCountMismatch {
                ledger,
                envelopes: meta.tx_set.len(),
                results: meta.tx_processing.len(),
            });
        }

        let id = network_id(network_passphrase);
        let mut by_hash = HashMap::with_capacity(meta.tx_set.len());
        for envelope in meta.tx_set {
            let hash = transaction_hash(&id, &envelope)?.to_hex().to_string();
            by_hash.insert(hash, envelope);
        }

        let reader = meta
            .tx_processing
            .into_iter()
            .enumerate()
            .map(move |(i, processing)| -> Result<LedgerTransaction, DecodeError> {
                let hash = processing.result.transaction_hash.to_lowercase();
                let envelope = by_hash
                    .remove(&hash)
                    .ok_or(DecodeError::UnmatchedResult { ledger, hash })?;
                Ok(LedgerTransaction {
                    index: i as u32 + 1,
                    ledger_seq: ledger,
                    envelope,
                    result: processing.result,
                })
            });
        Ok(Box::new(reader))
    }
}
