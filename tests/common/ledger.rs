//! [`SignedTransfer`], the transaction type used by the relay tests, with its codec and a
//! [`LedgerValidator`] that checks ed25519 signatures and detects double spends.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    thread,
    time::Duration,
};

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use chainsync_rs::{
    codec::{CodecError, TransactionCodec},
    ledger::{LedgerValidator, ValidateTransactionRequest, ValidateTransactionResponse},
    types::data_types::TransactionId,
};

/// A transfer of `amount` out of the account `from`, which can be spent exactly once per `nonce`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct SignedTransfer {
    pub(crate) from: [u8; 32],
    pub(crate) nonce: u64,
    pub(crate) amount: u64,
    pub(crate) signature: Vec<u8>,
}

impl SignedTransfer {
    pub(crate) fn new(signing_key: &SigningKey, nonce: u64, amount: u64) -> SignedTransfer {
        let from = signing_key.verifying_key().to_bytes();
        let signature = signing_key
            .sign(&Self::signed_bytes(&from, nonce, amount))
            .to_bytes()
            .to_vec();
        SignedTransfer {
            from,
            nonce,
            amount,
            signature,
        }
    }

    /// Serialize the transfer into the raw bytes submitted to `record`.
    pub(crate) fn raw(&self) -> Vec<u8> {
        self.try_to_vec().unwrap()
    }

    /// The id [`TransferCodec`] assigns to this transfer.
    pub(crate) fn id(&self) -> TransactionId {
        TransactionId::new(Sha256::digest(self.raw()).into())
    }

    fn signed_bytes(from: &[u8; 32], nonce: u64, amount: u64) -> Vec<u8> {
        let mut bytes = from.to_vec();
        bytes.extend_from_slice(&nonce.to_le_bytes());
        bytes.extend_from_slice(&amount.to_le_bytes());
        bytes
    }

    fn has_valid_signature(&self) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.from) else {
            return false;
        };
        let Ok(signature_bytes) = <[u8; 64]>::try_from(self.signature.as_slice()) else {
            return false;
        };
        verifying_key
            .verify(
                &Self::signed_bytes(&self.from, self.nonce, self.amount),
                &Signature::from_bytes(&signature_bytes),
            )
            .is_ok()
    }
}

/// Decodes Borsh-encoded [`SignedTransfer`]s; the id is the SHA-256 digest of the raw bytes.
pub(crate) struct TransferCodec;

impl TransactionCodec for TransferCodec {
    type Transaction = SignedTransfer;

    fn decode_transaction(&self, raw: &[u8]) -> Result<SignedTransfer, CodecError> {
        SignedTransfer::try_from_slice(raw).map_err(|err| CodecError::Malformed {
            reason: err.to_string(),
        })
    }

    fn transaction_id(&self, transaction: &SignedTransfer) -> TransactionId {
        transaction.id()
    }
}

/// Validates [`SignedTransfer`]s against an in-memory set of spent `(account, nonce)` pairs.
///
/// Transfers of amount 0 are invalid. Every call to the validator is counted, and may be slowed down
/// to widen race windows in concurrency tests. A ledger can also be made to panic on its first call,
/// after the delay.
#[derive(Default)]
pub(crate) struct TransferLedger {
    spent: Mutex<HashSet<([u8; 32], u64)>>,
    validations: AtomicUsize,
    delay: Option<Duration>,
    panics: AtomicUsize,
}

impl TransferLedger {
    pub(crate) fn with_delay(delay: Duration) -> TransferLedger {
        TransferLedger {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub(crate) fn panicking_once(delay: Duration) -> TransferLedger {
        TransferLedger {
            delay: Some(delay),
            panics: AtomicUsize::new(1),
            ..Default::default()
        }
    }

    /// Number of times the validator has been invoked.
    pub(crate) fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }
}

impl LedgerValidator<SignedTransfer> for TransferLedger {
    fn validate_transaction(
        &self,
        request: ValidateTransactionRequest<'_, SignedTransfer>,
    ) -> ValidateTransactionResponse {
        self.validations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.panics.swap(0, Ordering::SeqCst) > 0 {
            panic!("ledger unavailable");
        }

        let transfer = request.transaction();
        if !transfer.has_valid_signature() {
            return ValidateTransactionResponse::InvalidSignature;
        }
        if transfer.amount == 0 {
            return ValidateTransactionResponse::Invalid {
                reason: String::from("zero amount"),
            };
        }
        if !self.spent.lock().unwrap().insert((transfer.from, transfer.nonce)) {
            return ValidateTransactionResponse::DoubleSpend;
        }
        ValidateTransactionResponse::Valid
    }
}
