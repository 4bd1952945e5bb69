use std::{
    sync::{Arc, Barrier},
    thread,
    time::Duration,
};

use ed25519_dalek::SigningKey;
use rand_core::OsRng;

use chainsync_rs::{
    tx_pool::TransactionRelayPool,
    types::{
        data_types::TransactionId,
        transaction::{
            AcceptanceCode, ProposalStatus, RecordOutcome, TransactionRecord, TransactionState,
        },
    },
};

mod common;

use common::{
    ledger::{SignedTransfer, TransferCodec, TransferLedger},
    logging::{log_with_context, setup_logger},
};

/// Tests classification of submitted transactions and idempotence of resubmission.
#[test]
fn record_test() {
    setup_logger(log::LevelFilter::Debug);

    let mut csprg = OsRng {};
    let alice = SigningKey::generate(&mut csprg);
    let mallory = SigningKey::generate(&mut csprg);
    let pool = TransactionRelayPool::new(TransferCodec, TransferLedger::default());
    assert!(pool.is_empty());

    // 1. A valid transfer is accepted, and its resubmission reports ALREADY_EXISTS with the same id.
    let transfer = SignedTransfer::new(&alice, 1, 10);
    log_with_context(Some(&transfer.id().bytes()), "Recording a valid transfer twice.");
    assert_eq!(
        pool.record(&transfer.raw()),
        RecordOutcome::new(AcceptanceCode::Accepted, Some(transfer.id()))
    );
    assert_eq!(
        pool.record(&transfer.raw()),
        RecordOutcome::new(AcceptanceCode::AlreadyExists, Some(transfer.id()))
    );

    // 2. A second transfer spending the same nonce is a double spend.
    let double_spend = SignedTransfer::new(&alice, 1, 20);
    assert_eq!(
        pool.record(&double_spend.raw()).result,
        AcceptanceCode::DoubleSpend
    );

    // 3. A transfer signed by someone other than the account owner has an invalid signature.
    let mut forged = SignedTransfer::new(&mallory, 2, 10);
    forged.from = alice.verifying_key().to_bytes();
    assert_eq!(
        pool.record(&forged.raw()),
        RecordOutcome::new(AcceptanceCode::InvalidSignature, Some(forged.id()))
    );

    // 4. Any other validation failure is a generic transaction error.
    let empty = SignedTransfer::new(&alice, 3, 0);
    assert_eq!(
        pool.record(&empty.raw()).result,
        AcceptanceCode::TransactionError
    );

    // 5. Undecodable bytes are a transaction error without an id.
    assert_eq!(
        pool.record(&[0xde, 0xad]),
        RecordOutcome::new(AcceptanceCode::TransactionError, None)
    );

    // 6. Rejections are terminal: resubmitting returns the stored code without validating again.
    let validations = pool_validations(&pool);
    assert_eq!(
        pool.record(&forged.raw()).result,
        AcceptanceCode::InvalidSignature
    );
    assert_eq!(
        pool.record(&double_spend.raw()).result,
        AcceptanceCode::DoubleSpend
    );
    assert_eq!(pool_validations(&pool), validations);
    assert_eq!(
        pool.status(&forged.id()),
        Some(TransactionState::Rejected(AcceptanceCode::InvalidSignature))
    );

    // 7. Only accepted transfers are listed as accepted; every decoded transfer has a record.
    assert_eq!(pool.accepted_ids(), vec![transfer.id()]);
    assert_eq!(pool.len(), 4);
    assert!(!pool.is_empty());
    assert_eq!(
        pool.record_of(&double_spend.id()),
        Some(TransactionRecord {
            id: double_spend.id(),
            state: TransactionState::Rejected(AcceptanceCode::DoubleSpend)
        })
    );
    assert_eq!(pool.record_of(&TransactionId::new([0; 32])), None);
    assert!(AcceptanceCode::AlreadyExists.is_success());
    assert!(!AcceptanceCode::DoubleSpend.is_success());
}

/// Tests that proposals preserve order and report every recorded transaction as known.
#[test]
fn propose_test() {
    setup_logger(log::LevelFilter::Debug);

    let alice = SigningKey::generate(&mut OsRng {});
    let pool = TransactionRelayPool::new(TransferCodec, TransferLedger::default());

    let accepted = SignedTransfer::new(&alice, rand::random(), 5);
    let rejected = SignedTransfer::new(&alice, 7, 0);
    pool.record(&accepted.raw());
    pool.record(&rejected.raw());
    let never_seen = TransactionId::new([9; 32]);

    // 1. Known and unknown ids are reported in input order.
    assert_eq!(
        pool.propose(&[accepted.id(), never_seen]),
        vec![
            (accepted.id(), ProposalStatus::Known),
            (never_seen, ProposalStatus::Unknown)
        ]
    );

    // 2. Rejected transactions are known too, and duplicates collapse to their first occurrence.
    assert_eq!(
        pool.propose(&[never_seen, rejected.id(), never_seen, accepted.id(), rejected.id()]),
        vec![
            (never_seen, ProposalStatus::Unknown),
            (rejected.id(), ProposalStatus::Known),
            (accepted.id(), ProposalStatus::Known)
        ]
    );

    // 3. Proposing has no side effects.
    assert_eq!(pool.len(), 2);
    assert!(pool.propose(&[]).is_empty());
}

/// Tests that concurrent submissions of the same transaction run validation exactly once.
#[test]
fn concurrent_record_test() {
    setup_logger(log::LevelFilter::Debug);

    const PEERS: usize = 8;

    let alice = SigningKey::generate(&mut OsRng {});
    let transfer = SignedTransfer::new(&alice, 1, 100);
    let pool = Arc::new(TransactionRelayPool::new(
        TransferCodec,
        TransferLedger::with_delay(Duration::from_millis(50)),
    ));
    let barrier = Arc::new(Barrier::new(PEERS));

    // 1. Several simulated peers submit identical bytes at the same moment.
    log_with_context(
        Some(&transfer.id().bytes()),
        "Submitting the same transfer from several peers at once.",
    );
    let outcomes: Vec<RecordOutcome> = (0..PEERS)
        .map(|_| {
            let pool = pool.clone();
            let barrier = barrier.clone();
            let raw = transfer.raw();
            thread::spawn(move || {
                barrier.wait();
                pool.record(&raw)
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    // 2. Exactly one peer saw ACCEPTED; every other peer saw ALREADY_EXISTS; all carry the same id.
    let accepted = outcomes
        .iter()
        .filter(|outcome| outcome.result == AcceptanceCode::Accepted)
        .count();
    let already_exists = outcomes
        .iter()
        .filter(|outcome| outcome.result == AcceptanceCode::AlreadyExists)
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(already_exists, PEERS - 1);
    assert!(outcomes.iter().all(|outcome| outcome.id == Some(transfer.id())));

    // 3. The validator ran once.
    assert_eq!(pool_validations(&pool), 1);
    assert_eq!(pool.status(&transfer.id()), Some(TransactionState::Accepted));
}

/// Tests that peers losing the race for a rejected transaction all receive the winner's rejection code.
#[test]
fn concurrent_rejection_test() {
    setup_logger(log::LevelFilter::Debug);

    const PEERS: usize = 8;

    // 1. Spend nonce 1, then let several peers relay a second transfer spending it again.
    let alice = SigningKey::generate(&mut OsRng {});
    let pool = Arc::new(TransactionRelayPool::new(
        TransferCodec,
        TransferLedger::with_delay(Duration::from_millis(50)),
    ));
    pool.record(&SignedTransfer::new(&alice, 1, 100).raw());
    let double_spend = SignedTransfer::new(&alice, 1, 200);
    let barrier = Arc::new(Barrier::new(PEERS));

    let outcomes: Vec<RecordOutcome> = (0..PEERS)
        .map(|_| {
            let pool = pool.clone();
            let barrier = barrier.clone();
            let raw = double_spend.raw();
            thread::spawn(move || {
                barrier.wait();
                pool.record(&raw)
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    // 2. Every peer sees DOUBLE_SPEND with the transfer's id, and the double spend was validated once.
    let expected = RecordOutcome::new(AcceptanceCode::DoubleSpend, Some(double_spend.id()));
    assert!(outcomes.iter().all(|outcome| *outcome == expected));
    assert_eq!(pool_validations(&pool), 2);
}

/// Tests that when the validating peer panics, a peer waiting on the same transaction takes over
/// validation instead of waiting forever.
#[test]
fn validator_panic_test() {
    setup_logger(log::LevelFilter::Debug);

    let alice = SigningKey::generate(&mut OsRng {});
    let transfer = SignedTransfer::new(&alice, 1, 100);
    let pool = Arc::new(TransactionRelayPool::new(
        TransferCodec,
        TransferLedger::panicking_once(Duration::from_millis(50)),
    ));

    // 1. The first peer claims the transfer and panics while validating it. The second peer arrives
    //    while the first is still validating, and waits.
    log_with_context(
        Some(&transfer.id().bytes()),
        "Recording a transfer whose first validation panics.",
    );
    let spawn_peer = |pool: Arc<TransactionRelayPool<TransferCodec, TransferLedger>>| {
        let raw = transfer.raw();
        thread::spawn(move || pool.record(&raw))
    };
    let first = spawn_peer(pool.clone());
    thread::sleep(Duration::from_millis(10));
    let second = spawn_peer(pool.clone());

    // 2. Exactly one peer panicked; the other validated the transfer and had it accepted.
    let results = [first.join(), second.join()];
    assert_eq!(results.iter().filter(|result| result.is_err()).count(), 1);
    let accepted: Vec<&RecordOutcome> = results
        .iter()
        .filter_map(|result| result.as_ref().ok())
        .collect();
    assert_eq!(
        accepted,
        vec![&RecordOutcome::new(AcceptanceCode::Accepted, Some(transfer.id()))]
    );
    assert_eq!(pool_validations(&pool), 2);
    assert_eq!(pool.status(&transfer.id()), Some(TransactionState::Accepted));

    // 3. The transfer is now settled like any other.
    assert_eq!(
        pool.record(&transfer.raw()).result,
        AcceptanceCode::AlreadyExists
    );
}

// Number of times the pool's ledger has been asked to validate a transaction.
fn pool_validations(pool: &TransactionRelayPool<TransferCodec, TransferLedger>) -> usize {
    pool.validator().validations()
}
