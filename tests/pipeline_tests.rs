//! Pipeline tests: queue draining, bounded retry, bulkhead, fatal errors and the all-or-nothing flush.

use partindex::engine::db_ops::participation_count_from_db;
use partindex::engine::{SqliteIndexStore, open_db};
use partindex::error::StoreError;
use partindex::ledger::{
    AccountId, CloseMetaDecoder, FsArchive, Ledger, LedgerArchive, LedgerHeader, LedgerTransaction,
    MuxedAccount, Operation, OperationBody, TransactionEnvelope, TransactionResult,
    TransactionResultCode, TransactionResultPair, network_id, transaction_hash,
};
use partindex::pipeline::{CheckpointQueue, Claim, index_transaction, spawn_producer};
use partindex::utils::MAX_CHECKPOINT;
use partindex::{
    ArchiveError, Collaborators, DecodeError, IndexBucket, IndexStore, IndexerError, Opts, ShardRange,
    ShardSummary, index_checkpoints,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

const TEST_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Remaining failures that means "never succeeds".
const ALWAYS: u32 = u32::MAX;

/// One payment `S<checkpoint>` → `D` in the first ledger of each checkpoint; odd checkpoints
/// carry a failed transaction.
fn synth_ledger(checkpoint: u32, seq: u32, first_seq: u32, unsupported: bool) -> Ledger {
    let mut ledger = Ledger {
        header: LedgerHeader {
            ledger_seq: seq,
            close_time: 0,
        },
        transaction_set: Vec::new(),
        results: Vec::new(),
    };
    if seq != first_seq {
        return ledger;
    }
    let mut operations = vec![Operation::new(OperationBody::Payment {
        destination: MuxedAccount::new("D"),
    })];
    if unsupported {
        operations.push(Operation::new(OperationBody::Unsupported {
            type_name: "invoke_host_function".to_string(),
        }));
    }
    let envelope = TransactionEnvelope::new(AccountId::new(format!("S{checkpoint}")), operations);
    let code = if checkpoint % 2 == 0 {
        TransactionResultCode::TxSuccess
    } else {
        TransactionResultCode::TxFailed
    };
    let hash = transaction_hash(&network_id(TEST_PASSPHRASE), &envelope)
        .unwrap()
        .to_hex()
        .to_string();
    ledger.transaction_set.push(envelope);
    ledger.results.push(TransactionResultPair {
        transaction_hash: hash,
        result: TransactionResult {
            fee_charged: 100,
            code,
        },
    });
    ledger
}

#[derive(Default)]
struct MockArchive {
    /// checkpoint → fetch failures still to inject
    failures: Mutex<HashMap<u32, u32>>,
    missing_ledgers: HashSet<u32>,
    unsupported_at: Option<u32>,
    /// checkpoint whose transaction arrives without its result
    results_dropped_at: Option<u32>,
    calls: Mutex<HashMap<u32, u32>>,
}

impl MockArchive {
    fn failing(failures: &[(u32, u32)]) -> Self {
        Self {
            failures: Mutex::new(failures.iter().copied().collect()),
            ..Default::default()
        }
    }

    fn calls(&self, checkpoint: u32) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&checkpoint)
            .copied()
            .unwrap_or(0)
    }
}

impl LedgerArchive for MockArchive {
    fn get_ledgers(&self, start: u32, end: u32) -> Result<HashMap<u32, Ledger>, ArchiveError> {
        let checkpoint = end / 64;
        *self.calls.lock().unwrap().entry(checkpoint).or_default() += 1;
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&checkpoint) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ArchiveError::unavailable("connection reset"));
            }
        }
        Ok((start..=end)
            .filter(|seq| !self.missing_ledgers.contains(seq))
            .map(|seq| {
                let unsupported = self.unsupported_at == Some(checkpoint);
                let mut ledger = synth_ledger(checkpoint, seq, start, unsupported);
                if self.results_dropped_at == Some(checkpoint) {
                    ledger.results.clear();
                }
                (seq, ledger)
            })
            .collect())
    }
}

#[derive(Default)]
struct RecordingStore {
    rows: Mutex<Vec<(u32, IndexBucket, AccountId)>>,
    flushes: Mutex<Vec<&'static str>>,
    reject_checkpoint: Option<u32>,
}

impl RecordingStore {
    fn rows(&self, bucket: IndexBucket) -> BTreeSet<(u32, String)> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, b, _)| *b == bucket)
            .map(|(c, _, a)| (*c, a.address().to_string()))
            .collect()
    }

    fn checkpoints(&self) -> BTreeSet<u32> {
        self.rows.lock().unwrap().iter().map(|(c, _, _)| *c).collect()
    }

    fn flushes(&self) -> Vec<&'static str> {
        self.flushes.lock().unwrap().clone()
    }
}

impl IndexStore for RecordingStore {
    fn add_participants(
        &self,
        checkpoint: u32,
        bucket: IndexBucket,
        participants: &[AccountId],
    ) -> Result<(), StoreError> {
        if self.reject_checkpoint == Some(checkpoint) {
            return Err(StoreError::Rejected(format!("checkpoint {checkpoint}")));
        }
        let mut rows = self.rows.lock().unwrap();
        rows.extend(participants.iter().map(|a| (checkpoint, bucket, a.clone())));
        Ok(())
    }

    fn flush_accounts(&self) -> Result<(), StoreError> {
        self.flushes.lock().unwrap().push("accounts");
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.flushes.lock().unwrap().push("indexes");
        Ok(())
    }
}

fn opts(start: u32, end: u32, workers: usize, max_fetch_attempts: u32) -> Opts {
    let mut opts = Opts::new(ShardRange { start, end });
    opts.workers = workers;
    opts.network_passphrase = TEST_PASSPHRASE.to_string();
    opts.max_fetch_attempts = max_fetch_attempts;
    opts
}

fn run(
    opts: &Opts,
    archive: &Arc<MockArchive>,
    store: &Arc<RecordingStore>,
    cancel: bool,
) -> Result<ShardSummary, IndexerError> {
    let collaborators = Collaborators {
        archive: archive.clone(),
        decoder: Arc::new(CloseMetaDecoder),
        store: store.clone(),
    };
    index_checkpoints(opts, collaborators, Arc::new(AtomicBool::new(cancel)))
}

// --- fault-free runs ---

#[test]
fn test_every_checkpoint_processed_once() {
    let archive = Arc::new(MockArchive::default());
    let store = Arc::new(RecordingStore::default());
    let summary = run(&opts(10, 59, 4, 5), &archive, &store, false).unwrap();

    assert_eq!(summary.checkpoints_processed, 50);
    assert_eq!(summary.range, ShardRange { start: 10, end: 59 });
    for c in 10..=59 {
        assert_eq!(archive.calls(c), 1, "checkpoint {c}");
    }
    let expected: BTreeSet<(u32, String)> = (10..=59)
        .flat_map(|c| [(c, format!("S{c}")), (c, "D".to_string())])
        .collect();
    assert_eq!(store.rows(IndexBucket::AllAll), expected);
    assert_eq!(store.rows(IndexBucket::AllPayments), expected);
    assert_eq!(store.flushes(), vec!["accounts", "indexes"]);
}

#[test]
fn test_successful_buckets_skip_failed_transactions() {
    let archive = Arc::new(MockArchive::default());
    let store = Arc::new(RecordingStore::default());
    run(&opts(10, 13, 2, 5), &archive, &store, false).unwrap();

    let expected: BTreeSet<(u32, String)> = [10_u32, 12]
        .into_iter()
        .flat_map(|c| [(c, format!("S{c}")), (c, "D".to_string())])
        .collect();
    assert_eq!(store.rows(IndexBucket::SuccessfulAll), expected);
    assert_eq!(store.rows(IndexBucket::SuccessfulPayments), expected);
    assert_eq!(store.rows(IndexBucket::AllAll).len(), 8);
}

#[test]
fn test_single_worker_drains_queue() {
    let archive = Arc::new(MockArchive::failing(&[(5, 1)]));
    let store = Arc::new(RecordingStore::default());
    let summary = run(&opts(0, 29, 1, 5), &archive, &store, false).unwrap();
    assert_eq!(summary.checkpoints_processed, 30);
    assert_eq!(store.checkpoints(), (0..=29).collect());
}

#[test]
fn test_checkpoint_zero_starts_at_ledger_one() {
    let archive = Arc::new(MockArchive::default());
    let store = Arc::new(RecordingStore::default());
    run(&opts(0, 0, 1, 5), &archive, &store, false).unwrap();
    assert!(store.rows(IndexBucket::AllAll).contains(&(0, "S0".to_string())));
}

// --- transient failures ---

#[test]
fn test_transient_failure_is_retried() {
    let archive = Arc::new(MockArchive::failing(&[(12, 2)]));
    let store = Arc::new(RecordingStore::default());
    let summary = run(&opts(10, 19, 3, 5), &archive, &store, false).unwrap();
    assert_eq!(summary.checkpoints_processed, 10);
    assert_eq!(archive.calls(12), 3);
    assert_eq!(archive.calls(13), 1);
    assert!(store.checkpoints().contains(&12));
}

#[test]
fn test_persistent_failure_exhausts_retries_without_blocking_others() {
    let archive = Arc::new(MockArchive::failing(&[(12, ALWAYS)]));
    let store = Arc::new(RecordingStore::default());
    let err = run(&opts(10, 29, 4, 3), &archive, &store, false).unwrap_err();

    match err {
        IndexerError::RetriesExhausted {
            checkpoint,
            attempts,
            source,
        } => {
            assert_eq!((checkpoint, attempts), (12, 3));
            assert!(source.is_transient());
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(archive.calls(12), 3);
    let expected: BTreeSet<u32> = (10..=29).filter(|c| *c != 12).collect();
    assert_eq!(store.checkpoints(), expected);
    assert!(store.flushes().is_empty());
}

#[test]
fn test_lowest_exhausted_checkpoint_is_reported() {
    let archive = Arc::new(MockArchive::failing(&[(17, ALWAYS), (11, ALWAYS)]));
    let store = Arc::new(RecordingStore::default());
    let err = run(&opts(10, 19, 4, 2), &archive, &store, false).unwrap_err();
    assert!(matches!(
        err,
        IndexerError::RetriesExhausted { checkpoint: 11, .. }
    ));
    assert!(store.flushes().is_empty());
}

// --- fatal failures ---

#[test]
fn test_missing_ledger_is_fatal() {
    let archive = Arc::new(MockArchive {
        missing_ledgers: [20 * 64 + 5].into_iter().collect(),
        ..Default::default()
    });
    let store = Arc::new(RecordingStore::default());
    let err = run(&opts(10, 59, 4, 5), &archive, &store, false).unwrap_err();
    assert!(matches!(
        err,
        IndexerError::MissingLedger {
            checkpoint: 20,
            ledger: 1285
        }
    ));
    assert_eq!(archive.calls(20), 1);
    assert!(store.flushes().is_empty());
}

#[test]
fn test_store_failure_is_fatal() {
    let archive = Arc::new(MockArchive::default());
    let store = Arc::new(RecordingStore {
        reject_checkpoint: Some(14),
        ..Default::default()
    });
    let err = run(&opts(10, 19, 2, 5), &archive, &store, false).unwrap_err();
    assert!(matches!(
        err,
        IndexerError::Store(StoreError::Rejected(_))
    ));
    assert!(store.flushes().is_empty());
}

#[test]
fn test_unknown_operation_is_fatal() {
    let archive = Arc::new(MockArchive {
        unsupported_at: Some(16),
        ..Default::default()
    });
    let store = Arc::new(RecordingStore::default());
    let err = run(&opts(10, 19, 3, 5), &archive, &store, false).unwrap_err();
    match err {
        IndexerError::UnknownOperation { type_name } => {
            assert_eq!(type_name, "invoke_host_function")
        }
        other => panic!("expected UnknownOperation, got {other:?}"),
    }
    assert!(store.flushes().is_empty());
}

#[test]
fn test_decode_failure_is_fatal() {
    let archive = Arc::new(MockArchive {
        results_dropped_at: Some(15),
        ..Default::default()
    });
    let store = Arc::new(RecordingStore::default());
    let err = run(&opts(10, 19, 3, 5), &archive, &store, false).unwrap_err();
    match err {
        IndexerError::Decode { ledger, source } => {
            assert_eq!(ledger, 15 * 64);
            assert!(matches!(
                source,
                DecodeError::ResultCountMismatch {
                    envelopes: 1,
                    results: 0,
                    ..
                }
            ));
        }
        other => panic!("expected Decode, got {other:?}"),
    }
    // Decode failures are not retried.
    assert_eq!(archive.calls(15), 1);
    assert!(store.flushes().is_empty());
}

#[test]
fn test_cancelled_run_does_not_flush() {
    let archive = Arc::new(MockArchive::default());
    let store = Arc::new(RecordingStore::default());
    let err = run(&opts(10, 59, 4, 5), &archive, &store, true).unwrap_err();
    assert!(matches!(err, IndexerError::Cancelled));
    assert!(store.flushes().is_empty());
}

#[test]
fn test_invalid_opts_rejected() {
    let archive = Arc::new(MockArchive::default());
    let store = Arc::new(RecordingStore::default());
    for bad in [
        opts(10, 19, 0, 5),
        opts(10, 19, 4, 0),
        opts(19, 10, 4, 5),
        opts(70_000_000, 70_000_000, 1, 5),
        opts(MAX_CHECKPOINT, MAX_CHECKPOINT + 1, 1, 5),
    ] {
        let err = run(&bad, &archive, &store, false).unwrap_err();
        assert!(matches!(err, IndexerError::Config { .. }), "{err}");
    }
    assert_eq!(archive.calls(10), 0);
    assert_eq!(archive.calls(70_000_000), 0);
    assert!(archive.calls.lock().unwrap().is_empty());
}

// --- index_transaction ---

#[test]
fn test_index_transaction_bucket_routing() {
    let store = RecordingStore::default();
    let ledger = synth_ledger(3, 192, 192, false);
    let tx = LedgerTransaction {
        index: 1,
        ledger_seq: 192,
        envelope: ledger.transaction_set[0].clone(),
        result: ledger.results[0].clone(),
    };
    assert!(!tx.successful());
    index_transaction(3, &tx, &store).unwrap();
    assert_eq!(store.rows(IndexBucket::AllAll).len(), 2);
    assert_eq!(store.rows(IndexBucket::AllPayments).len(), 2);
    assert!(store.rows(IndexBucket::SuccessfulAll).is_empty());
    assert!(store.rows(IndexBucket::SuccessfulPayments).is_empty());
}

// --- queue ---

#[test]
fn test_queue_drains_after_settle() {
    let range = ShardRange { start: 0, end: 4 };
    let cancel = Arc::new(AtomicBool::new(false));
    let (queue, fresh_tx) = CheckpointQueue::new(range, 2);
    let producer = spawn_producer(fresh_tx, range, Arc::clone(&cancel));

    let mut seen = Vec::new();
    while let Some(claim) = queue.next(&cancel) {
        assert_eq!(claim.attempt, 1);
        seen.push(claim.checkpoint);
        queue.settle();
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    assert_eq!(queue.outstanding(), 0);
    assert_eq!(producer.join().unwrap(), 5);
}

#[test]
fn test_queue_requeue_increments_attempt() {
    let range = ShardRange { start: 7, end: 7 };
    let cancel = Arc::new(AtomicBool::new(false));
    let (queue, fresh_tx) = CheckpointQueue::new(range, 1);
    let producer = spawn_producer(fresh_tx, range, Arc::clone(&cancel));

    let claim = queue.next(&cancel).unwrap();
    assert_eq!(claim, Claim::first(7));
    queue.requeue(claim.retry());
    let retried = queue.next(&cancel).unwrap();
    assert_eq!(retried, Claim { checkpoint: 7, attempt: 2 });
    queue.settle();
    assert!(queue.next(&cancel).is_none());
    assert_eq!(producer.join().unwrap(), 1);
}

// --- end to end ---

#[test]
fn test_end_to_end_with_fs_archive_and_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let archive = FsArchive::new(dir.path().join("archive"));
    for checkpoint in 1..=3_u32 {
        let first = checkpoint * 64;
        let ledgers: Vec<Ledger> = (first..=first + 63)
            .map(|seq| synth_ledger(checkpoint, seq, first, false))
            .collect();
        archive.write_checkpoint(checkpoint, &ledgers).unwrap();
    }

    let db_path = dir.path().join("job_0.partindex");
    let run_opts = opts(1, 3, 2, 5);
    let store = Arc::new(
        SqliteIndexStore::new(open_db(&db_path).unwrap()).with_range(run_opts.range),
    );
    let collaborators = Collaborators {
        archive: Arc::new(archive),
        decoder: Arc::new(CloseMetaDecoder),
        store: store.clone(),
    };
    let summary =
        index_checkpoints(&run_opts, collaborators, Arc::new(AtomicBool::new(false))).unwrap();
    assert_eq!(summary.checkpoints_processed, 3);
    drop(store);

    let conn = open_db(&db_path).unwrap();
    let accounts: i64 = conn
        .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
        .unwrap();
    assert_eq!(accounts, 4);
    // Failed checkpoints 1 and 3: 2 accounts x 2 buckets; successful checkpoint 2: 2 x 4.
    assert_eq!(participation_count_from_db(&conn), Some(16));
    let successful: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM participation WHERE bucket = 'successful_payments' AND account = 'D'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(successful, 1);
}
