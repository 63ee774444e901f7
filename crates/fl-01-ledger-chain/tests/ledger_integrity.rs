//! # Ledger Integrity Tests (fl-01)
//!
//! End-to-end checks of the chain through the public API.
//!
//! ## Test Categories
//!
//! 1. **Persistence** - File-backed chains survive a restart and still verify
//! 2. **Tampering** - Edits and deletions made behind the service are detected
//! 3. **Conservation** - Random transfer sequences keep balances summing to zero

use fl_01_ledger_chain::adapters::{
    BincodeEntrySerializer, DatabaseLock, FileBackedKVStore, SystemTimeSource,
};
use fl_01_ledger_chain::{
    AccountId, BatchOperation, EntrySerializer, HashCodec, KeyPrefix, KeyValueStore, LedgerApi,
    LedgerConfig, LedgerDependencies, LedgerService, VerifyError, ViolationKind,
};
use proptest::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

// =============================================================================
// TEST HELPERS
// =============================================================================

type FileService = LedgerService<Arc<FileBackedKVStore>, SystemTimeSource, BincodeEntrySerializer>;

fn open_service(path: &Path) -> (FileService, Arc<FileBackedKVStore>) {
    let kv = Arc::new(FileBackedKVStore::open(path).unwrap());
    let service = LedgerService::new(
        LedgerDependencies {
            kv_store: kv.clone(),
            time_source: SystemTimeSource,
            serializer: BincodeEntrySerializer,
        },
        LedgerConfig::default().with_verify_page_size(4),
    );
    (service, kv)
}

fn rewrite_entry(kv: &impl KeyValueStore, seq: u64, edit: impl FnOnce(&mut fl_01_ledger_chain::LedgerEntry)) {
    let key = KeyPrefix::entry_key(seq);
    let mut entry = BincodeEntrySerializer
        .deserialize(&kv.get(&key).unwrap().unwrap())
        .unwrap();
    edit(&mut entry);
    let bytes = BincodeEntrySerializer.serialize(&entry).unwrap();
    kv.atomic_batch_write(vec![BatchOperation::put(key, bytes)]).unwrap();
}

async fn record_payouts(service: &impl LedgerApi, count: i64) {
    for i in 0..count {
        service
            .record_transaction(
                &format!("payout-{}", i),
                AccountId::SYSTEM,
                AccountId(1 + (i as u64) % 3),
                250 + i,
                "harvest payout",
                r#"{"cooperative":"rift-valley"}"#,
            )
            .await
            .unwrap();
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

#[tokio::test]
async fn test_file_backed_chain_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");

    let tip_hash = {
        let (service, _) = open_service(&path);
        record_payouts(&service, 10).await;
        service
            .record_transaction("sale-1", AccountId(1), AccountId(2), 100, "maize", "{}")
            .await
            .unwrap();
        service.tip().unwrap().unwrap().hash
    };

    let (service, _) = open_service(&path);
    let tip = service.tip().unwrap().unwrap();
    assert_eq!(tip.sequence_number, 10);
    assert_eq!(tip.hash, tip_hash);

    let (_tx, rx) = watch::channel(false);
    let report = service.verify_full(rx).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.entries_checked, 11);

    // Appends after the restart extend the same chain.
    let next = service
        .record_transaction("sale-2", AccountId(2), AccountId(3), 40, "beans", "{}")
        .await
        .unwrap();
    assert_eq!(next.sequence_number, 11);
    assert_eq!(next.prev_hash, tip_hash);
}

#[tokio::test]
async fn test_data_directory_lock_is_exclusive() {
    let dir = TempDir::new().unwrap();
    let _lock = DatabaseLock::acquire(dir.path(), Duration::from_millis(100)).unwrap();

    let second = DatabaseLock::acquire(dir.path(), Duration::from_millis(100));
    assert!(second.is_err());
}

// =============================================================================
// TAMPERING
// =============================================================================

#[tokio::test]
async fn test_edit_on_disk_is_detected_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");

    {
        let (service, kv) = open_service(&path);
        record_payouts(&service, 6).await;
        rewrite_entry(&*kv, 4, |e| e.to_account = AccountId(99));
    }

    let (service, _) = open_service(&path);
    match service.verify_integrity(None, None) {
        Err(VerifyError::Violation(v)) => {
            assert_eq!(v.sequence_number, 4);
            assert_eq!(v.kind, ViolationKind::TamperedHash);
        }
        other => panic!("expected violation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_forged_rehash_breaks_next_link() {
    let dir = TempDir::new().unwrap();
    let (service, kv) = open_service(&dir.path().join("ledger.db"));
    record_payouts(&service, 6).await;

    rewrite_entry(&*kv, 2, |e| {
        e.amount = 1_000_000;
        e.hash = HashCodec::default().hash_entry(e).unwrap();
    });

    let (_tx, rx) = watch::channel(false);
    let report = service.verify_full(rx).await.unwrap();
    let first = report.first_violation().unwrap();
    assert_eq!(first.sequence_number, 3);
    assert_eq!(first.kind, ViolationKind::BrokenLink);
}

#[tokio::test]
async fn test_deleted_entry_is_reported_as_gap() {
    let dir = TempDir::new().unwrap();
    let (service, kv) = open_service(&dir.path().join("ledger.db"));
    record_payouts(&service, 8).await;

    kv.atomic_batch_write(vec![BatchOperation::delete(KeyPrefix::entry_key(5))])
        .unwrap();

    let (_tx, rx) = watch::channel(false);
    let report = service.verify_full(rx).await.unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].sequence_number, 6);
    assert_eq!(report.violations[0].kind, ViolationKind::SequenceGap);
}

#[tokio::test]
async fn test_external_reference_survives_restart_without_breaking_chain() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");

    {
        let (service, _) = open_service(&path);
        record_payouts(&service, 3).await;
        service.attach_external_reference("payout-1", "bank:7731").unwrap();
    }

    let (service, _) = open_service(&path);
    let entry = service.find_transaction("payout-1").unwrap().unwrap();
    assert_eq!(entry.external_reference.as_deref(), Some("bank:7731"));
    service.verify_integrity(None, None).unwrap();
}

// =============================================================================
// CONSERVATION
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_balances_sum_to_zero_and_chain_verifies(
        transfers in prop::collection::vec((0u64..4, 0u64..4, 1i64..1_000), 1..30)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let service = LedgerService::in_memory(LedgerConfig::default());
            let mut recorded = 0u64;
            for (i, (from, to, amount)) in transfers.iter().enumerate() {
                let result = service
                    .record_transaction(&format!("tx-{}", i), AccountId(*from), AccountId(*to), *amount, "", "")
                    .await;
                if from == to {
                    prop_assert!(result.is_err());
                } else {
                    prop_assert_eq!(result.unwrap().sequence_number, recorded);
                    recorded += 1;
                }
            }

            let total: i128 = (0..4)
                .map(|a| service.get_balance(AccountId(a)).unwrap())
                .sum();
            prop_assert_eq!(total, 0);

            let (_tx, rx) = watch::channel(false);
            let report = service.verify_full(rx).await.unwrap();
            prop_assert!(report.is_clean());
            prop_assert_eq!(report.entries_checked, recorded);
            Ok(())
        })?;
    }
}
