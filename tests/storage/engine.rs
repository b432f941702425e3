//! Transactional Engine Tests

use crate::common::init_tracing;
use kvs_storage::{EngineError, IdbFactory, TransactionMode};
use serde_json::json;
use std::sync::Arc;

async fn counter_db(factory: &IdbFactory) -> kvs_storage::Connection {
    factory
        .open("counter", Some(1), |change| change.create_object_store("c"))
        .await
        .unwrap()
}

// ============================================================================
// Serialization
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn read_write_transactions_are_exclusive() {
    init_tracing();
    let factory = Arc::new(IdbFactory::new());
    let conn = Arc::new(counter_db(&factory).await);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let conn = Arc::clone(&conn);
        tasks.push(tokio::spawn(async move {
            let mut tx = conn
                .transaction(&["c"], TransactionMode::ReadWrite)
                .await
                .unwrap();
            let current = {
                let store = tx.object_store("c").unwrap();
                store.get("n").unwrap().result().unwrap()
            };
            let next = current.and_then(|v| v.as_u64()).unwrap_or(0) + 1;
            tokio::task::yield_now().await;
            tx.object_store("c").unwrap().put("n", json!(next)).unwrap();
            tx.commit().await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut tx = conn
        .transaction(&["c"], TransactionMode::ReadOnly)
        .await
        .unwrap();
    let n = tx.object_store("c").unwrap().get("n").unwrap().result().unwrap();
    assert_eq!(n, Some(json!(16)));
}

#[tokio::test]
async fn readers_share_the_database() {
    let factory = IdbFactory::new();
    let conn = counter_db(&factory).await;
    let first = conn
        .transaction(&["c"], TransactionMode::ReadOnly)
        .await
        .unwrap();
    // Would wait forever if readers were exclusive
    let second = conn
        .transaction(&["c"], TransactionMode::ReadOnly)
        .await
        .unwrap();
    drop(first);
    drop(second);
}

#[tokio::test]
async fn unknown_store_is_not_found() {
    let factory = IdbFactory::new();
    let conn = counter_db(&factory).await;
    let err = conn
        .transaction(&["nope"], TransactionMode::ReadOnly)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("nope".into()));
}

// ============================================================================
// Version changes
// ============================================================================

#[tokio::test]
async fn version_change_can_delete_stores() {
    let factory = IdbFactory::new();
    let conn = counter_db(&factory).await;
    conn.close();

    let conn = factory
        .open("counter", Some(2), |change| {
            assert_eq!(change.object_store_names(), ["c".to_string()]);
            change.delete_object_store("c")?;
            change.create_object_store("d")
        })
        .await
        .unwrap();
    assert!(!conn.has_object_store("c"));
    assert!(conn.has_object_store("d"));
}

#[tokio::test]
async fn failed_version_change_keeps_old_schema() {
    let factory = IdbFactory::new();
    counter_db(&factory).await.close();

    let err = factory
        .open("counter", Some(2), |change| {
            change.create_object_store("d")?;
            change.delete_object_store("missing")
        })
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("missing".into()));

    let conn = factory.open("counter", None, |_| Ok(())).await.unwrap();
    assert_eq!(conn.version(), 1);
    assert_eq!(conn.object_store_names(), ["c".to_string()]);
}

#[tokio::test]
async fn deletion_notifies_with_no_new_version() {
    let factory = IdbFactory::new();
    let conn = counter_db(&factory).await;
    let seen = Arc::new(std::sync::Mutex::new(None));
    let seen_in = Arc::clone(&seen);
    let closer = conn.closer();
    conn.on_version_change(move |event| {
        *seen_in.lock().unwrap() = Some(*event);
        closer.close();
    });

    factory.delete_database("counter").await.unwrap();
    let event = seen.lock().unwrap().expect("handler ran");
    assert_eq!(event.old_version, 1);
    assert_eq!(event.new_version, None);
    assert!(conn.is_closed());
}
