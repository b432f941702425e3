//! Iteration Tests
//!
//! Lazy entry streams over both engines.

use crate::common::*;
use futures_util::StreamExt;

#[tokio::test]
async fn entries_yield_every_pair_once() {
    for env in environments() {
        let store = env.open("app", 1).await;
        for (key, value) in [("b", json!(2)), ("a", json!(1)), ("c", json!({"n": 3}))] {
            store.set(key, Some(value)).await.unwrap();
        }
        assert_eq!(
            collect_entries(&store).await,
            vec![
                ("a".to_string(), json!(1)),
                ("b".to_string(), json!(2)),
                ("c".to_string(), json!({"n": 3})),
            ],
            "{:?}",
            env.engine
        );
    }
}

#[tokio::test]
async fn entries_of_empty_store() {
    for env in environments() {
        let store = env.open("app", 1).await;
        assert!(collect_entries(&store).await.is_empty(), "{:?}", env.engine);
    }
}

#[tokio::test]
async fn entries_hide_version_metadata() {
    for env in environments() {
        let store = env.open("app", 5).await;
        store.set("only", Some(json!(1))).await.unwrap();
        assert_eq!(collect_keys(&store).await, ["only"], "{:?}", env.engine);
    }
}

#[tokio::test]
async fn entries_skip_deleted_keys() {
    for env in environments() {
        let store = env.open("app", 1).await;
        for key in ["a", "b", "c"] {
            store.set(key, Some(json!(key))).await.unwrap();
        }
        let mut entries = store.entries();
        let (first, _) = entries.next().await.unwrap().unwrap();
        let rest: Vec<&str> = ["a", "b", "c"]
            .into_iter()
            .filter(|k| *k != first)
            .collect();
        store.delete(rest[0]).await.unwrap();

        let remaining: Vec<String> = entries.map(|e| e.unwrap().0).collect().await;
        assert_eq!(remaining, [rest[1]], "{:?}", env.engine);
    }
}

#[tokio::test]
async fn entries_fail_once_store_is_closed() {
    for env in environments() {
        let store = env.open("app", 1).await;
        store.set("a", Some(json!(1))).await.unwrap();
        store.set("b", Some(json!(2))).await.unwrap();

        let mut entries = store.entries();
        assert!(entries.next().await.unwrap().is_ok());
        store.close().await.unwrap();
        assert!(
            matches!(entries.next().await, Some(Err(Error::Closed))),
            "{:?}",
            env.engine
        );
        assert!(entries.next().await.is_none());
    }
}

#[tokio::test]
async fn entries_fail_once_store_is_dropped() {
    for env in environments() {
        let store = env.open("app", 1).await;
        store.set("a", Some(json!(1))).await.unwrap();
        let mut entries = store.entries();
        drop(store);
        assert!(
            matches!(entries.next().await, Some(Err(Error::Closed))),
            "{:?}",
            env.engine
        );
    }
}

#[tokio::test]
async fn cursor_steps_through_states() {
    let env = TestEnv::new(Engine::Indexed);
    let store = env.open("app", 1).await;
    store.set("x", Some(json!(1))).await.unwrap();
    store.set("y", Some(json!(2))).await.unwrap();

    let Kvs::Indexed(indexed) = &store else {
        panic!("expected the transactional adapter");
    };
    let mut cursor = indexed.cursor();
    assert_eq!(cursor.state(), &kvs::CursorState::Idle);
    assert_eq!(cursor.step().await.unwrap().map(|e| e.0), Some("x".into()));
    assert_eq!(cursor.state(), &kvs::CursorState::Positioned("x".into()));

    // A write between steps is seen by the next step
    store.set("xa", Some(json!(3))).await.unwrap();
    assert_eq!(cursor.step().await.unwrap().map(|e| e.0), Some("xa".into()));
    assert_eq!(cursor.step().await.unwrap().map(|e| e.0), Some("y".into()));
    assert_eq!(cursor.step().await.unwrap(), None);
    assert_eq!(cursor.state(), &kvs::CursorState::Exhausted);
    assert_eq!(cursor.step().await.unwrap(), None);
}

#[tokio::test]
async fn flat_iterator_is_synchronous() {
    let env = TestEnv::new(Engine::Memory);
    let store = env.open("app", 1).await;
    store.set("k", Some(json!("v"))).await.unwrap();

    let Kvs::Flat(flat) = &store else {
        panic!("expected the flat adapter");
    };
    // `StreamExt` is in scope; the blocking iterator must stay unambiguous
    let entries: Vec<_> = flat.iter().collect::<Result<_>>().unwrap();
    assert_eq!(entries, vec![("k".to_string(), json!("v"))]);
    let mut iter = flat.iter();
    assert!(iter.next().is_some());
    assert!(iter.next().is_none());

    let streamed: Vec<_> = store
        .entries()
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(streamed, entries);
}
