//! Basic Operations Tests
//!
//! get / set / has / delete / clear and the absent-value rules.

use crate::common::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// Reads and writes
// ============================================================================

#[tokio::test]
async fn get_missing_key_is_none() {
    for env in environments() {
        let store = env.open("app", 1).await;
        assert_eq!(store.get("missing").await.unwrap(), None, "{:?}", env.engine);
    }
}

#[tokio::test]
async fn set_then_get() {
    for env in environments() {
        let store = env.open("app", 1).await;
        let value = json!({"name": "alice", "tags": ["a", "b"], "age": 30});
        store.set("user", Some(value.clone())).await.unwrap();
        assert_eq!(store.get("user").await.unwrap(), Some(value), "{:?}", env.engine);
    }
}

#[tokio::test]
async fn set_overwrites() {
    for env in environments() {
        let store = env.open("app", 1).await;
        store.set("k", Some(json!(1))).await.unwrap();
        store.set("k", Some(json!(2))).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
    }
}

#[tokio::test]
async fn set_is_chainable() {
    for env in environments() {
        let store = env.open("app", 1).await;
        store
            .set("a", Some(json!(1)))
            .await
            .unwrap()
            .set("b", Some(json!(2)))
            .await
            .unwrap();
        assert_eq!(collect_keys(&store).await, ["a", "b"], "{:?}", env.engine);
    }
}

// ============================================================================
// Absent values
// ============================================================================

#[tokio::test]
async fn set_none_deletes() {
    for env in environments() {
        let store = env.open("app", 1).await;
        store.set("k", Some(json!("v"))).await.unwrap();
        store.set("k", None).await.unwrap();
        assert!(!store.has("k").await.unwrap(), "{:?}", env.engine);
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}

#[tokio::test]
async fn set_empty_string_and_has_is_true() {
    for env in environments() {
        let store = env.open("app", 1).await;
        store.set("empty", Some(json!(""))).await.unwrap();
        assert!(store.has("empty").await.unwrap(), "{:?}", env.engine);
        assert_eq!(store.get("empty").await.unwrap(), Some(json!("")));
    }
}

#[tokio::test]
async fn null_is_a_stored_value() {
    for env in environments() {
        let store = env.open("app", 1).await;
        store.set("nothing", Some(Value::Null)).await.unwrap();
        assert!(store.has("nothing").await.unwrap(), "{:?}", env.engine);
        assert_eq!(store.get("nothing").await.unwrap(), Some(Value::Null));
    }
}

// ============================================================================
// Delete and clear
// ============================================================================

#[tokio::test]
async fn delete_absent_key_returns_true() {
    for env in environments() {
        let store = env.open("app", 1).await;
        assert!(store.delete("never-set").await.unwrap(), "{:?}", env.engine);
    }
}

#[tokio::test]
async fn delete_removes() {
    for env in environments() {
        let store = env.open("app", 1).await;
        store.set("k", Some(json!(1))).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.has("k").await.unwrap(), "{:?}", env.engine);
    }
}

#[tokio::test]
async fn clear_is_idempotent_and_keeps_version() {
    for env in environments() {
        let store = env.open("app", 2).await;
        store.set("a", Some(json!(1))).await.unwrap();
        store.set("b", Some(json!(2))).await.unwrap();

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(collect_keys(&store).await.is_empty(), "{:?}", env.engine);
        store.close().await.unwrap();

        // Version 2 survived the clear, so reopening at 2 runs nothing
        let store = Kvs::open(
            "app",
            2,
            env.options()
                .upgrade(|_| async { Err::<(), _>(anyhow::anyhow!("must not run")) }),
        )
        .await
        .unwrap();
        assert!(!store.has("a").await.unwrap());
    }
}

// ============================================================================
// Typed helpers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    visits: u32,
}

#[tokio::test]
async fn typed_values() {
    for env in environments() {
        let store = env.open("app", 1).await;
        let profile = Profile {
            name: "bob".into(),
            visits: 3,
        };
        store.set_as("profile", &profile).await.unwrap();
        let read: Option<Profile> = store.get_as("profile").await.unwrap();
        assert_eq!(read, Some(profile), "{:?}", env.engine);

        let missing: Option<Profile> = store.get_as("nobody").await.unwrap();
        assert_eq!(missing, None);

        let wrong: Result<Option<u64>> = store.get_as("profile").await;
        assert!(matches!(wrong, Err(Error::Serialization(_))));
    }
}

#[tokio::test]
async fn invalid_open_arguments() {
    for env in environments() {
        let err = Kvs::open("", 1, env.options()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{:?}", env.engine);

        let err = Kvs::open("app", 0, env.options()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{:?}", env.engine);

        let err = Kvs::open("app", 1, env.options().table_name(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{:?}", env.engine);
    }
}
