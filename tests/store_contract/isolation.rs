//! Isolation Tests
//!
//! Distinct names and tables never observe each other.

use crate::common::*;

#[tokio::test]
async fn names_are_isolated() {
    for env in environments() {
        let a = env.open("alpha", 1).await;
        let b = env.open("beta", 1).await;
        a.set("k", Some(json!("a"))).await.unwrap();
        b.set("k", Some(json!("b"))).await.unwrap();

        assert_eq!(a.get("k").await.unwrap(), Some(json!("a")), "{:?}", env.engine);
        assert_eq!(b.get("k").await.unwrap(), Some(json!("b")));

        a.clear().await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), Some(json!("b")), "{:?}", env.engine);
    }
}

#[tokio::test]
async fn tables_are_isolated() {
    for env in environments() {
        // Open sequentially: on the transactional engine a new table closes
        // earlier handles of the same database
        let users = env.open_table("app", "users", 1).await;
        users.set("k", Some(json!("user"))).await.unwrap();
        users.close().await.unwrap();

        let orders = env.open_table("app", "orders", 1).await;
        assert_eq!(orders.get("k").await.unwrap(), None, "{:?}", env.engine);
        orders.set("k", Some(json!("order"))).await.unwrap();
        orders.clear().await.unwrap();
        orders.close().await.unwrap();

        let users = env.open_table("app", "users", 1).await;
        assert_eq!(users.get("k").await.unwrap(), Some(json!("user")), "{:?}", env.engine);
        assert_eq!(collect_keys(&users).await, ["k"]);
    }
}

#[tokio::test]
async fn tables_keep_separate_versions() {
    for env in environments() {
        env.open_table("app", "users", 3).await.close().await.unwrap();
        // A second table of the same store starts from zero
        let calls = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = std::sync::Arc::clone(&calls);
        Kvs::open(
            "app",
            1,
            env.options().table_name("orders").upgrade(move |ctx| async move {
                log.lock().unwrap().push(ctx.old_version);
                Ok::<_, anyhow::Error>(())
            }),
        )
        .await
        .unwrap()
        .close()
        .await
        .unwrap();
        assert_eq!(*calls.lock().unwrap(), [0], "{:?}", env.engine);

        // and `users` is still at 3
        let err = Kvs::open("app", 2, env.options().table_name("users"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VersionDowngrade { stored: 3, .. }));
    }
}

#[tokio::test]
async fn flat_drop_leaves_other_tables() {
    for env in environments().into_iter().filter(TestEnv::is_flat) {
        let users = env.open_table("app", "users", 1).await;
        let orders = env.open_table("app", "orders", 1).await;
        let default = env.open("app", 1).await;
        users.set("k", Some(json!(1))).await.unwrap();
        orders.set("k", Some(json!(2))).await.unwrap();
        default.set("k", Some(json!(3))).await.unwrap();

        users.drop_instance().await.unwrap();
        assert_eq!(orders.get("k").await.unwrap(), Some(json!(2)), "{:?}", env.engine);
        assert_eq!(default.get("k").await.unwrap(), Some(json!(3)));

        let users = env.open_table("app", "users", 1).await;
        assert_eq!(users.get("k").await.unwrap(), None);
    }
}

#[tokio::test]
async fn flat_prefix_lookalikes_are_isolated() {
    for env in environments().into_iter().filter(TestEnv::is_flat) {
        // "app" and "app2" share a textual prefix, not a namespace
        let app = env.open("app", 1).await;
        let app2 = env.open("app2", 1).await;
        app2.set("k", Some(json!(2))).await.unwrap();
        assert!(collect_keys(&app).await.is_empty(), "{:?}", env.engine);
        app.clear().await.unwrap();
        assert!(app2.has("k").await.unwrap());
    }
}

#[tokio::test]
async fn flat_rejects_overlapping_names() {
    for env in environments().into_iter().filter(TestEnv::is_flat) {
        for (name, table) in [("a/b", "kvs"), ("a.__.b", "kvs"), ("app", "t.__.x")] {
            let err = Kvs::open(name, 1, env.options().table_name(table))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{name}/{table}");
        }
    }
}

#[tokio::test]
async fn indexed_rejects_meta_table() {
    let env = TestEnv::new(Engine::Indexed);
    let err = Kvs::open("app", 1, env.options().table_name(kvs::META_STORE_NAME))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}
