//! Property Tests
//!
//! Random operation sequences behave like an ordered map on every engine.

use crate::common::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Op {
    Set(String, i64),
    SetNone(String),
    Delete(String),
    Clear,
}

fn key() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "", "a.__.b", "a/b", "日本"]).prop_map(String::from)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (key(), any::<i64>()).prop_map(|(k, v)| Op::Set(k, v)),
        2 => key().prop_map(Op::SetNone),
        2 => key().prop_map(Op::Delete),
        1 => Just(Op::Clear),
    ]
}

async fn check(env: &TestEnv, ops: &[Op]) {
    let store = env.open("prop", 1).await;
    let mut model = BTreeMap::new();
    for op in ops {
        match op {
            Op::Set(k, v) => {
                store.set(k, Some(json!(v))).await.unwrap();
                model.insert(k.clone(), json!(v));
            }
            Op::SetNone(k) => {
                store.set(k, None).await.unwrap();
                model.remove(k);
            }
            Op::Delete(k) => {
                assert!(store.delete(k).await.unwrap());
                model.remove(k);
            }
            Op::Clear => {
                store.clear().await.unwrap();
                model.clear();
            }
        }
    }
    for k in ["a", "b", "c", "", "a.__.b", "a/b", "日本"] {
        assert_eq!(store.has(k).await.unwrap(), model.contains_key(k), "{:?} {k}", env.engine);
        assert_eq!(store.get(k).await.unwrap(), model.get(k).cloned());
    }
    let expected: Vec<(String, Value)> = model.into_iter().collect();
    assert_eq!(collect_entries(&store).await, expected, "{:?}", env.engine);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn operations_match_ordered_map(ops in prop::collection::vec(op(), 0..24)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            for env in environments() {
                check(&env, &ops).await;
            }
        });
    }
}
