//! CoordinationStore interface tests.
//!
//! These tests verify the contract of the CoordinationStore trait.
//! Each store implementation should run these tests.

use uuid::Uuid;

use bellhop::storage::CoordinationStore;

/// Key unique to one test run, so shared stores never collide.
pub fn unique_key(name: &str) -> String {
    format!("{}_{}", name, Uuid::new_v4().simple())
}

// =============================================================================
// Scalar keys
// =============================================================================

pub async fn test_get_missing<S: CoordinationStore>(store: &S) {
    let key = unique_key("missing");

    assert!(!store.exists(&key).await.expect("exists should succeed"));
    assert_eq!(store.get(&key).await.expect("get should succeed"), None);
}

pub async fn test_set_get_del<S: CoordinationStore>(store: &S) {
    let key = unique_key("scalar");

    store.set(&key, "http://w1:9100").await.expect("set should succeed");
    assert!(store.exists(&key).await.unwrap());
    assert_eq!(
        store.get(&key).await.unwrap(),
        Some("http://w1:9100".to_string())
    );

    store.set(&key, "http://w2:9100").await.unwrap();
    assert_eq!(
        store.get(&key).await.unwrap(),
        Some("http://w2:9100".to_string())
    );

    store.del(&key).await.expect("del should succeed");
    assert!(!store.exists(&key).await.unwrap());

    // deleting again is not an error
    store.del(&key).await.expect("second del should succeed");
}

pub async fn test_incr_by<S: CoordinationStore>(store: &S) {
    let key = unique_key("counter");

    // absent counts as zero
    assert_eq!(store.incr_by(&key, 1).await.unwrap(), 1);

    store.set(&key, "3").await.unwrap();
    assert_eq!(store.incr_by(&key, 1).await.unwrap(), 4);
    assert_eq!(store.incr_by(&key, -5).await.unwrap(), -1);
    assert_eq!(store.get(&key).await.unwrap(), Some("-1".to_string()));

    store.del(&key).await.unwrap();
}

pub async fn test_incr_by_non_integer_fails<S: CoordinationStore>(store: &S) {
    let key = unique_key("not_a_counter");

    store.set(&key, "abc").await.unwrap();
    assert!(store.incr_by(&key, 1).await.is_err());

    store.del(&key).await.unwrap();
}

// =============================================================================
// Lists
// =============================================================================

pub async fn test_lpush_lrange_order<S: CoordinationStore>(store: &S) {
    let key = unique_key("list");

    assert_eq!(store.llen(&key).await.unwrap(), 0);
    assert!(store.lrange(&key, 0, -1).await.unwrap().is_empty());

    store.lpush(&key, "a").await.unwrap();
    store.lpush(&key, "b").await.unwrap();
    store.lpush(&key, "c").await.unwrap();

    assert_eq!(store.llen(&key).await.unwrap(), 3);
    assert_eq!(store.lrange(&key, 0, 2).await.unwrap(), vec!["c", "b", "a"]);
    assert_eq!(store.lrange(&key, 0, -1).await.unwrap(), vec!["c", "b", "a"]);
    assert_eq!(store.lrange(&key, 1, 1).await.unwrap(), vec!["b"]);
    assert_eq!(store.lrange(&key, -2, -1).await.unwrap(), vec!["b", "a"]);
    assert!(store.lrange(&key, 5, 9).await.unwrap().is_empty());

    store.del(&key).await.unwrap();
}

pub async fn test_lrem_counts<S: CoordinationStore>(store: &S) {
    let key = unique_key("lrem");

    for value in ["x", "y", "x", "z", "x"] {
        store.lpush(&key, value).await.unwrap();
    }
    // list is now x z x y x

    assert_eq!(store.lrem(&key, 1, "x").await.unwrap(), 1);
    assert_eq!(store.lrange(&key, 0, -1).await.unwrap(), vec!["z", "x", "y", "x"]);

    assert_eq!(store.lrem(&key, -1, "x").await.unwrap(), 1);
    assert_eq!(store.lrange(&key, 0, -1).await.unwrap(), vec!["z", "x", "y"]);

    assert_eq!(store.lrem(&key, 0, "missing").await.unwrap(), 0);

    store.lpush(&key, "x").await.unwrap();
    assert_eq!(store.lrem(&key, 0, "x").await.unwrap(), 2);
    assert_eq!(store.lrange(&key, 0, -1).await.unwrap(), vec!["z", "y"]);

    store.del(&key).await.unwrap();
}

pub async fn test_lrem_last_element_empties_list<S: CoordinationStore>(store: &S) {
    let key = unique_key("lrem_last");

    store.lpush(&key, "only").await.unwrap();
    assert_eq!(store.lrem(&key, 1, "only").await.unwrap(), 1);

    assert_eq!(store.llen(&key).await.unwrap(), 0);
    assert!(!store.exists(&key).await.unwrap());
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all CoordinationStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_coordination_store_tests {
    ($store:expr) => {
        use $crate::storage::coordination_store_tests::*;

        // scalar keys
        test_get_missing($store).await;
        println!("  test_get_missing: PASSED");

        test_set_get_del($store).await;
        println!("  test_set_get_del: PASSED");

        test_incr_by($store).await;
        println!("  test_incr_by: PASSED");

        test_incr_by_non_integer_fails($store).await;
        println!("  test_incr_by_non_integer_fails: PASSED");

        // lists
        test_lpush_lrange_order($store).await;
        println!("  test_lpush_lrange_order: PASSED");

        test_lrem_counts($store).await;
        println!("  test_lrem_counts: PASSED");

        test_lrem_last_element_empties_list($store).await;
        println!("  test_lrem_last_element_empties_list: PASSED");
    };
}
