//! In-memory coordination store contract tests.
//!
//! The gateway unit tests run against this store, so it must honour the same
//! contract as Redis.

mod storage;

use bellhop::storage::MemoryCoordinationStore;

#[tokio::test]
async fn test_memory_coordination_store() {
    println!("=== Memory CoordinationStore Tests ===");

    let store = MemoryCoordinationStore::new();

    run_coordination_store_tests!(&store);

    println!("=== All Memory CoordinationStore tests PASSED ===");
}
