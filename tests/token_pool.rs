use std::sync::Arc;

use rustc_hash::FxHashMap;
use zai_gateway::credentials::BackupTokenPool;

fn drain(pool: &BackupTokenPool, n: usize) -> Vec<String> {
    (0..n).map(|_| pool.next_token().expect("token")).collect()
}

#[test]
fn test_two_token_rotation() {
    let pool = BackupTokenPool::from_delimited_list("a,b");
    assert_eq!(drain(&pool, 5), vec!["a", "b", "a", "b", "a"]);
}

#[test]
fn test_round_robin_fairness_for_any_count() {
    for k in 1..=5 {
        let list: Vec<String> = (0..k).map(|i| format!("t{i}")).collect();
        let pool = BackupTokenPool::from_delimited_list(&list.join(","));
        for n in [0usize, 1, k - 1, k, 2 * k + 1, 17] {
            pool.load_from_delimited_list(&list.join(","));
            let drawn = drain(&pool, n);
            for (i, token) in drawn.iter().enumerate() {
                assert_eq!(token, &list[i % k], "k={k} n={n}");
            }
            let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
            for token in &drawn {
                *counts.entry(token.as_str()).or_default() += 1;
            }
            for token in &list {
                let seen = counts.get(token.as_str()).copied().unwrap_or(0);
                assert!(seen == n / k || seen == n.div_ceil(k), "k={k} n={n} {token}={seen}");
            }
        }
    }
}

#[test]
fn test_remove_before_cursor_neither_skips_nor_repeats() {
    let pool = BackupTokenPool::from_delimited_list("a,b,c,d");
    assert_eq!(drain(&pool, 2), vec!["a", "b"]);
    assert!(pool.remove("a"));
    assert_eq!(drain(&pool, 3), vec!["c", "d", "b"]);
}

#[test]
fn test_remove_at_cursor_moves_to_successor() {
    let pool = BackupTokenPool::from_delimited_list("a,b,c");
    assert_eq!(drain(&pool, 1), vec!["a"]);
    assert!(pool.remove("b"));
    assert_eq!(drain(&pool, 2), vec!["c", "a"]);
}

#[test]
fn test_add_is_idempotent() {
    let pool = BackupTokenPool::new();
    assert!(pool.add("x"));
    assert!(!pool.add("x"));
    assert!(!pool.add(" x "));
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.status().len(), 1);
}

#[test]
fn test_removed_token_stats_are_deleted_and_reset_on_readd() {
    let pool = BackupTokenPool::from_delimited_list("a");
    pool.record_result("a", false);
    assert!(pool.remove("a"));
    assert!(pool.status().is_empty());
    assert!(pool.next_token().is_none());
    assert!(pool.add("a"));
    let row = &pool.status()[0];
    assert_eq!((row.success, row.failure), (0, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_is_fair() {
    let pool = Arc::new(BackupTokenPool::from_delimited_list("a,b,c"));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            let mut drawn = Vec::with_capacity(30);
            for _ in 0..30 {
                let token = pool.next_token().expect("token");
                pool.record_result(&token, true);
                drawn.push(token);
                tokio::task::yield_now().await;
            }
            drawn
        }));
    }

    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for handle in handles {
        for token in handle.await.expect("task") {
            *counts.entry(token).or_default() += 1;
        }
    }
    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|&c| c == 80));
    for row in pool.status() {
        assert_eq!(row.success, 80);
        assert_eq!(row.failure, 0);
    }
}
