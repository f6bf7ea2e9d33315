use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Health counters of one backup token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenStats {
    pub success: u64,
    pub failure: u64,
}

/// Snapshot row returned by [`BackupTokenPool::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupTokenStatus {
    pub token: String,
    pub success: u64,
    pub failure: u64,
}

#[derive(Debug, Default)]
struct PoolInner {
    tokens: Vec<String>,
    cursor: usize,
    stats: FxHashMap<String, TokenStats>,
}

impl PoolInner {
    fn position(&self, token: &str) -> Option<usize> {
        self.tokens.iter().position(|t| t == token)
    }
}

/// Round-robin pool of long-lived backup tokens with per-token counters.
///
/// Every operation takes the lock for a short, non-async critical section,
/// so concurrent requests observe a single rotation order.
#[derive(Debug, Default)]
pub struct BackupTokenPool {
    inner: Mutex<PoolInner>,
}

impl BackupTokenPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_delimited_list(list: &str) -> Self {
        let pool = Self::new();
        pool.load_from_delimited_list(list);
        pool
    }

    /// Replace the whole pool from a comma-separated list.
    ///
    /// Entries are trimmed, empties dropped and duplicates collapsed with the
    /// first occurrence kept. The cursor resets to the start. Counters of
    /// tokens that stay pooled are kept; counters of dropped tokens go away.
    pub fn load_from_delimited_list(&self, list: &str) {
        let mut tokens: Vec<String> = Vec::new();
        for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if !tokens.iter().any(|existing| existing == token) {
                tokens.push(token.to_string());
            }
        }

        let mut inner = self.inner.lock();
        let mut stats = FxHashMap::default();
        for token in &tokens {
            let kept = inner.stats.get(token).copied().unwrap_or_default();
            stats.insert(token.clone(), kept);
        }
        inner.tokens = tokens;
        inner.stats = stats;
        inner.cursor = 0;
    }

    /// Append a token. Returns `false` for an empty or already pooled token.
    pub fn add(&self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            return false;
        }
        let mut inner = self.inner.lock();
        if inner.position(token).is_some() {
            return false;
        }
        inner.tokens.push(token.to_string());
        inner.stats.insert(token.to_string(), TokenStats::default());
        true
    }

    /// Remove a token and its counters. Returns `false` when it was not pooled.
    pub fn remove(&self, token: &str) -> bool {
        let token = token.trim();
        let mut inner = self.inner.lock();
        let Some(index) = inner.position(token) else {
            return false;
        };
        inner.tokens.remove(index);

        if inner.tokens.is_empty() {
            inner.cursor = 0;
        } else {
            // The cursor names the next token to hand out; removing an entry
            // before it shifts that token down by one.
            if index < inner.cursor {
                inner.cursor -= 1;
            }
            inner.cursor %= inner.tokens.len();
        }

        inner.stats.remove(token);
        true
    }

    /// Next token in round-robin order, or `None` when the pool is empty.
    pub fn next_token(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        if inner.tokens.is_empty() {
            return None;
        }
        let token = inner.tokens[inner.cursor].clone();
        inner.cursor = (inner.cursor + 1) % inner.tokens.len();
        Some(token)
    }

    /// Bump the success or failure counter. Untracked tokens are ignored.
    pub fn record_result(&self, token: &str, success: bool) {
        let mut inner = self.inner.lock();
        if let Some(stats) = inner.stats.get_mut(token) {
            if success {
                stats.success += 1;
            } else {
                stats.failure += 1;
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> Vec<BackupTokenStatus> {
        let inner = self.inner.lock();
        inner
            .tokens
            .iter()
            .map(|token| {
                let stats = inner.stats.get(token).copied().unwrap_or_default();
                BackupTokenStatus {
                    token: token.clone(),
                    success: stats.success,
                    failure: stats.failure,
                }
            })
            .collect()
    }

    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.inner.lock().tokens.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().tokens.is_empty()
    }

    /// The pool rendered back as a comma-joined list.
    #[must_use]
    pub fn to_delimited(&self) -> String {
        self.inner.lock().tokens.join(",")
    }

    #[cfg(test)]
    fn cursor(&self) -> usize {
        self.inner.lock().cursor
    }
}

/// Mask a token for display: `abcd...wxyz` when longer than 10 characters.
#[must_use]
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 10 {
        return token.to_string();
    }
    let head: String = token.chars().take(4).collect();
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_trims_and_collapses_duplicates() {
        let pool = BackupTokenPool::from_delimited_list(" a , b,, a ,c ");
        assert_eq!(pool.tokens(), vec!["a", "b", "c"]);
        assert_eq!(pool.to_delimited(), "a,b,c");
    }

    #[test]
    fn test_load_keeps_stats_of_retained_tokens() {
        let pool = BackupTokenPool::from_delimited_list("a,b");
        pool.record_result("a", true);
        pool.record_result("b", false);
        pool.next_token();
        pool.load_from_delimited_list("a,c");
        let status = pool.status();
        assert_eq!(status[0], BackupTokenStatus { token: "a".into(), success: 1, failure: 0 });
        assert_eq!(status[1], BackupTokenStatus { token: "c".into(), success: 0, failure: 0 });
        assert_eq!(pool.cursor(), 0);
        pool.record_result("b", true);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_rotation_wraps() {
        let pool = BackupTokenPool::from_delimited_list("a,b");
        let seen: Vec<_> = (0..3).filter_map(|_| pool.next_token()).collect();
        assert_eq!(seen, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_empty_pool_yields_none() {
        let pool = BackupTokenPool::new();
        assert!(pool.next_token().is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_add_rejects_empty_and_duplicates() {
        let pool = BackupTokenPool::from_delimited_list("a");
        assert!(!pool.add("  "));
        assert!(!pool.add(" a "));
        assert!(pool.add("b"));
        assert!(!pool.add("b"));
        assert_eq!(pool.tokens(), vec!["a", "b"]);
    }

    #[test]
    fn test_remove_before_cursor_does_not_skip() {
        let pool = BackupTokenPool::from_delimited_list("a,b,c");
        assert_eq!(pool.next_token().as_deref(), Some("a"));
        assert_eq!(pool.next_token().as_deref(), Some("b"));
        assert!(pool.remove("a"));
        assert_eq!(pool.next_token().as_deref(), Some("c"));
        assert_eq!(pool.next_token().as_deref(), Some("b"));
    }

    #[test]
    fn test_remove_at_cursor_hands_out_successor() {
        let pool = BackupTokenPool::from_delimited_list("a,b,c");
        assert_eq!(pool.next_token().as_deref(), Some("a"));
        assert!(pool.remove("b"));
        assert_eq!(pool.next_token().as_deref(), Some("c"));
        assert_eq!(pool.next_token().as_deref(), Some("a"));
    }

    #[test]
    fn test_remove_tail_at_cursor_wraps() {
        let pool = BackupTokenPool::from_delimited_list("a,b,c");
        pool.next_token();
        pool.next_token();
        assert!(pool.remove("c"));
        assert_eq!(pool.cursor(), 0);
        assert_eq!(pool.next_token().as_deref(), Some("a"));
    }

    #[test]
    fn test_remove_after_cursor_keeps_position() {
        let pool = BackupTokenPool::from_delimited_list("a,b,c");
        assert_eq!(pool.next_token().as_deref(), Some("a"));
        assert!(pool.remove("c"));
        assert_eq!(pool.next_token().as_deref(), Some("b"));
        assert_eq!(pool.next_token().as_deref(), Some("a"));
    }

    #[test]
    fn test_remove_last_resets_cursor_and_stats() {
        let pool = BackupTokenPool::from_delimited_list("a");
        pool.next_token();
        pool.record_result("a", true);
        assert!(pool.remove("a"));
        assert!(!pool.remove("a"));
        assert_eq!(pool.cursor(), 0);
        assert!(pool.status().is_empty());
        assert!(pool.add("a"));
        assert_eq!(pool.status()[0].success, 0);
    }

    #[test]
    fn test_record_result_ignores_unknown_token() {
        let pool = BackupTokenPool::from_delimited_list("a");
        pool.record_result("zzz", true);
        pool.record_result("a", false);
        assert_eq!(pool.status()[0].failure, 1);
        assert_eq!(pool.next_token().as_deref(), Some("a"));
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("short"), "short");
        assert_eq!(mask_token("exactly10c"), "exactly10c");
        assert_eq!(mask_token("abcdefghijklmnop"), "abcd...mnop");
    }
}
