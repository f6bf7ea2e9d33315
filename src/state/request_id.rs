use std::sync::atomic::{AtomicU64, Ordering};

use crate::util::format_request_seq_hex;

/// Per-process generator of request ids and upstream chat/message uuids.
pub(crate) struct RequestIdGenerator {
    seed: u128,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        let seed_hi = u128::from(fastrand::u64(..));
        let seed_lo = u128::from(fastrand::u64(..));
        Self {
            seed: (seed_hi << 64) | seed_lo,
            counter: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// `chatcmpl-<hex>` id shown to the client.
    #[must_use]
    pub(crate) fn completion_id(&self, request_seq: u64) -> String {
        let mixed = (self.seed as u64) ^ request_seq.rotate_left(32);
        format_request_seq_hex("chatcmpl-", mixed)
    }

    /// Distinct uuids for the upstream `chat_id` and message `id`.
    #[must_use]
    pub(crate) fn upstream_ids(&self, request_seq: u64) -> (uuid::Uuid, uuid::Uuid) {
        let base = self.seed ^ (u128::from(request_seq) << 1);
        (uuid::Uuid::from_u128(base), uuid::Uuid::from_u128(base ^ 1))
    }
}
