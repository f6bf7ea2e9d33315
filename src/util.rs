use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static CALL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
const HEX: &[u8; 16] = b"0123456789abcdef";

#[inline]
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Fresh `call_<hex>` id for a tool call that arrived without one.
#[inline]
pub(crate) fn next_call_id() -> String {
    let id = CALL_ID_COUNTER.fetch_add(1, Ordering::Relaxed) ^ (fastrand::u64(..) << 20);
    let mut out = String::with_capacity(21);
    out.push_str("call_");
    push_u64_hex_16(&mut out, id);
    out
}

#[inline]
pub(crate) fn format_request_seq_hex(prefix: &str, request_seq: u64) -> String {
    let mut out = String::with_capacity(prefix.len() + 16);
    out.push_str(prefix);
    push_u64_hex_16(&mut out, request_seq);
    out
}

#[inline]
fn push_u64_hex_16(out: &mut String, mut value: u64) {
    let mut buf = [b'0'; 16];
    let mut idx = 16;
    while idx > 0 {
        idx -= 1;
        let nibble = usize::try_from(value & 0x0f).unwrap_or(0);
        buf[idx] = HEX[nibble];
        value >>= 4;
    }
    for byte in buf {
        out.push(char::from(byte));
    }
}

#[cfg(test)]
mod tests {
    use super::{format_request_seq_hex, next_call_id};

    #[test]
    fn format_request_seq_hex_matches_formatter() {
        assert_eq!(
            format_request_seq_hex("chatcmpl-", 0x1234_abcd_u64),
            "chatcmpl-000000001234abcd"
        );
        assert_eq!(
            format_request_seq_hex("chatcmpl-", u64::MAX),
            "chatcmpl-ffffffffffffffff"
        );
    }

    #[test]
    fn call_ids_are_prefixed_and_distinct() {
        let a = next_call_id();
        let b = next_call_id();
        assert!(a.starts_with("call_"));
        assert_eq!(a.len(), 21);
        assert_ne!(a, b);
    }
}
