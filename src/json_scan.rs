use std::ops::Range;

use memchr::memchr;

#[inline]
pub(crate) fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\n' | b'\r' | b'\t') {
        i += 1;
    }
    i
}

#[inline]
fn skip_ws_back(bytes: &[u8], mut end: usize) -> usize {
    while end > 0 && matches!(bytes[end - 1], b' ' | b'\n' | b'\r' | b'\t') {
        end -= 1;
    }
    end
}

/// Index of the quote closing the string literal that opens at `start`,
/// or the end of `bytes` when it never closes.
fn string_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Top-level brace-balanced objects in `text`, left to right, non-overlapping.
///
/// One pass with a stack of open brackets; text outside any object is skipped
/// to the next `{`. String literals inside an object are skipped with escape
/// handling so braces in them do not count.
/// Objects nested in an enclosing object that never closes are still
/// reported; a mismatched closer abandons everything open.
pub(crate) fn object_candidates(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut out: Vec<Range<usize>> = Vec::new();
    let mut open: Vec<(u8, usize)> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if open.is_empty() {
            let Some(rel) = memchr(b'{', &bytes[i..]) else {
                break;
            };
            i += rel;
        }
        match bytes[i] {
            b'"' => i = string_end(bytes, i),
            opener @ (b'{' | b'[') => open.push((opener, i)),
            closer @ (b'}' | b']') => match open.pop() {
                Some((b'{', start)) if closer == b'}' => {
                    while out.last().is_some_and(|inner| inner.start > start) {
                        out.pop();
                    }
                    out.push(start..i + 1);
                }
                Some((b'[', _)) if closer == b']' => {}
                Some(_) => open.clear(),
                None => {}
            },
            _ => {}
        }
        i += 1;
    }
    out
}

/// Widen `range` to cover a surrounding markdown code fence
/// (```` ``` ```` or ```` ```json ````) when both fence ends are present.
pub(crate) fn widen_to_code_fence(text: &str, range: Range<usize>) -> Range<usize> {
    let bytes = text.as_bytes();
    let before = skip_ws_back(bytes, range.start);
    let head = &text[..before];
    let open = if head.ends_with("```json") {
        Some(before - "```json".len())
    } else if head.ends_with("```") {
        Some(before - "```".len())
    } else {
        None
    };
    let Some(open) = open else {
        return range;
    };
    let after = skip_ws(bytes, range.end);
    if text[after..].starts_with("```") {
        open..after + 3
    } else {
        range
    }
}
