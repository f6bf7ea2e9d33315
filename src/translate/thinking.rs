use std::sync::LazyLock;

use regex_lite::Regex;

use crate::config::ThinkingMode;

static SUMMARY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<summary>.*?</summary>").expect("static pattern"));
static DETAILS_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<details[^>]*>").expect("static pattern"));
static QUOTE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^> ").expect("static pattern"));

/// Normalize one thinking-phase fragment.
///
/// Summary blocks and leftover wrapper tags are removed, `<details>` is
/// rewritten per `mode` and markdown quote prefixes are dropped. The result
/// is trimmed.
#[must_use]
pub fn transform_thinking(content: &str, mode: ThinkingMode) -> String {
    let without_summary = SUMMARY_BLOCK.replace_all(content, "");
    let cleaned = without_summary
        .replace("</thinking>", "")
        .replace("<Full>", "")
        .replace("</Full>", "");
    let cleaned = cleaned.trim();

    let wrapped = match mode {
        ThinkingMode::Think => DETAILS_OPEN
            .replace_all(cleaned, "<span>")
            .replace("</details>", "</span>"),
        ThinkingMode::Strip => DETAILS_OPEN
            .replace_all(cleaned, "")
            .replace("</details>", ""),
        ThinkingMode::Raw => cleaned.to_string(),
    };

    let unquoted = QUOTE_PREFIX.replace_all(&wrapped, "");
    unquoted.replace("\n> ", "\n").trim().to_string()
}
