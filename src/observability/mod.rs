use std::time::Instant;

use tracing_subscriber::EnvFilter;

use crate::credentials::Credential;
use crate::translate::RequestOutcome;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
pub fn init_tracing(log_level: &str) {
    let level = log_level.to_uppercase();

    if level == "DISABLED" {
        return;
    }

    let filter = EnvFilter::try_new(tracing_level_name(&level)).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn tracing_level_name(level: &str) -> &str {
    match level {
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    }
}

/// Log the terminal outcome of one chat request.
pub fn log_request_outcome(
    request_id: &str,
    model: &str,
    credential: &Credential,
    outcome: &RequestOutcome,
    started: Instant,
) {
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        request_id,
        model,
        status = outcome.http_status,
        success = outcome.success,
        outcome = %outcome.kind,
        credential_source = %credential.source,
        credential = %credential.display(),
        duration_ms,
        "chat request finished"
    );
}
