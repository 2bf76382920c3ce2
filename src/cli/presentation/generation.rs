//! Generate command presentation.

use crate::error::{ApiError, StorageError};
use crate::generation::GenerationOutcome;
use crate::telemetry::MetricsSnapshot;

pub fn format_generation_text(outcome: &GenerationOutcome) -> String {
    match outcome {
        GenerationOutcome::Complete {
            key,
            record_id,
            stored,
            attempt_count,
            content,
        } => {
            let source = if *stored { "stored" } else { "generated" };
            let body = serde_json::to_string_pretty(content).unwrap_or_else(|_| content.to_string());
            format!(
                "Status: complete ({})\n  Book: {}\n  Section: {}\n  Model: {}/{}\n  Prompt: {}\n  Record: {}\n  Attempt: {}\n\n{}",
                source,
                key.book_id,
                key.section,
                key.provider,
                key.model,
                key.prompt_version,
                record_id,
                attempt_count,
                body
            )
        }
        GenerationOutcome::Pending { retry_after_ms } => format!(
            "Status: pending\n  Another request is generating this section; retry in {} ms",
            retry_after_ms
        ),
        GenerationOutcome::Failed { error_code } => format!(
            "Status: failed ({})\n  Re-run with --force to regenerate",
            error_code.as_deref().unwrap_or("unknown")
        ),
    }
}

pub fn format_generation_json(
    outcome: &GenerationOutcome,
    metrics: Option<&MetricsSnapshot>,
) -> Result<String, ApiError> {
    let value = match metrics {
        Some(metrics) => serde_json::json!({ "result": outcome, "metrics": metrics }),
        None => serde_json::to_value(outcome)
            .map_err(|e| ApiError::StorageError(StorageError::from_json(e)))?,
    };
    serde_json::to_string_pretty(&value)
        .map_err(|e| ApiError::StorageError(StorageError::from_json(e)))
}
