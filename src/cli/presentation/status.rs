//! Status command presentation.

use crate::error::{ApiError, StorageError};
use crate::store::GenerationRecord;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

pub fn format_status_text(book_id: &str, records: &[GenerationRecord]) -> String {
    if records.is_empty() {
        return format!("No generation records for {}", book_id);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Section", "Status", "Model", "Prompt", "Attempts", "Error", "Finished",
    ]);
    for record in records {
        let error = match (&record.error_code, &record.error_message) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (Some(code), None) => code.clone(),
            _ => "-".to_string(),
        };
        let finished = record
            .finished_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            record.key.section.to_string(),
            record.status.as_str().to_string(),
            format!("{}/{}", record.key.provider, record.key.model),
            record.key.prompt_version.clone(),
            record.attempt_count.to_string(),
            error,
            finished,
        ]);
    }
    format!("Book: {}\n\n{}", book_id, table)
}

pub fn format_status_json(records: &[GenerationRecord]) -> Result<String, ApiError> {
    serde_json::to_string_pretty(records)
        .map_err(|e| ApiError::StorageError(StorageError::from_json(e)))
}
