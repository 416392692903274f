use crate::error::{Result, StatementError};
use crate::table::{cell_to_string, RawTable};
use log::debug;

/// Hard cap on row count; anything larger is refused outright.
pub const MAX_ROWS: usize = 100_000;
pub const MIN_COLUMNS: usize = 2;
pub const MAX_COLUMNS: usize = 50;

/// Number of leading rows whose cells are scanned for injection patterns.
const SAMPLE_ROWS: usize = 10;

/// Substrings that must never appear in headers or sampled cell values.
/// Matched case-insensitively against the string-coerced value.
const DENYLIST: &[&str] = &[
    "javascript:",
    "<script",
    "onerror=",
    "onclick=",
    "onload=",
    "eval(",
    "exec(",
    "__import__",
    "getattr(",
    "system(",
];

/// Structural and content safety gate for an uploaded table.
///
/// Checks run in order and short-circuit on the first failure. The check is
/// pure: the table is never modified and nothing is partially processed. On
/// failure the returned `ValidationFailed` carries a human-readable reason the
/// caller can show verbatim.
pub fn validate(table: &RawTable) -> Result<()> {
    if table.is_empty() {
        return Err(StatementError::ValidationFailed(
            "Uploaded table is empty".to_string(),
        ));
    }

    let columns = table.column_count();
    if !(MIN_COLUMNS..=MAX_COLUMNS).contains(&columns) {
        return Err(StatementError::ValidationFailed(format!(
            "Table has {} columns; expected between {} and {}",
            columns, MIN_COLUMNS, MAX_COLUMNS
        )));
    }

    if table.row_count() > MAX_ROWS {
        return Err(StatementError::ValidationFailed(format!(
            "Table has {} rows; the maximum supported is {}",
            table.row_count(),
            MAX_ROWS
        )));
    }

    for header in table.headers() {
        if let Some(pattern) = find_denied(header) {
            return Err(StatementError::ValidationFailed(format!(
                "Header '{}' contains disallowed content '{}'",
                header, pattern
            )));
        }
    }

    for (row_idx, row) in table.rows().iter().take(SAMPLE_ROWS).enumerate() {
        for cell in row {
            let Some(text) = cell_to_string(cell) else {
                continue;
            };
            if let Some(pattern) = find_denied(&text) {
                return Err(StatementError::ValidationFailed(format!(
                    "Row {} contains disallowed content '{}'",
                    row_idx + 1,
                    pattern
                )));
            }
        }
    }

    debug!(
        "Table passed safety validation: {} rows, {} columns",
        table.row_count(),
        columns
    );

    Ok(())
}

fn find_denied(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    DENYLIST
        .iter()
        .find(|pattern| lowered.contains(**pattern))
        .copied()
}
