use crate::columns::{normalize_header, AmountSource, ColumnMapping};
use crate::error::{Result, StatementError};
use crate::summary::{build_summary, Summary};
use crate::table::{cell_to_string, RawTable};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Sentinel merchant for rows whose merchant cell is blank or unresolvable.
pub const UNKNOWN_MERCHANT: &str = "unknown merchant";

/// Date formats attempted in order when parsing a date cell.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%m/%d/%y",
    "%b %d, %Y",
    "%d %b %Y",
    "%B %d, %Y",
];

/// Datetime formats attempted after the plain date formats.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Currency codes stripped from amount strings, matched case-insensitively.
/// `gh₵` must precede the bare symbol so the `gh` prefix is not left behind.
const CURRENCY_CODES: &[&str] = &["gh₵", "ghs", "ghc", "usd", "eur", "gbp"];

/// Currency symbols and separators stripped from amount strings.
const CURRENCY_CHARS: &[char] = &['$', '£', '€', '₵', '¢', '₹', ',', ' '];

/// One row of the normalized transaction table.
///
/// Invariants held by construction: `date` parsed successfully, `amount` is
/// finite, `merchant` is non-empty (the sentinel is substituted otherwise),
/// and `is_suspicious` is exactly `amount < 0`. Rows that cannot satisfy the
/// first two are dropped, never kept with a missing field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    pub date: NaiveDate,
    pub merchant: String,
    pub amount: f64,
    pub is_suspicious: bool,
    /// Pass-through columns the resolver did not claim, keyed by normalized
    /// header name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// Apply a resolved mapping to a validated table.
///
/// Parses dates and currency-formatted amounts, lowercases merchant text,
/// drops rows missing a parsed date or amount, flags negative amounts as
/// suspicious, and sorts ascending by date. Deterministic and idempotent:
/// normalizing an already-normalized table yields the same rows.
///
/// Fails with `UnresolvedSchema` when the mapping lacks a date or amount
/// role. An unresolved merchant is substituted with [`UNKNOWN_MERCHANT`].
pub fn normalize(table: &RawTable, mapping: &ColumnMapping) -> Result<(Vec<Transaction>, Summary)> {
    let date_column = mapping.date.as_deref().ok_or_else(|| missing_roles(mapping))?;
    let amount_source = mapping.amount.as_ref().ok_or_else(|| missing_roles(mapping))?;

    let date_idx = table
        .column_index(date_column)
        .ok_or_else(|| StatementError::UnresolvedSchema(format!("date column '{}' not in table", date_column)))?;
    let merchant_idx = mapping
        .merchant
        .as_deref()
        .and_then(|c| table.column_index(c));

    let claimed = claimed_headers(mapping);
    let total_rows = table.row_count();
    let mut transactions = Vec::with_capacity(total_rows);

    for row in table.rows() {
        let Some(date) = row
            .get(date_idx)
            .and_then(cell_to_string)
            .and_then(|s| parse_date(&s))
        else {
            continue;
        };

        let Some(amount) = row_amount(table, row, amount_source) else {
            continue;
        };

        let merchant = merchant_idx
            .and_then(|idx| row.get(idx))
            .and_then(cell_to_string)
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string());

        let mut extra = BTreeMap::new();
        for (header, cell) in table.headers().iter().zip(row.iter()) {
            if claimed.contains(&header.as_str()) || cell.is_null() {
                continue;
            }
            extra.insert(normalize_header(header), cell.clone());
        }

        transactions.push(Transaction {
            date,
            merchant,
            amount,
            is_suspicious: amount < 0.0,
            extra,
        });
    }

    // Stable sort keeps input order among same-date rows, which is what makes
    // repeated normalization yield identical output.
    transactions.sort_by_key(|t| t.date);

    let summary = build_summary(total_rows, &transactions);
    info!(
        "Normalized {} of {} rows ({} dropped, {} suspicious)",
        summary.valid_rows, summary.total_rows, summary.invalid_rows, summary.suspicious_count
    );

    Ok((transactions, summary))
}

fn missing_roles(mapping: &ColumnMapping) -> StatementError {
    let mut missing = Vec::new();
    if mapping.date.is_none() {
        missing.push("date");
    }
    if mapping.amount.is_none() {
        missing.push("amount");
    }
    StatementError::UnresolvedSchema(missing.join(", "))
}

fn claimed_headers(mapping: &ColumnMapping) -> Vec<&str> {
    let mut claimed = Vec::new();
    if let Some(date) = mapping.date.as_deref() {
        claimed.push(date);
    }
    match mapping.amount.as_ref() {
        Some(AmountSource::Column(c)) => claimed.push(c),
        Some(AmountSource::DebitCredit { debit, credit }) => {
            claimed.push(debit);
            claimed.push(credit);
        }
        None => {}
    }
    if let Some(merchant) = mapping.merchant.as_deref() {
        claimed.push(merchant);
    }
    claimed
}

fn row_amount(table: &RawTable, row: &[Value], source: &AmountSource) -> Option<f64> {
    match source {
        AmountSource::Column(column) => {
            let idx = table.column_index(column)?;
            row.get(idx).and_then(cell_to_string).and_then(|s| clean_amount(&s))
        }
        AmountSource::DebitCredit { debit, credit } => {
            // Deposits positive: amount = credit - debit, missing side is 0.
            let side = |column: &str| -> f64 {
                table
                    .column_index(column)
                    .and_then(|idx| row.get(idx))
                    .and_then(cell_to_string)
                    .and_then(|s| clean_amount(&s))
                    .unwrap_or(0.0)
            };
            Some(side(credit) - side(debit))
        }
    }
}

/// Parse a date cell, trying each known format in order.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }
    None
}

/// Parse a currency-formatted amount string into a signed number.
///
/// A value fully wrapped in parentheses is negative. Currency symbols, 3-4
/// letter currency codes and thousands separators are stripped before the
/// direct parse; if that still fails, everything except digits, `.` and `-`
/// is removed and the remainder parsed, where a lone `.`/`-`/empty string
/// means "missing" rather than zero.
pub fn clean_amount(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (inner, negated) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (inner, true),
        None => (trimmed, false),
    };

    let mut cleaned = inner.to_lowercase();
    for code in CURRENCY_CODES {
        cleaned = cleaned.replace(code, "");
    }
    cleaned.retain(|c| !CURRENCY_CHARS.contains(&c));

    let value = match cleaned.parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            let stripped: String = cleaned
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            if stripped.is_empty() || stripped == "." || stripped == "-" {
                debug!("Amount cell '{}' could not be parsed; treating as missing", text);
                return None;
            }
            stripped.parse::<f64>().ok()?
        }
    };

    if !value.is_finite() {
        return None;
    }
    Some(if negated { -value } else { value })
}
