use crate::normalize::Transaction;
use serde_json::Value;

/// Currency symbols recognized when deciding how to render an amount.
const CURRENCY_SYMBOLS: &[char] = &['$', '₵', '€', '£', '¥', '¢', '₹'];

/// Pick a currency indicator for display: the first non-blank value of a
/// `currency` pass-through column, else `$`.
pub fn choose_currency(transactions: &[Transaction]) -> String {
    transactions
        .iter()
        .filter_map(|t| t.extra.get("currency"))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "$".to_string())
}

/// Render an amount with its currency indicator: symbols attach directly
/// (`$1,234.50`), short codes go in front uppercased (`GHS 1,234.50`).
pub fn format_amount(amount: f64, currency: &str) -> String {
    let cur = currency.trim();
    let cur = if cur.is_empty() { "$" } else { cur };
    let formatted = format_num::format_num!(",.2", amount);

    if cur.chars().any(|c| CURRENCY_SYMBOLS.contains(&c)) {
        format!("{}{}", cur, formatted)
    } else if cur.len() <= 3 {
        format!("{} {}", cur.to_uppercase(), formatted)
    } else {
        format!("{} {}", cur, formatted)
    }
}
