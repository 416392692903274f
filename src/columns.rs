use crate::normalize::{clean_amount, parse_date};
use crate::table::{cell_to_string, RawTable};
use log::debug;
use serde::{Deserialize, Serialize};

/// Header aliases for the transaction-date role, in priority order.
const DATE_ALIASES: &[&str] = &[
    "date",
    "transaction_date",
    "posting_date",
    "post_date",
    "trans_date",
    "txn_date",
    "value_date",
    "booking_date",
];

/// Header aliases for the amount role, in priority order.
const AMOUNT_ALIASES: &[&str] = &[
    "amount",
    "transaction_amount",
    "amt",
    "value",
    "debit",
    "credit",
    "debit_amount",
    "credit_amount",
];

/// Header aliases for the merchant/description role, in priority order.
const MERCHANT_ALIASES: &[&str] = &[
    "merchant",
    "vendor",
    "description",
    "desc",
    "payee",
    "narration",
    "details",
    "memo",
    "merchant_name",
    "name",
];

/// Rows sampled when sniffing a column's content for dates.
const DATE_SNIFF_SAMPLE: usize = 5;
/// Rows sampled when sniffing a column's content for amounts.
const AMOUNT_SNIFF_SAMPLE: usize = 10;
/// Fraction of a sample that must parse for a sniff to accept the column.
const SNIFF_THRESHOLD: f64 = 0.8;

/// Where the signed amount comes from: a single column, or a debit/credit
/// pair merged as `credit - debit` (deposits positive, missing treated as 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountSource {
    Column(String),
    DebitCredit { debit: String, credit: String },
}

/// Resolved semantic roles, each holding the *source* header name.
///
/// `date` and `amount` are required downstream; the Normalizer turns either
/// being `None` into a hard failure. An unresolved merchant is not an error;
/// a placeholder is substituted instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: Option<String>,
    pub amount: Option<AmountSource>,
    pub merchant: Option<String>,
}

/// Map arbitrary input headers to the canonical date/amount/merchant roles.
///
/// Each role is resolved by an ordered list of strategies: alias-table match
/// first, then content sniffing. An alias match always wins over sniffing;
/// among aliases, list order is priority order; among sniffed candidates, the
/// first column in table order wins. For the amount role, a present
/// debit/credit pair is merged before any alias or sniff logic runs.
pub fn resolve(table: &RawTable) -> ColumnMapping {
    let headers = HeaderSet::new(table.headers());

    let date = resolve_date(&headers, table);
    let amount = resolve_amount(&headers, table, date.as_deref());
    let merchant = resolve_merchant(&headers, table, date.as_deref(), amount.as_ref());

    let mapping = ColumnMapping {
        date,
        amount,
        merchant,
    };
    debug!("Resolved column mapping: {:?}", mapping);
    mapping
}

/// Input headers with their matching form precomputed.
/// Matching normalizes each header: trim, lowercase, spaces to underscores.
struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    fn new(headers: &[String]) -> Self {
        let entries = headers
            .iter()
            .map(|h| (h.clone(), normalize_header(h)))
            .collect();
        Self { entries }
    }

    /// First header matching any alias, scanning aliases in priority order.
    fn find_alias(&self, aliases: &[&str]) -> Option<String> {
        for alias in aliases {
            for (original, normalized) in &self.entries {
                if normalized == alias {
                    return Some(original.clone());
                }
            }
        }
        None
    }

    fn find_exact(&self, normalized_name: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(_, n)| n == normalized_name)
            .map(|(original, _)| original.clone())
    }
}

pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

fn resolve_date(headers: &HeaderSet, table: &RawTable) -> Option<String> {
    let strategies: [(&str, fn(&HeaderSet, &RawTable) -> Option<String>); 2] = [
        ("alias", |h, _| h.find_alias(DATE_ALIASES)),
        ("content-sniff", sniff_date_column),
    ];

    for (name, strategy) in strategies {
        if let Some(column) = strategy(headers, table) {
            debug!("Date role resolved to '{}' via {}", column, name);
            return Some(column);
        }
    }
    None
}

fn resolve_amount(
    headers: &HeaderSet,
    table: &RawTable,
    date_column: Option<&str>,
) -> Option<AmountSource> {
    // A split debit/credit pair is merged before plain alias matching, so a
    // table carrying both never resolves to just one side of the pair.
    if let (Some(debit), Some(credit)) = (headers.find_exact("debit"), headers.find_exact("credit"))
    {
        debug!(
            "Amount role resolved by merging debit '{}' and credit '{}'",
            debit, credit
        );
        return Some(AmountSource::DebitCredit { debit, credit });
    }

    if let Some(column) = headers.find_alias(AMOUNT_ALIASES) {
        debug!("Amount role resolved to '{}' via alias", column);
        return Some(AmountSource::Column(column));
    }

    if let Some(column) = sniff_amount_column(table, date_column) {
        debug!("Amount role resolved to '{}' via content-sniff", column);
        return Some(AmountSource::Column(column));
    }

    None
}

fn resolve_merchant(
    headers: &HeaderSet,
    table: &RawTable,
    date_column: Option<&str>,
    amount: Option<&AmountSource>,
) -> Option<String> {
    if let Some(column) = headers.find_alias(MERCHANT_ALIASES) {
        debug!("Merchant role resolved to '{}' via alias", column);
        return Some(column);
    }

    let taken = |header: &str| -> bool {
        if date_column == Some(header) {
            return true;
        }
        match amount {
            Some(AmountSource::Column(c)) => c == header,
            Some(AmountSource::DebitCredit { debit, credit }) => {
                debit == header || credit == header
            }
            None => false,
        }
    };

    for header in table.headers() {
        if taken(header) {
            continue;
        }
        if is_text_column(table, header) {
            debug!("Merchant role resolved to '{}' as first text column", header);
            return Some(header.clone());
        }
    }

    None
}

/// First non-numeric column whose sampled values mostly parse as dates.
fn sniff_date_column(_headers: &HeaderSet, table: &RawTable) -> Option<String> {
    for header in table.headers() {
        let sample = sample_column(table, header, DATE_SNIFF_SAMPLE);
        if sample.is_empty() || is_numeric_sample(&sample) {
            continue;
        }
        let parsed = sample.iter().filter(|s| parse_date(s).is_some()).count();
        if parsed as f64 / sample.len() as f64 >= SNIFF_THRESHOLD {
            return Some(header.clone());
        }
    }
    None
}

/// First column (other than the date column) whose sampled values mostly
/// survive currency cleaning into numbers.
fn sniff_amount_column(table: &RawTable, date_column: Option<&str>) -> Option<String> {
    for header in table.headers() {
        if date_column == Some(header.as_str()) {
            continue;
        }
        let sample = sample_column(table, header, AMOUNT_SNIFF_SAMPLE);
        if sample.is_empty() {
            continue;
        }
        let parsed = sample.iter().filter(|s| clean_amount(s).is_some()).count();
        if parsed as f64 / sample.len() as f64 >= SNIFF_THRESHOLD {
            return Some(header.clone());
        }
    }
    None
}

fn is_text_column(table: &RawTable, header: &str) -> bool {
    let sample = sample_column(table, header, DATE_SNIFF_SAMPLE);
    if sample.is_empty() {
        return false;
    }
    let numeric = sample
        .iter()
        .filter(|s| s.parse::<f64>().is_ok())
        .count();
    numeric * 2 < sample.len()
}

fn is_numeric_sample(sample: &[String]) -> bool {
    sample.iter().all(|s| s.parse::<f64>().is_ok())
}

/// Up to `limit` non-missing, string-coerced values from the named column.
fn sample_column(table: &RawTable, header: &str, limit: usize) -> Vec<String> {
    let Some(cells) = table.column(header) else {
        return Vec::new();
    };
    cells
        .into_iter()
        .filter_map(cell_to_string)
        .filter(|s| !s.trim().is_empty())
        .take(limit)
        .collect()
}
