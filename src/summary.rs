use crate::normalize::Transaction;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Aggregate snapshot over the normalized transaction table.
///
/// Derived deterministically at normalization time and recomputed wholesale on
/// reprocess; never incrementally updated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub total_transactions: usize,
    pub total_amount: f64,
    pub avg_amount: f64,
    pub suspicious_count: usize,
    pub date_range: DateRange,
}

/// Compute aggregates over the surviving rows.
///
/// With zero surviving rows every numeric aggregate is zero and the date
/// range is `{None, None}`; this never fails.
pub fn build_summary(total_rows: usize, transactions: &[Transaction]) -> Summary {
    let valid_rows = transactions.len();
    if valid_rows == 0 {
        return Summary {
            total_rows,
            invalid_rows: total_rows,
            ..Summary::default()
        };
    }

    let total_amount: f64 = transactions.iter().map(|t| t.amount).sum();
    let suspicious_count = transactions.iter().filter(|t| t.is_suspicious).count();

    Summary {
        total_rows,
        valid_rows,
        invalid_rows: total_rows - valid_rows,
        total_transactions: valid_rows,
        total_amount,
        avg_amount: total_amount / valid_rows as f64,
        suspicious_count,
        // Transactions arrive date-sorted, so the range is first/last.
        date_range: DateRange {
            start: transactions.first().map(|t| t.date),
            end: transactions.last().map(|t| t.date),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tx(date: &str, amount: f64) -> Transaction {
        Transaction {
            date: date.parse().unwrap(),
            merchant: "shop".to_string(),
            amount,
            is_suspicious: amount < 0.0,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_summary_aggregates() {
        let transactions = vec![
            tx("2023-01-01", 10.0),
            tx("2023-01-15", -4.0),
            tx("2023-02-01", 6.0),
        ];
        let summary = build_summary(5, &transactions);

        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.valid_rows, 3);
        assert_eq!(summary.invalid_rows, 2);
        assert_eq!(summary.total_transactions, 3);
        assert!((summary.total_amount - 12.0).abs() < f64::EPSILON);
        assert!((summary.avg_amount - 4.0).abs() < f64::EPSILON);
        assert_eq!(summary.suspicious_count, 1);
        assert_eq!(
            summary.date_range.start,
            Some("2023-01-01".parse().unwrap())
        );
        assert_eq!(summary.date_range.end, Some("2023-02-01".parse().unwrap()));
    }

    #[test]
    fn test_summary_with_no_survivors() {
        let summary = build_summary(7, &[]);
        assert_eq!(summary.total_rows, 7);
        assert_eq!(summary.valid_rows, 0);
        assert_eq!(summary.invalid_rows, 7);
        assert_eq!(summary.total_amount, 0.0);
        assert_eq!(summary.avg_amount, 0.0);
        assert_eq!(summary.date_range, DateRange::default());
    }
}
