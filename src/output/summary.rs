//! Run summary
//!
//! Price statistics over the written records and the final report printed
//! to stdout at the end of a run.

use crate::crawler::StatsSnapshot;
use crate::extract::{FieldValue, Record};
use std::time::Duration;

/// Price statistics over a record set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSummary {
    /// Records that carried a price value
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    /// Records whose price is zero or missing
    pub zero_priced: usize,
}

impl PriceSummary {
    /// Summarizes `field` across the records
    ///
    /// Returns None when no record has the field.
    pub fn from_records(records: &[Record], field: &str) -> Option<Self> {
        let prices: Vec<u64> = records
            .iter()
            .filter_map(|record| record.get(field))
            .map(price_of)
            .collect();

        let min = *prices.iter().min()?;
        let max = *prices.iter().max()?;
        let total: u128 = prices.iter().map(|&p| u128::from(p)).sum();

        Some(Self {
            count: prices.len(),
            min,
            max,
            mean: total as f64 / prices.len() as f64,
            zero_priced: prices.iter().filter(|&&p| p == 0).count(),
        })
    }
}

fn price_of(value: &FieldValue) -> u64 {
    match value {
        FieldValue::Integer(n) => *n,
        FieldValue::Text(text) => {
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        }
    }
}

/// Formats an integer with space-separated thousands
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    grouped
}

/// Prints the end-of-run report to stdout
pub fn print_summary(
    stats: &StatsSnapshot,
    elapsed: Duration,
    rows_written: usize,
    prices: Option<&PriceSummary>,
) {
    println!("=== Collection Summary ===\n");

    println!("Records:");
    println!("  Written: {}", rows_written);
    println!("  Processed: {}", stats.processed);
    println!("  Errors: {}", stats.errors);
    println!("  Skipped: {}", stats.skipped);
    println!("  Success rate: {:.1}%", stats.success_rate());
    println!();

    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        stats.total() as f64 / secs
    } else {
        0.0
    };
    println!("Timing:");
    println!("  Elapsed: {:.1}s", secs);
    println!("  Throughput: {:.2} pages/sec", rate);

    if let Some(prices) = prices {
        println!();
        println!("Prices:");
        println!("  Mean: {}", group_thousands(prices.mean.round() as u64));
        println!("  Min: {}", group_thousands(prices.min));
        println!("  Max: {}", group_thousands(prices.max));
        if prices.zero_priced > 0 {
            println!("  Zero price: {}", prices.zero_priced);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(price: FieldValue) -> Record {
        let mut fields = BTreeMap::new();
        fields.insert("price".to_string(), price);
        Record {
            url: "https://auto.example/cars/used/sale/x/1/".to_string(),
            fields,
        }
    }

    #[test]
    fn test_price_summary() {
        let records = vec![
            record(FieldValue::Integer(300_000)),
            record(FieldValue::Integer(500_000)),
            record(FieldValue::Text("1 000 000 ₽".to_string())),
            record(FieldValue::Integer(0)),
        ];
        let summary = PriceSummary::from_records(&records, "price").unwrap();

        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, 0);
        assert_eq!(summary.max, 1_000_000);
        assert!((summary.mean - 450_000.0).abs() < f64::EPSILON);
        assert_eq!(summary.zero_priced, 1);
    }

    #[test]
    fn test_price_summary_without_field() {
        let records = vec![record(FieldValue::Integer(10))];
        assert!(PriceSummary::from_records(&records, "cost").is_none());
        assert!(PriceSummary::from_records(&[], "price").is_none());
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1 000");
        assert_eq!(group_thousands(1_234_567), "1 234 567");
    }
}
