//! Output module for writing collected records and run summaries
//!
//! This module handles:
//! - Writing records to an xlsx workbook or a CSV file in declared column order
//! - Normalizing posting dates and view counts
//! - Price statistics and the end-of-run report

mod sink;
mod summary;

pub use sink::{
    coerce_count, parse_posting_date, write_csv, write_records, write_xlsx, OutputFormat, WriteOutcome,
    NORMALIZED_DATE_FORMAT,
};
pub use summary::{group_thousands, print_summary, PriceSummary};
