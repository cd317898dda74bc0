//! Tabular output
//!
//! Orders records by posting date (newest first, undated last, ties by URL), normalizes
//! the date and view-count columns, and writes one row per record in declared field
//! order. A `.xlsx` path gets a workbook with the count columns stored as numbers;
//! any other path gets CSV. The source URL is not written.

use crate::config::OutputConfig;
use crate::extract::{FieldSpec, FieldValue, Record, MISSING_TEXT};
use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Format dates are written in
pub const NORMALIZED_DATE_FORMAT: &str = "%d.%m.%Y";

/// What the sink did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No records; no file was created
    Empty,
    Written { path: PathBuf, rows: usize },
}

/// File format, chosen by the output path's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Xlsx,
    Csv,
}

impl OutputFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => Self::Xlsx,
            _ => Self::Csv,
        }
    }
}

/// One output cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Cell {
    Text(String),
    Number(u64),
}

impl Cell {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Writes records to the configured output path
pub fn write_records(
    records: &[Record],
    fields: &[FieldSpec],
    config: &OutputConfig,
) -> crate::Result<WriteOutcome> {
    if records.is_empty() {
        tracing::warn!("No records collected, nothing to write");
        return Ok(WriteOutcome::Empty);
    }

    let path = PathBuf::from(&config.path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let rows = match OutputFormat::for_path(&path) {
        OutputFormat::Xlsx => write_xlsx(records, fields, config, &path)?,
        OutputFormat::Csv => write_csv(records, fields, config, std::fs::File::create(&path)?)?,
    };

    tracing::info!("Wrote {} records to {}", rows, path.display());
    Ok(WriteOutcome::Written { path, rows })
}

/// Writes header and rows to any writer and returns the row count
pub fn write_csv<W: Write>(
    records: &[Record],
    fields: &[FieldSpec],
    config: &OutputConfig,
    writer: W,
) -> crate::Result<usize> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(fields.iter().map(FieldSpec::column_label))?;

    let rows = table_rows(records, fields, config);
    for row in &rows {
        writer.write_record(row.iter().cloned().map(Cell::into_text))?;
    }

    writer.flush()?;
    Ok(rows.len())
}

/// Writes a single-sheet workbook to `path` and returns the row count
///
/// Count columns are numeric cells; everything else, the normalized date included,
/// is a string cell.
pub fn write_xlsx(
    records: &[Record],
    fields: &[FieldSpec],
    config: &OutputConfig,
    path: &Path,
) -> crate::Result<usize> {
    let mut workbook = Workbook::new();
    let rows = fill_workbook(&mut workbook, records, fields, config)?;
    workbook.save(path)?;
    Ok(rows)
}

fn fill_workbook(
    workbook: &mut Workbook,
    records: &[Record],
    fields: &[FieldSpec],
    config: &OutputConfig,
) -> Result<usize, XlsxError> {
    let worksheet = workbook.add_worksheet();
    let header = Format::new().set_bold();

    for (col, spec) in fields.iter().enumerate() {
        worksheet.write_string_with_format(0, sheet_col(col)?, spec.column_label(), &header)?;
    }

    let rows = table_rows(records, fields, config);
    for (index, row) in rows.iter().enumerate() {
        let sheet_row = u32::try_from(index + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(text) => worksheet.write_string(sheet_row, sheet_col(col)?, text)?,
                Cell::Number(n) => worksheet.write_number(sheet_row, sheet_col(col)?, *n as f64)?,
            };
        }
    }

    Ok(rows.len())
}

fn sheet_col(index: usize) -> Result<u16, XlsxError> {
    u16::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

/// Ordered rows of typed cells, one per record, in declared field order
pub(crate) fn table_rows(records: &[Record], fields: &[FieldSpec], config: &OutputConfig) -> Vec<Vec<Cell>> {
    order_by_date(records, config)
        .into_iter()
        .map(|(record, date)| fields.iter().map(|spec| cell(record, spec, date, config)).collect())
        .collect()
}

/// Pairs every record with its parsed date and sorts newest first
///
/// Records without a parseable date go last. Equal keys fall back to the URL so the
/// order does not depend on completion order.
fn order_by_date<'a>(records: &'a [Record], config: &OutputConfig) -> Vec<(&'a Record, Option<NaiveDate>)> {
    let mut ordered: Vec<_> = records
        .iter()
        .map(|record| {
            let date = config
                .date_field
                .as_deref()
                .and_then(|field| record.get(field))
                .and_then(FieldValue::as_text)
                .and_then(|text| parse_posting_date(text, &config.date_format));
            (record, date)
        })
        .collect();

    ordered.sort_by(|(ra, a), (rb, b)| {
        match (a, b) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| ra.url.cmp(&rb.url))
    });
    ordered
}

fn cell(record: &Record, spec: &FieldSpec, date: Option<NaiveDate>, config: &OutputConfig) -> Cell {
    let name = Some(spec.name.as_str());
    let value = record.get(&spec.name);

    if config.date_field.as_deref() == name {
        if let Some(date) = date {
            return Cell::Text(date.format(NORMALIZED_DATE_FORMAT).to_string());
        }
    }

    if config.views_field.as_deref() == name || config.price_field.as_deref() == name {
        return Cell::Number(value.map_or(0, coerce_count));
    }

    match value {
        Some(FieldValue::Integer(n)) => Cell::Number(*n),
        Some(value) => Cell::Text(value.to_string()),
        None => Cell::Text(MISSING_TEXT.to_string()),
    }
}

/// Reads a non-negative count, defaulting to 0
pub fn coerce_count(value: &FieldValue) -> u64 {
    match value {
        FieldValue::Integer(n) => *n,
        FieldValue::Text(text) => {
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        }
    }
}

/// Parses a posting date as shown on a listing
///
/// Accepts an already normalized `dd.mm.yyyy` date, text matching `format`, and text
/// containing such a date among other words. Russian month names are understood in
/// place of English ones.
///
/// ```
/// use listing_scraper::output::parse_posting_date;
///
/// let date = parse_posting_date("12 марта 2024", "%d %B %Y").unwrap();
/// assert_eq!(date.format("%d.%m.%Y").to_string(), "12.03.2024");
/// ```
pub fn parse_posting_date(text: &str, format: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, NORMALIZED_DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, format) {
        return Some(date);
    }

    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(|token| english_month(token).unwrap_or(token))
        .collect();

    let width = format.split_whitespace().count().max(1);
    tokens
        .windows(width)
        .find_map(|window| NaiveDate::parse_from_str(&window.join(" "), format).ok())
}

/// Maps a Russian month name in any case to its English name
fn english_month(token: &str) -> Option<&'static str> {
    let lower = token.to_lowercase();
    let month = if lower.starts_with("янв") {
        "January"
    } else if lower.starts_with("фев") {
        "February"
    } else if lower.starts_with("мар") {
        "March"
    } else if lower.starts_with("апр") {
        "April"
    } else if lower == "мая" || lower == "май" {
        "May"
    } else if lower.starts_with("июн") {
        "June"
    } else if lower.starts_with("июл") {
        "July"
    } else if lower.starts_with("авг") {
        "August"
    } else if lower.starts_with("сен") {
        "September"
    } else if lower.starts_with("окт") {
        "October"
    } else if lower.starts_with("ноя") {
        "November"
    } else if lower.starts_with("дек") {
        "December"
    } else {
        return None;
    };
    Some(month)
}
