//! Shape normalization: wide spreadsheet tables melt into a typed long
//! table, row-per-submission tables get trimmed and coerced in place.
//!
//! All type coercion lives here. Malformed individual cells are dropped,
//! never surfaced; an empty source table normalizes to an empty table.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::schema::long;

/// Mixed-format date parsing, most common sheet format first.
const DATE_FORMATS: [&str; 5] = ["%m/%d/%Y", "%m/%d/%y", "%Y-%m-%d", "%B %d, %Y", "%d %B %Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Days between 0001-01-01 and the Unix epoch; polars Date is days since
/// the epoch, chrono counts from the common era.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// The canonical unit after reshaping. Rebuilt wholesale on every load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub category: String,
    pub subject: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// Try each known format until one parses; time-of-day is discarded.
pub fn parse_mixed_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    None
}

pub(crate) fn date_from_days(days: i32) -> Result<NaiveDate, ReportError> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
        .ok_or_else(|| ReportError::InvalidData(format!("date out of range: {days} days")))
}

pub(crate) fn days_from_date(date: NaiveDate) -> i32 {
    use chrono::Datelike;
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), ReportError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(ReportError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Stringify one cell; `None` for nulls. Numeric cells keep their literal
/// rendering so the value coercion below sees the same text a sheet would
/// export.
fn cell_to_string(series: &Series, row: usize) -> Option<String> {
    match series.get(row).ok()? {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        other => Some(format!("{other}")),
    }
}

/// Melt a wide table (one column per date) into the canonical long form.
///
/// Output columns: the id columns (trimmed Strings), `date` (Date) and
/// `value` (Float64), sorted by date ascending. Candidates are dropped when
/// the column label is not a parseable date or the cell is blank or
/// non-numeric; exact duplicates on (ids..., date) keep the first occurrence
/// in original melt order.
pub fn normalize_wide(raw: &DataFrame, id_columns: &[&str]) -> Result<DataFrame, ReportError> {
    if raw.width() == 0 || raw.height() == 0 {
        return empty_long_frame(id_columns);
    }
    require_columns(raw, id_columns)?;

    let id_series: Vec<&Series> = id_columns
        .iter()
        .map(|c| raw.column(c).map(|col| col.as_materialized_series()))
        .collect::<Result<_, _>>()?;

    // (label, parsed date) for every non-id column; non-date labels drop out.
    let value_columns: Vec<(&str, NaiveDate)> = raw
        .get_column_names_str()
        .into_iter()
        .filter(|name| !id_columns.contains(name))
        .filter_map(|name| parse_mixed_date(name).map(|date| (name, date)))
        .collect();

    let mut ids: Vec<Vec<String>> = vec![Vec::new(); id_columns.len()];
    let mut dates: Vec<i32> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    let mut seen: HashSet<(String, i32)> = HashSet::new();

    // Melt order matches the source sheets: column by column, then row by
    // row, so "keep first" is well-defined.
    for (name, date) in &value_columns {
        let column = raw.column(name)?.as_materialized_series();
        let days = days_from_date(*date);
        for row in 0..raw.height() {
            let Some(cell) = cell_to_string(column, row) else {
                continue;
            };
            let Ok(value) = cell.trim().parse::<f64>() else {
                continue;
            };
            if !value.is_finite() {
                continue;
            }

            let id_values: Vec<String> = id_series
                .iter()
                .map(|s| cell_to_string(s, row).unwrap_or_default().trim().to_string())
                .collect();

            let key = (id_values.join("\u{1f}"), days);
            if !seen.insert(key) {
                continue;
            }

            for (slot, id_value) in ids.iter_mut().zip(&id_values) {
                slot.push(id_value.clone());
            }
            dates.push(days);
            values.push(value);
        }
    }

    let mut columns: Vec<Column> = Vec::new();
    for (name, vals) in id_columns.iter().zip(ids) {
        columns.push(Series::new((*name).into(), vals).into());
    }
    columns.push(
        Series::new(long::DATE.into(), dates)
            .cast(&DataType::Date)?
            .into(),
    );
    columns.push(Series::new(long::VALUE.into(), values).into());

    let df = DataFrame::new(columns)?;
    Ok(df.sort(
        [long::DATE],
        SortMultipleOptions::default().with_maintain_order(true),
    )?)
}

fn empty_long_frame(id_columns: &[&str]) -> Result<DataFrame, ReportError> {
    let mut columns: Vec<Column> = Vec::new();
    for name in id_columns {
        columns.push(Series::new((*name).into(), Vec::<String>::new()).into());
    }
    columns.push(
        Series::new(long::DATE.into(), Vec::<i32>::new())
            .cast(&DataType::Date)?
            .into(),
    );
    columns.push(Series::new(long::VALUE.into(), Vec::<f64>::new()).into());
    Ok(DataFrame::new(columns)?)
}

/// Materialize a normalized long frame into typed records.
pub fn records(
    df: &DataFrame,
    category_column: &str,
    subject_column: &str,
) -> Result<Vec<NormalizedRecord>, ReportError> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    let categories = df.column(category_column)?.as_materialized_series().str()?;
    let subjects = df.column(subject_column)?.as_materialized_series().str()?;
    let dates = df.column(long::DATE)?.as_materialized_series();
    let values = df.column(long::VALUE)?.as_materialized_series().f64()?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = match dates.get(i) {
            Ok(AnyValue::Date(days)) => days,
            _ => continue,
        };
        let Some(value) = values.get(i) else {
            continue;
        };
        out.push(NormalizedRecord {
            category: categories.get(i).unwrap_or_default().to_string(),
            subject: subjects.get(i).unwrap_or_default().to_string(),
            date: date_from_days(days)?,
            value,
        });
    }
    Ok(out)
}

/// Options for row-per-submission normalization.
pub struct EntryOptions<'a> {
    /// Column parsed as the record date; rows with unparseable dates drop.
    pub date_column: &'a str,
    /// Columns coerced to Float64; blank or invalid cells become 0.
    pub numeric_columns: &'a [&'a str],
    /// (first, last) name columns combined into a `Full Name` column.
    pub name_columns: Option<(&'a str, &'a str)>,
}

/// Normalize a table that is already one row per submission: trim every
/// string cell, parse the date column (dropping rows that fail), coerce the
/// numeric columns, derive the full-name column, and sort by date.
pub fn normalize_entries(raw: &DataFrame, opts: &EntryOptions) -> Result<DataFrame, ReportError> {
    if raw.width() == 0 || raw.height() == 0 {
        return Ok(raw.clone());
    }
    require_columns(raw, &[opts.date_column])?;

    let mut df = trim_string_cells(raw)?;

    // Parse the date column and keep only rows with a valid date.
    let raw_dates = df.column(opts.date_column)?.as_materialized_series().clone();
    let mut kept_rows: Vec<IdxSize> = Vec::new();
    let mut kept_days: Vec<i32> = Vec::new();
    for row in 0..df.height() {
        if let Some(date) = cell_to_string(&raw_dates, row).as_deref().and_then(parse_mixed_date) {
            kept_rows.push(row as IdxSize);
            kept_days.push(days_from_date(date));
        }
    }
    df = df.take(&IdxCa::from_vec("take".into(), kept_rows))?;
    df.with_column(
        Series::new(opts.date_column.into(), kept_days).cast(&DataType::Date)?,
    )?;

    if let Some((first, last)) = opts.name_columns {
        require_columns(&df, &[first, last])?;
        let firsts = df.column(first)?.as_materialized_series().clone();
        let lasts = df.column(last)?.as_materialized_series().clone();
        let full: Vec<String> = (0..df.height())
            .map(|row| {
                let first = cell_to_string(&firsts, row).unwrap_or_default();
                let last = cell_to_string(&lasts, row).unwrap_or_default();
                format!("{} {}", first.trim(), last.trim()).trim().to_string()
            })
            .collect();
        df.with_column(Series::new(crate::schema::nav::FULL_NAME.into(), full))?;
    }

    let numeric: Vec<&str> = opts
        .numeric_columns
        .iter()
        .copied()
        .filter(|c| df.schema().contains(c))
        .collect();
    if !numeric.is_empty() {
        let exprs: Vec<Expr> = numeric
            .iter()
            .map(|c| {
                col(*c)
                    .str()
                    .strip_chars(lit(" \t\r\n"))
                    .cast(DataType::Float64)
                    .fill_null(lit(0.0))
            })
            .collect();
        df = df.lazy().with_columns(exprs).collect()?;
    }

    Ok(df.sort(
        [opts.date_column],
        SortMultipleOptions::default().with_maintain_order(true),
    )?)
}

/// Filter a normalized entry table to the rows inside `period`.
pub fn filter_period(
    df: &DataFrame,
    date_column: &str,
    period: &crate::source::Period,
) -> Result<DataFrame, ReportError> {
    use crate::source::Period;
    if df.height() == 0 {
        return Ok(df.clone());
    }
    let filtered = match period {
        Period::AllTime => df.clone(),
        Period::Year(year) => df
            .clone()
            .lazy()
            .filter(col(date_column).dt().year().eq(lit(*year)))
            .collect()?,
        Period::Month { year, .. } => {
            let month = period
                .month_number()
                .ok_or_else(|| ReportError::InvalidData("month period without a month".into()))?;
            df.clone()
                .lazy()
                .filter(
                    col(date_column)
                        .dt()
                        .year()
                        .eq(lit(*year))
                        .and(col(date_column).dt().month().eq(lit(month as i32))),
                )
                .collect()?
        }
    };
    Ok(filtered)
}

fn trim_string_cells(raw: &DataFrame) -> Result<DataFrame, ReportError> {
    let mut df = raw.clone();
    let string_columns: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::String)
        .map(|c| c.name().to_string())
        .collect();
    for name in string_columns {
        let series = df.column(&name)?.as_materialized_series().str()?;
        let trimmed: Vec<Option<String>> = series
            .into_iter()
            .map(|opt| opt.map(|s| s.trim().to_string()))
            .collect();
        df.with_column(Series::new(name.as_str().into(), trimmed))?;
    }
    Ok(df)
}
