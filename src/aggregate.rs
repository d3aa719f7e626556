//! Categorical aggregation over normalized tables: synonym canonicalization,
//! group counts, distinct-date rollups and the two presentation orderings.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::schema::long;

/// One group in a categorical summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationBucket {
    pub key: String,
    pub count: u32,
    /// Derived per-bucket values (e.g. a percentage share).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

impl AggregationBucket {
    pub fn new(key: impl Into<String>, count: u32) -> Self {
        Self {
            key: key.into(),
            count,
            metrics: BTreeMap::new(),
        }
    }
}

/// Rewrite raw values in `column` through a synonym table, ahead of grouping.
///
/// Nulls are routed through the table as empty strings so blanks can map to
/// a sentinel label. The table is applied exactly once per value and must be
/// idempotent: a canonical label is never the left-hand side of a rewrite to
/// something else.
pub fn canonicalize_column(
    df: &DataFrame,
    column: &str,
    synonyms: &[(&str, &str)],
) -> Result<DataFrame, ReportError> {
    if df.height() == 0 {
        return Ok(df.clone());
    }
    let series = df
        .column(column)
        .map_err(|_| ReportError::MissingColumn(column.to_string()))?
        .as_materialized_series()
        .str()?;
    let rewritten: Vec<String> = series
        .into_iter()
        .map(|opt| {
            let value = opt.unwrap_or("").trim();
            match synonyms.iter().find(|(old, _)| *old == value) {
                Some((_, new)) => (*new).to_string(),
                None => value.to_string(),
            }
        })
        .collect();
    let mut out = df.clone();
    out.with_column(Series::new(column.into(), rewritten))?;
    Ok(out)
}

/// Group `records` by exact string equality on `group_field` and count the
/// rows in each group. Output order is unspecified; use one of the sort
/// helpers for presentation.
pub fn aggregate(
    records: &DataFrame,
    group_field: &str,
) -> Result<Vec<AggregationBucket>, ReportError> {
    if records.height() == 0 {
        return Ok(Vec::new());
    }
    if records.column(group_field).is_err() {
        return Err(ReportError::MissingColumn(group_field.to_string()));
    }

    let counts = records
        .clone()
        .lazy()
        .group_by([col(group_field)])
        .agg([len().alias(long::COUNT)])
        .collect()?;

    let keys = counts.column(group_field)?.as_materialized_series().str()?;
    let sizes = counts.column(long::COUNT)?.as_materialized_series().clone();

    let mut buckets = Vec::with_capacity(counts.height());
    for i in 0..counts.height() {
        let key = keys.get(i).unwrap_or_default().to_string();
        let count = sizes
            .get(i)?
            .try_extract::<u32>()
            .map_err(ReportError::from)?;
        buckets.push(AggregationBucket::new(key, count));
    }
    Ok(buckets)
}

/// Distinct dates in `date_column`, at date-only granularity. A frame
/// without the column (e.g. a degraded empty load) counts zero.
pub fn count_distinct_dates(records: &DataFrame, date_column: &str) -> Result<usize, ReportError> {
    match records.column(date_column) {
        Ok(column) => Ok(column.as_materialized_series().n_unique()?),
        Err(_) => Ok(0),
    }
}

/// Sum a numeric column; zero when the column is absent or empty.
pub fn sum_column(records: &DataFrame, column: &str) -> Result<f64, ReportError> {
    if records.height() == 0 {
        return Ok(0.0);
    }
    match records.column(column) {
        Ok(c) => {
            let val = c.as_materialized_series().sum_reduce()?;
            Ok(val.value().try_extract::<f64>().unwrap_or(0.0))
        }
        Err(_) => Ok(0.0),
    }
}

/// Rows where `column == value`. An empty result is valid data.
pub fn filter_equals(
    records: &DataFrame,
    column: &str,
    value: &str,
) -> Result<DataFrame, ReportError> {
    if records.height() == 0 {
        return Ok(records.clone());
    }
    Ok(records
        .clone()
        .lazy()
        .filter(col(column).eq(lit(value)))
        .collect()?)
}

/// Descending by count; ties break by key so output is deterministic.
pub fn sort_by_count_desc(buckets: &mut [AggregationBucket]) {
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
}

/// Externally supplied ordinal order (age bands and the like). Keys not in
/// `order` sort after all mapped ones, alphabetically among themselves.
pub fn sort_by_fixed_order(buckets: &mut [AggregationBucket], order: &[&str]) {
    buckets.sort_by(|a, b| {
        let pos_a = order.iter().position(|k| *k == a.key);
        let pos_b = order.iter().position(|k| *k == b.key);
        match (pos_a, pos_b) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.key.cmp(&b.key),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::labels;

    fn frame(column: &str, values: &[&str]) -> DataFrame {
        let series = Series::new(
            column.into(),
            values.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
        );
        DataFrame::new(vec![series.into()]).unwrap()
    }

    const SYNONYMS: [(&str, &str); 4] = [
        ("", "N/A"),
        ("unknown", "N/A"),
        ("Unknown", "N/A"),
        ("?", "N/A"),
    ];

    #[test]
    fn canonicalization_is_idempotent() {
        let df = frame("Income", &["unknown", "?", "Under 25,000", ""]);
        let once = canonicalize_column(&df, "Income", &SYNONYMS).unwrap();
        let twice = canonicalize_column(&once, "Income", &SYNONYMS).unwrap();
        assert!(once.equals(&twice));

        let values = once
            .column("Income")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(values, vec!["N/A", "N/A", "Under 25,000", "N/A"]);
    }

    #[test]
    fn counts_conserve_the_record_total() {
        let df = frame("Gender", &["Male", "Female", "Male", "Male", "Female"]);
        let buckets = aggregate(&df, "Gender").unwrap();
        let total: u32 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total as usize, df.height());
    }

    #[test]
    fn blank_categories_land_in_the_sentinel_bucket() {
        let df = frame("Status", &["Housed", "", "Housed", ""]);
        let canonical = canonicalize_column(&df, "Status", &[("", labels::NOT_AVAILABLE)]).unwrap();
        let mut buckets = aggregate(&canonical, "Status").unwrap();
        sort_by_count_desc(&mut buckets);
        assert_eq!(buckets.len(), 2);
        assert!(buckets.iter().any(|b| b.key == "N/A" && b.count == 2));
    }

    #[test]
    fn aggregate_of_empty_frame_is_empty() {
        let df = DataFrame::empty();
        assert!(aggregate(&df, "Gender").unwrap().is_empty());
        assert_eq!(count_distinct_dates(&df, "date").unwrap(), 0);
        assert_eq!(sum_column(&df, "Travel").unwrap(), 0.0);
    }

    #[test]
    fn count_desc_breaks_ties_by_key() {
        let mut buckets = vec![
            AggregationBucket::new("Zeta", 2),
            AggregationBucket::new("Alpha", 2),
            AggregationBucket::new("Mid", 5),
        ];
        sort_by_count_desc(&mut buckets);
        let keys: Vec<_> = buckets.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["Mid", "Alpha", "Zeta"]);
    }

    #[test]
    fn fixed_order_puts_unmapped_keys_last() {
        let mut buckets = vec![
            AggregationBucket::new("N/A", 1),
            AggregationBucket::new("20-29", 4),
            AggregationBucket::new("10-19", 2),
        ];
        sort_by_fixed_order(&mut buckets, &["10-19", "20-29"]);
        let keys: Vec<_> = buckets.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["10-19", "20-29", "N/A"]);
    }

    #[test]
    fn filter_equals_with_no_matches_is_empty_not_an_error() {
        let df = frame("Location", &["Clinic A", "Clinic B"]);
        let out = filter_equals(&df, "Location", "Clinic Z").unwrap();
        assert_eq!(out.height(), 0);
    }
}
