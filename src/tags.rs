//! Free-text tag splitting for multi-value cells such as
//! "Referral (to Agency, Inc.) and Transport".
//!
//! The splitter is an explicit depth-tracking scan: commas inside a
//! parenthesized group never split, and parenthesized detail is stripped
//! from each fragment before counting.

use std::collections::HashMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Cell texts treated as missing; they contribute zero tags.
const MISSING_TOKENS: [&str; 5] = ["", "nan", "NaN", "None", "N/A"];

/// A cleaned free-text label and its occurrence count across all rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    pub count: u32,
}

/// Split a composite cell into clean tags.
///
/// The literal word "and" joining two clauses counts as a separating comma;
/// splits happen only at depth-0 commas; a fragment that is empty once its
/// parenthesized detail is stripped is discarded.
pub fn split_tags(cell: &str) -> Vec<String> {
    let cell = cell.trim();
    if MISSING_TOKENS.contains(&cell) {
        return Vec::new();
    }
    let standardized = cell.replace(" and ", ", ");

    split_depth0(&standardized)
        .into_iter()
        .filter_map(|fragment| {
            let cleaned = strip_parentheticals(&fragment);
            let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned)
            }
        })
        .collect()
}

/// Split at commas that sit outside any parenthesized group.
fn split_depth0(text: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut depth: u32 = 0;
    for ch in text.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                fragments.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fragments.push(current);
    fragments
}

/// Drop every parenthesized group, nested ones included; a stray closing
/// parenthesis with no opener is kept as literal text.
fn strip_parentheticals(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut depth: u32 = 0;
    for ch in fragment.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Tally cleaned tags across every row of `field`, sorted by count
/// descending (ties break by tag).
pub fn aggregate_tags(records: &DataFrame, field: &str) -> Result<Vec<Tag>, ReportError> {
    if records.height() == 0 {
        return Ok(Vec::new());
    }
    let column = records
        .column(field)
        .map_err(|_| ReportError::MissingColumn(field.to_string()))?
        .as_materialized_series()
        .str()?;

    let mut counter: HashMap<String, u32> = HashMap::new();
    for cell in column.into_iter().flatten() {
        for tag in split_tags(cell) {
            *counter.entry(tag).or_insert(0) += 1;
        }
    }

    let mut tags: Vec<Tag> = counter
        .into_iter()
        .map(|(tag, count)| Tag { tag, count })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    Ok(tags)
}
