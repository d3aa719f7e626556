//! Fitness-tracker report: per-period rollups, one summary per exercise
//! category, and the normalized data table. The source sheets are wide (one
//! column per training date), so everything funnels through the wide-table
//! normalizer first.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregate::{self, AggregationBucket};
use crate::error::ReportError;
use crate::normalize;
use crate::report::{Rollup, ERROR_VALUE};
use crate::schema::{fitness, long};
use crate::source::{self, Period, RecordSource};

/// One exercise's (date, value) line for the progress chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSeries {
    pub subject: String,
    pub points: Vec<ProgressPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Everything one category section of the page needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub active_days: u32,
    pub exercise_counts: Vec<AggregationBucket>,
    pub progress: Vec<ProgressSeries>,
}

/// One row of the on-page data table, numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub row: usize,
    pub date: NaiveDate,
    pub category: String,
    pub exercise: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessReport {
    pub period: String,
    pub rollups: Vec<Rollup>,
    pub categories: Vec<CategorySummary>,
    pub table: Vec<TableRow>,
}

impl FitnessReport {
    /// The degraded shape rendered when the record source cannot be loaded:
    /// every rollup reads "Error", every chart input is empty.
    pub fn placeholder(label: &str) -> Self {
        let mut rollups = vec![Rollup::new(
            "total-gym-days",
            format!("Total Gym Days - {label}"),
            ERROR_VALUE,
        )];
        for category in fitness::CATEGORIES {
            rollups.push(Rollup::new(
                format!("{}-days", category.to_lowercase()),
                format!("Total {category} Days - {label}"),
                ERROR_VALUE,
            ));
        }
        Self {
            period: label.to_string(),
            rollups,
            categories: Vec::new(),
            table: Vec::new(),
        }
    }
}

/// Build the fitness report for one selector value.
///
/// The source is re-fetched on every call; fetch failures degrade to the
/// placeholder report and never propagate.
pub fn fitness_report(source: &dyn RecordSource, period_key: &str) -> FitnessReport {
    let label = period_key.trim().to_string();
    let period = match Period::from_key(&label, 0) {
        Ok(period @ (Period::AllTime | Period::Year(_))) => period,
        _ => {
            warn!(key = %label, "unsupported fitness period selector");
            return FitnessReport::placeholder(&label);
        }
    };

    let raw = match source::load_period(source, &period) {
        Ok(df) => df,
        Err(e) => {
            warn!(period = %period, error = %e, "fitness data unavailable");
            return FitnessReport::placeholder(&label);
        }
    };

    match assemble(&raw, &label) {
        Ok(report) => report,
        Err(e) => {
            warn!(period = %period, error = %e, "fitness report assembly failed");
            FitnessReport::placeholder(&label)
        }
    }
}

fn assemble(raw: &DataFrame, label: &str) -> Result<FitnessReport, ReportError> {
    let long_df = normalize::normalize_wide(raw, &[fitness::CATEGORY, fitness::EXERCISE])?;

    let total_days = aggregate::count_distinct_dates(&long_df, long::DATE)?;
    let mut rollups = vec![Rollup::new(
        "total-gym-days",
        format!("Total Gym Days - {label}"),
        total_days,
    )];

    let mut categories = Vec::with_capacity(fitness::CATEGORIES.len());
    for category in fitness::CATEGORIES {
        let subset = aggregate::filter_equals(&long_df, fitness::CATEGORY, category)?;
        let active_days = aggregate::count_distinct_dates(&subset, long::DATE)?;

        rollups.push(Rollup::new(
            format!("{}-days", category.to_lowercase()),
            format!("Total {category} Days - {label}"),
            active_days,
        ));

        let mut exercise_counts = aggregate::aggregate(&subset, fitness::EXERCISE)?;
        aggregate::sort_by_count_desc(&mut exercise_counts);

        categories.push(CategorySummary {
            category: category.to_string(),
            active_days: active_days as u32,
            exercise_counts,
            progress: progress_series(&subset)?,
        });
    }

    let table = normalize::records(&long_df, fitness::CATEGORY, fitness::EXERCISE)?
        .into_iter()
        .enumerate()
        .map(|(i, r)| TableRow {
            row: i + 1,
            date: r.date,
            category: r.category,
            exercise: r.subject,
            value: r.value,
        })
        .collect();

    Ok(FitnessReport {
        period: label.to_string(),
        rollups,
        categories,
        table,
    })
}

/// One (date, value) series per exercise, dates already ascending because
/// the normalizer sorts and the category filter preserves order.
fn progress_series(subset: &DataFrame) -> Result<Vec<ProgressSeries>, ReportError> {
    use std::collections::BTreeMap;

    let mut by_subject: BTreeMap<String, Vec<ProgressPoint>> = BTreeMap::new();
    for record in normalize::records(subset, fitness::CATEGORY, fitness::EXERCISE)? {
        by_subject
            .entry(record.subject)
            .or_default()
            .push(ProgressPoint {
                date: record.date,
                value: record.value,
            });
    }
    Ok(by_subject
        .into_iter()
        .map(|(subject, points)| ProgressSeries { subject, points })
        .collect())
}
