//! Shared presentation-boundary types. The rendering layer consumes these as
//! JSON; every id here is a stable identifier it keys on.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::aggregate::{self, AggregationBucket};
use crate::error::ReportError;

/// Rollup value shown when the upstream load fails entirely.
pub const ERROR_VALUE: &str = "Error";

/// Chart title shown before any period is selected.
pub const EMPTY_PROMPT: &str = "Please select a period";

/// A named scalar rollup. Values are pre-formatted for display so a failed
/// load can render the literal "Error" in place of a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollup {
    pub id: String,
    pub title: String,
    pub value: String,
}

impl Rollup {
    pub fn new(id: impl Into<String>, title: impl Into<String>, value: impl ToString) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            value: value.to_string(),
        }
    }
}

/// One categorical dimension's aggregation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSummary {
    pub name: String,
    pub buckets: Vec<AggregationBucket>,
}

/// Declarative description of a categorical dimension: which column to
/// group, which synonym rewrites canonicalize it, and an optional fixed
/// presentation order. The report builders execute a table of these instead
/// of hand-writing one summary per dimension.
pub struct DimensionSpec {
    pub name: &'static str,
    pub column: &'static str,
    pub synonyms: &'static [(&'static str, &'static str)],
    pub fixed_order: Option<&'static [&'static str]>,
}

/// Canonicalize, group and order one dimension.
pub fn summarize_dimension(
    records: &DataFrame,
    spec: &DimensionSpec,
) -> Result<DimensionSummary, ReportError> {
    let canonical = aggregate::canonicalize_column(records, spec.column, spec.synonyms)?;
    let mut buckets = aggregate::aggregate(&canonical, spec.column)?;
    match spec.fixed_order {
        Some(order) => aggregate::sort_by_fixed_order(&mut buckets, order),
        None => aggregate::sort_by_count_desc(&mut buckets),
    }
    Ok(DimensionSummary {
        name: spec.name.to_string(),
        buckets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn summarize_executes_the_spec() {
        let series = Series::new(
            "Gender".into(),
            vec!["Male", "", "Male", "Group search"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>(),
        );
        let df = DataFrame::new(vec![series.into()]).unwrap();
        let spec = DimensionSpec {
            name: "gender",
            column: "Gender",
            synonyms: &[("", "N/A"), ("Group search", "N/A")],
            fixed_order: None,
        };
        let summary = summarize_dimension(&df, &spec).unwrap();
        assert_eq!(summary.name, "gender");
        assert_eq!(summary.buckets[0].key, "Male");
        assert_eq!(summary.buckets[0].count, 2);
        assert_eq!(summary.buckets[1].key, "N/A");
        assert_eq!(summary.buckets[1].count, 2);
    }
}
