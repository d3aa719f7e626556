//! sheet-reportkit: the analytics core behind two spreadsheet-backed
//! dashboards — a personal fitness tracker (wide sheet, one column per
//! training date) and a client-navigation report (one row per submission).
//!
//! Raw tables come from an injected [`source::RecordSource`] as string-typed
//! polars DataFrames. The pipeline normalizes them into typed long tables,
//! aggregates categorical dimensions, splits free-text support tags, and
//! assembles per-period report bundles plus a two-level drill-down view.
//! Chart rendering and HTTP serving stay with the embedding application;
//! every output here is plain serializable data keyed by stable identifiers.

pub mod aggregate;
pub mod drill;
pub mod error;
pub mod fitness;
pub mod navigation;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod source;
pub mod tags;

pub use aggregate::{
    aggregate, canonicalize_column, count_distinct_dates, sort_by_count_desc,
    sort_by_fixed_order, sum_column, AggregationBucket,
};
pub use drill::{DrillState, DrillView, Navigator};
pub use error::ReportError;
pub use fitness::{fitness_report, FitnessReport};
pub use navigation::{missing_names, navigation_report, NavigationConfig, NavigationReport};
pub use normalize::{
    filter_period, normalize_entries, normalize_wide, records, EntryOptions, NormalizedRecord,
};
pub use report::{DimensionSpec, DimensionSummary, Rollup, EMPTY_PROMPT, ERROR_VALUE};
pub use source::{load_period, load_period_or_empty, CsvRecordSource, Period, RecordSource};
pub use tags::{aggregate_tags, split_tags, Tag};
