//! Two-level drill-down navigation: an overview chart over one categorical
//! dimension, and a detail chart of support tags for one selected category.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::aggregate::{self, AggregationBucket};
use crate::error::ReportError;
use crate::tags;

/// Client-visible navigation state, round-tripped through the UI store as
/// `{"level":0,"selected_key":null}`. Level 0 never carries a selection;
/// level 1 always does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillState {
    pub level: u8,
    pub selected_key: Option<String>,
}

impl DrillState {
    pub fn overview() -> Self {
        Self {
            level: 0,
            selected_key: None,
        }
    }

    pub fn detail(key: impl Into<String>) -> Self {
        Self {
            level: 1,
            selected_key: Some(key.into()),
        }
    }

    pub fn is_overview(&self) -> bool {
        self.level == 0
    }
}

impl Default for DrillState {
    fn default() -> Self {
        Self::overview()
    }
}

/// What the rendering layer needs for the drill chart: the current level,
/// the breadcrumb trail and the buckets to plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillView {
    pub level: u8,
    pub breadcrumb: Vec<String>,
    pub buckets: Vec<AggregationBucket>,
}

/// Owns the one `DrillState` instance and derives the chart to show.
///
/// `category_column` is the level-0 dimension (e.g. "Location");
/// `detail_column` is the free-text column tag-split at level 1.
pub struct Navigator {
    dimension: String,
    category_column: String,
    detail_column: String,
    state: DrillState,
}

impl Navigator {
    pub fn new(
        dimension: impl Into<String>,
        category_column: impl Into<String>,
        detail_column: impl Into<String>,
    ) -> Self {
        Self {
            dimension: dimension.into(),
            category_column: category_column.into(),
            detail_column: detail_column.into(),
            state: DrillState::overview(),
        }
    }

    pub fn state(&self) -> &DrillState {
        &self.state
    }

    /// A category click. Transitions Overview → Detail; clicking while
    /// already in Detail leaves the state unchanged.
    pub fn select(&mut self, key: &str) {
        if self.state.is_overview() {
            self.state = DrillState::detail(key);
        }
    }

    /// The "go back/home" action; valid from any state.
    pub fn reset(&mut self) {
        self.state = DrillState::overview();
    }

    /// Adopt a state echoed back from the client store. States that violate
    /// the level/selection invariant fall back to the overview.
    pub fn restore(&mut self, state: DrillState) {
        let valid = match state.level {
            0 => state.selected_key.is_none(),
            1 => state.selected_key.is_some(),
            _ => false,
        };
        self.state = if valid { state } else { DrillState::overview() };
    }

    pub fn breadcrumb(&self) -> Vec<String> {
        let mut trail = vec![format!("All {}", self.dimension)];
        if let Some(key) = &self.state.selected_key {
            trail.push(key.clone());
        }
        trail
    }

    /// Derive the aggregation for the current level from a normalized
    /// dataset. A selection with zero matching rows yields an empty detail
    /// view, not an error.
    pub fn view(&self, records: &DataFrame) -> Result<DrillView, ReportError> {
        let buckets = match &self.state.selected_key {
            None => {
                let mut buckets = aggregate::aggregate(records, &self.category_column)?;
                aggregate::sort_by_count_desc(&mut buckets);
                buckets
            }
            Some(key) => {
                let filtered =
                    aggregate::filter_equals(records, &self.category_column, key)?;
                tags::aggregate_tags(&filtered, &self.detail_column)?
                    .into_iter()
                    .map(|t| AggregationBucket::new(t.tag, t.count))
                    .collect()
            }
        };
        Ok(DrillView {
            level: self.state.level,
            breadcrumb: self.breadcrumb(),
            buckets,
        })
    }
}
