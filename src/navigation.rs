//! Client-navigation report: per-period rollups, one summary per demographic
//! dimension, zip-code counts, support-tag totals and the location
//! drill-down view. The source sheet is one row per submission.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregate::{self, AggregationBucket};
use crate::drill::{DrillView, Navigator};
use crate::error::ReportError;
use crate::normalize::{self, EntryOptions};
use crate::report::{summarize_dimension, DimensionSpec, DimensionSummary, Rollup, ERROR_VALUE};
use crate::schema::{age, labels, nav};
use crate::source::{Period, RecordSource};
use crate::tags::{self, Tag};

// ── Header canonicalization ─────────────────────────────────────────────────

/// Sheet headers → working column names. First present wins; a header is
/// only renamed when the target name is not already taken.
const RENAMES: &[(&str, &str)] = &[
    ("Activity Duration (minutes):", nav::DURATION),
    ("Total travel time (minutes):", nav::TRAVEL),
    ("Person submitting this form:", nav::PERSON),
    ("Location Encountered:", nav::LOCATION),
    ("Individual's Insurance Status:", nav::INSURANCE),
    ("Individual's Status:", nav::STATUS),
    ("Type of Coordination/Navigation Provided:", nav::SUPPORT),
    ("Type of support given:", nav::SUPPORT),
    ("Gender:", nav::GENDER),
    ("Race / Ethnicity:", nav::ETHNICITY),
    ("Race/Ethnicity:", nav::ETHNICITY),
    ("Housing Status", nav::HOUSING),
    ("Income Level", nav::INCOME),
];

// ── Synonym tables (idempotent: canonical labels are never rewritten) ───────

const ETHNICITY_SYNONYMS: &[(&str, &str)] = &[
    ("", "N/A"),
    ("Group search", "N/A"),
    ("Hispanic/Latino", "Hispanic/ Latino"),
    ("White", "White / Caucasian"),
    ("White/ European Ancestry", "White / Caucasian"),
];

const GENDER_SYNONYMS: &[(&str, &str)] = &[("", "N/A"), ("Group search", "N/A")];

const INSURANCE_SYNONYMS: &[(&str, &str)] = &[
    ("", labels::UNKNOWN),
    ("unknown", labels::UNKNOWN),
    ("Just got it!!!", "Private Insurance"),
    ("Medicare", "Medicaid"),
    ("NONE", "None"),
    ("Map 000", "MAP 100"),
    ("30 Day 100", "30 DAY 100"),
    ("30 DAY100", "30 DAY 100"),
    ("30DAY 100", "30 DAY 100"),
];

const LOCATION_SYNONYMS: &[(&str, &str)] = &[("", "N/A")];

const STATUS_SYNONYMS: &[(&str, &str)] = &[("", "N/A"), ("Group search", "N/A")];

const HOUSING_SYNONYMS: &[(&str, &str)] = &[("", "N/A")];

const INCOME_SYNONYMS: &[(&str, &str)] = &[
    ("", "N/A"),
    ("?", "N/A"),
    ("unknown", "N/A"),
    ("Unknown", "N/A"),
    ("$0", "N/A"),
    ("0", "N/A"),
];

const PERSON_SYNONYMS: &[(&str, &str)] = &[("", "N/A")];

/// Travel-time quirks fixed before numeric coercion.
const TRAVEL_SYNONYMS: &[(&str, &str)] = &[("The Bumgalows", "0")];

/// Zip cells that are not zip codes (including one phone number).
const INVALID_ZIP_TOKENS: &[&str] = &[
    "Texas", "Unhoused", "UNHOUSED", "UnKnown", "Unknown", "uknown", "NA", "nan", "NaN", "None",
    "5126364511",
];

/// The demographic dimensions, executed in one loop.
const DIMENSIONS: [DimensionSpec; 8] = [
    DimensionSpec {
        name: "ethnicity",
        column: nav::ETHNICITY,
        synonyms: ETHNICITY_SYNONYMS,
        fixed_order: None,
    },
    DimensionSpec {
        name: "gender",
        column: nav::GENDER,
        synonyms: GENDER_SYNONYMS,
        fixed_order: None,
    },
    DimensionSpec {
        name: "insurance",
        column: nav::INSURANCE,
        synonyms: INSURANCE_SYNONYMS,
        fixed_order: None,
    },
    DimensionSpec {
        name: "location",
        column: nav::LOCATION,
        synonyms: LOCATION_SYNONYMS,
        fixed_order: None,
    },
    DimensionSpec {
        name: "status",
        column: nav::STATUS,
        synonyms: STATUS_SYNONYMS,
        fixed_order: None,
    },
    DimensionSpec {
        name: "housing",
        column: nav::HOUSING,
        synonyms: HOUSING_SYNONYMS,
        fixed_order: None,
    },
    DimensionSpec {
        name: "income",
        column: nav::INCOME,
        synonyms: INCOME_SYNONYMS,
        fixed_order: None,
    },
    DimensionSpec {
        name: "navigator",
        column: nav::PERSON,
        synonyms: PERSON_SYNONYMS,
        fixed_order: None,
    },
];

// ── Report ──────────────────────────────────────────────────────────────────

pub struct NavigationConfig {
    /// Worksheet holding the submission log.
    pub sheet: String,
    /// Year the month selector refers to; also the reference year for ages.
    pub year: i32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            sheet: "Navigation".to_string(),
            year: 2025,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationReport {
    pub period: String,
    pub rollups: Vec<Rollup>,
    pub dimensions: Vec<DimensionSummary>,
    pub zip_codes: Vec<AggregationBucket>,
    pub support: Vec<Tag>,
    pub drill: DrillView,
}

impl NavigationReport {
    /// Degraded shape for a failed load: "Error" rollups, empty tables, and
    /// an empty drill chart that keeps the current breadcrumb.
    pub fn placeholder(label: &str, navigator: &Navigator) -> Self {
        Self {
            period: label.to_string(),
            rollups: vec![
                Rollup::new("clients-served", format!("{label} Clients Served"), ERROR_VALUE),
                Rollup::new(
                    "navigation-hours",
                    format!("{label} Navigation Hours"),
                    ERROR_VALUE,
                ),
                Rollup::new("travel-hours", format!("{label} Travel Hours"), ERROR_VALUE),
            ],
            dimensions: Vec::new(),
            zip_codes: Vec::new(),
            support: Vec::new(),
            drill: DrillView {
                level: navigator.state().level,
                breadcrumb: navigator.breadcrumb(),
                buckets: Vec::new(),
            },
        }
    }
}

/// Build the navigation report for one selector value.
///
/// The sheet is re-fetched on every call. Fetch failures degrade to the
/// placeholder report; a period with no matching rows is a valid empty
/// report.
pub fn navigation_report(
    source: &dyn RecordSource,
    config: &NavigationConfig,
    period_key: &str,
    navigator: &Navigator,
) -> NavigationReport {
    let label = period_key.trim().to_string();
    let period = match Period::from_key(&label, config.year) {
        Ok(period) => period,
        Err(e) => {
            warn!(key = %label, error = %e, "unsupported navigation period selector");
            return NavigationReport::placeholder(&label, navigator);
        }
    };

    let raw = match source.fetch(&config.sheet) {
        Ok(df) => df,
        Err(e) => {
            warn!(sheet = %config.sheet, error = %e, "navigation data unavailable");
            return NavigationReport::placeholder(&label, navigator);
        }
    };

    match assemble(&raw, &label, &period, config, navigator) {
        Ok(report) => report,
        Err(e) => {
            warn!(period = %period, error = %e, "navigation report assembly failed");
            NavigationReport::placeholder(&label, navigator)
        }
    }
}

fn assemble(
    raw: &DataFrame,
    label: &str,
    period: &Period,
    config: &NavigationConfig,
    navigator: &Navigator,
) -> Result<NavigationReport, ReportError> {
    let mut working = raw.clone();
    apply_renames(&mut working)?;
    if working.schema().contains(nav::TRAVEL) {
        working = aggregate::canonicalize_column(&working, nav::TRAVEL, TRAVEL_SYNONYMS)?;
    }

    let entries = normalize::normalize_entries(
        &working,
        &EntryOptions {
            date_column: nav::DATE_OF_ACTIVITY,
            numeric_columns: &[nav::DURATION, nav::TRAVEL],
            name_columns: name_columns(&working),
        },
    )?;
    let entries = normalize::filter_period(&entries, nav::DATE_OF_ACTIVITY, period)?;

    let navigation_hours = (aggregate::sum_column(&entries, nav::DURATION)? / 60.0).round();
    let travel_hours = (aggregate::sum_column(&entries, nav::TRAVEL)? / 60.0).round();
    let rollups = vec![
        Rollup::new(
            "clients-served",
            format!("{label} Clients Served"),
            entries.height(),
        ),
        Rollup::new(
            "navigation-hours",
            format!("{label} Navigation Hours"),
            navigation_hours as i64,
        ),
        Rollup::new(
            "travel-hours",
            format!("{label} Travel Hours"),
            travel_hours as i64,
        ),
    ];

    let mut dimensions = Vec::new();
    for spec in &DIMENSIONS {
        match summarize_dimension(&entries, spec) {
            Ok(summary) => dimensions.push(summary),
            Err(ReportError::MissingColumn(column)) => {
                warn!(column = %column, "dimension column missing; skipping");
            }
            Err(e) => return Err(e),
        }
    }
    if let Some(summary) = age_summary(&entries, config.year)? {
        dimensions.push(summary);
    }

    let support = match tags::aggregate_tags(&entries, nav::SUPPORT) {
        Ok(tags) => tags,
        Err(ReportError::MissingColumn(column)) => {
            warn!(column = %column, "support column missing; skipping tags");
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let drill_records = if entries.schema().contains(nav::LOCATION) {
        aggregate::canonicalize_column(&entries, nav::LOCATION, LOCATION_SYNONYMS)?
    } else {
        DataFrame::empty()
    };
    let drill = navigator.view(&drill_records)?;

    Ok(NavigationReport {
        period: label.to_string(),
        rollups,
        dimensions,
        zip_codes: zip_buckets(&entries)?,
        support,
        drill,
    })
}

fn apply_renames(df: &mut DataFrame) -> Result<(), ReportError> {
    for &(old, new) in RENAMES {
        if df.schema().contains(old) && !df.schema().contains(new) {
            df.rename(old, new.into())?;
        }
    }
    Ok(())
}

fn name_columns(df: &DataFrame) -> Option<(&'static str, &'static str)> {
    (df.schema().contains(nav::FIRST_NAME) && df.schema().contains(nav::LAST_NAME))
        .then_some((nav::FIRST_NAME, nav::LAST_NAME))
}

// ── Age banding ─────────────────────────────────────────────────────────────

/// Band for one client. Missing or unparseable birth dates are an explicit
/// "N/A", never synthesized.
fn age_band(birth: Option<NaiveDate>, report_year: i32) -> &'static str {
    let Some(birth) = birth else {
        return labels::NOT_AVAILABLE;
    };
    let years = report_year - birth.year();
    match years {
        y if y < 0 => labels::NOT_AVAILABLE,
        0..=9 => "0-9",
        10..=19 => "10-19",
        20..=29 => "20-29",
        30..=39 => "30-39",
        40..=49 => "40-49",
        50..=59 => "50-59",
        60..=69 => "60-69",
        70..=79 => "70-79",
        _ => "80+",
    }
}

fn age_summary(
    entries: &DataFrame,
    report_year: i32,
) -> Result<Option<DimensionSummary>, ReportError> {
    if !entries.schema().contains(nav::DATE_OF_BIRTH) {
        return Ok(None);
    }
    if entries.height() == 0 {
        return Ok(Some(DimensionSummary {
            name: "age".to_string(),
            buckets: Vec::new(),
        }));
    }

    let dob = entries
        .column(nav::DATE_OF_BIRTH)?
        .as_materialized_series()
        .str()?;
    let bands: Vec<String> = dob
        .into_iter()
        .map(|cell| {
            age_band(cell.and_then(normalize::parse_mixed_date), report_year).to_string()
        })
        .collect();

    let mut banded = entries.clone();
    banded.with_column(Series::new(nav::AGE_GROUP.into(), bands))?;

    let mut buckets = aggregate::aggregate(&banded, nav::AGE_GROUP)?;
    aggregate::sort_by_fixed_order(&mut buckets, &age::BANDS);
    Ok(Some(DimensionSummary {
        name: "age".to_string(),
        buckets,
    }))
}

// ── Zip codes ───────────────────────────────────────────────────────────────

/// Count valid zip codes, descending, each with a "percentage" metric
/// (share of valid-zip rows, one decimal).
fn zip_buckets(entries: &DataFrame) -> Result<Vec<AggregationBucket>, ReportError> {
    let Ok(column) = entries.column(nav::ZIP) else {
        return Ok(Vec::new());
    };
    if entries.height() == 0 {
        return Ok(Vec::new());
    }

    let zips = column.as_materialized_series().str()?;
    let valid: Vec<String> = zips
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|z| {
            !z.is_empty()
                && z.chars().all(|c| c.is_ascii_digit())
                && !INVALID_ZIP_TOKENS.contains(z)
        })
        .map(String::from)
        .collect();
    if valid.is_empty() {
        return Ok(Vec::new());
    }

    let frame = DataFrame::new(vec![Series::new(nav::ZIP.into(), valid).into()])?;
    let mut buckets = aggregate::aggregate(&frame, nav::ZIP)?;
    aggregate::sort_by_count_desc(&mut buckets);

    let total: u32 = buckets.iter().map(|b| b.count).sum();
    for bucket in &mut buckets {
        let share = f64::from(bucket.count) / f64::from(total) * 100.0;
        bucket
            .metrics
            .insert("percentage".to_string(), (share * 10.0).round() / 10.0);
    }
    Ok(buckets)
}

// ── Reconciliation ──────────────────────────────────────────────────────────

/// Full names present in `left` but absent from `right`, for reconciling
/// the navigation log against a second export. Sorted and deduplicated.
pub fn missing_names(
    left: &DataFrame,
    left_column: &str,
    right: &DataFrame,
    right_column: &str,
) -> Result<Vec<String>, ReportError> {
    if left.height() == 0 {
        return Ok(Vec::new());
    }

    let present = if right.height() == 0 {
        left.clone()
    } else {
        let right_names = right
            .column(right_column)?
            .as_materialized_series()
            .clone();
        left.clone()
            .lazy()
            .filter(col(left_column).is_in(lit(right_names), false).not())
            .collect()?
    };

    let names = present
        .column(left_column)?
        .as_materialized_series()
        .str()?;
    let mut out: Vec<String> = names.into_iter().flatten().map(String::from).collect();
    out.sort();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame(columns: &[(&str, &[&str])]) -> DataFrame {
        let cols: Vec<Column> = columns
            .iter()
            .map(|(name, vals)| {
                Series::new(
                    (*name).into(),
                    vals.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
                )
                .into()
            })
            .collect();
        DataFrame::new(cols).unwrap()
    }

    fn sample_raw() -> DataFrame {
        raw_frame(&[
            (
                "Date of Activity",
                &["01/15/2025", "01/20/2025", "02/02/2025"],
            ),
            ("Activity Duration (minutes):", &["60", "90", "30"]),
            ("Total travel time (minutes):", &["30", "The Bumgalows", "15"]),
            ("Location Encountered:", &["Clinic A", "Clinic A", "Clinic B"]),
            (
                "Type of Coordination/Navigation Provided:",
                &["Housing, Food", "Housing", "Transport"],
            ),
            ("Gender:", &["Male", "", "Female"]),
            (
                "Individual's Date of Birth:",
                &["06/15/1990", "", "03/01/1950"],
            ),
            ("ZIP Code:", &["78701", "Unhoused", "78701"]),
        ])
    }

    fn config() -> NavigationConfig {
        NavigationConfig {
            sheet: "Navigation".to_string(),
            year: 2025,
        }
    }

    #[test]
    fn rollups_count_clients_and_hours() {
        let navigator = Navigator::new("Locations", nav::LOCATION, nav::SUPPORT);
        let period = Period::from_key("January", 2025).unwrap();
        let report =
            assemble(&sample_raw(), "January", &period, &config(), &navigator).unwrap();

        let served = report
            .rollups
            .iter()
            .find(|r| r.id == "clients-served")
            .unwrap();
        assert_eq!(served.value, "2");

        // 60 + 90 minutes → 3 hours (rounded); travel "The Bumgalows" → 0.
        let hours = report
            .rollups
            .iter()
            .find(|r| r.id == "navigation-hours")
            .unwrap();
        assert_eq!(hours.value, "3");
        let travel = report
            .rollups
            .iter()
            .find(|r| r.id == "travel-hours")
            .unwrap();
        assert_eq!(travel.value, "1");
    }

    #[test]
    fn blank_gender_lands_in_the_sentinel_bucket() {
        let navigator = Navigator::new("Locations", nav::LOCATION, nav::SUPPORT);
        let report = assemble(
            &sample_raw(),
            "2025",
            &Period::Year(2025),
            &config(),
            &navigator,
        )
        .unwrap();
        let gender = report
            .dimensions
            .iter()
            .find(|d| d.name == "gender")
            .unwrap();
        assert!(gender.buckets.iter().any(|b| b.key == "N/A" && b.count == 1));
    }

    #[test]
    fn missing_birth_dates_band_as_not_available() {
        let navigator = Navigator::new("Locations", nav::LOCATION, nav::SUPPORT);
        let report = assemble(
            &sample_raw(),
            "2025",
            &Period::Year(2025),
            &config(),
            &navigator,
        )
        .unwrap();
        let age = report.dimensions.iter().find(|d| d.name == "age").unwrap();
        let keys: Vec<_> = age.buckets.iter().map(|b| b.key.as_str()).collect();
        // Ordinal bands first, N/A last.
        assert_eq!(keys, vec!["30-39", "70-79", "N/A"]);
    }

    #[test]
    fn invalid_zip_tokens_are_excluded_and_shares_sum_to_one() {
        let navigator = Navigator::new("Locations", nav::LOCATION, nav::SUPPORT);
        let report = assemble(
            &sample_raw(),
            "2025",
            &Period::Year(2025),
            &config(),
            &navigator,
        )
        .unwrap();
        assert_eq!(report.zip_codes.len(), 1);
        assert_eq!(report.zip_codes[0].key, "78701");
        assert_eq!(report.zip_codes[0].count, 2);
        assert_eq!(report.zip_codes[0].metrics["percentage"], 100.0);
    }

    #[test]
    fn support_tags_tally_across_the_period() {
        let navigator = Navigator::new("Locations", nav::LOCATION, nav::SUPPORT);
        let period = Period::from_key("January", 2025).unwrap();
        let report =
            assemble(&sample_raw(), "January", &period, &config(), &navigator).unwrap();
        let housing = report.support.iter().find(|t| t.tag == "Housing").unwrap();
        assert_eq!(housing.count, 2);
        assert!(report.support.iter().all(|t| t.tag != "Transport"));
    }

    #[test]
    fn drill_detail_restricts_tags_to_the_selected_location() {
        let mut navigator = Navigator::new("Locations", nav::LOCATION, nav::SUPPORT);
        navigator.select("Clinic B");
        let report = assemble(
            &sample_raw(),
            "2025",
            &Period::Year(2025),
            &config(),
            &navigator,
        )
        .unwrap();
        assert_eq!(report.drill.breadcrumb, vec!["All Locations", "Clinic B"]);
        assert_eq!(report.drill.buckets.len(), 1);
        assert_eq!(report.drill.buckets[0].key, "Transport");
    }

    #[test]
    fn age_band_edges() {
        let birth = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        assert_eq!(age_band(None, 2025), "N/A");
        assert_eq!(age_band(birth(2030, 1, 1), 2025), "N/A");
        assert_eq!(age_band(birth(2020, 1, 1), 2025), "0-9");
        assert_eq!(age_band(birth(1990, 6, 15), 2025), "30-39");
        assert_eq!(age_band(birth(1940, 1, 1), 2025), "80+");
    }

    #[test]
    fn reconciliation_reports_names_absent_from_the_other_frame() {
        let log = raw_frame(&[("Full Name", &["Ada Lovelace", "Grace Hopper", "Ada Lovelace"])]);
        let export = raw_frame(&[("seeker_name", &["Grace Hopper"])]);
        let missing = missing_names(&log, "Full Name", &export, "seeker_name").unwrap();
        assert_eq!(missing, vec!["Ada Lovelace"]);

        let none_missing = missing_names(&log, "Full Name", &log, "Full Name").unwrap();
        assert!(none_missing.is_empty());
    }

    #[test]
    fn placeholder_keeps_the_breadcrumb_and_marks_rollups() {
        let mut navigator = Navigator::new("Locations", nav::LOCATION, nav::SUPPORT);
        navigator.select("Clinic A");
        let report = NavigationReport::placeholder("March", &navigator);
        assert!(report.rollups.iter().all(|r| r.value == ERROR_VALUE));
        assert_eq!(report.drill.breadcrumb, vec!["All Locations", "Clinic A"]);
        assert!(report.drill.buckets.is_empty());
    }
}
