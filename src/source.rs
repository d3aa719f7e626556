use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::ReportError;
use crate::schema::period;

/// A user-selectable reporting period, parsed from the dropdown value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    AllTime,
    Year(i32),
    Month { name: String, year: i32 },
}

impl Period {
    /// Parse a selector key ("All Time", "2026", "January", ...).
    ///
    /// Month keys carry no year of their own; `default_year` supplies it.
    pub fn from_key(key: &str, default_year: i32) -> Result<Self, ReportError> {
        let key = key.trim();
        if key == period::ALL_TIME {
            return Ok(Self::AllTime);
        }
        if let Ok(year) = key.parse::<i32>() {
            return Ok(Self::Year(year));
        }
        if period::MONTHS.contains(&key) {
            return Ok(Self::Month {
                name: key.to_string(),
                year: default_year,
            });
        }
        Err(ReportError::InvalidData(format!(
            "Unknown period key: '{key}'"
        )))
    }

    /// 1-based month number for `Month` periods.
    pub fn month_number(&self) -> Option<u32> {
        match self {
            Self::Month { name, .. } => period::MONTHS
                .iter()
                .position(|m| *m == name.as_str())
                .map(|i| i as u32 + 1),
            _ => None,
        }
    }

    pub fn year(&self) -> Option<i32> {
        match self {
            Self::AllTime => None,
            Self::Year(year) => Some(*year),
            Self::Month { year, .. } => Some(*year),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllTime => f.write_str(period::ALL_TIME),
            Self::Year(year) => write!(f, "{year}"),
            Self::Month { name, .. } => f.write_str(name),
        }
    }
}

/// Supplies raw tabular rows, one worksheet at a time.
///
/// Implementations own authentication and transport; the pipeline only sees
/// string-typed DataFrames. Injected into the report builders so nothing in
/// the crate reaches for global state.
pub trait RecordSource {
    /// Fetch one worksheet with every column read as String.
    fn fetch(&self, sheet: &str) -> Result<DataFrame, ReportError>;

    /// Names of all available worksheets.
    fn sheet_names(&self) -> Result<Vec<String>, ReportError>;
}

/// Record source backed by a directory of per-worksheet CSV files.
pub struct CsvRecordSource {
    base_path: PathBuf,
    rename: Option<HashMap<String, String>>,
}

impl CsvRecordSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            rename: None,
        }
    }

    /// Apply a header rename map to every fetched sheet.
    pub fn with_rename(mut self, rename: HashMap<String, String>) -> Self {
        self.rename = Some(rename);
        self
    }

    /// Read a CSV file with all columns as String dtype.
    /// Trims whitespace from column names and applies the optional rename.
    fn read_csv_as_strings(&self, filename: &str) -> Result<DataFrame, ReportError> {
        let path = self.base_path.join(filename);
        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0)) // all columns as String
            .try_into_reader_with_file_path(Some(path))?
            .finish()?;

        let trimmed: Vec<String> = df
            .get_column_names_str()
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        df.set_column_names(trimmed.as_slice())?;

        if let Some(map) = &self.rename {
            for (old, new) in map {
                if df.schema().contains(old.as_str()) {
                    df.rename(old, new.as_str().into())?;
                }
            }
        }

        Ok(df)
    }
}

impl RecordSource for CsvRecordSource {
    fn fetch(&self, sheet: &str) -> Result<DataFrame, ReportError> {
        self.read_csv_as_strings(&format!("{sheet}.csv"))
    }

    fn sheet_names(&self) -> Result<Vec<String>, ReportError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Fetch the raw table backing `period`.
///
/// "All Time" concatenates every year-named sheet, skipping sheets that fail
/// to load; Year and Month periods load the matching year sheet (month
/// filtering happens downstream, after date parsing).
pub fn load_period(
    source: &dyn RecordSource,
    period: &Period,
) -> Result<DataFrame, ReportError> {
    match period {
        Period::AllTime => {
            let mut frames = Vec::new();
            for name in source.sheet_names()? {
                if name.parse::<i32>().is_err() {
                    continue;
                }
                match source.fetch(&name) {
                    Ok(df) => {
                        debug!(sheet = %name, rows = df.height(), "loaded worksheet");
                        frames.push(df);
                    }
                    Err(e) => warn!(sheet = %name, error = %e, "worksheet failed to load; skipping"),
                }
            }
            if frames.is_empty() {
                return Err(ReportError::Source(
                    "no worksheets found for All Time".to_string(),
                ));
            }
            vstack_union(frames)
        }
        Period::Year(year) => source.fetch(&year.to_string()),
        Period::Month { year, .. } => source.fetch(&year.to_string()),
    }
}

/// Concatenate sheets whose column sets may differ (each year sheet carries
/// its own date columns). Missing columns fill with nulls, matching a
/// spreadsheet union.
fn vstack_union(frames: Vec<DataFrame>) -> Result<DataFrame, ReportError> {
    let mut names: Vec<String> = Vec::new();
    for df in &frames {
        for name in df.get_column_names_str() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }

    let mut aligned = Vec::with_capacity(frames.len());
    for mut df in frames {
        for name in &names {
            if !df.schema().contains(name) {
                df.with_column(Series::full_null(
                    name.as_str().into(),
                    df.height(),
                    &DataType::String,
                ))?;
            }
        }
        aligned.push(df.select(names.iter().map(String::as_str))?);
    }

    let mut iter = aligned.into_iter();
    let Some(mut combined) = iter.next() else {
        return Err(ReportError::Source("nothing to concatenate".to_string()));
    };
    for df in iter {
        combined.vstack_mut(&df)?;
    }
    Ok(combined)
}

/// Degradation boundary: any fetch failure becomes an empty table plus a
/// logged diagnostic, so the caller renders a "no data" state instead of
/// aborting.
pub fn load_period_or_empty(source: &dyn RecordSource, period: &Period) -> DataFrame {
    match load_period(source, period) {
        Ok(df) => df,
        Err(e) => {
            warn!(period = %period, error = %e, "record source unavailable; continuing with empty table");
            DataFrame::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parses_selector_keys() {
        assert_eq!(Period::from_key("All Time", 2025).unwrap(), Period::AllTime);
        assert_eq!(Period::from_key("2026", 2025).unwrap(), Period::Year(2026));
        assert_eq!(
            Period::from_key("March", 2025).unwrap(),
            Period::Month {
                name: "March".to_string(),
                year: 2025
            }
        );
        assert!(Period::from_key("Marchtober", 2025).is_err());
    }

    #[test]
    fn month_numbers_are_one_based() {
        let january = Period::from_key("January", 2025).unwrap();
        assert_eq!(january.month_number(), Some(1));
        let december = Period::from_key("December", 2025).unwrap();
        assert_eq!(december.month_number(), Some(12));
        assert_eq!(Period::AllTime.month_number(), None);
    }

    #[test]
    fn display_round_trips_the_selector_value() {
        assert_eq!(Period::AllTime.to_string(), "All Time");
        assert_eq!(Period::Year(2026).to_string(), "2026");
        let may = Period::from_key("May", 2025).unwrap();
        assert_eq!(may.to_string(), "May");
    }

    #[test]
    fn unreachable_source_degrades_to_an_empty_table() {
        let source = CsvRecordSource::new("/definitely/not/a/real/path");
        let df = load_period_or_empty(&source, &Period::AllTime);
        assert_eq!(df.height(), 0);
    }
}
