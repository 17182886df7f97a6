//! Ingestion boundary: tabular rows into typed series and records
//!
//! Column names are resolved here, once; everything past this module works
//! on [`TimeSeries`] and [`Deal`] values. Rows whose date cannot be parsed
//! are dropped, not fatal, with the dropped count emitted at debug level.

use crate::error::{ForecastError, Result};
use crate::pipeline::Deal;
use crate::series::{month_start, TimeSeries};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m/%d/%y", "%d-%b-%Y"];

/// Turns event-level rows into clean, gap-filled monthly series.
#[derive(Debug)]
pub struct SeriesPreparer;

impl SeriesPreparer {
    /// Load a CSV file into a DataFrame with inferred schema.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;
        Ok(df)
    }

    /// Aggregate rows into one monthly series.
    ///
    /// Values are summed within each calendar month; the result covers
    /// every month from the first to the last observed one, with months
    /// that had no rows at zero. Empty input yields an empty series.
    pub fn monthly_series(
        df: &DataFrame,
        date_field: &str,
        value_field: &str,
    ) -> Result<TimeSeries> {
        let dates = column_dates(df.column(date_field)?)?;
        let values = column_values(df.column(value_field)?)?;

        let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let mut dropped = 0usize;
        for (date, value) in dates.iter().zip(values.iter()) {
            match date {
                Some(date) => {
                    *buckets.entry(month_start(*date)).or_insert(0.0) += value.unwrap_or(0.0);
                }
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!(dropped, date_field, "dropped rows with unparseable dates");
        }

        Ok(TimeSeries::from_monthly_buckets(&buckets))
    }

    /// Group rows by the given key columns, then aggregate each group into
    /// its own monthly series. Composite keys are joined with " / ".
    pub fn monthly_series_by_group(
        df: &DataFrame,
        date_field: &str,
        value_field: &str,
        group_fields: &[&str],
    ) -> Result<BTreeMap<String, TimeSeries>> {
        if group_fields.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one group field is required; use monthly_series for an aggregate"
                    .to_string(),
            ));
        }

        let dates = column_dates(df.column(date_field)?)?;
        let values = column_values(df.column(value_field)?)?;
        let mut label_columns = Vec::with_capacity(group_fields.len());
        for field in group_fields {
            label_columns.push(column_labels(df.column(field)?)?);
        }

        let mut grouped: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        let mut dropped = 0usize;
        for (row, (date, value)) in dates.iter().zip(values.iter()).enumerate() {
            let date = match date {
                Some(date) => *date,
                None => {
                    dropped += 1;
                    continue;
                }
            };
            let key = label_columns
                .iter()
                .map(|labels| labels[row].as_str())
                .collect::<Vec<_>>()
                .join(" / ");
            *grouped
                .entry(key)
                .or_default()
                .entry(month_start(date))
                .or_insert(0.0) += value.unwrap_or(0.0);
        }
        if dropped > 0 {
            debug!(dropped, date_field, "dropped rows with unparseable dates");
        }

        Ok(grouped
            .into_iter()
            .map(|(key, buckets)| (key, TimeSeries::from_monthly_buckets(&buckets)))
            .collect())
    }
}

/// Convert a deals DataFrame into typed [`Deal`] records.
///
/// Rows without an amount are dropped; a missing or unparseable close
/// date is kept as `None` and left to the pipeline adapter to skip.
pub fn deals_from_dataframe(
    df: &DataFrame,
    amount_field: &str,
    close_date_field: &str,
    status_field: &str,
) -> Result<Vec<Deal>> {
    let amounts = column_values(df.column(amount_field)?)?;
    let closes = column_dates(df.column(close_date_field)?)?;
    let statuses = column_labels(df.column(status_field)?)?;

    let mut deals = Vec::with_capacity(amounts.len());
    let mut dropped = 0usize;
    for ((amount, close), status) in amounts.iter().zip(closes.iter()).zip(statuses.iter()) {
        match amount {
            Some(amount) => deals.push(Deal {
                amount: *amount,
                expected_close: *close,
                status: status.clone(),
            }),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, amount_field, "dropped deals without an amount");
    }

    Ok(deals)
}

/// Row-aligned dates from a string, date, or datetime column.
fn column_dates(column: &Series) -> Result<Vec<Option<NaiveDate>>> {
    match column.dtype() {
        DataType::Utf8 => Ok(column
            .utf8()?
            .into_iter()
            .map(|value| value.and_then(parse_date))
            .collect()),
        DataType::Date => Ok(column
            .date()?
            .into_iter()
            .map(|value| value.and_then(date_from_days))
            .collect()),
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            Ok(column
                .datetime()?
                .into_iter()
                .map(move |value| value.and_then(|ts| date_from_timestamp(ts, unit)))
                .collect())
        }
        other => Err(ForecastError::DataError(format!(
            "Column '{}' has unsupported date type {:?}",
            column.name(),
            other
        ))),
    }
}

/// Row-aligned f64 values from any numeric column.
fn column_values(column: &Series) -> Result<Vec<Option<f64>>> {
    match column.dtype() {
        DataType::Float64 => Ok(column.f64()?.into_iter().collect()),
        DataType::Float32 => Ok(column
            .f32()?
            .into_iter()
            .map(|v| v.map(|v| v as f64))
            .collect()),
        DataType::Int64 => Ok(column
            .i64()?
            .into_iter()
            .map(|v| v.map(|v| v as f64))
            .collect()),
        DataType::Int32 => Ok(column
            .i32()?
            .into_iter()
            .map(|v| v.map(|v| v as f64))
            .collect()),
        DataType::UInt64 => Ok(column
            .u64()?
            .into_iter()
            .map(|v| v.map(|v| v as f64))
            .collect()),
        DataType::UInt32 => Ok(column
            .u32()?
            .into_iter()
            .map(|v| v.map(|v| v as f64))
            .collect()),
        other => Err(ForecastError::DataError(format!(
            "Column '{}' cannot be read as numeric values ({:?})",
            column.name(),
            other
        ))),
    }
}

/// Row-aligned string labels from any column (cast through Utf8).
fn column_labels(column: &Series) -> Result<Vec<String>> {
    let casted = column.cast(&DataType::Utf8)?;
    Ok(casted
        .utf8()?
        .into_iter()
        .map(|value| value.unwrap_or("").to_string())
        .collect())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    None
}

fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days as i64))
}

fn date_from_timestamp(timestamp: i64, unit: TimeUnit) -> Option<NaiveDate> {
    let seconds = match unit {
        TimeUnit::Nanoseconds => timestamp / 1_000_000_000,
        TimeUnit::Microseconds => timestamp / 1_000_000,
        TimeUnit::Milliseconds => timestamp / 1_000,
    };
    chrono::DateTime::from_timestamp(seconds, 0).map(|dt| dt.date_naive())
}
