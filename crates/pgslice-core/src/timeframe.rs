use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column used when a filter names no column.
pub const DEFAULT_TIMEFRAME_COLUMN: &str = "created_at";

/// Inclusive time window applied to rows of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeFilter {
    /// Bare (`orders`) or qualified (`sales.orders`) table name.
    pub table_name: String,
    pub column_name: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
}

impl TimeframeFilter {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        start_date: NaiveDateTime,
        end_date: NaiveDateTime,
    ) -> Result<Self> {
        if start_date > end_date {
            return Err(Error::InvalidTimeframe(format!(
                "start date {start_date} is after end date {end_date}"
            )));
        }
        Ok(Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            start_date,
            end_date,
        })
    }

    /// Parse `table:column:start:end` or `table:start:end`.
    pub fn parse_related(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (table, column, start, end) = match parts.as_slice() {
            [table, column, start, end] => (*table, *column, *start, *end),
            [table, start, end] => (*table, DEFAULT_TIMEFRAME_COLUMN, *start, *end),
            _ => {
                return Err(Error::InvalidTimeframe(format!(
                    "Invalid truncate filter format: {spec:?} (expected table:column:start:end or table:start:end)"
                )));
            }
        };
        if table.is_empty() || column.is_empty() {
            return Err(Error::InvalidTimeframe(format!(
                "Invalid truncate filter format: {spec:?} (empty table or column)"
            )));
        }
        Self::new(table, column, parse_start(start)?, parse_end(end)?)
    }

    /// Parse `column:start:end` for the main table of a dump.
    pub fn parse_main(table: &str, spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        match parts.as_slice() {
            [column, start, end] if !column.is_empty() => {
                Self::new(table, *column, parse_start(start)?, parse_end(end)?)
            }
            _ => Err(Error::InvalidTimeframe(format!(
                "Invalid timeframe format: {spec:?} (expected column:start:end)"
            ))),
        }
    }

    /// Whether this filter targets `schema.table`.
    pub fn applies_to(&self, schema: &str, table: &str) -> bool {
        match self.table_name.split_once('.') {
            Some((filter_schema, filter_table)) => filter_schema == schema && filter_table == table,
            None => self.table_name == table,
        }
    }
}

impl fmt::Display for TimeframeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: {} to {}",
            self.table_name, self.column_name, self.start_date, self.end_date
        )
    }
}

/// Parse all related-table filters, failing on the first bad one.
pub fn parse_related_filters<S: AsRef<str>>(specs: &[S]) -> Result<Vec<TimeframeFilter>> {
    specs
        .iter()
        .map(|spec| TimeframeFilter::parse_related(spec.as_ref()))
        .collect()
}

fn parse_start(raw: &str) -> Result<NaiveDateTime> {
    parse_datetime(raw)
        .ok_or_else(|| Error::InvalidTimeframe(format!("Invalid start date: {raw:?}")))
}

fn parse_end(raw: &str) -> Result<NaiveDateTime> {
    parse_datetime(raw).ok_or_else(|| Error::InvalidTimeframe(format!("Invalid end date: {raw:?}")))
}

/// `YYYY-MM-DD` (midnight) or a full `YYYY-MM-DDTHH:MM:SS` timestamp.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
