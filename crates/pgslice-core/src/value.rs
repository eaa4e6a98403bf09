use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

/// Runtime value of a single column, as read from the source database.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Arbitrary-precision decimal kept as its exact text.
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Uuid(Uuid),
    Json(serde_json::Value),
    Array(Vec<Value>),
    Bytes(Vec<u8>),
    /// Any other type, carried in its textual form.
    Other(String),
}

/// Underlying type tags the driver decodes into a dedicated [`Value`] variant.
const NATIVE_UDT_NAMES: &[&str] = &[
    "bool", "int2", "int4", "int8", "float4", "float8", "text", "varchar", "bpchar", "name",
    "uuid", "date", "time", "timestamp", "timestamptz", "json", "jsonb", "bytea", "_bool",
    "_int2", "_int4", "_int8", "_float4", "_float8", "_text", "_varchar", "_bpchar", "_uuid",
];

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Stable text form used for record identity and key parameters.
    ///
    /// `42_i64` and `"42"` normalize to the same key.
    pub fn key_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Decimal(text) | Value::Text(text) | Value::Other(text) => text.clone(),
            Value::Date(value) => value.format("%Y-%m-%d").to_string(),
            Value::Time(value) => format_time(value),
            Value::Timestamp(value) => format_timestamp(value),
            Value::TimestampTz(value) => format_timestamptz(value),
            Value::Uuid(value) => value.hyphenated().to_string(),
            Value::Json(value) => value.to_string(),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::key_text).collect();
                format!("{{{}}}", parts.join(","))
            }
            Value::Bytes(bytes) => format!("\\x{}", hex::encode(bytes)),
        }
    }

    /// Whether the driver returns columns of this type as a dedicated variant.
    ///
    /// Other columns are selected as text and rebuilt with [`Value::from_text_column`].
    pub fn is_natively_decoded(udt_name: &str) -> bool {
        NATIVE_UDT_NAMES.contains(&udt_name)
    }

    /// Rebuild a value that was transported as text.
    ///
    /// Numerics become [`Value::Decimal`]; enums, intervals, network types and
    /// the rest stay [`Value::Other`].
    pub fn from_text_column(text: String, data_type: &str, udt_name: &str) -> Value {
        match (data_type, udt_name) {
            ("numeric" | "decimal", _) | (_, "numeric") => Value::Decimal(text),
            _ => Value::Other(text),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// ISO-8601 time, fractional seconds only when present.
pub fn format_time(value: &NaiveTime) -> String {
    value.format("%H:%M:%S%.f").to_string()
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

pub fn format_timestamptz(value: &DateTime<FixedOffset>) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.f%:z").to_string()
}
