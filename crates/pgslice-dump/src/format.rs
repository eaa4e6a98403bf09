use pgslice_core::value::{format_time, format_timestamp, format_timestamptz};
use pgslice_core::{array_element_type, Column, Value};

/// Render a value as a SQL literal.
///
/// `column` supplies the array element type; without it, arrays are written
/// as JSON text like any other structured value.
pub fn format_value(value: &Value, column: Option<&Column>) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(value) => value.to_string(),
        Value::Float(value) => format_float(*value),
        Value::Decimal(text) => format_decimal(text),
        Value::Text(text) | Value::Other(text) => quote_literal(text),
        Value::Date(value) => quote_literal(&value.format("%Y-%m-%d").to_string()),
        Value::Time(value) => quote_literal(&format_time(value)),
        Value::Timestamp(value) => quote_literal(&format_timestamp(value)),
        Value::TimestampTz(value) => quote_literal(&format_timestamptz(value)),
        Value::Uuid(value) => quote_literal(&value.hyphenated().to_string()),
        Value::Json(value) => quote_literal(&value.to_string()),
        Value::Array(items) => match column.filter(|column| column.is_array()) {
            Some(column) => {
                let element = array_element_type(&column.udt_name);
                format!("{}::{element}[]", format_array(items))
            }
            None => quote_literal(&to_json(value).to_string()),
        },
        Value::Bytes(bytes) => format!("'\\x{}'", hex::encode(bytes)),
    }
}

/// Single-quote `text`, doubling quotes.
///
/// Backslashes are doubled too, in an escape-string literal so they read back
/// unchanged.
pub fn quote_literal(text: &str) -> String {
    let escaped = text.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{escaped}'")
    }
}

/// Text form of a record key as stored in the id map: the single value, or a
/// JSON array of the parts for composite keys.
pub fn serialize_pk_value(pk_values: &[String]) -> String {
    match pk_values {
        [single] => single.clone(),
        parts => serde_json::Value::from(parts.to_vec()).to_string(),
    }
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        "'NaN'".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "'Infinity'".to_string()
        } else {
            "'-Infinity'".to_string()
        }
    } else {
        value.to_string()
    }
}

fn format_decimal(text: &str) -> String {
    match text {
        "NaN" | "Infinity" | "-Infinity" => format!("'{text}'"),
        _ => text.to_string(),
    }
}

/// `ARRAY[...]`, nested per dimension; only the outermost level carries the cast.
fn format_array(items: &[Value]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Array(inner) => format_array(inner),
            other => format_value(other, None),
        })
        .collect();
    format!("ARRAY[{}]", parts.join(", "))
}

fn to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Bool(value) => Json::Bool(*value),
        Value::Int(value) => Json::from(*value),
        Value::Float(value) => serde_json::Number::from_f64(*value)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Json(value) => value.clone(),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        other => Json::String(other.key_text()),
    }
}
