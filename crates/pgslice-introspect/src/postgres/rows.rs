use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};
use uuid::Uuid;

use pgslice_core::{Error, Result, Value};

fn decode_error(column: &str, err: sqlx::Error) -> Error {
    Error::Schema(format!("failed to decode column {column}: {err}"))
}

/// Attach one positional parameter.
pub fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Result<Query<'q, Postgres, PgArguments>> {
    let bound = match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(value) => query.bind(*value),
        Value::Int(value) => query.bind(*value),
        Value::Float(value) => query.bind(*value),
        Value::Decimal(text) | Value::Text(text) | Value::Other(text) => query.bind(text.clone()),
        Value::Date(value) => query.bind(*value),
        Value::Time(value) => query.bind(*value),
        Value::Timestamp(value) => query.bind(*value),
        Value::TimestampTz(value) => query.bind(*value),
        Value::Uuid(value) => query.bind(*value),
        Value::Json(value) => query.bind(sqlx::types::Json(value.clone())),
        Value::Bytes(bytes) => query.bind(bytes.clone()),
        Value::Array(_) => {
            return Err(Error::Schema(
                "array values cannot be used as query parameters".to_string(),
            ));
        }
    };
    Ok(bound)
}

/// Decode every column of `row` in select-list order.
pub fn decode_row(row: &PgRow) -> Result<Vec<Value>> {
    (0..row.columns().len())
        .map(|index| decode_column(row, index))
        .collect()
}

fn decode_column(row: &PgRow, index: usize) -> Result<Value> {
    let column = row.column(index);
    let name = column.name();
    let raw = row.try_get_raw(index).map_err(|err| decode_error(name, err))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let type_name = column.type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => Value::Bool(get(row, index, name)?),
        "INT2" => Value::Int(i64::from(get::<i16>(row, index, name)?)),
        "INT4" => Value::Int(i64::from(get::<i32>(row, index, name)?)),
        "INT8" => Value::Int(get(row, index, name)?),
        "FLOAT4" => Value::Float(f64::from(get::<f32>(row, index, name)?)),
        "FLOAT8" => Value::Float(get(row, index, name)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::Text(get(row, index, name)?),
        "UUID" => Value::Uuid(get(row, index, name)?),
        "DATE" => Value::Date(get::<NaiveDate>(row, index, name)?),
        "TIME" => Value::Time(get::<NaiveTime>(row, index, name)?),
        "TIMESTAMP" => Value::Timestamp(get::<NaiveDateTime>(row, index, name)?),
        "TIMESTAMPTZ" => Value::TimestampTz(get::<DateTime<Utc>>(row, index, name)?.fixed_offset()),
        "JSON" | "JSONB" => Value::Json(get::<serde_json::Value>(row, index, name)?),
        "BYTEA" => Value::Bytes(get(row, index, name)?),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            array(get::<Vec<Option<String>>>(row, index, name)?, Value::Text)
        }
        "BOOL[]" => array(get::<Vec<Option<bool>>>(row, index, name)?, Value::Bool),
        "INT2[]" => array(get::<Vec<Option<i16>>>(row, index, name)?, |v| {
            Value::Int(i64::from(v))
        }),
        "INT4[]" => array(get::<Vec<Option<i32>>>(row, index, name)?, |v| {
            Value::Int(i64::from(v))
        }),
        "INT8[]" => array(get::<Vec<Option<i64>>>(row, index, name)?, Value::Int),
        "FLOAT4[]" => array(get::<Vec<Option<f32>>>(row, index, name)?, |v| {
            Value::Float(f64::from(v))
        }),
        "FLOAT8[]" => array(get::<Vec<Option<f64>>>(row, index, name)?, Value::Float),
        "UUID[]" => array(get::<Vec<Option<Uuid>>>(row, index, name)?, Value::Uuid),
        other => {
            return Err(Error::Schema(format!(
                "column {name} has type {other}, which must be selected as text"
            )));
        }
    };
    Ok(value)
}

fn get<'r, T>(row: &'r PgRow, index: usize, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(index).map_err(|err| decode_error(name, err))
}

fn array<T>(items: Vec<Option<T>>, wrap: impl Fn(T) -> Value) -> Value {
    Value::Array(
        items
            .into_iter()
            .map(|item| item.map_or(Value::Null, &wrap))
            .collect(),
    )
}
