use std::collections::BTreeMap;

use pgslice_core::{quote_ident, Column, Error, Result, Table, TimeframeFilter, Value};

/// Select expression for one column; types the driver cannot decode travel as text.
pub(crate) fn select_expr(column: &Column) -> String {
    let quoted = quote_ident(&column.name);
    if Value::is_natively_decoded(&column.udt_name) {
        quoted
    } else {
        format!("{quoted}::text AS {quoted}")
    }
}

fn column<'t>(table: &'t Table, name: &str) -> Result<&'t Column> {
    table.column(name).ok_or_else(|| {
        Error::Schema(format!(
            "column {name} not found on table {}",
            table.full_name()
        ))
    })
}

fn select_list(table: &Table, names: &[String]) -> Result<String> {
    let exprs = names
        .iter()
        .map(|name| column(table, name).map(select_expr))
        .collect::<Result<Vec<_>>>()?;
    Ok(exprs.join(", "))
}

/// `"a" = $1::integer AND "b" = $2::text`, numbering parameters from `first`.
fn key_predicate(table: &Table, names: &[String], first: usize) -> Result<String> {
    let parts = names
        .iter()
        .enumerate()
        .map(|(offset, name)| {
            let column = column(table, name)?;
            Ok(format!(
                "{} = ${}::{}",
                quote_ident(name),
                first + offset,
                column.sql_type()
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(" AND "))
}

fn order_by(names: &[String]) -> String {
    names
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fetch one full row by its primary key.
pub(crate) fn fetch_by_key(table: &Table) -> Result<String> {
    let all: Vec<String> = table.columns.iter().map(|col| col.name.clone()).collect();
    Ok(format!(
        "SELECT {} FROM {} WHERE {}",
        select_list(table, &all)?,
        table.quoted_name(),
        key_predicate(table, &table.primary_keys, 1)?
    ))
}

/// Primary keys of the rows whose `columns` equal the bound values, optionally
/// narrowed to a time window bound after them.
pub(crate) fn keys_matching(
    table: &Table,
    columns: &[String],
    timeframe: Option<&TimeframeFilter>,
) -> Result<String> {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select_list(table, &table.primary_keys)?,
        table.quoted_name(),
        key_predicate(table, columns, 1)?
    );
    if let Some(filter) = timeframe {
        let next = columns.len() + 1;
        sql.push_str(&format!(
            " AND {} BETWEEN ${} AND ${}",
            quote_ident(&filter.column_name),
            next,
            next + 1
        ));
    }
    sql.push_str(&format!(" ORDER BY {}", order_by(&table.primary_keys)));
    Ok(sql)
}

/// Primary keys of every row inside the window.
pub(crate) fn keys_in_timeframe(table: &Table, filter: &TimeframeFilter) -> Result<String> {
    Ok(format!(
        "SELECT {} FROM {} WHERE {} BETWEEN $1 AND $2 ORDER BY {}",
        select_list(table, &table.primary_keys)?,
        table.quoted_name(),
        quote_ident(&filter.column_name),
        order_by(&table.primary_keys)
    ))
}

pub(crate) fn timeframe_params(filter: &TimeframeFilter) -> [Value; 2] {
    [
        Value::Timestamp(filter.start_date),
        Value::Timestamp(filter.end_date),
    ]
}

/// Turn text-transported values back into their typed form.
pub(crate) fn restore_value(column: &Column, value: Value) -> Value {
    match value {
        Value::Text(text) if !Value::is_natively_decoded(&column.udt_name) => {
            Value::from_text_column(text, &column.data_type, &column.udt_name)
        }
        other => other,
    }
}

/// Pair a fetched row with the table's column names.
pub(crate) fn row_to_map(table: &Table, row: Vec<Value>) -> BTreeMap<String, Value> {
    table
        .columns
        .iter()
        .zip(row)
        .map(|(column, value)| (column.name.clone(), restore_value(column, value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn column(name: &str, data_type: &str, udt_name: &str, pk: bool) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            udt_name: udt_name.to_string(),
            nullable: !pk,
            default: None,
            is_primary_key: pk,
            is_auto_generated: false,
        }
    }

    fn orders() -> Table {
        let mut table = Table::new("sales", "orders");
        table.columns = vec![
            column("id", "integer", "int4", true),
            column("total", "numeric", "numeric", false),
            column("status", "USER-DEFINED", "order_status", false),
            column("user_id", "integer", "int4", false),
        ];
        table.primary_keys = vec!["id".to_string()];
        table
    }

    #[test]
    fn fetch_casts_keys_and_transports_unknown_types_as_text() {
        assert_eq!(
            fetch_by_key(&orders()).unwrap(),
            r#"SELECT "id", "total"::text AS "total", "status"::text AS "status", "user_id" FROM "sales"."orders" WHERE "id" = $1::integer"#
        );
    }

    #[test]
    fn restores_text_transported_columns_by_type() {
        let row = vec![
            Value::Int(7),
            Value::from("19.990"),
            Value::from("shipped"),
            Value::Null,
        ];

        let data = row_to_map(&orders(), row);

        assert_eq!(data["id"], Value::Int(7));
        assert_eq!(data["total"], Value::Decimal("19.990".to_string()));
        assert_eq!(data["status"], Value::Other("shipped".to_string()));
        assert_eq!(data["user_id"], Value::Null);
    }

    #[test]
    fn appends_timeframe_after_key_params() {
        let filter = TimeframeFilter::new(
            "orders",
            "created_at",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        )
        .unwrap();
        let sql = keys_matching(&orders(), &["user_id".to_string()], Some(&filter)).unwrap();
        assert_eq!(
            sql,
            r#"SELECT "id" FROM "sales"."orders" WHERE "user_id" = $1::integer AND "created_at" BETWEEN $2 AND $3 ORDER BY "id""#
        );
    }

    #[test]
    fn unknown_column_is_a_schema_error() {
        let err = keys_matching(&orders(), &["missing".to_string()], None).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn restores_numeric_text_as_decimal() {
        let table = orders();
        let row = row_to_map(
            &table,
            vec![
                Value::Int(1),
                Value::from("10.50"),
                Value::from("paid"),
                Value::Null,
            ],
        );
        assert_eq!(row["total"], Value::Decimal("10.50".to_string()));
        assert_eq!(row["status"], Value::from("paid"));
        assert_eq!(row["user_id"], Value::Null);
    }
}
