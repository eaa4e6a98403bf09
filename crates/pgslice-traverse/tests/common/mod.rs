#![allow(dead_code)]

use pgslice_core::{Column, FkAction, ForeignKey, Table, Value};

pub fn column(name: &str, data_type: &str, udt_name: &str) -> Column {
    Column {
        name: name.to_string(),
        data_type: data_type.to_string(),
        udt_name: udt_name.to_string(),
        nullable: true,
        default: None,
        is_primary_key: false,
        is_auto_generated: false,
    }
}

pub fn int(name: &str) -> Column {
    column(name, "integer", "int4")
}

pub fn text(name: &str) -> Column {
    column(name, "text", "text")
}

pub fn fk(constraint: &str, source: &str, source_col: &str, target: &str, target_col: &str) -> ForeignKey {
    ForeignKey {
        constraint_name: constraint.to_string(),
        source_table: source.to_string(),
        source_column: source_col.to_string(),
        target_table: target.to_string(),
        target_column: target_col.to_string(),
        on_delete: FkAction::NoAction,
    }
}

pub fn table(name: &str, columns: Vec<Column>, pks: &[&str], fks: Vec<ForeignKey>) -> Table {
    let mut table = Table::new("public", name);
    table.columns = columns
        .into_iter()
        .map(|mut column| {
            if pks.contains(&column.name.as_str()) {
                column.is_primary_key = true;
                column.nullable = false;
            }
            column
        })
        .collect();
    table.primary_keys = pks.iter().map(|pk| pk.to_string()).collect();
    table.foreign_keys_outgoing = fks;
    table
}

/// `users(id, name, manager_id -> users.id)`
pub fn users() -> Table {
    table(
        "users",
        vec![int("id"), text("name"), int("manager_id")],
        &["id"],
        vec![fk(
            "users_manager_id_fkey",
            "public.users",
            "manager_id",
            "public.users",
            "id",
        )],
    )
}

/// `orders(id, user_id -> users.id, created_at)`
pub fn orders() -> Table {
    table(
        "orders",
        vec![
            int("id"),
            int("user_id"),
            column("created_at", "timestamp without time zone", "timestamp"),
        ],
        &["id"],
        vec![fk(
            "orders_user_id_fkey",
            "public.orders",
            "user_id",
            "public.users",
            "id",
        )],
    )
}

pub fn user_row(id: i64, name: &str, manager: Option<i64>) -> Vec<Value> {
    vec![
        Value::Int(id),
        Value::from(name),
        manager.map_or(Value::Null, Value::Int),
    ]
}

pub fn key(value: &str) -> Vec<Value> {
    vec![Value::from(value)]
}

pub const FETCH_USER: &str = r#"FROM "public"."users" WHERE "id" = $1::integer"#;
pub const FETCH_ORDER: &str = r#"FROM "public"."orders" WHERE "id" = $1::integer"#;
pub const REPORTS_OF: &str = r#"SELECT "id" FROM "public"."users" WHERE "manager_id" = $1::integer"#;
pub const ORDERS_OF: &str = r#"SELECT "id" FROM "public"."orders" WHERE "user_id" = $1::integer"#;
