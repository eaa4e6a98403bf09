#![allow(dead_code)]

use std::collections::BTreeMap;

use pgslice_core::{Column, FkAction, ForeignKey, RecordData, RecordIdentifier, Table, Value};

pub fn column(name: &str, data_type: &str, udt_name: &str, nullable: bool) -> Column {
    Column {
        name: name.to_string(),
        data_type: data_type.to_string(),
        udt_name: udt_name.to_string(),
        nullable,
        default: None,
        is_primary_key: false,
        is_auto_generated: false,
    }
}

/// `serial` primary key.
pub fn serial(name: &str) -> Column {
    Column {
        is_primary_key: true,
        is_auto_generated: true,
        default: Some(format!("nextval('{name}_seq'::regclass)")),
        ..column(name, "integer", "int4", false)
    }
}

pub fn int(name: &str) -> Column {
    column(name, "integer", "int4", true)
}

pub fn text(name: &str, nullable: bool) -> Column {
    column(name, "text", "text", nullable)
}

pub fn fk(table: &str, column: &str, target: &str) -> ForeignKey {
    ForeignKey {
        constraint_name: format!("{table}_{column}_fkey"),
        source_table: format!("public.{table}"),
        source_column: column.to_string(),
        target_table: format!("public.{target}"),
        target_column: "id".to_string(),
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

/// `users(id serial, email unique)`
pub fn users() -> Table {
    let mut users = table("users", vec![serial("id"), text("email", false)], &["id"], vec![]);
    users
        .unique_constraints
        .insert("users_email_key".to_string(), vec!["email".to_string()]);
    users
}

/// `users` plus `manager_id -> users.id`.
pub fn managed_users() -> Table {
    let mut users = users();
    users.columns.push(int("manager_id"));
    users.foreign_keys_outgoing = vec![fk("users", "manager_id", "users")];
    users
}

/// `posts(id serial, user_id -> users.id, slug)`; rows are recognised by `slug`.
pub fn posts() -> Table {
    table(
        "posts",
        vec![serial("id"), int("user_id"), text("slug", false)],
        &["id"],
        vec![fk("posts", "user_id", "users")],
    )
}

/// `tags(id integer, name)` with a caller-assigned key.
pub fn tags() -> Table {
    table("tags", vec![int("id"), text("name", true)], &["id"], vec![])
}

pub fn id(table: &str, pk: i64) -> RecordIdentifier {
    RecordIdentifier::new("public", table, [pk.to_string()])
}

pub fn row(table: &str, pk: i64, values: &[(&str, Value)]) -> RecordData {
    let mut data: BTreeMap<String, Value> = values
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    data.entry("id".to_string()).or_insert(Value::Int(pk));
    RecordData::new(id(table, pk), data)
}

pub fn user(pk: i64, email: &str) -> RecordData {
    row("users", pk, &[("email", Value::from(email))])
}

pub fn post(pk: i64, user_pk: i64, slug: &str) -> RecordData {
    row(
        "posts",
        pk,
        &[("user_id", Value::Int(user_pk)), ("slug", Value::from(slug))],
    )
    .with_dependency(id("users", user_pk))
}

pub fn tag(pk: i64, name: &str) -> RecordData {
    row("tags", pk, &[("name", Value::from(name))])
}
