use anyhow::{anyhow, Context, Result};
use pgslice_core::{Error, FkAction, Value};
use pgslice_introspect::{PostgresAdapter, QueryExecutor, SchemaSource};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;

const FIXTURE: &str = include_str!("fixtures/shop.sql");

fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok()
}

async fn load_fixture(pool: &PgPool) -> Result<()> {
    for statement in FIXTURE.split(';') {
        let sql = statement.trim();
        if sql.is_empty() {
            continue;
        }

        sqlx::query(sql)
            .execute(pool)
            .await
            .with_context(|| format!("executing fixture statement {sql}"))?;
    }

    Ok(())
}

async fn connect() -> Result<Option<PgPool>> {
    let Some(db_url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL for integration tests");
        return Ok(None);
    };
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&db_url)
        .await
        .context("connecting to Postgres")?;
    load_fixture(&pool).await?;
    Ok(Some(pool))
}

#[tokio::test]
async fn introspects_keys_and_relationships() -> Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    let adapter = PostgresAdapter::new(pool);

    let users = adapter.get_table_metadata("pgslice_it", "users").await?;
    let names: Vec<&str> = users.columns.iter().map(|col| col.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["id", "email", "manager_id", "mood", "balance", "tags", "created_at"]
    );
    assert_eq!(users.primary_keys, vec!["id"]);

    let id = users.column("id").ok_or_else(|| anyhow!("id column missing"))?;
    assert!(id.is_auto_generated);
    let mood = users.column("mood").ok_or_else(|| anyhow!("mood column missing"))?;
    assert_eq!(mood.data_type, "USER-DEFINED");
    assert_eq!(mood.udt_name, "mood");
    let tags = users.column("tags").ok_or_else(|| anyhow!("tags column missing"))?;
    assert_eq!(tags.data_type, "ARRAY");
    assert_eq!(tags.udt_name, "_text");

    assert_eq!(
        users.unique_constraints.get("users_email_key"),
        Some(&vec!["email".to_string()])
    );
    assert!(users
        .foreign_keys_outgoing
        .iter()
        .any(|fk| fk.is_self_referencing() && fk.source_column == "manager_id"));
    assert!(users
        .foreign_keys_incoming
        .iter()
        .any(|fk| fk.source_table == "pgslice_it.orders" && fk.on_delete == FkAction::Cascade));

    let orders = adapter.get_table_metadata("pgslice_it", "orders").await?;
    let order_id = orders.column("id").ok_or_else(|| anyhow!("orders.id missing"))?;
    assert!(order_id.is_auto_generated, "identity columns are generated");

    let roles = adapter.get_table_metadata("pgslice_it", "user_roles").await?;
    assert_eq!(roles.primary_keys, vec!["user_id", "role_id"]);
    assert!(roles.auto_generated_primary_keys().is_empty());

    let tables = adapter.get_all_tables("pgslice_it").await?;
    assert_eq!(tables, vec!["orders", "user_roles", "users"]);

    Ok(())
}

#[tokio::test]
async fn reports_missing_tables_and_unsafe_names() -> Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    let adapter = PostgresAdapter::new(pool);

    let missing = adapter
        .get_table_metadata("pgslice_it", "ghosts")
        .await
        .expect_err("missing table must fail");
    assert!(missing.to_string().contains("not found or has no columns"));

    let unsafe_name = adapter
        .get_table_metadata("pgslice_it", "users;--")
        .await
        .expect_err("unsafe identifier must fail");
    assert!(matches!(unsafe_name, Error::Security(_)));

    Ok(())
}

#[tokio::test]
async fn decodes_rows_into_values() -> Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    let adapter = PostgresAdapter::new(pool);

    let rows = adapter
        .query(
            r#"select "email", "balance"::text as "balance", "tags", "manager_id"
               from "pgslice_it"."users" where "id" = $1::integer"#,
            &[Value::from("1")],
        )
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::from("alice@example.com"));
    assert_eq!(
        rows[0][1],
        Value::Text("12345678901234567890.0123456789".to_string())
    );
    assert_eq!(
        rows[0][2],
        Value::Array(vec![Value::from("a"), Value::from("b")])
    );
    assert_eq!(rows[0][3], Value::Null);

    let payload = adapter
        .query(
            r#"select "payload" from "pgslice_it"."orders" where "user_id" = $1::integer"#,
            &[Value::Int(1)],
        )
        .await?;
    assert_eq!(
        payload[0][0],
        Value::Json(serde_json::json!({ "items": 2 }))
    );

    Ok(())
}
