mod common;

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use pgslice_core::{RecordIdentifier, RecordSet, TimeframeFilter, Value, VisitedTracker};
use pgslice_introspect::{InMemorySchema, ScriptedExecutor};
use pgslice_traverse::RelationshipTraverser;

use common::*;

fn user(id: &str) -> RecordIdentifier {
    RecordIdentifier::new("public", "users", [id])
}

fn order(id: &str) -> RecordIdentifier {
    RecordIdentifier::new("public", "orders", [id])
}

fn ids(records: &RecordSet) -> Vec<String> {
    records.iter().map(|record| record.identifier.to_string()).collect()
}

/// 1 <- 2 <- 3 <- 4 along `manager_id`; orders 10 and 11 belong to user 3.
fn hierarchy() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .on(FETCH_USER, key("1"), vec![user_row(1, "ceo", None)])
        .on(FETCH_USER, key("2"), vec![user_row(2, "vp", Some(1))])
        .on(FETCH_USER, key("3"), vec![user_row(3, "lead", Some(2))])
        .on(FETCH_USER, key("4"), vec![user_row(4, "dev", Some(3))])
        .on(REPORTS_OF, key("1"), vec![vec![Value::Int(2)]])
        .on(REPORTS_OF, key("2"), vec![vec![Value::Int(3)]])
        .on(REPORTS_OF, key("3"), vec![vec![Value::Int(4)]])
        .on(
            ORDERS_OF,
            key("3"),
            vec![vec![Value::Int(10)], vec![Value::Int(11)]],
        )
        .on(
            FETCH_ORDER,
            key("10"),
            vec![vec![Value::Int(10), Value::Int(3), Value::Null]],
        )
        .on(
            FETCH_ORDER,
            key("11"),
            vec![vec![Value::Int(11), Value::Int(3), Value::Null]],
        )
}

fn schema() -> InMemorySchema {
    InMemorySchema::from_tables([users(), orders()])
}

#[tokio::test]
async fn depth_zero_returns_only_the_seed() {
    let schema = schema();
    let db = hierarchy();
    let mut traverser = RelationshipTraverser::new(&schema, &db).wide_mode(true);

    let records = traverser.traverse("users", "3", "public", Some(0)).await.unwrap();

    assert_eq!(ids(&records), vec!["public.users(3)"]);
    assert_eq!(db.calls().len(), 1);
}

#[tokio::test]
async fn deeper_walks_never_lose_rows() {
    let schema = schema();
    let mut previous: Vec<RecordIdentifier> = Vec::new();
    let mut sizes = Vec::new();

    for depth in [Some(0), Some(1), Some(2), None] {
        let db = hierarchy();
        let mut traverser = RelationshipTraverser::new(&schema, &db).wide_mode(true);
        let records = traverser.traverse("users", "3", "public", depth).await.unwrap();

        for identifier in &previous {
            assert!(records.contains(identifier), "depth {depth:?} lost {identifier}");
        }
        previous = records.iter().map(|record| record.identifier.clone()).collect();
        sizes.push(records.len());
    }

    assert_eq!(sizes, vec![1, 5, 6, 6]);
}

#[tokio::test]
async fn strict_mode_follows_the_manager_chain_only() {
    let schema = schema();
    let db = hierarchy();
    let mut traverser = RelationshipTraverser::new(&schema, &db);

    let records = traverser.traverse("users", "3", "public", None).await.unwrap();

    assert_eq!(
        ids(&records),
        vec!["public.users(3)", "public.users(2)", "public.users(1)"]
    );
    assert!(records.get(&user("3")).unwrap().dependencies.contains(&user("2")));
    assert!(records.get(&user("2")).unwrap().dependencies.contains(&user("1")));
    assert!(records.get(&user("1")).unwrap().dependencies.is_empty());
    assert_eq!(db.count_calls(REPORTS_OF), 0);
    assert_eq!(db.count_calls(ORDERS_OF), 0);
}

#[tokio::test]
async fn wide_mode_adds_referencing_rows() {
    let schema = schema();
    let db = hierarchy();
    let mut traverser = RelationshipTraverser::new(&schema, &db).wide_mode(true);

    let records = traverser
        .traverse("public.users", "3", "public", None)
        .await
        .unwrap();

    for expected in [user("1"), user("2"), user("3"), user("4"), order("10"), order("11")] {
        assert!(records.contains(&expected), "missing {expected}");
    }
    assert_eq!(records.len(), 6);
    assert!(records.get(&user("4")).unwrap().dependencies.contains(&user("3")));
    assert!(records.get(&order("10")).unwrap().dependencies.contains(&user("3")));
    assert!(records.get(&order("11")).unwrap().dependencies.contains(&user("3")));
}

#[tokio::test]
async fn timeframe_filter_narrows_referencing_rows() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 12, 31)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let filter = TimeframeFilter::new("orders", "created_at", start, end).unwrap();

    let schema = schema();
    let db = ScriptedExecutor::new()
        .on(
            r#"WHERE "user_id" = $1::integer AND "created_at" BETWEEN $2 AND $3"#,
            vec![Value::from("3"), Value::Timestamp(start), Value::Timestamp(end)],
            vec![vec![Value::Int(10)]],
        )
        .on(FETCH_USER, key("3"), vec![user_row(3, "lead", None)])
        .on(
            FETCH_ORDER,
            key("10"),
            vec![vec![Value::Int(10), Value::Int(3), Value::Null]],
        );
    let mut traverser = RelationshipTraverser::new(&schema, &db)
        .wide_mode(true)
        .with_timeframe_filters(vec![filter]);

    let records = traverser.traverse("users", "3", "public", None).await.unwrap();

    assert!(records.contains(&order("10")));
    assert!(!records.contains(&order("11")));
    let (_, params) = db
        .calls()
        .into_iter()
        .find(|(sql, _)| sql.contains("BETWEEN"))
        .unwrap();
    assert_eq!(params.len(), 3);
}

#[tokio::test]
async fn shared_ancestors_are_collected_once() {
    let schema = schema();
    let db = hierarchy();
    let mut traverser = RelationshipTraverser::new(&schema, &db);

    let records = traverser
        .traverse_multiple("users", &["3", "4"], "public", None)
        .await
        .unwrap();

    assert_eq!(records.len(), 4);
    let fetches_of_root = db
        .calls()
        .into_iter()
        .filter(|(sql, params)| sql.contains(FETCH_USER) && *params == key("1"))
        .count();
    assert_eq!(fetches_of_root, 1);
    assert!(records.get(&user("4")).unwrap().dependencies.contains(&user("3")));
}

#[tokio::test]
async fn missing_seed_is_skipped() {
    let schema = schema();
    let db = hierarchy();
    let mut traverser = RelationshipTraverser::new(&schema, &db);

    let records = traverser.traverse("users", "99", "public", None).await.unwrap();

    assert!(records.is_empty());
    assert!(!traverser.visited().is_visited(&user("99")));
}

#[tokio::test]
async fn visited_seed_is_not_fetched_again() {
    let schema = schema();
    let db = hierarchy();
    let mut visited = VisitedTracker::new();
    visited.mark_visited(user("3"));
    let mut traverser = RelationshipTraverser::new(&schema, &db).with_visited(visited);

    let records = traverser.traverse("users", "3", "public", None).await.unwrap();

    assert!(records.is_empty());
    assert!(db.calls().is_empty());
}

#[tokio::test]
async fn unknown_seed_table_is_an_error() {
    let schema = schema();
    let db = hierarchy();
    let mut traverser = RelationshipTraverser::new(&schema, &db);

    let err = traverser
        .traverse("invoices", "1", "public", None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("public.invoices"));
}

#[tokio::test]
async fn references_into_tables_without_keys_are_skipped() {
    let audit = table("audit_log", vec![int("event_id"), text("note")], &[], vec![]);
    let events = table(
        "events",
        vec![int("id"), int("audit_id")],
        &["id"],
        vec![fk(
            "events_audit_fkey",
            "public.events",
            "audit_id",
            "public.audit_log",
            "event_id",
        )],
    );
    let schema = InMemorySchema::from_tables([audit, events]);
    let db = ScriptedExecutor::new().on(
        r#"FROM "public"."events" WHERE "id" = $1::integer"#,
        key("5"),
        vec![vec![Value::Int(5), Value::Int(7)]],
    );
    let mut traverser = RelationshipTraverser::new(&schema, &db);

    let records = traverser.traverse("events", "5", "public", None).await.unwrap();

    assert_eq!(ids(&records), vec!["public.events(5)"]);
    assert_eq!(db.calls().len(), 1);
}

#[tokio::test]
async fn progress_reports_a_growing_count() {
    let schema = schema();
    let db = hierarchy();
    let seen = Arc::new(Mutex::new(Vec::<usize>::new()));
    let sink = Arc::clone(&seen);
    let mut traverser = RelationshipTraverser::new(&schema, &db)
        .with_progress(Box::new(move |count: usize| sink.lock().unwrap().push(count)));

    traverser.traverse("users", "3", "public", None).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn table_metadata_is_loaded_once_per_table() {
    let schema = schema();
    let db = hierarchy();
    let mut traverser = RelationshipTraverser::new(&schema, &db);

    traverser.traverse("users", "3", "public", None).await.unwrap();

    assert_eq!(schema.metadata_calls(), 1);
}

#[tokio::test]
async fn composite_children_keep_their_full_key() {
    let items = table(
        "order_items",
        vec![int("order_id"), int("line_no"), text("sku")],
        &["order_id", "line_no"],
        vec![fk(
            "order_items_order_id_fkey",
            "public.order_items",
            "order_id",
            "public.orders",
            "id",
        )],
    );
    let schema = InMemorySchema::from_tables([users(), orders(), items]);
    let item_fetch =
        r#"FROM "public"."order_items" WHERE "order_id" = $1::integer AND "line_no" = $2::integer"#;
    let db = hierarchy()
        .on(
            r#"SELECT "order_id", "line_no" FROM "public"."order_items" WHERE "order_id" = $1::integer"#,
            key("10"),
            vec![
                vec![Value::Int(10), Value::Int(1)],
                vec![Value::Int(10), Value::Int(2)],
            ],
        )
        .on(
            item_fetch,
            vec![Value::from("10"), Value::from("1")],
            vec![vec![Value::Int(10), Value::Int(1), Value::from("A-1")]],
        )
        .on(
            item_fetch,
            vec![Value::from("10"), Value::from("2")],
            vec![vec![Value::Int(10), Value::Int(2), Value::from("B-2")]],
        );
    let mut traverser = RelationshipTraverser::new(&schema, &db).wide_mode(true);

    let records = traverser.traverse("orders", "10", "public", Some(1)).await.unwrap();

    let first = RecordIdentifier::new("public", "order_items", ["10", "1"]);
    let second = RecordIdentifier::new("public", "order_items", ["10", "2"]);
    assert!(records.contains(&first));
    assert!(records.contains(&second));
    assert!(records.contains(&user("3")));
    assert_eq!(records.len(), 4);
    assert!(records.get(&second).unwrap().dependencies.contains(&order("10")));
    assert!(records.get(&order("10")).unwrap().dependencies.contains(&user("3")));
}
