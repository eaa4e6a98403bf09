use std::fmt::Write as _;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use pgslice_core::{parse_related_filters, split_qualified, Table, TimeframeFilter};
use pgslice_dump::{write_to_file, write_to_stdout, DumpRequest, DumpService, NaturalKeyOverrides, SeedSelection};
use pgslice_introspect::{ConnectionManager, PostgresAdapter, SchemaSource};

use crate::config::{resolve_password, AppConfig};
use crate::errors::{config_error, CliResult};

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Table holding the seed rows (`table` or `schema.table`).
    #[arg(long)]
    pub table: String,
    /// Comma-separated primary-key values.
    #[arg(long, conflicts_with = "timeframe", required_unless_present = "timeframe")]
    pub pks: Option<String>,
    /// Seed with every row of the table inside `column:start:end`.
    #[arg(long, value_name = "COLUMN:START:END")]
    pub timeframe: Option<String>,
    /// Also follow rows that reference collected rows.
    #[arg(long, default_value_t = false)]
    pub wide: bool,
    /// Insert primary keys as they are instead of remapping generated ones.
    #[arg(long, default_value_t = false)]
    pub keep_pks: bool,
    /// Prepend CREATE statements for every dumped table.
    #[arg(long, default_value_t = false)]
    pub create_schema: bool,
    /// Time window for a related table, `table[:column]:start:end`.
    #[arg(long = "truncate", value_name = "SPEC")]
    pub truncate: Vec<String>,
    #[arg(long)]
    pub max_depth: Option<usize>,
    /// Columns identifying rows of a table, `table=col1,col2`.
    #[arg(long = "natural-keys", value_name = "SPEC")]
    pub natural_keys: Vec<String>,
    /// Rows per INSERT; 0 or less writes one statement per table.
    #[arg(long)]
    pub batch_size: Option<i64>,
    /// Leave out BEGIN/COMMIT.
    #[arg(long, default_value_t = false)]
    pub no_transaction: bool,
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
    /// Print the tables of the dump and their references to stderr.
    #[arg(long, default_value_t = false)]
    pub graph: bool,
}

/// Split `--pks`, trimming each entry; empty entries are rejected.
pub fn parse_pks(raw: &str) -> CliResult<Vec<String>> {
    let pks: Vec<String> = raw.split(',').map(|pk| pk.trim().to_string()).collect();
    if pks.iter().any(String::is_empty) {
        return Err(config_error(format!(
            "Invalid --pks value {raw:?}: empty primary key"
        )));
    }
    Ok(pks)
}

/// Everything about the request that does not need the database.
pub fn build_request(args: &DumpArgs, config: &AppConfig) -> CliResult<DumpRequest> {
    let seeds = match (&args.pks, &args.timeframe) {
        (Some(pks), None) => SeedSelection::Pks(parse_pks(pks)?),
        (None, Some(spec)) => {
            let (_, table) = split_qualified(&args.table, &config.schema);
            SeedSelection::Timeframe(TimeframeFilter::parse_main(table, spec)?)
        }
        _ => return Err(config_error("Pass exactly one of --pks or --timeframe")),
    };

    Ok(DumpRequest {
        schema: config.schema.clone(),
        wide: args.wide,
        keep_pks: args.keep_pks,
        create_schema: args.create_schema,
        timeframe_filters: parse_related_filters(args.truncate.as_slice())?,
        max_depth: args.max_depth.or(config.max_depth),
        batch_size: args.batch_size.unwrap_or(config.sql_batch_size),
        include_transaction: !args.no_transaction,
        natural_keys: NaturalKeyOverrides::parse(args.natural_keys.as_slice())?,
        ..DumpRequest::new(args.table.clone(), seeds)
    })
}

async fn connect(config: &AppConfig) -> CliResult<(ConnectionManager, PostgresAdapter)> {
    let hint = format!("{}@{}:{}/{}", config.user, config.host, config.port, config.database);
    let params = config.connection_params(resolve_password(&hint)?)?;
    let mut manager = ConnectionManager::new(params, config.connection_ttl());
    let adapter = manager.adapter().await?;
    Ok((manager, adapter))
}

pub async fn dump(config: &AppConfig, args: &DumpArgs) -> CliResult<()> {
    let mut request = build_request(args, config)?;
    request.show_progress = std::io::stderr().is_terminal();
    let (mut manager, adapter) = connect(config).await?;
    if request.create_schema {
        request.database_name = Some(adapter.database_name().await?);
    }

    let result = DumpService::new(&adapter, &adapter).dump(&request).await;
    manager.close().await;
    let result = result?;

    if result.is_empty() {
        eprintln!("No records found matching the timeframe");
        return Ok(());
    }
    if args.graph {
        eprintln!("{}\n", result.graph.render());
    }

    match &args.output {
        Some(path) => {
            write_to_file(path, &result.sql)?;
            eprintln!(
                "Wrote {} records from {} tables to {}",
                result.record_count,
                result.tables_involved.len(),
                path.display()
            );
        }
        None => {
            write_to_stdout(&result.sql)?;
            eprintln!(
                "Dumped {} records from {} tables",
                result.record_count,
                result.tables_involved.len()
            );
        }
    }
    info!(records = result.record_count, tables = ?result.tables_involved, "dump finished");
    Ok(())
}

pub async fn tables(config: &AppConfig) -> CliResult<()> {
    let (mut manager, adapter) = connect(config).await?;
    let names = adapter.get_all_tables(&config.schema).await;
    manager.close().await;
    print!("{}", format_table_list(&config.schema, &names?));
    Ok(())
}

pub async fn describe(config: &AppConfig, table: &str) -> CliResult<()> {
    let (schema, table) = split_qualified(table, &config.schema);
    let (mut manager, adapter) = connect(config).await?;
    let meta = adapter.get_table_metadata(schema, table).await;
    manager.close().await;
    print!("{}", describe_table(&meta?));
    Ok(())
}

pub fn format_table_list(schema: &str, names: &[String]) -> String {
    let mut out = format!("Tables in schema '{schema}':\n");
    for name in names {
        let _ = writeln!(out, "  {name}");
    }
    let _ = writeln!(out, "\nTotal: {} tables", names.len());
    out
}

pub fn describe_table(table: &Table) -> String {
    let mut out = format!("Table: {}\n\nColumns:\n", table.full_name());
    for column in &table.columns {
        let mut markers = Vec::new();
        if column.is_primary_key {
            markers.push("PK");
        }
        if column.is_auto_generated {
            markers.push("auto");
        }
        let _ = write!(
            out,
            "  {} {} {}",
            column.name,
            column.sql_type(),
            if column.nullable { "NULL" } else { "NOT NULL" }
        );
        if let Some(default) = &column.default {
            let _ = write!(out, " DEFAULT {default}");
        }
        if !markers.is_empty() {
            let _ = write!(out, " [{}]", markers.join(", "));
        }
        out.push('\n');
    }

    if !table.primary_keys.is_empty() {
        let _ = writeln!(out, "\nPrimary key: ({})", table.primary_keys.join(", "));
    }
    if !table.unique_constraints.is_empty() {
        out.push_str("\nUnique constraints:\n");
        for (name, columns) in &table.unique_constraints {
            let _ = writeln!(out, "  {name} ({})", columns.join(", "));
        }
    }
    if !table.foreign_keys_outgoing.is_empty() {
        out.push_str("\nForeign keys (outgoing):\n");
        for fk in &table.foreign_keys_outgoing {
            let _ = writeln!(
                out,
                "  {}: {} -> {}.{} ON DELETE {}",
                fk.constraint_name,
                fk.source_column,
                fk.target_table,
                fk.target_column,
                fk.on_delete.as_sql()
            );
        }
    }
    if !table.foreign_keys_incoming.is_empty() {
        out.push_str("\nForeign keys (incoming):\n");
        for fk in &table.foreign_keys_incoming {
            let _ = writeln!(
                out,
                "  {}: {}.{} -> {}",
                fk.constraint_name, fk.source_table, fk.source_column, fk.target_column
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use pgslice_core::{Column, Error, FkAction, ForeignKey};

    use super::*;

    fn args(pks: Option<&str>, timeframe: Option<&str>) -> DumpArgs {
        DumpArgs {
            table: "orders".to_string(),
            pks: pks.map(str::to_string),
            timeframe: timeframe.map(str::to_string),
            wide: false,
            keep_pks: false,
            create_schema: false,
            truncate: Vec::new(),
            max_depth: None,
            natural_keys: Vec::new(),
            batch_size: None,
            no_transaction: false,
            output: None,
            graph: false,
        }
    }

    #[test]
    fn pks_are_trimmed_and_must_not_be_empty() {
        assert_eq!(parse_pks(" 1, 2 ,3").unwrap(), vec!["1", "2", "3"]);
        assert!(parse_pks("1,,2").is_err());
        assert!(parse_pks("").is_err());
    }

    #[test]
    fn request_takes_config_fallbacks() {
        let config = AppConfig {
            max_depth: Some(4),
            sql_batch_size: 50,
            schema: "sales".to_string(),
            ..AppConfig::default()
        };
        let request = build_request(&args(Some("7,8"), None), &config).unwrap();

        assert_eq!(request.seeds, SeedSelection::Pks(vec!["7".to_string(), "8".to_string()]));
        assert_eq!(request.schema, "sales");
        assert_eq!(request.max_depth, Some(4));
        assert_eq!(request.batch_size, 50);
        assert!(request.include_transaction);
        assert!(request.database_name.is_none());
        assert!(!request.show_progress);
    }

    #[test]
    fn flags_win_over_config() {
        let mut dump = args(None, Some("created_at:2024-01-01:2024-02-01"));
        dump.max_depth = Some(1);
        dump.batch_size = Some(0);
        dump.no_transaction = true;
        dump.truncate = vec!["payments:2024-01-01:2024-01-31".to_string()];
        dump.natural_keys = vec!["roles=name".to_string()];

        let request = build_request(&dump, &AppConfig::default()).unwrap();

        assert!(matches!(request.seeds, SeedSelection::Timeframe(ref filter) if filter.column_name == "created_at"));
        assert_eq!(request.max_depth, Some(1));
        assert_eq!(request.batch_size, 0);
        assert!(!request.include_transaction);
        assert_eq!(request.timeframe_filters.len(), 1);
        assert_eq!(request.timeframe_filters[0].column_name, "created_at");
        assert_eq!(request.natural_keys.lookup("public", "roles"), Some(&["name".to_string()][..]));
    }

    #[test]
    fn bad_filters_are_rejected() {
        let mut dump = args(Some("1"), None);
        dump.truncate = vec!["payments".to_string()];
        let err = build_request(&dump, &AppConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::CliError::Core(Error::InvalidTimeframe(_))
        ));
    }

    #[test]
    fn lists_tables() {
        assert_eq!(
            format_table_list("public", &["orders".to_string(), "users".to_string()]),
            "Tables in schema 'public':\n  orders\n  users\n\nTotal: 2 tables\n"
        );
    }

    #[test]
    fn describes_columns_and_keys() {
        let mut table = Table::new("public", "orders");
        table.columns = vec![
            Column {
                name: "id".to_string(),
                data_type: "integer".to_string(),
                udt_name: "int4".to_string(),
                nullable: false,
                default: Some("nextval('orders_id_seq'::regclass)".to_string()),
                is_primary_key: true,
                is_auto_generated: true,
            },
            Column {
                name: "user_id".to_string(),
                data_type: "integer".to_string(),
                udt_name: "int4".to_string(),
                nullable: true,
                default: None,
                is_primary_key: false,
                is_auto_generated: false,
            },
        ];
        table.primary_keys = vec!["id".to_string()];
        table.foreign_keys_outgoing = vec![ForeignKey {
            constraint_name: "orders_user_id_fkey".to_string(),
            source_table: "public.orders".to_string(),
            source_column: "user_id".to_string(),
            target_table: "public.users".to_string(),
            target_column: "id".to_string(),
            on_delete: FkAction::Cascade,
        }];

        let text = describe_table(&table);

        assert!(text.starts_with("Table: public.orders\n"));
        assert!(text.contains("  id integer NOT NULL DEFAULT nextval('orders_id_seq'::regclass) [PK, auto]\n"));
        assert!(text.contains("  user_id integer NULL\n"));
        assert!(text.contains("Primary key: (id)"));
        assert!(text.contains("orders_user_id_fkey: user_id -> public.users.id ON DELETE CASCADE"));
    }
}
