//! txt2sql CLI - introspect databases, index schemas, generate SQL
//!
//! Usage:
//!   txt2sql tables
//!   txt2sql extract <table>
//!   txt2sql index <table>
//!   txt2sql context <table>...
//!   txt2sql ask <question> (--namespace <ns> | --table <table>...)
//!   txt2sql recommend (--namespace <ns> | --table <table>...) [--focus <text>]
//!   txt2sql exec <sql>
//!
//! The database comes from `--connection <name>` in the settings file, from
//! `--dialect`/`--database` flags, or from `TXT2SQL_DB_*` variables.
//!
//! Examples:
//!   txt2sql --dialect sqlite --database shop.db index orders
//!   txt2sql --connection warehouse context customers orders
//!   txt2sql ask "Top 5 customers by revenue" --namespace mysql_shop__629a4166d4d0efb2

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use txt2sql::config::{ConnectionSpec, Settings};
use txt2sql::schema::{Namespace, NamespaceKeyer};
use txt2sql::service::{ApiResponse, SchemaService, Txt2SqlService};
use txt2sql::sql::Dialect;

#[derive(Parser)]
#[command(name = "txt2sql")]
#[command(about = "Multi-dialect schema introspection and retrieval-augmented text to SQL")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to TXT2SQL_CONFIG, ./txt2sql.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    conn: ConnArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnArgs {
    /// Named connection from the settings file
    #[arg(short, long, global = true)]
    connection: Option<String>,

    /// Database dialect (postgresql, mysql, oracle, sqlite)
    #[arg(long, global = true)]
    dialect: Option<Dialect>,

    /// Server hostname
    #[arg(long, global = true)]
    host: Option<String>,

    /// Server port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Username; the password is read from TXT2SQL_DB_PASSWORD
    #[arg(long, global = true)]
    user: Option<String>,

    /// Database name, Oracle service name, or SQLite file path
    #[arg(long, global = true)]
    database: Option<String>,

    /// Schema (owner on Oracle)
    #[arg(long, global = true)]
    schema: Option<String>,
}

#[derive(Args)]
struct NamespaceArgs {
    /// Namespace returned by `index` or `context`
    #[arg(short, long, conflicts_with = "table")]
    namespace: Option<String>,

    /// Derive the namespace from the indexed table(s)
    #[arg(short, long, num_args = 1..)]
    table: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List tables in the schema
    Tables,

    /// Print column metadata for a table
    Extract {
        table: String,
    },

    /// Extract a table and index it under its namespace
    Index {
        table: String,
    },

    /// Extract several tables and index them under one namespace
    Context {
        #[arg(required = true)]
        tables: Vec<String>,
    },

    /// Generate SQL for a question
    Ask {
        question: String,

        #[command(flatten)]
        target: NamespaceArgs,

        /// Completion attempts before giving up
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// Suggest insights for an indexed schema
    Recommend {
        #[command(flatten)]
        target: NamespaceArgs,

        /// Optional focus for the suggestions
        #[arg(long)]
        focus: Option<String>,
    },

    /// Run a SQL statement and print the rows
    Exec {
        sql: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TXT2SQL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("loading settings from '{}'", path.display())),
        None => Settings::load().context("loading settings"),
    }
}

fn resolve_connection(settings: &Settings, args: &ConnArgs) -> Result<ConnectionSpec> {
    if let Some(name) = &args.connection {
        let mut spec = settings.get_connection(name)?.resolve()?;
        if let Some(schema) = &args.schema {
            spec.schema_name = Some(schema.clone());
        }
        return Ok(spec);
    }

    match (args.dialect, &args.database) {
        (Some(dialect), Some(database)) => {
            let mut spec = ConnectionSpec::new(dialect, args.host.clone().unwrap_or_default(), database);
            spec.port = args.port;
            spec.username = args.user.clone();
            spec.password = std::env::var("TXT2SQL_DB_PASSWORD").ok();
            spec.schema_name = args.schema.clone();
            Ok(spec)
        }
        (Some(_), None) => bail!("--database is required with --dialect"),
        (None, _) => ConnectionSpec::from_env()
            .context("no connection given; use --connection, --dialect/--database, or TXT2SQL_DB_* variables"),
    }
}

fn resolve_namespace(
    settings: &Settings,
    conn: &ConnArgs,
    target: &NamespaceArgs,
) -> Result<Namespace> {
    if let Some(ns) = &target.namespace {
        return Ok(Namespace::new(ns.clone()));
    }
    if target.table.is_empty() {
        bail!("either --namespace or --table is required");
    }
    let spec = resolve_connection(settings, conn)?;
    let keyer = NamespaceKeyer::new(spec.dialect, spec.schema()?);
    keyer
        .tables(&target.table)
        .context("at least one table is required")
}

async fn run(cli: Cli) -> Result<ApiResponse> {
    let settings = load_settings(cli.config.as_ref())?;
    let schema = SchemaService::new(settings.timeouts.database());

    let response = match &cli.command {
        Commands::Tables => {
            let spec = resolve_connection(&settings, &cli.conn)?;
            ApiResponse::from_result(schema.list_tables(&spec).await, ApiResponse::tables)
        }
        Commands::Extract { table } => {
            let spec = resolve_connection(&settings, &cli.conn)?;
            ApiResponse::from_result(schema.extract_schema(&spec, table).await, ApiResponse::schema)
        }
        Commands::Exec { sql } => {
            let spec = resolve_connection(&settings, &cli.conn)?;
            ApiResponse::from_result(schema.execute_query(&spec, sql, &[]).await, ApiResponse::rows)
        }
        Commands::Index { table } => {
            let spec = resolve_connection(&settings, &cli.conn)?;
            let service = Txt2SqlService::from_settings(&settings)?;
            ApiResponse::from_result(service.index_schema(&spec, table).await, ApiResponse::indexed)
        }
        Commands::Context { tables } => {
            let spec = resolve_connection(&settings, &cli.conn)?;
            let service = Txt2SqlService::from_settings(&settings)?;
            ApiResponse::from_result(
                service.create_multitable_context(&spec, tables).await,
                ApiResponse::indexed,
            )
        }
        Commands::Ask {
            question,
            target,
            max_retries,
        } => {
            let namespace = resolve_namespace(&settings, &cli.conn, target)?;
            let service = Txt2SqlService::from_settings(&settings)?;
            ApiResponse::from_result(
                service.generate_sql(question, &namespace, *max_retries).await,
                ApiResponse::generated,
            )
        }
        Commands::Recommend { target, focus } => {
            let namespace = resolve_namespace(&settings, &cli.conn, target)?;
            let service = Txt2SqlService::from_settings(&settings)?;
            ApiResponse::from_result(
                service.recommendations(&namespace, focus.as_deref()).await,
                ApiResponse::generated,
            )
        }
    };

    Ok(response)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(response) => {
            match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: failed to render response: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            if response.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
