//! schema-rules CLI - plan, apply and check the physical schema of logical tables.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use schema_rules::{
    CheckStatus, CheckSummary, Config, ExecutionContext, NoOpBackfill, PgIntrospector, PgPool,
    PgTransaction, SchemaCheckResult, SchemaChecker, SchemaError, SchemaRepository, Statement,
    Table,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit code when a check is interrupted (128 + SIGINT).
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "schema-rules")]
#[command(about = "Plan, apply and check the physical schema of logical tables")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the statements apply (or drop) would execute, without connecting
    Plan {
        /// YAML or JSON file with the table definitions
        #[arg(long)]
        tables: PathBuf,

        /// Plan dropping the tables instead of creating them
        #[arg(long)]
        down: bool,
    },

    /// Create the tables and their fields in one transaction
    Apply {
        /// YAML or JSON file with the table definitions
        #[arg(long)]
        tables: PathBuf,
    },

    /// Compare the tables with the live database
    Check {
        /// YAML or JSON file with the table definitions
        #[arg(long)]
        tables: PathBuf,

        /// Only check this field id
        #[arg(long)]
        field: Option<String>,
    },

    /// Drop the tables in one transaction
    Drop {
        /// YAML or JSON file with the table definitions
        #[arg(long)]
        tables: PathBuf,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, SchemaError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };
    let repo = SchemaRepository::new(
        config.schema.policy(),
        config.schema.metadata_tables(),
        Arc::new(NoOpBackfill::new()),
    );

    match &cli.command {
        Commands::Plan { tables, down } => {
            let tables = load_tables(tables)?;
            let stmts = if *down {
                let mut stmts = Vec::new();
                for table in tables.iter().rev() {
                    stmts.extend(repo.plan_delete(table)?);
                }
                stmts
            } else {
                repo.plan_insert_many(&tables)?.1
            };
            print_statements(&stmts, cli.output_json)?;
        }

        Commands::Apply { tables } => {
            let tables = load_tables(tables)?;
            let pool = PgPool::connect(config.require_database("apply")?).await?;
            let mut client = pool.client().await?;
            let tx = PgTransaction::begin(&mut client).await?;
            let ctx = ExecutionContext::new(&pool).with_transaction(&tx);

            let result = repo.insert_many(&ctx, &tables).await;
            let created = match result {
                Ok(created) => {
                    tx.commit().await?;
                    created
                }
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        warn!("Rollback failed: {}", rollback);
                    }
                    return Err(e);
                }
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&created)?);
            } else {
                println!("Applied {} table(s):", created.len());
                for table in &created {
                    println!("  {} -> {} ({} fields)", table.id, table.db_table_name, table.fields.len());
                }
            }
        }

        Commands::Check { tables, field } => {
            let tables = load_tables(tables)?
                .iter()
                .map(schema_rules::assign_db_field_names)
                .collect::<Result<Vec<_>, _>>()?;
            let pool = PgPool::connect(config.require_database("check")?).await?;
            let metadata = config.schema.metadata_tables();
            let policy = config.schema.policy();
            let catalog = PgIntrospector::new(&pool, metadata.clone());
            let checker = SchemaChecker::new(&catalog, &metadata, &policy);
            let cancel = setup_signal_handler();

            let outcome = run_check(&checker, &tables, field.as_deref(), &cancel, cli.output_json).await?;
            match outcome {
                CheckOutcome::Cancelled(summary) => {
                    eprintln!("\nCheck cancelled after {} result(s)", summary.total());
                    return Ok(ExitCode::from(EXIT_CANCELLED));
                }
                CheckOutcome::Finished(summary) => {
                    if !cli.output_json {
                        println!(
                            "\nSummary: {} ok, {} error(s), {} warning(s)",
                            summary.success, summary.error, summary.warn
                        );
                    }
                    if summary.has_errors() {
                        return Err(SchemaError::CheckFailed(summary.error));
                    }
                }
            }
        }

        Commands::Drop { tables } => {
            let tables = load_tables(tables)?;
            let pool = PgPool::connect(config.require_database("drop")?).await?;
            let mut client = pool.client().await?;
            let tx = PgTransaction::begin(&mut client).await?;
            let ctx = ExecutionContext::new(&pool).with_transaction(&tx);

            let mut result = Ok(());
            for table in tables.iter().rev() {
                result = repo.delete(&ctx, table).await;
                if result.is_err() {
                    break;
                }
            }
            match result {
                Ok(()) => tx.commit().await?,
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        warn!("Rollback failed: {}", rollback);
                    }
                    return Err(e);
                }
            }
            if !cli.output_json {
                println!("Dropped {} table(s)", tables.len());
            }
        }

        Commands::HealthCheck => {
            let start = Instant::now();
            let db = config.require_database("health-check")?;
            let pool = PgPool::connect(db).await?;
            pool.health_check().await?;
            let latency_ms = start.elapsed().as_millis() as u64;

            if cli.output_json {
                let result = serde_json::json!({
                    "connected": true,
                    "target": db.display_target(),
                    "latency_ms": latency_ms,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!("  PostgreSQL {}: OK ({}ms)", db.display_target(), latency_ms);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// How a check run ended.
enum CheckOutcome {
    Finished(CheckSummary),
    Cancelled(CheckSummary),
}

async fn run_check<'a>(
    checker: &SchemaChecker<'a>,
    tables: &'a [Table],
    field: Option<&str>,
    cancel: &CancellationToken,
    output_json: bool,
) -> Result<CheckOutcome, SchemaError> {
    let mut summary = CheckSummary::default();

    let targets: Vec<&Table> = match field {
        // An unknown field id is reported by the checker against the first table.
        Some(field_id) => tables
            .iter()
            .find(|t| t.field(field_id).is_some())
            .or_else(|| tables.first())
            .into_iter()
            .collect(),
        None => tables.iter().collect(),
    };

    for table in targets {
        if !output_json {
            println!("{} ({})", table.name, table.db_table_name);
        }
        let mut results = match field {
            Some(field_id) => checker.check_field(table, field_id),
            None => checker.check_table(table),
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(CheckOutcome::Cancelled(summary)),
                next = results.next() => match next {
                    Some(result) => {
                        summary.record(&result);
                        print_result(&result, output_json)?;
                    }
                    None => break,
                },
            }
        }
    }

    Ok(CheckOutcome::Finished(summary))
}

fn print_result(result: &SchemaCheckResult, output_json: bool) -> Result<(), SchemaError> {
    if output_json {
        println!("{}", serde_json::to_string(result)?);
        return Ok(());
    }
    let marker = match result.status {
        CheckStatus::Success => "✓",
        CheckStatus::Error => "✗",
        CheckStatus::Warn => "!",
        CheckStatus::Pending | CheckStatus::Running => return Ok(()),
    };
    let indent = "  ".repeat(result.depth + 1);
    match &result.message {
        Some(message) => println!("{}{} {} - {}", indent, marker, result.description, message),
        None => println!("{}{} {}", indent, marker, result.description),
    }
    Ok(())
}

fn print_statements(stmts: &[Statement], output_json: bool) -> Result<(), SchemaError> {
    if output_json {
        println!("{}", serde_json::to_string_pretty(stmts)?);
    } else {
        for stmt in stmts {
            println!("{};", stmt);
        }
    }
    Ok(())
}

fn load_tables(path: &Path) -> Result<Vec<Table>, SchemaError> {
    let content = std::fs::read_to_string(path)?;
    // YAML is a superset of JSON, so one parser covers both.
    let tables: Vec<Table> = serde_yaml::from_str(&content)?;
    if tables.is_empty() {
        return Err(SchemaError::Config(format!("No tables defined in {:?}", path)));
    }
    info!("Loaded {} table definition(s) from {:?}", tables.len(), path);
    Ok(tables)
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so planned statements and JSON can be piped.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Stopping...", name);
                    token.cancel();
                });
            }
            Err(e) => warn!("Failed to install {} handler: {}", name, e),
        }
    }

    cancel_token
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping...");
            token.cancel();
        }
    });

    cancel_token
}
