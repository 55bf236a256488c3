use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use property_dashboard::{api, config, db, maintenance};

/// Property-management reporting API and maintenance commands
#[derive(Debug, Parser)]
#[command(name = "property_dashboard", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the dashboard JSON API (default)
    Serve,
    /// Replace a table with the contents of <CSV_DIR>/<table>.csv
    ImportCsv {
        /// Destination table, optionally schema-qualified
        table: String,
    },
    /// Create the indexes used by the report queries
    CreateIndexes,
    /// List tables and columns
    ExploreSchema {
        /// Only show this schema
        #[arg(long)]
        schema: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("property_dashboard=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::init()?;
    init_tracing();

    let result = run(cli.command.unwrap_or(Command::Serve), &config).await;

    // Reported once through tracing, then exit non-zero
    if let Some(code) = failure_exit_code(&result) {
        std::process::exit(code);
    }

    Ok(())
}

/// Log a failed run and return the process exit code for it
fn failure_exit_code(result: &Result<()>) -> Option<i32> {
    let err = result.as_ref().err()?;
    tracing::error!("{:#}", err);
    Some(1)
}

async fn run(command: Command, config: &config::Config) -> Result<()> {
    match command {
        Command::Serve => {
            let db = db::init(config).await?;
            api::run_server(config, db).await?;
        }
        Command::ImportCsv { table } => {
            let report = maintenance::import_csv(config, &table).await?;
            println!(
                "Imported {} rows into {} (id sequence at {})",
                report.rows, report.table, report.sequence_value
            );
        }
        Command::CreateIndexes => {
            let created = maintenance::create_indexes(config).await?;
            println!("{} indexes ready", created);
        }
        Command::ExploreSchema { schema } => {
            let tables = maintenance::explore_schema(config, schema.as_deref()).await?;
            print!("{}", maintenance::schema::render(&tables));
            println!("{} tables", tables.len());
        }
    }

    Ok(())
}
