use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use prune_uploads::output::{render_json, render_text};
use prune_uploads::services::RepositoryError;
use prune_uploads::{
    Config, ConfigError, DirExclusions, LocalStorage, PgRecordRepository, PruneError,
    PruneOptions, PruneService, SchemaRegistry,
};

/// Prune and maintain file uploads
#[derive(Parser, Debug)]
#[command(name = "prune-uploads", version, about, long_about = None)]
struct Cli {
    /// Delete files in storage that no record references
    #[arg(long)]
    delete_orphans: bool,

    /// Empty <label.attribute> on records whose file is missing (attribute must allow empty values)
    #[arg(long, alias = "nullify-missing", value_name = "LABEL.ATTRIBUTE")]
    blank_missing: Vec<String>,

    /// Delete records whose <label.attribute> references a missing file
    #[arg(long, value_name = "LABEL.ATTRIBUTE")]
    delete_invalid: Vec<String>,

    /// Output detail; 2 and above print full path listings instead of counts
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    verbosity: u8,

    /// Storage root (overrides MEDIA_ROOT)
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Declarative schema file (overrides PRUNE_SCHEMA)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Directory name pattern to skip; replaces the defaults when given
    #[arg(long = "exclude-dir", value_name = "REGEX")]
    exclude_dirs: Vec<String>,

    /// Output machine-readable JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Logs go to stderr, the report to stdout
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "prune_uploads=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.error_code(), "Prune run failed: {}", e);
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), PruneError> {
    let config = Config::from_env()?;

    let storage_root = cli
        .storage_root
        .or(config.media_root)
        .ok_or(ConfigError::MissingEnvVar("MEDIA_ROOT"))?;
    let schema_path = cli
        .schema
        .or(config.schema_path)
        .ok_or(ConfigError::MissingEnvVar("PRUNE_SCHEMA"))?;

    let patterns = if cli.exclude_dirs.is_empty() {
        config.exclude_dirs
    } else {
        cli.exclude_dirs
    };
    let exclusions =
        DirExclusions::new(&patterns).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;

    let schema = SchemaRegistry::from_file(&schema_path).await?;
    info!(
        schema = %schema_path.display(),
        record_types = schema.len(),
        "Schema loaded"
    );

    // Lazy so that option validation fails before the database is touched
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect_lazy(&config.database_url)
        .map_err(RepositoryError::from)?;

    let service = PruneService::new(
        Arc::new(schema),
        Arc::new(PgRecordRepository::new(pool)),
        Arc::new(LocalStorage::new(storage_root)),
    );

    let report = service
        .run(&PruneOptions {
            blank_missing: cli.blank_missing,
            delete_invalid: cli.delete_invalid,
            delete_orphans: cli.delete_orphans,
            exclusions,
        })
        .await?;

    if cli.json {
        println!("{}", render_json(&report)?);
    } else {
        print!("{}", render_text(&report, cli.verbosity));
    }

    Ok(())
}
