use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use dbfixture::config::{Config, Overrides};
use dbfixture::{ddl, sql_state, DatabaseId, DropOutcome, Fixture, FixtureConfig};

mod exit_codes;
mod output;

use output::{JsonError, JsonResponse, Output};

/// Set to skip interactive confirmation prompts (treated as "no").
const ENV_NON_INTERACTIVE: &str = "DBFIXTURE_NON_INTERACTIVE";

#[derive(Parser)]
#[command(name = "dbfixture", version, about = "Create and drop throwaway test databases")]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Path to config file (default: ./dbfixture.toml)
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,

    /// Project identifier (overrides DBFIXTURE_PROJECT and config file)
    #[arg(long, global = true)]
    project: Option<String>,

    /// Instance identifier (overrides DBFIXTURE_INSTANCE and config file)
    #[arg(long, global = true)]
    instance: Option<String>,

    /// Instance endpoint URL (overrides DBFIXTURE_HOST, TEST_DATABASE_URL and config file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Connection timeout (e.g., "5s", "500ms")
    #[arg(long = "connect-timeout", global = true, value_name = "DURATION")]
    connect_timeout: Option<String>,

    /// Minimal output (errors only)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Log what the fixture does (debug level)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a database and apply DDL to it
    Create {
        /// Database name
        name: String,
        /// DDL statement (repeatable, applied in order after --ddl-file)
        #[arg(long = "ddl", value_name = "SQL")]
        ddl: Vec<String>,
        /// Schema script, split into statements
        #[arg(long = "ddl-file", value_name = "PATH")]
        ddl_file: Option<PathBuf>,
    },
    /// Drop a database (missing databases are not an error)
    Drop {
        /// Database name
        name: String,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
        /// Fail on errors other than "does not exist"
        #[arg(long)]
        strict: bool,
    },
    /// Check whether a database exists (exit 1 if not)
    Exists {
        /// Database name
        name: String,
    },
    /// Show the resolved configuration
    Config,
}

/// A failed run: what to report and which exit code to use.
struct Failure {
    code: i32,
    error: anyhow::Error,
}

trait ExitCodeExt<T> {
    fn or_exit(self, code: i32) -> Result<T, Failure>;
}

impl<T> ExitCodeExt<T> for Result<T> {
    fn or_exit(self, code: i32) -> Result<T, Failure> {
        self.map_err(|error| Failure { code, error })
    }
}

#[derive(Serialize)]
struct ConfigView {
    project: String,
    instance: String,
    host: String,
    connect_timeout_ms: Option<u128>,
    scratch_prefix: String,
}

#[derive(Serialize)]
struct CreateView {
    database: DatabaseId,
    name: String,
    statements: usize,
}

#[derive(Serialize)]
struct DropView {
    database: DatabaseId,
    outcome: Option<DropOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ignored_error: Option<String>,
}

#[derive(Serialize)]
struct ExistsView {
    database: DatabaseId,
    exists: bool,
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before parsing CLI so env vars are available)
    let _ = dotenvy::dotenv();

    let json_mode = std::env::args().any(|arg| arg == "--json");

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if json_mode && e.use_stderr() => {
            JsonError::new("usage_error", e.to_string()).print();
            std::process::exit(2);
        }
        Err(e) => e.exit(),
    };

    init_tracing(cli.verbose);
    let output = Output::new(cli.json, cli.quiet);

    match run(cli, &output).await {
        Ok(code) => std::process::exit(code),
        Err(Failure { code, error }) => {
            if output.is_json() {
                JsonError::new(error_code(code), error.to_string())
                    .with_sqlstate(sql_state(&error).map(|s| s.code().to_string()))
                    .with_details(format!("{error:#}"))
                    .print();
            } else {
                eprintln!("{} {error:#}", "Error:".red());
            }
            std::process::exit(code);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "warn,dbfixture=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn error_code(exit_code: i32) -> &'static str {
    match exit_code {
        exit_codes::CONNECTION_FAILURE => "connection_failure",
        exit_codes::CONFIG_ERROR => "config_error",
        _ => "operational_failure",
    }
}

fn resolve_config(cli: &Cli) -> Result<FixtureConfig> {
    let overrides = Overrides {
        project: cli.project.clone(),
        instance: cli.instance.clone(),
        host: cli.host.clone(),
        connect_timeout: cli.connect_timeout.clone(),
    };
    let config = Config::load(cli.config_path.as_deref())?.resolve(&overrides)?;
    // Surface a malformed host as a config error rather than a connection error
    config.admin_pg_config()?;
    Ok(config)
}

/// A command that needs a connection.
enum Action {
    Create { name: String, statements: Vec<String> },
    Drop { name: String, yes: bool, strict: bool },
    Exists { name: String },
}

async fn run(cli: Cli, output: &Output) -> Result<i32, Failure> {
    let config = resolve_config(&cli).or_exit(exit_codes::CONFIG_ERROR)?;

    let action = match cli.command {
        Commands::Config => return show_config(&config, output),
        // Read DDL before connecting so a bad file fails fast
        Commands::Create {
            name,
            ddl,
            ddl_file,
        } => Action::Create {
            name,
            statements: collect_ddl(&ddl, ddl_file.as_deref())
                .or_exit(exit_codes::CONFIG_ERROR)?,
        },
        Commands::Drop { name, yes, strict } => Action::Drop { name, yes, strict },
        Commands::Exists { name } => Action::Exists { name },
    };

    let fixture = Fixture::setup(config)
        .await
        .or_exit(exit_codes::CONNECTION_FAILURE)?;

    let result = match &action {
        Action::Create { name, statements } => create(&fixture, name, statements, output).await,
        Action::Drop { name, yes, strict } => {
            drop_database(&fixture, name, *yes, *strict, output).await
        }
        Action::Exists { name } => exists(&fixture, name, output).await,
    };

    fixture.teardown().await;
    result.or_exit(exit_codes::OPERATIONAL_FAILURE)
}

fn show_config(config: &FixtureConfig, output: &Output) -> Result<i32, Failure> {
    let view = ConfigView {
        project: config.project_id.clone(),
        instance: config.instance_id.clone(),
        host: config.redacted_host(),
        connect_timeout_ms: config.connect_timeout.map(|d| d.as_millis()),
        scratch_prefix: config.scratch_prefix.clone(),
    };

    if output.is_json() {
        output
            .json(&JsonResponse::new(view))
            .map_err(anyhow::Error::from)
            .or_exit(exit_codes::OPERATIONAL_FAILURE)?;
    } else {
        output.data(&format!("project:         {}", view.project));
        output.data(&format!("instance:        {}", view.instance));
        output.data(&format!("host:            {}", view.host));
        output.data(&format!(
            "connect timeout: {}",
            view.connect_timeout_ms
                .map(|ms| format!("{ms}ms"))
                .unwrap_or_else(|| "client default".to_string())
        ));
        output.data(&format!("scratch prefix:  {}", view.scratch_prefix));
    }
    Ok(exit_codes::SUCCESS)
}

/// Statements from `--ddl-file` first, then each `--ddl` in order.
fn collect_ddl(inline: &[String], file: Option<&std::path::Path>) -> Result<Vec<String>> {
    let mut statements = match file {
        Some(path) => ddl::load_file(path)?,
        None => Vec::new(),
    };
    statements.extend(inline.iter().cloned());
    Ok(statements)
}

async fn create(
    fixture: &Fixture,
    name: &str,
    statements: &[String],
    output: &Output,
) -> Result<i32> {
    output.info(&format!(
        "Creating database '{}' with {} DDL statement(s)...",
        name,
        statements.len()
    ));
    fixture.create_database(name, statements).await?;

    let id = fixture.database_id(name);
    if output.is_json() {
        output.json(&JsonResponse::new(CreateView {
            database: id,
            name: name.to_string(),
            statements: statements.len(),
        }))?;
    } else {
        output.data(&format!("Created database '{}' ({})", name, id).green().to_string());
    }
    Ok(exit_codes::SUCCESS)
}

async fn drop_database(
    fixture: &Fixture,
    name: &str,
    yes: bool,
    strict: bool,
    output: &Output,
) -> Result<i32> {
    if !yes && !confirm_drop(name, output)? {
        output.info("Aborted.");
        return Ok(exit_codes::SUCCESS);
    }

    let id = fixture.database_id(name);
    let (outcome, ignored_error) = match fixture.try_drop_database(name).await {
        Ok(outcome) => (Some(outcome), None),
        Err(e) if strict => return Err(e),
        Err(e) => (None, Some(format!("{e:#}"))),
    };

    if output.is_json() {
        output.json(&JsonResponse::new(DropView {
            database: id,
            outcome,
            ignored_error,
        }))?;
        return Ok(exit_codes::SUCCESS);
    }

    match (outcome, ignored_error) {
        (Some(DropOutcome::Dropped), _) => {
            output.data(&format!("Dropped database '{}'", name).green().to_string())
        }
        (Some(DropOutcome::NotFound), _) => {
            output.data(&format!("Database '{}' does not exist", name).yellow().to_string())
        }
        (None, Some(err)) => output.info(
            &format!("Warning: drop of '{}' failed, ignoring: {}", name, err)
                .yellow()
                .to_string(),
        ),
        (None, None) => {}
    }
    Ok(exit_codes::SUCCESS)
}

fn confirm_drop(name: &str, output: &Output) -> Result<bool> {
    if output.is_json() || std::env::var_os(ENV_NON_INTERACTIVE).is_some() {
        bail!("Dropping a database requires --yes flag to confirm.");
    }
    Ok(Confirm::new()
        .with_prompt(format!("Drop database '{}'?", name))
        .default(false)
        .interact()?)
}

async fn exists(fixture: &Fixture, name: &str, output: &Output) -> Result<i32> {
    let exists = fixture.database_exists(name).await?;

    if output.is_json() {
        output.json(&JsonResponse::new(ExistsView {
            database: fixture.database_id(name),
            exists,
        }))?;
    } else if exists {
        output.data(&format!("Database '{}' exists", name));
    } else {
        output.data(&format!("Database '{}' does not exist", name));
    }

    Ok(if exists {
        exit_codes::SUCCESS
    } else {
        exit_codes::NOT_FOUND
    })
}
