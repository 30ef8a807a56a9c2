mod config;
mod error;
mod galasaapi;
mod http_client;
mod resources;
mod run_age;
mod run_format;
mod run_types;
mod runs_get;
mod runs_query;
mod users;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::{config_path, resolve_galasa_home, Config};
use crate::error::GalasaError;
use crate::galasaapi::CLIENT_API_VERSION;
use crate::http_client::GalasaCommsClient;
use crate::resources::ResourceAction;
use crate::run_format::RunsFormat;
use crate::runs_get::RunsGetCriteria;

const EXIT_GENERIC_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_TRANSPORT_OR_AUTH_FAILURE: i32 = 4;

#[derive(Parser, Debug)]
#[command(name = "galasactl", version)]
#[command(about = "CLI for Galasa", long_about = "A tool for controlling Galasa resources using the command-line.")]
struct Args {
    /// Base URL of the Galasa API server
    #[arg(long, env = "GALASA_API_SERVER_URL")]
    api_server_url: Option<String>,

    /// Bearer token (Authorization: Bearer ...)
    #[arg(long, env = "GALASA_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    /// Folder where galasactl reads and writes its configuration.
    /// Overrides GALASA_HOME; defaults to ~/.galasa
    #[arg(long)]
    galasahome: Option<PathBuf>,

    /// Save the API server URL and bearer token into the config file
    #[arg(long, default_value_t = false)]
    save_auth: bool,

    /// HTTP timeout seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Extra attempts after a rate-limited (429) response
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Base delay between rate-limit retries, grown linearly per attempt
    #[arg(long, default_value_t = 1000)]
    retry_backoff_ms: u64,

    /// File to which log information is sent; "-" logs to stderr.
    /// Without it only warnings are logged, to stderr
    #[arg(short = 'l', long)]
    log: Option<String>,

    /// Log level (defaults to info when --log is given)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query test runs
    Runs {
        #[command(subcommand)]
        cmd: RunsCmd,
    },

    /// Manage resources declared in YAML files
    Resources {
        #[command(subcommand)]
        cmd: ResourcesCmd,
    },

    /// User records
    Users {
        #[command(subcommand)]
        cmd: UsersCmd,
    },
}

#[derive(Subcommand, Debug)]
enum RunsCmd {
    /// Get the details of test runs, newest first
    Get {
        /// Run name, e.g. U456
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        requestor: Option<String>,
        /// Result to match, e.g. Passed
        #[arg(long, conflicts_with = "active")]
        result: Option<String>,
        #[arg(long)]
        group: Option<String>,
        /// Age window FROM[:TO], e.g. 1d or 2h:30m (units w, d, h, m)
        #[arg(long)]
        age: Option<String>,
        /// Only runs that have not finished yet
        #[arg(long, default_value_t = false)]
        active: bool,
        /// Tags to match (repeatable or comma-separated)
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, value_enum, default_value = "summary")]
        format: RunsFormat,
    },
}

#[derive(Subcommand, Debug)]
enum ResourcesCmd {
    /// Create or update the resources in a file
    Apply(ResourceFileArgs),
    /// Create the resources in a file; fails if any exist
    Create(ResourceFileArgs),
    /// Update the resources in a file; fails if any are missing
    Update(ResourceFileArgs),
    /// Delete the resources in a file
    Delete(ResourceFileArgs),
}

#[derive(ClapArgs, Debug, Clone)]
struct ResourceFileArgs {
    /// YAML or JSON file holding one or more resource documents
    #[arg(short = 'f', long = "file")]
    file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum UsersCmd {
    /// Get user records; --login-id me returns the current user
    Get {
        #[arg(long)]
        login_id: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = run(args).await {
        eprintln!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.log.as_deref(), args.log_level.as_deref())?;

    let galasa_home = resolve_galasa_home(args.galasahome);
    let cfg_path = config_path(&galasa_home);
    let mut cfg = Config::load(&cfg_path)?;

    // CLI args and environment override config.
    let api_server_url = args
        .api_server_url
        .or_else(|| cfg.api_server_url.clone())
        .ok_or(GalasaError::MissingApiServerUrl)?;
    let bearer_token = args.bearer_token.or_else(|| cfg.bearer_token.clone());

    if args.save_auth {
        cfg.api_server_url = Some(api_server_url.clone());
        if let Some(token) = &bearer_token {
            cfg.bearer_token = Some(token.clone());
        }
        cfg.save(&cfg_path)?;
        info!(path = ?cfg_path, "saved auth to config");
    }

    info!(api_server_url = %api_server_url, "The API server is at");
    let comms = GalasaCommsClient::new(
        &api_server_url,
        bearer_token,
        Duration::from_secs(args.timeout_secs),
        args.retries,
    )?
    .with_backoff(Duration::from_millis(args.retry_backoff_ms));

    match args.cmd {
        Command::Runs { cmd } => match cmd {
            RunsCmd::Get {
                name,
                requestor,
                result,
                group,
                age,
                active,
                tags,
                format,
            } => {
                let criteria = RunsGetCriteria {
                    run_name: name,
                    requestor,
                    result,
                    group,
                    age,
                    active,
                    tags,
                };
                runs_get::run_runs_get(&comms, criteria, format, CLIENT_API_VERSION).await
            }
        },
        Command::Resources { cmd } => {
            let (action, file_args) = match cmd {
                ResourcesCmd::Apply(a) => (ResourceAction::Apply, a),
                ResourcesCmd::Create(a) => (ResourceAction::Create, a),
                ResourcesCmd::Update(a) => (ResourceAction::Update, a),
                ResourcesCmd::Delete(a) => (ResourceAction::Delete, a),
            };
            resources::run_resources_action(&comms, action, &file_args.file).await
        }
        Command::Users { cmd } => match cmd {
            UsersCmd::Get { login_id } => users::run_users_get(&comms, login_id.as_deref()).await,
        },
    }
}

fn init_logging(log: Option<&str>, log_level: Option<&str>) -> Result<()> {
    let default_level = if log.is_some() { Level::INFO } else { Level::WARN };
    let lvl = match log_level.map(str::to_lowercase).as_deref() {
        Some("trace") => Level::TRACE,
        Some("debug") => Level::DEBUG,
        Some("info") => Level::INFO,
        Some("warn") => Level::WARN,
        Some("error") => Level::ERROR,
        _ => default_level,
    };
    let builder = FmtSubscriber::builder().with_max_level(lvl);

    match log {
        Some(path) if path != "-" => {
            let file =
                File::create(path).with_context(|| format!("Failed to create log file {}", path))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        _ => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<GalasaError>() {
        Some(e) if e.is_validation() => EXIT_VALIDATION_FAILURE,
        Some(e) if e.is_transport_or_auth() => EXIT_TRANSPORT_OR_AUTH_FAILURE,
        _ => EXIT_GENERIC_FAILURE,
    }
}
