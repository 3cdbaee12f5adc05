use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use ms_azure_addon::config::{AgentConfig, Settings};
use ms_azure_addon::error::{exit_code, AgentError};
use secrecy::SecretString;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Special agent for Azure Arc state and machine extensions
#[derive(Parser, Debug)]
#[command(name = "ms-azure-addon", version, about, long_about = None)]
#[command(group(ArgGroup::new("secret").args(["app_secret", "app_secret_env", "app_secret_id"])))]
struct Args {
    /// Microsoft Entra tenant ID
    #[arg(long)]
    tenant_id: Option<String>,

    /// Client ID of the app registration
    #[arg(long)]
    app_id: Option<String>,

    /// Client secret of the app registration
    #[arg(long)]
    app_secret: Option<String>,

    /// Read the client secret from this environment variable
    #[arg(long)]
    app_secret_env: Option<String>,

    /// Look up the client secret by id in the password store
    #[arg(long)]
    app_secret_id: Option<String>,

    /// Password store file (defaults to $OMD_ROOT/var/check_mk/stored_passwords)
    #[arg(long)]
    password_store: Option<PathBuf>,

    /// Comma separated: azure_arc_states, azure_arc_extensions, azure_vm_extensions
    #[arg(long, value_delimiter = ',')]
    services_to_monitor: Option<Vec<String>>,

    /// Only query these subscriptions
    #[arg(long, value_delimiter = ',', conflicts_with = "filter_management_groups")]
    filter_subscriptions: Option<Vec<String>>,

    /// Only query these management groups
    #[arg(long, value_delimiter = ',')]
    filter_management_groups: Option<Vec<String>>,

    /// Timeout in seconds for every API request (3-600, default 10)
    #[arg(long)]
    timeout: Option<u64>,

    /// FROM_ENVIRONMENT, NO_PROXY or a proxy URL
    #[arg(long)]
    proxy: Option<String>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, hide = true)]
    authority_host: Option<String>,

    #[arg(long, hide = true)]
    management_host: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Log file (defaults to the user cache directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            tenant_id: self.tenant_id.clone(),
            app_id: self.app_id.clone(),
            app_secret: self
                .app_secret
                .clone()
                .map(|secret| SecretString::new(secret.into())),
            app_secret_env: self.app_secret_env.clone(),
            app_secret_id: self.app_secret_id.clone(),
            password_store: self.password_store.clone(),
            services_to_monitor: self.services_to_monitor.clone(),
            filter_subscriptions: self.filter_subscriptions.clone(),
            filter_management_groups: self.filter_management_groups.clone(),
            timeout: self.timeout,
            proxy: self.proxy.clone(),
            authority_host: self.authority_host.clone(),
            management_host: self.management_host.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Logs go to a file; stdout carries the agent output.
fn setup_logging(
    level: LogLevel,
    log_file: Option<PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = log_file.unwrap_or_else(get_log_path);

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("ms-azure-addon started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(cache_dir) = dirs::cache_dir() {
        return cache_dir.join("ms-azure-addon").join("ms-azure-addon.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".ms-azure-addon").join("ms-azure-addon.log");
    }
    PathBuf::from("ms-azure-addon.log")
}

fn load_config(args: &Args) -> Result<AgentConfig, AgentError> {
    let file = Settings::load(args.config.as_deref())?;
    Ok(AgentConfig::resolve(args.settings().or(file))?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level, args.log_file.clone()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:?}");
            return ExitCode::from(exit_code::REQUEST_FAILED);
        }
    };

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(err.exit_code());
        }
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match ms_azure_addon::run(&config, &mut out).await {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(err) => {
            tracing::error!("Agent run failed: {}", err);
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
