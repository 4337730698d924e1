// # dimcli - raw DIM calls from the command line
//
// Thin front end over `dim-client`: reads configuration from flags and the
// environment, invokes one remote method and prints its result as JSON.
//
// ## Configuration
//
// - `--endpoint` / `DIM_ENDPOINT`: DIM base URL
// - `--token-file`: file whose trimmed contents is the session token
//   (overrides `DIM_TOKEN`)
// - `DIM_TOKEN`: session token
// - `DIM_USERNAME`, `DIM_PASSWORD`: login credentials, used without a token
// - `DIM_LOG_LEVEL`: trace, debug, info, warn (default) or error
//
// ## Example
//
// ```bash
// export DIM_ENDPOINT=https://dim.example.com/dim
// export DIM_USERNAME=alice DIM_PASSWORD=...
//
// dimcli --method zone_list --args '[{"pattern": "*.example.com"}]'
// ```
//
// Ctrl-C (or SIGTERM) cancels the in-flight call.

use anyhow::{Context, Result};
use clap::Parser;
use dim_client::DimClient;
use dim_core::{CancellationToken, ClientConfig, Error, ReloginPolicy, RpcInvoker};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes
///
/// - 0: The call succeeded
/// - 1: Configuration error, nothing was sent
/// - 2: The login or the call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DimExitCode {
    Success = 0,
    ConfigError = 1,
    CallFailed = 2,
}

impl From<DimExitCode> for ExitCode {
    fn from(code: DimExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Invoke one DIM JSON-RPC method and print the result
#[derive(Parser, Debug)]
#[command(name = "dimcli", version)]
struct Cli {
    /// DIM endpoint URL
    #[arg(long, env = "DIM_ENDPOINT")]
    endpoint: Option<String>,

    /// File holding the session token (cookie value) for a DIM account
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// DIM method to call
    #[arg(long, default_value = "server_info")]
    method: String,

    /// Method arguments as a JSON array
    #[arg(long, default_value = "[]")]
    args: String,

    /// Print single-line JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,

    /// Log in again and replay the call once if the session is rejected
    #[arg(long)]
    relogin_once: bool,

    /// Log level
    #[arg(long, env = "DIM_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Cli {
    /// Layer flags over the environment
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_env();

        if let Some(ref endpoint) = self.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }

        if let Some(ref path) = self.token_file {
            let token = read_token_file(path)?;
            if !token.is_empty() {
                config = config.with_token(token);
            }
        }

        if self.relogin_once {
            config = config.with_relogin(ReloginPolicy::Once);
        }

        config.validate()?;
        Ok(config)
    }

    fn params(&self) -> Result<Vec<Value>> {
        parse_args(&self.args)
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => anyhow::bail!(
                "DIM_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                other
            ),
        }
    }
}

fn read_token_file(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("could not read DIM token file {}", path.display()))?;
    Ok(contents.trim().to_string())
}

fn parse_args(raw: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(raw).context("could not parse --args as JSON")? {
        Value::Array(items) => Ok(items),
        other => anyhow::bail!("--args must be a JSON array, got {}", other),
    }
}

fn render(result: &Value, compact: bool) -> Result<String> {
    let rendered = if compact {
        serde_json::to_string(result)?
    } else {
        serde_json::to_string_pretty(result)?
    };
    Ok(rendered)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                DimExitCode::ConfigError.into()
            } else {
                DimExitCode::Success.into()
            };
        }
    };

    let log_level = match cli.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DimExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DimExitCode::ConfigError.into();
    }

    let (config, params) = match cli.client_config().and_then(|c| Ok((c, cli.params()?))) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DimExitCode::ConfigError.into();
        }
    };

    debug!("Configuration loaded: {:?}", config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DimExitCode::CallFailed.into();
        }
    };

    rt.block_on(async {
        let cancel = CancellationToken::new();
        tokio::spawn(cancel_on_signal(cancel.clone()));

        match run(config, &cli.method, params, cli.compact, &cancel).await {
            Ok(output) => {
                println!("{}", output);
                DimExitCode::Success
            }
            Err(e) => {
                error!("{:#}", e);
                exit_code_for(&e)
            }
        }
    })
    .into()
}

/// Connect, call, render
async fn run(
    config: ClientConfig,
    method: &str,
    params: Vec<Value>,
    compact: bool,
    cancel: &CancellationToken,
) -> Result<String> {
    info!("starting dim cli against {}", config.endpoint());

    let client = DimClient::connect(config, cancel)
        .await
        .context("could not log in to DIM")?;

    let result = client
        .invoke(method, params, cancel)
        .await
        .with_context(|| format!("DIM call {} failed", method))?;

    render(&result, compact)
}

fn exit_code_for(e: &anyhow::Error) -> DimExitCode {
    match e.downcast_ref::<Error>() {
        Some(Error::AuthConfig(_) | Error::Config(_)) => DimExitCode::ConfigError,
        _ => DimExitCode::CallFailed,
    }
}

/// Cancel `cancel` on Ctrl-C or SIGTERM
#[cfg(unix)]
async fn cancel_on_signal(cancel: CancellationToken) {
    let (Ok(mut sigterm), Ok(mut sigint)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) else {
        error!("Failed to set up signal handlers, Ctrl-C will not cancel the call");
        return;
    };

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    info!("Received {}, canceling DIM call", name);
    cancel.cancel();
}

/// Cancel `cancel` on Ctrl-C
#[cfg(not(unix))]
async fn cancel_on_signal(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C, canceling DIM call");
        cancel.cancel();
    }
}
