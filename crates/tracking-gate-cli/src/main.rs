// crates/tracking-gate-cli/src/main.rs
// ============================================================================
// Module: Tracking Gate CLI Entry Point
// Description: Command dispatcher for the tracking-gate proxy.
// Purpose: Launch the authorization proxy and check its configuration.
// Dependencies: clap, thiserror, tokio, tracking-gate-config, tracking-gate-server
// ============================================================================

//! ## Overview
//! `tracking-gate serve` loads and validates configuration, applies the bind
//! policy, builds the proxy collaborators off the async runtime, and serves
//! until the listener fails. `tracking-gate config check` runs the same
//! loading and validation without starting anything.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;
use tracking_gate_cli::serve_policy::enforce_local_only;
use tracking_gate_cli::serve_policy::resolve_allow_non_loopback;
use tracking_gate_config::AuditSinkKind;
use tracking_gate_config::GateConfig;
use tracking_gate_config::ProviderKind;
use tracking_gate_server::TrackingGateServer;

// ============================================================================
// SECTION: CLI Definitions
// ============================================================================

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "tracking-gate", disable_version_flag = true)]
#[command(about = "Multi-tenant authorization proxy for a tracking server.")]
struct Cli {
    /// Print the version and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the authorization proxy.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Allow binding to a non-loopback address.
    #[arg(long, action = ArgAction::SetTrue)]
    allow_non_loopback: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Check(ConfigCheckCommand),
}

/// Arguments for `config check`.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("tracking-gate {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Runs the proxy until the listener fails.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let allow_non_loopback = resolve_allow_non_loopback(command.allow_non_loopback)
        .map_err(|err| CliError::new(err.to_string()))?;
    let outcome = enforce_local_only(&config, allow_non_loopback)
        .map_err(|err| CliError::new(err.to_string()))?;
    if outcome.network_exposed {
        write_stderr_line(&format!(
            "warning: tracking-gate is listening on non-loopback address {}",
            outcome.bind_addr
        ))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }

    let server = tokio::task::spawn_blocking(move || TrackingGateServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init task failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("tracking-gate listening on {}", outcome.bind_addr))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check(command) => {
            let config = load_config(command.config.as_deref())?;
            write_stdout_line(&config_summary(&config))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<GateConfig> {
    GateConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// One-line summary of a valid configuration.
fn config_summary(config: &GateConfig) -> String {
    let provider = match config.provider.kind {
        ProviderKind::Gitlab => "gitlab",
        ProviderKind::Catalog => "catalog",
    };
    let audit = match config.audit.sink {
        AuditSinkKind::Stderr => "stderr",
        AuditSinkKind::File => "file",
        AuditSinkKind::None => "none",
    };
    format!(
        "config ok: bind={} upstream={} provider={provider} ({}) project_tag={} audit={audit}",
        config.server.bind,
        config.server.upstream_url,
        config.provider.base_url,
        config.authorization.project_tag,
    )
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output failure message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
