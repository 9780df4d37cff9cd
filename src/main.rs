//! meshctl CLI entry point.
//!
//! Provides the `validate` subcommand for triggering service mesh
//! conformance validation and, with `--watch`, waiting for its result.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use meshctl::config::CtlConfig;
use meshctl::operation::DEFAULT_NAMESPACE;
use meshctl::validate::{build_client, ValidateError, ValidateOptions, Validator};

/// Manage service meshes through a Meshery server.
#[derive(Parser)]
#[command(name = "meshctl", version, about)]
struct Cli {
    /// Path to the config file (default: ~/.meshery/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Context to use instead of the configured current context.
    #[arg(long, global = true, value_name = "NAME")]
    context: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Validate conformance to service mesh standards.
    ///
    /// Example: meshctl validate istio --adapter meshery-istio --spec smi
    Validate(ValidateArgs),
}

/// Flags of `validate`.
#[derive(Args)]
struct ValidateArgs {
    /// Mesh to validate (defaults to the adapter name).
    mesh: Option<String>,

    /// Specification to be used for the conformance test.
    #[arg(short, long, default_value = "smi")]
    spec: String,

    /// Adapter to use for validation.
    #[arg(short, long, default_value = "meshery-osm")]
    adapter: String,

    /// Path to token for authenticating to the Meshery API.
    #[arg(short, long, value_name = "PATH")]
    token: Option<PathBuf>,

    /// Namespace the conformance tests run in.
    #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Watch for events and verify the operation.
    #[arg(short, long)]
    watch: bool,

    /// Seconds to wait for the result when watching.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    meshctl::logging::init_cli(cli.verbose);

    let result = match cli.command {
        Command::Validate(ref args) => handle_validate(&cli, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Run `validate` with the global flags in `cli`.
async fn handle_validate(cli: &Cli, args: &ValidateArgs) -> Result<(), ValidateError> {
    let config = CtlConfig::load(cli.config.as_deref()).map_err(ValidateError::Config)?;
    let client = build_client(&config, cli.context.as_deref(), args.token.as_deref())?;

    let timeout = args
        .timeout
        .map_or_else(|| config.watch.timeout(), Duration::from_secs);
    let validator = Validator::new(client, timeout);

    let options = ValidateOptions {
        mesh: args.mesh.clone().unwrap_or_else(|| args.adapter.clone()),
        spec: args.spec.clone(),
        adapter: args.adapter.clone(),
        namespace: args.namespace.clone(),
        watch: args.watch,
    };

    let report = validator.run(&options).await?;
    info!(mesh = %report.target.mesh, "{} validation successful", report.target.mesh);
    Ok(())
}
