use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use platform_obs::{ObsConfig, init_tracing};
use serde::Serialize;
use server::{AppConfig, AppState, ServeConfig, serve};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "log-api", version, about = "Log API with role-header authorization")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Validate the roles configuration and print its normalized form.
    #[command(name = "check-config")]
    CheckConfig,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, env = "PORT", default_value_t = 5607)]
    port: u16,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    let app_config = AppConfig::load()?;
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, app_config).await,
        Command::CheckConfig => check_config(&app_config),
    }
}

async fn run_server(cmd: ServeCommand, config: AppConfig) -> Result<()> {
    let state = AppState::new(config)?;
    info!(
        paths = ?state.gate.paths(),
        default_roles = %state.gate.default_roles(),
        agent_roles = %state.gate.agent_roles(),
        "roles middleware configured"
    );
    serve(cmd.into(), state).await
}

#[derive(Serialize)]
struct NormalizedRoles<'a> {
    path: &'a [String],
    default_roles: Vec<&'a str>,
    agent_roles: Vec<&'a str>,
}

fn check_config(config: &AppConfig) -> Result<()> {
    let gate = config.gate()?;
    let normalized = NormalizedRoles {
        path: gate.paths(),
        default_roles: gate.default_roles().iter().collect(),
        agent_roles: gate.agent_roles().iter().collect(),
    };
    let rendered =
        serde_json::to_string_pretty(&normalized).context("failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}
