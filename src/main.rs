use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use herald::config::NotifierConfig;
use herald::engine::{Action, BuildEngine};
use herald::filter::FieldFilter;
use herald::git::GitCli;
use herald::host::{Host, ProcessEnvironment};
use herald::logging::{init_logging, LogCapture};
use herald::notifier::Notifier;
use secrecy::SecretString;
use std::collections::BTreeMap;
use std::process::Command as Shell;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "herald", version)]
#[command(about = "Report build lifecycle status to a status collector")]
struct Cli {
    #[command(flatten)]
    notify: NotifyArgs,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct NotifyArgs {
    /// Base URL of the status collector
    #[arg(long, env = "HERALD_SERVER_URL", global = true)]
    server_url: Option<String>,

    /// Access token sent with every status message
    #[arg(long, env = "HERALD_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    /// Environment variable holding the build's semantic version
    #[arg(long, env = "HERALD_VERSION_PARAMETER", global = true)]
    version_parameter: Option<String>,

    /// Include sensitive host fields in host information
    #[arg(long, env = "HERALD_ENABLE_AUTHORIZED_ACTIONS", global = true)]
    enable_authorized_actions: bool,

    /// Print host information instead of posting
    #[arg(long, env = "HERALD_DEBUG", global = true)]
    debug: bool,

    /// Delivery timeout in seconds
    #[arg(long, env = "HERALD_TIMEOUT_SECS", default_value = "10", global = true)]
    timeout_secs: u64,
}

impl From<NotifyArgs> for NotifierConfig {
    fn from(args: NotifyArgs) -> Self {
        NotifierConfig {
            server_url: args.server_url,
            access_token: args.access_token.map(SecretString::from),
            version_parameter: args.version_parameter,
            enable_authorized_actions: args.enable_authorized_actions,
            debug: args.debug,
            timeout: Duration::from_secs(args.timeout_secs),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run shell commands as a linear pipeline of targets
    Run {
        /// Target as NAME=COMMAND; repeat for each step
        #[arg(long = "target", required = true, value_parser = parse_target)]
        targets: Vec<(String, String)>,
    },
    /// Print the filtered host information of the detected CI host
    Host,
}

fn parse_target(raw: &str) -> Result<(String, String), String> {
    let (name, command) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=COMMAND, got '{}'", raw))?;
    if name.trim().is_empty() {
        return Err(format!("target name missing in '{}'", raw));
    }
    Ok((name.trim().to_string(), command.to_string()))
}

fn shell_action(command: String) -> Action {
    Box::new(move |summary: &mut BTreeMap<String, String>| -> Result<()> {
        let status = Shell::new("sh")
            .arg("-c")
            .arg(&command)
            .status()
            .with_context(|| format!("failed to spawn '{}'", command))?;
        summary.insert("Command".to_string(), command.clone());
        if !status.success() {
            bail!("'{}' exited with {}", command, status);
        }
        Ok(())
    })
}

fn run(config: NotifierConfig, targets: Vec<(String, String)>, log: LogCapture) -> Result<i32> {
    let host = Host::detect(&ProcessEnvironment);
    let mut engine = BuildEngine::new();

    if host.is_local() {
        info!("Running outside CI; build status notifications are disabled");
    } else {
        let root = std::env::current_dir()?;
        let notifier = Notifier::new(config, host, &ProcessEnvironment, Box::new(GitCli::new(root)), log)?;
        info!(cookie = %notifier.correlation_id(), "Build status notifications enabled");
        engine = engine.with_observer(Arc::new(notifier));
    }

    let mut previous = None;
    for (name, command) in targets {
        let deps: Vec<usize> = previous.into_iter().collect();
        previous = Some(engine.add_target(&name, &deps, Some(shell_action(command))));
    }

    let build = engine.execute()?;
    let exit_code = build.exit_code.unwrap_or(1);
    if exit_code != 0 {
        warn!(exit_code, "Build failed");
    }
    Ok(exit_code)
}

fn print_host(config: &NotifierConfig) -> Result<()> {
    let host = Host::detect(&ProcessEnvironment);
    let filter = FieldFilter::for_host(&host, config.enable_authorized_actions)?;
    println!("{}", filter.host_information(&host)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = LogCapture::new();
    if let Err(e) = init_logging(cli.json_logs, &log) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = NotifierConfig::from(cli.notify);
    match cli.command {
        Command::Run { targets } => {
            let code = run(config, targets, log)?;
            std::process::exit(code);
        }
        Command::Host => print_host(&config),
    }
}
