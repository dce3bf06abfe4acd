use anyhow::Context;
use arc_cloud::{Registry, Request};
use arc_cloud_mock::MockProvider;
use arc_core::{App, Env, Factories, Runtime, msg};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arc")]
#[command(about = "Declarative datacenter orchestration", long_about = None)]
#[command(version)]
struct Cli {
    /// Datacenter name; selects `<datacenter>.kdl`
    datacenter: String,

    /// Resource path, verb and flags, e.g. `instance web-01 replace noprovision`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,

    #[arg(long, env = "SSH_AUTH_SOCK", hide = true)]
    ssh_auth_sock: String,

    #[arg(long, env = "SSH_USER", hide = true)]
    ssh_user: Option<String>,

    #[arg(long, env = "USER", hide = true)]
    user: Option<String>,

    /// Local staging directory (default `~/.arc`)
    #[arg(long = "arc-dir", env = "ARC")]
    arc_dir: Option<PathBuf>,

    /// Prefix of the bundled script tree
    #[arg(
        long,
        env = "ROOT",
        default_value = "",
        value_parser = |s: &str| Ok::<PathBuf, std::convert::Infallible>(PathBuf::from(s)),
        hide = true
    )]
    root: PathBuf,

    #[arg(
        long = "build-version",
        env = "VERSION",
        default_value = env!("CARGO_PKG_VERSION"),
        hide = true
    )]
    build_version: String,
}

impl Cli {
    fn env(&self) -> anyhow::Result<Env> {
        let user = self
            .ssh_user
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| self.user.clone())
            .context("neither SSH_USER nor USER is set")?;
        let arc_dir = match &self.arc_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .context("cannot locate the home directory")?
                .join(".arc"),
        };
        Ok(Env {
            user,
            ssh_auth_sock: self.ssh_auth_sock.clone(),
            arc_dir,
            root: self.root.clone(),
            version: self.build_version.clone(),
        })
    }
}

/// Every vendor this binary knows
async fn registry() -> anyhow::Result<Registry> {
    let mut registry = Registry::new();
    registry.register(Arc::new(MockProvider::from_env().await?));
    Ok(registry)
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let env = cli.env()?;
    msg::set_quiet(cli.quiet);
    msg::info(format!(
        "{} {} {}",
        "arc".cyan().bold(),
        env.version,
        cli.datacenter.bold()
    ));

    let config = arc_config::load(&cli.datacenter)
        .with_context(|| format!("loading datacenter '{}'", cli.datacenter))?;
    let registry = registry().await?;
    let factories = Factories::new();
    let user = env.user.clone();
    let rt = Rc::new(Runtime::new(env));

    let mut app = App::build(config, rt, &registry, &factories)
        .await
        .context("building the resource tree")?;

    let mut req = Request::new(&cli.datacenter, &user, chrono::Utc::now(), &cli.tokens);
    tracing::debug!(datacenter = %cli.datacenter, command = %req.command(), "dispatching");
    let response = app.run(&mut req).await;
    tracing::info!(%response, "done");
    Ok(response.is_ok())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            msg::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
