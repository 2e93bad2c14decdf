use clap::{Parser, Subcommand};
use eyre::format_err;
use log::{error, info};
use std::process::exit;
use std::sync::Arc;

use netpol_registry::{
    Context, FeatureGates, RestStrategy, Strategy,
    api::NetworkPolicy,
    replay::{self, Outcome, Replayer},
};

pub mod config;

/// NetworkPolicy registry strategies
#[derive(Parser)]
#[command(version, about, long_about = ABOUT)]
struct Cli {
    /// log filters (see https://docs.rs/env_logger/latest/env_logger/index.html#enabling-logging)
    #[arg(long, default_value = "info", env = "NETPOL_LOG")]
    log: String,
    /// log style (see https://docs.rs/env_logger/latest/env_logger/index.html#disabling-colors)
    #[arg(long, default_value = "auto", env = "NETPOL_LOG_STYLE")]
    log_style: String,

    /// Config file path.
    #[arg(long, short = 'c')]
    config: Option<String>,

    /// Feature gates overriding the config, e.g. NetworkPolicyStatus=true
    #[arg(long, default_value = "", env = "NETPOL_FEATURE_GATES")]
    feature_gates: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a NetworkPolicy manifest as a create request.
    Validate {
        /// YAML or JSON manifest
        manifest: String,
    },
    /// Replay a script of requests against an empty store and print the stored objects.
    Replay {
        /// YAML list of steps
        script: String,
    },
}

const ABOUT: &'static str = r#"
NetworkPolicy registry strategies

Applies the create/update rules of the networking.k8s.io/v1 NetworkPolicy resource:
- generation tracking of spec changes
- spec/status isolation between the resource and its status subresource
- status writes gated by the NetworkPolicyStatus feature
"#;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    env_logger::builder()
        .parse_filters(cli.log.as_str())
        .parse_write_style(cli.log_style.as_str())
        .format_timestamp_millis()
        .init();

    let config: config::Config = match &cli.config {
        None => config::Config::default(),
        Some(path) => {
            let config = tokio::fs::read(path)
                .await
                .map_err(|e| format_err!("read config failed: {path}: {e}"))?;
            serde_yaml::from_slice(&config).map_err(|e| format_err!("parse config failed: {e}"))?
        }
    };

    let gates = Arc::new(config.feature_gates(&cli.feature_gates)?);
    for (name, enabled) in gates.snapshot() {
        info!("feature gate {name}: {enabled}");
    }

    let ctx = Context {
        namespace: config.namespace.clone(),
    };

    let ok = match cli.command {
        Command::Validate { manifest } => validate(&ctx, &manifest).await?,
        Command::Replay { script } => run_replay(ctx, gates, &script).await?,
    };

    if !ok {
        exit(1);
    }
    Ok(())
}

async fn validate(ctx: &Context, path: &str) -> eyre::Result<bool> {
    let manifest = tokio::fs::read(path)
        .await
        .map_err(|e| format_err!("read manifest failed: {path}: {e}"))?;
    let mut np: NetworkPolicy =
        serde_yaml::from_slice(&manifest).map_err(|e| format_err!("parse manifest failed: {e}"))?;

    if np.metadata.namespace.is_none() {
        np.metadata.namespace = ctx.namespace.clone();
    }

    let strategy = Strategy::new();
    strategy.prepare_for_create(ctx, &mut np);

    let errors = strategy.validate(ctx, &np);
    if !errors.is_empty() {
        let name = np.metadata.name.as_deref().unwrap_or_default();
        error!("{path}: {errors}");
        print!("{}", serde_yaml::to_string(&errors.to_status("NetworkPolicy", name))?);
        return Ok(false);
    }

    print!("{}", serde_yaml::to_string(&np)?);
    Ok(true)
}

async fn run_replay(ctx: Context, gates: Arc<FeatureGates>, path: &str) -> eyre::Result<bool> {
    let script = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format_err!("read script failed: {path}: {e}"))?;
    let steps =
        replay::parse_script(&script).map_err(|e| format_err!("parse script failed: {e}"))?;

    let mut replayer = Replayer::new(ctx, gates);

    let mut ok = true;
    for (i, step) in steps.into_iter().enumerate() {
        match replayer.step(step)? {
            Outcome::FeatureGates(gates) => info!("step {i}: feature gates: {gates:?}"),
            Outcome::Stored(np) => info!(
                "step {i}: stored {}/{} generation={} resourceVersion={}",
                np.metadata.namespace.as_deref().unwrap_or_default(),
                np.metadata.name.as_deref().unwrap_or_default(),
                np.metadata.generation.unwrap_or_default(),
                np.metadata.resource_version.as_deref().unwrap_or_default(),
            ),
            Outcome::Rejected(e) => {
                ok = false;
                error!("step {i}: {e}");
            }
        }
    }

    let objects = (replayer.store().iter())
        .map(|(_, np)| np)
        .collect::<Vec<_>>();
    print!("{}", serde_yaml::to_string(&objects)?);

    Ok(ok)
}
