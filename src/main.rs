//! # Actor Host CLI
//!
//! Boots a small actor system from the runtime configuration and walks
//! through the messaging idioms.
//!
//! ## Usage
//!
//! ```bash
//! # Run the demo system (default)
//! actor-host run --config runtime.yaml
//!
//! # Print the effective configuration
//! actor-host config
//! ```
//!
//! Logging is controlled through `RUST_LOG`, e.g. `RUST_LOG=actor_host=debug`.

use std::{path::PathBuf, time::Duration};

use actor_host::{
    ActorBehavior, ActorContext, ActorIdentity, ActorSpec, RuntimeBuilder, RuntimeConfig,
    domain::error::ActorError
};
use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use ractor::ActorProcessingErr;
use tracing::{Level, event};
use tracing_subscriber::EnvFilter;

/// Main CLI application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct HostCli {
    /// Runtime configuration file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    command: Option<HostCommand>
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
enum HostCommand {
    /// Boot the demo system, exchange a few messages and shut down
    Run {
        /// Number of increments sent to the pooled tally
        #[arg(long, default_value_t = 25)]
        messages: u64
    },
    /// Print the effective configuration as YAML
    Config
}

#[derive(Debug, Clone)]
struct Heartbeat(u64);

#[derive(Debug)]
enum TallyMsg {
    Increment(u64),
    Total
}

/// Pooled accumulator; each instance keeps its own subtotal
#[derive(Default)]
struct Tally {
    total: u64
}

#[async_trait]
impl ActorBehavior for Tally {
    type Msg = TallyMsg;
    type Reply = u64;

    async fn receive(&mut self, message: TallyMsg, ctx: &ActorContext) -> Result<Option<u64>, ActorProcessingErr> {
        match message {
            TallyMsg::Increment(amount) => {
                self.total += amount;
                if self.total % 10 == 0 {
                    ctx.publish(Heartbeat(self.total));
                }
                Ok(None)
            }
            TallyMsg::Total => Ok(Some(self.total))
        }
    }
}

#[derive(Debug)]
enum AuditMsg {
    Heartbeat(Heartbeat),
    Seen
}

impl From<Heartbeat> for AuditMsg {
    fn from(heartbeat: Heartbeat) -> Self {
        AuditMsg::Heartbeat(heartbeat)
    }
}

/// Broadcast subscriber counting heartbeats
#[derive(Default)]
struct Auditor {
    seen: usize
}

#[async_trait]
impl ActorBehavior for Auditor {
    type Msg = AuditMsg;
    type Reply = usize;

    async fn receive(&mut self, message: AuditMsg, ctx: &ActorContext) -> Result<Option<usize>, ActorProcessingErr> {
        match message {
            AuditMsg::Heartbeat(Heartbeat(total)) => {
                self.seen += 1;
                event!(Level::INFO, event = "demo.heartbeat_observed", auditor = %ctx.identity(), total = %total);
                Ok(None)
            }
            AuditMsg::Seen => Ok(Some(self.seen))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("actor_host=info")))
        .init();

    let cli = HostCli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(HostCommand::Run { messages: 25 }) {
        HostCommand::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
        HostCommand::Run { messages } => run_demo(config, messages).await
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::load(path),
        None => RuntimeConfig::load_or_default()
    };
    config.context("failed to load runtime configuration")
}

async fn run_demo(config: RuntimeConfig, messages: u64) -> anyhow::Result<()> {
    let runtime = RuntimeBuilder::new(config)
        .pooled_actor(ActorSpec::<Tally>::from_default())
        .actor(ActorSpec::<Auditor>::from_default().named("primary"))
        .actor(ActorSpec::<Auditor>::from_default().named("secondary"))
        .subscribe::<Auditor, Heartbeat>()
        .start()
        .await
        .context("failed to start actor runtime")?;

    let events = runtime.events();

    for _ in 0..messages {
        if !events.send::<Tally>(TallyMsg::Increment(1)) {
            anyhow::bail!("tally rejected an increment");
        }
    }

    let tally = runtime.lookup::<Tally>(&ActorIdentity::of::<Tally>())?;
    println!("tally instances:   {}", tally.instance_count().await?);
    println!("one subtotal:      {}", events.request::<Tally>(TallyMsg::Total).await);

    events.broadcast(Heartbeat(0));
    tokio::time::sleep(Duration::from_millis(50)).await;

    for name in ["primary", "secondary"] {
        let identity = ActorIdentity::named::<Auditor>(name);
        let seen = events.ask::<Auditor>(&identity, AuditMsg::Seen, runtime.config().ask_timeout()).await;
        println!("{:<18} {}", format!("{} heartbeats:", name), seen);
    }

    let health = runtime.health().await?;
    println!("supervised actors: {}", health.supervised_actors);

    match runtime.shutdown().await {
        Ok(()) | Err(ActorError::Terminated) => Ok(()),
        Err(e) => Err(e.into())
    }
}
