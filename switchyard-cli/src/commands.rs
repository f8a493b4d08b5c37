use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use switchyard_config::SwitchyardConfig;
use switchyard_core::{Endpoint, Event, EventResult};
use switchyard_listener::{
    Acknowledgement, AnalyzeOutcome, HookError, Listener, ListenerHooks, ListenerStats,
    LoopbackTransport,
};

use crate::error::CliError;

/// Peers listen on `9000..9000 + MAX_DESTINATIONS`.
const MAX_DESTINATIONS: u16 = 1_000;

fn destinations_range() -> clap::builder::RangedI64ValueParser<u16> {
    clap::value_parser!(u16).range(1..=i64::from(MAX_DESTINATIONS))
}

#[derive(Parser, Debug)]
#[command(name = "switchyard", version, about)]
pub struct Cli {
    /// Configuration file; defaults to `config/switchyard.yaml` plus `SWITCHYARD_*` overrides.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective configuration as YAML
    Config,
    /// Push requests through a listener over the loopback transport
    Soak(SoakArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SoakArgs {
    /// Requests to accept
    #[arg(long, default_value_t = 1_000)]
    pub events: usize,
    /// Distinct reply destinations
    #[arg(long, default_value_t = 4, value_parser = destinations_range())]
    pub destinations: u16,
    /// Probability that one delivery attempt fails
    #[arg(long, default_value_t = 0.0)]
    pub failure_rate: f64,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Upper bound on the run; pools still holding events are reported as-is
    #[arg(long, default_value_t = 10_000)]
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SoakReport {
    pub accepted: usize,
    pub rejected: usize,
    pub delivered: usize,
    pub abandoned: u64,
    /// Replies the sending pool refused.
    pub dropped: u64,
    pub drained: bool,
    pub elapsed_ms: u128,
    pub listener: ListenerStats,
    /// Prometheus text exposition, present when metrics are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
}

/// Answers every request with success.
struct EchoHooks;

#[async_trait]
impl ListenerHooks for EchoHooks {
    async fn analyze(&self, event: &Event) -> Result<AnalyzeOutcome, HookError> {
        Ok(if event.to_be_processed {
            AnalyzeOutcome::Reply(EventResult::success())
        } else {
            AnalyzeOutcome::Done
        })
    }
}

pub fn load_config(path: Option<&Path>) -> Result<SwitchyardConfig, CliError> {
    Ok(match path {
        Some(path) => SwitchyardConfig::load_from_path(path)?,
        None => SwitchyardConfig::load()?,
    })
}

pub async fn run_soak(args: &SoakArgs, config: &SwitchyardConfig) -> Result<SoakReport, CliError> {
    if !(1..=MAX_DESTINATIONS).contains(&args.destinations) {
        return Err(CliError::InvalidArgument(format!(
            "--destinations must be within 1..={MAX_DESTINATIONS}, got {}",
            args.destinations
        )));
    }
    if !(0.0..=1.0).contains(&args.failure_rate) {
        return Err(CliError::InvalidArgument(format!(
            "--failure-rate must be within 0..=1, got {}",
            args.failure_rate
        )));
    }

    let transport = Arc::new(LoopbackTransport::with_failure_rate(args.failure_rate, args.seed));
    let listener = Listener::new(config, Arc::new(EchoHooks), transport.clone())?;
    listener.start().await?;

    let started = Instant::now();
    let deadline = started + Duration::from_millis(args.duration_ms);
    let me = &config.listener;
    let (mut accepted, mut rejected) = (0, 0);

    info!(events = args.events, destinations = args.destinations, "Soak started");
    for i in 0..args.events {
        let port = 9_000 + (i % usize::from(args.destinations)) as u16;
        let event = Event::new(
            Endpoint::new(format!("peer-{port}"), "127.0.0.1", port),
            Endpoint::new(me.listener_id.clone(), me.address.clone(), me.port),
            "soak",
            json!({ "seq": i }),
        )
        .expecting_reply();

        match listener.accept(event)? {
            Acknowledgement::Accepted => accepted += 1,
            Acknowledgement::Rejected(reason) => {
                warn!(?reason, "Soak event rejected");
                rejected += 1;
            }
        }
    }

    // Every accepted request yields exactly one reply: delivered, abandoned or dropped.
    let settled = |listener: &Listener| {
        let metrics = listener.metrics();
        transport.delivered_count() as u64
            + metrics.deliveries_abandoned.get()
            + metrics.replies_dropped.get()
            >= accepted as u64
    };
    while !settled(&listener) && Instant::now() < deadline {
        sleep(me.poll_interval()).await;
    }
    listener.stop().await?;

    let pools = listener.pools();
    let drained =
        pools.incoming.is_empty() && pools.processing.is_empty() && pools.sending.is_empty();

    Ok(SoakReport {
        accepted,
        rejected,
        delivered: transport.delivered_count(),
        abandoned: listener.metrics().deliveries_abandoned.get(),
        dropped: listener.metrics().replies_dropped.get(),
        drained,
        elapsed_ms: started.elapsed().as_millis(),
        listener: listener.stats(),
        metrics: config
            .telemetry
            .metrics_enabled
            .then(|| listener.metrics().gather_metrics())
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soak(args: &[&str]) -> SoakArgs {
        let cli = Cli::try_parse_from([&["switchyard", "soak"][..], args].concat()).unwrap();
        match cli.command {
            Commands::Soak(args) => args,
            other => panic!("expected soak, got {other:?}"),
        }
    }

    fn quick_config() -> SwitchyardConfig {
        let mut config = SwitchyardConfig::default();
        config.listener.poll_interval_ms = 1;
        config.listener.sweep_interval_ms = 10;
        config
    }

    #[test]
    fn parses_soak_arguments() {
        let args = soak(&["--events", "50", "--failure-rate", "0.25", "--seed", "9"]);
        assert_eq!(args.events, 50);
        assert_eq!(args.failure_rate, 0.25);
        assert_eq!(args.seed, 9);
        assert_eq!(args.destinations, 4);
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["switchyard", "config", "--config", "alt.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.yaml")));
        assert!(matches!(cli.command, Commands::Config));
    }

    #[tokio::test]
    async fn reliable_soak_delivers_every_reply() {
        let args = soak(&["--events", "40", "--destinations", "3"]);
        let report = run_soak(&args, &quick_config()).await.unwrap();

        assert!(report.drained);
        assert_eq!(report.accepted, 40);
        assert_eq!(report.delivered, 40);
        assert_eq!(report.abandoned, 0);
        assert_eq!(report.listener.sending.total_removed, 40);
        assert!(report
            .metrics
            .unwrap()
            .contains("switchyard_deliveries_total 40"));
    }

    #[tokio::test]
    async fn lossy_soak_accounts_for_every_reply() {
        let args = soak(&["--events", "60", "--failure-rate", "0.5", "--seed", "3"]);
        let report = run_soak(&args, &quick_config()).await.unwrap();

        assert!(report.drained);
        assert_eq!(report.delivered as u64 + report.abandoned, 60);
    }

    #[test]
    fn destinations_out_of_range_are_refused_by_the_parser() {
        for bad in ["0", "1001", "60000"] {
            assert!(Cli::try_parse_from(["switchyard", "soak", "--destinations", bad]).is_err());
        }
        assert_eq!(soak(&["--destinations", "1000"]).destinations, 1_000);
    }

    #[tokio::test]
    async fn zero_destinations_is_refused() {
        let mut args = soak(&[]);
        args.destinations = 0;
        assert!(matches!(
            run_soak(&args, &quick_config()).await,
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn soak_settles_when_the_outbox_refuses_replies() {
        let mut config = quick_config();
        config.pools.sending.max_size = 1;
        config.pools.sending.overflow_policy = switchyard_core::OverflowPolicy::DropNewest;
        let args = soak(&["--events", "30", "--duration-ms", "5000"]);
        let report = run_soak(&args, &config).await.unwrap();

        assert_eq!(report.accepted, 30);
        assert_eq!(report.delivered as u64 + report.abandoned + report.dropped, 30);
    }
}
