//! Login statistics service binary
//!
//! Consumes login events from Redpanda/Kafka (or JSON lines on stdin) and
//! publishes a statistics record after every accepted event.

use anyhow::Context;
use clap::Parser;
use login_stats::consumer::{
    build_pipeline, spawn_metrics_reporter, ConsumerConfig, ConsumerResult, LoginProcessor,
    Pipeline, RetryPolicy, RunOutcome, StdioTransport, Supervisor, Transport,
};
use login_stats::HourZone;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "login-stats")]
#[command(about = "Streaming user-login statistics", long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, env = "LOGIN_STATS_CONFIG")]
    config: Option<PathBuf>,

    /// Kafka broker addresses
    #[arg(long, env = "LOGIN_STATS_BROKERS")]
    brokers: Option<String>,

    /// Consumer group ID
    #[arg(long, env = "LOGIN_STATS_GROUP_ID")]
    group_id: Option<String>,

    /// Topic carrying login events
    #[arg(long, env = "LOGIN_STATS_INPUT_TOPIC")]
    input_topic: Option<String>,

    /// Topic receiving statistics records
    #[arg(long, env = "LOGIN_STATS_STATS_TOPIC")]
    stats_topic: Option<String>,

    /// Time zone for hour-of-day buckets (IANA name or "local")
    #[arg(long, env = "LOGIN_STATS_TIME_ZONE")]
    time_zone: Option<HourZone>,

    /// Read events from stdin and write statistics to stdout
    #[arg(long)]
    stdin: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn resolve_config(&self) -> anyhow::Result<ConsumerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                ConsumerConfig::from_yaml_file(path)?
            }
            None => ConsumerConfig::default(),
        };

        if let Some(brokers) = &self.brokers {
            config.brokers = brokers.clone();
        }
        if let Some(group_id) = &self.group_id {
            config.group_id = group_id.clone();
        }
        if let Some(topic) = &self.input_topic {
            config.input_topic = topic.clone();
        }
        if let Some(topic) = &self.stats_topic {
            config.stats_topic = topic.clone();
        }
        if let Some(zone) = self.time_zone {
            config.time_zone = zone;
        }

        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("invalid configuration")?;
        Ok(config)
    }
}

async fn supervise<T: Transport>(
    pipeline: Pipeline<LoginProcessor>,
    transport: T,
    policy: RetryPolicy,
) -> ConsumerResult<RunOutcome> {
    info!(transport = transport.name(), "Starting supervisor");
    Supervisor::new(pipeline, transport, policy).run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    login_stats::init_tracing(if args.debug { "debug" } else { "info" }, args.log_json);

    let config = args.resolve_config()?;
    info!(
        version = login_stats::VERSION,
        time_zone = %config.time_zone,
        "Starting login-stats"
    );
    if config.time_zone == HourZone::Local {
        warn!("Hour buckets follow the host time zone");
    }

    let (aggregator, pipeline) = build_pipeline(&config);
    let metrics = pipeline.metrics().clone();
    let shutdown = pipeline.shutdown_state().clone();
    let reporter = spawn_metrics_reporter(&pipeline, config.metrics_interval);

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                shutdown.begin_shutdown();
            }
        });
    }

    let policy = config.restart_policy.clone();
    let result = if args.stdin {
        supervise(pipeline, StdioTransport, policy).await
    } else {
        #[cfg(feature = "kafka")]
        {
            let transport = login_stats::consumer::KafkaTransport::new(config.clone())?;
            supervise(pipeline, transport, policy).await
        }
        #[cfg(not(feature = "kafka"))]
        {
            drop(pipeline);
            anyhow::bail!("Kafka support not enabled. Build with --features kafka or pass --stdin");
        }
    };

    shutdown.begin_shutdown();
    if let Err(e) = shutdown.wait_for_completion(config.shutdown_timeout).await {
        warn!("{}", e);
    }
    if let Err(e) = reporter.await {
        warn!("Metrics reporter ended abnormally: {}", e);
    }

    metrics.log_summary();
    info!(
        total_logins = aggregator.total_logins(),
        distinct_users = aggregator.distinct_users(),
        "Final statistics: {:?}",
        aggregator.snapshot()
    );

    match result {
        Ok(outcome) => {
            info!(?outcome, "login-stats stopped");
            Ok(())
        }
        Err(e) => {
            error!("login-stats failed: {}", e);
            Err(e.into())
        }
    }
}
