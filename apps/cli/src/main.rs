use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;
use replay_core::publish::{Projection, TopicRoute};
use replay_core::session::{ReplayConfig, ReplaySession, SessionOutcome};
use replay_mqtt::{MqttConfig, MqttPublisher};
use replay_schema::HeadingStrategy;
use tokio::signal;
use tokio::sync::watch;

#[derive(Parser)]
#[command(author, version, about = "Replay recorded telemetry over MQTT")]
struct Args {
    /// CSV telemetry file to replay
    csv_file: PathBuf,
    /// Playback speed multiplier (1.0 = real time)
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
    /// Broker hostname
    #[arg(long, default_value = "localhost")]
    host: String,
    /// Broker port
    #[arg(long, default_value_t = 1883)]
    port: u16,
    #[arg(long, env = "REPLAY_MQTT_USERNAME", default_value = "")]
    username: String,
    #[arg(long, env = "REPLAY_MQTT_PASSWORD", default_value = "")]
    password: String,
    /// Use TLS for the broker connection
    #[arg(long)]
    tls: bool,
    /// Topic for the canonical telemetry payload
    #[arg(long, default_value = "car/telemetry")]
    telemetry_topic: String,
    /// Topic for the position-only payload
    #[arg(long, default_value = "car/pi_gps")]
    position_topic: String,
    /// Publish only the canonical telemetry topic
    #[arg(long)]
    no_position_topic: bool,
    /// Heading computation between consecutive GPS fixes
    #[arg(long, value_enum, default_value_t = HeadingArg::Spherical)]
    heading: HeadingArg,
    /// Log publish failures and keep going instead of stopping
    #[arg(long)]
    continue_on_publish_error: bool,
    /// Progress line interval, in records
    #[arg(long, default_value_t = 50)]
    progress_every: usize,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum HeadingArg {
    /// Great-circle initial bearing
    Spherical,
    /// Flat atan2 approximation used by the older replay script
    Flat,
}

impl From<HeadingArg> for HeadingStrategy {
    fn from(arg: HeadingArg) -> Self {
        match arg {
            HeadingArg::Spherical => HeadingStrategy::Spherical,
            HeadingArg::Flat => HeadingStrategy::FlatApprox,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!(
        "replaying {} at {}x via {}:{}",
        args.csv_file.display(),
        args.speed,
        args.host,
        args.port
    );

    let records = replay_io::load_records(&args.csv_file)?;
    anyhow::ensure!(
        !records.is_empty(),
        "no records to replay in {}",
        args.csv_file.display()
    );

    let mut routes = vec![TopicRoute::new(
        args.telemetry_topic.clone(),
        Projection::Telemetry,
    )];
    if !args.no_position_topic {
        routes.push(TopicRoute::new(
            args.position_topic.clone(),
            Projection::PositionOnly,
        ));
    }

    let config = ReplayConfig {
        speed: args.speed,
        heading: args.heading.into(),
        routes,
        stop_on_publish_error: !args.continue_on_publish_error,
        progress_every: args.progress_every.max(1),
        ..ReplayConfig::default()
    };

    let publisher = MqttPublisher::new(MqttConfig {
        host: args.host,
        port: args.port,
        username: args.username,
        password: args.password,
        use_tls: args.tls,
        ..MqttConfig::default()
    });

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping replay");
            let _ = cancel_tx.send(true);
        }
    });

    let mut session = ReplaySession::new(publisher, config);
    let report = session
        .run(records, cancel_rx)
        .await
        .context("replay session failed")?;

    let outcome = match report.outcome {
        SessionOutcome::Completed => "complete",
        SessionOutcome::Cancelled => "cancelled",
    };
    info!(
        "replay {outcome}: {} records published, {} skipped",
        report.published, report.skipped
    );
    Ok(())
}
