//! The replay orchestrator: owns the per-session state and drives each
//! record through normalize -> derive -> pace -> publish.

use std::time::Duration;

use log::{error, info, warn};
use replay_model::RawRecord;
use replay_schema::{augment, HeadingStrategy, Normalizer};
use tokio::sync::watch;

use crate::pace::{Pacer, DEFAULT_SLEEP_CEILING};
use crate::publish::{render, Projection, TopicRoute};
use crate::{Publisher, ReplayError};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROGRESS_EVERY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Replaying,
    Completed,
    Cancelled,
    Failed,
}

/// How a session that was not aborted by an error finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub outcome: SessionOutcome,
    /// Records that went through the full pipeline and were published.
    pub published: usize,
    /// Records dropped for schema reasons.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Playback speed multiplier; 1.0 reproduces the recorded cadence.
    pub speed: f64,
    pub sleep_ceiling: Duration,
    pub connect_timeout: Duration,
    /// Emit a progress line every this many records.
    pub progress_every: usize,
    pub heading: HeadingStrategy,
    pub routes: Vec<TopicRoute>,
    /// When false, publish failures are logged and the session keeps
    /// going best-effort.
    pub stop_on_publish_error: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            sleep_ceiling: DEFAULT_SLEEP_CEILING,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            progress_every: DEFAULT_PROGRESS_EVERY,
            heading: HeadingStrategy::default(),
            // The dashboard feeds the original replayer always served.
            routes: vec![
                TopicRoute::new("car/telemetry", Projection::Telemetry),
                TopicRoute::new("car/pi_gps", Projection::PositionOnly),
            ],
            stop_on_publish_error: true,
        }
    }
}

impl ReplayConfig {
    fn validate(&self) -> Result<(), ReplayError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ReplayError::InvalidConfig(format!(
                "speed multiplier must be positive, got {}",
                self.speed
            )));
        }
        if self.routes.is_empty() {
            return Err(ReplayError::InvalidConfig(
                "no output topics configured".into(),
            ));
        }
        if self.progress_every == 0 {
            return Err(ReplayError::InvalidConfig(
                "progress interval must be at least 1 record".into(),
            ));
        }
        Ok(())
    }
}

/// One replay run. Created per session and discarded afterwards; the
/// orchestrator task is the only owner of the mutable state.
pub struct ReplaySession<P> {
    config: ReplayConfig,
    publisher: P,
    state: SessionState,
}

impl<P: Publisher> ReplaySession<P> {
    pub fn new(publisher: P, config: ReplayConfig) -> Self {
        Self {
            config,
            publisher,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion, cancellation or failure. Sending
    /// `true` on the watch channel stops the replay promptly, including
    /// mid-sleep. The publisher is disconnected on every exit path that
    /// reached a connection.
    pub async fn run<I>(
        &mut self,
        records: I,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<ReplayReport, ReplayError>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        self.config.validate()?;

        self.state = SessionState::Connecting;
        info!(
            "connecting to broker (timeout {:?})",
            self.config.connect_timeout
        );
        match tokio::time::timeout(self.config.connect_timeout, self.publisher.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.state = SessionState::Failed;
                return Err(ReplayError::ConnectionFailure(err.to_string()));
            }
            Err(_) => {
                self.state = SessionState::Failed;
                return Err(ReplayError::ConnectionFailure(format!(
                    "no acknowledgment within {:?}",
                    self.config.connect_timeout
                )));
            }
        }

        self.state = SessionState::Replaying;
        let result = self.replay_loop(records, &mut cancel).await;
        self.publisher.disconnect().await;

        self.state = match &result {
            Ok(report) => match report.outcome {
                SessionOutcome::Completed => SessionState::Completed,
                SessionOutcome::Cancelled => SessionState::Cancelled,
            },
            Err(_) => SessionState::Failed,
        };
        result
    }

    async fn replay_loop<I>(
        &mut self,
        records: I,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<ReplayReport, ReplayError>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let normalizer = Normalizer::with_default_rules();
        let mut pacer = Pacer::new(self.config.speed, self.config.sleep_ceiling);
        let mut prev_fix: Option<(f64, f64)> = None;
        let mut published = 0usize;
        let mut skipped = 0usize;

        for (index, row) in records.into_iter().enumerate() {
            if *cancel.borrow() {
                return Ok(ReplayReport {
                    outcome: SessionOutcome::Cancelled,
                    published,
                    skipped,
                });
            }

            let mut rec = match normalizer.normalize(&row) {
                Ok(rec) => rec,
                Err(err) => {
                    warn!("skipping row {index}: {err}");
                    skipped += 1;
                    continue;
                }
            };

            augment(&mut rec, prev_fix, self.config.heading);
            prev_fix = Some((rec.telemetry.latitude, rec.telemetry.longitude));

            let wait = pacer.delay(rec.telemetry.source_timestamp);
            if !wait.is_zero() {
                let deadline = tokio::time::Instant::now() + wait;
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break,
                        changed = cancel.changed() => {
                            if *cancel.borrow() {
                                return Ok(ReplayReport {
                                    outcome: SessionOutcome::Cancelled,
                                    published,
                                    skipped,
                                });
                            }
                            if changed.is_err() {
                                // Cancel side gone; finish the wait.
                                tokio::time::sleep_until(deadline).await;
                                break;
                            }
                        }
                    }
                }
            }

            for route in &self.config.routes {
                let payload = render(route.projection, &rec.telemetry).to_string();
                if let Err(err) = self.publisher.publish(&route.topic, payload).await {
                    if self.config.stop_on_publish_error {
                        error!("publish to {} failed: {err}", route.topic);
                        return Err(ReplayError::TransportFailure(err));
                    }
                    warn!("publish to {} failed, continuing: {err}", route.topic);
                }
            }
            published += 1;

            if index % self.config.progress_every == 0 {
                let t = &rec.telemetry;
                info!(
                    "[{index}] lat {:.6} lon {:.6} speed {:.1} km/h heading {:.1}",
                    t.latitude, t.longitude, t.speed, t.heading
                );
            }
        }

        Ok(ReplayReport {
            outcome: SessionOutcome::Completed,
            published,
            skipped,
        })
    }
}
