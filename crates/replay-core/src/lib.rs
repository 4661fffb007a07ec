//! Replay pipeline core: drift-corrected pacing, topic routing and the
//! session orchestrator that drives normalize -> derive -> pace -> publish.

pub mod pace;
pub mod publish;
pub mod session;

use thiserror::Error;

/// Transport-level failure reported by a [`Publisher`].
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{0}")]
    Msg(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Session-fatal errors. Per-record schema problems are not here on
/// purpose: those are skipped, never propagated.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("invalid replay configuration: {0}")]
    InvalidConfig(String),
    #[error("broker connection failed: {0}")]
    ConnectionFailure(String),
    #[error("publish failed: {0}")]
    TransportFailure(#[from] PublishError),
}

/// The messaging collaborator. Publishing is fire-and-forget at QoS 0;
/// implementations must not block waiting for delivery confirmation.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Establish the broker session. Resolves once the broker has
    /// acknowledged the connection; the orchestrator bounds the wait.
    async fn connect(&mut self) -> Result<(), PublishError>;

    async fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError>;

    /// Best-effort teardown, called on every session exit path.
    async fn disconnect(&mut self);
}
