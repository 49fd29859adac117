// ABOUTME: Fire-and-forget delivery of pipeline events to configured alert sinks.
// ABOUTME: A background task drains an unbounded queue so callers never block.

mod command;
mod error;
mod log;
mod webhook;

pub use command::CommandSink;
pub use error::NotifyError;
pub use log::LogSink;
pub use webhook::WebhookSink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::config::SinkConfig;
use crate::diagnostics::Warning;
use crate::rollout::{AttemptOutcome, RolloutAttempt};
use crate::types::{ArtifactHash, AttemptId, EnvironmentName, Revision};

/// Upper bound on a single sink delivery.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Started,
    Succeeded,
    Failed,
    RolledBack,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Started => "started",
            EventKind::Succeeded => "succeeded",
            EventKind::Failed => "failed",
            EventKind::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

/// A pipeline transition worth telling someone about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub environment: EnvironmentName,
    pub revision: Revision,
    pub attempt: AttemptId,
    pub from_artifact: Option<ArtifactHash>,
    pub to_artifact: Option<ArtifactHash>,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    fn from_attempt(kind: EventKind, attempt: &RolloutAttempt) -> Self {
        Self {
            kind,
            environment: attempt.environment.clone(),
            revision: attempt.revision.clone(),
            attempt: attempt.id.clone(),
            from_artifact: attempt.from_artifact.clone(),
            to_artifact: attempt.to_artifact.clone(),
            reason: attempt.reason.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn started(attempt: &RolloutAttempt) -> Self {
        Self::from_attempt(EventKind::Started, attempt)
    }

    /// Terminal event for a finished attempt.
    pub fn finished(attempt: &RolloutAttempt) -> Self {
        let kind = match attempt.outcome {
            Some(AttemptOutcome::Succeeded) => EventKind::Succeeded,
            Some(AttemptOutcome::RolledBack) => EventKind::RolledBack,
            Some(AttemptOutcome::Failed) | None => EventKind::Failed,
        };
        Self::from_attempt(kind, attempt)
    }

    /// Event fields as `SHIPYARD_*` environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("SHIPYARD_EVENT".to_string(), self.kind.to_string());
        env.insert("SHIPYARD_ENVIRONMENT".to_string(), self.environment.to_string());
        env.insert("SHIPYARD_REVISION".to_string(), self.revision.to_string());
        env.insert("SHIPYARD_ATTEMPT".to_string(), self.attempt.to_string());
        if let Some(ref hash) = self.to_artifact {
            env.insert("SHIPYARD_ARTIFACT".to_string(), hash.to_string());
        }
        if let Some(ref hash) = self.from_artifact {
            env.insert("SHIPYARD_PREVIOUS_ARTIFACT".to_string(), hash.to_string());
        }
        if let Some(ref reason) = self.reason {
            env.insert("SHIPYARD_REASON".to_string(), reason.clone());
        }
        env
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} {} on {} (attempt {})",
            self.revision,
            self.kind,
            self.environment,
            self.attempt.short()
        );
        if let Some(ref reason) = self.reason {
            line.push_str(": ");
            line.push_str(reason);
        }
        line
    }
}

/// Somewhere events are delivered.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, event: &Event) -> Result<(), NotifyError>;
}

enum Message {
    Event(Event),
    Flush(oneshot::Sender<Vec<Warning>>),
}

/// Handle for queueing events. Cheap to clone.
#[derive(Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Message>>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("enabled", &self.tx.is_some())
            .finish()
    }
}

impl Notifier {
    /// Start the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(rx, sinks));
        Self { tx: Some(tx) }
    }

    /// Build sinks from configuration and start delivering.
    pub fn from_config(sinks: &[SinkConfig]) -> Result<Self, NotifyError> {
        let sinks = sinks
            .iter()
            .map(|config| -> Result<Arc<dyn AlertSink>, NotifyError> {
                Ok(match config {
                    SinkConfig::Log => Arc::new(LogSink),
                    SinkConfig::Webhook { url } => Arc::new(WebhookSink::new(url)?),
                    SinkConfig::Command { path } => Arc::new(CommandSink::new(path.clone())),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::spawn(sinks))
    }

    /// A notifier that drops every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Queue an event. Never blocks; delivery happens in the background.
    pub fn notify(&self, event: Event) {
        if let Some(tx) = &self.tx
            && tx.send(Message::Event(event)).is_err()
        {
            tracing::debug!("notifier task gone, dropping event");
        }
    }

    /// Wait until everything queued so far has been delivered and return the
    /// delivery failures collected since the last flush.
    pub async fn flush(&self) -> Vec<Warning> {
        let Some(tx) = &self.tx else {
            return Vec::new();
        };
        let (reply, rx) = oneshot::channel();
        if tx.send(Message::Flush(reply)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<Message>, sinks: Vec<Arc<dyn AlertSink>>) {
    let mut failures = Vec::new();

    while let Some(message) = rx.recv().await {
        match message {
            Message::Event(event) => {
                for sink in &sinks {
                    let failure = match tokio::time::timeout(DELIVERY_TIMEOUT, sink.deliver(&event)).await {
                        Ok(Ok(())) => continue,
                        Ok(Err(e)) => e.to_string(),
                        Err(_) => format!("timed out after {}s", DELIVERY_TIMEOUT.as_secs()),
                    };
                    tracing::warn!(sink = sink.name(), event = %event.kind, error = %failure, "notification delivery failed");
                    failures.push(Warning::notify_delivery(format!(
                        "{} sink failed to deliver {} event: {failure}",
                        sink.name(),
                        event.kind
                    )));
                }
            }
            Message::Flush(reply) => {
                let _ = reply.send(std::mem::take(&mut failures));
            }
        }
    }
}
