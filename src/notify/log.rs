// ABOUTME: Alert sink that writes events to the tracing log.

use async_trait::async_trait;

use super::{AlertSink, Event, EventKind, NotifyError};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, event: &Event) -> Result<(), NotifyError> {
        match event.kind {
            EventKind::Started | EventKind::Succeeded => {
                tracing::info!(target: "shipyard::events", "{}", event.summary())
            }
            EventKind::Failed | EventKind::RolledBack => {
                tracing::warn!(target: "shipyard::events", "{}", event.summary())
            }
        }
        Ok(())
    }
}
