// ABOUTME: Sources of deploy triggers: branch polling and an HTTP webhook.
// ABOUTME: Merges them into one lazy stream that drops repeated notifications.

mod cursor;
mod error;
mod poll;
mod webhook;

pub use cursor::TriggerCursor;
pub use error::TriggerError;
pub use poll::BranchPoller;
pub use webhook::{MAX_PAYLOAD_BYTES, Routes, WebhookListener, WebhookPayload};

use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;

use crate::types::{EnvironmentName, Revision};

/// Request to roll `revision` out to `environment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Trigger {
    pub environment: EnvironmentName,
    pub revision: Revision,
}

impl Trigger {
    pub fn new(environment: EnvironmentName, revision: Revision) -> Self {
        Self {
            environment,
            revision,
        }
    }
}

/// Interleave trigger sources and drop a trigger when its environment's
/// previous trigger named the same revision.
pub fn merge(sources: Vec<BoxStream<'static, Trigger>>) -> BoxStream<'static, Trigger> {
    let mut last: HashMap<EnvironmentName, Revision> = HashMap::new();
    futures::stream::select_all(sources)
        .filter(move |trigger| {
            let fresh = last.get(&trigger.environment) != Some(&trigger.revision);
            if fresh {
                last.insert(trigger.environment.clone(), trigger.revision.clone());
            } else {
                tracing::debug!(
                    environment = %trigger.environment,
                    revision = %trigger.revision,
                    "dropping repeated trigger"
                );
            }
            futures::future::ready(fresh)
        })
        .boxed()
}
