// ABOUTME: Polls tracked branch heads and emits a trigger when one moves.
// ABOUTME: Exposed as an infinite stream built with futures::stream::unfold.

use futures::Stream;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use super::Trigger;
use crate::config::Config;
use crate::source::SourceRepository;
use crate::types::{EnvironmentName, Revision};

pub struct BranchPoller {
    source: Arc<dyn SourceRepository>,
    interval: Duration,
    watches: Vec<(EnvironmentName, String)>,
    last_known: HashMap<EnvironmentName, Revision>,
}

impl std::fmt::Debug for BranchPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchPoller")
            .field("interval", &self.interval)
            .field("watches", &self.watches)
            .finish()
    }
}

impl BranchPoller {
    pub fn new(source: Arc<dyn SourceRepository>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            watches: Vec::new(),
            last_known: HashMap::new(),
        }
    }

    /// Poller for every configured environment that tracks a branch.
    pub fn from_config(config: &Config, source: Arc<dyn SourceRepository>) -> Self {
        config
            .environments
            .iter()
            .filter_map(|env| env.branch.as_ref().map(|branch| (env.name.clone(), branch.clone())))
            .fold(Self::new(source, config.trigger.poll_interval), |poller, (env, branch)| {
                poller.watch(env, branch)
            })
    }

    pub fn watch(mut self, environment: EnvironmentName, branch: impl Into<String>) -> Self {
        self.watches.push((environment, branch.into()));
        self
    }

    /// Revisions already handled, so the first poll only reports heads that
    /// moved since.
    pub fn with_last_known(mut self, last_known: HashMap<EnvironmentName, Revision>) -> Self {
        self.last_known = last_known;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// Resolve every tracked branch once and report the ones that moved.
    /// Resolution failures are logged and retried on the next poll.
    pub async fn poll_once(&mut self) -> Vec<Trigger> {
        let mut triggers = Vec::new();
        for (environment, branch) in &self.watches {
            let head = match self.source.resolve(branch).await {
                Ok(head) => head,
                Err(e) => {
                    tracing::warn!(%environment, %branch, error = %e, "failed to resolve branch head");
                    continue;
                }
            };
            if self.last_known.get(environment) == Some(&head) {
                continue;
            }
            tracing::info!(%environment, %branch, revision = %head, "branch head moved");
            self.last_known.insert(environment.clone(), head.clone());
            triggers.push(Trigger::new(environment.clone(), head));
        }
        triggers
    }

    /// Poll now, then every `interval`, forever.
    pub fn into_stream(self) -> impl Stream<Item = Trigger> + Send + 'static {
        futures::stream::unfold(
            (self, VecDeque::new(), true),
            |(mut poller, mut queue, mut first)| async move {
                loop {
                    if let Some(trigger) = queue.pop_front() {
                        return Some((trigger, (poller, queue, first)));
                    }
                    if !first {
                        tokio::time::sleep(poller.interval).await;
                    }
                    first = false;
                    queue.extend(poller.poll_once().await);
                }
            },
        )
    }
}
