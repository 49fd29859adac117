// ABOUTME: Watch command implementation.
// ABOUTME: Runs the trigger listener and dispatcher until Ctrl-C or an audit log fault.

use futures::StreamExt;
use futures::stream::BoxStream;
use shipyard::audit::AuditLog;
use shipyard::config::Config;
use shipyard::diagnostics::{Diagnostics, Warning};
use shipyard::dispatch::{Dispatcher, SubmitOutcome};
use shipyard::error::{Error, Result};
use shipyard::output::Output;
use shipyard::rollout::{DeployLock, RolloutAttempt};
use shipyard::trigger::{self, BranchPoller, Trigger, TriggerCursor, WebhookListener};

use super::context::Pipeline;
use super::describe_attempt;

pub async fn watch(config: &Config, output: &Output) -> Result<()> {
    let mut diag = Diagnostics::default();

    // Hold every environment's deploy lock so one-off deploys report busy.
    let locks = config
        .environment_names()
        .iter()
        .map(|name| DeployLock::acquire(&config.locks_dir(), name, false))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let pipeline = Pipeline::open(config, &mut diag)?;
    let mut cursor = TriggerCursor::load(config.trigger_cursor_path())?;

    // Environments the cursor has not seen yet fall back to their last audited attempt.
    let mut last_known = AuditLog::new(config.audit_path()).latest_revisions().await?;
    last_known.extend(cursor.revisions());

    let mut sources: Vec<BoxStream<'static, Trigger>> = Vec::new();
    let poller = BranchPoller::from_config(config, pipeline.source.clone())
        .with_last_known(last_known);
    if !poller.is_empty() {
        sources.push(poller.into_stream().boxed());
    }
    let _listener = match &config.trigger.webhook {
        Some(webhook) => {
            let routes = WebhookListener::routes_from_config(config);
            let (listener, stream) = WebhookListener::bind(webhook.listen, routes).await?;
            output.progress(&format!("Listening for webhooks on {}", listener.local_addr()));
            sources.push(stream.boxed());
            Some(listener)
        }
        None => None,
    };
    if sources.is_empty() {
        return Err(Error::InvalidConfig(
            "nothing to watch: no environment tracks a branch and no webhook is configured"
                .to_string(),
        ));
    }

    let (dispatcher, mut events) = Dispatcher::new(pipeline.controller.clone());
    let mut triggers = trigger::merge(sources);
    output.progress("Watching for changes (Ctrl-C to stop)");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            Some(trigger) = triggers.next() => {
                let message = match dispatcher.submit(trigger.clone()) {
                    SubmitOutcome::Started => format!("{}: deploying {}", trigger.environment, trigger.revision),
                    SubmitOutcome::Queued => format!("{}: queued {}", trigger.environment, trigger.revision),
                    SubmitOutcome::Coalesced { superseded } => format!(
                        "{}: queued {} (replaces {superseded})",
                        trigger.environment, trigger.revision
                    ),
                    SubmitOutcome::Duplicate => continue,
                };
                output.progress(&message);
            }
            Some(attempt) = events.completed.recv() => {
                finished(&mut cursor, &attempt, output);
            }
            Some(fault) = events.faults.recv() => {
                dispatcher.cancel_all();
                break Err(Error::Audit(fault));
            }
            _ = &mut ctrl_c => {
                output.progress("Stopping, rolling back in-flight attempts...");
                dispatcher.cancel_all();
                break Ok(());
            }
        }
    };

    dispatcher.shutdown().await;
    while let Ok(attempt) = events.completed.try_recv() {
        finished(&mut cursor, &attempt, output);
    }

    diag.extend(pipeline.controller.notifier().flush().await);
    for lock in locks {
        if let Err(e) = lock.release() {
            diag.warn(Warning::lock_release(e.to_string()));
        }
    }
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
    result
}

fn finished(cursor: &mut TriggerCursor, attempt: &RolloutAttempt, output: &Output) {
    if let Err(e) = cursor.record(&attempt.environment, &attempt.revision) {
        tracing::warn!("failed to persist trigger cursor: {}", e);
    }
    output.record(&describe_attempt(attempt), attempt);
}
