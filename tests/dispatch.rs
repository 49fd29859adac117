// ABOUTME: Dispatcher scheduling tests: per-environment serialisation and trigger coalescing.
// ABOUTME: A gated host holds attempts in flight so queue states can be observed.

mod support;

use shipyard::dispatch::{Dispatcher, SubmitOutcome};
use shipyard::rollout::AttemptOutcome;
use shipyard::trigger::Trigger;
use shipyard::types::{EnvironmentName, Revision};
use std::sync::Arc;
use std::time::Duration;
use support::{Harness, HostCall, ScriptedHost, env};
use tokio::sync::Semaphore;

async fn wait_in_flight(dispatcher: &Dispatcher, environment: &EnvironmentName, revision: &Revision) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while dispatcher.snapshot(environment).in_flight.as_ref() != Some(revision) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("attempt never started");
}

fn gated_harness() -> (Harness, Arc<Semaphore>) {
    let gate = Arc::new(Semaphore::new(0));
    let harness = Harness::builder()
        .host(ScriptedHost::gated(gate.clone()))
        .build();
    (harness, gate)
}

#[tokio::test]
async fn busy_environment_keeps_only_the_newest_trigger() {
    let (h, gate) = gated_harness();
    let a = h.source.commit("aaa111");
    let b = h.source.commit("bbb222");
    let c = h.source.commit("ccc333");
    let (dispatcher, mut events) = Dispatcher::new(h.controller.clone());
    let prod = env("prod");

    assert_eq!(dispatcher.submit(Trigger::new(prod.clone(), a.clone())), SubmitOutcome::Started);
    wait_in_flight(&dispatcher, &prod, &a).await;

    assert_eq!(dispatcher.submit(Trigger::new(prod.clone(), b.clone())), SubmitOutcome::Queued);
    assert_eq!(
        dispatcher.submit(Trigger::new(prod.clone(), c.clone())),
        SubmitOutcome::Coalesced { superseded: b.clone() }
    );
    assert_eq!(dispatcher.submit(Trigger::new(prod.clone(), c.clone())), SubmitOutcome::Duplicate);
    assert_eq!(dispatcher.submit(Trigger::new(prod.clone(), a.clone())), SubmitOutcome::Duplicate);

    let snapshot = dispatcher.snapshot(&prod);
    assert_eq!(snapshot.in_flight, Some(a.clone()));
    assert_eq!(snapshot.queued, Some(c.clone()));

    gate.add_permits(10);
    dispatcher.wait_idle().await;

    let first = events.completed.recv().await.unwrap();
    let second = events.completed.recv().await.unwrap();
    assert_eq!(first.revision, a);
    assert_eq!(second.revision, c);
    assert_eq!(second.outcome, Some(AttemptOutcome::Succeeded));
    assert_eq!(second.from_artifact, first.to_artifact);

    let ran: Vec<_> = h
        .host
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            HostCall::Run(_, revision) => Some(revision),
            HostCall::Stop(_) => None,
        })
        .collect();
    assert_eq!(ran, vec![a, c]);

    dispatcher.shutdown().await;
}

#[tokio::test]
async fn environments_roll_out_in_parallel() {
    let (h, gate) = gated_harness();
    let a = h.source.commit("aaa111");
    let (dispatcher, mut events) = Dispatcher::new(h.controller.clone());

    dispatcher.submit(Trigger::new(env("prod"), a.clone()));
    dispatcher.submit(Trigger::new(env("staging"), a.clone()));

    // Both are in flight at once while the host holds them.
    wait_in_flight(&dispatcher, &env("prod"), &a).await;
    wait_in_flight(&dispatcher, &env("staging"), &a).await;

    gate.add_permits(2);
    dispatcher.wait_idle().await;

    let mut finished = vec![
        events.completed.recv().await.unwrap(),
        events.completed.recv().await.unwrap(),
    ];
    finished.sort_by(|x, y| x.environment.cmp(&y.environment));
    assert_eq!(finished[0].environment, env("prod"));
    assert_eq!(finished[1].environment, env("staging"));
    assert!(finished.iter().all(|attempt| attempt.outcome == Some(AttemptOutcome::Succeeded)));

    // One artifact serves both environments.
    assert_eq!(finished[0].to_artifact, finished[1].to_artifact);
    assert_eq!(h.store.len(), 1);

    dispatcher.shutdown().await;
}

#[tokio::test]
async fn cancel_reaches_the_in_flight_attempt() {
    let (h, _gate) = gated_harness();
    let a = h.source.commit("aaa111");
    let (dispatcher, mut events) = Dispatcher::new(h.controller.clone());
    let prod = env("prod");

    assert!(!dispatcher.cancel(&prod), "nothing to cancel yet");

    dispatcher.submit(Trigger::new(prod.clone(), a.clone()));
    wait_in_flight(&dispatcher, &prod, &a).await;
    assert!(dispatcher.cancel(&prod));

    let attempt = events.completed.recv().await.unwrap();
    assert_eq!(attempt.outcome, Some(AttemptOutcome::RolledBack));
    assert_eq!(attempt.reason.as_deref(), Some("cancelled by operator"));
    assert_eq!(h.host.calls(), vec![HostCall::Stop(prod.clone())]);

    dispatcher.wait_idle().await;
    assert!(!dispatcher.cancel(&prod));
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn cancel_right_after_start_is_not_lost() {
    let (h, _gate) = gated_harness();
    let a = h.source.commit("aaa111");
    let (dispatcher, mut events) = Dispatcher::new(h.controller.clone());
    let prod = env("prod");

    assert_eq!(dispatcher.submit(Trigger::new(prod.clone(), a.clone())), SubmitOutcome::Started);
    assert!(dispatcher.cancel(&prod));

    let attempt = events.completed.recv().await.unwrap();
    assert_eq!(attempt.reason.as_deref(), Some("cancelled by operator"));
    assert_ne!(attempt.outcome, Some(AttemptOutcome::Succeeded));
    assert!(attempt.to_artifact.is_none());
    assert_eq!(h.registry.get(&prod).unwrap().current_artifact, None);

    dispatcher.wait_idle().await;
    assert!(!dispatcher.cancel(&prod));
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn shutdown_drops_queued_triggers() {
    let (h, gate) = gated_harness();
    let a = h.source.commit("aaa111");
    let b = h.source.commit("bbb222");
    let (dispatcher, mut events) = Dispatcher::new(h.controller.clone());
    let prod = env("prod");

    dispatcher.submit(Trigger::new(prod.clone(), a.clone()));
    wait_in_flight(&dispatcher, &prod, &a).await;
    assert_eq!(dispatcher.submit(Trigger::new(prod.clone(), b)), SubmitOutcome::Queued);

    gate.add_permits(10);
    dispatcher.shutdown().await;

    assert_eq!(events.completed.recv().await.unwrap().revision, a);
    assert!(events.completed.try_recv().is_err());
}
