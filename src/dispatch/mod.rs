// ABOUTME: Serialises rollouts per environment while running environments in parallel.
// ABOUTME: Busy environments keep at most one queued trigger; the newest revision wins.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use crate::audit::AuditError;
use crate::rollout::{CancelHandle, CancelSignal, Controller, RolloutAttempt, cancel_pair};
use crate::trigger::Trigger;
use crate::types::{EnvironmentName, Revision};

/// What `submit` did with a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The environment was idle; an attempt starts now.
    Started,
    /// The environment is busy; the trigger waits for the current attempt.
    Queued,
    /// Replaced an older queued trigger, which will never run.
    Coalesced { superseded: Revision },
    /// Same revision as the one queued or in flight.
    Duplicate,
}

/// Point-in-time view of one environment's work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub in_flight: Option<Revision>,
    pub queued: Option<Revision>,
}

#[derive(Default)]
struct SlotState {
    pending: Option<Revision>,
    in_flight: Option<Revision>,
    /// Set whenever an attempt is started or about to start, so `cancel`
    /// never misses the window before the worker picks the trigger up.
    cancel: Option<CancelHandle>,
    armed: Option<CancelSignal>,
    closed: bool,
}

impl SlotState {
    fn arm(&mut self) {
        let (handle, signal) = cancel_pair();
        self.cancel = Some(handle);
        self.armed = Some(signal);
    }
}

#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
    wake: Notify,
}

/// Fan-out of triggers to one worker task per environment.
pub struct Dispatcher {
    controller: Arc<Controller>,
    slots: Mutex<HashMap<EnvironmentName, Arc<Slot>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    progress: Arc<Notify>,
    completed: mpsc::UnboundedSender<RolloutAttempt>,
    faults: mpsc::UnboundedSender<AuditError>,
}

/// Receiving ends for finished attempts and process-level faults.
pub struct DispatcherEvents {
    pub completed: mpsc::UnboundedReceiver<RolloutAttempt>,
    pub faults: mpsc::UnboundedReceiver<AuditError>,
}

impl Dispatcher {
    pub fn new(controller: Arc<Controller>) -> (Self, DispatcherEvents) {
        let (completed_tx, completed) = mpsc::unbounded_channel();
        let (faults_tx, faults) = mpsc::unbounded_channel();
        let dispatcher = Self {
            controller,
            slots: Mutex::new(HashMap::new()),
            workers: Mutex::new(Vec::new()),
            progress: Arc::new(Notify::new()),
            completed: completed_tx,
            faults: faults_tx,
        };
        (dispatcher, DispatcherEvents { completed, faults })
    }

    pub fn submit(&self, trigger: Trigger) -> SubmitOutcome {
        let slot = self.slot(&trigger.environment);
        let outcome = {
            let mut state = slot.state.lock();
            if state.in_flight.as_ref() == Some(&trigger.revision)
                || state.pending.as_ref() == Some(&trigger.revision)
            {
                SubmitOutcome::Duplicate
            } else {
                let busy = state.in_flight.is_some();
                match state.pending.replace(trigger.revision.clone()) {
                    Some(superseded) => SubmitOutcome::Coalesced { superseded },
                    None if busy => SubmitOutcome::Queued,
                    None => {
                        state.arm();
                        SubmitOutcome::Started
                    }
                }
            }
        };

        tracing::debug!(
            environment = %trigger.environment,
            revision = %trigger.revision,
            ?outcome,
            "trigger submitted"
        );
        if outcome != SubmitOutcome::Duplicate {
            slot.wake.notify_one();
        }
        outcome
    }

    /// Cancel the environment's in-flight attempt. Returns false when idle.
    pub fn cancel(&self, environment: &EnvironmentName) -> bool {
        let Some(slot) = self.slots.lock().get(environment).cloned() else {
            return false;
        };
        let state = slot.state.lock();
        match &state.cancel {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight attempt.
    pub fn cancel_all(&self) {
        let slots: Vec<_> = self.slots.lock().values().cloned().collect();
        for slot in slots {
            if let Some(handle) = &slot.state.lock().cancel {
                handle.cancel();
            }
        }
    }

    pub fn snapshot(&self, environment: &EnvironmentName) -> SlotSnapshot {
        let Some(slot) = self.slots.lock().get(environment).cloned() else {
            return SlotSnapshot::default();
        };
        let state = slot.state.lock();
        SlotSnapshot {
            in_flight: state.in_flight.clone(),
            queued: state.pending.clone(),
        }
    }

    fn is_idle(&self) -> bool {
        self.slots.lock().values().all(|slot| {
            let state = slot.state.lock();
            state.pending.is_none() && state.in_flight.is_none()
        })
    }

    /// Wait until no environment has work queued or in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.progress.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Drop queued triggers, let in-flight attempts finish, and stop the workers.
    pub async fn shutdown(&self) {
        let slots: Vec<_> = self.slots.lock().values().cloned().collect();
        for slot in slots {
            let mut state = slot.state.lock();
            state.closed = true;
            if let Some(dropped) = state.pending.take() {
                tracing::info!(revision = %dropped, "dropping queued trigger on shutdown");
            }
            if state.in_flight.is_none() {
                state.cancel = None;
                state.armed = None;
            }
            drop(state);
            slot.wake.notify_one();
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("dispatcher worker panicked: {}", e);
            }
        }
    }

    fn slot(&self, environment: &EnvironmentName) -> Arc<Slot> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(environment) {
            return slot.clone();
        }

        let slot = Arc::new(Slot::default());
        slots.insert(environment.clone(), slot.clone());

        let worker = Worker {
            environment: environment.clone(),
            slot: slot.clone(),
            controller: self.controller.clone(),
            progress: self.progress.clone(),
            completed: self.completed.clone(),
            faults: self.faults.clone(),
        };
        self.workers.lock().push(tokio::spawn(worker.run()));
        slot
    }
}

struct Worker {
    environment: EnvironmentName,
    slot: Arc<Slot>,
    controller: Arc<Controller>,
    progress: Arc<Notify>,
    completed: mpsc::UnboundedSender<RolloutAttempt>,
    faults: mpsc::UnboundedSender<AuditError>,
}

impl Worker {
    async fn run(self) {
        tracing::debug!(environment = %self.environment, "dispatcher worker started");
        while let Some((revision, signal)) = self.next().await {
            let result = self
                .controller
                .run(&self.environment, &revision, &signal)
                .await;

            {
                let mut state = self.slot.state.lock();
                state.in_flight = None;
                state.cancel = None;
                state.armed = None;
            }

            match result {
                Ok(attempt) => {
                    let _ = self.completed.send(attempt);
                    self.progress.notify_waiters();
                }
                Err(e) => {
                    tracing::error!(environment = %self.environment, error = %e, "audit log append failed");
                    let _ = self.faults.send(e);
                    {
                        let mut state = self.slot.state.lock();
                        state.closed = true;
                        state.pending = None;
                        state.cancel = None;
                        state.armed = None;
                    }
                    self.progress.notify_waiters();
                    return;
                }
            }
        }
        tracing::debug!(environment = %self.environment, "dispatcher worker stopped");
    }

    async fn next(&self) -> Option<(Revision, CancelSignal)> {
        loop {
            {
                let mut state = self.slot.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(revision) = state.pending.take() {
                    let signal = match state.armed.take() {
                        Some(signal) => signal,
                        None => {
                            let (handle, signal) = cancel_pair();
                            state.cancel = Some(handle);
                            signal
                        }
                    };
                    state.in_flight = Some(revision.clone());
                    return Some((revision, signal));
                }
            }
            self.slot.wake.notified().await;
        }
    }
}
