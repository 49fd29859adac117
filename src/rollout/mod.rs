// ABOUTME: Rollout orchestration using the type state pattern.
// ABOUTME: Exports the rollout struct, its states, the controller, and the deploy lock.

mod attempt;
mod cancel;
mod controller;
mod error;
mod health;
mod lock;
mod rollout;
mod state;
mod transitions;

pub use attempt::{AttemptOutcome, RolloutAttempt, RolloutState};
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use controller::Controller;
pub use error::{RolloutError, RolloutErrorKind};
pub use health::HealthPolicy;
pub use lock::{DeployLock, LockError, LockInfo};
pub use rollout::Rollout;
pub use state::{Built, Deployed, Finished, Queued, Verified};
pub use transitions::TransitionResult;
