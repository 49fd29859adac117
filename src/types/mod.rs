// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod artifact_hash;
mod environment_name;
mod id;
mod revision;

pub use artifact_hash::{ArtifactHash, ArtifactHashError};
pub use environment_name::{EnvironmentName, EnvironmentNameError};
pub use id::{AttemptId, BuildId, Id};
pub use revision::{Revision, RevisionError};
