// ABOUTME: Sealed trait pattern for the artifact store.
// ABOUTME: Prevents external implementations, allowing non-breaking evolution.

/// Only the store backends in this crate implement `ArtifactStore`.
pub trait Sealed {}
