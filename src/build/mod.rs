// ABOUTME: Artifact builder: runs a recipe over a source snapshot.
// ABOUTME: Produces deterministic, content-addressed bundles plus a build log.

mod builder;
pub mod bundle;
mod error;

pub use builder::ArtifactBuilder;
pub use error::BuildError;
