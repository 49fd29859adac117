// ABOUTME: Error types for source repository access.
// ABOUTME: Covers unknown references and failures of the underlying VCS tool.

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("invalid revision from repository: {0}")]
    InvalidRevision(String),

    #[error("failed to unpack source snapshot: {0}")]
    Unpack(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
