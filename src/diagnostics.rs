// ABOUTME: Diagnostics accumulator for non-fatal warnings during a command.
// ABOUTME: Collects warnings that shouldn't fail a rollout but should be shown to users.

/// Collects non-fatal warnings during pipeline operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Record warnings that were already logged where they happened.
    pub fn extend(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        self.warnings.extend(warnings);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Create a lock release warning.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
        }
    }

    /// Create a notification delivery warning.
    pub fn notify_delivery(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::NotifyDelivery,
            message: message.into(),
        }
    }

    /// Create a warning about registry records with no configured environment.
    pub fn unknown_environment(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::UnknownEnvironment,
            message: message.into(),
        }
    }
}

/// Categories of warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Failed to release deploy lock (lock file may remain).
    LockRelease,
    /// An alert sink failed to deliver an event.
    NotifyDelivery,
    /// The registry knows an environment the configuration no longer declares.
    UnknownEnvironment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::lock_release("failed to remove lock file"));
        diag.extend([Warning::notify_delivery("webhook sink returned 503")]);

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
    }

    #[test]
    fn warning_constructors_set_correct_kind() {
        assert_eq!(Warning::lock_release("test").kind, WarningKind::LockRelease);
        assert_eq!(Warning::notify_delivery("test").kind, WarningKind::NotifyDelivery);
        assert_eq!(
            Warning::unknown_environment("test").kind,
            WarningKind::UnknownEnvironment
        );
    }
}
