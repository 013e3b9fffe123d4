//! Sync error types.

use std::time::Duration;

/// Errors that can occur during a sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A forced sync was requested while disconnected
    Offline,
    /// The remote exchange failed
    Failure(String),
    /// The remote exchange did not finish in time
    TimedOut(Duration),
    /// The remote answered but did not acknowledge every change
    Unacknowledged { remaining: usize },
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Offline => write!(f, "Cannot sync while offline"),
            SyncError::Failure(e) => write!(f, "Sync failed: {}", e),
            SyncError::TimedOut(after) => {
                write!(f, "Sync timed out after {}s", after.as_secs_f64())
            }
            SyncError::Unacknowledged { remaining } => write!(
                f,
                "Sync incomplete: {} change{} not acknowledged by the server",
                remaining,
                if *remaining == 1 { "" } else { "s" }
            ),
        }
    }
}

impl std::error::Error for SyncError {}

/// Errors reported by a [`RemoteSync`](super::RemoteSync) implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote could not be reached
    Unreachable(String),
    /// The remote refused the batch
    Rejected(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Unreachable(e) => write!(f, "Server unreachable: {}", e),
            RemoteError::Rejected(e) => write!(f, "Server rejected changes: {}", e),
        }
    }
}

impl std::error::Error for RemoteError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SyncError::Offline.to_string(), "Cannot sync while offline");
        assert_eq!(
            SyncError::TimedOut(Duration::from_millis(1500)).to_string(),
            "Sync timed out after 1.5s"
        );
        assert_eq!(
            SyncError::Unacknowledged { remaining: 1 }.to_string(),
            "Sync incomplete: 1 change not acknowledged by the server"
        );
        assert_eq!(
            SyncError::Failure(RemoteError::Rejected("409".into()).to_string()).to_string(),
            "Sync failed: Server rejected changes: 409"
        );
    }
}
