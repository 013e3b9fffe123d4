//! User-facing feedback supplied by the host environment.

use std::fmt;

/// Severity of a user notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeKind::Info => write!(f, "info"),
            NoticeKind::Success => write!(f, "success"),
            NoticeKind::Warning => write!(f, "warning"),
            NoticeKind::Error => write!(f, "error"),
        }
    }
}

/// Shows short messages to the user (toasts, status bars, stderr).
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NoticeKind);
}

/// Notifier that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        match kind {
            NoticeKind::Info | NoticeKind::Success => tracing::info!("{}", message),
            NoticeKind::Warning => tracing::warn!("{}", message),
            NoticeKind::Error => tracing::error!("{}", message),
        }
    }
}
