use finsync_core::{NoticeKind, Notifier};

/// Prints user-facing notices to stderr so they never mix with command
/// output on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        let marker = match kind {
            NoticeKind::Info => "i",
            NoticeKind::Success => "✓",
            NoticeKind::Warning => "!",
            NoticeKind::Error => "✗",
        };
        eprintln!("{} {}", marker, message);
    }
}
