use bluecarbon_session::{Notification, NotificationSink, Variant};
use std::io::Write;
use yansi::Paint;

/// Prints notifications to stderr, one per line.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalSink;

impl NotificationSink for TerminalSink {
    fn notify(&self, notification: Notification) {
        let _ = writeln!(anstream::stderr(), "{}", render(&notification));
    }
}

/// Formats a notification as `Title: description`, coloured by its variant.
pub fn render(notification: &Notification) -> String {
    let title = notification.title.as_str();
    let title = match notification.variant {
        Variant::Info => title.cyan().bold(),
        Variant::Success => title.green().bold(),
        Variant::Destructive => title.red().bold(),
    };
    format!("{title}: {}", notification.description)
}
