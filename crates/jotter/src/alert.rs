//! User-visible alerts.
//!
//! Failures the user must hear about (store open, initial load, failed
//! writes) are reported through an [`AlertSink`] rather than returned to a
//! caller that may no longer exist, such as a background save.

use tracing::error;

/// Destination for user-visible failure messages.
pub trait AlertSink: Send + Sync + std::fmt::Debug {
    /// Show `message` to the user.
    fn alert(&self, message: &str);
}

/// Alerts logged at error level under the `jotter::alert` target. The binary
/// routes logs to standard error, so they reach the terminal once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleAlerts;

impl AlertSink for ConsoleAlerts {
    fn alert(&self, message: &str) {
        error!(target: "jotter::alert", "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_console_alerts_logs_message_once() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            ConsoleAlerts.alert("disk full");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("disk full").count(), 1);
        assert!(output.contains("ERROR"));
        assert!(output.contains("jotter::alert"));
    }

    #[test]
    fn test_console_alerts_as_trait_object() {
        let sink: std::sync::Arc<dyn AlertSink> = std::sync::Arc::new(ConsoleAlerts);
        sink.alert("via trait object");
        assert!(format!("{sink:?}").contains("ConsoleAlerts"));
    }
}
