//! The error-reporter facade (§6 External interfaces, §7 Error handling).
//!
//! A pluggable sink for runtime (non-fatal) errors: queue publish failures,
//! processor exceptions, admin command failures. Every error also goes to
//! the `log` facade; `ErrorReporter` additionally keeps a bounded,
//! insertion-ordered history and notifies registered listeners.

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone)]
pub struct ReportedEvent {
    pub severity: Severity,
    pub source: String,
    pub message: String,
}

pub type Listener = Arc<dyn Fn(&ReportedEvent) + Send + Sync>;

const DEFAULT_HISTORY: usize = 100;

struct Inner {
    history: Vec<ReportedEvent>,
    capacity: usize,
    listeners: Vec<Listener>,
}

/// Bounded ring of recent errors plus a copy-on-write listener list.
/// Listener callbacks run synchronously on the reporting thread, matching
/// §5's "callbacks run on the reporting thread" resource policy.
pub struct ErrorReporter {
    inner: Mutex<Inner>,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY)
    }
}

impl ErrorReporter {
    pub fn with_capacity(capacity: usize) -> Self {
        ErrorReporter {
            inner: Mutex::new(Inner {
                history: Vec::new(),
                capacity,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn add_listener(&self, listener: Listener) {
        self.inner.lock().unwrap().listeners.push(listener);
    }

    pub fn remove_listener_at(&self, index: usize) {
        let mut guard = self.inner.lock().unwrap();
        if index < guard.listeners.len() {
            guard.listeners.remove(index);
        }
    }

    pub fn report(&self, severity: Severity, source: impl Into<String>, message: impl Into<String>) {
        let event = ReportedEvent {
            severity,
            source: source.into(),
            message: message.into(),
        };
        match event.severity {
            Severity::Info => log::info!(target: "agentmesh::report", "[{}] {}", event.source, event.message),
            Severity::Warning => log::warn!(target: "agentmesh::report", "[{}] {}", event.source, event.message),
            Severity::Error | Severity::Critical => {
                log::error!(target: "agentmesh::report", "[{}] {}", event.source, event.message)
            }
        }

        let listeners = {
            let mut guard = self.inner.lock().unwrap();
            if guard.history.len() >= guard.capacity {
                guard.history.remove(0);
            }
            guard.history.push(event.clone());
            guard.listeners.clone()
        };
        for listener in listeners {
            listener(&event);
        }
    }

    /// Returns up to `limit` most recent events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ReportedEvent> {
        let guard = self.inner.lock().unwrap();
        let len = guard.history.len();
        let start = len.saturating_sub(limit);
        guard.history[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn history_is_bounded_and_ordered() {
        let reporter = ErrorReporter::with_capacity(3);
        for i in 0..5 {
            reporter.report(Severity::Info, "test", format!("event {i}"));
        }
        let recent = reporter.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "event 2");
        assert_eq!(recent[2].message, "event 4");
    }

    #[test]
    fn listeners_are_invoked() {
        let reporter = ErrorReporter::default();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        reporter.add_listener(Arc::new(move |_event| {
            count2.fetch_add(1, Ordering::SeqCst);
        }));
        reporter.report(Severity::Error, "test", "boom");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
