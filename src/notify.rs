//! User-visible, non-fatal notices (the host's toast collaborator).

use std::sync::{Arc, Mutex};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
}

/// Fire-and-forget notice sink.
pub trait Notifier {
    fn notify(&self, message: &str, level: NoticeLevel);
}

/// Sends notices to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        match level {
            NoticeLevel::Info => log::info!("{message}"),
            NoticeLevel::Warning => log::warn!("{message}"),
        }
    }
}

/// Collects notices for the host to drain, e.g. once per UI frame.
#[derive(Debug, Clone, Default)]
pub struct NoticeQueue {
    pending: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything queued so far.
    pub fn take(&self) -> Vec<Notice> {
        self.pending
            .lock()
            .map(|mut p| std::mem::take(&mut *p))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NoticeQueue {
    fn notify(&self, message: &str, level: NoticeLevel) {
        log::debug!("notice ({level:?}): {message}");
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(Notice {
                message: message.to_string(),
                level,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drains_in_order() {
        let queue = NoticeQueue::new();
        let sink: Box<dyn Notifier> = Box::new(queue.clone());
        sink.notify("first", NoticeLevel::Info);
        sink.notify("second", NoticeLevel::Warning);
        assert_eq!(queue.len(), 2);

        let taken = queue.take();
        assert_eq!(taken[0].message, "first");
        assert_eq!(taken[1].level, NoticeLevel::Warning);
        assert!(queue.is_empty());
    }

    #[test]
    fn notice_serializes_lowercase_level() {
        let n = Notice {
            message: "hi".into(),
            level: NoticeLevel::Warning,
        };
        assert_eq!(
            serde_json::to_string(&n).unwrap(),
            r#"{"message":"hi","level":"warning"}"#
        );
    }
}
