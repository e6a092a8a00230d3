use crate::commands::QuickPickItem;
use crate::models::{ContextKey, ContextValue, Diagnostic, NotificationLevel, StreamEnvelope};
use crate::projection::Row;
use chrono::Utc;
use serde_json::json;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Everything the core asks of the editor. Implementations only read what they are given.
pub trait HostSurface: Send + Sync {
    fn render(&self, rows: &[Row]);
    fn set_context(&self, key: ContextKey, value: ContextValue);
    fn set_title(&self, title: &str);
    /// Select and scroll to the row for `path` without taking focus.
    fn reveal(&self, path: &str);
    fn clear_diagnostics(&self);
    fn set_diagnostics(&self, path: &str, diagnostics: &[Diagnostic]);
    fn notify(&self, level: NotificationLevel, message: &str, actions: &[&str]);
    fn open_file(&self, path: &str);
    fn open_preview(&self, path: &str);
    fn focus_view(&self);
    fn show_output(&self, title: &str, content: &str);
    fn write_clipboard(&self, text: &str);
    fn show_quick_pick(&self, query: &str, items: &[QuickPickItem]);
}

/// Host that writes one JSON envelope per line; the editor plugin applies them.
pub struct StdioHost {
    writer: Mutex<Box<dyn Write + Send>>,
    seq: AtomicU64,
}

impl StdioHost {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            seq: AtomicU64::new(0),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn emit(&self, event_type: &str, payload: serde_json::Value) {
        let envelope = StreamEnvelope {
            r#type: event_type.to_string(),
            payload,
            timestamp: Utc::now(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
        };
        let line = match serde_json::to_string(&envelope) {
            Ok(line) => line,
            Err(error) => {
                tracing::error!(event_type, error = %error, "failed to encode host frame");
                return;
            }
        };
        let Ok(mut writer) = self.writer.lock() else {
            tracing::error!(event_type, "host writer lock poisoned");
            return;
        };
        if let Err(error) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            tracing::warn!(event_type, error = %error, "failed to write host frame");
        }
    }
}

impl HostSurface for StdioHost {
    fn render(&self, rows: &[Row]) {
        self.emit("render", json!({ "rows": rows }));
    }

    fn set_context(&self, key: ContextKey, value: ContextValue) {
        self.emit("context", json!({ "key": key.as_str(), "value": value }));
    }

    fn set_title(&self, title: &str) {
        self.emit("title", json!({ "title": title }));
    }

    fn reveal(&self, path: &str) {
        self.emit("reveal", json!({ "path": path, "select": true, "focus": false }));
    }

    fn clear_diagnostics(&self) {
        self.emit("diagnostics.clear", json!({}));
    }

    fn set_diagnostics(&self, path: &str, diagnostics: &[Diagnostic]) {
        self.emit("diagnostics.set", json!({ "path": path, "diagnostics": diagnostics }));
    }

    fn notify(&self, level: NotificationLevel, message: &str, actions: &[&str]) {
        self.emit(
            "notify",
            json!({ "level": level, "message": message, "actions": actions }),
        );
    }

    fn open_file(&self, path: &str) {
        self.emit("open", json!({ "path": path }));
    }

    fn open_preview(&self, path: &str) {
        self.emit("preview", json!({ "path": path }));
    }

    fn focus_view(&self) {
        self.emit("focus", json!({}));
    }

    fn show_output(&self, title: &str, content: &str) {
        self.emit("output", json!({ "title": title, "content": content }));
    }

    fn write_clipboard(&self, text: &str) {
        self.emit("clipboard", json!({ "text": text }));
    }

    fn show_quick_pick(&self, query: &str, items: &[QuickPickItem]) {
        self.emit("quickPick", json!({ "query": query, "items": items }));
    }
}


#[cfg(test)]
mod tests {
    use super::{HostSurface, StdioHost};
    use crate::models::{ContextKey, ContextValue};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_one_envelope_per_line_with_increasing_seq() {
        let buffer = SharedBuffer::default();
        let host = StdioHost::new(Box::new(buffer.clone()));
        host.set_context(ContextKey::IsConfigured, ContextValue::Bool(true));
        host.reveal("/n/a.md");

        let raw = String::from_utf8(buffer.0.lock().expect("buffer").clone()).expect("utf8");
        let frames: Vec<serde_json::Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["type"], "context");
        assert_eq!(frames[0]["payload"]["key"], "hypha.isConfigured");
        assert_eq!(frames[0]["payload"]["value"], true);
        assert_eq!(frames[0]["seq"], 1);
        assert_eq!(frames[1]["type"], "reveal");
        assert_eq!(frames[1]["payload"]["focus"], false);
        assert_eq!(frames[1]["seq"], 2);
    }
}
