use crate::debounce::SearchDebouncer;
use crate::harness::cli_missing::build_cli_missing_payload;
use crate::models::{ContextKey, ContextValue, Diagnostic, NotificationLevel};
use crate::projection::title_label;
use crate::tree::{TopicView, ViewEvent};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEditor {
    pub path: String,
    pub language_id: String,
}

/// Editor activity the sidebar reacts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SyncEvent {
    FileCreated { path: String },
    FileChanged { path: String },
    FileDeleted { path: String },
    #[serde(rename_all = "camelCase")]
    DocumentSaved { path: String, language_id: String },
    ConfigurationChanged { patch: serde_json::Value },
    ActiveEditorChanged { editor: Option<ActiveEditor> },
    VisibilityChanged { visible: bool },
}

#[derive(Debug, Default)]
struct SyncState {
    visible: bool,
    active: Option<ActiveEditor>,
}

pub struct SyncController {
    view: Arc<TopicView>,
    state: Mutex<SyncState>,
    lint_issued: AtomicU64,
    /// Generation of the last lint pass whose results reached the host.
    lint_applied: Mutex<u64>,
}

impl SyncController {
    pub fn new(view: Arc<TopicView>) -> Arc<Self> {
        Arc::new(Self {
            view,
            state: Mutex::new(SyncState::default()),
            lint_issued: AtomicU64::new(0),
            lint_applied: Mutex::new(0),
        })
    }

    pub fn view(&self) -> &Arc<TopicView> {
        &self.view
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Listens for "topics loaded" to keep the title current and the active file revealed.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.view.subscribe();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => controller.on_topics_loaded(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "view events lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Publishes initial context, probes the CLI once, then loads topics and lint.
    pub async fn activate(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let settings = self.view.settings().snapshot();
        let host = self.view.host();
        host.set_context(
            ContextKey::IsConfigured,
            ContextValue::Bool(settings.is_configured()),
        );
        host.set_context(
            ContextKey::SortOrder,
            ContextValue::Text(self.view.sort_order().as_str().to_string()),
        );

        let probe = self.view.source().probe().await;
        if probe.available {
            tracing::info!(
                version = probe.cli_version.as_deref().unwrap_or("unknown"),
                "hypha CLI available"
            );
        } else {
            let payload = build_cli_missing_payload(settings.binary(), &probe);
            tracing::warn!(
                code = %payload["code"],
                binary = settings.binary(),
                missing = probe.missing,
                reason = probe.reason.as_deref().unwrap_or_default(),
                "hypha CLI is not available"
            );
            let actions: Vec<&str> = payload["actions"]
                .as_array()
                .map(|actions| actions.iter().filter_map(serde_json::Value::as_str).collect())
                .unwrap_or_default();
            let message = payload["message"].as_str().unwrap_or_default();
            host.notify(NotificationLevel::Warning, message, &actions);
        }

        vec![self.view.request_refresh(), self.request_lint()]
    }

    /// Routes one editor event; returns handles for any work it started.
    pub fn handle(self: &Arc<Self>, event: SyncEvent) -> Vec<JoinHandle<()>> {
        let settings = self.view.settings().snapshot();
        match event {
            SyncEvent::FileCreated { path }
            | SyncEvent::FileChanged { path }
            | SyncEvent::FileDeleted { path } => {
                if !settings.tracks_path(&path) {
                    return Vec::new();
                }
                self.on_content_changed()
            }
            SyncEvent::DocumentSaved { path, language_id } => {
                if language_id != settings.language_id {
                    tracing::trace!(path = %path, language_id = %language_id, "ignoring save");
                    return Vec::new();
                }
                self.on_content_changed()
            }
            SyncEvent::ConfigurationChanged { patch } => {
                if let Err(error) = self.view.settings().apply_patch(patch) {
                    tracing::warn!(error = %error, "ignoring invalid settings update");
                }
                vec![self.view.request_refresh()]
            }
            SyncEvent::ActiveEditorChanged { editor } => {
                self.lock().active = editor;
                self.reveal_active();
                Vec::new()
            }
            SyncEvent::VisibilityChanged { visible } => {
                self.lock().visible = visible;
                if visible {
                    self.reveal_active();
                }
                Vec::new()
            }
        }
    }

    /// Topic refresh and lint run independently; neither waits on the other.
    pub fn on_content_changed(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![self.view.request_refresh(), self.request_lint()]
    }

    pub fn request_lint(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.run_lint().await;
        })
    }

    /// Returns whether diagnostics were applied. Failures leave the previous state in
    /// place; a success is applied unless a newer pass has already been applied.
    pub async fn run_lint(&self) -> bool {
        let generation = self.lint_issued.fetch_add(1, Ordering::SeqCst) + 1;
        let results = match self.view.source().lint().await {
            Ok(results) => results,
            Err(error) => {
                tracing::debug!(error = %error, generation, "lint pass failed");
                return false;
            }
        };

        let mut applied = match self.lint_applied.lock() {
            Ok(applied) => applied,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *applied > generation {
            tracing::debug!(generation, applied = *applied, "discarding superseded lint results");
            return false;
        }
        *applied = generation;

        let host = self.view.host();
        host.clear_diagnostics();
        let mut flagged = Vec::with_capacity(results.len());
        for result in &results {
            let diagnostics: Vec<Diagnostic> = result.warnings.iter().map(Diagnostic::from).collect();
            host.set_diagnostics(&result.path, &diagnostics);
            if !diagnostics.is_empty() {
                flagged.push(result.path.clone());
            }
        }
        self.view.set_warnings(flagged);
        true
    }

    pub fn on_topics_loaded(&self, event: &ViewEvent) {
        let ViewEvent::TopicsLoaded { count, filter, sort } = event;
        let title = title_label(*count, filter.is_query_filter(), *sort);
        self.view.host().set_title(&title);
        self.reveal_active();
    }

    /// Reveals the active file's row when the view is visible. Never opens the view.
    pub fn reveal_active(&self) -> bool {
        let (visible, active) = {
            let state = self.lock();
            (state.visible, state.active.clone())
        };
        if !visible {
            return false;
        }
        let Some(editor) = active else {
            return false;
        };
        if editor.language_id != self.view.settings().snapshot().language_id {
            return false;
        }
        match self.view.find_topic_by_path(&editor.path) {
            Some(row) => {
                self.view.host().reveal(&row.topic.path);
                true
            }
            None => false,
        }
    }

    /// Debouncer wired to the view's search filter; an empty value clears the search.
    pub fn search_debouncer(&self) -> SearchDebouncer {
        let view = Arc::clone(&self.view);
        let quiet = view.settings().snapshot().debounce();
        SearchDebouncer::new(
            quiet,
            Arc::new(move |value: String| {
                if value.is_empty() {
                    view.clear_search();
                } else {
                    view.set_search(&value);
                }
            }),
        )
    }
}
