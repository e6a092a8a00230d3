use crate::adapters::TopicSource;
use crate::commands::{TopicCommands, TopicRef};
use crate::debounce::SearchDebouncer;
use crate::errors::AppResult;
use crate::harness::structured_output::topics_from_value;
use crate::models::SortOrder;
use crate::settings::SettingsHandle;
use crate::surface::HostSurface;
use crate::sync::{SyncController, SyncEvent};
use crate::tree::TopicView;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;

/// One line from the editor plugin: `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum HostMessage {
    /// Initial settings; the sidebar does not touch the CLI before this arrives.
    Initialize {
        #[serde(default)]
        settings: serde_json::Value,
    },
    Event(SyncEvent),
    SearchInput { value: String },
    SearchAccept { value: String },
    SearchHide,
    QuickFindInput { query: String },
    QuickFindAccept { path: String },
    QuickFindHide,
    SetSubset {
        #[serde(default)]
        topics: Option<serde_json::Value>,
    },
    Command(CommandRequest),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum CommandRequest {
    Create { title: String },
    Delete { topic: TopicRef },
    #[serde(rename_all = "camelCase")]
    Rename { topic: TopicRef, new_title: String },
    FindBacklinks { topic: TopicRef },
    ClearSearch,
    Refresh,
    CycleSort,
    SetSort { order: SortOrder },
    CopyLink { topic: TopicRef },
    CopyPath { topic: TopicRef },
    Open {
        #[serde(default)]
        topic: Option<TopicRef>,
    },
    Preview { topic: TopicRef },
    LintReport,
    Info,
    QuickFind,
}

/// Wires the view, controller and commands to a line-oriented host connection.
pub struct Sidebar {
    controller: Arc<SyncController>,
    commands: Arc<TopicCommands>,
    search: Mutex<Option<SearchDebouncer>>,
    quick_find: Mutex<Option<SearchDebouncer>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Sidebar {
    pub fn new(source: Arc<dyn TopicSource>, host: Arc<dyn HostSurface>, settings: SettingsHandle) -> Arc<Self> {
        let view = TopicView::new(source, host, settings);
        let controller = SyncController::new(Arc::clone(&view));
        let listener = controller.start();
        Arc::new(Self {
            controller,
            commands: Arc::new(TopicCommands::new(view)),
            search: Mutex::new(None),
            quick_find: Mutex::new(None),
            listener: Mutex::new(Some(listener)),
        })
    }

    pub fn controller(&self) -> &Arc<SyncController> {
        &self.controller
    }

    pub fn commands(&self) -> &Arc<TopicCommands> {
        &self.commands
    }

    /// Reads messages until EOF or `shutdown`, then waits for in-flight work.
    pub async fn serve<R>(self: &Arc<Self>, reader: R) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let message = match serde_json::from_str::<HostMessage>(trimmed) {
                Ok(message) => message,
                Err(error) => {
                    tracing::warn!(error = %error, "ignoring malformed host message");
                    continue;
                }
            };
            if message == HostMessage::Shutdown {
                tracing::info!("host requested shutdown");
                break;
            }
            in_flight.retain(|handle| !handle.is_finished());
            in_flight.extend(self.dispatch(message).await);
        }

        self.close();
        for handle in in_flight {
            if let Err(error) = handle.await {
                tracing::debug!(error = %error, "sidebar task ended abnormally");
            }
        }
        Ok(())
    }

    /// Handles one message. Slow work is spawned; the returned handles track it.
    pub async fn dispatch(self: &Arc<Self>, message: HostMessage) -> Vec<JoinHandle<()>> {
        match message {
            HostMessage::Initialize { settings } => {
                if !settings.is_null() {
                    if let Err(error) = self.controller.view().settings().apply_patch(settings) {
                        tracing::warn!(error = %error, "ignoring invalid initial settings");
                    }
                }
                self.controller.activate().await
            }
            HostMessage::Event(event) => self.controller.handle(event),
            HostMessage::SearchInput { value } => {
                self.with_search(|debouncer| debouncer.input(value));
                Vec::new()
            }
            HostMessage::SearchAccept { value } => {
                self.with_search(|debouncer| debouncer.confirm(value));
                take_debouncer(&self.search);
                Vec::new()
            }
            HostMessage::SearchHide => {
                take_debouncer(&self.search);
                Vec::new()
            }
            HostMessage::QuickFindInput { query } => {
                self.with_quick_find(|debouncer| debouncer.input(query));
                Vec::new()
            }
            HostMessage::QuickFindAccept { path } => {
                take_debouncer(&self.quick_find);
                self.commands.quick_find_accept(&path);
                Vec::new()
            }
            HostMessage::QuickFindHide => {
                take_debouncer(&self.quick_find);
                Vec::new()
            }
            HostMessage::SetSubset { topics } => {
                let subset = topics.map(topics_from_value);
                vec![self.controller.view().set_external_subset(subset)]
            }
            HostMessage::Command(request) => self.run_command(request),
            HostMessage::Shutdown => Vec::new(),
        }
    }

    fn run_command(self: &Arc<Self>, request: CommandRequest) -> Vec<JoinHandle<()>> {
        let commands = Arc::clone(&self.commands);
        match request {
            CommandRequest::ClearSearch => vec![commands.clear_search()],
            CommandRequest::Refresh => vec![commands.refresh()],
            CommandRequest::CycleSort => vec![commands.cycle_sort().1],
            CommandRequest::SetSort { order } => vec![commands.set_sort(order)],
            CommandRequest::FindBacklinks { topic } => vec![commands.find_backlinks(&topic)],
            CommandRequest::CopyLink { topic } => {
                commands.copy_link(&topic);
                Vec::new()
            }
            CommandRequest::CopyPath { topic } => {
                commands.copy_path(&topic);
                Vec::new()
            }
            CommandRequest::QuickFind => {
                self.with_quick_find(|debouncer| debouncer.confirm(String::new()));
                Vec::new()
            }
            // Failures below are already reported to the host by the command itself.
            CommandRequest::Open { topic } => {
                let _ = commands.open_topic(topic.as_ref());
                Vec::new()
            }
            CommandRequest::Preview { topic } => {
                let _ = commands.open_preview(&topic);
                Vec::new()
            }
            CommandRequest::Create { title } => vec![tokio::spawn(async move {
                let _ = commands.create_topic(&title).await;
            })],
            CommandRequest::Delete { topic } => vec![tokio::spawn(async move {
                let _ = commands.delete_topic(&topic).await;
            })],
            CommandRequest::Rename { topic, new_title } => vec![tokio::spawn(async move {
                let _ = commands.rename_topic(&topic, &new_title).await;
            })],
            CommandRequest::LintReport => vec![tokio::spawn(async move {
                let _ = commands.lint_report().await;
            })],
            CommandRequest::Info => vec![tokio::spawn(async move {
                let _ = commands.show_info().await;
            })],
        }
    }

    fn with_search(&self, action: impl FnOnce(&SearchDebouncer)) {
        let Ok(mut slot) = self.search.lock() else {
            return;
        };
        let debouncer = slot.get_or_insert_with(|| self.controller.search_debouncer());
        action(debouncer);
    }

    fn with_quick_find(&self, action: impl FnOnce(&SearchDebouncer)) {
        let Ok(mut slot) = self.quick_find.lock() else {
            return;
        };
        let debouncer = slot.get_or_insert_with(|| {
            let commands = Arc::clone(&self.commands);
            let quiet = self.controller.view().settings().snapshot().debounce();
            SearchDebouncer::new(
                quiet,
                Arc::new(move |query: String| {
                    let commands = Arc::clone(&commands);
                    tokio::spawn(async move {
                        if let Ok(Some(items)) = commands.quick_find(&query).await {
                            commands.view().host().show_quick_pick(&query, &items);
                        }
                    });
                }),
            )
        });
        action(debouncer);
    }

    fn close(&self) {
        take_debouncer(&self.search);
        take_debouncer(&self.quick_find);
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

/// Dropping the debouncer cancels any pending commit.
fn take_debouncer(slot: &Mutex<Option<SearchDebouncer>>) {
    if let Ok(mut slot) = slot.lock() {
        slot.take();
    }
}
