use crate::errors::{AppError, AppResult};
use crate::models::{file_name, NotificationLevel, SortOrder, Topic};
use crate::tree::TopicView;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub const MAX_RECENT_TOPICS: usize = 10;
pub const MAX_DESCRIPTION_LENGTH: usize = 60;
const RECENT_DETAIL: &str = "Recently opened";
const NO_ISSUES_MARKER: &str = "No issues found";

/// Row a command was invoked on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRef {
    pub title: String,
    pub path: String,
}

impl From<&Topic> for TopicRef {
    fn from(topic: &Topic) -> Self {
        Self {
            title: topic.title.clone(),
            path: topic.path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickPickItem {
    pub label: String,
    pub description: String,
    pub detail: Option<String>,
    pub path: String,
    pub is_recent: bool,
}

impl QuickPickItem {
    fn new(topic: &Topic, is_recent: bool) -> Self {
        Self {
            label: topic.title.clone(),
            description: topic
                .description
                .as_deref()
                .map(|text| text.chars().take(MAX_DESCRIPTION_LENGTH).collect())
                .unwrap_or_default(),
            detail: is_recent.then(|| RECENT_DETAIL.to_string()),
            path: topic.path.clone(),
            is_recent,
        }
    }
}

/// User-invoked actions. Prompts and confirmations happen in the editor; these
/// receive the final values.
pub struct TopicCommands {
    view: Arc<TopicView>,
    recent: Mutex<Vec<String>>,
}

impl TopicCommands {
    pub fn new(view: Arc<TopicView>) -> Self {
        Self {
            view,
            recent: Mutex::new(Vec::new()),
        }
    }

    pub fn view(&self) -> &Arc<TopicView> {
        &self.view
    }

    fn fail(&self, action: &str, error: AppError) -> AppError {
        tracing::warn!(action, error = %error, "command failed");
        self.view.host().notify(
            NotificationLevel::Error,
            &format!("{}: {}", action, error.message()),
            &[],
        );
        error
    }

    fn info(&self, message: &str) {
        self.view.host().notify(NotificationLevel::Info, message, &[]);
    }

    /// Creates the topic, refreshes, then opens the new file when the CLI reported it.
    pub async fn create_topic(&self, title: &str) -> AppResult<Option<String>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }
        let path = self
            .view
            .source()
            .create(title)
            .await
            .map_err(|error| self.fail("Failed to create topic", error))?;
        self.view.load().await;
        if path.is_empty() {
            return Ok(None);
        }
        self.view.host().open_file(&path);
        Ok(Some(path))
    }

    pub async fn delete_topic(&self, topic: &TopicRef) -> AppResult<()> {
        self.view
            .source()
            .delete(&topic.title)
            .await
            .map_err(|error| self.fail("Failed to delete topic", error))?;
        self.view.load().await;
        Ok(())
    }

    /// Returns false when nothing was renamed because the new name is empty or unchanged.
    pub async fn rename_topic(&self, topic: &TopicRef, new_title: &str) -> AppResult<bool> {
        if new_title.is_empty() || new_title == topic.title {
            return Ok(false);
        }
        self.view
            .source()
            .rename(&topic.title, new_title)
            .await
            .map_err(|error| self.fail("Failed to rename topic", error))?;
        self.view.load().await;
        self.info(&format!("Renamed to \"{}\"", new_title));
        Ok(true)
    }

    pub fn find_backlinks(&self, topic: &TopicRef) -> JoinHandle<()> {
        self.view.host().focus_view();
        self.view.set_backlinks_filter(&topic.title)
    }

    pub fn clear_search(&self) -> JoinHandle<()> {
        self.view.clear_search()
    }

    pub fn refresh(&self) -> JoinHandle<()> {
        self.view.request_refresh()
    }

    /// The sort context is published before the refresh starts.
    pub fn cycle_sort(&self) -> (SortOrder, JoinHandle<()>) {
        let order = self.view.cycle_sort();
        (order, self.view.request_refresh())
    }

    pub fn set_sort(&self, order: SortOrder) -> JoinHandle<()> {
        self.view.set_sort(order);
        self.view.request_refresh()
    }

    /// Without a topic, offers the loaded list as a picker instead.
    pub fn open_topic(&self, topic: Option<&TopicRef>) -> AppResult<()> {
        let Some(topic) = topic else {
            let topics = self.view.topics();
            if topics.is_empty() {
                self.info("No topics to open");
                return Ok(());
            }
            let items: Vec<QuickPickItem> = topics.iter().map(|topic| QuickPickItem::new(topic, false)).collect();
            self.view.host().show_quick_pick("", &items);
            return Ok(());
        };
        if topic.path.is_empty() {
            return Err(self.fail(
                "Failed to open topic",
                AppError::Internal("Topic path not available".to_string()),
            ));
        }
        self.view.host().open_file(&topic.path);
        Ok(())
    }

    pub fn open_preview(&self, topic: &TopicRef) -> AppResult<()> {
        if topic.path.is_empty() {
            return Err(self.fail(
                "Failed to open preview",
                AppError::Internal("Topic path not available".to_string()),
            ));
        }
        self.view.host().open_preview(&topic.path);
        Ok(())
    }

    pub fn copy_link(&self, topic: &TopicRef) -> String {
        let link = format!("[{}]({})", topic.title, file_name(&topic.path));
        self.view.host().write_clipboard(&link);
        self.info(&format!("Copied: {}", link));
        link
    }

    /// Path relative to the configured root, or the full path when it lies elsewhere.
    pub fn copy_path(&self, topic: &TopicRef) -> String {
        let relative = relative_to_root(&topic.path, self.view.settings().snapshot().root_dir.as_deref());
        self.view.host().write_clipboard(&relative);
        self.info(&format!("Copied: {}", relative));
        relative
    }

    pub async fn lint_report(&self) -> AppResult<bool> {
        let output = self
            .view
            .source()
            .lint_report()
            .await
            .map_err(|error| self.fail("Lint failed", error))?;
        if output.contains(NO_ISSUES_MARKER) {
            self.info("✓ No issues found");
            return Ok(true);
        }
        let host = self.view.host();
        host.show_output("Lint Results", &output);
        host.notify(NotificationLevel::Warning, "Issues found. See Output panel.", &[]);
        Ok(false)
    }

    pub async fn show_info(&self) -> AppResult<()> {
        let output = self
            .view
            .source()
            .info(true)
            .await
            .map_err(|error| self.fail("Failed to get info", error))?;
        self.view.host().show_output("Hypha Info", &output);
        Ok(())
    }

    /// Candidates for the quick-find picker: all topics for an empty query, else search results.
    /// `None` when there is nothing to pick from; the host has been told so already.
    pub async fn quick_find(&self, query: &str) -> AppResult<Option<Vec<QuickPickItem>>> {
        let sort = self.view.sort_order();
        let source = self.view.source();
        let result = if query.is_empty() {
            source.list(sort).await
        } else {
            source.search(query, sort).await
        };
        let topics = result.map_err(|error| self.fail("Failed to open topic", error))?;

        if topics.is_empty() && query.is_empty() {
            self.info("No topics found");
            return Ok(None);
        }
        let recent = self.recent_paths();
        Ok(Some(quick_pick_items(&topics, &recent)))
    }

    pub fn quick_find_accept(&self, path: &str) {
        self.remember(path);
        self.view.host().open_file(path);
    }

    pub fn recent_paths(&self) -> Vec<String> {
        self.recent
            .lock()
            .map(|recent| recent.clone())
            .unwrap_or_default()
    }

    fn remember(&self, path: &str) {
        if let Ok(mut recent) = self.recent.lock() {
            recent.retain(|existing| existing != path);
            recent.insert(0, path.to_string());
            recent.truncate(MAX_RECENT_TOPICS);
        }
    }
}

pub fn relative_to_root(path: &str, root: Option<&str>) -> String {
    let Some(root) = root.map(|root| root.trim_end_matches(['/', '\\'])).filter(|root| !root.is_empty()) else {
        return path.to_string();
    };
    match path.strip_prefix(root) {
        Some(rest) if rest.starts_with(['/', '\\']) => rest[1..].to_string(),
        _ => path.to_string(),
    }
}

/// Recently opened topics first, then the rest; each group alphabetical, ignoring case.
pub fn quick_pick_items(topics: &[Topic], recent: &[String]) -> Vec<QuickPickItem> {
    let mut items: Vec<QuickPickItem> = topics
        .iter()
        .map(|topic| QuickPickItem::new(topic, recent.contains(&topic.path)))
        .collect();
    items.sort_by(|left, right| {
        right
            .is_recent
            .cmp(&left.is_recent)
            .then_with(|| left.label.to_lowercase().cmp(&right.label.to_lowercase()))
    });
    items
}
