//! The topic view state machine: resolves the active filter into a source query,
//! merges lint warnings into the result and hands rows to the host.
//!
//! Every fetch is tagged with a generation number. Only the most recently issued
//! generation may replace the loaded list or render, so an older request that
//! resolves late is dropped instead of overwriting newer state.

use crate::adapters::TopicSource;
use crate::filter::{ActiveFilter, FilterState, ResolvedQuery};
use crate::models::{ContextKey, ContextValue, SortOrder, SortState, Topic};
use crate::projection::{project_rows, BadgeConfig, Row, TopicRow};
use crate::settings::SettingsHandle;
use crate::surface::HostSurface;
use crate::warnings::WarningIndex;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewEvent {
    #[serde(rename_all = "camelCase")]
    TopicsLoaded {
        count: usize,
        filter: ActiveFilter,
        /// Order the fetch was issued with.
        sort: SortOrder,
    },
}

/// What the host is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Displayed {
    Nothing,
    Unconfigured,
    Failed,
    Topics(ActiveFilter),
}

#[derive(Debug)]
struct ViewState {
    filter: FilterState,
    sort: SortState,
    topics: Vec<Topic>,
    warnings: WarningIndex,
    displayed: Displayed,
    issued_generation: u64,
}

pub struct TopicView {
    source: Arc<dyn TopicSource>,
    host: Arc<dyn HostSurface>,
    settings: SettingsHandle,
    state: Mutex<ViewState>,
    events: broadcast::Sender<ViewEvent>,
}

impl TopicView {
    pub fn new(source: Arc<dyn TopicSource>, host: Arc<dyn HostSurface>, settings: SettingsHandle) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            source,
            host,
            settings,
            state: Mutex::new(ViewState {
                filter: FilterState::new(),
                sort: SortState::default(),
                topics: Vec::new(),
                warnings: WarningIndex::new(),
                displayed: Displayed::Nothing,
                issued_generation: 0,
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    pub fn source(&self) -> &Arc<dyn TopicSource> {
        &self.source
    }

    pub fn host(&self) -> &Arc<dyn HostSurface> {
        &self.host
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_search(self: &Arc<Self>, query: &str) -> JoinHandle<()> {
        let active = {
            let mut state = self.lock();
            state.filter.set_search(query);
            state.filter.has_query_filter()
        };
        self.host.set_context(ContextKey::HasSearch, ContextValue::Bool(active));
        self.request_refresh()
    }

    pub fn clear_search(self: &Arc<Self>) -> JoinHandle<()> {
        self.lock().filter.clear_search();
        self.host.set_context(ContextKey::HasSearch, ContextValue::Bool(false));
        self.request_refresh()
    }

    pub fn set_backlinks_filter(self: &Arc<Self>, title: &str) -> JoinHandle<()> {
        let active = {
            let mut state = self.lock();
            state.filter.set_backlinks(title);
            state.filter.has_query_filter()
        };
        self.host.set_context(ContextKey::HasSearch, ContextValue::Bool(active));
        self.request_refresh()
    }

    /// Supplied by collaborators outside the view; `None` clears it.
    pub fn set_external_subset(self: &Arc<Self>, topics: Option<Vec<Topic>>) -> JoinHandle<()> {
        self.lock().filter.set_external_subset(topics);
        self.request_refresh()
    }

    pub fn search_query(&self) -> String {
        self.lock().filter.search_query().to_string()
    }

    pub fn active_filter(&self) -> ActiveFilter {
        self.lock().filter.active_filter()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.lock().sort.current()
    }

    /// Advances the order and publishes it to the host in the same step. Does not refresh.
    pub fn cycle_sort(&self) -> SortOrder {
        let mut state = self.lock();
        let order = state.sort.cycle();
        self.host
            .set_context(ContextKey::SortOrder, ContextValue::Text(order.as_str().to_string()));
        order
    }

    pub fn set_sort(&self, order: SortOrder) {
        let mut state = self.lock();
        state.sort.set(order);
        self.host
            .set_context(ContextKey::SortOrder, ContextValue::Text(order.as_str().to_string()));
    }

    pub fn request_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let view = Arc::clone(self);
        tokio::spawn(async move {
            view.load().await;
        })
    }

    /// One refresh cycle. Returns the rendered rows, or `None` when a newer
    /// request superseded this one before it resolved.
    pub async fn load(&self) -> Option<Vec<Row>> {
        let settings = self.settings.snapshot();
        let configured = settings.is_configured();

        let (generation, query, sort) = {
            let mut state = self.lock();
            state.issued_generation += 1;
            (state.issued_generation, state.filter.resolve(), state.sort.current())
        };

        if !configured {
            self.host
                .set_context(ContextKey::IsConfigured, ContextValue::Bool(false));
            let mut state = self.lock();
            if state.issued_generation == generation {
                state.displayed = Displayed::Unconfigured;
                state.topics.clear();
                self.host.render(&[]);
            }
            return Some(Vec::new());
        }
        self.host
            .set_context(ContextKey::IsConfigured, ContextValue::Bool(true));

        let filter = query.active_filter();
        let result = match query {
            ResolvedQuery::Backlinks(title) => self.source.backlinks(&title, sort).await,
            ResolvedQuery::Search(text) => self.source.search(&text, sort).await,
            ResolvedQuery::ExternalSubset(topics) => Ok(topics),
            ResolvedQuery::All => self.source.list(sort).await,
        };

        let mut state = self.lock();
        if state.issued_generation != generation {
            tracing::debug!(
                generation,
                latest = state.issued_generation,
                "discarding superseded topic response"
            );
            return None;
        }

        let topics = match result {
            Ok(topics) => topics,
            Err(error) => {
                tracing::warn!(error = %error, filter = ?filter, "failed to load topics");
                state.displayed = Displayed::Failed;
                let rows = vec![Row::load_failed()];
                self.host.render(&rows);
                return Some(rows);
            }
        };

        let count = topics.len();
        state.topics = topics;
        state.displayed = Displayed::Topics(filter.clone());
        let badges = BadgeConfig::from(&settings);
        let rows = project_rows(&state.topics, &filter, &state.warnings, &badges);
        self.host.render(&rows);
        tracing::debug!(count, generation, "topics loaded");
        let _ = self.events.send(ViewEvent::TopicsLoaded { count, filter, sort });
        Some(rows)
    }

    /// Replaces the warning set and re-renders the loaded list if membership changed.
    /// Never queries the source.
    pub fn set_warnings<I, S>(&self, paths: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.lock();
        if !state.warnings.replace(paths) {
            return false;
        }
        tracing::debug!(count = state.warnings.len(), "warning index changed");
        if let Displayed::Topics(filter) = &state.displayed {
            let badges = BadgeConfig::from(&self.settings.snapshot());
            let rows = project_rows(&state.topics, filter, &state.warnings, &badges);
            self.host.render(&rows);
        }
        true
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.lock().topics.clone()
    }

    pub fn topic_count(&self) -> usize {
        self.lock().topics.len()
    }

    /// Looks only at the loaded list, and only while the host is showing it.
    pub fn find_topic_by_path(&self, path: &str) -> Option<TopicRow> {
        let state = self.lock();
        if !matches!(state.displayed, Displayed::Topics(_)) {
            return None;
        }
        let topic = state.topics.iter().find(|topic| topic.path == path)?;
        let badges = BadgeConfig::from(&self.settings.snapshot());
        Some(TopicRow::new(
            topic.clone(),
            state.warnings.contains(&topic.path),
            &badges,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{TopicView, ViewEvent};
    use crate::adapters::testing::FakeSource;
    use crate::filter::ActiveFilter;
    use crate::models::{ContextKey, ContextValue, SortOrder, Topic};
    use crate::projection::Row;
    use crate::settings::{SettingsHandle, SidebarSettings};
    use crate::surface::testing::RecordingHost;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn configured() -> SettingsHandle {
        SettingsHandle::new(SidebarSettings {
            root_dir: Some("/notes".to_string()),
            ..SidebarSettings::default()
        })
    }

    fn topics() -> Vec<Topic> {
        vec![
            Topic::new("Alpha", "/notes/alpha.md"),
            Topic::new("Beta", "/notes/beta.md"),
            Topic::new("Gamma", "/notes/gamma.md"),
        ]
    }

    fn view_with(source: Arc<FakeSource>, settings: SettingsHandle) -> (Arc<TopicView>, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        let view = TopicView::new(source, host.clone(), settings);
        (view, host)
    }

    #[tokio::test]
    async fn unconfigured_root_renders_nothing_and_signals_welcome() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let (view, host) = view_with(source.clone(), SettingsHandle::default());

        let rows = view.load().await.expect("rows");
        assert!(rows.is_empty());
        assert_eq!(host.last_context(ContextKey::IsConfigured), Some(ContextValue::Bool(false)));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_search_result_yields_message_and_loaded_event() {
        let source = Arc::new(FakeSource::with_topics(Vec::new()));
        let (view, host) = view_with(source.clone(), configured());
        let mut events = view.subscribe();

        view.lock().filter.set_search("xyz");
        let rows = view.load().await.expect("rows");

        assert_eq!(rows, vec![Row::message("No results for \"xyz\"", "search")]);
        assert_eq!(host.last_context(ContextKey::IsConfigured), Some(ContextValue::Bool(true)));
        assert_eq!(
            events.try_recv().expect("event"),
            ViewEvent::TopicsLoaded {
                count: 0,
                filter: ActiveFilter::Search {
                    query: "xyz".to_string()
                },
                sort: SortOrder::Alpha,
            }
        );
        assert_eq!(source.calls(), vec!["search:xyz:alpha".to_string()]);
    }

    #[tokio::test]
    async fn full_list_uses_current_sort_order() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let (view, host) = view_with(source.clone(), configured());

        view.set_sort(SortOrder::Created);
        let rows = view.load().await.expect("rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(source.calls(), vec!["list:created".to_string()]);
        assert_eq!(
            host.last_context(ContextKey::SortOrder),
            Some(ContextValue::Text("created".to_string()))
        );
        assert_eq!(view.topic_count(), 3);
    }

    #[tokio::test]
    async fn external_subset_bypasses_the_source() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let (view, _host) = view_with(source.clone(), configured());

        view.lock()
            .filter
            .set_external_subset(Some(vec![Topic::new("Only", "/notes/only.md")]));
        let rows = view.load().await.expect("rows");
        assert_eq!(rows.len(), 1);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn backlinks_header_counts_results() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let (view, _host) = view_with(source.clone(), configured());

        view.lock().filter.set_backlinks("Ideas");
        let rows = view.load().await.expect("rows");
        assert_eq!(rows[0], Row::message("Backlinks to \"Ideas\" (3)", "search"));
        assert_eq!(rows.len(), 4);
    }

    #[tokio::test]
    async fn query_failure_renders_error_row_and_keeps_previous_topics() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let (view, host) = view_with(source.clone(), configured());
        view.load().await.expect("first load");
        let mut events = view.subscribe();

        source.set_topics(Err("boom".to_string()));
        let rows = view.load().await.expect("rows");
        assert_eq!(rows, vec![Row::load_failed()]);
        assert_eq!(host.last_render(), Some(vec![Row::load_failed()]));
        assert_eq!(view.topic_count(), 3);
        assert!(events.try_recv().is_err());

        source.set_topics(Ok(topics()));
        let retried = view.load().await.expect("retry");
        assert_eq!(retried.len(), 3);
        assert_eq!(source.query_count(), 3);
    }

    #[tokio::test]
    async fn superseded_response_is_discarded() {
        let source = Arc::new(FakeSource::default());
        let (view, host) = view_with(source.clone(), configured());
        let first_gate = source.gate();
        let second_gate = source.gate();

        let first = tokio::spawn({
            let view = view.clone();
            async move { view.load().await }
        });
        while source.query_count() < 1 {
            tokio::task::yield_now().await;
        }
        let second = tokio::spawn({
            let view = view.clone();
            async move { view.load().await }
        });
        while source.query_count() < 2 {
            tokio::task::yield_now().await;
        }

        second_gate
            .send(Ok(vec![Topic::new("New", "/notes/new.md")]))
            .expect("second gate");
        let newest = second.await.expect("join").expect("rows");
        assert_eq!(newest.len(), 1);

        first_gate.send(Ok(topics())).expect("first gate");
        assert_eq!(first.await.expect("join"), None);

        assert_eq!(host.render_count(), 1);
        assert_eq!(view.topics(), vec![Topic::new("New", "/notes/new.md")]);
    }

    #[tokio::test]
    async fn identical_warnings_do_not_rerender() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let (view, host) = view_with(source.clone(), configured());
        view.load().await.expect("rows");
        let renders = host.render_count();

        assert!(view.set_warnings(["/notes/beta.md"]));
        assert_eq!(host.render_count(), renders + 1);
        let rows = host.last_render().expect("render");
        let flagged: Vec<&str> = rows
            .iter()
            .filter_map(Row::as_topic)
            .filter(|row| row.has_warning)
            .map(|row| row.topic.path.as_str())
            .collect();
        assert_eq!(flagged, vec!["/notes/beta.md"]);

        assert!(!view.set_warnings(vec!["/notes/beta.md".to_string()]));
        assert_eq!(host.render_count(), renders + 1);
        assert_eq!(source.query_count(), 1);
    }

    #[tokio::test]
    async fn refresh_uses_warning_index_current_at_render_time() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let (view, _host) = view_with(source, configured());
        view.set_warnings(["/notes/gamma.md"]);

        let rows = view.load().await.expect("rows");
        let gamma = rows
            .iter()
            .filter_map(Row::as_topic)
            .find(|row| row.topic.path == "/notes/gamma.md")
            .expect("gamma row");
        assert!(gamma.has_warning);
        assert!(view.find_topic_by_path("/notes/gamma.md").expect("found").has_warning);
        assert!(view.find_topic_by_path("/notes/missing.md").is_none());
    }

    #[tokio::test]
    async fn setters_publish_filter_context_and_refresh() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let (view, host) = view_with(source.clone(), configured());

        view.set_search("meeting").await.expect("refresh");
        assert_eq!(host.last_context(ContextKey::HasSearch), Some(ContextValue::Bool(true)));
        assert_eq!(view.search_query(), "meeting");

        view.set_backlinks_filter("Alpha").await.expect("refresh");
        assert_eq!(view.search_query(), "");
        assert_eq!(
            view.active_filter(),
            ActiveFilter::Backlinks {
                title: "Alpha".to_string()
            }
        );

        view.set_search("").await.expect("refresh");
        assert_eq!(host.last_context(ContextKey::HasSearch), Some(ContextValue::Bool(false)));
        assert_eq!(view.active_filter(), ActiveFilter::All);
        assert_eq!(
            source.calls(),
            vec![
                "search:meeting:alpha".to_string(),
                "backlinks:Alpha:alpha".to_string(),
                "list:alpha".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn cycling_sort_updates_context_without_fetching() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let (view, host) = view_with(source.clone(), configured());
        assert_eq!(view.cycle_sort(), SortOrder::Modified);
        assert_eq!(
            host.last_context(ContextKey::SortOrder),
            Some(ContextValue::Text("modified".to_string()))
        );
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn losing_configuration_forgets_loaded_topics() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let settings = configured();
        let (view, host) = view_with(source, settings.clone());
        view.load().await.expect("rows");
        assert!(view.find_topic_by_path("/notes/alpha.md").is_some());

        settings
            .apply_patch(serde_json::json!({ "rootDir": "" }))
            .expect("patch");
        view.load().await.expect("unconfigured");
        assert_eq!(host.last_render(), Some(Vec::new()));
        assert_eq!(view.topic_count(), 0);
        assert!(view.find_topic_by_path("/notes/alpha.md").is_none());
    }

    #[tokio::test]
    async fn error_row_hides_loaded_topics_from_lookup() {
        let source = Arc::new(FakeSource::with_topics(topics()));
        let (view, _host) = view_with(source.clone(), configured());
        view.load().await.expect("rows");

        source.set_topics(Err("boom".to_string()));
        view.load().await.expect("error row");
        assert!(view.find_topic_by_path("/notes/alpha.md").is_none());
    }

    #[tokio::test]
    async fn loaded_event_carries_the_order_the_fetch_used() {
        let source = Arc::new(FakeSource::default());
        let (view, _host) = view_with(source.clone(), configured());
        let mut events = view.subscribe();
        let gate = source.gate();

        let load = tokio::spawn({
            let view = view.clone();
            async move { view.load().await }
        });
        while source.query_count() < 1 {
            tokio::task::yield_now().await;
        }
        view.set_sort(SortOrder::Created);
        gate.send(Ok(topics())).expect("gate");
        load.await.expect("join").expect("rows");

        let ViewEvent::TopicsLoaded { sort, .. } = events.try_recv().expect("event");
        assert_eq!(sort, SortOrder::Alpha);
    }
}
