use crate::models::Topic;
use serde::{Deserialize, Serialize};

/// Query-based selection. Search and backlinks can never be active together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum QueryMode {
    #[default]
    All,
    Search(String),
    Backlinks(String),
}

/// What the next fetch will ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedQuery {
    Backlinks(String),
    Search(String),
    ExternalSubset(Vec<Topic>),
    All,
}

impl ResolvedQuery {
    pub fn active_filter(&self) -> ActiveFilter {
        match self {
            Self::Backlinks(title) => ActiveFilter::Backlinks {
                title: title.clone(),
            },
            Self::Search(query) => ActiveFilter::Search {
                query: query.clone(),
            },
            Self::ExternalSubset(topics) => ActiveFilter::ExternalSubset {
                count: topics.len(),
            },
            Self::All => ActiveFilter::All,
        }
    }
}

/// Snapshot of the mode that produced a topic list, carried by "topics loaded".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ActiveFilter {
    All,
    Search { query: String },
    Backlinks { title: String },
    ExternalSubset { count: usize },
}

impl ActiveFilter {
    /// Search and backlinks count as filters for title and context purposes.
    pub fn is_query_filter(&self) -> bool {
        matches!(self, Self::Search { .. } | Self::Backlinks { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    mode: QueryMode,
    subset: Option<Vec<Topic>>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty query is the same as clearing the search.
    pub fn set_search(&mut self, query: &str) {
        if query.is_empty() {
            self.clear_search();
            return;
        }
        self.mode = QueryMode::Search(query.to_string());
    }

    /// Drops both search and backlinks. A stored subset is left alone.
    pub fn clear_search(&mut self) {
        self.mode = QueryMode::All;
    }

    pub fn set_backlinks(&mut self, title: &str) {
        if title.is_empty() {
            self.clear_search();
            return;
        }
        self.mode = QueryMode::Backlinks(title.to_string());
    }

    pub fn set_external_subset(&mut self, topics: Option<Vec<Topic>>) {
        self.subset = topics;
    }

    pub fn has_query_filter(&self) -> bool {
        !matches!(self.mode, QueryMode::All)
    }

    pub fn search_query(&self) -> &str {
        match &self.mode {
            QueryMode::Search(query) => query,
            _ => "",
        }
    }

    /// Backlinks > Search > ExternalSubset > All.
    pub fn resolve(&self) -> ResolvedQuery {
        match &self.mode {
            QueryMode::Backlinks(title) => ResolvedQuery::Backlinks(title.clone()),
            QueryMode::Search(query) => ResolvedQuery::Search(query.clone()),
            QueryMode::All => match &self.subset {
                Some(topics) => ResolvedQuery::ExternalSubset(topics.clone()),
                None => ResolvedQuery::All,
            },
        }
    }

    pub fn active_filter(&self) -> ActiveFilter {
        self.resolve().active_filter()
    }
}
