pub mod compatibility;
pub mod hypha;

use crate::adapters::compatibility::CliProbe;
use crate::errors::AppResult;
use crate::models::{LintResult, SortOrder, Topic};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Lint exits non-zero when it finds issues but still prints its report.
    pub allow_nonzero_exit: bool,
}

/// Query capability behind the sidebar. Every call may fail with a message;
/// malformed output degrades to an empty result inside the implementation.
#[async_trait]
pub trait TopicSource: Send + Sync {
    async fn list(&self, sort: SortOrder) -> AppResult<Vec<Topic>>;
    async fn search(&self, query: &str, sort: SortOrder) -> AppResult<Vec<Topic>>;
    async fn backlinks(&self, title: &str, sort: SortOrder) -> AppResult<Vec<Topic>>;
    /// Returns the created file path, empty when the CLI did not report one.
    async fn create(&self, title: &str) -> AppResult<String>;
    async fn delete(&self, title: &str) -> AppResult<()>;
    async fn rename(&self, old_title: &str, new_title: &str) -> AppResult<()>;
    async fn lint(&self) -> AppResult<Vec<LintResult>>;
    async fn lint_report(&self) -> AppResult<String> {
        Ok(String::new())
    }
    async fn info(&self, _verbose: bool) -> AppResult<String> {
        Ok(String::new())
    }
    async fn probe(&self) -> CliProbe {
        CliProbe::ready(None)
    }
}
