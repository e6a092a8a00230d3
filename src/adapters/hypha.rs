use super::compatibility::{self, CliProbe};
use super::{CommandSpec, TopicSource};
use crate::errors::{AppError, AppResult};
use crate::harness::structured_output::{parse_lint_results, parse_topics};
use crate::models::{LintResult, SortOrder, Topic};
use crate::settings::SettingsHandle;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;

static CREATED_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"Created: (.+)").expect("valid regex"));

/// Topic source backed by the `hypha` command-line tool.
#[derive(Debug, Clone)]
pub struct CliTopicSource {
    settings: SettingsHandle,
}

impl CliTopicSource {
    pub fn new(settings: SettingsHandle) -> Self {
        Self { settings }
    }

    pub fn build_command(&self, args: &[&str]) -> CommandSpec {
        let settings = self.settings.snapshot();
        let mut full_args = Vec::with_capacity(args.len() + 2);
        if let Some(root) = settings.root() {
            full_args.push("--root".to_string());
            full_args.push(root.to_string_lossy().to_string());
        }
        full_args.extend(args.iter().map(|arg| (*arg).to_string()));

        CommandSpec {
            program: settings.binary().to_string(),
            args: full_args,
            allow_nonzero_exit: false,
        }
    }

    async fn run(&self, spec: CommandSpec) -> AppResult<String> {
        let limit = self.settings.snapshot().command_timeout();
        tracing::debug!(program = %spec.program, args = ?spec.args, "running hypha command");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(limit, command.output()).await {
            Err(_) => {
                return Err(AppError::Query(format!(
                    "Command timed out after {}s",
                    limit.as_secs()
                )))
            }
            Ok(Err(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::SourceUnavailable(format!(
                    "failed to spawn {}: {}",
                    spec.program, error
                )))
            }
            Ok(Err(error)) => return Err(AppError::Query(error.to_string())),
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            return Ok(stdout);
        }
        if spec.allow_nonzero_exit && !stdout.trim().is_empty() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stderr.is_empty() {
            return Err(AppError::Query(stderr));
        }
        Err(AppError::Query(format!(
            "Command failed with status {:?}",
            output.status.code()
        )))
    }

    async fn run_args(&self, args: &[&str]) -> AppResult<String> {
        self.run(self.build_command(args)).await
    }

    async fn run_allow_nonzero(&self, args: &[&str]) -> AppResult<String> {
        let mut spec = self.build_command(args);
        spec.allow_nonzero_exit = true;
        self.run(spec).await
    }
}

#[async_trait]
impl TopicSource for CliTopicSource {
    async fn list(&self, sort: SortOrder) -> AppResult<Vec<Topic>> {
        let output = self
            .run_args(&["list", "--json", "--sort", sort.as_str()])
            .await?;
        Ok(parse_topics(&output))
    }

    async fn search(&self, query: &str, sort: SortOrder) -> AppResult<Vec<Topic>> {
        let output = self
            .run_args(&["search", query, "--json", "--sort", sort.as_str()])
            .await?;
        Ok(parse_topics(&output))
    }

    async fn backlinks(&self, title: &str, _sort: SortOrder) -> AppResult<Vec<Topic>> {
        // `hypha backlinks` has no --sort flag and always answers alphabetically.
        let output = self.run_args(&["backlinks", title, "--json"]).await?;
        Ok(parse_topics(&output))
    }

    async fn create(&self, title: &str) -> AppResult<String> {
        let output = self.run_args(&["new", title, "--no-edit"]).await?;
        Ok(parse_created_path(&output))
    }

    async fn delete(&self, title: &str) -> AppResult<()> {
        self.run_args(&["delete", title]).await.map(|_| ())
    }

    async fn rename(&self, old_title: &str, new_title: &str) -> AppResult<()> {
        self.run_args(&["rename", old_title, new_title])
            .await
            .map(|_| ())
    }

    async fn lint(&self) -> AppResult<Vec<LintResult>> {
        let output = self
            .run_allow_nonzero(&["lint", "--json"])
            .await
            .map_err(|error| AppError::Lint(error.message()))?;
        Ok(parse_lint_results(&output))
    }

    async fn lint_report(&self) -> AppResult<String> {
        self.run_allow_nonzero(&["lint"]).await
    }

    async fn info(&self, verbose: bool) -> AppResult<String> {
        if verbose {
            self.run_args(&["info", "--verbose"]).await
        } else {
            self.run_args(&["info"]).await
        }
    }

    async fn probe(&self) -> CliProbe {
        let settings = self.settings.snapshot();
        compatibility::probe_cli(settings.binary()).await
    }
}

pub fn parse_created_path(output: &str) -> String {
    CREATED_PATH
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|path| path.as_str().trim().to_string())
        .unwrap_or_default()
}
