use crate::errors::{AppError, AppResult};
use crate::harness::cli_missing::is_cli_missing_line;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::{timeout, Duration};

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliProbe {
    pub available: bool,
    pub cli_version: Option<String>,
    pub missing: bool,
    pub reason: Option<String>,
}

impl CliProbe {
    pub fn ready(cli_version: Option<String>) -> Self {
        Self {
            available: true,
            cli_version,
            missing: false,
            reason: None,
        }
    }

    pub fn unavailable(reason: String) -> Self {
        Self {
            available: false,
            cli_version: None,
            missing: is_cli_missing_line(&reason),
            reason: Some(reason),
        }
    }
}

pub async fn probe_cli(binary_path: &str) -> CliProbe {
    match detect_cli_version(binary_path).await {
        Ok(version) => CliProbe::ready(Some(version)),
        Err(error) => CliProbe::unavailable(error.message()),
    }
}

async fn detect_cli_version(binary_path: &str) -> AppResult<String> {
    let mut command = Command::new(binary_path);
    command.arg("--version").kill_on_drop(true);

    let output = timeout(VERSION_PROBE_TIMEOUT, command.output())
        .await
        .map_err(|_| AppError::SourceUnavailable("Version command timed out".to_string()))?
        .map_err(|err| AppError::SourceUnavailable(err.to_string()))?;

    if !output.status.success() {
        return Err(AppError::SourceUnavailable(format!(
            "Version command failed with status {:?}",
            output.status.code()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        return Err(AppError::SourceUnavailable("Version output was empty".to_string()));
    }

    Ok(extract_semver(&stdout).unwrap_or(stdout))
}

pub fn extract_semver(raw: &str) -> Option<String> {
    let mut current = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            current.push(ch);
        } else if !current.is_empty() {
            break;
        }
    }
    let trimmed = current.trim_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_semver, probe_cli, CliProbe};

    #[test]
    fn parses_semver_substring() {
        assert_eq!(extract_semver("hypha 0.4.2"), Some("0.4.2".to_string()));
        assert_eq!(extract_semver("hypha dev build"), None);
    }

    #[tokio::test]
    async fn missing_binary_is_reported_unavailable() {
        let probe = probe_cli("/definitely/not/a/hypha-binary").await;
        assert!(!probe.available);
        assert!(probe.cli_version.is_none());
        assert!(probe.reason.is_some());
    }

    #[test]
    fn unavailable_cli_classifies_missing_binaries() {
        assert!(CliProbe::unavailable("No such file or directory (os error 2)".to_string()).missing);
        let broken = CliProbe::unavailable("Version command timed out".to_string());
        assert!(!broken.missing);
        assert!(!broken.available);
    }
}
