use crate::adapters::compatibility::CliProbe;

static CLI_MISSING_PATTERNS: &[&str] = &[
    "not installed",
    "command not found",
    "no such file or directory",
    "cannot find the file specified",
    "is not recognized as an internal or external command",
];

pub const OPEN_DOCUMENTATION_ACTION: &str = "Open Documentation";
const INSTALL_HINT: &str = "Hypha CLI not found. Please install Hypha and ensure it is in your PATH, or configure the binary path in settings.";

pub fn is_cli_missing_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    CLI_MISSING_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Startup warning shown when the CLI cannot be run at all. A binary that exists
/// but fails its version check gets the failure reason in the message.
pub fn build_cli_missing_payload(binary_path: &str, probe: &CliProbe) -> serde_json::Value {
    let message = match probe.reason.as_deref() {
        Some(reason) if !probe.missing => format!("Hypha CLI at {} could not be run: {}", binary_path, reason),
        _ => INSTALL_HINT.to_string(),
    };
    serde_json::json!({
        "code": if probe.missing { "CLI_MISSING" } else { "CLI_UNUSABLE" },
        "binaryPath": binary_path,
        "reason": probe.reason,
        "message": message,
        "actions": [OPEN_DOCUMENTATION_ACTION],
    })
}
