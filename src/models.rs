use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Alpha,
    Modified,
    Created,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Modified => "modified",
            Self::Created => "created",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Alpha => Self::Modified,
            Self::Modified => Self::Created,
            Self::Created => Self::Alpha,
        }
    }

    /// Suffix appended to the view title; empty for alphabetical.
    pub fn title_suffix(self) -> String {
        match self {
            Self::Alpha => String::new(),
            other => format!(" • {}", other.as_str()),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "alpha" | "alphabetical" => Some(Self::Alpha),
            "modified" => Some(Self::Modified),
            "created" => Some(Self::Created),
            _ => None,
        }
    }
}

/// Session-wide sort order. Changing it never refreshes by itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState {
    current: SortOrder,
}

impl SortState {
    pub fn current(&self) -> SortOrder {
        self.current
    }

    pub fn cycle(&mut self) -> SortOrder {
        self.current = self.current.next();
        self.current
    }

    pub fn set(&mut self, order: SortOrder) {
        self.current = order;
    }
}

/// Frontmatter value as shown in badges and tooltips.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    List(Vec<String>),
}

impl FieldValue {
    /// Maps an arbitrary JSON value onto the closed variant set. `null` has no display form.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::String(text) => Some(Self::Text(text)),
            Value::Number(number) => Some(Self::Number(number)),
            Value::Bool(flag) => Some(Self::Bool(flag)),
            Value::Array(items) => Some(Self::List(items.iter().map(scalar_text).collect())),
            object @ Value::Object(_) => Some(Self::Text(object.to_string())),
        }
    }

    pub fn format(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
            Self::Bool(flag) => flag.to_string(),
            Self::List(items) => items.join(", "),
        }
    }
}

fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Ordered frontmatter mapping; keeps the order the CLI emitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter(Vec<(String, FieldValue)>);

impl Frontmatter {
    pub fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter()
            .filter_map(|(key, value)| FieldValue::from_json(value).map(|value| (key, value)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Frontmatter {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Frontmatter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// One note record. Identity is the path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub title: String,
    pub description: Option<String>,
    pub path: String,
    pub frontmatter: Frontmatter,
}

impl Topic {
    pub fn new(title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            path: path.into(),
            frontmatter: Frontmatter::default(),
        }
    }
}

/// Last path segment, accepting either separator.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintWarning {
    pub message: String,
    /// 1-based.
    #[serde(default)]
    pub line: Option<u32>,
    /// 1-based.
    #[serde(default)]
    pub column: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintResult {
    #[serde(default)]
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub warnings: Vec<LintWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticSeverity {
    Warning,
}

/// Host-side diagnostic with 0-based positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub severity: DiagnosticSeverity,
    pub source: String,
}

impl From<&LintWarning> for Diagnostic {
    fn from(warning: &LintWarning) -> Self {
        Self {
            message: warning.message.clone(),
            line: warning.line.map(|line| line.saturating_sub(1)).unwrap_or(0),
            column: warning.column.map(|column| column.saturating_sub(1)).unwrap_or(0),
            severity: DiagnosticSeverity::Warning,
            source: "hypha".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKey {
    #[serde(rename = "hypha.isConfigured")]
    IsConfigured,
    #[serde(rename = "hypha.hasSearch")]
    HasSearch,
    #[serde(rename = "hypha.sortOrder")]
    SortOrder,
}

impl ContextKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IsConfigured => "hypha.isConfigured",
            Self::HasSearch => "hypha.hasSearch",
            Self::SortOrder => "hypha.sortOrder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Outgoing frame written by the stdio host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEnvelope {
    pub r#type: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::{file_name, Diagnostic, Frontmatter, LintWarning, SortOrder, SortState};
    use serde_json::json;

    #[test]
    fn sort_cycles_through_all_orders() {
        let mut sort = SortState::default();
        assert_eq!(sort.current(), SortOrder::Alpha);
        assert_eq!(sort.cycle(), SortOrder::Modified);
        assert_eq!(sort.cycle(), SortOrder::Created);
        assert_eq!(sort.cycle(), SortOrder::Alpha);
        sort.set(SortOrder::Created);
        assert_eq!(sort.current(), SortOrder::Created);
    }

    #[test]
    fn title_suffix_is_empty_only_for_alpha() {
        assert_eq!(SortOrder::Alpha.title_suffix(), "");
        assert_eq!(SortOrder::Modified.title_suffix(), " • modified");
    }

    #[test]
    fn frontmatter_keeps_emitted_order_and_drops_nulls() {
        let raw = json!({"zeta": "z", "alpha": null, "tags": ["x", 2, true], "count": 3});
        let serde_json::Value::Object(map) = raw else {
            panic!("object");
        };
        let frontmatter = Frontmatter::from_json_map(map);
        let keys: Vec<&str> = frontmatter.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["zeta", "tags", "count"]);
        let formatted: Vec<(&str, String)> = frontmatter
            .iter()
            .map(|(key, value)| (key, value.format()))
            .collect();
        assert!(formatted.contains(&("tags", "x, 2, true".to_string())));
        assert!(formatted.contains(&("count", "3".to_string())));
    }

    #[test]
    fn diagnostics_convert_to_zero_based_positions() {
        let positioned = Diagnostic::from(&LintWarning {
            message: "Broken link: a.md".to_string(),
            line: Some(5),
            column: Some(3),
        });
        assert_eq!((positioned.line, positioned.column), (4, 2));

        let bare = Diagnostic::from(&LintWarning {
            message: "Empty content".to_string(),
            line: None,
            column: None,
        });
        assert_eq!((bare.line, bare.column), (0, 0));
        assert_eq!(bare.source, "hypha");
    }

    #[test]
    fn file_name_handles_both_separators() {
        assert_eq!(file_name("/notes/a-topic.md"), "a-topic.md");
        assert_eq!(file_name("C:\\notes\\b.md"), "b.md");
    }
}
