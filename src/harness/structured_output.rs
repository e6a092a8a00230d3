use crate::models::{Frontmatter, LintResult, Topic};
use serde::Deserialize;
use serde_json::Value;

/// Wire shape of one topic; `backlinks --json` only carries title and path.
#[derive(Debug, Deserialize)]
struct RawTopic {
    title: String,
    path: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    frontmatter: Option<serde_json::Map<String, Value>>,
}

impl From<RawTopic> for Topic {
    fn from(raw: RawTopic) -> Self {
        Topic {
            title: raw.title,
            description: raw.description.filter(|text| !text.is_empty()),
            path: raw.path,
            frontmatter: raw.frontmatter.map(Frontmatter::from_json_map).unwrap_or_default(),
        }
    }
}

fn parse_json_value(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Decodes a topic array. Anything malformed yields an empty list.
pub fn parse_topics(raw: &str) -> Vec<Topic> {
    let Some(value) = parse_json_value(raw) else {
        tracing::debug!(bytes = raw.len(), "topic output was not valid JSON");
        return Vec::new();
    };
    topics_from_value(value)
}

/// Same decoding for topics that arrive already parsed, e.g. a subset pushed by the host.
pub fn topics_from_value(value: Value) -> Vec<Topic> {
    match serde_json::from_value::<Vec<RawTopic>>(value) {
        Ok(topics) => topics.into_iter().map(Topic::from).collect(),
        Err(error) => {
            tracing::debug!(error = %error, "topic subset did not match the expected shape");
            Vec::new()
        }
    }
}

pub fn parse_lint_results(raw: &str) -> Vec<LintResult> {
    let Some(value) = parse_json_value(raw) else {
        tracing::debug!(bytes = raw.len(), "lint output was not valid JSON");
        return Vec::new();
    };
    match serde_json::from_value::<Vec<LintResult>>(value) {
        Ok(results) => results,
        Err(error) => {
            tracing::debug!(error = %error, "lint output did not match the expected shape");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_lint_results, parse_topics, topics_from_value};
    use crate::models::file_name;

    #[test]
    fn decodes_full_topic_records() {
        let topics = parse_topics(
            r#"[{"title":"Ideas","description":"","path":"/n/ideas.md","frontmatter":{"status":"active","tags":["a","b"]}}]"#,
        );
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].title, "Ideas");
        assert_eq!(topics[0].description, None);
        assert_eq!(topics[0].frontmatter.len(), 2);
    }

    #[test]
    fn decodes_backlink_records_without_frontmatter() {
        let topics = parse_topics(r#"[{"title":"Ref","path":"/n/ref.md"}]"#);
        assert_eq!(topics.len(), 1);
        assert!(topics[0].frontmatter.is_empty());
    }

    #[test]
    fn malformed_output_degrades_to_empty() {
        assert!(parse_topics("").is_empty());
        assert!(parse_topics("Error: something broke").is_empty());
        assert!(parse_topics(r#"{"title":"not an array"}"#).is_empty());
        assert!(parse_topics(r#"[{"path":"/missing/title.md"}]"#).is_empty());
    }

    #[test]
    fn decodes_lint_results_with_optional_positions() {
        let results = parse_lint_results(
            r#"[{"title":"A","path":"/n/a.md","warnings":[{"message":"Empty content"},{"message":"Broken link: b.md","line":4,"column":2}],"frontmatter":{}}]"#,
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].warnings.len(), 2);
        assert_eq!(results[0].warnings[1].line, Some(4));
        assert!(parse_lint_results("No issues found.").is_empty());
    }

    #[test]
    fn decodes_pushed_subset_values() {
        let topics = topics_from_value(serde_json::json!([{"title":"Pinned","path":"/n/pinned.md"}]));
        assert_eq!(topics.len(), 1);
        assert_eq!(file_name(&topics[0].path), "pinned.md");
        assert!(topics_from_value(serde_json::json!({"title":"x"})).is_empty());
    }
}
