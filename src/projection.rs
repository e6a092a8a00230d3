use crate::filter::ActiveFilter;
use crate::models::{FieldValue, Frontmatter, SortOrder, Topic};
use crate::settings::SidebarSettings;
use crate::warnings::WarningIndex;
use serde::Serialize;

pub const VIEW_NAME: &str = "Topics";
pub const MAX_BADGE_VALUE_LENGTH: usize = 20;
pub const BADGE_SEPARATOR: &str = " │ ";
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load topics";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Row {
    #[serde(rename_all = "camelCase")]
    Message { text: String, icon: String },
    Topic(TopicRow),
}

impl Row {
    pub fn message(text: impl Into<String>, icon: &str) -> Self {
        Self::Message {
            text: text.into(),
            icon: icon.to_string(),
        }
    }

    pub fn load_failed() -> Self {
        Self::message(LOAD_FAILED_MESSAGE, "error")
    }

    pub fn as_topic(&self) -> Option<&TopicRow> {
        match self {
            Self::Topic(row) => Some(row),
            Self::Message { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRow {
    pub topic: Topic,
    pub has_warning: bool,
    pub badge: Option<String>,
    pub tooltip: String,
    pub icon: String,
}

impl TopicRow {
    pub fn new(topic: Topic, has_warning: bool, badges: &BadgeConfig) -> Self {
        let badge = Some(build_badges(&topic.frontmatter, &badges.display_fields, badges.max_badges))
            .filter(|text| !text.is_empty());
        let tooltip = build_tooltip(&topic);
        let icon = if has_warning { "warning" } else { "note" };
        Self {
            topic,
            has_warning,
            badge,
            tooltip,
            icon: icon.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgeConfig {
    pub display_fields: Vec<String>,
    pub max_badges: usize,
}

impl From<&SidebarSettings> for BadgeConfig {
    fn from(settings: &SidebarSettings) -> Self {
        Self {
            display_fields: settings.display_fields.clone(),
            max_badges: settings.effective_max_badges(),
        }
    }
}

/// Whitelisted frontmatter rendered as `key:value` pairs; empty when nothing qualifies.
pub fn build_badges(frontmatter: &Frontmatter, display_fields: &[String], max_badges: usize) -> String {
    if display_fields.is_empty() {
        return String::new();
    }

    let entries: Vec<(&str, &FieldValue)> = frontmatter
        .iter()
        .filter(|(key, _)| display_fields.iter().any(|field| field.as_str() == *key))
        .collect();
    if entries.is_empty() {
        return String::new();
    }

    let mut badges: Vec<String> = entries
        .iter()
        .take(max_badges)
        .map(|(key, value)| format!("{}:{}", key, truncate_value(&value.format())))
        .collect();

    let remaining = entries.len().saturating_sub(max_badges);
    if remaining > 0 {
        badges.push(format!("+{}", remaining));
    }

    badges.join(BADGE_SEPARATOR)
}

fn truncate_value(formatted: &str) -> String {
    if formatted.chars().count() <= MAX_BADGE_VALUE_LENGTH {
        return formatted.to_string();
    }
    let kept: String = formatted.chars().take(MAX_BADGE_VALUE_LENGTH - 3).collect();
    format!("{}...", kept)
}

pub fn build_tooltip(topic: &Topic) -> String {
    let mut tooltip = format!("**{}**\n\n", topic.title);
    if let Some(description) = topic.description.as_deref().filter(|text| !text.is_empty()) {
        tooltip.push_str(description);
        tooltip.push_str("\n\n");
    }
    if !topic.frontmatter.is_empty() {
        tooltip.push_str("---\n\n");
        for (key, value) in topic.frontmatter.iter() {
            tooltip.push_str(&format!("**{}:** {}\n\n", key, value.format()));
        }
    }
    tooltip
}

pub fn title_label(count: usize, filter_active: bool, sort: SortOrder) -> String {
    let suffix = sort.title_suffix();
    if filter_active {
        format!("{} ({} results{})", VIEW_NAME, count, suffix)
    } else if count > 0 {
        format!("{} ({}{})", VIEW_NAME, count, suffix)
    } else {
        VIEW_NAME.to_string()
    }
}

/// Rows for a successfully fetched list, in fetch order.
pub fn project_rows(
    topics: &[Topic],
    filter: &ActiveFilter,
    warnings: &WarningIndex,
    badges: &BadgeConfig,
) -> Vec<Row> {
    if topics.is_empty() {
        return match filter {
            ActiveFilter::Backlinks { title } => {
                vec![Row::message(format!("No backlinks to \"{}\"", title), "search")]
            }
            ActiveFilter::Search { query } => {
                vec![Row::message(format!("No results for \"{}\"", query), "search")]
            }
            ActiveFilter::All | ActiveFilter::ExternalSubset { .. } => Vec::new(),
        };
    }

    let mut rows = Vec::with_capacity(topics.len() + 1);
    match filter {
        ActiveFilter::Backlinks { title } => rows.push(Row::message(
            format!("Backlinks to \"{}\" ({})", title, topics.len()),
            "search",
        )),
        ActiveFilter::Search { query } => rows.push(Row::message(
            format!("Search: \"{}\" ({} results)", query, topics.len()),
            "search",
        )),
        ActiveFilter::All | ActiveFilter::ExternalSubset { .. } => {}
    }

    rows.extend(topics.iter().map(|topic| {
        let has_warning = warnings.contains(&topic.path);
        Row::Topic(TopicRow::new(topic.clone(), has_warning, badges))
    }));
    rows
}
