//! Payload and outcome types for the Threads Graph API.

use serde::{Deserialize, Serialize};
use spool_sheets::Row;

/// Media type of a Threads container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Text,
    Image,
}

/// Container-creation payload. Optional fields are omitted entirely when
/// the row leaves them blank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContainer {
    pub media_type: MediaType,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_attachment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_publish_text: Option<bool>,
}

impl CreateContainer {
    /// Image post: the container is published by a second call.
    pub fn image(row: &Row) -> Self {
        Self {
            media_type: MediaType::Image,
            text: row.text.trim().to_string(),
            image_url: Some(row.image_url.trim().to_string()),
            alt_text: opt(&row.alt_text),
            reply_control: opt(&row.reply_control),
            topic_tag: opt(&row.topic_tag),
            location_id: opt(&row.location_id),
            link_attachment: None,
            auto_publish_text: None,
        }
    }

    /// Text post: `auto_publish_text` makes creation the only call.
    pub fn text(row: &Row) -> Self {
        Self {
            media_type: MediaType::Text,
            text: row.text.trim().to_string(),
            image_url: None,
            alt_text: opt(&row.alt_text),
            reply_control: opt(&row.reply_control),
            topic_tag: opt(&row.topic_tag),
            location_id: opt(&row.location_id),
            link_attachment: opt(&row.link_attachment),
            auto_publish_text: Some(true),
        }
    }
}

fn opt(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Outcome of one submitted row. Folded into the row's status fields by
/// the run loop; not persisted on its own.
#[derive(Debug, Clone, Serialize)]
pub struct PostOutcome {
    pub status: &'static str,
    pub container_id: String,
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<serde_json::Value>,
}
