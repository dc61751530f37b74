// src/models/content.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;
use validator::Validate;

use crate::error::AppError;

/// The fixed set of content variants a topic can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Document,
    Video,
    Link,
    RichText,
    Image,
    Accordion,
    Button,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Document => "document",
            ContentKind::Video => "video",
            ContentKind::Link => "link",
            ContentKind::RichText => "richtext",
            ContentKind::Image => "image",
            ContentKind::Accordion => "accordion",
            ContentKind::Button => "button",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(ContentKind::Document),
            "video" => Ok(ContentKind::Video),
            "link" => Ok(ContentKind::Link),
            "richtext" => Ok(ContentKind::RichText),
            "image" => Ok(ContentKind::Image),
            "accordion" => Ok(ContentKind::Accordion),
            "button" => Ok(ContentKind::Button),
            other => Err(format!("unknown content kind '{other}'")),
        }
    }
}

/// Represents the 'content_items' table in the database.
///
/// `kind` is kept as stored so rows written by older versions still load;
/// use [`ContentItem::kind`] to get the typed variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub topic_id: i64,
    pub title: String,
    #[serde(rename = "kind")]
    pub kind_tag: String,

    /// URL, markup or JSON, depending on the kind.
    pub payload: String,

    /// Handle into blob storage (documents and images).
    pub file_ref: Option<String>,

    /// Link target for buttons.
    pub url: Option<String>,

    #[serde(rename = "order")]
    pub sort_order: i32,
}

impl ContentItem {
    pub fn kind(&self) -> Option<ContentKind> {
        self.kind_tag.parse().ok()
    }
}

/// Payload of an image item. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub description: Option<String>,
}

/// Payload of a button item. The target lives in `ContentItem::url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ButtonPayload {
    pub text: Option<String>,
    pub icon: Option<String>,
}

/// Insert-ready values for a content item.
#[derive(Debug, Clone)]
pub struct NewContentItem {
    pub topic_id: i64,
    pub title: String,
    pub kind: ContentKind,
    pub payload: String,
    pub file_ref: Option<String>,
    pub url: Option<String>,
}

/// DTO for creating a new content item.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub kind: ContentKind,
    #[validate(length(max = 100000))]
    #[serde(default)]
    pub payload: String,
    #[validate(length(min = 1, max = 200))]
    pub file_ref: Option<String>,
    #[validate(length(max = 2000))]
    pub url: Option<String>,
}

/// DTO for editing an item. The kind cannot change.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 100000))]
    pub payload: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub file_ref: Option<String>,
    #[validate(length(max = 2000))]
    pub url: Option<String>,
}

/// Checks that payload, file and url make sense for the kind.
pub fn validate_item_body(
    kind: ContentKind,
    payload: &str,
    file_ref: Option<&str>,
    url: Option<&str>,
) -> Result<(), AppError> {
    match kind {
        ContentKind::Document => require_file(file_ref),
        ContentKind::Image => {
            require_file(file_ref)?;
            if !payload.trim().is_empty() {
                serde_json::from_str::<ImagePayload>(payload)?;
            }
            Ok(())
        }
        ContentKind::Link | ContentKind::Video => validate_web_url("payload", payload),
        ContentKind::Button => {
            validate_web_url("url", url.unwrap_or_default())?;
            if !payload.trim().is_empty() {
                serde_json::from_str::<ButtonPayload>(payload)?;
            }
            Ok(())
        }
        ContentKind::RichText | ContentKind::Accordion => Ok(()),
    }
}

fn require_file(file_ref: Option<&str>) -> Result<(), AppError> {
    match file_ref {
        Some(file_ref) if !file_ref.trim().is_empty() => Ok(()),
        _ => Err(AppError::validation("file_ref", "A stored file is required")),
    }
}

/// Validates that a string is an absolute http(s) URL.
fn validate_web_url(field: &str, value: &str) -> Result<(), AppError> {
    match Url::parse(value.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::validation(field, "Must be an http(s) URL")),
    }
}
