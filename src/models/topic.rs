// src/models/topic.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::content::ContentItem;

/// Represents the 'topics' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,

    /// Position within the course, starting at 1.
    #[serde(rename = "order")]
    pub sort_order: i32,
}

/// A topic together with its items, both in display order.
#[derive(Debug, Clone, Serialize)]
pub struct TopicWithItems {
    #[serde(flatten)]
    pub topic: Topic,
    pub items: Vec<ContentItem>,
}

/// DTO for creating a new topic.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// DTO for repositioning a topic or an item.
///
/// `topic_id` is only meaningful for items: when set to a different topic the
/// item moves there.
#[derive(Debug, Deserialize, Validate)]
pub struct ReorderRequest {
    #[validate(range(min = 1))]
    pub new_index: i32,
    pub topic_id: Option<i64>,
}
