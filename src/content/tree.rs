// src/content/tree.rs

use std::sync::Arc;

use crate::{
    access::{owned_course, readable_course},
    content::render::{DisplayFragment, render},
    error::AppError,
    models::{
        content::{
            ContentItem, ContentKind, CreateItemRequest, NewContentItem, UpdateItemRequest,
            validate_item_body,
        },
        topic::{CreateTopicRequest, Topic, TopicWithItems},
        user::AuthContext,
    },
    services::blob::BlobStorage,
    store::{OrderRange, Scope, Store, UnitOfWork},
    utils::html::clean_html,
};

/// Order a new member of a scope receives: one past the current maximum.
pub async fn next_order(uow: &mut dyn UnitOfWork, scope: Scope) -> Result<i32, AppError> {
    Ok(uow.max_order(scope).await? + 1)
}

/// Shifts the siblings between `current` and `target` so the member leaving
/// `current` can take `target`. The caller writes the member's own order.
pub async fn shift_for_move(
    uow: &mut dyn UnitOfWork,
    scope: Scope,
    current: i32,
    target: i32,
) -> Result<(), AppError> {
    if target < current {
        uow.shift_orders(scope, OrderRange::between(target, current - 1), 1)
            .await?;
    } else if target > current {
        uow.shift_orders(scope, OrderRange::between(current + 1, target), -1)
            .await?;
    }
    Ok(())
}

/// Opens room at `target` in a scope the member is entering.
pub async fn shift_for_insert(
    uow: &mut dyn UnitOfWork,
    scope: Scope,
    target: i32,
) -> Result<(), AppError> {
    uow.shift_orders(scope, OrderRange::from(target), 1).await?;
    Ok(())
}

/// An item with its rendered form.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RenderedItem {
    pub item: ContentItem,
    pub fragment: DisplayFragment,
    pub html: String,
}

/// Authoring and reading of a course's topics and content items.
#[derive(Clone)]
pub struct ContentTree {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStorage>,
}

impl ContentTree {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStorage>) -> Self {
        Self { store, blobs }
    }

    /// Appends a topic at the end of the course.
    pub async fn create_topic(
        &self,
        ctx: &AuthContext,
        course_id: i64,
        req: &CreateTopicRequest,
    ) -> Result<Topic, AppError> {
        let mut uow = self.store.begin().await?;
        owned_course(uow.as_mut(), ctx, course_id).await?;

        let order = next_order(uow.as_mut(), Scope::Course(course_id)).await?;
        let description = req
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        let topic = uow
            .insert_topic(course_id, req.title.trim(), description, order)
            .await?;

        uow.commit().await?;
        tracing::info!(topic_id = topic.id, course_id, order, "Topic created");
        Ok(topic)
    }

    /// Topics of a course with their items, both in display order.
    pub async fn course_outline(
        &self,
        ctx: &AuthContext,
        course_id: i64,
    ) -> Result<Vec<TopicWithItems>, AppError> {
        let mut uow = self.store.begin().await?;
        readable_course(uow.as_mut(), ctx, course_id).await?;

        let topics = uow.list_topics(course_id).await?;
        let mut outline = Vec::with_capacity(topics.len());
        for topic in topics {
            let items = uow.list_items(topic.id).await?;
            outline.push(TopicWithItems { topic, items });
        }
        Ok(outline)
    }

    /// Moves a topic to `new_index` within its course; siblings in between shift by one.
    pub async fn reorder_topic(
        &self,
        ctx: &AuthContext,
        topic_id: i64,
        new_index: i32,
    ) -> Result<Topic, AppError> {
        let mut uow = self.store.begin().await?;
        let mut topic = find_topic(uow.as_mut(), topic_id).await?;
        owned_course(uow.as_mut(), ctx, topic.course_id).await?;

        let scope = Scope::Course(topic.course_id);
        let max = uow.max_order(scope).await?;
        let target = new_index.clamp(1, max.max(1));

        shift_for_move(uow.as_mut(), scope, topic.sort_order, target).await?;
        uow.set_topic_order(topic.id, target).await?;
        uow.commit().await?;

        tracing::info!(topic_id, from = topic.sort_order, to = target, "Topic reordered");
        topic.sort_order = target;
        Ok(topic)
    }

    /// Deletes a topic and its items. Remaining topics keep their orders.
    pub async fn delete_topic(&self, ctx: &AuthContext, topic_id: i64) -> Result<(), AppError> {
        let mut uow = self.store.begin().await?;
        let topic = find_topic(uow.as_mut(), topic_id).await?;
        owned_course(uow.as_mut(), ctx, topic.course_id).await?;

        let items = uow.list_items(topic.id).await?;
        uow.delete_topic(topic.id).await?;
        uow.commit().await?;

        tracing::info!(topic_id, items = items.len(), "Topic deleted");
        for item in &items {
            self.release_file(item.file_ref.as_deref()).await;
        }
        Ok(())
    }

    /// Appends an item at the end of the topic.
    pub async fn create_item(
        &self,
        ctx: &AuthContext,
        topic_id: i64,
        req: &CreateItemRequest,
    ) -> Result<ContentItem, AppError> {
        let payload = authored_payload(req.kind, &req.payload);
        validate_item_body(req.kind, &payload, req.file_ref.as_deref(), req.url.as_deref())?;

        let mut uow = self.store.begin().await?;
        let topic = find_topic(uow.as_mut(), topic_id).await?;
        owned_course(uow.as_mut(), ctx, topic.course_id).await?;

        let order = next_order(uow.as_mut(), Scope::Topic(topic.id)).await?;
        let new_item = NewContentItem {
            topic_id: topic.id,
            title: req.title.trim().to_string(),
            kind: req.kind,
            payload,
            file_ref: req.file_ref.clone(),
            url: req.url.as_deref().map(|u| u.trim().to_string()),
        };
        let item = uow.insert_item(&new_item, order).await?;
        uow.commit().await?;

        tracing::info!(item_id = item.id, topic_id, kind = %req.kind, order, "Item created");
        Ok(item)
    }

    /// Edits title, payload, url or file of an item. The kind is fixed.
    pub async fn update_item(
        &self,
        ctx: &AuthContext,
        item_id: i64,
        req: &UpdateItemRequest,
    ) -> Result<ContentItem, AppError> {
        let mut uow = self.store.begin().await?;
        let mut item = find_item(uow.as_mut(), item_id).await?;
        let topic = find_topic(uow.as_mut(), item.topic_id).await?;
        owned_course(uow.as_mut(), ctx, topic.course_id).await?;

        let kind = item.kind().ok_or_else(|| {
            AppError::validation("kind", format!("Unsupported content kind '{}'", item.kind_tag))
        })?;

        let replaced_file = match &req.file_ref {
            Some(new_ref) if item.file_ref.as_ref() != Some(new_ref) => item.file_ref.take(),
            _ => None,
        };
        if let Some(title) = &req.title {
            item.title = title.trim().to_string();
        }
        if let Some(payload) = &req.payload {
            item.payload = authored_payload(kind, payload);
        }
        if let Some(file_ref) = &req.file_ref {
            item.file_ref = Some(file_ref.clone());
        }
        if let Some(url) = &req.url {
            item.url = Some(url.trim().to_string());
        }

        validate_item_body(kind, &item.payload, item.file_ref.as_deref(), item.url.as_deref())?;

        uow.update_item(&item).await?;
        uow.commit().await?;

        tracing::info!(item_id, "Item updated");
        self.release_file(replaced_file.as_deref()).await;
        Ok(item)
    }

    /// Repositions an item, optionally into another topic of the same course.
    ///
    /// Within a topic the siblings between the old and new position shift by
    /// one. When moving to another topic, destination siblings at or after
    /// `new_index` shift up and the source topic keeps its remaining orders.
    pub async fn move_item(
        &self,
        ctx: &AuthContext,
        item_id: i64,
        target_topic_id: Option<i64>,
        new_index: i32,
    ) -> Result<ContentItem, AppError> {
        let mut uow = self.store.begin().await?;
        let mut item = find_item(uow.as_mut(), item_id).await?;
        let source = find_topic(uow.as_mut(), item.topic_id).await?;
        owned_course(uow.as_mut(), ctx, source.course_id).await?;

        let destination_id = target_topic_id.unwrap_or(source.id);

        if destination_id == source.id {
            let scope = Scope::Topic(source.id);
            let max = uow.max_order(scope).await?;
            let target = new_index.clamp(1, max.max(1));

            shift_for_move(uow.as_mut(), scope, item.sort_order, target).await?;
            uow.place_item(item.id, source.id, target).await?;
            item.sort_order = target;
        } else {
            let destination = find_topic(uow.as_mut(), destination_id).await?;
            if destination.course_id != source.course_id {
                owned_course(uow.as_mut(), ctx, destination.course_id).await?;
            }

            let scope = Scope::Topic(destination.id);
            let max = uow.max_order(scope).await?;
            let target = new_index.clamp(1, max + 1);

            shift_for_insert(uow.as_mut(), scope, target).await?;
            uow.place_item(item.id, destination.id, target).await?;
            item.topic_id = destination.id;
            item.sort_order = target;
        }

        uow.commit().await?;

        tracing::info!(
            item_id,
            from_topic = source.id,
            to_topic = item.topic_id,
            order = item.sort_order,
            "Item moved"
        );
        Ok(item)
    }

    /// Deletes an item. Remaining siblings keep their orders.
    pub async fn delete_item(&self, ctx: &AuthContext, item_id: i64) -> Result<(), AppError> {
        let mut uow = self.store.begin().await?;
        let item = find_item(uow.as_mut(), item_id).await?;
        let topic = find_topic(uow.as_mut(), item.topic_id).await?;
        owned_course(uow.as_mut(), ctx, topic.course_id).await?;

        uow.delete_item(item.id).await?;
        uow.commit().await?;

        tracing::info!(item_id, topic_id = topic.id, "Item deleted");
        self.release_file(item.file_ref.as_deref()).await;
        Ok(())
    }

    /// Loads an item the caller may read and renders it.
    pub async fn render_item(
        &self,
        ctx: &AuthContext,
        item_id: i64,
    ) -> Result<RenderedItem, AppError> {
        let mut uow = self.store.begin().await?;
        let item = find_item(uow.as_mut(), item_id).await?;
        let topic = find_topic(uow.as_mut(), item.topic_id).await?;
        readable_course(uow.as_mut(), ctx, topic.course_id).await?;

        let fragment = render(&item, self.blobs.as_ref());
        let html = fragment.to_html();
        Ok(RenderedItem {
            item,
            fragment,
            html,
        })
    }

    /// Removes a blob that is no longer referenced. Failures are only logged.
    async fn release_file(&self, file_ref: Option<&str>) {
        let Some(file_ref) = file_ref else { return };
        match self.blobs.delete(file_ref).await {
            Ok(true) => tracing::debug!(file_ref, "Blob released"),
            Ok(false) => tracing::warn!(file_ref, "Blob already gone"),
            Err(e) => tracing::warn!(file_ref, "Failed to release blob: {}", e),
        }
    }
}

/// Rich text and accordion bodies are sanitized on the way in; the renderer trusts them.
fn authored_payload(kind: ContentKind, payload: &str) -> String {
    match kind {
        ContentKind::RichText | ContentKind::Accordion => clean_html(payload),
        _ => payload.trim().to_string(),
    }
}

async fn find_topic(uow: &mut dyn UnitOfWork, topic_id: i64) -> Result<Topic, AppError> {
    uow.find_topic(topic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Topic not found".to_string()))
}

async fn find_item(uow: &mut dyn UnitOfWork, item_id: i64) -> Result<ContentItem, AppError> {
    uow.find_item(item_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Content item not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn richtext_is_sanitized_when_authored() {
        let cleaned = authored_payload(
            ContentKind::RichText,
            r#"<p onclick="x()">Hi<script>alert(1)</script></p>"#,
        );
        assert_eq!(cleaned, "<p>Hi</p>");
    }

    #[test]
    fn urls_are_trimmed_not_sanitized() {
        assert_eq!(
            authored_payload(ContentKind::Link, "  https://example.org/?a=1&b=2 "),
            "https://example.org/?a=1&b=2"
        );
    }
}
