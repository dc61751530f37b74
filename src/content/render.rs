// src/content/render.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::{
    models::content::{ButtonPayload, ContentItem, ContentKind, ImagePayload},
    services::blob::BlobStorage,
};

static YOUTUBE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid youtube pattern"));

static VIMEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("valid vimeo pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoPlatform {
    Youtube,
    Vimeo,
}

impl VideoPlatform {
    pub fn embed_url(&self, video_id: &str) -> String {
        match self {
            VideoPlatform::Youtube => format!("https://www.youtube.com/embed/{video_id}"),
            VideoPlatform::Vimeo => format!("https://player.vimeo.com/video/{video_id}"),
        }
    }
}

/// Extracts the platform and video id from a YouTube or Vimeo URL.
/// Only the URL's own host decides the platform.
pub fn parse_video_url(raw: &str) -> Option<(VideoPlatform, String)> {
    let url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.strip_prefix("m.").unwrap_or(host);
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let (platform, id) = match host {
        "youtube.com" | "youtube-nocookie.com" => {
            let id = match segments.as_slice() {
                ["watch"] => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                ["embed" | "shorts" | "live" | "v", id, ..] => Some(id.to_string()),
                _ => None,
            }?;
            (VideoPlatform::Youtube, id)
        }
        "youtu.be" => (VideoPlatform::Youtube, segments.first()?.to_string()),
        "vimeo.com" | "player.vimeo.com" => (VideoPlatform::Vimeo, segments.last()?.to_string()),
        _ => return None,
    };

    let valid = match platform {
        VideoPlatform::Youtube => YOUTUBE_ID.is_match(&id),
        VideoPlatform::Vimeo => VIMEO_ID.is_match(&id),
    };
    valid.then_some((platform, id))
}

/// Display representation of one content item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayFragment {
    Empty,
    Document {
        title: String,
        href: String,
    },
    Video {
        title: String,
        platform: VideoPlatform,
        video_id: String,
        embed_url: String,
    },
    Link {
        href: String,
        text: String,
    },
    RichText {
        html: String,
    },
    Accordion {
        label: String,
        body: String,
    },
    Image {
        src: String,
        alt: String,
        caption: Option<String>,
    },
    Button {
        href: String,
        text: String,
        icon: Option<String>,
    },
}

/// Renders an item. Missing or malformed data yields [`DisplayFragment::Empty`].
pub fn render(item: &ContentItem, blobs: &dyn BlobStorage) -> DisplayFragment {
    let Some(kind) = item.kind() else {
        tracing::debug!(item_id = item.id, kind = %item.kind_tag, "Unknown content kind");
        return DisplayFragment::Empty;
    };
    let file_ref = item.file_ref.as_deref().filter(|r| !r.is_empty());

    match kind {
        ContentKind::Document => match file_ref {
            Some(file_ref) => DisplayFragment::Document {
                title: item.title.clone(),
                href: blobs.url_for(file_ref),
            },
            None => DisplayFragment::Empty,
        },
        ContentKind::Video => match parse_video_url(item.payload.trim()) {
            Some((platform, video_id)) => DisplayFragment::Video {
                title: item.title.clone(),
                embed_url: platform.embed_url(&video_id),
                platform,
                video_id,
            },
            None => DisplayFragment::Empty,
        },
        ContentKind::Link if item.payload.trim().is_empty() => DisplayFragment::Empty,
        ContentKind::Link => DisplayFragment::Link {
            href: item.payload.trim().to_string(),
            text: item.title.clone(),
        },
        // Markup was sanitized when it was authored.
        ContentKind::RichText => DisplayFragment::RichText {
            html: item.payload.clone(),
        },
        ContentKind::Accordion => DisplayFragment::Accordion {
            label: item.title.clone(),
            body: item.payload.clone(),
        },
        ContentKind::Image => match file_ref {
            Some(file_ref) => {
                let payload: ImagePayload = serde_json::from_str(&item.payload).unwrap_or_default();
                DisplayFragment::Image {
                    src: blobs.url_for(file_ref),
                    alt: item.title.clone(),
                    caption: payload.description.filter(|d| !d.trim().is_empty()),
                }
            }
            None => DisplayFragment::Empty,
        },
        ContentKind::Button => match item.url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                let payload: ButtonPayload = serde_json::from_str(&item.payload).unwrap_or_default();
                DisplayFragment::Button {
                    href: url.trim().to_string(),
                    text: payload
                        .text
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| item.title.clone()),
                    icon: payload.icon.filter(|i| !i.trim().is_empty()),
                }
            }
            None => DisplayFragment::Empty,
        },
    }
}

impl DisplayFragment {
    /// HTML for the fragment. Text and attributes are escaped; rich text and
    /// accordion bodies are emitted verbatim.
    pub fn to_html(&self) -> String {
        use html_escape::{encode_double_quoted_attribute as attr, encode_text as esc};

        match self {
            DisplayFragment::Empty => String::new(),
            DisplayFragment::Document { title, href } => format!(
                r#"<a class="content-document" href="{}" download>{}</a>"#,
                attr(href),
                esc(title)
            ),
            DisplayFragment::Video {
                title, embed_url, ..
            } => format!(
                r#"<iframe class="content-video" src="{}" title="{}" allowfullscreen></iframe>"#,
                attr(embed_url),
                attr(title)
            ),
            DisplayFragment::Link { href, text } => format!(
                r#"<a class="content-link" href="{}" target="_blank" rel="noopener">{}</a>"#,
                attr(href),
                esc(text)
            ),
            DisplayFragment::RichText { html } => {
                format!(r#"<div class="content-richtext">{html}</div>"#)
            }
            DisplayFragment::Accordion { label, body } => format!(
                r#"<details class="content-accordion"><summary>{}</summary>{body}</details>"#,
                esc(label)
            ),
            DisplayFragment::Image { src, alt, caption } => {
                let caption = caption
                    .as_deref()
                    .map(|c| format!("<figcaption>{}</figcaption>", esc(c)))
                    .unwrap_or_default();
                format!(
                    r#"<figure class="content-image"><img src="{}" alt="{}">{caption}</figure>"#,
                    attr(src),
                    attr(alt)
                )
            }
            DisplayFragment::Button { href, text, icon } => {
                let icon = icon
                    .as_deref()
                    .map(|i| format!(r#"<i class="{}"></i> "#, attr(i)))
                    .unwrap_or_default();
                format!(
                    r#"<a class="content-button" href="{}">{icon}{}</a>"#,
                    attr(href),
                    esc(text)
                )
            }
        }
    }
}
