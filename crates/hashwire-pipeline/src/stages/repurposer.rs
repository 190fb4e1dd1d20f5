use async_trait::async_trait;

use crate::package::{Platform, PlatformVariant, ReviewedDraft};
use crate::stage::{Stage, StageFailed, StageKind};

/// Produces per-platform variants of a reviewed draft.
#[derive(Debug, Clone, Default)]
pub struct Repurposer;

impl Repurposer {
    pub fn new() -> Self {
        Self
    }

    pub fn variant(platform: Platform, reviewed: &ReviewedDraft) -> PlatformVariant {
        let draft = &reviewed.draft;
        let paragraphs: Vec<&str> = draft
            .body
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let text = match platform {
            Platform::X => {
                let tags = hashtags(&draft.brief.topic.keywords, 2);
                let lead = paragraphs.first().copied().unwrap_or_default();
                let budget = 280usize.saturating_sub(tags.chars().count() + 1);
                let head = trim_to(&format!("{}: {}", draft.title, lead), budget);
                if tags.is_empty() {
                    head
                } else {
                    format!("{head} {tags}")
                }
            }
            Platform::LinkedIn => {
                let mut text = draft.title.clone();
                for p in paragraphs.iter().take(3) {
                    text.push_str("\n\n");
                    text.push_str(p);
                }
                let tags = hashtags(&draft.brief.topic.keywords, 5);
                if !tags.is_empty() {
                    text.push_str("\n\n");
                    text.push_str(&tags);
                }
                trim_to(&text, 3000)
            }
            Platform::Newsletter => {
                let mut text = format!(
                    "Subject: {}\n\n{}\n\n({} min read)",
                    draft.title, draft.body, reviewed.reading_minutes
                );
                if !draft.brief.sources.is_empty() {
                    text.push_str("\n\nSources:");
                    for source in &draft.brief.sources {
                        text.push_str(&format!("\n- {} ({})", source.title, source.url));
                    }
                }
                text
            }
        };
        PlatformVariant { platform, text }
    }
}

fn hashtags(keywords: &[String], limit: usize) -> String {
    keywords
        .iter()
        .map(|k| {
            k.split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(|w| {
                    let mut chars = w.chars();
                    chars
                        .next()
                        .map(|first| first.to_uppercase().chain(chars).collect::<String>())
                        .unwrap_or_default()
                })
                .collect::<String>()
        })
        .filter(|tag| !tag.is_empty())
        .take(limit)
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trim `text` to at most `max` characters, cutting at a word boundary and
/// marking the cut with an ellipsis.
pub fn trim_to(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let keep: String = text.chars().take(max - 1).collect();
    let cut = match keep.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => keep[..idx].trim_end(),
        _ => keep.as_str(),
    };
    format!("{cut}…")
}

#[async_trait]
impl Stage<ReviewedDraft, Vec<PlatformVariant>> for Repurposer {
    fn kind(&self) -> StageKind {
        StageKind::Repurposer
    }

    async fn run(&self, reviewed: ReviewedDraft) -> Result<Vec<PlatformVariant>, StageFailed> {
        let variants: Vec<PlatformVariant> = Platform::ALL
            .iter()
            .map(|p| Self::variant(*p, &reviewed))
            .collect();
        if let Some(v) = variants.iter().find(|v| v.text.trim().is_empty()) {
            return Err(StageFailed::new(
                StageKind::Repurposer,
                reviewed.draft.brief.topic.id,
                format!("empty {} variant", v.platform.name()),
            ));
        }
        Ok(variants)
    }
}
