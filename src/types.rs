use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One piece of ingested content, handed to the pipeline by an ingestion
/// source (RSS scraper, video transcriber, etc.). Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Source-local identifier, unique within one source type.
    pub source_id: String,
    pub title: String,
    pub body: String,
    pub article_type: ArticleType,
    pub source_url: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleType {
    Article,
    Video,
    BlogPost,
}

impl ArticleType {
    /// Stable lowercase name, used in digest ids and prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleType::Article => "article",
            ArticleType::Video => "video",
            ArticleType::BlogPost => "blog_post",
        }
    }
}

impl std::fmt::Display for ArticleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM-generated short title + summary for one content item.
///
/// `id` is the composite join key `{article_type}-{source_id}`; unique
/// within a run and stable when re-derived from the same item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub article_type: ArticleType,
    pub source_url: String,
}

impl Digest {
    /// Composite key for a content item, stable across re-derivation.
    pub fn make_id(article_type: ArticleType, source_id: &str) -> String {
        format!("{}-{}", article_type, source_id)
    }
}

/// One digest after curation: scored, ranked, ready for the email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntry {
    pub digest_id: String,
    /// Dense 1-based ordinal, consistent with descending `relevance_score`.
    pub rank: u32,
    /// Bounded to 0.0..=10.0.
    pub relevance_score: f64,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub article_type: ArticleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Personalized greeting + overview for the top of the email.
/// Regenerated on every run, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Introduction {
    pub greeting: String,
    pub introduction: String,
}

/// The final composed digest: introduction plus the top-N ranked entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestDocument {
    pub introduction: Introduction,
    pub entries: Vec<RankedEntry>,
    pub total_ranked: usize,
    pub top_n: usize,
}

impl DigestDocument {
    /// Deterministic Markdown rendering: greeting, introduction, then one
    /// title/summary/link block per entry in rank order. Pure, no model
    /// dependency.
    pub fn to_markdown(&self) -> String {
        let mut markdown = format!("{}\n\n", self.introduction.greeting);
        markdown.push_str(&format!("{}\n\n", self.introduction.introduction));
        markdown.push_str("---\n\n");

        for entry in &self.entries {
            markdown.push_str(&format!("## {}\n\n", entry.title));
            markdown.push_str(&format!("{}\n\n", entry.summary));
            markdown.push_str(&format!("[Read more →]({})\n\n", entry.url));
            markdown.push_str("---\n\n");
        }

        markdown
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("model transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model returned no text payload")]
    EmptyResponse,

    #[error("structured extraction failed: {reason} (raw: {preview})")]
    Extraction { reason: String, preview: String },

    #[error("invalid input: {0}")]
    Scope(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DigestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_id_is_stable_and_type_prefixed() {
        let id = Digest::make_id(ArticleType::Video, "abc123");
        assert_eq!(id, "video-abc123");
        assert_eq!(id, Digest::make_id(ArticleType::Video, "abc123"));
        assert_ne!(id, Digest::make_id(ArticleType::Article, "abc123"));
    }

    #[test]
    fn article_type_serde_names_are_snake_case() {
        let json = serde_json::to_string(&ArticleType::BlogPost).unwrap();
        assert_eq!(json, "\"blog_post\"");
        let back: ArticleType = serde_json::from_str("\"blog_post\"").unwrap();
        assert_eq!(back, ArticleType::BlogPost);
    }

    #[test]
    fn markdown_rendering_is_deterministic() {
        let doc = DigestDocument {
            introduction: Introduction {
                greeting: "Hey Shankar, here is your daily digest.".to_string(),
                introduction: "Two stories today.".to_string(),
            },
            entries: vec![RankedEntry {
                digest_id: "article-1".to_string(),
                rank: 1,
                relevance_score: 9.0,
                title: "Big News".to_string(),
                summary: "It happened.".to_string(),
                url: "https://example.com/big".to_string(),
                article_type: ArticleType::Article,
                reasoning: None,
            }],
            total_ranked: 1,
            top_n: 10,
        };

        let md = doc.to_markdown();
        assert!(md.starts_with("Hey Shankar, here is your daily digest.\n\n"));
        assert!(md.contains("## Big News\n\n"));
        assert!(md.contains("[Read more →](https://example.com/big)"));
        assert_eq!(md, doc.to_markdown());
    }
}
