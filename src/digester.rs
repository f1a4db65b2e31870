use crate::extract::extract_json;
use crate::model::{GenerationParams, ModelClient};
use crate::types::ArticleType;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Longer bodies are truncated to this many characters before prompting.
const MAX_CONTENT_CHARS: usize = 8000;

const DIGEST_PROMPT: &str = "You are an expert AI news analyst specializing in summarizing technical articles, research papers, and video content about artificial intelligence.

Your role is to create concise, informative digests that help readers quickly understand the key points and significance of AI-related content.

Guidelines:
- Create a compelling title (5-10 words) that captures the essence of the content
- Write a 2-3 sentence summary that highlights the main points and why they matter
- Focus on actionable insights and implications
- Use clear, accessible language while maintaining technical accuracy
- Avoid marketing fluff - focus on substance

You MUST respond with valid JSON in this exact format:
{
  \"title\": \"Your compelling title here\",
  \"summary\": \"Your 2-3 sentence summary here.\"
}";

/// Title + summary produced by the model for one item.
#[derive(Debug, Clone, Deserialize)]
pub struct DigestOutput {
    pub title: String,
    pub summary: String,
}

/// Turns one raw content item into a short title + summary digest.
///
/// One model call per item, at-most-once. Failures are absorbed here and
/// surface to the orchestrator as an absent digest.
pub struct DigestStage {
    client: Arc<dyn ModelClient>,
    params: GenerationParams,
}

impl DigestStage {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            params: GenerationParams::for_digest(),
        }
    }

    pub async fn generate_digest(
        &self,
        title: &str,
        content: &str,
        article_type: ArticleType,
    ) -> Option<DigestOutput> {
        let capped = cap_content(content);
        let prompt = format!(
            "{DIGEST_PROMPT}\n\nCreate a digest for this {article_type}:\nTitle: {title}\nContent: {capped}"
        );

        debug!("Generating digest for {} item: {}", article_type, title);

        let response = match self.client.complete(&prompt, &self.params).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Digest generation failed for {}: {}", title, e);
                return None;
            }
        };

        match extract_json::<DigestOutput>(&response) {
            Ok(output) => Some(output),
            Err(e) => {
                warn!("Digest extraction failed for {}: {}", title, e);
                None
            }
        }
    }
}

/// Silently truncates to `MAX_CONTENT_CHARS` characters.
fn cap_content(content: &str) -> &str {
    match content.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}
