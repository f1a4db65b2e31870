use crate::extract::extract_json;
use crate::model::{GenerationParams, ModelClient};
use crate::profile::UserProfile;
use crate::types::{DigestDocument, Introduction, RankedEntry};
use chrono::Utc;
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of entries included in the composed email.
pub const DEFAULT_TOP_N: usize = 10;

/// At most this many entries are previewed in the introduction prompt.
const INTRO_PREVIEW_LIMIT: usize = 10;

const EMAIL_PROMPT: &str = "You are an expert email writer specializing in creating engaging, personalized AI news digests.

Your role is to write a warm, professional introduction for a daily AI news digest email that:
- Greets the user by name
- Includes the current date
- Provides a brief, engaging overview of what's coming in the top ranked articles
- Highlights the most interesting or important themes
- Sets expectations for the content ahead

Keep it concise (2-3 sentences for the introduction), friendly, and professional.

You MUST respond with valid JSON in this exact format:
{
  \"greeting\": \"Hey [Name], here is your daily digest of AI news for [Date].\",
  \"introduction\": \"Your 2-3 sentence overview here.\"
}";

#[derive(Debug, Deserialize)]
struct IntroductionResponse {
    greeting: String,
    introduction: String,
}

/// Builds the final digest document: a personalized introduction merged
/// with the top-N ranked entries.
///
/// This stage never fails outward; on any model or extraction problem it
/// degrades to a deterministic greeting and a generic overview sentence.
pub struct ComposeStage {
    client: Arc<dyn ModelClient>,
    profile: UserProfile,
    params: GenerationParams,
}

impl ComposeStage {
    pub fn new(client: Arc<dyn ModelClient>, profile: UserProfile) -> Self {
        Self {
            client,
            profile,
            params: GenerationParams::for_email(),
        }
    }

    /// Truncate to `limit`, generate the introduction from the surviving
    /// entries only, and assemble the document.
    pub async fn create_digest_document(
        &self,
        ranked_entries: Vec<RankedEntry>,
        total_ranked: usize,
        limit: usize,
    ) -> DigestDocument {
        let mut entries = ranked_entries;
        entries.truncate(limit);

        let introduction = self.generate_introduction(&entries).await;

        DigestDocument {
            introduction,
            entries,
            total_ranked,
            top_n: limit,
        }
    }

    /// Generate the greeting + overview for the given top entries.
    ///
    /// Empty input short-circuits to a deterministic fallback with no
    /// model call. A model-produced greeting that does not start with
    /// `"Hey {name}"` is replaced wholesale with the templated greeting.
    pub async fn generate_introduction(&self, top_entries: &[RankedEntry]) -> Introduction {
        let current_date = Utc::now().format("%B %d, %Y").to_string();

        if top_entries.is_empty() {
            debug!("No ranked entries, using fallback introduction");
            return Introduction {
                greeting: self.fallback_greeting(&current_date),
                introduction: "No articles were ranked today.".to_string(),
            };
        }

        let prompt = self.build_prompt(top_entries, &current_date);

        let raw = match self.client.complete(&prompt, &self.params).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Introduction generation failed: {}", e);
                return self.fallback_introduction(&current_date);
            }
        };

        let parsed = match extract_json::<IntroductionResponse>(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Introduction extraction failed: {}", e);
                return self.fallback_introduction(&current_date);
            }
        };

        // The greeting format is a stable contract; correct the model
        // rather than trusting it.
        let expected_prefix = format!("Hey {}", self.profile.name);
        let greeting = if parsed.greeting.starts_with(&expected_prefix) {
            parsed.greeting
        } else {
            warn!("Model greeting did not match expected format, replacing");
            self.fallback_greeting(&current_date)
        };

        Introduction {
            greeting,
            introduction: parsed.introduction,
        }
    }

    fn build_prompt(&self, top_entries: &[RankedEntry], current_date: &str) -> String {
        let mut summaries = String::new();
        for (idx, entry) in top_entries.iter().take(INTRO_PREVIEW_LIMIT).enumerate() {
            let _ = writeln!(
                summaries,
                "{}. {} (Score: {:.1}/10)",
                idx + 1,
                entry.title,
                entry.relevance_score
            );
        }

        format!(
            "{EMAIL_PROMPT}\n\nCreate an email introduction for {} for {}.\n\nTop ranked articles:\n{}\nGenerate a greeting and introduction that previews these articles.",
            self.profile.name, current_date, summaries
        )
    }

    fn fallback_greeting(&self, current_date: &str) -> String {
        format!(
            "Hey {}, here is your daily digest of AI news for {}.",
            self.profile.name, current_date
        )
    }

    fn fallback_introduction(&self, current_date: &str) -> Introduction {
        Introduction {
            greeting: self.fallback_greeting(current_date),
            introduction: "Here are the top AI news articles ranked by relevance to your interests."
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockModelClient;
    use crate::types::{ArticleType, DigestError};

    fn entry(id: &str, rank: u32, score: f64) -> RankedEntry {
        RankedEntry {
            digest_id: id.to_string(),
            rank,
            relevance_score: score,
            title: format!("Title {id}"),
            summary: format!("Summary {id}"),
            url: format!("https://example.com/{id}"),
            article_type: ArticleType::Article,
            reasoning: None,
        }
    }

    fn stage(client: MockModelClient) -> (ComposeStage, Arc<MockModelClient>) {
        let client = Arc::new(client);
        (
            ComposeStage::new(client.clone(), UserProfile::default()),
            client,
        )
    }

    #[tokio::test]
    async fn empty_input_skips_model_and_uses_fallback() {
        let (stage, client) = stage(MockModelClient::new().with_response("unused"));

        let intro = stage.generate_introduction(&[]).await;
        assert_eq!(client.call_count(), 0);
        assert!(intro.greeting.starts_with("Hey Shankar"));
        assert_eq!(intro.introduction, "No articles were ranked today.");
    }

    #[tokio::test]
    async fn valid_greeting_is_kept() {
        let (stage, _) = stage(MockModelClient::new().with_response(
            r#"{"greeting": "Hey Shankar, your digest for today is ready.", "introduction": "Three big stories."}"#,
        ));

        let intro = stage.generate_introduction(&[entry("a", 1, 9.0)]).await;
        assert_eq!(intro.greeting, "Hey Shankar, your digest for today is ready.");
        assert_eq!(intro.introduction, "Three big stories.");
    }

    #[tokio::test]
    async fn malformed_greeting_is_replaced_wholesale() {
        let (stage, _) = stage(MockModelClient::new().with_response(
            r#"{"greeting": "Dear valued customer,", "introduction": "Stories follow."}"#,
        ));

        let intro = stage.generate_introduction(&[entry("a", 1, 9.0)]).await;
        assert!(intro.greeting.starts_with("Hey Shankar, here is your daily digest of AI news for"));
        // The overview from the model is still usable.
        assert_eq!(intro.introduction, "Stories follow.");
    }

    #[tokio::test]
    async fn model_failure_degrades_to_deterministic_introduction() {
        let (stage, _) = stage(MockModelClient::new().with_failure(DigestError::EmptyResponse));

        let intro = stage.generate_introduction(&[entry("a", 1, 8.0)]).await;
        assert!(intro.greeting.starts_with("Hey Shankar"));
        assert!(intro.introduction.contains("ranked by relevance"));
    }

    #[tokio::test]
    async fn document_truncates_before_generating_introduction() {
        let (stage, _) = stage(MockModelClient::new().with_response(
            r#"{"greeting": "Hey Shankar, here you go.", "introduction": "Overview."}"#,
        ));

        let entries: Vec<RankedEntry> = (1..=5)
            .map(|i| entry(&format!("e{i}"), i, 10.0 - i as f64))
            .collect();

        let doc = stage.create_digest_document(entries, 5, 3).await;
        assert_eq!(doc.entries.len(), 3);
        assert_eq!(doc.total_ranked, 5);
        assert_eq!(doc.top_n, 3);
        assert_eq!(doc.entries[0].rank, 1);
        assert_eq!(doc.entries[2].rank, 3);
    }

    #[tokio::test]
    async fn document_len_is_min_of_top_n_and_total() {
        let (stage, _) = stage(MockModelClient::new().with_response(
            r#"{"greeting": "Hey Shankar, hello.", "introduction": "Overview."}"#,
        ));

        let entries = vec![entry("only", 1, 9.0)];
        let doc = stage.create_digest_document(entries, 1, 10).await;
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.entries.len(), doc.total_ranked.min(doc.top_n));
    }
}
