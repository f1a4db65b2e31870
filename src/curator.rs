use crate::extract::extract_json;
use crate::model::{GenerationParams, ModelClient};
use crate::profile::UserProfile;
use crate::types::{Digest, RankedEntry};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on digests sent in one ranking call, to respect the model's
/// input-size limit. Digests beyond the cap are left unranked.
const MAX_BATCH_DIGESTS: usize = 50;

const CURATION_PROMPT: &str = "You are an expert content curator ranking news digests for one specific reader.

Score every digest below for relevance to the reader's profile on a 0-10 scale (10 = essential reading, 0 = irrelevant). Consider the reader's interests, stated preferences, and expertise level. Provide brief reasoning for each score.

You MUST respond with valid JSON in this exact format:
{
  \"rankings\": [
    { \"digest_id\": \"the digest id\", \"relevance_score\": 8.5, \"reasoning\": \"one short sentence\" }
  ]
}

Include every digest exactly once. Do not invent digest ids.";

#[derive(Debug, Deserialize)]
struct RankingResponse {
    rankings: Vec<ModelRanking>,
}

#[derive(Debug, Deserialize)]
struct ModelRanking {
    digest_id: String,
    relevance_score: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Scores and orders a run's digests against the reader profile with one
/// batched model call.
pub struct CurationStage {
    client: Arc<dyn ModelClient>,
    profile: UserProfile,
    params: GenerationParams,
}

impl CurationStage {
    pub fn new(client: Arc<dyn ModelClient>, profile: UserProfile) -> Self {
        Self {
            client,
            profile,
            params: GenerationParams::for_email(),
        }
    }

    /// Rank `digests` by relevance to the profile.
    ///
    /// Returns entries sorted by score descending, ties broken by original
    /// submission order, with a dense 1-based rank re-derived from the
    /// scores (a rank field returned by the model is never trusted). Any
    /// call or extraction failure yields an empty ranking, never a partial
    /// one.
    pub async fn rank_digests(&self, digests: &[Digest]) -> Vec<RankedEntry> {
        if digests.is_empty() {
            debug!("No digests to rank");
            return Vec::new();
        }

        let batch = if digests.len() > MAX_BATCH_DIGESTS {
            warn!(
                "Capping ranking batch from {} to {} digests",
                digests.len(),
                MAX_BATCH_DIGESTS
            );
            &digests[..MAX_BATCH_DIGESTS]
        } else {
            digests
        };

        let prompt = self.build_prompt(batch);
        info!("Ranking {} digests in one batch", batch.len());

        let response = match self.client.complete(&prompt, &self.params).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Ranking call failed: {}", e);
                return Vec::new();
            }
        };

        let parsed = match extract_json::<RankingResponse>(&response) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Ranking extraction failed: {}", e);
                return Vec::new();
            }
        };

        derive_entries(batch, parsed.rankings)
    }

    fn build_prompt(&self, digests: &[Digest]) -> String {
        let mut prompt = format!("{CURATION_PROMPT}\n\nReader profile:\n");
        let _ = writeln!(prompt, "Name: {}", self.profile.name);
        let _ = writeln!(prompt, "Title: {}", self.profile.title);
        let _ = writeln!(prompt, "Background: {}", self.profile.background);
        let _ = writeln!(prompt, "Expertise level: {}", self.profile.expertise_level);

        prompt.push_str("Interests:\n");
        for interest in &self.profile.interests {
            let _ = writeln!(prompt, "- {interest}");
        }

        let preference_lines = self.profile.preference_lines();
        if !preference_lines.is_empty() {
            prompt.push_str("Content preferences:\n");
            for line in preference_lines {
                let _ = writeln!(prompt, "- {line}");
            }
        }

        prompt.push_str("\nDigests to rank:\n");
        for digest in digests {
            let _ = writeln!(
                prompt,
                "- id: {} | type: {} | title: {} | summary: {}",
                digest.id, digest.article_type, digest.title, digest.summary
            );
        }

        prompt
    }
}

/// Join model scores back onto the submitted digests and derive the final
/// ordering. Unknown ids are dropped; duplicate ids keep the first score;
/// digests the model omitted are left unranked.
fn derive_entries(digests: &[Digest], rankings: Vec<ModelRanking>) -> Vec<RankedEntry> {
    let submission_order: HashMap<&str, usize> = digests
        .iter()
        .enumerate()
        .map(|(idx, d)| (d.id.as_str(), idx))
        .collect();
    let by_id: HashMap<&str, &Digest> = digests.iter().map(|d| (d.id.as_str(), d)).collect();

    let mut scored: Vec<(usize, f64, ModelRanking)> = Vec::with_capacity(rankings.len());
    let mut seen: HashSet<String> = HashSet::new();
    for ranking in rankings {
        let Some(&order) = submission_order.get(ranking.digest_id.as_str()) else {
            warn!("Model returned unknown digest id: {}", ranking.digest_id);
            continue;
        };
        if !seen.insert(ranking.digest_id.clone()) {
            warn!("Model returned duplicate digest id: {}", ranking.digest_id);
            continue;
        }
        let score = ranking.relevance_score.clamp(0.0, 10.0);
        scored.push((order, score, ranking));
    }

    // Score descending; submission order is the stable secondary key.
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(idx, (_, score, ranking))| {
            let digest = by_id[ranking.digest_id.as_str()];
            RankedEntry {
                digest_id: digest.id.clone(),
                rank: idx as u32 + 1,
                relevance_score: score,
                title: digest.title.clone(),
                summary: digest.summary.clone(),
                url: digest.source_url.clone(),
                article_type: digest.article_type,
                reasoning: ranking.reasoning,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockModelClient;
    use crate::types::{ArticleType, DigestError};

    fn digest(id: &str, title: &str) -> Digest {
        Digest {
            id: id.to_string(),
            title: title.to_string(),
            summary: format!("Summary of {title}"),
            article_type: ArticleType::Article,
            source_url: format!("https://example.com/{id}"),
        }
    }

    fn stage_with(response: &str) -> CurationStage {
        CurationStage::new(
            Arc::new(MockModelClient::new().with_response(response)),
            UserProfile::default(),
        )
    }

    #[tokio::test]
    async fn ranks_by_score_descending_with_dense_ranks() {
        let digests = vec![digest("article-1", "Low"), digest("article-2", "High")];
        let stage = stage_with(
            r#"{"rankings": [
                {"digest_id": "article-1", "relevance_score": 4.0, "reasoning": "meh"},
                {"digest_id": "article-2", "relevance_score": 9.5, "reasoning": "great"}
            ]}"#,
        );

        let entries = stage.rank_digests(&digests).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].digest_id, "article-2");
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].digest_id, "article-1");
        assert_eq!(entries[1].rank, 2);
    }

    #[tokio::test]
    async fn equal_scores_preserve_submission_order() {
        let digests = vec![
            digest("article-a", "First"),
            digest("article-b", "Second"),
            digest("article-c", "Third"),
        ];
        // Model answers out of order; submission order must win the tie.
        let stage = stage_with(
            r#"{"rankings": [
                {"digest_id": "article-c", "relevance_score": 7.0},
                {"digest_id": "article-a", "relevance_score": 7.0},
                {"digest_id": "article-b", "relevance_score": 7.0}
            ]}"#,
        );

        let entries = stage.rank_digests(&digests).await;
        let ids: Vec<&str> = entries.iter().map(|e| e.digest_id.as_str()).collect();
        assert_eq!(ids, ["article-a", "article-b", "article-c"]);
        let ranks: Vec<u32> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
    }

    #[tokio::test]
    async fn scores_are_clamped_to_bounds() {
        let digests = vec![digest("article-1", "Over"), digest("article-2", "Under")];
        let stage = stage_with(
            r#"{"rankings": [
                {"digest_id": "article-1", "relevance_score": 14.0},
                {"digest_id": "article-2", "relevance_score": -3.0}
            ]}"#,
        );

        let entries = stage.rank_digests(&digests).await;
        assert_eq!(entries[0].relevance_score, 10.0);
        assert_eq!(entries[1].relevance_score, 0.0);
    }

    #[tokio::test]
    async fn unknown_and_duplicate_ids_are_dropped() {
        let digests = vec![digest("article-1", "Real")];
        let stage = stage_with(
            r#"{"rankings": [
                {"digest_id": "article-1", "relevance_score": 6.0},
                {"digest_id": "article-1", "relevance_score": 2.0},
                {"digest_id": "made-up", "relevance_score": 9.0}
            ]}"#,
        );

        let entries = stage.rank_digests(&digests).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relevance_score, 6.0);
    }

    #[tokio::test]
    async fn failure_yields_empty_ranking() {
        let digests = vec![digest("article-1", "Anything")];
        let stage = CurationStage::new(
            Arc::new(MockModelClient::new().with_failure(DigestError::EmptyResponse)),
            UserProfile::default(),
        );

        assert!(stage.rank_digests(&digests).await.is_empty());
    }

    #[tokio::test]
    async fn garbage_response_yields_empty_ranking() {
        let digests = vec![digest("article-1", "Anything")];
        let stage = stage_with("I cannot rank these, sorry.");

        assert!(stage.rank_digests(&digests).await.is_empty());
    }

    #[tokio::test]
    async fn empty_input_skips_model_call() {
        let client = Arc::new(MockModelClient::new().with_response("unused"));
        let stage = CurationStage::new(client.clone(), UserProfile::default());

        assert!(stage.rank_digests(&[]).await.is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn batch_is_capped() {
        let digests: Vec<Digest> = (0..MAX_BATCH_DIGESTS + 10)
            .map(|i| digest(&format!("article-{i}"), &format!("Item {i}")))
            .collect();
        // Score only the overflow item; it must not appear since it was cut
        // from the batch.
        let stage = stage_with(&format!(
            r#"{{"rankings": [{{"digest_id": "article-{}", "relevance_score": 9.0}}]}}"#,
            MAX_BATCH_DIGESTS + 5
        ));

        assert!(stage.rank_digests(&digests).await.is_empty());
    }
}
