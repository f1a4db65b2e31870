use crate::composer::{ComposeStage, DEFAULT_TOP_N};
use crate::curator::CurationStage;
use crate::digester::DigestStage;
use crate::model::ModelClient;
use crate::profile::UserProfile;
use crate::types::{ContentItem, Digest, DigestDocument};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Default worker limit for per-item digest generation.
const DEFAULT_DIGEST_CONCURRENCY: usize = 4;

/// Outcome of one pipeline run, handed onward to delivery and logging.
#[derive(Debug)]
pub struct RunReport {
    pub items_in: usize,
    pub digests: Vec<Digest>,
    pub ranked_count: usize,
    pub document: DigestDocument,
}

/// Sequences digest generation, curation, and composition over one batch
/// of ingested content.
///
/// Per-item digesting is independent and runs concurrently up to a worker
/// limit; curation and composition are synchronization points with one
/// model call each. Failures never abort a run: a failed item is skipped,
/// a failed ranking degrades to an empty one, and composition always
/// succeeds.
pub struct PipelineOrchestrator {
    digester: DigestStage,
    curator: CurationStage,
    composer: ComposeStage,
    top_n: usize,
    digest_concurrency: usize,
}

impl PipelineOrchestrator {
    pub fn new(client: Arc<dyn ModelClient>, profile: UserProfile) -> Self {
        Self {
            digester: DigestStage::new(client.clone()),
            curator: CurationStage::new(client.clone(), profile.clone()),
            composer: ComposeStage::new(client, profile),
            top_n: DEFAULT_TOP_N,
            digest_concurrency: DEFAULT_DIGEST_CONCURRENCY,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_digest_concurrency(mut self, workers: usize) -> Self {
        self.digest_concurrency = workers.max(1);
        self
    }

    /// Run the full pipeline over one batch of ingested items.
    pub async fn run(&self, items: Vec<ContentItem>) -> RunReport {
        let items_in = items.len();
        info!("Pipeline run starting with {} items", items_in);

        let digests = self.digest_items(items).await;
        info!(
            "Digest stage produced {}/{} digests",
            digests.len(),
            items_in
        );

        let ranked = self.curator.rank_digests(&digests).await;
        if ranked.is_empty() && !digests.is_empty() {
            // Degraded run: nothing ranked. Digests above remain valid for
            // independent persistence; the composed document will carry
            // the deterministic fallback introduction.
            warn!("Ranking returned no entries for {} digests", digests.len());
        }
        let ranked_count = ranked.len();

        let document = self
            .composer
            .create_digest_document(ranked, ranked_count, self.top_n)
            .await;

        info!(
            "Pipeline run finished: {} entries composed of {} ranked",
            document.entries.len(),
            ranked_count
        );

        RunReport {
            items_in,
            digests,
            ranked_count,
            document,
        }
    }

    /// Digest each item with bounded concurrency, preserving submission
    /// order among the survivors so curation tie-breaks stay stable.
    async fn digest_items(&self, items: Vec<ContentItem>) -> Vec<Digest> {
        let outputs: Vec<(ContentItem, Option<crate::digester::DigestOutput>)> =
            stream::iter(items)
                .map(|item| async move {
                    let output = self
                        .digester
                        .generate_digest(&item.title, &item.body, item.article_type)
                        .await;
                    (item, output)
                })
                .buffered(self.digest_concurrency)
                .collect()
                .await;

        let mut seen_ids = HashSet::new();
        let mut digests = Vec::new();
        for (item, output) in outputs {
            let Some(output) = output else {
                warn!("Skipping item after digest failure: {}", item.title);
                continue;
            };
            let id = Digest::make_id(item.article_type, &item.source_id);
            if !seen_ids.insert(id.clone()) {
                warn!("Skipping duplicate digest id: {}", id);
                continue;
            }
            digests.push(Digest {
                id,
                title: output.title,
                summary: output.summary,
                article_type: item.article_type,
                source_url: item.source_url,
            });
        }
        digests
    }
}
