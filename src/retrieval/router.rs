//! Scoped retrieval across tier stores

use super::ranking::{rank, ScoredResult};
use crate::access::{AccessPolicy, Credentials, Scope};
use crate::config::{RetrievalConfig, MAX_SEARCH_RETRIES};
use crate::embedding::{embed_checked, Embedder};
use crate::error::{Error, Result};
use crate::memory::{MemoryTier, SearchHit, TierStore};
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

/// A search hit that failed the tier check and was excluded
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityFault {
    /// Tier whose store returned the record
    pub searched: MemoryTier,
    /// Record id as returned
    pub record_id: Uuid,
    pub reason: String,
}

/// Full outcome of one retrieval call
#[derive(Debug, Clone, Default)]
pub struct RetrievalReport {
    /// Ranked, capped results
    pub results: Vec<ScoredResult>,
    /// Tiers whose search succeeded
    pub searched: Vec<MemoryTier>,
    /// Tiers whose search failed after retries, with the last error
    pub degraded: Vec<(MemoryTier, String)>,
    pub integrity_faults: Vec<IntegrityFault>,
}

/// Read-only router: scope check, one embedding, per-tier fan-out, rank.
pub struct RetrievalRouter {
    policy: Arc<AccessPolicy>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn TierStore>,
    config: RetrievalConfig,
    dimension: usize,
}

impl RetrievalRouter {
    pub fn new(
        policy: Arc<AccessPolicy>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn TierStore>,
        config: RetrievalConfig,
        dimension: usize,
    ) -> Self {
        Self {
            policy,
            embedder,
            store,
            config,
            dimension,
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Ranked results visible to `scope`.
    ///
    /// An empty vector means nothing matched. Authorization failures and
    /// total search failure are errors.
    pub async fn retrieve(
        &self,
        query: &str,
        scope: Scope,
        credentials: &Credentials,
    ) -> Result<Vec<ScoredResult>> {
        Ok(self.retrieve_detailed(query, scope, credentials).await?.results)
    }

    /// Same as `retrieve` for an unparsed scope value. Unknown names fail
    /// authorization without touching any collaborator.
    pub async fn retrieve_by_name(
        &self,
        query: &str,
        scope: &str,
        credentials: &Credentials,
    ) -> Result<Vec<ScoredResult>> {
        let Some(scope) = Scope::parse(scope) else {
            tracing::warn!(scope, "Retrieval refused: unknown scope");
            return Err(Error::Authorization(format!("unknown scope '{scope}'")));
        };
        self.retrieve(query, scope, credentials).await
    }

    /// Retrieval with per-tier diagnostics
    pub async fn retrieve_detailed(
        &self,
        query: &str,
        scope: Scope,
        credentials: &Credentials,
    ) -> Result<RetrievalReport> {
        let tiers = match self.policy.authorize(scope, credentials) {
            Ok(tiers) => tiers,
            Err(e) => {
                tracing::warn!(%scope, "Retrieval refused: {}", e);
                return Err(e);
            }
        };
        if tiers.is_empty() {
            tracing::debug!(%scope, "Scope resolves to no tiers");
            return Ok(RetrievalReport::default());
        }

        let vector: Arc<[f32]> = embed_checked(self.embedder.as_ref(), query, self.dimension)
            .await?
            .into();

        let mut tasks = JoinSet::new();
        for &tier in &tiers {
            let store = self.store.clone();
            let vector = vector.clone();
            let limit = self.config.per_tier_limit;
            let attempts = self.config.search_retries.min(MAX_SEARCH_RETRIES).saturating_add(1);
            tasks.spawn(async move {
                let outcome = search_with_retry(store.as_ref(), tier, &vector, limit, attempts).await;
                (tier, outcome)
            });
        }

        let mut report = RetrievalReport::default();
        let mut candidates = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (tier, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!("Tier search task ended abnormally: {}", e);
                    continue;
                }
            };
            match outcome {
                Ok(hits) => {
                    report.searched.push(tier);
                    for hit in hits {
                        match check_hit(tier, &hit) {
                            Ok(()) => candidates.push(ScoredResult {
                                record: hit.record,
                                score: hit.score,
                            }),
                            Err(reason) => {
                                tracing::error!(
                                    searched = %tier,
                                    record_id = %hit.record.id(),
                                    labelled = %hit.record.tier(),
                                    "Integrity fault, record excluded: {}",
                                    reason
                                );
                                report.integrity_faults.push(IntegrityFault {
                                    searched: tier,
                                    record_id: hit.record.id(),
                                    reason,
                                });
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(%tier, "Tier search degraded to empty: {}", e);
                    report.degraded.push((tier, e.to_string()));
                }
            }
        }

        // Tasks that never reported (panic/abort) count as degraded.
        for &tier in &tiers {
            let reported = report.searched.contains(&tier)
                || report.degraded.iter().any(|(t, _)| *t == tier);
            if !reported {
                report.degraded.push((tier, "search task aborted".to_string()));
            }
        }
        report.searched.sort();
        report.degraded.sort_by_key(|(t, _)| *t);

        if report.searched.is_empty() {
            return Err(Error::Retrieval(format!(
                "all {} tier searches failed for scope {scope}",
                tiers.len()
            )));
        }

        report.results = rank(candidates, self.config.result_cap);
        if report.results.is_empty() && !report.integrity_faults.is_empty() {
            return Err(Error::Integrity(format!(
                "{} mislabelled record(s) returned for scope {scope} and nothing valid remained",
                report.integrity_faults.len()
            )));
        }

        tracing::debug!(
            %scope,
            results = report.results.len(),
            degraded = report.degraded.len(),
            faults = report.integrity_faults.len(),
            "Retrieval complete"
        );
        Ok(report)
    }
}

async fn search_with_retry(
    store: &dyn TierStore,
    tier: MemoryTier,
    vector: &[f32],
    limit: usize,
    attempts: u32,
) -> Result<Vec<SearchHit>> {
    let mut attempt = 1;
    loop {
        match store.search(tier, vector, limit).await {
            Ok(hits) => return Ok(hits),
            Err(e) if attempt < attempts && e.is_retryable() => {
                tracing::debug!(%tier, attempt, "Retrying tier search: {}", e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// A hit is admitted only if its own label matches the tier searched.
fn check_hit(tier: MemoryTier, hit: &SearchHit) -> std::result::Result<(), String> {
    let record = &hit.record;
    if record.tier() != tier {
        return Err(format!("labelled {} but returned by {tier} search", record.tier()));
    }
    if record.kind() != tier.searchable_kind() {
        return Err(format!("{} is not searchable in the {tier} tier", record.kind()));
    }
    if let Err(e) = record.validate() {
        return Err(e.to_string());
    }
    if !hit.score.is_finite() {
        return Err("non-finite similarity score".to_string());
    }
    Ok(())
}
