//! Memory engine facade
//!
//! Wires the access policy, tier store, collaborators and the three core
//! components together from a `VaultConfig`. Each operation is gated by
//! the scope that owns it: journal operations need `STRICT_PRIVATE`,
//! candidate review and persona curation need `RESTRICTED`, queries use
//! the caller's scope.

use crate::access::{AccessPolicy, Credentials, Scope};
use crate::assembler::{AssembledResponse, ExtractiveResponder, Responder, ResponseAssembler};
use crate::config::VaultConfig;
use crate::embedding::{Embedder, HashEmbedder};
use crate::error::Result;
use crate::knowledge::{ApprovedKnowledge, KnowledgePublisher};
use crate::lifecycle::{CandidateLifecycle, ExtractionBackend, IngestOutcome, KeywordExtractor};
use crate::memory::{InMemoryTierStore, JournalEntry, MemoryRecord, TierStore};
use crate::retrieval::{RetrievalReport, RetrievalRouter, ScoredResult};
use std::sync::Arc;
use uuid::Uuid;

/// Builder for `MemoryEngine`. Collaborators not supplied fall back to the
/// in-process implementations.
pub struct MemoryEngineBuilder {
    config: VaultConfig,
    store: Option<Arc<dyn TierStore>>,
    embedder: Option<Arc<dyn Embedder>>,
    extractor: Option<Arc<dyn ExtractionBackend>>,
    responder: Option<Arc<dyn Responder>>,
}

impl MemoryEngineBuilder {
    pub fn store(mut self, store: Arc<dyn TierStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ExtractionBackend>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn build(self) -> Result<MemoryEngine> {
        self.config.validate()?;
        let dimension = self.config.embedding.dimension;
        let policy = Arc::new(self.config.access_policy()?);

        let store: Arc<dyn TierStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryTierStore::new(dimension)),
        };
        let embedder: Arc<dyn Embedder> = match self.embedder {
            Some(embedder) => embedder,
            None => Arc::new(HashEmbedder::new(dimension)?),
        };
        let extractor: Arc<dyn ExtractionBackend> = match self.extractor {
            Some(extractor) => extractor,
            None => Arc::new(KeywordExtractor::new()?),
        };
        let responder: Arc<dyn Responder> = match self.responder {
            Some(responder) => responder,
            None => Arc::new(ExtractiveResponder),
        };

        tracing::info!(
            environment = %self.config.environment,
            embedder = embedder.name(),
            extractor = extractor.name(),
            dimension,
            "Memory engine ready"
        );

        Ok(MemoryEngine {
            lifecycle: CandidateLifecycle::new(store.clone(), embedder.clone(), extractor, dimension),
            router: RetrievalRouter::new(
                policy.clone(),
                embedder.clone(),
                store.clone(),
                self.config.retrieval.clone(),
                dimension,
            ),
            publisher: KnowledgePublisher::new(store.clone(), embedder, dimension),
            assembler: ResponseAssembler::new(policy.clone(), responder),
            policy,
            store,
            config: self.config,
        })
    }
}

/// Tiered memory engine
pub struct MemoryEngine {
    config: VaultConfig,
    policy: Arc<AccessPolicy>,
    store: Arc<dyn TierStore>,
    lifecycle: CandidateLifecycle,
    router: RetrievalRouter,
    publisher: KnowledgePublisher,
    assembler: ResponseAssembler,
}

impl MemoryEngine {
    pub fn builder(config: VaultConfig) -> MemoryEngineBuilder {
        MemoryEngineBuilder {
            config,
            store: None,
            embedder: None,
            extractor: None,
            responder: None,
        }
    }

    /// Engine with all in-process collaborators
    pub fn in_memory(config: VaultConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn TierStore> {
        &self.store
    }

    fn gate(&self, scope: Scope, credentials: &Credentials) -> Result<()> {
        self.policy.authorize(scope, credentials).map(|_| ()).map_err(|e| {
            tracing::warn!(%scope, "Operation refused: {}", e);
            e
        })
    }

    // Journal (STRICT_PRIVATE)

    pub async fn ingest(&self, credentials: &Credentials, entry: JournalEntry) -> Result<IngestOutcome> {
        self.gate(Scope::StrictPrivate, credentials)?;
        self.lifecycle.ingest(entry).await
    }

    pub async fn get_journal_entry(&self, credentials: &Credentials, id: Uuid) -> Result<MemoryRecord> {
        self.gate(Scope::StrictPrivate, credentials)?;
        self.lifecycle.get_journal_entry(id).await
    }

    pub async fn set_elevation_blocked(
        &self,
        credentials: &Credentials,
        id: Uuid,
        blocked: bool,
    ) -> Result<MemoryRecord> {
        self.gate(Scope::StrictPrivate, credentials)?;
        self.lifecycle.set_elevation_blocked(id, blocked).await
    }

    // Review and curation (RESTRICTED)

    pub async fn list_candidates(&self, credentials: &Credentials) -> Result<Vec<MemoryRecord>> {
        self.gate(Scope::Restricted, credentials)?;
        self.lifecycle.list_candidates().await
    }

    pub async fn get_candidate(&self, credentials: &Credentials, id: Uuid) -> Result<MemoryRecord> {
        self.gate(Scope::Restricted, credentials)?;
        self.lifecycle.get_candidate(id).await
    }

    pub async fn promote(
        &self,
        credentials: &Credentials,
        candidate_id: Uuid,
        review_notes: Option<String>,
    ) -> Result<MemoryRecord> {
        self.gate(Scope::Restricted, credentials)?;
        self.lifecycle.promote(candidate_id, review_notes).await
    }

    pub async fn reject(&self, credentials: &Credentials, candidate_id: Uuid) -> Result<()> {
        self.gate(Scope::Restricted, credentials)?;
        self.lifecycle.reject(candidate_id).await
    }

    pub async fn archive_persona_memory(&self, credentials: &Credentials, id: Uuid) -> Result<MemoryRecord> {
        self.gate(Scope::Restricted, credentials)?;
        self.lifecycle.archive_persona_memory(id).await
    }

    pub async fn list_persona_memories(&self, credentials: &Credentials) -> Result<Vec<MemoryRecord>> {
        self.gate(Scope::Restricted, credentials)?;
        self.lifecycle.list_persona_memories().await
    }

    // Public knowledge (externally approved)

    pub async fn publish(&self, knowledge: ApprovedKnowledge) -> Result<MemoryRecord> {
        self.publisher.publish(knowledge).await
    }

    pub async fn retract(&self, id: Uuid) -> Result<()> {
        self.publisher.retract(id).await
    }

    // Retrieval

    pub async fn retrieve(&self, query: &str, scope: Scope, credentials: &Credentials) -> Result<Vec<ScoredResult>> {
        self.router.retrieve(query, scope, credentials).await
    }

    pub async fn retrieve_by_name(
        &self,
        query: &str,
        scope: &str,
        credentials: &Credentials,
    ) -> Result<Vec<ScoredResult>> {
        self.router.retrieve_by_name(query, scope, credentials).await
    }

    pub async fn retrieve_detailed(
        &self,
        query: &str,
        scope: Scope,
        credentials: &Credentials,
    ) -> Result<RetrievalReport> {
        self.router.retrieve_detailed(query, scope, credentials).await
    }

    /// Retrieve for `scope` and assemble an answer from what it may see.
    pub async fn answer(&self, query: &str, scope: Scope, credentials: &Credentials) -> Result<AssembledResponse> {
        let results = self.router.retrieve(query, scope, credentials).await?;
        self.assembler.assemble(query, scope, &results).await
    }
}
