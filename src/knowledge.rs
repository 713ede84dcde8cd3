//! Public knowledge publication
//!
//! Public-tier records are authored and approved outside the engine. This
//! module only accepts such approved content; nothing here reads the
//! journal or persona tiers.

use crate::embedding::{embed_checked, Embedder};
use crate::error::{Error, Result};
use crate::memory::{
    ContextRules, GuardrailRules, MemoryPayload, MemoryRecord, MemoryTier, PublicKnowledge,
    RecordKind, TierStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Externally authored content that a named editor has approved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedKnowledge {
    pub topic: String,
    pub approved_content: String,
    #[serde(default)]
    pub context_rules: ContextRules,
    #[serde(default)]
    pub guardrail_rules: GuardrailRules,
    /// Who approved publication; required
    pub approved_by: String,
}

impl ApprovedKnowledge {
    pub fn new(
        topic: impl Into<String>,
        approved_content: impl Into<String>,
        approved_by: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            approved_content: approved_content.into(),
            context_rules: ContextRules::default(),
            guardrail_rules: GuardrailRules::default(),
            approved_by: approved_by.into(),
        }
    }

    pub fn fallback_response(mut self, response: impl Into<String>) -> Self {
        self.guardrail_rules.fallback_responses.push(response.into());
        self
    }

    pub fn allowed_theme(mut self, theme: impl Into<String>) -> Self {
        self.context_rules.allowed_themes.push(theme.into());
        self
    }
}

/// Writes approved public knowledge into the public tier
pub struct KnowledgePublisher {
    store: Arc<dyn TierStore>,
    embedder: Arc<dyn Embedder>,
    dimension: usize,
}

impl KnowledgePublisher {
    pub fn new(store: Arc<dyn TierStore>, embedder: Arc<dyn Embedder>, dimension: usize) -> Self {
        Self {
            store,
            embedder,
            dimension,
        }
    }

    /// Publish approved content. Unapproved or empty content is rejected
    /// before anything is embedded.
    pub async fn publish(&self, knowledge: ApprovedKnowledge) -> Result<MemoryRecord> {
        if knowledge.approved_by.trim().is_empty() {
            return Err(Error::Validation(format!(
                "public knowledge '{}' has no approver",
                knowledge.topic
            )));
        }
        if knowledge.approved_content.trim().is_empty() {
            return Err(Error::Validation(format!(
                "public knowledge '{}' has no content",
                knowledge.topic
            )));
        }

        let vector = embed_checked(
            self.embedder.as_ref(),
            &knowledge.approved_content,
            self.dimension,
        )
        .await?;
        let record = MemoryRecord::new(
            MemoryPayload::PublicKnowledge(PublicKnowledge {
                topic: knowledge.topic,
                approved_content: knowledge.approved_content,
                context_rules: knowledge.context_rules,
                guardrail_rules: knowledge.guardrail_rules,
                approved_by: knowledge.approved_by,
            }),
            vector,
        )?;
        self.store.upsert(MemoryTier::Public, record.clone()).await?;

        tracing::info!(id = %record.id(), "Published public knowledge");
        Ok(record)
    }

    /// Withdraw a published record
    pub async fn retract(&self, id: Uuid) -> Result<()> {
        match self.store.delete(RecordKind::PublicKnowledge, id).await? {
            Some(_) => {
                tracing::info!(%id, "Retracted public knowledge");
                Ok(())
            }
            None => Err(Error::NotFound(format!("public knowledge {id}"))),
        }
    }

    pub async fn list(&self) -> Result<Vec<MemoryRecord>> {
        self.store.list(RecordKind::PublicKnowledge).await
    }
}
