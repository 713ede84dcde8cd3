//! Response assembly over retrieved context
//!
//! Retrieval decides which records a scope may see. The assembler decides
//! which fields of those records are rendered, using the scope's capability
//! tags, and hands the rendered context to an injected `Responder`.

use crate::access::{capability, AccessPolicy, Scope};
use crate::error::{Error, Result};
use crate::memory::{ContextRules, GuardrailRules, MemoryPayload, MemoryTier, PersonaStatus};
use crate::retrieval::ScoredResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Answer used when retrieval produced nothing
pub const NO_CONTEXT_ANSWER: &str = "I don't have enough information to answer that question.";

/// Answer used when results exist but the scope may render none of them
pub const NO_ACCESS_ANSWER: &str = "I cannot provide that information due to privacy restrictions.";

pub const REASON_NO_CONTEXT: &str = "no_relevant_context";
pub const REASON_INSUFFICIENT_ACCESS: &str = "insufficient_access_level";
pub const REASON_GUARDRAIL: &str = "guardrail_fallback";

/// One rendered piece of context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBlock {
    pub source: Uuid,
    pub tier: MemoryTier,
    pub score: f32,
    pub text: String,
}

/// Language generation collaborator
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce an answer to `query` grounded only in `context`
    async fn respond(&self, query: &str, context: &[ContextBlock]) -> Result<String>;

    fn name(&self) -> &str;
}

/// Deterministic responder that answers with the best context block.
pub struct ExtractiveResponder;

#[async_trait]
impl Responder for ExtractiveResponder {
    async fn respond(&self, _query: &str, context: &[ContextBlock]) -> Result<String> {
        context
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| Error::Processing("no context to answer from".to_string()))
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Top similarity clamped to [0, 1]; 0 for fallbacks
    pub confidence: f32,
    /// Records whose content was rendered into the context
    pub sources: Vec<Uuid>,
    /// Set when the answer is a fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledResponse {
    pub text: String,
    pub metadata: ResponseMetadata,
}

impl AssembledResponse {
    fn fallback(text: impl Into<String>, reason: &str) -> Self {
        Self {
            text: text.into(),
            metadata: ResponseMetadata {
                confidence: 0.0,
                sources: Vec::new(),
                reason: Some(reason.to_string()),
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata.reason.is_some()
    }
}

pub struct ResponseAssembler {
    policy: Arc<AccessPolicy>,
    responder: Arc<dyn Responder>,
}

impl ResponseAssembler {
    pub fn new(policy: Arc<AccessPolicy>, responder: Arc<dyn Responder>) -> Self {
        Self { policy, responder }
    }

    /// Render `results` for `scope` and ask the responder for an answer.
    ///
    /// The responder is not called when there is nothing the scope may see.
    /// If it fails, a public guardrail fallback is used when one of the
    /// rendered records supplies it; otherwise the error is returned.
    pub async fn assemble(
        &self,
        query: &str,
        scope: Scope,
        results: &[ScoredResult],
    ) -> Result<AssembledResponse> {
        if results.is_empty() {
            return Ok(AssembledResponse::fallback(NO_CONTEXT_ANSWER, REASON_NO_CONTEXT));
        }

        let allowed = self.policy.permitted_actions(scope);
        let query_lower = query.to_lowercase();
        let context: Vec<ContextBlock> = results
            .iter()
            .filter_map(|result| render(result, &allowed, &query_lower))
            .collect();
        if context.is_empty() {
            tracing::debug!(%scope, results = results.len(), "No result renderable for scope");
            if let Some(text) = guardrail_fallback(results) {
                return Ok(AssembledResponse::fallback(text, REASON_GUARDRAIL));
            }
            return Ok(AssembledResponse::fallback(NO_ACCESS_ANSWER, REASON_INSUFFICIENT_ACCESS));
        }

        match self.responder.respond(query, &context).await {
            Ok(text) => Ok(AssembledResponse {
                text,
                metadata: ResponseMetadata {
                    confidence: context[0].score.clamp(0.0, 1.0),
                    sources: context.iter().map(|b| b.source).collect(),
                    reason: None,
                },
            }),
            Err(e) => match guardrail_fallback(results) {
                Some(text) => {
                    tracing::warn!(responder = self.responder.name(), "Responder failed, using guardrail fallback: {}", e);
                    Ok(AssembledResponse::fallback(text, REASON_GUARDRAIL))
                }
                None => Err(e),
            },
        }
    }
}

/// Render the fields of a record the capability set permits.
fn render(result: &ScoredResult, allowed: &BTreeSet<String>, query_lower: &str) -> Option<ContextBlock> {
    let can = |tag: &str| allowed.contains(tag);
    let mut parts: Vec<String> = Vec::new();

    match result.record.payload() {
        MemoryPayload::JournalEntry(entry) => {
            if can(capability::RAW_JOURNAL) {
                parts.push(entry.content.clone());
            }
            if can(capability::EMOTIONAL_DETAIL) && !entry.emotional_markers.is_empty() {
                parts.push(format!("Feelings: {}", entry.emotional_markers.join(", ")));
            }
            if can(capability::THEMES) && !entry.themes.is_empty() {
                parts.push(format!("Themes: {}", entry.themes.join(", ")));
            }
        }
        MemoryPayload::PersonaMemory(memory) => {
            if memory.status != PersonaStatus::Active {
                return None;
            }
            if can(capability::PERSONA_SUMMARY) {
                parts.push(memory.summary.clone());
            }
            if can(capability::THEMES) && !memory.themes.is_empty() {
                parts.push(format!("Themes: {}", memory.themes.join(", ")));
            }
            let n = &memory.narrative_elements;
            if can(capability::NARRATIVE) && !n.is_empty() {
                let fields = [
                    ("protagonist", &n.protagonist),
                    ("desire", &n.desire),
                    ("obstacle", &n.obstacle),
                    ("tone", &n.tone),
                ];
                let narrative: Vec<String> = fields
                    .iter()
                    .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}: {v}")))
                    .collect();
                parts.push(format!("Narrative: {}", narrative.join("; ")));
            }
        }
        MemoryPayload::PublicKnowledge(knowledge) => {
            if !can(capability::APPROVED_CONTENT) {
                return None;
            }
            if let Some(theme) = disallowed_theme(&knowledge.context_rules, query_lower) {
                tracing::debug!(record_id = %result.record.id(), theme, "Public record withheld by context rules");
                return None;
            }
            parts.push(apply_template(&knowledge.guardrail_rules, &knowledge.approved_content));
        }
        // Review candidates never reach a response.
        MemoryPayload::Candidate(_) => return None,
    }

    if parts.is_empty() {
        return None;
    }
    Some(ContextBlock {
        source: result.record.id(),
        tier: result.record.tier(),
        score: result.score,
        text: parts.join("\n"),
    })
}

/// First disallowed theme the query touches
fn disallowed_theme<'a>(rules: &'a ContextRules, query_lower: &str) -> Option<&'a str> {
    rules
        .disallowed_themes
        .iter()
        .map(String::as_str)
        .find(|theme| mentions(query_lower, &theme.to_lowercase()))
}

fn mentions(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    if term.contains(|c: char| !c.is_alphanumeric()) {
        return haystack.contains(term);
    }
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == term)
}

/// Wrap content in the first template carrying a `{content}` slot.
fn apply_template(rules: &GuardrailRules, content: &str) -> String {
    rules
        .response_templates
        .iter()
        .find(|t| t.contains("{content}"))
        .map(|t| t.replace("{content}", content))
        .unwrap_or_else(|| content.to_string())
}

fn guardrail_fallback(results: &[ScoredResult]) -> Option<String> {
    results.iter().find_map(|r| {
        r.record
            .as_public()
            .and_then(|k| k.guardrail_rules.fallback_responses.first().cloned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{JournalEntryBuilder, MemoryRecord, NarrativeElements, PersonaMemory, PublicKnowledge};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records the context it was given; optionally fails.
    struct RecordingResponder {
        calls: AtomicUsize,
        seen: Mutex<Vec<ContextBlock>>,
        fail: bool,
    }

    impl RecordingResponder {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn respond(&self, _query: &str, context: &[ContextBlock]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().extend(context.iter().cloned());
            if self.fail {
                return Err(Error::Processing("model unavailable".to_string()));
            }
            Ok("answer".to_string())
        }
        fn name(&self) -> &str {
            "recording"
        }
    }

    fn scored(payload: MemoryPayload, score: f32) -> ScoredResult {
        ScoredResult {
            record: MemoryRecord::new(payload, vec![1.0, 0.0]).unwrap(),
            score,
        }
    }

    fn journal() -> ScoredResult {
        let entry = JournalEntryBuilder::new("I cried after the meeting.")
            .emotional_marker("sad")
            .theme("career")
            .build()
            .unwrap();
        scored(MemoryPayload::JournalEntry(entry), 0.9)
    }

    fn persona() -> ScoredResult {
        scored(
            MemoryPayload::PersonaMemory(PersonaMemory {
                summary: "Working on a side project.".to_string(),
                themes: vec!["creativity".to_string()],
                narrative_elements: NarrativeElements {
                    protagonist: Some("self".to_string()),
                    desire: Some("To learn a new skill".to_string()),
                    obstacle: None,
                    tone: None,
                },
                source_entry_refs: vec![Uuid::new_v4()],
                status: PersonaStatus::Active,
                source_candidate_id: Uuid::new_v4(),
            }),
            0.8,
        )
    }

    fn public(fallback: Option<&str>) -> ScoredResult {
        public_with(ContextRules::default(), Vec::new(), fallback)
    }

    fn public_with(context_rules: ContextRules, templates: Vec<String>, fallback: Option<&str>) -> ScoredResult {
        scored(
            MemoryPayload::PublicKnowledge(PublicKnowledge {
                topic: "projects".to_string(),
                approved_content: "Building a side project to learn new skills.".to_string(),
                context_rules,
                guardrail_rules: GuardrailRules {
                    response_templates: templates,
                    fallback_responses: fallback.into_iter().map(String::from).collect(),
                },
                approved_by: "editor".to_string(),
            }),
            1.4,
        )
    }

    fn assembler(responder: Arc<RecordingResponder>) -> ResponseAssembler {
        ResponseAssembler::new(Arc::new(AccessPolicy::default()), responder)
    }

    #[tokio::test]
    async fn test_empty_results_use_fallback_without_responder() {
        let responder = Arc::new(RecordingResponder::new(false));
        let response = assembler(responder.clone()).assemble("q", Scope::Public, &[]).await.unwrap();
        assert_eq!(response.text, NO_CONTEXT_ANSWER);
        assert_eq!(response.metadata.reason.as_deref(), Some(REASON_NO_CONTEXT));
        assert_eq!(response.metadata.confidence, 0.0);
        assert_eq!(responder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_strict_private_renders_raw_journal_and_feelings() {
        let responder = Arc::new(RecordingResponder::new(false));
        let result = journal();
        let response = assembler(responder.clone())
            .assemble("q", Scope::StrictPrivate, std::slice::from_ref(&result))
            .await
            .unwrap();
        assert_eq!(response.metadata.sources, vec![result.record.id()]);
        let seen = responder.seen.lock().unwrap();
        assert!(seen[0].text.contains("I cried after the meeting."));
        assert!(seen[0].text.contains("Feelings: sad"));
    }

    #[tokio::test]
    async fn test_restricted_never_renders_raw_journal_text() {
        let responder = Arc::new(RecordingResponder::new(false));
        let results = vec![journal(), persona()];
        let response = assembler(responder.clone())
            .assemble("q", Scope::Restricted, &results)
            .await
            .unwrap();
        assert_eq!(response.metadata.sources.len(), 2);
        let seen = responder.seen.lock().unwrap();
        assert!(seen.iter().all(|b| !b.text.contains("cried")));
        assert!(seen.iter().all(|b| !b.text.contains("sad")));
        assert_eq!(seen[0].text, "Themes: career");
        assert!(seen[1].text.contains("Working on a side project."));
        assert!(seen[1].text.contains("desire: To learn a new skill"));
    }

    #[tokio::test]
    async fn test_unrenderable_results_report_insufficient_access() {
        let responder = Arc::new(RecordingResponder::new(false));
        let response = assembler(responder.clone())
            .assemble("q", Scope::Public, &[journal()])
            .await
            .unwrap();
        assert_eq!(response.text, NO_ACCESS_ANSWER);
        assert_eq!(response.metadata.reason.as_deref(), Some(REASON_INSUFFICIENT_ACCESS));
        assert_eq!(responder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_confidence_is_clamped() {
        let responder = Arc::new(RecordingResponder::new(false));
        let response = assembler(responder)
            .assemble("q", Scope::Public, &[public(None)])
            .await
            .unwrap();
        assert_eq!(response.text, "answer");
        assert_eq!(response.metadata.confidence, 1.0);
        assert!(!response.is_fallback());
    }

    #[tokio::test]
    async fn test_responder_failure_uses_guardrail_fallback() {
        let responder = Arc::new(RecordingResponder::new(true));
        let a = assembler(responder);

        let response = a
            .assemble("q", Scope::Public, &[public(Some("I cannot answer that."))])
            .await
            .unwrap();
        assert_eq!(response.text, "I cannot answer that.");
        assert_eq!(response.metadata.reason.as_deref(), Some(REASON_GUARDRAIL));

        let err = a.assemble("q", Scope::Public, &[public(None)]).await;
        assert!(matches!(err, Err(Error::Processing(_))));
    }

    #[tokio::test]
    async fn test_disallowed_theme_withholds_public_record() {
        let responder = Arc::new(RecordingResponder::new(false));
        let rules = ContextRules {
            disallowed_themes: vec!["Health".to_string()],
            ..ContextRules::default()
        };
        let results = vec![public_with(rules, Vec::new(), Some("I'd rather not discuss that."))];
        let a = assembler(responder.clone());

        let response = a.assemble("How is your health lately?", Scope::Public, &results).await.unwrap();
        assert_eq!(response.text, "I'd rather not discuss that.");
        assert_eq!(response.metadata.reason.as_deref(), Some(REASON_GUARDRAIL));
        assert_eq!(responder.calls.load(Ordering::SeqCst), 0);

        let response = a.assemble("What are you building?", Scope::Public, &results).await.unwrap();
        assert!(!response.is_fallback());
        assert_eq!(responder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_response_template_wraps_public_content() {
        let responder = Arc::new(RecordingResponder::new(false));
        let templates = vec![
            "no slot here".to_string(),
            "Here is what I can share: {content}".to_string(),
        ];
        let results = vec![public_with(ContextRules::default(), templates, None)];
        assembler(responder.clone())
            .assemble("q", Scope::Public, &results)
            .await
            .unwrap();
        let seen = responder.seen.lock().unwrap();
        assert_eq!(
            seen[0].text,
            "Here is what I can share: Building a side project to learn new skills."
        );
    }

    #[tokio::test]
    async fn test_extractive_responder() {
        let block = ContextBlock {
            source: Uuid::new_v4(),
            tier: MemoryTier::Public,
            score: 0.5,
            text: "hello".to_string(),
        };
        assert_eq!(ExtractiveResponder.respond("q", &[block]).await.unwrap(), "hello");
        assert!(ExtractiveResponder.respond("q", &[]).await.is_err());
    }
}
