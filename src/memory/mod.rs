//! Memory system - three confidentiality tiers
//!
//! - `journal`: raw private entries
//! - `persona`: curated memory (plus the review queue of candidates)
//! - `public`: approved, guardrailed knowledge

mod in_memory;
pub mod record;
pub mod store;
pub mod tier;

pub(crate) use in_memory::cosine_similarity;
pub use in_memory::InMemoryTierStore;
pub use record::{
    CandidateStatus, ContextRules, GuardrailRules, JournalEntry, JournalEntryBuilder, MemoryPayload,
    MemoryRecord, NarrativeElements, PersonaMemory, PersonaMemoryCandidate, PersonaStatus,
    PublicKnowledge,
};
pub use store::{SearchHit, StatusSwap, TierStore};
pub use tier::{MemoryTier, RecordKind};
