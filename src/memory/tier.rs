//! Memory tiers and the record kinds stored in each

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidentiality layer a record lives in.
///
/// Privacy decreases from `Journal` to `Public`; a record in a less private
/// tier may reference, but never expose, its more private source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// Raw private journal entries
    Journal,
    /// Curated, themed persona memory
    Persona,
    /// Approved, guardrailed public knowledge
    Public,
}

impl MemoryTier {
    /// All tiers, most private first
    pub const ALL: [MemoryTier; 3] = [MemoryTier::Journal, MemoryTier::Persona, MemoryTier::Public];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTier::Journal => "journal",
            MemoryTier::Persona => "persona",
            MemoryTier::Public => "public",
        }
    }

    /// The record kind similarity search runs over in this tier.
    ///
    /// Review candidates share the persona tier but are never searchable.
    pub fn searchable_kind(&self) -> RecordKind {
        match self {
            MemoryTier::Journal => RecordKind::JournalEntry,
            MemoryTier::Persona => RecordKind::PersonaMemory,
            MemoryTier::Public => RecordKind::PublicKnowledge,
        }
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete record shape; each kind is persisted in its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    JournalEntry,
    Candidate,
    PersonaMemory,
    PublicKnowledge,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::JournalEntry,
        RecordKind::Candidate,
        RecordKind::PersonaMemory,
        RecordKind::PublicKnowledge,
    ];

    /// Owning tier
    pub fn tier(&self) -> MemoryTier {
        match self {
            RecordKind::JournalEntry => MemoryTier::Journal,
            RecordKind::Candidate | RecordKind::PersonaMemory => MemoryTier::Persona,
            RecordKind::PublicKnowledge => MemoryTier::Public,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::JournalEntry => "journal_entry",
            RecordKind::Candidate => "candidate",
            RecordKind::PersonaMemory => "persona_memory",
            RecordKind::PublicKnowledge => "public_knowledge",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
