//! Persona Vault - tiered personal memory with scope-checked retrieval
//!
//! Persona Vault keeps a personal memory corpus in three confidentiality
//! tiers and answers queries using only the tiers the caller's scope may
//! see.
//!
//! ## Architecture
//!
//! ```text
//!  journal entry ──▶ CandidateLifecycle ──▶ candidate ──review──▶ persona memory
//!        │                 (blocked entries stop here)
//!        ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         TierStore                              │
//! │   journal_entries │ persona_candidates │ persona_memory │ public_knowledge
//! └───────────────────────────────────────────────────────────────┘
//!        ▲                                                   ▲
//!        │ per-tier search                                   │ approved only
//! scope + credentials ─▶ AccessPolicy ─▶ RetrievalRouter     KnowledgePublisher
//!                                            │
//!                                            ▼
//!                                    ResponseAssembler ─▶ answer
//! ```
//!
//! | Scope            | Tiers              |
//! |------------------|--------------------|
//! | `STRICT_PRIVATE` | journal            |
//! | `RESTRICTED`     | journal, persona   |
//! | `PUBLIC`         | public             |
//!
//! ## Modules
//!
//! - [`access`]: scopes, credentials and the scope → tier table
//! - [`memory`]: record model and the tier store abstraction
//! - [`embedding`]: embedding collaborator
//! - [`lifecycle`]: ingestion and the candidate review state machine
//! - [`retrieval`]: concurrent per-tier retrieval and ranking
//! - [`assembler`]: capability-aware response assembly
//! - [`knowledge`]: publication of approved public knowledge
//! - [`engine`]: facade wiring it all together
//! - [`config`]: configuration management

pub mod access;
pub mod assembler;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod lifecycle;
pub mod memory;
pub mod retrieval;

pub use config::VaultConfig;
pub use engine::MemoryEngine;
pub use error::{Error, Result};
