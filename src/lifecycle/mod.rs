//! Candidate lifecycle - journal entry → review candidate → persona memory
//!
//! ```text
//! none ──ingest──▶ awaiting_review ──promote──▶ promoted (kept, not listed)
//!                        │
//!                        └──reject──▶ rejected (deleted)
//! ```

pub mod candidate;
pub mod extraction;

pub use candidate::{CandidateLifecycle, CandidateOutcome, IngestOutcome};
pub use extraction::{extract_all, Extraction, ExtractionBackend, KeywordExtractor};

pub use crate::memory::CandidateStatus;
