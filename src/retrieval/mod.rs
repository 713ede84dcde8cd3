//! Retrieval router - scope-checked, tier-isolated similarity retrieval
//!
//! ```text
//! scope + credentials ─▶ AccessPolicy ─▶ [tiers]
//!                                          │ embed query once
//!                  ┌───────────────────────┼───────────────────────┐
//!                  ▼                       ▼                       ▼
//!            search(journal)        search(persona)          search(public)
//!                  └──── tier label check ─┴── merge ── rank ── cap ┘
//! ```

mod ranking;
mod router;

pub use ranking::{rank, ScoredResult};
pub use router::{IntegrityFault, RetrievalReport, RetrievalRouter};
