//! Access model - scopes, credentials, and the scope → tier lookup table
//!
//! Pure data and validation, no I/O. Every lookup fails closed: a scope the
//! policy does not define resolves to no tiers and never validates.

mod policy;
mod scope;

pub use policy::{capability, default_scope_definitions, AccessPolicy, ScopeDefinition};
pub use scope::{Credentials, Scope};
