//! Scope lookup table: scope → required credentials, capability tags, tiers
//!
//! The table is plain configuration handed to the engine at startup, so tests
//! and deployments can substitute their own policy without global state.

use super::scope::{Credentials, Scope};
use crate::error::{Error, Result};
use crate::memory::MemoryTier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Capability tags carried in `ScopeDefinition::allows`.
///
/// They gate what a caller may do with a response, not what is fetched.
pub mod capability {
    /// Render raw journal text
    pub const RAW_JOURNAL: &str = "raw_journal";
    /// Render emotional markers
    pub const EMOTIONAL_DETAIL: &str = "emotional_detail";
    /// Render persona summaries
    pub const PERSONA_SUMMARY: &str = "persona_summary";
    /// Render theme tags
    pub const THEMES: &str = "themes";
    /// Render narrative elements
    pub const NARRATIVE: &str = "narrative";
    /// Render approved public content
    pub const APPROVED_CONTENT: &str = "approved_content";
}

/// One row of the access table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDefinition {
    /// Scope this row defines
    pub scope: Scope,
    /// Interface the scope is issued to (e.g. `companion_only`)
    #[serde(default)]
    pub interface: String,
    /// Credentials that must all be present
    #[serde(default)]
    pub requires: BTreeSet<String>,
    /// Capability tags for the response assembler
    #[serde(default)]
    pub allows: BTreeSet<String>,
    /// Tiers searched for this scope, in search order
    #[serde(default)]
    pub tiers: Vec<MemoryTier>,
}

impl ScopeDefinition {
    /// Start an empty row for `scope`
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            interface: String::new(),
            requires: BTreeSet::new(),
            allows: BTreeSet::new(),
            tiers: Vec::new(),
        }
    }

    /// Set the interface name
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Add a required credential
    pub fn requires(mut self, credential: impl Into<String>) -> Self {
        self.requires.insert(credential.into());
        self
    }

    /// Add a capability tag
    pub fn allows(mut self, capability: impl Into<String>) -> Self {
        self.allows.insert(capability.into());
        self
    }

    /// Append a tier to the search order
    pub fn tier(mut self, tier: MemoryTier) -> Self {
        self.tiers.push(tier);
        self
    }
}

/// Default table shipped with Persona Vault
pub fn default_scope_definitions() -> Vec<ScopeDefinition> {
    vec![
        ScopeDefinition::new(Scope::StrictPrivate)
            .interface("companion_only")
            .requires("private_key")
            .allows(capability::RAW_JOURNAL)
            .allows(capability::EMOTIONAL_DETAIL)
            .allows(capability::PERSONA_SUMMARY)
            .tier(MemoryTier::Journal),
        ScopeDefinition::new(Scope::Restricted)
            .interface("memory_curation")
            .requires("restricted_key")
            .allows(capability::PERSONA_SUMMARY)
            .allows(capability::THEMES)
            .allows(capability::NARRATIVE)
            .tier(MemoryTier::Journal)
            .tier(MemoryTier::Persona),
        ScopeDefinition::new(Scope::Public)
            .interface("chat_interface")
            .requires("public_key")
            .allows(capability::APPROVED_CONTENT)
            .tier(MemoryTier::Public),
    ]
}

/// Access policy engine
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    definitions: HashMap<Scope, ScopeDefinition>,
}

impl AccessPolicy {
    /// Build a policy from table rows.
    ///
    /// Rejects duplicate scopes and any `PUBLIC` row that reaches the journal
    /// or persona tiers. Duplicate tiers within a row keep their first position.
    pub fn new(definitions: Vec<ScopeDefinition>) -> Result<Self> {
        let mut table = HashMap::new();
        for mut def in definitions {
            if def.scope == Scope::Public {
                if let Some(tier) = def.tiers.iter().find(|t| **t != MemoryTier::Public) {
                    return Err(Error::Config(format!(
                        "PUBLIC scope may only search the public tier, found '{tier}'"
                    )));
                }
            }

            let mut seen = Vec::with_capacity(def.tiers.len());
            def.tiers.retain(|t| {
                if seen.contains(t) {
                    false
                } else {
                    seen.push(*t);
                    true
                }
            });

            let scope = def.scope;
            if table.insert(scope, def).is_some() {
                return Err(Error::Config(format!("scope {scope} defined more than once")));
            }
        }
        Ok(Self { definitions: table })
    }

    /// A policy with no scopes: everything fails closed
    pub fn empty() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    /// Table row for a scope, if defined
    pub fn definition(&self, scope: Scope) -> Option<&ScopeDefinition> {
        self.definitions.get(&scope)
    }

    /// Ordered tiers a scope may query; empty when the scope is undefined.
    pub fn resolve_tiers(&self, scope: Scope) -> Vec<MemoryTier> {
        self.definitions
            .get(&scope)
            .map(|d| d.tiers.clone())
            .unwrap_or_default()
    }

    /// Same as `resolve_tiers`, for an unparsed scope value.
    pub fn resolve_tiers_by_name(&self, name: &str) -> Vec<MemoryTier> {
        Scope::parse(name)
            .map(|scope| self.resolve_tiers(scope))
            .unwrap_or_default()
    }

    /// True iff `credentials` is a superset of the scope's requirements.
    /// Undefined scopes never validate.
    pub fn validate(&self, scope: Scope, credentials: &Credentials) -> bool {
        self.definitions
            .get(&scope)
            .map(|d| credentials.satisfies(&d.requires))
            .unwrap_or(false)
    }

    /// Same as `validate`, for an unparsed scope value.
    pub fn validate_by_name(&self, name: &str, credentials: &Credentials) -> bool {
        Scope::parse(name)
            .map(|scope| self.validate(scope, credentials))
            .unwrap_or(false)
    }

    /// Capability tags for a scope (informational only)
    pub fn permitted_actions(&self, scope: Scope) -> BTreeSet<String> {
        self.definitions
            .get(&scope)
            .map(|d| d.allows.clone())
            .unwrap_or_default()
    }

    /// Validate and resolve in one step, failing with `Error::Authorization`.
    pub fn authorize(&self, scope: Scope, credentials: &Credentials) -> Result<Vec<MemoryTier>> {
        let Some(def) = self.definitions.get(&scope) else {
            return Err(Error::Authorization(format!("scope {scope} is not defined")));
        };
        if !credentials.satisfies(&def.requires) {
            let missing: Vec<&str> = def
                .requires
                .iter()
                .filter(|r| !credentials.contains(r))
                .map(String::as_str)
                .collect();
            return Err(Error::Authorization(format!(
                "scope {scope} requires credentials: {}",
                missing.join(", ")
            )));
        }
        Ok(def.tiers.clone())
    }

    /// Defined scopes in privilege order
    pub fn scopes(&self) -> Vec<Scope> {
        Scope::ALL
            .into_iter()
            .filter(|s| self.definitions.contains_key(s))
            .collect()
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            definitions: default_scope_definitions()
                .into_iter()
                .map(|d| (d.scope, d))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tier_mapping() {
        let policy = AccessPolicy::default();
        assert_eq!(policy.resolve_tiers(Scope::StrictPrivate), vec![MemoryTier::Journal]);
        assert_eq!(
            policy.resolve_tiers(Scope::Restricted),
            vec![MemoryTier::Journal, MemoryTier::Persona]
        );
        assert_eq!(policy.resolve_tiers(Scope::Public), vec![MemoryTier::Public]);
    }

    #[test]
    fn test_unrecognized_scope_fails_closed() {
        let policy = AccessPolicy::default();
        let everything = Credentials::new(["private_key", "restricted_key", "public_key"]);
        for name in ["ADMIN", "", "public", "chat_interface", "STRICT-PRIVATE"] {
            assert!(policy.resolve_tiers_by_name(name).is_empty());
            assert!(!policy.validate_by_name(name, &everything));
        }
    }

    #[test]
    fn test_undefined_scope_fails_closed() {
        let policy = AccessPolicy::new(vec![ScopeDefinition::new(Scope::Public)
            .tier(MemoryTier::Public)])
        .unwrap();
        assert!(policy.resolve_tiers(Scope::StrictPrivate).is_empty());
        assert!(!policy.validate(Scope::StrictPrivate, &Credentials::none()));
        assert!(policy.authorize(Scope::Restricted, &Credentials::none()).is_err());
        assert_eq!(policy.scopes(), vec![Scope::Public]);
    }

    #[test]
    fn test_credential_completeness() {
        let policy = AccessPolicy::default();
        assert!(!policy.validate(Scope::StrictPrivate, &Credentials::none()));
        assert!(policy.validate(Scope::StrictPrivate, &Credentials::new(["private_key"])));
        assert!(policy.validate(
            Scope::StrictPrivate,
            &Credentials::new(["private_key", "extra"])
        ));
        assert!(!policy.validate(Scope::StrictPrivate, &Credentials::new(["public_key"])));
    }

    #[test]
    fn test_no_partial_credit() {
        let policy = AccessPolicy::new(vec![ScopeDefinition::new(Scope::Restricted)
            .requires("a")
            .requires("b")
            .tier(MemoryTier::Persona)])
        .unwrap();
        assert!(!policy.validate(Scope::Restricted, &Credentials::new(["a"])));
        assert!(!policy.validate(Scope::Restricted, &Credentials::new(["b"])));
        assert!(policy.validate(Scope::Restricted, &Credentials::new(["a", "b"])));

        let err = policy
            .authorize(Scope::Restricted, &Credentials::new(["a"]))
            .unwrap_err();
        assert!(matches!(err, Error::Authorization(ref m) if m.contains('b')));
    }

    #[test]
    fn test_permitted_actions_are_informational() {
        let policy = AccessPolicy::default();
        let actions = policy.permitted_actions(Scope::StrictPrivate);
        assert!(actions.contains(capability::RAW_JOURNAL));
        assert!(actions.contains(capability::EMOTIONAL_DETAIL));
        assert!(!policy.permitted_actions(Scope::Public).contains(capability::RAW_JOURNAL));
    }

    #[test]
    fn test_public_scope_cannot_reach_private_tiers() {
        for tier in [MemoryTier::Journal, MemoryTier::Persona] {
            let result = AccessPolicy::new(vec![ScopeDefinition::new(Scope::Public)
                .tier(MemoryTier::Public)
                .tier(tier)]);
            assert!(matches!(result, Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_duplicate_scope_rejected() {
        let result = AccessPolicy::new(vec![
            ScopeDefinition::new(Scope::Restricted),
            ScopeDefinition::new(Scope::Restricted),
        ]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_duplicate_tiers_keep_first_position() {
        let policy = AccessPolicy::new(vec![ScopeDefinition::new(Scope::Restricted)
            .tier(MemoryTier::Journal)
            .tier(MemoryTier::Persona)
            .tier(MemoryTier::Journal)])
        .unwrap();
        assert_eq!(
            policy.resolve_tiers(Scope::Restricted),
            vec![MemoryTier::Journal, MemoryTier::Persona]
        );
    }

    #[test]
    fn test_default_matches_default_table() {
        let built = AccessPolicy::new(default_scope_definitions()).unwrap();
        let default = AccessPolicy::default();
        for scope in Scope::ALL {
            assert_eq!(built.definition(scope), default.definition(scope));
        }
    }
}
