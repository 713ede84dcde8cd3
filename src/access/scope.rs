//! Scope identifiers and presented credentials

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Authorization level determining which memory tiers may be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    /// Companion-only access to the raw journal
    StrictPrivate,
    /// Curation access to the journal and promoted persona memory
    Restricted,
    /// Public chat access to approved knowledge only
    Public,
}

impl Scope {
    /// All scopes, from most to least privileged
    pub const ALL: [Scope; 3] = [Scope::StrictPrivate, Scope::Restricted, Scope::Public];

    /// Canonical wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::StrictPrivate => "STRICT_PRIVATE",
            Scope::Restricted => "RESTRICTED",
            Scope::Public => "PUBLIC",
        }
    }

    /// Parse a wire name. Anything unrecognized is `None`; callers must treat
    /// that as "no access", never as a default scope.
    pub fn parse(name: &str) -> Option<Scope> {
        match name {
            "STRICT_PRIVATE" => Some(Scope::StrictPrivate),
            "RESTRICTED" => Some(Scope::Restricted),
            "PUBLIC" => Some(Scope::Public),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::parse(s).ok_or_else(|| crate::error::Error::Authorization(format!("unknown scope '{s}'")))
    }
}

/// Credential identifiers presented by an already-authenticated caller.
///
/// Identity is established upstream; the engine only checks entitlement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    ids: BTreeSet<String>,
}

impl Credentials {
    /// No credentials at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from any iterator of credential ids
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a credential id
    pub fn with(mut self, id: impl Into<String>) -> Self {
        self.ids.insert(id.into());
        self
    }

    /// Whether a specific credential was presented
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// True iff every id in `required` was presented
    pub fn satisfies(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.ids)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_round_trip_names() {
        for scope in Scope::ALL {
            assert_eq!(Scope::parse(scope.as_str()), Some(scope));
        }
    }

    #[test]
    fn test_unrecognized_scope_names() {
        for name in ["", "public", "ADMIN", "STRICT_PRIVATE ", "companion_only"] {
            assert_eq!(Scope::parse(name), None, "{name:?} must not parse");
            assert!(name.parse::<Scope>().is_err());
        }
    }

    #[test]
    fn test_scope_serde_uses_wire_names() {
        let json = serde_json::to_string(&Scope::StrictPrivate).unwrap();
        assert_eq!(json, "\"STRICT_PRIVATE\"");
        let scope: Scope = serde_json::from_str("\"RESTRICTED\"").unwrap();
        assert_eq!(scope, Scope::Restricted);
    }

    #[test]
    fn test_credentials_superset() {
        let required: BTreeSet<String> = ["a".to_string(), "b".to_string()].into();
        assert!(Credentials::new(["a", "b"]).satisfies(&required));
        assert!(Credentials::new(["a", "b", "c"]).satisfies(&required));
        assert!(!Credentials::new(["a"]).satisfies(&required));
        assert!(!Credentials::none().satisfies(&required));
        assert!(Credentials::none().satisfies(&BTreeSet::new()));
    }
}
