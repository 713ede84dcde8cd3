//! Persona Vault configuration management

use crate::access::{default_scope_definitions, AccessPolicy, Scope, ScopeDefinition};
use crate::error::{Error, Result};
use crate::memory::{MemoryTier, RecordKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Upper bound on `RetrievalConfig::search_retries`
pub const MAX_SEARCH_RETRIES: u32 = 1;

/// Main Persona Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Deployment environment name
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Scope lookup table
    #[serde(default)]
    pub access: AccessConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            access: AccessConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Scope → credentials/capabilities/tiers table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    pub scopes: Vec<ScopeDefinition>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            scopes: default_scope_definitions(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum merged results returned per query
    pub result_cap: usize,

    /// Nearest neighbours requested from each tier
    pub per_tier_limit: usize,

    /// Retries per failed tier search before the tier is treated as empty
    /// (at most `MAX_SEARCH_RETRIES`)
    pub search_retries: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            result_cap: 5,
            per_tier_limit: 5,
            search_retries: 1,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Output dimension; every stored vector must match it
    pub dimension: usize,

    /// Name of the environment variable holding the API key
    pub api_key_ref: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-ada-002".to_string(),
            dimension: 1536,
            api_key_ref: "openai_api_key".to_string(),
        }
    }
}

/// Similarity metric of the vector collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

/// Vector storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Vector database URL (None = in-process store)
    pub vector_db_url: Option<String>,

    /// Name of the environment variable holding the vector DB API key
    pub api_key_ref: String,

    /// Similarity metric
    pub distance: Distance,

    /// Collection name per record kind
    pub collections: CollectionNames,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            vector_db_url: None,
            api_key_ref: "vector_db_api_key".to_string(),
            distance: Distance::Cosine,
            collections: CollectionNames::default(),
        }
    }
}

/// Collection names, one per record kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionNames {
    pub journal_entries: String,
    pub persona_candidates: String,
    pub persona_memory: String,
    pub public_knowledge: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            journal_entries: "journal_entries".to_string(),
            persona_candidates: "persona_candidates".to_string(),
            persona_memory: "persona_memory".to_string(),
            public_knowledge: "public_knowledge".to_string(),
        }
    }
}

impl CollectionNames {
    pub fn name(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::JournalEntry => &self.journal_entries,
            RecordKind::Candidate => &self.persona_candidates,
            RecordKind::PersonaMemory => &self.persona_memory,
            RecordKind::PublicKnowledge => &self.public_knowledge,
        }
    }
}

/// One collection the storage collaborator must provision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSpec {
    pub name: String,
    pub kind: RecordKind,
    pub tier: MemoryTier,
    pub vector_size: usize,
    pub distance: Distance,
}

impl VaultConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VaultConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `PERSONA_VAULT_ENV` and `VECTOR_DB_URL` from the environment
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(env) = std::env::var("PERSONA_VAULT_ENV") {
            self.environment = env;
        }
        if let Ok(url) = std::env::var("VECTOR_DB_URL") {
            if !url.is_empty() {
                self.storage.vector_db_url = Some(url);
            }
        }
        self
    }

    /// Reject configurations the engine cannot run safely with
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be positive".to_string()));
        }
        if self.retrieval.result_cap == 0 {
            return Err(Error::Config("retrieval.result_cap must be positive".to_string()));
        }
        if self.retrieval.per_tier_limit == 0 {
            return Err(Error::Config("retrieval.per_tier_limit must be positive".to_string()));
        }
        if self.retrieval.search_retries > MAX_SEARCH_RETRIES {
            return Err(Error::Config(format!(
                "retrieval.search_retries is {}, at most {MAX_SEARCH_RETRIES} allowed",
                self.retrieval.search_retries
            )));
        }
        // The in-process store only scores by cosine similarity.
        if self.storage.vector_db_url.is_none() && self.storage.distance != Distance::Cosine {
            return Err(Error::Config(format!(
                "storage.distance {:?} requires an external vector DB; the in-process store uses cosine",
                self.storage.distance
            )));
        }

        let names = &self.storage.collections;
        let mut seen = HashMap::new();
        for kind in RecordKind::ALL {
            let name = names.name(kind);
            if name.is_empty() {
                return Err(Error::Config(format!("collection name for {kind} is empty")));
            }
            if let Some(other) = seen.insert(name.to_string(), kind) {
                return Err(Error::Config(format!(
                    "collection '{name}' is shared by {other} and {kind}"
                )));
            }
        }

        self.access_policy().map(|_| ())
    }

    /// Build the access policy from the configured table
    pub fn access_policy(&self) -> Result<AccessPolicy> {
        AccessPolicy::new(self.access.scopes.clone())
    }

    /// Collections to provision, one per record kind
    pub fn collection_specs(&self) -> Vec<CollectionSpec> {
        RecordKind::ALL
            .into_iter()
            .map(|kind| CollectionSpec {
                name: self.storage.collections.name(kind).to_string(),
                kind,
                tier: kind.tier(),
                vector_size: self.embedding.dimension,
                distance: self.storage.distance,
            })
            .collect()
    }

    /// Scope definition for a scope, if configured
    pub fn scope(&self, scope: Scope) -> Option<&ScopeDefinition> {
        self.access.scopes.iter().find(|d| d.scope == scope)
    }
}

/// Resolve API keys from environment variables.
///
/// Each `api_key_ref` names an environment variable (e.g. `"openai_api_key"`
/// → reads `$OPENAI_API_KEY`). Both the exact casing and the UPPER_CASE
/// form are tried.
pub fn resolve_api_keys_from_env(config: &VaultConfig) -> HashMap<String, String> {
    let refs = [
        ("embedding", &config.embedding.api_key_ref),
        ("vector_db", &config.storage.api_key_ref),
    ];
    let mut keys = HashMap::new();
    for (name, key_ref) in refs {
        let val = std::env::var(key_ref).or_else(|_| std::env::var(key_ref.to_uppercase()));
        if let Ok(key) = val {
            keys.insert(name.to_string(), key);
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.retrieval.result_cap, 5);
        assert_eq!(config.retrieval.search_retries, 1);
        assert_eq!(config.storage.distance, Distance::Cosine);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_collection_specs() {
        let specs = VaultConfig::default().collection_specs();
        assert_eq!(specs.len(), 4);
        assert!(specs.iter().all(|s| s.vector_size == 1536));
        let journal = specs.iter().find(|s| s.kind == RecordKind::JournalEntry).unwrap();
        assert_eq!(journal.name, "journal_entries");
        assert_eq!(journal.tier, MemoryTier::Journal);
        let candidates = specs.iter().find(|s| s.kind == RecordKind::Candidate).unwrap();
        assert_eq!(candidates.tier, MemoryTier::Persona);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = VaultConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: VaultConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.access.scopes, config.access.scopes);
        assert_eq!(parsed.embedding.model, config.embedding.model);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
environment = "test"

[retrieval]
result_cap = 3
per_tier_limit = 10
search_retries = 0

[embedding]
provider = "hash"
model = "tokens"
dimension = 64
api_key_ref = "none"
"#
        )
        .unwrap();

        let config = VaultConfig::load(file.path()).unwrap();
        assert_eq!(config.environment, "test");
        assert_eq!(config.retrieval.result_cap, 3);
        assert_eq!(config.embedding.dimension, 64);
        assert_eq!(config.access.scopes.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_public_scope_reaching_journal() {
        let mut config = VaultConfig::default();
        for def in &mut config.access.scopes {
            if def.scope == Scope::Public {
                def.tiers.push(MemoryTier::Journal);
            }
        }
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = VaultConfig::default();
        config.embedding.dimension = 0;
        assert!(config.validate().is_err());

        let mut config = VaultConfig::default();
        config.retrieval.result_cap = 0;
        assert!(config.validate().is_err());

        let mut config = VaultConfig::default();
        config.storage.collections.persona_candidates = "persona_memory".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_environment() {
        assert_eq!(VaultConfig::default().environment, "development");
        let parsed: VaultConfig = toml::from_str("").unwrap();
        assert_eq!(parsed.environment, "development");
    }

    #[test]
    fn test_validate_bounds_search_retries() {
        let mut config = VaultConfig::default();
        config.retrieval.search_retries = MAX_SEARCH_RETRIES;
        assert!(config.validate().is_ok());

        for retries in [2, 4, u32::MAX] {
            config.retrieval.search_retries = retries;
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{retries}");
        }
    }

    #[test]
    fn test_validate_distance_for_in_process_store() {
        let mut config = VaultConfig::default();
        config.storage.distance = Distance::Dot;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.storage.vector_db_url = Some("http://localhost:6333".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scope_lookup() {
        let config = VaultConfig::default();
        let def = config.scope(Scope::StrictPrivate).unwrap();
        assert_eq!(def.interface, "companion_only");
        assert!(def.requires.contains("private_key"));
    }
}
