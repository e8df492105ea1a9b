use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub classifier: ClassifierConfig,
    pub tiers: TierConfig,
    pub network: NetworkConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results requested per corpus search.
    pub general_limit: usize,
    /// Results requested per session-scoped search.
    pub session_limit: usize,
    /// Hard cap on total merged snippet characters.
    pub char_budget: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Retrieved-context size at or above which a person-lookup query is
    /// answerable from the internal corpus alone.
    pub richness_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Word cap enforced on Tier-2 lookup answers.
    pub lookup_max_words: usize,
    /// Token budget for the Tier-2 model call.
    pub lookup_max_tokens: usize,
    /// Maximum LLM round-trips in the Tier-3 tool loop.
    pub agent_max_iterations: usize,
    /// Token budget for each Tier-3 model call.
    pub agent_max_tokens: usize,
    /// Final answers longer than this are truncated with a marker.
    pub answer_max_chars: usize,
    /// Publication list cap on synthesized profiles.
    pub profile_max_publications: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Per-call timeout for vector store operations, in seconds.
    pub store_timeout_secs: u64,
    /// Per-call timeout for each agent tool, in seconds.
    pub tool_timeout_secs: u64,
    /// Per-call timeout for LLM completions, in seconds.
    pub llm_timeout_secs: u64,
}

impl NetworkConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle longer than this are dropped by `sweep_expired`.
    pub ttl_secs: u64,
}

impl RagConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunking.chunk_size < 50 {
            return Err("chunking.chunk_size must be >= 50".into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err("chunking.chunk_overlap must be < chunk_size".into());
        }
        if self.retrieval.char_budget == 0 {
            return Err("retrieval.char_budget must be > 0".into());
        }
        if self.retrieval.general_limit == 0 {
            return Err("retrieval.general_limit must be > 0".into());
        }
        if self.classifier.richness_threshold == 0 {
            return Err("classifier.richness_threshold must be > 0".into());
        }
        if self.tiers.lookup_max_words == 0 || self.tiers.lookup_max_tokens == 0 {
            return Err("tiers.lookup_max_words and lookup_max_tokens must be > 0".into());
        }
        if self.tiers.agent_max_iterations == 0 {
            return Err("tiers.agent_max_iterations must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, validating after parse.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            classifier: ClassifierConfig::default(),
            tiers: TierConfig::default(),
            network: NetworkConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            min_chunk_size: 50,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            general_limit: 50,
            session_limit: 10,
            char_budget: 60_000,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            richness_threshold: 10_000,
        }
    }
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            lookup_max_words: 300,
            lookup_max_tokens: 1024,
            agent_max_iterations: 3,
            agent_max_tokens: 2048,
            answer_max_chars: 8000,
            profile_max_publications: 10,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            store_timeout_secs: 15,
            tool_timeout_secs: 30,
            llm_timeout_secs: 60,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_secs: 24 * 3600 }
    }
}
