//! Runtime configuration.
//!
//! Layering: built-in defaults, then an optional TOML file, then environment
//! variables. Secrets (API keys) are only ever read from the environment.
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `HASHWIRE_CONFIG` | path of the TOML file |
//! | `BRAVE_API_KEY` | enables web search |
//! | `BRAVE_PLAN` | `free`, `base` or `pro` |
//! | `OPENAI_API_KEY` | bearer token for the generator |
//! | `HASHWIRE_LLM_BASE_URL` | enables the generator |
//! | `HASHWIRE_LLM_MODEL` | generator model name |
//! | `HASHWIRE_MONTHLY_CACHE` | monthly cache file |
//! | `HASHWIRE_OUTPUT_DIR` | content store directory |
//! | `HASHWIRE_BIND` | daemon listen address |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{HashwireError, Result};
use crate::evidence::BravePlan;
use crate::textgen::{DisabledGenerator, OpenAiCompatClient, OpenAiCompatConfig, TextGenerator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 8,
            user_agent: concat!("hashwire/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Base URLs of the public data providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    pub mempool: String,
    pub coingecko: String,
    pub blockchain_info: String,
    pub blockchair: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            mempool: "https://mempool.space".to_string(),
            coingecko: "https://api.coingecko.com".to_string(),
            blockchain_info: "https://blockchain.info".to_string(),
            blockchair: "https://api.blockchair.com".to_string(),
        }
    }
}

impl ProviderEndpoints {
    /// Point every provider at one base URL (used against mock servers).
    pub fn all_at(base: &str) -> Self {
        Self {
            mempool: base.to_string(),
            coingecko: base.to_string(),
            blockchain_info: base.to_string(),
            blockchair: base.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub price_ttl_secs: u64,
    pub network_ttl_secs: u64,
    pub mempool_ttl_secs: u64,
    pub trends_ttl_secs: u64,
    pub monthly_cache_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            price_ttl_secs: 60,
            network_ttl_secs: 300,
            mempool_ttl_secs: 120,
            trends_ttl_secs: 1_800,
            monthly_cache_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub plan: BravePlan,
    pub fetch_pages: bool,
    pub results_per_query: u32,
    pub sustainability_queries: Vec<String>,
    pub trends_query: String,
    pub trends_freshness: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: crate::evidence::search::DEFAULT_BRAVE_ENDPOINT.to_string(),
            plan: BravePlan::Free,
            fetch_pages: true,
            results_per_query: 5,
            sustainability_queries: vec![
                "bitcoin mining renewable energy share percent".to_string(),
                "bitcoin mining data center PUE power usage effectiveness".to_string(),
                "bitcoin mining carbon intensity kg CO2 per kWh".to_string(),
                "bitcoin miners average break-even price".to_string(),
            ],
            trends_query: "bitcoin mining news".to_string(),
            trends_freshness: "pw".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// OpenAI-compatible base URL; generation is disabled when unset.
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: crate::textgen::openai::DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub topics: usize,
    pub concurrency: usize,
    pub stage_timeout_secs: u64,
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topics: 5,
            concurrency: 1,
            stage_timeout_secs: 120,
            output_dir: PathBuf::from("content"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashwireConfig {
    pub http: HttpConfig,
    pub providers: ProviderEndpoints,
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub generator: GeneratorConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
}

impl HashwireConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| HashwireError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| HashwireError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Full layering: `path` (or `HASHWIRE_CONFIG`), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("HASHWIRE_CONFIG").map(PathBuf::from));
        let mut config = match file {
            Some(file) => {
                debug!(path = %file.display(), "loading config file");
                Self::from_toml_file(file)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides from `lookup`. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("BRAVE_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(plan) = get("BRAVE_PLAN") {
            self.search.plan = BravePlan::from_string(&plan);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.generator.api_key = Some(key);
        }
        if let Some(url) = get("HASHWIRE_LLM_BASE_URL") {
            self.generator.base_url = Some(url);
        }
        if let Some(model) = get("HASHWIRE_LLM_MODEL") {
            self.generator.model = model;
        }
        if let Some(path) = get("HASHWIRE_MONTHLY_CACHE") {
            self.cache.monthly_cache_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = get("HASHWIRE_OUTPUT_DIR") {
            self.pipeline.output_dir = PathBuf::from(dir);
        }
        if let Some(bind) = get("HASHWIRE_BIND") {
            self.server.bind = bind;
        }
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.http.timeout_secs))
            .user_agent(&self.http.user_agent)
            .build()
            .map_err(|e| HashwireError::Config(format!("http client: {e}")))
    }

    /// The configured text generator, or [`DisabledGenerator`] when no base URL is set.
    pub fn text_generator(&self) -> Result<Arc<dyn TextGenerator>> {
        let Some(base_url) = &self.generator.base_url else {
            return Ok(Arc::new(DisabledGenerator));
        };
        let mut gen_config = OpenAiCompatConfig::new(base_url.clone(), self.generator.model.clone());
        gen_config.api_key = self.generator.api_key.clone();
        gen_config.timeout_secs = self.generator.timeout_secs;
        let client = OpenAiCompatClient::new(gen_config)
            .map_err(|e| HashwireError::Config(format!("text generator: {e}")))?;
        Ok(Arc::new(client))
    }
}
