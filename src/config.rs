//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/civitas.sqlite"
//!
//! [search]
//! candidate_k = 200
//! final_limit = 20
//! kind_weights = { opinion = 1.0, bill = 0.9 }
//!
//! [summarizer]
//! provider = "openai"           # disabled | extractive | openai
//! model = "gpt-4o-mini"
//!
//! [server]
//! bind = "127.0.0.1:7410"
//!
//! [retry]
//! maximum_attempts = 5
//!
//! [sources.congress]
//! congress = 118
//!
//! [sources.scotus]
//! root = "./data/opinions"
//! ```
//!
//! API keys are never stored in the file; each HTTP source names the
//! environment variable to read (`api_key_env`).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use civitas_core::models::RecordKind;
use civitas_core::retry::RetryPolicy;
use civitas_core::search::SearchParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_candidate_k")]
    pub candidate_k: i64,
    #[serde(default = "default_final_limit")]
    pub final_limit: i64,
    /// Per-kind multipliers for keyword scores, keyed by kind name.
    #[serde(default)]
    pub kind_weights: BTreeMap<String, f64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            candidate_k: default_candidate_k(),
            final_limit: default_final_limit(),
            kind_weights: BTreeMap::new(),
        }
    }
}

fn default_candidate_k() -> i64 {
    200
}
fn default_final_limit() -> i64 {
    20
}

impl SearchConfig {
    pub fn params(&self) -> SearchParams {
        SearchParams {
            candidate_k: self.candidate_k,
            final_limit: self.final_limit,
            kind_weights: self
                .kind_weights
                .iter()
                .filter_map(|(k, w)| k.parse::<RecordKind>().ok().map(|kind| (kind, *w)))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Body text sent to the model is cut to this many characters.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Extractive provider: number of leading sentences.
    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,
    #[serde(default = "default_max_summary_chars")]
    pub max_summary_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key_env: default_openai_key_env(),
            base_url: default_openai_base_url(),
            max_input_chars: default_max_input_chars(),
            max_sentences: default_max_sentences(),
            max_summary_chars: default_max_summary_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SummarizerConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_input_chars() -> usize {
    24_000
}
fn default_max_sentences() -> usize {
    3
}
fn default_max_summary_chars() -> usize {
    800
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7410".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    pub congress: Option<CongressConfig>,
    pub federal_register: Option<FederalRegisterConfig>,
    pub openstates: Option<OpenStatesConfig>,
    pub california: Option<CaliforniaConfig>,
    pub scotus: Option<ScotusConfig>,
}

/// Congress.gov API v3.
#[derive(Debug, Deserialize, Clone)]
pub struct CongressConfig {
    pub congress: u32,
    #[serde(default = "default_congress_base_url")]
    pub base_url: String,
    #[serde(default = "default_congress_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_congress_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_congress_base_url() -> String {
    "https://api.congress.gov/v3".to_string()
}
fn default_congress_key_env() -> String {
    "CONGRESS_API_KEY".to_string()
}
fn default_congress_page_size() -> u32 {
    250
}
fn default_max_pages() -> u32 {
    20
}

/// Federal Register API v1 (no key required).
#[derive(Debug, Deserialize, Clone)]
pub struct FederalRegisterConfig {
    #[serde(default = "default_fr_base_url")]
    pub base_url: String,
    #[serde(default = "default_fr_per_page")]
    pub per_page: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_fr_base_url() -> String {
    "https://www.federalregister.gov/api/v1".to_string()
}
fn default_fr_per_page() -> u32 {
    100
}

/// OpenStates API v3.
#[derive(Debug, Deserialize, Clone)]
pub struct OpenStatesConfig {
    /// Jurisdiction names or abbreviations accepted by OpenStates (`ny`, `Texas`).
    pub jurisdictions: Vec<String>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default = "default_openstates_base_url")]
    pub base_url: String,
    #[serde(default = "default_openstates_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_openstates_per_page")]
    pub per_page: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_openstates_base_url() -> String {
    "https://v3.openstates.org".to_string()
}
fn default_openstates_key_env() -> String {
    "OPENSTATES_API_KEY".to_string()
}
fn default_openstates_per_page() -> u32 {
    20
}

/// California leginfo bulk download (`pubinfo_*.zip` or its extracted directory).
#[derive(Debug, Deserialize, Clone)]
pub struct CaliforniaConfig {
    pub path: PathBuf,
}

/// Supreme Court slip opinions as text files.
#[derive(Debug, Deserialize, Clone)]
pub struct ScotusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Prefix joined with the relative path to form `source_url`.
    #[serde(default)]
    pub url_prefix: Option<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string()]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Search
    if config.search.final_limit < 1 {
        bail!("search.final_limit must be >= 1");
    }
    if config.search.candidate_k < config.search.final_limit {
        bail!("search.candidate_k must be >= search.final_limit");
    }
    for (kind, weight) in &config.search.kind_weights {
        kind.parse::<RecordKind>()
            .with_context(|| format!("search.kind_weights: unknown kind '{}'", kind))?;
        if weight.is_nan() || *weight <= 0.0 {
            bail!("search.kind_weights.{} must be > 0", kind);
        }
    }

    // Retry
    if config.retry.maximum_attempts < 1 {
        bail!("retry.maximum_attempts must be >= 1");
    }
    if config.retry.backoff_coefficient < 1.0 {
        bail!("retry.backoff_coefficient must be >= 1.0");
    }

    // Summarizer
    match config.summarizer.provider.as_str() {
        "disabled" | "extractive" => {}
        "openai" => {
            if config.summarizer.model.is_none() {
                bail!("summarizer.model must be specified when provider is 'openai'");
            }
        }
        other => bail!(
            "Unknown summarizer provider: '{}'. Must be disabled, extractive, or openai.",
            other
        ),
    }
    if config.summarizer.max_input_chars == 0 {
        bail!("summarizer.max_input_chars must be > 0");
    }
    if config.summarizer.max_sentences == 0 {
        bail!("summarizer.max_sentences must be > 0");
    }

    // Sources
    if let Some(c) = &config.sources.congress {
        if c.page_size == 0 || c.page_size > 250 {
            bail!("sources.congress.page_size must be in 1..=250");
        }
    }
    if let Some(f) = &config.sources.federal_register {
        if f.per_page == 0 || f.per_page > 1000 {
            bail!("sources.federal_register.per_page must be in 1..=1000");
        }
    }
    if let Some(o) = &config.sources.openstates {
        if o.jurisdictions.is_empty() {
            bail!("sources.openstates.jurisdictions must not be empty");
        }
        if o.per_page == 0 {
            bail!("sources.openstates.per_page must be > 0");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"./data/civ.sqlite\"\n").unwrap();
        assert_eq!(config.search.final_limit, 20);
        assert_eq!(config.server.bind, "127.0.0.1:7410");
        assert!(!config.summarizer.is_enabled());
        assert_eq!(config.retry.maximum_attempts, 5);
        assert!(config.sources.congress.is_none());
    }

    #[test]
    fn test_kind_weights_become_search_params() {
        let config = parse(
            "[db]\npath = \"x\"\n[search]\nkind_weights = { opinion = 1.5, executive-order = 0.5 }\n",
        )
        .unwrap();
        let params = config.search.params();
        assert_eq!(params.weight(RecordKind::Opinion), 1.5);
        assert_eq!(params.weight(RecordKind::ExecutiveOrder), 0.5);
        assert_eq!(params.weight(RecordKind::Bill), 1.0);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases = [
            "[db]\npath = \"x\"\n[search]\nfinal_limit = 0\n",
            "[db]\npath = \"x\"\n[search]\ncandidate_k = 5\nfinal_limit = 10\n",
            "[db]\npath = \"x\"\n[search]\nkind_weights = { statute = 1.0 }\n",
            "[db]\npath = \"x\"\n[search]\nkind_weights = { bill = 0.0 }\n",
            "[db]\npath = \"x\"\n[retry]\nmaximum_attempts = 0\n",
            "[db]\npath = \"x\"\n[retry]\nbackoff_coefficient = 0.5\n",
            "[db]\npath = \"x\"\n[summarizer]\nprovider = \"openai\"\n",
            "[db]\npath = \"x\"\n[summarizer]\nprovider = \"magic\"\n",
            "[db]\npath = \"x\"\n[sources.openstates]\njurisdictions = []\n",
        ];
        for case in cases {
            assert!(parse(case).is_err(), "accepted: {}", case);
        }
    }

    #[test]
    fn test_sources_parse() {
        let config = parse(
            r#"
            [db]
            path = "x"
            [sources.congress]
            congress = 118
            [sources.scotus]
            root = "./opinions"
            [sources.california]
            path = "./pubinfo_2023.zip"
            "#,
        )
        .unwrap();
        let congress = config.sources.congress.unwrap();
        assert_eq!(congress.congress, 118);
        assert_eq!(congress.api_key_env, "CONGRESS_API_KEY");
        let scotus = config.sources.scotus.unwrap();
        assert_eq!(scotus.include_globs, vec!["**/*.txt"]);
    }
}
