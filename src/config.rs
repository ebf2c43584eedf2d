use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::semantic::{embeddings::DEFAULT_BATCH_SIZE, DEFAULT_MODEL};

const CONFIG_FILE: &str = "config.yaml";

/// Default bind address of the search endpoint
const DEFAULT_ADDR: &str = "0.0.0.0:8000";
/// Default search endpoint used by the evaluator
const DEFAULT_SEARCH_URL: &str = "http://localhost:8000/search/";
/// `k` sent with every evaluation request
const DEFAULT_EVAL_K: i64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
/// Pause between evaluation requests
const DEFAULT_PAUSE_MS: u64 = 200;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_TEST_PERCENT: u32 = 20;

/// Configuration for the embedding model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Model name for embeddings (e.g., "multilingual-e5-large")
    #[serde(default = "default_model")]
    pub model: String,

    /// Texts per inference batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Where models are cached; defaults to the base directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            batch_size: default_batch_size(),
            cache_dir: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_train_path")]
    pub train_path: PathBuf,
    #[serde(default = "default_tag_answer_path")]
    pub tag_answer_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            train_path: default_train_path(),
            tag_answer_path: default_tag_answer_path(),
        }
    }
}

/// How predicted answers are compared with expected ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMatch {
    /// Equal after trimming surrounding whitespace
    #[default]
    Exact,
    /// Equal after case folding, dropping punctuation and collapsing whitespace
    Normalized,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default = "default_eval_k")]
    pub k: i64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_test_path")]
    pub test_path: PathBuf,
    #[serde(default = "default_tag_answer_path")]
    pub tag_answer_path: PathBuf,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    #[serde(default = "default_mismatch_log_path")]
    pub mismatch_log_path: PathBuf,
    #[serde(default)]
    pub answer_match: AnswerMatch,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            k: default_eval_k(),
            request_timeout_secs: default_request_timeout_secs(),
            pause_ms: default_pause_ms(),
            test_path: default_test_path(),
            tag_answer_path: default_tag_answer_path(),
            log_path: default_log_path(),
            mismatch_log_path: default_mismatch_log_path(),
            answer_match: AnswerMatch::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Share of each multi-row tag group sent to test, in percent
    #[serde(default = "default_test_percent")]
    pub test_percent: u32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            test_percent: default_test_percent(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub split: SplitConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_addr() -> String {
    DEFAULT_ADDR.to_string()
}

fn default_train_path() -> PathBuf {
    PathBuf::from("train.csv")
}

fn default_test_path() -> PathBuf {
    PathBuf::from("test.csv")
}

fn default_tag_answer_path() -> PathBuf {
    PathBuf::from("tag_answer.csv")
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_eval_k() -> i64 {
    DEFAULT_EVAL_K
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_pause_ms() -> u64 {
    DEFAULT_PAUSE_MS
}

fn default_log_path() -> PathBuf {
    PathBuf::from("evaluation.log")
}

fn default_mismatch_log_path() -> PathBuf {
    PathBuf::from("evaluation_mismatches.log")
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_test_percent() -> u32 {
    DEFAULT_TEST_PERCENT
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.semantic.batch_size == 0 {
            bail!("semantic.batch_size must be greater than 0");
        }

        if self.evaluation.request_timeout_secs == 0 {
            bail!("evaluation.request_timeout_secs must be greater than 0");
        }

        if !(1..=100).contains(&self.split.test_percent) {
            bail!(
                "split.test_percent must be between 1 and 100, got {}",
                self.split.test_percent
            );
        }

        Ok(())
    }

    /// Load from an explicit file, or from `config.yaml` in the base directory
    /// when present, falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let base_path = base_path()?;

        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(base_path.join(CONFIG_FILE)).filter(|path| path.exists()),
        };

        let mut config = match path {
            Some(path) => {
                log::debug!("reading config from {}", path.display());
                let config_str = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::parse(&config_str)
                    .with_context(|| format!("config {} is malformed", path.display()))?
            }
            None => Self::default(),
        };

        config.base_path = base_path;
        config.validate()?;

        Ok(config)
    }

    pub fn parse(config_str: &str) -> anyhow::Result<Self> {
        Ok(serde_yml::from_str(config_str)?)
    }

    /// Directory fastembed caches models under.
    pub fn model_cache_dir(&self) -> PathBuf {
        self.semantic
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.base_path.clone())
    }
}

/// `FAQ_BASE_PATH`, or `~/.local/share/faq`.
fn base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("FAQ_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = homedir::my_home()
        .context("could not determine home directory")?
        .context("home directory path is empty")?;

    Ok(home.join(".local/share/faq"))
}
