//! Loader for Sherpa configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are attached, so later sources win;
//! `SHERPA__SECTION__KEY` environment variables sit underneath explicit files.
//! After merging, every string value gets recursive `${VAR}` expansion.
//!
//! ```yaml
//! llm:
//!   provider: openai
//!   model: gpt-4o-mini
//!   auth_token: ${OPENAI_API_KEY}
//! browser:
//!   webdriver_url: http://localhost:9515
//!   headless: true
//! agent:
//!   max_steps: 20
//! pipeline:
//!   page_cap: 3
//! logging:
//!   format: json
//! ```
//!
//! Every section has defaults, so an empty document is a valid configuration.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use sherpa_common::observability::{LogConfig, LogFormat};
use sherpa_common::{AgentLimits, LlmConfig};
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SherpaConfig {
    pub llm: LlmSection,
    pub browser: BrowserSection,
    pub agent: AgentSection,
    pub pipeline: PipelineSection,
    pub logging: LoggingSection,
}

/// The tag is `provider`; the remaining keys depend on it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmSection {
    Openai {
        model: String,
        auth_token: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
    },
    Ollama {
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
    },
}

impl Default for LlmSection {
    fn default() -> Self {
        Self::Ollama {
            model: default_ollama_model(),
            endpoint: default_ollama_endpoint(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl LlmSection {
    /// Provider settings in the shape `sherpa-llm` consumes.
    pub fn to_llm_config(&self) -> LlmConfig {
        match self {
            Self::Openai {
                model,
                auth_token,
                endpoint,
                ..
            } => LlmConfig::OpenAi {
                api_key: auth_token.clone(),
                model: model.clone(),
                base_url: Some(endpoint.clone()),
            },
            Self::Ollama {
                model, endpoint, ..
            } => LlmConfig::Ollama {
                base_url: endpoint.clone(),
                model: model.clone(),
            },
        }
    }

    /// `(temperature, max_tokens)` overrides, if any were configured.
    pub fn sampling(&self) -> (Option<f32>, Option<u32>) {
        match self {
            Self::Openai {
                temperature,
                max_tokens,
                ..
            }
            | Self::Ollama {
                temperature,
                max_tokens,
                ..
            } => (*temperature, *max_tokens),
        }
    }
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".into()
}
fn default_ollama_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_ollama_model() -> String {
    "llama3.2:3b".into()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserSection {
    pub webdriver_url: String,
    pub headless: bool,
    /// Once the page sits on this URL the model may no longer choose `navigate`.
    pub target_url: Option<String>,
    /// Where HTML/screenshot dumps go when the results container is missing.
    pub dump_dir: PathBuf,
    pub human_typing: bool,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            target_url: Some("https://www.google.com/".into()),
            dump_dir: PathBuf::from("sherpa-dumps"),
            human_typing: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentSection {
    pub max_steps: u32,
    pub max_retries: u32,
    pub max_nav_repeats: u32,
    pub history_window: usize,
    pub content_preview_chars: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        let l = AgentLimits::default();
        Self {
            max_steps: l.max_steps,
            max_retries: l.max_retries,
            max_nav_repeats: l.max_nav_repeats,
            history_window: l.history_window,
            content_preview_chars: l.content_preview_chars,
        }
    }
}

impl AgentSection {
    pub fn limits(&self) -> AgentLimits {
        AgentLimits {
            max_steps: self.max_steps,
            max_retries: self.max_retries,
            max_nav_repeats: self.max_nav_repeats,
            history_window: self.history_window,
            content_preview_chars: self.content_preview_chars,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    pub search_url: String,
    /// Query parameter carrying the result offset of a page.
    pub offset_param: String,
    pub results_per_page: u32,
    pub page_cap: u32,
    pub max_results: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            search_url: "https://html.duckduckgo.com/html/".into(),
            offset_param: "s".into(),
            results_per_page: 10,
            page_cap: 3,
            max_results: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    pub dir: Option<PathBuf>,
    pub format: String,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            dir: None,
            format: "text".into(),
            stderr: true,
            filter: "info".into(),
        }
    }
}

impl LoggingSection {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            app_name: "sherpa",
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: LogFormat::from_name(&self.format),
            default_filter: self.filter.clone(),
        }
    }
}

/// `<config dir>/sherpa/sherpa.yaml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sherpa").join("sherpa.yaml"))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct SherpaConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SherpaConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SherpaConfigLoader {
    /// Start with `SHERPA__` env overrides only.
    ///
    /// ```
    /// use sherpa_config::SherpaConfigLoader;
    ///
    /// let config = SherpaConfigLoader::new()
    ///     .with_yaml_str("agent:\n  max_steps: 5")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.agent.max_steps, 5);
    /// assert_eq!(config.agent.max_retries, 3);
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder().add_source(
            Environment::with_prefix("SHERPA")
                .separator("__")
                .try_parsing(true),
        );
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may not exist, e.g. the per-user default.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use sherpa_config::{LlmSection, SherpaConfigLoader};
    ///
    /// let cfg = SherpaConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// llm:
    ///   provider: openai
    ///   model: gpt-4o-mini
    ///   auth_token: example
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(matches!(cfg.llm, LlmSection::Openai { .. }));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    pub fn load(self) -> Result<SherpaConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        // An empty document deserializes to unit rather than a map.
        if v.is_null() {
            return Ok(SherpaConfig::default());
        }

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
