//! Loader for pricewatch configuration with YAML + environment overlays.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults (every section is optional),
//! 2. an optional YAML file (`pricewatch.yaml` in the working directory, the
//!    user config dir, or an explicit `--config` path),
//! 3. `PRICEWATCH__SECTION__KEY` environment variables.
//!
//! String values may reference environment variables as `${VAR}`; expansion is
//! recursive up to a fixed depth and unknown variables are left untouched.
//!
//! ```yaml
//! version: "1"
//! market:
//!   search_url: "https://listado.mercadolibre.com.ar/{query}"
//!   timeout_secs: 10
//!   user_agent: "Mozilla/5.0"
//! extraction:
//!   mode: name-price-url          # or price-only
//!   selector_set: ml-ar-2024
//!   selector_sets:
//!     - version: my-fix
//!       item: "li.ui-search-layout__item"
//!       name: "h2"
//!       price: "span.andes-money-amount__fraction"
//!       url: "a"
//!       thousands_separators: "."
//! llm:
//!   enabled: true
//!   model: gemini-1.5-flash
//!   api_key: "${GEMINI_API_KEY}"
//! batch:
//!   item_column: "item name"
//!   price_column: "current price"
//! logging:
//!   format: text
//!   filter: info
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// File name looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "pricewatch.yaml";

/// Selector set used when `extraction.selector_set` is not set.
pub const DEFAULT_SELECTOR_SET: &str = "ml-ar-2024";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PriceWatchConfig {
    pub version: Option<String>,
    pub market: MarketSettings,
    pub extraction: ExtractionSettings,
    pub llm: LlmSettings,
    pub batch: BatchSettings,
    pub logging: LoggingSettings,
}

/// Where and how the search page is fetched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    /// Listing URL template; `{query}` is replaced by the slugified query.
    pub search_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            search_url: "https://listado.mercadolibre.com.ar/{query}".into(),
            timeout_secs: 10,
            user_agent: "Mozilla/5.0".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModeSetting {
    PriceOnly,
    #[default]
    NamePriceUrl,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub mode: ModeSetting,
    /// Version label of the active selector set.
    pub selector_set: String,
    /// User-provided sets; a version equal to a built-in one replaces it.
    pub selector_sets: Vec<SelectorSetSpec>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            mode: ModeSetting::default(),
            selector_set: DEFAULT_SELECTOR_SET.into(),
            selector_sets: Vec::new(),
        }
    }
}

/// CSS selectors describing one known shape of the search-results markup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectorSetSpec {
    pub version: String,
    /// Repeated result block.
    pub item: String,
    pub name: String,
    pub price: String,
    /// Anchor carrying the listing link (`href`).
    pub url: String,
    /// Characters removed from the price text before parsing.
    #[serde(default = "default_thousands_separators")]
    pub thousands_separators: String,
}

fn default_thousands_separators() -> String {
    ".".into()
}

/// Selector sets shipped with the binary, oldest first.
pub fn builtin_selector_sets() -> Vec<SelectorSetSpec> {
    vec![
        SelectorSetSpec {
            version: DEFAULT_SELECTOR_SET.into(),
            item: "li.ui-search-layout__item".into(),
            name: "h2.ui-search-item__title".into(),
            price: "span.andes-money-amount__fraction".into(),
            url: "a.ui-search-item__group__element".into(),
            thousands_separators: ".".into(),
        },
        SelectorSetSpec {
            version: "ml-ar-poly".into(),
            item: "li.ui-search-layout__item".into(),
            name: "a.poly-component__title, h3.poly-component__title-wrapper".into(),
            price: "div.poly-price__current span.andes-money-amount__fraction".into(),
            url: "a.poly-component__title".into(),
            thousands_separators: ".".into(),
        },
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is absent or unresolved.
    pub api_key_env: String,
    pub base_url: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::Gemini,
            model: "gemini-1.5-flash".into(),
            api_key: None,
            api_key_env: "GEMINI_API_KEY".into(),
            base_url: None,
        }
    }
}

impl LlmSettings {
    /// The usable API key, if any. Unexpanded `${VAR}` placeholders count as missing.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.contains("${"))
            .map(str::to_string)
            .or_else(|| {
                std::env::var(&self.api_key_env)
                    .ok()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub item_column: String,
    pub price_column: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            item_column: "item name".into(),
            price_column: "current price".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `text` or `json`.
    pub format: String,
    /// Filter used when `RUST_LOG` is unset.
    pub filter: String,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: "text".into(),
            filter: "info".into(),
            dir: None,
            stderr: false,
        }
    }
}

impl PriceWatchConfig {
    /// Built-ins plus user sets; user entries win on equal `version`.
    pub fn selector_sets(&self) -> Vec<SelectorSetSpec> {
        let mut sets: Vec<SelectorSetSpec> = builtin_selector_sets()
            .into_iter()
            .filter(|b| {
                !self
                    .extraction
                    .selector_sets
                    .iter()
                    .any(|u| u.version == b.version)
            })
            .collect();
        sets.extend(self.extraction.selector_sets.iter().cloned());
        sets
    }

    /// The selector set named by `extraction.selector_set`.
    pub fn active_selector_set(&self) -> Result<SelectorSetSpec, ConfigError> {
        let wanted = &self.extraction.selector_set;
        self.selector_sets()
            .into_iter()
            .find(|s| &s.version == wanted)
            .ok_or_else(|| {
                ConfigError::Message(format!(
                    "unknown selector set '{wanted}' (known: {})",
                    self.selector_sets()
                        .iter()
                        .map(|s| s.version.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.market.search_url.contains("{query}") {
            return Err(ConfigError::Message(
                "market.search_url must contain a {query} placeholder".into(),
            ));
        }
        if self.market.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "market.timeout_secs must be greater than zero".into(),
            ));
        }
        self.active_selector_set().map(|_| ())
    }
}

/// Candidate locations for the config file when `--config` is not given.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("pricewatch").join(DEFAULT_CONFIG_FILE));
    }
    paths
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
pub struct PriceWatchConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PriceWatchConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceWatchConfigLoader {
    /// Start from built-in defaults; sources are layered in call order.
    ///
    /// ```
    /// use pricewatch_config::{ModeSetting, PriceWatchConfigLoader};
    ///
    /// let config = PriceWatchConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nextraction:\n  mode: price-only")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.extraction.mode, ModeSetting::PriceOnly);
    /// assert_eq!(config.market.timeout_secs, 10);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is silently skipped when missing.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use pricewatch_config::PriceWatchConfigLoader;
    ///
    /// let cfg = PriceWatchConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// extraction:
    ///   selector_set: "2025-redesign"
    ///   selector_sets:
    ///     - version: "2025-redesign"
    ///       item: "div.card"
    ///       name: "h3"
    ///       price: "span.amount"
    ///       url: "a.card-link"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// let active = cfg.active_selector_set().unwrap();
    /// assert_eq!(active.item, "div.card");
    /// assert_eq!(active.thousands_separators, ".");
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// `PRICEWATCH__`-prefixed environment variables override every file and
    /// snippet. `${VAR}` placeholders are expanded before the typed structs are
    /// built, and the result is validated (URL template, timeout, active
    /// selector set).
    pub fn load(self) -> Result<PriceWatchConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("PRICEWATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Convert to serde_json::Value first
        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: PriceWatchConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;
        Ok(typed)
    }
}
