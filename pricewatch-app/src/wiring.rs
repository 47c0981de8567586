//! Turns loaded configuration plus command-line overrides into the runtime
//! pieces: the fetcher, the extractor, the optional recommender, and the
//! logging setup.

use crate::cli::{Cli, LogFormatArg, ModeArg, PipelineArgs};
use crate::pipeline::Pipeline;
use anyhow::{Context, Result, bail};
use pricewatch_common::observability::{LogConfig, LogFormat};
use pricewatch_config::{
    LlmProvider, LlmSettings, LoggingSettings, MarketSettings, ModeSetting, PriceWatchConfig,
    PriceWatchConfigLoader, SelectorSetSpec, default_config_paths,
};
use pricewatch_llm::traits::LlmClient;
use pricewatch_llm::{LlmConfig, ensure_llm_ready};
use pricewatch_market::{
    ExtractionMode, Extractor, FetchSettings, Fetcher, SelectorSet, SelectorSpec,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// An explicit path must exist; otherwise the user config dir and then the
/// working directory are layered when present.
pub fn load_config(explicit: Option<&Path>) -> Result<PriceWatchConfig> {
    let mut loader = PriceWatchConfigLoader::new();
    match explicit {
        Some(path) => loader = loader.with_file(path),
        None => {
            for path in default_config_paths().iter().rev() {
                loader = loader.with_optional_file(path);
            }
        }
    }
    loader.load().context("loading configuration")
}

pub fn log_config(settings: &LoggingSettings, cli: &Cli) -> Result<LogConfig> {
    let format = match cli.log_format {
        Some(LogFormatArg::Text) => LogFormat::Text,
        Some(LogFormatArg::Json) => LogFormat::Json,
        None => settings
            .format
            .parse()
            .map_err(|e: String| anyhow::anyhow!("logging.format: {e}"))?,
    };
    let default_filter = match cli.verbose {
        0 => settings.filter.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    Ok(LogConfig {
        log_dir: settings.dir.clone(),
        emit_stderr: settings.stderr || cli.verbose > 0,
        format,
        default_filter,
        ..LogConfig::default()
    })
}

pub fn fetch_settings(market: &MarketSettings) -> FetchSettings {
    FetchSettings {
        search_url: market.search_url.clone(),
        timeout: Duration::from_secs(market.timeout_secs),
        user_agent: market.user_agent.clone(),
    }
}

pub fn extraction_mode(setting: ModeSetting, arg: Option<ModeArg>) -> ExtractionMode {
    match arg {
        Some(ModeArg::PriceOnly) => ExtractionMode::PriceOnly,
        Some(ModeArg::NamePriceUrl) => ExtractionMode::NamePriceUrl,
        None => match setting {
            ModeSetting::PriceOnly => ExtractionMode::PriceOnly,
            ModeSetting::NamePriceUrl => ExtractionMode::NamePriceUrl,
        },
    }
}

pub fn selector_spec(set: &SelectorSetSpec) -> SelectorSpec {
    SelectorSpec {
        version: set.version.clone(),
        item: set.item.clone(),
        name: set.name.clone(),
        price: set.price.clone(),
        url: set.url.clone(),
        thousands_separators: set.thousands_separators.clone(),
    }
}

/// The configured selector set, or `version` when given on the command line.
pub fn resolve_selector_set(
    cfg: &PriceWatchConfig,
    version: Option<&str>,
) -> Result<SelectorSetSpec> {
    let Some(version) = version else {
        return Ok(cfg.active_selector_set()?);
    };
    let sets = cfg.selector_sets();
    match sets.iter().find(|s| s.version == version) {
        Some(set) => Ok(set.clone()),
        None => bail!(
            "unknown selector set '{version}' (known: {})",
            sets.iter()
                .map(|s| s.version.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// `None` when recommendations are switched off. A missing API key with
/// recommendations on is a startup error.
pub fn build_recommender(
    llm: &LlmSettings,
    disabled: bool,
) -> Result<Option<Arc<dyn LlmClient>>> {
    if disabled || !llm.enabled {
        tracing::info!(cli_disabled = disabled, "llm.recommendation.disabled");
        return Ok(None);
    }

    let config = match llm.provider {
        LlmProvider::Gemini => {
            let Some(api_key) = llm.resolved_api_key() else {
                bail!(
                    "price recommendations need a Gemini API key: set {} or llm.api_key, \
                     or pass --no-recommend",
                    llm.api_key_env
                );
            };
            LlmConfig::Gemini {
                api_key,
                model: llm.model.clone(),
                base_url: llm.base_url.clone(),
            }
        }
    };
    let client: Arc<dyn LlmClient> = ensure_llm_ready(&config)?;
    Ok(Some(client))
}

pub fn build_pipeline(cfg: &PriceWatchConfig, args: &PipelineArgs) -> Result<Pipeline> {
    let set = resolve_selector_set(cfg, args.selectors.as_deref())?;
    let selectors = SelectorSet::compile(&selector_spec(&set))?;
    let mode = extraction_mode(cfg.extraction.mode, args.mode);
    let fetcher = Fetcher::new(fetch_settings(&cfg.market))?;
    let recommender = build_recommender(&cfg.llm, args.no_recommend)?;

    tracing::info!(
        selector_set = %set.version,
        mode = ?mode,
        search_url = %cfg.market.search_url,
        timeout_secs = cfg.market.timeout_secs,
        recommend = recommender.is_some(),
        "pipeline.ready"
    );
    Ok(Pipeline::new(
        fetcher,
        Extractor::new(selectors, mode),
        recommender,
    ))
}
