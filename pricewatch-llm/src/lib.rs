//! Provider‑agnostic text-generation integration for pricewatch.
//!
//! This crate exposes a common [`traits::LlmClient`] interface, the Gemini
//! provider implementation, and the [`recommend`] stage that turns a ranked
//! list of offers into a price-range recommendation. Clients are constructed
//! explicitly with [`ensure_llm_ready`] and handed to callers; there is no
//! process-wide client.
//!
//! # Examples
//! ```no_run
//! use pricewatch_llm::{ensure_llm_ready, LlmConfig, DEFAULT_GEMINI_MODEL};
//!
//! let cfg = LlmConfig::Gemini {
//!     api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
//!     model: DEFAULT_GEMINI_MODEL.to_string(),
//!     base_url: None,
//! };
//! let client = ensure_llm_ready(&cfg)?;
//! assert_eq!(client.model_name(), DEFAULT_GEMINI_MODEL);
//! # Ok::<(), pricewatch_common::PriceWatchError>(())
//! ```
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod recommend;
pub mod traits;

use pricewatch_common::PriceWatchError;
use std::sync::Arc;
use traits::LlmClient;

/// Default model used for price recommendations.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Which text-generation provider to construct.
#[derive(Debug, Clone)]
pub enum LlmConfig {
    #[cfg(feature = "gemini")]
    Gemini {
        api_key: String,
        model: String,
        /// Override of the public endpoint (proxies, tests).
        base_url: Option<String>,
    },
    None,
}

/// Build the configured client, failing fast on missing credentials.
pub fn ensure_llm_ready(
    config: &LlmConfig,
) -> pricewatch_common::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    match config {
        #[cfg(feature = "gemini")]
        LlmConfig::Gemini {
            api_key,
            model,
            base_url,
        } => {
            if api_key.trim().is_empty() {
                return Err(PriceWatchError::Config(
                    "Gemini API key is missing (set GEMINI_API_KEY or llm.api_key)".to_string(),
                ));
            }
            let client = match base_url {
                Some(base) => {
                    gemini::GeminiClient::with_base_url(api_key.clone(), model.clone(), base)?
                }
                None => gemini::GeminiClient::new(api_key.clone(), model.clone())?,
            };
            tracing::info!(provider = "gemini", model = %model, "llm.client.ready");
            Ok(Arc::new(client))
        }
        LlmConfig::None => Err(PriceWatchError::Config("No LLM configured".to_string())),
    }
}
