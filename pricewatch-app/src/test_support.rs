use crate::pipeline::Pipeline;
use async_trait::async_trait;
use pricewatch_common::{PriceWatchError, Result};
use pricewatch_llm::traits::{LlmClient, LlmResponse};
use pricewatch_market::{
    ExtractionMode, Extractor, FetchSettings, Fetcher, SelectorSet, SelectorSpec,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::MockServer;

/// Scripted client: counts calls, keeps the last prompt, replays one answer.
pub struct ScriptedLlm {
    answer: std::result::Result<&'static str, &'static str>,
    pub calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedLlm {
    pub fn ok(text: &'static str) -> Self {
        Self {
            answer: Ok(text),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing(msg: &'static str) -> Self {
        Self {
            answer: Err(msg),
            ..Self::ok("")
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        match self.answer {
            Ok(text) => Ok(LlmResponse {
                text: text.to_string(),
                model: Some("scripted".into()),
                tokens_used: None,
            }),
            Err(msg) => Err(PriceWatchError::Llm(msg.to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Listing page in the default markup, one linked block per `(name, price)`.
pub fn listing_page(items: &[(&str, &str)]) -> String {
    let blocks: String = items
        .iter()
        .enumerate()
        .map(|(i, (name, price))| {
            format!(
                r#"<li class="ui-search-layout__item">
  <a class="ui-search-item__group__element" href="https://articulo.mercadolibre.com.ar/MLA-{i}">
    <h2 class="ui-search-item__title">{name}</h2>
  </a>
  <span class="andes-money-amount__fraction">{price}</span>
</li>"#
            )
        })
        .collect();
    format!("<html><body><ol class=\"ui-search-layout\">{blocks}</ol></body></html>")
}

pub fn pipeline_for(
    server: &MockServer,
    llm: Option<Arc<ScriptedLlm>>,
    timeout: Duration,
) -> Pipeline {
    let fetcher = Fetcher::new(FetchSettings {
        search_url: format!("{}/{{query}}", server.uri()),
        timeout,
        ..FetchSettings::default()
    })
    .unwrap();
    let extractor = Extractor::new(
        SelectorSet::compile(&SelectorSpec::mercado_libre()).unwrap(),
        ExtractionMode::NamePriceUrl,
    );
    Pipeline::new(
        fetcher,
        extractor,
        llm.map(|l| l as Arc<dyn LlmClient>),
    )
}
