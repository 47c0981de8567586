use pricewatch_http::{HttpClient, HttpError, RequestOpts};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

pub const DEFAULT_SEARCH_URL: &str = "https://listado.mercadolibre.com.ar/{query}";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const QUERY_PLACEHOLDER: &str = "{query}";

#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("empty query")]
    EmptyQuery,

    #[error("invalid search URL: {0}")]
    InvalidUrl(String),

    #[error("fetching {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: HttpError,
    },
}

impl FetchFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_timeout())
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Listing URL template; must contain `{query}`.
    pub search_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Turn free text into a listing path segment: trimmed, inner whitespace
/// collapsed to single hyphens, and characters that would end the path
/// segment escaped. Non-ASCII letters are left for the URL parser to encode.
/// A slug of nothing but dots would resolve as a `.`/`..` path segment, so it
/// comes back empty.
///
/// ```
/// use pricewatch_market::fetch::slugify;
///
/// assert_eq!(slugify("  zapatillas  running "), "zapatillas-running");
/// assert_eq!(slugify("50% off/usado"), "50%25-off%2Fusado");
/// ```
pub fn slugify(query: &str) -> String {
    let joined = query.split_whitespace().collect::<Vec<_>>().join("-");
    if joined.chars().all(|c| c == '.') {
        return String::new();
    }
    let mut out = String::with_capacity(joined.len());
    for c in joined.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            '?' => out.push_str("%3F"),
            '#' => out.push_str("%23"),
            _ => out.push(c),
        }
    }
    out
}

/// One GET per query against the listing template. No retries.
#[derive(Clone)]
pub struct Fetcher {
    http: HttpClient,
    template: String,
    headers: HeaderMap,
}

impl Fetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchFailure> {
        if !settings.search_url.contains(QUERY_PLACEHOLDER) {
            return Err(FetchFailure::InvalidUrl(format!(
                "'{}' has no {QUERY_PLACEHOLDER} placeholder",
                settings.search_url
            )));
        }

        let base = settings.search_url.replace(QUERY_PLACEHOLDER, "");
        let http = HttpClient::with_connect_timeout(&base, settings.timeout)
            .map_err(|e| FetchFailure::InvalidUrl(e.to_string()))?
            .with_timeout(settings.timeout);

        let mut headers = HeaderMap::new();
        let ua = HeaderValue::from_str(&settings.user_agent)
            .map_err(|e| FetchFailure::InvalidUrl(format!("user agent: {e}")))?;
        headers.insert(USER_AGENT, ua);

        Ok(Self {
            http,
            template: settings.search_url,
            headers,
        })
    }

    /// Concrete listing URL for `query`.
    pub fn search_url(&self, query: &str) -> Result<Url, FetchFailure> {
        let slug = slugify(query);
        if slug.is_empty() {
            return Err(FetchFailure::EmptyQuery);
        }
        let raw = self.template.replace(QUERY_PLACEHOLDER, &slug);
        Url::parse(&raw).map_err(|e| FetchFailure::InvalidUrl(format!("{raw}: {e}")))
    }

    /// Raw listing markup for `query`.
    pub async fn fetch(&self, query: &str) -> Result<String, FetchFailure> {
        let url = self.search_url(query)?;
        let started = Instant::now();
        tracing::info!(query, url = %url, "market.fetch.start");

        let opts = RequestOpts {
            headers: Some(self.headers.clone()),
            allow_absolute: true,
            ..Default::default()
        };
        match self.http.get_text(url.as_str(), opts).await {
            Ok(body) => {
                tracing::info!(
                    query,
                    bytes = body.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "market.fetch.ok"
                );
                Ok(body)
            }
            Err(source) => {
                tracing::warn!(
                    query,
                    timeout = source.is_timeout(),
                    status = ?source.status(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %source,
                    "market.fetch.failed"
                );
                Err(FetchFailure::Transport {
                    url: url.to_string(),
                    source,
                })
            }
        }
    }
}
