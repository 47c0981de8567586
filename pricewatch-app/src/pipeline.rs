use pricewatch_llm::recommend::{PricePoint, recommend_or_fallback};
use pricewatch_llm::traits::LlmClient;
use pricewatch_market::{Extractor, FetchFailure, Fetcher, RankedResult};
use std::sync::Arc;

/// Result of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub ranked: RankedResult,
    /// `None` when recommendations are off or nothing was found.
    pub recommendation: Option<String>,
}

/// Fetch, extract, and optionally recommend, strictly in sequence.
pub struct Pipeline {
    fetcher: Fetcher,
    extractor: Extractor,
    recommender: Option<Arc<dyn LlmClient>>,
}

impl Pipeline {
    pub fn new(
        fetcher: Fetcher,
        extractor: Extractor,
        recommender: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            recommender,
        }
    }

    pub fn recommends(&self) -> bool {
        self.recommender.is_some()
    }

    /// A fetch failure returns before any parsing or text generation.
    pub async fn run(
        &self,
        query: &str,
        current_price: Option<u64>,
    ) -> Result<Outcome, FetchFailure> {
        let query = query.trim();
        let markup = self.fetcher.fetch(query).await?;
        let ranked = self.extractor.extract_and_rank(&markup);

        let recommendation = match &self.recommender {
            Some(llm) if !ranked.is_empty() => {
                let points: Vec<PricePoint<'_>> = ranked
                    .iter()
                    .map(|o| PricePoint {
                        price: o.price,
                        name: o.name.as_deref(),
                    })
                    .collect();
                recommend_or_fallback(llm.as_ref(), query, &points, current_price).await
            }
            _ => None,
        };

        tracing::info!(
            query,
            offers = ranked.len(),
            cheapest = ranked.offers().first().map(|o| o.price),
            recommended = recommendation.is_some(),
            "pipeline.run.done"
        );
        Ok(Outcome {
            ranked,
            recommendation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedLlm, listing_page, pipeline_for};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn ranks_and_recommends() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/termo-stanley"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[
                ("Termo Stanley 1L", "120.000"),
                ("Termo Stanley 750ml", "95.500"),
            ])))
            .mount(&server)
            .await;

        let llm = Arc::new(ScriptedLlm::ok("Pay between $95.000 and $110.000."));
        let pipeline = pipeline_for(&server, Some(llm.clone()), Duration::from_secs(5));

        let outcome = pipeline.run(" termo stanley ", Some(130000)).await.unwrap();
        let prices: Vec<u64> = outcome.ranked.iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![95500, 120000]);
        assert_eq!(
            outcome.recommendation.as_deref(),
            Some("Pay between $95.000 and $110.000.")
        );

        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("1. $95500 - Termo Stanley 750ml"));
        assert!(prompt.contains("MY CURRENT PRICE: $130000"));
    }

    #[tokio::test]
    async fn timeout_skips_parsing_and_recommendation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(listing_page(&[("Mate", "5.000")]))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&server)
            .await;

        let llm = Arc::new(ScriptedLlm::ok("unused"));
        let pipeline = pipeline_for(&server, Some(llm.clone()), Duration::from_millis(100));

        let err = pipeline.run("mate", None).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_page_never_reaches_the_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
            .mount(&server)
            .await;

        let llm = Arc::new(ScriptedLlm::ok("unused"));
        let pipeline = pipeline_for(&server, Some(llm.clone()), Duration::from_secs(5));

        let outcome = pipeline.run("nada", None).await.unwrap();
        assert!(outcome.ranked.is_empty());
        assert_eq!(outcome.recommendation, None);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_failure_becomes_a_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_page(&[("Mate", "5.000")])),
            )
            .mount(&server)
            .await;

        let llm = Arc::new(ScriptedLlm::failing("quota exceeded"));
        let pipeline = pipeline_for(&server, Some(llm), Duration::from_secs(5));

        let outcome = pipeline.run("mate", None).await.unwrap();
        assert_eq!(outcome.ranked.len(), 1);
        let text = outcome.recommendation.unwrap();
        assert!(text.starts_with("Could not get a price recommendation"), "{text}");
        assert!(text.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn no_recommender_means_no_recommendation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_page(&[("Mate", "5.000")])),
            )
            .mount(&server)
            .await;

        let pipeline = pipeline_for(&server, None, Duration::from_secs(5));
        assert!(!pipeline.recommends());
        let outcome = pipeline.run("mate", None).await.unwrap();
        assert_eq!(outcome.ranked.len(), 1);
        assert_eq!(outcome.recommendation, None);
    }
}
