//! Price-range recommendation stage.
//!
//! Turns the ranked offers for a query into a natural-language prompt, asks
//! the injected [`LlmClient`] for a recommendation, and converts every
//! provider failure into a message the front end can print as-is.

use crate::traits::LlmClient;
use pricewatch_common::PriceWatchError;

pub const RECOMMENDATION_SYSTEM_PROMPT: &str = "You are a pricing assistant for an online marketplace. \
Given the cheapest listings found for an item, recommend a fair price range in the same currency \
and explain the choice in two or three sentences. Do not invent listings that are not in the list.";

const RECOMMENDATION_MAX_TOKENS: u32 = 400;
const RECOMMENDATION_TEMPERATURE: f32 = 0.4;

/// One ranked listing as seen by the prompt builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePoint<'a> {
    pub price: u64,
    pub name: Option<&'a str>,
}

/// Free text returned by the model. Opaque: nothing is parsed out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub text: String,
    pub model: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum RecommendationFailure {
    #[error("{0}")]
    Provider(#[from] PriceWatchError),

    #[error("the model returned an empty answer")]
    EmptyAnswer,
}

impl RecommendationFailure {
    /// Message shown to the user in place of a recommendation.
    pub fn user_message(&self) -> String {
        format!("Could not get a price recommendation: {self}")
    }
}

/// Build the prompt embedding the query, the optional current price and the
/// `(price, name)` pairs in ranked order.
///
/// ```
/// use pricewatch_llm::recommend::{build_prompt, PricePoint};
///
/// let prompt = build_prompt(
///     "bicicleta rodado 29",
///     &[PricePoint { price: 350000, name: Some("Bici MTB") }],
///     None,
/// );
/// assert!(prompt.contains("bicicleta rodado 29"));
/// assert!(prompt.contains("1. $350000 - Bici MTB"));
/// ```
pub fn build_prompt(query: &str, offers: &[PricePoint<'_>], current_price: Option<u64>) -> String {
    let listing = offers
        .iter()
        .enumerate()
        .map(|(i, offer)| match offer.name {
            Some(name) => format!("{}. ${} - {}", i + 1, offer.price, name),
            None => format!("{}. ${}", i + 1, offer.price),
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "ITEM: \"{}\"\n\nCHEAPEST LISTINGS FOUND ({} shown, prices in local currency):\n{}\n",
        query.trim(),
        offers.len(),
        listing
    );
    if let Some(current) = current_price {
        prompt.push_str(&format!("\nMY CURRENT PRICE: ${current}\n"));
        prompt.push_str(
            "\nIs my current price competitive? Recommend a price range to use for this item.",
        );
    } else {
        prompt.push_str("\nRecommend a price range to pay for this item.");
    }
    prompt
}

/// Ask the model for a recommendation. Errors are returned to the caller.
pub async fn get_recommendation(
    llm: &dyn LlmClient,
    prompt: &str,
) -> Result<Recommendation, RecommendationFailure> {
    let resp = llm
        .generate(
            prompt,
            Some(RECOMMENDATION_SYSTEM_PROMPT),
            Some(RECOMMENDATION_MAX_TOKENS),
            Some(RECOMMENDATION_TEMPERATURE),
        )
        .await?;

    let text = resp.text.trim();
    if text.is_empty() {
        return Err(RecommendationFailure::EmptyAnswer);
    }
    Ok(Recommendation {
        text: text.to_string(),
        model: resp.model,
    })
}

/// Full stage: `None` when there is nothing to recommend on, otherwise the
/// model's text or a user-visible fallback message. Never fails.
pub async fn recommend_or_fallback(
    llm: &dyn LlmClient,
    query: &str,
    offers: &[PricePoint<'_>],
    current_price: Option<u64>,
) -> Option<String> {
    if offers.is_empty() {
        return None;
    }

    let prompt = build_prompt(query, offers, current_price);
    match get_recommendation(llm, &prompt).await {
        Ok(rec) => {
            tracing::info!(query, model = ?rec.model, chars = rec.text.len(), "llm.recommendation.ok");
            Some(rec.text)
        }
        Err(err) => {
            tracing::warn!(query, error = %err, "llm.recommendation.failed");
            Some(err.user_message())
        }
    }
}
