//! Offer extraction and ranking.
//!
//! Blocks matched by the item selector become [`Offer`]s when their price
//! normalises to an integer and, depending on [`ExtractionMode`], their name
//! and link are present. Anything else is dropped without being reported.

use crate::selectors::SelectorSet;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

/// Which fields a block must yield to count as an offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Only the price is required; name and link are kept when present.
    PriceOnly,
    /// Name, price and link are all required.
    #[default]
    NamePriceUrl,
}

/// One parsed listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Offer {
    pub name: Option<String>,
    /// Local currency units, thousands separators stripped.
    pub price: u64,
    pub url: Option<String>,
}

/// The cheapest offers of a page, ascending by price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RankedResult {
    offers: Vec<Offer>,
}

impl RankedResult {
    pub const MAX_OFFERS: usize = 10;

    /// Stable sort by price, then keep the first [`Self::MAX_OFFERS`].
    pub fn from_offers(mut offers: Vec<Offer>) -> Self {
        offers.sort_by_key(|o| o.price);
        offers.truncate(Self::MAX_OFFERS);
        Self { offers }
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Offer> {
        self.offers.iter()
    }

    pub fn into_offers(self) -> Vec<Offer> {
        self.offers
    }
}

impl<'a> IntoIterator for &'a RankedResult {
    type Item = &'a Offer;
    type IntoIter = std::slice::Iter<'a, Offer>;

    fn into_iter(self) -> Self::IntoIter {
        self.offers.iter()
    }
}

/// Strip every separator character and parse what remains as digits only.
///
/// ```
/// use pricewatch_market::extract::parse_price;
///
/// assert_eq!(parse_price(" 15.000 ", "."), Some(15000));
/// assert_eq!(parse_price("1.299,99", "."), None);
/// assert_eq!(parse_price("Consultar", "."), None);
/// ```
pub fn parse_price(raw: &str, separators: &str) -> Option<u64> {
    let cleaned: String = raw.chars().filter(|c| !separators.contains(*c)).collect();
    let digits = cleaned.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn first_text(block: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let el = block.select(selector).next()?;
    // Text nodes join with no separator: `15<!-- -->.000` is one price.
    let text = el.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

fn first_href(block: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    block
        .select(selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}

/// Extractor bound to one selector set and mode. Pure: no I/O, no state.
#[derive(Debug, Clone)]
pub struct Extractor {
    selectors: SelectorSet,
    mode: ExtractionMode,
}

impl Extractor {
    pub fn new(selectors: SelectorSet, mode: ExtractionMode) -> Self {
        Self { selectors, mode }
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    pub fn selector_version(&self) -> &str {
        self.selectors.version()
    }

    /// Every qualifying offer in document order.
    pub fn extract(&self, markup: &str) -> Vec<Offer> {
        let doc = Html::parse_document(markup);
        let s = &self.selectors;

        let mut blocks = 0usize;
        let mut offers = Vec::new();
        for block in doc.select(&s.item) {
            blocks += 1;
            let Some(price) =
                first_text(&block, &s.price).and_then(|t| parse_price(&t, &s.thousands_separators))
            else {
                continue;
            };
            let name = first_text(&block, &s.name);
            let url = first_href(&block, &s.url);

            if self.mode == ExtractionMode::NamePriceUrl && (name.is_none() || url.is_none()) {
                continue;
            }
            offers.push(Offer { name, price, url });
        }

        tracing::debug!(
            selector_set = %s.version(),
            mode = ?self.mode,
            markup_len = markup.len(),
            markup_checksum = %blake3::hash(markup.as_bytes()).to_hex(),
            blocks,
            kept = offers.len(),
            dropped = blocks - offers.len(),
            "market.extract.done"
        );
        offers
    }

    /// The ten cheapest qualifying offers; empty when nothing qualifies.
    pub fn extract_and_rank(&self, markup: &str) -> RankedResult {
        RankedResult::from_offers(self.extract(markup))
    }
}
