//! Marketplace search scraping: fetch, extract, rank.
//!
//! - [`fetch`]: one GET per query against the search-listing URL template
//! - [`selectors`]: versioned CSS selector sets describing the result markup
//! - [`extract`]: offer extraction, price normalisation and top-10 ranking
//!
//! The selector set is the single point of variation between markup
//! revisions; nothing in [`extract`] assumes a particular class name.

pub mod extract;
pub mod fetch;
pub mod selectors;

pub use extract::{ExtractionMode, Extractor, Offer, RankedResult};
pub use fetch::{FetchFailure, FetchSettings, Fetcher};
pub use selectors::{ExtractError, SelectorSet, SelectorSpec};
