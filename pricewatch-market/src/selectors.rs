use scraper::Selector;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("selector set '{version}': invalid {field} selector '{selector}': {reason}")]
    InvalidSelector {
        version: String,
        field: &'static str,
        selector: String,
        reason: String,
    },
}

/// Uncompiled selector set, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSpec {
    pub version: String,
    pub item: String,
    pub name: String,
    pub price: String,
    pub url: String,
    pub thousands_separators: String,
}

impl SelectorSpec {
    /// Markup of the Mercado Libre listing pages as of 2024.
    pub fn mercado_libre() -> Self {
        Self {
            version: "ml-ar-2024".into(),
            item: "li.ui-search-layout__item".into(),
            name: "h2.ui-search-item__title".into(),
            price: "span.andes-money-amount__fraction".into(),
            url: "a.ui-search-item__group__element".into(),
            thousands_separators: ".".into(),
        }
    }
}

/// Compiled selectors for one markup revision.
#[derive(Debug, Clone)]
pub struct SelectorSet {
    version: String,
    pub(crate) item: Selector,
    pub(crate) name: Selector,
    pub(crate) price: Selector,
    pub(crate) url: Selector,
    pub(crate) thousands_separators: String,
}

impl SelectorSet {
    /// Parse every selector of `spec`, reporting the first invalid one.
    pub fn compile(spec: &SelectorSpec) -> Result<Self, ExtractError> {
        let parse = |field: &'static str, raw: &str| {
            Selector::parse(raw).map_err(|e| ExtractError::InvalidSelector {
                version: spec.version.clone(),
                field,
                selector: raw.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            version: spec.version.clone(),
            item: parse("item", &spec.item)?,
            name: parse("name", &spec.name)?,
            price: parse("price", &spec.price)?,
            url: parse("url", &spec.url)?,
            thousands_separators: spec.thousands_separators.clone(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}
