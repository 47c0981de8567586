//! Common types and utilities shared across pricewatch crates.
//!
//! This crate defines the shared error type and the observability helpers
//! used throughout the workspace. It is intentionally lightweight so that
//! every crate can depend on it without introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`PriceWatchError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use pricewatch_common::PriceWatchError;
//!
//! let err = PriceWatchError::Config("llm.api_key is empty".into());
//! assert_eq!(err.to_string(), "Configuration error: llm.api_key is empty");
//! ```

pub mod observability;

/// Error types used across the pricewatch system.
#[derive(thiserror::Error, Debug)]
pub enum PriceWatchError {
    /// A text-generation provider failed or returned an unusable answer.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other failure bubbled up from a collaborator.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`PriceWatchError`].
pub type Result<T> = std::result::Result<T, PriceWatchError>;
