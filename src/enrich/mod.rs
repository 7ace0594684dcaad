//! Best-effort profile image enrichment.
//!
//! When an agent record is created, the directory tries to find a photo of
//! the agent on the agent's own website. The work is split into:
//!
//! - **[`fetch`]**: retrieves a page over HTTP with a bounded timeout.
//! - **[`resolve`]**: parses the markup, picks the first `<img>` whose
//!   `alt` text mentions the agent's name, and makes its `src` absolute.
//! - **[`search`]**: the secondary "search the web" strategy. Only a stub
//!   provider ships today.
//! - **[`pipeline`]**: the state machine that chains the strategies and
//!   absorbs every failure.
//!
//! # State machine
//!
//! ```text
//! START ──▶ TRY_WEBSITE ──▶ FOUND
//!   │            │
//!   │ (no site)  │ (fetch / parse failure, no match)
//!   ▼            ▼
//!   └──────▶ TRY_SEARCH ──▶ FOUND | NOT_FOUND
//! ```
//!
//! Enrichment never fails its caller: the only observable effect is the
//! presence or absence of a profile image URL.

pub mod fetch;
pub mod limits;
pub mod pipeline;
pub mod resolve;
pub mod search;

use thiserror::Error;

pub use fetch::{FetchedPage, Fetcher, HttpFetcher};
pub use pipeline::{EnrichmentRequest, Pipeline, PipelineOptions, Resolution, Stage, Strategy};
pub use resolve::{resolve, CandidateImage};
pub use search::{search_query, ImageSearch, NoImageSearch};

/// Why a strategy produced no image. The pipeline logs these and moves on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnrichError {
    /// Timeout, connection error, or a non-2xx response.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The markup or base URL could not be used.
    #[error("parse failed: {0}")]
    Parse(String),

    /// No image element mentioned any token of the name.
    #[error("no image matched '{0}'")]
    NoMatch(String),
}
