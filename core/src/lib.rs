//! Synchronous client core for the Patreon OAuth2 v2 API.
//!
//! # Overview
//! Builds authenticated requests with default `include` / `fields`
//! selections, executes them through a pluggable `Transport`, inlines
//! JSON:API relationships from `included`, and keeps the last 50 responses
//! in a per-client cache.
//!
//! # Design
//! - `query` renders JSON:API query strings; `resolve` inlines relationships;
//!   `cache` is the bounded FIFO response cache. None of them do I/O.
//! - `PatreonClient` owns token, endpoint, return format, cache and
//!   transport. Its `build_request` / `parse_response` halves are pure; `fetch`
//!   glues them to the transport and the cache.
//! - `UreqTransport` (feature `ureq`, on by default) is the blocking network
//!   transport. Token acquisition and refresh are the caller's concern.
//!
//! ```no_run
//! use patreon_core::{PatreonClient, Query};
//!
//! let mut client = PatreonClient::from_token("creator-access-token");
//! let campaigns = client.get_campaigns(Query::new())?;
//! println!("{:?}", campaigns.as_value());
//! # Ok::<(), patreon_core::ApiError>(())
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod resolve;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod types;

pub use cache::{cache_key, RequestCache, DEFAULT_CAPACITY};
pub use client::{user_agent, FetchOptions, PatreonClient, DEFAULT_PAGE_SIZE};
pub use config::{ClientConfig, DEFAULT_ENDPOINT};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use query::{build_query_string, Page, Query};
pub use resolve::{resolve_document, resolve_relationships, IncludedIndex, MAX_INLINE_DEPTH};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{
    ApiResponse, Linkage, ResourceIdentifier, ReturnFormat, WebhookAttributes, WebhookDocument,
};
