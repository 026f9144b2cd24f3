//! Error types for the Patreon API client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the resource does not exist" from "the server returned an unexpected
//! status." All other non-2xx responses land in `HttpError` with the raw
//! status code and body for debugging. Relationship inlining has no variant:
//! it never fails.

use thiserror::Error;

/// Errors returned by `PatreonClient` and the transports it drives.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The transport could not complete the exchange (DNS, TLS, socket...).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The server returned 404 — the requested resource does not exist.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body was not valid JSON in structured mode.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// Client configuration was missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}
