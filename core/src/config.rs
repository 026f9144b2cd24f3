//! Client configuration.
//!
//! Token acquisition and refresh happen upstream; the client only needs the
//! bearer string. `from_env` reads:
//!
//! - `PATREON_ACCESS_TOKEN` (required)
//! - `PATREON_API_ENDPOINT` (defaults to the v2 API root)
//! - `PATREON_RETURN_FORMAT`: `structured` or `raw`

use crate::error::ApiError;
use crate::types::ReturnFormat;

/// Root of the Patreon OAuth2 v2 API. Path suffixes are appended directly.
pub const DEFAULT_ENDPOINT: &str = "https://www.patreon.com/api/oauth2/v2/";

pub const ENV_ACCESS_TOKEN: &str = "PATREON_ACCESS_TOKEN";
pub const ENV_ENDPOINT: &str = "PATREON_API_ENDPOINT";
pub const ENV_RETURN_FORMAT: &str = "PATREON_RETURN_FORMAT";

#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub access_token: String,
    pub endpoint: String,
    pub return_format: ReturnFormat,
}

// Keeps the token out of logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("return_format", &self.return_format)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            return_format: ReturnFormat::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn return_format(mut self, format: ReturnFormat) -> Self {
        self.return_format = format;
        self
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; `from_env` uses the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(ENV_ACCESS_TOKEN)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::Config(format!("{ENV_ACCESS_TOKEN} is not set")))?;

        let mut config = Self::new(token.trim());
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|e| !e.is_empty()) {
            config.endpoint = endpoint;
        }
        if let Some(format) = lookup(ENV_RETURN_FORMAT) {
            config.return_format = parse_return_format(&format)?;
        }
        Ok(config)
    }
}

fn parse_return_format(value: &str) -> Result<ReturnFormat, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "structured" | "array" | "json" => Ok(ReturnFormat::Structured),
        "raw" | "raw-text" | "text" => Ok(ReturnFormat::RawText),
        other => Err(ApiError::Config(format!(
            "{ENV_RETURN_FORMAT} must be `structured` or `raw`, got `{other}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_ACCESS_TOKEN, "abc")])).unwrap();
        assert_eq!(config.access_token, "abc");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.return_format, ReturnFormat::Structured);
    }

    #[test]
    fn missing_token_is_config_error() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
        let err = ClientConfig::from_lookup(lookup(&[(ENV_ACCESS_TOKEN, "  ")])).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn endpoint_and_format_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_ACCESS_TOKEN, "abc"),
            (ENV_ENDPOINT, "http://127.0.0.1:3000/api/oauth2/v2/"),
            (ENV_RETURN_FORMAT, "RAW"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "http://127.0.0.1:3000/api/oauth2/v2/");
        assert_eq!(config.return_format, ReturnFormat::RawText);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[
            (ENV_ACCESS_TOKEN, "abc"),
            (ENV_RETURN_FORMAT, "xml"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn debug_redacts_token() {
        let config = ClientConfig::new("secret-token");
        assert!(!format!("{config:?}").contains("secret-token"));
    }
}
