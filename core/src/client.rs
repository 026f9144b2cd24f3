//! Patreon API v2 client: URL construction, caching and response shaping.
//!
//! # Design
//! `PatreonClient` owns its access token, its response cache and a
//! `Transport`. Each call is split the same way:
//!
//! 1. `build_request` turns a path, a `Query` and an optional JSON body into
//!    an `HttpRequest` (pure, no I/O);
//! 2. the transport executes it;
//! 3. `parse_response` maps the status and shapes the body according to the
//!    return format.
//!
//! `fetch` wires the three together around the cache. Body-less GETs are
//! answered from the cache when possible. Requests with a body always go to
//! the network, but their result is still stored, keyed by the same formula
//! with the body flag set.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{cache_key, RequestCache};
use crate::config::{ClientConfig, DEFAULT_ENDPOINT};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::query::{build_query_string, Page, Query};
use crate::resolve::resolve_document;
use crate::types::{ApiResponse, ReturnFormat, WebhookDocument};

/// Page size used by the paginated helpers when the caller has no preference.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Per-call switches for `fetch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Go to the network even when a cached response exists. The result is
    /// still cached.
    pub skip_read_from_cache: bool,
    /// Override the method; otherwise POST with a body and GET without.
    /// Any override other than `Get` always reaches the network, even
    /// without a body.
    pub method: Option<HttpMethod>,
}

impl FetchOptions {
    pub fn skip_cache() -> Self {
        Self {
            skip_read_from_cache: true,
            method: None,
        }
    }

    pub fn with_method(method: HttpMethod) -> Self {
        Self {
            skip_read_from_cache: false,
            method: Some(method),
        }
    }
}

/// `User-Agent` sent with every request.
pub fn user_agent() -> String {
    format!(
        "Patreon-Rust, version {}, platform {}-{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

pub struct PatreonClient<T> {
    access_token: String,
    endpoint: String,
    return_format: ReturnFormat,
    cache: RequestCache<ApiResponse>,
    transport: T,
}

impl<T> std::fmt::Debug for PatreonClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatreonClient")
            .field("endpoint", &self.endpoint)
            .field("return_format", &self.return_format)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "ureq")]
impl PatreonClient<crate::transport::UreqTransport> {
    /// Client talking to the live API through a default ureq agent.
    pub fn from_token(access_token: &str) -> Self {
        Self::new(access_token, crate::transport::UreqTransport::new())
    }
}

impl<T: Transport> PatreonClient<T> {
    pub fn new(access_token: &str, transport: T) -> Self {
        Self {
            access_token: access_token.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            return_format: ReturnFormat::default(),
            cache: RequestCache::new(),
            transport,
        }
    }

    pub fn with_config(config: ClientConfig, transport: T) -> Self {
        Self {
            access_token: config.access_token,
            endpoint: config.endpoint,
            return_format: config.return_format,
            cache: RequestCache::new(),
            transport,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Change the API root. Path suffixes are appended verbatim, so the
    /// endpoint should end with `/`.
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = endpoint.into();
    }

    pub fn return_format(&self) -> ReturnFormat {
        self.return_format
    }

    pub fn set_return_format(&mut self, format: ReturnFormat) {
        self.return_format = format;
    }

    pub fn cache(&self) -> &RequestCache<ApiResponse> {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Endpoint, path suffix and rendered query joined into one URL.
    pub fn url_for(&self, path: &str, query: &Query) -> String {
        format!("{}{}{}", self.endpoint, path, build_query_string(query))
    }

    pub fn build_request(
        &self,
        path: &str,
        query: &Query,
        body: Option<&Value>,
        headers: &[(String, String)],
        method: Option<HttpMethod>,
    ) -> Result<HttpRequest, ApiError> {
        self.request_for(self.url_for(path, query), body, headers, method)
    }

    fn request_for(
        &self,
        url: String,
        body: Option<&Value>,
        extra_headers: &[(String, String)],
        method: Option<HttpMethod>,
    ) -> Result<HttpRequest, ApiError> {
        let method = method.unwrap_or(if body.is_some() {
            HttpMethod::Post
        } else {
            HttpMethod::Get
        });

        let mut headers = extra_headers.to_vec();
        headers.push((
            "Authorization".to_string(),
            format!("Bearer {}", self.access_token),
        ));
        headers.push(("User-Agent".to_string(), user_agent()));

        let body = match body {
            Some(value) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                let encoded = serde_json::to_string(value)
                    .map_err(|e| ApiError::SerializationError(e.to_string()))?;
                Some(encoded)
            }
            None => None,
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Map the status, then parse and normalize the body in structured mode or
    /// pass it through in raw mode.
    pub fn parse_response(&self, response: HttpResponse) -> Result<ApiResponse, ApiError> {
        check_status(&response)?;
        match self.return_format {
            ReturnFormat::RawText => Ok(ApiResponse::Raw(response.body)),
            ReturnFormat::Structured => {
                if response.body.trim().is_empty() {
                    return Ok(ApiResponse::Structured(Value::Null));
                }
                let mut document: Value = serde_json::from_str(&response.body)
                    .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
                resolve_document(&mut document);
                Ok(ApiResponse::Structured(document))
            }
        }
    }

    /// Fetch `path` with `query`, consulting and filling the cache.
    ///
    /// A failed call leaves the cache as it was.
    pub fn fetch(
        &mut self,
        path: &str,
        query: &Query,
        body: Option<&Value>,
        headers: &[(String, String)],
        options: FetchOptions,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(path, query);
        let key = cache_key(&self.access_token, &url, body.is_some());

        let reads_cache = body.is_none()
            && !options.skip_read_from_cache
            && options.method.map_or(true, |method| method == HttpMethod::Get);
        if reads_cache {
            if let Some(cached) = self.cache.lookup(&key) {
                debug!(path, "serving response from cache");
                return Ok(cached.clone());
            }
        }

        let request = self.request_for(url, body, headers, options.method)?;
        debug!(path, method = request.method.as_str(), "sending request");
        let response = self.transport.execute(request)?;
        let result = self.parse_response(response)?;

        Ok(self.cache.insert(key, result).clone())
    }

    fn fetch_with_body<B: Serialize>(
        &mut self,
        path: &str,
        body: &B,
        method: HttpMethod,
    ) -> Result<ApiResponse, ApiError> {
        let body =
            serde_json::to_value(body).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        self.fetch(
            path,
            &Query::new(),
            Some(&body),
            &[],
            FetchOptions::with_method(method),
        )
    }

    /// The user the access token belongs to, with their campaign and
    /// memberships.
    pub fn get_user(&mut self, mut query: Query) -> Result<ApiResponse, ApiError> {
        if query.include.is_empty() {
            query = query.include([
                "campaign",
                "memberships",
                "memberships.campaign",
                "memberships.currently_entitled_tiers",
            ]);
        }
        if query.fields.is_empty() {
            query = query
                .fields(
                    "user",
                    [
                        "email",
                        "first_name",
                        "full_name",
                        "image_url",
                        "last_name",
                        "thumb_url",
                        "url",
                        "vanity",
                        "is_email_verified",
                    ],
                )
                .fields(
                    "member",
                    [
                        "currently_entitled_amount_cents",
                        "lifetime_support_cents",
                        "last_charge_status",
                        "patron_status",
                        "last_charge_date",
                        "pledge_relationship_start",
                    ],
                );
        }
        self.fetch("identity", &query, None, &[], FetchOptions::default())
    }

    /// Campaigns owned by the token's user. Needs a creator token.
    pub fn get_campaigns(&mut self, mut query: Query) -> Result<ApiResponse, ApiError> {
        if query.fields.is_empty() {
            query = query.fields("campaign", ["creation_name"]);
        }
        self.fetch("campaigns", &query, None, &[], FetchOptions::default())
    }

    /// One campaign with its benefits, creator, goals and tiers.
    pub fn get_campaign(
        &mut self,
        campaign_id: &str,
        mut query: Query,
    ) -> Result<ApiResponse, ApiError> {
        if query.include.is_empty() {
            query = query.include(["benefits", "creator", "goals", "tiers"]);
        }
        if query.fields.is_empty() {
            query = query.fields("campaign", ["creation_name", "vanity"]);
        }
        self.fetch(
            &format!("campaigns/{campaign_id}"),
            &query,
            None,
            &[],
            FetchOptions::default(),
        )
    }

    /// One campaign member. `currently_entitled_tiers` tells which tiers the
    /// member is entitled to.
    pub fn get_member(&mut self, member_id: &str, mut query: Query) -> Result<ApiResponse, ApiError> {
        if query.include.is_empty() {
            query = query.include(["address", "campaign", "user", "currently_entitled_tiers"]);
        }
        self.fetch(
            &format!("members/{member_id}"),
            &query,
            None,
            &[],
            FetchOptions::default(),
        )
    }

    /// One page of a campaign's members. The query's page is replaced by
    /// `page_size` and `page_cursor`; a zero size or empty cursor is left out.
    pub fn get_campaign_members(
        &mut self,
        campaign_id: &str,
        mut query: Query,
        page_size: u32,
        page_cursor: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        query.page = Page::new(page_size, page_cursor).normalized();
        self.fetch(
            &format!("campaigns/{campaign_id}/members"),
            &query,
            None,
            &[],
            FetchOptions::default(),
        )
    }

    pub fn get_webhooks(
        &mut self,
        mut query: Query,
        page_size: u32,
        page_cursor: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        query.page = Page::new(page_size, page_cursor).normalized();
        if query.fields.is_empty() {
            query = query.fields("webhook", ["uri", "secret", "paused", "triggers"]);
        }
        self.fetch("webhooks", &query, None, &[], FetchOptions::default())
    }

    /// Register a webhook for `campaign_id` that fires on `triggers`
    /// (e.g. `members:create`).
    pub fn create_webhook(
        &mut self,
        campaign_id: &str,
        uri: &str,
        triggers: &[&str],
    ) -> Result<ApiResponse, ApiError> {
        let document = WebhookDocument::create(campaign_id, uri, triggers);
        self.fetch_with_body("webhooks", &document, HttpMethod::Post)
    }

    /// Change a webhook. Only a non-empty `uri`, non-empty `triggers` and a
    /// given `paused` are sent.
    pub fn update_webhook(
        &mut self,
        webhook_id: &str,
        uri: &str,
        triggers: &[&str],
        paused: Option<bool>,
    ) -> Result<ApiResponse, ApiError> {
        let document = WebhookDocument::update(webhook_id, uri, triggers, paused);
        self.fetch_with_body(&format!("webhooks/{webhook_id}"), &document, HttpMethod::Patch)
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    warn!(status = response.status, "request failed");
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}
