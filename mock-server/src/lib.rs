//! In-process imitation of the Patreon OAuth2 v2 API.
//!
//! Serves fixed JSON:API fixtures for identity, campaigns and members, and a
//! small in-memory webhook store. Every response echoes the raw query string
//! under `meta.query` so clients can check what they sent. Requests without a
//! bearer token get `401`.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, Query, RawQuery, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const API_PREFIX: &str = "/api/oauth2/v2";

pub const USER_ID: &str = "1001";
pub const CAMPAIGN_ID: &str = "4242";
pub const MEMBER_ID: &str = "m-77";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub campaign_id: String,
    pub uri: String,
    pub triggers: Vec<String>,
    pub paused: bool,
    pub secret: String,
}

impl Webhook {
    fn to_resource(&self) -> Value {
        json!({
            "type": "webhook",
            "id": self.id.to_string(),
            "attributes": {
                "uri": self.uri,
                "triggers": self.triggers,
                "paused": self.paused,
                "secret": self.secret,
                "num_consecutive_times_failed": 0
            },
            "relationships": {
                "campaign": {"data": {"type": "campaign", "id": self.campaign_id}}
            }
        })
    }
}

#[derive(Clone, Default)]
pub struct AppState {
    pub webhooks: Arc<RwLock<HashMap<Uuid, Webhook>>>,
    /// Authorized requests served so far.
    pub hits: Arc<AtomicUsize>,
}

impl AppState {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    let api = Router::new()
        .route("/identity", get(identity))
        .route("/campaigns", get(list_campaigns))
        .route("/campaigns/{id}", get(get_campaign))
        .route("/campaigns/{id}/members", get(list_campaign_members))
        .route("/members/{id}", get(get_member))
        .route("/webhooks", get(list_webhooks).post(create_webhook))
        .route("/webhooks/{id}", patch(update_webhook))
        .layer(middleware::from_fn_with_state(state.clone(), authorize));

    Router::new().nest(API_PREFIX, api).with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AppState::default()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

fn error_document(status: StatusCode, detail: &str) -> Response {
    let body = json!({
        "errors": [{"status": status.as_u16().to_string(), "detail": detail}]
    });
    (status, Json(body)).into_response()
}

async fn authorize(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty());
    if !authorized {
        return error_document(StatusCode::UNAUTHORIZED, "missing bearer token");
    }
    state.hits.fetch_add(1, Ordering::SeqCst);
    debug!(method = %request.method(), uri = %request.uri(), "serving request");
    next.run(request).await
}

fn meta(raw_query: &Option<String>) -> Value {
    json!({"query": raw_query.clone().unwrap_or_default()})
}

fn user_resource() -> Value {
    json!({
        "type": "user",
        "id": USER_ID,
        "attributes": {
            "email": "ada@example.com",
            "full_name": "Ada Lovelace",
            "vanity": "ada",
            "is_email_verified": true
        },
        "relationships": {
            "campaign": {"data": {"type": "campaign", "id": CAMPAIGN_ID}},
            "memberships": {"data": [{"type": "member", "id": MEMBER_ID}]}
        }
    })
}

fn campaign_resource(with_relationships: bool) -> Value {
    let mut campaign = json!({
        "type": "campaign",
        "id": CAMPAIGN_ID,
        "attributes": {"creation_name": "engines", "vanity": "analytical"}
    });
    if with_relationships {
        campaign["relationships"] = json!({
            "benefits": {"data": [{"type": "benefit", "id": "b-1"}]},
            "creator": {"data": {"type": "user", "id": USER_ID}},
            "goals": {"data": []},
            // t-2 is deliberately absent from `included`.
            "tiers": {"data": [{"type": "tier", "id": "t-1"}, {"type": "tier", "id": "t-2"}]}
        });
    }
    campaign
}

fn member_resource(id: &str, user_id: &str) -> Value {
    json!({
        "type": "member",
        "id": id,
        "attributes": {
            "patron_status": "active_patron",
            "currently_entitled_amount_cents": 500
        },
        "relationships": {
            "address": {"data": null},
            "campaign": {"data": {"type": "campaign", "id": CAMPAIGN_ID}},
            "user": {"data": {"type": "user", "id": user_id}},
            "currently_entitled_tiers": {"data": [{"type": "tier", "id": "t-1"}]}
        }
    })
}

fn tier_resource() -> Value {
    json!({"type": "tier", "id": "t-1", "attributes": {"title": "Supporter", "amount_cents": 500}})
}

async fn identity(RawQuery(raw): RawQuery) -> Json<Value> {
    // The campaign links back to its creator, who is `data` and not side-loaded.
    let mut campaign = campaign_resource(false);
    campaign["relationships"] = json!({"creator": {"data": {"type": "user", "id": USER_ID}}});
    Json(json!({
        "data": user_resource(),
        "included": [campaign, member_resource(MEMBER_ID, USER_ID), tier_resource()],
        "meta": meta(&raw)
    }))
}

async fn list_campaigns(RawQuery(raw): RawQuery) -> Json<Value> {
    Json(json!({
        "data": [campaign_resource(false)],
        "meta": meta(&raw)
    }))
}

async fn get_campaign(Path(id): Path<String>, RawQuery(raw): RawQuery) -> Response {
    if id != CAMPAIGN_ID {
        return error_document(StatusCode::NOT_FOUND, "campaign not found");
    }
    let mut creator = user_resource();
    creator["relationships"] = json!({});
    Json(json!({
        "data": campaign_resource(true),
        "included": [
            {"type": "benefit", "id": "b-1", "attributes": {"title": "Early access"}},
            creator,
            tier_resource()
        ],
        "meta": meta(&raw)
    }))
    .into_response()
}

async fn get_member(Path(id): Path<String>, RawQuery(raw): RawQuery) -> Response {
    if id != MEMBER_ID {
        return error_document(StatusCode::NOT_FOUND, "member not found");
    }
    let mut user = user_resource();
    user["relationships"] = json!({});
    Json(json!({
        "data": member_resource(MEMBER_ID, USER_ID),
        "included": [campaign_resource(false), user, tier_resource()],
        "meta": meta(&raw)
    }))
    .into_response()
}

const MEMBER_IDS: [&str; 3] = ["m-77", "m-78", "m-79"];

async fn list_campaign_members(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    RawQuery(raw): RawQuery,
) -> Response {
    if id != CAMPAIGN_ID {
        return error_document(StatusCode::NOT_FOUND, "campaign not found");
    }
    let size = params
        .get("page[size]")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(MEMBER_IDS.len())
        .max(1);
    let offset = params
        .get("page[cursor]")
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(0)
        .min(MEMBER_IDS.len());
    let end = offset.saturating_add(size).min(MEMBER_IDS.len());

    let members: Vec<Value> = MEMBER_IDS[offset..end]
        .iter()
        .map(|member_id| member_resource(member_id, USER_ID))
        .collect();
    let next = (end < MEMBER_IDS.len()).then(|| end.to_string());

    let mut user = user_resource();
    user["relationships"] = json!({});
    Json(json!({
        "data": members,
        "included": [user, tier_resource()],
        "meta": {
            "query": raw.unwrap_or_default(),
            "pagination": {"total": MEMBER_IDS.len(), "cursors": {"next": next}}
        }
    }))
    .into_response()
}

async fn list_webhooks(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Json<Value> {
    let webhooks = state.webhooks.read().await;
    let data: Vec<Value> = webhooks.values().map(Webhook::to_resource).collect();
    Json(json!({"data": data, "meta": meta(&raw)}))
}

#[derive(Deserialize)]
pub struct WebhookDocument {
    pub data: WebhookData,
}

#[derive(Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub attributes: WebhookAttributes,
    #[serde(default)]
    pub relationships: Option<Value>,
}

#[derive(Deserialize, Default)]
pub struct WebhookAttributes {
    pub uri: Option<String>,
    pub triggers: Option<Vec<String>>,
    pub paused: Option<bool>,
}

async fn create_webhook(State(state): State<AppState>, Json(input): Json<WebhookDocument>) -> Response {
    let campaign_id = input
        .data
        .relationships
        .as_ref()
        .and_then(|r| r.pointer("/campaign/data/id"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let (Some(campaign_id), Some(uri)) = (campaign_id, input.data.attributes.uri) else {
        return error_document(StatusCode::BAD_REQUEST, "uri and campaign are required");
    };

    let webhook = Webhook {
        id: Uuid::new_v4(),
        campaign_id,
        uri,
        triggers: input.data.attributes.triggers.unwrap_or_default(),
        paused: false,
        secret: Uuid::new_v4().simple().to_string(),
    };
    let body = json!({"data": webhook.to_resource()});
    state.webhooks.write().await.insert(webhook.id, webhook);
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn update_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<WebhookDocument>,
) -> Response {
    let mut webhooks = state.webhooks.write().await;
    let Some(webhook) = webhooks.get_mut(&id) else {
        return error_document(StatusCode::NOT_FOUND, "webhook not found");
    };
    let attributes = input.data.attributes;
    if let Some(uri) = attributes.uri {
        webhook.uri = uri;
    }
    if let Some(triggers) = attributes.triggers {
        webhook.triggers = triggers;
    }
    if let Some(paused) = attributes.paused {
        webhook.paused = paused;
    }
    Json(json!({"data": webhook.to_resource()})).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_resource_shape() {
        let webhook = Webhook {
            id: Uuid::nil(),
            campaign_id: CAMPAIGN_ID.to_string(),
            uri: "https://example.com/hook".to_string(),
            triggers: vec!["members:create".to_string()],
            paused: false,
            secret: "s".to_string(),
        };
        let json = webhook.to_resource();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["attributes"]["triggers"][0], "members:create");
        assert_eq!(json["relationships"]["campaign"]["data"]["id"], CAMPAIGN_ID);
    }

    #[test]
    fn campaign_fixture_has_dangling_tier() {
        let campaign = campaign_resource(true);
        let tiers = campaign["relationships"]["tiers"]["data"].as_array().unwrap();
        assert_eq!(tiers.len(), 2);
    }
}
