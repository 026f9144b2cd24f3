//! JSON:API shapes used by the client.
//!
//! # Design
//! Responses stay `serde_json::Value`: inlining rewrites `relationships` from
//! linkage stubs into full resources, so no fixed struct describes both
//! sides. Linkage is classified into `Linkage` at the point of use. Request
//! documents for webhooks are typed and serialized with serde.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource type name used in webhook documents.
pub const WEBHOOK_TYPE: &str = "webhook";

/// A `{type, id}` pair identifying one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ResourceIdentifier {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Read `type` and `id` from a resource or linkage object. Numeric ids are
    /// accepted and rendered as strings.
    pub fn from_value(value: &Value) -> Option<Self> {
        let kind = value.get("type")?.as_str()?;
        let id = match value.get("id")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self::new(kind, id))
    }
}

/// The `data` member of one relationship, before inlining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linkage {
    One(ResourceIdentifier),
    /// To-many linkage. Entries without a usable `type`/`id` are dropped.
    Many(Vec<ResourceIdentifier>),
    Empty,
}

impl Linkage {
    /// Classify a relationship object such as `{"data": {"type": .., "id": ..}}`.
    pub fn from_relationship(relationship: &Value) -> Self {
        match relationship.get("data") {
            Some(Value::Array(items)) if !items.is_empty() => {
                Linkage::Many(items.iter().filter_map(ResourceIdentifier::from_value).collect())
            }
            Some(data) if data.as_object().is_some_and(|obj| !obj.is_empty()) => {
                match ResourceIdentifier::from_value(data) {
                    Some(ident) => Linkage::One(ident),
                    None => Linkage::Empty,
                }
            }
            _ => Linkage::Empty,
        }
    }
}

/// How `PatreonClient` hands response bodies back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnFormat {
    /// Parse JSON, inline relationships, drop `included`.
    #[default]
    Structured,
    /// Return the body text untouched.
    RawText,
}

/// A fetched (and possibly cached) response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Structured(Value),
    Raw(String),
}

impl ApiResponse {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ApiResponse::Structured(v) => Some(v),
            ApiResponse::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            ApiResponse::Structured(_) => None,
            ApiResponse::Raw(s) => Some(s),
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            ApiResponse::Structured(v) => Some(v),
            ApiResponse::Raw(_) => None,
        }
    }
}

/// Top-level request document for webhook create/update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDocument {
    pub data: WebhookResource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: WebhookAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<WebhookRelationships>,
}

/// Webhook attributes. Absent members are left out of the JSON entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRelationships {
    pub campaign: Relationship,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub data: ResourceIdentifier,
}

impl WebhookDocument {
    /// Document for `POST webhooks`: triggers and uri are always sent.
    pub fn create(campaign_id: &str, uri: &str, triggers: &[&str]) -> Self {
        Self {
            data: WebhookResource {
                id: None,
                kind: WEBHOOK_TYPE.to_string(),
                attributes: WebhookAttributes {
                    triggers: Some(owned(triggers)),
                    uri: Some(uri.to_string()),
                    paused: None,
                },
                relationships: Some(WebhookRelationships {
                    campaign: Relationship {
                        data: ResourceIdentifier::new("campaign", campaign_id),
                    },
                }),
            },
        }
    }

    /// Document for `PATCH webhooks/{id}`: an empty uri, empty triggers and
    /// `None` paused are omitted so the server leaves them unchanged.
    pub fn update(webhook_id: &str, uri: &str, triggers: &[&str], paused: Option<bool>) -> Self {
        Self {
            data: WebhookResource {
                id: Some(webhook_id.to_string()),
                kind: WEBHOOK_TYPE.to_string(),
                attributes: WebhookAttributes {
                    triggers: (!triggers.is_empty()).then(|| owned(triggers)),
                    uri: (!uri.is_empty()).then(|| uri.to_string()),
                    paused,
                },
                relationships: None,
            },
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
