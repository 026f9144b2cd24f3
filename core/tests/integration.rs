//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every resource
//! helper over real HTTP through `UreqTransport`. The server's hit counter
//! shows which calls were answered from the client cache.

use mock_server::{AppState, API_PREFIX, CAMPAIGN_ID, MEMBER_ID, USER_ID};
use patreon_core::{
    ApiError, FetchOptions, PatreonClient, Query, ReturnFormat, UreqTransport, DEFAULT_PAGE_SIZE,
};
use serde_json::Value;

/// Spawn the mock server on its own runtime thread; returns its state and
/// the API root to point a client at.
fn start_server() -> (AppState, String) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let state = AppState::default();
    let server_state = state.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with_state(listener, server_state).await
        })
        .unwrap();
    });

    (state, format!("http://{addr}{API_PREFIX}/"))
}

fn client(endpoint: &str) -> PatreonClient<UreqTransport> {
    let mut client = PatreonClient::new("integration-token", UreqTransport::new());
    client.set_endpoint(endpoint);
    client
}

fn value(response: patreon_core::ApiResponse) -> Value {
    response.into_value().expect("structured response")
}

#[test]
fn resource_helpers_and_cache() {
    let (state, endpoint) = start_server();
    let mut client = client(&endpoint);

    // identity: default include and fields reach the server; relationships
    // come back inlined.
    let user = value(client.get_user(Query::new()).unwrap());
    let query = user["meta"]["query"].as_str().unwrap();
    assert!(query.starts_with(
        "include=campaign,memberships,memberships.campaign,memberships.currently_entitled_tiers"
    ));
    assert!(query.contains("fields%5Bmember%5D=currently_entitled_amount_cents"));
    assert!(user.get("included").is_none());
    let membership = &user["data"]["relationships"]["memberships"][MEMBER_ID];
    assert_eq!(
        membership["relationships"]["currently_entitled_tiers"]["t-1"]["attributes"]["title"],
        "Supporter"
    );
    assert_eq!(user["data"]["relationships"]["campaign"]["id"], CAMPAIGN_ID);
    assert_eq!(
        user["data"]["relationships"]["campaign"]["relationships"]["creator"],
        serde_json::json!({})
    );
    assert_eq!(state.hits(), 1);

    // Same call again is served from the cache.
    let again = value(client.get_user(Query::new()).unwrap());
    assert_eq!(again, user);
    assert_eq!(state.hits(), 1);

    // Bypassing the cache read goes back to the server.
    client
        .fetch("identity", &Query::new(), None, &[], FetchOptions::skip_cache())
        .unwrap();
    assert_eq!(state.hits(), 2);

    // campaign: dangling tier dropped, empty goals become {}.
    let campaign = value(client.get_campaign(CAMPAIGN_ID, Query::new()).unwrap());
    assert_eq!(
        campaign["meta"]["query"],
        "include=benefits,creator,goals,tiers&fields%5Bcampaign%5D=creation_name,vanity"
    );
    let rels = &campaign["data"]["relationships"];
    assert_eq!(rels["tiers"].as_object().unwrap().len(), 1);
    assert_eq!(rels["goals"], serde_json::json!({}));
    assert_eq!(rels["creator"]["id"], USER_ID);
    assert_eq!(rels["benefits"]["b-1"]["attributes"]["title"], "Early access");

    // campaigns list keeps its (relationship-free) data untouched.
    let campaigns = value(client.get_campaigns(Query::new()).unwrap());
    assert_eq!(campaigns["data"][0]["attributes"]["creation_name"], "engines");
    assert_eq!(campaigns["meta"]["query"], "fields%5Bcampaign%5D=creation_name");

    // member: null address linkage resolves to {}.
    let member = value(client.get_member(MEMBER_ID, Query::new()).unwrap());
    assert_eq!(member["data"]["relationships"]["address"], serde_json::json!({}));
    assert_eq!(member["data"]["relationships"]["user"]["id"], USER_ID);

    let err = client.get_member("nobody", Query::new()).unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
}

#[test]
fn campaign_members_pagination() {
    let (_state, endpoint) = start_server();
    let mut client = client(&endpoint);

    let first = value(
        client
            .get_campaign_members(CAMPAIGN_ID, Query::new(), 2, None)
            .unwrap(),
    );
    assert_eq!(first["meta"]["query"], "page%5Bsize%5D=2");
    assert_eq!(first["data"].as_array().unwrap().len(), 2);
    assert_eq!(first["data"][0]["relationships"]["user"]["id"], USER_ID);

    let cursor = first["meta"]["pagination"]["cursors"]["next"]
        .as_str()
        .unwrap()
        .to_string();
    let second = value(
        client
            .get_campaign_members(CAMPAIGN_ID, Query::new(), 2, Some(cursor.as_str()))
            .unwrap(),
    );
    assert_eq!(second["data"].as_array().unwrap().len(), 1);
    assert!(second["meta"]["pagination"]["cursors"]["next"].is_null());

    let all = value(
        client
            .get_campaign_members(CAMPAIGN_ID, Query::new(), DEFAULT_PAGE_SIZE, None)
            .unwrap(),
    );
    assert_eq!(all["data"].as_array().unwrap().len(), 3);
}

#[test]
fn webhook_lifecycle() {
    let (_state, endpoint) = start_server();
    let mut client = client(&endpoint);

    let created = value(
        client
            .create_webhook(CAMPAIGN_ID, "https://example.com/hook", &["members:create"])
            .unwrap(),
    );
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["attributes"]["triggers"][0], "members:create");
    assert_eq!(
        created["data"]["relationships"]["campaign"]["data"]["id"],
        CAMPAIGN_ID
    );

    let updated = value(
        client
            .update_webhook(&id, "", &["members:update"], Some(true))
            .unwrap(),
    );
    assert_eq!(updated["data"]["attributes"]["uri"], "https://example.com/hook");
    assert_eq!(updated["data"]["attributes"]["paused"], true);
    assert_eq!(updated["data"]["attributes"]["triggers"][0], "members:update");

    let listed = value(client.get_webhooks(Query::new(), DEFAULT_PAGE_SIZE, None).unwrap());
    assert_eq!(
        listed["meta"]["query"],
        "fields%5Bwebhook%5D=uri,secret,paused,triggers&page%5Bsize%5D=50"
    );
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    assert_eq!(listed["data"][0]["id"], id.as_str());
}

#[test]
fn raw_text_mode_passes_body_through() {
    let (_state, endpoint) = start_server();
    let mut client = client(&endpoint);
    client.set_return_format(ReturnFormat::RawText);

    let raw = client.get_campaigns(Query::new()).unwrap();
    let body = raw.as_raw().unwrap();
    let parsed: Value = serde_json::from_str(body).unwrap();
    assert_eq!(parsed["data"][0]["id"], CAMPAIGN_ID);
}

#[test]
fn rejected_token_is_http_error() {
    let (state, endpoint) = start_server();

    let mut anonymous = PatreonClient::new("", UreqTransport::new());
    anonymous.set_endpoint(&endpoint);
    let err = anonymous.get_campaigns(Query::new()).unwrap_err();
    assert!(matches!(err, ApiError::HttpError { status: 401, .. }));
    assert!(anonymous.cache().is_empty());
    assert_eq!(state.hits(), 0);
}

#[test]
fn unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = client(&format!("http://{addr}{API_PREFIX}/"));
    let err = client.get_campaigns(Query::new()).unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert!(client.cache().is_empty());
}
