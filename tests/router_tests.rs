use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use kb_integrations::models::ProviderType;
use kb_integrations::oauth::{GitHubOAuth, GoogleOAuth, OAuthFlow};
use kb_integrations::providers::Registry;
use kb_integrations::providers::google_drive::GoogleDriveAdapter;
use kb_integrations::providers::slack::SlackAdapter;
use kb_integrations::server::{AppState, create_app};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header as header_eq, method, path, query_param},
};

mod test_utils;
use test_utils::{http_client, insert_integration, setup_store, test_config};

async fn app_state(server: &MockServer) -> AppState {
    let (db, store) = setup_store().await.unwrap();
    let config = Arc::new(test_config("https://kb.example.com"));

    let mut registry = Registry::new();
    registry.register(Arc::new(SlackAdapter::new(http_client())));
    let drive = Arc::new(GoogleDriveAdapter::new(http_client(), None).with_base_url(server.uri()));

    let mut oauth = OAuthFlow::new(store.clone(), config.public_base_url.clone());
    oauth.register(Arc::new(
        GitHubOAuth::new(Some("gh-client".into()), Some("gh-secret".into()), http_client())
            .with_base_urls(format!("{}/login/oauth", server.uri()), server.uri()),
    ));
    oauth.register(Arc::new(
        GoogleOAuth::new(Some("g-client".into()), Some("g-secret".into()), http_client())
            .with_endpoints(
                format!("{}/o/oauth2/auth", server.uri()),
                format!("{}/token", server.uri()),
            ),
    ));

    AppState::new(config, db, store, registry, drive, oauth)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_and_request_id_echo() {
    let server = MockServer::start().await;
    let app = create_app(app_state(&server).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-123");
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn action_request_shape_errors_are_problem_json() {
    let server = MockServer::start().await;
    let app = create_app(app_state(&server).await);

    let response = app
        .clone()
        .oneshot(post_json(
            "/integration-action",
            json!({"integrationId": Uuid::new_v4()}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/problem+json"
    );
    let trace_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    let body = json_body(response).await;
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(body["trace_id"], trace_id);

    let response = app
        .oneshot(post_json(
            "/integration-action",
            json!({"integrationId": Uuid::new_v4(), "action": "send_message"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn provider_failures_are_200_with_success_false() {
    let server = MockServer::start().await;
    let state = app_state(&server).await;
    let integration = insert_integration(
        &state.store,
        Uuid::new_v4(),
        ProviderType::Slack,
        json!({"webhook_url": "https://hooks.slack.com/services/x"}),
        true,
    )
    .await
    .unwrap();

    let response = create_app(state)
        .oneshot(post_json(
            "/integration-action",
            json!({"integrationId": integration.id, "action": "send_message", "data": {}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errorKind"], "invalid_payload");
}

#[tokio::test]
async fn oauth_integrations_start_pending_with_a_connect_url() {
    let server = MockServer::start().await;
    let app = create_app(app_state(&server).await);
    let team_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(post_json(
            "/integrations",
            json!({"teamId": team_id, "integrationType": "github", "config": {"access_token": "ignored"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = json_body(response).await;
    assert_eq!(created["connectionState"], "pending");
    assert_eq!(created["isActive"], false);
    assert_eq!(created["integrationName"], "GitHub");
    assert!(created.get("config").is_none());
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(
        created["connectUrl"],
        format!("https://kb.example.com/github-oauth?integration_id={id}")
    );

    let response = app
        .clone()
        .oneshot(get(&format!("/github-oauth?integration_id={id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{}/login/oauth/authorize", server.uri())));
    assert!(location.contains(&format!("state={id}")));

    let response = app
        .oneshot(get(&format!("/teams/{team_id}/integrations")))
        .await
        .unwrap();
    let listed = json_body(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], id);
}

#[tokio::test]
async fn invalid_notification_config_is_rejected() {
    let server = MockServer::start().await;
    let app = create_app(app_state(&server).await);

    let response = app
        .oneshot(post_json(
            "/integrations",
            json!({
                "teamId": Uuid::new_v4(),
                "integrationType": "slack",
                "config": {"webhook_url": "not a url"}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["details"]["kind"], "invalid_config");
}

#[tokio::test]
async fn unknown_provider_is_rejected() {
    let server = MockServer::start().await;
    let app = create_app(app_state(&server).await);

    let response = app
        .oneshot(post_json(
            "/integrations",
            json!({"teamId": Uuid::new_v4(), "integrationType": "dropbox", "config": {}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deactivate_then_delete() {
    let server = MockServer::start().await;
    let state = app_state(&server).await;
    let integration = insert_integration(
        &state.store,
        Uuid::new_v4(),
        ProviderType::Slack,
        json!({"webhook_url": "https://hooks.slack.com/services/x"}),
        true,
    )
    .await
    .unwrap();
    let app = create_app(state);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/integrations/{}/deactivate", integration.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["connectionState"], "disconnected");

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri(format!("/integrations/{}", integration.id))
            .body(Body::empty())
            .unwrap()
    };
    let response = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fetch_google_drive_lists_the_folder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{
                "id": "img-1",
                "name": "diagram.png",
                "mimeType": "image/png",
                "size": "2048"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = app_state(&server).await;
    let integration = insert_integration(
        &state.store,
        Uuid::new_v4(),
        ProviderType::GoogleDrive,
        json!({"access_token": "ya29.token", "folder_id": "folder-1"}),
        true,
    )
    .await
    .unwrap();

    let response = create_app(state)
        .oneshot(post_json(
            "/fetch-google-drive",
            json!({"integrationId": integration.id}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["totalFiles"], 1);
}

#[tokio::test]
async fn providers_and_sync_routes() {
    let server = MockServer::start().await;
    let app = create_app(app_state(&server).await);

    let response = app.clone().oneshot(get("/providers")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let providers = json_body(response).await["providers"].clone();
    let names: Vec<&str> = providers
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(names, vec!["google_drive", "slack"]);

    let team_id = Uuid::new_v4();
    let response = app
        .clone()
        .oneshot(post_json(&format!("/teams/{team_id}/sync"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["teamId"], team_id.to_string());
    assert_eq!(report["attempted"], 0);

    let response = app
        .oneshot(post_json("/teams/not-a-uuid/sync", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let server = MockServer::start().await;
    let app = create_app(app_state(&server).await);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/integration-action")
                .header(header::ORIGIN, "https://app.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn drive_folder_survives_oauth_and_drives_the_sync() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.granted",
            "token_type": "Bearer",
            "refresh_token": "1//refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", "'folder-1' in parents"))
        .and(header_eq("authorization", "Bearer ya29.granted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{
                "id": "notes-1",
                "name": "notes.txt",
                "mimeType": "text/plain",
                "size": "5"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/notes-1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let state = app_state(&server).await;
    let store = state.store.clone();
    let app = create_app(state);
    let team_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(post_json(
            "/integrations",
            json!({
                "teamId": team_id,
                "integrationType": "google_drive",
                "config": {"folder_id": "folder-1"}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id: Uuid = json_body(response).await["id"].as_str().unwrap().parse().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/google-oauth?code=consent-code&state={id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let saved = store.get_integration(id).await.unwrap().unwrap();
    assert!(saved.is_active);
    assert_eq!(saved.config["folder_id"], "folder-1");
    assert_eq!(saved.config["access_token"], "ya29.granted");
    assert!(saved.config.get("oauth_pending").is_none());

    let response = app
        .oneshot(post_json(&format!("/teams/{team_id}/sync"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["succeeded"], 1);
    assert_eq!(report["outcomes"][0]["status"], "succeeded");
    assert_eq!(report["outcomes"][0]["documentIds"], json!(["notes-1"]));
    assert_eq!(store.count_documents(team_id).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_activation_leaves_the_integration_inactive() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/revoked"))
        .respond_with(ResponseTemplate::new(500).set_body_string("no_service"))
        .expect(1)
        .mount(&server)
        .await;

    let state = app_state(&server).await;
    let team_id = Uuid::new_v4();
    let missing_url = insert_integration(&state.store, team_id, ProviderType::Slack, json!({}), false)
        .await
        .unwrap();
    let revoked = insert_integration(
        &state.store,
        team_id,
        ProviderType::Slack,
        json!({"webhook_url": format!("{}/services/revoked", server.uri())}),
        false,
    )
    .await
    .unwrap();
    let app = create_app(state);

    let activate = |id: Uuid| post_json(&format!("/integrations/{id}/activate"), json!({}));

    let response = app.clone().oneshot(activate(missing_url.id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["details"]["kind"], "invalid_config");

    let response = app.clone().oneshot(activate(revoked.id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["details"]["kind"], "upstream");

    for id in [missing_url.id, revoked.id] {
        let response = app
            .clone()
            .oneshot(get(&format!("/integrations/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["isActive"], false);
    }
}

#[tokio::test]
async fn drive_folder_contents_keep_listing_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"id": "a", "name": "a.txt", "mimeType": "text/plain"},
                {"id": "b", "name": "b.md", "mimeType": "text/markdown"},
                {"id": "img", "name": "c.png", "mimeType": "image/png"},
                {"id": "d", "name": "d.txt", "mimeType": "text/plain"}
            ]
        })))
        .mount(&server)
        .await;
    for (id, body, delay_ms) in [("a", "alpha", 300), ("b", "beta", 150), ("d", "delta", 0)] {
        Mock::given(method("GET"))
            .and(path(format!("/files/{id}")))
            .and(query_param("alt", "media"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .set_delay(std::time::Duration::from_millis(delay_ms)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let state = app_state(&server).await;
    let integration = insert_integration(
        &state.store,
        Uuid::new_v4(),
        ProviderType::GoogleDrive,
        json!({"access_token": "ya29.token", "folder_id": "folder-1"}),
        true,
    )
    .await
    .unwrap();

    let response = create_app(state)
        .oneshot(post_json(
            "/fetch-google-drive",
            json!({"integrationId": integration.id}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let files: Vec<(&str, &str)> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|file| (file["id"].as_str().unwrap(), file["content"].as_str().unwrap()))
        .collect();
    assert_eq!(
        files,
        vec![("a", "alpha"), ("b", "beta"), ("img", ""), ("d", "delta")]
    );
}
