use std::collections::HashMap;
use std::sync::Arc;

use kb_integrations::models::ProviderType;
use kb_integrations::oauth::{
    GitHubOAuth, NotionOAuth, OAuthError, OAuthFlow, OAuthOutcome, OAuthQuery,
};
use kb_integrations::repositories::Store;
use serde_json::json;
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

mod test_utils;
use test_utils::{http_client, insert_integration, setup_store};

fn flow(store: Arc<dyn Store>, server: &MockServer) -> OAuthFlow {
    let mut flow = OAuthFlow::new(store, "https://kb.example.com");
    flow.register(Arc::new(
        GitHubOAuth::new(Some("gh-client".into()), Some("gh-secret".into()), http_client())
            .with_base_urls(format!("{}/login/oauth", server.uri()), server.uri()),
    ));
    flow.register(Arc::new(
        NotionOAuth::new(Some("notion-client".into()), Some("notion-secret".into()), http_client())
            .with_base_url(server.uri()),
    ));
    flow
}

async fn pending(store: &Arc<dyn Store>, provider: ProviderType) -> Uuid {
    insert_integration(store, Uuid::new_v4(), provider, json!({"oauth_pending": true}), false)
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn first_phase_redirects_with_integration_id_as_state() {
    let server = MockServer::start().await;
    let (_db, store) = setup_store().await.unwrap();
    let id = pending(&store, ProviderType::Github).await;

    let outcome = flow(store, &server)
        .handle(
            ProviderType::Github,
            OAuthQuery {
                integration_id: Some(id.to_string()),
                ..OAuthQuery::default()
            },
        )
        .await
        .unwrap();

    let OAuthOutcome::Redirect(url) = outcome else {
        panic!("expected redirect, got {outcome:?}");
    };
    assert_eq!(url.path(), "/login/oauth/authorize");
    let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs["state"], id.to_string());
    assert_eq!(pairs["client_id"], "gh-client");
    assert_eq!(pairs["redirect_uri"], "https://kb.example.com/github-oauth");
}

#[tokio::test]
async fn github_exchange_stores_token_and_activates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(body_partial_json(json!({"code": "good-code", "client_id": "gh-client"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_abc",
            "token_type": "bearer",
            "scope": "repo,user:email"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", "Bearer gho_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "login": "octocat",
            "name": "The Octocat"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_db, store) = setup_store().await.unwrap();
    let id = pending(&store, ProviderType::Github).await;

    let outcome = flow(store.clone(), &server)
        .handle(
            ProviderType::Github,
            OAuthQuery {
                code: Some("good-code".into()),
                state: Some(id.to_string()),
                ..OAuthQuery::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        OAuthOutcome::Connected {
            provider: ProviderType::Github,
            integration_id: id,
            identity: Some("octocat".into()),
        }
    );

    let saved = store.get_integration(id).await.unwrap().unwrap();
    assert!(saved.is_active);
    assert_eq!(saved.config["access_token"], "gho_abc");
    assert_eq!(saved.config["user_info"]["login"], "octocat");
    assert!(saved.config.get("oauth_pending").is_none());
}

#[tokio::test]
async fn rejected_code_leaves_the_integration_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_db, store) = setup_store().await.unwrap();
    let id = pending(&store, ProviderType::Github).await;

    let outcome = flow(store.clone(), &server)
        .handle(
            ProviderType::Github,
            OAuthQuery {
                code: Some("stale".into()),
                state: Some(id.to_string()),
                ..OAuthQuery::default()
            },
        )
        .await
        .unwrap();

    let OAuthOutcome::Failed {
        integration_id,
        message,
        ..
    } = outcome
    else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(integration_id, Some(id));
    assert!(message.contains("incorrect or expired"), "{message}");

    let saved = store.get_integration(id).await.unwrap().unwrap();
    assert!(!saved.is_active);
    assert_eq!(saved.config, json!({"oauth_pending": true}));
}

#[tokio::test]
async fn notion_exchange_uses_basic_auth_and_records_workspace() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header(
            "authorization",
            "Basic bm90aW9uLWNsaWVudDpub3Rpb24tc2VjcmV0",
        ))
        .and(body_partial_json(json!({"grant_type": "authorization_code", "code": "n-code"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "secret_notion",
            "workspace_id": "ws-1",
            "workspace_name": "Acme",
            "bot_id": "bot-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_db, store) = setup_store().await.unwrap();
    let id = pending(&store, ProviderType::Notion).await;

    let outcome = flow(store.clone(), &server)
        .handle(
            ProviderType::Notion,
            OAuthQuery {
                code: Some("n-code".into()),
                state: Some(id.to_string()),
                ..OAuthQuery::default()
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        OAuthOutcome::Connected { identity: Some(ref name), .. } if name == "Acme"
    ));
    let saved = store.get_integration(id).await.unwrap().unwrap();
    assert!(saved.is_active);
    assert_eq!(saved.config["workspace_id"], "ws-1");
}

#[tokio::test]
async fn provider_error_without_code_fails_without_store_access() {
    let server = MockServer::start().await;
    let (_db, store) = setup_store().await.unwrap();
    let id = pending(&store, ProviderType::Github).await;

    let outcome = flow(store.clone(), &server)
        .handle(
            ProviderType::Github,
            OAuthQuery {
                state: Some(id.to_string()),
                error: Some("access_denied".into()),
                error_description: Some("The user has denied your application access.".into()),
                ..OAuthQuery::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        OAuthOutcome::Failed {
            provider: ProviderType::Github,
            integration_id: Some(id),
            message: "The user has denied your application access.".into(),
        }
    );
    assert!(!store.get_integration(id).await.unwrap().unwrap().is_active);
}

#[tokio::test]
async fn request_errors_are_reported() {
    let server = MockServer::start().await;
    let (_db, store) = setup_store().await.unwrap();
    let notion_id = pending(&store, ProviderType::Notion).await;
    let flow = flow(store, &server);

    let err = flow
        .handle(ProviderType::Github, OAuthQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::MissingIntegrationId));

    let err = flow
        .handle(
            ProviderType::Github,
            OAuthQuery {
                integration_id: Some("not-a-uuid".into()),
                ..OAuthQuery::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::InvalidIntegrationId(_)));

    let missing = Uuid::new_v4();
    let err = flow
        .handle(
            ProviderType::Github,
            OAuthQuery {
                integration_id: Some(missing.to_string()),
                ..OAuthQuery::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::IntegrationNotFound(id) if id == missing));

    let err = flow
        .handle(
            ProviderType::Github,
            OAuthQuery {
                integration_id: Some(notion_id.to_string()),
                ..OAuthQuery::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::ProviderMismatch { .. }));

    let err = flow
        .handle(ProviderType::Slack, OAuthQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::NotOAuthProvider(ProviderType::Slack)));
}

#[tokio::test]
async fn github_profile_failure_still_connects_and_keeps_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_def",
            "token_type": "bearer",
            "scope": "repo"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(500).set_body_string("unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let (_db, store) = setup_store().await.unwrap();
    let id = insert_integration(
        &store,
        Uuid::new_v4(),
        ProviderType::Github,
        json!({"oauth_pending": true, "default_repo": "acme/api"}),
        false,
    )
    .await
    .unwrap()
    .id;

    let outcome = flow(store.clone(), &server)
        .handle(
            ProviderType::Github,
            OAuthQuery {
                code: Some("good-code".into()),
                state: Some(id.to_string()),
                ..OAuthQuery::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        OAuthOutcome::Connected {
            provider: ProviderType::Github,
            integration_id: id,
            identity: None,
        }
    );
    let saved = store.get_integration(id).await.unwrap().unwrap();
    assert!(saved.is_active);
    assert_eq!(saved.config["access_token"], "gho_def");
    assert_eq!(saved.config["default_repo"], "acme/api");
    assert!(saved.config.get("user_info").is_none());
    assert!(saved.config.get("oauth_pending").is_none());
}
