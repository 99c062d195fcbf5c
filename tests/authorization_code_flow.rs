//! End-to-end authorization-code happy path (§8 scenario 1): a trusted subscription
//! with no registration pool and no scope consent skips straight from login to a minted
//! redirect, and the returned code exchanges for a token.
//!
//! Requires a local Redis reachable at `redis://127.0.0.1:6379` — the Session Store and
//! Profile Store have no in-memory fallback, matching how `mtergel-nevermind`'s own
//! integration tests require a real Postgres instance rather than mocking the database.

mod common;

use common::*;

#[tokio::test]
async fn authorization_code_happy_path_mints_and_exchanges() {
    let app = spawn_app().await;

    stub_subscription(&app.portal, "client1", "api1", "app1", true, None).await;
    stub_api(&app.portal, "api1", &["read", "write"], None, false, None).await;
    stub_user_lookup_miss(&app.portal).await;
    stub_create_user(&app.portal, "u-alice", "alice@example.com").await;

    stub_gateway_oauth2_config(&app.gateway, "api1", true, false, false).await;
    stub_gateway_authorize(&app.gateway, "api1", "https://client.example/callback?code=test-auth-code-1").await;
    stub_gateway_token(&app.gateway, "api1", "test-access-token-1", Some("test-refresh-token-1")).await;

    let authorize_url = format!(
        "{}&redirect_uri=https://client.example/callback&state=xyz1",
        app.url("/auth/default/api/api1/authorize?response_type=code&client_id=client1")
    );

    let resp = app.api_client.get(&authorize_url).send().await.unwrap();
    assert_eq!(resp.status(), 302);
    let location = resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert_eq!(location, "/auth/default/login", "login redirect should be mounted under basePath/authMethodId");

    let login_resp = app
        .api_client
        .post(app.url(&location))
        .form(&[("username", "alice"), ("password", "alice-password")])
        .send()
        .await
        .unwrap();
    assert_eq!(login_resp.status(), 302);
    let final_redirect = login_resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert!(final_redirect.starts_with("https://client.example/callback"));
    assert_eq!(query_param(&final_redirect, "state"), Some("xyz1"));
    let code = query_param(&final_redirect, "code").expect("minted redirect should carry a code").to_string();

    let token_resp = app
        .api_client
        .post(app.url("/auth/default/api/api1/token"))
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", "client1"),
            ("code", &code),
            ("redirect_uri", "https://client.example/callback"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(token_resp.status(), 200);
    let body: serde_json::Value = token_resp.json().await.unwrap();
    assert_eq!(body["access_token"], "test-access-token-1");
    assert_eq!(body["refresh_token"], "test-refresh-token-1");
}
