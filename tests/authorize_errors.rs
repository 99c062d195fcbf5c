//! Authorize-time failures that short-circuit before any user interaction (§8 scenarios
//! 2 and 3): `prompt=none` with no existing session, and a scope the subscription isn't
//! trusted to request. Both are returned as a redirect to the client's `redirect_uri`
//! with `error`/`error_description` appended (§7), since a `redirect_uri` is always
//! known at this point.

mod common;

use common::*;

#[tokio::test]
async fn implicit_prompt_none_without_session_fails_login_required() {
    let app = spawn_app().await;

    stub_subscription(&app.portal, "client2", "api2", "app2", false, None).await;
    stub_api(&app.portal, "api2", &["read"], None, false, None).await;

    let authorize_url = format!(
        "{}&redirect_uri=https://client.example/callback&state=s2&prompt=none",
        app.url("/auth/default/api/api2/authorize?response_type=token&client_id=client2")
    );

    let resp = app.api_client.get(&authorize_url).send().await.unwrap();
    assert_eq!(resp.status(), 302);
    let location = resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert_eq!(query_param(&location, "error"), Some("login_required"));
    assert_eq!(query_param(&location, "state"), Some("s2"));
}

#[tokio::test]
async fn untrusted_subscription_requesting_unknown_scope_fails_invalid_scope() {
    let app = spawn_app().await;

    stub_subscription(&app.portal, "client3", "api3", "app3", false, None).await;
    stub_api(&app.portal, "api3", &["read", "write"], None, false, None).await;

    let authorize_url = format!(
        "{}&redirect_uri=https://client.example/callback&state=s3&scope=nonexistent",
        app.url("/auth/default/api/api3/authorize?response_type=code&client_id=client3")
    );

    let resp = app.api_client.get(&authorize_url).send().await.unwrap();
    assert_eq!(resp.status(), 302);
    let location = resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert_eq!(query_param(&location, "error"), Some("invalid_scope"));
    assert_eq!(query_param(&location, "state"), Some("s3"));
}
