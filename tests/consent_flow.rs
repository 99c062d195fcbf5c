//! Scope consent deny (§8 scenario 4): an untrusted subscription with scopes the user
//! has not yet granted is routed to `/grant`; denying redirects back to the client with
//! `error=access_denied` (§7).

mod common;

use common::*;

fn extract_csrf_token(html: &str) -> String {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker).expect("form should carry a csrf_token field") + marker.len();
    let end = html[start..].find('"').unwrap();
    html[start..start + end].to_string()
}

#[tokio::test]
async fn denying_consent_redirects_with_access_denied() {
    let app = spawn_app().await;

    stub_subscription(&app.portal, "client4", "api4", "app4", false, None).await;
    stub_api(&app.portal, "api4", &["read", "write"], None, false, None).await;
    stub_user_lookup_miss(&app.portal).await;
    stub_create_user(&app.portal, "u-bob", "bob@example.com").await;
    stub_grant_lookup_miss(&app.portal).await;

    let authorize_url = format!(
        "{}&redirect_uri=https://client.example/callback&state=s4&scope=read",
        app.url("/auth/default/api/api4/authorize?response_type=code&client_id=client4")
    );

    let resp = app.api_client.get(&authorize_url).send().await.unwrap();
    let login_location = resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert_eq!(login_location, "/auth/default/login");

    let login_resp = app
        .api_client
        .post(app.url(&login_location))
        .form(&[("username", "bob"), ("password", "bob-password")])
        .send()
        .await
        .unwrap();
    assert_eq!(login_resp.status(), 302);
    let grant_location = login_resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert_eq!(grant_location, "/auth/default/grant");

    let grant_form = app.api_client.get(app.url(&grant_location)).send().await.unwrap();
    assert_eq!(grant_form.status(), 200);
    let html = grant_form.text().await.unwrap();
    let csrf_token = extract_csrf_token(&html);

    let deny_resp = app
        .api_client
        .post(app.url(&grant_location))
        .form(&[("csrf_token", csrf_token.as_str()), ("_grant", "deny")])
        .send()
        .await
        .unwrap();
    assert_eq!(deny_resp.status(), 302);
    let final_location = deny_resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert!(final_location.starts_with("https://client.example/callback"));
    assert_eq!(query_param(&final_location, "error"), Some("access_denied"));
    assert_eq!(query_param(&final_location, "state"), Some("s4"));
}
