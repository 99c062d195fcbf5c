//! Namespace selection (§8 scenario 5) and refresh-token re-mint behind a passthrough
//! scope URL (§8 scenario 6).

mod common;

use common::*;
use wicked_auth_server::dto::OidcProfile;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

fn extract_csrf_token(html: &str) -> String {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker).expect("form should carry a csrf_token field") + marker.len();
    let end = html[start..].find('"').unwrap();
    html[start..start + end].to_string()
}

#[tokio::test]
async fn selecting_a_namespace_mints_with_authenticated_userid_carrying_it() {
    let app = spawn_app().await;

    stub_subscription(&app.portal, "client5", "api5", "app5", true, None).await;
    stub_api(&app.portal, "api5", &[], Some("pool5"), false, None).await;
    stub_user_lookup_miss(&app.portal).await;
    stub_create_user(&app.portal, "u-alice", "alice@example.com").await;
    stub_pool(&app.portal, "pool5", true).await;
    stub_registration(&app.portal, "pool5", "u-alice", None).await;
    stub_put_registration(&app.portal, "pool5", "u-alice").await;
    stub_namespace_valid(&app.portal, "pool5", "A").await;

    stub_gateway_oauth2_config(&app.gateway, "api5", true, false, false).await;
    Mock::given(method("POST"))
        .and(path("/api5/oauth2/authorize"))
        .and(body_partial_json(serde_json::json!({ "authenticated_userid": "sub=u-alice;namespace=A" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "redirect_uri": "https://client.example/callback?code=test-auth-code-5"
        })))
        .mount(&app.gateway)
        .await;

    let authorize_url = format!(
        "{}&redirect_uri=https://client.example/callback&state=xyz5",
        app.url("/auth/default/api/api5/authorize?response_type=code&client_id=client5")
    );
    let resp = app.api_client.get(&authorize_url).send().await.unwrap();
    assert_eq!(resp.status(), 302);
    let login_location = resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert_eq!(login_location, "/auth/default/login");

    let login_resp = app
        .api_client
        .post(app.url(&login_location))
        .form(&[("username", "alice"), ("password", "alice-password")])
        .send()
        .await
        .unwrap();
    assert_eq!(login_resp.status(), 302);
    let namespace_location = login_resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert_eq!(
        namespace_location, "/auth/default/selectnamespace",
        "a registration missing its namespace should route to SelectNamespace (§4.1), not fail the request"
    );

    let form_resp = app.api_client.get(app.url(&namespace_location)).send().await.unwrap();
    assert_eq!(form_resp.status(), 200);
    let csrf_token = extract_csrf_token(&form_resp.text().await.unwrap());

    let submit_resp = app
        .api_client
        .post(app.url(&namespace_location))
        .form(&[("csrf_token", csrf_token.as_str()), ("namespace", "A")])
        .send()
        .await
        .unwrap();
    assert_eq!(submit_resp.status(), 302);
    let final_location = submit_resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert!(final_location.starts_with("https://client.example/callback"));
    assert_eq!(query_param(&final_location, "code"), Some("test-auth-code-5"));
    assert_eq!(query_param(&final_location, "state"), Some("xyz5"));
}

#[tokio::test]
async fn refresh_behind_passthrough_scope_url_remints_and_drops_previous_token() {
    let app = spawn_app().await;

    stub_subscription(&app.portal, "client6", "api6", "app6", true, None).await;
    let passthrough_url = format!("{}/scope-check", app.gateway.uri());
    stub_api(&app.portal, "api6", &[], None, true, Some(&passthrough_url)).await;
    stub_gateway_oauth2_config(&app.gateway, "api6", false, false, true).await;
    stub_passthrough_scope(&app.gateway, "/scope-check", "sub=passthrough-user-6").await;
    stub_gateway_token(&app.gateway, "api6", "new-access-token-6", Some("new-refresh-token-6")).await;

    let profile = OidcProfile {
        sub: "passthrough-user-6".to_string(),
        email: Some("p6@example.com".to_string()),
        ..Default::default()
    };
    app.profile_store
        .register_pair("old-access-token-6", Some("old-refresh-token-6"), &profile, 3600)
        .await
        .expect("seeding the previous token pair should succeed");

    let token_resp = app
        .api_client
        .post(app.url("/auth/default/api/api6/token"))
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", "client6"),
            ("refresh_token", "old-refresh-token-6"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(token_resp.status(), 200);
    let body: serde_json::Value = token_resp.json().await.unwrap();
    assert_eq!(body["access_token"], "new-access-token-6");
    assert_eq!(body["refresh_token"], "new-refresh-token-6");

    let stale_refresh = app
        .profile_store
        .retrieve("old-refresh-token-6")
        .await
        .expect("profile store lookup should not error");
    assert!(stale_refresh.is_none(), "the previous refresh token should be dropped once re-minted (§4.8 case 4)");

    let stale_access = app
        .profile_store
        .retrieve("old-access-token-6")
        .await
        .expect("profile store lookup should not error");
    assert!(
        stale_access.is_none(),
        "the previous access token must also be dropped (§4.8: \"the previous access token is deleted from the profile store\")"
    );
}
