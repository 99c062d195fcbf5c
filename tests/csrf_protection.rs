//! CSRF protection on the session-bound continuations (§4.6/§7): `/grant` requires the
//! single-use token minted by the preceding `GET`, and that token cannot be replayed.

mod common;

use common::*;

fn extract_csrf_token(html: &str) -> String {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker).expect("form should carry a csrf_token field") + marker.len();
    let end = html[start..].find('"').unwrap();
    html[start..start + end].to_string()
}

async fn reach_grant_form(app: &TestApp) -> String {
    stub_subscription(&app.portal, "client7", "api7", "app7", false, None).await;
    stub_api(&app.portal, "api7", &["read"], None, false, None).await;
    stub_user_lookup_miss(&app.portal).await;
    stub_create_user(&app.portal, "u-bob", "bob@example.com").await;
    stub_grant_lookup_miss(&app.portal).await;

    let authorize_url = format!(
        "{}&redirect_uri=https://client.example/callback&state=s7&scope=read",
        app.url("/auth/default/api/api7/authorize?response_type=code&client_id=client7")
    );
    let resp = app.api_client.get(&authorize_url).send().await.unwrap();
    let login_location = resp.headers().get("location").unwrap().to_str().unwrap().to_string();

    let login_resp = app
        .api_client
        .post(app.url(&login_location))
        .form(&[("username", "bob"), ("password", "bob-password")])
        .send()
        .await
        .unwrap();
    login_resp.headers().get("location").unwrap().to_str().unwrap().to_string()
}

#[tokio::test]
async fn grant_submit_without_a_valid_csrf_token_is_rejected() {
    let app = spawn_app().await;
    let grant_location = reach_grant_form(&app).await;

    let missing_token_resp = app
        .api_client
        .post(app.url(&grant_location))
        .form(&[("csrf_token", ""), ("_grant", "allow")])
        .send()
        .await
        .unwrap();
    assert_eq!(missing_token_resp.status(), 400, "validator rejects an empty csrf_token before it reaches the comparison");

    let form_resp = app.api_client.get(app.url(&grant_location)).send().await.unwrap();
    let real_token = extract_csrf_token(&form_resp.text().await.unwrap());
    let wrong_token = format!("{}-tampered", real_token);

    let mismatched_resp = app
        .api_client
        .post(app.url(&grant_location))
        .form(&[("csrf_token", wrong_token.as_str()), ("_grant", "allow")])
        .send()
        .await
        .unwrap();
    assert_eq!(mismatched_resp.status(), 403);
}

#[tokio::test]
async fn grant_submit_with_the_minted_token_succeeds_and_the_token_cannot_be_replayed() {
    let app = spawn_app().await;
    let grant_location = reach_grant_form(&app).await;
    stub_put_grant(&app.portal).await;

    let form_resp = app.api_client.get(app.url(&grant_location)).send().await.unwrap();
    let csrf_token = extract_csrf_token(&form_resp.text().await.unwrap());

    let allow_resp = app
        .api_client
        .post(app.url(&grant_location))
        .form(&[("csrf_token", csrf_token.as_str()), ("_grant", "allow")])
        .send()
        .await
        .unwrap();
    assert_eq!(allow_resp.status(), 302);
    let final_location = allow_resp.headers().get("location").unwrap().to_str().unwrap().to_string();
    assert!(final_location.starts_with("https://client.example/callback"));
    assert!(query_param(&final_location, "error").is_none());

    // The token was cleared on the successful submit (§4.6) — replaying it must fail
    // even with the otherwise-identical request.
    let replay_resp = app
        .api_client
        .post(app.url(&grant_location))
        .form(&[("csrf_token", csrf_token.as_str()), ("_grant", "allow")])
        .send()
        .await
        .unwrap();
    assert_eq!(replay_resp.status(), 403);
}
