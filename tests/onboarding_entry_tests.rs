mod common;

use serde_json::{json, Value};

use common::{client, location, start, test_settings, TestServer};
use workgate::identity::SessionHandle;

fn bearer(handle: &SessionHandle) -> String {
    format!("Bearer {}", handle.access.clone().unwrap_or_default())
}

async fn create_workspace(srv: &TestServer, handle: &SessionHandle, name: &str) -> String {
    let resp = client()
        .post(srv.url("/v1/workspaces"))
        .header(reqwest::header::AUTHORIZATION, bearer(handle))
        .json(&json!({"name": name}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json::<Value>().await.unwrap()["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn fresh_oauth_user_is_sent_to_onboarding() {
    let srv = start(test_settings()).await;
    let handle = srv.signup("new@example.com", None, Some("")).await;

    let resp = srv.get_with("/app", &handle).await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/onboarding");

    // At the destination the same verdict renders instead of redirecting again.
    let resp = srv.get_with("/onboarding", &handle).await;
    assert_eq!(resp.status(), 200);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["onboarding"]["missing"], json!(["credential_missing", "name_missing", "no_workspace"]));
    assert_eq!(v["steps"].as_array().map(|a| a.len()), Some(3));
    assert!(v["summary"].as_str().unwrap().contains("set a password"));
}

#[tokio::test]
async fn complete_user_lands_on_their_workspace() {
    let srv = start(test_settings()).await;
    let handle = srv.signup("ada@example.com", Some("pw"), Some("Ada")).await;
    let ws = create_workspace(&srv, &handle, "Analytical Engines").await;

    let resp = srv.get_with("/app", &handle).await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), format!("/workspaces/{ws}"));

    let resp = srv.get_with("/onboarding", &handle).await;
    assert_eq!(location(&resp), format!("/workspaces/{ws}"));

    let resp = srv.get_with(&format!("/workspaces/{ws}"), &handle).await;
    assert_eq!(resp.status(), 200);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["onboarding"]["state"], "complete");
    assert_eq!(v["workspaces"][0]["name"], "Analytical Engines");
}

#[tokio::test]
async fn unauthenticated_entry_defers_to_sign_in() {
    let srv = start(test_settings()).await;
    let resp = srv.get_with("/app", &SessionHandle::default()).await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/sign-in?next=%2Fapp");
}

#[tokio::test]
async fn incomplete_user_on_workspace_page_goes_to_onboarding() {
    let srv = start(test_settings()).await;
    let handle = srv.signup("half@example.com", None, Some("Half")).await;
    let ws = create_workspace(&srv, &handle, "Half Done").await;
    let resp = srv.get_with(&format!("/workspaces/{ws}"), &handle).await;
    assert_eq!(location(&resp), "/onboarding");
}

#[tokio::test]
async fn credential_column_is_authoritative_over_metadata() {
    let srv = start(test_settings()).await;
    let handle = srv.signup("meta@example.com", None, Some("Meta")).await;
    create_workspace(&srv, &handle, "Meta").await;
    let user = srv.state.users.find_by_email("meta@example.com").unwrap();
    let mut metadata = serde_json::Map::new();
    metadata.insert("has_password".into(), Value::Bool(true));
    srv.state.users.set_metadata(&user.id, metadata);

    let resp = srv.get_with("/app", &handle).await;
    assert_eq!(location(&resp), "/onboarding");
}

async fn exchange(srv: &TestServer, handle: &SessionHandle) -> Value {
    client()
        .post(srv.url("/v1/auth/exchange"))
        .header(reqwest::header::AUTHORIZATION, bearer(handle))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap()
}

#[tokio::test]
async fn exchange_reports_verdict_and_destination() {
    let srv = start(test_settings()).await;
    let handle = srv.signup("ex@example.com", None, None).await;

    let v = exchange(&srv, &handle).await;
    assert_eq!(v["onboarding_required"], true);
    assert_eq!(v["redirect_url"], "/onboarding");
    assert_eq!(v["missing"], json!(["credential_missing", "name_missing", "no_workspace"]));

    let resp = client()
        .patch(srv.url("/v1/auth/me"))
        .header(reqwest::header::AUTHORIZATION, bearer(&handle))
        .json(&json!({"name": "  Ex  ", "password": "new-secret"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap()["has_password"], true);

    create_workspace(&srv, &handle, "First").await;
    let latest = create_workspace(&srv, &handle, "Second").await;

    let v = exchange(&srv, &handle).await;
    assert_eq!(v["onboarding_required"], false);
    assert_eq!(v["redirect_url"], format!("/workspaces/{latest}"));
    assert_eq!(v["missing"], json!([]));
}

#[tokio::test]
async fn backend_rejects_missing_or_unknown_bearer() {
    let srv = start(test_settings()).await;
    for auth in [None, Some("Bearer nope")] {
        let mut req = client().get(srv.url("/v1/auth/me"));
        if let Some(a) = auth {
            req = req.header(reqwest::header::AUTHORIZATION, a);
        }
        let resp = req.send().await.unwrap();
        assert_eq!(resp.status(), 401);
        assert_eq!(resp.headers().get(reqwest::header::WWW_AUTHENTICATE).unwrap(), "Bearer");
        assert_eq!(resp.json::<Value>().await.unwrap(), json!({"error": "Could not validate credentials"}));
    }
}

#[tokio::test]
async fn workspace_creation_requires_a_name() {
    let srv = start(test_settings()).await;
    let handle = srv.signup("ws@example.com", Some("pw"), Some("Ws")).await;
    let resp = client()
        .post(srv.url("/v1/workspaces"))
        .header(reqwest::header::AUTHORIZATION, bearer(&handle))
        .json(&json!({"name": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.json::<Value>().await.unwrap()["code"], "name_required");
}
