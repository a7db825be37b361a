#![allow(dead_code)]

use std::sync::Arc;

use reqwest::Url;
use tokio::task::JoinHandle;

use workgate::config::Settings;
use workgate::identity::{OAuthUpstream, SessionHandle, REFRESH_COOKIE, SESSION_COOKIE};
use workgate::server::{self, AppState};

/// In-process server bound to an ephemeral localhost port; aborted on drop.
pub struct TestServer {
    pub base: Url,
    pub state: AppState,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) { self.handle.abort(); }
}

pub fn test_settings() -> Settings {
    Settings { secure_cookies: false, ..Settings::default() }
}

async fn spawn(state: AppState) -> TestServer {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let port = listener.local_addr().unwrap().port();
    let serve_state = state.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, serve_state).await {
            eprintln!("server task error: {e:?}");
        }
    });
    let base = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
    TestServer { base, state, handle }
}

pub async fn start(settings: Settings) -> TestServer {
    spawn(AppState::new(settings).expect("app state")).await
}

pub async fn start_with_oauth(settings: Settings, oauth: Arc<dyn OAuthUpstream>) -> TestServer {
    spawn(AppState::with_oauth(settings, oauth).expect("app state")).await
}

/// Client that leaves redirects for the test to assert.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap()
}

/// Collect the session cookies a response set.
pub fn handle_from(resp: &reqwest::Response) -> SessionHandle {
    let mut handle = SessionHandle::default();
    for val in resp.headers().get_all(reqwest::header::SET_COOKIE).iter() {
        let Ok(s) = val.to_str() else { continue };
        let nv = s.split(';').next().unwrap_or("").trim();
        if let Some((k, v)) = nv.split_once('=') {
            if k == SESSION_COOKIE { handle.access = Some(v.to_string()); }
            if k == REFRESH_COOKIE { handle.refresh = Some(v.to_string()); }
        }
    }
    handle
}

pub fn location(resp: &reqwest::Response) -> String {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

impl TestServer {
    pub fn url(&self, path: &str) -> Url { self.base.join(path).unwrap() }

    /// Sign up over HTTP and return the cookie handle.
    pub async fn signup(&self, email: &str, password: Option<&str>, name: Option<&str>) -> SessionHandle {
        let resp = client()
            .post(self.url("/signup"))
            .json(&serde_json::json!({"email": email, "password": password, "name": name}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        handle_from(&resp)
    }

    pub async fn get_with(&self, path: &str, handle: &SessionHandle) -> reqwest::Response {
        let mut req = client().get(self.url(path));
        if let Some(c) = handle.cookie_header() {
            req = req.header(reqwest::header::COOKIE, c);
        }
        req.send().await.unwrap()
    }
}
