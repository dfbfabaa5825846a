//! In-process stand-in for the outreach API, used by the unit tests.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::outreach::{ApiClient, Session};

pub const TOKEN: &str = "test-token";

/// Serve a router on an ephemeral loopback port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

#[derive(Default)]
struct MockState {
    requests: Vec<String>,
    bodies: Vec<(String, Value)>,
    counts: VecDeque<u64>,
    last_count: u64,
    count_failure: Option<StatusCode>,
    scrape_failure: Option<(StatusCode, Option<String>)>,
    send_status: String,
    leads: Vec<Value>,
    templates: Vec<Value>,
    accounts: Vec<Value>,
}

/// Scripted outreach API
#[derive(Clone)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub fn new() -> Self {
        let state = MockState {
            send_status: "queued".to_string(),
            templates: vec![
                json!({"id": "t1", "name": "default", "subject": "Hello", "content": "Hi {First Name}"}),
                json!({"id": "t2", "name": "follow-up", "subject": "Again", "content": "Hi again"}),
            ],
            accounts: vec![
                json!({"id": "acc-1", "email": "a@acme.io", "daily_limit": 50, "emails_sent_today": 50, "is_active": true}),
                json!({"id": "acc-2", "email": "b@acme.io", "daily_limit": 50, "emails_sent_today": 3, "is_active": true}),
            ],
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn router(&self) -> Router {
        Router::new().fallback(handle).with_state(self.clone())
    }

    /// Serve the mock and return a client holding the right token
    pub async fn client(&self) -> ApiClient {
        let base = serve(self.router()).await;
        ApiClient::new(Session::new(base, TOKEN), Duration::from_secs(5)).unwrap()
    }

    /// Values returned by successive `/leads/count` calls; the last one repeats
    pub fn set_counts(&self, counts: &[u64]) {
        let mut state = self.state.lock().unwrap();
        state.counts = counts.iter().copied().collect();
        state.last_count = counts.last().copied().unwrap_or(0);
    }

    pub fn fail_counts(&self, status: StatusCode) {
        self.state.lock().unwrap().count_failure = Some(status);
    }

    pub fn fail_scrape(&self, status: StatusCode, detail: Option<&str>) {
        self.state.lock().unwrap().scrape_failure = Some((status, detail.map(str::to_string)));
    }

    pub fn set_send_status(&self, status: &str) {
        self.state.lock().unwrap().send_status = status.to_string();
    }

    pub fn set_leads(&self, leads: Vec<Value>) {
        self.state.lock().unwrap().leads = leads;
    }

    /// `METHOD path?query` of every request, in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count_of(&self, request: &str) -> usize {
        self.requests().iter().filter(|r| r.as_str() == request).count()
    }

    /// JSON bodies posted to a path
    pub fn bodies(&self, path: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .bodies
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, b)| b.clone())
            .collect()
    }
}

async fn handle(
    State(api): State<MockApi>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();

    if path == "/login" {
        let form = String::from_utf8_lossy(&body);
        return if form.contains("password=pw") {
            Json(json!({"access_token": TOKEN, "token_type": "bearer"})).into_response()
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "Invalid email or password"})),
            )
                .into_response()
        };
    }

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false);

    let mut state = api.state.lock().unwrap();
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    state.requests.push(format!("{} {}", method, target));

    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Not authenticated"})))
            .into_response();
    }

    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    if method == Method::POST {
        state.bodies.push((path.clone(), payload.clone()));
    }

    match (method.as_str(), path.as_str()) {
        ("GET", "/leads/count") => {
            if let Some(status) = state.count_failure {
                return status.into_response();
            }
            let count = match state.counts.pop_front() {
                Some(count) => count,
                None => state.last_count,
            };
            Json(json!({ "count": count })).into_response()
        }
        ("GET", "/leads") => Json(Value::Array(state.leads.clone())).into_response(),
        ("POST", "/leads/manual") => {
            let mut lead = payload;
            lead["id"] = json!("manual-1");
            lead["mail_sent"] = json!(false);
            (StatusCode::CREATED, Json(lead)).into_response()
        }
        ("POST", "/scrape-google-maps") | ("POST", "/scrape-bing-maps") => {
            match state.scrape_failure.clone() {
                Some((status, Some(detail))) => {
                    (status, Json(json!({ "detail": detail }))).into_response()
                }
                Some((status, None)) => status.into_response(),
                None => Json(json!({"message": "Scraping started"})).into_response(),
            }
        }
        ("POST", "/send-emails") => {
            let status = state.send_status.clone();
            if status == "queued" {
                Json(json!({"status": status})).into_response()
            } else {
                Json(json!({"status": status, "message": "No sender capacity left"}))
                    .into_response()
            }
        }
        ("GET", "/templates") => Json(Value::Array(state.templates.clone())).into_response(),
        ("POST", "/templates") => {
            let mut template = payload;
            template["id"] = json!(format!("t{}", state.templates.len() + 1));
            state.templates.push(template.clone());
            (StatusCode::CREATED, Json(template)).into_response()
        }
        ("GET", "/email-accounts") => Json(Value::Array(state.accounts.clone())).into_response(),
        ("POST", "/email-accounts") => {
            let account = json!({
                "id": format!("acc-{}", state.accounts.len() + 1),
                "email": payload["email"],
                "sender_name": payload["sender_name"],
                "daily_limit": payload["daily_limit"],
                "emails_sent_today": 0,
                "is_active": true,
            });
            state.accounts.push(account.clone());
            Json(account).into_response()
        }
        ("POST", p) if p.starts_with("/email-accounts/") && p.ends_with("/reset") => {
            let id = p
                .trim_start_matches("/email-accounts/")
                .trim_end_matches("/reset")
                .to_string();
            for account in state.accounts.iter_mut() {
                if account["id"] == json!(id) {
                    account["emails_sent_today"] = json!(0);
                }
            }
            Json(json!({"status": "reset"})).into_response()
        }
        ("POST", "/rephrase-email") => {
            let content = payload["content"].as_str().unwrap_or_default().to_uppercase();
            Json(json!({ "rephrased_content": content })).into_response()
        }
        ("GET", "/unread-emails") => Json(json!([{
            "sender_email": "owner@bakery.io",
            "recipient_email": "a@acme.io",
            "subject": "Re: Hello",
            "preview": "Sounds interesting, tell me more",
            "time": "2024-05-01 10:12"
        }]))
        .into_response(),
        ("GET", "/analytics/daily-stats") => Json(json!([
            {"date": "2024-05-01", "leads": 12, "emails_sent": 8},
            {"date": "2024-05-02", "leads": 3, "emails_sent": 10}
        ]))
        .into_response(),
        ("GET", "/analytics/summary") => Json(json!({
            "total_leads": 120, "total_emails_sent": 80, "unsent_leads": 40
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
