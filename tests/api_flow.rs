//! End-to-end flows against the real router on an ephemeral port, backed by
//! the in-memory store and a scripted payment provider.

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};

use vibestack_core::api;
use vibestack_core::app_state::AppState;
use vibestack_core::config::{AppConfig, PriceTable};
use vibestack_core::domain::EventBus;
use vibestack_core::payments::{
    CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentProvider, SubscriptionSnapshot,
    signature_header,
};
use vibestack_core::persistence::MemoryStore;

const ADMIN_TOKEN: &str = "admin-test-token";
const WEBHOOK_SECRET: &str = "whsec_flow";

#[derive(Debug, Default)]
struct ScriptedProvider {
    sessions: AtomicUsize,
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(!request.price_id.is_empty());
        Ok(CheckoutSession {
            id: format!("cs_flow_{n}"),
            url: format!("https://checkout.test/cs_flow_{n}"),
        })
    }

    async fn retrieve_subscription(&self, id: &str) -> Result<SubscriptionSnapshot, PaymentError> {
        Ok(SubscriptionSnapshot {
            id: id.to_string(),
            status: "active".to_string(),
            current_period_end: Some(Utc::now() + Duration::days(30)),
            metadata: BTreeMap::new(),
        })
    }
}

struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        let mut config = AppConfig::default();
        config.admin_api_token = Some(ADMIN_TOKEN.to_string());
        config.stripe.webhook_secret = Some(WEBHOOK_SECRET.to_string());
        config.prices = PriceTable {
            newsletter: Some("price_newsletter".to_string()),
            premium: Some("price_premium".to_string()),
            ..PriceTable::default()
        };

        let state = AppState::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedProvider::default()),
            EventBus::new(64),
        );
        let app = api::build_app(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(body).send().await.unwrap()
    }

    async fn approve(&self, id: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self
            .client
            .post(self.url(&format!("/api/v1/admin/submissions/{id}/approve")));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.unwrap()
    }

    async fn webhook(&self, event: &Value) -> reqwest::Response {
        let payload = event.to_string();
        let header =
            signature_header(WEBHOOK_SECRET, payload.as_bytes(), Utc::now().timestamp()).unwrap();
        self.client
            .post(self.url("/api/v1/webhooks/stripe"))
            .header("Stripe-Signature", header)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .unwrap()
    }
}

fn valid_submission() -> Value {
    json!({
        "toolName": "Test Tool",
        "description": "A tool that writes your tests.",
        "websiteUrl": "https://test.dev",
        "category": "coding",
        "pricing": "freemium",
        "email": "maker@example.com"
    })
}

#[tokio::test]
async fn health_and_placements() {
    let server = TestServer::start().await;
    let health = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let placements: Value = server
        .client
        .get(server.url("/config/placements"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let newsletter = placements
        .as_array()
        .and_then(|all| all.iter().find(|p| p["placement"] == "newsletter"))
        .cloned()
        .unwrap();
    assert_eq!(newsletter["available"], true);
    assert_eq!(newsletter["requiresTool"], false);
}

#[tokio::test]
async fn submit_approve_and_list() {
    let server = TestServer::start().await;

    let created = server.post_json("/api/v1/submissions", &valid_submission()).await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created: Value = created.json().await.unwrap();
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    assert_eq!(server.approve(&id, None).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        server.approve(&id, Some("wrong")).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let first: Value = server.approve(&id, Some(ADMIN_TOKEN)).await.json().await.unwrap();
    let second: Value = server.approve(&id, Some(ADMIN_TOKEN)).await.json().await.unwrap();
    assert_eq!(first["newlyApproved"], true);
    assert_eq!(second["newlyApproved"], false);
    assert_eq!(first["toolId"], second["toolId"]);
    assert_eq!(first["toolSlug"], "test-tool");

    let tool = server
        .client
        .get(server.url("/api/v1/tools/test-tool"))
        .send()
        .await
        .unwrap();
    assert_eq!(tool.status(), StatusCode::OK);

    let tools: Value = server
        .client
        .get(server.url("/api/v1/tools?page=1&perPage=10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tools["pagination"]["total"], 1);

    let approved: Value = server
        .client
        .get(server.url("/api/v1/admin/submissions?status=approved"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(approved["pagination"]["total"], 1);
}

#[tokio::test]
async fn invalid_submission_lists_every_field() {
    let server = TestServer::start().await;
    let response = server
        .post_json(
            "/api/v1/submissions",
            &json!({
                "toolName": "A",
                "description": "short",
                "websiteUrl": "ftp://nope",
                "category": "",
                "pricing": "",
                "email": "not-an-email"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], 1001);
    assert_eq!(body["error"]["details"].as_array().map(Vec::len), Some(6));
}

#[tokio::test]
async fn honeypot_gets_generic_rejection() {
    let server = TestServer::start().await;
    let mut body = valid_submission();
    body["website"] = json!("http://bot.example");
    let response = server.post_json("/api/v1/submissions", &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], 1002);
    assert_eq!(body["error"]["message"], "submission rejected");
    assert!(body["error"].get("details").is_none());
}

#[tokio::test]
async fn huge_body_gets_same_rejection_as_honeypot() {
    let server = TestServer::start().await;
    let mut body = valid_submission();
    body["description"] = json!("x".repeat(3 * 1024 * 1024));
    let response = server.post_json("/api/v1/submissions", &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], 1002);
    assert_eq!(body["error"]["message"], "submission rejected");
}

#[tokio::test]
async fn sponsorship_checkout_then_webhook_replay() {
    let server = TestServer::start().await;

    let checkout = server
        .post_json(
            "/api/v1/sponsorships/checkout",
            &json!({ "placement": "newsletter", "sponsorName": "Acme" }),
        )
        .await;
    assert_eq!(checkout.status(), StatusCode::OK);
    let checkout: Value = checkout.json().await.unwrap();
    assert!(checkout["checkoutUrl"].as_str().is_some_and(|u| u.starts_with("https://")));

    let missing_tool = server
        .post_json("/api/v1/sponsorships/checkout", &json!({ "placement": "sidebar_ad" }))
        .await;
    assert_eq!(missing_tool.status(), StatusCode::BAD_REQUEST);

    let event = json!({
        "id": "evt_flow_news",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": checkout["sessionId"],
            "subscription": "sub_flow",
            "payment_status": "paid",
            "customer_details": { "email": "ads@acme.dev" },
            "metadata": { "type": "sponsorship", "placement": "newsletter", "sponsorName": "Acme" }
        }}
    });
    let first: Value = server.webhook(&event).await.json().await.unwrap();
    let second: Value = server.webhook(&event).await.json().await.unwrap();
    assert_eq!(first["outcome"], "processed");
    assert_eq!(second["outcome"], "duplicate");

    let active: Value = server
        .client
        .get(server.url("/api/v1/sponsorships/active?placement=newsletter"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active["sponsorship"]["sponsorName"], "Acme");

    let stats: Value = server
        .client
        .get(server.url("/api/v1/admin/webhooks/stats"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["processed"], 1);
    assert_eq!(stats["failed"], 0);
}

#[tokio::test]
async fn forged_webhook_is_rejected() {
    let server = TestServer::start().await;
    let response = server
        .client
        .post(server.url("/api/v1/webhooks/stripe"))
        .header("Stripe-Signature", "t=1,v1=deadbeef")
        .body(r#"{"id":"evt_forged","type":"checkout.session.completed","data":{"object":{}}}"#)
        .send()
        .await;
    let response = tokio_test::assert_ok!(response);
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], 1004);
}
