use std::sync::Arc;

use draftline_api::config::AppConfig;
use draftline_api::middleware::auth::{issue_token, RequestAuthor};
use draftline_api::state::AppState;
use draftline_core::schema::{ContentTypeSchema, InMemorySchemaRegistry};
use draftline_core::store::memory::MemoryVersionStore;
use draftline_core::DocumentService;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const SECRET: &str = "test-secret";
const ARTICLE: &str = "api::article.article";

struct TestApp {
    address: String,
    client: Client,
}

impl TestApp {
    async fn spawn() -> Self {
        let config = AppConfig::from_lookup(|var| match var {
            "JWT_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })
        .unwrap();

        let schema: ContentTypeSchema = serde_json::from_value(json!({
            "uid": ARTICLE,
            "info": { "singularName": "article" },
            "options": { "draftAndPublish": true },
            "pluginOptions": { "i18n": { "localized": true } },
            "attributes": {
                "title": { "type": "string", "required": true },
                "secret": { "type": "password" },
                "notes": { "type": "text", "private": true }
            }
        }))
        .unwrap();
        let registry = InMemorySchemaRegistry::new().with(schema).unwrap();

        let service = DocumentService::builder(
            Arc::new(MemoryVersionStore::new()),
            Arc::new(registry),
        )
        .author(Arc::new(RequestAuthor))
        .build();
        let app = draftline_api::app(AppState::new(service, config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            address,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn create(&self, body: Value) -> Value {
        let response = self
            .client
            .post(self.url(&format!("/v1/documents/{ARTICLE}")))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json::<Value>().await.unwrap()["data"].clone()
    }
}

#[tokio::test]
async fn health_reports_store_and_content_types() {
    let app = TestApp::spawn().await;
    let body: Value = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["contentTypes"], json!([ARTICLE]));
}

#[tokio::test]
async fn create_then_read_hides_sensitive_fields() {
    let app = TestApp::spawn().await;
    let created = app
        .create(json!({
            "data": { "title": "Hello", "secret": "hunter2", "notes": "internal" }
        }))
        .await;
    let id = created["documentId"].as_str().unwrap();
    assert_eq!(created["locale"], "en");
    assert_eq!(created["status"], "draft");
    assert!(created.get("secret").is_none());
    assert!(created.get("notes").is_none());

    let body: Value = app
        .client
        .get(app.url(&format!("/v1/documents/{ARTICLE}/{id}?locale=en")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["title"], "Hello");
    assert_eq!(body["meta"]["availableLocales"], json!([]));
    assert_eq!(body["meta"]["availableStatus"], json!([]));
}

#[tokio::test]
async fn updating_published_version_is_a_validation_error() {
    let app = TestApp::spawn().await;
    let created = app.create(json!({ "data": { "title": "Hello" } })).await;
    let id = created["documentId"].as_str().unwrap();

    let response = app
        .client
        .put(app.url(&format!("/v1/documents/{ARTICLE}/{id}")))
        .json(&json!({ "status": "published", "data": { "title": "x" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["statusCode"], 400);
    assert_eq!(
        body["error"]["message"],
        "You cannot update a document published version"
    );
}

#[tokio::test]
async fn publish_action_fills_metadata() {
    let app = TestApp::spawn().await;
    let created = app.create(json!({ "data": { "title": "Hello" } })).await;
    let id = created["documentId"].as_str().unwrap();

    let response = app
        .client
        .post(app.url(&format!(
            "/v1/documents/{ARTICLE}/{id}/actions/publish?locale=en"
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let published: Value = response.json().await.unwrap();
    assert_eq!(published["data"]["status"], "published");

    let meta: Value = app
        .client
        .get(app.url(&format!(
            "/v1/documents/{ARTICLE}/{id}/metadata?locale=en&status=draft"
        )))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let statuses = meta["meta"]["availableStatus"].as_array().unwrap();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0]["publishedAt"].is_string());

    let response = app
        .client
        .post(app.url(&format!(
            "/v1/documents/{ARTICLE}/{id}/actions/archive"
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_documents_and_types_are_not_found() {
    let app = TestApp::spawn().await;
    let response = app
        .client
        .get(app.url(&format!("/v1/documents/{ARTICLE}/nope")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .client
        .get(app.url("/v1/documents/api::missing.missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bearer_token_credits_history_author() {
    let app = TestApp::spawn().await;
    let token = issue_token(SECRET, "editor-7", 300).unwrap();

    let response = app
        .client
        .post(app.url(&format!("/v1/documents/{ARTICLE}")))
        .bearer_auth(&token)
        .json(&json!({ "data": { "title": "Signed" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    let id = created["data"]["documentId"].as_str().unwrap();

    let history: Value = app
        .client
        .get(app.url(&format!("/v1/history/{ARTICLE}/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let versions = history["data"].as_array().unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0]["createdBy"]["id"], "editor-7");
    assert_eq!(versions[0]["status"], "draft");
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let app = TestApp::spawn().await;
    let token = issue_token("another-secret", "editor-7", 300).unwrap();
    let response = app
        .client
        .get(app.url(&format!("/v1/documents/{ARTICLE}")))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn delete_all_locales() {
    let app = TestApp::spawn().await;
    let created = app.create(json!({ "data": { "title": "Hello" } })).await;
    let id = created["documentId"].as_str().unwrap();
    app.create(json!({
        "documentId": id,
        "locale": "fr",
        "data": { "title": "Bonjour" }
    }))
    .await;

    let body: Value = app
        .client
        .delete(app.url(&format!("/v1/documents/{ARTICLE}/{id}?locale=*")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["deleted"], 2);
}

#[tokio::test]
async fn every_layer_wraps_the_routes() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/v1/ping"))
        .header("origin", "https://editor.example")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let oversized = "x".repeat(draftline_api::MAX_BODY_BYTES + 1);
    let response = app
        .client
        .post(app.url(&format!("/v1/documents/{ARTICLE}")))
        .header("origin", "https://editor.example")
        .json(&json!({ "data": { "title": oversized } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}
