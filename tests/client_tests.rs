//! End-to-end tests through the production transport against a local mock
//! HTTP server.

use async_trait::async_trait;
use courier::{
    default_chain, Client, Connectivity, Destination, Error, HttpTransport, Interceptor,
    ParameterEncoding, RetryDecision, Target, Task, TokenSource, WireRequest,
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
}

fn params(entries: &[(&str, serde_json::Value)]) -> courier::Parameters {
    let mut map = courier::Parameters::new();
    for (name, value) in entries {
        map.insert((*name).to_string(), value.clone());
    }
    map
}

async fn client_for(server: &MockServer) -> (Client, String) {
    let client = Client::builder().build().unwrap();
    (client, server.uri())
}

#[tokio::test]
async fn dispatch_decodes_typed_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "ada"},
            {"id": 2, "name": "grace"},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let (client, base) = client_for(&server).await;
    let target = Target::builder(base, "/users")
        .task(Task::Parameters {
            params: params(&[("page", json!(1))]),
            encoding: ParameterEncoding::Query,
        })
        .build();

    let users: Vec<User> = client.dispatch(target).await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].name, "ada");
}

#[tokio::test]
async fn camel_case_responses_decode_into_snake_fields() {
    #[derive(Debug, Deserialize)]
    struct Profile {
        user_name: String,
        sign_up_count: u32,
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"userName": "ada", "signUpCount": 7})),
        )
        .mount(&server)
        .await;

    let (client, base) = client_for(&server).await;
    let target = Target::builder(base, "/profile")
        .key_decoding(courier::KeyDecoding::ConvertCamelCase)
        .build();

    let profile: Profile = client.dispatch(target).await.unwrap();
    assert_eq!(profile.user_name, "ada");
    assert_eq!(profile.sign_up_count, 7);
}

#[tokio::test]
async fn non_success_status_preserves_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let (client, base) = client_for(&server).await;
    let target = Target::builder(base, "/users").build();

    let error = client.dispatch::<Vec<User>>(target).await.unwrap_err();
    assert_eq!(error.status(), Some(503));
    assert_eq!(error.body_preview().as_deref(), Some("overloaded"));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn undecodable_success_body_is_a_decoding_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let (client, base) = client_for(&server).await;
    let target = Target::builder(base, "/users").build();

    let error = client.dispatch::<Vec<User>>(target).await.unwrap_err();
    assert!(matches!(error, Error::Decoding { .. }));
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn malformed_query_value_never_reaches_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, base) = client_for(&server).await;
    let target = Target::builder(base, "/search")
        .task(Task::QueryValue(json!(["not", "a", "map"])))
        .build();

    let error = client.dispatch::<serde_json::Value>(target).await.unwrap_err();
    assert!(matches!(error, Error::ParameterConversion));
}

#[tokio::test]
async fn form_parameters_are_url_encoded_into_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_string("name=ada"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "ada"})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, base) = client_for(&server).await;
    let target = Target::builder(base, "/users")
        .method(Method::POST)
        .task(Task::Parameters {
            params: params(&[("name", json!("ada"))]),
            encoding: ParameterEncoding::FormBody,
        })
        .build();

    let created: User = client.dispatch(target).await.unwrap();
    assert_eq!(created, User { id: 1, name: "ada".to_string() });
}

#[tokio::test]
async fn file_upload_streams_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("payload.txt");
    std::fs::write(&source, "file-contents").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string("file-contents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, base) = client_for(&server).await;
    let target = Target::builder(base, "/upload")
        .method(Method::POST)
        .task(Task::UploadFile(source))
        .build();

    let response: serde_json::Value = client.dispatch(target).await.unwrap();
    assert_eq!(response, json!({"ok": true}));
}

#[tokio::test]
async fn multipart_upload_with_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(query_param("resize", "64x64"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (client, base) = client_for(&server).await;
    let part = courier::Part::bytes("avatar", &b"png-bytes"[..])
        .file_name("avatar.png")
        .mime_type("image/png");
    let target = Target::builder(base, "/upload")
        .method(Method::POST)
        .task(Task::UploadCompositeMultipart {
            parts: vec![part],
            query: params(&[("resize", json!("64x64"))]),
        })
        .build();

    let response: serde_json::Value = client.dispatch(target).await.unwrap();
    assert_eq!(response, json!({"ok": true}));
}

#[tokio::test]
async fn download_persists_response_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"%PDF-report"[..]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("report.pdf");
    let (client, base) = client_for(&server).await;
    let target = Target::builder(base, "/report")
        .task(Task::Download(Destination::Path {
            path: destination.clone(),
            overwrite: false,
        }))
        .build();

    let saved = client.download(target).await.unwrap();
    assert_eq!(saved, destination);
    assert_eq!(std::fs::read(saved).unwrap(), b"%PDF-report");
}

#[tokio::test]
async fn download_refuses_to_replace_existing_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"new"[..]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("report.pdf");
    std::fs::write(&destination, b"old").unwrap();

    let (client, base) = client_for(&server).await;
    let target = Target::builder(base, "/report")
        .task(Task::Download(Destination::Path {
            path: destination.clone(),
            overwrite: false,
        }))
        .build();

    let error = client.download(target).await.unwrap_err();
    assert!(matches!(error, Error::Io(_)));
    assert_eq!(std::fs::read(&destination).unwrap(), b"old");
}

/// Retries server errors once after a short delay.
struct RetryServerErrors;

#[async_trait]
impl Interceptor for RetryServerErrors {
    async fn retry(&self, _: &WireRequest, error: &Error, attempt: u32) -> RetryDecision {
        if attempt < 2 && error.status().is_some_and(|status| status >= 500) {
            RetryDecision::RetryAfter(Duration::from_millis(10))
        } else {
            RetryDecision::DoNotRetry
        }
    }
}

#[tokio::test]
async fn custom_interceptor_retries_transient_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .interceptor(Arc::new(RetryServerErrors))
        .build()
        .unwrap();
    let target = Target::builder(server.uri(), "/users").build();

    let users: Vec<User> = client.dispatch(target).await.unwrap();
    assert!(users.is_empty());
}

struct CountingTokens {
    token: tokio::sync::Mutex<String>,
    refreshes: AtomicU32,
}

#[async_trait]
impl TokenSource for CountingTokens {
    async fn current(&self) -> Option<String> {
        Some(self.token.lock().await.clone())
    }

    async fn refresh(&self) -> Result<String, Error> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let mut token = self.token.lock().await;
        *token = "token-2".to_string();
        Ok(token.clone())
    }
}

#[tokio::test]
async fn authorization_failure_refreshes_once_and_resubmits() {
    let server = MockServer::start().await;
    // The stale credential is rejected once...
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    // ...and the refreshed credential succeeds.
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 9, "name": "ada"})))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(CountingTokens {
        token: tokio::sync::Mutex::new("token-1".to_string()),
        refreshes: AtomicU32::new(0),
    });
    let transport = Arc::new(HttpTransport::new().unwrap());
    let client = Client::builder()
        .transport(transport.clone())
        .interceptors(default_chain(transport, tokens.clone()))
        .build()
        .unwrap();
    let target = Target::builder(server.uri(), "/me").build();

    let me: User = client.dispatch(target).await.unwrap();
    assert_eq!(me.id, 9);
    assert_eq!(tokens.refreshes.load(Ordering::SeqCst), 1);
}

struct NeverOnline;

impl Connectivity for NeverOnline {
    fn is_connected(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn connectivity_gate_fails_before_any_request_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tokens = Arc::new(CountingTokens {
        token: tokio::sync::Mutex::new("token-1".to_string()),
        refreshes: AtomicU32::new(0),
    });
    let client = Client::builder()
        .interceptors(default_chain(Arc::new(NeverOnline), tokens))
        .build()
        .unwrap();
    let target = Target::builder(server.uri(), "/users").build();

    let error = client.dispatch::<Vec<User>>(target).await.unwrap_err();
    assert!(matches!(error, Error::Offline));
}
