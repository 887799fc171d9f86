//! Upload Flow Integration Tests
//!
//! Drives `POST /upload` over real HTTP against a mock GitHub contents API.
//!
//! ## Test Coverage
//!
//! - Message-only upload (one commit, `file: null`)
//! - Message plus attachment (two sequential commits)
//! - Oversized attachment (metadata committed, attachment rejected)
//! - Remote failures on either commit
//! - Unfilled file inputs and undecoded bodies (metadata only)
//! - Health and unknown routes

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{contents_created, is_generated_path, TestEnv, OWNER, REPO, TOKEN};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path_regex};
use wiremock::{Mock, ResponseTemplate};

const CONTENTS_PREFIX: &str = "/repos/octo/drop/contents/";

fn repo_path(url_path: &str) -> &str {
    url_path
        .strip_prefix(CONTENTS_PREFIX)
        .expect("request should target the contents API")
}

fn contents_route() -> String {
    format!(r"^/repos/{}/{}/contents/uploads/.+$", OWNER, REPO)
}

fn decode(content: &Value) -> Vec<u8> {
    STANDARD
        .decode(content.as_str().expect("content should be a string"))
        .expect("content should be base64")
}

// ========================================================================
// TEST: Message only
// ========================================================================

#[tokio::test]
async fn test_message_only_upload_commits_metadata_once() {
    let env = TestEnv::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(contents_route()))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(contents_created(
            "https://github.com/octo/drop/blob/main/uploads/x/message.txt",
        )))
        .expect(1)
        .mount(&env.github)
        .await;

    let form = Form::new()
        .text("name", "Abdullah")
        .text("message", "Hello from the phone");
    let response = env.post_form(form).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert!(body["file"].is_null());

    let meta_path = body["metaPath"].as_str().unwrap();
    assert!(is_generated_path(meta_path, "message.txt"), "{}", meta_path);

    let commits = env.commits().await;
    assert_eq!(commits.len(), 1);
    let (url_path, commit) = &commits[0];
    assert_eq!(repo_path(url_path), meta_path);
    assert_eq!(commit["message"], "Upload: message from Abdullah");
    assert_eq!(commit["branch"], "main");

    let text = String::from_utf8(decode(&commit["content"])).unwrap();
    assert!(text.starts_with("uploader: Abdullah\nreceived_at: "));
    assert!(text.ends_with("\n\nmessage:\nHello from the phone\n"));
}

#[tokio::test]
async fn test_empty_form_uses_placeholder_sender() {
    let env = TestEnv::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(contents_route()))
        .respond_with(ResponseTemplate::new(201).set_body_json(contents_created("u")))
        .expect(1)
        .mount(&env.github)
        .await;

    let response = env.post_form(Form::new().text("unrelated", "x")).await;
    assert_eq!(response.status(), 200);

    let commits = env.commits().await;
    assert_eq!(commits[0].1["message"], "Upload: message from phone");
}

// ========================================================================
// TEST: Attachment
// ========================================================================

#[tokio::test]
async fn test_attachment_upload_commits_twice() {
    let env = TestEnv::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"/message\.txt$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(contents_created("meta-url")))
        .expect(1)
        .mount(&env.github)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"/photo\.jpg$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(contents_created(
            "https://github.com/octo/drop/blob/main/uploads/y/photo.jpg",
        )))
        .expect(1)
        .mount(&env.github)
        .await;

    let form = Form::new().text("name", "Abdullah").part(
        "file",
        Part::bytes(b"0123456789".to_vec())
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .unwrap(),
    );
    let response = env.post_form(form).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let file_path = body["file"]["path"].as_str().unwrap();
    assert!(is_generated_path(file_path, "photo.jpg"), "{}", file_path);
    assert_eq!(
        body["file"]["commitUrl"],
        "https://github.com/octo/drop/blob/main/uploads/y/photo.jpg"
    );

    let commits = env.commits().await;
    assert_eq!(commits.len(), 2);
    assert!(commits[0].0.ends_with("/message.txt"));

    let (url_path, file_commit) = &commits[1];
    assert_eq!(repo_path(url_path), file_path);
    let message = file_commit["message"].as_str().unwrap();
    assert!(message.contains("Abdullah"));
    assert!(message.contains("photo.jpg"));
    assert_eq!(decode(&file_commit["content"]), b"0123456789");
}

#[tokio::test]
async fn test_attachment_name_is_sanitized() {
    let env = TestEnv::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(contents_route()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"content": null})))
        .expect(2)
        .mount(&env.github)
        .await;

    let form = Form::new().part(
        "file",
        Part::bytes(b"img".to_vec()).file_name("my holiday*pic.png"),
    );
    let response = env.post_form(form).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(is_generated_path(
        body["file"]["path"].as_str().unwrap(),
        "my_holiday_pic.png"
    ));
    assert!(body["file"]["commitUrl"].is_null());

    let commits = env.commits().await;
    let message = commits[1].1["message"].as_str().unwrap();
    assert_eq!(message, "Upload: file my holiday*pic.png from phone");
}

#[tokio::test]
async fn test_oversized_attachment_rejected_after_metadata() {
    let env = TestEnv::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"/message\.txt$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(contents_created("meta")))
        .expect(1)
        .mount(&env.github)
        .await;

    let oversized = vec![0u8; 100 * 1024 * 1024 + 1];
    let form = Form::new()
        .text("name", "Abdullah")
        .part("file", Part::bytes(oversized).file_name("huge.bin"));
    let response = env.post_form(form).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": "File too large (>100MB). Use other storage."})
    );

    let commits = env.commits().await;
    assert_eq!(commits.len(), 1, "only the metadata commit may happen");
    assert!(commits[0].0.ends_with("/message.txt"));
}

// ========================================================================
// TEST: Remote failures
// ========================================================================

#[tokio::test]
async fn test_metadata_failure_returns_500_without_file_commit() {
    let env = TestEnv::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(contents_route()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Bad credentials",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .expect(1)
        .mount(&env.github)
        .await;

    let form = Form::new()
        .text("name", "Abdullah")
        .part("file", Part::bytes(b"data".to_vec()).file_name("a.txt"));
    let response = env.post_form(form).await;

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Bad credentials");
    assert_eq!(body["details"]["documentation_url"], "https://docs.github.com/rest");
}

#[tokio::test]
async fn test_file_failure_leaves_metadata_commit() {
    let env = TestEnv::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"/message\.txt$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(contents_created("meta")))
        .expect(1)
        .mount(&env.github)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"/a\.txt$"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "is at 1234 but expected 5678"
        })))
        .expect(1)
        .mount(&env.github)
        .await;

    let form = Form::new().part("file", Part::bytes(b"data".to_vec()).file_name("a.txt"));
    let response = env.post_form(form).await;

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "is at 1234 but expected 5678");
    assert_eq!(env.commits().await.len(), 2);
}

#[tokio::test]
async fn test_network_failure_returns_500_with_null_details() {
    // Reserve a port, then release it so nothing listens there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let api_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let server = repo_uploadr::Server::from_config(&common::test_config(&api_url))
        .await
        .unwrap();
    let addr = server.local_addr();
    tokio::spawn(async move {
        let _ = server.run_until(std::future::pending()).await;
    });

    let response = reqwest::Client::new()
        .post(format!("http://{}/upload", addr))
        .multipart(Form::new().text("message", "hi"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert!(body["details"].is_null());
}

// ========================================================================
// TEST: Other routes and bodies
// ========================================================================

#[tokio::test]
async fn test_json_body_upload() {
    let env = TestEnv::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(contents_route()))
        .respond_with(ResponseTemplate::new(201).set_body_json(contents_created("u")))
        .expect(1)
        .mount(&env.github)
        .await;

    let response = env
        .client
        .post(env.url("/upload"))
        .json(&json!({"name": "kiosk", "message": "ping"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let commits = env.commits().await;
    assert_eq!(commits[0].1["message"], "Upload: message from kiosk");
}

#[tokio::test]
async fn test_undecoded_bodies_commit_metadata_with_placeholder() {
    let env = TestEnv::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(contents_route()))
        .respond_with(ResponseTemplate::new(201).set_body_json(contents_created("u")))
        .expect(2)
        .mount(&env.github)
        .await;

    let urlencoded = env
        .client
        .post(env.url("/upload"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("name=Abdullah&message=hi")
        .send()
        .await
        .unwrap();
    assert_eq!(urlencoded.status(), 200);

    let bare = env.client.post(env.url("/upload")).send().await.unwrap();
    assert_eq!(bare.status(), 200);
    let body: Value = bare.json().await.unwrap();
    assert!(body["file"].is_null());

    let commits = env.commits().await;
    assert_eq!(commits.len(), 2);
    for (url_path, commit) in &commits {
        assert!(url_path.ends_with("/message.txt"));
        assert_eq!(commit["message"], "Upload: message from phone");
    }
}

#[tokio::test]
async fn test_unfilled_file_input_commits_metadata_only() {
    let env = TestEnv::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(contents_route()))
        .respond_with(ResponseTemplate::new(201).set_body_json(contents_created("u")))
        .expect(1)
        .mount(&env.github)
        .await;

    let form = Form::new()
        .text("name", "Abdullah")
        .part("file", Part::bytes(Vec::new()).file_name(""));
    let response = env.post_form(form).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["file"].is_null());

    let commits = env.commits().await;
    assert_eq!(commits.len(), 1);
    assert!(commits[0].0.ends_with("/message.txt"));
    assert_eq!(commits[0].1["message"], "Upload: message from Abdullah");
}

#[tokio::test]
async fn test_health_and_not_found() {
    let env = TestEnv::start().await;

    let health = env.client.get(env.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.json::<Value>().await.unwrap()["status"], "ok");

    let missing = env.client.get(env.url("/nope")).send().await.unwrap();
    assert_eq!(missing.status(), 404);
}
