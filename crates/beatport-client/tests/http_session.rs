//! The reqwest-backed session primitive against a mock storefront.

use beatport_client::{
    resume, Beatport, ClientConfig, Error, HttpSession, LoginFailure, Page, SessionPrimitive,
    Stage,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        base_url: server.uri(),
        embed_url: server.uri(),
        timeout_ms: 2_000,
        ..Default::default()
    }
}

/// Mount a "who am I" endpoint accepting the `s3cr3t` session cookie and
/// return a facade resumed from it.
async fn resumed(server: &MockServer) -> Beatport {
    Mock::given(method("GET"))
        .and(path("/api/my-beatport"))
        .and(header_regex("cookie", "session=s3cr3t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .mount(server)
        .await;
    Beatport::new(resume(config_for(server), "s3cr3t", "tok-9").await.unwrap())
}

#[tokio::test]
async fn test_slow_response_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let session = HttpSession::new(ClientConfig {
        timeout_ms: 100,
        ..config_for(&server)
    })
    .unwrap();
    let uri = format!("{}/api/slow", server.uri());
    let err = session.get_json(&uri).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_non_json_body_is_a_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let session = HttpSession::new(config_for(&server)).unwrap();
    let err = session
        .get_json(&format!("{}/api/broken", server.uri()))
        .await
        .unwrap_err();
    match err {
        Error::Json { snippet, .. } => assert!(snippet.contains("oops")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalidated_session_reports_login_failed() {
    let server = MockServer::start().await;
    let beatport = resumed(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/cart/cart"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = beatport.get_cart_item_ids().await.unwrap_err();
    assert!(err.requires_login());
    assert!(matches!(err, Error::LoginFailed { .. }));
}

#[tokio::test]
async fn test_redirect_to_login_reports_login_failed() {
    let server = MockServer::start().await;
    let beatport = resumed(&server).await;

    Mock::given(method("GET"))
        .and(path("/downloads/downloaded"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/account/login"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/account/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
        .mount(&server)
        .await;

    let err = beatport
        .get_downloaded_tracks(Page::new(1, 25).unwrap())
        .await
        .unwrap_err();
    assert!(err.requires_login());
}

#[tokio::test]
async fn test_cart_mutation_sends_csrf_and_cookie() {
    let server = MockServer::start().await;
    let beatport = resumed(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/cart/42"))
        .and(header("x-csrftoken", "tok-9"))
        .and(header_regex("cookie", "session=s3cr3t"))
        .and(body_json(json!({"items": [{"type": "track", "id": 9915168}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "items": [{"id": 9915168}]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/cart/42"))
        .and(header("x-csrftoken", "tok-9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let added = beatport.add_item_to_cart(9915168, 42).await.unwrap();
    assert_eq!(added["items"][0]["id"], 9915168);
    let removed = beatport.remove_item_from_cart(9915168, 42).await.unwrap();
    assert!(removed.is_null());
}

#[tokio::test]
async fn test_cart_fan_out_over_http() {
    let server = MockServer::start().await;
    let beatport = resumed(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/cart/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"carts": [{"id": 1}, {"id": 2}]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"items": [{"id": 1}, {"id": 2}]}))
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cart/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": 3}]})))
        .mount(&server)
        .await;

    assert_eq!(beatport.get_cart_item_ids().await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_listing_request_carries_page_number() {
    let server = MockServer::start().await;
    let beatport = resumed(&server).await;

    Mock::given(method("GET"))
        .and(path("/label/_/5/tracks"))
        .and(query_param("page", "2"))
        .and(query_param("per-page", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<script>window.Playables = {\"tracks\": [{\"id\": 8, \"name\": \"Eight\"}]};</script>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let page = beatport
        .get_label_tracks(5, Page::new(2, 10).unwrap())
        .await
        .unwrap();
    assert_eq!(page.tracks.len(), 1);
    assert!(page.is_last());
}

#[tokio::test]
async fn test_download_two_step_over_http() {
    let server = MockServer::start().await;
    let beatport = resumed(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/downloads/purchase"))
        .and(query_param("downloadId", "900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"download_url": format!("{}/files/900.mp3?sig=abc", server.uri())}),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/900.mp3"))
        .and(query_param("sig", "abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(b"ID3\x04\x00audio".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let download = beatport.download_by_id(900).await.unwrap();
    assert_eq!(download.content_type.as_deref(), Some("audio/mpeg"));
    let mut file = Vec::new();
    let written = download.write_to(&mut file).await.unwrap();
    assert_eq!(written, 10);
    assert_eq!(file, b"ID3\x04\x00audio");
}

#[tokio::test]
async fn test_download_not_fetched_when_resolution_fails() {
    let server = MockServer::start().await;
    let beatport = resumed(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/downloads/purchase"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/900.mp3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = beatport.download_by_id(900).await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 500, .. }));
}

#[tokio::test]
async fn test_account_summary_error_payload_reports_login_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/my-beatport"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/my-beatport"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "Authentication required"})),
        )
        .mount(&server)
        .await;

    let beatport = Beatport::new(resume(config_for(&server), "s3cr3t", "tok-9").await.unwrap());
    let err = beatport.get_account_summary().await.unwrap_err();
    assert!(err.requires_login());
    assert!(matches!(
        err,
        Error::LoginFailed {
            stage: Stage::Established,
            cause: LoginFailure::Rejected(ref reason),
        } if reason == "Authentication required"
    ));
}
