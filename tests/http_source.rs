//! HTTP source and client behaviour against a local mock server.

use mockito::{Matcher, Server};
use resilient_harvest::pipeline::AcquisitionPipeline;
use resilient_harvest::resilience::pacing::PacingConfig;
use resilient_harvest::source::{HttpPageSource, SourceAdapter};
use resilient_harvest::transport::{ChallengeClient, ClientConfig, RequestOptions};
use resilient_harvest::{Completion, Error};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const CONTEST: &str = "weekly-contest-460";
const RANKING_PATH: &str = "/contest/api/ranking/weekly-contest-460/";

fn client() -> Arc<ChallengeClient> {
    Arc::new(
        ChallengeClient::new(ClientConfig {
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap(),
    )
}

fn ranking_source(base: &str) -> HttpPageSource {
    HttpPageSource::new(
        client(),
        format!("{}/contest/api/ranking/{{source}}/?pagination={{page}}&region=global", base),
    )
    .unwrap()
    .with_referer_template(format!("{}/contest/{{source}}/ranking/", base))
}

fn page_query(page: u32) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("pagination".into(), page.to_string()),
        Matcher::UrlEncoded("region".into(), "global".into()),
    ])
}

fn submissions(from: usize, n: usize) -> String {
    let rows: Vec<_> = (from..from + n)
        .map(|i| json!({"username": format!("user{}", i), "rank": i, "score": 18}))
        .collect();
    json!({ "submissions": rows, "total_rank": [] }).to_string()
}

#[tokio::test]
async fn test_ranking_page_extracted() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", RANKING_PATH)
        .match_query(page_query(1))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(submissions(1, 3))
        .create_async()
        .await;

    let page = ranking_source(&server.url()).fetch_page(CONTEST, 1).await.unwrap();

    mock.assert_async().await;
    assert_eq!(page.records.len(), 3);
    assert_eq!(page.records[0].get_str("username"), Some("user1"));
    assert!(!page.is_last_page);
    assert!(page.response_time.is_some());
}

#[tokio::test]
async fn test_browser_headers_and_session_cookies_sent() {
    let mut server = Server::new_async().await;
    let referer = format!("{}/contest/{}/ranking/", server.url(), CONTEST);
    let mock = server
        .mock("GET", RANKING_PATH)
        .match_query(Matcher::Any)
        .match_header("user-agent", Matcher::Regex("Mozilla/5.0".into()))
        .match_header("cookie", Matcher::Regex("sessionid=[^;]+; csrftoken=".into()))
        .match_header("referer", referer.as_str())
        .match_header("sec-fetch-mode", "cors")
        .with_status(200)
        .with_body(submissions(1, 1))
        .create_async()
        .await;

    ranking_source(&server.url()).fetch_page(CONTEST, 2).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_caller_cookie_suppresses_synthetic_one() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/probe")
        .match_header("cookie", "LEETCODE_SESSION=abc")
        .with_status(200)
        .create_async()
        .await;

    let resp = client()
        .fetch(
            &format!("{}/probe", server.url()),
            &RequestOptions::new().with_cookie("LEETCODE_SESSION=abc"),
        )
        .await
        .unwrap();
    mock.assert_async().await;
    assert!(resp.is_success());
}

#[tokio::test]
async fn test_forbidden_is_challenge_blocked() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", RANKING_PATH)
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body("<html>Forbidden</html>")
        .create_async()
        .await;

    let err = ranking_source(&server.url()).fetch_page(CONTEST, 1).await.unwrap_err();
    assert!(matches!(err, Error::ChallengeBlocked { status: 403, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_throttled_carries_retry_after() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", RANKING_PATH)
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("retry-after", "7")
        .create_async()
        .await;

    let err = ranking_source(&server.url()).fetch_page(CONTEST, 1).await.unwrap_err();
    match err {
        Error::RateLimited { retry_after_ms, .. } => assert_eq!(retry_after_ms, Some(7000)),
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_retryable_remote() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", RANKING_PATH)
        .match_query(Matcher::Any)
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let err = ranking_source(&server.url()).fetch_page(CONTEST, 1).await.unwrap_err();
    match err {
        Error::Remote {
            status, retryable, ..
        } => {
            assert_eq!(status, 502);
            assert!(retryable);
        }
        other => panic!("expected Remote, got {:?}", other),
    }
}

#[tokio::test]
async fn test_not_found_is_not_retryable() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", RANKING_PATH)
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let err = ranking_source(&server.url()).fetch_page(CONTEST, 1).await.unwrap_err();
    assert!(matches!(err, Error::Remote { status: 404, retryable: false, .. }));
}

#[tokio::test]
async fn test_challenge_interstitial_with_ok_status() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", RANKING_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><head><title>Just a moment...</title></head><body></body></html>")
        .create_async()
        .await;

    let err = ranking_source(&server.url()).fetch_page(CONTEST, 1).await.unwrap_err();
    assert!(matches!(err, Error::ChallengeBlocked { status: 200, .. }));
}

#[tokio::test]
async fn test_unrecognised_body_ends_data() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", RANKING_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"message": "contest not found"}"#)
        .create_async()
        .await;

    let page = ranking_source(&server.url()).fetch_page(CONTEST, 1).await.unwrap();
    assert!(page.records.is_empty());
    assert!(page.is_last_page);
}

#[tokio::test]
async fn test_graphql_and_embedded_shapes() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", RANKING_PATH)
        .match_query(page_query(1))
        .with_status(200)
        .with_body(
            json!({"data": {"contestRanking": {"submissions": [{"username": "gql"}]}}})
                .to_string(),
        )
        .create_async()
        .await;
    let next_data = json!({"props": {"pageProps": {"submissions": [{"username": "embedded"}]}}});
    server
        .mock("GET", RANKING_PATH)
        .match_query(page_query(2))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(format!(
            r#"<html><body><script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
            next_data
        ))
        .create_async()
        .await;

    let source = ranking_source(&server.url());
    let first = source.fetch_page(CONTEST, 1).await.unwrap();
    assert_eq!(first.records[0].get_str("username"), Some("gql"));
    let second = source.fetch_page(CONTEST, 2).await.unwrap();
    assert_eq!(second.records[0].get_str("username"), Some("embedded"));
}

#[tokio::test]
async fn test_connectivity_probe() {
    let mut server = Server::new_async().await;
    server.mock("GET", "/ok").with_status(200).create_async().await;
    server.mock("GET", "/blocked").with_status(403).create_async().await;

    let client = client();
    assert!(client.test_connectivity(&format!("{}/ok", server.url())).await);
    assert!(!client.test_connectivity(&format!("{}/blocked", server.url())).await);
    // nothing listens on port 9 locally
    assert!(!client.test_connectivity("http://127.0.0.1:9/").await);
}

#[tokio::test]
async fn test_pipeline_over_http_source() {
    let mut server = Server::new_async().await;
    for (page, from, n) in [(1u32, 1usize, 2usize), (2, 3, 2), (3, 5, 1)] {
        server
            .mock("GET", RANKING_PATH)
            .match_query(page_query(page))
            .with_status(200)
            .with_body(submissions(from, n))
            .expect(1)
            .create_async()
            .await;
    }

    let pipeline = AcquisitionPipeline::builder()
        .source(Arc::new(ranking_source(&server.url())))
        .pacing(
            PacingConfig::new()
                .with_min_delay(Duration::from_millis(1))
                .with_base_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(5))
                .with_jitter_factor(0.0),
        )
        .build()
        .unwrap();

    let session = pipeline.run(CONTEST, 2, 10).await.unwrap();
    assert_eq!(session.records.len(), 5);
    assert_eq!(session.completion, Some(Completion::EndOfData));
    assert_eq!(session.records[4].get_str("username"), Some("user5"));
}
