//! Tests for the JMA client against a mock HTTP server

use tenki::config::ForecastConfig;
use tenki::{FetchError, ForecastSource, JmaClient, RegionCode};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chiba_report() -> serde_json::Value {
    serde_json::json!({
        "publishingOffice": "銚子地方気象台",
        "reportDatetime": "2024-01-01T10:38:00+09:00",
        "targetArea": "千葉県",
        "headlineText": "",
        "text": "　千葉県は、高気圧に覆われて晴れています。\n\n　１日は、晴れるでしょう。"
    })
}

fn client_for(server: &MockServer) -> JmaClient {
    let config = ForecastConfig {
        base_url: format!("{}/bosai/forecast/data/overview_forecast", server.uri()),
        ..ForecastConfig::default()
    };
    JmaClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_fetch_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bosai/forecast/data/overview_forecast/120000.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chiba_report()))
        .expect(1)
        .mount(&server)
        .await;

    let report = client_for(&server)
        .fetch(RegionCode::new(120000))
        .await
        .unwrap();

    assert_eq!(report.target_area, "千葉県");
    assert_eq!(report.publishing_office, "銚子地方気象台");
    assert!(report.text.contains("\n\n"));
}

#[tokio::test]
async fn test_fetch_not_found_is_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bosai/forecast/data/overview_forecast/999999.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch(RegionCode::new(999999))
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::Status { status: 404 });
}

#[tokio::test]
async fn test_fetch_server_error_is_not_retried_by_default() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch(RegionCode::new(130000))
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::Status { status: 503 });
}

#[tokio::test]
async fn test_fetch_malformed_body_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch(RegionCode::new(130000))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Parse { .. }));
}

#[tokio::test]
async fn test_fetch_missing_field_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "targetArea": "千葉県" })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch(RegionCode::new(120000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "parse");
}

#[tokio::test]
async fn test_fetch_unreachable_host_is_network_error() {
    // bind then drop, so nothing is listening on the port
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = ForecastConfig {
        base_url: format!("http://127.0.0.1:{port}"),
        timeout_seconds: 5,
        ..ForecastConfig::default()
    };
    let err = JmaClient::new(&config)
        .unwrap()
        .fetch(RegionCode::new(120000))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Network { .. }));
}
