use pricewatch_market::{FetchFailure, FetchSettings, Fetcher};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher_for(server: &MockServer, timeout: Duration) -> Fetcher {
    Fetcher::new(FetchSettings {
        search_url: format!("{}/listado/{{query}}", server.uri()),
        timeout,
        ..FetchSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn fetch_returns_body_for_slugified_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listado/zapatillas-running-hombre"))
        .and(header("user-agent", "Mozilla/5.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fetcher_for(&server, Duration::from_secs(5))
        .fetch("  zapatillas running   hombre ")
        .await
        .unwrap();
    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn non_success_status_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher_for(&server, Duration::from_secs(5))
        .fetch("mate")
        .await
        .unwrap_err();
    match &err {
        FetchFailure::Transport { url, source } => {
            assert!(url.ends_with("/listado/mate"));
            assert_eq!(source.status().map(|s| s.as_u16()), Some(404));
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn slow_server_times_out_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_millis(800)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher_for(&server, Duration::from_millis(100))
        .fetch("termo")
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");
}

#[tokio::test]
async fn unreachable_host_is_a_transport_failure() {
    let fetcher = Fetcher::new(FetchSettings {
        search_url: "http://127.0.0.1:9/{query}".into(),
        timeout: Duration::from_secs(2),
        ..FetchSettings::default()
    })
    .unwrap();

    let err = fetcher.fetch("mate").await.unwrap_err();
    assert!(matches!(err, FetchFailure::Transport { .. }));
}
