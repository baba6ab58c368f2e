use serde_json::{Value, json};
use sherpa_http::{HttpClient, HttpError, RequestOpts};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(2);
    let got: Value = client
        .get_json("/v1/items", RequestOpts::default())
        .await
        .expect("second attempt succeeds");
    assert_eq!(got["ok"], true);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": {"message": "bad model"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .post_json::<_, Value>("/chat", Some("sk-test"), &json!({"model": "x"}))
        .await
        .unwrap_err();

    match err {
        HttpError::Api { status, message } => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(message, "bad model");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn get_text_accepts_absolute_urls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
        .mount(&server)
        .await;

    let client = HttpClient::new("https://unused.invalid").unwrap();
    let body = client
        .get_text(&format!("{}/page", server.uri()), RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(body, "<html>hi</html>");
}
