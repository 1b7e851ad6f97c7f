use openbooks_engine::{SseSettings, SseTransport, Transport, TransportError};
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STATUS: &str = r#"{"type":0,"appearance":1,"title":"hello"}"#;
const CONNECTED: &str = r#"{"type":1,"name":"reader_42"}"#;

#[tokio::test]
async fn stream_yields_each_event_then_ends() {
    let server = MockServer::start().await;
    let body = format!(": keepalive\n\ndata: {STATUS}\n\nevent: message\ndata: {CONNECTED}\r\n\r\n");
    Mock::given(method("GET"))
        .and(path("/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = SseTransport::new(&server.uri(), SseSettings::default()).unwrap();
    let mut connection = transport.connect().await.unwrap();

    assert_eq!(connection.frames.next_frame().await, Some(Ok(STATUS.to_string())));
    assert_eq!(connection.frames.next_frame().await, Some(Ok(CONNECTED.to_string())));
    assert_eq!(connection.frames.next_frame().await, None);
}

#[tokio::test]
async fn requests_are_posted_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;
    let frame = r#"{"type":2,"query":"dune","requestId":3}"#;
    Mock::given(method("POST"))
        .and(path("/request"))
        .and(header("content-type", "application/json"))
        .and(body_string(frame))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let transport = SseTransport::new(&server.uri(), SseSettings::default()).unwrap();
    let mut connection = transport.connect().await.unwrap();
    connection.requests.send(frame).await.unwrap();
}

#[tokio::test]
async fn rejected_request_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/request"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let transport = SseTransport::new(&server.uri(), SseSettings::default()).unwrap();
    let mut connection = transport.connect().await.unwrap();
    assert_eq!(
        connection.requests.send("{}").await,
        Err(TransportError::Status(503))
    );
}

#[tokio::test]
async fn non_success_stream_status_fails_connect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = SseTransport::new(&server.uri(), SseSettings::default()).unwrap();
    assert!(matches!(
        transport.connect().await,
        Err(TransportError::Status(404))
    ));
}

#[test]
fn invalid_base_url_is_rejected() {
    assert!(matches!(
        SseTransport::new("not a url", SseSettings::default()),
        Err(TransportError::InvalidEndpoint(_))
    ));
}
