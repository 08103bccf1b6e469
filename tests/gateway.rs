mod support;

use base64::Engine;
use quick_vision::gateway::{GatewayError, GroqGateway, VisionBackend};
use quick_vision::retry::RetryPolicy;
use quick_vision::settings::VisionSettings;
use serde_json::{json, Value};
use std::net::{SocketAddr, TcpListener};

fn settings(addr: SocketAddr) -> VisionSettings {
    VisionSettings {
        api_key: Some("test-key".into()),
        endpoint: format!("http://{addr}/openai/v1/responses"),
        ..Default::default()
    }
}

fn analyze(addr: SocketAddr) -> Result<String, GatewayError> {
    GroqGateway::new(&settings(addr))
        .unwrap()
        .analyze(b"png", "prompt", "model")
}

#[test]
fn posts_image_and_reads_answer() {
    let answer = json!({
        "output": [{
            "type": "message",
            "content": [{ "type": "output_text", "text": "  1) A  " }],
        }],
    });
    let (addr, requests) = support::serve(vec![(200, answer.to_string())]);
    let gateway = GroqGateway::new(&settings(addr)).unwrap();

    let text = gateway.analyze(b"png-bytes", "what is shown?", "model-x").unwrap();
    assert_eq!(text, "1) A");

    let request = requests.recv().unwrap();
    let head = request.head.to_ascii_lowercase();
    assert!(head.starts_with("post /openai/v1/responses"));
    assert!(head.contains("authorization: bearer test-key"));

    let body: Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["model"], "model-x");
    let content = &body["input"][0]["content"];
    assert_eq!(content[0]["text"], "what is shown?");
    let expected = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(b"png-bytes")
    );
    assert_eq!(content[1]["image_url"], expected.as_str());
}

#[test]
fn chat_style_answer_is_accepted() {
    let answer = json!({ "choices": [{ "message": { "content": "2) C" } }] });
    let (addr, _requests) = support::serve(vec![(200, answer.to_string())]);
    assert_eq!(analyze(addr).unwrap(), "2) C");
}

#[test]
fn empty_answer_is_not_an_error() {
    let answer = json!({ "output_text": "   " });
    let (addr, _requests) = support::serve(vec![(200, answer.to_string())]);
    assert_eq!(analyze(addr).unwrap(), "");
}

#[test]
fn rate_limit_is_transient() {
    let (addr, _requests) = support::serve(vec![(429, r#"{"error":"slow down"}"#.into())]);
    let err = analyze(addr).unwrap_err();
    assert!(matches!(err, GatewayError::Http { status: 429, .. }));
    assert!(err.is_transient());
}

#[test]
fn server_unavailable_is_transient() {
    let (addr, _requests) = support::serve(vec![(503, "busy".into())]);
    assert!(analyze(addr).unwrap_err().is_transient());
}

#[test]
fn unauthorized_is_permanent() {
    let (addr, _requests) = support::serve(vec![(401, r#"{"error":"bad key"}"#.into())]);
    let err = analyze(addr).unwrap_err();
    match &err {
        GatewayError::Http { status, body } => {
            assert_eq!(*status, 401);
            assert!(body.contains("bad key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_transient());
}

#[test]
fn unknown_layout_is_permanent() {
    let (addr, _requests) = support::serve(vec![(200, r#"{"status":"done"}"#.into())]);
    let err = analyze(addr).unwrap_err();
    assert!(matches!(err, GatewayError::UnexpectedShape(_)));
    assert!(!err.is_transient());
}

#[test]
fn non_json_body_is_malformed() {
    let (addr, _requests) = support::serve(vec![(200, "<html>oops</html>".into())]);
    assert!(matches!(analyze(addr).unwrap_err(), GatewayError::Malformed(_)));
}

#[test]
fn missing_api_key_fails_without_request() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut settings = settings(listener.local_addr().unwrap());
    settings.api_key = Some("   ".into());
    let err = GroqGateway::new(&settings)
        .unwrap()
        .analyze(b"png", "prompt", "model")
        .unwrap_err();
    assert!(matches!(err, GatewayError::MissingApiKey));
    assert_eq!(err.to_string(), "GROQ_API_KEY is not set.");
}

#[test]
fn refused_connection_is_transient() {
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let err = analyze(addr).unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)));
    assert!(err.is_transient());
}

#[test]
fn retries_stop_at_the_attempt_cap() {
    let (addr, requests) = support::serve(vec![
        (503, "busy".into()),
        (503, "busy".into()),
        (503, "busy".into()),
        (200, json!({ "output_text": "too late" }).to_string()),
    ]);
    let gateway = GroqGateway::new(&settings(addr)).unwrap();
    let policy = RetryPolicy::default();

    let mut slept = Vec::new();
    let result = policy.run_with_sleep(
        |_| gateway.analyze(b"png", "prompt", "model"),
        |d| slept.push(d),
    );

    assert!(matches!(result, Err(GatewayError::Http { status: 503, .. })));
    assert_eq!(requests.try_iter().count(), 3);
    assert_eq!(slept.len(), 2);
}
