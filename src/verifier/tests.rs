use std::time::Duration;

use serial_test::serial;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::*;

fn candidates() -> Vec<ScoreItem> {
    vec![
        ScoreItem::new("denim", 0.62),
        ScoreItem::new("Twill", 0.61),
        ScoreItem::new("canvas", 0.40),
    ]
}

fn labels(items: &[ScoreItem]) -> Vec<&str> {
    items.iter().map(|i| i.label.as_str()).collect()
}

/// Serves one canned HTTP response and returns the raw request it received.
async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        String::from_utf8_lossy(&request).to_string()
    });

    (url, handle)
}

#[test]
fn test_resolve_reply_promotes_case_insensitive_match() {
    let ranked = resolve_reply("  twill.\n", &candidates()).unwrap();
    assert_eq!(labels(&ranked), vec!["Twill", "denim", "canvas"]);
}

#[test]
fn test_resolve_reply_keeps_order_for_rank_one() {
    let ranked = resolve_reply("\"DENIM\"", &candidates()).unwrap();
    assert_eq!(labels(&ranked), vec!["denim", "Twill", "canvas"]);
}

#[test]
fn test_resolve_reply_unknown_label() {
    let ranked = resolve_reply("velvet", &candidates()).unwrap();
    assert_eq!(labels(&ranked), vec!["velvet"]);
}

#[test]
fn test_resolve_reply_empty_is_malformed() {
    assert!(matches!(
        resolve_reply("  \n", &candidates()),
        Err(VerifierError::Malformed(_))
    ));
}

#[test]
fn test_candidate_prompt_lists_ranks() {
    let prompt = candidate_prompt(&candidates());
    assert!(prompt.contains("1. denim (score: 0.62)"));
    assert!(prompt.contains("3. canvas (score: 0.40)"));
}

#[test]
fn test_backend_parse() {
    assert_eq!("none".parse::<VerifierBackend>().unwrap(), VerifierBackend::None);
    assert_eq!("Ollama".parse::<VerifierBackend>().unwrap(), VerifierBackend::Ollama);
    assert_eq!("OPENAI".parse::<VerifierBackend>().unwrap(), VerifierBackend::OpenAi);
    assert!(matches!(
        "triton".parse::<VerifierBackend>(),
        Err(ConfigError::UnknownBackend { .. })
    ));
}

#[test]
fn test_openai_requires_api_key() {
    let config = VerifierConfig {
        backend: VerifierBackend::OpenAi,
        ..Default::default()
    };
    assert!(matches!(
        VerifierCapability::from_config(&config),
        Err(ConfigError::MissingEnvVar {
            name: "SWATCH_OPENAI_API_KEY"
        })
    ));
}

#[test]
fn test_capability_from_config() {
    let none = VerifierCapability::from_config(&VerifierConfig::default()).unwrap();
    assert!(!none.is_available());

    let ollama = VerifierCapability::from_config(&VerifierConfig {
        backend: VerifierBackend::Ollama,
        ..Default::default()
    })
    .unwrap();
    assert!(ollama.is_available());
}

#[test]
fn test_zero_timeout_rejected() {
    let config = VerifierConfig {
        timeout: Duration::ZERO,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn test_verifier_config_from_env() {
    let vars = [
        ("SWATCH_VERIFIER_BACKEND", "ollama"),
        ("SWATCH_VERIFIER_TIMEOUT_MS", "1500"),
        ("SWATCH_OLLAMA_MODEL", "llava:7b"),
    ];
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { std::env::set_var(key, value) };
    }

    let config = VerifierConfig::from_env();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { std::env::remove_var(key) };
    }

    let config = config.unwrap();
    assert_eq!(config.backend, VerifierBackend::Ollama);
    assert_eq!(config.timeout, Duration::from_millis(1500));
    assert_eq!(config.ollama_model, "llava:7b");
    assert_eq!(config.ollama_url, config::DEFAULT_OLLAMA_URL);
}

#[test]
#[serial]
fn test_verifier_config_bad_backend() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe { std::env::set_var("SWATCH_VERIFIER_BACKEND", "gpt") };
    let result = VerifierConfig::from_env();
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe { std::env::remove_var("SWATCH_VERIFIER_BACKEND") };

    assert!(matches!(result, Err(ConfigError::UnknownBackend { .. })));
}

#[test]
fn test_payload_debug_hides_bytes() {
    let payload = VerifierPayload::png(vec![1, 2, 3]);
    let debug = format!("{:?}", payload);
    assert!(debug.contains("bytes: 3"));
    assert_eq!(payload.base64(), "AQID");
}

const CHAT_REPLY: &str = r#"{
    "id": "chatcmpl-1",
    "object": "chat.completion",
    "created": 1,
    "model": "gpt-4o-mini",
    "choices": [{
        "index": 0,
        "message": { "role": "assistant", "content": "canvas" },
        "finish_reason": "stop"
    }],
    "usage": { "prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11 }
}"#;

/// Accepts one connection and never answers.
async fn serve_silent() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    (url, handle)
}

#[test]
fn test_ollama_endpoint_uses_openai_surface() {
    let verifier = ChatVerifier::ollama("http://localhost:11434", "llava:13b", Duration::from_secs(1));
    assert_eq!(verifier.endpoint(), "http://localhost:11434/v1/");
    assert_eq!(verifier.name(), "ollama");
    assert_eq!(verifier.model(), "llava:13b");

    let verifier = ChatVerifier::ollama("http://gpu-box:11434/v1/", "llava:13b", Duration::from_secs(1));
    assert_eq!(verifier.endpoint(), "http://gpu-box:11434/v1/");
}

#[test]
fn test_openai_endpoint_gets_trailing_slash() {
    let verifier = ChatVerifier::openai(
        "https://api.openai.com/v1",
        "gpt-4o-mini",
        "sk-test".to_string(),
        Duration::from_secs(1),
    );
    assert_eq!(verifier.endpoint(), "https://api.openai.com/v1/");
    assert_eq!(verifier.name(), "openai");
}

#[tokio::test]
async fn test_openai_round_trip() {
    let (url, server) = serve_once("200 OK", CHAT_REPLY.to_string()).await;
    let verifier = ChatVerifier::openai(
        &format!("{}/v1/", url),
        "gpt-4o-mini",
        "sk-test".to_string(),
        Duration::from_secs(5),
    );

    let ranked = verifier
        .rerank(&VerifierPayload::jpeg(vec![1, 2, 3]), &candidates())
        .await
        .unwrap();
    assert_eq!(labels(&ranked), vec!["canvas", "Twill", "denim"]);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /v1/chat/completions"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test"));
    assert!(request.contains("gpt-4o-mini"));
    assert!(request.contains("data:image/jpeg;base64,AQID"));
    assert!(request.contains("1. denim (score: 0.62)"));
}

#[tokio::test]
async fn test_provider_http_error() {
    let (url, server) = serve_once("500 Internal Server Error", "{}".to_string()).await;
    let verifier = ChatVerifier::openai(&url, "m", "k".to_string(), Duration::from_secs(5));

    let err = verifier
        .rerank(&VerifierPayload::png(vec![1]), &candidates())
        .await
        .unwrap_err();
    assert!(matches!(err, VerifierError::Provider(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn test_empty_choices_is_an_error() {
    let (url, server) = serve_once("200 OK", r#"{"choices":[]}"#.to_string()).await;
    let verifier = ChatVerifier::openai(&url, "m", "k".to_string(), Duration::from_secs(5));

    let err = verifier
        .rerank(&VerifierPayload::png(vec![1]), &candidates())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VerifierError::Malformed(_) | VerifierError::Provider(_)
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn test_backend_honours_timeout() {
    let (url, server) = serve_silent().await;
    let verifier = ChatVerifier::openai(&url, "m", "k".to_string(), Duration::from_millis(50));

    let err = verifier
        .rerank(&VerifierPayload::png(vec![1]), &candidates())
        .await
        .unwrap_err();
    assert!(matches!(err, VerifierError::Timeout { timeout_ms: 50 }));
    server.abort();
}

#[tokio::test]
async fn test_missing_payload() {
    let verifier = ChatVerifier::ollama("http://127.0.0.1:9", "llava:13b", Duration::from_secs(1));
    let err = verifier
        .rerank(&VerifierPayload::png(Vec::new()), &candidates())
        .await
        .unwrap_err();
    assert!(matches!(err, VerifierError::MissingPayload));
}

#[tokio::test]
async fn test_mock_records_candidates() {
    let mock = MockVerifier::choosing("twill");
    let ranked = mock
        .rerank(&VerifierPayload::png(vec![1]), &candidates())
        .await
        .unwrap();

    assert_eq!(ranked[0].label, "Twill");
    assert_eq!(mock.calls(), 1);
    assert_eq!(mock.seen_candidates(), vec![vec!["denim", "Twill", "canvas"]]);
}
