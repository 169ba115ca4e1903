use std::sync::Arc;
use std::time::Duration;

use pixrelay::error::RelayError;
use pixrelay::orchestrator::Orchestrator;
use pixrelay::providers::OpenAiImageAdapter;
use pixrelay::registry::CapabilityRegistry;
use pixrelay::traits::ImageAdapter;
use pixrelay::types::{
    EditOptions, GenerateOptions, ImageElement, ImageSource, InputImage, OpenAiSettings,
    ProviderConfig, ProviderSettings,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

fn config(index: usize, server: &MockServer, settings: OpenAiSettings) -> ProviderConfig {
    ProviderConfig::new(
        index,
        format!("{}/v1", server.uri()),
        ProviderSettings::OpenAi(settings),
    )
    .with_timeout(Duration::from_secs(5))
}

fn adapter() -> OpenAiImageAdapter {
    OpenAiImageAdapter::new(Arc::new(CapabilityRegistry::new()))
}

fn url_response(url: &str) -> serde_json::Value {
    json!({
        "created": 1_700_000_000,
        "data": [{ "url": url, "revised_prompt": "a lighthouse, dusk" }]
    })
}

#[tokio::test]
async fn dall_e_3_generation_sends_gated_fields_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "dall-e-3",
            "prompt": "a lighthouse",
            "size": "1792x1024",
            "quality": "hd",
            "style": "vivid",
            "response_format": "url"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(url_response("https://cdn.example.com/a.png")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut options = GenerateOptions::new("a lighthouse").with_size("1792x1024");
    options.quality = Some("hd".into());
    options.style = Some("vivid".into());
    options.response_format = Some("url".into());

    let response = adapter()
        .generate_image(&config(0, &server, OpenAiSettings::new("sk-test")), &options)
        .await
        .unwrap();

    assert_eq!(response.images.len(), 1);
    assert_eq!(response.images[0].url.as_deref(), Some("https://cdn.example.com/a.png"));
    assert_eq!(
        response.images[0].revised_prompt.as_deref(),
        Some("a lighthouse, dusk")
    );
    assert_eq!(response.metadata.get("created"), Some(&json!(1_700_000_000)));
}

#[tokio::test]
async fn gpt_image_generation_omits_response_format_and_style() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "b64_json": "iVBORw0KGgoAAAANSUhEUg" }],
            "usage": { "input_tokens": 12, "output_tokens": 300, "total_tokens": 312 }
        })))
        .mount(&server)
        .await;

    let mut options = GenerateOptions::new("a lighthouse").with_model("gpt-image-1");
    options.style = Some("natural".into());
    options.response_format = Some("url".into());
    options.background = Some("transparent".into());
    options.output_compression = Some(250);

    let response = adapter()
        .generate_image(&config(0, &server, OpenAiSettings::new("sk-test")), &options)
        .await
        .unwrap();
    assert_eq!(response.images[0].mime_type.as_deref(), Some("image/png"));
    assert_eq!(response.usage.map(|u| u.total_tokens), Some(312));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["model"], "gpt-image-1");
    assert_eq!(body["background"], "transparent");
    assert_eq!(body["output_compression"], 100);
    assert!(body.get("response_format").is_none());
    assert!(body.get("style").is_none());
}

#[tokio::test]
async fn unauthorized_configuration_is_not_retried_and_fails_over() {
    let rejecting = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .expect(1)
        .mount(&rejecting)
        .await;

    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(header("authorization", "Bearer sk-good"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(url_response("https://cdn.example.com/b.png")),
        )
        .expect(1)
        .mount(&healthy)
        .await;

    let orchestrator = Orchestrator::builder()
        .adapter(Arc::new(adapter()))
        .configs(vec![
            config(0, &rejecting, OpenAiSettings::new("sk-bad")).with_retry_count(3),
            config(1, &healthy, OpenAiSettings::new("sk-good")),
        ])
        .base_delay(Duration::from_millis(10))
        .build();

    let generation = orchestrator
        .generate_image(GenerateOptions::new("a lighthouse"))
        .await
        .unwrap();

    assert_eq!(generation.config_index, 1);
    assert_eq!(
        generation.elements,
        vec![ImageElement::Image(ImageSource::Url(
            "https://cdn.example.com/b.png".into()
        ))]
    );
    assert_eq!(generation.failed_attempts.len(), 1);
    assert_eq!(
        generation.failed_attempts[0].message,
        "API error 401: Incorrect API key provided"
    );
}

#[tokio::test]
async fn server_errors_are_retried_within_the_configuration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(url_response("https://cdn.example.com/c.png")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::builder()
        .adapter(Arc::new(adapter()))
        .configs(vec![config(0, &server, OpenAiSettings::new("sk-test")).with_retry_count(2)])
        .base_delay(Duration::from_millis(10))
        .build();

    let generation = orchestrator
        .generate_image(GenerateOptions::new("a lighthouse"))
        .await
        .unwrap();
    assert_eq!(generation.config_index, 0);
    assert!(generation.failed_attempts.is_empty());
}

#[tokio::test]
async fn rate_limits_surface_as_rate_limit_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(json!({ "error": { "message": "slow down" } })),
        )
        .mount(&server)
        .await;

    let err = adapter()
        .generate_image(
            &config(0, &server, OpenAiSettings::new("sk-test")),
            &GenerateOptions::new("x"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::RateLimitError(ref m) if m.contains("retry_after=7")));
    assert!(pixrelay::should_retry(&err));
}

#[tokio::test]
async fn gpt_image_edit_uploads_every_image_as_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/edits"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "b64_json": "iVBORw0KGgoAAAANSUhEUg" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = EditOptions::new(
        "put them on a beach",
        vec![InputImage::new(PNG.to_vec()), InputImage::new(PNG.to_vec())],
    )
    .with_model("gpt-image-1");

    adapter()
        .edit_image(&config(0, &server, OpenAiSettings::new("sk-test")), &options)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert_eq!(body.matches("name=\"image[]\"").count(), 2);
    assert!(body.contains("filename=\"image_0.png\""));
    assert!(body.contains("put them on a beach"));
}

#[tokio::test]
async fn dall_e_2_edit_rejects_multiple_images_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/edits"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let options = EditOptions::new(
        "x",
        vec![InputImage::new(PNG.to_vec()), InputImage::new(PNG.to_vec())],
    )
    .with_model("dall-e-2");
    let err = adapter()
        .edit_image(&config(0, &server, OpenAiSettings::new("sk-test")), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::InvalidParameter(_)));
}

#[tokio::test]
async fn model_list_is_filtered_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                { "id": "gpt-4o" },
                { "id": "dall-e-3" },
                { "id": "gpt-image-1" },
                { "id": "whisper-1" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = Arc::new(CapabilityRegistry::new());
    let adapter = OpenAiImageAdapter::new(registry.clone());
    let config = config(0, &server, OpenAiSettings::new("sk-test"));

    assert_eq!(adapter.models(&config).await, vec!["dall-e-3", "gpt-image-1"]);
    assert!(adapter.supports_model(&config, "gpt-image-1").await.unwrap());
    assert!(!adapter.supports_model(&config, "gpt-4o").await.unwrap());
    assert_eq!(
        registry.models_for(pixrelay::types::ProviderKind::OpenAi),
        vec!["dall-e-3", "gpt-image-1"]
    );
}

#[tokio::test]
async fn failed_model_list_uses_configured_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = config(
        0,
        &server,
        OpenAiSettings::new("sk-test").with_default_model("flux-schnell"),
    );
    assert_eq!(
        adapter().models(&config).await,
        vec!["flux-schnell", "dall-e-3", "dall-e-2", "gpt-image-1"]
    );
}

#[tokio::test]
async fn unlisted_model_falls_back_to_the_configured_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "dall-e-3" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(body_partial_json(json!({ "model": "dall-e-3", "prompt": "a lighthouse" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(url_response("https://cdn.example.com/d.png")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::builder()
        .adapter(Arc::new(adapter()))
        .configs(vec![
            config(0, &server, OpenAiSettings::new("sk-test").with_default_model("dall-e-3"))
                .with_retry_count(0),
        ])
        .fallback_to_default(true)
        .build();

    let generation = orchestrator
        .generate_image(GenerateOptions::new("a lighthouse").with_model("midjourney"))
        .await
        .unwrap();
    assert_eq!(generation.config_index, 0);
    assert!(generation.failed_attempts.is_empty());

    let requests = server.received_requests().await.unwrap();
    let sent: Vec<serde_json::Value> = requests
        .iter()
        .filter(|r| r.url.path() == "/v1/images/generations")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["model"], "dall-e-3");
}

#[tokio::test]
async fn usage_line_is_rendered_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "url": "https://cdn.example.com/d.png" }],
            "usage": { "input_tokens": 5, "output_tokens": 7 }
        })))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::builder()
        .adapter(Arc::new(adapter()))
        .configs(vec![config(
            0,
            &server,
            OpenAiSettings::new("sk-test").with_show_token_usage(true),
        )])
        .build();

    let generation = orchestrator
        .generate_image(GenerateOptions::new("x"))
        .await
        .unwrap();
    assert_eq!(
        generation.elements.last(),
        Some(&ImageElement::Text(
            "Token usage: input 5, output 7, total 12".into()
        ))
    );
}
