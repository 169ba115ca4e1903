//! Doubao (Volcengine visual) image adapter

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{Value, json};

use super::codes;
use super::signer::{RequestSigner, SignableRequest};
use super::task::{TaskStatus, drive_task};
use crate::defaults;
use crate::error::RelayError;
use crate::registry::{CapabilityRegistry, ModelCache};
use crate::traits::ImageAdapter;
use crate::types::{
    DoubaoSettings, EditOptions, GenerateOptions, GeneratedImage, ImageGenerationResponse,
    ProviderConfig, ProviderKind,
};
use crate::utils::mime::guess_mime_from_base64;

/// Synchronous generation.
pub const ACTION_PROCESS: &str = "CVProcess";
/// Asynchronous task submission.
pub const ACTION_SUBMIT: &str = "CVSync2AsyncSubmitTask";
/// Asynchronous task result.
pub const ACTION_RESULT: &str = "CVSync2AsyncGetResult";

/// Adapter for the signed Volcengine visual API.
#[derive(Debug)]
pub struct DoubaoImageAdapter {
    http: reqwest::Client,
    cache: ModelCache,
    poll_interval: Duration,
    poll_max_attempts: u32,
}

impl DoubaoImageAdapter {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(defaults::http::CONNECT_TIMEOUT)
            .user_agent(defaults::http::USER_AGENT)
            .build()
            .unwrap_or_default();
        Self::with_http_client(http, registry)
    }

    pub fn with_http_client(http: reqwest::Client, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            http,
            cache: ModelCache::new(registry),
            poll_interval: defaults::doubao::POLL_INTERVAL,
            poll_max_attempts: defaults::doubao::POLL_MAX_ATTEMPTS,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_max_attempts(mut self, attempts: u32) -> Self {
        self.poll_max_attempts = attempts;
        self
    }

    fn settings<'a>(&self, config: &'a ProviderConfig) -> Result<&'a DoubaoSettings, RelayError> {
        self.ensure_kind(config)?;
        config.doubao().ok_or_else(|| {
            RelayError::ConfigurationError(format!(
                "configuration {} has no Doubao settings",
                config.index
            ))
        })
    }

    /// Sign and send one action; returns the `data` object of a successful call.
    async fn call(
        &self,
        config: &ProviderConfig,
        settings: &DoubaoSettings,
        action: &str,
        body: &Value,
    ) -> Result<Value, RelayError> {
        let mut url = reqwest::Url::parse(config.base_url())
            .map_err(|e| RelayError::ConfigurationError(format!("invalid url {}: {e}", config.url)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(RelayError::ConfigurationError(format!(
                    "url {} has no host",
                    config.url
                )));
            }
        };
        let query = [("Action", action), ("Version", defaults::doubao::API_VERSION)];
        url.query_pairs_mut().clear().extend_pairs(query.iter());

        let payload = serde_json::to_vec(body)?;
        let signed = RequestSigner::from_settings(settings).sign(
            &SignableRequest {
                method: "POST",
                path: url.path(),
                query: &query,
                headers: &[("Content-Type", "application/json"), ("Host", host.as_str())],
                body: &payload,
            },
            chrono::Utc::now(),
        )?;

        tracing::debug!(config = config.index, action, "doubao request");
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .header("Host", host.as_str())
            .header("X-Date", signed.x_date.as_str())
            .header("Authorization", signed.authorization.as_str())
            .timeout(config.timeout)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let json: Option<Value> = serde_json::from_str(&text).ok();
        let code = json
            .as_ref()
            .and_then(|j| j.get("code"))
            .and_then(|c| c.as_i64());
        let message = json
            .as_ref()
            .and_then(|j| {
                j.get("message")
                    .or_else(|| j.pointer("/ResponseMetadata/Error/Message"))
            })
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();

        if !status.is_success() {
            return Err(http_failure(status.as_u16(), code, &message, &text, json));
        }

        let Some(json) = json else {
            return Err(RelayError::ParseError(format!(
                "doubao returned a non-JSON body: {}",
                text.chars().take(200).collect::<String>()
            )));
        };
        match code {
            Some(code) if codes::is_success(code) => {}
            Some(code) => return Err(codes::decode_error(code, &message)),
            None => {
                return Err(RelayError::ParseError(
                    "doubao response has no code field".to_string(),
                ));
            }
        }
        Ok(json.get("data").cloned().unwrap_or(Value::Null))
    }
}

/// Non-2xx response. The HTTP status stays authoritative for retries; a known
/// business code only improves the message.
fn http_failure(
    status: u16,
    code: Option<i64>,
    message: &str,
    text: &str,
    json: Option<Value>,
) -> RelayError {
    let message = match code.and_then(codes::lookup) {
        Some(info) => info.message.to_string(),
        None if !message.is_empty() => message.to_string(),
        None => text.chars().take(200).collect(),
    };
    let details = json!({
        "provider": "doubao",
        "code": code,
        "retryable": code.and_then(codes::lookup).map(|info| info.retryable),
        "response": json,
    });
    if status == 429 {
        return RelayError::RateLimitError(format!("provider=doubao {message}"));
    }
    RelayError::api_error_with_details(status, message, details)
}

/// `WIDTHxHEIGHT`, falling back to the configured defaults.
fn parse_size(size: Option<&str>, settings: &DoubaoSettings) -> (u32, u32) {
    size.and_then(|s| {
        let (w, h) = s.split_once(['x', 'X', '*'])?;
        Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
    })
    .unwrap_or((settings.default_width, settings.default_height))
}

fn merge_extra(body: &mut Value, extra: &HashMap<String, Value>) {
    if let Some(obj) = body.as_object_mut() {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
}

/// `image_urls` when present, otherwise `binary_data_base64`.
fn parse_images(data: &Value) -> Result<Vec<GeneratedImage>, RelayError> {
    let strings = |field: &str| -> Vec<String> {
        data.get(field)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    };

    let urls = strings("image_urls");
    let images: Vec<GeneratedImage> = if !urls.is_empty() {
        urls.into_iter()
            .map(|url| GeneratedImage {
                url: Some(url),
                ..Default::default()
            })
            .collect()
    } else {
        strings("binary_data_base64")
            .into_iter()
            .map(|b64| GeneratedImage {
                mime_type: Some(guess_mime_from_base64(&b64)),
                b64_json: Some(b64),
                ..Default::default()
            })
            .collect()
    };

    if images.is_empty() {
        return Err(RelayError::ParseError(
            "doubao response contained no images".to_string(),
        ));
    }
    Ok(images)
}

fn response_from(
    data: &Value,
    metadata: HashMap<String, Value>,
) -> Result<ImageGenerationResponse, RelayError> {
    Ok(ImageGenerationResponse {
        images: parse_images(data)?,
        usage: None,
        metadata,
    })
}

#[async_trait]
impl ImageAdapter for DoubaoImageAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Doubao
    }

    async fn generate_image(
        &self,
        config: &ProviderConfig,
        options: &GenerateOptions,
    ) -> Result<ImageGenerationResponse, RelayError> {
        let settings = self.settings(config)?;
        if options.model.as_deref() == Some(settings.edit_model.as_str()) {
            return Err(RelayError::unsupported(format!(
                "{} is an asynchronous edit model and cannot generate from text",
                settings.edit_model
            )));
        }

        let (width, height) = parse_size(options.size.as_deref(), settings);
        let mut body = json!({
            "req_key": settings.generation_model,
            "prompt": options.prompt,
            "width": width,
            "height": height,
            "scale": settings.scale.unwrap_or(defaults::doubao::GENERATION_SCALE),
            "seed": options.seed.unwrap_or(-1),
            "use_pre_llm": settings.use_pre_llm,
            "return_url": settings.return_url,
            "logo_info": { "add_logo": settings.add_watermark },
        });
        merge_extra(&mut body, &options.extra_params);

        let data = self.call(config, settings, ACTION_PROCESS, &body).await?;
        let mut metadata = HashMap::new();
        metadata.insert("req_key".to_string(), json!(settings.generation_model));
        response_from(&data, metadata)
    }

    async fn edit_image(
        &self,
        config: &ProviderConfig,
        options: &EditOptions,
    ) -> Result<ImageGenerationResponse, RelayError> {
        let settings = self.settings(config)?;
        if options.model.as_deref() == Some(settings.generation_model.as_str()) {
            return Err(RelayError::unsupported(format!(
                "{} is a synchronous generation model and cannot edit images",
                settings.generation_model
            )));
        }
        if options.images.is_empty() {
            return Err(RelayError::InvalidParameter(
                "image edit requires at least one image".to_string(),
            ));
        }

        let encoded: Vec<String> = options
            .images
            .iter()
            .map(|image| base64::engine::general_purpose::STANDARD.encode(&image.data))
            .collect();
        let mut body = json!({
            "req_key": settings.edit_model,
            "prompt": options.prompt,
            "binary_data_base64": encoded,
            "scale": settings.scale.unwrap_or(defaults::doubao::EDIT_SCALE),
            "seed": options.seed.unwrap_or(-1),
        });
        merge_extra(&mut body, &options.extra_params);

        let submitted = self.call(config, settings, ACTION_SUBMIT, &body).await?;
        let task_id = submitted
            .get("task_id")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RelayError::ParseError("submit response has no task_id".to_string()))?
            .to_string();
        tracing::debug!(config = config.index, task_id = %task_id, "doubao edit task submitted");

        let req_json = json!({
            "return_url": settings.return_url,
            "logo_info": { "add_logo": settings.add_watermark },
        })
        .to_string();
        let poll_body = json!({
            "req_key": settings.edit_model,
            "task_id": task_id,
            "req_json": req_json,
        });

        let poll_body = &poll_body;
        let data = drive_task(
            &task_id,
            move || async move {
                let data = self.call(config, settings, ACTION_RESULT, poll_body).await?;
                let status = data
                    .get("status")
                    .and_then(|s| s.as_str())
                    .map(TaskStatus::parse)
                    .ok_or_else(|| RelayError::ParseError("result response has no status".to_string()))?;
                Ok((status, data))
            },
            self.poll_interval,
            self.poll_max_attempts,
        )
        .await?;

        let mut metadata = HashMap::new();
        metadata.insert("task_id".to_string(), json!(task_id));
        metadata.insert("req_key".to_string(), json!(settings.edit_model));
        response_from(&data, metadata)
    }

    async fn list_models(&self, config: &ProviderConfig) -> Result<Vec<String>, RelayError> {
        let settings = self.settings(config)?;
        Ok(vec![settings.generation_model.clone(), settings.edit_model.clone()])
    }

    fn default_models(&self, config: &ProviderConfig) -> Vec<String> {
        match config.doubao() {
            Some(settings) => vec![settings.generation_model.clone(), settings.edit_model.clone()],
            None => vec![
                defaults::doubao::GENERATION_MODEL.to_string(),
                defaults::doubao::EDIT_MODEL.to_string(),
            ],
        }
    }

    fn model_cache(&self) -> &ModelCache {
        &self.cache
    }
}
