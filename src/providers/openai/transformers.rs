//! OpenAI image API request/response transformers
//!
//! Field gating follows the model family:
//! - `quality` is sent to dall-e-3 and gpt-image models, `style` to dall-e-3 only
//! - `background`, `moderation`, `output_compression`, `output_format` are gpt-image only
//! - `response_format` is never sent to gpt-image models (they always return base64)

use std::collections::HashMap;

use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

use crate::error::RelayError;
use crate::types::{
    EditOptions, GenerateOptions, GeneratedImage, ImageGenerationResponse, ImageUsage, InputImage,
    OpenAiSettings, VariationOptions,
};
use crate::utils::mime::{extension_for_mime, guess_mime_from_base64};

/// Model family, derived from the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelClass {
    DallE2,
    DallE3,
    GptImage,
    /// Anything else an OpenAI-compatible endpoint serves
    Other,
}

impl ModelClass {
    pub fn from_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        if model.starts_with("dall-e-2") {
            Self::DallE2
        } else if model.starts_with("dall-e-3") {
            Self::DallE3
        } else if model.contains("gpt-image") {
            Self::GptImage
        } else {
            Self::Other
        }
    }

    pub const fn supports_quality(self) -> bool {
        matches!(self, Self::DallE3 | Self::GptImage)
    }

    pub const fn supports_style(self) -> bool {
        matches!(self, Self::DallE3)
    }

    pub const fn supports_response_format(self) -> bool {
        !matches!(self, Self::GptImage)
    }

    pub const fn supports_edit(self) -> bool {
        !matches!(self, Self::DallE3)
    }

    pub const fn supports_variation(self) -> bool {
        matches!(self, Self::DallE2 | Self::Other)
    }
}

/// Requested model, or the configuration default.
pub fn resolve_model(settings: &OpenAiSettings, requested: Option<&str>) -> String {
    requested
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(settings.default_model.as_str())
        .to_string()
}

/// JSON body of `POST /images/generations`.
pub fn build_generation_body(
    settings: &OpenAiSettings,
    model: &str,
    options: &GenerateOptions,
) -> Value {
    let class = ModelClass::from_model(model);
    let mut body = json!({
        "model": model,
        "prompt": options.prompt,
    });

    if let Some(n) = options.count.filter(|c| *c > 0) {
        body["n"] = json!(n);
    }
    if let Some(size) = options.size.as_ref().or(settings.default_size.as_ref()) {
        body["size"] = json!(size);
    }
    if class.supports_quality()
        && let Some(quality) = options.quality.as_ref().or(settings.default_quality.as_ref())
    {
        body["quality"] = json!(quality);
    }
    if class.supports_style()
        && let Some(style) = options.style.as_ref().or(settings.default_style.as_ref())
    {
        body["style"] = json!(style);
    }
    if class.supports_response_format()
        && let Some(format) = options
            .response_format
            .as_ref()
            .or(settings.response_format.as_ref())
    {
        body["response_format"] = json!(format);
    }
    if class == ModelClass::GptImage {
        if let Some(background) = &options.background {
            body["background"] = json!(background);
        }
        if let Some(moderation) = &options.moderation {
            body["moderation"] = json!(moderation);
        }
        if let Some(compression) = options.output_compression {
            body["output_compression"] = json!(compression.min(100));
        }
        if let Some(format) = &options.output_format {
            body["output_format"] = json!(format);
        }
    }

    if let Some(obj) = body.as_object_mut() {
        for (k, v) in &options.extra_params {
            obj.insert(k.clone(), v.clone());
        }
    }
    body
}

fn image_part(image: &InputImage, name: &str) -> Result<Part, RelayError> {
    let mime = image.mime();
    Part::bytes(image.data.clone())
        .file_name(format!("{name}.{}", extension_for_mime(&mime)))
        .mime_str(&mime)
        .map_err(|e| RelayError::InvalidParameter(format!("Invalid MIME type: {e}")))
}

fn append_extra_params(mut form: Form, extra: &HashMap<String, Value>) -> Form {
    for (k, v) in extra {
        let text = match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        form = form.text(k.clone(), text);
    }
    form
}

/// Multipart body of `POST /images/edits`.
pub fn build_edit_form(
    settings: &OpenAiSettings,
    model: &str,
    options: &EditOptions,
) -> Result<Form, RelayError> {
    let class = ModelClass::from_model(model);
    if !class.supports_edit() {
        return Err(RelayError::unsupported(format!(
            "model {model} does not support image edits"
        )));
    }
    let Some(first) = options.images.first() else {
        return Err(RelayError::InvalidParameter(
            "image edit requires at least one image".to_string(),
        ));
    };

    let mut form = Form::new()
        .text("model", model.to_string())
        .text("prompt", options.prompt.clone());

    if class == ModelClass::GptImage {
        for (i, image) in options.images.iter().enumerate() {
            form = form.part("image[]", image_part(image, &format!("image_{i}"))?);
        }
    } else {
        if options.images.len() > 1 {
            return Err(RelayError::InvalidParameter(format!(
                "model {model} edits a single image, got {}",
                options.images.len()
            )));
        }
        form = form.part("image", image_part(first, "image")?);
    }

    if let Some(mask) = &options.mask {
        form = form.part("mask", image_part(mask, "mask")?);
    }
    if let Some(n) = options.count.filter(|c| *c > 0) {
        form = form.text("n", n.to_string());
    }
    if let Some(size) = options.size.as_ref().or(settings.default_size.as_ref()) {
        form = form.text("size", size.clone());
    }
    if class == ModelClass::GptImage {
        if let Some(quality) = options.quality.as_ref().or(settings.default_quality.as_ref()) {
            form = form.text("quality", quality.clone());
        }
        if let Some(background) = &options.background {
            form = form.text("background", background.clone());
        }
    } else if let Some(format) = options
        .response_format
        .as_ref()
        .or(settings.response_format.as_ref())
    {
        form = form.text("response_format", format.clone());
    }

    Ok(append_extra_params(form, &options.extra_params))
}

/// Multipart body of `POST /images/variations`.
pub fn build_variation_form(
    settings: &OpenAiSettings,
    model: &str,
    options: &VariationOptions,
) -> Result<Form, RelayError> {
    if !ModelClass::from_model(model).supports_variation() {
        return Err(RelayError::unsupported(format!(
            "model {model} does not support image variations"
        )));
    }

    let mut form = Form::new()
        .text("model", model.to_string())
        .part("image", image_part(&options.image, "image")?);

    if let Some(n) = options.count.filter(|c| *c > 0) {
        form = form.text("n", n.to_string());
    }
    if let Some(size) = options.size.as_ref().or(settings.default_size.as_ref()) {
        form = form.text("size", size.clone());
    }
    if let Some(format) = options
        .response_format
        .as_ref()
        .or(settings.response_format.as_ref())
    {
        form = form.text("response_format", format.clone());
    }
    Ok(form)
}

/// Parse an OpenAI image response body.
pub fn parse_image_response(raw: &Value) -> Result<ImageGenerationResponse, RelayError> {
    let data = raw.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        RelayError::ParseError("Missing or invalid 'data' field in image response".to_string())
    })?;

    let images: Vec<GeneratedImage> = data
        .iter()
        .map(|img| {
            let url = img.get("url").and_then(|u| u.as_str()).map(String::from);
            let b64_json = img
                .get("b64_json")
                .and_then(|b| b.as_str())
                .map(String::from);
            let mime_type = b64_json.as_deref().map(guess_mime_from_base64);
            GeneratedImage {
                url,
                b64_json,
                mime_type,
                revised_prompt: img
                    .get("revised_prompt")
                    .and_then(|p| p.as_str())
                    .map(String::from),
            }
        })
        .filter(|img| img.url.is_some() || img.b64_json.is_some())
        .collect();

    if images.is_empty() {
        return Err(RelayError::ParseError(
            "image response contained no images".to_string(),
        ));
    }

    let usage = raw.get("usage").map(|u| {
        let field = |name: &str| u.get(name).and_then(|v| v.as_u64()).unwrap_or(0);
        let input_tokens = field("input_tokens");
        let output_tokens = field("output_tokens");
        let total = field("total_tokens");
        ImageUsage {
            input_tokens,
            output_tokens,
            total_tokens: if total > 0 {
                total
            } else {
                input_tokens.saturating_add(output_tokens)
            },
        }
    });

    let mut metadata = HashMap::new();
    if let Some(created) = raw.get("created") {
        metadata.insert("created".to_string(), created.clone());
    }

    Ok(ImageGenerationResponse {
        images,
        usage,
        metadata,
    })
}

const IMAGE_MODEL_HINTS: &[&str] = &["dall-e", "gpt-image", "image", "flux", "diffusion"];

/// Ids of `GET /models` that look like image models; all ids when none do.
pub fn filter_image_models(raw: &Value) -> Result<Vec<String>, RelayError> {
    let data = raw.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        RelayError::ParseError("Missing or invalid 'data' field in models response".to_string())
    })?;

    let mut ids: Vec<String> = Vec::with_capacity(data.len());
    for id in data
        .iter()
        .filter_map(|m| m.get("id").and_then(|id| id.as_str()))
    {
        if !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    }

    let image_ids: Vec<String> = ids
        .iter()
        .filter(|id| {
            let lower = id.to_ascii_lowercase();
            IMAGE_MODEL_HINTS.iter().any(|hint| lower.contains(hint))
        })
        .cloned()
        .collect();

    Ok(if image_ids.is_empty() { ids } else { image_ids })
}
