//! Image generation, edit and variation types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Text-to-image request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Text prompt describing the image
    pub prompt: String,
    /// Model to use; the configuration default applies when unset
    pub model: Option<String>,
    /// Image size (e.g., "1024x1024")
    pub size: Option<String>,
    /// Number of images to generate
    pub count: Option<u32>,
    /// Quality setting (dall-e-3 and gpt-image models)
    pub quality: Option<String>,
    /// Style setting (dall-e-3 only)
    pub style: Option<String>,
    /// Response format (url or `b64_json`)
    pub response_format: Option<String>,
    /// Background mode (gpt-image models only)
    pub background: Option<String>,
    /// Moderation level (gpt-image models only)
    pub moderation: Option<String>,
    /// Output compression 0-100 (gpt-image models only)
    pub output_compression: Option<u8>,
    /// Output format: png, jpeg or webp (gpt-image models only)
    pub output_format: Option<String>,
    /// Random seed for reproducibility (honoured by providers that support it)
    pub seed: Option<i64>,
    /// Additional provider-specific parameters, merged last
    pub extra_params: HashMap<String, serde_json::Value>,
}

impl GenerateOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }
}

/// Raw image bytes supplied by the attachment source, already decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputImage {
    pub data: Vec<u8>,
    /// MIME type when known; sniffed from the bytes otherwise
    pub mime_type: Option<String>,
    /// Original attachment name, used when the bytes are not recognised
    pub file_name: Option<String>,
}

impl InputImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            mime_type: None,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Declared MIME type, else sniffed from the bytes, else from the file name.
    pub fn mime(&self) -> String {
        self.mime_type.clone().unwrap_or_else(|| {
            crate::utils::mime::guess_mime(Some(&self.data), self.file_name.as_deref())
        })
    }
}

/// Image(s) + prompt -> image(s).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditOptions {
    pub prompt: String,
    /// Source images, at least one
    pub images: Vec<InputImage>,
    /// Optional mask (dall-e-2 only)
    pub mask: Option<InputImage>,
    pub model: Option<String>,
    pub size: Option<String>,
    pub count: Option<u32>,
    pub quality: Option<String>,
    pub response_format: Option<String>,
    pub background: Option<String>,
    pub seed: Option<i64>,
    pub extra_params: HashMap<String, serde_json::Value>,
}

impl EditOptions {
    pub fn new(prompt: impl Into<String>, images: Vec<InputImage>) -> Self {
        Self {
            prompt: prompt.into(),
            images,
            mask: None,
            model: None,
            size: None,
            count: None,
            quality: None,
            response_format: None,
            background: None,
            seed: None,
            extra_params: HashMap::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_mask(mut self, mask: InputImage) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Image -> variations of that image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationOptions {
    pub image: InputImage,
    pub model: Option<String>,
    pub size: Option<String>,
    pub count: Option<u32>,
    pub response_format: Option<String>,
}

impl VariationOptions {
    pub fn new(image: InputImage) -> Self {
        Self {
            image,
            model: None,
            size: None,
            count: None,
            response_format: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A single generated image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Image URL (if the provider returned one)
    pub url: Option<String>,
    /// Base64 encoded image data
    pub b64_json: Option<String>,
    /// MIME type of `b64_json` when known
    pub mime_type: Option<String>,
    /// Revised prompt (if the provider rewrote it)
    pub revised_prompt: Option<String>,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Provider response converted to the common shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    pub images: Vec<GeneratedImage>,
    pub usage: Option<ImageUsage>,
    /// Provider request metadata (request ids, task ids, seeds)
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Where a renderable image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    Url(String),
    Base64 { mime_type: String, data: String },
}

impl ImageSource {
    /// A value usable as an `src` attribute: the URL, or a `data:` URI.
    pub fn to_src(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Base64 { mime_type, data } => format!("data:{mime_type};base64,{data}"),
        }
    }
}

/// One renderable item handed to the result sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageElement {
    Image(ImageSource),
    Text(String),
}
