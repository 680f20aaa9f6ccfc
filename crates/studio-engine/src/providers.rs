use std::collections::BTreeMap;
use std::io::Cursor;

use anyhow::{bail, Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use studio_contracts::image_data::ImageData;
use studio_contracts::prompts::AspectRatio;
use tracing::debug;

use crate::config::StudioConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub prompt: String,
    /// One image for edits, two for compose. Sent in order, before the text.
    pub images: Vec<ImageData>,
    pub model: String,
}

/// A remote image generator. `Ok(None)` means the call succeeded but the
/// service returned no image.
pub trait ImageService: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &GenerateRequest) -> Result<Option<ImageData>>;
    fn edit(&self, request: &EditRequest) -> Result<Option<ImageData>>;
}

#[derive(Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, Box<dyn ImageService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: ImageService + 'static>(&mut self, service: S) {
        self.services
            .insert(service.name().to_string(), Box::new(service));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ImageService> {
        self.services.get(name).map(|service| service.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }
}

pub fn default_service_registry(config: &StudioConfig) -> Result<ServiceRegistry> {
    let http = HttpClient::builder()
        .timeout(config.request_timeout)
        .build()
        .context("failed to build HTTP client")?;
    let mut services = ServiceRegistry::new();
    services.register(DryrunProvider);
    services.register(ImagenProvider::new(config, http.clone()));
    services.register(GeminiProvider::new(config, http));
    Ok(services)
}

/// Offline provider: a solid PNG whose colour is derived from the prompt
/// and any source images.
pub struct DryrunProvider;

impl DryrunProvider {
    fn dims(aspect_ratio: AspectRatio) -> (u32, u32) {
        match aspect_ratio {
            AspectRatio::Square => (256, 256),
            AspectRatio::Landscape => (256, 144),
            AspectRatio::Portrait => (144, 256),
            AspectRatio::Standard => (256, 192),
            AspectRatio::StandardPortrait => (192, 256),
        }
    }

    fn render(width: u32, height: u32, seed_parts: &[&str]) -> Result<ImageData> {
        let (r, g, b) = color_from_parts(seed_parts);
        let mut image = RgbImage::new(width, height);
        for pixel in image.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("dryrun PNG encode failed")?;
        Ok(ImageData::from_bytes(&bytes, "image/png"))
    }
}

impl ImageService for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Option<ImageData>> {
        let (width, height) = Self::dims(request.aspect_ratio);
        Self::render(width, height, &[&request.prompt]).map(Some)
    }

    fn edit(&self, request: &EditRequest) -> Result<Option<ImageData>> {
        if request.images.is_empty() {
            bail!("dryrun edit needs at least one source image");
        }
        let mut parts = vec![request.prompt.as_str()];
        parts.extend(request.images.iter().map(|image| image.data.as_str()));
        Self::render(256, 256, &parts).map(Some)
    }
}

/// Imagen `:predict` text-to-image. Editing is not offered by this API.
pub struct ImagenProvider {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl ImagenProvider {
    pub fn new(config: &StudioConfig, http: HttpClient) -> Self {
        Self {
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            http,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.trim().trim_start_matches("models/");
        format!("{}/models/{}:predict", self.api_base, model)
    }

    fn build_payload(request: &GenerateRequest) -> Value {
        json!({
            "instances": [{
                "prompt": request.prompt,
            }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": request.aspect_ratio.as_str(),
                "outputMimeType": "image/png",
            },
        })
    }

    fn extract_first_image(response_payload: &Value) -> Option<ImageData> {
        let predictions = response_payload
            .get("predictions")
            .or_else(|| response_payload.get("generatedImages"))
            .and_then(Value::as_array)?;
        predictions.iter().find_map(|row| {
            let obj = row.as_object()?;
            let nested = obj
                .get("image")
                .and_then(Value::as_object)
                .unwrap_or(obj);
            let data = nested
                .get("bytesBase64Encoded")
                .or_else(|| nested.get("imageBytes"))
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())?;
            let mime = nested
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            Some(ImageData::new(data, mime))
        })
    }
}

impl ImageService for ImagenProvider {
    fn name(&self) -> &str {
        "imagen"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Option<ImageData>> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GEMINI_API_KEY, GOOGLE_API_KEY, or API_KEY not set");
        };
        let endpoint = self.endpoint(&request.model);
        debug!(%endpoint, aspect_ratio = %request.aspect_ratio, "imagen generate");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(&Self::build_payload(request))
            .send()
            .with_context(|| format!("Imagen request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Imagen", response)?;
        Ok(Self::extract_first_image(&response_payload))
    }

    fn edit(&self, request: &EditRequest) -> Result<Option<ImageData>> {
        bail!(
            "Imagen model '{}' cannot edit images; use a gemini model",
            request.model
        )
    }
}

/// Gemini `:generateContent` with inline image parts.
pub struct GeminiProvider {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(config: &StudioConfig, http: HttpClient) -> Self {
        Self {
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            http,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(
        prompt: &str,
        images: &[ImageData],
        aspect_ratio: Option<AspectRatio>,
    ) -> Value {
        let mut parts = images
            .iter()
            .map(|image| {
                json!({
                    "inlineData": {
                        "mimeType": image.mime_type,
                        "data": image.data,
                    }
                })
            })
            .collect::<Vec<Value>>();
        parts.push(json!({ "text": prompt }));

        let mut generation_config = json!({
            "responseModalities": ["IMAGE", "TEXT"],
        });
        if let Some(aspect_ratio) = aspect_ratio {
            generation_config["imageConfig"] = json!({
                "aspectRatio": aspect_ratio.as_str(),
            });
        }
        json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": generation_config,
        })
    }

    fn extract_first_image(response_payload: &Value) -> Option<ImageData> {
        let candidates = response_payload.get("candidates").and_then(Value::as_array)?;
        candidates
            .iter()
            .filter_map(|candidate| {
                candidate
                    .get("content")
                    .and_then(|content| content.get("parts"))
                    .and_then(Value::as_array)
            })
            .flatten()
            .find_map(|part| {
                let inline = part
                    .get("inlineData")
                    .or_else(|| part.get("inline_data"))
                    .and_then(Value::as_object)?;
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .filter(|value| !value.is_empty())?;
                let mime = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .unwrap_or("image/png");
                Some(ImageData::new(data, mime))
            })
    }

    fn send(&self, model: &str, payload: &Value) -> Result<Option<ImageData>> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GEMINI_API_KEY, GOOGLE_API_KEY, or API_KEY not set");
        };
        let endpoint = self.endpoint(model);
        debug!(%endpoint, "gemini generateContent");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;
        Ok(Self::extract_first_image(&response_payload))
    }
}

impl ImageService for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<Option<ImageData>> {
        let payload = Self::build_payload(&request.prompt, &[], Some(request.aspect_ratio));
        self.send(&request.model, &payload)
    }

    fn edit(&self, request: &EditRequest) -> Result<Option<ImageData>> {
        if request.images.is_empty() {
            bail!("Gemini edit needs at least one source image");
        }
        let payload = Self::build_payload(&request.prompt, &request.images, None);
        self.send(&request.model, &payload)
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn color_from_parts(parts: &[&str]) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
