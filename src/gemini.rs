use crate::models::{GenerateRequest, GeneratedArtifact, ImageAsset};
use crate::prompt;
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Placeholder key that switches the client into demo mode.
pub const DEMO_API_KEY: &str = "DEMO_KEY";

const SAFETY_FINISH_REASON: &str = "SAFETY";
const NO_REASON_FALLBACK: &str = "No specific reason provided";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("image generation blocked for safety reasons ({})", join_categories(.0))]
    SafetyBlocked(Vec<String>),
    #[error("no image was produced: {0}")]
    NoImageProduced(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Other: {0}")]
    Other(String),
}

fn join_categories(categories: &[String]) -> String {
    if categories.is_empty() {
        "unspecified category".to_string()
    } else {
        categories.join(", ")
    }
}

/// Generation backend seam so route handlers can run against a stub in tests.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedArtifact, GeminiError>;
    async fn refine(&self, base: &ImageAsset, instruction: &str) -> Result<GeneratedArtifact, GeminiError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn preview(s: &str) -> String {
    if s.len() > 50 {
        format!("{}...[{} chars total]", &s[..50], s.len())
    } else {
        s.to_string()
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        let base_url = std::env::var("GEMINI_API_BASE")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());
        Self { client: Client::new(), api_key, base_url }
    }

    fn demo_mode(&self) -> bool {
        self.api_key == DEMO_API_KEY
    }

    async fn perform_api_call(&self, body: &GenerateContentRequest, task: &str) -> Result<String, GeminiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, IMAGE_MODEL, self.api_key
        );

        info!("🔗 Making {} request to: {}", task, url.replace(&self.api_key, "***"));

        if let Ok(mut value) = serde_json::to_value(body) {
            truncate_base64_in_json(&mut value);
            info!("📤 Request body: {}", serde_json::to_string_pretty(&value).unwrap_or_default());
        }

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GeminiError::Http(format!("status={} body={}", status, error_body)));
        }

        let response_text = response.text().await.map_err(GeminiError::Network)?;

        if let Ok(mut value) = serde_json::from_str::<serde_json::Value>(&response_text) {
            truncate_base64_in_json(&mut value);
            info!("📥 Raw Gemini API response: {}", serde_json::to_string_pretty(&value).unwrap_or_default());
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Other(format!("parse error: {}", e)))?;

        interpret_response(&parsed)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedArtifact, GeminiError> {
        let directive = prompt::build_directive(request);
        info!("🎯 Generating composite with directive (truncated): {}", preview(&directive));

        if self.demo_mode() {
            info!("Using demo mode - no real images generated");
            return Ok(artifact(placeholder_image("Studio preview"), directive));
        }

        let body = assemble_generation(request, &directive);
        let image = self.perform_api_call(&body, "generation").await?;
        info!("✅ Successfully generated image: {}", preview(&image));
        Ok(artifact(image, directive))
    }

    async fn refine(&self, base: &ImageAsset, instruction: &str) -> Result<GeneratedArtifact, GeminiError> {
        let directive = wrap_refinement(instruction);
        info!("🎯 Refining latest image with: {}", preview(instruction));

        if self.demo_mode() {
            info!("Using demo mode - no real images generated");
            return Ok(artifact(placeholder_image("Refined preview"), directive));
        }

        let body = assemble_refinement(base, &directive);
        let image = self.perform_api_call(&body, "refinement").await?;
        info!("✅ Successfully refined image: {}", preview(&image));
        Ok(artifact(image, directive))
    }
}

fn artifact(image: String, directive: String) -> GeneratedArtifact {
    GeneratedArtifact { image, directive, created_at: Utc::now() }
}

/// Wraps a free-text change request in the fixed professional-portfolio
/// framing used for every refinement call.
pub fn wrap_refinement(instruction: &str) -> String {
    format!(
        "This is a professional portfolio photograph and the result must stay photorealistic. Apply the following change to the image: {}",
        instruction.trim()
    )
}

// --- Request Assembly ---

/// Part order is fixed as negotiated with the API: garment image, model
/// image, background image when present, then the directive text.
fn assemble_generation(req: &GenerateRequest, directive: &str) -> GenerateContentRequest {
    let mut parts = vec![image_part(&req.garment_image), image_part(&req.model_image)];
    if let Some(background) = &req.background_image {
        parts.push(image_part(background));
    }
    parts.push(RequestPart::Text { text: directive.to_string() });
    GenerateContentRequest::with_parts(parts)
}

/// Refinement sends the previously generated image first, then the wrapped
/// instruction text.
fn assemble_refinement(base: &ImageAsset, directive: &str) -> GenerateContentRequest {
    let parts = vec![image_part(base), RequestPart::Text { text: directive.to_string() }];
    GenerateContentRequest::with_parts(parts)
}

fn image_part(asset: &ImageAsset) -> RequestPart {
    RequestPart::InlineData {
        inline_data: InlineData {
            mime_type: asset.mime_type.clone(),
            data: asset.data.clone(),
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn with_parts(parts: Vec<RequestPart>) -> Self {
        Self {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE", "TEXT"],
                candidate_count: 1,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    candidate_count: u32,
}

// --- Response Parsing ---

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponsePart {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyRating {
    category: String,
    #[serde(default)]
    blocked: bool,
}

/// Classifies a response into exactly one of three outcomes, in order:
/// safety block, first inline image, or no-image with best-effort reason.
fn interpret_response(response: &GenerateContentResponse) -> Result<String, GeminiError> {
    for candidate in &response.candidates {
        if candidate.finish_reason.as_deref() == Some(SAFETY_FINISH_REASON) {
            let categories: Vec<String> = candidate
                .safety_ratings
                .iter()
                .filter(|r| r.blocked)
                .map(|r| r.category.clone())
                .collect();
            error!("❌ Generation halted by safety filter: {}", join_categories(&categories));
            return Err(GeminiError::SafetyBlocked(categories));
        }
    }

    for candidate in &response.candidates {
        if let Some(content) = &candidate.content {
            for part in &content.parts {
                if let ResponsePart::Inline { inline_data } = part {
                    info!("🖼️ Found image data with mime type: {}", inline_data.mime_type);
                    return Ok(format!("data:{};base64,{}", inline_data.mime_type, inline_data.data));
                }
            }
        }
    }

    info!("⚠️ No inline image data found in response structure");
    let mut texts: Vec<&str> = Vec::new();
    for candidate in &response.candidates {
        if let Some(content) = &candidate.content {
            for part in &content.parts {
                if let ResponsePart::Text { text } = part {
                    texts.push(text);
                }
            }
        }
    }
    let reason = texts.join(" ").trim().to_string();
    let reason = if reason.is_empty() { NO_REASON_FALLBACK.to_string() } else { reason };
    Err(GeminiError::NoImageProduced(reason))
}

// --- Demo Mode ---

fn placeholder_image(label: &str) -> String {
    let colors = ["#3B82F6", "#EF4444", "#10B981", "#F59E0B", "#8B5CF6"];
    let color = colors[label.len() % colors.len()];

    let svg = format!(
        r#"<svg width="450" height="800" xmlns="http://www.w3.org/2000/svg">
            <defs>
                <linearGradient id="grad" x1="0%" y1="0%" x2="100%" y2="100%">
                    <stop offset="0%" style="stop-color:{};stop-opacity:1" />
                    <stop offset="100%" style="stop-color:{};stop-opacity:0.6" />
                </linearGradient>
            </defs>
            <rect width="450" height="800" fill="url(#grad)" />
            <text x="225" y="390" font-family="Arial, sans-serif" font-size="28" font-weight="bold"
                  text-anchor="middle" fill="white">
                {}
            </text>
            <text x="225" y="430" font-family="Arial, sans-serif" font-size="13"
                  text-anchor="middle" fill="white" opacity="0.8">
                Set GEMINI_API_KEY for real composites
            </text>
        </svg>"#,
        color, color, label
    );

    format!(
        "data:image/svg+xml;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(svg.as_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectRatio, AgeAdjustment, BackgroundChoice, ShotFraming};

    fn request(background: bool) -> GenerateRequest {
        GenerateRequest {
            garment_image: ImageAsset::new("R0FSTUVOVA==", "image/png"),
            model_image: ImageAsset::new("TU9ERUw=", "image/jpeg"),
            background_image: background.then(|| ImageAsset::new("Qkc=", "image/webp")),
            background: BackgroundChoice::Studio,
            age: AgeAdjustment::Unchanged,
            framing: ShotFraming::FullBody,
            aspect_ratio: AspectRatio::Tall,
            palette: None,
            instructions: String::new(),
        }
    }

    fn part_kinds(body: &GenerateContentRequest) -> Vec<&'static str> {
        body.contents[0]
            .parts
            .iter()
            .map(|p| match p {
                RequestPart::InlineData { .. } => "image",
                RequestPart::Text { .. } => "text",
            })
            .collect()
    }

    #[test]
    fn generation_parts_are_garment_model_text() {
        let req = request(false);
        let body = assemble_generation(&req, "directive");
        assert_eq!(part_kinds(&body), vec!["image", "image", "text"]);

        match &body.contents[0].parts[0] {
            RequestPart::InlineData { inline_data } => {
                assert_eq!(inline_data.data, "R0FSTUVOVA==");
                assert_eq!(inline_data.mime_type, "image/png");
            }
            _ => panic!("garment image must come first"),
        }
    }

    #[test]
    fn background_image_slots_in_before_text() {
        let req = request(true);
        let body = assemble_generation(&req, "directive");
        assert_eq!(part_kinds(&body), vec!["image", "image", "image", "text"]);
    }

    #[test]
    fn refinement_sends_base_image_then_wrapped_text() {
        let base = ImageAsset::new("QkFTRQ==", "image/png");
        let directive = wrap_refinement("make the sleeves longer");
        let body = assemble_refinement(&base, &directive);
        assert_eq!(part_kinds(&body), vec!["image", "text"]);

        match &body.contents[0].parts[1] {
            RequestPart::Text { text } => {
                assert!(text.contains("professional portfolio"));
                assert!(text.contains("photorealistic"));
                assert!(text.ends_with("make the sleeves longer"));
            }
            _ => panic!("instruction text must follow the base image"),
        }
    }

    #[test]
    fn request_serializes_with_camel_case_keys() {
        let req = request(false);
        let body = assemble_generation(&req, "directive");
        let json = serde_json::to_value(&body).unwrap();

        assert!(json.get("generationConfig").is_some());
        assert_eq!(json["generationConfig"]["responseModalities"], serde_json::json!(["IMAGE", "TEXT"]));
        assert_eq!(json["generationConfig"]["candidateCount"], serde_json::json!(1));
        assert!(json["contents"][0]["parts"][0]["inlineData"]["mimeType"].is_string());
    }

    #[test]
    fn safety_block_extracts_blocked_categories() {
        let json = r#"{
            "candidates": [{
                "finishReason": "SAFETY",
                "safetyRatings": [
                    {"category": "adult", "blocked": true},
                    {"category": "hate", "blocked": false},
                    {"category": "violence", "blocked": true}
                ]
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        match interpret_response(&response) {
            Err(GeminiError::SafetyBlocked(categories)) => {
                assert_eq!(categories, vec!["adult".to_string(), "violence".to_string()]);
            }
            other => panic!("expected SafetyBlocked, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn safety_block_without_ratings_names_unspecified_category() {
        let json = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let err = interpret_response(&response).unwrap_err();
        assert!(err.to_string().contains("unspecified category"));
    }

    #[test]
    fn first_inline_image_wins_over_later_text() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"inlineData": {"mimeType": "image/png", "data": "QUJD"}},
                        {"text": "Here is your image"}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(interpret_response(&response).unwrap(), "data:image/png;base64,QUJD");
    }

    #[test]
    fn text_only_response_yields_joined_reason() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "No"}, {"text": "suitable"}, {"text": "pose"}]
                }
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        match interpret_response(&response) {
            Err(GeminiError::NoImageProduced(reason)) => assert_eq!(reason, "No suitable pose"),
            other => panic!("expected NoImageProduced, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn empty_response_yields_fixed_fallback_reason() {
        let json = r#"{"candidates": []}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        match interpret_response(&response) {
            Err(GeminiError::NoImageProduced(reason)) => assert_eq!(reason, NO_REASON_FALLBACK),
            other => panic!("expected NoImageProduced, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unknown_part_shapes_are_tolerated() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"functionCall": {"name": "noop"}},
                        {"inlineData": {"mimeType": "image/jpeg", "data": "Lzlq"}}
                    ]
                }
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(interpret_response(&response).unwrap(), "data:image/jpeg;base64,Lzlq");
    }

    #[test]
    fn blocked_category_list_appears_in_display_message() {
        let err = GeminiError::SafetyBlocked(vec!["adult".into(), "violence".into()]);
        assert!(err.to_string().contains("adult, violence"));
    }

    #[test]
    fn placeholder_is_an_svg_data_uri() {
        let uri = placeholder_image("Studio preview");
        assert!(uri.starts_with("data:image/svg+xml;base64,"));
        assert!(ImageAsset::from_data_uri(&uri).is_some());
    }
}
