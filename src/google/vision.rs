//! Cloud Vision OCR client — `images:annotate` with DOCUMENT_TEXT_DETECTION.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;

use crate::error::OcrError;
use crate::google::GoogleAuthenticator;
use crate::pipeline::types::TextRecognizer;

const ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

/// Vision REST client.
#[derive(Clone)]
pub struct VisionClient {
    auth: GoogleAuthenticator,
    client: reqwest::Client,
}

impl VisionClient {
    pub fn new(auth: GoogleAuthenticator, client: reqwest::Client) -> Self {
        Self { auth, client }
    }
}

#[async_trait]
impl TextRecognizer for VisionClient {
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let token = self
            .auth
            .bearer_token()
            .await
            .map_err(|e| OcrError::Request(e.to_string()))?;

        let body = json!({
            "requests": [{
                "image": { "content": BASE64.encode(image) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
            }]
        });

        let response = self
            .client
            .post(ANNOTATE_URL)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| OcrError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Request(format!("HTTP {status}: {body}")));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::Request(e.to_string()))?;

        let image_response = parsed.responses.into_iter().next().unwrap_or_default();
        if let Some(err) = image_response.error {
            return Err(OcrError::Api { message: err.message });
        }

        // No annotation means the image simply had no detectable text.
        Ok(image_response
            .full_text_annotation
            .map(|a| a.text)
            .unwrap_or_default())
    }
}
