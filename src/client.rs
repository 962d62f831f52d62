use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{error::SubmitError, payload::UploadRequest};

pub const UPLOAD_PATH: &str = "/upload";

/// Body of a successful `/upload` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub image_data: String,
    pub total: u64,
    pub nurdles: u64,
    pub beads: u64,
    #[serde(default, deserialize_with = "coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "coordinate")]
    pub longitude: Option<f64>,
}

impl DetectionResult {
    pub fn data_uri(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.image_data)
    }

    pub fn decode_image(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.image_data)
    }
}

// The server echoes the form fields back, so coordinates arrive as strings.
fn coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(value)) => Some(value),
        Some(Raw::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

pub struct UploadClient {
    http: reqwest::Client,
    endpoint: String,
    limit_bytes: usize,
}

impl UploadClient {
    pub fn new(server_url: &str, limit_bytes: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}{}", server_url.trim_end_matches('/'), UPLOAD_PATH),
            limit_bytes,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn upload(&self, request: UploadRequest) -> Result<DetectionResult, SubmitError> {
        let size = request.payload_size();
        if size > self.limit_bytes {
            return Err(SubmitError::TooLarge {
                size,
                limit: self.limit_bytes,
            });
        }

        let form = request.into_multipart().map_err(SubmitError::Transport)?;
        debug!("POST {} ({} bytes)", self.endpoint, size);

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(SubmitError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Status(status));
        }

        response
            .json::<DetectionResult>()
            .await
            .map_err(SubmitError::Malformed)
    }
}
