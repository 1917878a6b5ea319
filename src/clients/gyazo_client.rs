/// Gyazo API 客户端
///
/// 上传图片并读取 Gyazo 生成的 OCR 文本
use crate::clients::ensure_success;
use crate::config::Config;
use crate::error::{AppError, AppResult, NotFoundError};
use crate::services::ports::ImageHost;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    image_id: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[allow(dead_code)]
    image_id: String,
    metadata: ImageMetadata,
}

#[derive(Debug, Deserialize)]
struct ImageMetadata {
    #[serde(default)]
    ocr: Option<OcrInfo>,
}

#[derive(Debug, Deserialize)]
struct OcrInfo {
    #[serde(default)]
    description: String,
}

/// Gyazo 客户端
pub struct GyazoClient {
    client: reqwest::Client,
    token: String,
    upload_url: String,
    api_base_url: String,
}

impl GyazoClient {
    /// 创建新的 Gyazo 客户端
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            token: config.gyazo_token.clone(),
            upload_url: config.gyazo_upload_url.clone(),
            api_base_url: config.gyazo_api_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageHost for GyazoClient {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> AppResult<String> {
        let endpoint = "gyazo upload";
        debug!("上传 {} ({} bytes)", filename, bytes.len());

        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/png")
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        let form = Form::new()
            .text("access_token", self.token.clone())
            .part("imagedata", part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        let body = ensure_success(endpoint, response)
            .await?
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        parse_upload_response(&body)
    }

    async fn fetch_ocr(&self, image_id: &str) -> AppResult<String> {
        let endpoint = format!("gyazo images/{}", image_id);
        let url = format!("{}/images/{}", self.api_base_url, image_id);

        let response = self
            .client
            .get(&url)
            .query(&[("access_token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let body = ensure_success(&endpoint, response)
            .await?
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        parse_ocr_response(image_id, &body)
    }
}

/// 解析上传响应，取出 `image_id`
pub fn parse_upload_response(body: &str) -> AppResult<String> {
    let parsed: UploadResponse = serde_json::from_str(body)
        .map_err(|e| AppError::api_invalid_response("gyazo upload", e.to_string()))?;
    if parsed.image_id.trim().is_empty() {
        return Err(AppError::api_invalid_response("gyazo upload", "image_id 为空"));
    }
    Ok(parsed.image_id)
}

/// 解析图片信息，取出 `metadata.ocr.description`
///
/// OCR 文本缺失或为空白时返回 `OcrNotReady`（可重试），格式错误返回 `ApiError`（不可重试）
pub fn parse_ocr_response(image_id: &str, body: &str) -> AppResult<String> {
    let parsed: ImageResponse = serde_json::from_str(body).map_err(|e| {
        AppError::api_invalid_response(format!("gyazo images/{}", image_id), e.to_string())
    })?;

    let text = parsed.metadata.ocr.map(|o| o.description).unwrap_or_default();
    if text.trim().is_empty() {
        return Err(NotFoundError::OcrNotReady {
            image_id: image_id.to_string(),
        }
        .into());
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_response_yields_image_id() {
        let id = parse_upload_response(r#"{"image_id":"8980c52421e452ac3355ca3e5cfe7a0c","type":"png"}"#).unwrap();
        assert_eq!(id, "8980c52421e452ac3355ca3e5cfe7a0c");
        assert!(parse_upload_response(r#"{"type":"png"}"#).is_err());
    }

    #[test]
    fn ocr_text_is_returned_when_present() {
        let body = r#"{"image_id":"abc","metadata":{"ocr":{"locale":"ja","description":"Hello\nWorld"}}}"#;
        assert_eq!(parse_ocr_response("abc", body).unwrap(), "Hello\nWorld");
    }

    #[test]
    fn missing_or_blank_ocr_is_not_ready() {
        let missing = r#"{"image_id":"abc","metadata":{}}"#;
        let blank = r#"{"image_id":"abc","metadata":{"ocr":{"locale":null,"description":"  "}}}"#;
        assert!(parse_ocr_response("abc", missing).unwrap_err().is_ocr_not_ready());
        assert!(parse_ocr_response("abc", blank).unwrap_err().is_ocr_not_ready());
    }

    #[test]
    fn schema_mismatch_is_not_retryable() {
        let err = parse_ocr_response("abc", r#"{"message":"unauthorized"}"#).unwrap_err();
        assert!(!err.is_ocr_not_ready());
        assert!(matches!(err, AppError::Api(_)));
    }
}
