/// Google Books API 客户端
use crate::config::Config;
use crate::error::{AppError, AppResult, NotFoundError};
use crate::models::BookInfo;
use crate::services::ports::BookSearch;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const ENDPOINT: &str = "google books volumes";

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

/// Google Books 检索客户端
pub struct GoogleBooksClient {
    client: reqwest::Client,
    volumes_url: String,
}

impl GoogleBooksClient {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            volumes_url: config.google_books_url.clone(),
        }
    }
}

#[async_trait]
impl BookSearch for GoogleBooksClient {
    fn name(&self) -> &str {
        "Google Books"
    }

    async fn search_by_title(&self, title: &str) -> AppResult<BookInfo> {
        debug!("Google Books 检索: {}", title);
        let response = self
            .client
            .get(&self.volumes_url)
            .query(&[("q", title), ("maxResults", "5")])
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(ENDPOINT, e))?;

        // 错误时 body 中也带有 error 对象，先取 JSON 再判断
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::api_request_failed(ENDPOINT, e))?;
        if !status.is_success() && body.get("error").is_none() {
            return Err(AppError::api_bad_status(ENDPOINT, status.as_u16(), body.to_string()));
        }

        parse_volumes_response(title, body)
    }
}

/// 解析检索结果
///
/// - 响应中带 `error` 对象时返回 `ApiError`
/// - 按顺序查看每一条结果，同一条中 ISBN_10 优先于 ISBN_13
/// - 没有任何 ISBN 时返回 `NotFoundError::Isbn`
pub fn parse_volumes_response(query_title: &str, body: Value) -> AppResult<BookInfo> {
    if let Some(error) = body.get("error") {
        let status = error.get("code").and_then(Value::as_u64).unwrap_or(0) as u16;
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(AppError::api_bad_status(ENDPOINT, status, message));
    }

    let parsed: VolumesResponse = serde_json::from_value(body)
        .map_err(|e| AppError::api_invalid_response(ENDPOINT, e.to_string()))?;

    for volume in parsed.items {
        let info = volume.volume_info;
        let pick = |kind: &str| {
            info.industry_identifiers
                .iter()
                .find(|id| id.kind == kind)
                .map(|id| id.identifier.clone())
        };
        if let Some(isbn) = pick("ISBN_10").or_else(|| pick("ISBN_13")) {
            return Ok(BookInfo {
                isbn,
                title: info.title,
                authors: info.authors,
            });
        }
    }

    Err(NotFoundError::Isbn {
        title: query_title.to_string(),
    }
    .into())
}
