/// Cosense API 客户端
///
/// 使用 `connect.sid` cookie 直接调用 Cosense API：
/// - 读取个人资料页（`/api/pages/<项目>/<页面>`）
/// - 分批导入页面（`/api/page-data/import/<项目>.json`）
use crate::clients::ensure_success;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{BatchConfig, RateLimitedBatcher};
use crate::models::{Page, Project};
use crate::services::ports::{PageImporter, ProfileSource};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentUser {
    csrf_token: String,
}

#[derive(Debug, Deserialize)]
struct PageDetail {
    title: String,
    lines: Vec<PageLine>,
}

#[derive(Debug, Deserialize)]
struct PageLine {
    text: String,
}

#[derive(Debug, Serialize)]
struct ImportPayload<'a> {
    pages: &'a [Page],
}

/// Cosense 客户端
pub struct CosenseClient {
    client: reqwest::Client,
    base_url: String,
    sid: String,
    batch_size: usize,
    batch_delay: Duration,
}

impl CosenseClient {
    /// 创建新的 Cosense 客户端
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.cosense_base_url.trim_end_matches('/').to_string(),
            sid: config.cosense_sid.clone(),
            batch_size: config.import_batch_size.max(1),
            batch_delay: config.import_batch_delay(),
        }
    }

    fn cookie(&self) -> String {
        format!("connect.sid={}", self.sid)
    }

    /// 获取 CSRF token
    async fn csrf_token(&self) -> AppResult<String> {
        let endpoint = "cosense users/me";
        let response = self
            .client
            .get(format!("{}/api/users/me", self.base_url))
            .header(COOKIE, self.cookie())
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        let user: CurrentUser = ensure_success(endpoint, response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::api_invalid_response(endpoint, e.to_string()))?;
        Ok(user.csrf_token)
    }

    /// 导入一批页面
    async fn import_chunk(&self, project_name: &str, csrf_token: &str, pages: &[Page]) -> AppResult<()> {
        let endpoint = format!("cosense import/{}", project_name);
        let json = serde_json::to_vec(&ImportPayload { pages })?;

        let part = Part::bytes(json)
            .file_name("import.json")
            .mime_str("application/octet-stream")
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let form = Form::new()
            .part("import-file", part)
            .text("name", "import.json");

        let response = self
            .client
            .post(format!(
                "{}/api/page-data/import/{}.json",
                self.base_url, project_name
            ))
            .header(COOKIE, self.cookie())
            .header(ACCEPT, "application/json, text/plain, */*")
            .header("X-CSRF-TOKEN", csrf_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let body = ensure_success(&endpoint, response)
            .await?
            .text()
            .await
            .unwrap_or_default();

        debug!("导入结果: {}", body);
        Ok(())
    }
}

#[async_trait]
impl PageImporter for CosenseClient {
    async fn import_pages(&self, project_name: &str, project: &Project) -> AppResult<()> {
        let csrf_token = self.csrf_token().await?;
        let chunks: Vec<&[Page]> = project.pages.chunks(self.batch_size).collect();
        info!(
            "📤 通过 API 导入 /{}: {} 页，分 {} 批",
            project_name,
            project.pages.len(),
            chunks.len()
        );

        // 一次一个请求，请求之间等待，避免 429
        let batcher = RateLimitedBatcher::new(
            format!("导入 /{}", project_name),
            BatchConfig::with_concurrency(1).batched(1, Some(self.batch_delay)),
        );
        let run = batcher
            .run(chunks, |_, pages| self.import_chunk(project_name, &csrf_token, pages))
            .await;

        match run.outcomes.into_iter().find_map(|o| o.result.err()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProfileSource for CosenseClient {
    async fn fetch_page(&self, path: &str) -> AppResult<Page> {
        let endpoint = format!("cosense pages/{}", path);
        let mut request = self
            .client
            .get(format!("{}/api/pages/{}", self.base_url, path.trim_matches('/')));
        if !self.sid.is_empty() {
            request = request.header(COOKIE, self.cookie());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        let body = ensure_success(&endpoint, response)
            .await?
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        parse_page_detail(&endpoint, &body)
    }
}

/// `{ title, lines: [{ text }] }` → `Page`
pub fn parse_page_detail(endpoint: &str, body: &str) -> AppResult<Page> {
    let detail: PageDetail = serde_json::from_str(body)
        .map_err(|e| AppError::api_invalid_response(endpoint, e.to_string()))?;
    Ok(Page::new(
        detail.title,
        detail.lines.into_iter().map(|l| l.text).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_detail_keeps_line_texts_in_order() {
        let body = r#"{
            "id": "5f0c",
            "title": "mrsekut",
            "lines": [
                { "id": "a", "text": "mrsekut", "userId": "u" },
                { "id": "b", "text": "[https://example.com]", "userId": "u" }
            ]
        }"#;
        let page = parse_page_detail("pages/me/mrsekut", body).unwrap();
        assert_eq!(page.title, "mrsekut");
        assert_eq!(page.lines, vec!["mrsekut", "[https://example.com]"]);
    }

    #[test]
    fn malformed_page_detail_is_api_error() {
        let err = parse_page_detail("pages/me/x", r#"{"name":"NotFoundError"}"#).unwrap_err();
        assert!(matches!(err, AppError::Api(_)));
    }

    #[test]
    fn import_payload_matches_import_file_shape() {
        let pages = vec![Page::new("0", vec!["0".into(), "> a".into()])];
        let json = serde_json::to_value(ImportPayload { pages: &pages }).unwrap();
        assert_eq!(json["pages"][0]["lines"][1], "> a");
    }
}
