//! 外部服务客户端
//!
//! 每个客户端只负责一个外部服务的请求与响应解析，
//! 并实现 `services::ports` 中对应的 trait。

pub mod cosense_client;
pub mod google_books_client;
pub mod gyazo_client;
pub mod mutool;
pub mod ndl_client;

pub use cosense_client::CosenseClient;
pub use google_books_client::GoogleBooksClient;
pub use gyazo_client::GyazoClient;
pub use mutool::MutoolRasterizer;
pub use ndl_client::NdlClient;

use crate::error::{AppError, AppResult};
use std::time::Duration;

/// 所有客户端共用的 HTTP 客户端
pub fn build_http_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .user_agent(concat!("pdf_to_cosense/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::api_request_failed("http client", e))
}

/// 非 2xx 状态转换为 `ApiError::BadStatus`，否则返回响应本身
async fn ensure_success(endpoint: &str, response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::api_bad_status(
        endpoint,
        status.as_u16(),
        crate::utils::logging::truncate_text(body.trim(), 200),
    ))
}
