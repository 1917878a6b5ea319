//! JS 执行器 - 基础设施层
//!
//! 持有 Cosense 页面，只暴露"导航"和"在页面中执行 JS"的能力

use crate::error::{AppResult, BrowserError};
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// JS 执行器
///
/// 职责：
/// - 持有 Page 资源
/// - 暴露 goto() / eval() 能力
/// - 不认识 Project / Page 数据
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 导航到指定 URL 并等待加载完成
    pub async fn goto(&self, url: &str) -> AppResult<()> {
        debug!("导航到: {}", url);
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    /// 当前页面 URL
    pub async fn current_url(&self) -> AppResult<Option<String>> {
        Ok(self.page.url().await?)
    }

    /// 轮询等待 URL 满足条件
    ///
    /// # 参数
    /// - `expected`: 用于错误信息的描述
    /// - `matches`: URL 判断条件
    /// - `timeout`: 最长等待时间
    pub async fn wait_for_url(
        &self,
        expected: &str,
        matches: impl Fn(&str) -> bool,
        timeout: Duration,
    ) -> AppResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(url) = self.current_url().await? {
                if matches(&url) {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::NavigationTimeout {
                    expected: expected.to_string(),
                }
                .into());
            }
            sleep(Duration::from_millis(500)).await;
        }
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 执行约定返回 `{ ok: bool, error?: string }` 的脚本
    ///
    /// `ok` 为 false 时转换为页面错误
    pub async fn eval_checked(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let value = self.eval(js_code).await?;
        if value.get("ok").and_then(|v| v.as_bool()) == Some(true) {
            return Ok(value);
        }
        let message = value
            .get("error")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string());
        Err(BrowserError::PageError(message).into())
    }
}
