//! ISBN 解析链 - 业务能力层
//!
//! 按优先级依次尝试各个检索源，第一个成功的结果胜出：
//! 1. NDL OpenSearch
//! 2. Google Books
//! 3. 人工输入（空输入表示跳过）
//!
//! 每个检索源的错误都在本层吞掉并继续下一个。全部失败时：
//! - 有检索源返回过 `ApiError` → 返回该错误（调用方按错误处理）
//! - 否则 → 返回 `NotFoundError::Isbn`（调用方记录警告后跳过）

use crate::error::{AppResult, NotFoundError};
use crate::models::{normalize_isbn, BookInfo};
use crate::services::ports::{BookSearch, IsbnPrompt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// ISBN 解析链
pub struct IsbnResolutionChain {
    strategies: Vec<Arc<dyn BookSearch>>,
    prompt: Option<Arc<dyn IsbnPrompt>>,
}

impl IsbnResolutionChain {
    /// # 参数
    /// - `strategies`: 按优先级排列的检索源
    /// - `prompt`: 人工输入，None 表示非交互模式
    pub fn new(strategies: Vec<Arc<dyn BookSearch>>, prompt: Option<Arc<dyn IsbnPrompt>>) -> Self {
        Self { strategies, prompt }
    }

    /// 按书名解析 ISBN
    pub async fn resolve(&self, title: &str) -> AppResult<BookInfo> {
        let mut api_error = None;

        for strategy in &self.strategies {
            debug!("尝试 {} 检索: {}", strategy.name(), title);
            match strategy.search_by_title(title).await {
                Ok(book) => {
                    info!("✓ 通过 {} 找到 ISBN: {}", strategy.name(), book.isbn);
                    return Ok(book);
                }
                Err(e) if e.is_not_found() => {
                    debug!("{} 没有找到: {}", strategy.name(), title);
                }
                Err(e) => {
                    warn!("{} 检索失败: {}", strategy.name(), e);
                    api_error = Some(e);
                }
            }
        }

        if let Some(prompt) = &self.prompt {
            match prompt.ask(title).await {
                Ok(Some(raw)) => {
                    let isbn = normalize_isbn(&raw);
                    if !isbn.is_empty() {
                        info!("✓ 使用人工输入的 ISBN: {}", isbn);
                        return Ok(BookInfo::from_manual_input(isbn, title));
                    }
                }
                Ok(None) => debug!("人工输入为空，跳过: {}", title),
                Err(e) => warn!("读取人工输入失败: {}", e),
            }
        }

        match api_error {
            Some(e) => Err(e),
            None => Err(NotFoundError::Isbn {
                title: title.to_string(),
            }
            .into()),
        }
    }
}
