//! ISBN 解析流程 - 流程层
//!
//! 目录名即书名。找到 → 写 `.isbn`；没找到 → warn.txt 后跳过；API 异常 → 失败。

use crate::error::AppResult;
use crate::models::write_isbn;
use crate::services::{IsbnResolutionChain, WarnWriter};
use crate::workflow::{PhaseCtx, ProcessResult};
use tracing::{info, warn};

/// ISBN 解析流程
pub struct IsbnFlow {
    chain: IsbnResolutionChain,
    warn_writer: WarnWriter,
}

impl IsbnFlow {
    pub fn new(chain: IsbnResolutionChain, warn_writer: WarnWriter) -> Self {
        Self { chain, warn_writer }
    }

    pub async fn run(&self, ctx: &PhaseCtx) -> AppResult<ProcessResult> {
        info!("{} 🔍 正在查找 ISBN...", ctx);

        match self.chain.resolve(&ctx.book).await {
            Ok(book) => {
                write_isbn(ctx.path(), &book.isbn).await?;
                info!("{} ✓ ISBN: {} ({})", ctx, book.isbn, book.title);
                Ok(ProcessResult::Success)
            }
            Err(e) if e.is_not_found() => {
                warn!("{} ⚠️ {}，写入 warn.txt", ctx, e);
                self.warn_writer.write(&ctx.book, "未找到 ISBN").await?;
                Ok(ProcessResult::Skipped)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, NotFoundError};
    use crate::models::{read_isbn, BookInfo, WorkItem};
    use crate::services::BookSearch;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedSearch(Option<&'static str>);

    #[async_trait]
    impl BookSearch for FixedSearch {
        fn name(&self) -> &str {
            "stub"
        }

        async fn search_by_title(&self, title: &str) -> AppResult<BookInfo> {
            match self.0 {
                Some(isbn) => Ok(BookInfo {
                    isbn: isbn.to_string(),
                    title: title.to_string(),
                    authors: vec![],
                }),
                None => Err(NotFoundError::Isbn {
                    title: title.to_string(),
                }
                .into()),
            }
        }
    }

    fn flow(answer: Option<&'static str>, warn_path: &std::path::Path) -> IsbnFlow {
        IsbnFlow::new(
            IsbnResolutionChain::new(vec![Arc::new(FixedSearch(answer))], None),
            WarnWriter::with_path(warn_path),
        )
    }

    #[tokio::test]
    async fn found_isbn_is_written_as_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("book");
        std::fs::create_dir(&dir).unwrap();
        let ctx = PhaseCtx::new(&WorkItem::new(&dir, 1), "book");

        let result = flow(Some("9784297129148"), &tmp.path().join("warn.txt"))
            .run(&ctx)
            .await
            .unwrap();

        assert_eq!(result, ProcessResult::Success);
        assert_eq!(read_isbn(&dir).await.unwrap(), "9784297129148");
    }

    #[tokio::test]
    async fn not_found_is_skipped_with_warning() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("unknown");
        std::fs::create_dir(&dir).unwrap();
        let warn_path = tmp.path().join("warn.txt");
        let ctx = PhaseCtx::new(&WorkItem::new(&dir, 1), "unknown");

        let result = flow(None, &warn_path).run(&ctx).await.unwrap();

        assert_eq!(result, ProcessResult::Skipped);
        assert!(matches!(
            read_isbn(&dir).await.unwrap_err(),
            AppError::File(_)
        ));
        let warn = std::fs::read_to_string(&warn_path).unwrap();
        assert!(warn.contains("unknown | 未找到 ISBN"));
    }
}
