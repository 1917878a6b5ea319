//! 光栅化流程 - 流程层
//!
//! `book.pdf` → `.book.rasterizing/` → `book/`
//!
//! 目标目录本身就是完成标记，所以只有转换成功后才重命名过去。

use crate::error::{AppError, AppResult};
use crate::services::Rasterizer;
use crate::workflow::{PhaseCtx, ProcessResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

/// 光栅化流程
pub struct RasterizeFlow {
    rasterizer: Arc<dyn Rasterizer>,
}

impl RasterizeFlow {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self { rasterizer }
    }

    pub async fn run(&self, ctx: &PhaseCtx) -> AppResult<ProcessResult> {
        let pdf = ctx.path();
        let (staging, target) = output_dirs(pdf, &ctx.book);

        // 上次中断留下的临时目录
        if fs::try_exists(&staging).await.unwrap_or(false) {
            warn!("{} 清理上次未完成的临时目录: {}", ctx, staging.display());
            fs::remove_dir_all(&staging)
                .await
                .map_err(|e| AppError::file_write_failed(&staging, e))?;
        }
        fs::create_dir_all(&staging)
            .await
            .map_err(|e| AppError::file_write_failed(&staging, e))?;

        info!("{} 🖨️ 正在光栅化 {}", ctx, pdf.display());
        if let Err(e) = self.rasterizer.rasterize(pdf, &staging).await {
            if let Err(cleanup) = fs::remove_dir_all(&staging).await {
                warn!("{} 删除临时目录失败: {}", ctx, cleanup);
            }
            return Err(e);
        }

        fs::rename(&staging, &target)
            .await
            .map_err(|e| AppError::file_write_failed(&target, e))?;

        info!("{} ✓ 已输出到 {}", ctx, target.display());
        Ok(ProcessResult::Success)
    }
}

/// (临时目录, 目标目录)
fn output_dirs(pdf: &Path, book: &str) -> (PathBuf, PathBuf) {
    (
        pdf.with_file_name(format!(".{}.rasterizing", book)),
        pdf.with_file_name(book),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::models::WorkItem;
    use async_trait::async_trait;

    struct StubRasterizer {
        pages: usize,
        fail: bool,
    }

    #[async_trait]
    impl Rasterizer for StubRasterizer {
        async fn ensure_available(&self) -> AppResult<()> {
            Ok(())
        }

        async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> AppResult<()> {
            for i in 1..=self.pages {
                std::fs::write(out_dir.join(format!("{}.png", i)), b"png")?;
            }
            if self.fail {
                return Err(ToolError::Failed {
                    program: "mutool".into(),
                    code: Some(1),
                    input: pdf.to_path_buf(),
                }
                .into());
            }
            Ok(())
        }
    }

    fn ctx_for(pdf: &Path) -> PhaseCtx {
        PhaseCtx::new(&WorkItem::new(pdf, 1), "book")
    }

    #[tokio::test]
    async fn output_appears_only_after_success() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = tmp.path().join("book.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();
        // 上次中断留下的残骸
        std::fs::create_dir(tmp.path().join(".book.rasterizing")).unwrap();
        std::fs::write(tmp.path().join(".book.rasterizing/9.png"), b"old").unwrap();

        let flow = RasterizeFlow::new(Arc::new(StubRasterizer {
            pages: 2,
            fail: false,
        }));
        let result = flow.run(&ctx_for(&pdf)).await.unwrap();

        assert_eq!(result, ProcessResult::Success);
        assert!(tmp.path().join("book/1.png").exists());
        assert!(tmp.path().join("book/2.png").exists());
        assert!(!tmp.path().join("book/9.png").exists());
        assert!(!tmp.path().join(".book.rasterizing").exists());
    }

    #[tokio::test]
    async fn failed_conversion_leaves_no_marker_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = tmp.path().join("book.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();

        let flow = RasterizeFlow::new(Arc::new(StubRasterizer {
            pages: 1,
            fail: true,
        }));
        let err = flow.run(&ctx_for(&pdf)).await.unwrap_err();

        assert!(matches!(err, AppError::Tool(ToolError::Failed { .. })));
        assert!(!err.is_fatal());
        assert!(!tmp.path().join("book").exists());
        assert!(!tmp.path().join(".book.rasterizing").exists());
    }
}
