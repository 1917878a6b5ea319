//! OCR JSON 生成流程 - 流程层
//!
//! 流程顺序：
//! 1. 读取个人资料页（如果配置了）
//! 2. 上传图片 → 等待 → 获取 OCR → 渲染页面
//! 3. 写入 `<目录>-ocr.json`（最后一步，写入即完成）

use crate::error::AppResult;
use crate::models::{json_path_for, save_project, Page, Project};
use crate::services::{OcrPagePipeline, ProfileSource, WarnWriter};
use crate::workflow::{PhaseCtx, ProcessResult};
use std::sync::Arc;
use tracing::{info, warn};

/// 个人资料页来源及其路径（`<项目>/<页面>`）
pub struct ProfilePage {
    pub source: Arc<dyn ProfileSource>,
    pub path: String,
}

/// OCR JSON 生成流程
pub struct OcrFlow {
    pipeline: OcrPagePipeline,
    profile: Option<ProfilePage>,
    warn_writer: WarnWriter,
}

impl OcrFlow {
    pub fn new(
        pipeline: OcrPagePipeline,
        profile: Option<ProfilePage>,
        warn_writer: WarnWriter,
    ) -> Self {
        Self {
            pipeline,
            profile,
            warn_writer,
        }
    }

    pub async fn run(&self, ctx: &PhaseCtx) -> AppResult<ProcessResult> {
        // 资料页读取失败时整本书失败，避免白白上传
        let profile = self.fetch_profile(ctx).await?;

        let pages = self.pipeline.build_pages(&ctx.book, ctx.path()).await?;
        if pages.is_empty() {
            warn!("{} ⚠️ 没有可处理的图片，写入 warn.txt", ctx);
            self.warn_writer.write(&ctx.book, "目录中没有图片").await?;
            return Ok(ProcessResult::Skipped);
        }

        let page_count = pages.len();
        let project = Project::with_profile(profile, pages);
        let json_path = json_path_for(ctx.path());
        save_project(&json_path, &project).await?;

        info!(
            "{} ✓ 已生成 {} ({} 页)",
            ctx,
            json_path.display(),
            page_count
        );
        Ok(ProcessResult::Success)
    }

    async fn fetch_profile(&self, ctx: &PhaseCtx) -> AppResult<Option<Page>> {
        let Some(profile) = &self.profile else {
            return Ok(None);
        };
        let page = profile.source.fetch_page(&profile.path).await.map_err(|e| {
            warn!("{} 读取资料页 {} 失败: {}", ctx, profile.path, e);
            e
        })?;
        Ok(Some(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{load_project, WorkItem};
    use crate::services::{ImageHost, OcrSettings, PageRenderer};
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    struct EchoHost;

    #[async_trait]
    impl ImageHost for EchoHost {
        async fn upload(&self, _bytes: Vec<u8>, filename: &str) -> AppResult<String> {
            Ok(format!("id-{}", filename))
        }

        async fn fetch_ocr(&self, _image_id: &str) -> AppResult<String> {
            Ok("Hello".to_string())
        }
    }

    struct StubProfile(bool);

    #[async_trait]
    impl ProfileSource for StubProfile {
        async fn fetch_page(&self, path: &str) -> AppResult<Page> {
            if self.0 {
                Ok(Page::new("me", vec!["me".into(), format!("from {}", path)]))
            } else {
                Err(AppError::api_bad_status("pages", 404, "NotFoundError"))
            }
        }
    }

    fn flow(profile_ok: Option<bool>, warn_path: &Path) -> OcrFlow {
        let settings = OcrSettings {
            concurrency: 4,
            upload_max_attempts: 1,
            upload_retry_delay: Duration::ZERO,
            quiescence: Duration::ZERO,
            poll_max_attempts: 1,
            poll_base_delay: Duration::ZERO,
        };
        let warn_writer = WarnWriter::with_path(warn_path);
        let pipeline = OcrPagePipeline::new(
            Arc::new(EchoHost),
            PageRenderer::new("https://gyazo.com"),
            warn_writer.clone(),
            settings,
        );
        let profile = profile_ok.map(|ok| ProfilePage {
            source: Arc::new(StubProfile(ok)),
            path: "me/profile".to_string(),
        });
        OcrFlow::new(pipeline, profile, warn_writer)
    }

    fn book_dir(root: &Path, images: usize) -> std::path::PathBuf {
        let dir = root.join("book");
        std::fs::create_dir(&dir).unwrap();
        for i in 1..=images {
            std::fs::write(dir.join(format!("{}.png", i)), b"png").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn profile_page_is_prepended() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = book_dir(tmp.path(), 2);
        let ctx = PhaseCtx::new(&WorkItem::new(&dir, 1), "book");

        let result = flow(Some(true), &tmp.path().join("warn.txt"))
            .run(&ctx)
            .await
            .unwrap();

        assert_eq!(result, ProcessResult::Success);
        let project = load_project(&tmp.path().join("book-ocr.json")).await.unwrap();
        let titles: Vec<&str> = project.pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["me", "0", "1"]);
        assert!(project.pages[1].lines.contains(&"> Hello".to_string()));
    }

    #[tokio::test]
    async fn profile_failure_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = book_dir(tmp.path(), 1);
        let ctx = PhaseCtx::new(&WorkItem::new(&dir, 1), "book");

        let err = flow(Some(false), &tmp.path().join("warn.txt"))
            .run(&ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Api(_)));
        assert!(!tmp.path().join("book-ocr.json").exists());
    }

    #[tokio::test]
    async fn empty_directory_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = book_dir(tmp.path(), 0);
        let warn_path = tmp.path().join("warn.txt");
        let ctx = PhaseCtx::new(&WorkItem::new(&dir, 1), "book");

        let result = flow(None, &warn_path).run(&ctx).await.unwrap();

        assert_eq!(result, ProcessResult::Skipped);
        assert!(!tmp.path().join("book-ocr.json").exists());
        assert!(std::fs::read_to_string(&warn_path).unwrap().contains("book"));
    }
}
