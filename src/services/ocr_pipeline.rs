//! OCR 页面流水线 - 业务能力层
//!
//! 一本书的所有图片按以下顺序处理：
//!
//! ```text
//! PendingUpload ──上传──▶ Uploaded ──静默等待──▶ AwaitingOcr ──轮询──▶ OcrReady
//!       │                                              │
//!       └──────────────上传失败─────────▶ OcrFailed ◀──┘ 放弃 / 响应格式错误
//! ```
//!
//! - 上传：固定间隔重试；图片文件不存在时立即失败
//! - 全部上传完成后统一等待一段时间，再开始轮询
//! - 轮询：只有"OCR 尚未完成"会按指数退避重试
//! - 任何一页失败都不会影响其他页，失败页以空文本渲染并写入 warn.txt

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{BatchConfig, RateLimitedBatcher, RetryPolicy};
use crate::models::Page;
use crate::services::page_renderer::PageRenderer;
use crate::services::ports::ImageHost;
use crate::services::warn_writer::WarnWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// 单张图片的处理状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrState {
    PendingUpload,
    Uploaded { image_id: String },
    AwaitingOcr { image_id: String },
    OcrReady { image_id: String, text: String },
    OcrFailed { image_id: Option<String>, reason: String },
}

impl OcrState {
    fn image_id(&self) -> Option<&str> {
        match self {
            OcrState::PendingUpload => None,
            OcrState::Uploaded { image_id }
            | OcrState::AwaitingOcr { image_id }
            | OcrState::OcrReady { image_id, .. } => Some(image_id),
            OcrState::OcrFailed { image_id, .. } => image_id.as_deref(),
        }
    }

    /// 静默等待结束
    fn begin_polling(self) -> Self {
        match self {
            OcrState::Uploaded { image_id } => OcrState::AwaitingOcr { image_id },
            other => other,
        }
    }

    /// 渲染用的 OCR 文本（失败时为空）
    fn text(&self) -> &str {
        match self {
            OcrState::OcrReady { text, .. } => text,
            _ => "",
        }
    }
}

/// 一张待处理的图片
#[derive(Debug, Clone)]
pub struct ImageJob {
    /// 在书中的位置（从0开始）
    pub index: usize,
    pub path: PathBuf,
    pub state: OcrState,
}

/// 流水线参数
#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub concurrency: usize,
    pub upload_max_attempts: usize,
    pub upload_retry_delay: Duration,
    pub quiescence: Duration,
    pub poll_max_attempts: usize,
    pub poll_base_delay: Duration,
}

impl OcrSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.ocr_concurrency,
            upload_max_attempts: config.upload_max_attempts,
            upload_retry_delay: config.upload_retry_delay(),
            quiescence: config.ocr_quiescence(),
            poll_max_attempts: config.ocr_poll_max_attempts,
            poll_base_delay: config.ocr_poll_base_delay(),
        }
    }
}

/// OCR 页面流水线
pub struct OcrPagePipeline {
    host: Arc<dyn ImageHost>,
    renderer: PageRenderer,
    warn_writer: WarnWriter,
    settings: OcrSettings,
}

impl OcrPagePipeline {
    pub fn new(
        host: Arc<dyn ImageHost>,
        renderer: PageRenderer,
        warn_writer: WarnWriter,
        settings: OcrSettings,
    ) -> Self {
        Self {
            host,
            renderer,
            warn_writer,
            settings,
        }
    }

    /// 处理一个图片目录，返回按页码排列的页面
    ///
    /// # 参数
    /// - `book`: 日志前缀（书名）
    /// - `image_dir`: 图片目录
    pub async fn build_pages(&self, book: &str, image_dir: &Path) -> AppResult<Vec<Page>> {
        let images = list_images(image_dir).await?;
        let total = images.len();
        if total == 0 {
            warn!("[{}] ⚠️ 目录中没有 PNG 图片", book);
            return Ok(Vec::new());
        }
        info!("[{}] 找到 {} 张图片", book, total);

        let jobs: Vec<ImageJob> = images
            .into_iter()
            .enumerate()
            .map(|(index, path)| ImageJob {
                index,
                path,
                state: OcrState::PendingUpload,
            })
            .collect();

        // ========== 上传 ==========
        info!("[{}] 📤 正在上传图片...", book);
        let jobs = self.run_all(jobs, |job| self.upload(book, total, job)).await;
        let uploaded = jobs
            .iter()
            .filter(|j| matches!(j.state, OcrState::Uploaded { .. }))
            .count();
        info!("[{}] ✓ 上传完成: {}/{}", book, uploaded, total);

        // ========== 等待 OCR ==========
        if uploaded > 0 {
            info!("[{}] ⏳ 等待 {:?} 让 OCR 开始处理...", book, self.settings.quiescence);
            sleep(self.settings.quiescence).await;
        }
        let jobs: Vec<ImageJob> = jobs
            .into_iter()
            .map(|mut job| {
                job.state = job.state.begin_polling();
                job
            })
            .collect();

        // ========== 获取 OCR ==========
        info!("[{}] 🔍 正在获取 OCR 结果...", book);
        let jobs = self.run_all(jobs, |job| self.poll(book, total, job)).await;

        let mut failed = 0;
        let mut pages = Vec::with_capacity(total);
        for job in &jobs {
            if let OcrState::OcrFailed { reason, .. } = &job.state {
                failed += 1;
                let subject = job.path.display().to_string();
                if let Err(e) = self.warn_writer.write(&subject, reason).await {
                    warn!("[{}] 写入 warn.txt 失败: {}", book, e);
                }
            }
            pages.push(self.renderer.render(
                job.index,
                total,
                job.state.image_id(),
                job.state.text(),
            ));
        }

        if failed > 0 {
            warn!("[{}] ⚠️ {} 页没有 OCR 文本，已写入 warn.txt", book, failed);
        }
        info!("[{}] ✓ 生成 {} 页", book, pages.len());
        Ok(pages)
    }

    /// 以流水线并发数处理所有图片，结果按原始顺序返回
    async fn run_all<F, Fut>(&self, jobs: Vec<ImageJob>, step: F) -> Vec<ImageJob>
    where
        F: Fn(ImageJob) -> Fut,
        Fut: std::future::Future<Output = ImageJob>,
    {
        let batcher = RateLimitedBatcher::new(
            "OCR",
            BatchConfig::with_concurrency(self.settings.concurrency),
        );
        batcher
            .run(jobs, |_, job| {
                let step = &step;
                async move { Ok::<_, AppError>(step(job).await) }
            })
            .await
            .into_successes()
    }

    /// PendingUpload → Uploaded | OcrFailed
    async fn upload(&self, book: &str, total: usize, mut job: ImageJob) -> ImageJob {
        let label = format!("[{} {}/{}]", book, job.index + 1, total);
        let path = job.path.clone();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // 只重试网络和 HTTP 状态错误；图片缺失或响应格式错误立即失败
        let policy = RetryPolicy::fixed(
            "上传",
            self.settings.upload_max_attempts,
            self.settings.upload_retry_delay,
        )
        .retry_if(AppError::is_transient);

        let path = path.as_path();
        let filename = filename.as_str();
        let result = policy
            .run(&label, || async move {
                let bytes = fs::read(path)
                    .await
                    .map_err(|e| AppError::file_read_failed(path, e))?;
                self.host.upload(bytes, filename).await
            })
            .await;

        job.state = match result {
            Ok(image_id) => {
                debug!("{} 上传成功: {}", label, image_id);
                OcrState::Uploaded { image_id }
            }
            Err(e) => OcrState::OcrFailed {
                image_id: None,
                reason: format!("上传失败: {}", e),
            },
        };
        job
    }

    /// AwaitingOcr → OcrReady | OcrFailed
    async fn poll(&self, book: &str, total: usize, mut job: ImageJob) -> ImageJob {
        let OcrState::AwaitingOcr { image_id } = &job.state else {
            return job;
        };
        let image_id = image_id.clone();
        let label = format!("[{} {}/{}]", book, job.index + 1, total);

        let policy = RetryPolicy::exponential(
            "OCR 轮询",
            self.settings.poll_max_attempts,
            self.settings.poll_base_delay,
        )
        .retry_if(AppError::is_ocr_not_ready);

        let id = image_id.as_str();
        let result = policy.run(&label, || self.host.fetch_ocr(id)).await;

        job.state = match result {
            Ok(text) => OcrState::OcrReady { image_id, text },
            Err(e) => OcrState::OcrFailed {
                image_id: Some(image_id),
                reason: format!("OCR 获取失败: {}", e),
            },
        };
        job
    }
}

/// 目录中的 PNG 图片，按文件名中的数字排序（`2.png` 在 `10.png` 之前）
pub async fn list_images(image_dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut read_dir = fs::read_dir(image_dir)
        .await
        .map_err(|e| AppError::file_read_failed(image_dir, e))?;

    let mut images = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(image_dir, e))?
    {
        let path = entry.path();
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if is_png {
            images.push(path);
        }
    }

    images.sort_by_key(|p| {
        let stem = p
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        (stem.parse::<u64>().unwrap_or(u64::MAX), stem)
    });
    Ok(images)
}
