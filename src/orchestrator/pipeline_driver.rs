//! 流水线驱动 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，按顺序驱动四个阶段：
//!
//! 1. **光栅化**：`book.pdf` → `book/`
//! 2. **ISBN 解析**：`book/` → `book/.isbn`
//! 3. **OCR**：`book/.isbn` → `book-ocr.json`
//! 4. **导入**：`book-ocr.json` → Cosense 项目 → `book/.imported`
//!
//! ## 设计特点
//!
//! - **无状态**：每个阶段开始前重新扫描工作区，后面的阶段能看到前面阶段刚生成的产物
//! - **故障隔离**：单个工作项失败只记录日志，不影响其他工作项
//! - **致命错误**：光栅化工具缺失、配置缺失时立即结束整个运行
//! - **按需连接**：只有导入阶段确实有待处理项时才打开浏览器

use crate::browser::BrowserWikiConnector;
use crate::clients::{
    build_http_client, CosenseClient, GoogleBooksClient, GyazoClient, MutoolRasterizer, NdlClient,
};
use crate::config::{Config, ImportMode};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{BatchConfig, RateLimitedBatcher, ShutdownSignal};
use crate::models::number_items;
use crate::services::phase_scanner::book_name_for_json;
use crate::services::{
    BookSearch, ImageHost, IsbnPrompt, IsbnResolutionChain, OcrPagePipeline, OcrSettings,
    PageImporter, PageRenderer, PhaseScanner, ProfileSource, Rasterizer, StdinIsbnPrompt,
    WarnWriter, WikiConnector,
};
use crate::utils::logging::{
    init_log_file, log_phase_complete, log_phase_start, log_startup, print_final_stats,
};
use crate::workflow::{
    ImportFlow, IsbnFlow, OcrFlow, PhaseCtx, ProcessResult, ProfilePage, RasterizeFlow,
};
use anyhow::Result;
use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Rasterize,
    ResolveIsbn,
    BuildOcr,
    Import,
}

impl Phase {
    /// 执行顺序
    pub const ALL: [Phase; 4] = [
        Phase::Rasterize,
        Phase::ResolveIsbn,
        Phase::BuildOcr,
        Phase::Import,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Rasterize => "光栅化",
            Phase::ResolveIsbn => "ISBN 解析",
            Phase::BuildOcr => "OCR",
            Phase::Import => "导入",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 单个阶段的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseStats {
    pub pending: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 一次运行的统计（按执行顺序）
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub phases: Vec<(Phase, PhaseStats)>,
}

impl RunSummary {
    /// 某个阶段的统计，未执行的阶段为全零
    pub fn stats(&self, phase: Phase) -> PhaseStats {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, s)| *s)
            .unwrap_or_default()
    }

    /// 本次运行实际处理的工作项数量
    pub fn attempted(&self) -> usize {
        self.phases
            .iter()
            .map(|(_, s)| s.succeeded + s.skipped + s.failed)
            .sum()
    }
}

/// 外部协作者
///
/// 生产环境由 `from_config` 组装，测试中替换为桩实现
pub struct Collaborators {
    pub rasterizer: Arc<dyn Rasterizer>,
    pub image_host: Arc<dyn ImageHost>,
    /// 按优先级排列
    pub book_searches: Vec<Arc<dyn BookSearch>>,
    pub isbn_prompt: Option<Arc<dyn IsbnPrompt>>,
    pub profile_source: Option<Arc<dyn ProfileSource>>,
    /// None 表示不执行导入
    pub wiki: Option<Arc<dyn WikiConnector>>,
}

impl Collaborators {
    /// mutool + Gyazo + NDL/Google Books + Cosense（浏览器或 API）
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let http = build_http_client()?;
        let cosense = Arc::new(CosenseClient::new(http.clone(), config));

        let wiki: Option<Arc<dyn WikiConnector>> = match config.import_mode {
            ImportMode::Disabled => None,
            ImportMode::Browser => Some(Arc::new(BrowserWikiConnector::new(config.clone(), None))),
            ImportMode::Api => {
                let api: Arc<dyn PageImporter> = cosense.clone();
                Some(Arc::new(BrowserWikiConnector::new(config.clone(), Some(api))))
            }
        };

        let isbn_prompt: Option<Arc<dyn IsbnPrompt>> = if config.interactive_isbn {
            Some(Arc::new(StdinIsbnPrompt::new()))
        } else {
            None
        };

        let profile_source: Option<Arc<dyn ProfileSource>> = match config.profile_page {
            Some(_) => Some(cosense),
            None => None,
        };

        let book_searches: Vec<Arc<dyn BookSearch>> = vec![
            Arc::new(NdlClient::new(http.clone(), config)),
            Arc::new(GoogleBooksClient::new(http.clone(), config)),
        ];

        Ok(Self {
            rasterizer: Arc::new(MutoolRasterizer::new(config)),
            image_host: Arc::new(GyazoClient::new(http, config)),
            book_searches,
            isbn_prompt,
            profile_source,
            wiki,
        })
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    collaborators: Collaborators,
    scanner: PhaseScanner,
    warn_writer: WarnWriter,
    shutdown: ShutdownSignal,
}

impl App {
    /// 初始化应用：日志文件 + 真实的外部协作者
    pub async fn initialize(config: Config, shutdown: ShutdownSignal) -> Result<Self> {
        init_log_file(&config.output_log_file)?;

        let import_mode = format!("{:?}", config.import_mode);
        log_startup(&config.workspace_dir.display().to_string(), &import_mode);

        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::with_collaborators(config, collaborators, shutdown))
    }

    /// 使用指定的协作者创建应用（不写日志文件）
    pub fn with_collaborators(
        config: Config,
        collaborators: Collaborators,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            scanner: PhaseScanner::new(&config.workspace_dir),
            warn_writer: WarnWriter::with_path(&config.warn_file),
            config,
            collaborators,
            shutdown,
        }
    }

    /// 运行应用主逻辑
    ///
    /// 返回 Err 只表示致命错误；单个工作项的失败体现在统计中
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        info!("📁 扫描工作区: {}", self.scanner.root().display());

        for phase in Phase::ALL {
            if self.shutdown.is_requested() {
                warn!("⚠️ 收到退出信号，不再开始阶段: {}", phase);
                break;
            }

            let result = match phase {
                Phase::Rasterize => self.rasterize_phase().await,
                Phase::ResolveIsbn => self.isbn_phase().await,
                Phase::BuildOcr => self.ocr_phase().await,
                Phase::Import => self.import_phase().await,
            };

            match result {
                Ok(stats) => summary.phases.push((phase, stats)),
                Err(e) => {
                    error!("❌ {} 阶段发生致命错误: {}", phase, e);
                    return Err(e.into());
                }
            }
        }

        let rows: Vec<_> = summary
            .phases
            .iter()
            .map(|(p, s)| (p.label(), s.pending, s.succeeded, s.skipped, s.failed))
            .collect();
        print_final_stats(&rows, &self.config.output_log_file, &self.config.warn_file);

        Ok(summary)
    }

    // ========== 阶段 ==========

    async fn rasterize_phase(&self) -> AppResult<PhaseStats> {
        let pending = self.scanner.pending_pdfs().await?;
        if pending.is_empty() {
            info!("✓ {}: 没有待处理的 PDF", Phase::Rasterize);
            return Ok(PhaseStats::default());
        }

        // 工具缺失时没有备用方案，直接结束
        self.collaborators.rasterizer.ensure_available().await?;

        let flow = RasterizeFlow::new(self.collaborators.rasterizer.clone());
        let flow = &flow;
        self.run_phase(
            Phase::Rasterize,
            pending,
            self.config.rasterize_concurrency,
            pdf_book_name,
            move |ctx| async move { flow.run(&ctx).await },
        )
        .await
    }

    async fn isbn_phase(&self) -> AppResult<PhaseStats> {
        let pending = self.scanner.pending_isbn().await?;
        if pending.is_empty() {
            info!("✓ {}: 没有待处理的目录", Phase::ResolveIsbn);
            return Ok(PhaseStats::default());
        }

        let chain = IsbnResolutionChain::new(
            self.collaborators.book_searches.clone(),
            self.collaborators.isbn_prompt.clone(),
        );
        let flow = IsbnFlow::new(chain, self.warn_writer.clone());
        let flow = &flow;
        self.run_phase(
            Phase::ResolveIsbn,
            pending,
            self.config.isbn_concurrency,
            dir_book_name,
            move |ctx| async move { flow.run(&ctx).await },
        )
        .await
    }

    async fn ocr_phase(&self) -> AppResult<PhaseStats> {
        let pending = self.scanner.pending_ocr().await?;
        if pending.is_empty() {
            info!("✓ {}: 没有待处理的书籍", Phase::BuildOcr);
            return Ok(PhaseStats::default());
        }

        self.config.validate_for_ocr()?;

        let pipeline = OcrPagePipeline::new(
            self.collaborators.image_host.clone(),
            PageRenderer::new(&self.config.gyazo_image_base_url),
            self.warn_writer.clone(),
            OcrSettings::from_config(&self.config),
        );
        let profile = match (&self.config.profile_page, &self.collaborators.profile_source) {
            (Some(path), Some(source)) => Some(ProfilePage {
                source: source.clone(),
                path: path.clone(),
            }),
            _ => None,
        };
        let flow = OcrFlow::new(pipeline, profile, self.warn_writer.clone());
        let flow = &flow;
        self.run_phase(
            Phase::BuildOcr,
            pending,
            self.config.book_concurrency,
            dir_book_name,
            move |ctx| async move { flow.run(&ctx).await },
        )
        .await
    }

    async fn import_phase(&self) -> AppResult<PhaseStats> {
        let pending = self.scanner.pending_import().await?;
        if pending.is_empty() {
            info!("✓ {}: 没有待导入的 JSON", Phase::Import);
            return Ok(PhaseStats::default());
        }

        let Some(connector) = &self.collaborators.wiki else {
            info!("⏭️ 导入已关闭，{} 个 JSON 留待下次导入", pending.len());
            return Ok(PhaseStats {
                pending: pending.len(),
                ..Default::default()
            });
        };

        if self.config.import_mode == ImportMode::Api {
            self.config.validate_for_api_import()?;
        }

        let wiki = match connector.connect().await {
            Ok(wiki) => wiki,
            Err(e) => {
                error!("❌ 无法打开 Cosense 会话，本次不导入: {}", e);
                return Ok(PhaseStats {
                    pending: pending.len(),
                    failed: pending.len(),
                    ..Default::default()
                });
            }
        };

        let flow = ImportFlow::new(wiki, self.config.project_prefix.clone());
        let flow = &flow;
        // 浏览器只有一个页面，逐本导入
        self.run_phase(
            Phase::Import,
            pending,
            1,
            book_name_for_json,
            move |ctx| async move { flow.run(&ctx).await },
        )
        .await
    }

    /// 以给定并发处理一个阶段的所有工作项
    ///
    /// 单项失败只计入统计；出现致命错误时在本批结束后返回该错误
    async fn run_phase<F, Fut>(
        &self,
        phase: Phase,
        pending: Vec<PathBuf>,
        concurrency: usize,
        book_name: fn(&Path) -> String,
        handler: F,
    ) -> AppResult<PhaseStats>
    where
        F: Fn(PhaseCtx) -> Fut,
        Fut: Future<Output = AppResult<ProcessResult>>,
    {
        let mut stats = PhaseStats {
            pending: pending.len(),
            ..Default::default()
        };
        log_phase_start(phase.label(), stats.pending, concurrency);

        // 每批恰好一轮并发，退出信号在批与批之间生效
        let config = BatchConfig::with_concurrency(concurrency).batched(concurrency.max(1), None);
        let batcher =
            RateLimitedBatcher::new(phase.label(), config).with_shutdown(self.shutdown.clone());

        let handler = &handler;
        let run = batcher
            .run(number_items(pending), |_, item| {
                let ctx = PhaseCtx::new(&item, book_name(item.path()));
                async move {
                    let result = handler(ctx.clone()).await;
                    if let Err(e) = &result {
                        error!("{} ❌ {}失败: {}", ctx, phase, e);
                    }
                    result
                }
            })
            .await;

        let mut fatal: Option<AppError> = None;
        for outcome in run.outcomes {
            match outcome.result {
                Ok(ProcessResult::Success) => stats.succeeded += 1,
                Ok(ProcessResult::Skipped) => stats.skipped += 1,
                Err(e) => {
                    stats.failed += 1;
                    if e.is_fatal() && fatal.is_none() {
                        fatal = Some(e);
                    }
                }
            }
        }

        log_phase_complete(phase.label(), stats.succeeded, stats.skipped, stats.failed);
        match fatal {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}

/// `book.pdf` → `book`
fn pdf_book_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// `workspace/book` → `book`
fn dir_book_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
