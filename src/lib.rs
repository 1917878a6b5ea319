//! # PDF to Cosense
//!
//! 把扫描书籍的 PDF 变成 Cosense 项目：光栅化 → ISBN → Gyazo OCR → 导入
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），提供与业务无关的能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `RetryPolicy` / `RateLimitedBatcher` - 重试与限速
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个对象
//! - `PhaseScanner` - 计算每个阶段的剩余工作
//! - `OcrPagePipeline` - 上传 → 等待 → OCR → 渲染
//! - `IsbnResolutionChain` - NDL → Google Books → 人工输入
//! - `WarnWriter` - 写 warn.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个工作项"在每个阶段的完整处理流程
//! - `PhaseCtx` - 上下文封装（序号 + 书名 + 路径）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/pipeline_driver` - 按阶段调度、统计
//!
//! 外部服务的适配器位于 `clients/`（mutool、Gyazo、NDL、Google Books、Cosense API）
//! 和 `browser/`（在已登录的浏览器中创建项目、导入页面）。

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{JsExecutor, ShutdownSignal};
pub use models::{BookInfo, Page, Project};
pub use orchestrator::{App, Collaborators, Phase, PhaseStats, RunSummary};
pub use workflow::{PhaseCtx, ProcessResult};
