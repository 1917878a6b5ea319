//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责阶段调度和统计，是整个系统的"指挥中心"。
//!
//! ### `pipeline_driver` - 流水线驱动
//! - 管理应用生命周期（初始化、运行）
//! - 每个阶段开始前扫描工作区（`PhaseScanner`）
//! - 控制每个阶段的并发数量（`RateLimitedBatcher`）
//! - 组装外部协作者（`Collaborators`），按需打开浏览器
//! - 输出每个阶段和全局的统计信息
//!
//! ## 层次关系
//!
//! ```text
//! pipeline_driver (处理 Vec<WorkItem>，按阶段)
//!     ↓
//! workflow::*Flow (处理单个工作项)
//!     ↓
//! services (能力层：scanner / ocr / isbn / renderer / warn)
//!     ↓
//! infrastructure (基础设施：JsExecutor / RetryPolicy / RateLimitedBatcher)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层决定何时打开浏览器
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod pipeline_driver;

// 重新导出主要类型
pub use pipeline_driver::{App, Collaborators, Phase, PhaseStats, RunSummary};
