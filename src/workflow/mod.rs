//! 流程层（Workflow）
//!
//! 每个阶段定义"一个工作项"的完整处理流程，最后一步总是写入完成标记：
//! - `RasterizeFlow`：PDF → 图片目录
//! - `IsbnFlow`：图片目录 → `.isbn`
//! - `OcrFlow`：图片目录 → `-ocr.json`
//! - `ImportFlow`：`-ocr.json` → Cosense 项目 → `.imported`

pub mod import_flow;
pub mod isbn_flow;
pub mod ocr_flow;
pub mod phase_ctx;
pub mod rasterize_flow;

pub use import_flow::ImportFlow;
pub use isbn_flow::IsbnFlow;
pub use ocr_flow::{OcrFlow, ProfilePage};
pub use phase_ctx::PhaseCtx;
pub use rasterize_flow::RasterizeFlow;

/// 单个工作项的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// 处理成功，已写入完成标记
    Success,
    /// 预期内的跳过（已记录到 warn.txt），下次运行会再次尝试
    Skipped,
}
