//! 业务能力层（Services）
//!
//! 描述"我能做什么"，每个服务只处理单个对象（一个目录、一本书、一张图片）：
//! - `PhaseScanner` - 计算每个阶段还剩哪些工作
//! - `OcrPagePipeline` - 上传 → 等待 → 获取 OCR → 渲染
//! - `IsbnResolutionChain` - NDL → Google Books → 人工输入
//! - `PageRenderer` - 渲染 Cosense 页面
//! - `WarnWriter` - 写 warn.txt 能力
//! - `ports` - 外部协作者接口

pub mod isbn_prompt;
pub mod isbn_resolver;
pub mod ocr_pipeline;
pub mod page_renderer;
pub mod phase_scanner;
pub mod ports;
pub mod warn_writer;

pub use isbn_prompt::StdinIsbnPrompt;
pub use isbn_resolver::IsbnResolutionChain;
pub use ocr_pipeline::{OcrPagePipeline, OcrSettings, OcrState};
pub use page_renderer::PageRenderer;
pub use phase_scanner::PhaseScanner;
pub use ports::{
    BookSearch, ImageHost, IsbnPrompt, PageImporter, ProfileSource, ProjectCreator, Rasterizer,
    WikiConnector, WikiPorts,
};
pub use warn_writer::WarnWriter;
