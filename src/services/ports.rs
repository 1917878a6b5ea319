//! 外部协作者接口 - 业务能力层
//!
//! 流程层只依赖这里的 trait，具体实现（mutool、Gyazo、NDL、Google Books、
//! Cosense API、浏览器）在 `clients/` 和 `browser/` 中，测试中用桩实现替换。

use crate::error::AppResult;
use crate::models::{BookInfo, Page, Project};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// PDF 光栅化工具
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// 确认工具可以启动，不可用时返回 `ToolError::Missing`
    async fn ensure_available(&self) -> AppResult<()>;

    /// 把 PDF 的每一页输出为 `<out_dir>/<页码>.png`（页码从1开始）
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> AppResult<()>;
}

/// 图床 + OCR 服务
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// 上传图片，返回图片 ID
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> AppResult<String>;

    /// 获取 OCR 文本
    ///
    /// 文本尚未生成时返回 `NotFoundError::OcrNotReady`
    async fn fetch_ocr(&self, image_id: &str) -> AppResult<String>;
}

/// 按书名检索书目信息
#[async_trait]
pub trait BookSearch: Send + Sync {
    /// 用于日志的检索源名称
    fn name(&self) -> &str;

    /// 没有结果时返回 `NotFoundError::Isbn`，服务异常时返回 `ApiError`
    async fn search_by_title(&self, title: &str) -> AppResult<BookInfo>;
}

/// 人工输入 ISBN
#[async_trait]
pub trait IsbnPrompt: Send + Sync {
    /// 空输入返回 None
    async fn ask(&self, title: &str) -> AppResult<Option<String>>;
}

/// 创建 Cosense 项目
#[async_trait]
pub trait ProjectCreator: Send + Sync {
    /// 创建（或复用已存在的）项目，返回项目名
    async fn create_project(&self, project_name: &str) -> AppResult<String>;
}

/// 向 Cosense 项目导入页面
#[async_trait]
pub trait PageImporter: Send + Sync {
    async fn import_pages(&self, project_name: &str, project: &Project) -> AppResult<()>;
}

/// 读取已有的 Cosense 页面（个人资料页）
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// `path` 形如 `<项目>/<页面>`
    async fn fetch_page(&self, path: &str) -> AppResult<Page>;
}

/// 导入阶段使用的一组 Cosense 能力
#[derive(Clone)]
pub struct WikiPorts {
    pub creator: Arc<dyn ProjectCreator>,
    pub importer: Arc<dyn PageImporter>,
}

/// 打开 Cosense 会话
///
/// 只有导入阶段确实有待处理项时才会调用（例如启动浏览器）
#[async_trait]
pub trait WikiConnector: Send + Sync {
    async fn connect(&self) -> AppResult<WikiPorts>;
}
