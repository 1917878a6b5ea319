//! 阶段处理上下文
//!
//! 封装"我正在处理第几本书、它叫什么、对应哪个路径"这一信息

use crate::models::WorkItem;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// 阶段处理上下文
#[derive(Debug, Clone)]
pub struct PhaseCtx {
    /// 工作项路径（PDF、图片目录或 OCR JSON）
    pub path: PathBuf,

    /// 在本阶段中的序号（仅用于日志显示）
    pub index: usize,

    /// 书名（不含扩展名和 `-ocr.json` 后缀）
    pub book: String,
}

impl PhaseCtx {
    pub fn new(item: &WorkItem, book: impl Into<String>) -> Self {
        Self {
            path: item.path.clone(),
            index: item.index,
            book: book.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Display for PhaseCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[书籍 #{} {}]", self.index, self.book)
    }
}
