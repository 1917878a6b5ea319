//! 阶段扫描服务 - 业务能力层
//!
//! 每次运行都从文件系统重新计算"还剩什么没做"：
//!
//! | 阶段 | 输入 | 完成标记 |
//! |---|---|---|
//! | 光栅化 | `<name>.pdf` | 同名目录 `<name>/` |
//! | ISBN | 图片目录 | `<dir>/.isbn` |
//! | OCR | `<dir>/.isbn` | `<dir>-ocr.json` |
//! | 导入 | `<dir>-ocr.json` | `<dir>/.imported` |
//!
//! 单个条目 stat 失败只会把它排除在外，不会中断整个扫描。

use crate::error::{AppError, AppResult, FileError};
use crate::models::loaders::{image_dir_for_json, json_path_for, IMPORT_MARKER, ISBN_MARKER, OCR_JSON_SUFFIX};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// 阶段扫描器（只读）
#[derive(Debug, Clone)]
pub struct PhaseScanner {
    root: PathBuf,
}

impl PhaseScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 还没有光栅化的 PDF
    pub async fn pending_pdfs(&self) -> AppResult<Vec<PathBuf>> {
        let mut pending = Vec::new();
        for path in self.entries().await? {
            let Some(stem) = pdf_stem(&path) else {
                continue;
            };
            let out_dir = path.with_file_name(stem);
            if !exists(&out_dir).await {
                pending.push(path);
            }
        }
        Ok(pending)
    }

    /// 还没有 `.isbn` 的图片目录
    pub async fn pending_isbn(&self) -> AppResult<Vec<PathBuf>> {
        let mut pending = Vec::new();
        for dir in self.image_dirs().await? {
            if !exists(&dir.join(ISBN_MARKER)).await {
                pending.push(dir);
            }
        }
        Ok(pending)
    }

    /// 有 `.isbn` 但还没有 `-ocr.json` 的图片目录
    pub async fn pending_ocr(&self) -> AppResult<Vec<PathBuf>> {
        let mut pending = Vec::new();
        for dir in self.image_dirs().await? {
            if exists(&dir.join(ISBN_MARKER)).await && !exists(&json_path_for(&dir)).await {
                pending.push(dir);
            }
        }
        Ok(pending)
    }

    /// 还没有导入的 `-ocr.json`
    pub async fn pending_import(&self) -> AppResult<Vec<PathBuf>> {
        let mut pending = Vec::new();
        for path in self.entries().await? {
            let Some(image_dir) = image_dir_for_json(&path) else {
                continue;
            };
            if !is_file(&path).await {
                continue;
            }
            if !exists(&image_dir.join(IMPORT_MARKER)).await {
                pending.push(path);
            }
        }
        Ok(pending)
    }

    /// 工作区下的图片目录（忽略以 `.` 开头的隐藏目录，例如光栅化中的临时目录）
    async fn image_dirs(&self) -> AppResult<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for path in self.entries().await? {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| n.starts_with('.'));
            if hidden {
                continue;
            }
            match fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => dirs.push(path),
                Ok(_) => {}
                Err(e) => debug!("跳过无法读取的条目 {}: {}", path.display(), e),
            }
        }
        Ok(dirs)
    }

    /// 按文件系统枚举顺序列出根目录的直接子条目
    async fn entries(&self) -> AppResult<Vec<PathBuf>> {
        let mut read_dir = fs::read_dir(&self.root).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::File(FileError::DirectoryNotFound {
                    path: self.root.clone(),
                })
            } else {
                AppError::file_read_failed(&self.root, e)
            }
        })?;

        let mut entries = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => entries.push(entry.path()),
                Ok(None) => break,
                Err(e) => {
                    warn!("读取 {} 的目录项失败: {}", self.root.display(), e);
                    break;
                }
            }
        }
        Ok(entries)
    }
}

/// `book.PDF` → `book`
fn pdf_stem(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case("pdf") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}

/// stat 失败视为不存在
async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

/// OCR JSON 对应的书名（用于日志）
pub fn book_name_for_json(json_path: &Path) -> String {
    json_path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(OCR_JSON_SUFFIX))
        .unwrap_or_default()
        .to_string()
}
