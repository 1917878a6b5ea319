//! 警告写入服务 - 业务能力层
//!
//! 只负责"写 warn.txt"能力，不关心流程

use crate::error::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// 警告写入服务
///
/// 职责：
/// - 把需要人工处理的问题（ISBN 未找到、OCR 放弃等）追加到 warn.txt
/// - 每次只写一行，不关心流程顺序
#[derive(Debug, Clone)]
pub struct WarnWriter {
    warn_file_path: PathBuf,
}

impl WarnWriter {
    /// 使用指定的文件路径创建
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.warn_file_path
    }

    /// 写入警告信息
    ///
    /// # 参数
    /// - `subject`: 出问题的对象（书名、图片路径）
    /// - `reason`: 原因
    pub async fn write(&self, subject: &str, reason: &str) -> AppResult<()> {
        debug!("写入警告: {} | {}", subject, reason);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)
            .await
            .map_err(|e| AppError::file_write_failed(&self.warn_file_path, e))?;

        let warn_msg = format!(
            "[{}] {} | {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            subject,
            reason.replace('\n', " ")
        );

        file.write_all(warn_msg.as_bytes())
            .await
            .map_err(|e| AppError::file_write_failed(&self.warn_file_path, e))?;

        Ok(())
    }
}
