use std::fmt::Display;
use std::path::{Path, PathBuf};

/// 一个待处理的工作项
///
/// 只用于日志标记，不携带可变状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// 工作项对应的路径（PDF、图片目录或 JSON）
    pub path: PathBuf,
    /// 在本批中的序号（从1开始）
    pub index: usize,
}

impl WorkItem {
    pub fn new(path: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            path: path.into(),
            index,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 用于日志显示的名称（文件名）
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

impl Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[#{} {}]", self.index, self.name())
    }
}

/// 给路径列表编号（从1开始）
pub fn number_items(paths: Vec<PathBuf>) -> Vec<WorkItem> {
    paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| WorkItem::new(path, i + 1))
        .collect()
}
