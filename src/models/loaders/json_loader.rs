//! 工作区产物的读写
//!
//! 标记文件（`.isbn`、`-ocr.json`、`.imported`）一律先写临时文件再重命名，
//! 中途退出不会留下写了一半的标记。

use crate::error::{AppError, AppResult};
use crate::models::page::Project;
use std::path::{Path, PathBuf};
use tokio::fs;

/// ISBN 标记文件名
pub const ISBN_MARKER: &str = ".isbn";
/// 导入完成标记文件名
pub const IMPORT_MARKER: &str = ".imported";
/// OCR JSON 后缀
pub const OCR_JSON_SUFFIX: &str = "-ocr.json";

/// `workspace/book` → `workspace/book-ocr.json`
pub fn json_path_for(image_dir: &Path) -> PathBuf {
    let mut name = image_dir.as_os_str().to_os_string();
    name.push(OCR_JSON_SUFFIX);
    PathBuf::from(name)
}

/// `workspace/book-ocr.json` → `workspace/book`
pub fn image_dir_for_json(json_path: &Path) -> Option<PathBuf> {
    let file_name = json_path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(OCR_JSON_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(json_path.with_file_name(stem))
}

/// 原子写入：写入同目录下的临时文件后重命名
pub async fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> AppResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp_path, contents)
        .await
        .map_err(|e| AppError::file_write_failed(&tmp_path, e))?;

    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| AppError::file_write_failed(path, e))?;

    Ok(())
}

/// 读取 `<目录>/.isbn`（去掉首尾空白）
pub async fn read_isbn(image_dir: &Path) -> AppResult<String> {
    let path = image_dir.join(ISBN_MARKER);
    let content = fs::read_to_string(&path)
        .await
        .map_err(|e| AppError::file_read_failed(&path, e))?;
    Ok(content.trim().to_string())
}

/// 写入 `<目录>/.isbn`，只包含 ISBN 本身
pub async fn write_isbn(image_dir: &Path, isbn: &str) -> AppResult<()> {
    write_atomic(&image_dir.join(ISBN_MARKER), isbn.trim()).await
}

/// 从 JSON 文件加载 Project
pub async fn load_project(json_path: &Path) -> AppResult<Project> {
    let content = fs::read_to_string(json_path)
        .await
        .map_err(|e| AppError::file_read_failed(json_path, e))?;

    let project: Project = serde_json::from_str(&content)?;
    Ok(project)
}

/// 以格式化 JSON 保存 Project
pub async fn save_project(json_path: &Path, project: &Project) -> AppResult<()> {
    let json = serde_json::to_string_pretty(project)?;
    write_atomic(json_path, json).await
}

/// 读取导入完成标记（内容为项目名）
pub async fn read_import_marker(image_dir: &Path) -> Option<String> {
    fs::read_to_string(image_dir.join(IMPORT_MARKER))
        .await
        .ok()
        .map(|s| s.trim().to_string())
}

/// 写入导入完成标记
pub async fn write_import_marker(image_dir: &Path, project_name: &str) -> AppResult<()> {
    write_atomic(&image_dir.join(IMPORT_MARKER), project_name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::page::Page;

    #[test]
    fn json_path_and_image_dir_are_inverse() {
        let dir = Path::new("workspace/book");
        let json = json_path_for(dir);
        assert_eq!(json, PathBuf::from("workspace/book-ocr.json"));
        assert_eq!(image_dir_for_json(&json), Some(dir.to_path_buf()));
        assert_eq!(image_dir_for_json(Path::new("workspace/-ocr.json")), None);
        assert_eq!(image_dir_for_json(Path::new("workspace/book.json")), None);
    }

    #[tokio::test]
    async fn isbn_marker_is_trimmed_plain_text() {
        let tmp = tempfile::tempdir().unwrap();
        write_isbn(tmp.path(), " 9784297129148\n").await.unwrap();

        let raw = std::fs::read_to_string(tmp.path().join(ISBN_MARKER)).unwrap();
        assert_eq!(raw, "9784297129148");
        assert_eq!(read_isbn(tmp.path()).await.unwrap(), "9784297129148");
        assert!(!tmp.path().join("..isbn.tmp").exists());
    }

    #[tokio::test]
    async fn project_is_saved_pretty_printed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("book-ocr.json");
        let project = Project {
            pages: vec![Page::new("0", vec!["0".into()])],
        };

        save_project(&path, &project).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"pages\""));
        assert_eq!(load_project(&path).await.unwrap(), project);
    }

    #[tokio::test]
    async fn missing_isbn_reports_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_isbn(tmp.path()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::File(crate::error::FileError::NotFound { .. })
        ));
    }
}
