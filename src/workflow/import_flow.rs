//! 导入流程 - 流程层
//!
//! `.isbn` → 项目名 `<前缀><ISBN>` → 创建（或复用）项目 → 导入 → `.imported`

use crate::error::{AppError, AppResult, FileError};
use crate::models::{image_dir_for_json, load_project, read_import_marker, read_isbn, write_import_marker};
use crate::services::WikiPorts;
use crate::workflow::{PhaseCtx, ProcessResult};
use tracing::info;

/// 导入流程
pub struct ImportFlow {
    wiki: WikiPorts,
    project_prefix: String,
}

impl ImportFlow {
    pub fn new(wiki: WikiPorts, project_prefix: impl Into<String>) -> Self {
        Self {
            wiki,
            project_prefix: project_prefix.into(),
        }
    }

    pub async fn run(&self, ctx: &PhaseCtx) -> AppResult<ProcessResult> {
        let json_path = ctx.path();
        let image_dir = image_dir_for_json(json_path).ok_or_else(|| {
            AppError::File(FileError::NotFound {
                path: json_path.to_path_buf(),
            })
        })?;

        if let Some(project) = read_import_marker(&image_dir).await {
            info!("{} 已导入到 /{}，跳过", ctx, project);
            return Ok(ProcessResult::Skipped);
        }

        let isbn = read_isbn(&image_dir).await?;
        let name = format!("{}{}", self.project_prefix, isbn);

        let project_name = self.wiki.creator.create_project(&name).await?;
        let project = load_project(json_path).await?;

        info!(
            "{} 📤 正在导入 {} 页到 /{}",
            ctx,
            project.pages.len(),
            project_name
        );
        self.wiki
            .importer
            .import_pages(&project_name, &project)
            .await?;

        write_import_marker(&image_dir, &project_name).await?;
        info!("{} ✓ 导入完成: /{}", ctx, project_name);
        Ok(ProcessResult::Success)
    }
}
