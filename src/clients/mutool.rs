/// mutool 光栅化适配器
///
/// `mutool convert -F png -O resolution=<dpi>,gamma=1 -o <out>/%d.png <pdf>`
use crate::config::Config;
use crate::error::{AppError, AppResult, ToolError};
use crate::services::ports::Rasterizer;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// mutool 光栅化器
pub struct MutoolRasterizer {
    program: String,
    resolution: u32,
}

impl MutoolRasterizer {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.rasterizer_program.clone(),
            resolution: config.rasterize_resolution,
        }
    }

    fn missing(&self) -> AppError {
        ToolError::Missing {
            program: self.program.clone(),
        }
        .into()
    }
}

/// `convert` 子命令的参数
pub fn convert_args(pdf: &Path, out_dir: &Path, resolution: u32) -> Vec<OsString> {
    vec![
        "convert".into(),
        "-F".into(),
        "png".into(),
        "-O".into(),
        format!("resolution={},gamma=1", resolution).into(),
        "-o".into(),
        out_dir.join("%d.png").into_os_string(),
        pdf.as_os_str().to_os_string(),
    ]
}

#[async_trait]
impl Rasterizer for MutoolRasterizer {
    async fn ensure_available(&self) -> AppResult<()> {
        // 只确认能启动，`mutool -v` 的退出码因版本而异
        Command::new(&self.program)
            .arg("-v")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                debug!("启动 {} 失败: {}", self.program, e);
                self.missing()
            })?;
        Ok(())
    }

    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> AppResult<()> {
        let output = Command::new(&self.program)
            .args(convert_args(pdf, out_dir, self.resolution))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    self.missing()
                } else {
                    AppError::from(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} 输出: {}", self.program, stderr.trim());
            return Err(ToolError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
                input: pdf.to_path_buf(),
            }
            .into());
        }
        Ok(())
    }
}
