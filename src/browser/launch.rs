use crate::error::{AppResult, BrowserError};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::Path;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 使用持久化的用户目录启动有界面的浏览器
///
/// 登录状态保存在 `profile_dir` 中，第一次运行时由操作员在弹出的窗口中手动登录
pub async fn launch_browser(profile_dir: &Path, url: &str) -> AppResult<(Browser, Page)> {
    info!("🚀 启动浏览器 (用户目录: {})...", profile_dir.display());

    let config = BrowserConfig::builder()
        .with_head()
        .user_data_dir(profile_dir)
        .args(vec!["--no-first-run", "--no-default-browser-check"])
        .build()
        .map_err(|e| {
            error!("配置浏览器失败: {}", e);
            BrowserError::LaunchFailed(e)
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        BrowserError::LaunchFailed(e.to_string())
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page(url).await.map_err(|e| {
        error!("创建页面失败: {}", e);
        e
    })?;

    info!("✅ 浏览器已导航到: {}", url);
    Ok((browser, page))
}
