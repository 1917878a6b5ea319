//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use anyhow::Result;
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 日志
///
/// 优先使用 `RUST_LOG`，否则 `verbose` 时为 debug，默认为 info。
/// 重复调用不会报错（测试中会多次初始化）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n扫描书籍处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(workspace: &str, import_mode: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - PDF → Cosense 流水线");
    info!("📁 工作区: {}", workspace);
    info!("📤 导入方式: {}", import_mode);
    info!("{}", "=".repeat(60));
}

/// 记录阶段开始信息
///
/// # 参数
/// - `phase`: 阶段名称
/// - `pending`: 待处理数量
/// - `concurrency`: 并发数
pub fn log_phase_start(phase: &str, pending: usize, concurrency: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 阶段: {}", phase);
    info!("📄 待处理: {} 项 (并发 {})", pending, concurrency);
    info!("{}", "=".repeat(60));
}

/// 记录阶段完成信息
pub fn log_phase_complete(phase: &str, succeeded: usize, skipped: usize, failed: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ {} 完成: 成功 {} / 跳过 {} / 失败 {}",
        phase, succeeded, skipped, failed
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `rows`: 每个阶段的 (名称, 待处理, 成功, 跳过, 失败)
/// - `log_file_path`: 日志文件路径
/// - `warn_file_path`: 警告文件路径
pub fn print_final_stats(
    rows: &[(&str, usize, usize, usize, usize)],
    log_file_path: &str,
    warn_file_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for (phase, pending, succeeded, skipped, failed) in rows {
        info!(
            "{}: 待处理 {} | ✅ 成功 {} | ⏭️ 跳过 {} | ❌ 失败 {}",
            phase, pending, succeeded, skipped, failed
        );
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
    info!("需要人工处理的问题见: {}", warn_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
