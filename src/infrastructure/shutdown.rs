//! 优雅退出信号
//!
//! Ctrl-C 之后不再开始新的批次或阶段，正在处理的批次会正常完成；
//! 第二次 Ctrl-C 立即结束进程

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// 第二次 Ctrl-C 时的退出码（128 + SIGINT）
const FORCED_EXIT_CODE: i32 = 130;

/// 可克隆的退出标志
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求退出
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// 是否已请求退出
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// 在后台监听 Ctrl-C
    ///
    /// 第一次请求退出，第二次立即结束进程（例如阻塞在 ISBN 输入时）
    pub fn listen_for_ctrl_c(&self) {
        let signal = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if signal.is_requested() {
                    warn!("⚠️ 再次收到中断信号，立即退出");
                    std::process::exit(FORCED_EXIT_CODE);
                }
                warn!("⚠️ 收到中断信号，当前批次完成后退出（再按一次 Ctrl-C 立即退出）...");
                signal.request();
            }
        });
    }
}
