//! 限速批处理器 - 基础设施层
//!
//! ## 核心功能
//!
//! 1. **分批处理**：设置 `batch_size` 时按顺序切分成批，一批完成后再开始下一批
//! 2. **并发控制**：批内使用 Semaphore 限制同时进行的任务数
//! 3. **批间等待**：两批之间等待 `inter_batch_delay`（最后一批之后不等待）
//! 4. **失败隔离**：单个任务失败不会取消同批的其他任务
//! 5. **优雅退出**：收到退出信号后不再开始新的批次
//!
//! 所有任务都在调用方的 task 内并发轮询，不使用 `tokio::spawn`。

use crate::infrastructure::shutdown::ShutdownSignal;
use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// 失败任务的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 失败结果保留在返回值中（调用方决定是否致命）
    Keep,
    /// 记录警告后从返回值中省略
    Omit,
}

/// 批处理配置
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// 批内并发数（至少为 1）
    pub concurrency: usize,
    /// 每批数量，None 表示全部作为一批
    pub batch_size: Option<usize>,
    /// 批次之间的等待时间
    pub inter_batch_delay: Option<Duration>,
    /// 失败任务的处理方式
    pub on_failure: FailurePolicy,
}

impl BatchConfig {
    /// 全部作为一批，按给定并发数处理，保留失败结果
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency,
            batch_size: None,
            inter_batch_delay: None,
            on_failure: FailurePolicy::Keep,
        }
    }

    /// 设置分批大小和批间等待
    pub fn batched(mut self, batch_size: usize, inter_batch_delay: Option<Duration>) -> Self {
        self.batch_size = Some(batch_size);
        self.inter_batch_delay = inter_batch_delay;
        self
    }

    /// 失败任务从结果中省略
    pub fn omit_failures(mut self) -> Self {
        self.on_failure = FailurePolicy::Omit;
        self
    }
}

/// 单个任务的结果
#[derive(Debug)]
pub struct ItemOutcome<T, E> {
    /// 任务在原始序列中的位置（从0开始）
    pub index: usize,
    pub result: Result<T, E>,
}

/// 一次批处理的汇总
#[derive(Debug)]
pub struct BatchRun<T, E> {
    /// 按原始顺序排列的结果
    pub outcomes: Vec<ItemOutcome<T, E>>,
    /// 成功数量
    pub succeeded: usize,
    /// 失败数量（包括被省略的）
    pub failed: usize,
    /// 因退出信号而没有开始的任务数量
    pub not_started: usize,
}

impl<T, E> BatchRun<T, E> {
    /// 只取成功的结果（保持原始顺序）
    pub fn into_successes(self) -> Vec<T> {
        self.outcomes
            .into_iter()
            .filter_map(|o| o.result.ok())
            .collect()
    }

    /// 是否因退出信号提前结束
    pub fn interrupted(&self) -> bool {
        self.not_started > 0
    }
}

/// 限速批处理器
pub struct RateLimitedBatcher {
    name: String,
    config: BatchConfig,
    shutdown: Option<ShutdownSignal>,
}

impl RateLimitedBatcher {
    pub fn new(name: impl Into<String>, config: BatchConfig) -> Self {
        Self {
            name: name.into(),
            config,
            shutdown: None,
        }
    }

    /// 关联退出信号
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|s| s.is_requested())
    }

    /// 处理所有任务
    ///
    /// # 参数
    /// - `items`: 按顺序排列的任务
    /// - `handler`: 处理单个任务，参数为 (位置, 任务)
    pub async fn run<I, T, E, F, Fut>(&self, items: Vec<I>, handler: F) -> BatchRun<T, E>
    where
        F: Fn(usize, I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let total = items.len();
        let chunk_size = self.config.batch_size.unwrap_or(total).max(1);
        let total_batches = total.div_ceil(chunk_size);
        let semaphore = Semaphore::new(self.config.concurrency.max(1));

        let mut run = BatchRun {
            outcomes: Vec::with_capacity(total),
            succeeded: 0,
            failed: 0,
            not_started: 0,
        };

        let mut remaining = items.into_iter().enumerate().peekable();
        let mut batch_num = 0;

        while remaining.peek().is_some() {
            if self.shutdown_requested() {
                run.not_started = remaining.count();
                warn!(
                    "⚠️ {} 收到退出信号，剩余 {} 项未开始",
                    self.name, run.not_started
                );
                break;
            }

            if batch_num > 0 {
                if let Some(delay) = self.config.inter_batch_delay {
                    debug!("{} 批次间等待 {:?}", self.name, delay);
                    sleep(delay).await;
                }
            }
            batch_num += 1;

            let chunk: Vec<(usize, I)> = remaining.by_ref().take(chunk_size).collect();
            if total_batches > 1 {
                log_batch_start(&self.name, batch_num, total_batches, &chunk, total);
            }

            // Semaphore 是公平的，任务按原始顺序获得许可
            let tasks = chunk.into_iter().map(|(index, item)| {
                let semaphore = &semaphore;
                let handler = &handler;
                async move {
                    let _permit = semaphore.acquire().await;
                    (index, handler(index, item).await)
                }
            });

            for (index, result) in join_all(tasks).await {
                match result {
                    Ok(value) => {
                        run.succeeded += 1;
                        run.outcomes.push(ItemOutcome {
                            index,
                            result: Ok(value),
                        });
                    }
                    Err(e) => {
                        run.failed += 1;
                        match self.config.on_failure {
                            FailurePolicy::Keep => run.outcomes.push(ItemOutcome {
                                index,
                                result: Err(e),
                            }),
                            FailurePolicy::Omit => {
                                warn!("{} 第 {} 项失败，已跳过: {}", self.name, index + 1, e);
                            }
                        }
                    }
                }
            }

            if total_batches > 1 {
                info!(
                    "✓ {} 第 {}/{} 批完成 (累计成功 {}, 失败 {})",
                    self.name, batch_num, total_batches, run.succeeded, run.failed
                );
            }
        }

        run
    }
}

// ========== 日志辅助函数 ==========

fn log_batch_start<I>(name: &str, batch_num: usize, total_batches: usize, chunk: &[(usize, I)], total: usize) {
    let start = chunk.first().map(|(i, _)| i + 1).unwrap_or(0);
    let end = chunk.last().map(|(i, _)| i + 1).unwrap_or(0);
    info!(
        "📦 {} 开始处理第 {}/{} 批: {}-{} / 共 {} 项",
        name, batch_num, total_batches, start, end, total
    );
}
