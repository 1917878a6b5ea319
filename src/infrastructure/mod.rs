//! 基础设施层（Infrastructure Layer）
//!
//! 持有稀缺资源、提供与业务无关的通用能力：
//! - `JsExecutor`：唯一的 page owner，提供 goto() / eval()
//! - `RetryPolicy`：有限次数的重试与退避
//! - `RateLimitedBatcher`：分批、限并发、批间等待
//! - `ShutdownSignal`：Ctrl-C 之后的优雅退出

pub mod batch_processor;
pub mod js_executor;
pub mod retry;
pub mod shutdown;

pub use batch_processor::{BatchConfig, BatchRun, FailurePolicy, ItemOutcome, RateLimitedBatcher};
pub use js_executor::JsExecutor;
pub use retry::{Backoff, RetryPolicy};
pub use shutdown::ShutdownSignal;
