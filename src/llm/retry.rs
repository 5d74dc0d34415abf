//! 有界重试：指数退避 + 随机抖动
//!
//! 只包裹 tool-decision 的结构化调用；`is_retryable` 判定为否的错误立即返回，
//! 重试次数耗尽时返回最后一次的错误。

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::llm::LlmError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 总尝试次数（含首次）
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// 第 `attempt` 次失败（从 0 开始）之后的等待时间
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_backoff_ms as f64) as u64;
        let jitter = if self.jitter && capped > 0 {
            rand::thread_rng().gen_range(0..=capped / 2)
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }
}

pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    is_retryable: impl Fn(&LlmError) -> bool,
    mut op: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < max_attempts && is_retryable(&e) => {
                let wait = config.backoff(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "retrying generation call"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
