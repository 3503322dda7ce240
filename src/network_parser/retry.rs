//! 重试策略：作为普通值注入到目录客户端，而不是藏在全局 HTTP 会话里。

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 遇到可重试状态码时的总尝试次数（含第一次）。
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub retryable_statuses: Vec<u16>,
    /// 连接级失败后，再试一次之前的冷却时间。
    pub connect_cooldown: Duration,
    pub timeout: Duration,
    pub extended_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_millis(500),
            retryable_statuses: vec![429, 500, 502, 503, 504],
            connect_cooldown: Duration::from_secs(3),
            timeout: Duration::from_secs(15),
            extended_timeout: Duration::from_secs(45),
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// 第 `attempt` 次（从 1 开始）失败后的等待：base × 2^(attempt−1)。
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << shift)
    }

    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            backoff_base: Duration::ZERO,
            connect_cooldown: Duration::ZERO,
            timeout: Duration::from_secs(1),
            extended_timeout: Duration::from_secs(3),
            ..Self::default()
        }
    }
}
