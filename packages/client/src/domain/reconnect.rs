//! Reconnection policy for the live channel.
//!
//! Pure functions over the attempt counter, so the supervisor loop stays free
//! of arithmetic and the rules stay testable.

use std::time::Duration;

use crate::error::ChannelError;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
    /// Retries before giving up
    pub max_attempts: u32,
    /// Failed attempts after which the "reconnecting" indicator is shown
    pub indicator_after: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            indicator_after: 3,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-indexed): `base * 2^attempt`, capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 1_u32 << attempt.min(16);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Check if the supervisor should try again after `error`.
    ///
    /// # Arguments
    ///
    /// * `error` - The failure that ended the previous connection
    /// * `current_attempt` - The reconnection attempt count so far (0-indexed)
    pub fn should_attempt_reconnect(&self, error: &ChannelError, current_attempt: u32) -> bool {
        // A rejected handshake will be rejected again
        if is_fatal(error) {
            return false;
        }
        current_attempt < self.max_attempts
    }

    /// Whether `failures` consecutive failures warrant the persistent indicator
    pub fn should_show_indicator(&self, failures: u32) -> bool {
        failures >= self.indicator_after
    }
}

/// Errors after which reconnecting is pointless
pub fn is_fatal(error: &ChannelError) -> bool {
    matches!(error, ChannelError::Rejected(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            max_attempts: 5,
            indicator_after: 3,
        }
    }

    #[test]
    fn test_delay_doubles_until_ceiling() {
        // テスト項目: 再接続の待ち時間は指数的に増え、上限で頭打ちになる
        // given (前提条件):
        let policy = policy();

        // when (操作):
        let delays: Vec<Duration> = (0..7).map(|attempt| policy.delay_for(attempt)).collect();

        // then (期待する結果):
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_millis(1600),
                Duration::from_secs(2),
                Duration::from_secs(2),
            ]
        );
    }

    #[test]
    fn test_delay_for_huge_attempt_does_not_overflow() {
        // テスト項目: 非常に大きな試行回数でもオーバーフローせず上限値になる
        // given (前提条件):
        let policy = ReconnectPolicy::default();

        // when (操作):
        let delay = policy.delay_for(u32::MAX);

        // then (期待する結果):
        assert_eq!(delay, Duration::from_secs(30));
    }

    #[test]
    fn test_should_attempt_reconnect_with_rejected_handshake() {
        // テスト項目: ハンドシェイクが拒否された場合、再接続を試みない
        // given (前提条件):
        let policy = policy();
        let error = ChannelError::Rejected("Invalid token".to_string());

        // when (操作):
        let result = policy.should_attempt_reconnect(&error, 0);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_reconnect_within_max_attempts() {
        // テスト項目: 最大試行回数未満の場合、再接続を試みる
        // given (前提条件):
        let policy = policy();
        let error = ChannelError::Transport("connection reset".to_string());

        // when (操作):
        let result = policy.should_attempt_reconnect(&error, 4);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_attempt_reconnect_at_max_attempts() {
        // テスト項目: 最大試行回数に達した場合、再接続を試みない
        // given (前提条件):
        let policy = policy();
        let error = ChannelError::Handshake("connection refused".to_string());

        // when (操作):
        let result = policy.should_attempt_reconnect(&error, 5);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_indicator_after_threshold() {
        // テスト項目: 一定回数以上失敗したら再接続中インジケーターを表示する
        // given (前提条件):
        let policy = policy();

        // when (操作):
        // then (期待する結果):
        assert!(!policy.should_show_indicator(2));
        assert!(policy.should_show_indicator(3));
        assert!(policy.should_show_indicator(4));
    }
}
