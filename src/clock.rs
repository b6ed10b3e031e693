//! 单调时钟上的时间点运算

use std::time::Duration;

use tokio::time::Instant;

/// 约 30 年，加法溢出时用它代替
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `at + by`，溢出时取一个遥远的未来时间点而不是 panic
pub(crate) fn after(at: Instant, by: Duration) -> Instant {
    at.checked_add(by).unwrap_or_else(|| at + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_normally_within_range() {
        let now = Instant::now();
        assert_eq!(after(now, Duration::from_secs(5)), now + Duration::from_secs(5));
    }

    #[test]
    fn saturates_instead_of_panicking() {
        let now = Instant::now();
        let far = after(now, Duration::MAX);
        assert!(far > now);
        assert_eq!(far, now + FAR_FUTURE);
    }
}
