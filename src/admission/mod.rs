//! 按客户端的准入控制：滑动窗口计数 + 突发上限
//!
//! 每个客户端保存一段按到达顺序排列的放行时间戳。窗口内计数只统计
//! 尚未滑出窗口的条目；过期条目由周期清理物理删除，因此突发上限
//! 作用于未清理的原始条目数，同时约束单个客户端占用的内存。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, header::RETRY_AFTER};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::clock;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// 窗口内的稳态请求上限
    pub requests_per_window: u32,
    /// 未清理条目数的硬上限，不得低于 `requests_per_window`
    pub burst_limit: u32,
    pub window_size: Duration,
    pub cleanup_interval: Duration,
}

/// 一次准入判定的结果，响应头全部由它派生
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// 被拒绝时，距离可以重试的时间；放行时为零
    pub retry_after: Duration,
    /// 距离窗口内最早一条记录滑出窗口的时间
    pub reset_after: Duration,
}

impl Decision {
    /// `Retry-After` 以整秒表示，向上取整，且被拒绝时至少为 1
    pub fn retry_after_secs(&self) -> u64 {
        if self.allowed {
            return 0;
        }
        ceil_secs(self.retry_after).max(1)
    }

    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        let reset_at = chrono::Utc::now().timestamp() + ceil_secs(self.reset_after) as i64;

        headers.insert(LIMIT_HEADER, HeaderValue::from(self.limit));
        headers.insert(REMAINING_HEADER, HeaderValue::from(self.remaining));
        headers.insert(RESET_HEADER, HeaderValue::from(reset_at));
        if !self.allowed {
            headers.insert(RETRY_AFTER, HeaderValue::from(self.retry_after_secs()));
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 { secs + 1 } else { secs }
}

#[derive(Debug, Default)]
struct ClientWindow {
    hits: VecDeque<Instant>,
}

impl ClientWindow {
    /// 第一条仍在窗口内的记录下标
    fn window_start(&self, now: Instant, window: Duration) -> usize {
        self.hits
            .partition_point(|hit| now.saturating_duration_since(*hit) >= window)
    }

    fn purge(&mut self, now: Instant, window: Duration) {
        let start = self.window_start(now, window);
        self.hits.drain(..start);
    }
}

struct AdmissionState {
    clients: HashMap<String, ClientWindow>,
    last_sweep: Instant,
}

struct Inner {
    config: RateLimitConfig,
    state: Mutex<AdmissionState>,
}

/// 进程内共享的准入控制器句柄，克隆开销很小
#[derive(Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

impl AdmissionController {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(AdmissionState {
                    clients: HashMap::new(),
                    last_sweep: Instant::now(),
                }),
            }),
        }
    }

    pub fn admit(&self, client_key: &str) -> Decision {
        let mut state = self.lock();
        // 在锁内取时间，保证同一客户端的时间戳按真实到达顺序写入
        let now = Instant::now();
        self.admit_locked(&mut state, client_key, now)
    }

    fn admit_locked(&self, state: &mut AdmissionState, client_key: &str, now: Instant) -> Decision {
        let config = &self.inner.config;

        if now.saturating_duration_since(state.last_sweep) >= config.cleanup_interval {
            Self::sweep_locked(state, config, now);
        }

        let next_sweep = clock::after(state.last_sweep, config.cleanup_interval);
        let window = state.clients.entry(client_key.to_owned()).or_default();

        if window.hits.len() >= config.burst_limit as usize {
            // 最早的记录要等它滑出窗口并且经过一次清理才会真正释放
            let oldest_expiry = window
                .hits
                .front()
                .map_or(now, |hit| clock::after(*hit, config.window_size));
            let wait = oldest_expiry.max(next_sweep).saturating_duration_since(now);
            tracing::debug!(client = client_key, "burst ceiling reached");
            return Self::denied(config, wait);
        }

        let start = window.window_start(now, config.window_size);
        let count = window.hits.len() - start;

        if count >= config.requests_per_window as usize {
            let wait = clock::after(window.hits[start], config.window_size)
                .saturating_duration_since(now);
            tracing::debug!(client = client_key, count, "sliding window exhausted");
            return Self::denied(config, wait);
        }

        window.hits.push_back(now);
        let oldest = window.hits[start];

        Decision {
            allowed: true,
            limit: config.requests_per_window,
            remaining: config.requests_per_window - (count as u32 + 1),
            retry_after: Duration::ZERO,
            reset_after: clock::after(oldest, config.window_size).saturating_duration_since(now),
        }
    }

    fn denied(config: &RateLimitConfig, wait: Duration) -> Decision {
        Decision {
            allowed: false,
            limit: config.requests_per_window,
            remaining: 0,
            retry_after: wait,
            reset_after: wait,
        }
    }

    /// 删除所有过期时间戳，并移除已无记录的客户端。返回移除的客户端数量
    pub fn sweep(&self) -> usize {
        let mut state = self.lock();
        let now = Instant::now();
        Self::sweep_locked(&mut state, &self.inner.config, now)
    }

    fn sweep_locked(state: &mut AdmissionState, config: &RateLimitConfig, now: Instant) -> usize {
        let before = state.clients.len();
        state.clients.retain(|_, window| {
            window.purge(now, config.window_size);
            !window.hits.is_empty()
        });
        state.last_sweep = now;

        let removed = before - state.clients.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = state.clients.len(), "admission sweep complete");
        }
        removed
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.lock().clients.len()
    }

    /// 启动后台清理任务；控制器被全部释放后任务自行退出
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(clock::after(Instant::now(), period), period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                AdmissionController { inner }.sweep();
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, AdmissionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    fn admit_at(&self, client_key: &str, now: Instant) -> Decision {
        let mut state = self.lock();
        self.admit_locked(&mut state, client_key, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(requests: u32, burst: u32, window_secs: u64, cleanup_secs: u64) -> AdmissionController {
        AdmissionController::new(RateLimitConfig {
            requests_per_window: requests,
            burst_limit: burst,
            window_size: Duration::from_secs(window_secs),
            cleanup_interval: Duration::from_secs(cleanup_secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn third_request_in_window_is_denied_until_oldest_expires() {
        let limiter = controller(2, 2, 60, 600);
        let t0 = Instant::now();

        let first = limiter.admit_at("A", t0);
        let second = limiter.admit_at("A", t0 + Duration::from_secs(1));
        let third = limiter.admit_at("A", t0 + Duration::from_secs(2));

        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);
        assert!(!third.allowed);
        assert_eq!(third.retry_after, Duration::from_secs(58));
        assert_eq!(third.retry_after_secs(), 58);
    }

    #[tokio::test(start_paused = true)]
    async fn request_over_the_window_limit_reports_positive_retry() {
        let limiter = controller(5, 10, 60, 600);
        let t0 = Instant::now();

        for i in 0..5 {
            assert!(limiter.admit_at("client", t0 + Duration::from_millis(i * 10)).allowed);
        }
        let denied = limiter.admit_at("client", t0 + Duration::from_millis(60));

        assert!(!denied.allowed);
        assert!(denied.retry_after > Duration::ZERO);
        assert_eq!(denied.remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_instead_of_resetting_in_buckets() {
        let limiter = controller(2, 10, 10, 600);
        let t0 = Instant::now();

        assert!(limiter.admit_at("c", t0).allowed);
        assert!(limiter.admit_at("c", t0 + Duration::from_secs(9)).allowed);
        assert!(!limiter.admit_at("c", t0 + Duration::from_secs(9)).allowed);
        // t0 滑出窗口后只释放一个名额
        assert!(limiter.admit_at("c", t0 + Duration::from_secs(10)).allowed);
        assert!(!limiter.admit_at("c", t0 + Duration::from_secs(11)).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_ceiling_applies_to_unswept_entries() {
        let limiter = controller(3, 4, 1, 60);
        let t0 = Instant::now();

        for _ in 0..3 {
            assert!(limiter.admit_at("b", t0).allowed);
        }
        assert!(!limiter.admit_at("b", t0).allowed);

        // 窗口已滑过，窗口内只有 1 条，但未清理的原始记录达到突发上限
        assert!(limiter.admit_at("b", t0 + Duration::from_millis(1500)).allowed);
        let denied = limiter.admit_at("b", t0 + Duration::from_millis(1600));
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Duration::from_millis(58_400));

        // 清理之后恢复正常
        let after_sweep = limiter.admit_at("b", t0 + Duration::from_secs(61));
        assert!(after_sweep.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_plus_one_instantaneous_requests_are_capped() {
        let limiter = controller(120, 120, 60, 10);
        let t0 = Instant::now();

        for _ in 0..120 {
            assert!(limiter.admit_at("flood", t0).allowed);
        }
        assert!(!limiter.admit_at("flood", t0).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn clients_are_isolated() {
        let limiter = controller(1, 1, 60, 600);
        let t0 = Instant::now();

        assert!(limiter.admit_at("a", t0).allowed);
        assert!(!limiter.admit_at("a", t0).allowed);
        assert!(limiter.admit_at("b", t0).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_durations_do_not_panic() {
        let limiter = AdmissionController::new(RateLimitConfig {
            requests_per_window: 1,
            burst_limit: 1,
            window_size: Duration::from_secs(u64::MAX),
            cleanup_interval: Duration::from_secs(u64::MAX),
        });

        assert!(limiter.admit("x").allowed);
        let denied = limiter.admit("x");
        assert!(!denied.allowed);
        assert!(denied.retry_after > Duration::ZERO);

        let mut headers = HeaderMap::new();
        denied.apply_headers(&mut headers);
        assert!(headers.contains_key(RETRY_AFTER));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_fully_expired_clients() {
        let limiter = controller(10, 10, 5, 600);

        limiter.admit("stale");
        tokio::time::advance(Duration::from_secs(4)).await;
        limiter.admit("fresh");
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_sweep_runs_inline_on_admit() {
        let limiter = controller(10, 10, 1, 5);

        limiter.admit("gone");
        tokio::time::advance(Duration::from_secs(6)).await;
        limiter.admit("new");

        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweeper_bounds_the_table() {
        let limiter = controller(10, 10, 1, 2);
        let handle = limiter.spawn_sweeper();

        for i in 0..20 {
            limiter.admit(&format!("client-{i}"));
        }
        assert_eq!(limiter.tracked_clients(), 20);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(limiter.tracked_clients(), 0);

        drop(limiter);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(handle.is_finished());
    }

    #[test]
    fn headers_are_derived_from_the_decision() {
        let decision = Decision {
            allowed: false,
            limit: 100,
            remaining: 0,
            retry_after: Duration::from_millis(57_200),
            reset_after: Duration::from_millis(57_200),
        };
        let mut headers = HeaderMap::new();
        decision.apply_headers(&mut headers);

        assert_eq!(headers[LIMIT_HEADER], "100");
        assert_eq!(headers[REMAINING_HEADER], "0");
        assert_eq!(headers[RETRY_AFTER], "58");
        let reset: i64 = headers[RESET_HEADER].to_str().unwrap().parse().unwrap();
        assert!(reset >= chrono::Utc::now().timestamp() + 57);
    }

    #[test]
    fn allowed_decision_has_no_retry_after() {
        let decision = Decision {
            allowed: true,
            limit: 10,
            remaining: 9,
            retry_after: Duration::ZERO,
            reset_after: Duration::from_secs(60),
        };
        let mut headers = HeaderMap::new();
        decision.apply_headers(&mut headers);

        assert!(headers.get(RETRY_AFTER).is_none());
        assert_eq!(headers[REMAINING_HEADER], "9");
    }
}
