use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use super::keys::CacheKey;
use super::models::CacheEntry;
use crate::models::Advice;

struct StoreState {
    entries: HashMap<CacheKey, CacheEntry>,
    last_cleanup: Instant,
}

/// 进程内的建议缓存，按 TTL 严格过期
///
/// 只接受 [`Advice`]，降级结果在类型上就无法写入。
pub struct AdviceStore {
    ttl: Duration,
    cleanup_interval: Duration,
    state: Mutex<StoreState>,
}

impl AdviceStore {
    pub fn new(ttl: Duration, cleanup_interval: Duration) -> Self {
        Self {
            ttl,
            cleanup_interval,
            state: Mutex::new(StoreState {
                entries: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
        }
    }

    /// 读取未过期的建议并标记为命中缓存；读到过期条目时直接删除
    pub fn get(&self, key: &CacheKey) -> Option<Advice> {
        let mut state = self.lock();
        let now = Instant::now();
        self.sweep_if_due(&mut state, now);

        let live = state.entries.get(key).map(|entry| entry.is_live(now));
        match live {
            Some(true) => {
                let mut advice = state.entries.get(key)?.payload.clone();
                advice.cached = true;
                Some(advice)
            }
            Some(false) => {
                state.entries.remove(key);
                tracing::debug!(risk_level = %key.risk_level, "evicted expired advice on read");
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: CacheKey, mut advice: Advice) {
        advice.cached = false;

        let mut state = self.lock();
        let now = Instant::now();
        self.sweep_if_due(&mut state, now);

        let entry = CacheEntry {
            key: key.clone(),
            payload: advice,
            created_at: now,
            ttl: self.ttl,
        };
        state.entries.insert(key, entry);
    }

    /// 删除所有过期条目，返回删除数量
    #[cfg(test)]
    pub fn sweep(&self) -> usize {
        let mut state = self.lock();
        let now = Instant::now();
        Self::sweep_locked(&mut state, now)
    }

    fn sweep_if_due(&self, state: &mut StoreState, now: Instant) {
        if now.saturating_duration_since(state.last_cleanup) >= self.cleanup_interval {
            Self::sweep_locked(state, now);
        }
    }

    fn sweep_locked(state: &mut StoreState, now: Instant) -> usize {
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.is_live(now));
        state.last_cleanup = now;

        let removed = before - state.entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = state.entries.len(), "advice cache sweep complete");
        }
        removed
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 查看某个键是否有条目（不论是否过期），不触发清理
    #[cfg(test)]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
