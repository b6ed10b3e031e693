use std::time::Duration;

use tokio::time::Instant;

use super::keys::CacheKey;
use crate::models::Advice;

/// 缓存条目，只会被整体替换，不会原地修改
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: Advice,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) <= self.ttl
    }
}
