use sha2::{Digest, Sha256};

use crate::models::RiskLevel;

/// 建议缓存键：风险等级 + 排序后警告集合的摘要
///
/// 置信度不参与键的计算，相同等级、相同警告集合的请求共享同一份建议。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub risk_level: RiskLevel,
    pub warnings_digest: String,
}

impl CacheKey {
    pub fn new(risk_level: RiskLevel, warnings: &[String]) -> Self {
        let mut sorted: Vec<&str> = warnings.iter().map(String::as_str).collect();
        sorted.sort_unstable();

        let mut hasher = Sha256::new();
        for warning in sorted {
            // 长度前缀避免 ["a,b"] 与 ["a", "b"] 这类拼接碰撞
            hasher.update((warning.len() as u64).to_le_bytes());
            hasher.update(warning.as_bytes());
        }

        Self {
            risk_level,
            warnings_digest: format!("{:x}", hasher.finalize()),
        }
    }
}
