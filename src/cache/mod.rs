// 缓存模块
// 包含缓存键、缓存条目和带 TTL 的存储

pub mod keys;
pub mod models;
pub mod store;

// 重新导出常用类型，方便其他模块使用
pub use keys::CacheKey;
pub use models::CacheEntry;
pub use store::AdviceStore;
