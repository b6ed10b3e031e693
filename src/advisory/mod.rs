//! 建议缓存与限流
//!
//! 流程：校验请求 -> 查缓存 -> 获取并发许可 -> 在截止时间内调用生成器 ->
//! 解析并写入缓存。任何失败都转换为完整的降级结果，降级结果不写缓存。

pub mod fallback;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, warn};

use crate::cache::{AdviceStore, CacheKey};
use crate::clock;
use crate::generator::{AdviceGenerator, GeneratorError};
use crate::models::{Advice, AdviceOutcome, AdviceRequest, ErrorKind, ValidatedRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvisoryConfig {
    pub cache_ttl: Duration,
    pub cleanup_interval: Duration,
    pub generator_timeout: Duration,
    pub max_concurrent_generations: usize,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            generator_timeout: Duration::from_secs(4),
            max_concurrent_generations: 10,
        }
    }
}

pub struct AdvisoryService {
    generator: Arc<dyn AdviceGenerator>,
    store: AdviceStore,
    permits: Arc<Semaphore>,
    config: AdvisoryConfig,
}

impl AdvisoryService {
    pub fn new(generator: Arc<dyn AdviceGenerator>, config: AdvisoryConfig) -> Self {
        Self {
            generator,
            store: AdviceStore::new(config.cache_ttl, config.cleanup_interval),
            permits: Arc::new(Semaphore::new(config.max_concurrent_generations)),
            config,
        }
    }

    #[cfg(test)]
    fn store(&self) -> &AdviceStore {
        &self.store
    }

    /// 当前空闲的生成许可数量
    #[cfg(test)]
    fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn get_or_generate(&self, request: &AdviceRequest) -> AdviceOutcome {
        let validated = match request.validate() {
            Ok(validated) => validated,
            Err(reason) => {
                debug!("rejecting advice request: {}", reason);
                return degrade(ErrorKind::ValidationError, request.warnings.clone());
            }
        };

        let key = CacheKey::new(validated.risk_level, &validated.warnings);
        if let Some(mut advice) = self.store.get(&key) {
            debug!(risk_level = %validated.risk_level, "advice cache hit");
            // 键只看警告集合，返回时仍按调用方给出的顺序
            advice.warnings = validated.warnings;
            return AdviceOutcome::Advice(advice);
        }

        match self.generate(&validated).await {
            Ok(advice) => {
                self.store.insert(key, advice.clone());
                AdviceOutcome::Advice(advice)
            }
            Err(kind) => degrade(kind, validated.warnings),
        }
    }

    /// 许可等待和生成共用同一个截止时间，调用方最多阻塞 `generator_timeout`
    async fn generate(&self, request: &ValidatedRequest) -> Result<Advice, ErrorKind> {
        let deadline = clock::after(Instant::now(), self.config.generator_timeout);

        let permit = match timeout_at(deadline, Arc::clone(&self.permits).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(closed)) => {
                error!("generation semaphore unavailable: {}", closed);
                return Err(ErrorKind::SystemError);
            }
            Err(_) => {
                warn!(risk_level = %request.risk_level, "timed out waiting for a generation slot");
                return Err(ErrorKind::TimeoutError);
            }
        };

        let generator = Arc::clone(&self.generator);
        let prompt = prompt::build_prompt(request.risk_level);
        // 许可随任务一起释放，被放弃的调用在真正结束前仍计入并发上限
        let mut task = tokio::spawn(async move {
            let _permit = permit;
            generator.generate(&prompt).await
        });

        let joined = match timeout_at(deadline, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                warn!(
                    risk_level = %request.risk_level,
                    timeout_ms = self.config.generator_timeout.as_millis() as u64,
                    "advice generation timed out"
                );
                return Err(ErrorKind::TimeoutError);
            }
        };

        let raw = match joined {
            Ok(Ok(raw)) => raw,
            Ok(Err(GeneratorError::Timeout)) => {
                warn!("generator reported a timeout");
                return Err(ErrorKind::TimeoutError);
            }
            Ok(Err(err)) => {
                warn!("advice generation failed: {}", err);
                return Err(ErrorKind::GenerationError);
            }
            Err(join_err) => {
                error!("advice generation task failed: {}", join_err);
                return Err(ErrorKind::SystemError);
            }
        };

        let content = prompt::parse_advice(&raw).map_err(|reason| {
            warn!("could not parse generated advice: {}", reason);
            ErrorKind::ParseError
        })?;

        Ok(Advice {
            content,
            warnings: request.warnings.clone(),
            cached: false,
        })
    }
}

fn degrade(kind: ErrorKind, warnings: Vec<String>) -> AdviceOutcome {
    AdviceOutcome::Fallback(fallback::fallback(kind, warnings))
}
