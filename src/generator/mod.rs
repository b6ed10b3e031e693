//! 建议生成器端口
//!
//! 生成器是外部协作方：输入提示词，返回原始文本，可能很慢，也可能失败。

mod gemini;

pub use gemini::GeminiGenerator;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator request timed out")]
    Timeout,
    #[error("generator transport error: {0}")]
    Transport(String),
    #[error("generator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generator returned no content")]
    EmptyResponse,
}

impl From<reqwest::Error> for GeneratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeneratorError::Timeout
        } else {
            GeneratorError::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}
