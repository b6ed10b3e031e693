use serde::{Deserialize, Serialize};

use super::risk::{RiskAssessment, RiskLevel};

/// 错误分类。`RATE_LIMITED` 只出现在准入层，其余由建议生成路径产生
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    RateLimited,
    ValidationError,
    TimeoutError,
    ParseError,
    GenerationError,
    SystemError,
}

/// 生成器返回的四个字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionAdvice {
    pub summary: String,
    pub iron_rich_foods: Vec<String>,
    pub meal_suggestions: Vec<String>,
    pub lifestyle_tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advice {
    #[serde(flatten)]
    pub content: NutritionAdvice,
    pub warnings: Vec<String>,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fallback {
    #[serde(flatten)]
    pub content: NutritionAdvice,
    pub warnings: Vec<String>,
    /// 与 `Advice` 保持同样的字段，降级结果始终为 false
    pub cached: bool,
    pub error_kind: ErrorKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdviceOutcome {
    Advice(Advice),
    Fallback(Fallback),
}

impl AdviceOutcome {
    #[cfg(test)]
    pub fn content(&self) -> &NutritionAdvice {
        match self {
            AdviceOutcome::Advice(advice) => &advice.content,
            AdviceOutcome::Fallback(fallback) => &fallback.content,
        }
    }

    #[cfg(test)]
    pub fn warnings(&self) -> &[String] {
        match self {
            AdviceOutcome::Advice(advice) => &advice.warnings,
            AdviceOutcome::Fallback(fallback) => &fallback.warnings,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            AdviceOutcome::Advice(_) => None,
            AdviceOutcome::Fallback(fallback) => Some(fallback.error_kind),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, AdviceOutcome::Advice(Advice { cached: true, .. }))
    }
}

/// 建议请求，在建议服务的边界处校验
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceRequest {
    pub risk_level: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub risk_level: RiskLevel,
    pub confidence_score: f64,
    pub warnings: Vec<String>,
}

impl AdviceRequest {
    pub fn validate(&self) -> Result<ValidatedRequest, String> {
        let risk_level = self.risk_level.parse::<RiskLevel>()?;

        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(format!(
                "confidence_score must be between 0 and 1, got {}",
                self.confidence_score
            ));
        }

        Ok(ValidatedRequest {
            risk_level,
            confidence_score: self.confidence_score,
            warnings: self.warnings.clone(),
        })
    }
}

impl From<&RiskAssessment> for AdviceRequest {
    fn from(assessment: &RiskAssessment) -> Self {
        Self {
            risk_level: assessment.risk_level.as_str().to_string(),
            confidence_score: assessment.confidence_score,
            warnings: assessment.warnings.clone(),
        }
    }
}
