/// 领域模型
pub mod advice;
pub mod risk;

pub use advice::{Advice, AdviceOutcome, AdviceRequest, ErrorKind, Fallback, NutritionAdvice, ValidatedRequest};
pub use risk::{RiskAssessment, RiskLevel};
