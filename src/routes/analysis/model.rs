use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AdviceOutcome, RiskLevel};

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub confidence_score: f64,
    pub warnings: Vec<String>,
    pub nutrition_advice: AdviceOutcome,
    pub created_at: DateTime<Utc>,
}

/// 从 multipart 表单中取出的内容
#[derive(Debug, Default)]
pub(super) struct UploadForm {
    pub image: Option<Vec<u8>>,
    pub user_id: Option<String>,
}
