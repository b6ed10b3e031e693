use std::sync::Arc;

use axum::{
    extract::{Json, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use axum_extra::extract::Multipart;
use tracing::{debug, error, info, warn};

use crate::{
    AppState,
    advisory::fallback::fallback,
    error::AppError,
    models::{AdviceOutcome, AdviceRequest, ErrorKind},
};

use super::model::{AnalyzeQuery, AnalyzeResponse, UploadForm};

#[axum::debug_handler]
pub async fn analyze(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let form = read_form(multipart, state.config.max_upload_bytes).await?;
    let image = form
        .image
        .ok_or_else(|| AppError::InvalidUpload("Missing image file in field `file`.".into()))?;

    // 图像解码和评分较耗 CPU，放到阻塞线程池
    let scorer = Arc::clone(&state.scorer);
    let assessment = tokio::task::spawn_blocking(move || scorer.assess(&image))
        .await
        .map_err(|e| {
            error!("image scoring task failed: {}", e);
            AppError::InternalServerError
        })?
        .map_err(|e| {
            warn!("rejecting upload: {}", e);
            AppError::InvalidUpload(format!("The uploaded file is not a readable image: {e}"))
        })?;

    let nutrition_advice = state
        .advisory
        .get_or_generate(&AdviceRequest::from(&assessment))
        .await;

    info!(
        risk_level = %assessment.risk_level,
        cached = nutrition_advice.is_cached(),
        fallback = ?nutrition_advice.error_kind(),
        "image analysed"
    );

    Ok(Json(AnalyzeResponse {
        analysis_id: uuid::Uuid::new_v4().to_string(),
        user_id: form.user_id.or(query.user_id),
        risk_score: assessment.risk_score,
        risk_level: assessment.risk_level,
        confidence_score: assessment.confidence_score,
        warnings: assessment.warnings,
        nutrition_advice,
        created_at: chrono::Utc::now(),
    }))
}

#[axum::debug_handler]
pub async fn advise(
    State(state): State<AppState>,
    payload: Result<Json<AdviceRequest>, JsonRejection>,
) -> (StatusCode, Json<AdviceOutcome>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            // 无法解析的请求体同样按校验失败降级，保持响应结构一致
            debug!("rejecting advice body: {}", rejection.body_text());
            let outcome = AdviceOutcome::Fallback(fallback(ErrorKind::ValidationError, Vec::new()));
            return (StatusCode::BAD_REQUEST, Json(outcome));
        }
    };

    let outcome = state.advisory.get_or_generate(&request).await;

    let status = match outcome.error_kind() {
        Some(ErrorKind::ValidationError) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };
    (status, Json(outcome))
}

async fn read_form(mut multipart: Multipart, max_bytes: usize) -> Result<UploadForm, AppError> {
    let malformed = |e: axum_extra::extract::multipart::MultipartError| {
        AppError::InvalidUpload(format!("Malformed multipart body: {e}"))
    };

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let bytes = field.bytes().await.map_err(malformed)?;
                if bytes.len() > max_bytes {
                    return Err(AppError::InvalidUpload(format!(
                        "Image is too large: {} bytes (max {max_bytes}).",
                        bytes.len()
                    )));
                }
                form.image = Some(bytes.to_vec());
            }
            Some("user_id") => {
                let text = field.text().await.map_err(malformed)?;
                let text = text.trim();
                if !text.is_empty() {
                    form.user_id = Some(text.to_string());
                }
            }
            // 其他字段忽略
            _ => {}
        }
    }
    Ok(form)
}
