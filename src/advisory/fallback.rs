use crate::models::{ErrorKind, Fallback, NutritionAdvice};

/// 生成失败时返回的通用建议，内容固定
pub fn default_advice() -> NutritionAdvice {
    NutritionAdvice {
        summary: "We could not prepare personalised advice right now. \
                  The general guidance below helps keep iron levels healthy."
            .into(),
        iron_rich_foods: vec![
            "Spinach".into(),
            "Liver".into(),
            "Lean red meat".into(),
            "Clams".into(),
            "Lentils and beans".into(),
        ],
        meal_suggestions: vec![
            "Breakfast: fortified cereal with a glass of orange juice".into(),
            "Lunch: lentil soup with a side of leafy greens".into(),
            "Dinner: stir-fried beef with broccoli and peppers".into(),
        ],
        lifestyle_tips: vec![
            "Pair iron-rich foods with vitamin C to improve absorption".into(),
            "Avoid tea or coffee right after meals".into(),
            "Get enough sleep and keep a regular eating schedule".into(),
            "See a doctor if fatigue or dizziness persists".into(),
        ],
    }
}

fn diagnostic(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::RateLimited => "Too many requests; showing general guidance instead.",
        ErrorKind::ValidationError => "The analysis result was invalid; showing general guidance instead.",
        ErrorKind::TimeoutError => "Advice generation timed out; showing general guidance instead.",
        ErrorKind::ParseError => "Generated advice could not be read; showing general guidance instead.",
        ErrorKind::GenerationError => "Advice generation failed; showing general guidance instead.",
        ErrorKind::SystemError => "An internal error occurred; showing general guidance instead.",
    }
}

/// 构造降级结果：调用方的警告在前，诊断信息追加在末尾
pub fn fallback(kind: ErrorKind, mut warnings: Vec<String>) -> Fallback {
    warnings.push(diagnostic(kind).to_string());
    Fallback {
        content: default_advice(),
        warnings,
        cached: false,
        error_kind: kind,
    }
}
