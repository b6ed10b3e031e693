use crate::models::{NutritionAdvice, RiskLevel};

const BASE_CONTEXT: &str = "You are an expert in anaemia prevention. \
Based on the result of a fingernail colour analysis, give the user concrete nutrition advice. \
Cover foods that supply iron efficiently, specific meal ideas, and lifestyle habits. \
Keep the tone friendly and the summary under 150 words.";

const OUTPUT_CONTRACT: &str = "Reply with ONLY a JSON object, no markdown, in exactly this shape: \
{\"summary\": string, \"iron_rich_foods\": [string], \"meal_suggestions\": [string], \"lifestyle_tips\": [string]}";

fn risk_context(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "The anaemia risk is LOW. Give preventive advice.",
        RiskLevel::Medium => "The anaemia risk is MEDIUM. Give advice that helps the user improve.",
        RiskLevel::High => {
            "The anaemia risk is HIGH. Give specific improvement advice and recommend seeing a doctor."
        }
    }
}

pub fn build_prompt(level: RiskLevel) -> String {
    format!("{BASE_CONTEXT}\n{}\n{OUTPUT_CONTRACT}", risk_context(level))
}

/// 解析生成器输出，兼容外层的 markdown 代码块
pub fn parse_advice(raw: &str) -> Result<NutritionAdvice, String> {
    let body = strip_code_fence(raw.trim());
    let advice: NutritionAdvice =
        serde_json::from_str(body).map_err(|e| format!("invalid advice JSON: {e}"))?;

    if advice.summary.trim().is_empty() {
        return Err("advice summary is empty".into());
    }
    if advice.iron_rich_foods.is_empty() {
        return Err("advice has no iron-rich foods".into());
    }
    Ok(advice)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // 只有开头是 ```json 这类语言标记时才丢弃该行，JSON 可能紧跟在 ``` 后面
    let rest = match rest.find('\n') {
        Some(newline) if !rest[..newline].contains('{') => &rest[newline + 1..],
        _ => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
