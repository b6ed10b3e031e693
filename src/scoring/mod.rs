//! 爪床颜色启发式评分
//!
//! 与健康爪床粉色的平均色差越大，风险分数越高。图像质量问题作为警告返回，
//! 并降低置信度。

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;

use crate::models::{RiskAssessment, RiskLevel};

/// 健康爪床颜色（粉色）的 RGB
const HEALTHY_NAIL_RGB: [f64; 3] = [255.0, 192.0, 203.0];
/// RGB 空间中两点的最大距离，约等于 sqrt(3 * 255^2)
const MAX_COLOR_DISTANCE: f64 = 442.0;
/// 评分前缩放到的边长
const SAMPLE_EDGE: u32 = 64;
const MIN_EDGE: u32 = 64;

pub const WARN_TOO_DARK: &str = "Image is too dark; retake the photo in brighter light.";
pub const WARN_OVEREXPOSED: &str = "Image is overexposed; avoid direct flash or strong light.";
pub const WARN_LOW_CONTRAST: &str = "Image looks blurry or low in contrast; hold the camera steady.";
pub const WARN_LOW_RESOLUTION: &str = "Image resolution is low; move the camera closer to the nail.";

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("image data is empty")]
    Empty,
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

pub trait RiskScorer: Send + Sync {
    /// 同步且耗 CPU，调用方应放在阻塞线程池中执行
    fn assess(&self, image: &[u8]) -> Result<RiskAssessment, ScoringError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ColorHeuristicScorer;

struct ImageStats {
    mean_rgb: [f64; 3],
    mean_luma: f64,
    luma_std_dev: f64,
}

impl ColorHeuristicScorer {
    fn stats(image: &DynamicImage) -> ImageStats {
        let sample = image
            .resize_exact(SAMPLE_EDGE, SAMPLE_EDGE, FilterType::Triangle)
            .to_rgb8();

        let mut sums = [0.0f64; 3];
        let mut lumas = Vec::with_capacity((SAMPLE_EDGE * SAMPLE_EDGE) as usize);
        for pixel in sample.pixels() {
            let [r, g, b] = pixel.0.map(f64::from);
            sums[0] += r;
            sums[1] += g;
            sums[2] += b;
            lumas.push(0.299 * r + 0.587 * g + 0.114 * b);
        }

        let n = lumas.len() as f64;
        let mean_luma = lumas.iter().sum::<f64>() / n;
        let variance = lumas.iter().map(|l| (l - mean_luma).powi(2)).sum::<f64>() / n;

        ImageStats {
            mean_rgb: sums.map(|s| s / n),
            mean_luma,
            luma_std_dev: variance.sqrt(),
        }
    }

    fn quality_warnings(image: &DynamicImage, stats: &ImageStats) -> Vec<String> {
        let mut warnings = Vec::new();
        if stats.mean_luma < 50.0 {
            warnings.push(WARN_TOO_DARK.to_string());
        } else if stats.mean_luma > 235.0 {
            warnings.push(WARN_OVEREXPOSED.to_string());
        }
        if stats.luma_std_dev < 4.0 {
            warnings.push(WARN_LOW_CONTRAST.to_string());
        }
        let (width, height) = image.dimensions();
        if width.min(height) < MIN_EDGE {
            warnings.push(WARN_LOW_RESOLUTION.to_string());
        }
        warnings
    }
}

impl RiskScorer for ColorHeuristicScorer {
    fn assess(&self, bytes: &[u8]) -> Result<RiskAssessment, ScoringError> {
        if bytes.is_empty() {
            return Err(ScoringError::Empty);
        }
        let image = image::load_from_memory(bytes)?;
        let stats = Self::stats(&image);

        let distance = stats
            .mean_rgb
            .iter()
            .zip(HEALTHY_NAIL_RGB)
            .map(|(c, h)| (c - h).powi(2))
            .sum::<f64>()
            .sqrt();
        let risk_score = (distance / MAX_COLOR_DISTANCE).min(1.0);

        let warnings = Self::quality_warnings(&image, &stats);
        let confidence_score = (1.0 - 0.15 * warnings.len() as f64).clamp(0.1, 1.0);

        tracing::debug!(risk_score, confidence_score, warnings = warnings.len(), "image scored");

        Ok(RiskAssessment {
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            confidence_score,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| {
            // 轻微的棋盘纹理，避免被判为低对比度
            let shift = if (x / 16 + y / 16) % 2 == 0 { 30 } else { 0 };
            Rgb(color.map(|c| c.saturating_sub(shift)))
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn healthy_pink_is_low_risk() {
        let assessment = ColorHeuristicScorer.assess(&png(128, 128, [250, 190, 200])).unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(assessment.warnings.is_empty(), "{:?}", assessment.warnings);
        assert_eq!(assessment.confidence_score, 1.0);
    }

    #[test]
    fn pale_nail_scores_higher_than_pink() {
        let pink = ColorHeuristicScorer.assess(&png(128, 128, [250, 190, 200])).unwrap();
        let pale = ColorHeuristicScorer.assess(&png(128, 128, [170, 170, 160])).unwrap();
        assert!(pale.risk_score > pink.risk_score);
    }

    #[test]
    fn dark_images_are_high_risk_with_warning() {
        let assessment = ColorHeuristicScorer.assess(&png(128, 128, [20, 20, 20])).unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert!(assessment.warnings.iter().any(|w| w == WARN_TOO_DARK));
        assert!(assessment.confidence_score < 1.0);
    }

    #[test]
    fn small_flat_images_collect_warnings() {
        let flat = ImageBuffer::from_pixel(16, 16, Rgb([200u8, 150, 160]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(flat)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let assessment = ColorHeuristicScorer.assess(&bytes).unwrap();
        assert!(assessment.warnings.iter().any(|w| w == WARN_LOW_RESOLUTION));
        assert!(assessment.warnings.iter().any(|w| w == WARN_LOW_CONTRAST));
        assert!((assessment.confidence_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn rejects_empty_and_garbage_input() {
        assert!(matches!(ColorHeuristicScorer.assess(&[]), Err(ScoringError::Empty)));
        assert!(matches!(
            ColorHeuristicScorer.assess(b"definitely not an image"),
            Err(ScoringError::Decode(_))
        ));
    }
}
