//! 确定性的风险聚合.
//!
//! 风险分由两部分组成:
//!
//! 1. 分类为异常类别时, 计入 `置信度 x 分类权重`;
//! 2. 每个异常分割标签的面积占比严格超过阈值时, 固定计入区域权重.
//!
//! 总分截断到 `[0, 1]` 后按阈值分级. 同样的输入总是得到同样的输出.

use std::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::consts::{gray, risk};
use crate::inference::{ClassificationResult, SegmentationResult};

/// 风险等级, 按严重程度升序排列.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RiskLevel {
    /// 无明显风险.
    Normal,

    /// 低风险.
    Low,

    /// 中风险.
    Medium,

    /// 高风险.
    High,
}

impl RiskLevel {
    /// 小写名称.
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// 该等级对应的固定建议.
    pub const fn recommendation(&self) -> &'static str {
        match self {
            Self::High => "建议立即就医，进行进一步检查和治疗",
            Self::Medium => "建议咨询专业医生，考虑进一步检查",
            Self::Low => "建议定期复查，注意观察症状变化",
            Self::Normal => "继续保持健康生活方式，定期体检",
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 风险评分策略. 默认值来自 [`crate::consts::risk`].
#[derive(Debug, Clone, PartialEq)]
pub struct RiskPolicy {
    /// 异常类别下标.
    pub abnormal_class: usize,

    /// 分类权重.
    pub classification_weight: f64,

    /// 区域权重.
    pub region_weight: f64,

    /// 面积占比阈值 (百分比, 严格大于).
    pub region_percent_threshold: f64,

    /// 视为异常的分割标签.
    pub abnormal_labels: Vec<u8>,

    /// 高风险下限.
    pub high_threshold: f64,

    /// 中风险下限.
    pub medium_threshold: f64,

    /// 低风险下限.
    pub low_threshold: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            abnormal_class: risk::ABNORMAL_CLASS,
            classification_weight: risk::CLASSIFICATION_WEIGHT,
            region_weight: risk::REGION_WEIGHT,
            region_percent_threshold: risk::REGION_PERCENT_THRESHOLD,
            abnormal_labels: vec![gray::SEG_ABNORMAL],
            high_threshold: risk::HIGH_THRESHOLD,
            medium_threshold: risk::MEDIUM_THRESHOLD,
            low_threshold: risk::LOW_THRESHOLD,
        }
    }
}

impl RiskPolicy {
    /// 按阈值分级.
    pub fn level_of(&self, score: f64) -> RiskLevel {
        if score >= self.high_threshold {
            RiskLevel::High
        } else if score >= self.medium_threshold {
            RiskLevel::Medium
        } else if score >= self.low_threshold {
            RiskLevel::Low
        } else {
            RiskLevel::Normal
        }
    }

    /// 根据分类与分割结果评估风险.
    pub fn assess(
        &self,
        classification: &ClassificationResult,
        segmentation: &SegmentationResult,
    ) -> RiskAssessment {
        let mut score = 0.0;
        let mut factors = Vec::new();

        if classification.prediction == self.abnormal_class {
            let confidence = classification.confidence as f64;
            score += confidence * self.classification_weight;
            factors.push(format!("分类检测异常 (置信度: {confidence:.3})"));
        }

        for label in self.abnormal_labels.iter() {
            let percentage = segmentation.percentage_of(*label);
            if percentage > self.region_percent_threshold {
                score += self.region_weight;
                factors.push(format!("检测到异常区域: {percentage:.1}%"));
            }
        }

        let score = score.clamp(0.0, 1.0);
        let level = self.level_of(score);
        RiskAssessment {
            score,
            level,
            factors,
            recommendation: level.recommendation(),
        }
    }
}

/// 风险评估. 总是从分类与分割结果重新推导, 不独立修改.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// 风险分, `[0, 1]`.
    pub score: f64,

    /// 风险等级.
    pub level: RiskLevel,

    /// 可读的风险因素.
    pub factors: Vec<String>,

    /// 建议.
    pub recommendation: &'static str,
}

/// 以默认策略评估风险.
#[inline]
pub fn assess(
    classification: &ClassificationResult,
    segmentation: &SegmentationResult,
) -> RiskAssessment {
    RiskPolicy::default().assess(classification, segmentation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImageData;
    use ndarray::Array2;

    fn classification(prediction: usize, confidence: f32) -> ClassificationResult {
        let labels = ["normal", "abnormal"];
        let mut probabilities = vec![1.0 - confidence; 2];
        probabilities[prediction] = confidence;
        ClassificationResult {
            prediction,
            label: labels[prediction].to_string(),
            confidence,
            probabilities: labels.iter().map(|l| l.to_string()).zip(probabilities).collect(),
        }
    }

    /// `abnormal` 个像素为 1, 其余为 0, 共 100 个像素.
    fn segmentation(abnormal: usize) -> SegmentationResult {
        let mask = Array2::from_shape_fn((10, 10), |(h, w)| (h * 10 + w < abnormal) as u8);
        SegmentationResult::from_mask(ImageData::Planar(mask))
    }

    #[test]
    fn test_high_risk() {
        // 0.7 * 0.9 + 0.3 = 0.93.
        let r = assess(&classification(1, 0.9), &segmentation(12));
        assert!((r.score - 0.93).abs() < 1e-6);
        assert_eq!(r.level, RiskLevel::High);
        assert_eq!(r.factors.len(), 2);
        assert_eq!(r.factors[0], "分类检测异常 (置信度: 0.900)");
        assert_eq!(r.factors[1], "检测到异常区域: 12.0%");
        assert_eq!(r.recommendation, RiskLevel::High.recommendation());
    }

    #[test]
    fn test_normal() {
        let r = assess(&classification(0, 0.99), &segmentation(0));
        assert_eq!(r.score, 0.0);
        assert_eq!(r.level, RiskLevel::Normal);
        assert!(r.factors.is_empty());
        assert_eq!(r.recommendation, "继续保持健康生活方式，定期体检");
    }

    #[test]
    fn test_region_threshold_is_strict() {
        let r = assess(&classification(0, 0.8), &segmentation(5));
        assert_eq!(r.score, 0.0);
        let r = assess(&classification(0, 0.8), &segmentation(6));
        assert!((r.score - 0.3).abs() < 1e-12);
        assert_eq!(r.level, RiskLevel::Low);
    }

    #[test]
    fn test_medium_and_clamp() {
        let r = assess(&classification(1, 0.75), &segmentation(0));
        assert!((r.score - 0.525).abs() < 1e-6);
        assert_eq!(r.level, RiskLevel::Medium);

        let policy = RiskPolicy {
            abnormal_labels: vec![1, 2],
            ..RiskPolicy::default()
        };
        let mask = Array2::from_shape_fn((10, 10), |(h, _)| (h % 3) as u8);
        let seg = SegmentationResult::from_mask(ImageData::Planar(mask));
        let r = policy.assess(&classification(1, 1.0), &seg);
        assert_eq!(r.score, 1.0);
        assert_eq!(r.level, RiskLevel::High);
    }

    #[test]
    fn test_level_order_and_names() {
        assert!(RiskLevel::Normal < RiskLevel::Low);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::Medium.to_string(), "medium");
        let p = RiskPolicy::default();
        assert_eq!(p.level_of(0.8), RiskLevel::High);
        assert_eq!(p.level_of(0.5), RiskLevel::Medium);
        assert_eq!(p.level_of(0.2), RiskLevel::Low);
        assert_eq!(p.level_of(0.19), RiskLevel::Normal);
    }
}
