//! 推理协作者接口, 以及对其原始输出的校验.
//!
//! 本 crate 不包含任何模型. 分类与分割由实现了 [`InferenceAdapter`] 的外部协作者完成,
//! 其输出在这里被校验并整理为 [`ClassificationResult`] 和 [`SegmentationResult`].

use std::collections::BTreeMap;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::consts::{DEFAULT_CLASS_LABELS, PROBABILITY_TOLERANCE};
use crate::ImageData;

/// 推理协作者的错误.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// 协作者自身运行失败, 如模型未加载.
    #[error("推理失败: {0}")]
    Backend(String),

    /// 预测的类别下标不在标签列表范围内.
    #[error("类别下标 {index} 超出范围, 共 {len} 个类别")]
    LabelOutOfRange {
        /// 预测下标.
        index: usize,

        /// 类别个数.
        len: usize,
    },

    /// 概率个数与类别个数不一致.
    #[error("得到 {got} 个概率, 但共有 {expected} 个类别")]
    ProbabilityCount {
        /// 类别个数.
        expected: usize,

        /// 概率个数.
        got: usize,
    },

    /// 概率之和偏离 1, 或包含负数/非有限值.
    #[error("概率分布不合法 (和为 {sum})")]
    InvalidProbabilities {
        /// 概率之和.
        sum: f32,
    },

    /// 掩码的空间形状与输入不一致.
    #[error("掩码形状 {mask:?} 与输入形状 {input:?} 不一致")]
    MaskShapeMismatch {
        /// 掩码形状.
        mask: Vec<usize>,

        /// 输入形状.
        input: Vec<usize>,
    },
}

/// 协作者给出的原始分类输出.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClassification {
    /// 预测类别下标.
    pub label_index: usize,

    /// 各类别概率, 顺序与 [`InferenceAdapter::class_labels`] 一致.
    pub probabilities: Vec<f32>,
}

/// 推理协作者. 必须满足 `Sync`, 以便在工作线程中调用.
pub trait InferenceAdapter: Sync {
    /// 对规范化后的图像分类.
    fn classify(&self, input: &ImageData<f32>) -> Result<RawClassification, InferenceError>;

    /// 对规范化后的图像分割, 返回与输入空间形状相同的整数标签掩码.
    fn segment(&self, input: &ImageData<f32>) -> Result<ImageData<u8>, InferenceError>;

    /// 反向传播显著性图 (字节范围). 默认不提供, 由梯度幅值热力图代替.
    fn saliency(&self, _input: &ImageData<f32>) -> Option<ImageData<u8>> {
        None
    }

    /// 类别标签, 下标即类别编号.
    fn class_labels(&self) -> Vec<String> {
        DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect()
    }
}

/// 经过校验的分类结果.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// 预测类别下标.
    pub prediction: usize,

    /// 预测类别标签.
    pub label: String,

    /// 预测类别的概率.
    pub confidence: f32,

    /// `标签 -> 概率`, 顺序与标签列表一致.
    pub probabilities: Vec<(String, f32)>,
}

impl ClassificationResult {
    /// 校验原始输出: 下标在范围内, 概率个数与标签个数一致, 概率非负且和为 `1 ± 1e-3`.
    pub fn from_raw(raw: RawClassification, labels: &[String]) -> Result<Self, InferenceError> {
        let RawClassification {
            label_index,
            probabilities,
        } = raw;
        if label_index >= labels.len() {
            return Err(InferenceError::LabelOutOfRange {
                index: label_index,
                len: labels.len(),
            });
        }
        if probabilities.len() != labels.len() {
            return Err(InferenceError::ProbabilityCount {
                expected: labels.len(),
                got: probabilities.len(),
            });
        }
        let sum: f32 = probabilities.iter().sum();
        let valid = probabilities.iter().all(|p| p.is_finite() && *p >= 0.0);
        if !valid || (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(InferenceError::InvalidProbabilities { sum });
        }

        Ok(Self {
            prediction: label_index,
            label: labels[label_index].clone(),
            confidence: probabilities[label_index],
            probabilities: labels.iter().cloned().zip(probabilities).collect(),
        })
    }

    /// 查询 `label` 的概率.
    pub fn probability_of(&self, label: &str) -> Option<f32> {
        self.probabilities
            .iter()
            .find_map(|(l, p)| (l == label).then_some(*p))
    }
}

/// 单个标签的统计.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStats {
    /// 像素个数.
    pub pixel_count: usize,

    /// 占总像素的百分比, `0..=100`.
    pub percentage: f64,
}

/// 经过校验的分割结果.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationResult {
    /// 整数标签掩码.
    pub mask: ImageData<u8>,

    /// `标签 -> 统计`, 只包含出现过的标签.
    pub statistics: BTreeMap<u8, SegmentStats>,

    /// 总像素个数.
    pub total_pixels: usize,
}

impl SegmentationResult {
    /// 统计 `mask` 中每个标签的像素个数与百分比. 空掩码的统计为空.
    pub fn from_mask(mask: ImageData<u8>) -> Self {
        let mut counts = BTreeMap::<u8, usize>::new();
        for v in mask.iter() {
            *counts.entry(*v).or_default() += 1;
        }
        let total_pixels = mask.len();
        let statistics = counts
            .into_iter()
            .map(|(label, pixel_count)| {
                let percentage = pixel_count as f64 * 100.0 / total_pixels as f64;
                (
                    label,
                    SegmentStats {
                        pixel_count,
                        percentage,
                    },
                )
            })
            .collect();
        Self {
            mask,
            statistics,
            total_pixels,
        }
    }

    /// 校验掩码与输入空间形状一致后统计.
    pub fn from_mask_checked(
        mask: ImageData<u8>,
        input: &ImageData<f32>,
    ) -> Result<Self, InferenceError> {
        if mask.shape() != input.shape() {
            return Err(InferenceError::MaskShapeMismatch {
                mask: mask.shape().to_vec(),
                input: input.shape().to_vec(),
            });
        }
        Ok(Self::from_mask(mask))
    }

    /// 标签 `label` 的百分比, 未出现时为 0.
    #[inline]
    pub fn percentage_of(&self, label: u8) -> f64 {
        self.statistics.get(&label).map_or(0.0, |s| s.percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn labels() -> Vec<String> {
        vec!["normal".to_string(), "abnormal".to_string()]
    }

    #[test]
    fn test_classification_ok() {
        let raw = RawClassification {
            label_index: 1,
            probabilities: vec![0.07, 0.93],
        };
        let c = ClassificationResult::from_raw(raw, &labels()).unwrap();
        assert_eq!(c.prediction, 1);
        assert_eq!(c.label, "abnormal");
        assert_eq!(c.confidence, 0.93);
        assert_eq!(c.probability_of("normal"), Some(0.07));
        assert_eq!(c.probability_of("other"), None);
    }

    #[test]
    fn test_classification_rejects_bad_output() {
        let bad = |label_index, probabilities| {
            ClassificationResult::from_raw(
                RawClassification {
                    label_index,
                    probabilities,
                },
                &labels(),
            )
        };
        assert!(matches!(
            bad(2, vec![0.5, 0.5]),
            Err(InferenceError::LabelOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            bad(0, vec![1.0]),
            Err(InferenceError::ProbabilityCount { .. })
        ));
        assert!(matches!(
            bad(0, vec![0.6, 0.6]),
            Err(InferenceError::InvalidProbabilities { .. })
        ));
        assert!(matches!(
            bad(0, vec![1.5, -0.5]),
            Err(InferenceError::InvalidProbabilities { .. })
        ));
        assert!(bad(0, vec![0.6, 0.4005]).is_ok());
    }

    #[test]
    fn test_segmentation_percentages_sum_to_100() {
        let mask: ImageData<u8> =
            Array3::from_shape_fn((7, 9, 3), |(h, w, z)| ((h * w + z) % 3) as u8).into();
        let seg = SegmentationResult::from_mask(mask);
        assert_eq!(seg.total_pixels, 189);
        let total: f64 = seg.statistics.values().map(|s| s.percentage).sum();
        assert!((total - 100.0).abs() < 0.01);
        let count: usize = seg.statistics.values().map(|s| s.pixel_count).sum();
        assert_eq!(count, 189);
    }

    #[test]
    fn test_segmentation_single_label() {
        let mask: ImageData<u8> = Array2::from_elem((4, 5), 1).into();
        let seg = SegmentationResult::from_mask(mask);
        assert_eq!(seg.statistics.len(), 1);
        assert_eq!(seg.percentage_of(1), 100.0);
        assert_eq!(seg.percentage_of(0), 0.0);
    }

    #[test]
    fn test_segmentation_shape_check() {
        let input: ImageData<f32> = Array2::zeros((4, 5)).into();
        let mask: ImageData<u8> = Array2::zeros((5, 4)).into();
        assert!(matches!(
            SegmentationResult::from_mask_checked(mask, &input),
            Err(InferenceError::MaskShapeMismatch { .. })
        ));
    }
}
