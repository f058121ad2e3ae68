//! 一次完整的分析: 分类, 分割, 热力图, 风险评估.
//!
//! 推理 (分类 + 分割) 与热力图计算互不依赖, 在 `rayon` feature 打开时并行执行.

use chrono::{DateTime, Local};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::inference::{
    ClassificationResult, InferenceAdapter, InferenceError, SegmentationResult,
};
use crate::risk::{RiskAssessment, RiskPolicy};
use crate::saliency::{self, Heatmap};
use crate::{ImageData, PipelineResult};

/// 分析进度里程碑.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Progress {
    /// 开始分析.
    Started,

    /// 分类完成.
    Classified,

    /// 分割完成.
    Segmented,

    /// 热力图完成.
    SaliencyReady,

    /// 风险评估完成.
    Done,
}

impl Progress {
    /// 百分比: 20, 40, 60, 80, 100.
    #[inline]
    pub const fn percent(&self) -> u8 {
        match self {
            Self::Started => 20,
            Self::Classified => 40,
            Self::Segmented => 60,
            Self::SaliencyReady => 80,
            Self::Done => 100,
        }
    }
}

/// 一次分析的完整结果. 由调用方持有, 不跨次共享.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// 分析完成时间.
    pub timestamp: DateTime<Local>,

    /// 输入图像形状.
    pub image_shape: Vec<usize>,

    /// 分类结果.
    pub classification: ClassificationResult,

    /// 分割结果.
    pub segmentation: SegmentationResult,

    /// 热力图.
    pub heatmap: Heatmap,

    /// 风险评估.
    pub risk: RiskAssessment,
}

/// 分析器. 持有推理协作者与风险策略.
#[derive(Debug, Clone)]
pub struct Analyzer<A> {
    adapter: A,
    policy: RiskPolicy,
}

impl<A: InferenceAdapter> Analyzer<A> {
    /// 以默认风险策略创建.
    #[inline]
    pub fn new(adapter: A) -> Self {
        Self::with_policy(adapter, RiskPolicy::default())
    }

    /// 以指定风险策略创建.
    #[inline]
    pub fn with_policy(adapter: A, policy: RiskPolicy) -> Self {
        Self { adapter, policy }
    }

    /// 推理协作者.
    #[inline]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// 风险策略.
    #[inline]
    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// 分析规范化后的图像 `input`.
    #[inline]
    pub fn analyze(&self, input: &ImageData<f32>) -> PipelineResult<AnalysisResult> {
        self.analyze_with_progress(input, |_| {})
    }

    /// 同 [`Analyzer::analyze`], 每到达一个里程碑就调用一次 `progress`, 顺序严格递增.
    pub fn analyze_with_progress<F>(
        &self,
        input: &ImageData<f32>,
        mut progress: F,
    ) -> PipelineResult<AnalysisResult>
    where
        F: FnMut(Progress) + Send,
    {
        progress(Progress::Started);

        let (inferred, heatmap) = join(
            || self.infer(input, &mut progress),
            || self.heatmap(input),
        );
        let (classification, segmentation) = inferred?;
        progress(Progress::SaliencyReady);

        let risk = self.policy.assess(&classification, &segmentation);
        progress(Progress::Done);
        log::info!(
            "分析完成: {} (置信度 {:.3}), 风险 {} ({:.3})",
            classification.label,
            classification.confidence,
            risk.level,
            risk.score
        );

        Ok(AnalysisResult {
            timestamp: Local::now(),
            image_shape: input.shape().to_vec(),
            classification,
            segmentation,
            heatmap,
            risk,
        })
    }

    fn infer<F: FnMut(Progress)>(
        &self,
        input: &ImageData<f32>,
        progress: &mut F,
    ) -> Result<(ClassificationResult, SegmentationResult), InferenceError> {
        let labels = self.adapter.class_labels();
        let raw = self.adapter.classify(input)?;
        let classification = ClassificationResult::from_raw(raw, &labels)?;
        progress(Progress::Classified);

        let mask = self.adapter.segment(input)?;
        let segmentation = SegmentationResult::from_mask_checked(mask, input)?;
        progress(Progress::Segmented);
        Ok((classification, segmentation))
    }

    /// 优先使用协作者的显著性图; 没有或形状不符时使用梯度幅值热力图.
    fn heatmap(&self, input: &ImageData<f32>) -> Heatmap {
        match self.adapter.saliency(input) {
            Some(map) if map.shape() == input.shape() => Heatmap::from_bytes(map),
            Some(map) => {
                log::warn!(
                    "显著性图形状 {:?} 与输入 {:?} 不符, 改用梯度热力图",
                    map.shape(),
                    input.shape()
                );
                saliency::estimate(input)
            }
            None => saliency::estimate(input),
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        #[inline]
        fn join<FA, FB, RA, RB>(a: FA, b: FB) -> (RA, RB)
        where
            FA: FnOnce() -> RA + Send,
            FB: FnOnce() -> RB + Send,
            RA: Send,
            RB: Send,
        {
            rayon::join(a, b)
        }
    } else {
        #[inline]
        fn join<FA, FB, RA, RB>(a: FA, b: FB) -> (RA, RB)
        where
            FA: FnOnce() -> RA,
            FB: FnOnce() -> RB,
        {
            (a(), b())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::RawClassification;
    use crate::risk::RiskLevel;
    use crate::PipelineError;
    use ndarray::Array2;

    /// 固定输出的协作者: 左侧 `abnormal_cols` 列分割为异常.
    struct Fixed {
        label_index: usize,
        confidence: f32,
        abnormal_cols: usize,
    }

    impl InferenceAdapter for Fixed {
        fn classify(&self, _: &ImageData<f32>) -> Result<RawClassification, InferenceError> {
            let mut probabilities = vec![1.0 - self.confidence; 2];
            probabilities[self.label_index] = self.confidence;
            Ok(RawClassification {
                label_index: self.label_index,
                probabilities,
            })
        }

        fn segment(&self, input: &ImageData<f32>) -> Result<ImageData<u8>, InferenceError> {
            let mask = Array2::from_shape_fn(input.spatial_shape(), |(_, c)| {
                (c < self.abnormal_cols) as u8
            });
            Ok(mask.into())
        }
    }

    struct Broken;

    impl InferenceAdapter for Broken {
        fn classify(&self, _: &ImageData<f32>) -> Result<RawClassification, InferenceError> {
            Err(InferenceError::Backend("模型未加载".into()))
        }

        fn segment(&self, _: &ImageData<f32>) -> Result<ImageData<u8>, InferenceError> {
            Err(InferenceError::Backend("模型未加载".into()))
        }
    }

    fn input() -> ImageData<f32> {
        Array2::from_shape_fn((10, 10), |(r, c)| ((r + c) as f32) / 18.0).into()
    }

    #[test]
    fn test_analyze_high_risk() {
        let analyzer = Analyzer::new(Fixed {
            label_index: 1,
            confidence: 0.9,
            abnormal_cols: 2,
        });
        let mut seen = Vec::new();
        let res = analyzer
            .analyze_with_progress(&input(), |p| seen.push(p.percent()))
            .unwrap();
        assert_eq!(seen, [20, 40, 60, 80, 100]);
        assert_eq!(res.image_shape, vec![10, 10]);
        assert_eq!(res.classification.label, "abnormal");
        assert_eq!(res.segmentation.percentage_of(1), 20.0);
        assert_eq!(res.heatmap.data().shape(), &[10, 10]);
        assert_eq!(res.risk.level, RiskLevel::High);
        assert!((res.risk.score - 0.93).abs() < 1e-6);
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let analyzer = Analyzer::new(Fixed {
            label_index: 0,
            confidence: 0.8,
            abnormal_cols: 0,
        });
        let a = analyzer.analyze(&input()).unwrap();
        let b = analyzer.analyze(&input()).unwrap();
        assert_eq!(a.risk, b.risk);
        assert_eq!(a.heatmap, b.heatmap);
        assert_eq!(a.risk.level, RiskLevel::Normal);
    }

    #[test]
    fn test_adapter_failure_is_reported() {
        let analyzer = Analyzer::new(Broken);
        let mut seen = Vec::new();
        let res = analyzer.analyze_with_progress(&input(), |p| seen.push(p));
        assert!(matches!(res, Err(PipelineError::Inference(_))));
        assert_eq!(seen, [Progress::Started]);
    }
}
