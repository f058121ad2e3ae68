//! 图像统计信息.

use itertools::Itertools;
use ordered_float::OrderedFloat;

#[cfg(feature = "serde")]
use serde::Serialize;

use super::{ImageData, PixelType};

/// 当前图像的不可变统计快照. 每次按需重新计算, 不跨加载缓存.
///
/// 没有加载图像时, 会话返回 `ImageStatistics::default()`, 即空结构.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageStatistics {
    /// 数据形状.
    pub shape: Vec<usize>,

    /// 像素数值类型. 空结构中为 `None`.
    pub pixel_type: Option<PixelType>,

    /// 最小值.
    pub min: f64,

    /// 最大值.
    pub max: f64,

    /// 平均值.
    pub mean: f64,

    /// 总体标准差 (除以 N).
    pub std: f64,

    /// 不同像素值的个数.
    pub unique_values: usize,
}

impl ImageStatistics {
    /// 计算 `data` 的统计信息. 所有累加都在 `f64` 上进行.
    pub fn compute(data: &ImageData<f32>, pixel_type: PixelType) -> Self {
        let shape = data.shape().to_vec();
        let n = data.len();
        if n == 0 {
            return Self {
                shape,
                pixel_type: Some(pixel_type),
                ..Self::default()
            };
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for v in data.iter().map(|v| *v as f64) {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let mean = sum / n as f64;
        let var = data
            .iter()
            .map(|v| (*v as f64 - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        let unique_values = data.iter().map(|v| OrderedFloat(*v)).unique().count();

        Self {
            shape,
            pixel_type: Some(pixel_type),
            min,
            max,
            mean,
            std: var.sqrt(),
            unique_values,
        }
    }

    /// 是否为空结构 (即没有加载图像时的统计).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixel_type.is_none()
    }
}
