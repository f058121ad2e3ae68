//! 全局 min-max 强度归一化.

use super::ImageData;
use crate::{PipelineError, PipelineResult};

/// 求图像强度范围 `(min, max)`, 忽略 NaN.
///
/// 若图像为空, 全为 NaN, 或 `max <= min` (平坦图像), 返回
/// [`PipelineError::DegenerateIntensityRange`].
pub fn intensity_range(image: &ImageData<f32>) -> PipelineResult<(f32, f32)> {
    let (lo, hi) = image
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if hi > lo {
        Ok((lo, hi))
    } else {
        Err(PipelineError::DegenerateIntensityRange { lo, hi })
    }
}

/// 将图像线性缩放到 `[0, 1]`: `(A - min) / (max - min)`.
///
/// 平坦图像 (`max == min`) 或空图像原样返回, 不报错.
pub fn normalize_intensity(image: &ImageData<f32>) -> ImageData<f32> {
    match intensity_range(image) {
        Ok((lo, hi)) => {
            let span = hi - lo;
            image.map(|&v| (v - lo) / span)
        }
        Err(e) => {
            log::debug!("{e}, 跳过归一化");
            image.clone()
        }
    }
}
