//! 维度感知的缩放. 2D 直接缩放, 3D 沿最后一维逐切片缩放.
//!
//! 底层的 2D 缩放原语来自 `image` crate (双线性, 即 `FilterType::Triangle`).

use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use super::ImageData;
use crate::consts::{DEFAULT_TARGET_HEIGHT, DEFAULT_TARGET_WIDTH};
use crate::{PipelineError, PipelineResult};

type GrayF32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

/// 缩放目标尺寸 `(宽, 高)`. 两个分量都必须为正.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TargetSize {
    width: u32,
    height: u32,
}

impl TargetSize {
    /// 构建目标尺寸. 任一分量为 0 时返回 [`PipelineError::InvalidResizeTarget`].
    pub fn new(width: u32, height: u32) -> PipelineResult<Self> {
        let ans = Self { width, height };
        if width == 0 || height == 0 {
            Err(ans.invalid("目标尺寸必须为正"))
        } else {
            Ok(ans)
        }
    }

    /// 目标宽, 即输出的列数.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 目标高, 即输出的行数.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 输出的空间形状 `(行, 列)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.height as usize, self.width as usize)
    }

    fn invalid(&self, reason: impl ToString) -> PipelineError {
        PipelineError::InvalidResizeTarget {
            width: self.width,
            height: self.height,
            reason: reason.to_string(),
        }
    }
}

/// 默认 512x512.
impl Default for TargetSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_TARGET_WIDTH,
            height: DEFAULT_TARGET_HEIGHT,
        }
    }
}

/// 解析 `"宽x高"` 格式, 如 `"256x256"`.
impl FromStr for TargetSize {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unparsable = || PipelineError::InvalidResizeTarget {
            width: 0,
            height: 0,
            reason: format!("无法解析 `{s}`, 应为 `宽x高`"),
        };
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(unparsable)?;
        let w = w.trim().parse().map_err(|_| unparsable())?;
        let h = h.trim().parse().map_err(|_| unparsable())?;
        Self::new(w, h)
    }
}

/// 将图像缩放到 `target`. 2D 输出形状为 `(target.height, target.width)`;
/// 3D 输出保持原切片个数和顺序, 只改变前两维.
pub fn resize(image: &ImageData<f32>, target: TargetSize) -> PipelineResult<ImageData<f32>> {
    Ok(match image {
        ImageData::Planar(a) => ImageData::Planar(resize_plane(a.view(), target)?),
        ImageData::Volumetric(a) => ImageData::Volumetric(resize_volume(a.view(), target)?),
    })
}

/// 用 `image` 的双线性重采样缩放单张切片.
///
/// `image` 的浮点重采样会把结果截断到 `[0, 1]`, 因此先把切片线性映射到 `[0, 1]`,
/// 缩放后再映射回原强度范围. 三角核权重非负且和为 1, 该映射不改变插值结果.
pub fn resize_plane(plane: ArrayView2<f32>, target: TargetSize) -> PipelineResult<Array2<f32>> {
    let (rows, cols) = plane.dim();
    if rows == 0 || cols == 0 {
        return Err(target.invalid("源图像为空"));
    }
    let src_w = u32::try_from(cols).map_err(|e| target.invalid(e))?;
    let src_h = u32::try_from(rows).map_err(|e| target.invalid(e))?;

    let (lo, hi) = plane
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let (lo, span) = if hi > lo {
        (lo, hi - lo)
    } else if lo.is_finite() {
        (lo, 1.0)
    } else {
        (0.0, 1.0)
    };

    // `iter` 按逻辑上的行优先顺序遍历, 与 `ImageBuffer` 的存储布局一致.
    let buf: Vec<f32> = plane.iter().map(|v| (v - lo) / span).collect();
    let src = GrayF32Image::from_raw(src_w, src_h, buf)
        .ok_or_else(|| target.invalid("缓冲区大小与源图像不符"))?;

    let out = imageops::resize(&src, target.width, target.height, FilterType::Triangle);
    let data = out.into_raw().into_iter().map(|v| v * span + lo).collect();
    Array2::from_shape_vec(target.shape(), data).map_err(|e| target.invalid(e))
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};

        fn resize_slices(
            volume: ArrayView3<f32>,
            target: TargetSize,
        ) -> PipelineResult<Vec<Array2<f32>>> {
            volume
                .axis_iter(Axis(2))
                .into_par_iter()
                .map(|s| resize_plane(s, target))
                .collect()
        }
    } else {
        fn resize_slices(
            volume: ArrayView3<f32>,
            target: TargetSize,
        ) -> PipelineResult<Vec<Array2<f32>>> {
            volume
                .axis_iter(Axis(2))
                .map(|s| resize_plane(s, target))
                .collect()
        }
    }
}

/// 沿最后一维逐切片缩放, 并按原顺序重新堆叠.
pub fn resize_volume(volume: ArrayView3<f32>, target: TargetSize) -> PipelineResult<Array3<f32>> {
    let slices = resize_slices(volume, target)?;
    if slices.is_empty() {
        let (h, w) = target.shape();
        return Ok(Array3::zeros((h, w, 0)));
    }
    let views: Vec<_> = slices.iter().map(Array2::view).collect();
    ndarray::stack(Axis(2), &views).map_err(|e| target.invalid(e))
}
