use std::path::{Path, PathBuf};

use ndarray::{s, Array2, Array3, ArrayView2, Axis};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::decode::FormatKind;
use crate::{Idx2d, PipelineError, PipelineResult};

pub mod metadata;
pub mod normalize;
pub mod resize;
pub mod save;
pub mod stats;
pub mod window;

pub use metadata::{MetaValue, Metadata};
pub use normalize::normalize_intensity;
pub use resize::TargetSize;
pub use save::ImgWriteVis;
pub use stats::ImageStatistics;
pub use window::CtWindow;

/// 2D 或 3D 图像数据. 3D 数据按照 `(行, 列, 切片)` 组织.
///
/// 用枚举而不是 `ArrayD` 表达 "只允许 2D 或 3D" 这一约束.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData<T = f32> {
    /// 单张切片, `(行, 列)`.
    Planar(Array2<T>),

    /// 切片沿最后一维堆叠的体数据, `(行, 列, 切片)`.
    Volumetric(Array3<T>),
}

impl<T> ImageData<T> {
    /// 完整形状. 2D 为 `[行, 列]`, 3D 为 `[行, 列, 切片]`.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Planar(a) => a.shape(),
            Self::Volumetric(a) => a.shape(),
        }
    }

    /// 空间形状 `(行, 列)`.
    #[inline]
    pub fn spatial_shape(&self) -> Idx2d {
        let sh = self.shape();
        (sh[0], sh[1])
    }

    /// 切片个数. 2D 图像视为 1.
    #[inline]
    pub fn depth(&self) -> usize {
        match self {
            Self::Planar(_) => 1,
            Self::Volumetric(a) => a.len_of(Axis(2)),
        }
    }

    /// 维数, 只可能是 2 或 3.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// 像素/体素个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    /// 是否不含任何像素.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 以行优先规则迭代所有像素.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            Self::Planar(a) => Box::new(a.iter()),
            Self::Volumetric(a) => Box::new(a.iter()),
        }
    }

    /// 按原形状逐元素映射.
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> ImageData<U> {
        match self {
            Self::Planar(a) => ImageData::Planar(a.map(f)),
            Self::Volumetric(a) => ImageData::Volumetric(a.map(f)),
        }
    }

    /// 获取第 `index` 张切片的视图. 2D 图像只有第 0 张.
    ///
    /// 越界时返回 `None`.
    pub fn slice_at(&self, index: usize) -> Option<ArrayView2<'_, T>> {
        match self {
            Self::Planar(a) => (index == 0).then(|| a.view()),
            Self::Volumetric(a) => {
                (index < a.len_of(Axis(2))).then(|| a.index_axis(Axis(2), index))
            }
        }
    }

    /// 获取能按升序迭代所有切片视图的迭代器.
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, T>> {
        let depth = self.depth();
        (0..depth).map(move |i| match self {
            Self::Planar(a) => a.view(),
            Self::Volumetric(a) => a.index_axis(Axis(2), i),
        })
    }
}

impl<T: Clone> ImageData<T> {
    /// 在每张切片上截取 `[y..y+height, x..x+width]`. 3D 数据保留全部切片.
    ///
    /// 严格检查边界: 任一部分越界或面积为零时返回 [`PipelineError::RoiOutOfBounds`].
    pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> PipelineResult<Self> {
        let (rows, cols) = self.spatial_shape();
        let in_bounds = width > 0
            && height > 0
            && x.checked_add(width).is_some_and(|r| r <= cols)
            && y.checked_add(height).is_some_and(|b| b <= rows);
        if !in_bounds {
            return Err(PipelineError::RoiOutOfBounds {
                x,
                y,
                width,
                height,
                rows,
                cols,
            });
        }
        Ok(match self {
            Self::Planar(a) => Self::Planar(a.slice(s![y..y + height, x..x + width]).to_owned()),
            Self::Volumetric(a) => {
                Self::Volumetric(a.slice(s![y..y + height, x..x + width, ..]).to_owned())
            }
        })
    }
}

impl<T> From<Array2<T>> for ImageData<T> {
    #[inline]
    fn from(value: Array2<T>) -> Self {
        Self::Planar(value)
    }
}

impl<T> From<Array3<T>> for ImageData<T> {
    #[inline]
    fn from(value: Array3<T>) -> Self {
        Self::Volumetric(value)
    }
}

/// 像素的数值类型标签.
///
/// 无论标签如何, 内存中都以 `f32` 存储. `UInt8` 表示数据已经过 CT 窗口转换,
/// 只含 0..=255 的整数值.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PixelType {
    /// 原始浮点强度.
    Float32,

    /// 窗口化后的 8-bit 灰度.
    UInt8,
}

impl PixelType {
    /// 类型名, 与 numpy 的 dtype 命名一致.
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::UInt8 => "uint8",
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 一次成功解码得到的图像, 包括数据, 来源路径, 格式和元信息.
///
/// 该结构只由解码器创建, 会话在下一次加载成功时整体替换它, 不做局部修改.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    data: ImageData<f32>,
    path: PathBuf,
    format: FormatKind,
    pixel_type: PixelType,
    metadata: Metadata,
}

impl LoadedImage {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(
        data: ImageData<f32>,
        path: PathBuf,
        format: FormatKind,
        pixel_type: PixelType,
        metadata: Metadata,
    ) -> Self {
        Self {
            data,
            path,
            format,
            pixel_type,
            metadata,
        }
    }

    /// 图像数据.
    #[inline]
    pub fn data(&self) -> &ImageData<f32> {
        &self.data
    }

    /// 来源文件路径.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件格式.
    #[inline]
    pub fn format(&self) -> FormatKind {
        self.format
    }

    /// 像素数值类型.
    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// 元信息.
    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// 由调用方显式替换图像数据. 替换后的数据视为浮点强度.
    #[inline]
    pub(crate) fn replace_data(&mut self, data: ImageData<f32>) {
        self.data = data;
        self.pixel_type = PixelType::Float32;
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_data(self) -> ImageData<f32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn volume() -> ImageData<f32> {
        Array::from_shape_fn((4, 5, 3), |(h, w, z)| (h * 100 + w * 10 + z) as f32).into()
    }

    #[test]
    fn test_shapes() {
        let v = volume();
        assert_eq!(v.shape(), &[4, 5, 3]);
        assert_eq!(v.spatial_shape(), (4, 5));
        assert_eq!(v.depth(), 3);
        assert_eq!(v.ndim(), 3);
        assert_eq!(v.len(), 60);

        let p: ImageData<f32> = Array2::<f32>::zeros((2, 7)).into();
        assert_eq!(p.depth(), 1);
        assert_eq!(p.ndim(), 2);
    }

    #[test]
    fn test_slice_access_keeps_order() {
        let v = volume();
        for (z, sli) in v.slice_iter().enumerate() {
            assert_eq!(sli[(1, 2)], (100 + 20 + z) as f32);
        }
        assert!(v.slice_at(3).is_none());
    }

    #[test]
    fn test_crop_volume_keeps_depth() {
        let roi = volume().crop(1, 2, 3, 2).unwrap();
        assert_eq!(roi.shape(), &[2, 3, 3]);
        let ImageData::Volumetric(a) = roi else {
            unreachable!()
        };
        assert_eq!(a[(0, 0, 2)], 212.0);
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let v = volume();
        assert!(matches!(
            v.crop(3, 0, 3, 1),
            Err(PipelineError::RoiOutOfBounds { cols: 5, .. })
        ));
        assert!(v.crop(0, 4, 1, 1).is_err());
        assert!(v.crop(0, 0, 0, 1).is_err());
        assert!(v.crop(usize::MAX, 0, 2, 1).is_err());
        assert!(v.crop(0, 0, 5, 4).is_ok());
    }
}
