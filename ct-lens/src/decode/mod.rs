//! 按扩展名分派的格式解码器.
//!
//! 扩展名在加载时只解析一次, 得到闭合枚举 [`FormatKind`], 每个变体对应一个解码函数.
//! 解码器不会接触会话状态; 只有完整成功的 [`LoadedImage`] 才会交给会话.

mod dcm;
mod nii;
mod raster;

use std::path::Path;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{LoadedImage, PipelineError, PipelineResult};

pub use dcm::{dicom_metadata, dicom_window};
pub use nii::nifti_affine;

/// 支持的文件格式.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FormatKind {
    /// 单切片 (或多帧) DICOM, `.dcm` / `.dicom`.
    Dicom,

    /// NIfTI 体数据, `.nii` / `.nii.gz`.
    Nifti,

    /// 普通栅格图像, `.png` / `.jpg` / `.jpeg`.
    Raster,
}

/// 格式所属的大类.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ImageFamily {
    /// 医学体数据容器.
    VolumetricMedical,

    /// 普通栅格图像容器.
    StandardRaster,
}

/// 所有支持的扩展名, 小写, 带前导点.
pub const SUPPORTED_EXTENSIONS: [&str; 7] =
    [".dcm", ".dicom", ".nii", ".nii.gz", ".png", ".jpg", ".jpeg"];

impl FormatKind {
    /// 根据扩展名 (大小写不敏感) 确定格式. 不检查文件是否存在.
    ///
    /// 只有 `.nii.gz` 被视为压缩 NIfTI; 其它 `.gz` 文件不受支持.
    pub fn from_path(path: &Path) -> PipelineResult<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".nii.gz") {
            return Ok(Self::Nifti);
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "dcm" | "dicom" => Ok(Self::Dicom),
            "nii" => Ok(Self::Nifti),
            "png" | "jpg" | "jpeg" => Ok(Self::Raster),
            _ => Err(PipelineError::UnsupportedFormat(ext)),
        }
    }

    /// 格式所属的大类.
    #[inline]
    pub const fn family(&self) -> ImageFamily {
        match self {
            Self::Dicom | Self::Nifti => ImageFamily::VolumetricMedical,
            Self::Raster => ImageFamily::StandardRaster,
        }
    }

    /// 用该格式的解码器解码 `path`.
    pub fn decode(&self, path: &Path) -> PipelineResult<LoadedImage> {
        match self {
            Self::Dicom => dcm::decode(path),
            Self::Nifti => nii::decode(path),
            Self::Raster => raster::decode(path),
        }
    }
}

/// 判断 `path` 的扩展名是否受支持.
#[inline]
pub fn is_supported(path: &Path) -> bool {
    FormatKind::from_path(path).is_ok()
}

/// 解码 `path` 指向的文件.
///
/// 依次检查: 文件存在 ([`PipelineError::FileNotFound`]), 扩展名
/// ([`PipelineError::UnsupportedFormat`]), 解码 ([`PipelineError::DecodeFailure`]).
pub fn decode(path: impl AsRef<Path>) -> PipelineResult<LoadedImage> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PipelineError::FileNotFound(path.to_owned()));
    }
    let kind = FormatKind::from_path(path)?;
    let image = kind.decode(path)?;
    log::info!(
        "成功加载 {kind:?} 文件: {}, 形状 {:?}",
        path.display(),
        image.data().shape()
    );
    Ok(image)
}

/// BT.601 亮度, 与常见 `RGB -> GRAY` 转换一致.
#[inline]
pub(crate) fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}
