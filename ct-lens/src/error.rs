//! 运行时错误.

use std::path::PathBuf;

use thiserror::Error;

use crate::inference::InferenceError;

/// 流水线运行时错误. 所有错误都可由调用方恢复 (换文件, 换参数后重试).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 文件不存在.
    #[error("文件不存在: {}", .0.display())]
    FileNotFound(PathBuf),

    /// 不支持的扩展名. 参数为小写化后的扩展名 (可能为空).
    #[error("不支持的文件格式: `{0}`")]
    UnsupportedFormat(String),

    /// 容器格式损坏或解码库拒绝该文件.
    #[error("解码 {} 失败: {reason}", path.display())]
    DecodeFailure {
        /// 出错文件.
        path: PathBuf,

        /// 底层解码器给出的原因.
        reason: String,
    },

    /// 需要先加载图像.
    #[error("没有加载的图像")]
    NoImageLoaded,

    /// 目标尺寸非法, 或底层缩放原语拒绝执行.
    #[error("无法缩放到 {width}x{height}: {reason}")]
    InvalidResizeTarget {
        /// 目标宽.
        width: u32,

        /// 目标高.
        height: u32,

        /// 原因.
        reason: String,
    },

    /// 强度范围退化 (`max <= min`). 通常只在内部使用, 不会从 `load`/`preprocess` 返回.
    #[error("强度范围退化: [{lo}, {hi}]")]
    DegenerateIntensityRange {
        /// 下界.
        lo: f32,

        /// 上界.
        hi: f32,
    },

    /// ROI 超出图像范围或面积为零.
    #[error("ROI (x={x}, y={y}, w={width}, h={height}) 超出图像范围 {rows}x{cols}")]
    RoiOutOfBounds {
        /// 左上角列.
        x: usize,

        /// 左上角行.
        y: usize,

        /// ROI 宽.
        width: usize,

        /// ROI 高.
        height: usize,

        /// 图像行数.
        rows: usize,

        /// 图像列数.
        cols: usize,
    },

    /// 推理协作者失败或返回了不合规的结果.
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PipelineError {
    /// 以 `path` 和任意可显示的原因构造 [`PipelineError::DecodeFailure`].
    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DecodeFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// 流水线运行时结果.
pub type PipelineResult<T> = Result<T, PipelineError>;
