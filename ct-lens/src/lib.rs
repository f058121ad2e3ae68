#![warn(missing_docs)]

//! 核心库. 提供医学影像 (DICOM, NIfTI, PNG/JPEG) 的加载、规范化流水线,
//! 以及分类 + 分割 + 热力图的风险聚合引擎.
//!
//! 该 crate 只提供 `safe` 接口. 神经网络本身不在本 crate 范围内,
//! 推理由外部实现 [`inference::InferenceAdapter`] 的协作者提供.
//!
//! # 注意
//!
//! 1. 所有图像在内存中统一以 `f32` 存储, 且只允许 2D 或 3D. 3D 体数据按照
//!   `(行, 列, 切片)` 组织, 即切片沿 **最后一维** 堆叠.
//! 2. 库代码中的任何失败都通过 [`PipelineError`] 返回, 均可由调用方恢复.
//!
//! # 开发计划
//!
//! ### 按扩展名分派的格式解码 ✅
//!
//! `.dcm/.dicom`, `.nii/.nii.gz`, `.png/.jpg/.jpeg`. 分派由闭合枚举
//! [`FormatKind`] 完成, 在加载时只解析一次.
//!
//! 实现位于 `ct-lens/src/decode`.
//!
//! ### CT window 视图 ✅
//!
//! 将 CT HU 值按窗位/窗宽转换为 8-bit 灰度值. 窗宽退化 (`<= 0`) 时整幅图饱和为 255.
//!
//! 实现位于 `ct-lens/src/data/window.rs`.
//!
//! ### 强度归一化与逐切片缩放 ✅
//!
//! 全局 min-max 归一化 (平坦图像原样返回), 2D 直接缩放,
//! 3D 沿最后一维逐切片缩放并按原顺序重新堆叠.
//!
//! 实现位于 `ct-lens/src/data/{normalize, resize}.rs`.
//!
//! ### 会话状态机 ✅
//!
//! `Empty -> Loaded`. 加载失败时保留原状态; 预处理不修改已加载图像.
//! 统计信息与 ROI 提取.
//!
//! 实现位于 `ct-lens/src/session.rs`.
//!
//! ### 梯度幅值热力图 ✅
//!
//! Sobel 一阶导数算子, 输出缩放到字节范围, 可选 JET 伪彩色.
//!
//! 实现位于 `ct-lens/src/saliency.rs`.
//!
//! ### 风险聚合 ✅
//!
//! 确定性的分类 + 分割融合评分. 不允许任何随机性.
//!
//! 实现位于 `ct-lens/src/risk.rs` 和 `ct-lens/src/analysis.rs`.
//!
//! ### 小功能 ✅
//!
//! 1. 目录加载迭代器. ✅
//! 2. 热力图和切片的可视化保存. ✅
//! 3. 多线程加载场景下的互斥会话. ✅

/// 二维形状或索引, 按 `(高, 宽)` 组织.
pub type Idx2d = (usize, usize);

/// 三维形状或索引, 按 `(高, 宽, 切片)` 组织.
pub type Idx3d = (usize, usize, usize);

/// 图像数据, 元信息和 CT 窗口等基础数据结构.
pub mod data;

pub use data::{
    normalize_intensity, CtWindow, ImageData, ImageStatistics, ImgWriteVis, LoadedImage,
    MetaValue, Metadata, PixelType, TargetSize,
};

pub mod analysis;
pub mod consts;
pub mod dataset;
pub mod decode;
mod error;
pub mod inference;
pub mod prelude;
pub mod risk;
pub mod saliency;
pub mod session;

pub use decode::{FormatKind, ImageFamily};
pub use error::{PipelineError, PipelineResult};
